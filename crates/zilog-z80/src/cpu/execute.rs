//! Opcode decode and execution for all seven prefix spaces.
//!
//! Decoding follows the standard `xxyyyzzz` bit-field breakdown of the
//! opcode byte (x = bits 6-7, y = bits 3-5, z = bits 0-2, p = y>>1, q = y&1)
//! rather than a 256-arm match per space: the Z80's instruction set is
//! built from a small number of regular patterns plus a handful of
//! irregular slots, and the field breakdown makes both the regularity and
//! the irregular slots explicit.

use g815_core::{Bus, CycleKind};

use super::Z80;
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::microcode::MicroOp;
use crate::timing::{self, Space};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Idx {
    Hl,
    Ix,
    Iy,
}

pub(super) fn step(cpu: &mut Z80, bus: &mut dyn Bus) {
    cpu.extra_wait = 0;
    let pc = cpu.regs.pc;
    bus.on_m1(pc);
    let opcode = cpu.bus_read8(bus, pc, CycleKind::Fetch);
    cpu.regs.pc = pc.wrapping_add(1);
    cpu.regs.bump_r();
    cpu.current_op = Some(MicroOp::FetchOpcode);

    let total = dispatch_prefixable(cpu, bus, opcode);
    cpu.current_op = Some(MicroOp::FetchRefresh);
    cpu.ticks_remaining = total.saturating_sub(1) + cpu.extra_wait;
}

fn fetch_byte(cpu: &mut Z80, bus: &mut dyn Bus) -> u8 {
    let pc = cpu.regs.pc;
    let b = cpu.bus_read8(bus, pc, CycleKind::MemRead);
    cpu.regs.pc = pc.wrapping_add(1);
    b
}

fn fetch_opcode_byte(cpu: &mut Z80, bus: &mut dyn Bus) -> u8 {
    let pc = cpu.regs.pc;
    bus.on_m1(pc);
    let b = cpu.bus_read8(bus, pc, CycleKind::Fetch);
    cpu.regs.pc = pc.wrapping_add(1);
    cpu.regs.bump_r();
    b
}

fn fetch_word(cpu: &mut Z80, bus: &mut dyn Bus) -> u16 {
    let lo = fetch_byte(cpu, bus);
    let hi = fetch_byte(cpu, bus);
    u16::from_le_bytes([lo, hi])
}

fn dispatch_prefixable(cpu: &mut Z80, bus: &mut dyn Bus, opcode: u8) -> u32 {
    match opcode {
        0xCB => {
            let sub = fetch_opcode_byte(cpu, bus);
            let hl = cpu.regs.hl();
            u32::from(exec_cb(cpu, bus, sub, hl))
        }
        0xED => {
            let sub = fetch_opcode_byte(cpu, bus);
            u32::from(exec_ed(cpu, bus, sub))
        }
        0xDD => {
            let sub = fetch_opcode_byte(cpu, bus);
            4 + dispatch_indexed(cpu, bus, sub, Idx::Ix)
        }
        0xFD => {
            let sub = fetch_opcode_byte(cpu, bus);
            4 + dispatch_indexed(cpu, bus, sub, Idx::Iy)
        }
        _ => u32::from(exec_base(cpu, bus, opcode, Idx::Hl)),
    }
}

fn dispatch_indexed(cpu: &mut Z80, bus: &mut dyn Bus, sub: u8, idx: Idx) -> u32 {
    if sub == 0xCB {
        let d = fetch_byte(cpu, bus) as i8;
        let base = if idx == Idx::Ix { cpu.regs.ix } else { cpu.regs.iy };
        let addr = base.wrapping_add(d as i16 as u16);
        let subop = fetch_byte(cpu, bus);
        exec_ddcb(cpu, bus, subop, addr);
        23
    } else {
        u32::from(exec_base(cpu, bus, sub, idx))
    }
}

// --- register/register-pair slot access, parameterised by index mode -----

fn displaced_addr(cpu: &mut Z80, bus: &mut dyn Bus, idx: Idx, disp: &mut Option<u16>) -> u16 {
    if let Some(a) = *disp {
        return a;
    }
    let d = fetch_byte(cpu, bus) as i8;
    let base = if idx == Idx::Ix { cpu.regs.ix } else { cpu.regs.iy };
    let addr = base.wrapping_add(d as i16 as u16);
    *disp = Some(addr);
    addr
}

fn r_get(cpu: &mut Z80, bus: &mut dyn Bus, idx: Idx, slot: u8, disp: &mut Option<u16>) -> u8 {
    match (idx, slot) {
        (_, 0) => cpu.regs.b,
        (_, 1) => cpu.regs.c,
        (_, 2) => cpu.regs.d,
        (_, 3) => cpu.regs.e,
        (Idx::Hl, 4) => cpu.regs.h,
        (Idx::Hl, 5) => cpu.regs.l,
        (Idx::Ix, 4) => cpu.regs.ixh(),
        (Idx::Ix, 5) => cpu.regs.ixl(),
        (Idx::Iy, 4) => cpu.regs.iyh(),
        (Idx::Iy, 5) => cpu.regs.iyl(),
        (Idx::Hl, 6) => {
            let hl = cpu.regs.hl();
            cpu.bus_read8(bus, hl, CycleKind::MemRead)
        }
        (_, 6) => {
            let addr = displaced_addr(cpu, bus, idx, disp);
            cpu.bus_read8(bus, addr, CycleKind::MemRead)
        }
        (_, 7) => cpu.regs.a,
        _ => unreachable!("register slot out of range"),
    }
}

fn r_set(cpu: &mut Z80, bus: &mut dyn Bus, idx: Idx, slot: u8, disp: &mut Option<u16>, value: u8) {
    match (idx, slot) {
        (_, 0) => cpu.regs.b = value,
        (_, 1) => cpu.regs.c = value,
        (_, 2) => cpu.regs.d = value,
        (_, 3) => cpu.regs.e = value,
        (Idx::Hl, 4) => cpu.regs.h = value,
        (Idx::Hl, 5) => cpu.regs.l = value,
        (Idx::Ix, 4) => cpu.regs.set_ixh(value),
        (Idx::Ix, 5) => cpu.regs.set_ixl(value),
        (Idx::Iy, 4) => cpu.regs.set_iyh(value),
        (Idx::Iy, 5) => cpu.regs.set_iyl(value),
        (Idx::Hl, 6) => {
            let hl = cpu.regs.hl();
            cpu.bus_write8(bus, hl, value, CycleKind::MemWrite);
        }
        (_, 6) => {
            let addr = displaced_addr(cpu, bus, idx, disp);
            cpu.bus_write8(bus, addr, value, CycleKind::MemWrite);
        }
        (_, 7) => cpu.regs.a = value,
        _ => unreachable!("register slot out of range"),
    }
}

fn rp_get(cpu: &Z80, idx: Idx, p: u8) -> u16 {
    match p {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => match idx {
            Idx::Hl => cpu.regs.hl(),
            Idx::Ix => cpu.regs.ix,
            Idx::Iy => cpu.regs.iy,
        },
        _ => cpu.regs.sp,
    }
}

fn rp_set(cpu: &mut Z80, idx: Idx, p: u8, value: u16) {
    match p {
        0 => cpu.regs.set_bc(value),
        1 => cpu.regs.set_de(value),
        2 => match idx {
            Idx::Hl => cpu.regs.set_hl(value),
            Idx::Ix => cpu.regs.ix = value,
            Idx::Iy => cpu.regs.iy = value,
        },
        _ => cpu.regs.sp = value,
    }
}

fn rp2_get(cpu: &Z80, idx: Idx, p: u8) -> u16 {
    if p == 3 {
        cpu.regs.af()
    } else {
        rp_get(cpu, idx, p)
    }
}

fn rp2_set(cpu: &mut Z80, idx: Idx, p: u8, value: u16) {
    if p == 3 {
        cpu.regs.set_af(value);
    } else {
        rp_set(cpu, idx, p, value);
    }
}

fn cc_test(cpu: &Z80, y: u8) -> bool {
    let f = cpu.regs.f;
    match y {
        0 => f & ZF == 0,
        1 => f & ZF != 0,
        2 => f & CF == 0,
        3 => f & CF != 0,
        4 => f & PF == 0,
        5 => f & PF != 0,
        6 => f & SF == 0,
        _ => f & SF != 0,
    }
}

fn apply_alu(cpu: &mut Z80, y: u8, operand: u8) {
    let a = cpu.regs.a;
    let carry = cpu.regs.f & CF != 0;
    let result = match y {
        0 => alu::add8(a, operand),
        1 => alu::adc8(a, operand, carry),
        2 => alu::sub8(a, operand),
        3 => alu::sbc8(a, operand, carry),
        4 => alu::and8(a, operand),
        5 => alu::xor8(a, operand),
        6 => alu::or8(a, operand),
        _ => alu::cp8(a, operand),
    };
    cpu.regs.f = result.flags;
    if y != 7 {
        cpu.regs.a = result.value;
    }
}

fn rot_apply(y: u8, val: u8, carry_in: bool) -> (u8, bool) {
    match y {
        0 => (val.rotate_left(1), val & 0x80 != 0),
        1 => (val.rotate_right(1), val & 0x01 != 0),
        2 => {
            let out = (val << 1) | u8::from(carry_in);
            (out, val & 0x80 != 0)
        }
        3 => {
            let out = (val >> 1) | (u8::from(carry_in) << 7);
            (out, val & 0x01 != 0)
        }
        4 => (val << 1, val & 0x80 != 0),
        5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
        6 => (val.rotate_left(1) | 1, val & 0x80 != 0),
        _ => (val >> 1, val & 0x01 != 0),
    }
}

// --- base space (also reused, reinterpreted, for DD/FD) -------------------

fn exec_base(cpu: &mut Z80, bus: &mut dyn Bus, opcode: u8, idx: Idx) -> u8 {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let p = y >> 1;
    let q = y & 1;
    let mut disp: Option<u16> = None;
    let base_cost = timing::t_states(
        match idx {
            Idx::Hl => Space::Base,
            Idx::Ix => Space::Dd,
            Idx::Iy => Space::Fd,
        },
        opcode,
    );

    match (x, z) {
        (0, 0) => match y {
            0 => {}
            1 => cpu.regs.ex_af_af(),
            2 => {
                cpu.regs.b = cpu.regs.b.wrapping_sub(1);
                let d = fetch_byte(cpu, bus) as i8;
                if cpu.regs.b != 0 {
                    cpu.regs.pc = cpu.regs.pc.wrapping_add(d as i16 as u16);
                    return base_cost;
                }
                return 8;
            }
            3 => {
                let d = fetch_byte(cpu, bus) as i8;
                cpu.regs.pc = cpu.regs.pc.wrapping_add(d as i16 as u16);
            }
            _ => {
                let d = fetch_byte(cpu, bus) as i8;
                if cc_test(cpu, y - 4) {
                    cpu.regs.pc = cpu.regs.pc.wrapping_add(d as i16 as u16);
                    return base_cost;
                }
                return 7;
            }
        },
        (0, 1) => {
            if q == 0 {
                let nn = fetch_word(cpu, bus);
                rp_set(cpu, idx, p, nn);
            } else {
                let hl = rp_get(cpu, idx, 2);
                let val = rp_get(cpu, idx, p);
                let (result, flags) = alu::add16(hl, val, cpu.regs.f);
                rp_set(cpu, idx, 2, result);
                cpu.regs.f = flags;
            }
        }
        (0, 2) => match (q, p) {
            (0, 0) => {
                let bc = cpu.regs.bc();
                cpu.bus_write8(bus, bc, cpu.regs.a, CycleKind::MemWrite);
            }
            (0, 1) => {
                let de = cpu.regs.de();
                cpu.bus_write8(bus, de, cpu.regs.a, CycleKind::MemWrite);
            }
            (0, 2) => {
                let nn = fetch_word(cpu, bus);
                let hl = rp_get(cpu, idx, 2);
                cpu.bus_write8(bus, nn, hl as u8, CycleKind::MemWrite);
                cpu.bus_write8(bus, nn.wrapping_add(1), (hl >> 8) as u8, CycleKind::MemWrite);
            }
            (0, _) => {
                let nn = fetch_word(cpu, bus);
                cpu.bus_write8(bus, nn, cpu.regs.a, CycleKind::MemWrite);
            }
            (1, 0) => {
                let bc = cpu.regs.bc();
                cpu.regs.a = cpu.bus_read8(bus, bc, CycleKind::MemRead);
            }
            (1, 1) => {
                let de = cpu.regs.de();
                cpu.regs.a = cpu.bus_read8(bus, de, CycleKind::MemRead);
            }
            (1, 2) => {
                let nn = fetch_word(cpu, bus);
                let lo = cpu.bus_read8(bus, nn, CycleKind::MemRead);
                let hi = cpu.bus_read8(bus, nn.wrapping_add(1), CycleKind::MemRead);
                rp_set(cpu, idx, 2, u16::from_le_bytes([lo, hi]));
            }
            _ => {
                let nn = fetch_word(cpu, bus);
                cpu.regs.a = cpu.bus_read8(bus, nn, CycleKind::MemRead);
            }
        },
        (0, 3) => {
            let rp = rp_get(cpu, idx, p);
            rp_set(cpu, idx, p, if q == 0 { rp.wrapping_add(1) } else { rp.wrapping_sub(1) });
        }
        (0, 4) => {
            let v = r_get(cpu, bus, idx, y, &mut disp);
            let r = alu::inc8(v, cpu.regs.f);
            r_set(cpu, bus, idx, y, &mut disp, r.value);
            cpu.regs.f = r.flags;
        }
        (0, 5) => {
            let v = r_get(cpu, bus, idx, y, &mut disp);
            let r = alu::dec8(v, cpu.regs.f);
            r_set(cpu, bus, idx, y, &mut disp, r.value);
            cpu.regs.f = r.flags;
        }
        (0, 6) => {
            if y == 6 && idx != Idx::Hl {
                // LD (IX+d),n — the displacement is read before the immediate.
                let addr = displaced_addr(cpu, bus, idx, &mut disp);
                let n = fetch_byte(cpu, bus);
                cpu.bus_write8(bus, addr, n, CycleKind::MemWrite);
            } else {
                let n = fetch_byte(cpu, bus);
                r_set(cpu, bus, idx, y, &mut disp, n);
            }
        }
        (0, 7) => match y {
            0 => {
                let (v, c) = rot_apply(0, cpu.regs.a, false);
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (v & (YF | XF)) | u8::from(c);
                cpu.regs.a = v;
            }
            1 => {
                let (v, c) = rot_apply(1, cpu.regs.a, false);
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (v & (YF | XF)) | u8::from(c);
                cpu.regs.a = v;
            }
            2 => {
                let carry = cpu.regs.f & CF != 0;
                let (v, c) = rot_apply(2, cpu.regs.a, carry);
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (v & (YF | XF)) | u8::from(c);
                cpu.regs.a = v;
            }
            3 => {
                let carry = cpu.regs.f & CF != 0;
                let (v, c) = rot_apply(3, cpu.regs.a, carry);
                cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (v & (YF | XF)) | u8::from(c);
                cpu.regs.a = v;
            }
            4 => {
                let r = alu::daa(cpu.regs.a, cpu.regs.f);
                cpu.regs.a = r.value;
                cpu.regs.f = r.flags;
            }
            5 => {
                let r = alu::cpl(cpu.regs.a, cpu.regs.f);
                cpu.regs.a = r.value;
                cpu.regs.f = r.flags;
            }
            6 => {
                let r = alu::scf(cpu.regs.a, cpu.regs.f);
                cpu.regs.f = r.flags;
            }
            _ => {
                let r = alu::ccf(cpu.regs.a, cpu.regs.f);
                cpu.regs.f = r.flags;
            }
        },
        (1, _) => {
            if y == 6 && z == 6 {
                cpu.regs.halted = true;
            } else {
                let v = r_get(cpu, bus, idx, z, &mut disp);
                r_set(cpu, bus, idx, y, &mut disp, v);
            }
        }
        (2, _) => {
            let v = r_get(cpu, bus, idx, z, &mut disp);
            apply_alu(cpu, y, v);
        }
        (3, 0) => {
            if cc_test(cpu, y) {
                cpu.regs.pc = cpu.pop16(bus);
                return base_cost;
            }
            return 5;
        }
        (3, 1) => {
            if q == 0 {
                let v = cpu.pop16(bus);
                rp2_set(cpu, idx, p, v);
            } else {
                match p {
                    0 => cpu.regs.pc = cpu.pop16(bus),
                    1 => cpu.regs.exx(),
                    2 => cpu.regs.pc = rp_get(cpu, idx, 2),
                    _ => cpu.regs.sp = rp_get(cpu, idx, 2),
                }
            }
        }
        (3, 2) => {
            let nn = fetch_word(cpu, bus);
            if cc_test(cpu, y) {
                cpu.regs.pc = nn;
            }
        }
        (3, 3) => match y {
            0 => cpu.regs.pc = fetch_word(cpu, bus),
            2 => {
                let n = fetch_byte(cpu, bus);
                let port = u16::from_be_bytes([cpu.regs.a, n]);
                cpu.bus_out8(bus, port, cpu.regs.a);
            }
            3 => {
                let n = fetch_byte(cpu, bus);
                let port = u16::from_be_bytes([cpu.regs.a, n]);
                cpu.regs.a = cpu.bus_in8(bus, port);
            }
            4 => {
                let sp = cpu.regs.sp;
                let lo = cpu.bus_read8(bus, sp, CycleKind::MemRead);
                let hi = cpu.bus_read8(bus, sp.wrapping_add(1), CycleKind::MemRead);
                let rp = rp_get(cpu, idx, 2);
                cpu.bus_write8(bus, sp, rp as u8, CycleKind::MemWrite);
                cpu.bus_write8(bus, sp.wrapping_add(1), (rp >> 8) as u8, CycleKind::MemWrite);
                rp_set(cpu, idx, 2, u16::from_le_bytes([lo, hi]));
            }
            5 => {
                let hl = cpu.regs.hl();
                cpu.regs.set_hl(cpu.regs.de());
                cpu.regs.set_de(hl);
            }
            6 => cpu.regs.iff1 = false,
            _ => {
                cpu.regs.iff1 = true;
                cpu.regs.iff2 = true;
                cpu.defer_next_interrupt();
            }
        },
        (3, 4) => {
            let nn = fetch_word(cpu, bus);
            if cc_test(cpu, y) {
                let pc = cpu.regs.pc;
                cpu.push16(bus, pc);
                cpu.regs.pc = nn;
                return base_cost;
            }
            return 10;
        }
        (3, 5) => {
            if q == 0 {
                let v = rp2_get(cpu, idx, p);
                cpu.push16(bus, v);
            } else {
                let nn = fetch_word(cpu, bus);
                let pc = cpu.regs.pc;
                cpu.push16(bus, pc);
                cpu.regs.pc = nn;
            }
        }
        (3, 6) => {
            let n = fetch_byte(cpu, bus);
            apply_alu(cpu, y, n);
        }
        _ => {
            let pc = cpu.regs.pc;
            cpu.push16(bus, pc);
            cpu.regs.pc = u16::from(y) * 8;
        }
    }
    base_cost
}

// --- CB space (also the tail of DDCB/FDCB) --------------------------------

fn exec_cb(cpu: &mut Z80, bus: &mut dyn Bus, opcode: u8, hl: u16) -> u8 {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let mut disp = None;
    let v = r_get(cpu, bus, Idx::Hl, z, &mut disp);
    match x {
        0 => {
            let carry = cpu.regs.f & CF != 0;
            let (out, c) = rot_apply(y, v, carry);
            let mut f = crate::flags::sz53p(out);
            if c {
                f |= CF;
            }
            cpu.regs.f = f;
            r_set(cpu, bus, Idx::Hl, z, &mut disp, out);
        }
        1 => {
            let bit = v & (1 << y) != 0;
            let mut f = (cpu.regs.f & CF) | HF;
            if !bit {
                f |= ZF | PF;
            }
            if y == 7 && bit {
                f |= SF;
            }
            if z == 6 {
                f |= ((hl >> 8) as u8) & (YF | XF);
            } else {
                f |= v & (YF | XF);
            }
            cpu.regs.f = f;
        }
        2 => r_set(cpu, bus, Idx::Hl, z, &mut disp, v & !(1 << y)),
        _ => r_set(cpu, bus, Idx::Hl, z, &mut disp, v | (1 << y)),
    }
    timing::t_states(Space::Cb, opcode)
}

/// DDCB/FDCB tail: displacement already resolved to `addr`; when the slot
/// field is not 6 (not the bare `(IX+d)` form) the result is also written
/// back to the aliased register, per the documented hardware quirk.
fn exec_ddcb(cpu: &mut Z80, bus: &mut dyn Bus, opcode: u8, addr: u16) {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let v = cpu.bus_read8(bus, addr, CycleKind::MemRead);
    match x {
        0 => {
            let carry = cpu.regs.f & CF != 0;
            let (out, c) = rot_apply(y, v, carry);
            let mut f = crate::flags::sz53p(out);
            if c {
                f |= CF;
            }
            cpu.regs.f = f;
            cpu.bus_write8(bus, addr, out, CycleKind::MemWrite);
            if z != 6 {
                let mut disp = Some(addr);
                r_set(cpu, bus, Idx::Hl, z, &mut disp, out);
            }
        }
        1 => {
            let bit = v & (1 << y) != 0;
            let mut f = (cpu.regs.f & CF) | HF;
            if !bit {
                f |= ZF | PF;
            }
            if y == 7 && bit {
                f |= SF;
            }
            f |= ((addr >> 8) as u8) & (YF | XF);
            cpu.regs.f = f;
        }
        2 => {
            let out = v & !(1 << y);
            cpu.bus_write8(bus, addr, out, CycleKind::MemWrite);
            if z != 6 {
                let mut disp = Some(addr);
                r_set(cpu, bus, Idx::Hl, z, &mut disp, out);
            }
        }
        _ => {
            let out = v | (1 << y);
            cpu.bus_write8(bus, addr, out, CycleKind::MemWrite);
            if z != 6 {
                let mut disp = Some(addr);
                r_set(cpu, bus, Idx::Hl, z, &mut disp, out);
            }
        }
    }
}

// --- ED space --------------------------------------------------------------

fn exec_ed(cpu: &mut Z80, bus: &mut dyn Bus, opcode: u8) -> u8 {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 7;
    let z = opcode & 7;
    let p = y >> 1;
    let q = y & 1;

    // Unimplemented ED opcodes behave as a plain NOP on real hardware, not as
    // a genuinely unsupported instruction, so they never trip strict mode.
    if x == 0 || x == 3 {
        return 8;
    }

    if x == 2 {
        if z < 4 && y >= 4 {
            return exec_ed_block(cpu, bus, y, z);
        }
        return 8;
    }

    match z {
        0 => {
            let v = cpu.bus_in8(bus, cpu.regs.bc());
            let f = (cpu.regs.f & CF) | crate::flags::sz53p(v);
            if y != 6 {
                let mut disp = None;
                r_set(cpu, bus, Idx::Hl, y, &mut disp, v);
            }
            cpu.regs.f = f;
        }
        1 => {
            let v = if y == 6 {
                0
            } else {
                let mut disp = None;
                r_get(cpu, bus, Idx::Hl, y, &mut disp)
            };
            cpu.bus_out8(bus, cpu.regs.bc(), v);
        }
        2 => {
            let hl = cpu.regs.hl();
            let rp = rp_get(cpu, Idx::Hl, p);
            let carry = cpu.regs.f & CF != 0;
            let (result, flags) = if q == 0 {
                alu::sbc16(hl, rp, carry)
            } else {
                alu::adc16(hl, rp, carry)
            };
            cpu.regs.set_hl(result);
            cpu.regs.f = flags;
        }
        3 => {
            let nn = fetch_word(cpu, bus);
            if q == 0 {
                let rp = rp_get(cpu, Idx::Hl, p);
                cpu.bus_write8(bus, nn, rp as u8, CycleKind::MemWrite);
                cpu.bus_write8(bus, nn.wrapping_add(1), (rp >> 8) as u8, CycleKind::MemWrite);
            } else {
                let lo = cpu.bus_read8(bus, nn, CycleKind::MemRead);
                let hi = cpu.bus_read8(bus, nn.wrapping_add(1), CycleKind::MemRead);
                rp_set(cpu, Idx::Hl, p, u16::from_le_bytes([lo, hi]));
            }
        }
        4 => {
            let r = alu::sub8(0, cpu.regs.a);
            cpu.regs.a = r.value;
            cpu.regs.f = r.flags;
        }
        5 => {
            cpu.regs.iff1 = cpu.regs.iff2;
            cpu.regs.halted = false;
        }
        6 => {
            cpu.regs.im = match y {
                0 | 1 | 4 | 5 => 0,
                2 | 6 => 1,
                _ => 2,
            };
        }
        _ => match y {
            0 => cpu.regs.i = cpu.regs.a,
            1 => cpu.regs.r = cpu.regs.a,
            2 => {
                let iff2 = cpu.regs.iff2;
                cpu.regs.a = cpu.regs.i;
                cpu.regs.f = (cpu.regs.f & CF) | crate::flags::sz53(cpu.regs.a) | (u8::from(iff2) << 2);
            }
            3 => {
                let iff2 = cpu.regs.iff2;
                cpu.regs.a = cpu.regs.r;
                cpu.regs.f = (cpu.regs.f & CF) | crate::flags::sz53(cpu.regs.a) | (u8::from(iff2) << 2);
            }
            4 => {
                let hl = cpu.regs.hl();
                let mem = cpu.bus_read8(bus, hl, CycleKind::MemRead);
                let new_mem = (mem >> 4) | ((cpu.regs.a & 0x0F) << 4);
                let new_a = (cpu.regs.a & 0xF0) | (mem & 0x0F);
                cpu.bus_write8(bus, hl, new_mem, CycleKind::MemWrite);
                cpu.regs.a = new_a;
                cpu.regs.f = (cpu.regs.f & CF) | crate::flags::sz53p(new_a);
            }
            5 => {
                let hl = cpu.regs.hl();
                let mem = cpu.bus_read8(bus, hl, CycleKind::MemRead);
                let new_mem = ((mem & 0x0F) << 4) | (cpu.regs.a & 0x0F);
                let new_a = (cpu.regs.a & 0xF0) | (mem >> 4);
                cpu.bus_write8(bus, hl, new_mem, CycleKind::MemWrite);
                cpu.regs.a = new_a;
                cpu.regs.f = (cpu.regs.f & CF) | crate::flags::sz53p(new_a);
            }
            _ => {}
        },
    }
    timing::t_states(Space::Ed, opcode)
}

fn exec_ed_block(cpu: &mut Z80, bus: &mut dyn Bus, y: u8, z: u8) -> u8 {
    let increment = y == 4 || y == 6;
    let repeat = y == 6 || y == 7;
    let step: i16 = if increment { 1 } else { -1 };

    match z {
        0 => {
            let hl = cpu.regs.hl();
            let de = cpu.regs.de();
            let v = cpu.bus_read8(bus, hl, CycleKind::MemRead);
            cpu.bus_write8(bus, de, v, CycleKind::MemWrite);
            cpu.regs.set_hl(hl.wrapping_add(step as u16));
            cpu.regs.set_de(de.wrapping_add(step as u16));
            let bc = cpu.regs.bc().wrapping_sub(1);
            cpu.regs.set_bc(bc);
            let n = cpu.regs.a.wrapping_add(v);
            let mut f = cpu.regs.f & (SF | ZF | CF);
            f |= n & XF;
            if n & 0x02 != 0 {
                f |= YF;
            }
            if bc != 0 {
                f |= PF;
            }
            cpu.regs.f = f;
            if repeat && bc != 0 {
                cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
                return 21;
            }
            16
        }
        1 => {
            let hl = cpu.regs.hl();
            let v = cpu.bus_read8(bus, hl, CycleKind::MemRead);
            let a = cpu.regs.a;
            let result = a.wrapping_sub(v);
            cpu.regs.set_hl(hl.wrapping_add(step as u16));
            let bc = cpu.regs.bc().wrapping_sub(1);
            cpu.regs.set_bc(bc);
            let half = (a & 0x0F) < (v & 0x0F);
            let mut f = (cpu.regs.f & CF) | NF;
            f |= crate::flags::sz53(result) & (SF | ZF);
            if half {
                f |= HF;
            }
            let n = if half { result.wrapping_sub(1) } else { result };
            f |= n & XF;
            if n & 0x02 != 0 {
                f |= YF;
            }
            if bc != 0 {
                f |= PF;
            }
            cpu.regs.f = f;
            if repeat && bc != 0 && result != 0 {
                cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
                return 21;
            }
            16
        }
        2 => {
            let v = cpu.bus_in8(bus, cpu.regs.bc());
            let hl = cpu.regs.hl();
            cpu.bus_write8(bus, hl, v, CycleKind::MemWrite);
            cpu.regs.set_hl(hl.wrapping_add(step as u16));
            cpu.regs.b = cpu.regs.b.wrapping_sub(1);
            let mut f = NF;
            f |= crate::flags::sz53(cpu.regs.b) & (SF | ZF | YF | XF);
            cpu.regs.f = f;
            if repeat && cpu.regs.b != 0 {
                cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
                return 21;
            }
            16
        }
        _ => {
            let hl = cpu.regs.hl();
            let v = cpu.bus_read8(bus, hl, CycleKind::MemRead);
            cpu.regs.set_hl(hl.wrapping_add(step as u16));
            cpu.regs.b = cpu.regs.b.wrapping_sub(1);
            cpu.bus_out8(bus, cpu.regs.bc(), v);
            let mut f = NF;
            f |= crate::flags::sz53(cpu.regs.b) & (SF | ZF | YF | XF);
            cpu.regs.f = f;
            if repeat && cpu.regs.b != 0 {
                cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
                return 21;
            }
            16
        }
    }
}
