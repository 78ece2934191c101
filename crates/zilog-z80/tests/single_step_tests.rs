//! Opcode-totality and ALU-flag sweeps.
//!
//! These don't depend on an external vector corpus (none is bundled with
//! this workspace): they directly exercise the testable properties from the
//! spec — every (space, opcode) pair must run to completion without
//! tripping strict-mode's "unsupported opcode" panic, and representative
//! ALU ops must match the canonical flag behavior.

use g815_core::{Bus, CycleKind, Cpu};
use std::collections::HashMap;
use zilog_z80::Z80;

struct FlatBus {
    mem: [u8; 65536],
    io: HashMap<u16, u8>,
}

impl FlatBus {
    fn new() -> Self {
        Self {
            mem: [0; 65536],
            io: HashMap::new(),
        }
    }
}

impl Bus for FlatBus {
    fn read8(&mut self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }
    fn write8(&mut self, addr: u16, value: u8) {
        self.mem[addr as usize] = value;
    }
    fn in8(&mut self, port: u16) -> u8 {
        *self.io.get(&port).unwrap_or(&0xFF)
    }
    fn out8(&mut self, port: u16, value: u8) {
        self.io.insert(port, value);
    }
}

/// Run `[prefix.., opcode, 0, 0, 0, 0]` for 160 T-states in strict mode and
/// assert it never panics on an unsupported opcode.
fn run_sequence(prefix: &[u8], opcode: u8) {
    let mut bus = FlatBus::new();
    let mut program = Vec::from(prefix);
    program.push(opcode);
    program.extend_from_slice(&[0, 0, 0, 0]);
    for (i, b) in program.iter().enumerate() {
        bus.mem[i] = *b;
    }

    let mut cpu = Z80::new();
    cpu.set_strict(true);
    for _ in 0..160 {
        Cpu::tick(&mut cpu, &mut bus);
    }
}

#[test]
fn opcode_totality_base() {
    for opcode in 0..=255u8 {
        if matches!(opcode, 0xCB | 0xED | 0xDD | 0xFD) {
            continue;
        }
        run_sequence(&[], opcode);
    }
}

#[test]
fn opcode_totality_cb() {
    for opcode in 0..=255u8 {
        run_sequence(&[0xCB], opcode);
    }
}

#[test]
fn opcode_totality_ed() {
    for opcode in 0..=255u8 {
        run_sequence(&[0xED], opcode);
    }
}

#[test]
fn opcode_totality_dd_fd() {
    for opcode in 0..=255u8 {
        if opcode == 0xCB {
            continue;
        }
        run_sequence(&[0xDD], opcode);
        run_sequence(&[0xFD], opcode);
    }
}

#[test]
fn opcode_totality_ddcb_fdcb() {
    for opcode in 0..=255u8 {
        run_sequence(&[0xDD, 0xCB, 0x00], opcode);
        run_sequence(&[0xFD, 0xCB, 0x00], opcode);
    }
}

#[test]
fn wait_respected_only_on_sample_phase() {
    struct WaitOutsideFetch {
        mem: [u8; 65536],
    }
    impl Bus for WaitOutsideFetch {
        fn read8(&mut self, addr: u16) -> u8 {
            self.mem[addr as usize]
        }
        fn write8(&mut self, addr: u16, value: u8) {
            self.mem[addr as usize] = value;
        }
        fn in8(&mut self, _port: u16) -> u8 {
            0x42
        }
        fn out8(&mut self, _port: u16, _value: u8) {}
        fn wait_states(&mut self, _addr: u16, kind: CycleKind) -> u8 {
            // WAIT asserted on a memory-read sample, which isn't the
            // documented sample phase for IN A,(n)'s port access.
            if kind == CycleKind::MemRead {
                4
            } else {
                0
            }
        }
    }

    let mut bus = WaitOutsideFetch { mem: [0; 65536] };
    bus.mem[0] = 0xDB; // IN A,(n)
    bus.mem[1] = 0x01;
    bus.mem[2] = 0x00; // NOP

    let mut cpu = Z80::new();
    for _ in 0..20 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.registers().a, 0x42);
}

#[test]
fn ei_deferred_acceptance() {
    let mut bus = FlatBus::new();
    let program = [0xFB, 0x00, 0x00, 0x76]; // EI; NOP; NOP; HALT
    for (i, b) in program.iter().enumerate() {
        bus.mem[i] = *b;
    }
    bus.mem[0x0038] = 0x76; // handler: HALT

    let mut cpu = Z80::new();
    cpu.raise_int(0xFF);
    for _ in 0..60 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert!(cpu.pc() >= 0x0038);
    assert!(cpu.is_halted());
}

#[test]
fn halt_releases_on_int() {
    let mut bus = FlatBus::new();
    bus.mem[0] = 0xFB; // EI
    bus.mem[1] = 0x76; // HALT
    bus.mem[0x0038] = 0x00; // NOP at the IM1 vector

    let mut cpu = Z80::new();
    for _ in 0..8 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert!(cpu.is_halted());
    cpu.raise_int(0xFF);
    for _ in 0..40 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.pc(), 0x0039);
    assert!(!cpu.is_halted());
}

#[test]
fn nmi_priority_over_int() {
    let mut bus = FlatBus::new();
    bus.mem[0] = 0x00;
    let mut cpu = Z80::new();
    cpu.raise_int(0xFF);
    cpu.raise_nmi();
    for _ in 0..20 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert!((0x0066..=0x00FF).contains(&cpu.pc()));
}

#[test]
fn busrq_blocks_progress() {
    let mut bus = FlatBus::new();
    bus.mem[0] = 0x00; // NOP
    let mut cpu = Z80::new();
    cpu.assert_busrq(true);
    let pc_before = cpu.pc();
    for _ in 0..8 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.pc(), pc_before);
    assert!(cpu.is_busak());
    cpu.assert_busrq(false);
    for _ in 0..8 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert!(cpu.pc() > pc_before);
}

#[test]
fn alu_add_signed_overflow_sets_pv() {
    // 0x7F + 0x01 overflows into the sign bit: canonical V=1.
    let mut bus = FlatBus::new();
    bus.mem[0] = 0x3E; // LD A,0x7F
    bus.mem[1] = 0x7F;
    bus.mem[2] = 0xC6; // ADD A,0x01
    bus.mem[3] = 0x01;
    let mut cpu = Z80::new();
    for _ in 0..14 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    let regs = cpu.registers();
    assert_eq!(regs.a, 0x80);
    assert_eq!(regs.f & zilog_z80::SF, zilog_z80::SF);
    assert_eq!(regs.f & zilog_z80::PF, zilog_z80::PF);
}

#[test]
fn rrd_rotates_the_low_nibbles_right_through_a() {
    let mut bus = FlatBus::new();
    bus.mem[0] = 0x3E; // LD A,0x12
    bus.mem[1] = 0x12;
    bus.mem[2] = 0x21; // LD HL,0x8000
    bus.mem[3] = 0x00;
    bus.mem[4] = 0x80;
    bus.mem[5] = 0xED; // RRD
    bus.mem[6] = 0x67;
    bus.mem[0x8000] = 0x34;
    let mut cpu = Z80::new();
    for _ in 0..40 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.registers().a, 0x14);
    assert_eq!(bus.mem[0x8000], 0x23);
}

#[test]
fn rld_rotates_the_low_nibbles_left_through_a() {
    let mut bus = FlatBus::new();
    bus.mem[0] = 0x3E; // LD A,0x12
    bus.mem[1] = 0x12;
    bus.mem[2] = 0x21; // LD HL,0x8000
    bus.mem[3] = 0x00;
    bus.mem[4] = 0x80;
    bus.mem[5] = 0xED; // RLD
    bus.mem[6] = 0x6F;
    bus.mem[0x8000] = 0x34;
    let mut cpu = Z80::new();
    for _ in 0..40 {
        Cpu::tick(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.registers().a, 0x13);
    assert_eq!(bus.mem[0x8000], 0x42);
}
