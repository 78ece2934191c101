//! Instruction encoding: `(mnemonic, operand-shape) -> bytes`.
//!
//! Pass 1 and pass 2 share this single encoder. In pass 1 `ctx.labels` is
//! `None` and every expression resolves to a placeholder `0` — instruction
//! *size* never depends on an operand's resolved value (only its shape), so
//! the placeholder is enough to compute layout. Pass 2 supplies the label
//! table and the same code path now produces real bytes, surfacing
//! "undefined label" / "out of range" diagnostics that pass 1 can't yet see.

use std::collections::HashMap;

use crate::expr::Expr;
use crate::operand::{self, Condition, Operand, Reg16, Reg8};
use crate::table;

pub struct EncodeCtx<'a> {
    pub here: i64,
    pub labels: Option<&'a HashMap<String, i64>>,
}

impl EncodeCtx<'_> {
    fn resolve(&self, e: &Expr) -> Result<i64, String> {
        let Some(labels) = self.labels else { return Ok(0) };
        e.resolve(self.here, labels).ok_or_else(|| match e {
            Expr::Label(name) => format!("undefined label '{name}'"),
            _ => "expression could not be resolved".to_string(),
        })
    }

    fn imm8(&self, e: &Expr) -> Result<u8, String> {
        let v = self.resolve(e)?;
        if self.labels.is_some() && !(-128..=255).contains(&v) {
            return Err(format!("operand {v} out of range for an 8-bit value"));
        }
        Ok((v & 0xFF) as u8)
    }

    fn imm16(&self, e: &Expr) -> Result<(u8, u8), String> {
        let v = self.resolve(e)?;
        if self.labels.is_some() && !(0..=0xFFFF).contains(&v) {
            return Err(format!("operand {v} out of range for a 16-bit value"));
        }
        Ok(((v & 0xFF) as u8, ((v >> 8) & 0xFF) as u8))
    }

    fn disp(&self, e: &Expr) -> Result<u8, String> {
        let v = self.resolve(e)?;
        if self.labels.is_some() && !(-128..=127).contains(&v) {
            return Err(format!("index displacement {v} out of range"));
        }
        Ok(v as i8 as u8)
    }

    fn rel8(&self, e: &Expr, instr_len: i64) -> Result<u8, String> {
        let target = self.resolve(e)?;
        let disp = target - (self.here + instr_len);
        if self.labels.is_some() && !(-128..=127).contains(&disp) {
            return Err(format!("relative jump target out of range ({disp} bytes)"));
        }
        Ok(disp as i8 as u8)
    }
}

fn op(raw: &str) -> Result<Operand, String> {
    operand::parse_operand(raw).ok_or_else(|| format!("invalid operand '{raw}'"))
}

/// Encode one instruction. `raw_operands` are the comma-split, untrimmed
/// operand strings straight from the lexer.
pub fn encode_instruction(mnemonic: &str, raw_operands: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    let m = mnemonic.to_ascii_uppercase();
    let ops = raw_operands;

    match (m.as_str(), ops.len()) {
        ("NOP", 0) => return Ok(vec![0x00]),
        ("HALT", 0) => return Ok(vec![0x76]),
        ("DI", 0) => return Ok(vec![0xF3]),
        ("EI", 0) => return Ok(vec![0xFB]),
        ("EXX", 0) => return Ok(vec![0xD9]),
        ("RLCA", 0) => return Ok(vec![0x07]),
        ("RRCA", 0) => return Ok(vec![0x0F]),
        ("RLA", 0) => return Ok(vec![0x17]),
        ("RRA", 0) => return Ok(vec![0x1F]),
        ("CPL", 0) => return Ok(vec![0x2F]),
        ("SCF", 0) => return Ok(vec![0x37]),
        ("CCF", 0) => return Ok(vec![0x3F]),
        ("DAA", 0) => return Ok(vec![0x27]),
        ("NEG", 0) => return Ok(vec![0xED, 0x44]),
        ("RETI", 0) => return Ok(vec![0xED, 0x4D]),
        ("RETN", 0) => return Ok(vec![0xED, 0x45]),
        ("RET", 0) => return Ok(vec![0xC9]),
        ("RET", 1) => {
            let cond = operand::parse_condition(&ops[0]).ok_or("RET takes a condition or no operand")?;
            return Ok(vec![0xC0 | (table::condition_code(cond) << 3)]);
        }
        _ => {}
    }

    match m.as_str() {
        "LD" => return encode_ld(ops, ctx),
        "PUSH" => return encode_push_pop(ops, 0xC5, ctx),
        "POP" => return encode_push_pop(ops, 0xC1, ctx),
        "EX" => return encode_ex(ops),
        "INC" => return encode_inc_dec(ops, true, ctx),
        "DEC" => return encode_inc_dec(ops, false, ctx),
        "ADD" | "ADC" | "SUB" | "SBC" | "AND" | "OR" | "XOR" | "CP" => return encode_arith(&m, ops, ctx),
        "JP" => return encode_jp(ops, ctx),
        "JR" => return encode_jr(ops, ctx),
        "DJNZ" => {
            if ops.len() != 1 {
                return Err("DJNZ takes exactly one operand".to_string());
            }
            let target = Expr::parse(&ops[0]).ok_or("DJNZ target is not a valid expression")?;
            let d = ctx.rel8(&target, 2)?;
            return Ok(vec![0x10, d]);
        }
        "CALL" => return encode_call(ops, ctx),
        "RST" => {
            if ops.len() != 1 {
                return Err("RST takes exactly one operand".to_string());
            }
            let e = Expr::parse(&ops[0]).ok_or("RST target is not a valid expression")?;
            let v = ctx.resolve(&e)?;
            if ![0x00, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38].contains(&v) {
                return Err(format!("RST target {v:#04x} is not one of the eight RST vectors"));
            }
            return Ok(vec![0xC7 | (v as u8)]);
        }
        "IN" => return encode_in(ops, ctx),
        "OUT" => return encode_out(ops, ctx),
        "IM" => {
            if ops.len() != 1 {
                return Err("IM takes exactly one operand".to_string());
            }
            return match ops[0].trim() {
                "0" => Ok(vec![0xED, 0x46]),
                "1" => Ok(vec![0xED, 0x56]),
                "2" => Ok(vec![0xED, 0x5E]),
                other => Err(format!("IM mode must be 0, 1, or 2, got '{other}'")),
            };
        }
        "BIT" => return encode_cb_bit_group(0x40, ops, ctx),
        "SET" => return encode_cb_bit_group(0xC0, ops, ctx),
        "RES" => return encode_cb_bit_group(0x80, ops, ctx),
        "RLC" => return encode_cb_rotate(0x00, ops, ctx),
        "RRC" => return encode_cb_rotate(0x08, ops, ctx),
        "RL" => return encode_cb_rotate(0x10, ops, ctx),
        "RR" => return encode_cb_rotate(0x18, ops, ctx),
        "SLA" => return encode_cb_rotate(0x20, ops, ctx),
        "SRA" => return encode_cb_rotate(0x28, ops, ctx),
        "SRL" => return encode_cb_rotate(0x38, ops, ctx),
        "LDI" => return Ok(vec![0xED, 0xA0]),
        "LDIR" => return Ok(vec![0xED, 0xB0]),
        "LDD" => return Ok(vec![0xED, 0xA8]),
        "LDDR" => return Ok(vec![0xED, 0xB8]),
        "CPI" => return Ok(vec![0xED, 0xA1]),
        "CPIR" => return Ok(vec![0xED, 0xB1]),
        "CPD" => return Ok(vec![0xED, 0xA9]),
        "CPDR" => return Ok(vec![0xED, 0xB9]),
        "INI" => return Ok(vec![0xED, 0xA2]),
        "INIR" => return Ok(vec![0xED, 0xB2]),
        "IND" => return Ok(vec![0xED, 0xAA]),
        "INDR" => return Ok(vec![0xED, 0xBA]),
        "OUTI" => return Ok(vec![0xED, 0xA3]),
        "OTIR" => return Ok(vec![0xED, 0xB3]),
        "OUTD" => return Ok(vec![0xED, 0xAB]),
        "OTDR" => return Ok(vec![0xED, 0xBB]),
        _ => {}
    }

    Err(format!("unknown mnemonic '{mnemonic}'"))
}

/// Instruction length in bytes, independent of any label's resolved value.
pub fn instruction_size(mnemonic: &str, raw_operands: &[String]) -> Result<usize, String> {
    let ctx = EncodeCtx { here: 0, labels: None };
    encode_instruction(mnemonic, raw_operands, &ctx).map(|b| b.len())
}

fn encode_push_pop(ops: &[String], base: u8, _ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    if ops.len() != 1 {
        return Err("expects exactly one register-pair operand".to_string());
    }
    match op(&ops[0])? {
        Operand::Reg16(Reg16::Ix) => Ok(vec![0xDD, base + 0x20]),
        Operand::Reg16(Reg16::Iy) => Ok(vec![0xFD, base + 0x20]),
        Operand::Reg16(r) => {
            let p = table::pair_code_af(r).ok_or("not a valid PUSH/POP pair")?;
            Ok(vec![base | (p << 4)])
        }
        _ => Err("expects a 16-bit register pair".to_string()),
    }
}

fn encode_ex(ops: &[String]) -> Result<Vec<u8>, String> {
    if ops.len() != 2 {
        return Err("EX takes exactly two operands".to_string());
    }
    let (a, b) = (op(&ops[0])?, op(&ops[1])?);
    match (a, b) {
        (Operand::Reg16(Reg16::De), Operand::Reg16(Reg16::Hl)) => Ok(vec![0xEB]),
        (Operand::Reg16(Reg16::Af), Operand::Reg16(Reg16::AfShadow)) => Ok(vec![0x08]),
        (Operand::IndirectReg16(Reg16::Sp), Operand::Reg16(Reg16::Hl)) => Ok(vec![0xE3]),
        (Operand::IndirectReg16(Reg16::Sp), Operand::Reg16(Reg16::Ix)) => Ok(vec![0xDD, 0xE3]),
        (Operand::IndirectReg16(Reg16::Sp), Operand::Reg16(Reg16::Iy)) => Ok(vec![0xFD, 0xE3]),
        _ => Err("unsupported EX operand combination".to_string()),
    }
}

fn encode_inc_dec(ops: &[String], is_inc: bool, ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    if ops.len() != 1 {
        return Err("expects exactly one operand".to_string());
    }
    let base8 = if is_inc { 0x04 } else { 0x05 };
    let base16 = if is_inc { 0x03 } else { 0x0B };
    match op(&ops[0])? {
        Operand::Reg8(r) => {
            if let Some(prefix) = table::index_half_prefix(r) {
                let code = table::index_half_code(r).unwrap();
                return Ok(vec![prefix, base8 | (code << 3)]);
            }
            let code = table::reg8_code(r).ok_or("invalid register for INC/DEC")?;
            Ok(vec![base8 | (code << 3)])
        }
        Operand::IndirectHl => Ok(vec![base8 | (6 << 3)]),
        Operand::IndirectIndexed { index, disp } => {
            let prefix = if index == Reg16::Ix { 0xDD } else { 0xFD };
            let d = ctx.disp(&disp)?;
            Ok(vec![prefix, base8 | (6 << 3), d])
        }
        Operand::Reg16(Reg16::Ix) => Ok(vec![0xDD, base16 | (2 << 4)]),
        Operand::Reg16(Reg16::Iy) => Ok(vec![0xFD, base16 | (2 << 4)]),
        Operand::Reg16(r) => {
            let p = table::pair_code_sp(r).ok_or("invalid register pair for INC/DEC")?;
            Ok(vec![base16 | (p << 4)])
        }
        _ => Err("INC/DEC operand must be a register, pair, or memory location".to_string()),
    }
}

/// Shared decode for the eight `A, operand` ALU mnemonics and their
/// register/immediate/memory operand forms.
fn encode_arith(mnemonic: &str, ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    let alu_code = match mnemonic {
        "ADD" => 0,
        "ADC" => 1,
        "SUB" => 2,
        "SBC" => 3,
        "AND" => 4,
        "XOR" => 5,
        "OR" => 6,
        "CP" => 7,
        _ => unreachable!(),
    };

    // ADD/ADC/SBC also have 16-bit register-pair forms.
    if ops.len() == 2 {
        if let (Ok(Operand::Reg16(dst)), Ok(src)) = (op(&ops[0]), op(&ops[1])) {
            if let Operand::Reg16(src) = src {
                return encode_wide_arith(mnemonic, dst, src);
            }
        }
    }

    // `A,` prefix is optional for the unary-looking forms (AND n, etc.) but
    // must name A if present.
    let operand_str = match ops {
        [only] => only,
        [first, second] => {
            match op(first)? {
                Operand::Reg8(Reg8::A) => {}
                _ => return Err(format!("{mnemonic} requires A as its first operand")),
            }
            second
        }
        _ => return Err(format!("{mnemonic} takes one or two operands")),
    };

    match op(operand_str)? {
        Operand::Reg8(r) => {
            if let Some(prefix) = table::index_half_prefix(r) {
                let code = table::index_half_code(r).unwrap();
                Ok(vec![prefix, 0x80 | (alu_code << 3) | code])
            } else {
                let code = table::reg8_code(r).ok_or("invalid register operand")?;
                Ok(vec![0x80 | (alu_code << 3) | code])
            }
        }
        Operand::IndirectHl => Ok(vec![0x80 | (alu_code << 3) | 6]),
        Operand::IndirectIndexed { index, disp } => {
            let prefix = if index == Reg16::Ix { 0xDD } else { 0xFD };
            let d = ctx.disp(&disp)?;
            Ok(vec![prefix, 0x80 | (alu_code << 3) | 6, d])
        }
        Operand::Immediate(e) => {
            let n = ctx.imm8(&e)?;
            Ok(vec![0xC6 | (alu_code << 3), n])
        }
        _ => Err(format!("invalid operand for {mnemonic}")),
    }
}

fn encode_wide_arith(mnemonic: &str, dst: Reg16, src: Reg16) -> Result<Vec<u8>, String> {
    match (mnemonic, dst) {
        ("ADD", Reg16::Hl) => {
            let p = table::pair_code_sp(src).ok_or("invalid pair for ADD HL,ss")?;
            Ok(vec![0x09 | (p << 4)])
        }
        ("ADD", Reg16::Ix) => {
            let p = match src {
                Reg16::Bc => 0,
                Reg16::De => 1,
                Reg16::Ix => 2,
                Reg16::Sp => 3,
                _ => return Err("invalid pair for ADD IX,pp".to_string()),
            };
            Ok(vec![0xDD, 0x09 | (p << 4)])
        }
        ("ADD", Reg16::Iy) => {
            let p = match src {
                Reg16::Bc => 0,
                Reg16::De => 1,
                Reg16::Iy => 2,
                Reg16::Sp => 3,
                _ => return Err("invalid pair for ADD IY,rr".to_string()),
            };
            Ok(vec![0xFD, 0x09 | (p << 4)])
        }
        ("ADC", Reg16::Hl) => {
            let p = table::pair_code_sp(src).ok_or("invalid pair for ADC HL,ss")?;
            Ok(vec![0xED, 0x4A | (p << 4)])
        }
        ("SBC", Reg16::Hl) => {
            let p = table::pair_code_sp(src).ok_or("invalid pair for SBC HL,ss")?;
            Ok(vec![0xED, 0x42 | (p << 4)])
        }
        _ => Err(format!("{mnemonic} has no 16-bit register-pair form for this destination")),
    }
}

fn encode_ld(ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    if ops.len() != 2 {
        return Err("LD takes exactly two operands".to_string());
    }
    let dst = op(&ops[0])?;
    let src = op(&ops[1])?;

    match (&dst, &src) {
        // 8-bit register/(HL)/(IX+d)/(IY+d) <-> 8-bit register/(HL)/(IX+d)/(IY+d)
        (Operand::Reg8(d), Operand::Reg8(s)) => {
            if let Some(prefix) = table::index_half_prefix(*d).or_else(|| table::index_half_prefix(*s)) {
                let dc = table::index_half_code(*d).or_else(|| table::reg8_code(*d)).ok_or("invalid LD register")?;
                let sc = table::index_half_code(*s).or_else(|| table::reg8_code(*s)).ok_or("invalid LD register")?;
                return Ok(vec![prefix, 0x40 | (dc << 3) | sc]);
            }
            let dc = table::reg8_code(*d).ok_or("invalid LD destination register")?;
            let sc = table::reg8_code(*s).ok_or("invalid LD source register")?;
            Ok(vec![0x40 | (dc << 3) | sc])
        }
        (Operand::Reg8(d), Operand::IndirectHl) => {
            let dc = table::reg8_code(*d).ok_or("invalid LD destination register")?;
            Ok(vec![0x40 | (dc << 3) | 6])
        }
        (Operand::IndirectHl, Operand::Reg8(s)) => {
            let sc = table::reg8_code(*s).ok_or("invalid LD source register")?;
            Ok(vec![0x40 | (6 << 3) | sc])
        }
        (Operand::Reg8(d), Operand::IndirectIndexed { index, disp }) => {
            let prefix = if *index == Reg16::Ix { 0xDD } else { 0xFD };
            let dc = table::reg8_code(*d).ok_or("invalid LD destination register")?;
            let db = ctx.disp(disp)?;
            Ok(vec![prefix, 0x40 | (dc << 3) | 6, db])
        }
        (Operand::IndirectIndexed { index, disp }, Operand::Reg8(s)) => {
            let prefix = if *index == Reg16::Ix { 0xDD } else { 0xFD };
            let sc = table::reg8_code(*s).ok_or("invalid LD source register")?;
            let db = ctx.disp(disp)?;
            Ok(vec![prefix, 0x40 | (6 << 3) | sc, db])
        }
        (Operand::IndirectHl, Operand::Immediate(e)) => {
            let n = ctx.imm8(e)?;
            Ok(vec![0x36, n])
        }
        (Operand::IndirectIndexed { index, disp }, Operand::Immediate(e)) => {
            let prefix = if *index == Reg16::Ix { 0xDD } else { 0xFD };
            let db = ctx.disp(disp)?;
            let n = ctx.imm8(e)?;
            Ok(vec![prefix, 0x36, db, n])
        }
        (Operand::Reg8(d), Operand::Immediate(e)) => {
            if let Some(prefix) = table::index_half_prefix(*d) {
                let code = table::index_half_code(*d).unwrap();
                let n = ctx.imm8(e)?;
                return Ok(vec![prefix, 0x06 | (code << 3), n]);
            }
            let code = table::reg8_code(*d).ok_or("invalid LD destination register")?;
            let n = ctx.imm8(e)?;
            Ok(vec![0x06 | (code << 3), n])
        }
        // A <-> (BC)/(DE)/(nn), I, R
        (Operand::Reg8(Reg8::A), Operand::IndirectReg16(Reg16::Bc)) => Ok(vec![0x0A]),
        (Operand::Reg8(Reg8::A), Operand::IndirectReg16(Reg16::De)) => Ok(vec![0x1A]),
        (Operand::IndirectReg16(Reg16::Bc), Operand::Reg8(Reg8::A)) => Ok(vec![0x02]),
        (Operand::IndirectReg16(Reg16::De), Operand::Reg8(Reg8::A)) => Ok(vec![0x12]),
        (Operand::Reg8(Reg8::A), Operand::IndirectImmediate(e)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0x3A, lo, hi])
        }
        (Operand::IndirectImmediate(e), Operand::Reg8(Reg8::A)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0x32, lo, hi])
        }
        (Operand::Reg8(Reg8::A), Operand::Reg8(Reg8::I)) => Ok(vec![0xED, 0x57]),
        (Operand::Reg8(Reg8::A), Operand::Reg8(Reg8::R)) => Ok(vec![0xED, 0x5F]),
        (Operand::Reg8(Reg8::I), Operand::Reg8(Reg8::A)) => Ok(vec![0xED, 0x47]),
        (Operand::Reg8(Reg8::R), Operand::Reg8(Reg8::A)) => Ok(vec![0xED, 0x4F]),
        // 16-bit immediate loads
        (Operand::Reg16(Reg16::Ix), Operand::Immediate(e)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0xDD, 0x21, lo, hi])
        }
        (Operand::Reg16(Reg16::Iy), Operand::Immediate(e)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0xFD, 0x21, lo, hi])
        }
        (Operand::Reg16(r), Operand::Immediate(e)) => {
            let p = table::pair_code_sp(*r).ok_or("invalid 16-bit LD destination")?;
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0x01 | (p << 4), lo, hi])
        }
        // HL/IX/IY <-> (nn)
        (Operand::Reg16(Reg16::Hl), Operand::IndirectImmediate(e)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0x2A, lo, hi])
        }
        (Operand::IndirectImmediate(e), Operand::Reg16(Reg16::Hl)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0x22, lo, hi])
        }
        (Operand::Reg16(Reg16::Ix), Operand::IndirectImmediate(e)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0xDD, 0x2A, lo, hi])
        }
        (Operand::IndirectImmediate(e), Operand::Reg16(Reg16::Ix)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0xDD, 0x22, lo, hi])
        }
        (Operand::Reg16(Reg16::Iy), Operand::IndirectImmediate(e)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0xFD, 0x2A, lo, hi])
        }
        (Operand::IndirectImmediate(e), Operand::Reg16(Reg16::Iy)) => {
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0xFD, 0x22, lo, hi])
        }
        (Operand::Reg16(r), Operand::IndirectImmediate(e)) => {
            let p = table::pair_code_sp(*r).ok_or("invalid 16-bit LD destination")?;
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0xED, 0x4B | (p << 4), lo, hi])
        }
        (Operand::IndirectImmediate(e), Operand::Reg16(r)) => {
            let p = table::pair_code_sp(*r).ok_or("invalid 16-bit LD source")?;
            let (lo, hi) = ctx.imm16(e)?;
            Ok(vec![0xED, 0x43 | (p << 4), lo, hi])
        }
        // SP <- HL/IX/IY
        (Operand::Reg16(Reg16::Sp), Operand::Reg16(Reg16::Hl)) => Ok(vec![0xF9]),
        (Operand::Reg16(Reg16::Sp), Operand::Reg16(Reg16::Ix)) => Ok(vec![0xDD, 0xF9]),
        (Operand::Reg16(Reg16::Sp), Operand::Reg16(Reg16::Iy)) => Ok(vec![0xFD, 0xF9]),
        _ => Err("unsupported LD operand combination".to_string()),
    }
}

fn encode_jp(ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    match ops.len() {
        1 => match op(&ops[0])? {
            Operand::IndirectHl => Ok(vec![0xE9]),
            Operand::IndirectIndexed { index: Reg16::Ix, disp: Expr::Number(0) } => Ok(vec![0xDD, 0xE9]),
            Operand::IndirectIndexed { index: Reg16::Iy, disp: Expr::Number(0) } => Ok(vec![0xFD, 0xE9]),
            _ => {
                let e = Expr::parse(&ops[0]).ok_or("JP target is not a valid expression")?;
                let (lo, hi) = ctx.imm16(&e)?;
                Ok(vec![0xC3, lo, hi])
            }
        },
        2 => {
            let cond = operand::parse_condition(&ops[0]).ok_or("JP with two operands requires a condition first")?;
            let e = Expr::parse(&ops[1]).ok_or("JP target is not a valid expression")?;
            let (lo, hi) = ctx.imm16(&e)?;
            Ok(vec![0xC2 | (table::condition_code(cond) << 3), lo, hi])
        }
        _ => Err("JP takes one or two operands".to_string()),
    }
}

fn encode_jr(ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    match ops.len() {
        1 => {
            let e = Expr::parse(&ops[0]).ok_or("JR target is not a valid expression")?;
            let d = ctx.rel8(&e, 2)?;
            Ok(vec![0x18, d])
        }
        2 => {
            let cond = operand::parse_condition(&ops[0]).ok_or("JR with two operands requires a condition first")?;
            let code = match cond {
                Condition::Nz => 0,
                Condition::Z => 1,
                Condition::Nc => 2,
                Condition::C => 3,
                _ => return Err("JR only supports NZ/Z/NC/C conditions".to_string()),
            };
            let e = Expr::parse(&ops[1]).ok_or("JR target is not a valid expression")?;
            let d = ctx.rel8(&e, 2)?;
            Ok(vec![0x20 | (code << 3), d])
        }
        _ => Err("JR takes one or two operands".to_string()),
    }
}

fn encode_call(ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    match ops.len() {
        1 => {
            let e = Expr::parse(&ops[0]).ok_or("CALL target is not a valid expression")?;
            let (lo, hi) = ctx.imm16(&e)?;
            Ok(vec![0xCD, lo, hi])
        }
        2 => {
            let cond =
                operand::parse_condition(&ops[0]).ok_or("CALL with two operands requires a condition first")?;
            let e = Expr::parse(&ops[1]).ok_or("CALL target is not a valid expression")?;
            let (lo, hi) = ctx.imm16(&e)?;
            Ok(vec![0xC4 | (table::condition_code(cond) << 3), lo, hi])
        }
        _ => Err("CALL takes one or two operands".to_string()),
    }
}

fn encode_in(ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    if ops.len() != 2 {
        return Err("IN takes exactly two operands".to_string());
    }
    match (op(&ops[0])?, op(&ops[1])?) {
        (Operand::Reg8(Reg8::A), Operand::IndirectImmediate(e)) => {
            let n = ctx.imm8(&e)?;
            Ok(vec![0xDB, n])
        }
        (Operand::Reg8(r), Operand::IndirectC) => {
            let code = table::reg8_code(r).ok_or("invalid register for IN r,(C)")?;
            Ok(vec![0xED, 0x40 | (code << 3)])
        }
        _ => Err("unsupported IN operand combination".to_string()),
    }
}

fn encode_out(ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    if ops.len() != 2 {
        return Err("OUT takes exactly two operands".to_string());
    }
    match (op(&ops[0])?, op(&ops[1])?) {
        (Operand::IndirectImmediate(e), Operand::Reg8(Reg8::A)) => {
            let n = ctx.imm8(&e)?;
            Ok(vec![0xD3, n])
        }
        (Operand::IndirectC, Operand::Reg8(r)) => {
            let code = table::reg8_code(r).ok_or("invalid register for OUT (C),r")?;
            Ok(vec![0xED, 0x41 | (code << 3)])
        }
        _ => Err("unsupported OUT operand combination".to_string()),
    }
}

fn encode_cb_rotate(base: u8, ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    if ops.len() != 1 {
        return Err("expects exactly one operand".to_string());
    }
    match op(&ops[0])? {
        Operand::Reg8(r) => {
            let code = table::reg8_code(r).ok_or("invalid register for rotate/shift")?;
            Ok(vec![0xCB, base | code])
        }
        Operand::IndirectHl => Ok(vec![0xCB, base | 6]),
        Operand::IndirectIndexed { index, disp } => {
            let prefix = if index == Reg16::Ix { 0xDD } else { 0xFD };
            let d = ctx.disp(&disp)?;
            Ok(vec![prefix, 0xCB, d, base | 6])
        }
        _ => Err("rotate/shift operand must be a register or memory location".to_string()),
    }
}

fn encode_cb_bit_group(base: u8, ops: &[String], ctx: &EncodeCtx) -> Result<Vec<u8>, String> {
    if ops.len() != 2 {
        return Err("expects exactly two operands: a bit index and a register/memory location".to_string());
    }
    let bit = operand::parse_bit_index(&ops[0]).ok_or("bit index must be 0..7")?;
    match op(&ops[1])? {
        Operand::Reg8(r) => {
            let code = table::reg8_code(r).ok_or("invalid register for BIT/SET/RES")?;
            Ok(vec![0xCB, base | (bit << 3) | code])
        }
        Operand::IndirectHl => Ok(vec![0xCB, base | (bit << 3) | 6]),
        Operand::IndirectIndexed { index, disp } => {
            let prefix = if index == Reg16::Ix { 0xDD } else { 0xFD };
            let d = ctx.disp(&disp)?;
            Ok(vec![prefix, 0xCB, d, base | (bit << 3) | 6])
        }
        _ => Err("BIT/SET/RES operand must be a register or memory location".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EncodeCtx<'static> {
        EncodeCtx { here: 0, labels: None }
    }

    #[test]
    fn ld_a_immediate() {
        let v = encode_instruction("LD", &["A".to_string(), "1".to_string()], &ctx()).unwrap();
        assert_eq!(v, vec![0x3E, 0x01]);
    }

    #[test]
    fn jp_immediate() {
        let mut labels = HashMap::new();
        labels.insert("START".to_string(), 0x0000u16 as i64);
        let c = EncodeCtx { here: 2, labels: Some(&labels) };
        let v = encode_instruction("JP", &["START".to_string()], &c).unwrap();
        assert_eq!(v, vec![0xC3, 0x00, 0x00]);
    }

    #[test]
    fn push_pop_pairs() {
        assert_eq!(encode_instruction("PUSH", &["BC".to_string()], &ctx()).unwrap(), vec![0xC5]);
        assert_eq!(encode_instruction("POP", &["AF".to_string()], &ctx()).unwrap(), vec![0xF1]);
    }

    #[test]
    fn bit_set_res() {
        assert_eq!(encode_instruction("BIT", &["3".to_string(), "B".to_string()], &ctx()).unwrap(), vec![0xCB, 0x58]);
        assert_eq!(encode_instruction("SET", &["0".to_string(), "(HL)".to_string()], &ctx()).unwrap(), vec![
            0xCB, 0xC6
        ]);
    }
}
