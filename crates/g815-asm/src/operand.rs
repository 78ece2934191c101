//! Operand shapes: every Z80 addressing mode the instruction table needs
//! to distinguish between.

use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    I,
    R,
    IxH,
    IxL,
    IyH,
    IyL,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    Bc,
    De,
    Hl,
    Sp,
    Af,
    AfShadow,
    Ix,
    Iy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Nz,
    Z,
    Nc,
    C,
    Po,
    Pe,
    P,
    M,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg8(Reg8),
    Reg16(Reg16),
    /// `(HL)`.
    IndirectHl,
    /// `(BC)` / `(DE)`, valid only for `LD A,(BC|DE)` and the reverse.
    IndirectReg16(Reg16),
    /// `(IX+d)` / `(IY+d)`.
    IndirectIndexed { index: Reg16, disp: Expr },
    /// `(nn)`.
    IndirectImmediate(Expr),
    /// `(C)`, the `IN`/`OUT` variable-port form.
    IndirectC,
    Immediate(Expr),
    Condition(Condition),
    /// A literal `0..7` bit index for `BIT`/`SET`/`RES`.
    BitIndex(u8),
}

#[must_use]
pub fn parse_operand(raw: &str) -> Option<Operand> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(reg) = parse_reg8(s) {
        return Some(Operand::Reg8(reg));
    }
    if let Some(reg) = parse_reg16(s) {
        return Some(Operand::Reg16(reg));
    }
    if s.eq_ignore_ascii_case("(hl)") {
        return Some(Operand::IndirectHl);
    }
    if s.eq_ignore_ascii_case("(bc)") {
        return Some(Operand::IndirectReg16(Reg16::Bc));
    }
    if s.eq_ignore_ascii_case("(de)") {
        return Some(Operand::IndirectReg16(Reg16::De));
    }
    if s.eq_ignore_ascii_case("(sp)") {
        return Some(Operand::IndirectReg16(Reg16::Sp));
    }
    if s.eq_ignore_ascii_case("(c)") {
        return Some(Operand::IndirectC);
    }
    if s.starts_with('(') && s.ends_with(')') {
        let inner = &s[1..s.len() - 1];
        if let Some((index, disp)) = parse_indexed(inner) {
            return Some(Operand::IndirectIndexed { index, disp });
        }
        return Expr::parse(inner.trim()).map(Operand::IndirectImmediate);
    }
    Expr::parse(s).map(Operand::Immediate)
}

/// A second interpretation used only by `BIT n,...` / `SET n,...` /
/// `RES n,...`, where the first operand is always a bit index 0..7.
#[must_use]
pub fn parse_bit_index(raw: &str) -> Option<u8> {
    let n: u8 = raw.trim().parse().ok()?;
    (n <= 7).then_some(n)
}

fn parse_reg8(s: &str) -> Option<Reg8> {
    Some(match s.to_ascii_uppercase().as_str() {
        "A" => Reg8::A,
        "B" => Reg8::B,
        "C" => Reg8::C,
        "D" => Reg8::D,
        "E" => Reg8::E,
        "H" => Reg8::H,
        "L" => Reg8::L,
        "I" => Reg8::I,
        "R" => Reg8::R,
        "IXH" => Reg8::IxH,
        "IXL" => Reg8::IxL,
        "IYH" => Reg8::IyH,
        "IYL" => Reg8::IyL,
        _ => return None,
    })
}

fn parse_reg16(s: &str) -> Option<Reg16> {
    Some(match s.to_ascii_uppercase().as_str() {
        "BC" => Reg16::Bc,
        "DE" => Reg16::De,
        "HL" => Reg16::Hl,
        "SP" => Reg16::Sp,
        "AF" => Reg16::Af,
        "AF'" => Reg16::AfShadow,
        "IX" => Reg16::Ix,
        "IY" => Reg16::Iy,
        _ => return None,
    })
}

/// Exposed separately from `parse_operand` because `C` is ambiguous between
/// the 8-bit register and the carry condition; mnemonics where a condition
/// is grammatically possible (`JP`/`JR`/`CALL`/`RET`) resolve that ambiguity
/// themselves by trying this first.
#[must_use]
pub fn parse_condition(s: &str) -> Option<Condition> {
    Some(match s.to_ascii_uppercase().as_str() {
        "NZ" => Condition::Nz,
        "Z" => Condition::Z,
        "NC" => Condition::Nc,
        "C" => Condition::C,
        "PO" => Condition::Po,
        "PE" => Condition::Pe,
        "P" => Condition::P,
        "M" => Condition::M,
        _ => return None,
    })
}

fn parse_indexed(inner: &str) -> Option<(Reg16, Expr)> {
    let inner = inner.trim();
    for (prefix, reg) in [("IX", Reg16::Ix), ("IY", Reg16::Iy)] {
        if let Some(rest) = inner.strip_prefix(prefix).or_else(|| inner.strip_prefix(&prefix.to_ascii_lowercase())) {
            let rest = rest.trim();
            if rest.is_empty() {
                return Some((reg, Expr::Number(0)));
            }
            let (sign, digits) = if let Some(d) = rest.strip_prefix('+') {
                (1, d)
            } else if let Some(d) = rest.strip_prefix('-') {
                (-1, d)
            } else {
                return None;
            };
            let value = Expr::parse(digits.trim())?;
            let signed = match value {
                Expr::Number(n) => Expr::Number(sign * n),
                other => other,
            };
            return Some((reg, signed));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_registers_and_pairs() {
        assert_eq!(parse_operand("A"), Some(Operand::Reg8(Reg8::A)));
        assert_eq!(parse_operand("hl"), Some(Operand::Reg16(Reg16::Hl)));
        assert_eq!(parse_operand("(HL)"), Some(Operand::IndirectHl));
        assert_eq!(parse_operand("(sp)"), Some(Operand::IndirectReg16(Reg16::Sp)));
    }

    #[test]
    fn recognizes_indexed_indirect_with_sign() {
        assert_eq!(
            parse_operand("(IX+5)"),
            Some(Operand::IndirectIndexed { index: Reg16::Ix, disp: Expr::Number(5) })
        );
        assert_eq!(
            parse_operand("(IY-2)"),
            Some(Operand::IndirectIndexed { index: Reg16::Iy, disp: Expr::Number(-2) })
        );
    }

    #[test]
    fn condition_codes_are_resolved_separately_from_plain_operands() {
        assert_eq!(parse_condition("NZ"), Some(Condition::Nz));
        assert_eq!(parse_operand("START"), Some(Operand::Immediate(Expr::Label("START".to_string()))));
    }
}
