//! Bit-field codes shared by the instruction encoder: the register and
//! condition numbering the Z80 opcode maps use (same `xxyyyzzz` shape the
//! CPU core's decoder builds its timing table from).

use crate::operand::{Condition, Reg16, Reg8};

/// 3-bit register code used in the `r`/`r'` fields of most opcodes.
/// `(HL)` shares code 6 with no 8-bit register, handled by the caller.
#[must_use]
pub fn reg8_code(r: Reg8) -> Option<u8> {
    Some(match r {
        Reg8::B => 0,
        Reg8::C => 1,
        Reg8::D => 2,
        Reg8::E => 3,
        Reg8::H => 4,
        Reg8::L => 5,
        Reg8::A => 7,
        Reg8::I | Reg8::R | Reg8::IxH | Reg8::IxL | Reg8::IyH | Reg8::IyL => return None,
    })
}

/// `ss`/`dd` 16-bit pair code: BC=0, DE=1, HL=2, SP=3.
#[must_use]
pub fn pair_code_sp(r: Reg16) -> Option<u8> {
    Some(match r {
        Reg16::Bc => 0,
        Reg16::De => 1,
        Reg16::Hl | Reg16::Ix | Reg16::Iy => 2,
        Reg16::Sp => 3,
        Reg16::Af | Reg16::AfShadow => return None,
    })
}

/// `qq` pair code used by `PUSH`/`POP`: BC=0, DE=1, HL=2, AF=3.
#[must_use]
pub fn pair_code_af(r: Reg16) -> Option<u8> {
    Some(match r {
        Reg16::Bc => 0,
        Reg16::De => 1,
        Reg16::Hl | Reg16::Ix | Reg16::Iy => 2,
        Reg16::Af => 3,
        Reg16::Sp | Reg16::AfShadow => return None,
    })
}

#[must_use]
pub fn condition_code(c: Condition) -> u8 {
    match c {
        Condition::Nz => 0,
        Condition::Z => 1,
        Condition::Nc => 2,
        Condition::C => 3,
        Condition::Po => 4,
        Condition::Pe => 5,
        Condition::P => 6,
        Condition::M => 7,
    }
}

/// Whether `r` is one of the IX/IY half-registers introduced by a DD/FD
/// prefix, and which prefix byte it requires.
#[must_use]
pub fn index_half_prefix(r: Reg8) -> Option<u8> {
    match r {
        Reg8::IxH | Reg8::IxL => Some(0xDD),
        Reg8::IyH | Reg8::IyL => Some(0xFD),
        _ => None,
    }
}

/// The base-space register code an indexed half-register aliases (H for
/// the high half, L for the low half), for use once the DD/FD prefix has
/// already been emitted.
#[must_use]
pub fn index_half_code(r: Reg8) -> Option<u8> {
    match r {
        Reg8::IxH | Reg8::IyH => Some(4),
        Reg8::IxL | Reg8::IyL => Some(5),
        _ => None,
    }
}
