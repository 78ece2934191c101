//! A cycle-accurate Zilog Z80 CPU core: decode and execution for the base,
//! CB, ED, DD, FD, DDCB, and FDCB opcode spaces, driven one T-state at a
//! time through [`g815_core::Cpu`].

mod alu;
mod cpu;
mod flags;
mod microcode;
mod registers;
mod timing;

pub use cpu::Z80;
#[cfg(feature = "snapshot")]
pub use cpu::CpuState;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use microcode::MicroOp;
pub use registers::Registers;
pub use timing::Space;
