//! Core traits and types shared across the PC-G815 emulator.
//!
//! Every component — CPU, bus, peripherals, BASIC runtime — is driven in
//! discrete steps from the host. Nothing here spawns a thread or blocks.

mod bus;
mod cpu;
mod observable;
mod tickable;
mod ticks;

pub use bus::{Bus, CycleKind};
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use tickable::Tickable;
pub use ticks::Ticks;
