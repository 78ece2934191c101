//! Composes the Z80 CPU core, a flat memory map, the keyboard/LCD
//! peripheral chipset, and the BASIC runtime into a single ticking
//! PC-G815 machine.
//!
//! The CPU-facing bus and the BASIC-facing adapter are both thin views
//! borrowing [`Machine`]'s memory and peripherals for the duration of one
//! call; neither is stored long-term, so composing three components that
//! all want to reach the same memory needs no interior mutability.

mod adapter;
mod bus;
mod config;
mod machine;
mod memory;
mod peripherals;

#[cfg(feature = "snapshot")]
mod snapshot;

pub use adapter::BasicAdapter;
pub use bus::G815Bus;
pub use config::MachineConfig;
pub use machine::{BootState, Machine};
pub use memory::Memory;
pub use peripherals::{KeyMatrix, LcdText, Peripherals};

#[cfg(feature = "snapshot")]
pub use snapshot::MachineSnapshot;
