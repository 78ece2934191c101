//! Memory and I/O bus interface consumed by the CPU.
//!
//! This is the "bus-object" shape from the CPU's public contract: the CPU
//! holds a `&mut dyn Bus` for the duration of one tick and drives it
//! through plain memory/port calls. A pin-level interface would carry the
//! same semantics one signal at a time; this crate only implements the
//! bus-object shape.

/// The kind of bus cycle in progress, passed to [`Bus::wait_states`] so a
/// peripheral can insert extra T-states on the accesses it actually
/// contends (e.g. a shared video fetch), without the CPU needing to know
/// which addresses are contended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Opcode fetch (M1).
    Fetch,
    /// Ordinary memory read.
    MemRead,
    /// Ordinary memory write.
    MemWrite,
    /// I/O port read.
    IoRead,
    /// I/O port write.
    IoWrite,
    /// Interrupt-acknowledge cycle (M1 + IORQ).
    IntAck,
}

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate device; writes
/// to read-only regions and reads from unmapped ports are the bus's
/// concern, not the CPU's.
pub trait Bus {
    /// Read a byte from the given address.
    fn read8(&mut self, addr: u16) -> u8;

    /// Write a byte to the given address. Implementations must silently
    /// drop writes to read-only regions.
    fn write8(&mut self, addr: u16, value: u8);

    /// Read a byte from the given I/O port.
    fn in8(&mut self, port: u16) -> u8;

    /// Write a byte to the given I/O port.
    fn out8(&mut self, port: u16, value: u8);

    /// Notified on every opcode-fetch (M1) cycle with the fetch address.
    /// Most buses have nothing to do here; the default is a no-op.
    fn on_m1(&mut self, _pc: u16) {}

    /// Extra T-states to insert for the given cycle kind and address,
    /// modelling a WAIT pin held by a slow peripheral. Honoured only at
    /// the single sample point the CPU defines for that cycle kind; the
    /// default (no contention) returns zero.
    fn wait_states(&mut self, _addr: u16, _kind: CycleKind) -> u8 {
        0
    }
}
