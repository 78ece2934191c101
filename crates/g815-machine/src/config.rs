//! Construction-time configuration for a [`crate::Machine`].
//!
//! Constructed programmatically by the embedding host — no environment-
//! variable or file-based config loader.

pub struct MachineConfig {
    /// Monitor ROM bootstrap image, overlaid at `[0, rom.len())`.
    pub rom: Vec<u8>,
    /// Total addressable RAM; lets tests shrink the address space without
    /// shrinking the real device's 64 KiB.
    pub ram_size: usize,
    /// Default for the CPU's unsupported-opcode strictness.
    pub strict_opcodes: bool,
    /// Statement-step ceiling the BASIC runtime treats as a runaway program.
    pub runaway_limit: u32,
    /// Milliseconds the T-state counter may go without advancing before
    /// the host's boot state machine declares the machine STALLED.
    pub wait_timeout_ms: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self { rom: Vec::new(), ram_size: 0x1_0000, strict_opcodes: false, runaway_limit: 50_000, wait_timeout_ms: 250 }
    }
}
