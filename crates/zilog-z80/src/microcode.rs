//! The per-T-state micro-op queue drained by [`crate::Z80::tick`].
//!
//! An instruction's bus effects (fetch, memory/IO reads and writes) are all
//! carried out as soon as the queue is empty and a new opcode is decoded;
//! what gets queued afterwards is the *remaining* T-state budget for that
//! instruction so that `tick()` still returns control to the caller one
//! T-state at a time, matching the external step-granularity contract.

/// One T-state's worth of CPU activity, exposed for instrumentation and for
/// the `current_micro_op`/`t_state` test-utilities used by integration
/// tests that need to find instruction boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// The opcode-fetch read (M1+MREQ+RD).
    FetchOpcode,
    /// The refresh half of the M1 cycle (M1+MREQ+RFSH); R has already bumped.
    FetchRefresh,
    /// Any other T-state spent finishing the current instruction (memory
    /// access completion, ALU settle time, interrupt-response idle states).
    Internal,
}
