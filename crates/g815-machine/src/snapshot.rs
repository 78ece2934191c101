//! A full machine snapshot: CPU registers and pending-interrupt state,
//! the RAM image, and the BASIC runtime's persisted program/variable/I-O
//! state, gated behind the `snapshot` cargo feature the same way the
//! three component crates gate their own state-export support.

use serde::{Deserialize, Serialize};

use g815_basic::RuntimeSnapshot;
use zilog_z80::CpuState;

use crate::Machine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub cpu: CpuState,
    pub ram: Vec<u8>,
    pub basic: RuntimeSnapshot,
}

impl MachineSnapshot {
    #[must_use]
    pub fn capture(machine: &Machine, profile_id: impl Into<String>) -> Self {
        Self {
            cpu: machine.cpu.get_state(),
            ram: machine.memory.ram_snapshot(),
            basic: RuntimeSnapshot::capture(&machine.basic, profile_id),
        }
    }

    /// Restore CPU, RAM, and BASIC state into `machine`. Any BASIC
    /// program currently running in `machine` is abandoned, same as
    /// `RuntimeSnapshot::restore_into` on its own.
    pub fn restore_into(self, machine: &mut Machine) -> g815_basic::BasicResult<()> {
        machine.cpu.load_state(self.cpu);
        machine.memory.load_ram_snapshot(&self.ram);
        self.basic.restore_into(&mut machine.basic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;

    #[test]
    fn round_trips_ram_and_cpu_registers() {
        let mut m = Machine::new(MachineConfig::default());
        m.load_program(&[0x3E, 0x7], 0x8000);
        m.set_program_counter(0x8000);
        m.tick(7);

        let snap = MachineSnapshot::capture(&m, "pcg815-default");

        let mut restored = Machine::new(MachineConfig::default());
        snap.restore_into(&mut restored).unwrap();
        assert_eq!(restored.get_cpu_state().a, 7);
        assert_eq!(restored.memory.read(0x8000), 0x3E);
    }
}
