//! Persisted runtime state, for saving and restoring a BASIC session
//! across machine snapshots. Deliberately scoped to program text,
//! variable/array state, and pending I/O: a suspended program's
//! control-flow stacks (FOR/GOSUB/REPEAT/WHILE, the active program
//! counter) are not persisted, so a snapshot taken mid-RUN restores to
//! the program stopped rather than mid-loop. Saving outside a RUN (the
//! monitor prompt, or between runs) round-trips exactly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::adapter::MachineAdapter;
use crate::ast::Value;
use crate::program::Program;
use crate::runtime::Runtime;
use crate::vars::ArrayStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PersistedValue {
    Number { value: f64 },
    String { value: String },
}

impl From<&Value> for PersistedValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Number(n) => PersistedValue::Number { value: *n },
            Value::Str(s) => PersistedValue::String { value: s.clone() },
        }
    }
}

impl From<PersistedValue> for Value {
    fn from(v: PersistedValue) -> Self {
        match v {
            PersistedValue::Number { value } => Value::Number(value),
            PersistedValue::String { value } => Value::Str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PersistedArray {
    Number { dimensions: Vec<usize>, data: Vec<f64> },
    String { dimensions: Vec<usize>, length: usize, data: Vec<String> },
}

impl From<&ArrayStore> for PersistedArray {
    fn from(a: &ArrayStore) -> Self {
        if let Some(data) = a.numeric_data() {
            PersistedArray::Number { dimensions: a.dims().to_vec(), data: data.to_vec() }
        } else {
            let (data, length) = a.string_data().expect("array is either numeric or string");
            PersistedArray::String { dimensions: a.dims().to_vec(), length, data: data.to_vec() }
        }
    }
}

impl From<PersistedArray> for ArrayStore {
    fn from(a: PersistedArray) -> Self {
        match a {
            PersistedArray::Number { dimensions, data } => ArrayStore::from_numeric(dimensions, data),
            PersistedArray::String { dimensions, length, data } => {
                ArrayStore::from_string(dimensions, length, data)
            }
        }
    }
}

/// Everything needed to resume a BASIC session that is not mid-RUN:
/// the program listing, all scalar and array state, and any output or
/// pending input still sitting in the runtime's FIFOs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub program_lines: Vec<(u32, String)>,
    pub scalars: HashMap<String, PersistedValue>,
    pub arrays: HashMap<String, PersistedArray>,
    pub output: Vec<u8>,
    pub pending_input: Option<String>,
    pub waiting_input: Option<Vec<String>>,
    pub profile_id: String,
}

impl RuntimeSnapshot {
    #[must_use]
    pub fn capture<A: MachineAdapter>(rt: &Runtime<A>, profile_id: impl Into<String>) -> Self {
        let scalars = rt.vars.scalars().iter().map(|(k, v)| (k.clone(), PersistedValue::from(v))).collect();
        let arrays = rt.vars.arrays().iter().map(|(k, v)| (k.clone(), PersistedArray::from(v))).collect();
        Self {
            program_lines: rt.program.source_lines(),
            scalars,
            arrays,
            output: rt.peek_output(),
            pending_input: rt.pending_input().map(str::to_string),
            waiting_input: rt.waiting_input_vars(),
            profile_id: profile_id.into(),
        }
    }

    /// Rebuild `rt`'s program, variables, and I/O FIFOs from this
    /// snapshot. Any program currently running in `rt` is abandoned.
    pub fn restore_into<A: MachineAdapter>(self, rt: &mut Runtime<A>) -> crate::errors::BasicResult<()> {
        rt.cancel();

        let mut program = Program::new();
        program.restore_source_lines(&self.program_lines)?;
        rt.program = program;

        let scalars: HashMap<String, Value> =
            self.scalars.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
        let arrays: HashMap<String, ArrayStore> =
            self.arrays.into_iter().map(|(k, v)| (k, ArrayStore::from(v))).collect();
        rt.vars.restore(scalars, arrays);

        rt.set_output(self.output);
        rt.set_pending_input(self.pending_input);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::NullAdapter;

    #[test]
    fn round_trips_program_and_variables() {
        let mut rt: Runtime<NullAdapter> = Runtime::new(NullAdapter);
        rt.submit_line("10 PRINT \"HI\"");
        rt.submit_line("LET A=5");
        rt.submit_line("DIM B(3)");

        let snap = RuntimeSnapshot::capture(&rt, "pcg815-default");
        assert_eq!(snap.program_lines, vec![(10, "PRINT \"HI\"".to_string())]);
        assert_eq!(snap.scalars.get("A"), Some(&PersistedValue::Number { value: 5.0 }));

        let mut restored: Runtime<NullAdapter> = Runtime::new(NullAdapter);
        snap.restore_into(&mut restored).unwrap();
        assert_eq!(restored.program.listing(None), vec!["10 PRINT \"HI\"".to_string()]);
        assert_eq!(restored.vars.get_scalar("A"), Value::Number(5.0));
    }
}
