//! Scalar and array variable storage.

use std::collections::HashMap;

use crate::ast::Value;
use crate::errors::{BasicError, BasicResult};

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayStore {
    Numeric { dims: Vec<usize>, data: Vec<f64> },
    Str { dims: Vec<usize>, max_len: usize, data: Vec<String> },
}

impl ArrayStore {
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, ArrayStore::Str { .. })
    }

    #[must_use]
    pub fn dims(&self) -> &[usize] {
        match self {
            ArrayStore::Numeric { dims, .. } | ArrayStore::Str { dims, .. } => dims,
        }
    }

    #[must_use]
    pub fn numeric_data(&self) -> Option<&[f64]> {
        match self {
            ArrayStore::Numeric { data, .. } => Some(data),
            ArrayStore::Str { .. } => None,
        }
    }

    #[must_use]
    pub fn string_data(&self) -> Option<(&[String], usize)> {
        match self {
            ArrayStore::Str { data, max_len, .. } => Some((data, *max_len)),
            ArrayStore::Numeric { .. } => None,
        }
    }

    #[must_use]
    pub fn from_numeric(dims: Vec<usize>, data: Vec<f64>) -> Self {
        ArrayStore::Numeric { dims, data }
    }

    #[must_use]
    pub fn from_string(dims: Vec<usize>, max_len: usize, data: Vec<String>) -> Self {
        ArrayStore::Str { dims, max_len, data }
    }

    fn size(dims: &[usize]) -> usize {
        dims.iter().map(|d| d + 1).product()
    }

    fn index(dims: &[usize], indices: &[usize]) -> BasicResult<usize> {
        if indices.len() != dims.len() {
            return Err(BasicError::subscript_out_of_range());
        }
        let mut idx = 0usize;
        let mut stride = 1usize;
        for (i, dim) in dims.iter().enumerate() {
            let ix = indices[i];
            if ix > *dim {
                return Err(BasicError::subscript_out_of_range());
            }
            idx += ix * stride;
            stride *= dim + 1;
        }
        Ok(idx)
    }
}

/// Variable and array storage for one BASIC runtime. Names ending in `$`
/// are string-typed; everything else is integer, truncated toward zero on
/// assignment.
#[derive(Debug, Clone, Default)]
pub struct VarStore {
    scalars: HashMap<String, Value>,
    arrays: HashMap<String, ArrayStore>,
}

impl VarStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.scalars.clear();
        self.arrays.clear();
    }

    #[must_use]
    pub fn scalars(&self) -> &HashMap<String, Value> {
        &self.scalars
    }

    #[must_use]
    pub fn arrays(&self) -> &HashMap<String, ArrayStore> {
        &self.arrays
    }

    /// Replace all scalar and array state at once, as when restoring a
    /// persisted snapshot.
    pub fn restore(&mut self, scalars: HashMap<String, Value>, arrays: HashMap<String, ArrayStore>) {
        self.scalars = scalars;
        self.arrays = arrays;
    }

    #[must_use]
    pub fn get_scalar(&self, name: &str) -> Value {
        self.scalars.get(name).cloned().unwrap_or_else(|| {
            if name.ends_with('$') {
                Value::Str(String::new())
            } else {
                Value::Number(0.0)
            }
        })
    }

    pub fn set_scalar(&mut self, name: &str, value: Value) -> BasicResult<()> {
        let is_string_name = name.ends_with('$');
        let coerced = match (is_string_name, value) {
            (true, Value::Str(s)) => Value::Str(s),
            (false, Value::Number(n)) => Value::Number(n.trunc()),
            (true, Value::Number(_)) | (false, Value::Str(_)) => {
                return Err(BasicError::type_mismatch())
            }
        };
        self.scalars.insert(name.to_string(), coerced);
        Ok(())
    }

    pub fn dim(&mut self, name: &str, dims: Vec<usize>, str_len: Option<usize>) -> BasicResult<()> {
        if self.arrays.contains_key(name) {
            return Err(BasicError::redimensioned_array());
        }
        let size = ArrayStore::size(&dims);
        let store = if name.ends_with('$') {
            ArrayStore::Str { dims, max_len: str_len.unwrap_or(255), data: vec![String::new(); size] }
        } else {
            ArrayStore::Numeric { dims, data: vec![0.0; size] }
        };
        self.arrays.insert(name.to_string(), store);
        Ok(())
    }

    fn ensure_array(&mut self, name: &str) -> &mut ArrayStore {
        self.arrays.entry(name.to_string()).or_insert_with(|| {
            if name.ends_with('$') {
                ArrayStore::Str { dims: vec![10], max_len: 255, data: vec![String::new(); 11] }
            } else {
                ArrayStore::Numeric { dims: vec![10], data: vec![0.0; 11] }
            }
        })
    }

    pub fn get_array_elem(&mut self, name: &str, indices: &[usize]) -> BasicResult<Value> {
        match self.ensure_array(name) {
            ArrayStore::Numeric { dims, data } => {
                let idx = ArrayStore::index(dims, indices)?;
                Ok(Value::Number(data[idx]))
            }
            ArrayStore::Str { dims, data, .. } => {
                let idx = ArrayStore::index(dims, indices)?;
                Ok(Value::Str(data[idx].clone()))
            }
        }
    }

    pub fn set_array_elem(&mut self, name: &str, indices: &[usize], value: Value) -> BasicResult<()> {
        match self.ensure_array(name) {
            ArrayStore::Numeric { dims, data } => {
                let idx = ArrayStore::index(dims, indices)?;
                data[idx] = value.as_number().trunc();
                Ok(())
            }
            ArrayStore::Str { dims, max_len, data } => {
                let idx = ArrayStore::index(dims, indices)?;
                let Value::Str(s) = value else { return Err(BasicError::type_mismatch()) };
                let truncated: String = s.chars().take(*max_len).collect();
                data[idx] = truncated;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let mut v = VarStore::new();
        v.set_scalar("A", Value::Number(20.7)).unwrap();
        assert_eq!(v.get_scalar("A"), Value::Number(20.0));
    }

    #[test]
    fn array_bounds() {
        let mut v = VarStore::new();
        v.dim("B", vec![3], None).unwrap();
        v.set_array_elem("B", &[3], Value::Number(5.0)).unwrap();
        assert_eq!(v.get_array_elem("B", &[3]).unwrap(), Value::Number(5.0));
        assert!(v.get_array_elem("B", &[4]).is_err());
    }
}
