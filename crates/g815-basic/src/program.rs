//! The numbered-line program store, label table, and DATA pool.

use std::collections::BTreeMap;

use crate::ast::{LineRef, ParsedLine, Stmt, Value};
use crate::errors::{BasicError, BasicResult};
use crate::parser::parse_line;

#[derive(Debug, Clone, Default)]
pub struct Program {
    lines: BTreeMap<u32, ParsedLine>,
    /// The trimmed source text of each line (sans line number), kept
    /// alongside the parsed form so LIST and snapshots can reproduce real,
    /// reparseable BASIC rather than a debug rendering of the AST.
    source: BTreeMap<u32, String>,
    labels: BTreeMap<String, u32>,
}

impl Program {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.source.clear();
        self.labels.clear();
    }

    /// Insert, replace, or (if the body is empty) delete a numbered line.
    pub fn store_line(&mut self, number: u32, source: &str) -> BasicResult<()> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            self.lines.remove(&number);
            self.source.remove(&number);
            self.labels.retain(|_, n| *n != number);
            return Ok(());
        }
        let parsed = parse_line(&format!("{number} {trimmed}"))?;
        if let Some(label) = &parsed.label {
            self.labels.insert(label.clone(), number);
        }
        self.lines.insert(number, parsed);
        self.source.insert(number, trimmed.to_string());
        Ok(())
    }

    #[must_use]
    pub fn lines(&self) -> &BTreeMap<u32, ParsedLine> {
        &self.lines
    }

    #[must_use]
    pub fn first_line(&self) -> Option<u32> {
        self.lines.keys().next().copied()
    }

    #[must_use]
    pub fn next_line_after(&self, number: u32) -> Option<u32> {
        self.lines.range((std::ops::Bound::Excluded(number), std::ops::Bound::Unbounded)).next().map(|(n, _)| *n)
    }

    pub fn resolve(&self, target: &LineRef) -> BasicResult<u32> {
        match target {
            LineRef::Line(n) => {
                if self.lines.contains_key(n) {
                    Ok(*n)
                } else {
                    Err(BasicError::no_line(n))
                }
            }
            LineRef::Label(name) => {
                self.labels.get(name).copied().ok_or_else(|| BasicError::no_line(format!("*{name}")))
            }
        }
    }

    /// Build the DATA pool by walking lines in numeric order, collecting
    /// every DATA value, and recording a per-line starting cursor so
    /// `RESTORE <line>` can seek to the first item at or beyond it.
    #[must_use]
    pub fn build_data_pool(&self) -> DataPool {
        let mut values = Vec::new();
        let mut line_cursor = BTreeMap::new();
        for (number, line) in &self.lines {
            line_cursor.insert(*number, values.len());
            for stmt in &line.statements {
                if let Stmt::Data(items) = stmt {
                    values.extend(items.iter().cloned());
                }
            }
        }
        DataPool { values, line_cursor, pos: 0 }
    }

    #[must_use]
    pub fn listing(&self, from: Option<u32>) -> Vec<String> {
        let start = from.unwrap_or(0);
        self.source.range(start..).map(|(n, src)| format!("{n} {src}")).collect()
    }

    /// Line number / source pairs, for persisting a program in a snapshot.
    #[must_use]
    pub fn source_lines(&self) -> Vec<(u32, String)> {
        self.source.iter().map(|(n, src)| (*n, src.clone())).collect()
    }

    /// Rebuild from persisted `(line, source)` pairs, as saved by
    /// `source_lines`.
    pub fn restore_source_lines(&mut self, lines: &[(u32, String)]) -> BasicResult<()> {
        self.clear();
        for (number, source) in lines {
            self.store_line(*number, source)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataPool {
    values: Vec<Value>,
    line_cursor: BTreeMap<u32, usize>,
    pos: usize,
}

impl DataPool {
    pub fn read_next(&mut self) -> BasicResult<Value> {
        let v = self.values.get(self.pos).cloned().ok_or_else(BasicError::out_of_data)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn restore(&mut self, target_line: Option<u32>) {
        self.pos = match target_line {
            None => 0,
            Some(line) => self
                .line_cursor
                .range(line..)
                .next()
                .map(|(_, pos)| *pos)
                .unwrap_or(self.values.len()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_delete_line() {
        let mut p = Program::new();
        p.store_line(10, "PRINT 1").unwrap();
        assert!(p.lines().contains_key(&10));
        p.store_line(10, "").unwrap();
        assert!(!p.lines().contains_key(&10));
    }

    #[test]
    fn data_pool_in_line_order() {
        let mut p = Program::new();
        p.store_line(20, "DATA 1,2").unwrap();
        p.store_line(10, "DATA \"a\"").unwrap();
        let mut pool = p.build_data_pool();
        assert_eq!(pool.read_next().unwrap(), Value::Str("A".to_string()));
        assert_eq!(pool.read_next().unwrap(), Value::Number(1.0));
    }

    #[test]
    fn listing_and_source_lines_round_trip_real_basic() {
        let mut p = Program::new();
        p.store_line(10, "PRINT \"HI\"").unwrap();
        assert_eq!(p.listing(None), vec!["10 PRINT \"HI\"".to_string()]);

        let saved = p.source_lines();
        let mut restored = Program::new();
        restored.restore_source_lines(&saved).unwrap();
        assert_eq!(restored.listing(None), p.listing(None));
    }
}
