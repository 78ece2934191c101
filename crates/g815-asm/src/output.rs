//! Human-readable artifacts generated alongside the binary image.

use crate::assembler::EmittedLine;

/// Address, byte triplet, and original source per emitted line.
#[must_use]
pub fn render_lst(lines: &[EmittedLine]) -> String {
    let mut out = String::new();
    for line in lines {
        let bytes = line.bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
        out.push_str(&format!("{:04X}  {:<11} {}\n", line.address, bytes, line.source));
    }
    out
}

/// Two-column symbol table, sorted by address then name.
#[must_use]
pub fn render_sym(labels: &std::collections::HashMap<String, i64>) -> String {
    let mut entries: Vec<(&String, &i64)> = labels.iter().collect();
    entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
    let mut out = String::new();
    for (name, addr) in entries {
        out.push_str(&format!("{name:<16} {:04X}\n", *addr as u16));
    }
    out
}

/// 16-bytes-per-row hex dump of the final binary, addressed from `origin`.
#[must_use]
pub fn render_dump(binary: &[u8], origin: u16) -> String {
    let mut out = String::new();
    for (row, chunk) in binary.chunks(16).enumerate() {
        let addr = origin.wrapping_add((row * 16) as u16);
        let bytes = chunk.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
        out.push_str(&format!("{addr:04X}  {bytes}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn dump_wraps_rows_at_sixteen_bytes() {
        let bin: Vec<u8> = (0..20).collect();
        let dump = render_dump(&bin, 0);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000"));
        assert!(lines[1].starts_with("0010"));
    }

    #[test]
    fn sym_table_sorted_by_address() {
        let mut labels = HashMap::new();
        labels.insert("LATER".to_string(), 0x20);
        labels.insert("START".to_string(), 0x00);
        let sym = render_sym(&labels);
        let lines: Vec<&str> = sym.lines().collect();
        assert!(lines[0].starts_with("START"));
        assert!(lines[1].starts_with("LATER"));
    }
}
