//! Tokenizer for one logical assembly line.
//!
//! Z80 source is line-oriented: an optional label, an optional mnemonic or
//! directive, a comma-separated operand list, and an optional `;`-led
//! comment. This module only splits a line into that shape; operand
//! expressions are parsed in `operand.rs`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexedLine {
    pub label: Option<String>,
    pub mnemonic: Option<String>,
    pub operands: Vec<String>,
}

/// Split one line of source into label / mnemonic / raw operand strings.
/// Comments (`;` to end of line) are stripped first; string literals are
/// tracked so a `;` or `,` inside quotes is not treated as a separator.
#[must_use]
pub fn lex_line(raw: &str) -> LexedLine {
    let code = strip_comment(raw);
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return LexedLine { label: None, mnemonic: None, operands: Vec::new() };
    }

    let mut rest = trimmed;
    let mut label = None;
    if let Some(colon) = find_label_colon(rest) {
        label = Some(rest[..colon].trim().to_string());
        rest = rest[colon + 1..].trim_start();
    }

    if rest.is_empty() {
        return LexedLine { label, mnemonic: None, operands: Vec::new() };
    }

    let split_at = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let mnemonic = rest[..split_at].to_string();
    let operand_str = rest[split_at..].trim();
    let operands = if operand_str.is_empty() { Vec::new() } else { split_operands(operand_str) };

    LexedLine { label, mnemonic: Some(mnemonic), operands }
}

fn strip_comment(line: &str) -> String {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return line[..i].to_string(),
            _ => {}
        }
    }
    line.to_string()
}

/// A label definition is `NAME:` at the start of the line. A bare
/// `NAME` followed by whitespace and a directive/mnemonic is *not* a
/// label here (Z80 assemblers vary; this one requires the colon).
fn find_label_colon(s: &str) -> Option<usize> {
    let end_of_first_word = s.find(char::is_whitespace).unwrap_or(s.len());
    s[..end_of_first_word].find(':')
}

fn split_operands(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth -= 1,
            ',' if !in_quotes && depth == 0 => {
                parts.push(s[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = s[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_and_instruction() {
        let l = lex_line("START: LD A,1 ; set A");
        assert_eq!(l.label.as_deref(), Some("START"));
        assert_eq!(l.mnemonic.as_deref(), Some("LD"));
        assert_eq!(l.operands, vec!["A".to_string(), "1".to_string()]);
    }

    #[test]
    fn directive_with_string_operand_ignores_comma_inside_quotes() {
        let l = lex_line(r#"DB "a,b", 0"#);
        assert_eq!(l.mnemonic.as_deref(), Some("DB"));
        assert_eq!(l.operands, vec![r#""a,b""#.to_string(), "0".to_string()]);
    }

    #[test]
    fn indexed_operand_comma_inside_parens_not_split() {
        let l = lex_line("LD (IX+2),A");
        assert_eq!(l.operands, vec!["(IX+2)".to_string(), "A".to_string()]);
    }

    #[test]
    fn blank_and_comment_only_lines() {
        assert_eq!(lex_line("   "), LexedLine { label: None, mnemonic: None, operands: vec![] });
        assert_eq!(lex_line("; just a comment"), LexedLine { label: None, mnemonic: None, operands: vec![] });
    }
}
