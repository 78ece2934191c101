//! Numeric expressions: literals and label references, resolved against
//! the label table built in pass 1.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i64),
    Label(String),
    /// `$`, the address of the current instruction.
    CurrentAddress,
}

impl Expr {
    /// Parse a numeric literal, character literal, `$`, or bare label name.
    /// Returns `None` if `s` doesn't look like any of those (an empty or
    /// malformed token).
    #[must_use]
    pub fn parse(s: &str) -> Option<Expr> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if s == "$" {
            return Some(Expr::CurrentAddress);
        }
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return i64::from_str_radix(hex, 16).ok().map(Expr::Number);
        }
        if let Some(hex) = s.strip_prefix('$') {
            // `$HH` hex form, distinct from the bare `$` current-address token.
            return i64::from_str_radix(hex, 16).ok().map(Expr::Number);
        }
        if let Some(hex) = s.strip_suffix(['h', 'H']) {
            if hex.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                return i64::from_str_radix(hex, 16).ok().map(Expr::Number);
            }
        }
        if s.len() >= 3 && s.starts_with('\'') && s.ends_with('\'') {
            return s[1..s.len() - 1].chars().next().map(|c| Expr::Number(c as i64));
        }
        if let Ok(n) = s.parse::<i64>() {
            return Some(Expr::Number(n));
        }
        if s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '.')
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Some(Expr::Label(s.to_string()));
        }
        None
    }

    pub fn resolve(&self, here: i64, labels: &HashMap<String, i64>) -> Option<i64> {
        match self {
            Expr::Number(n) => Some(*n),
            Expr::CurrentAddress => Some(here),
            Expr::Label(name) => labels.get(name).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_hex_and_char_literals() {
        assert_eq!(Expr::parse("10"), Some(Expr::Number(10)));
        assert_eq!(Expr::parse("0x1F"), Some(Expr::Number(0x1F)));
        assert_eq!(Expr::parse("1Fh"), Some(Expr::Number(0x1F)));
        assert_eq!(Expr::parse("'A'"), Some(Expr::Number(65)));
        assert_eq!(Expr::parse("$"), Some(Expr::CurrentAddress));
    }

    #[test]
    fn resolves_label_from_table() {
        let mut labels = HashMap::new();
        labels.insert("START".to_string(), 0x100);
        assert_eq!(Expr::parse("START").unwrap().resolve(0, &labels), Some(0x100));
    }
}
