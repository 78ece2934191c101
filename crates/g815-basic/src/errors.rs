//! The numeric-coded BASIC error taxonomy.

/// A tagged runtime or parse error, displayed as `<message> (<Enn>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for BasicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl BasicError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new("E01", message.into())
    }

    #[must_use]
    pub fn bad_line(message: impl Into<String>) -> Self {
        Self::new("E02", message.into())
    }

    #[must_use]
    pub fn bad_var(message: impl Into<String>) -> Self {
        Self::new("E03", message.into())
    }

    #[must_use]
    pub fn bad_let(message: impl Into<String>) -> Self {
        Self::new("E04", message.into())
    }

    #[must_use]
    pub fn bad_if(message: impl Into<String>) -> Self {
        Self::new("E05", message.into())
    }

    #[must_use]
    pub fn no_line(target: impl std::fmt::Display) -> Self {
        Self::new("E06", format!("NO LINE {target}"))
    }

    #[must_use]
    pub fn runaway() -> Self {
        Self::new("E07", "RUNAWAY")
    }

    #[must_use]
    pub fn input_in_run() -> Self {
        Self::new("E08", "INPUT IN RUN")
    }

    #[must_use]
    pub fn return_wo_gosub() -> Self {
        Self::new("E09", "RETURN WITHOUT GOSUB")
    }

    #[must_use]
    pub fn bad_stmt(message: impl Into<String>) -> Self {
        Self::new("E10", message.into())
    }

    /// E41..E53: reserved per-keyword errors (division by zero, subscript
    /// out of range, type mismatch, and similar keyword-specific failures
    /// that don't fit the generic codes above).
    #[must_use]
    pub fn reserved(code: u8, message: impl Into<String>) -> Self {
        debug_assert!((41..=53).contains(&code), "reserved error code out of range");
        let code: &'static str = match code {
            41 => "E41",
            42 => "E42",
            43 => "E43",
            44 => "E44",
            45 => "E45",
            46 => "E46",
            47 => "E47",
            48 => "E48",
            49 => "E49",
            50 => "E50",
            51 => "E51",
            52 => "E52",
            _ => "E53",
        };
        Self::new(code, message.into())
    }

    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new("E99", message.into())
    }

    #[must_use]
    pub fn division_by_zero() -> Self {
        Self::reserved(41, "DIVISION BY ZERO")
    }

    #[must_use]
    pub fn type_mismatch() -> Self {
        Self::reserved(42, "TYPE MISMATCH")
    }

    #[must_use]
    pub fn subscript_out_of_range() -> Self {
        Self::reserved(43, "SUBSCRIPT OUT OF RANGE")
    }

    #[must_use]
    pub fn redimensioned_array() -> Self {
        Self::reserved(44, "REDIMENSIONED ARRAY")
    }

    #[must_use]
    pub fn next_without_for() -> Self {
        Self::reserved(45, "NEXT WITHOUT FOR")
    }

    #[must_use]
    pub fn out_of_data() -> Self {
        Self::reserved(46, "OUT OF DATA")
    }
}

pub type BasicResult<T> = Result<T, BasicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_form() {
        assert_eq!(BasicError::no_line(999).to_string(), "NO LINE 999 (E06)");
        assert_eq!(BasicError::runaway().to_string(), "RUNAWAY (E07)");
    }
}
