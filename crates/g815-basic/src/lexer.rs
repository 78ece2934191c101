//! Tokenizer for one BASIC source line.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Keyword(&'static str),
    /// `=`, `<>`, `<`, `<=`, `>`, `>=`, `+`, `-`, `*`, `/`, `\`, `^`
    Op(&'static str),
    Comma,
    Semicolon,
    Colon,
    Hash,
    LParen,
    RParen,
}

const KEYWORDS: &[&str] = &[
    "OR", "XOR", "AND", "NOT", "MOD", "STEP", "TO", "THEN", "ELSE", "GOTO", "GOSUB", "RETURN",
    "IF", "FOR", "NEXT", "DIM", "DATA", "READ", "RESTORE", "POKE", "PEEK", "OUT", "INP", "BEEP",
    "WAIT", "LOCATE", "END", "STOP", "CONT", "REPEAT", "UNTIL", "WHILE", "WEND", "ON", "REM",
    "AUTO", "OPEN", "CLOSE", "LOAD", "SAVE", "FILES", "KILL", "BLOAD", "BSAVE", "LCOPY", "CALL",
    "GCURSOR", "GPRINT", "LINE", "PSET", "PRESET", "CIRCLE", "PAINT", "NEW", "LIST", "RUN",
    "PRINT", "LET", "INPUT", "USING", "INKEY",
];

/// Tokenize one line of BASIC source, stopping at an unquoted `'` comment.
pub fn tokenize(src: &str) -> Vec<Token> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '\'' => break,
            '"' => {
                i += 1;
                let mut s = String::new();
                while i < chars.len() && chars[i] != '"' {
                    s.push(chars[i]);
                    i += 1;
                }
                i += 1; // closing quote (unterminated strings are a parser diagnostic)
                tokens.push(Token::Str(s));
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '#' => {
                tokens.push(Token::Hash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op("="));
                i += 1;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'>') {
                    tokens.push(Token::Op("<>"));
                    i += 2;
                } else if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op("<="));
                    i += 2;
                } else {
                    tokens.push(Token::Op("<"));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(">="));
                    i += 2;
                } else {
                    tokens.push(Token::Op(">"));
                    i += 1;
                }
            }
            '+' => {
                tokens.push(Token::Op("+"));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Op("-"));
                i += 1;
            }
            '*' => {
                tokens.push(Token::Op("*"));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op("/"));
                i += 1;
            }
            '\\' => {
                tokens.push(Token::Op("\\"));
                i += 1;
            }
            '^' => {
                tokens.push(Token::Op("^"));
                i += 1;
            }
            '&' if chars.get(i + 1).is_some_and(|c| *c == 'H' || *c == 'h') => {
                i += 2;
                let start = i;
                while i < chars.len() && chars[i].is_ascii_hexdigit() {
                    i += 1;
                }
                let hex: String = chars[start..i].iter().collect();
                let value = u32::from_str_radix(&hex, 16).unwrap_or(0);
                tokens.push(Token::Number(f64::from(value)));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(text.parse().unwrap_or(0.0)));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if i < chars.len() && chars[i] == '$' {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let upper = text.to_ascii_uppercase();
                if let Some(kw) = KEYWORDS.iter().find(|k| **k == upper) {
                    tokens.push(Token::Keyword(kw));
                } else {
                    tokens.push(Token::Ident(upper));
                }
            }
            _ => i += 1, // unrecognized characters are ignored at the lexer level
        }
    }

    tokens
}
