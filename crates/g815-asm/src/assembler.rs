//! Two-pass assembler driver: include expansion, label-table construction,
//! directive handling, and final encoding.

use std::collections::HashMap;

use crate::diagnostics::Diagnostic;
use crate::encoder::{self, EncodeCtx};
use crate::lexer::{self, LexedLine};

const DIRECTIVES: [&str; 5] = ["ORG", "ENTRY", "DB", "DS", "INCLUDE"];

/// Resolved include: the file actually read, and its source text.
pub struct IncludeSource {
    pub filename: String,
    pub source: String,
}

/// A source line after include expansion, still tagged with its origin
/// file and line number for diagnostics.
#[derive(Debug, Clone)]
struct FlatLine {
    file: String,
    line_no: u32,
    raw: String,
}

/// One line's contribution to the listing: where it landed and what bytes
/// it produced (empty for label-only or directive-only lines with no
/// payload, e.g. `ENTRY`).
#[derive(Debug, Clone)]
pub struct EmittedLine {
    pub address: u16,
    pub bytes: Vec<u8>,
    pub source: String,
}

pub struct AssembleOk {
    pub binary: Vec<u8>,
    pub origin: u16,
    pub entry: u16,
    pub labels: HashMap<String, i64>,
    pub emitted: Vec<EmittedLine>,
}

pub fn assemble(
    source: &str,
    filename: &str,
    include_resolver: Option<&dyn Fn(&str) -> Option<IncludeSource>>,
) -> Result<AssembleOk, Vec<Diagnostic>> {
    let mut flat = Vec::new();
    let mut diags = Vec::new();
    expand_includes(source, filename, include_resolver, &mut flat, &mut Vec::new(), &mut diags);
    if !diags.is_empty() {
        return Err(diags);
    }

    let lexed: Vec<(FlatLine, LexedLine)> =
        flat.into_iter().map(|f| { let l = lexer::lex_line(&f.raw); (f, l) }).collect();

    let (labels, mut diags) = pass_one(&lexed);
    if !diags.is_empty() {
        return Err(diags);
    }

    match pass_two(&lexed, &labels) {
        Ok(ok) => Ok(ok),
        Err(e) => {
            diags.extend(e);
            Err(diags)
        }
    }
}

fn expand_includes(
    source: &str,
    filename: &str,
    include_resolver: Option<&dyn Fn(&str) -> Option<IncludeSource>>,
    out: &mut Vec<FlatLine>,
    stack: &mut Vec<String>,
    diags: &mut Vec<Diagnostic>,
) {
    if stack.contains(&filename.to_string()) {
        diags.push(Diagnostic::new(filename, 1, 1, format!("circular INCLUDE of '{filename}'")));
        return;
    }
    stack.push(filename.to_string());

    for (i, raw) in source.lines().enumerate() {
        let line_no = (i + 1) as u32;
        let lexed = lexer::lex_line(raw);
        let is_include = lexed.mnemonic.as_deref().is_some_and(|m| m.eq_ignore_ascii_case("INCLUDE"));
        if !is_include {
            out.push(FlatLine { file: filename.to_string(), line_no, raw: raw.to_string() });
            continue;
        }

        let Some(path_raw) = lexed.operands.first() else {
            diags.push(Diagnostic::new(filename, line_no, 1, "INCLUDE requires a quoted path"));
            continue;
        };
        let Some(path) = unquote(path_raw) else {
            diags.push(Diagnostic::new(filename, line_no, 1, "INCLUDE path must be a quoted string"));
            continue;
        };
        let Some(resolver) = include_resolver else {
            diags.push(Diagnostic::new(filename, line_no, 1, format!("no include resolver configured for '{path}'")));
            continue;
        };
        let Some(included) = resolver(&path) else {
            diags.push(Diagnostic::new(filename, line_no, 1, format!("could not resolve INCLUDE '{path}'")));
            continue;
        };
        expand_includes(&included.source, &included.filename, Some(resolver), out, stack, diags);
    }

    stack.pop();
}

fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Some(s[1..s.len() - 1].to_string())
    } else {
        None
    }
}

/// Size of a directive's payload in bytes, or `None` if `mnemonic` isn't a
/// directive at all. `DB`/`DS` sizes can depend on resolved expressions
/// (a `DS` count, a string literal's length never does), so pass 1 passes
/// a context with no label table and treats an unresolvable count as fatal
/// immediately — unlike instruction sizing, layout cannot proceed without it.
fn directive_size(mnemonic: &str, operands: &[String], labels: Option<&HashMap<String, i64>>) -> Result<usize, String> {
    match mnemonic.to_ascii_uppercase().as_str() {
        "ORG" | "ENTRY" | "INCLUDE" => Ok(0),
        "DB" => {
            let mut n = 0;
            for raw in operands {
                if let Some(text) = unquote(raw) {
                    n += text.len();
                } else {
                    n += 1;
                }
            }
            Ok(n)
        }
        "DS" => {
            let count_raw = operands.first().ok_or("DS requires a count")?;
            let e = crate::expr::Expr::parse(count_raw).ok_or("DS count is not a valid expression")?;
            match labels {
                None => Ok(0),
                Some(labels) => {
                    let v = e.resolve(0, labels).ok_or("DS count references an undefined label")?;
                    usize::try_from(v).map_err(|_| "DS count must be non-negative".to_string())
                }
            }
        }
        _ => Err("not a directive".to_string()),
    }
}

fn pass_one(lines: &[(FlatLine, LexedLine)]) -> (HashMap<String, i64>, Vec<Diagnostic>) {
    let mut labels = HashMap::new();
    let mut diags = Vec::new();
    let mut here: i64 = 0;

    for (f, l) in lines {
        if let Some(label) = &l.label {
            if labels.insert(label.clone(), here).is_some() {
                diags.push(Diagnostic::new(&f.file, f.line_no, 1, format!("duplicate label '{label}'")));
            }
        }

        let Some(mnemonic) = &l.mnemonic else { continue };

        if DIRECTIVES.iter().any(|d| mnemonic.eq_ignore_ascii_case(d)) {
            if mnemonic.eq_ignore_ascii_case("ORG") {
                let Some(raw) = l.operands.first() else {
                    diags.push(Diagnostic::new(&f.file, f.line_no, 1, "ORG requires an address"));
                    continue;
                };
                let Some(e) = crate::expr::Expr::parse(raw) else {
                    diags.push(Diagnostic::new(&f.file, f.line_no, 1, "ORG address is not a valid expression"));
                    continue;
                };
                match e.resolve(here, &labels) {
                    Some(v) => here = v,
                    None => {
                        diags.push(Diagnostic::new(
                            &f.file,
                            f.line_no,
                            1,
                            "ORG address must not depend on a forward label",
                        ));
                    }
                }
                continue;
            }
            match directive_size(mnemonic, &l.operands, Some(&labels)) {
                Ok(n) => here += n as i64,
                Err(msg) => diags.push(Diagnostic::new(&f.file, f.line_no, 1, msg)),
            }
            continue;
        }

        match encoder::instruction_size(mnemonic, &l.operands) {
            Ok(n) => here += n as i64,
            Err(msg) => diags.push(Diagnostic::new(&f.file, f.line_no, 1, msg)),
        }
    }

    (labels, diags)
}

fn pass_two(lines: &[(FlatLine, LexedLine)], labels: &HashMap<String, i64>) -> Result<AssembleOk, Vec<Diagnostic>> {
    let mut diags = Vec::new();
    let mut here: i64 = 0;
    let mut entry: i64 = 0;
    let mut chunks: Vec<(i64, Vec<u8>)> = Vec::new();
    let mut emitted = Vec::new();

    for (f, l) in lines {
        let Some(mnemonic) = &l.mnemonic else { continue };

        if mnemonic.eq_ignore_ascii_case("ORG") {
            if let Some(raw) = l.operands.first() {
                if let Some(e) = crate::expr::Expr::parse(raw) {
                    if let Some(v) = e.resolve(here, labels) {
                        here = v;
                    }
                }
            }
            continue;
        }
        if mnemonic.eq_ignore_ascii_case("ENTRY") {
            match l.operands.first().and_then(|r| crate::expr::Expr::parse(r)) {
                Some(e) => match e.resolve(here, labels) {
                    Some(v) => entry = v,
                    None => diags.push(Diagnostic::new(&f.file, f.line_no, 1, "ENTRY target is undefined")),
                },
                None => diags.push(Diagnostic::new(&f.file, f.line_no, 1, "ENTRY requires an address")),
            }
            continue;
        }
        if mnemonic.eq_ignore_ascii_case("INCLUDE") {
            continue;
        }

        let start = here;
        let bytes = if mnemonic.eq_ignore_ascii_case("DB") {
            encode_db(&l.operands, labels, &f.file, f.line_no, &mut diags)
        } else if mnemonic.eq_ignore_ascii_case("DS") {
            encode_ds(&l.operands, labels, &f.file, f.line_no, &mut diags)
        } else {
            let ctx = EncodeCtx { here, labels: Some(labels) };
            match encoder::encode_instruction(mnemonic, &l.operands, &ctx) {
                Ok(b) => Some(b),
                Err(msg) => {
                    diags.push(Diagnostic::new(&f.file, f.line_no, 1, msg));
                    None
                }
            }
        };

        if let Some(bytes) = bytes {
            here += bytes.len() as i64;
            emitted.push(EmittedLine { address: start as u16, bytes: bytes.clone(), source: f.raw.clone() });
            chunks.push((start, bytes));
        }
    }

    if !diags.is_empty() {
        return Err(diags);
    }

    let origin = chunks.iter().map(|(addr, _)| *addr).min().unwrap_or(0);
    let end = chunks.iter().map(|(addr, b)| addr + b.len() as i64).max().unwrap_or(origin);
    let mut binary = vec![0u8; (end - origin).max(0) as usize];
    for (addr, bytes) in &chunks {
        let offset = (*addr - origin) as usize;
        binary[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    Ok(AssembleOk { binary, origin: origin as u16, entry: entry as u16, labels: labels.clone(), emitted })
}

fn encode_db(
    operands: &[String],
    labels: &HashMap<String, i64>,
    file: &str,
    line_no: u32,
    diags: &mut Vec<Diagnostic>,
) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    for raw in operands {
        if let Some(text) = unquote(raw) {
            bytes.extend(text.bytes());
            continue;
        }
        if raw.trim_start().starts_with('"') {
            diags.push(Diagnostic::new(file, line_no, 1, format!("unterminated string in DB operand '{raw}'")));
            continue;
        }
        match crate::expr::Expr::parse(raw) {
            Some(e) => match e.resolve(0, labels) {
                Some(v) if (-128..=255).contains(&v) => bytes.push((v & 0xFF) as u8),
                Some(v) => diags.push(Diagnostic::new(file, line_no, 1, format!("DB value {v} out of range"))),
                None => diags.push(Diagnostic::new(file, line_no, 1, format!("undefined label in DB operand '{raw}'"))),
            },
            None => diags.push(Diagnostic::new(file, line_no, 1, format!("invalid DB operand '{raw}'"))),
        }
    }
    if diags.is_empty() { Some(bytes) } else { None }
}

fn encode_ds(
    operands: &[String],
    labels: &HashMap<String, i64>,
    file: &str,
    line_no: u32,
    diags: &mut Vec<Diagnostic>,
) -> Option<Vec<u8>> {
    let count_raw = operands.first()?;
    let fill_raw = operands.get(1);
    let count_expr = crate::expr::Expr::parse(count_raw)?;
    let count = match count_expr.resolve(0, labels) {
        Some(v) if v >= 0 => v as usize,
        _ => {
            diags.push(Diagnostic::new(file, line_no, 1, format!("DS count '{count_raw}' is invalid")));
            return None;
        }
    };
    let fill = match fill_raw.and_then(|r| crate::expr::Expr::parse(r)).and_then(|e| e.resolve(0, labels)) {
        Some(v) => v as u8,
        None => 0,
    };
    Some(vec![fill; count])
}
