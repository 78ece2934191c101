//! Two-pass Z80 assembler for the PC-G815 emulator.
//!
//! `assemble` is the sole public entry point: it takes source text and
//! returns either a loadable binary plus listing/symbol/dump artifacts, or
//! a non-empty list of diagnostics. There is no CLI front-end in this
//! workspace; embedding hosts call `assemble` directly.

mod assembler;
mod diagnostics;
mod encoder;
mod expr;
mod lexer;
mod operand;
mod output;
mod table;

pub use assembler::IncludeSource;
pub use diagnostics::Diagnostic;

/// Options controlling one `assemble` call. `filename` labels diagnostics
/// and the top-level entry in the listing; `include_resolver` answers
/// `INCLUDE "path"` directives, returning the included file's name and
/// source, or `None` if it can't be found.
#[derive(Default)]
pub struct AssembleOptions<'a> {
    pub filename: &'a str,
    pub include_resolver: Option<&'a dyn Fn(&str) -> Option<IncludeSource>>,
}

/// The result of one `assemble` call: either a complete binary image with
/// its artifacts, or a non-empty diagnostics list. Mirrors the two
/// outcomes a caller needs to branch on, rather than bundling empty
/// `binary`/`lst`/etc. fields into a failure case.
pub enum AssembleResult {
    Ok {
        binary: Vec<u8>,
        origin: u16,
        entry: u16,
        lst: String,
        sym: String,
        dump: String,
    },
    Err {
        diagnostics: Vec<Diagnostic>,
    },
}

impl AssembleResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, AssembleResult::Ok { .. })
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            AssembleResult::Ok { .. } => &[],
            AssembleResult::Err { diagnostics } => diagnostics,
        }
    }
}

#[must_use]
pub fn assemble(source: &str, options: &AssembleOptions) -> AssembleResult {
    let filename = if options.filename.is_empty() { "source" } else { options.filename };
    match assembler::assemble(source, filename, options.include_resolver) {
        Ok(ok) => {
            let lst = output::render_lst(&ok.emitted);
            let sym = output::render_sym(&ok.labels);
            let dump = output::render_dump(&ok.binary, ok.origin);
            AssembleResult::Ok { binary: ok.binary, origin: ok.origin, entry: ok.entry, lst, sym, dump }
        }
        Err(diagnostics) => AssembleResult::Err { diagnostics },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_the_label_and_jump_example() {
        let src = "ORG 0x0000\nSTART: LD A,1\nJP START\n";
        let result = assemble(src, &AssembleOptions { filename: "t.asm", include_resolver: None });
        match result {
            AssembleResult::Ok { binary, lst, sym, .. } => {
                assert_eq!(binary, vec![0x3E, 0x01, 0xC3, 0x00, 0x00]);
                assert!(lst.contains("LD A,1"));
                assert!(sym.contains("START"));
            }
            AssembleResult::Err { diagnostics } => panic!("expected success, got {diagnostics:?}"),
        }
    }

    #[test]
    fn reports_diagnostics_on_undefined_label() {
        let src = "LD A,1\nJP NOWHERE\n";
        let result = assemble(src, &AssembleOptions { filename: "t.asm", include_resolver: None });
        assert!(!result.is_ok());
        assert!(!result.diagnostics().is_empty());
    }

    #[test]
    fn db_and_ds_directives_emit_expected_bytes() {
        let src = "ORG 0x8000\nDB \"HI\", 0\nDS 3, 0xFF\n";
        let result = assemble(src, &AssembleOptions { filename: "t.asm", include_resolver: None });
        match result {
            AssembleResult::Ok { binary, origin, .. } => {
                assert_eq!(origin, 0x8000);
                assert_eq!(binary, vec![b'H', b'I', 0x00, 0xFF, 0xFF, 0xFF]);
            }
            AssembleResult::Err { diagnostics } => panic!("expected success, got {diagnostics:?}"),
        }
    }

    #[test]
    fn include_resolver_splices_source() {
        let resolver = |path: &str| -> Option<IncludeSource> {
            if path == "macros.asm" {
                Some(IncludeSource { filename: "macros.asm".to_string(), source: "NOP\n".to_string() })
            } else {
                None
            }
        };
        let src = "INCLUDE \"macros.asm\"\nHALT\n";
        let result = assemble(src, &AssembleOptions { filename: "t.asm", include_resolver: Some(&resolver) });
        match result {
            AssembleResult::Ok { binary, .. } => assert_eq!(binary, vec![0x00, 0x76]),
            AssembleResult::Err { diagnostics } => panic!("expected success, got {diagnostics:?}"),
        }
    }
}
