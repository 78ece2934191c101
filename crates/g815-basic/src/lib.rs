//! Line-oriented BASIC interpreter and monitor runtime for the PC-G815
//! emulator: lexer, recursive-descent parser, variable/array storage, the
//! expression evaluator, and the cooperative pump loop that drives
//! RUN/CONT/WAIT/INPUT/STOP semantics.

mod adapter;
mod ast;
mod errors;
mod eval;
mod lexer;
mod parser;
mod program;
mod runtime;
mod vars;

#[cfg(feature = "snapshot")]
mod snapshot;

pub use adapter::{FileHandle, MachineAdapter, NullAdapter};
pub use ast::{
    BinOp, BuiltinFn, DelegateStmt, Expr, FileMode, LValue, LineRef, ParsedLine, PrintItem,
    PrintSep, Stmt, UnaryOp, Value,
};
pub use errors::{BasicError, BasicResult};
pub use parser::parse_line;
pub use program::{DataPool, Program};
pub use runtime::{Pc, Runtime, Suspension};
pub use vars::{ArrayStore, VarStore};

#[cfg(feature = "snapshot")]
pub use snapshot::RuntimeSnapshot;
