//! Opal Compiler Front End
//!
//! Opal is a small, statically-typed, immutable, block-scoped procedural
//! language. This crate is the source-to-tree half of its compiler: it
//! turns source text into typed definitions for the downstream
//! elaborator and code generator.
//!
//! # Pipeline
//!
//! Three stages compose linearly:
//!
//! - [`lexer`]: maps source text to a position-indexed mapping of
//!   *candidate token sets*. A position may read as several
//!   classifications at once (`let` is both keyword and identifier);
//!   the lexer keeps all of them.
//! - [`parser`]: a hand-written recursive parser that drives off the
//!   set-valued stream, selecting tokens by syntactic context, and
//!   yields a concrete parse tree.
//! - [`ast`]: lowers the concrete tree into the abstract syntax tree of
//!   typed definitions.
//!
//! Source extents (half-open byte intervals, trailing whitespace
//! included) are preserved bit-exactly through every stage.

pub mod ast;
pub mod errors;
pub mod lexer;
pub mod parser;

pub use ast::{Definition, Lowerer};
pub use errors::{CompileError, Result};
pub use lexer::{Extents, Scanner, Token, TokenKind, TokenStream};
pub use parser::{Construct, ParseNode, Parser};

/// Run the full front end over a single source file.
///
/// Non-fatal lexical diagnostics are dropped; drive the stages by hand
/// to collect them.
pub fn front_end(source: &str) -> Result<Vec<Definition>> {
    let (stream, _) = Scanner::new(source).scan_all();
    let file = Parser::new(&stream).parse()?;
    Lowerer::new().lower(&[file])
}
