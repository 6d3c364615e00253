//! Abstract syntax tree and lowering for the Opal front end.
//!
//! The AST is a set of sum types over typed definitions; the lowerer
//! flattens concrete parse trees into them.
//!
//! # Example
//!
//! ```ignore
//! use opal::ast::Lowerer;
//!
//! let definitions = Lowerer::new().lower(&[file_tree])?;
//! ```

pub mod ast;
pub mod lower;

pub use ast::{
    Block, Definition, Expression, Literal, LiteralValue, Pattern, ProcedureDefinition,
    RecordKey, RecordPattern, Statement, SymbolTable, TypeDefinition, TypeExpression,
    ValueDefinition, Visibility,
};
pub use lower::Lowerer;
