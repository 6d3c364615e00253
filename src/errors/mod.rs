//! Error handling for the Opal front end.

pub mod diagnostic;
pub mod report;

pub use diagnostic::{
    CompileError, LexError, LowerError, LowerErrorKind, ParseError, ParseErrorKind, Result,
};
pub use report::{report_error, report_warning};
