//! Error types for the Opal front end.
//!
//! Every error carries the extents of the offending construct so that
//! callers can point back into the source text.

use crate::lexer::Extents;
use thiserror::Error;

/// A non-fatal lexical diagnostic.
///
/// The lexer never fails: unrecognised bytes are skipped and malformed
/// escape sequences are reported here while the token is still emitted.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub extents: Extents,
}

impl LexError {
    pub fn new(message: impl Into<String>, extents: Extents) -> Self {
        Self {
            message: message.into(),
            extents,
        }
    }
}

/// How a parse failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The token at the cursor is inadmissible where it stands.
    UnexpectedToken,
    /// A required `;`, `)`, `}`, `=`, `else`, or `over` never appeared.
    MissingDelimiter,
}

/// A fatal parser error. The parser does not recover; the remainder of
/// the stream is discarded.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub extents: Extents,
    pub help: Option<String>,
}

impl ParseError {
    pub fn unexpected(message: impl Into<String>, extents: Extents) -> Self {
        Self {
            kind: ParseErrorKind::UnexpectedToken,
            message: message.into(),
            extents,
            help: None,
        }
    }

    pub fn missing(message: impl Into<String>, extents: Extents) -> Self {
        Self {
            kind: ParseErrorKind::MissingDelimiter,
            message: message.into(),
            extents,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// How a lowering failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerErrorKind {
    /// The parse tree handed in had an unexpected shape.
    StructuralMismatch,
    /// The construct is grammatical but outside what this stage covers.
    Unimplemented,
}

/// A fatal lowering error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LowerError {
    pub kind: LowerErrorKind,
    pub message: String,
    pub extents: Extents,
}

impl LowerError {
    pub fn mismatch(message: impl Into<String>, extents: Extents) -> Self {
        Self {
            kind: LowerErrorKind::StructuralMismatch,
            message: message.into(),
            extents,
        }
    }

    pub fn unimplemented(message: impl Into<String>, extents: Extents) -> Self {
        Self {
            kind: LowerErrorKind::Unimplemented,
            message: message.into(),
            extents,
        }
    }
}

/// Unified front-end error type.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("lowering error: {0}")]
    Lower(#[from] LowerError),
}

impl CompileError {
    pub fn extents(&self) -> Extents {
        match self {
            CompileError::Lex(e) => e.extents,
            CompileError::Parse(e) => e.extents,
            CompileError::Lower(e) => e.extents,
        }
    }

    pub fn help(&self) -> Option<&str> {
        match self {
            CompileError::Parse(e) => e.help.as_deref(),
            _ => None,
        }
    }
}

/// Result type for front-end operations.
pub type Result<T> = std::result::Result<T, CompileError>;
