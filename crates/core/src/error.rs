//! Error types for quire content stream editing.

use crate::model::objects::PDFObjRef;
use thiserror::Error;

/// Primary error type for content stream parsing and page contents editing.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("invalid token at position {pos}: {msg}")]
    TokenError { pos: usize, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Operand type/arity mismatch, leftover operands or unbalanced blocks.
    #[error("malformed content at operator {operator:?}{}: {msg}", position.map(|p| format!(" (operand {p})")).unwrap_or_default())]
    MalformedContent {
        operator: String,
        position: Option<usize>,
        msg: String,
    },

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("PDF object not found: {0}")]
    ObjectNotFound(PDFObjRef),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    /// Shorthand for a `MalformedContent` error without an operand position.
    pub fn malformed(operator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedContent {
            operator: operator.into(),
            position: None,
            msg: msg.into(),
        }
    }

    /// Whether this error reports malformed content (as opposed to a graph or
    /// argument problem).
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedContent { .. })
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
