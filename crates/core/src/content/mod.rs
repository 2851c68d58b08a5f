//! Typed content stream model.
//!
//! - `spec` - static operator table and operand validation
//! - `operator` - operator variants and canonical serialization
//! - `sequence` - arena-backed linked operator sequence
//! - `factory` - token stream to operator sequence
//! - `stream` - parsed content stream with its backing stream objects
//! - `params` - parsing/editing parameters

pub mod factory;
pub mod operator;
pub mod params;
pub mod sequence;
pub mod spec;
pub mod stream;

// Re-export main types for convenience
pub use factory::{OperatorFactory, parse_content};
pub use operator::{
    CompositeOperator, InlineImage, PdfOperator, SimpleOperator, UnknownOperator, WriteContent,
};
pub use params::ContentParams;
pub use sequence::{OpId, OpRef, OperatorSeq};
pub use spec::{KNOWN_OPERATORS, OperatorSpec, SpecMismatch, lookup, validate};
pub use stream::{BackingStream, ContentStream, ContentStreamId};
