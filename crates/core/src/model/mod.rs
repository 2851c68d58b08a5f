//! PDF model types - objects and operands.
//!
//! - `objects` - owned PDF values (PDFObject, PDFStream, PDFObjRef)
//! - `operand` - typed instruction operands with document binding

pub mod objects;
pub mod operand;

// Re-export main types for convenience
pub use objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
pub use operand::{Binding, DocumentId, KindMask, ObjKind, Operand, OperandValue};
