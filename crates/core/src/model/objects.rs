//! PDF object types.
//!
//! Owned values handed to and read back from the document graph. Containers
//! are stored by value here; once inserted into a graph they become nodes.

use crate::error::{PdfError, Result};
use crate::model::operand::ObjKind;
use bytes::Bytes;
use indexmap::IndexMap;
use std::fmt;

/// Dictionary type preserving key insertion order.
pub type PDFDict = IndexMap<String, PDFObject>;

/// PDF Object types - the fundamental value type in PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /Type, /Font)
    Name(String),
    /// String (byte array)
    String(Vec<u8>),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(PDFDict),
    /// Stream (dictionary + data)
    Stream(Box<PDFStream>),
    /// Indirect object reference
    Ref(PDFObjRef),
}

impl PDFObject {
    /// Get numeric value (int or real coerced to f64)
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    /// Kind of this value.
    pub const fn kind(&self) -> ObjKind {
        match self {
            Self::Null => ObjKind::Null,
            Self::Bool(_) => ObjKind::Bool,
            Self::Int(_) => ObjKind::Int,
            Self::Real(_) => ObjKind::Real,
            Self::Name(_) => ObjKind::Name,
            Self::String(_) => ObjKind::String,
            Self::Array(_) => ObjKind::Array,
            Self::Dict(_) => ObjKind::Dict,
            Self::Stream(_) => ObjKind::Stream,
            Self::Ref(_) => ObjKind::Ref,
        }
    }

    /// Get type name for error messages
    pub const fn type_name(&self) -> &'static str {
        self.kind().name()
    }
}

/// PDF indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PDFObjRef {
    /// Object ID
    pub objid: u32,
    /// Generation number
    pub genno: u32,
}

impl PDFObjRef {
    /// Create a new object reference.
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

impl fmt::Display for PDFObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.objid, self.genno)
    }
}

/// PDF Stream - dictionary attributes + decoded data.
///
/// Filters are the storage layer's business; streams handed to this crate
/// carry already decoded content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PDFStream {
    /// Stream dictionary attributes
    pub attrs: PDFDict,
    /// Decoded data
    data: Bytes,
}

impl PDFStream {
    /// Create a new stream.
    pub fn new(attrs: PDFDict, data: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            data: data.into(),
        }
    }

    /// Create a stream with only a `/Length` attribute.
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mut attrs = PDFDict::new();
        attrs.insert("Length".to_string(), PDFObject::Int(data.len() as i64));
        Self { attrs, data }
    }

    /// Get data as shared bytes.
    pub fn data_bytes(&self) -> Bytes {
        self.data.clone()
    }
}
