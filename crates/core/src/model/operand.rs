//! Operands - typed values consumed as instruction arguments.
//!
//! An operand carries its value plus an optional [`Binding`] to the document
//! and indirect object (the content stream) it belongs to. Operands are bound
//! by the operator factory before the owning operator counts as attached.

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject};
use indexmap::IndexMap;
use std::fmt;
use std::ops::BitOr;

/// Kind of a PDF value. The discriminant is the bit used in [`KindMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjKind {
    Bool = 0,
    Int = 1,
    Real = 2,
    String = 3,
    Name = 4,
    Null = 5,
    Array = 6,
    Dict = 7,
    Stream = 8,
    Ref = 9,
}

impl ObjKind {
    /// The single-bit mask of this kind.
    pub const fn bit(self) -> KindMask {
        KindMask(1 << self as u8)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Real => "real",
            Self::String => "string",
            Self::Name => "name",
            Self::Null => "null",
            Self::Array => "array",
            Self::Dict => "dict",
            Self::Stream => "stream",
            Self::Ref => "ref",
        }
    }
}

impl fmt::Display for ObjKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of acceptable operand kinds for one operand position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindMask(u16);

impl KindMask {
    pub const NONE: Self = Self(0);
    pub const INT: Self = ObjKind::Int.bit();
    pub const REAL: Self = ObjKind::Real.bit();
    pub const NUMBER: Self = Self(Self::INT.0 | Self::REAL.0);
    pub const STRING: Self = ObjKind::String.bit();
    pub const NAME: Self = ObjKind::Name.bit();
    pub const ARRAY: Self = ObjKind::Array.bit();
    pub const DICT: Self = ObjKind::Dict.bit();
    pub const DICT_OR_NAME: Self = Self(Self::DICT.0 | Self::NAME.0);
    pub const NUMBER_OR_NAME: Self = Self(Self::NUMBER.0 | Self::NAME.0);

    /// Whether `kind` is accepted.
    pub const fn accepts(self, kind: ObjKind) -> bool {
        self.0 & kind.bit().0 != 0
    }

    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl BitOr for KindMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Opaque identity of a document graph instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);

/// Ownership metadata attached to an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    /// Document the operand belongs to
    pub document: DocumentId,
    /// Indirect reference of the stream the operand was read from
    pub objref: PDFObjRef,
}

/// Operand value. Arrays and dictionaries hold operands so that bindings
/// reach every nested value.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandValue {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Decoded name. Name bytes that are not UTF-8 were replaced with
    /// U+FFFD when read, so such names do not write back byte for byte.
    Name(String),
    String(Vec<u8>),
    Array(Vec<Operand>),
    Dict(IndexMap<String, Operand>),
    Ref(PDFObjRef),
}

/// A typed operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    value: OperandValue,
    binding: Option<Binding>,
}

impl Operand {
    pub const fn new(value: OperandValue) -> Self {
        Self {
            value,
            binding: None,
        }
    }

    pub const fn null() -> Self {
        Self::new(OperandValue::Null)
    }

    pub const fn bool(b: bool) -> Self {
        Self::new(OperandValue::Bool(b))
    }

    pub const fn int(n: i64) -> Self {
        Self::new(OperandValue::Int(n))
    }

    /// Non-finite values have no content stream syntax and become `0.0`.
    pub const fn real(n: f64) -> Self {
        Self::new(OperandValue::Real(if n.is_finite() { n } else { 0.0 }))
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(OperandValue::Name(name.into()))
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(OperandValue::String(bytes.into()))
    }

    pub fn array(items: Vec<Self>) -> Self {
        Self::new(OperandValue::Array(items))
    }

    pub fn dict(entries: IndexMap<String, Self>) -> Self {
        Self::new(OperandValue::Dict(entries))
    }

    pub const fn reference(objref: PDFObjRef) -> Self {
        Self::new(OperandValue::Ref(objref))
    }

    pub const fn value(&self) -> &OperandValue {
        &self.value
    }

    pub const fn binding(&self) -> Option<Binding> {
        self.binding
    }

    pub const fn kind(&self) -> ObjKind {
        match &self.value {
            OperandValue::Null => ObjKind::Null,
            OperandValue::Bool(_) => ObjKind::Bool,
            OperandValue::Int(_) => ObjKind::Int,
            OperandValue::Real(_) => ObjKind::Real,
            OperandValue::Name(_) => ObjKind::Name,
            OperandValue::String(_) => ObjKind::String,
            OperandValue::Array(_) => ObjKind::Array,
            OperandValue::Dict(_) => ObjKind::Dict,
            OperandValue::Ref(_) => ObjKind::Ref,
        }
    }

    /// The bit used for type-checking against a [`KindMask`].
    pub const fn kind_mask(&self) -> KindMask {
        self.kind().bit()
    }

    /// Attach document/stream ownership, recursing into arrays and dictionaries.
    pub fn bind(&mut self, binding: Binding) {
        self.binding = Some(binding);
        match &mut self.value {
            OperandValue::Array(items) => items.iter_mut().for_each(|item| item.bind(binding)),
            OperandValue::Dict(entries) => entries.values_mut().for_each(|item| item.bind(binding)),
            _ => {}
        }
    }

    /// Whether this operand and all nested operands carry a binding.
    pub fn is_bound(&self) -> bool {
        if self.binding.is_none() {
            return false;
        }
        match &self.value {
            OperandValue::Array(items) => items.iter().all(Self::is_bound),
            OperandValue::Dict(entries) => entries.values().all(Self::is_bound),
            _ => true,
        }
    }

    /// Numeric value of an int or real operand.
    pub const fn as_num(&self) -> Option<f64> {
        match self.value {
            OperandValue::Int(n) => Some(n as f64),
            OperandValue::Real(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.value {
            OperandValue::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            OperandValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Self]> {
        match &self.value {
            OperandValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to an owned graph value, dropping the binding.
    pub fn to_object(&self) -> PDFObject {
        match &self.value {
            OperandValue::Null => PDFObject::Null,
            OperandValue::Bool(b) => PDFObject::Bool(*b),
            OperandValue::Int(n) => PDFObject::Int(*n),
            OperandValue::Real(n) => PDFObject::Real(*n),
            OperandValue::Name(name) => PDFObject::Name(name.clone()),
            OperandValue::String(s) => PDFObject::String(s.clone()),
            OperandValue::Array(items) => PDFObject::Array(items.iter().map(Self::to_object).collect()),
            OperandValue::Dict(entries) => PDFObject::Dict(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_object()))
                    .collect::<PDFDict>(),
            ),
            OperandValue::Ref(r) => PDFObject::Ref(*r),
        }
    }

    /// Append the canonical content stream syntax of this operand.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match &self.value {
            OperandValue::Null => out.extend_from_slice(b"null"),
            OperandValue::Bool(true) => out.extend_from_slice(b"true"),
            OperandValue::Bool(false) => out.extend_from_slice(b"false"),
            OperandValue::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
            OperandValue::Real(n) => write_real(*n, out),
            OperandValue::Name(name) => write_name(name, out),
            OperandValue::String(s) => write_string(s, out),
            OperandValue::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_to(out);
                }
                out.push(b']');
            }
            OperandValue::Dict(entries) => {
                out.extend_from_slice(b"<<");
                for (key, value) in entries {
                    write_name(key, out);
                    out.push(b' ');
                    value.write_to(out);
                    out.push(b' ');
                }
                out.extend_from_slice(b">>");
            }
            OperandValue::Ref(r) => out.extend_from_slice(r.to_string().as_bytes()),
        }
    }
}

impl TryFrom<PDFObject> for Operand {
    type Error = PdfError;

    fn try_from(obj: PDFObject) -> Result<Self> {
        let value = match obj {
            PDFObject::Null => OperandValue::Null,
            PDFObject::Bool(b) => OperandValue::Bool(b),
            PDFObject::Int(n) => OperandValue::Int(n),
            PDFObject::Real(n) => OperandValue::Real(n),
            PDFObject::Name(name) => OperandValue::Name(name),
            PDFObject::String(s) => OperandValue::String(s),
            PDFObject::Array(items) => OperandValue::Array(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            PDFObject::Dict(entries) => OperandValue::Dict(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((k, Self::try_from(v)?)))
                    .collect::<Result<IndexMap<_, _>>>()?,
            ),
            PDFObject::Ref(r) => OperandValue::Ref(r),
            PDFObject::Stream(_) => {
                return Err(PdfError::TypeError {
                    expected: "inline operand",
                    got: "stream",
                });
            }
        };
        Ok(Self::new(value))
    }
}

fn write_real(n: f64, out: &mut Vec<u8>) {
    let n = if n.is_finite() { n } else { 0.0 };
    // Keep a decimal point so the value reads back as a real.
    let text = if n.fract() == 0.0 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    };
    out.extend_from_slice(text.as_bytes());
}

/// Name bytes that must be written as `#xx`.
const fn needs_name_escape(b: u8) -> bool {
    !(b > b' ' && b < 0x7f)
        || matches!(
            b,
            b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
}

fn write_name(name: &str, out: &mut Vec<u8>) {
    out.push(b'/');
    for &b in name.as_bytes() {
        if needs_name_escape(b) {
            out.extend_from_slice(format!("#{b:02x}").as_bytes());
        } else {
            out.push(b);
        }
    }
}

fn write_string(s: &[u8], out: &mut Vec<u8>) {
    out.push(b'(');
    for &b in s {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x20..=0x7e => out.push(b),
            _ => out.extend_from_slice(format!("\\{b:03o}").as_bytes()),
        }
    }
    out.push(b')');
}
