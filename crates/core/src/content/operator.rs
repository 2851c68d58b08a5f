//! Content stream operators.
//!
//! One instruction occurrence is a [`PdfOperator`], a closed variant over
//! spec-bound, unknown, composite and inline-image instructions. Composite
//! children live in the owning [`OperatorSeq`](super::sequence::OperatorSeq);
//! the operator itself only carries the start and (once seen) the end
//! instruction.

use crate::content::spec::{self, MAX_OPERANDS, OperatorSpec};
use crate::error::{PdfError, Result};
use crate::model::operand::{Binding, Operand};
use crate::parser::tokenizer::InlineDict;
use smallvec::SmallVec;

/// Operand list of a spec-bound operator.
pub type Operands = SmallVec<[Operand; MAX_OPERANDS]>;

/// Writing the canonical content stream syntax of a value.
pub trait WriteContent {
    fn write_content(&self, out: &mut Vec<u8>);

    fn to_content_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_content(&mut out);
        out
    }
}

impl<T: WriteContent + ?Sized> WriteContent for &T {
    fn write_content(&self, out: &mut Vec<u8>) {
        (**self).write_content(out);
    }
}

/// Instruction closing the block opened by `name`, if `name` opens one.
pub fn block_end(name: &str) -> Option<&'static str> {
    match name {
        "BT" => Some("ET"),
        "BMC" | "BDC" => Some("EMC"),
        _ => None,
    }
}

/// Whether `name` closes a composite block.
pub fn is_block_end(name: &str) -> bool {
    matches!(name, "ET" | "EMC")
}

/// An instruction resolved against the operator table.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleOperator {
    spec: &'static OperatorSpec,
    operands: Operands,
}

impl SimpleOperator {
    /// Build a known operator, checking the operands against its spec.
    ///
    /// Every operand must be consumed; surplus operands are malformed.
    pub fn new(name: &str, operands: impl IntoIterator<Item = Operand>) -> Result<Self> {
        let spec = spec::lookup(name)
            .ok_or_else(|| PdfError::InvalidArgument(format!("unknown operator {name:?}")))?;
        let operands: Operands = operands.into_iter().collect();
        let used = spec::validate(spec, &operands).map_err(|m| PdfError::MalformedContent {
            operator: name.to_string(),
            position: Some(m.position),
            msg: m.to_string(),
        })?;
        if used != operands.len() {
            return Err(PdfError::malformed(
                name,
                format!("{} surplus operand(s)", operands.len() - used),
            ));
        }
        Ok(Self { spec, operands })
    }

    /// Build from already validated operands.
    pub(crate) const fn from_validated(spec: &'static OperatorSpec, operands: Operands) -> Self {
        Self { spec, operands }
    }

    pub const fn name(&self) -> &'static str {
        self.spec.name
    }

    pub const fn spec(&self) -> &'static OperatorSpec {
        self.spec
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    fn bind(&mut self, binding: Binding) {
        self.operands.iter_mut().for_each(|op| op.bind(binding));
    }
}

impl WriteContent for SimpleOperator {
    fn write_content(&self, out: &mut Vec<u8>) {
        write_instruction(self.name(), &self.operands, out);
    }
}

/// An instruction missing from the operator table, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownOperator {
    name: String,
    operands: Vec<Operand>,
}

impl UnknownOperator {
    pub fn new(name: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            name: name.into(),
            operands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }
}

impl WriteContent for UnknownOperator {
    fn write_content(&self, out: &mut Vec<u8>) {
        write_instruction(&self.name, &self.operands, out);
    }
}

/// A block instruction (`BT`, `BMC`, `BDC`). Its children are stored in the
/// sequence; `end` is `None` while the block is open, or when it was closed
/// implicitly at end of content.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeOperator {
    start: SimpleOperator,
    end: Option<SimpleOperator>,
}

impl CompositeOperator {
    pub const fn new(start: SimpleOperator) -> Self {
        Self { start, end: None }
    }

    pub const fn start(&self) -> &SimpleOperator {
        &self.start
    }

    pub const fn end(&self) -> Option<&SimpleOperator> {
        self.end.as_ref()
    }

    /// Name of the instruction that closes this block.
    pub fn end_name(&self) -> &'static str {
        block_end(self.start.name()).unwrap_or("")
    }

    pub(crate) fn close(&mut self, end: SimpleOperator) {
        self.end = Some(end);
    }
}

/// `BI <dict> ID <data> EI`.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    dict: InlineDict,
    data: Vec<u8>,
}

impl InlineImage {
    pub const fn new(dict: InlineDict, data: Vec<u8>) -> Self {
        Self { dict, data }
    }

    pub const fn dict(&self) -> &InlineDict {
        &self.dict
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl WriteContent for InlineImage {
    fn write_content(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"BI");
        for (key, value) in &self.dict {
            out.push(b' ');
            Operand::name(key.as_str()).write_to(out);
            out.push(b' ');
            value.write_to(out);
        }
        out.extend_from_slice(b" ID ");
        out.extend_from_slice(&self.data);
        out.extend_from_slice(b" EI");
    }
}

/// One instruction occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfOperator {
    Simple(SimpleOperator),
    Unknown(UnknownOperator),
    Composite(CompositeOperator),
    InlineImage(InlineImage),
}

impl PdfOperator {
    /// Known operator with validated operands; see [`SimpleOperator::new`].
    pub fn simple(name: &str, operands: impl IntoIterator<Item = Operand>) -> Result<Self> {
        Ok(Self::Simple(SimpleOperator::new(name, operands)?))
    }

    /// Operator whose name is outside the table.
    pub fn unknown(name: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self::Unknown(UnknownOperator::new(name, operands))
    }

    /// Name of the instruction; the start instruction for composites.
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(op) => op.name(),
            Self::Unknown(op) => op.name(),
            Self::Composite(op) => op.start.name(),
            Self::InlineImage(_) => "BI",
        }
    }

    pub fn operands(&self) -> &[Operand] {
        match self {
            Self::Simple(op) => op.operands(),
            Self::Unknown(op) => op.operands(),
            Self::Composite(op) => op.start.operands(),
            Self::InlineImage(_) => &[],
        }
    }

    pub fn spec(&self) -> Option<&'static OperatorSpec> {
        match self {
            Self::Simple(op) => Some(op.spec()),
            Self::Composite(op) => Some(op.start.spec()),
            Self::Unknown(_) | Self::InlineImage(_) => None,
        }
    }

    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// Attach document ownership to every operand, nested values included.
    pub fn bind(&mut self, binding: Binding) {
        match self {
            Self::Simple(op) => op.bind(binding),
            Self::Unknown(op) => op.operands.iter_mut().for_each(|o| o.bind(binding)),
            Self::Composite(op) => {
                op.start.bind(binding);
                if let Some(end) = op.end.as_mut() {
                    end.bind(binding);
                }
            }
            Self::InlineImage(img) => img.dict.values_mut().for_each(|o| o.bind(binding)),
        }
    }

    /// Whether every operand carries a document binding.
    pub fn is_bound(&self) -> bool {
        match self {
            Self::InlineImage(img) => img.dict.values().all(Operand::is_bound),
            Self::Composite(op) => {
                op.start.operands().iter().all(Operand::is_bound)
                    && op.end().is_none_or(|end| end.operands().iter().all(Operand::is_bound))
            }
            _ => self.operands().iter().all(Operand::is_bound),
        }
    }

    /// Write the opening instruction only (no children, no end).
    pub(crate) fn write_head(&self, out: &mut Vec<u8>) {
        match self {
            Self::Simple(op) => op.write_content(out),
            Self::Unknown(op) => op.write_content(out),
            Self::Composite(op) => op.start.write_content(out),
            Self::InlineImage(img) => img.write_content(out),
        }
    }
}

/// A standalone operator. Composites are written as an empty block; use the
/// sequence view to include children.
impl WriteContent for PdfOperator {
    fn write_content(&self, out: &mut Vec<u8>) {
        self.write_head(out);
        if let Self::Composite(op) = self {
            out.push(b'\n');
            out.extend_from_slice(op.end_name().as_bytes());
        }
    }
}

fn write_instruction(name: &str, operands: &[Operand], out: &mut Vec<u8>) {
    for operand in operands {
        operand.write_to(out);
        out.push(b' ');
    }
    out.extend_from_slice(name.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::PDFObjRef;
    use crate::model::operand::DocumentId;

    #[test]
    fn test_simple_rejects_surplus_operands() {
        let err = PdfOperator::simple("q", [Operand::int(1)]).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_simple_writes_operands_first() {
        let op = PdfOperator::simple("rg", [Operand::real(1.0), Operand::int(0), Operand::int(0)])
            .unwrap();
        assert_eq!(op.to_content_bytes(), b"1.0 0 0 rg");
    }

    #[test]
    fn test_bind_reaches_nested_operands() {
        let mut op = PdfOperator::unknown(
            "xyz",
            vec![Operand::array(vec![Operand::int(1), Operand::name("A")])],
        );
        assert!(!op.is_bound());
        op.bind(Binding {
            document: DocumentId(1),
            objref: PDFObjRef::new(4, 0),
        });
        assert!(op.is_bound());
    }
}
