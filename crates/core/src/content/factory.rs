//! Operator factory.
//!
//! Turns the token stream of one or more content streams into an
//! [`OperatorSeq`]. Operands accumulate on a pending stack; an instruction
//! name resolves against the operator table, validates and consumes its
//! operands, and is linked at the current nesting level. Block instructions
//! (`BT`, `BMC`, `BDC`) open a composite whose children are everything up to
//! the matching end instruction.
//!
//! The factory is resumable: feed each backing stream in turn, and use
//! [`OperatorFactory::is_clean`] to find boundaries where a sequence may be
//! closed with [`OperatorFactory::finish`].

use crate::content::operator::{
    CompositeOperator, InlineImage, Operands, PdfOperator, SimpleOperator, UnknownOperator,
    block_end, is_block_end,
};
use crate::content::params::ContentParams;
use crate::content::sequence::{OpId, OperatorSeq};
use crate::content::spec;
use crate::error::{PdfError, Result};
use crate::model::operand::{Binding, Operand};
use crate::parser::tokenizer::{ContentToken, ContentTokenizer, fold_reference};
use bytes::Bytes;
use tracing::{debug, trace, warn};

/// Builds an operator sequence from content tokens.
pub struct OperatorFactory<'p> {
    params: &'p ContentParams,
    binding: Binding,
    seq: OperatorSeq,
    pending: Vec<Operand>,
    open_blocks: Vec<OpId>,
}

impl<'p> OperatorFactory<'p> {
    pub fn new(binding: Binding, params: &'p ContentParams) -> Self {
        Self {
            params,
            binding,
            seq: OperatorSeq::new(),
            pending: Vec::new(),
            open_blocks: Vec::new(),
        }
    }

    /// No pending operands and no open block.
    pub fn is_clean(&self) -> bool {
        self.pending.is_empty() && self.open_blocks.is_empty()
    }

    /// Tokenize and consume one decoded content stream.
    pub fn feed_stream(&mut self, data: impl Into<Bytes>) -> Result<()> {
        let mut tokenizer = ContentTokenizer::new(data);
        while let Some(item) = tokenizer.next_with_pos() {
            let (pos, token) = item?;
            self.feed(token).map_err(|e| with_position(e, pos))?;
        }
        Ok(())
    }

    /// Consume one token.
    pub fn feed(&mut self, token: ContentToken) -> Result<()> {
        match token {
            ContentToken::Operand(operand) => {
                self.pending.push(operand);
                Ok(())
            }
            ContentToken::Operator(name) => self.instruction(name),
            ContentToken::InlineImage { dict, data } => {
                self.reject_pending("BI")?;
                trace!(entries = dict.len(), bytes = data.len(), "inline image");
                let mut op = PdfOperator::InlineImage(InlineImage::new(dict, data));
                op.bind(self.binding);
                self.link(op);
                Ok(())
            }
        }
    }

    /// Close the sequence. Operands still pending are malformed; open
    /// blocks are closed implicitly unless nesting is strict.
    pub fn finish(mut self) -> Result<OperatorSeq> {
        if !self.pending.is_empty() {
            return Err(PdfError::malformed(
                "",
                format!("{} operand(s) left at end of content", self.pending.len()),
            ));
        }
        if let Some(&open) = self.open_blocks.last() {
            let name = self.seq.get(open).map(PdfOperator::name).unwrap_or_default().to_string();
            if self.params.strict_nesting {
                return Err(PdfError::malformed(name, "block not closed at end of content"));
            }
            warn!(
                operator = %name,
                open = self.open_blocks.len(),
                "closing unterminated block(s) at end of content"
            );
            self.open_blocks.clear();
        }
        debug!(operators = self.seq.total_len(), "content parsed");
        Ok(self.seq)
    }

    fn instruction(&mut self, name: String) -> Result<()> {
        if name == "R" && fold_reference(&mut self.pending) {
            return Ok(());
        }
        let Some(spec) = spec::lookup(&name) else {
            debug!(operator = %name, operands = self.pending.len(), "unknown operator");
            let operands = std::mem::take(&mut self.pending);
            let mut op = PdfOperator::Unknown(UnknownOperator::new(name, operands));
            op.bind(self.binding);
            self.link(op);
            return Ok(());
        };

        let take = spec::validate(spec, &self.pending).map_err(|m| PdfError::MalformedContent {
            operator: name.clone(),
            position: Some(m.position),
            msg: m.to_string(),
        })?;
        let excess = self.pending.len() - take;
        if excess > 0 {
            return Err(PdfError::malformed(
                name,
                format!("{excess} excess operand(s) before operator"),
            ));
        }
        let mut operands: Operands = self.pending.drain(..).collect();
        operands.iter_mut().for_each(|op| op.bind(self.binding));
        let simple = SimpleOperator::from_validated(spec, operands);
        trace!(operator = spec.name, operands = take, "operator");

        if block_end(spec.name).is_some() {
            return self.open_block(simple);
        }
        if is_block_end(spec.name) {
            return self.close_block(simple);
        }
        self.link(PdfOperator::Simple(simple));
        Ok(())
    }

    fn open_block(&mut self, start: SimpleOperator) -> Result<()> {
        if self.open_blocks.len() >= self.params.max_nesting {
            return Err(PdfError::malformed(
                start.name(),
                format!("blocks nested deeper than {}", self.params.max_nesting),
            ));
        }
        let id = self.link(PdfOperator::Composite(CompositeOperator::new(start)));
        self.open_blocks.push(id);
        Ok(())
    }

    fn close_block(&mut self, end: SimpleOperator) -> Result<()> {
        let matches = self.open_blocks.last().is_some_and(|&open| {
            matches!(self.seq.get(open), Some(PdfOperator::Composite(c)) if c.end_name() == end.name())
        });
        if matches {
            let open = self.open_blocks.pop();
            if let Some(PdfOperator::Composite(block)) = open.and_then(|id| self.seq.get_mut(id)) {
                block.close(end);
            }
            return Ok(());
        }
        if self.params.strict_nesting {
            return Err(PdfError::malformed(end.name(), "no matching block start"));
        }
        warn!(operator = end.name(), "stray block end kept as plain operator");
        self.link(PdfOperator::Simple(end));
        Ok(())
    }

    fn reject_pending(&self, name: &str) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        Err(PdfError::malformed(
            name,
            format!("{} excess operand(s) before operator", self.pending.len()),
        ))
    }

    fn link(&mut self, op: PdfOperator) -> OpId {
        let parent = self.open_blocks.last().copied();
        self.seq.push(op, parent)
    }
}

/// Fill in the byte offset of a malformed-content error.
fn with_position(err: PdfError, pos: usize) -> PdfError {
    match err {
        PdfError::MalformedContent {
            operator,
            position,
            msg,
        } => PdfError::MalformedContent {
            operator,
            position,
            msg: format!("{msg} at byte {pos}"),
        },
        other => other,
    }
}

/// Parse a single self-contained content stream.
pub fn parse_content(
    data: impl Into<Bytes>,
    binding: Binding,
    params: &ContentParams,
) -> Result<OperatorSeq> {
    let mut factory = OperatorFactory::new(binding, params);
    factory.feed_stream(data)?;
    factory.finish()
}
