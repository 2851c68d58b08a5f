//! Content streams.
//!
//! A [`ContentStream`] is one parsed operator sequence together with the
//! backing stream objects it was read from. It usually has one backing
//! stream; it has several when a block or an operand list crosses a stream
//! boundary inside a `/Contents` array.

use crate::content::factory::OperatorFactory;
use crate::content::operator::WriteContent;
use crate::content::params::ContentParams;
use crate::content::sequence::{OpId, OpRef, OperatorSeq, Siblings, Walk};
use crate::document::graph::{DocumentGraph, NodeId};
use crate::error::{PdfError, Result};
use crate::model::objects::PDFObjRef;
use crate::model::operand::{Binding, ObjKind};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a parsed content stream, kept across reparses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentStreamId(u64);

impl ContentStreamId {
    fn fresh() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A persistent stream object backing a content stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackingStream {
    pub node: NodeId,
    pub objref: PDFObjRef,
}

impl BackingStream {
    /// Check that `node` is an indirect stream object.
    pub fn resolve(doc: &dyn DocumentGraph, node: NodeId) -> Result<Self> {
        let kind = doc.kind(node)?;
        if kind != ObjKind::Stream {
            return Err(PdfError::InvalidObject(format!(
                "content entry is a {kind}, not a stream"
            )));
        }
        let objref = doc.node_ref(node).ok_or_else(|| {
            PdfError::InvalidObject("content stream has no indirect reference".into())
        })?;
        Ok(Self { node, objref })
    }
}

/// Parsed operators of one or more backing streams. All operands are bound
/// to the first backing stream.
#[derive(Debug, Clone)]
pub struct ContentStream {
    id: ContentStreamId,
    binding: Binding,
    backing: Vec<BackingStream>,
    ops: OperatorSeq,
}

impl ContentStream {
    /// Parse `streams` (in order) as one content stream.
    pub fn new(doc: &dyn DocumentGraph, streams: &[NodeId], params: &ContentParams) -> Result<Self> {
        let backing = streams
            .iter()
            .map(|&node| BackingStream::resolve(doc, node))
            .collect::<Result<Vec<_>>>()?;
        Self::parse(doc, ContentStreamId::fresh(), backing, params)
    }

    /// Parse the streams of a `/Contents` array, starting a new content
    /// stream at every boundary where no operands are pending and no block
    /// is open.
    pub fn parse_groups(
        doc: &dyn DocumentGraph,
        streams: &[NodeId],
        params: &ContentParams,
    ) -> Result<Vec<Self>> {
        let mut groups = Vec::new();
        let mut current: Option<(OperatorFactory<'_>, Vec<BackingStream>)> = None;

        for &node in streams {
            let stream = BackingStream::resolve(doc, node)?;
            let (factory, backing) = current.get_or_insert_with(|| {
                (
                    OperatorFactory::new(binding_for(doc, &stream), params),
                    Vec::new(),
                )
            });
            factory.feed_stream(doc.stream_data(node)?)?;
            backing.push(stream);

            if factory.is_clean() {
                if let Some((factory, backing)) = current.take() {
                    groups.push(Self::from_parts(doc, ContentStreamId::fresh(), backing, factory)?);
                }
            }
        }
        if let Some((factory, backing)) = current {
            debug!(streams = backing.len(), "last content group left open");
            groups.push(Self::from_parts(doc, ContentStreamId::fresh(), backing, factory)?);
        }
        Ok(groups)
    }

    /// Parse the same backing streams again, keeping this stream's identity.
    pub fn reparse(&self, doc: &dyn DocumentGraph, params: &ContentParams) -> Result<Self> {
        Self::parse(doc, self.id, self.backing.clone(), params)
    }

    fn parse(
        doc: &dyn DocumentGraph,
        id: ContentStreamId,
        backing: Vec<BackingStream>,
        params: &ContentParams,
    ) -> Result<Self> {
        let first = backing
            .first()
            .ok_or_else(|| PdfError::InvalidObject("content stream without backing stream".into()))?;
        let mut factory = OperatorFactory::new(binding_for(doc, first), params);
        for stream in &backing {
            factory.feed_stream(doc.stream_data(stream.node)?)?;
        }
        Self::from_parts(doc, id, backing, factory)
    }

    fn from_parts(
        doc: &dyn DocumentGraph,
        id: ContentStreamId,
        backing: Vec<BackingStream>,
        factory: OperatorFactory<'_>,
    ) -> Result<Self> {
        let ops = factory.finish()?;
        let first = backing
            .first()
            .ok_or_else(|| PdfError::InvalidObject("content stream without backing stream".into()))?;
        Ok(Self {
            id,
            binding: binding_for(doc, first),
            backing,
            ops,
        })
    }

    pub const fn id(&self) -> ContentStreamId {
        self.id
    }

    /// Document and first backing stream the operators are bound to.
    pub const fn binding(&self) -> Binding {
        self.binding
    }

    pub fn backing_streams(&self) -> &[BackingStream] {
        &self.backing
    }

    pub const fn operators(&self) -> &OperatorSeq {
        &self.ops
    }

    /// Number of top-level operators.
    pub const fn len(&self) -> usize {
        self.ops.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn front(&self) -> Option<OpRef<'_>> {
        self.ops.front()
    }

    pub fn back(&self) -> Option<OpRef<'_>> {
        self.ops.back()
    }

    pub fn get(&self, id: OpId) -> Option<OpRef<'_>> {
        self.ops.op(id)
    }

    pub fn iter(&self) -> Siblings<'_> {
        self.ops.iter()
    }

    pub fn walk(&self) -> Walk<'_> {
        self.ops.walk()
    }

    /// Canonical content, one instruction per line.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.ops.to_content_bytes()
    }

    /// [`to_bytes`](Self::to_bytes) as text. Lossy only for raw inline
    /// image data.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}

impl WriteContent for ContentStream {
    fn write_content(&self, out: &mut Vec<u8>) {
        self.ops.write_content(out);
    }
}

fn binding_for(doc: &dyn DocumentGraph, stream: &BackingStream) -> Binding {
    Binding {
        document: doc.id(),
        objref: stream.objref,
    }
}
