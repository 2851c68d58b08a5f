//! Document object graph interface.
//!
//! The content editor never owns the document. It talks to the persistent
//! object graph through [`DocumentGraph`]: containers (dictionaries, arrays,
//! streams) are addressed by [`NodeId`], indirect objects by
//! [`PDFObjRef`]. Observers are registered per node and held weakly, so the
//! graph never keeps a watcher alive.
//!
//! Implementations use interior mutability and must not hold internal
//! borrows while calling [`Observer::notify`]; observers are allowed to call
//! back into the graph.

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObjRef, PDFObject};
use crate::model::operand::{DocumentId, ObjKind};
use bytes::Bytes;
use std::rc::Weak;

/// Identity of a container node (dictionary, array or stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Value stored in a dictionary entry or array slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Indirect reference
    Ref(PDFObjRef),
    /// Direct container
    Node(NodeId),
    /// Direct primitive; never an array, dictionary or stream
    Scalar(PDFObject),
}

/// What changed on an observed node.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeContext {
    /// The node's own value changed (stream payload replaced).
    Basic,
    /// A dictionary entry was added, replaced or removed.
    DictEntry { key: String, old: Option<Value> },
    /// An array element was inserted or removed.
    ArrayElement { index: usize, old: Option<Value> },
}

/// Change callback registered on a node.
pub trait Observer {
    /// `new_value` is `None` when an entry or element was removed.
    fn notify(&self, node: NodeId, new_value: Option<&Value>, context: &ChangeContext);
}

/// Persistent document object graph.
pub trait DocumentGraph {
    fn id(&self) -> DocumentId;

    /// Kind of a container node (`Dict`, `Array` or `Stream`).
    fn kind(&self, node: NodeId) -> Result<ObjKind>;

    /// Indirect reference of a node stored as an indirect object.
    fn node_ref(&self, node: NodeId) -> Option<PDFObjRef>;

    /// Node behind an indirect reference.
    fn get_indirect(&self, objref: PDFObjRef) -> Result<NodeId>;

    /// Store `value` as a new indirect object.
    fn add_indirect(&self, value: PDFObject) -> Result<PDFObjRef>;

    fn get_property(&self, dict: NodeId, key: &str) -> Result<Option<Value>>;

    fn set_property(&self, dict: NodeId, key: &str, value: PDFObject) -> Result<()>;

    /// Remove an entry; fails with `NotFound` if it is absent.
    fn del_property(&self, dict: NodeId, key: &str) -> Result<()>;

    fn contains_property(&self, dict: NodeId, key: &str) -> Result<bool> {
        Ok(self.get_property(dict, key)?.is_some())
    }

    fn array_len(&self, array: NodeId) -> Result<usize>;

    fn array_get(&self, array: NodeId, index: usize) -> Result<Value>;

    /// Insert at `index` (`index == len` appends).
    fn array_insert(&self, array: NodeId, index: usize, value: PDFObject) -> Result<()>;

    fn array_remove(&self, array: NodeId, index: usize) -> Result<()>;

    /// Decoded payload of a stream node.
    fn stream_data(&self, stream: NodeId) -> Result<Bytes>;

    fn set_stream_data(&self, stream: NodeId, data: Bytes) -> Result<()>;

    fn register_observer(&self, node: NodeId, observer: Weak<dyn Observer>) -> Result<()>;

    /// Remove a registration made with [`register_observer`](Self::register_observer).
    /// Unknown observers are ignored.
    fn unregister_observer(&self, node: NodeId, observer: &Weak<dyn Observer>) -> Result<()>;

    /// Container behind a value: follows references, `None` for scalars.
    fn resolve_node(&self, value: &Value) -> Result<Option<NodeId>> {
        match value {
            Value::Ref(objref) => self.get_indirect(*objref).map(Some),
            Value::Node(node) => Ok(Some(*node)),
            Value::Scalar(_) => Ok(None),
        }
    }

    /// Like [`resolve_node`](Self::resolve_node), requiring a node of `kind`.
    fn expect_node(&self, value: &Value, kind: ObjKind) -> Result<NodeId> {
        let node = self.resolve_node(value)?.ok_or(PdfError::TypeError {
            expected: kind.name(),
            got: "scalar",
        })?;
        let got = self.kind(node)?;
        if got != kind {
            return Err(PdfError::TypeError {
                expected: kind.name(),
                got: got.name(),
            });
        }
        Ok(node)
    }
}
