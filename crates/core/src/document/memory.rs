//! In-memory document graph.
//!
//! `MemoryDocument` stores containers in a flat node table and indirect
//! objects in a map keyed by reference. Every mutation notifies the
//! observers of the mutated node after the internal borrow is released.

use super::graph::{ChangeContext, DocumentGraph, NodeId, Observer, Value};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
use crate::model::operand::{DocumentId, ObjKind};
use bytes::Bytes;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

type Entries = IndexMap<String, Value>;

#[derive(Debug)]
enum NodeData {
    Dict(Entries),
    Array(Vec<Value>),
    Stream { attrs: Entries, data: Bytes },
}

impl NodeData {
    const fn kind(&self) -> ObjKind {
        match self {
            Self::Dict(_) => ObjKind::Dict,
            Self::Array(_) => ObjKind::Array,
            Self::Stream { .. } => ObjKind::Stream,
        }
    }
}

#[derive(Debug)]
struct Node {
    data: NodeData,
    objref: Option<PDFObjRef>,
}

#[derive(Debug, Default)]
struct Store {
    nodes: Vec<Node>,
    indirect: FxHashMap<PDFObjRef, Value>,
    next_objid: u32,
}

impl Store {
    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0 as usize)
            .ok_or_else(|| PdfError::InvalidObject(format!("no node #{}", id.0)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or_else(|| PdfError::InvalidObject(format!("no node #{}", id.0)))
    }

    fn entries(&self, id: NodeId) -> Result<&Entries> {
        match &self.node(id)?.data {
            NodeData::Dict(entries) | NodeData::Stream { attrs: entries, .. } => Ok(entries),
            other => Err(type_error("dict", other.kind())),
        }
    }

    fn entries_mut(&mut self, id: NodeId) -> Result<&mut Entries> {
        match &mut self.node_mut(id)?.data {
            NodeData::Dict(entries) | NodeData::Stream { attrs: entries, .. } => Ok(entries),
            other => Err(type_error("dict", other.kind())),
        }
    }

    fn array(&self, id: NodeId) -> Result<&Vec<Value>> {
        match &self.node(id)?.data {
            NodeData::Array(items) => Ok(items),
            other => Err(type_error("array", other.kind())),
        }
    }

    fn array_mut(&mut self, id: NodeId) -> Result<&mut Vec<Value>> {
        match &mut self.node_mut(id)?.data {
            NodeData::Array(items) => Ok(items),
            other => Err(type_error("array", other.kind())),
        }
    }

    fn alloc(&mut self, data: NodeData) -> Value {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { data, objref: None });
        Value::Node(id)
    }

    /// Store an owned value, allocating nodes for containers.
    fn intern(&mut self, obj: PDFObject) -> Value {
        match obj {
            PDFObject::Ref(objref) => Value::Ref(objref),
            PDFObject::Array(items) => {
                let items = items.into_iter().map(|item| self.intern(item)).collect();
                self.alloc(NodeData::Array(items))
            }
            PDFObject::Dict(dict) => {
                let entries = self.intern_dict(dict);
                self.alloc(NodeData::Dict(entries))
            }
            PDFObject::Stream(stream) => {
                let data = stream.data_bytes();
                let attrs = self.intern_dict(stream.attrs);
                self.alloc(NodeData::Stream { attrs, data })
            }
            scalar => Value::Scalar(scalar),
        }
    }

    fn intern_dict(&mut self, dict: PDFDict) -> Entries {
        dict.into_iter().map(|(k, v)| (k, self.intern(v))).collect()
    }

    fn materialize(&self, value: &Value) -> Result<PDFObject> {
        match value {
            Value::Ref(objref) => Ok(PDFObject::Ref(*objref)),
            Value::Scalar(obj) => Ok(obj.clone()),
            Value::Node(id) => match &self.node(*id)?.data {
                NodeData::Array(items) => Ok(PDFObject::Array(
                    items.iter().map(|v| self.materialize(v)).collect::<Result<_>>()?,
                )),
                NodeData::Dict(entries) => Ok(PDFObject::Dict(self.materialize_dict(entries)?)),
                NodeData::Stream { attrs, data } => Ok(PDFObject::Stream(Box::new(
                    PDFStream::new(self.materialize_dict(attrs)?, data.clone()),
                ))),
            },
        }
    }

    fn materialize_dict(&self, entries: &Entries) -> Result<PDFDict> {
        entries
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.materialize(v)?)))
            .collect()
    }
}

const fn type_error(expected: &'static str, got: ObjKind) -> PdfError {
    PdfError::TypeError {
        expected,
        got: got.name(),
    }
}

/// A document graph held entirely in memory.
pub struct MemoryDocument {
    id: DocumentId,
    store: RefCell<Store>,
    observers: RefCell<FxHashMap<NodeId, Vec<Weak<dyn Observer>>>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            id: DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed)),
            store: RefCell::new(Store {
                next_objid: 1,
                ..Store::default()
            }),
            observers: RefCell::new(FxHashMap::default()),
        }
    }

    /// Add a direct (non-indirect) value and return its node, if it is a
    /// container.
    pub fn add_direct(&self, value: PDFObject) -> Option<NodeId> {
        match self.store.borrow_mut().intern(value) {
            Value::Node(id) => Some(id),
            _ => None,
        }
    }

    /// Owned copy of a value; nested indirect references stay references.
    pub fn to_object(&self, value: &Value) -> Result<PDFObject> {
        self.store.borrow().materialize(value)
    }

    /// Owned copy of a node.
    pub fn node_object(&self, node: NodeId) -> Result<PDFObject> {
        self.to_object(&Value::Node(node))
    }

    /// Number of live observers registered on `node`.
    pub fn observer_count(&self, node: NodeId) -> usize {
        self.observers
            .borrow()
            .get(&node)
            .map_or(0, |list| list.iter().filter(|w| w.strong_count() > 0).count())
    }

    fn notify(&self, node: NodeId, new_value: Option<&Value>, context: &ChangeContext) {
        let observers: Vec<Rc<dyn Observer>> = self
            .observers
            .borrow()
            .get(&node)
            .map(|list| list.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default();
        for observer in observers {
            observer.notify(node, new_value, context);
        }
    }
}

impl DocumentGraph for MemoryDocument {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn kind(&self, node: NodeId) -> Result<ObjKind> {
        Ok(self.store.borrow().node(node)?.data.kind())
    }

    fn node_ref(&self, node: NodeId) -> Option<PDFObjRef> {
        self.store.borrow().node(node).ok().and_then(|n| n.objref)
    }

    fn get_indirect(&self, objref: PDFObjRef) -> Result<NodeId> {
        match self.store.borrow().indirect.get(&objref) {
            Some(Value::Node(id)) => Ok(*id),
            Some(_) => Err(PdfError::TypeError {
                expected: "container",
                got: "scalar",
            }),
            None => Err(PdfError::ObjectNotFound(objref)),
        }
    }

    fn add_indirect(&self, value: PDFObject) -> Result<PDFObjRef> {
        let mut store = self.store.borrow_mut();
        let objref = PDFObjRef::new(store.next_objid, 0);
        store.next_objid += 1;
        let value = store.intern(value);
        if let Value::Node(id) = value {
            store.node_mut(id)?.objref = Some(objref);
        }
        store.indirect.insert(objref, value);
        Ok(objref)
    }

    fn get_property(&self, dict: NodeId, key: &str) -> Result<Option<Value>> {
        Ok(self.store.borrow().entries(dict)?.get(key).cloned())
    }

    fn set_property(&self, dict: NodeId, key: &str, value: PDFObject) -> Result<()> {
        let (value, old) = {
            let mut store = self.store.borrow_mut();
            store.entries(dict)?;
            let value = store.intern(value);
            let old = store.entries_mut(dict)?.insert(key.to_string(), value.clone());
            (value, old)
        };
        let context = ChangeContext::DictEntry {
            key: key.to_string(),
            old,
        };
        self.notify(dict, Some(&value), &context);
        Ok(())
    }

    fn del_property(&self, dict: NodeId, key: &str) -> Result<()> {
        let old = self
            .store
            .borrow_mut()
            .entries_mut(dict)?
            .shift_remove(key)
            .ok_or_else(|| PdfError::NotFound(format!("dictionary entry /{key}")))?;
        let context = ChangeContext::DictEntry {
            key: key.to_string(),
            old: Some(old),
        };
        self.notify(dict, None, &context);
        Ok(())
    }

    fn array_len(&self, array: NodeId) -> Result<usize> {
        Ok(self.store.borrow().array(array)?.len())
    }

    fn array_get(&self, array: NodeId, index: usize) -> Result<Value> {
        let store = self.store.borrow();
        let items = store.array(array)?;
        items.get(index).cloned().ok_or(PdfError::OutOfRange {
            index,
            len: items.len(),
        })
    }

    fn array_insert(&self, array: NodeId, index: usize, value: PDFObject) -> Result<()> {
        let value = {
            let mut store = self.store.borrow_mut();
            let len = store.array(array)?.len();
            if index > len {
                return Err(PdfError::OutOfRange { index, len });
            }
            let value = store.intern(value);
            store.array_mut(array)?.insert(index, value.clone());
            value
        };
        let context = ChangeContext::ArrayElement { index, old: None };
        self.notify(array, Some(&value), &context);
        Ok(())
    }

    fn array_remove(&self, array: NodeId, index: usize) -> Result<()> {
        let old = {
            let mut store = self.store.borrow_mut();
            let items = store.array_mut(array)?;
            if index >= items.len() {
                return Err(PdfError::OutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index)
        };
        let context = ChangeContext::ArrayElement {
            index,
            old: Some(old),
        };
        self.notify(array, None, &context);
        Ok(())
    }

    fn stream_data(&self, stream: NodeId) -> Result<Bytes> {
        match &self.store.borrow().node(stream)?.data {
            NodeData::Stream { data, .. } => Ok(data.clone()),
            other => Err(type_error("stream", other.kind())),
        }
    }

    fn set_stream_data(&self, stream: NodeId, data: Bytes) -> Result<()> {
        {
            let mut store = self.store.borrow_mut();
            match &mut store.node_mut(stream)?.data {
                NodeData::Stream { attrs, data: old } => {
                    attrs.insert(
                        "Length".to_string(),
                        Value::Scalar(PDFObject::Int(data.len() as i64)),
                    );
                    *old = data;
                }
                other => return Err(type_error("stream", other.kind())),
            }
        }
        self.notify(stream, Some(&Value::Node(stream)), &ChangeContext::Basic);
        Ok(())
    }

    fn register_observer(&self, node: NodeId, observer: Weak<dyn Observer>) -> Result<()> {
        self.kind(node)?;
        let mut observers = self.observers.borrow_mut();
        let list = observers.entry(node).or_default();
        list.retain(|w| w.strong_count() > 0);
        list.push(observer);
        Ok(())
    }

    fn unregister_observer(&self, node: NodeId, observer: &Weak<dyn Observer>) -> Result<()> {
        if let Some(list) = self.observers.borrow_mut().get_mut(&node) {
            list.retain(|w| !Weak::ptr_eq(w, observer));
        }
        Ok(())
    }
}
