//! Pages.
//!
//! A [`Page`] ties a page dictionary node to its [`PageContents`] and keeps
//! the state the contents manager reports back: a revision counter bumped on
//! every change and an "invalid" flag raised when a reparse triggered by an
//! outside change failed.

use super::contents::PageContents;
use super::graph::{DocumentGraph, NodeId, Value};
use crate::content::params::ContentParams;
use crate::error::{PdfError, Result};
use crate::interp::device::TextBackend;
use crate::interp::text::PlainTextBackend;
use crate::model::operand::ObjKind;
use crate::utils::{LETTER_MEDIA_BOX, Rect, normalize_rect};
use std::cell::Cell;
use std::rc::Rc;

/// Parent chain depth followed for inherited attributes.
const MAX_INHERIT_DEPTH: usize = 32;

/// Change/validity state shared between a page and its contents manager.
#[derive(Debug, Default)]
pub struct PageStatus {
    revision: Cell<u64>,
    invalid: Cell<bool>,
}

impl PageStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of "changed" signals so far.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn is_valid(&self) -> bool {
        !self.invalid.get()
    }

    pub(crate) fn changed(&self) {
        self.revision.set(self.revision.get() + 1);
    }

    pub(crate) fn set_invalid(&self, invalid: bool) {
        self.invalid.set(invalid);
    }
}

/// A page of a document graph.
pub struct Page {
    doc: Rc<dyn DocumentGraph>,
    node: NodeId,
    status: Rc<PageStatus>,
    contents: PageContents,
}

impl Page {
    /// Open the page dictionary `node` with default parameters and the
    /// plain text backend.
    pub fn open(doc: Rc<dyn DocumentGraph>, node: NodeId) -> Result<Self> {
        Self::with_params(doc, node, ContentParams::default(), Rc::new(PlainTextBackend))
    }

    pub fn with_params(
        doc: Rc<dyn DocumentGraph>,
        node: NodeId,
        params: ContentParams,
        backend: Rc<dyn TextBackend>,
    ) -> Result<Self> {
        let kind = doc.kind(node)?;
        if kind != ObjKind::Dict {
            return Err(PdfError::TypeError {
                expected: "page dictionary",
                got: kind.name(),
            });
        }
        let status = Rc::new(PageStatus::new());
        let contents = PageContents::new(doc.clone(), node, params, backend, status.clone())?;
        Ok(Self {
            doc,
            node,
            status,
            contents,
        })
    }

    pub const fn node(&self) -> NodeId {
        self.node
    }

    pub const fn contents(&self) -> &PageContents {
        &self.contents
    }

    pub fn revision(&self) -> u64 {
        self.status.revision()
    }

    /// False after a reparse triggered by an outside change failed.
    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    /// Parse the contents again; clears the invalid flag on success.
    pub fn revalidate(&self) -> Result<()> {
        self.contents.parse()
    }

    pub fn media_box(&self) -> Rect {
        media_box(&*self.doc, self.node)
    }
}

/// `/MediaBox` of a page, inherited through `/Parent`; US Letter if absent
/// or unreadable.
pub fn media_box(doc: &dyn DocumentGraph, page: NodeId) -> Rect {
    let mut node = Some(page);
    for _ in 0..MAX_INHERIT_DEPTH {
        let Some(current) = node else { break };
        if let Ok(Some(value)) = doc.get_property(current, "MediaBox") {
            if let Some(rect) = read_rect(doc, &value) {
                return rect;
            }
        }
        node = doc
            .get_property(current, "Parent")
            .ok()
            .flatten()
            .and_then(|parent| doc.resolve_node(&parent).ok().flatten());
    }
    LETTER_MEDIA_BOX
}

fn read_rect(doc: &dyn DocumentGraph, value: &Value) -> Option<Rect> {
    let array = doc.expect_node(value, ObjKind::Array).ok()?;
    if doc.array_len(array).ok()? != 4 {
        return None;
    }
    let mut nums = [0.0; 4];
    for (i, slot) in nums.iter_mut().enumerate() {
        let Value::Scalar(obj) = doc.array_get(array, i).ok()? else {
            return None;
        };
        *slot = obj.as_num().ok()?;
    }
    Some(normalize_rect((nums[0], nums[1], nums[2], nums[3])))
}
