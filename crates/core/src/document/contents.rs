//! Page contents manager.
//!
//! [`PageContents`] keeps the parsed content streams of one page in step
//! with the page's `/Contents` entry, which the graph stores either as one
//! stream or as an array of stream references. Edits go to the graph first
//! and are then mirrored in the cached list.
//!
//! A watchdog observer sits on the page dictionary and on the node the
//! `/Contents` entry currently resolves to:
//!
//! - adding or replacing `/Contents` re-registers the watchdog and reparses;
//!   removing it only detaches the watchdog;
//! - any change on the watched entry node (array element inserted or
//!   removed, stream payload replaced) reparses.
//!
//! A reparse failure inside the watchdog marks the page invalid instead of
//! failing the graph call that caused it. The manager's own multi-step
//! edits run inside an observer-free section so they do not trigger it.

use super::graph::{ChangeContext, DocumentGraph, NodeId, Observer, Value};
use super::page::{PageStatus, media_box};
use crate::content::factory::parse_content;
use crate::content::operator::WriteContent;
use crate::content::params::ContentParams;
use crate::content::stream::{ContentStream, ContentStreamId};
use crate::error::{PdfError, Result};
use crate::interp::device::{DisplayParams, TextBackend, TextEncoding, TextSearchParams};
use crate::model::objects::{PDFObjRef, PDFObject, PDFStream};
use crate::model::operand::{Binding, ObjKind, Operand};
use crate::utils::Rect;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Page dictionary key holding the content streams.
pub const CONTENTS: &str = "Contents";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Front,
    Back,
}

/// Ordered content streams of one page.
pub struct PageContents {
    inner: Rc<ContentsInner>,
}

struct ContentsInner {
    doc: Rc<dyn DocumentGraph>,
    /// `None` once reset
    page: Cell<Option<NodeId>>,
    params: ContentParams,
    backend: Rc<dyn TextBackend>,
    status: Rc<PageStatus>,
    streams: RefCell<Vec<Rc<ContentStream>>>,
    /// Only strong reference to the watchdog; the graph holds weak ones.
    watchdog: RefCell<Option<Rc<dyn Observer>>>,
    watched_entry: Cell<Option<NodeId>>,
    suppressed: Cell<usize>,
}

struct ContentsWatchdog {
    contents: Weak<ContentsInner>,
}

impl Observer for ContentsWatchdog {
    fn notify(&self, node: NodeId, new_value: Option<&Value>, context: &ChangeContext) {
        if let Some(contents) = self.contents.upgrade() {
            contents.on_change(node, new_value, context);
        }
    }
}

/// Suppresses watchdog reactions while alive. Leaving the outermost section
/// re-syncs the entry registration with the graph.
struct ObserverFreeSection<'a> {
    inner: &'a ContentsInner,
}

impl<'a> ObserverFreeSection<'a> {
    fn enter(inner: &'a ContentsInner) -> Self {
        inner.suppressed.set(inner.suppressed.get() + 1);
        Self { inner }
    }
}

impl Drop for ObserverFreeSection<'_> {
    fn drop(&mut self) {
        let depth = self.inner.suppressed.get().saturating_sub(1);
        self.inner.suppressed.set(depth);
        if depth == 0 {
            if let Err(e) = self.inner.sync_entry_watch() {
                warn!(error = %e, "failed to re-register contents watchdog");
            }
        }
    }
}

impl PageContents {
    /// Attach to `page`, register the watchdog and parse.
    ///
    /// A failed initial parse marks the page invalid and leaves the list
    /// empty; registration errors are returned.
    pub fn new(
        doc: Rc<dyn DocumentGraph>,
        page: NodeId,
        params: ContentParams,
        backend: Rc<dyn TextBackend>,
        status: Rc<PageStatus>,
    ) -> Result<Self> {
        let inner = Rc::new_cyclic(|weak: &Weak<ContentsInner>| {
            let watchdog: Rc<dyn Observer> = Rc::new(ContentsWatchdog {
                contents: weak.clone(),
            });
            ContentsInner {
                doc,
                page: Cell::new(Some(page)),
                params,
                backend,
                status,
                streams: RefCell::new(Vec::new()),
                watchdog: RefCell::new(Some(watchdog)),
                watched_entry: Cell::new(None),
                suppressed: Cell::new(0),
            }
        });
        let contents = Self { inner };
        contents.inner.register_page_watch(page)?;
        contents.inner.sync_entry_watch()?;
        if let Err(e) = contents.inner.parse() {
            warn!(error = %e, "initial parse failed; page marked invalid");
            contents.inner.status.set_invalid(true);
        }
        Ok(contents)
    }

    /// Read `/Contents` and rebuild the whole list.
    pub fn parse(&self) -> Result<()> {
        self.inner.parse()
    }

    /// Parse every cached stream again from its backing streams.
    pub fn reparse(&self) -> Result<()> {
        self.inner.page()?;
        let current = self.inner.streams.borrow().clone();
        let fresh = current
            .iter()
            .map(|cs| cs.reparse(&*self.inner.doc, &self.inner.params).map(Rc::new))
            .collect::<Result<Vec<_>>>()?;
        *self.inner.streams.borrow_mut() = fresh;
        self.inner.status.changed();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.streams.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.streams.borrow().is_empty()
    }

    /// Snapshot of the current list.
    pub fn streams(&self) -> Vec<Rc<ContentStream>> {
        self.inner.streams.borrow().clone()
    }

    pub fn content_stream(&self, index: usize) -> Result<Rc<ContentStream>> {
        self.inner.page()?;
        let streams = self.inner.streams.borrow();
        streams.get(index).cloned().ok_or(PdfError::OutOfRange {
            index,
            len: streams.len(),
        })
    }

    /// Whole page content in canonical form.
    pub fn to_text(&self) -> String {
        self.inner
            .streams
            .borrow()
            .iter()
            .map(|cs| cs.to_text())
            .collect()
    }

    /// Write `ops` into a new stream drawn before all others.
    pub fn add_to_front<I>(&self, ops: I) -> Result<Rc<ContentStream>>
    where
        I: IntoIterator,
        I::Item: WriteContent,
    {
        self.inner.add(End::Front, ops)
    }

    /// Write `ops` into a new stream drawn after all others.
    pub fn add_to_back<I>(&self, ops: I) -> Result<Rc<ContentStream>>
    where
        I: IntoIterator,
        I::Item: WriteContent,
    {
        self.inner.add(End::Back, ops)
    }

    pub fn remove(&self, index: usize) -> Result<()> {
        let stream = self.content_stream(index)?;
        self.remove_stream(&stream)
    }

    /// Remove every backing stream of `stream` from `/Contents`.
    pub fn remove_stream(&self, stream: &ContentStream) -> Result<()> {
        self.inner.remove(stream)
    }

    /// Swap `stream` with the stream drawn after it.
    pub fn move_above(&self, stream: &ContentStream) -> Result<()> {
        let position = self.inner.position(stream.id())?;
        self.move_above_at(position)
    }

    /// Swap `stream` with the stream drawn before it.
    pub fn move_below(&self, stream: &ContentStream) -> Result<()> {
        let position = self.inner.position(stream.id())?;
        self.move_below_at(position)
    }

    pub fn move_above_at(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len.saturating_sub(1) {
            return Err(PdfError::OutOfRange { index, len });
        }
        self.inner.swap(index, index + 1)
    }

    pub fn move_below_at(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index == 0 || index >= len {
            return Err(PdfError::OutOfRange { index, len });
        }
        self.inner.swap(index - 1, index)
    }

    /// Rewrite `/Contents` as an array of the backing streams of the cached
    /// list, in order.
    pub fn set_contents(&self) -> Result<()> {
        let page = self.inner.page()?;
        let streams = self.streams();
        let _section = ObserverFreeSection::enter(&self.inner);
        self.inner.write_contents(page, &streams)
    }

    /// Extract the page text, optionally restricted to `region` (default:
    /// the media box). `encoding` defaults to the backend's.
    pub fn get_text(&self, encoding: Option<&str>, region: Option<Rect>) -> Result<String> {
        let params = self.inner.display_params(encoding)?;
        let streams = self.streams();
        let page = self.inner.backend.display_page(&streams, &params)?;
        Ok(page.text(region.unwrap_or(params.media_box)))
    }

    /// Every match rectangle of `needle`, in page order.
    pub fn find_text(&self, needle: &str, search: &TextSearchParams) -> Result<Vec<Rect>> {
        let params = self.inner.display_params(None)?;
        let streams = self.streams();
        let mut page = self.inner.backend.display_page(&streams, &params)?;
        let mut found = Vec::new();
        while let Some(rect) = page.find_text(needle, search) {
            found.push(rect);
        }
        debug!(needle, matches = found.len(), "text search");
        Ok(found)
    }

    /// Unregister the watchdog and drop all state. Later calls fail with
    /// `InvalidObject`.
    pub fn reset(&self) {
        self.inner.reset();
    }

    pub fn is_reset(&self) -> bool {
        self.inner.page.get().is_none()
    }
}

impl Drop for PageContents {
    fn drop(&mut self) {
        self.inner.reset();
    }
}

impl ContentsInner {
    fn page(&self) -> Result<NodeId> {
        self.page
            .get()
            .ok_or_else(|| PdfError::InvalidObject("page contents were reset".into()))
    }

    fn watchdog_handle(&self) -> Option<Weak<dyn Observer>> {
        self.watchdog.borrow().as_ref().map(Rc::downgrade)
    }

    fn position(&self, id: ContentStreamId) -> Result<usize> {
        self.page()?;
        self.streams
            .borrow()
            .iter()
            .position(|cs| cs.id() == id)
            .ok_or_else(|| PdfError::NotFound("content stream is not part of this page".into()))
    }

    fn parse(&self) -> Result<()> {
        let page = self.page()?;
        let nodes = self.contents_streams(page)?;
        let groups = ContentStream::parse_groups(&*self.doc, &nodes, &self.params)?;
        debug!(
            streams = nodes.len(),
            groups = groups.len(),
            "page contents parsed"
        );
        *self.streams.borrow_mut() = groups.into_iter().map(Rc::new).collect();
        self.status.set_invalid(false);
        self.status.changed();
        Ok(())
    }

    /// Stream nodes named by `/Contents`, in order.
    fn contents_streams(&self, page: NodeId) -> Result<Vec<NodeId>> {
        let Some(entry) = self.doc.get_property(page, CONTENTS)? else {
            return Ok(Vec::new());
        };
        let node = self
            .doc
            .resolve_node(&entry)?
            .ok_or_else(|| PdfError::InvalidObject("/Contents is neither a stream nor an array".into()))?;
        match self.doc.kind(node)? {
            ObjKind::Stream => Ok(vec![node]),
            ObjKind::Array => (0..self.doc.array_len(node)?)
                .map(|index| {
                    let item = self.doc.array_get(node, index)?;
                    self.doc.resolve_node(&item)?.ok_or_else(|| {
                        PdfError::InvalidObject(format!("/Contents element {index} is not a stream"))
                    })
                })
                .collect(),
            kind => Err(PdfError::InvalidObject(format!(
                "/Contents is a {kind}, neither a stream nor an array"
            ))),
        }
    }

    fn serialize<I>(&self, ops: I) -> Vec<u8>
    where
        I: IntoIterator,
        I::Item: WriteContent,
    {
        let mut data = Vec::new();
        if let Some(tag) = &self.params.change_tag {
            Operand::name(tag.as_str()).write_to(&mut data);
            data.extend_from_slice(b" MP\n");
        }
        for op in ops {
            op.write_content(&mut data);
            data.push(b'\n');
        }
        data
    }

    fn add<I>(&self, end: End, ops: I) -> Result<Rc<ContentStream>>
    where
        I: IntoIterator,
        I::Item: WriteContent,
    {
        let page = self.page()?;
        let data = self.serialize(ops);
        // Validate before touching the graph.
        let scratch = Binding {
            document: self.doc.id(),
            objref: PDFObjRef::new(0, 0),
        };
        parse_content(data.clone(), scratch, &self.params)?;

        let objref = self
            .doc
            .add_indirect(PDFObject::Stream(Box::new(PDFStream::from_data(data))))?;
        let node = self.doc.get_indirect(objref)?;
        {
            let _section = ObserverFreeSection::enter(self);
            self.insert_reference(page, objref, end)?;
        }

        self.regroup(page)?;
        let stream = self
            .streams
            .borrow()
            .iter()
            .find(|cs| cs.backing_streams().iter().any(|b| b.node == node))
            .cloned()
            .ok_or_else(|| PdfError::NotFound(format!("stream {objref} in /Contents")))?;
        debug!(%objref, ?end, streams = stream.backing_streams().len(), "content stream added");
        self.status.changed();
        Ok(stream)
    }

    /// Group `/Contents` again after an edit of the entry. Groups whose
    /// backing streams are unchanged keep their identity. A failure leaves
    /// the page invalid, since the graph edit has already been made.
    fn regroup(&self, page: NodeId) -> Result<()> {
        let groups = self
            .contents_streams(page)
            .and_then(|nodes| ContentStream::parse_groups(&*self.doc, &nodes, &self.params));
        let groups = match groups {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "contents no longer parse after edit; page marked invalid");
                self.status.set_invalid(true);
                return Err(e);
            }
        };
        let old = self.streams.borrow().clone();
        let fresh: Vec<Rc<ContentStream>> = groups
            .into_iter()
            .map(|group| {
                old.iter()
                    .find(|cs| cs.backing_streams() == group.backing_streams())
                    .cloned()
                    .unwrap_or_else(|| Rc::new(group))
            })
            .collect();
        *self.streams.borrow_mut() = fresh;
        Ok(())
    }

    fn insert_reference(&self, page: NodeId, objref: PDFObjRef, end: End) -> Result<()> {
        let Some(entry) = self.doc.get_property(page, CONTENTS)? else {
            return self.doc.set_property(page, CONTENTS, PDFObject::Ref(objref));
        };
        let node = self
            .doc
            .resolve_node(&entry)?
            .ok_or_else(|| PdfError::InvalidObject("/Contents is neither a stream nor an array".into()))?;
        match self.doc.kind(node)? {
            ObjKind::Stream => {
                let Value::Ref(existing) = entry else {
                    return Err(PdfError::InvalidObject(
                        "/Contents holds a direct stream".into(),
                    ));
                };
                let (first, second) = match end {
                    End::Front => (objref, existing),
                    End::Back => (existing, objref),
                };
                self.doc.set_property(
                    page,
                    CONTENTS,
                    PDFObject::Array(vec![PDFObject::Ref(first), PDFObject::Ref(second)]),
                )
            }
            ObjKind::Array => {
                let index = match end {
                    End::Front => 0,
                    End::Back => self.doc.array_len(node)?,
                };
                self.doc.array_insert(node, index, PDFObject::Ref(objref))
            }
            kind => Err(PdfError::InvalidObject(format!(
                "/Contents is a {kind}, neither a stream nor an array"
            ))),
        }
    }

    fn remove(&self, stream: &ContentStream) -> Result<()> {
        let page = self.page()?;
        let position = self.position(stream.id())?;
        if !self.doc.contains_property(page, CONTENTS)? {
            return Err(PdfError::InvalidObject("page has no /Contents entry".into()));
        }
        {
            let _section = ObserverFreeSection::enter(self);
            for backing in stream.backing_streams() {
                self.remove_reference(page, backing.objref)?;
            }
        }
        self.regroup(page)?;
        debug!(position, "content stream removed");
        self.status.changed();
        Ok(())
    }

    fn remove_reference(&self, page: NodeId, objref: PDFObjRef) -> Result<()> {
        let missing = || PdfError::NotFound(format!("stream {objref} in /Contents"));
        let entry = self.doc.get_property(page, CONTENTS)?.ok_or_else(missing)?;
        let node = self
            .doc
            .resolve_node(&entry)?
            .ok_or_else(|| PdfError::InvalidObject("/Contents is neither a stream nor an array".into()))?;
        match self.doc.kind(node)? {
            ObjKind::Stream if self.doc.node_ref(node) == Some(objref) => {
                self.doc.set_property(page, CONTENTS, PDFObject::Array(Vec::new()))
            }
            ObjKind::Stream => Err(missing()),
            ObjKind::Array => {
                for index in 0..self.doc.array_len(node)? {
                    if self.doc.array_get(node, index)? == Value::Ref(objref) {
                        return self.doc.array_remove(node, index);
                    }
                }
                Err(missing())
            }
            kind => Err(PdfError::InvalidObject(format!(
                "/Contents is a {kind}, neither a stream nor an array"
            ))),
        }
    }

    fn swap(&self, a: usize, b: usize) -> Result<()> {
        let page = self.page()?;
        let mut list = self.streams.borrow().clone();
        list.swap(a, b);
        {
            let _section = ObserverFreeSection::enter(self);
            self.write_contents(page, &list)?;
        }
        self.regroup(page)?;
        self.status.changed();
        Ok(())
    }

    fn write_contents(&self, page: NodeId, streams: &[Rc<ContentStream>]) -> Result<()> {
        let refs = streams
            .iter()
            .flat_map(|cs| cs.backing_streams())
            .map(|backing| PDFObject::Ref(backing.objref))
            .collect();
        if self.doc.contains_property(page, CONTENTS)? {
            self.doc.del_property(page, CONTENTS)?;
        }
        self.doc.set_property(page, CONTENTS, PDFObject::Array(refs))
    }

    fn display_params(&self, encoding: Option<&str>) -> Result<DisplayParams> {
        let page = self.page()?;
        let encoding = match encoding {
            Some(name) => TextEncoding::from_name(name)?,
            None => self.backend.default_encoding(),
        };
        Ok(DisplayParams {
            encoding,
            ..DisplayParams::new(media_box(&*self.doc, page))
        })
    }

    fn register_page_watch(&self, page: NodeId) -> Result<()> {
        match self.watchdog_handle() {
            Some(watchdog) => self.doc.register_observer(page, watchdog),
            None => Ok(()),
        }
    }

    /// Point the entry registration at the node `/Contents` resolves to now.
    fn sync_entry_watch(&self) -> Result<()> {
        let (Some(page), Some(watchdog)) = (self.page.get(), self.watchdog_handle()) else {
            return Ok(());
        };
        let current = match self.doc.get_property(page, CONTENTS)? {
            Some(entry) => self.doc.resolve_node(&entry)?,
            None => None,
        };
        if current == self.watched_entry.get() {
            return Ok(());
        }
        if let Some(old) = self.watched_entry.take() {
            self.doc.unregister_observer(old, &watchdog)?;
        }
        if let Some(node) = current {
            self.doc.register_observer(node, watchdog)?;
        }
        self.watched_entry.set(current);
        Ok(())
    }

    fn unwatch_entry(&self) {
        let (Some(old), Some(watchdog)) = (self.watched_entry.take(), self.watchdog_handle()) else {
            return;
        };
        if let Err(e) = self.doc.unregister_observer(old, &watchdog) {
            warn!(error = %e, "failed to unregister contents watchdog");
        }
    }

    fn on_change(&self, node: NodeId, new_value: Option<&Value>, context: &ChangeContext) {
        if self.suppressed.get() > 0 {
            trace!(?node, "change inside observer-free section ignored");
            return;
        }
        let Some(page) = self.page.get() else {
            return;
        };
        if node == page {
            let ChangeContext::DictEntry { key, .. } = context else {
                return;
            };
            if key != CONTENTS {
                return;
            }
            if new_value.is_none() {
                debug!("/Contents removed; watchdog detached");
                self.unwatch_entry();
                return;
            }
            if let Err(e) = self.sync_entry_watch() {
                self.invalidate(&e);
                return;
            }
        } else if Some(node) != self.watched_entry.get() {
            return;
        }
        if let Err(e) = self.parse() {
            self.invalidate(&e);
        }
    }

    fn invalidate(&self, error: &PdfError) {
        warn!(error = %error, "reparse after outside change failed; page marked invalid");
        self.status.set_invalid(true);
    }

    fn reset(&self) {
        let Some(page) = self.page.take() else {
            return;
        };
        if let Some(watchdog) = self.watchdog_handle() {
            if let Err(e) = self.doc.unregister_observer(page, &watchdog) {
                warn!(error = %e, "failed to unregister page watchdog");
            }
        }
        self.unwatch_entry();
        self.watchdog.borrow_mut().take();
        self.streams.borrow_mut().clear();
        trace!("page contents reset");
    }
}
