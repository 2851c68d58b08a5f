//! Tests for editing a page's content streams through PageContents.
//!
//! After every edit the cached list must name the same backing streams, in
//! the same order, as the page's `/Contents` entry in the graph.

use quire_core::content::{ContentParams, PdfOperator};
use quire_core::document::{CONTENTS, DocumentGraph, MemoryDocument, NodeId, Page, PageContents};
use quire_core::interp::PlainTextBackend;
use quire_core::model::{Operand, PDFDict, PDFObjRef, PDFObject, PDFStream};
use quire_core::PdfError;
use std::rc::Rc;

// ============================================================================
// Fixtures
// ============================================================================

fn new_doc() -> (Rc<MemoryDocument>, Rc<dyn DocumentGraph>) {
    let doc = Rc::new(MemoryDocument::new());
    let graph: Rc<dyn DocumentGraph> = doc.clone();
    (doc, graph)
}

fn add_stream(doc: &MemoryDocument, data: &[u8]) -> PDFObjRef {
    doc.add_indirect(PDFObject::Stream(Box::new(PDFStream::from_data(data.to_vec()))))
        .expect("add stream")
}

fn add_page(doc: &MemoryDocument, contents: Option<PDFObject>) -> NodeId {
    let mut dict = PDFDict::new();
    dict.insert("Type".to_string(), PDFObject::Name("Page".to_string()));
    if let Some(contents) = contents {
        dict.insert(CONTENTS.to_string(), contents);
    }
    let objref = doc.add_indirect(PDFObject::Dict(dict)).expect("add page");
    doc.get_indirect(objref).expect("page node")
}

fn refs_array(refs: &[PDFObjRef]) -> PDFObject {
    PDFObject::Array(refs.iter().copied().map(PDFObject::Ref).collect())
}

fn op(name: &str, operands: Vec<Operand>) -> PdfOperator {
    PdfOperator::simple(name, operands).expect("valid operator")
}

/// Stream references named by `/Contents`, read straight from the graph.
fn graph_refs(doc: &MemoryDocument, page: NodeId) -> Vec<PDFObjRef> {
    let Some(entry) = doc.get_property(page, CONTENTS).expect("read /Contents") else {
        return Vec::new();
    };
    let items = match doc.to_object(&entry).expect("materialize /Contents") {
        PDFObject::Ref(objref) => {
            let node = doc.get_indirect(objref).expect("resolve /Contents");
            match doc.node_object(node).expect("materialize target") {
                PDFObject::Stream(_) => return vec![objref],
                PDFObject::Array(items) => items,
                other => panic!("unexpected /Contents target {other:?}"),
            }
        }
        PDFObject::Array(items) => items,
        other => panic!("unexpected /Contents value {other:?}"),
    };
    items
        .into_iter()
        .map(|item| match item {
            PDFObject::Ref(objref) => objref,
            other => panic!("unexpected /Contents element {other:?}"),
        })
        .collect()
}

/// Backing stream references of the cached list, in order.
fn cached_refs(contents: &PageContents) -> Vec<PDFObjRef> {
    contents
        .streams()
        .iter()
        .flat_map(|cs| cs.backing_streams().iter().map(|b| b.objref).collect::<Vec<_>>())
        .collect()
}

fn assert_in_step(doc: &MemoryDocument, page: &Page) {
    assert_eq!(
        cached_refs(page.contents()),
        graph_refs(doc, page.node()),
        "cached list and /Contents disagree"
    );
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_page_without_contents() {
    let (doc, graph) = new_doc();
    let node = add_page(&doc, None);
    let page = Page::open(graph, node).expect("open page");

    assert!(page.contents().is_empty());
    assert!(page.is_valid());
    assert_eq!(page.contents().to_text(), "");
}

#[test]
fn test_page_with_single_stream() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"q 1 0 0 RG Q");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let page = Page::open(graph, node).expect("open page");

    assert_eq!(page.contents().len(), 1);
    assert_eq!(page.contents().to_text(), "q\n1 0 0 RG\nQ\n");
    assert_in_step(&doc, &page);
}

#[test]
fn test_contents_array_groups_split_blocks() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"q BT /F1 12 Tf");
    let b = add_stream(&doc, b"(a) Tj ET");
    let c = add_stream(&doc, b"Q");
    let node = add_page(&doc, Some(refs_array(&[a, b, c])));
    let page = Page::open(graph, node).expect("open page");

    assert_eq!(page.contents().len(), 2);
    let first = page.contents().content_stream(0).expect("first group");
    assert_eq!(first.backing_streams().len(), 2);
    assert_in_step(&doc, &page);
}

#[test]
fn test_contents_of_wrong_kind_marks_page_invalid() {
    let (doc, graph) = new_doc();
    let node = add_page(&doc, Some(PDFObject::Int(5)));
    let page = Page::open(graph, node).expect("open page");

    assert!(!page.is_valid());
    assert!(page.contents().is_empty());
    let err = page.contents().parse().expect_err("integer /Contents");
    assert!(matches!(err, PdfError::InvalidObject(_)));
}

#[test]
fn test_contents_array_with_non_stream_element() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"q Q");
    let node = add_page(
        &doc,
        Some(PDFObject::Array(vec![PDFObject::Ref(s), PDFObject::Int(1)])),
    );
    let page = Page::open(graph, node).expect("open page");

    assert!(!page.is_valid());
    let err = page.revalidate().expect_err("integer element");
    assert!(matches!(err, PdfError::InvalidObject(_)));
}

#[test]
fn test_malformed_contents_marks_page_invalid() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"1 0 (x) RG");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let page = Page::open(graph, node).expect("open page");

    assert!(!page.is_valid());
    let err = page.revalidate().expect_err("malformed");
    assert!(err.is_malformed());
}

#[test]
fn test_reparse_is_idempotent() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"q 0.5 g");
    let b = add_stream(&doc, b"0 0 10 10 re f Q");
    let node = add_page(&doc, Some(refs_array(&[a, b])));
    let page = Page::open(graph, node).expect("open page");

    let before = page.contents().to_text();
    let ids: Vec<_> = page.contents().streams().iter().map(|cs| cs.id()).collect();
    page.contents().reparse().expect("reparse");
    page.contents().reparse().expect("reparse again");

    assert_eq!(page.contents().to_text(), before);
    let after: Vec<_> = page.contents().streams().iter().map(|cs| cs.id()).collect();
    assert_eq!(after, ids);
    assert_in_step(&doc, &page);
}

// ============================================================================
// Adding
// ============================================================================

#[test]
fn test_add_to_page_without_contents() {
    let (doc, graph) = new_doc();
    let node = add_page(&doc, None);
    let page = Page::open(graph, node).expect("open page");

    let added = page
        .contents()
        .add_to_back([op("q", vec![]), op("Q", vec![])])
        .expect("add");
    assert_eq!(added.len(), 2);

    // A lone new stream is stored as a single reference.
    let entry = doc.get_property(node, CONTENTS).expect("read").expect("entry");
    assert_eq!(
        doc.to_object(&entry).expect("materialize"),
        PDFObject::Ref(added.backing_streams()[0].objref)
    );
    assert_in_step(&doc, &page);
}

#[test]
fn test_add_to_front_turns_single_stream_into_array() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"0 0 m 10 10 l S");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let page = Page::open(graph, node).expect("open page");

    let added = page
        .contents()
        .add_to_front([op("g", vec![Operand::real(0.5)])])
        .expect("add");
    let new_ref = added.backing_streams()[0].objref;

    assert_eq!(graph_refs(&doc, node), [new_ref, s]);
    assert_eq!(page.contents().len(), 2);
    assert_eq!(page.contents().content_stream(0).expect("front").id(), added.id());
    assert_in_step(&doc, &page);
}

#[test]
fn test_add_to_back_of_array() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"q");
    let b = add_stream(&doc, b"Q");
    let node = add_page(&doc, Some(refs_array(&[a, b])));
    let page = Page::open(graph, node).expect("open page");
    assert_eq!(page.contents().len(), 2);

    let added = page
        .contents()
        .add_to_back([op("re", vec![0, 0, 5, 5].into_iter().map(Operand::int).collect())])
        .expect("add");
    assert_eq!(
        graph_refs(&doc, node),
        [a, b, added.backing_streams()[0].objref]
    );
    assert_in_step(&doc, &page);
}

#[test]
fn test_add_copies_operators_from_another_stream() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"BT /F1 10 Tf (copy) Tj ET");
    let source_page = add_page(&doc, Some(PDFObject::Ref(s)));
    let target_page = add_page(&doc, None);
    let source = Page::open(graph.clone(), source_page).expect("open source");
    let target = Page::open(graph, target_page).expect("open target");

    let original = source.contents().content_stream(0).expect("source stream");
    let copy = target.contents().add_to_back(original.iter()).expect("copy");
    assert_eq!(copy.to_text(), original.to_text());
    assert_ne!(copy.binding().objref, original.binding().objref);
}

#[test]
fn test_add_rejects_malformed_operators_before_editing() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"q Q");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let page = Page::open(graph, node).expect("open page");
    let revision = page.revision();

    // Written as "1 RG", which does not parse back.
    let bogus = PdfOperator::unknown("RG", vec![Operand::int(1)]);
    let err = page.contents().add_to_back([bogus]).expect_err("malformed");
    assert!(err.is_malformed());

    assert_eq!(graph_refs(&doc, node), [s]);
    assert_eq!(page.contents().len(), 1);
    assert_eq!(page.revision(), revision);
}

#[test]
fn test_add_to_direct_stream_contents_fails() {
    let (doc, graph) = new_doc();
    let node = add_page(
        &doc,
        Some(PDFObject::Stream(Box::new(PDFStream::from_data(b"q Q".to_vec())))),
    );
    let page = Page::open(graph, node).expect("open page");

    let err = page
        .contents()
        .add_to_back([op("q", vec![]), op("Q", vec![])])
        .expect_err("direct stream cannot join an array");
    assert!(matches!(err, PdfError::InvalidObject(_)));
}

#[test]
fn test_change_tag_marks_added_streams() {
    let (doc, graph) = new_doc();
    let node = add_page(&doc, None);
    let params = ContentParams::new().with_change_tag("QuireEdit");
    let page = Page::with_params(graph, node, params, Rc::new(PlainTextBackend)).expect("open");

    let added = page.contents().add_to_back([op("q", vec![]), op("Q", vec![])]).expect("add");
    let front = added.front().expect("tag");
    assert_eq!(front.name(), "MP");
    assert_eq!(front.operands()[0].as_name(), Some("QuireEdit"));

    let data = doc
        .stream_data(added.backing_streams()[0].node)
        .expect("stream data");
    assert!(data.starts_with(b"/QuireEdit MP\n"));
}

// ============================================================================
// Removing
// ============================================================================

#[test]
fn test_remove_lone_stream_leaves_empty_array() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"q Q");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let page = Page::open(graph, node).expect("open page");

    page.contents().remove(0).expect("remove");
    assert!(page.contents().is_empty());
    let entry = doc.get_property(node, CONTENTS).expect("read").expect("entry kept");
    assert_eq!(doc.to_object(&entry).expect("materialize"), PDFObject::Array(vec![]));
    assert_in_step(&doc, &page);
}

#[test]
fn test_remove_group_drops_every_backing_stream() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"BT");
    let b = add_stream(&doc, b"ET");
    let c = add_stream(&doc, b"q Q");
    let node = add_page(&doc, Some(refs_array(&[a, b, c])));
    let page = Page::open(graph, node).expect("open page");
    assert_eq!(page.contents().len(), 2);

    let group = page.contents().content_stream(0).expect("group");
    page.contents().remove_stream(&group).expect("remove");
    assert_eq!(graph_refs(&doc, node), [c]);
    assert_in_step(&doc, &page);
}

#[test]
fn test_remove_out_of_range() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"q Q");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let page = Page::open(graph, node).expect("open page");

    let err = page.contents().remove(1).expect_err("one stream only");
    assert!(matches!(err, PdfError::OutOfRange { index: 1, len: 1 }));
    assert_in_step(&doc, &page);
}

#[test]
fn test_remove_foreign_stream_is_not_found() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"q Q");
    let b = add_stream(&doc, b"q Q");
    let first = add_page(&doc, Some(PDFObject::Ref(a)));
    let second = add_page(&doc, Some(PDFObject::Ref(b)));
    let first = Page::open(graph.clone(), first).expect("open first");
    let second = Page::open(graph, second).expect("open second");

    let foreign = second.contents().content_stream(0).expect("stream");
    let err = first.contents().remove_stream(&foreign).expect_err("foreign");
    assert!(matches!(err, PdfError::NotFound(_)));
    let err = first.contents().move_above(&foreign).expect_err("foreign");
    assert!(matches!(err, PdfError::NotFound(_)));
}

// ============================================================================
// Reordering
// ============================================================================

#[test]
fn test_move_above_and_below() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"0 g");
    let b = add_stream(&doc, b"1 g");
    let c = add_stream(&doc, b"0.5 g");
    let node = add_page(&doc, Some(refs_array(&[a, b, c])));
    let page = Page::open(graph, node).expect("open page");

    let first = page.contents().content_stream(0).expect("a");
    page.contents().move_above(&first).expect("move a above b");
    assert_eq!(graph_refs(&doc, node), [b, a, c]);
    assert_in_step(&doc, &page);

    let last = page.contents().content_stream(2).expect("c");
    page.contents().move_below(&last).expect("move c below a");
    assert_eq!(graph_refs(&doc, node), [b, c, a]);
    assert_in_step(&doc, &page);
}

#[test]
fn test_move_at_the_ends_is_out_of_range() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"q");
    let b = add_stream(&doc, b"Q");
    let node = add_page(&doc, Some(refs_array(&[a, b])));
    let page = Page::open(graph, node).expect("open page");

    let err = page.contents().move_above_at(1).expect_err("last stream");
    assert!(matches!(err, PdfError::OutOfRange { .. }));
    let err = page.contents().move_below_at(0).expect_err("first stream");
    assert!(matches!(err, PdfError::OutOfRange { .. }));
    let err = page.contents().move_below_at(2).expect_err("past the end");
    assert!(matches!(err, PdfError::OutOfRange { .. }));
    assert_eq!(graph_refs(&doc, node), [a, b]);
}

#[test]
fn test_move_index_overflow_is_out_of_range() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"q Q");
    let node = add_page(&doc, Some(refs_array(&[a])));
    let page = Page::open(graph, node).expect("open page");

    let err = page.contents().move_above_at(usize::MAX).expect_err("huge index");
    assert!(matches!(err, PdfError::OutOfRange { index: usize::MAX, len: 1 }));
    let err = page.contents().move_below_at(usize::MAX).expect_err("huge index");
    assert!(matches!(err, PdfError::OutOfRange { index: usize::MAX, len: 1 }));
    assert_eq!(graph_refs(&doc, node), [a]);
}

#[test]
fn test_add_after_open_block_joins_its_group() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"BT /F1 12 Tf (a) Tj");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let page = Page::open(graph, node).expect("open page");
    let contents = page.contents();

    let added = contents
        .add_to_back([op("q", vec![]), op("Q", vec![])])
        .expect("add");
    assert_eq!(added.backing_streams().len(), 2, "new stream continues the open block");
    assert_in_step(&doc, &page);

    let len = contents.len();
    let text = contents.to_text();
    contents.parse().expect("parse");
    assert_eq!(contents.len(), len);
    assert_eq!(contents.to_text(), text);
    assert_eq!(len, 1);
    assert!(text.trim_end().ends_with("q\nQ\nET"), "{text}");
}

#[test]
fn test_edits_keep_identity_of_untouched_streams() {
    let (doc, graph) = new_doc();
    let a = add_stream(&doc, b"0 g");
    let b = add_stream(&doc, b"1 g");
    let node = add_page(&doc, Some(refs_array(&[a, b])));
    let page = Page::open(graph, node).expect("open page");
    let contents = page.contents();

    let first = contents.content_stream(0).expect("a");
    contents.add_to_back([op("h", vec![])]).expect("add");
    contents.remove(1).expect("remove b");
    assert_eq!(contents.content_stream(0).expect("a").id(), first.id());
    contents.move_above(&first).expect("move a above the added stream");
    assert_eq!(contents.content_stream(1).expect("a").id(), first.id());
    assert_in_step(&doc, &page);
}

#[test]
fn test_mixed_edits_stay_in_step() {
    let (doc, graph) = new_doc();
    let node = add_page(&doc, None);
    let page = Page::open(graph, node).expect("open page");
    let contents = page.contents();

    contents.add_to_back([op("q", vec![]), op("Q", vec![])]).expect("add");
    assert_in_step(&doc, &page);
    contents.add_to_front([op("w", vec![Operand::int(2)])]).expect("add");
    assert_in_step(&doc, &page);
    contents.add_to_back([op("h", vec![])]).expect("add");
    assert_in_step(&doc, &page);
    contents.move_below_at(2).expect("move");
    assert_in_step(&doc, &page);
    contents.remove(0).expect("remove");
    assert_in_step(&doc, &page);
    contents.set_contents().expect("rewrite");
    assert_in_step(&doc, &page);

    let names: Vec<_> = contents
        .streams()
        .iter()
        .map(|cs| cs.front().map(|op| op.name().to_string()))
        .collect();
    assert_eq!(names, [Some("h".to_string()), Some("q".to_string())]);

    contents.parse().expect("parse from graph");
    assert_eq!(contents.len(), 2);
    assert_in_step(&doc, &page);
}

#[test]
fn test_set_contents_writes_array() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"q Q");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let page = Page::open(graph, node).expect("open page");

    page.contents().set_contents().expect("rewrite");
    let entry = doc.get_property(node, CONTENTS).expect("read").expect("entry");
    assert_eq!(doc.to_object(&entry).expect("materialize"), refs_array(&[s]));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_reset_makes_contents_inert() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"q Q");
    let node = add_page(&doc, Some(PDFObject::Ref(s)));
    let stream_node = doc.get_indirect(s).expect("stream node");
    let page = Page::open(graph, node).expect("open page");
    assert_eq!(doc.observer_count(node), 1);
    assert_eq!(doc.observer_count(stream_node), 1);

    page.contents().reset();
    assert!(page.contents().is_reset());
    assert!(page.contents().is_empty());
    assert_eq!(doc.observer_count(node), 0);
    assert_eq!(doc.observer_count(stream_node), 0);

    assert!(matches!(page.contents().parse(), Err(PdfError::InvalidObject(_))));
    let err = page
        .contents()
        .add_to_back([op("q", vec![]), op("Q", vec![])])
        .expect_err("reset");
    assert!(matches!(err, PdfError::InvalidObject(_)));
    assert!(matches!(
        page.contents().get_text(None, None),
        Err(PdfError::InvalidObject(_))
    ));
    assert_eq!(graph_refs(&doc, node), [s]);
}

#[test]
fn test_page_open_requires_dictionary() {
    let (doc, graph) = new_doc();
    let s = add_stream(&doc, b"q Q");
    let node = doc.get_indirect(s).expect("stream node");
    assert!(matches!(
        Page::open(graph, node),
        Err(PdfError::TypeError { .. })
    ));
}

#[test]
fn test_media_box_is_inherited() {
    let (doc, graph) = new_doc();
    let mut parent = PDFDict::new();
    parent.insert("Type".to_string(), PDFObject::Name("Pages".to_string()));
    parent.insert(
        "MediaBox".to_string(),
        PDFObject::Array(vec![
            PDFObject::Int(0),
            PDFObject::Int(0),
            PDFObject::Real(200.5),
            PDFObject::Int(300),
        ]),
    );
    let parent = doc.add_indirect(PDFObject::Dict(parent)).expect("add parent");

    let mut dict = PDFDict::new();
    dict.insert("Parent".to_string(), PDFObject::Ref(parent));
    let objref = doc.add_indirect(PDFObject::Dict(dict)).expect("add page");
    let node = doc.get_indirect(objref).expect("page node");

    let page = Page::open(graph.clone(), node).expect("open page");
    assert_eq!(page.media_box(), (0.0, 0.0, 200.5, 300.0));

    let orphan = add_page(&doc, None);
    let orphan = Page::open(graph, orphan).expect("open page");
    assert_eq!(orphan.media_box(), (0.0, 0.0, 612.0, 792.0));
}
