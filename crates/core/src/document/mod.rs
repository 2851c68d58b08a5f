//! Document side of content editing.
//!
//! This module contains:
//! - `graph` - document object graph interface and observer protocol
//! - `memory` - in-memory graph implementation (MemoryDocument)
//! - `contents` - page contents manager (PageContents)
//! - `page` - page wrapper with revision and validity state (Page)

pub mod contents;
pub mod graph;
pub mod memory;
pub mod page;

// Re-export main types for convenience
pub use contents::{CONTENTS, PageContents};
pub use graph::{ChangeContext, DocumentGraph, NodeId, Observer, Value};
pub use memory::MemoryDocument;
pub use page::{Page, PageStatus, media_box};
