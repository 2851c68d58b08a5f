//! quire - typed PDF page content streams kept in step with a document graph.
//!
//! Content streams are parsed into validated operator sequences
//! ([`content`]), owned per page by a [`PageContents`] manager that edits the
//! page's `/Contents` entry through the [`DocumentGraph`] interface and
//! follows outside changes through an observer ([`document`]). Text
//! extraction and search go through a pluggable backend ([`interp`]).

pub mod content;
pub mod document;
pub mod error;
pub mod interp;
pub mod model;
pub mod parser;
pub mod utils;

pub use content::{ContentParams, ContentStream, PdfOperator, WriteContent};
pub use document::{DocumentGraph, MemoryDocument, Page, PageContents};
pub use error::{PdfError, Result};
