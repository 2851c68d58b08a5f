//! Content interpretation for text extraction.
//!
//! This module contains:
//! - `device`: backend traits, output device and glyph page
//! - `text`: plain text interpreter and backend

pub mod device;
pub mod text;

// Re-export main types for convenience
pub use device::{
    ContentDevice, DisplayParams, Glyph, GlyphPage, TextBackend, TextEncoding, TextPage,
    TextSearchParams,
};
pub use text::{PlainTextBackend, TextInterpreter};
