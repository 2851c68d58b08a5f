//! Content stream parsing modules.
//!
//! - `lexer`: byte-level tokenizer for one content stream
//! - `tokenizer`: operand assembly into a pull sequence of content tokens

pub mod lexer;
pub mod tokenizer;

// Re-export main types for convenience
pub use lexer::{ContentLexer, Token};
pub use tokenizer::{ContentToken, ContentTokenizer, InlineDict};
