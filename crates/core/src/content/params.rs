//! Parameters for content stream parsing and editing.

/// Content parsing/editing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentParams {
    /// Reject unbalanced block instructions instead of recovering.
    pub strict_nesting: bool,
    /// Marked-point tag (`/<tag> MP`) written at the start of every stream
    /// added by the editor.
    pub change_tag: Option<String>,
    /// Maximum depth of nested `BT`/`BMC`/`BDC` blocks.
    pub max_nesting: usize,
}

impl Default for ContentParams {
    fn default() -> Self {
        Self {
            strict_nesting: false,
            change_tag: None,
            max_nesting: 64,
        }
    }
}

impl ContentParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn strict(mut self) -> Self {
        self.strict_nesting = true;
        self
    }

    pub fn with_change_tag(mut self, tag: impl Into<String>) -> Self {
        self.change_tag = Some(tag.into());
        self
    }
}
