//! Rendering backend interface.
//!
//! Page contents hand their parsed streams to a [`TextBackend`], which
//! interprets them against a [`ContentDevice`] and returns a [`TextPage`]
//! answering extraction and search queries. [`GlyphPage`] is a device that
//! records positioned glyphs and implements `TextPage` over them.

use crate::content::stream::ContentStream;
use crate::error::{PdfError, Result};
use crate::model::operand::Operand;
use crate::utils::{MATRIX_IDENTITY, Matrix, Rect, rect_contains, rect_union};
use std::rc::Rc;

/// Byte-to-character decoding for string operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Latin1,
    Utf8,
}

impl TextEncoding {
    /// Parse an encoding name (`latin1`, `iso-8859-1`, `utf-8`, ...).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            "utf8" | "utf-8" => Ok(Self::Utf8),
            _ => Err(PdfError::InvalidArgument(format!("unknown text encoding {name:?}"))),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Options for [`TextPage::find_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSearchParams {
    pub case_sensitive: bool,
}

/// Page geometry handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayParams {
    pub media_box: Rect,
    /// Initial transformation matrix
    pub ctm: Matrix,
    pub encoding: TextEncoding,
}

impl DisplayParams {
    pub const fn new(media_box: Rect) -> Self {
        Self {
            media_box,
            ctm: MATRIX_IDENTITY,
            encoding: TextEncoding::Latin1,
        }
    }
}

/// One glyph placed on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub bbox: Rect,
    /// Baseline y in device space
    pub baseline: f64,
    pub size: f64,
}

/// Receiver of interpreted page content.
pub trait ContentDevice {
    fn set_ctm(&mut self, ctm: Matrix);

    fn ctm(&self) -> Matrix;

    fn begin_page(&mut self, _media_box: Rect, _ctm: Matrix) {}

    fn end_page(&mut self) {}

    fn begin_tag(&mut self, _tag: &str, _props: Option<&Operand>) {}

    fn end_tag(&mut self) {}

    fn do_tag(&mut self, _tag: &str, _props: Option<&Operand>) {}

    fn render_glyph(&mut self, _glyph: Glyph) {}
}

/// Rendered page answering text queries.
pub trait TextPage {
    /// Text of the glyphs whose centre lies inside `region`, in content
    /// order; a baseline change starts a new line.
    fn text(&self, region: Rect) -> String;

    /// Next match of `needle` after the previous one, first call starting
    /// at the top of the page. `None` when there are no more matches.
    fn find_text(&mut self, needle: &str, params: &TextSearchParams) -> Option<Rect>;
}

/// Rendering/text service for parsed page contents.
pub trait TextBackend {
    fn default_encoding(&self) -> TextEncoding {
        TextEncoding::Latin1
    }

    fn display_page(
        &self,
        streams: &[Rc<ContentStream>],
        params: &DisplayParams,
    ) -> Result<Box<dyn TextPage>>;
}

/// Device recording glyphs; the [`TextPage`] of the plain text backend.
#[derive(Debug, Clone)]
pub struct GlyphPage {
    ctm: Matrix,
    glyphs: Vec<Glyph>,
    /// Flattened text with the glyph index of each character
    chars: Vec<(char, Option<usize>)>,
    cursor: usize,
}

impl Default for GlyphPage {
    fn default() -> Self {
        Self {
            ctm: MATRIX_IDENTITY,
            glyphs: Vec::new(),
            chars: Vec::new(),
            cursor: 0,
        }
    }
}

impl GlyphPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Separator to insert between two consecutive glyphs.
    fn separator(prev: &Glyph, glyph: &Glyph) -> Option<char> {
        let tolerance = prev.size.max(glyph.size).max(1.0) * 0.5;
        if (prev.baseline - glyph.baseline).abs() > tolerance {
            return Some('\n');
        }
        let gap = glyph.bbox.0 - prev.bbox.2;
        let spaced = prev.ch == ' ' || glyph.ch == ' ';
        (!spaced && gap > prev.size.max(1.0) * 0.25).then_some(' ')
    }

    fn matches(a: char, b: char, case_sensitive: bool) -> bool {
        if case_sensitive {
            return a == b;
        }
        a == b || a.to_lowercase().eq(b.to_lowercase())
    }
}

impl ContentDevice for GlyphPage {
    fn set_ctm(&mut self, ctm: Matrix) {
        self.ctm = ctm;
    }

    fn ctm(&self) -> Matrix {
        self.ctm
    }

    fn begin_page(&mut self, _media_box: Rect, ctm: Matrix) {
        self.ctm = ctm;
        self.glyphs.clear();
        self.chars.clear();
        self.cursor = 0;
    }

    fn render_glyph(&mut self, glyph: Glyph) {
        if let Some(sep) = self.glyphs.last().and_then(|prev| Self::separator(prev, &glyph)) {
            self.chars.push((sep, None));
        }
        self.chars.push((glyph.ch, Some(self.glyphs.len())));
        self.glyphs.push(glyph);
    }
}

impl TextPage for GlyphPage {
    fn text(&self, region: Rect) -> String {
        let mut out = String::new();
        let mut prev: Option<&Glyph> = None;
        for glyph in &self.glyphs {
            let (x0, y0, x1, y1) = glyph.bbox;
            if !rect_contains(region, ((x0 + x1) / 2.0, (y0 + y1) / 2.0)) {
                continue;
            }
            if let Some(sep) = prev.and_then(|p| Self::separator(p, glyph)) {
                out.push(sep);
            }
            out.push(glyph.ch);
            prev = Some(glyph);
        }
        out
    }

    fn find_text(&mut self, needle: &str, params: &TextSearchParams) -> Option<Rect> {
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() || needle.len() > self.chars.len() {
            return None;
        }
        for start in self.cursor..=(self.chars.len() - needle.len()) {
            let window = &self.chars[start..start + needle.len()];
            let hit = window
                .iter()
                .zip(&needle)
                .all(|(&(c, _), &n)| Self::matches(c, n, params.case_sensitive));
            if !hit {
                continue;
            }
            self.cursor = start + needle.len();
            return window
                .iter()
                .filter_map(|&(_, idx)| idx.map(|i| self.glyphs[i].bbox))
                .reduce(rect_union);
        }
        self.cursor = self.chars.len();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(ch: char, x: f64, y: f64) -> Glyph {
        Glyph {
            ch,
            bbox: (x, y, x + 5.0, y + 10.0),
            baseline: y,
            size: 10.0,
        }
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(TextEncoding::from_name("UTF-8").unwrap(), TextEncoding::Utf8);
        assert_eq!(TextEncoding::from_name("ISO-8859-1").unwrap(), TextEncoding::Latin1);
        assert!(TextEncoding::from_name("klingon").is_err());
        assert_eq!(TextEncoding::Latin1.decode(b"caf\xe9"), "café");
    }

    #[test]
    fn test_lines_and_region() {
        let mut page = GlyphPage::new();
        for (i, ch) in "ab".chars().enumerate() {
            page.render_glyph(glyph(ch, 10.0 + 5.0 * i as f64, 100.0));
        }
        page.render_glyph(glyph('c', 10.0, 80.0));
        assert_eq!(page.text((0.0, 0.0, 200.0, 200.0)), "ab\nc");
        assert_eq!(page.text((0.0, 90.0, 200.0, 200.0)), "ab");
    }

    #[test]
    fn test_find_is_repeatable() {
        let mut page = GlyphPage::new();
        for (i, ch) in "abAB".chars().enumerate() {
            page.render_glyph(glyph(ch, 5.0 * i as f64, 0.0));
        }
        let params = TextSearchParams::default();
        assert_eq!(page.find_text("ab", &params), Some((0.0, 0.0, 10.0, 10.0)));
        assert_eq!(page.find_text("ab", &params), Some((10.0, 0.0, 20.0, 10.0)));
        assert_eq!(page.find_text("ab", &params), None);
    }
}
