//! Plain text backend.
//!
//! A minimal interpreter for the text-related part of the operator set:
//! graphics state save/restore, `cm`, the text object and text state
//! operators and the four text showing operators. Fonts are not loaded;
//! every glyph advances by half the font size.

use crate::content::operator::PdfOperator;
use crate::content::sequence::OpRef;
use crate::content::stream::ContentStream;
use crate::error::Result;
use crate::interp::device::{
    ContentDevice, DisplayParams, Glyph, GlyphPage, TextBackend, TextEncoding, TextPage,
};
use crate::model::operand::Operand;
use crate::utils::{
    MATRIX_IDENTITY, Matrix, apply_matrix_pt, apply_matrix_rect, mult_matrix, translate_matrix,
};
use std::rc::Rc;
use tracing::trace;

/// Glyph advance as a fraction of the font size.
pub const GLYPH_ADVANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct TextState {
    font_size: f64,
    char_space: f64,
    word_space: f64,
    /// Horizontal scaling in percent
    scaling: f64,
    leading: f64,
    rise: f64,
    matrix: Matrix,
    line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_size: 0.0,
            char_space: 0.0,
            word_space: 0.0,
            scaling: 100.0,
            leading: 0.0,
            rise: 0.0,
            matrix: MATRIX_IDENTITY,
            line_matrix: MATRIX_IDENTITY,
        }
    }
}

/// Runs operators against a device.
pub struct TextInterpreter<'d, D: ContentDevice> {
    device: &'d mut D,
    encoding: TextEncoding,
    text: TextState,
    stack: Vec<(Matrix, TextState)>,
}

impl<'d, D: ContentDevice> TextInterpreter<'d, D> {
    pub fn new(device: &'d mut D, encoding: TextEncoding) -> Self {
        Self {
            device,
            encoding,
            text: TextState::default(),
            stack: Vec::new(),
        }
    }

    pub fn run(&mut self, stream: &ContentStream) {
        for op in stream.iter() {
            self.execute(op);
        }
    }

    fn execute(&mut self, op: OpRef<'_>) {
        match op.op() {
            PdfOperator::Composite(block) => {
                self.dispatch(block.start().name(), block.start().operands());
                for child in op.children() {
                    self.execute(child);
                }
                self.dispatch(block.end_name(), &[]);
            }
            PdfOperator::InlineImage(_) => {}
            other => self.dispatch(other.name(), other.operands()),
        }
    }

    fn dispatch(&mut self, name: &str, args: &[Operand]) {
        match name {
            "q" => self.stack.push((self.device.ctm(), self.text)),
            "Q" => {
                if let Some((ctm, text)) = self.stack.pop() {
                    self.device.set_ctm(ctm);
                    self.text = text;
                }
            }
            "cm" => {
                if let Some([a, b, c, d, e, f]) = nums(args) {
                    let ctm = mult_matrix((a, b, c, d, e, f), self.device.ctm());
                    self.device.set_ctm(ctm);
                }
            }
            "BT" => {
                self.text.matrix = MATRIX_IDENTITY;
                self.text.line_matrix = MATRIX_IDENTITY;
            }
            "BMC" | "BDC" => {
                if let Some(tag) = args.first().and_then(Operand::as_name) {
                    self.device.begin_tag(tag, args.get(1));
                }
            }
            "EMC" => self.device.end_tag(),
            "MP" | "DP" => {
                if let Some(tag) = args.first().and_then(Operand::as_name) {
                    self.device.do_tag(tag, args.get(1));
                }
            }
            "Tf" => {
                if let Some(size) = args.get(1).and_then(Operand::as_num) {
                    self.text.font_size = size;
                }
            }
            "Tc" => set_num(args, &mut self.text.char_space),
            "Tw" => set_num(args, &mut self.text.word_space),
            "Tz" => set_num(args, &mut self.text.scaling),
            "TL" => set_num(args, &mut self.text.leading),
            "Ts" => set_num(args, &mut self.text.rise),
            "Td" => {
                if let Some([tx, ty]) = nums(args) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = nums(args) {
                    self.text.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some([a, b, c, d, e, f]) = nums(args) {
                    self.text.matrix = (a, b, c, d, e, f);
                    self.text.line_matrix = self.text.matrix;
                }
            }
            "T*" => self.next_line(),
            "Tj" => self.show_operand(args.first()),
            "'" => {
                self.next_line();
                self.show_operand(args.first());
            }
            "\"" => {
                if let Some([aw, ac]) = args.get(..2).and_then(nums::<2>) {
                    self.text.word_space = aw;
                    self.text.char_space = ac;
                }
                self.next_line();
                self.show_operand(args.get(2));
            }
            "TJ" => {
                for item in args.first().and_then(Operand::as_array).unwrap_or_default() {
                    if let Some(adjust) = item.as_num() {
                        let tx = -adjust / 1000.0 * self.text.font_size * self.text.scaling / 100.0;
                        self.text.matrix = translate_matrix(self.text.matrix, (tx, 0.0));
                    } else {
                        self.show_operand(Some(item));
                    }
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.text.line_matrix = translate_matrix(self.text.line_matrix, (tx, ty));
        self.text.matrix = self.text.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.text.leading);
    }

    fn show_operand(&mut self, operand: Option<&Operand>) {
        if let Some(bytes) = operand.and_then(Operand::as_bytes) {
            let text = self.encoding.decode(bytes);
            self.show(&text);
        }
    }

    fn show(&mut self, text: &str) {
        let state = self.text;
        let hscale = state.scaling / 100.0;
        let width = state.font_size * GLYPH_ADVANCE * hscale;
        let mut matrix = state.matrix;
        for ch in text.chars() {
            let trm = mult_matrix(matrix, self.device.ctm());
            let bbox = apply_matrix_rect(trm, (0.0, state.rise, width, state.rise + state.font_size));
            let (_, baseline) = apply_matrix_pt(trm, (0.0, state.rise));
            trace!(%ch, x = bbox.0, y = baseline, "glyph");
            self.device.render_glyph(Glyph {
                ch,
                bbox,
                baseline,
                size: bbox.3 - bbox.1,
            });
            let mut advance = state.font_size * GLYPH_ADVANCE + state.char_space;
            if ch == ' ' {
                advance += state.word_space;
            }
            matrix = translate_matrix(matrix, (advance * hscale, 0.0));
        }
        self.text.matrix = matrix;
    }
}

fn nums<const N: usize>(args: &[Operand]) -> Option<[f64; N]> {
    if args.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.as_num()?;
    }
    Some(out)
}

fn set_num(args: &[Operand], target: &mut f64) {
    if let Some(value) = args.first().and_then(Operand::as_num) {
        *target = value;
    }
}

/// Text-only backend over [`GlyphPage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextBackend;

impl PlainTextBackend {
    pub const fn new() -> Self {
        Self
    }

    /// Interpret `streams` in order and collect their glyphs.
    pub fn render(&self, streams: &[Rc<ContentStream>], params: &DisplayParams) -> GlyphPage {
        let mut page = GlyphPage::new();
        page.begin_page(params.media_box, params.ctm);
        let mut interpreter = TextInterpreter::new(&mut page, params.encoding);
        for stream in streams {
            interpreter.run(stream);
        }
        page.end_page();
        page
    }
}

impl TextBackend for PlainTextBackend {
    fn display_page(
        &self,
        streams: &[Rc<ContentStream>],
        params: &DisplayParams,
    ) -> Result<Box<dyn TextPage>> {
        Ok(Box::new(self.render(streams, params)))
    }
}
