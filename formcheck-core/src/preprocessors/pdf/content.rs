//! Content stream interpretation
//!
//! Runs the text and graphics-state operators of a page content stream and
//! records where every visible glyph lands. Glyphs are then grouped into lines
//! by baseline and merged into spans of one family and size.
//!
//! Path painting, images and form XObjects are ignored.

use super::fonts::{number, FontInfo};
use crate::types::{BoundingBox, TextSpan};
use lopdf::content::Operation;
use lopdf::Object;
use std::collections::HashMap;
use std::sync::Arc;

/// Font resources of one page, keyed by resource name (`F1`, `TT0`, ...)
pub type FontMap = HashMap<Vec<u8>, Arc<FontInfo>>;

/// Glyph extent below the baseline, in em
const DESCENT: f64 = -0.2;
/// Glyph extent above the baseline, in em
const ASCENT: f64 = 0.8;
/// Baselines closer than this fraction of the size share a line
const LINE_TOLERANCE: f64 = 0.5;
/// Horizontal gap, as a fraction of size, rendered as a space
const WORD_GAP: f64 = 0.15;
/// Beyond this gap (fraction of size) glyphs start a new span
const MAX_JOIN_GAP: f64 = 3.0;
/// Overlap tolerated between neighbouring glyphs before they stop merging
const MAX_OVERLAP: f64 = 0.25;
const SIZE_EPSILON: f64 = 0.01;
/// Text rendering mode 3 paints nothing
const INVISIBLE_RENDER_MODE: i64 = 3;

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of the transformed unit y vector: the rendered size of 1pt text.
    pub fn vertical_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        let v: Vec<f64> = operands[..6].iter().map(number).collect::<Option<_>>()?;
        Some(Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }
}

/// Page MediaBox in default user space (bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PageGeometry {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// US Letter, used when a page declares no usable MediaBox
    pub fn letter() -> Self {
        Self::new(0.0, 0.0, 612.0, 792.0)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Convert a user-space point to top-left page coordinates.
    fn to_page_space(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.x0, self.y1 - y)
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Arc<FontInfo>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// Tz / 100
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
    render_mode: i64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

/// A visible glyph placed on the page
#[derive(Debug, Clone)]
struct PlacedGlyph {
    text: String,
    family: String,
    size: f64,
    bbox: BoundingBox,
    /// Baseline y in top-left page space
    baseline: f64,
}

struct Interpreter<'a> {
    fonts: &'a FontMap,
    geometry: PageGeometry,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    glyphs: Vec<PlacedGlyph>,
}

impl<'a> Interpreter<'a> {
    fn new(fonts: &'a FontMap, geometry: PageGeometry) -> Self {
        Self {
            fonts,
            geometry,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            glyphs: Vec::new(),
        }
    }

    fn run(&mut self, operations: &[Operation]) {
        for op in operations {
            self.execute(op);
        }
    }

    fn execute(&mut self, op: &Operation) {
        let operands = &op.operands;
        let num = |i: usize| operands.get(i).and_then(number);

        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.state.ctm = m.multiply(&self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::identity();
                self.line_matrix = Matrix::identity();
            }
            "ET" => {}
            "Tf" => {
                let name = operands.first().and_then(|o| o.as_name().ok());
                if let Some(name) = name {
                    self.state.font = Some(self.fonts.get(name).cloned().unwrap_or_else(|| {
                        let label = String::from_utf8_lossy(name);
                        tracing::debug!(font = %label, "Font resource not found");
                        Arc::new(FontInfo::fallback(&label))
                    }));
                }
                if let Some(size) = num(1) {
                    self.state.font_size = size;
                }
            }
            "Tc" => {
                if let Some(v) = num(0) {
                    self.state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = num(0) {
                    self.state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = num(0) {
                    self.state.horizontal_scale = v / 100.0;
                }
            }
            "TL" => {
                if let Some(v) = num(0) {
                    self.state.leading = v;
                }
            }
            "Ts" => {
                if let Some(v) = num(0) {
                    self.state.rise = v;
                }
            }
            "Tr" => {
                if let Some(v) = num(0) {
                    self.state.render_mode = v as i64;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.state.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(0.0, -self.state.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show_text(bytes);
                }
            }
            "'" => {
                self.next_line(0.0, -self.state.leading);
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show_text(bytes);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (num(0), num(1)) {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.next_line(0.0, -self.state.leading);
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show_text(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show_text(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0
                                        * self.state.font_size
                                        * self.state.horizontal_scale;
                                    self.advance(tx);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn advance(&mut self, tx: f64) {
        self.text_matrix = Matrix::translation(tx, 0.0).multiply(&self.text_matrix);
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let font = match &self.state.font {
            Some(font) => Arc::clone(font),
            None => Arc::new(FontInfo::fallback("Unknown")),
        };
        let fs = self.state.font_size;
        let th = self.state.horizontal_scale;
        let visible = self.state.render_mode != INVISIBLE_RENDER_MODE;

        for glyph in font.decode(bytes) {
            let render = Matrix::new(fs * th, 0.0, 0.0, fs, 0.0, self.state.rise)
                .multiply(&self.text_matrix)
                .multiply(&self.state.ctm);

            if visible && !glyph.text.is_empty() {
                self.place(&glyph.text, &font.family, glyph.width, &render);
            }

            let spacing = self.state.char_spacing
                + if glyph.is_space {
                    self.state.word_spacing
                } else {
                    0.0
                };
            self.advance((glyph.width * fs + spacing) * th);
        }
    }

    fn place(&mut self, text: &str, family: &str, width: f64, render: &Matrix) {
        let size = render.vertical_scale();
        if size <= 0.0 || !size.is_finite() {
            return;
        }
        let corners = [
            render.transform_point(0.0, DESCENT),
            render.transform_point(width, DESCENT),
            render.transform_point(0.0, ASCENT),
            render.transform_point(width, ASCENT),
        ];
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            let (px, py) = self.geometry.to_page_space(x, y);
            min_x = min_x.min(px);
            max_x = max_x.max(px);
            min_y = min_y.min(py);
            max_y = max_y.max(py);
        }
        let (origin_x, origin_y) = render.transform_point(0.0, 0.0);
        let (_, baseline) = self.geometry.to_page_space(origin_x, origin_y);

        self.glyphs.push(PlacedGlyph {
            text: text.to_string(),
            family: family.to_string(),
            size,
            bbox: BoundingBox::new(min_x, min_y, max_x, max_y),
            baseline,
        });
    }
}

/// Interpret a page's operators into text spans in reading order.
pub fn extract_spans(
    operations: &[Operation],
    fonts: &FontMap,
    geometry: PageGeometry,
) -> Vec<TextSpan> {
    let mut interpreter = Interpreter::new(fonts, geometry);
    interpreter.run(operations);
    build_spans(interpreter.glyphs)
}

/// Group glyphs into lines by baseline, then merge neighbours into spans.
fn build_spans(glyphs: Vec<PlacedGlyph>) -> Vec<TextSpan> {
    if glyphs.is_empty() {
        return Vec::new();
    }

    // (baseline, size) of each line, in order of first appearance
    let mut lines: Vec<(f64, f64)> = Vec::new();
    let mut assigned: Vec<(usize, PlacedGlyph)> = Vec::with_capacity(glyphs.len());
    for glyph in glyphs {
        let found = lines.iter().position(|(baseline, size)| {
            (glyph.baseline - baseline).abs() <= LINE_TOLERANCE * size.max(glyph.size)
        });
        let line = match found {
            Some(line) => line,
            None => {
                lines.push((glyph.baseline, glyph.size));
                lines.len() - 1
            }
        };
        assigned.push((line, glyph));
    }

    // Renumber lines top to bottom
    let mut order: Vec<usize> = (0..lines.len()).collect();
    order.sort_by(|a, b| lines[*a].0.total_cmp(&lines[*b].0));
    let mut rank = vec![0u32; lines.len()];
    for (position, line) in order.into_iter().enumerate() {
        rank[line] = position as u32;
    }

    let mut placed: Vec<(u32, PlacedGlyph)> = assigned
        .into_iter()
        .map(|(line, glyph)| (rank[line], glyph))
        .collect();
    placed.sort_by(|(la, a), (lb, b)| la.cmp(lb).then(a.bbox.x0.total_cmp(&b.bbox.x0)));

    let mut spans: Vec<TextSpan> = Vec::new();
    for (line, glyph) in placed {
        if let Some(span) = spans.last_mut() {
            let gap = glyph.bbox.x0 - span.bbox.x1;
            let joinable = span.line == line
                && span.font_family == glyph.family
                && (span.font_size - glyph.size).abs() < SIZE_EPSILON
                && gap >= -MAX_OVERLAP * glyph.size
                && gap <= MAX_JOIN_GAP * glyph.size;
            if joinable {
                if gap > WORD_GAP * glyph.size
                    && !span.text.ends_with(char::is_whitespace)
                    && !glyph.text.starts_with(char::is_whitespace)
                {
                    span.text.push(' ');
                }
                span.text.push_str(&glyph.text);
                span.bbox = span.bbox.union(&glyph.bbox);
                continue;
            }
        }
        spans.push(TextSpan {
            text: glyph.text,
            font_family: glyph.family,
            font_size: glyph.size,
            bbox: glyph.bbox,
            line,
        });
    }
    spans
}
