//! Page layout tree and figure-label location.
//!
//! pdfium exposes positioned glyphs rather than the block → line → span tree
//! the figure locator walks, so [`build_layout`] reconstructs one:
//!
//! * a **span** is a run of glyphs sharing font name, font size (±0.01 pt)
//!   and baseline (± half the font size), not interrupted by a line break;
//! * a **line** groups consecutive spans on the same baseline;
//! * a **block** groups consecutive lines whose vertical gap is at most
//!   1.5 × the previous line's height.
//!
//! All coordinates are page points with a top-left origin (y grows down).

use crate::config::FigureRules;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in page points, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One positioned character as reported by the PDF backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub bbox: BBox,
    pub font_name: String,
    pub font_size: f32,
}

impl Glyph {
    /// No font name or no size: a character the backend synthesised.
    pub fn is_unstyled(&self) -> bool {
        self.font_name.is_empty() || self.font_size <= 0.0
    }
}

/// A run of text in one font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub bbox: BBox,
    pub font_name: String,
    pub font_size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub spans: Vec<Span>,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub lines: Vec<Line>,
    pub bbox: BBox,
}

/// Structured layout of one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<Block>,
}

impl PageLayout {
    /// Every span in block → line → span order.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.blocks
            .iter()
            .flat_map(|b| b.lines.iter())
            .flat_map(|l| l.spans.iter())
    }
}

/// A span that looks like a figure label heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureLabelSpan {
    /// 1-indexed page number.
    pub page: usize,
    pub text: String,
    pub bbox: BBox,
    pub font_name: String,
    pub font_size: f32,
    pub is_bold: bool,
    pub in_left_margin: bool,
}

/// Group glyphs (in content-stream order) into a layout tree.
pub fn build_layout(glyphs: &[Glyph], width: f32, height: f32) -> PageLayout {
    // Pass 1: glyphs → spans, each tagged with whether it starts a new line.
    let mut spans: Vec<(Span, bool)> = Vec::new();
    let mut current: Option<Span> = None;
    let mut line_break = true;

    for g in glyphs {
        if g.ch == '\n' || g.ch == '\r' {
            if let Some(span) = current.take() {
                spans.push((span, line_break));
            }
            line_break = true;
            continue;
        }

        // Synthetic glyphs (pdfium's generated spaces) carry no font and may
        // carry no bounds; they belong to the run they sit in.
        if g.is_unstyled() {
            if let Some(span) = current.as_mut() {
                span.text.push(g.ch);
                if g.bbox.width() > 0.0 {
                    span.bbox = span.bbox.union(&g.bbox);
                }
            }
            continue;
        }

        if let Some(span) = current.as_mut().filter(|s| same_run(s, g)) {
            span.text.push(g.ch);
            span.bbox = span.bbox.union(&g.bbox);
            continue;
        }

        if let Some(span) = current.take() {
            let starts_line = line_break;
            // From here on `line_break` describes the span `g` opens.
            line_break = !same_baseline(&span, g);
            spans.push((span, starts_line));
        }
        current = Some(span_from(g));
    }
    if let Some(span) = current.take() {
        spans.push((span, line_break));
    }

    // Pass 2: spans → lines.
    let mut lines: Vec<Line> = Vec::new();
    for (span, starts_line) in spans {
        if span.text.trim().is_empty() && span.bbox.width() <= 0.0 {
            continue;
        }
        match lines.last_mut() {
            Some(line) if !starts_line => {
                line.bbox = line.bbox.union(&span.bbox);
                line.spans.push(span);
            }
            _ => lines.push(Line {
                bbox: span.bbox,
                spans: vec![span],
            }),
        }
    }

    // Pass 3: lines → blocks.
    let mut blocks: Vec<Block> = Vec::new();
    for line in lines {
        match blocks.last_mut() {
            Some(block) if joins_block(block, &line) => {
                block.bbox = block.bbox.union(&line.bbox);
                block.lines.push(line);
            }
            _ => blocks.push(Block {
                bbox: line.bbox,
                lines: vec![line],
            }),
        }
    }

    PageLayout {
        width,
        height,
        blocks,
    }
}

fn span_from(g: &Glyph) -> Span {
    Span {
        text: g.ch.to_string(),
        bbox: g.bbox,
        font_name: g.font_name.clone(),
        font_size: g.font_size,
    }
}

fn same_baseline(span: &Span, g: &Glyph) -> bool {
    let tolerance = span.font_size.max(g.font_size) / 2.0;
    (span.bbox.y1 - g.bbox.y1).abs() <= tolerance
}

fn same_run(span: &Span, g: &Glyph) -> bool {
    span.font_name == g.font_name
        && (span.font_size - g.font_size).abs() <= 0.01
        && same_baseline(span, g)
}

fn joins_block(block: &Block, line: &Line) -> bool {
    let Some(prev) = block.lines.last() else {
        return false;
    };
    let gap = line.bbox.y0 - prev.bbox.y1;
    gap <= prev.bbox.height().max(1.0) * 1.5
}

/// Find figure-label spans on one page, in layout order.
///
/// A span qualifies when its text contains `rules.keyword` and its font size
/// exceeds `rules.min_font_size`; in strict mode it must also be bold and
/// start left of `rules.max_left_x`.
pub fn locate_figure_spans(
    layout: &PageLayout,
    page: usize,
    rules: &FigureRules,
) -> Vec<FigureLabelSpan> {
    layout
        .spans()
        .filter(|s| s.text.contains(rules.keyword.as_str()) && s.font_size > rules.min_font_size)
        .map(|s| FigureLabelSpan {
            page,
            text: s.text.clone(),
            bbox: s.bbox,
            font_name: s.font_name.clone(),
            font_size: s.font_size,
            is_bold: rules
                .bold_markers
                .iter()
                .any(|m| s.font_name.contains(m.as_str())),
            in_left_margin: s.bbox.x0 < rules.max_left_x,
        })
        .filter(|f| !rules.strict || (f.is_bold && f.in_left_margin))
        .collect()
}
