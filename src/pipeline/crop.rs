//! Figure crop planning.
//!
//! For each figure-label span:
//!
//! ```text
//! label bbox ──expand──▶ provisional rect ──render──▶ detect_margin ──▶ final rect
//!                        (25/10/350/500 pt)             (white run)     bottom = y0 + offset
//! ```
//!
//! The provisional rect routinely runs off the page for labels near an edge.
//! Rendering clamps the clip to the page and returns a smaller image; it
//! never fails for that reason.

use crate::config::{CropMargins, FigureRules, FlashcardConfig};
use crate::error::Pdf2CardsError;
use crate::pipeline::captions::{extract_captions, match_caption, Caption, NO_CAPTION};
use crate::pipeline::layout::{locate_figure_spans, BBox, FigureLabelSpan, PageLayout};
use crate::pipeline::margin::detect_margin;
use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A rectangle in page points, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// A clamped rectangle in raster pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// `bbox` grown by `margins` on each side.
    pub fn around(bbox: &BBox, margins: &CropMargins) -> Self {
        Self {
            x0: bbox.x0 - margins.left,
            y0: bbox.y0 - margins.top,
            x1: bbox.x1 + margins.right,
            y1: bbox.y1 + margins.bottom,
        }
    }

    /// Map to pixels at `scale` px/pt, clamped to a `width` × `height` raster.
    ///
    /// The result is at least 1×1 px, even for rects fully off the page.
    pub fn to_pixels(&self, scale: f32, width: u32, height: u32) -> PixelRect {
        let clamp = |v: f32, max: u32| -> u32 { (v * scale).round().clamp(0.0, max as f32) as u32 };
        let width = width.max(1);
        let height = height.max(1);
        let x = clamp(self.x0, width - 1);
        let y = clamp(self.y0, height - 1);
        let x1 = clamp(self.x1, width).max(x + 1);
        let y1 = clamp(self.y1, height).max(y + 1);
        PixelRect {
            x,
            y,
            width: x1 - x,
            height: y1 - y,
        }
    }
}

/// Crop `rect` out of a full-page raster rendered at `scale` px/pt.
pub fn crop_clamped(page: &RgbImage, rect: &CropRect, scale: f32) -> RgbImage {
    let px = rect.to_pixels(scale, page.width(), page.height());
    imageops::crop_imm(page, px.x, px.y, px.width, px.height).to_image()
}

/// Per-page access to a document: text, layout and clip rendering.
///
/// Page indices are 0-based. Implementations are used from a single blocking
/// thread and need not be `Send`.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Plain text of the page.
    fn page_text(&self, index: usize) -> Result<String, Pdf2CardsError>;

    /// Structured block → line → span layout of the page.
    fn page_layout(&self, index: usize) -> Result<PageLayout, Pdf2CardsError>;

    /// Rasterise `rect` at `scale` px/pt, clamped to the page.
    fn render_clip(&self, index: usize, rect: &CropRect, scale: f32)
        -> Result<RgbImage, Pdf2CardsError>;
}

/// The knobs of the figure pipeline.
#[derive(Debug, Clone)]
pub struct FigureSettings {
    pub rules: FigureRules,
    pub margins: CropMargins,
    pub caption_words: usize,
    pub white_tolerance: u8,
    pub min_white_run: u32,
    pub render_scale: f32,
}

impl Default for FigureSettings {
    fn default() -> Self {
        Self::from_config(&FlashcardConfig::default())
    }
}

impl FigureSettings {
    pub fn from_config(config: &FlashcardConfig) -> Self {
        Self {
            rules: config.figure_rules.clone(),
            margins: config.crop_margins,
            caption_words: config.caption_words,
            white_tolerance: config.white_tolerance,
            min_white_run: config.min_white_run,
            render_scale: config.render_scale,
        }
    }
}

/// The tightened rect for one label and its caption, if any matched.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCrop {
    pub rect: CropRect,
    pub caption: Option<String>,
}

impl PlannedCrop {
    /// Caption text, or `"None"` when no label matched.
    pub fn caption_text(&self) -> &str {
        self.caption.as_deref().unwrap_or(NO_CAPTION)
    }
}

/// Plan the crop for one label span on page `index`.
pub fn plan_crop(
    source: &dyn PageSource,
    index: usize,
    span: &FigureLabelSpan,
    captions: &[Caption],
    settings: &FigureSettings,
) -> Result<PlannedCrop, Pdf2CardsError> {
    let provisional = CropRect::around(&span.bbox, &settings.margins);
    let provisional_clip = source.render_clip(index, &provisional, settings.render_scale)?;
    let offset = detect_margin(&provisional_clip, settings.white_tolerance, settings.min_white_run);

    let rect = CropRect {
        y1: span.bbox.y0 + offset as f32 / settings.render_scale,
        ..provisional
    };
    debug!(
        "page {}: '{}' → offset {} px, rect {:?}",
        index + 1,
        span.text,
        offset,
        rect
    );

    Ok(PlannedCrop {
        rect,
        caption: match_caption(captions, &span.text).map(|c| c.text.clone()),
    })
}

/// A rendered figure ready to become a card.
#[derive(Debug, Clone)]
pub struct FigureCrop {
    /// 1-indexed page number.
    pub page: usize,
    /// 1-indexed position among the figures of its page.
    pub index: usize,
    /// Raw text of the label span.
    pub label: String,
    pub caption: Option<String>,
    pub rect: CropRect,
    pub image: RgbImage,
}

impl FigureCrop {
    pub fn caption_text(&self) -> &str {
        self.caption.as_deref().unwrap_or(NO_CAPTION)
    }
}

/// Locate figure labels on the given pages without rendering anything.
pub fn locate_figures(
    source: &dyn PageSource,
    pages: &[usize],
    rules: &FigureRules,
) -> Result<Vec<FigureLabelSpan>, Pdf2CardsError> {
    let mut found = Vec::new();
    for &idx in pages {
        let layout = source.page_layout(idx)?;
        found.extend(locate_figure_spans(&layout, idx + 1, rules));
    }
    Ok(found)
}

/// Locate, plan and render every figure on the given pages.
pub fn extract_figures(
    source: &dyn PageSource,
    pages: &[usize],
    settings: &FigureSettings,
) -> Result<Vec<FigureCrop>, Pdf2CardsError> {
    let mut figures = Vec::new();

    for &idx in pages {
        let layout = source.page_layout(idx)?;
        let spans = locate_figure_spans(&layout, idx + 1, &settings.rules);
        if spans.is_empty() {
            continue;
        }
        let captions = extract_captions(&source.page_text(idx)?, settings.caption_words);

        for (k, span) in spans.iter().enumerate() {
            let planned = plan_crop(source, idx, span, &captions, settings)?;
            let image = source.render_clip(idx, &planned.rect, settings.render_scale)?;
            debug!(
                "page {}: figure {} cropped to {}x{} px",
                idx + 1,
                k + 1,
                image.width(),
                image.height()
            );
            figures.push(FigureCrop {
                page: idx + 1,
                index: k + 1,
                label: span.text.clone(),
                caption: planned.caption,
                rect: planned.rect,
                image,
            });
        }
    }

    Ok(figures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::layout::{Block, Line, Span};
    use image::Rgb;

    /// A page backed by an in-memory raster at `scale` px/pt. Coordinates
    /// passed to the builders are in points.
    struct FakePage {
        raster: RgbImage,
        scale: u32,
        text: String,
        spans: Vec<Span>,
    }

    impl FakePage {
        fn new(width: u32, height: u32, text: &str) -> Self {
            Self::scaled(width, height, 1, text)
        }

        fn scaled(width: u32, height: u32, scale: u32, text: &str) -> Self {
            Self {
                raster: RgbImage::from_pixel(width * scale, height * scale, Rgb([255, 255, 255])),
                scale,
                text: text.to_string(),
                spans: Vec::new(),
            }
        }

        fn ink(mut self, x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
            let s = self.scale;
            for y in y0 * s..y1 * s {
                for x in x0 * s..x1 * s {
                    self.raster.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
            self
        }

        fn label(mut self, text: &str, bbox: BBox) -> Self {
            self.spans.push(Span {
                text: text.to_string(),
                bbox,
                font_name: "Helvetica-Bold".to_string(),
                font_size: 12.0,
            });
            let (x0, y0, x1, y1) = (bbox.x0 as u32, bbox.y0 as u32, bbox.x1 as u32, bbox.y1 as u32);
            self.ink(x0, y0, x1, y1)
        }
    }

    impl PageSource for FakePage {
        fn page_count(&self) -> usize {
            1
        }

        fn page_text(&self, _index: usize) -> Result<String, Pdf2CardsError> {
            Ok(self.text.clone())
        }

        fn page_layout(&self, _index: usize) -> Result<PageLayout, Pdf2CardsError> {
            let lines = self
                .spans
                .iter()
                .map(|s| Line {
                    spans: vec![s.clone()],
                    bbox: s.bbox,
                })
                .collect::<Vec<_>>();
            Ok(PageLayout {
                width: (self.raster.width() / self.scale) as f32,
                height: (self.raster.height() / self.scale) as f32,
                blocks: lines
                    .into_iter()
                    .map(|l| Block {
                        bbox: l.bbox,
                        lines: vec![l],
                    })
                    .collect(),
            })
        }

        fn render_clip(
            &self,
            _index: usize,
            rect: &CropRect,
            scale: f32,
        ) -> Result<RgbImage, Pdf2CardsError> {
            assert_eq!(scale, self.scale as f32);
            Ok(crop_clamped(&self.raster, rect, scale))
        }
    }

    #[test]
    fn provisional_rect_uses_margins() {
        let rect = CropRect::around(&BBox::new(30.0, 100.0, 90.0, 112.0), &CropMargins::default());
        assert_eq!(rect, CropRect { x0: 5.0, y0: 90.0, x1: 440.0, y1: 612.0 });
    }

    #[test]
    fn to_pixels_clamps_to_raster() {
        let r = CropRect { x0: -20.0, y0: 590.0, x1: 900.0, y1: 700.0 };
        assert_eq!(
            r.to_pixels(1.0, 400, 600),
            PixelRect { x: 0, y: 590, width: 400, height: 10 }
        );
        let off = CropRect { x0: 500.0, y0: 700.0, x1: 600.0, y1: 800.0 };
        let px = off.to_pixels(2.0, 400, 600);
        assert_eq!((px.width, px.height), (1, 1));
    }

    #[test]
    fn bottom_edge_tightens_to_white_band() {
        let page = FakePage::new(400, 600, "Figure 2.1 The cell cycle in four phases")
            .label("Figure 2.1", BBox::new(30.0, 100.0, 90.0, 112.0))
            .ink(60, 115, 300, 200);
        let layout = page.page_layout(0).unwrap();
        let spans = locate_figure_spans(&layout, 1, &FigureRules::default());
        let captions = extract_captions(&page.text, 50);

        let planned = plan_crop(&page, 0, &spans[0], &captions, &FigureSettings::default()).unwrap();
        // Clip starts at y=90; ink ends at y=200 (clip row 110); run confirmed at 124.
        assert_eq!(planned.rect, CropRect { x0: 5.0, y0: 90.0, x1: 440.0, y1: 224.0 });
        assert_eq!(planned.caption_text(), "The cell cycle in four phases");
    }

    #[test]
    fn white_run_is_measured_in_raster_pixels() {
        let page = FakePage::scaled(400, 600, 2, "Figure 2.1 The cell cycle")
            .label("Figure 2.1", BBox::new(30.0, 100.0, 90.0, 112.0))
            .ink(60, 115, 300, 200);
        let settings = FigureSettings {
            render_scale: 2.0,
            ..FigureSettings::default()
        };
        let layout = page.page_layout(0).unwrap();
        let spans = locate_figure_spans(&layout, 1, &settings.rules);
        let captions = extract_captions(&page.text, 50);

        let planned = plan_crop(&page, 0, &spans[0], &captions, &settings).unwrap();
        // Clip starts at 180 px; ink ends at 400 px (clip row 220); run confirmed at 234.
        assert_eq!(planned.rect, CropRect { x0: 5.0, y0: 90.0, x1: 440.0, y1: 217.0 });

        let figures = extract_figures(&page, &[0], &settings).unwrap();
        assert_eq!(figures[0].rect, planned.rect);
        assert_eq!((figures[0].image.width(), figures[0].image.height()), (790, 254));
    }

    #[test]
    fn figure_at_page_bottom_is_clamped_not_an_error() {
        let page = FakePage::new(400, 600, "")
            .label("Figure 9.9", BBox::new(20.0, 560.0, 80.0, 572.0))
            .ink(40, 572, 380, 600);
        let figures = extract_figures(&page, &[0], &FigureSettings::default()).unwrap();
        assert_eq!(figures.len(), 1);
        let fig = &figures[0];
        assert_eq!(fig.image.height(), 600 - 550);
        assert_eq!(fig.image.width(), 400 - 0);
        assert_eq!(fig.caption_text(), NO_CAPTION);
    }

    #[test]
    fn several_figures_on_a_page_are_indexed() {
        let page = FakePage::new(500, 800, "Figure 1.1 First. Figure 1.2 Second.")
            .label("Figure 1.1", BBox::new(30.0, 50.0, 90.0, 62.0))
            .ink(60, 70, 200, 120)
            .label("Figure 1.2", BBox::new(30.0, 400.0, 90.0, 412.0))
            .ink(60, 420, 200, 480);
        let figures = extract_figures(&page, &[0], &FigureSettings::default()).unwrap();
        let ids: Vec<_> = figures.iter().map(|f| (f.page, f.index)).collect();
        assert_eq!(ids, vec![(1, 1), (1, 2)]);
        assert_eq!(figures[0].caption.as_deref(), Some("First. Figure 1.2 Second."));
        assert_eq!(figures[1].caption.as_deref(), Some("Second."));
    }

    #[test]
    fn pages_without_labels_yield_nothing() {
        let page = FakePage::new(100, 100, "Figure 1.1 mentioned in prose only");
        assert!(extract_figures(&page, &[0], &FigureSettings::default()).unwrap().is_empty());
        assert!(locate_figures(&page, &[0], &FigureRules::default()).unwrap().is_empty());
    }
}
