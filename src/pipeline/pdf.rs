//! pdfium backend: page text, layout from glyphs, and clip rendering.
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not be driven from async code. Everything here runs inside
//! `tokio::task::spawn_blocking`; only owned results cross back.
//!
//! Clips are rendered by rasterising the whole page once at `render_scale`
//! and cropping in pixel space, which clamps out-of-page rects for free. The
//! last page raster is cached because planning a crop renders the same page
//! twice (provisional rect, then final rect).

use crate::config::{FlashcardConfig, PageSelection};
use crate::error::Pdf2CardsError;
use crate::output::DocumentMetadata;
use crate::pipeline::crop::{crop_clamped, extract_figures, locate_figures, CropRect, FigureCrop, FigureSettings, PageSource};
use crate::pipeline::layout::{build_layout, BBox, FigureLabelSpan, Glyph, PageLayout};
use image::RgbImage;
use pdfium_render::prelude::*;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to a pdfium library.
///
/// Order: `PDFIUM_LIB_PATH`, then a library next to the working directory,
/// then the system library.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2CardsError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2CardsError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Open `path`, mapping pdfium's load errors onto password/corruption errors.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2CardsError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2CardsError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                Pdf2CardsError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            Pdf2CardsError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Read the info dictionary of an open document.
pub fn read_metadata(document: &PdfDocument) -> DocumentMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}

/// [`PageSource`] over an open pdfium document.
pub struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
    raster: RefCell<Option<(usize, u32, RgbImage)>>,
}

impl<'a> PdfiumSource<'a> {
    pub fn new(document: PdfDocument<'a>) -> Self {
        Self {
            document,
            raster: RefCell::new(None),
        }
    }

    pub fn document(&self) -> &PdfDocument<'a> {
        &self.document
    }

    fn page(&self, index: usize) -> Result<PdfPage<'a>, Pdf2CardsError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| Pdf2CardsError::TextExtractionFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RgbImage, Pdf2CardsError> {
        let page = self.page(index)?;
        let width = (page.width().value * scale).round().max(1.0) as i32;
        let height = (page.height().value * scale).round().max(1.0) as i32;
        let config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_maximum_height(height);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| Pdf2CardsError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;
        let image = bitmap.as_image().to_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

impl PageSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_text(&self, index: usize) -> Result<String, Pdf2CardsError> {
        let page = self.page(index)?;
        let text = page
            .text()
            .map_err(|e| Pdf2CardsError::TextExtractionFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;
        Ok(text.all().replace("\r\n", "\n"))
    }

    fn page_layout(&self, index: usize) -> Result<PageLayout, Pdf2CardsError> {
        let page = self.page(index)?;
        let page_height = page.height().value;
        let text = page
            .text()
            .map_err(|e| Pdf2CardsError::TextExtractionFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let mut glyphs = Vec::new();
        for c in text.chars().iter() {
            let Some(ch) = c.unicode_char() else { continue };
            if ch == '\n' || ch == '\r' {
                glyphs.push(Glyph {
                    ch,
                    bbox: BBox::default(),
                    font_name: String::new(),
                    font_size: 0.0,
                });
                continue;
            }
            // Generated characters (synthetic spaces) carry no font of their
            // own and may have no bounds; the layout folds them into the
            // surrounding run.
            let generated = c.is_generated().unwrap_or(false);
            let bounds = match c.loose_bounds() {
                Ok(bounds) if !generated => bounds,
                _ => {
                    glyphs.push(Glyph {
                        ch,
                        bbox: BBox::default(),
                        font_name: String::new(),
                        font_size: 0.0,
                    });
                    continue;
                }
            };
            glyphs.push(Glyph {
                ch,
                bbox: BBox::new(
                    bounds.left().value,
                    page_height - bounds.top().value,
                    bounds.right().value,
                    page_height - bounds.bottom().value,
                ),
                font_name: c.font_name(),
                font_size: c.scaled_font_size().value,
            });
        }

        Ok(build_layout(&glyphs, page.width().value, page_height))
    }

    fn render_clip(
        &self,
        index: usize,
        rect: &CropRect,
        scale: f32,
    ) -> Result<RgbImage, Pdf2CardsError> {
        let key = scale.to_bits();
        let mut cache = self.raster.borrow_mut();
        let hit = matches!(cache.as_ref(), Some((i, k, _)) if *i == index && *k == key);
        if !hit {
            *cache = Some((index, key, self.render_page(index, scale)?));
        }
        match cache.as_ref() {
            Some((_, _, raster)) => Ok(crop_clamped(raster, rect, scale)),
            None => Err(Pdf2CardsError::Internal("page raster cache empty".into())),
        }
    }
}

/// What the pdfium stage hands to the model stage.
#[derive(Debug, Clone, Default)]
pub struct DocumentExtract {
    pub page_count: usize,
    /// 1-indexed pages that were processed.
    pub selected_pages: Vec<usize>,
    /// Plain text of the selected pages, in order.
    pub text: String,
    pub figures: Vec<FigureCrop>,
}

/// Everything the extraction stage needs from the config, owned.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub pages: PageSelection,
    pub password: Option<String>,
    pub extract_text: bool,
    pub extract_figures: bool,
    pub figures: FigureSettings,
}

impl ExtractOptions {
    pub fn from_config(config: &FlashcardConfig) -> Self {
        Self {
            pages: config.pages.clone(),
            password: config.password.clone(),
            extract_text: config.extract_text,
            extract_figures: config.extract_figures,
            figures: FigureSettings::from_config(config),
        }
    }
}

/// Resolve a page selection against a document, erroring when it is empty.
pub fn select_pages(
    selection: &PageSelection,
    total: usize,
) -> Result<Vec<usize>, Pdf2CardsError> {
    let indices = selection.to_indices(total);
    if indices.is_empty() && total > 0 {
        let page = match selection {
            PageSelection::Single(p) => *p,
            PageSelection::Range(start, _) => *start,
            PageSelection::Set(pages) => pages.first().copied().unwrap_or(0),
            PageSelection::All => 0,
        };
        return Err(Pdf2CardsError::PageOutOfRange { page, total });
    }
    Ok(indices)
}

/// Run both extraction pipelines against any [`PageSource`].
pub fn extract_from_source(
    source: &dyn PageSource,
    options: &ExtractOptions,
) -> Result<DocumentExtract, Pdf2CardsError> {
    let page_count = source.page_count();
    let indices = select_pages(&options.pages, page_count)?;

    let text = if options.extract_text {
        indices
            .iter()
            .map(|&i| source.page_text(i))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n")
    } else {
        String::new()
    };

    let figures = if options.extract_figures {
        extract_figures(source, &indices, &options.figures)?
    } else {
        Vec::new()
    };

    info!(
        "Extracted {} chars of text and {} figures from {} pages",
        text.chars().count(),
        figures.len(),
        indices.len()
    );

    Ok(DocumentExtract {
        page_count,
        selected_pages: indices.iter().map(|i| i + 1).collect(),
        text,
        figures,
    })
}

/// Open `path` with pdfium and extract text and figures off the async runtime.
pub async fn extract_document(
    path: &Path,
    options: ExtractOptions,
) -> Result<DocumentExtract, Pdf2CardsError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, &path, options.password.as_deref())?;
        info!("PDF loaded: {} pages", document.pages().len());
        let source = PdfiumSource::new(document);
        extract_from_source(&source, &options)
    })
    .await
    .map_err(|e| Pdf2CardsError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Result of a no-model scan of a document.
#[derive(Debug, Clone)]
pub struct DocumentScan {
    pub metadata: DocumentMetadata,
    pub selected_pages: Vec<usize>,
    pub text: String,
    pub figure_labels: Vec<FigureLabelSpan>,
}

/// Metadata, text and figure labels of `path`, without rendering anything.
pub async fn scan_document(
    path: &Path,
    options: ExtractOptions,
) -> Result<DocumentScan, Pdf2CardsError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, &path, options.password.as_deref())?;
        let metadata = read_metadata(&document);
        let source = PdfiumSource::new(document);
        let indices = select_pages(&options.pages, source.page_count())?;
        let text = indices
            .iter()
            .map(|&i| source.page_text(i))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        let figure_labels = locate_figures(&source, &indices, &options.figures.rules)?;
        Ok(DocumentScan {
            metadata,
            selected_pages: indices.iter().map(|i| i + 1).collect(),
            text,
            figure_labels,
        })
    })
    .await
    .map_err(|e| Pdf2CardsError::Internal(format!("Scan task panicked: {}", e)))?
}
