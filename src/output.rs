//! Output types: flashcard records, run statistics and TSV rendering.
//!
//! A [`FlashcardRecord`] is the universal output unit of both pipelines. The
//! text pipeline produces `front`/`back` strings; the figure pipeline produces
//! a refined caption prompt and a reference to a PNG in the media directory.
//! How that reference is spelled in the TSV is decided at render time by
//! [`ImageRefStyle`], so the same records can be written for Anki's
//! `<img>` embedding or as plain paths.

use crate::config::ImageRefStyle;
use crate::error::ItemError;
use crate::pipeline::layout::FigureLabelSpan;
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// One unit of model work: a text chunk or a located figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItem {
    /// Text chunk, 1-indexed in document order.
    Chunk { index: usize },
    /// Figure `index` (1-indexed) on page `page` (1-indexed).
    Figure { page: usize, index: usize },
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Chunk { index } => write!(f, "chunk {index}"),
            WorkItem::Figure { page, index } => write!(f, "figure {index} on page {page}"),
        }
    }
}

/// The back side of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardBack {
    /// Plain text (definition).
    Text(String),
    /// A figure image written to the media directory.
    Image {
        /// Bare file name, e.g. `page_3_figure.png`.
        file_name: String,
        /// Where the file was written.
        path: PathBuf,
    },
}

impl CardBack {
    /// Render the back for the TSV according to `style`.
    pub fn render(&self, style: ImageRefStyle) -> String {
        match (self, style) {
            (CardBack::Text(text), _) => text.clone(),
            (CardBack::Image { file_name, .. }, ImageRefStyle::EmbedTag) => {
                format!("<img src=\"{file_name}\">")
            }
            (CardBack::Image { path, .. }, ImageRefStyle::Path) => path.display().to_string(),
        }
    }
}

/// A single flashcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardRecord {
    pub front: String,
    pub back: CardBack,
    /// Which chunk or figure produced this card.
    pub source: WorkItem,
}

impl FlashcardRecord {
    pub fn text(front: impl Into<String>, back: impl Into<String>, source: WorkItem) -> Self {
        Self {
            front: front.into(),
            back: CardBack::Text(back.into()),
            source,
        }
    }

    /// One TSV line (with trailing newline).
    pub fn to_tsv_line(&self, style: ImageRefStyle) -> String {
        format!(
            "{}\t{}\n",
            sanitize_field(&self.front),
            sanitize_field(&self.back.render(style))
        )
    }
}

/// Document-level metadata from the PDF info dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Result of a dry run: what would be sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub metadata: DocumentMetadata,
    /// 1-indexed pages that would be processed.
    pub selected_pages: Vec<usize>,
    pub text_chars: usize,
    pub chunks: usize,
    pub figure_labels: Vec<FigureLabelSpan>,
}

/// Statistics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total_pages: usize,
    pub selected_pages: usize,
    pub chunks: usize,
    pub figures: usize,
    pub text_cards: usize,
    pub figure_cards: usize,
    /// Text cards dropped because their front repeated an earlier one.
    pub duplicates_removed: usize,
    pub failed_items: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Complete result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Final deck: text cards first, then figure cards (unless shuffled).
    pub cards: Vec<FlashcardRecord>,
    /// Items that failed and contributed no cards.
    pub skipped: Vec<ItemError>,
    pub stats: GenerationStats,
    /// How image backs are rendered by [`GenerationOutput::to_tsv`].
    pub image_ref_style: ImageRefStyle,
}

impl GenerationOutput {
    /// Render the whole deck as TSV.
    pub fn to_tsv(&self) -> String {
        render_tsv(&self.cards, self.image_ref_style)
    }
}

/// Render records as `front<TAB>back\n` lines.
pub fn render_tsv(cards: &[FlashcardRecord], style: ImageRefStyle) -> String {
    cards.iter().map(|c| c.to_tsv_line(style)).collect()
}

/// Replace characters that would break the TSV row structure.
pub fn sanitize_field(field: &str) -> String {
    field
        .chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => ' ',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Drop records whose front already appeared. First occurrence wins.
///
/// Returns the number of records removed.
pub fn dedup_by_front(cards: &mut Vec<FlashcardRecord>) -> usize {
    let before = cards.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(cards.len());
    cards.retain(|c| seen.insert(c.front.clone()));
    before - cards.len()
}

/// Shuffle the deck. A seed makes the order reproducible.
pub fn shuffle_cards(cards: &mut [FlashcardRecord], seed: Option<u64>) {
    match seed {
        Some(seed) => cards.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => cards.shuffle(&mut rand::thread_rng()),
    }
}

/// Media file name for the `index`-th (1-indexed) figure on `page` (1-indexed).
///
/// The first figure keeps the plain `page_<n>_figure.png` name; later figures
/// on the same page get an index suffix so they never overwrite each other.
pub fn figure_file_name(page: usize, index: usize) -> String {
    if index <= 1 {
        format!("page_{page}_figure.png")
    } else {
        format!("page_{page}_figure_{index}.png")
    }
}
