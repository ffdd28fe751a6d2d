//! # pdf2cards
//!
//! Turn PDF textbooks into Anki flashcards.
//!
//! Two pipelines feed one deck:
//!
//! * **Text**: the document text is split into character-budgeted chunks at
//!   paragraph breaks, each chunk is sent to an LLM with a term-extraction
//!   prompt, and the delimited answer becomes term/definition cards.
//! * **Figures**: bold "Figure N.N" labels in the left margin are located in
//!   the page layout, an oversized region below each label is rendered, the
//!   first band of white rows trims it, and the LLM turns the figure's
//!   caption into the card's question. The cropped PNG is the answer.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate path and %PDF magic bytes
//!  ├─ 2. Extract  pdfium text, glyph layout, clip rendering (spawn_blocking)
//!  ├─ 3. Chunk    paragraph-aware split, 2 700 chars by default
//!  ├─ 4. Figures  label spans → provisional crop → white-band trim → PNG
//!  ├─ 5. LLM      bounded worker pool behind one shared rate limiter
//!  ├─ 6. Parse    ### BEGIN … ### END blocks, lenient sentinels
//!  └─ 7. Output   dedup, merge, optional shuffle, TSV + media folder
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2cards::{generate_to_file, FlashcardConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = FlashcardConfig::default();
//!     let output = generate_to_file("textbook.pdf", "flashcards.tsv", &config).await?;
//!     eprintln!("{} cards, {} skipped", output.cards.len(), output.skipped.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Testing without a model
//!
//! Inject any [`CompletionModel`] through
//! [`FlashcardConfigBuilder::client`], or call [`generate_from_extract`]
//! with a [`DocumentExtract`] built from any [`PageSource`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2cards` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2cards = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ChunkStrategy, CropMargins, FigureRules, FlashcardConfig, FlashcardConfigBuilder,
    ImageRefStyle, PageSelection,
};
pub use error::{ItemError, ModelCallError, Pdf2CardsError};
pub use generate::{
    generate, generate_from_extract, generate_sync, generate_to_file, inspect, write_tsv,
};
pub use media::{anki_media_dir, install_media};
pub use output::{
    CardBack, DocumentMetadata, FlashcardRecord, GenerationOutput, GenerationStats,
    InspectReport, WorkItem,
};
pub use pipeline::crop::{CropRect, PageSource};
pub use pipeline::limiter::{RateLimiter, TokenBucket, Unlimited};
pub use pipeline::llm::{Completion, CompletionModel};
pub use pipeline::pdf::DocumentExtract;
pub use progress::{FlashcardProgressCallback, NoopProgressCallback, ProgressCallback};
