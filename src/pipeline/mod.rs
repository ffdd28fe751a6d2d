//! Pipeline stages for PDF-to-flashcard generation.
//!
//! Each submodule implements one step. The layout heuristics (margin, chunk,
//! captions, layout, crop, entries) are pure and tested without pdfium or a
//! model; `pdf` and `llm` are the only stages touching external libraries.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf ──┬─▶ chunk ─────────────────────────▶ llm ──▶ entries
//! (path)  (pdfium)│                                  (limiter)  (terms)
//!                 └─▶ layout ─▶ crop ◀─ margin
//!                              ▲ captions ───────────▶ llm ──▶ entries
//!                                                              (prompt)
//! ```
//!
//! 1. [`input`]   : validate the path and the `%PDF` magic bytes
//! 2. [`pdf`]     : page text, glyph layout and clip rendering; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`chunk`]   : split document text into model-sized chunks
//! 4. [`layout`]  : group glyphs into spans and find figure-label spans
//! 5. [`captions`]: "Figure N.N" captions from page text
//! 6. [`margin`]  : white-band detection for the crop's bottom edge
//! 7. [`crop`]    : plan and render figure crops
//! 8. [`limiter`] : shared request-rate limiter
//! 9. [`llm`]     : model capability and retry policy
//! 10. [`entries`]: parse delimited model output

pub mod captions;
pub mod chunk;
pub mod crop;
pub mod entries;
pub mod input;
pub mod layout;
pub mod limiter;
pub mod llm;
pub mod margin;
pub mod pdf;
