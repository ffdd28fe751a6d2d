//! Text chunking: split document text into model-sized pieces.
//!
//! The budget is counted in characters (Unicode scalar values), a crude
//! stand-in for the model's context and per-minute token limits. Splits
//! prefer the last paragraph break (`"\n\n"`) inside the window and fall back
//! to a hard cut at exactly `chunk_size` characters.

use crate::config::ChunkStrategy;
use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Theorem|Definition)\s\d+\.\d+(?:\.\d+)?\b").unwrap());

/// Split `text` at paragraph boundaries into chunks of at most `chunk_size`
/// characters.
///
/// Every chunk is trimmed and non-empty; chunks come out in document order.
/// `chunk_size == 0` is treated as 1.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > chunk_size {
        // Byte offset of the first character past the window.
        let window_end = rest
            .char_indices()
            .nth(chunk_size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let split = match rest[..window_end].rfind("\n\n") {
            Some(p) if p > 0 => p,
            _ => window_end,
        };

        let chunk = rest[..split].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = rest[split..].trim();
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Split at "Theorem N.N" / "Definition N.N" markers, one chunk per section.
///
/// Text before the first marker forms its own section. Sections longer than
/// `chunk_size` are split again with [`chunk_text`]. Without any marker this
/// is plain paragraph chunking.
pub fn chunk_sections(text: &str, chunk_size: usize) -> Vec<String> {
    let starts: Vec<usize> = SECTION_MARKER.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return chunk_text(text, chunk_size);
    }

    let mut bounds = Vec::with_capacity(starts.len() + 2);
    bounds.push(0);
    bounds.extend(starts.iter().copied().filter(|&s| s > 0));
    bounds.push(text.len());

    bounds
        .windows(2)
        .flat_map(|w| chunk_text(&text[w[0]..w[1]], chunk_size))
        .collect()
}

/// Chunk a whole document with the configured strategy and cap.
pub fn chunk_document(
    text: &str,
    strategy: ChunkStrategy,
    chunk_size: usize,
    max_chunks: Option<usize>,
) -> Vec<String> {
    let mut chunks = match strategy {
        ChunkStrategy::Paragraphs => chunk_text(text, chunk_size),
        ChunkStrategy::Sections => chunk_sections(text, chunk_size),
    };
    if let Some(max) = max_chunks {
        chunks.truncate(max);
    }
    chunks
}
