//! Error types for the pdf2cards library.
//!
//! Three error types mirror three failure scopes:
//!
//! * [`Pdf2CardsError`]: **Fatal**: the run cannot proceed at all (bad
//!   input file, pdfium missing, provider not configured). Returned as
//!   `Err(Pdf2CardsError)` from the top-level `generate*` functions with no
//!   partial output.
//!
//! * [`ItemError`]: **Non-fatal**: one chunk or one figure failed (model
//!   error, image write failure). Collected in
//!   [`crate::output::GenerationOutput::skipped`] and summarised at the end.
//!
//! * [`ModelCallError`]: what the injected
//!   [`crate::pipeline::llm::CompletionModel`] returns. Only
//!   [`ModelCallError::RateLimited`] is retried.

use crate::output::WorkItem;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2cards library.
#[derive(Debug, Error)]
pub enum Pdf2CardsError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium could not extract the text of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// pdfium-render returned an error while rasterising a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
binary, or install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every chunk and figure failed; the deck would be empty.
    #[error("All {total} work items failed.\nFirst error: {first_error}")]
    AllItemsFailed { total: usize, first_error: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output TSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the media directory or move media files.
    #[error("Media operation failed for '{path}': {source}")]
    MediaIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The Anki `collection.media` folder does not exist.
    #[error("Anki media folder not found at '{path}'\nCheck the profile name with --anki-profile.")]
    AnkiMediaNotFound { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk or figure.
///
/// The run continues; the item is reported in the skipped summary.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The model call failed with a non-retryable error.
    #[error("{item}: model call failed: {detail}")]
    ModelFailed { item: WorkItem, detail: String },

    /// The model kept answering "rate limited" after every retry.
    #[error("{item}: still rate limited after {retries} retries")]
    RateLimited { item: WorkItem, retries: u32 },

    /// The model call exceeded `api_timeout_secs`.
    #[error("{item}: model call timed out after {secs}s")]
    Timeout { item: WorkItem, secs: u64 },

    /// The figure PNG could not be written to the media directory.
    #[error("{item}: could not write image '{path}': {detail}")]
    ImageWriteFailed {
        item: WorkItem,
        path: PathBuf,
        detail: String,
    },
}

impl ItemError {
    /// The work item this error belongs to.
    pub fn item(&self) -> WorkItem {
        match self {
            ItemError::ModelFailed { item, .. }
            | ItemError::RateLimited { item, .. }
            | ItemError::Timeout { item, .. }
            | ItemError::ImageWriteFailed { item, .. } => *item,
        }
    }
}

/// Failure of a single `complete(system, user)` call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelCallError {
    /// HTTP 429 or an equivalent provider signal. Retryable.
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// 401/403: retrying will not help.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The call did not finish within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Network, server or protocol failure.
    #[error("{0}")]
    Transport(String),
}

impl ModelCallError {
    /// Whether the retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelCallError::RateLimited { .. })
    }

    /// Classify a provider error message.
    ///
    /// Providers surface HTTP status codes inside their error strings, so the
    /// classification is textual.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
            ModelCallError::RateLimited {
                retry_after_secs: parse_retry_after(&lower),
            }
        } else if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("invalid api key")
        {
            ModelCallError::Auth(message)
        } else {
            ModelCallError::Transport(message)
        }
    }
}

/// Pull a `retry after N` hint out of an error message, if present.
fn parse_retry_after(lower: &str) -> Option<u64> {
    let idx = lower.find("retry after").or_else(|| lower.find("retry-after"))?;
    lower[idx + "retry after".len()..]
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse().ok())
}
