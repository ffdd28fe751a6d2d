//! Configuration types for flashcard generation.
//!
//! Every knob lives in [`FlashcardConfig`], built via
//! [`FlashcardConfigBuilder`]. The layout heuristics (crop margins, label font
//! thresholds, whitespace tolerance) are fields rather than literals: their
//! defaults assume a single-column textbook with figures below and to the
//! right of a bold "Figure N.N" label in the left margin.

use crate::error::Pdf2CardsError;
use crate::pipeline::limiter::RateLimiter;
use crate::pipeline::llm::CompletionModel;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one PDF → flashcards run.
///
/// # Example
/// ```rust
/// use pdf2cards::FlashcardConfig;
///
/// let config = FlashcardConfig::builder()
///     .chunk_size(2500)
///     .caption_words(25)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, 2500);
/// ```
#[derive(Clone)]
pub struct FlashcardConfig {
    // ── Text pipeline ─────────────────────────────────────────────────────
    /// Run the text (term/definition) pipeline. Default: true.
    pub extract_text: bool,

    /// Character budget per chunk sent to the model. Default: 2700.
    ///
    /// A character count, not a token count: a crude stand-in for the
    /// model's context and per-minute token limits.
    pub chunk_size: usize,

    /// How chunk boundaries are chosen. Default: paragraphs.
    pub chunk_strategy: ChunkStrategy,

    /// Only send the first N chunks to the model. Default: all.
    pub max_chunks: Option<usize>,

    /// System prompt override for term extraction.
    pub keyword_prompt: Option<String>,

    /// Drop text cards whose front repeats an earlier card. Default: true.
    pub dedupe: bool,

    // ── Figure pipeline ───────────────────────────────────────────────────
    /// Run the figure pipeline. Default: true.
    pub extract_figures: bool,

    /// Words taken after a "Figure N.N" label as its caption. Default: 50.
    pub caption_words: usize,

    /// Which layout spans count as figure labels.
    pub figure_rules: FigureRules,

    /// Expansion of a label's bbox into the provisional crop.
    pub crop_margins: CropMargins,

    /// Per-channel value at or above which a pixel counts as white. Default: 250.
    pub white_tolerance: u8,

    /// Consecutive white pixel rows that end a figure, counted in the
    /// raster at `render_scale`. Default: 15.
    pub min_white_run: u32,

    /// Pixels per PDF point when rasterising. Default: 1.0 (72 dpi).
    pub render_scale: f32,

    /// System prompt override for caption refinement.
    pub caption_prompt: Option<String>,

    /// Directory figure PNGs are written to. Default: `anki_media`.
    pub media_dir: PathBuf,

    /// How image backs are written in the TSV. Default: `<img>` tag.
    pub image_ref_style: ImageRefStyle,

    // ── Model ─────────────────────────────────────────────────────────────
    /// Pre-built completion client. Takes precedence over every provider field.
    pub client: Option<Arc<dyn CompletionModel>>,

    /// Pre-constructed LLM provider, wrapped in the default client.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens generated per call. Default: 2048.
    pub max_tokens: usize,

    /// Retries for rate-limited calls. Default: 3.
    pub max_retries: u32,

    /// Initial backoff for rate-limited calls, doubled per attempt. Default: 2000.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    // ── Throughput ────────────────────────────────────────────────────────
    /// Concurrent model calls. Default: 4.
    ///
    /// Chunks and figures are independent; the rate limiter, not this
    /// number, bounds the request rate.
    pub concurrency: usize,

    /// Minimum spacing between requests once the burst is spent. Default: 10 000 ms.
    pub request_interval_ms: u64,

    /// Requests allowed back-to-back before spacing applies. Default: 1.
    pub request_burst: u32,

    /// Pre-built limiter. Overrides `request_interval_ms`/`request_burst`.
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,

    // ── Document ──────────────────────────────────────────────────────────
    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection applied to both pipelines. Default: all pages.
    pub pages: PageSelection,

    // ── Deck ──────────────────────────────────────────────────────────────
    /// Shuffle the final deck. Default: false.
    pub shuffle: bool,

    /// Seed for a reproducible shuffle.
    pub shuffle_seed: Option<u64>,

    /// Progress events sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for FlashcardConfig {
    fn default() -> Self {
        Self {
            extract_text: true,
            chunk_size: 2700,
            chunk_strategy: ChunkStrategy::default(),
            max_chunks: None,
            keyword_prompt: None,
            dedupe: true,
            extract_figures: true,
            caption_words: 50,
            figure_rules: FigureRules::default(),
            crop_margins: CropMargins::default(),
            white_tolerance: 250,
            min_white_run: 15,
            render_scale: 1.0,
            caption_prompt: None,
            media_dir: PathBuf::from("anki_media"),
            image_ref_style: ImageRefStyle::default(),
            client: None,
            provider: None,
            provider_name: None,
            model: None,
            temperature: 0.2,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 2000,
            api_timeout_secs: 60,
            concurrency: 4,
            request_interval_ms: 10_000,
            request_burst: 1,
            rate_limiter: None,
            password: None,
            pages: PageSelection::default(),
            shuffle: false,
            shuffle_seed: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for FlashcardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlashcardConfig")
            .field("extract_text", &self.extract_text)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_strategy", &self.chunk_strategy)
            .field("max_chunks", &self.max_chunks)
            .field("extract_figures", &self.extract_figures)
            .field("caption_words", &self.caption_words)
            .field("figure_rules", &self.figure_rules)
            .field("crop_margins", &self.crop_margins)
            .field("white_tolerance", &self.white_tolerance)
            .field("min_white_run", &self.min_white_run)
            .field("render_scale", &self.render_scale)
            .field("media_dir", &self.media_dir)
            .field("image_ref_style", &self.image_ref_style)
            .field("client", &self.client.as_ref().map(|_| "<dyn CompletionModel>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("concurrency", &self.concurrency)
            .field("request_interval_ms", &self.request_interval_ms)
            .field("request_burst", &self.request_burst)
            .field("max_retries", &self.max_retries)
            .field("pages", &self.pages)
            .field("shuffle", &self.shuffle)
            .finish()
    }
}

impl FlashcardConfig {
    /// Create a new builder for `FlashcardConfig`.
    pub fn builder() -> FlashcardConfigBuilder {
        FlashcardConfigBuilder {
            config: Self::default(),
        }
    }

    /// The fixed spacing between requests once the burst is used up.
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }
}

/// Builder for [`FlashcardConfig`].
pub struct FlashcardConfigBuilder {
    config: FlashcardConfig,
}

impl fmt::Debug for FlashcardConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlashcardConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl FlashcardConfigBuilder {
    pub fn extract_text(mut self, v: bool) -> Self {
        self.config.extract_text = v;
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn chunk_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.config.chunk_strategy = strategy;
        self
    }

    pub fn max_chunks(mut self, n: usize) -> Self {
        self.config.max_chunks = Some(n);
        self
    }

    pub fn keyword_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.keyword_prompt = Some(prompt.into());
        self
    }

    pub fn dedupe(mut self, v: bool) -> Self {
        self.config.dedupe = v;
        self
    }

    pub fn extract_figures(mut self, v: bool) -> Self {
        self.config.extract_figures = v;
        self
    }

    pub fn caption_words(mut self, n: usize) -> Self {
        self.config.caption_words = n.max(1);
        self
    }

    pub fn figure_rules(mut self, rules: FigureRules) -> Self {
        self.config.figure_rules = rules;
        self
    }

    pub fn crop_margins(mut self, margins: CropMargins) -> Self {
        self.config.crop_margins = margins;
        self
    }

    pub fn white_tolerance(mut self, t: u8) -> Self {
        self.config.white_tolerance = t;
        self
    }

    pub fn min_white_run(mut self, rows: u32) -> Self {
        self.config.min_white_run = rows.max(1);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn caption_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.caption_prompt = Some(prompt.into());
        self
    }

    pub fn media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.media_dir = dir.into();
        self
    }

    pub fn image_ref_style(mut self, style: ImageRefStyle) -> Self {
        self.config.image_ref_style = style;
        self
    }

    pub fn client(mut self, client: Arc<dyn CompletionModel>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn request_interval_ms(mut self, ms: u64) -> Self {
        self.config.request_interval_ms = ms;
        self
    }

    pub fn request_burst(mut self, n: u32) -> Self {
        self.config.request_burst = n.max(1);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.config.rate_limiter = Some(limiter);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn shuffle(mut self, v: bool) -> Self {
        self.config.shuffle = v;
        self
    }

    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.config.shuffle_seed = Some(seed);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FlashcardConfig, Pdf2CardsError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(Pdf2CardsError::InvalidConfig(
                "chunk_size must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Pdf2CardsError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        if !c.extract_text && !c.extract_figures {
            return Err(Pdf2CardsError::InvalidConfig(
                "both pipelines are disabled; enable text or figures".into(),
            ));
        }
        if !(c.render_scale.is_finite() && c.render_scale > 0.0) {
            return Err(Pdf2CardsError::InvalidConfig(format!(
                "render_scale must be positive, got {}",
                c.render_scale
            )));
        }
        Ok(self.config)
    }
}

// ── Enums and small settings structs ─────────────────────────────────────

/// Where chunk boundaries fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChunkStrategy {
    /// Split at the last blank line inside each window (default).
    #[default]
    Paragraphs,
    /// Start a chunk at every "Theorem N.N" / "Definition N.N" marker, then
    /// split oversized sections at paragraphs.
    Sections,
}

/// How an image back is written into the TSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageRefStyle {
    /// `<img src="page_3_figure.png">`: Anki resolves it in `collection.media`.
    #[default]
    EmbedTag,
    /// The media path of the PNG.
    Path,
}

/// Rules deciding which layout spans are figure labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureRules {
    /// Substring the span text must contain. Default: "Figure".
    pub keyword: String,
    /// Font size the span must exceed, in points. Default: 10.
    pub min_font_size: f32,
    /// Require bold weight and a left-margin position. Default: true.
    ///
    /// Separates real caption headings from "see Figure 2.1" in body prose.
    pub strict: bool,
    /// Font-name fragments that signal bold weight. Default: "Bold", "Black".
    pub bold_markers: Vec<String>,
    /// `x0` must be below this in strict mode, in points. Default: 50.
    pub max_left_x: f32,
}

impl Default for FigureRules {
    fn default() -> Self {
        Self {
            keyword: "Figure".to_string(),
            min_font_size: 10.0,
            strict: true,
            bold_markers: vec!["Bold".to_string(), "Black".to_string()],
            max_left_x: 50.0,
        }
    }
}

impl FigureRules {
    /// Keyword and size filter only.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }
}

/// Expansion applied to a figure label's bbox, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropMargins {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Default for CropMargins {
    fn default() -> Self {
        Self {
            left: 25.0,
            top: 10.0,
            right: 350.0,
            bottom: 500.0,
        }
    }
}

/// Specifies which pages of the PDF are processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
