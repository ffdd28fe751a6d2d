//! Flashcard generation entry points.
//!
//! ```text
//! input ──▶ extract (pdfium, spawn_blocking) ──▶ chunks + figure crops
//!                                                    │
//!                     bounded pool, shared limiter ◀─┘
//!                                                    │
//!        parse entries / caption prompt, write PNGs ─┴─▶ dedup ▶ merge ▶ TSV
//! ```
//!
//! Model calls run `concurrency` at a time through one shared
//! [`RateLimiter`]; results are re-sorted by their queue position so the
//! deck order does not depend on which call finished first.

use crate::config::FlashcardConfig;
use crate::error::{ItemError, Pdf2CardsError};
use crate::output::{
    dedup_by_front, figure_file_name, shuffle_cards, CardBack, FlashcardRecord,
    GenerationOutput, GenerationStats, InspectReport, WorkItem,
};
use crate::pipeline::chunk::chunk_document;
use crate::pipeline::crop::FigureCrop;
use crate::pipeline::entries::{parse_caption_prompt, parse_term_entries};
use crate::pipeline::limiter::{RateLimiter, TokenBucket};
use crate::pipeline::llm::{call_with_retry, CompletionModel, ProviderModel, RetryPolicy};
use crate::pipeline::pdf::{self, DocumentExtract, ExtractOptions};
use crate::pipeline::input;
use crate::progress::ProgressCallback;
use crate::prompts::{caption_user_message, CAPTION_PROMPT, KEYWORD_PROMPT};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Generate flashcards from a PDF.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(GenerationOutput)` even if some chunks or figures failed
/// (see `output.skipped`).
///
/// # Errors
/// Returns `Err(Pdf2CardsError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - pdfium missing, corrupt or encrypted document
/// - No model provider configured
/// - Every work item failed
pub async fn generate(
    pdf_file: impl AsRef<Path>,
    config: &FlashcardConfig,
) -> Result<GenerationOutput, Pdf2CardsError> {
    let total_start = Instant::now();
    info!("Starting generation: {}", pdf_file.as_ref().display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let pdf_path = input::resolve_input(pdf_file)?;

    // ── Step 2: Get/create the model before any heavy work ──────────────
    let model = resolve_model(config)?;

    // ── Step 3: Extract text and figures ─────────────────────────────────
    let extract_start = Instant::now();
    let extract = pdf::extract_document(&pdf_path, ExtractOptions::from_config(config)).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!("Extraction finished in {}ms", extract_duration_ms);

    // ── Step 4: Model calls, parsing, assembly ───────────────────────────
    let mut output = generate_from_extract(extract, model, config).await?;
    output.stats.extract_duration_ms = extract_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Generation complete: {} cards ({} text, {} figure), {} skipped, {}ms total",
        output.cards.len(),
        output.stats.text_cards,
        output.stats.figure_cards,
        output.skipped.len(),
        output.stats.total_duration_ms
    );
    Ok(output)
}

/// Turn an already-extracted document into cards.
///
/// Needs no pdfium, so any [`crate::pipeline::crop::PageSource`] plus any
/// [`CompletionModel`] can drive the whole pipeline.
pub async fn generate_from_extract(
    extract: DocumentExtract,
    model: Arc<dyn CompletionModel>,
    config: &FlashcardConfig,
) -> Result<GenerationOutput, Pdf2CardsError> {
    let start = Instant::now();

    let chunks = if config.extract_text {
        chunk_document(
            &extract.text,
            config.chunk_strategy,
            config.chunk_size,
            config.max_chunks,
        )
    } else {
        Vec::new()
    };
    debug!("{} chunks, {} figures", chunks.len(), extract.figures.len());

    let mut stats = GenerationStats {
        total_pages: extract.page_count,
        selected_pages: extract.selected_pages.len(),
        chunks: chunks.len(),
        figures: extract.figures.len(),
        ..Default::default()
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(chunks.len(), extract.figures.len());
    }

    if !extract.figures.is_empty() {
        tokio::fs::create_dir_all(&config.media_dir)
            .await
            .map_err(|e| Pdf2CardsError::MediaIo {
                path: config.media_dir.clone(),
                source: e,
            })?;
    }

    let jobs: Vec<Job> = chunks
        .into_iter()
        .enumerate()
        .map(|(i, text)| Job::Chunk { index: i + 1, text })
        .chain(extract.figures.into_iter().map(Job::Figure))
        .collect();
    let total_jobs = jobs.len();

    let limiter = resolve_limiter(config);
    let ctx = JobContext {
        model: model.as_ref(),
        limiter: limiter.as_ref(),
        policy: RetryPolicy::from_config(config),
        keyword_prompt: config.keyword_prompt.as_deref().unwrap_or(KEYWORD_PROMPT),
        caption_prompt: config.caption_prompt.as_deref().unwrap_or(CAPTION_PROMPT),
        media_dir: &config.media_dir,
        progress: config.progress_callback.as_ref(),
    };

    let mut outcomes: Vec<JobOutcome> = stream::iter(jobs.into_iter().enumerate())
        .map(|(pos, job)| run_job(pos, job, &ctx))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;
    outcomes.sort_by_key(|o| o.pos);
    stats.llm_duration_ms = start.elapsed().as_millis() as u64;

    let mut text_cards = Vec::new();
    let mut figure_cards = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(done) => {
                stats.total_input_tokens += done.input_tokens;
                stats.total_output_tokens += done.output_tokens;
                match outcome.item {
                    WorkItem::Chunk { .. } => text_cards.extend(done.cards),
                    WorkItem::Figure { .. } => figure_cards.extend(done.cards),
                }
            }
            Err(e) => skipped.push(e),
        }
    }

    if total_jobs > 0 && skipped.len() == total_jobs {
        return Err(Pdf2CardsError::AllItemsFailed {
            total: total_jobs,
            first_error: skipped
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    if total_jobs == 0 {
        warn!("Nothing to send to the model: no text chunks and no figures");
    }

    if config.dedupe {
        stats.duplicates_removed = dedup_by_front(&mut text_cards);
    }
    stats.text_cards = text_cards.len();
    stats.figure_cards = figure_cards.len();
    stats.failed_items = skipped.len();

    let mut cards = text_cards;
    cards.extend(figure_cards);
    if config.shuffle {
        shuffle_cards(&mut cards, config.shuffle_seed);
    }

    for e in &skipped {
        warn!("Skipped {}", e);
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(cards.len(), skipped.len());
    }
    stats.total_duration_ms = start.elapsed().as_millis() as u64;

    Ok(GenerationOutput {
        cards,
        skipped,
        stats,
        image_ref_style: config.image_ref_style,
    })
}

/// Generate flashcards and write the TSV to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    pdf_file: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &FlashcardConfig,
) -> Result<GenerationOutput, Pdf2CardsError> {
    let output = generate(pdf_file, config).await?;
    write_tsv(output_path.as_ref(), &output).await?;
    Ok(output)
}

/// Atomically write `output` as TSV to `path`.
pub async fn write_tsv(path: &Path, output: &GenerationOutput) -> Result<(), Pdf2CardsError> {
    let write_err = |e: std::io::Error| Pdf2CardsError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("tsv.tmp");
    tokio::fs::write(&tmp_path, output.to_tsv())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    info!("Wrote {} cards to {}", output.cards.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    pdf_file: impl AsRef<Path>,
    config: &FlashcardConfig,
) -> Result<GenerationOutput, Pdf2CardsError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2CardsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(pdf_file, config))
}

/// Dry run: metadata, chunk count and figure labels, without model calls.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    pdf_file: impl AsRef<Path>,
    config: &FlashcardConfig,
) -> Result<InspectReport, Pdf2CardsError> {
    let pdf_path = input::resolve_input(pdf_file)?;
    let scan = pdf::scan_document(&pdf_path, ExtractOptions::from_config(config)).await?;
    let chunks = chunk_document(
        &scan.text,
        config.chunk_strategy,
        config.chunk_size,
        config.max_chunks,
    );
    Ok(InspectReport {
        metadata: scan.metadata,
        selected_pages: scan.selected_pages,
        text_chars: scan.text.chars().count(),
        chunks: chunks.len(),
        figure_labels: scan.figure_labels,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

enum Job {
    Chunk { index: usize, text: String },
    Figure(FigureCrop),
}

impl Job {
    fn item(&self) -> WorkItem {
        match self {
            Job::Chunk { index, .. } => WorkItem::Chunk { index: *index },
            Job::Figure(fig) => WorkItem::Figure {
                page: fig.page,
                index: fig.index,
            },
        }
    }
}

struct JobContext<'a> {
    model: &'a dyn CompletionModel,
    limiter: &'a dyn RateLimiter,
    policy: RetryPolicy,
    keyword_prompt: &'a str,
    caption_prompt: &'a str,
    media_dir: &'a Path,
    progress: Option<&'a ProgressCallback>,
}

struct JobDone {
    cards: Vec<FlashcardRecord>,
    input_tokens: u64,
    output_tokens: u64,
}

struct JobOutcome {
    pos: usize,
    item: WorkItem,
    result: Result<JobDone, ItemError>,
}

async fn run_job(pos: usize, job: Job, ctx: &JobContext<'_>) -> JobOutcome {
    let item = job.item();
    if let Some(cb) = ctx.progress {
        cb.on_item_start(item);
    }

    let result = match job {
        Job::Chunk { text, .. } => run_chunk(item, &text, ctx).await,
        Job::Figure(fig) => run_figure(item, fig, ctx).await,
    };

    if let Some(cb) = ctx.progress {
        match &result {
            Ok(done) => cb.on_item_complete(item, done.cards.len()),
            Err(e) => cb.on_item_error(item, &e.to_string()),
        }
    }
    JobOutcome { pos, item, result }
}

async fn run_chunk(item: WorkItem, text: &str, ctx: &JobContext<'_>) -> Result<JobDone, ItemError> {
    let completion = call_with_retry(
        ctx.model,
        ctx.limiter,
        ctx.keyword_prompt,
        text,
        item,
        &ctx.policy,
    )
    .await?;

    let cards: Vec<FlashcardRecord> = parse_term_entries(&completion.text)
        .into_iter()
        .map(|(term, definition)| FlashcardRecord::text(term, definition, item))
        .collect();
    if cards.is_empty() {
        debug!("{}: model returned no delimited entries", item);
    }

    Ok(JobDone {
        cards,
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
    })
}

async fn run_figure(
    item: WorkItem,
    fig: FigureCrop,
    ctx: &JobContext<'_>,
) -> Result<JobDone, ItemError> {
    let completion = call_with_retry(
        ctx.model,
        ctx.limiter,
        ctx.caption_prompt,
        &caption_user_message(fig.caption_text()),
        item,
        &ctx.policy,
    )
    .await?;
    let front = parse_caption_prompt(&completion.text);

    let file_name = figure_file_name(fig.page, fig.index);
    let path: PathBuf = ctx.media_dir.join(&file_name);
    let target = path.clone();
    let image = fig.image;
    tokio::task::spawn_blocking(move || image.save(&target))
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r.map_err(|e| e.to_string()))
        .map_err(|detail| ItemError::ImageWriteFailed {
            item,
            path: path.clone(),
            detail,
        })?;
    debug!("{}: wrote {}", item, path.display());

    Ok(JobDone {
        cards: vec![FlashcardRecord {
            front,
            back: CardBack::Image { file_name, path },
            source: item,
        }],
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
    })
}

fn resolve_limiter(config: &FlashcardConfig) -> Arc<dyn RateLimiter> {
    match config.rate_limiter {
        Some(ref limiter) => Arc::clone(limiter),
        None => Arc::new(TokenBucket::new(
            config.request_burst,
            config.request_interval(),
        )),
    }
}

/// Resolve the completion model, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.client`), used as-is. Tests inject
///    canned doubles here.
/// 2. **Pre-built provider** (`config.provider`), wrapped in [`ProviderModel`].
/// 3. **Named provider + model** (`config.provider_name`) via
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 4. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 5. **OpenAI** when `OPENAI_API_KEY` is set.
/// 6. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_model(config: &FlashcardConfig) -> Result<Arc<dyn CompletionModel>, Pdf2CardsError> {
    if let Some(ref client) = config.client {
        return Ok(Arc::clone(client));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderModel::new(provider, config)))
}

fn resolve_provider(config: &FlashcardConfig) -> Result<Arc<dyn LLMProvider>, Pdf2CardsError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2CardsError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2CardsError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2CardsError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::Completion;
    use crate::error::ModelCallError;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl CompletionModel for Echo {
        async fn complete(&self, _system: &str, user: &str) -> Result<Completion, ModelCallError> {
            Ok(Completion::new(format!(
                "### BEGIN ENTRY ###\nTerm: {}\nDefinition: def\n### END ENTRY ###",
                user.split_whitespace().next().unwrap_or("")
            )))
        }
    }

    fn fast_config() -> FlashcardConfig {
        FlashcardConfig::builder()
            .request_interval_ms(0)
            .extract_figures(false)
            .build()
            .unwrap()
    }

    #[test]
    fn injected_client_wins() {
        let config = FlashcardConfig::builder().client(Arc::new(Echo)).build().unwrap();
        assert!(resolve_model(&config).is_ok());
    }

    #[tokio::test]
    async fn empty_extract_yields_empty_deck() {
        let out = generate_from_extract(DocumentExtract::default(), Arc::new(Echo), &fast_config())
            .await
            .unwrap();
        assert!(out.cards.is_empty());
        assert!(out.skipped.is_empty());
    }

    #[tokio::test]
    async fn chunks_keep_document_order() {
        let extract = DocumentExtract {
            page_count: 1,
            selected_pages: vec![1],
            text: "alpha one\n\nbeta two\n\ngamma three".into(),
            figures: Vec::new(),
        };
        let config = FlashcardConfig::builder()
            .request_interval_ms(0)
            .chunk_size(12)
            .concurrency(3)
            .build()
            .unwrap();
        let out = generate_from_extract(extract, Arc::new(Echo), &config).await.unwrap();
        let fronts: Vec<_> = out.cards.iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, ["alpha", "beta", "gamma"]);
        assert_eq!(out.stats.chunks, 3);
    }
}
