//! CLI binary for pdf2cards.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `FlashcardConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use pdf2cards::media::DEFAULT_PROFILE;
use pdf2cards::pipeline::input::clean_prompted_path;
use pdf2cards::{
    anki_media_dir, generate, inspect, install_media, write_tsv, ChunkStrategy, CropMargins,
    FigureRules, FlashcardConfig, FlashcardProgressCallback, ImageRefStyle, PageSelection,
    ProgressCallback, WorkItem,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per chunk or figure. Items finish out
/// of order, so start times are keyed by item.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<WorkItem, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_generation_start` reports the item count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} items  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, item: WorkItem) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&item)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl FlashcardProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, chunks: usize, figures: usize) {
        self.activate_bar(chunks + figures);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Sending {chunks} text chunks and {figures} figures to the model…"
            ))
        ));
    }

    fn on_item_start(&self, item: WorkItem) {
        self.start_times.lock().unwrap().insert(item, Instant::now());
        self.bar.set_message(item.to_string());
    }

    fn on_item_complete(&self, item: WorkItem, cards: usize) {
        let secs = self.elapsed_secs(item);
        self.bar.println(format!(
            "  {} {:<22}  {}  {}",
            green("✓"),
            item.to_string(),
            dim(&format!("{cards:>3} cards")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, item: WorkItem, error: &str) {
        let secs = self.elapsed_secs(item);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let mut short: String = error.chars().take(79).collect();
            short.push('\u{2026}');
            short
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<22}  {}  {}",
            red("✗"),
            item.to_string(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_generation_complete(&self, total_cards: usize, failed_items: usize) {
        self.bar.finish_and_clear();
        if failed_items == 0 {
            eprintln!(
                "{} {} cards generated",
                green("✔"),
                bold(&total_cards.to_string())
            );
        } else {
            eprintln!(
                "{} {} cards generated  ({} items skipped)",
                cyan("⚠"),
                bold(&total_cards.to_string()),
                red(&failed_items.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Prompt for the PDF, write flashcards.tsv and anki_media/
  pdf2cards

  # Explicit input and output
  pdf2cards textbook.pdf -o chapter1.tsv --pages 12-40

  # Text cards only, at most 5 chunks, shuffled reproducibly
  pdf2cards --no-figures --max-chunks 5 --shuffle --seed 42 textbook.pdf

  # Books whose figure labels are not bold or not in the left margin
  pdf2cards --lenient textbook.pdf

  # See what would be sent to the model (no API key needed)
  pdf2cards --dry-run textbook.pdf

  # Move the PNGs into Anki's media folder afterwards
  pdf2cards --install-media --anki-profile "User 1" textbook.pdf

IMPORTING INTO ANKI:
  File → Import → flashcards.tsv, field separator Tab, "Allow HTML in
  fields" on. Figure cards reference images by file name, so the PNGs
  must be in the profile's collection.media folder (see --install-media).

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  RUST_LOG                Log filter (overrides --verbose / --quiet)
"#;

/// Turn PDF textbooks into Anki flashcards.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2cards",
    version,
    about = "Turn PDF textbooks into Anki flashcards using an LLM",
    long_about = "Extract term/definition flashcards from the text of a PDF and figure \
flashcards from its captioned figures. Writes a tab-separated file Anki can import and a \
folder of cropped figure images.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file. Prompted for on stdin when omitted.
    input: Option<PathBuf>,

    /// TSV file to write.
    #[arg(short, long, env = "PDF2CARDS_OUTPUT", default_value = "flashcards.tsv")]
    output: PathBuf,

    // ── Text pipeline ────────────────────────────────────────────────────
    /// Chunk budget in characters.
    #[arg(long, env = "PDF2CARDS_CHUNK_SIZE", default_value_t = 2700)]
    chunk_size: usize,

    /// Chunk boundaries: paragraphs or sections (Theorem/Definition N.N).
    #[arg(long, env = "PDF2CARDS_CHUNK_STRATEGY", value_enum, default_value = "paragraphs")]
    chunk_strategy: StrategyArg,

    /// Send at most this many chunks.
    #[arg(long, env = "PDF2CARDS_MAX_CHUNKS")]
    max_chunks: Option<usize>,

    /// Skip the text pipeline.
    #[arg(long)]
    no_text: bool,

    /// Keep cards whose term repeats an earlier one.
    #[arg(long)]
    no_dedupe: bool,

    /// Text file with a replacement term-extraction prompt.
    #[arg(long, env = "PDF2CARDS_KEYWORD_PROMPT")]
    keyword_prompt_file: Option<PathBuf>,

    // ── Figure pipeline ──────────────────────────────────────────────────
    /// Skip the figure pipeline.
    #[arg(long)]
    no_figures: bool,

    /// Accept any large "Figure" span, not only bold left-margin labels.
    #[arg(long)]
    lenient: bool,

    /// Words kept after a "Figure N.N" caption label.
    #[arg(long, env = "PDF2CARDS_CAPTION_WORDS", default_value_t = 50)]
    caption_words: usize,

    /// Crop margins around the label, in points: LEFT,TOP,RIGHT,BOTTOM.
    #[arg(long, env = "PDF2CARDS_CROP_MARGINS", default_value = "25,10,350,500")]
    crop_margins: String,

    /// Channel value at or above which a pixel counts as white.
    #[arg(long, env = "PDF2CARDS_WHITE_TOLERANCE", default_value_t = 250)]
    white_tolerance: u8,

    /// Consecutive white rows that end a figure.
    #[arg(long, env = "PDF2CARDS_MIN_WHITE_RUN", default_value_t = 15)]
    min_white_run: u32,

    /// Pixels per point when rendering figures (1.0 = 72 dpi).
    #[arg(long, env = "PDF2CARDS_RENDER_SCALE", default_value_t = 1.0)]
    render_scale: f32,

    /// Text file with a replacement caption prompt.
    #[arg(long, env = "PDF2CARDS_CAPTION_PROMPT")]
    caption_prompt_file: Option<PathBuf>,

    /// Directory for figure PNGs.
    #[arg(long, env = "PDF2CARDS_MEDIA_DIR", default_value = "anki_media")]
    media_dir: PathBuf,

    /// How figure backs are written: embed (<img> tag) or path.
    #[arg(long, env = "PDF2CARDS_IMAGE_REF", value_enum, default_value = "embed")]
    image_ref: ImageRefArg,

    // ── Model ────────────────────────────────────────────────────────────
    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2CARDS_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PDF2CARDS_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Retries when the provider reports a rate limit.
    #[arg(long, env = "PDF2CARDS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Base backoff between rate-limit retries, doubled each attempt.
    #[arg(long, env = "PDF2CARDS_RETRY_BACKOFF_MS", default_value_t = 2000)]
    retry_backoff_ms: u64,

    /// Per-call timeout in seconds (0 disables).
    #[arg(long, env = "PDF2CARDS_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    // ── Throughput ───────────────────────────────────────────────────────
    /// Model calls in flight at once.
    #[arg(short, long, env = "PDF2CARDS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Minimum spacing between requests once the burst is used, in ms.
    #[arg(long, env = "PDF2CARDS_INTERVAL_MS", default_value_t = 10_000)]
    interval_ms: u64,

    /// Requests allowed back to back before spacing applies.
    #[arg(long, env = "PDF2CARDS_BURST", default_value_t = 1)]
    burst: u32,

    // ── Document and deck ────────────────────────────────────────────────
    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2CARDS_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2CARDS_PASSWORD")]
    password: Option<String>,

    /// Shuffle the final deck.
    #[arg(long)]
    shuffle: bool,

    /// Seed for --shuffle.
    #[arg(long, requires = "shuffle")]
    seed: Option<u64>,

    /// Move the figure PNGs into Anki's collection.media afterwards.
    #[arg(long)]
    install_media: bool,

    /// Anki profile for --install-media.
    #[arg(long, env = "PDF2CARDS_ANKI_PROFILE", default_value = DEFAULT_PROFILE)]
    anki_profile: String,

    // ── Output ───────────────────────────────────────────────────────────
    /// Report chunks and figure labels without calling the model.
    #[arg(long)]
    dry_run: bool,

    /// Print the result (or dry-run report) as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2CARDS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2CARDS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2CARDS_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Paragraphs,
    Sections,
}

impl From<StrategyArg> for ChunkStrategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Paragraphs => ChunkStrategy::Paragraphs,
            StrategyArg::Sections => ChunkStrategy::Sections,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ImageRefArg {
    Embed,
    Path,
}

impl From<ImageRefArg> for ImageRefStyle {
    fn from(v: ImageRefArg) -> Self {
        match v {
            ImageRefArg::Embed => ImageRefStyle::EmbedTag,
            ImageRefArg::Path => ImageRefStyle::Path,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dry_run;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let input = match cli.input {
        Some(ref path) => path.clone(),
        None => prompt_for_pdf().context("Failed to read the PDF path from stdin")?,
    };

    // ── Dry run ──────────────────────────────────────────────────────────
    if cli.dry_run {
        let config = build_config(&cli, None).await?;
        let report = inspect(&input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            let meta = &report.metadata;
            println!("File:         {}", input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            println!("Selected:     {} pages", report.selected_pages.len());
            println!("Text:         {} chars", report.text_chars);
            println!("Chunks:       {}", report.chunks);
            println!("Figures:      {}", report.figure_labels.len());
            for label in &report.figure_labels {
                println!(
                    "  p.{:<4} {:<20} {}",
                    label.page,
                    label.text.trim(),
                    dim(&format!("{} {:.1}pt", label.font_name, label.font_size)),
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn FlashcardProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run generation ───────────────────────────────────────────────────
    let output = generate(&input, &config)
        .await
        .context("Flashcard generation failed")?;
    write_tsv(&cli.output, &output)
        .await
        .context("Failed to write flashcards")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} text + {} figure cards  {}ms  →  {}",
            if output.skipped.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.text_cards,
            stats.figure_cards,
            stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
        if stats.duplicates_removed > 0 {
            eprintln!(
                "   {} duplicate terms dropped",
                dim(&stats.duplicates_removed.to_string())
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
        if !output.skipped.is_empty() {
            eprintln!("   Skipped:");
            for e in &output.skipped {
                eprintln!("     {} {}", red("✗"), e);
            }
        }
    }

    // ── Anki media ───────────────────────────────────────────────────────
    if cli.install_media && output.stats.figure_cards > 0 {
        let dest = anki_media_dir(&cli.anki_profile).context("Failed to locate Anki")?;
        let moved = install_media(&cli.media_dir, &dest)
            .with_context(|| format!("Failed to install images into {}", dest.display()))?;
        if !cli.quiet {
            eprintln!(
                "{} {} images moved to {}",
                green("✔"),
                moved,
                bold(&dest.display().to_string())
            );
        }
    }

    Ok(())
}

/// Ask for a PDF path until an existing file is given.
fn prompt_for_pdf() -> Result<PathBuf> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        eprint!("Path to the PDF file: ");
        io::stderr().flush().ok();
        let Some(line) = lines.next() else {
            anyhow::bail!("No PDF path given");
        };
        let path = clean_prompted_path(&line?);
        if path.is_file() {
            return Ok(path);
        }
        eprintln!("{} '{}' is not a file, try again.", red("✗"), path.display());
    }
}

/// Map CLI args to `FlashcardConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<FlashcardConfig> {
    let pages = parse_pages(&cli.pages)?;
    let crop_margins = parse_margins(&cli.crop_margins)?;
    let figure_rules = if cli.lenient {
        FigureRules::lenient()
    } else {
        FigureRules::default()
    };

    let mut builder = FlashcardConfig::builder()
        .extract_text(!cli.no_text)
        .chunk_size(cli.chunk_size)
        .chunk_strategy(cli.chunk_strategy.into())
        .dedupe(!cli.no_dedupe)
        .extract_figures(!cli.no_figures)
        .caption_words(cli.caption_words)
        .figure_rules(figure_rules)
        .crop_margins(crop_margins)
        .white_tolerance(cli.white_tolerance)
        .min_white_run(cli.min_white_run)
        .render_scale(cli.render_scale)
        .media_dir(cli.media_dir.clone())
        .image_ref_style(cli.image_ref.into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .api_timeout_secs(cli.api_timeout)
        .concurrency(cli.concurrency)
        .request_interval_ms(cli.interval_ms)
        .request_burst(cli.burst)
        .pages(pages)
        .shuffle(cli.shuffle);

    if let Some(n) = cli.max_chunks {
        builder = builder.max_chunks(n);
    }
    if let Some(seed) = cli.seed {
        builder = builder.shuffle_seed(seed);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref path) = cli.keyword_prompt_file {
        builder = builder.keyword_prompt(read_prompt(path).await?);
    }
    if let Some(ref path) = cli.caption_prompt_file {
        builder = builder.caption_prompt(read_prompt(path).await?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

/// Parse `--crop-margins LEFT,TOP,RIGHT,BOTTOM`.
fn parse_margins(s: &str) -> Result<CropMargins> {
    let values: Vec<f32> = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .with_context(|| format!("Invalid crop margin: '{}'", v.trim()))
        })
        .collect::<Result<Vec<_>>>()?;

    match values[..] {
        [left, top, right, bottom] if values.iter().all(|v| v.is_finite() && *v >= 0.0) => {
            Ok(CropMargins {
                left,
                top,
                right,
                bottom,
            })
        }
        [_, _, _, _] => anyhow::bail!("Crop margins must be non-negative (got '{}')", s),
        _ => anyhow::bail!(
            "Expected four crop margins LEFT,TOP,RIGHT,BOTTOM (got '{}')",
            s
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_all_single_range_set() {
        assert!(matches!(parse_pages("all").unwrap(), PageSelection::All));
        assert!(matches!(parse_pages(" 5 ").unwrap(), PageSelection::Single(5)));
        assert!(matches!(parse_pages("3-15").unwrap(), PageSelection::Range(3, 15)));
        match parse_pages("1,3,5").unwrap() {
            PageSelection::Set(p) => assert_eq!(p, vec![1, 3, 5]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pages_reject_zero_and_backwards_ranges() {
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-3").is_err());
        assert!(parse_pages("1,0").is_err());
        assert!(parse_pages("abc").is_err());
    }

    #[test]
    fn margins_parse_four_values() {
        let m = parse_margins("25, 10, 350, 500").unwrap();
        assert_eq!(m, CropMargins::default());
        assert!(parse_margins("1,2,3").is_err());
        assert!(parse_margins("1,2,3,-4").is_err());
    }

    #[test]
    fn cli_defaults_mirror_library_defaults() {
        let cli = Cli::parse_from(["pdf2cards", "book.pdf"]);
        assert_eq!(cli.output, PathBuf::from("flashcards.tsv"));
        assert_eq!(cli.chunk_size, FlashcardConfig::default().chunk_size);
        assert_eq!(cli.media_dir, FlashcardConfig::default().media_dir);
        assert_eq!(cli.anki_profile, DEFAULT_PROFILE);
    }

    #[test]
    fn provider_flags_read_the_library_env_names() {
        use clap::CommandFactory;
        let cmd = Cli::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|a| a.get_id() == id)
                .and_then(|a| a.get_env())
                .map(|e| e.to_string_lossy().into_owned())
        };
        assert_eq!(env_of("provider").as_deref(), Some("EDGEQUAKE_LLM_PROVIDER"));
        assert_eq!(env_of("model").as_deref(), Some("EDGEQUAKE_MODEL"));
    }
}
