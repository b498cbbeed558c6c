//! CLI binary for po-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one file through an in-memory store and prints
//! the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use po_extract::pipeline::detect::detect_buyer;
use po_extract::pipeline::split::DocumentSplitter;
use po_extract::{
    Buyer, DocumentContent, ExtractionConfig, ExtractionProgressCallback, ExtractionResult,
    GeminiBackend, InferenceBackend, MemoryStore, Processor, ProgressCallback, ProviderBackend,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the batches of a document and a
/// log line per batch.
struct CliProgressCallback {
    bar: ProgressBar,
    empty_batches: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            empty_batches: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_batches: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} batches  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        self.bar.set_length(total_batches as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
    }

    fn on_batch_start(&self, batch: usize, total_batches: usize) {
        self.bar.set_message(format!("batch {batch}/{total_batches}"));
    }

    fn on_batch_complete(&self, batch: usize, total_batches: usize, rows: usize) {
        self.bar.println(format!(
            "  {} Batch {:>2}/{:<2}  {}",
            green("✓"),
            batch,
            total_batches,
            dim(&format!("{rows:>4} rows")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_empty(&self, batch: usize, total_batches: usize) {
        self.empty_batches.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Batch {:>2}/{:<2}  {}",
            yellow("∅"),
            batch,
            total_batches,
            dim("no data"),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, rows: usize, total_pos: usize) {
        self.bar.finish_and_clear();
        let empty = self.empty_batches.load(Ordering::SeqCst);
        let suffix = if empty > 0 {
            format!("  ({empty} empty batch(es))")
        } else {
            String::new()
        };
        eprintln!(
            "{} {} rows from {} POs{}",
            green("✔"),
            bold(&rows.to_string()),
            bold(&total_pos.to_string()),
            suffix
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a purchase order to JSON (stdout)
  po-extract order.pdf

  # Tab-separated rows with export labels, written to a file
  po-extract order.pdf --format tsv -o order.tsv

  # Which buyer template matches?  (no API key needed)
  po-extract --detect-only order.pdf

  # Show PO markers and the batch plan  (no API key needed)
  po-extract --plan order.pdf

  # Force the buyer template
  po-extract --buyer pvh_tommy order.pdf

  # Route through an edgequake-llm provider instead of the Gemini REST API
  po-extract --provider openai --model gpt-4.1 order.pdf

BUYERS:
  levis        Levi Strauss & Co.
  pvh_tommy    PVH / Tommy Hilfiger

ENVIRONMENT VARIABLES:
  GOOGLE_GEMINI_API_KEY     Gemini API key (direct backend)
  PO_EXTRACT_MODEL          Override model ID
  PO_EXTRACT_PROVIDER       Use an edgequake-llm provider (openai, anthropic, gemini, …)
  PO_EXTRACT_API_ENDPOINT   Override the Gemini API base URL
  RUST_LOG                  Override log filter
"#;

/// Extract purchase-order line items from buyer PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "po-extract",
    version,
    about = "Extract purchase-order line items from buyer PDFs with a vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Purchase order file (PDF, JPEG or PNG).
    input: PathBuf,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "PO_EXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "PO_EXTRACT_FORMAT", value_enum, default_value = "json")]
    format: OutputFormat,

    /// Skip detection and use this buyer template: levis, pvh_tommy.
    #[arg(long, env = "PO_EXTRACT_BUYER")]
    buyer: Option<Buyer>,

    /// Gemini API key.
    #[arg(long, env = "GOOGLE_GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini API base URL.
    #[arg(long, env = "PO_EXTRACT_API_ENDPOINT")]
    api_endpoint: Option<String>,

    /// Model ID.
    #[arg(long, env = "PO_EXTRACT_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider (openai, anthropic, gemini, …) instead of the
    /// direct Gemini backend.
    #[arg(long, env = "PO_EXTRACT_PROVIDER")]
    provider: Option<String>,

    /// Retries when the API reports overload.
    #[arg(long, env = "PO_EXTRACT_MAX_RETRIES", default_value_t = 5)]
    max_retries: u32,

    /// POs per batch when a document is split.
    #[arg(long, env = "PO_EXTRACT_BATCH_SIZE", default_value_t = 5)]
    batch_size: usize,

    /// Split only documents with more than this many POs.
    #[arg(long, env = "PO_EXTRACT_SPLIT_THRESHOLD", default_value_t = 5)]
    split_threshold: usize,

    /// Pause between batch requests in milliseconds.
    #[arg(long, env = "PO_EXTRACT_BATCH_DELAY_MS", default_value_t = 1000)]
    batch_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "PO_EXTRACT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Parse the PDF text layer when the model returns nothing.
    #[arg(long, env = "PO_EXTRACT_TEXT_FALLBACK")]
    text_fallback: bool,

    /// Print the detected buyer and exit.
    #[arg(long)]
    detect_only: bool,

    /// Print PO markers and the batch plan and exit.
    #[arg(long)]
    plan: bool,

    /// Disable progress bar.
    #[arg(long, env = "PO_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PO_EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PO_EXTRACT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Tsv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.detect_only && !cli.plan;
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

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    // ── Offline modes ────────────────────────────────────────────────────
    if cli.detect_only {
        let pages = ExtractionConfig::default().detection_pages;
        match detect_buyer(&bytes, pages) {
            Some(buyer) => println!("{} ({})", buyer.as_str(), buyer.profile().display_name),
            None => anyhow::bail!("No buyer pattern found in the first {pages} page(s)"),
        }
        return Ok(());
    }

    if cli.plan {
        let splitter = DocumentSplitter::new(cli.split_threshold, cli.batch_size.max(1));
        let plan = splitter.analyze(&bytes).context("Failed to analyse PDF")?;
        print_plan(&plan)?;
        return Ok(());
    }

    // ── Build config and backend ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let backend: Arc<dyn InferenceBackend> = match cli.provider.as_deref() {
        Some(provider) => Arc::new(
            ProviderBackend::from_name(provider, &config.model)
                .context("Failed to create LLM provider")?,
        ),
        None => Arc::new(GeminiBackend::new(&config).context("Gemini backend unavailable")?),
    };

    // ── Run extraction ───────────────────────────────────────────────────
    let filename = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    let content = DocumentContent::from_filename(filename.clone(), bytes);

    let store = Arc::new(MemoryStore::new());
    let doc = match cli.buyer {
        Some(buyer) => store.insert_with_buyer(filename, content, buyer).await,
        None => store.insert(filename, content).await,
    };

    let processor = Processor::new(store.clone(), backend, config);
    let result = processor.process(&doc).await.context("Extraction failed")?;

    write_result(&cli, &result)?;

    if !cli.quiet && !show_progress {
        eprintln!(
            "{} {} rows from {} POs  ({}, buyer {})",
            cyan("◆"),
            result.total_line_items,
            result.total_pos,
            result.extraction_method,
            result.buyer
        );
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .api_key(cli.api_key.clone().unwrap_or_default())
        .max_retries(cli.max_retries)
        .batch_size(cli.batch_size)
        .split_threshold(cli.split_threshold)
        .batch_delay_ms(cli.batch_delay_ms)
        .api_timeout_secs(cli.api_timeout)
        .text_fallback(cli.text_fallback);

    if let Some(ref endpoint) = cli.api_endpoint {
        builder = builder.api_endpoint(endpoint.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_plan(plan: &po_extract::pipeline::split::SplitPlan) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "{} pages, {} POs, {}",
        plan.page_count,
        plan.po_count(),
        if plan.split { bold("split") } else { dim("single request") }
    )?;
    for marker in &plan.markers {
        writeln!(
            out,
            "  PO {:<12} pages {}-{}",
            marker.po_number, marker.start_page, marker.end_page
        )?;
    }
    for batch in &plan.batches {
        writeln!(
            out,
            "  batch {:>2}  pages {:>3}-{:<3}  {}",
            batch.index,
            batch.start_page,
            batch.end_page,
            dim(&batch.po_numbers.join(", "))
        )?;
    }
    Ok(())
}

fn write_result(cli: &Cli, result: &ExtractionResult) -> Result<()> {
    let text = match cli.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).context("Failed to serialise result")?
        }
        OutputFormat::Tsv => result.to_tsv(),
    };

    match cli.output {
        Some(ref path) => std::fs::write(path, text.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}
