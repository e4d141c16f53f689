//! CLI binary for submittal2csv.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig`, writes the CSV and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use submittal2csv::{
    csv_output_path, extract_to_csv, inspect, DocumentMetadata, ExtractionConfig,
    ExtractionProgressCallback, PageSelection, ProgressCallback,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

/// Live progress bar plus one log line per page. Pages may complete out of
/// order when `--concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner only until `on_extraction_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
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
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn page_elapsed_secs(&self, page_num: usize) -> f64 {
        let elapsed_ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        elapsed_ms as f64 / 1000.0
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting products from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, candidates: usize) {
        let secs = self.page_elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{candidates:>3} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.page_elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, success_count: usize, unique_records: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages read, {} unique products",
                green("✔"),
                bold(&success_count.to_string()),
                bold(&unique_records.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages read  ({} failed), {} unique products",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
                bold(&unique_records.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract to output/<name>.csv
  submittal2csv submittal.pdf

  # Explicit output file
  submittal2csv submittal.pdf -o products.csv

  # Only the cut sheets
  submittal2csv --pages 3-40 submittal.pdf

  # Four pages in flight at once
  submittal2csv --concurrency 4 submittal.pdf

  # From a URL, also printing the rows as JSON
  submittal2csv --json https://example.com/submittal.pdf > rows.json

  # Inspect PDF metadata (no API key needed)
  submittal2csv --inspect-only submittal.pdf

OUTPUT:
  product_name,manufacturer,page_number
  One row per distinct (product, manufacturer) pair, compared
  case-insensitively. The first page a product appears on wins.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_DYNAMIC_LIB_PATH Directory containing libpdfium
  RUST_LOG                Log filter (overrides --verbose / --quiet)
"#;

/// Extract product and manufacturer rows from submittal PDFs into CSV.
#[derive(Parser, Debug)]
#[command(
    name = "submittal2csv",
    version,
    about = "Extract products and manufacturers from submittal PDFs into CSV",
    long_about = "Render each page of a construction submittal PDF, ask a vision model for the \
products it lists, and write a deduplicated product_name,manufacturer,page_number CSV. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory for `<input name>.csv`.
    #[arg(long, env = "SUBMITTAL2CSV_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Write the CSV to this file instead of the output directory.
    #[arg(short, long, env = "SUBMITTAL2CSV_OUTPUT")]
    output: Option<PathBuf>,

    /// Vision model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "SUBMITTAL2CSV_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Pages in flight at once. 1 processes pages strictly in order.
    #[arg(short, long, env = "SUBMITTAL2CSV_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "SUBMITTAL2CSV_PAGES", default_value = "all", value_parser = parse_pages)]
    pages: PageSelection,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SUBMITTAL2CSV_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "SUBMITTAL2CSV_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max model output tokens per page.
    #[arg(long, env = "SUBMITTAL2CSV_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "SUBMITTAL2CSV_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per page on request failure.
    #[arg(long, env = "SUBMITTAL2CSV_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-page request timeout in seconds.
    #[arg(long, env = "SUBMITTAL2CSV_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SUBMITTAL2CSV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Also print the rows as JSON to stdout.
    #[arg(long, env = "SUBMITTAL2CSV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SUBMITTAL2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SUBMITTAL2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SUBMITTAL2CSV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            print_metadata(&cli.input, &meta);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| csv_output_path(&cli.input, &cli.output_dir));

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract_to_csv(&cli.input, &output_path, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&output.records).context("Failed to serialise rows")?;
        println!("{json}");
    }

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  Saved {} unique rows to {}",
            if stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&stats.unique_records.to_string()),
            bold(&output_path.display().to_string()),
        );
        if stats.failed_pages > 0 {
            eprintln!("   {} pages failed and contributed no rows", red(&stats.failed_pages.to_string()));
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  /  {} duplicates dropped  /  {}ms",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
            dim(&stats.duplicates_discarded.to_string()),
            stats.total_duration_ms,
        );
    }

    Ok(())
}

fn parse_pages(s: &str) -> Result<PageSelection, String> {
    s.parse().map_err(|e: submittal2csv::ExtractError| e.to_string())
}

fn print_metadata(input: &str, meta: &DocumentMetadata) {
    let fields = [
        ("File", Some(input.to_string())),
        ("Title", meta.title.clone()),
        ("Author", meta.author.clone()),
        ("Subject", meta.subject.clone()),
        ("Pages", Some(meta.page_count.to_string())),
        ("PDF Version", Some(meta.pdf_version.clone())),
        ("Producer", meta.producer.clone()),
        ("Creator", meta.creator.clone()),
        ("Created", meta.creation_date.clone()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("{:<13} {}", format!("{label}:"), value);
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .pages(cli.pages.clone())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_flag_is_parsed() {
        let cli = Cli::try_parse_from(["submittal2csv", "--pages", "3-15", "doc.pdf"]).unwrap();
        assert_eq!(cli.pages, PageSelection::Range(3, 15));
    }

    #[test]
    fn pages_flag_rejects_bad_input() {
        assert!(Cli::try_parse_from(["submittal2csv", "--pages", "9-3", "doc.pdf"]).is_err());
        assert!(Cli::try_parse_from(["submittal2csv", "--pages", "0", "doc.pdf"]).is_err());
    }

    #[test]
    fn cli_requires_input() {
        assert!(Cli::try_parse_from(["submittal2csv"]).is_err());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["submittal2csv", "doc.pdf"]).unwrap();
        assert_eq!(cli.output_dir, PathBuf::from("output"));
        assert_eq!(cli.concurrency, 1);
        assert_eq!(cli.max_retries, 0);
        assert!(cli.output.is_none());
    }
}
