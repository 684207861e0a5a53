//! CLI binary for pageparse.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ParseConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pageparse::{
    parse, HttpBackend, PageSeparator, ParseConfig, ParseProgressCallback, ParseStatus,
    RecognitionBackend,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus per-page log lines.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set by
    /// `on_document_start` (called before any pages are processed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
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
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Parsing");
        self.bar.reset_eta();
    }
}

impl ParseProgressCallback for CliProgressCallback {
    fn on_document_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Parsing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_number: usize, _total_pages: usize) {
        self.bar.set_message(format!("page {page_number}"));
    }

    fn on_page_complete(&self, page_number: usize, total_pages: usize, element_count: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_number,
            total_pages,
            dim(&format!("{element_count:>3} elements")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_number: usize, total_pages: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = truncate_error(error);

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_number,
            total_pages,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, total_pages: usize, processed_pages: usize) {
        let failed = total_pages.saturating_sub(processed_pages);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages parsed successfully",
                green("✔"),
                bold(&processed_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages parsed  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&processed_pages.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

/// Truncate very long error messages to keep per-page log lines tidy.
/// Counts characters, not bytes; backend errors can carry arbitrary UTF-8.
fn truncate_error(error: &str) -> String {
    const MAX_CHARS: usize = 80;
    if error.chars().count() > MAX_CHARS {
        let head: String = error.chars().take(MAX_CHARS - 1).collect();
        format!("{head}\u{2026}")
    } else {
        error.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Parse a single page image (results under ./results/)
  pageparse scan.png --save-dir results

  # Parse a PDF page by page
  pageparse report.pdf --save-dir results

  # Parse from a URL
  pageparse https://example.com/paper.pdf --save-dir results

  # Larger recognition batches against a beefier backend
  pageparse report.pdf --max-batch-size 16 --save-dir results

  # Structured JSON on stdout, nothing persisted
  pageparse scan.jpg --json > scan.json

OUTPUT LAYOUT (under --save-dir):
  recognition_json/<name>.json   elements with structural trees
  markdown/<name>.md             flat markdown rendering
  figures/<name>_<order>.png     cropped figure regions

BACKEND PROTOCOL:
  POST {endpoint}/layout      {"prompt", "image"}    → {"result"}
  POST {endpoint}/recognize   {"prompts", "images"}  → {"results"}
  Images travel as base64 PNG.

ENVIRONMENT VARIABLES:
  PAGEPARSE_ENDPOINT   Backend base URL (same as --endpoint)
  PDFIUM_LIB_PATH      Path to an existing libpdfium
"#;

/// Parse documents into structured elements using a vision backend.
#[derive(Parser, Debug)]
#[command(
    name = "pageparse",
    version,
    about = "Parse PDFs and page images into structured elements using a vision backend",
    long_about = "Parse documents (local files or URLs) into reading-ordered structured \
elements and markdown using a layout-aware vision model served over HTTP.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// Backend base URL.
    #[arg(
        long,
        env = "PAGEPARSE_ENDPOINT",
        default_value = "http://localhost:8501"
    )]
    endpoint: String,

    /// Directory for persisted outputs (recognition_json/, markdown/, figures/).
    #[arg(short, long, env = "PAGEPARSE_SAVE_DIR")]
    save_dir: Option<PathBuf>,

    /// Maximum elements per recognition batch.
    #[arg(long, env = "PAGEPARSE_MAX_BATCH_SIZE", default_value_t = 4,
          value_parser = clap::value_parser!(usize))]
    max_batch_size: usize,

    /// Recognition batches in flight at once per page.
    #[arg(long, env = "PAGEPARSE_BATCH_CONCURRENCY", default_value_t = 1)]
    batch_concurrency: usize,

    /// Maximum rendered page dimension in pixels.
    #[arg(long, env = "PAGEPARSE_MAX_PIXELS", default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(100..=10000))]
    max_pixels: u32,

    /// Resize the padded inference image to this edge length.
    #[arg(long, env = "PAGEPARSE_INFERENCE_EDGE")]
    inference_edge: Option<u32>,

    /// Page separator in markdown output: hr, none, or custom string.
    #[arg(long, env = "PAGEPARSE_SEPARATOR", default_value = "hr")]
    separator: String,

    /// Retries per failed backend call.
    #[arg(long, env = "PAGEPARSE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Backend call timeout in seconds.
    #[arg(long, env = "PAGEPARSE_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP download timeout for URL inputs in seconds.
    #[arg(long, env = "PAGEPARSE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output the full structured result as JSON on stdout.
    #[arg(long, env = "PAGEPARSE_JSON")]
    json: bool,

    /// Skip markdown output entirely.
    #[arg(long, env = "PAGEPARSE_NO_MARKDOWN")]
    no_markdown: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAGEPARSE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGEPARSE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGEPARSE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    // ── Build backend and config ─────────────────────────────────────────
    let backend: Arc<dyn RecognitionBackend> = Arc::new(
        HttpBackend::new(&cli.endpoint, cli.api_timeout)
            .with_context(|| format!("Invalid backend endpoint: {}", cli.endpoint))?,
    );

    let mut builder = ParseConfig::builder()
        .max_batch_size(cli.max_batch_size)
        .batch_concurrency(cli.batch_concurrency)
        .max_rendered_pixels(cli.max_pixels)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .page_separator(parse_separator(&cli.separator));

    if let Some(edge) = cli.inference_edge {
        builder = builder.inference_edge(edge);
    }
    if let Some(ref dir) = cli.save_dir {
        builder = builder.save_dir(dir);
    }
    if cli.no_markdown {
        builder = builder.without_markdown();
    }
    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new_dynamic());
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run parse ────────────────────────────────────────────────────────
    let output = parse(&cli.input, &backend, &config)
        .await
        .context("Parsing failed")?;

    if cli.json {
        let json = match &output.document {
            pageparse::ParsedDocument::Image(elements) => serde_json::to_string_pretty(elements),
            pageparse::ParsedDocument::Pdf(doc) => serde_json::to_string_pretty(doc),
        }
        .context("Failed to serialise output")?;

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(json.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet {
        let stats = &output.stats;
        let tick = match output.status() {
            ParseStatus::Complete => green("✔"),
            ParseStatus::Partial { .. } => cyan("⚠"),
            ParseStatus::Failed => red("✘"),
        };
        eprintln!(
            "{tick}  {}/{} pages  {} elements  {}ms",
            stats.processed_pages, stats.total_pages, stats.total_elements, stats.total_duration_ms,
        );
        if let Some(ref path) = output.json_path {
            eprintln!("   JSON      →  {}", bold(&path.display().to_string()));
        }
        if let Some(ref path) = output.markdown_path {
            eprintln!("   Markdown  →  {}", bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map `--separator` to `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        custom => PageSeparator::Custom(custom.to_string()),
    }
}
