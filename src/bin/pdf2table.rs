//! CLI binary for pdf2table.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScanConfig` and prints one result block per extracted image.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2table::{
    extract_only, scan, scan_stream, BackendKind, ImageReport, ProgressCallback, ScanConfig,
    ScanProgressCallback, Verdict,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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

/// Terminal progress callback: a live bar plus one status line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_complete` tells us the image count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Extracting");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Detecting");
        self.bar.reset_eta();
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, total_images: usize, error: Option<&str>) {
        self.activate_bar(total_images);
        match error {
            Some(e) => self.bar.println(format!("{} {}", red("✗"), red(e))),
            None => self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Extracted {total_images} images"))
            )),
        }
    }

    fn on_image_start(&self, _index: usize, _total: usize, file_name: &str) {
        self.bar.set_message(file_name.to_string());
    }

    fn on_image_complete(&self, index: usize, total: usize, report: &ImageReport) {
        let label = match report.verdict {
            Verdict::Table => green("table"),
            Verdict::NoTable => dim("no table"),
            Verdict::Unrecognised | Verdict::Empty => cyan("?"),
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<24}  {}  {}",
            green("✓"),
            index,
            total,
            report.file_name,
            label,
            dim(&format!("{:.2}s", report.elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, report: &ImageReport, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<24}  {}  {}",
            red("✗"),
            index,
            total,
            report.file_name,
            red(&msg),
            dim(&format!("{:.2}s", report.elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_scan_complete(&self, total: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(succeeded);
        if failed == 0 {
            eprintln!("{} {} images scanned", green("✔"), bold(&succeeded.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images answered  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Local Ollama (minicpm-v) on the default file
  pdf2table

  # A specific PDF and image folder
  pdf2table report.pdf -o report_images

  # Hosted OpenAI-compatible endpoint
  PDF2TABLE_API_KEY=sk-... pdf2table --backend hosted report.pdf

  # Any edgequake-llm provider
  pdf2table --backend provider --provider openai --model gpt-4.1-mini report.pdf

  # Only write the images, no model calls
  pdf2table --extract-only report.pdf -o images

  # Structured output
  pdf2table --json report.pdf > scan.json

OUTPUT FILES:
  <output_dir>/page_<p>_img_<i>.<ext>   one per embedded image, 1-indexed
  ext is jpeg, jpx or jb2 for images stored in those codecs, png otherwise

ENVIRONMENT VARIABLES:
  PDF2TABLE_API_KEY       Credential for --backend hosted
  OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY
                          Used by --backend provider auto-detection
  EDGEQUAKE_LLM_PROVIDER  Provider override for --backend provider
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Detect and transcribe tables in the images embedded in a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2table",
    version,
    about = "Detect and transcribe tables in the images embedded in a PDF",
    long_about = "Extract every embedded image from a PDF and ask a vision language model \
whether it contains a table. Tables come back as Markdown; images without one come back as \
'No table'. Works with a local Ollama, a hosted OpenAI-compatible endpoint, or any \
edgequake-llm provider.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to scan.
    #[arg(env = "PDF2TABLE_PDF", default_value = "pdf_with_table.pdf")]
    pdf: PathBuf,

    /// Directory receiving the extracted images.
    #[arg(short, long, env = "PDF2TABLE_OUTPUT_DIR", default_value = "output_folder")]
    output_dir: PathBuf,

    /// Detection backend.
    #[arg(long, env = "PDF2TABLE_BACKEND", value_enum, default_value = "local")]
    backend: BackendArg,

    /// Local generate endpoint URL.
    #[arg(long, env = "PDF2TABLE_LOCAL_URL")]
    local_url: Option<String>,

    /// Hosted endpoint base URL (`/chat/completions` is appended).
    #[arg(long, env = "PDF2TABLE_HOSTED_URL")]
    hosted_url: Option<String>,

    /// Credential for the hosted endpoint.
    #[arg(long, env = "PDF2TABLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID. Default depends on --backend.
    #[arg(long, env = "PDF2TABLE_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider name for --backend provider (openai, anthropic, gemini, ollama…).
    #[arg(long, env = "PDF2TABLE_PROVIDER")]
    provider: Option<String>,

    /// Text file replacing the built-in detection instruction.
    #[arg(long, env = "PDF2TABLE_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Text file replacing the built-in system persona.
    #[arg(long, env = "PDF2TABLE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "PDF2TABLE_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Retries of transient backend failures per image.
    #[arg(long, env = "PDF2TABLE_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Images in flight at once; results keep extraction order.
    #[arg(short, long, env = "PDF2TABLE_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// LLM temperature (0.0–2.0), --backend provider only.
    #[arg(long, env = "PDF2TABLE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per image, --backend provider only.
    #[arg(long, env = "PDF2TABLE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Output structured JSON (ScanOutput) instead of text.
    #[arg(long, env = "PDF2TABLE_JSON")]
    json: bool,

    /// Only extract the images; do not call any model.
    #[arg(long)]
    extract_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "PDF2TABLE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Local,
    Hosted,
    Provider,
}

impl From<BackendArg> for BackendKind {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Local => BackendKind::Local,
            BackendArg::Hosted => BackendKind::Hosted,
            BackendArg::Provider => BackendKind::Provider,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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

    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ScanProgressCallback>),
    )
    .await?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let started = Instant::now();
        let images = extract_only(&config).await;
        if let Some(ref cb) = progress {
            cb.bar.finish_and_clear();
        }
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&images).context("Failed to serialise image list")?
            );
        } else {
            for path in &images {
                println!("{}", path.display());
            }
        }
        if !cli.quiet {
            eprintln!(
                "Extracted {} images to {} in {:.2}s",
                images.len(),
                config.output_dir.display(),
                started.elapsed().as_secs_f64()
            );
        }
        return Ok(());
    }

    // ── JSON mode: eager scan ────────────────────────────────────────────
    if cli.json {
        let output = scan(&config).await.context("Scan failed")?;
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    // ── Text mode: print each result as it arrives ──────────────────────
    let started = Instant::now();
    let mut reports = scan_stream(&config).await.context("Scan failed")?;
    let (mut total, mut succeeded, mut tables) = (0usize, 0usize, 0usize);

    while let Some(report) = reports.next().await {
        total += 1;
        if report.succeeded() {
            succeeded += 1;
        }
        if report.verdict == Verdict::Table {
            tables += 1;
        }
        let block = format!(
            "\n{} {}\n{} {:.2}s\n{}",
            bold("Image:"),
            report.file_name,
            bold("Elapsed:"),
            report.elapsed_ms as f64 / 1000.0,
            report.text
        );
        match progress {
            Some(ref cb) => cb.bar.suspend(|| println!("{block}")),
            None => println!("{block}"),
        }
    }

    // With a progress bar, the stream's `on_scan_complete` prints the summary.
    if progress.is_none() && !cli.quiet {
        eprintln!(
            "Scanned {} images in {:.2}s: {} answered, {} with tables",
            total,
            started.elapsed().as_secs_f64(),
            succeeded,
            tables
        );
    }

    Ok(())
}

/// Map CLI args to `ScanConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .pdf_path(&cli.pdf)
        .output_dir(&cli.output_dir)
        .backend_kind(cli.backend.into())
        .request_timeout_secs(cli.timeout)
        .max_retries(cli.max_retries)
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens);

    if let Some(ref url) = cli.local_url {
        builder = builder.local_endpoint_url(url);
    }
    if let Some(ref url) = cli.hosted_url {
        builder = builder.hosted_endpoint_url(url);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.credential(key);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model_id(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.prompt_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.instruction(text);
    }
    if let Some(ref path) = cli.system_prompt {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(text);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
