//! CLI binary for invoice-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs a batch (directory input) or a single file, and
//! prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_ocr::config::{DEFAULT_MODEL, DEFAULT_PROVIDER, DEFAULT_REPORT_FILE};
use invoice_ocr::{
    BatchProgressCallback, BatchRunner, ExtractionConfig, ProgressCallback, ProviderModel,
};
use std::io;
use std::path::{Path, PathBuf};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a progress bar plus one log line per file.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Wall-clock start of the file currently being processed.
    current_start: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Looking for invoices…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current_start: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.current_start
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_files} invoice files"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, path: &Path) {
        if let Ok(mut start) = self.current_start.lock() {
            *start = Some(Instant::now());
        }
        self.bar.set_message(path.display().to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, path: &Path, cost: f64) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            index,
            total,
            path.display(),
            dim(&format!("${cost:.4}")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_file_skipped(&self, index: usize, total: usize, path: &Path, reason: &str) {
        // Keep the log tidy: first line only, truncated.
        let first_line = reason.lines().next().unwrap_or("");
        let msg = if first_line.chars().count() > 80 {
            let cut: String = first_line.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            path.display(),
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_files.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} files extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files extracted  ({} skipped)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every invoice under ./data into ./output/invoice_results.csv
  invoice-ocr data

  # Custom output directory
  invoice-ocr /workspace/data -o /workspace/output

  # Single file: print the normalised record as JSON plus usage
  invoice-ocr data/receipts/taxi-01.jpg

  # Another provider / model
  invoice-ocr --provider anthropic --model claude-sonnet-4-20250514 data

INPUT FILES:
  .jpg .jpeg .png   sent as-is
  .pdf              first page rendered via pdfium, sent as PNG

COST:
  Reported at a fixed $10 / 1M input tokens and $30 / 1M output tokens.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (required for the default provider)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  INVOICE_OCR_PROVIDER    Override provider (openai, anthropic, gemini, ollama)
  INVOICE_OCR_MODEL       Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium, if not on the library search path
"#;

/// Extract structured invoice data from scans using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-ocr",
    version,
    about = "Extract structured invoice data from images and PDFs using Vision LLMs",
    long_about = "Walk a directory of invoice and receipt scans (JPEG, PNG, or PDF first pages), \
classify each one, extract its fields with a Vision Language Model, and write a CSV report with \
per-file latency and cost.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory to process recursively, or a single image/PDF.
    input: PathBuf,

    /// Directory for the CSV report (created if missing).
    #[arg(short, long, env = "INVOICE_OCR_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Report file name inside the output directory.
    #[arg(long, env = "INVOICE_OCR_REPORT_NAME", default_value = DEFAULT_REPORT_FILE)]
    report_name: String,

    /// LLM provider: openai, anthropic, gemini, mistral, ollama.
    #[arg(long, env = "INVOICE_OCR_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// Vision model ID.
    #[arg(long, env = "INVOICE_OCR_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Max output tokens for the classification call.
    #[arg(long, env = "INVOICE_OCR_CLASSIFY_MAX_TOKENS", default_value_t = 50)]
    classify_max_tokens: usize,

    /// Max output tokens for the extraction call.
    #[arg(long, env = "INVOICE_OCR_EXTRACT_MAX_TOKENS", default_value_t = 1000)]
    extract_max_tokens: usize,

    /// LLM temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "INVOICE_OCR_TEMPERATURE")]
    temperature: Option<f32>,

    /// Longest edge in pixels of a rendered PDF page.
    #[arg(long, env = "INVOICE_OCR_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Disable progress bar.
    #[arg(long, env = "INVOICE_OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE_OCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let single_file = cli.input.is_file();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports each file; keep library logs quiet
    // underneath it.
    let show_progress = !cli.quiet && !cli.no_progress && !single_file;
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

    // ── Build config and provider (fails fast on missing credentials) ───
    let config = build_config(&cli)?;
    let model = ProviderModel::connect(&config).context("Failed to initialise LLM provider")?;
    let mut runner = BatchRunner::new(model, config);

    if single_file {
        return run_single(&runner, &cli.input).await;
    }

    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        runner = runner.with_progress(cb);
    }

    let summary = runner
        .run(&cli.input, &cli.output_dir)
        .await
        .context("Batch extraction failed")?;

    if !cli.quiet {
        match summary.report_path {
            Some(ref path) => {
                eprintln!("Results saved to {}", bold(&path.display().to_string()));
                eprintln!("Total processed files: {}", summary.processed());
                eprintln!("Total cost: ${:.4}", summary.total_cost);
            }
            None => eprintln!("No results to save"),
        }
        if !summary.skipped.is_empty() {
            eprintln!("{}", red("Skipped files:"));
            for s in &summary.skipped {
                eprintln!("  - {}: {}", s.path.display(), s.reason);
            }
        }
    }

    Ok(())
}

/// Process one file and print its record and usage breakdown.
async fn run_single(runner: &BatchRunner<ProviderModel>, path: &Path) -> Result<()> {
    let processed = match runner.process_path(path).await {
        Ok(processed) => processed,
        Err(e) if e.is_fatal() => {
            return Err(e).with_context(|| format!("Failed to process {}", path.display()));
        }
        // Per-file failures end the same way as an empty model result.
        Err(e) => {
            eprintln!("{} {}", red("✗"), e);
            None
        }
    };

    let Some(processed) = processed else {
        anyhow::bail!("Failed to process invoice {}", path.display());
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&processed.record.envelope())
            .context("Failed to serialise record")?
    );

    let m = &processed.metrics;
    eprintln!();
    eprintln!("{}", bold("API usage"));
    eprintln!("  Total execution time: {}", m.execution_time());
    eprintln!("  Total input tokens:   {}", m.total_input_tokens);
    eprintln!("  Total output tokens:  {}", m.total_output_tokens);
    eprintln!("  Input cost:           {}", m.input_cost_label());
    eprintln!("  Output cost:          {}", m.output_cost_label());
    eprintln!("  Total cost:           {}", m.total_cost_label());
    eprintln!();
    eprintln!("{}", bold("Calls"));
    for call in &m.calls {
        eprintln!(
            "  - {}: {} input tokens, {} output tokens",
            call.name, call.input_tokens, call.output_tokens
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    ExtractionConfig::builder()
        .provider_name(cli.provider.clone())
        .model(cli.model.clone())
        .classify_max_tokens(cli.classify_max_tokens)
        .extract_max_tokens(cli.extract_max_tokens)
        .temperature(cli.temperature)
        .max_rendered_pixels(cli.max_pixels)
        .report_file_name(cli.report_name.clone())
        .build()
        .context("Invalid configuration")
}
