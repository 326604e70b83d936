//! CLI binary for pdf2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, drives a `Session`, and prints results.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2json::pipeline::input::DocumentRef;
use pdf2json::{
    write_extraction, EncodedImage, ExtractError, Extraction, ExtractionConfig, PageRasterizer,
    PdfiumRasterizer, Session, SessionObserver, SessionObserverHandle, SessionState, Stage,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
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

// ── Spinner observer using indicatif ─────────────────────────────────────────

/// Shows an "Interpreting…" spinner while the session is Busy, with the
/// current stage as the message.
#[derive(Default)]
struct SpinnerObserver {
    bar: Mutex<Option<ProgressBar>>,
}

impl SpinnerObserver {
    fn start(&self) -> ProgressBar {
        let mut slot = self.bar.lock().unwrap_or_else(|p| p.into_inner());
        slot.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_prefix("Interpreting…");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        })
        .clone()
    }

    fn finish(&self) {
        if let Some(bar) = self.bar.lock().unwrap_or_else(|p| p.into_inner()).take() {
            bar.finish_and_clear();
        }
    }
}

impl SessionObserver for SpinnerObserver {
    fn on_state_change(&self, state: SessionState) {
        match state {
            SessionState::Busy => {
                self.start();
            }
            SessionState::Idle => self.finish(),
        }
    }

    fn on_stage(&self, stage: Stage) {
        self.start().set_message(stage.to_string());
    }

    fn on_result(&self, _display: &str) {
        self.finish();
    }

    fn on_error(&self, _message: &str) {
        self.finish();
    }
}

// ── Rasteriser that also writes the page image to disk ──────────────────────

struct SavingRasterizer {
    inner: PdfiumRasterizer,
    path: PathBuf,
}

#[async_trait]
impl PageRasterizer for SavingRasterizer {
    async fn rasterize(
        &self,
        doc: &DocumentRef,
        download_timeout_secs: u64,
    ) -> Result<EncodedImage, ExtractError> {
        let image = self.inner.rasterize(doc, download_timeout_secs).await?;
        let bytes = image.png_bytes()?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| ExtractError::OutputWriteFailed {
                path: self.path.clone(),
                source: e,
            })?;
        Ok(image)
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One extraction, pretty JSON on stdout
  pdf2json https://example.com/invoice.pdf

  # Write the JSON to a file
  pdf2json https://example.com/invoice.pdf -o invoice.json

  # Interactive: paste one URL per line, `quit` to exit
  pdf2json

  # Ask the model for a JSON object directly
  pdf2json --json-mode --model gpt-4o-mini https://example.com/form.pdf

  # Full result with timings and token counts
  pdf2json --report https://example.com/invoice.pdf > report.json

  # Resolve /pdf/... references against a document server
  pdf2json --pdf-origin https://docs.example.com /pdf/2024/statement.pdf

  # Keep the rendered page for inspection
  pdf2json --save-image page1.png https://example.com/invoice.pdf

ENVIRONMENT VARIABLES:
  PDF2JSON_API_KEY   Bearer credential for the chat-completion API
  OPENAI_API_KEY     Used when PDF2JSON_API_KEY is not set
  PDF2JSON_MODEL     Override model ID
  PDF2JSON_API_BASE  Override API base URL (any OpenAI-compatible endpoint)
  PDFIUM_LIB_PATH    Path to libpdfium; otherwise ./ then the system library
  RUST_LOG           Log filter (overrides -v / -q)

  A .env file in the working directory is loaded on startup.
"#;

/// Extract structured JSON from the first page of a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2json",
    version,
    about = "Extract structured JSON from the first page of a PDF using a vision model",
    long_about = "Render the first page of a PDF (URL or local file), send it to an \
OpenAI-compatible chat-completion API together with an extraction instruction, and print \
the JSON object found in the reply. Without a URL, starts an interactive prompt.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF URL (or local path). Omit to start the interactive prompt.
    url: Option<String>,

    /// Read URLs from stdin, one extraction per line.
    #[arg(short, long)]
    interactive: bool,

    /// Write the JSON to this file instead of stdout.
    #[arg(short, long, env = "PDF2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// Chat-completion model ID.
    #[arg(long, env = "PDF2JSON_MODEL", default_value = pdf2json::config::DEFAULT_MODEL)]
    model: String,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "PDF2JSON_API_BASE", default_value = pdf2json::config::DEFAULT_API_BASE_URL)]
    api_base: String,

    /// Bearer credential. Falls back to PDF2JSON_API_KEY, then OPENAI_API_KEY.
    #[arg(long, env = "PDF2JSON_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upper bound on generated tokens.
    #[arg(long, env = "PDF2JSON_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: u32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2JSON_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Path to a text file containing a custom extraction instruction.
    #[arg(long, env = "PDF2JSON_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Request `response_format: json_object` from the API.
    #[arg(long, env = "PDF2JSON_JSON_MODE")]
    json_mode: bool,

    /// Origin that `/pdf/...` references are fetched from.
    #[arg(long, env = "PDF2JSON_PDF_ORIGIN")]
    pdf_origin: Option<String>,

    /// Also write the rendered page 1 PNG to this file.
    #[arg(long)]
    save_image: Option<PathBuf>,

    /// Print the full extraction (outcome, JSON, stats) as JSON.
    #[arg(long, env = "PDF2JSON_REPORT")]
    report: bool,

    /// Disable the spinner.
    #[arg(long, env = "PDF2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2JSON_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Chat-completion call timeout in seconds.
    #[arg(long, env = "PDF2JSON_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads env-backed flags.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("{} could not read .env: {e}", red("warning:"));
        }
    }
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters; keep library INFO logs
    // out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.report;
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

    let observer: Option<SessionObserverHandle> = if show_progress {
        Some(Arc::new(SpinnerObserver::default()))
    } else {
        None
    };
    let config = build_config(&cli, observer).await?;

    match cli.url.clone() {
        Some(url) if !cli.interactive => run_once(&cli, &url, config).await,
        initial => run_interactive(&cli, initial, config).await,
    }
}

/// One extraction; errors exit non-zero.
async fn run_once(cli: &Cli, url: &str, config: ExtractionConfig) -> Result<()> {
    let session = Session::new(config);
    let extraction = extract_once(&session, url, cli.output.as_deref()).await?;

    if let Some(ref output_path) = cli.output {
        if !cli.quiet {
            eprintln!(
                "{}  {:?}  {}ms  →  {}",
                green("✔"),
                extraction.outcome,
                extraction.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    if cli.report {
        let json =
            serde_json::to_string_pretty(&extraction).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", extraction.display).context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.report {
        if !extraction.is_structured() {
            warn!("No JSON object in the reply; printed the raw API response");
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&extraction.stats.input_tokens.to_string()),
            dim(&extraction.stats.output_tokens.to_string()),
            extraction.stats.total_duration_ms,
        );
    }
    Ok(())
}

/// Trigger `session` for `url`, then write the JSON to `output` if given.
///
/// The file is written after the session is back to Idle, so observers have
/// already seen the result when this returns.
async fn extract_once(session: &Session, url: &str, output: Option<&Path>) -> Result<Extraction> {
    session.set_url(url);
    let extraction = session.trigger().await.context("Extraction failed")?;
    if let Some(path) = output {
        write_extraction(&extraction, path)
            .await
            .context("Failed to write output")?;
    }
    Ok(extraction)
}

/// Prompt loop: every line is one trigger. `quit`, `exit` or EOF ends it.
/// Failures are printed and the loop continues.
async fn run_interactive(
    cli: &Cli,
    initial: Option<String>,
    config: ExtractionConfig,
) -> Result<()> {
    let session = Session::new(config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = initial;

    loop {
        let line = match pending.take() {
            Some(url) => url,
            None => {
                if !cli.quiet {
                    eprint!("{} ", bold("PDF URL>"));
                    io::stderr().flush().ok();
                }
                match lines.next_line().await.context("Failed to read stdin")? {
                    Some(line) => line,
                    None => break,
                }
            }
        };
        if matches!(line.trim(), "quit" | "exit") {
            break;
        }

        session.set_url(line);
        match session.trigger().await {
            Ok(extraction) if cli.report => {
                println!(
                    "{}",
                    serde_json::to_string(&extraction).context("Failed to serialise report")?
                );
            }
            Ok(extraction) => println!("{}", extraction.display),
            Err(e) => eprintln!("{} {}", red("✘"), e),
        }
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    cli: &Cli,
    observer: Option<SessionObserverHandle>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .model(&cli.model)
        .api_base_url(&cli.api_base)
        .max_tokens(cli.max_tokens)
        .json_mode(cli.json_mode)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref origin) = cli.pdf_origin {
        builder = builder.pdf_origin(origin);
    }
    if let Some(ref path) = cli.system_prompt {
        builder = builder.system_prompt(read_text(path, "system prompt").await?);
    }
    if let Some(ref path) = cli.instruction {
        builder = builder.instruction(read_text(path, "instruction").await?);
    }
    if let Some(ref path) = cli.save_image {
        builder = builder.rasterizer(Arc::new(SavingRasterizer {
            inner: PdfiumRasterizer::new().with_observer(observer.clone()),
            path: path.clone(),
        }));
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

async fn read_text(path: &Path, what: &str) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {what} from {:?}", path))
}
