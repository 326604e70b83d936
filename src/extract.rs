//! Extraction entry points.
//!
//! [`extract`] runs the whole pipeline once: validate the reference, resolve
//! the API backend, rasterise page 1, send one request, interpret the reply.
//! Each step either succeeds or ends the attempt with an [`ExtractError`];
//! nothing is retried and nothing is cached between calls.

use crate::api::HttpChatClient;
use crate::config::{ExtractionConfig, API_KEY_ENV_VARS};
use crate::error::ExtractError;
use crate::output::{Extraction, ExtractionStats};
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::llm::{self, CompletionBackend};
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::pipeline::{input, reply};
use crate::progress::Stage;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Extract structured JSON from page 1 of the PDF at `reference`.
///
/// `reference` is an HTTP/HTTPS URL, a local path, or a `/pdf/…` path when
/// [`ExtractionConfig::pdf_origin`] is set.
///
/// # Errors
/// - [`ExtractError::InvalidInput`] for a blank reference, before any I/O
/// - [`ExtractError::ProviderNotConfigured`] when no credential is available
/// - [`ExtractError::Load`] / [`ExtractError::Render`] from the rasteriser
/// - [`ExtractError::Api`] from the chat-completion call
/// - [`ExtractError::Parse`] when the located JSON does not parse
pub async fn extract(
    reference: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<Extraction, ExtractError> {
    let total_start = Instant::now();

    // ── Step 1: Validate input ───────────────────────────────────────────
    let doc = input::resolve(reference.as_ref(), config.pdf_origin.as_deref())?;
    info!("Starting extraction: {}", doc);

    // ── Step 2: Get/create backend ───────────────────────────────────────
    let backend = resolve_backend(config)?;

    // ── Step 3: Rasterise page 1 ─────────────────────────────────────────
    let render_start = Instant::now();
    let image = resolve_rasterizer(config)
        .rasterize(&doc, config.download_timeout_secs)
        .await?;
    let rasterize_duration_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rasterised page 1 → {}x{} px in {}ms",
        image.width, image.height, rasterize_duration_ms
    );

    let mut stats = ExtractionStats {
        image_width: image.width,
        image_height: image.height,
        image_base64_len: image.base64.len(),
        rasterize_duration_ms,
        ..Default::default()
    };

    // ── Step 4: Call the model ───────────────────────────────────────────
    stage(config, Stage::Requesting);
    let (response, api_duration_ms) = llm::request_extraction(&backend, image, config).await?;
    stats.api_duration_ms = api_duration_ms;
    stats.model = response.model().map(str::to_string);
    if let Some(usage) = response.usage() {
        stats.input_tokens = usage.prompt_tokens;
        stats.output_tokens = usage.completion_tokens;
    }

    // ── Step 5: Interpret the reply ──────────────────────────────────────
    stage(config, Stage::Parsing);
    let (outcome, json) = reply::interpret(&response)?;
    let display = reply::to_display(&json)?;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete ({:?}) in {}ms",
        outcome, stats.total_duration_ms
    );

    Ok(Extraction {
        outcome,
        json,
        display,
        reply_text: response.message_content().map(str::to_string),
        stats,
    })
}

/// Run only the rasteriser: fetch, render page 1, encode.
///
/// Does not require an API key.
pub async fn rasterize(
    reference: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<EncodedImage, ExtractError> {
    let doc = input::resolve(reference.as_ref(), config.pdf_origin.as_deref())?;
    resolve_rasterizer(config)
        .rasterize(&doc, config.download_timeout_secs)
        .await
}

/// Extract and write the pretty-printed JSON to `output_path`.
///
/// See [`write_extraction`] for the write semantics.
pub async fn extract_to_file(
    reference: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<Extraction, ExtractError> {
    let extraction = extract(reference, config).await?;
    write_extraction(&extraction, output_path).await?;
    Ok(extraction)
}

/// Write `extraction.display` (plus a trailing newline) to `output_path`.
///
/// Uses atomic write: a temp file in the target directory is persisted over
/// the destination, and removed if that fails, so a failed run never leaves
/// a partial or stray file behind.
pub async fn write_extraction(
    extraction: &Extraction,
    output_path: impl AsRef<Path>,
) -> Result<(), ExtractError> {
    let path = output_path.as_ref().to_path_buf();
    let mut contents = extraction.display.clone();
    contents.push('\n');

    tokio::task::spawn_blocking(move || persist_atomically(&path, contents.as_bytes()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Write task panicked: {}", e)))?
}

fn persist_atomically(path: &Path, contents: &[u8]) -> Result<(), ExtractError> {
    let write_err = |e: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    // On failure the returned temp file is dropped, which deletes it.
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    reference: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<Extraction, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(reference, config))
}

/// Extract from PDF bytes already in memory.
///
/// The bytes are written to a managed temp file that is removed on return.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<Extraction, ExtractError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `extract` returns
    extract(&path, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the completion backend.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **HTTP client** for `config.completions_url()` with the credential from
///    [`ExtractionConfig::resolve_api_key`].
fn resolve_backend(config: &ExtractionConfig) -> Result<Arc<dyn CompletionBackend>, ExtractError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let api_key = config
        .resolve_api_key()
        .ok_or_else(|| ExtractError::ProviderNotConfigured {
            hint: format!(
                "No API key found. Set {} (or pass --api-key).",
                API_KEY_ENV_VARS.join(" or ")
            ),
        })?;

    let client = HttpChatClient::new(config.completions_url(), api_key, config.api_timeout_secs)?;
    debug!("Using chat-completion endpoint {}", client.endpoint());
    Ok(Arc::new(client))
}

fn resolve_rasterizer(config: &ExtractionConfig) -> Arc<dyn PageRasterizer> {
    match config.rasterizer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(PdfiumRasterizer::new().with_observer(config.observer.clone())),
    }
}

fn stage(config: &ExtractionConfig, stage: Stage) {
    if let Some(ref obs) = config.observer {
        obs.on_stage(stage);
    }
}
