//! Input resolution: turn the user-supplied reference into PDF bytes.
//!
//! pdfium can parse from memory, so nothing is written to disk: remote
//! documents are downloaded into a buffer and local files are read whole.
//! The `%PDF` magic bytes are checked before returning so callers get a
//! meaningful load error rather than an opaque pdfium failure.

use crate::error::ExtractError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Path prefix rewritten to [`crate::config::ExtractionConfig::pdf_origin`].
pub const PDF_PROXY_PREFIX: &str = "/pdf/";

/// A validated document reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    /// `http://` or `https://` URL.
    Remote(String),
    /// Local file path.
    Local(PathBuf),
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentRef::Remote(url) => f.write_str(url),
            DocumentRef::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Validate and classify a reference.
///
/// Empty or whitespace-only input is rejected with
/// [`ExtractError::InvalidInput`]. When `pdf_origin` is set, references under
/// [`PDF_PROXY_PREFIX`] are rewritten onto that origin.
pub fn resolve(reference: &str, pdf_origin: Option<&str>) -> Result<DocumentRef, ExtractError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ExtractError::InvalidInput);
    }

    if let (Some(origin), Some(rest)) = (pdf_origin, reference.strip_prefix(PDF_PROXY_PREFIX)) {
        let url = format!("{}/{}", origin.trim_end_matches('/'), rest);
        debug!("Rewrote {} → {}", reference, url);
        return Ok(DocumentRef::Remote(url));
    }

    if is_url(reference) {
        Ok(DocumentRef::Remote(reference.to_string()))
    } else {
        Ok(DocumentRef::Local(PathBuf::from(reference)))
    }
}

/// Fetch the document bytes. A single attempt; no retry.
pub async fn fetch(doc: &DocumentRef, timeout_secs: u64) -> Result<Vec<u8>, ExtractError> {
    let bytes = match doc {
        DocumentRef::Remote(url) => download(url, timeout_secs).await?,
        DocumentRef::Local(path) => tokio::fs::read(path).await.map_err(|e| load_error(doc, e))?,
    };
    check_magic(doc, &bytes)?;
    debug!("Fetched {} bytes from {}", bytes.len(), doc);
    Ok(bytes)
}

async fn download(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ExtractError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| ExtractError::Load {
        reference: url.to_string(),
        reason: if e.is_timeout() {
            format!("download timed out after {timeout_secs}s")
        } else {
            e.to_string()
        },
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::Load {
            reference: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| ExtractError::Load {
        reference: url.to_string(),
        reason: e.to_string(),
    })?;

    Ok(bytes.to_vec())
}

/// Reject payloads that do not start with the PDF magic bytes.
fn check_magic(doc: &DocumentRef, bytes: &[u8]) -> Result<(), ExtractError> {
    if bytes.is_empty() {
        return Err(load_error(doc, "document is empty"));
    }
    if !bytes.starts_with(b"%PDF") {
        let head = &bytes[..bytes.len().min(4)];
        return Err(load_error(
            doc,
            format!("not a PDF (first bytes: {:?})", String::from_utf8_lossy(head)),
        ));
    }
    Ok(())
}

fn load_error(doc: &DocumentRef, reason: impl fmt::Display) -> ExtractError {
    ExtractError::Load {
        reference: doc.to_string(),
        reason: reason.to_string(),
    }
}
