//! Error type for the pdf2json library.
//!
//! A single extraction is one attempt with exactly one terminal outcome, so a
//! single fatal error enum is enough. Variants follow the stages of the
//! pipeline:
//!
//! * input  — [`ExtractError::InvalidInput`]
//! * load   — [`ExtractError::Load`] (fetch, magic bytes, PDF parse)
//! * render — [`ExtractError::Render`] (rasterise or PNG-encode page 1)
//! * API    — [`ExtractError::Api`] (non-2xx status, malformed reply)
//! * parse  — [`ExtractError::Parse`] (located JSON does not parse)
//!
//! Every variant's `Display` is written to be shown to the user verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Message used when the API reports a failure without a readable `error.message`.
pub const UNKNOWN_API_ERROR: &str = "Unknown error from the chat-completion API";

/// Message used when a successful reply has no `choices[0].message`.
pub const UNEXPECTED_REPLY_SHAPE: &str = "The API response does not have the expected format";

/// All errors returned by the pdf2json library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The document reference was empty or whitespace only.
    #[error("Please enter a valid PDF URL.")]
    InvalidInput,

    /// Another extraction is still in flight on this session.
    #[error("An extraction is already in progress; wait for it to finish.")]
    Busy,

    // ── Load / render errors ──────────────────────────────────────────────
    /// The document could not be fetched or parsed as a PDF.
    #[error("Failed to load PDF '{reference}': {reason}")]
    Load { reference: String, reason: String },

    /// Page 1 could not be rasterised or encoded.
    #[error("Failed to render page 1: {detail}")]
    Render { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n\
Pre-built libraries: https://github.com/bblanchon/pdfium-binaries/releases"
    )]
    PdfiumBindingFailed(String),

    // ── API errors ────────────────────────────────────────────────────────
    /// The chat-completion API failed or answered with an unusable body.
    ///
    /// `message` is the server-provided `error.message` when there is one.
    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    /// No credential is available for the chat-completion API.
    #[error("Chat-completion API is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    // ── Reply errors ──────────────────────────────────────────────────────
    /// A JSON object was located in the reply but is not valid JSON.
    #[error("Could not parse the JSON in the model reply: {detail}")]
    Parse { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Short machine-friendly name of the error class, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::InvalidInput => "input",
            ExtractError::Busy => "busy",
            ExtractError::Load { .. } => "load",
            ExtractError::Render { .. } | ExtractError::PdfiumBindingFailed(_) => "render",
            ExtractError::Api { .. } | ExtractError::ProviderNotConfigured { .. } => "api",
            ExtractError::Parse { .. } => "parse",
            ExtractError::OutputWriteFailed { .. } => "output",
            ExtractError::InvalidConfig(_) => "config",
            ExtractError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_server_message_verbatim() {
        let e = ExtractError::Api {
            status: Some(401),
            message: "Incorrect API key provided".into(),
        };
        assert_eq!(e.to_string(), "Incorrect API key provided");
        assert_eq!(e.kind(), "api");
    }

    #[test]
    fn load_error_names_reference() {
        let e = ExtractError::Load {
            reference: "https://example.com/a.pdf".into(),
            reason: "HTTP 404 Not Found".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("https://example.com/a.pdf"), "got: {msg}");
        assert!(msg.contains("404"), "got: {msg}");
    }

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(ExtractError::InvalidInput.kind(), "input");
        assert_eq!(
            ExtractError::Render {
                detail: "x".into()
            }
            .kind(),
            "render"
        );
        assert_eq!(
            ExtractError::Parse {
                detail: "x".into()
            }
            .kind(),
            "parse"
        );
    }
}
