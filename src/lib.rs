//! # pdf2json
//!
//! Extract structured data as JSON from the first page of a PDF using a
//! vision chat-completion model.
//!
//! The page is rasterised with pdfium, sent once as a PNG data URL together
//! with an extraction instruction, and the JSON object in the model's reply is
//! returned pretty-printed. When the reply contains no JSON object the raw API
//! response is returned instead, so there is always something to show.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF URL
//!  │
//!  ├─ 1. Input   validate, fetch over HTTP(S) or read a local file
//!  ├─ 2. Render  page 1 at scale 1.0 via pdfium (spawn_blocking)
//!  ├─ 3. Encode  RGBA → PNG → base64 data URL
//!  ├─ 4. Request one POST /chat/completions (system + image + instruction)
//!  └─ 5. Reply   locate the first JSON object, else raw response
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2json::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential from OPENAI_API_KEY (or PDF2JSON_API_KEY)
//!     let config = ExtractionConfig::default();
//!     let out = extract("https://example.com/invoice.pdf", &config).await?;
//!     println!("{}", out.display);
//!     Ok(())
//! }
//! ```
//!
//! For an interactive front end use [`Session`], which adds the single-flight
//! Idle/Busy state and keeps the last error or result.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2json` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::HttpChatClient;
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::ExtractError;
pub use extract::{
    extract, extract_from_bytes, extract_sync, extract_to_file, rasterize, write_extraction,
};
pub use output::{Extraction, ExtractionStats, Outcome};
pub use pipeline::encode::EncodedImage;
pub use pipeline::llm::CompletionBackend;
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use progress::{NoopObserver, SessionObserver, SessionObserverHandle, Stage};
pub use session::{Session, SessionState, UiSnapshot};
