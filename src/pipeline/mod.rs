//! Pipeline stages for PDF-to-JSON extraction.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ reply
//! (URL/path) (pdfium)  (base64)  (chat)  (locate JSON)
//! ```
//!
//! 1. [`input`]  — validate the reference and fetch the document bytes
//! 2. [`render`] — rasterise page 1 at scale 1.0; runs in `spawn_blocking`
//!    because pdfium is not async-safe. The library binding lives in
//!    [`engine`] and is created once per process
//! 3. [`encode`] — PNG-encode and base64-wrap the frame as a data URL
//! 4. [`llm`]    — build the single vision request and send it
//! 5. [`reply`]  — find the JSON object in the reply text, or fall back to
//!    the raw response

pub mod encode;
pub mod engine;
pub mod input;
pub mod llm;
pub mod render;
pub mod reply;
