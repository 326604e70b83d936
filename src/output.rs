//! Result types returned by an extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which of the two successful terminal outcomes was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A JSON object was located in the model reply.
    Structured,
    /// No JSON object in the reply; the raw API response is shown instead.
    RawFallback,
}

/// The result of one successful extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub outcome: Outcome,
    /// The extracted object, or the raw response on fallback.
    pub json: Value,
    /// `json` pretty-printed with 2-space indentation; what the user sees.
    pub display: String,
    /// The model's reply text, when there was one.
    pub reply_text: Option<String>,
    pub stats: ExtractionStats,
}

impl Extraction {
    pub fn is_structured(&self) -> bool {
        self.outcome == Outcome::Structured
    }
}

/// Timing and size figures for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub image_width: u32,
    pub image_height: u32,
    /// Length of the base64 payload sent to the API.
    pub image_base64_len: usize,
    /// Model name echoed by the API.
    pub model: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Fetch + render + encode.
    pub rasterize_duration_ms: u64,
    pub api_duration_ms: u64,
    pub total_duration_ms: u64,
}
