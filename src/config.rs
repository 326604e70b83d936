//! Configuration types for PDF-to-JSON extraction.
//!
//! Every knob lives in [`ExtractionConfig`], built via
//! [`ExtractionConfigBuilder`]. The rasterisation policy itself is not
//! configurable: page 1 at scale 1.0 (see [`crate::pipeline::render`]).

use crate::error::ExtractError;
use crate::pipeline::llm::CompletionBackend;
use crate::pipeline::render::PageRasterizer;
use crate::progress::SessionObserverHandle;
use std::fmt;
use std::sync::Arc;

/// Default chat-completion model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default base URL of the OpenAI-compatible API (`/chat/completions` is appended).
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variables consulted for the bearer credential, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["PDF2JSON_API_KEY", "OPENAI_API_KEY"];

/// Configuration for a PDF-to-JSON extraction.
///
/// # Example
/// ```rust
/// use pdf2json::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o-mini")
///     .max_tokens(2000)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 2000);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Chat-completion model identifier. Default: `gpt-4o`.
    pub model: String,

    /// Base URL of the OpenAI-compatible API. Default: `https://api.openai.com/v1`.
    pub api_base_url: String,

    /// Bearer credential. If None, read from `PDF2JSON_API_KEY` then `OPENAI_API_KEY`.
    pub api_key: Option<String>,

    /// Upper bound on generated tokens. Default: 4000.
    pub max_tokens: u32,

    /// Custom system instruction. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Custom user instruction sent next to the image.
    /// If None, uses [`crate::prompts::DEFAULT_USER_INSTRUCTION`].
    pub instruction: Option<String>,

    /// Ask the model for a JSON object via `response_format`. Default: false.
    ///
    /// Only models that support structured output accept this; others
    /// answer with HTTP 400.
    pub json_mode: bool,

    /// Origin that references under `/pdf/` are rewritten to. Default: None.
    ///
    /// With `https://docs.example.com`, `/pdf/a/b.pdf` is fetched from
    /// `https://docs.example.com/a/b.pdf`.
    pub pdf_origin: Option<String>,

    /// Timeout for fetching the PDF, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for the chat-completion call, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Pre-constructed completion backend. Takes precedence over the HTTP client.
    pub backend: Option<Arc<dyn CompletionBackend>>,

    /// Pre-constructed rasteriser. Takes precedence over pdfium.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Optional observer notified of stage and state changes.
    pub observer: Option<SessionObserverHandle>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            max_tokens: 4000,
            system_prompt: None,
            instruction: None,
            json_mode: false,
            pdf_origin: None,
            download_timeout_secs: 120,
            api_timeout_secs: 120,
            backend: None,
            rasterizer: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|s| s.len()))
            .field("instruction", &self.instruction.as_ref().map(|s| s.len()))
            .field("json_mode", &self.json_mode)
            .field("pdf_origin", &self.pdf_origin)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn CompletionBackend>"))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"))
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The bearer credential: the configured key, else the first non-empty
    /// variable of [`API_KEY_ENV_VARS`].
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.trim().is_empty() {
                return Some(key.trim().to_string());
            }
        }
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }

    /// Full URL of the chat-completion endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url.trim_end_matches('/'))
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn instruction(mut self, text: impl Into<String>) -> Self {
        self.config.instruction = Some(text.into());
        self
    }

    pub fn json_mode(mut self, v: bool) -> Self {
        self.config.json_mode = v;
        self
    }

    pub fn pdf_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.pdf_origin = Some(origin.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn observer(mut self, observer: SessionObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig("Model must not be empty".into()));
        }
        if !is_http_url(&c.api_base_url) {
            return Err(ExtractError::InvalidConfig(format!(
                "API base URL must start with http:// or https://, got '{}'",
                c.api_base_url
            )));
        }
        if let Some(ref origin) = c.pdf_origin {
            if !is_http_url(origin) {
                return Err(ExtractError::InvalidConfig(format!(
                    "PDF origin must start with http:// or https://, got '{}'",
                    origin
                )));
            }
        }
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig("Max tokens must be ≥ 1".into()));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        Ok(self.config)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
