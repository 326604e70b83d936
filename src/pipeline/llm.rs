//! Model interaction: build the vision request and send it once.
//!
//! Prompt text lives in [`crate::prompts`]; wire types and the HTTP client in
//! [`crate::api`]. This stage only assembles the message list and drives a
//! [`CompletionBackend`]. There is no retry: a failed call is the terminal
//! outcome of the extraction.

use crate::api::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat};
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::encode::EncodedImage;
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_INSTRUCTION};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Anything that can answer a chat-completion request.
///
/// [`crate::api::HttpChatClient`] is the real implementation. Tests and
/// embedders can inject their own via
/// [`crate::config::ExtractionConfig::backend`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ExtractError>;
}

/// Build the single request for `image`.
///
/// ## Message Layout
///
/// 1. **System message** — fixed role instruction (or override)
/// 2. **User message** — the page PNG as a data URL, then the extraction
///    instruction (or override)
pub fn build_request(image: &EncodedImage, config: &ExtractionConfig) -> ChatCompletionRequest {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let instruction = config
        .instruction
        .as_deref()
        .unwrap_or(DEFAULT_USER_INSTRUCTION);

    ChatCompletionRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user_with_image(image.data_url(), instruction),
        ],
        max_tokens: config.max_tokens,
        response_format: config.json_mode.then(ResponseFormat::json_object),
    }
}

/// Send the request built from `image` and return the response with the
/// call duration in milliseconds. The image is consumed: it belongs to this
/// request only.
pub async fn request_extraction(
    backend: &Arc<dyn CompletionBackend>,
    image: EncodedImage,
    config: &ExtractionConfig,
) -> Result<(ChatCompletionResponse, u64), ExtractError> {
    let request = build_request(&image, config);
    drop(image);

    let start = Instant::now();
    let response = backend.complete(&request).await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    if let Some(usage) = response.usage() {
        debug!(
            "{} input tokens, {} output tokens, {}ms",
            usage.prompt_tokens, usage.completion_tokens, duration_ms
        );
    }

    Ok((response, duration_ms))
}
