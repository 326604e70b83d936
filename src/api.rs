//! Wire types and HTTP client for an OpenAI-compatible chat-completion API.
//!
//! Only the subset needed for one vision request is modelled. The response is
//! kept as a raw [`serde_json::Value`] because the raw object itself is what
//! gets displayed when no JSON can be located in the reply text.

use crate::error::{ExtractError, UNKNOWN_API_ERROR};
use crate::pipeline::llm::CompletionBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

// ── Request ──────────────────────────────────────────────────────────────

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user turn carrying an image followed by an instruction.
    pub fn user_with_image(image_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
                ContentPart::Text { text: text.into() },
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    ImageUrl { image_url: ImageUrl },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// `{"type": "json_object"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".into(),
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────

/// A successful response, kept whole.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletionResponse {
    pub raw: Value,
}

/// Token accounting reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl ChatCompletionResponse {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// `choices[0].message`, if present.
    pub fn first_message(&self) -> Option<&Value> {
        self.raw.pointer("/choices/0/message").filter(|m| !m.is_null())
    }

    /// Text content of `choices[0].message`, if it is a string.
    pub fn message_content(&self) -> Option<&str> {
        self.first_message()?.get("content")?.as_str()
    }

    pub fn usage(&self) -> Option<Usage> {
        self.raw
            .get("usage")
            .and_then(|u| serde_json::from_value(u.clone()).ok())
    }

    /// Model name echoed by the server.
    pub fn model(&self) -> Option<&str> {
        self.raw.get("model")?.as_str()
    }
}

/// Pull `error.message` out of an error body, if there is one.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

// ── Client ───────────────────────────────────────────────────────────────

/// Sends requests to `{base_url}/chat/completions` with a bearer credential.
#[derive(Clone)]
pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl fmt::Debug for HttpChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpChatClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl HttpChatClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for HttpChatClient {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ExtractError> {
        debug!("POST {} (model {})", self.endpoint, request.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ExtractError::Api {
                status: None,
                message: if e.is_timeout() {
                    format!("Chat-completion request timed out after {}s", self.timeout_secs)
                } else {
                    format!("Chat-completion request failed: {e}")
                },
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ExtractError::Api {
            status: Some(status.as_u16()),
            message: format!("Failed to read chat-completion response: {e}"),
        })?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| {
                warn!("HTTP {} without a readable error message", status);
                UNKNOWN_API_ERROR.to_string()
            });
            return Err(ExtractError::Api {
                status: Some(status.as_u16()),
                message,
            });
        }

        let raw: Value = serde_json::from_str(&body).map_err(|e| ExtractError::Api {
            status: Some(status.as_u16()),
            message: format!("Chat-completion response is not valid JSON: {e}"),
        })?;

        Ok(ChatCompletionResponse::new(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serialises_to_wire_shape() {
        let req = ChatCompletionRequest {
            model: "gpt-4o".into(),
            messages: vec![
                ChatMessage::system("sys"),
                ChatMessage::user_with_image("data:image/png;base64,AAAA", "extract"),
            ],
            max_tokens: 4000,
            response_format: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": [
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
                        {"type": "text", "text": "extract"}
                    ]}
                ],
                "max_tokens": 4000
            })
        );
    }

    #[test]
    fn response_format_serialises() {
        let v = serde_json::to_value(ResponseFormat::json_object()).unwrap();
        assert_eq!(v, json!({"type": "json_object"}));
    }

    #[test]
    fn message_content_and_usage() {
        let resp = ChatCompletionResponse::new(json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": "{\"a\":1}"}}],
            "usage": {"prompt_tokens": 800, "completion_tokens": 12, "total_tokens": 812}
        }));
        assert_eq!(resp.message_content(), Some("{\"a\":1}"));
        assert_eq!(resp.usage().unwrap().total_tokens, 812);
        assert_eq!(resp.model(), Some("gpt-4o-2024-08-06"));
    }

    #[test]
    fn missing_message_structure() {
        assert!(ChatCompletionResponse::new(json!({"choices": []})).first_message().is_none());
        assert!(ChatCompletionResponse::new(json!({"id": "x"})).first_message().is_none());
        assert!(ChatCompletionResponse::new(json!({"choices": [{"message": null}]}))
            .first_message()
            .is_none());
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#)
                .as_deref(),
            Some("Rate limit reached")
        );
        assert_eq!(error_message(r#"{"error":{}}"#), None);
        assert_eq!(error_message("<html>502</html>"), None);
    }
}
