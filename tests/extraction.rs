//! Integration tests against a local mock of the chat-completion API.
//!
//! The page rasteriser is replaced with a fixed image so these run without
//! pdfium or network access. Real rendering is covered by `tests/e2e.rs`.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pdf2json::error::UNKNOWN_API_ERROR;
use pdf2json::pipeline::input::DocumentRef;
use pdf2json::{
    extract, extract_from_bytes, extract_to_file, rasterize, EncodedImage, ExtractError,
    ExtractionConfig, Outcome, PageRasterizer, PdfiumRasterizer,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

struct FixedImage;

#[async_trait]
impl PageRasterizer for FixedImage {
    async fn rasterize(
        &self,
        _doc: &DocumentRef,
        _download_timeout_secs: u64,
    ) -> Result<EncodedImage, ExtractError> {
        Ok(EncodedImage {
            base64: PIXEL_PNG.into(),
            width: 1,
            height: 1,
        })
    }
}

/// What the mock server answers, and what it saw.
#[derive(Clone)]
struct Mock {
    status: StatusCode,
    body: String,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn completions(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> (StatusCode, String) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    mock.seen.lock().unwrap().push((auth, request));
    (mock.status, mock.body.clone())
}

/// Start a mock API; returns its base URL and the request log.
async fn serve(status: StatusCode, body: String) -> (String, Arc<Mutex<Vec<(Option<String>, Value)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/files/not-a-pdf.pdf", get(|| async { "<html>hello</html>" }))
        .route(
            "/files/missing.pdf",
            get(|| async { (StatusCode::NOT_FOUND, "gone") }),
        )
        .with_state(Mock {
            status,
            body,
            seen: seen.clone(),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn reply_with(content: &str) -> String {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 812, "completion_tokens": 24, "total_tokens": 836}
    })
    .to_string()
}

fn config_for(base: &str) -> ExtractionConfig {
    ExtractionConfig::builder()
        .api_base_url(format!("{base}/v1"))
        .api_key("sk-test")
        .rasterizer(Arc::new(FixedImage))
        .build()
        .unwrap()
}

// ── Successful outcomes ──────────────────────────────────────────────────────

#[tokio::test]
async fn structured_reply_is_pretty_printed() {
    let (base, seen) = serve(
        StatusCode::OK,
        reply_with(r#"{"invoice_number":"F-2024-001","total":1250.5}"#),
    )
    .await;

    let out = extract("https://example.com/invoice.pdf", &config_for(&base))
        .await
        .unwrap();

    assert_eq!(out.outcome, Outcome::Structured);
    assert_eq!(
        out.display,
        "{\n  \"invoice_number\": \"F-2024-001\",\n  \"total\": 1250.5\n}"
    );
    assert_eq!(out.stats.input_tokens, 812);
    assert_eq!(out.stats.output_tokens, 24);
    assert_eq!(out.stats.model.as_deref(), Some("gpt-4o-2024-08-06"));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn request_carries_bearer_and_vision_payload() {
    let (base, seen) = serve(StatusCode::OK, reply_with("{}")).await;
    extract("https://example.com/invoice.pdf", &config_for(&base))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let (auth, body) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["max_tokens"], 4000);
    assert!(body.get("response_format").is_none());
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"][0]["type"], "image_url");
    assert_eq!(
        body["messages"][1]["content"][0]["image_url"]["url"],
        format!("data:image/png;base64,{PIXEL_PNG}")
    );
    assert_eq!(body["messages"][1]["content"][1]["type"], "text");
}

#[tokio::test]
async fn json_mode_sets_response_format() {
    let (base, seen) = serve(StatusCode::OK, reply_with(r#"{"ok":true}"#)).await;
    let mut config = config_for(&base);
    config.json_mode = true;
    extract("https://example.com/a.pdf", &config).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].1["response_format"], json!({"type": "json_object"}));
}

#[tokio::test]
async fn json_inside_prose() {
    let (base, _) = serve(
        StatusCode::OK,
        reply_with("Here is the data: {\"a\":1} — hope this helps"),
    )
    .await;
    let out = extract("https://example.com/a.pdf", &config_for(&base))
        .await
        .unwrap();
    assert_eq!(out.display, "{\n  \"a\": 1\n}");
}

#[tokio::test]
async fn reply_without_braces_shows_raw_response() {
    let body = reply_with("Sorry, I cannot read this document.");
    let (base, _) = serve(StatusCode::OK, body.clone()).await;

    let out = extract("https://example.com/a.pdf", &config_for(&base))
        .await
        .unwrap();

    let raw: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(out.outcome, Outcome::RawFallback);
    assert_eq!(out.json, raw);
    assert_eq!(out.display, serde_json::to_string_pretty(&raw).unwrap());
    assert_eq!(
        out.reply_text.as_deref(),
        Some("Sorry, I cannot read this document.")
    );
}

// ── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn api_error_message_is_surfaced_verbatim() {
    let (base, _) = serve(
        StatusCode::UNAUTHORIZED,
        json!({"error": {"message": "Incorrect API key provided: sk-test.", "type": "invalid_request_error"}})
            .to_string(),
    )
    .await;

    let err = extract("https://example.com/a.pdf", &config_for(&base))
        .await
        .unwrap_err();

    match err {
        ExtractError::Api { status, ref message } => {
            assert_eq!(status, Some(401));
            assert_eq!(message, "Incorrect API key provided: sk-test.");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn api_error_without_body_uses_generic_message() {
    let (base, _) = serve(StatusCode::INTERNAL_SERVER_ERROR, String::new()).await;
    let err = extract("https://example.com/a.pdf", &config_for(&base))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), UNKNOWN_API_ERROR);
}

#[tokio::test]
async fn unparseable_json_is_parse_error() {
    let (base, _) = serve(StatusCode::OK, reply_with("{invoice: F-1, total: 12}")).await;
    let err = extract("https://example.com/a.pdf", &config_for(&base))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "parse");
}

#[tokio::test]
async fn blank_url_makes_no_request() {
    let (base, seen) = serve(StatusCode::OK, reply_with("{}")).await;
    for input in ["", "   ", "\t\n"] {
        let err = extract(input, &config_for(&base)).await.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidInput), "input {input:?}");
    }
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_pdf_download_is_load_error() {
    let (base, seen) = serve(StatusCode::OK, reply_with("{}")).await;
    let config = ExtractionConfig::builder()
        .api_base_url(format!("{base}/v1"))
        .api_key("sk-test")
        .build()
        .unwrap();

    let url = format!("{base}/files/not-a-pdf.pdf");
    let err = extract(&url, &config).await.unwrap_err();
    assert_eq!(err.kind(), "load");
    assert!(err.to_string().contains(&url), "got: {err}");

    let missing = format!("{base}/files/missing.pdf");
    let err = rasterize(&missing, &config).await.unwrap_err();
    assert!(err.to_string().contains("404"), "got: {err}");

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pdf_origin_rewrites_proxy_paths() {
    let (base, _) = serve(StatusCode::OK, reply_with("{}")).await;
    let config = ExtractionConfig::builder()
        .pdf_origin(format!("{base}/files"))
        .build()
        .unwrap();

    // Reaches the mock's non-PDF route, so the rewrite happened.
    let err = PdfiumRasterizer::new()
        .rasterize(
            &pdf2json::pipeline::input::resolve("/pdf/not-a-pdf.pdf", config.pdf_origin.as_deref())
                .unwrap(),
            5,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not a PDF"), "got: {err}");
}

#[tokio::test]
async fn bytes_without_pdf_header_are_rejected() {
    let (base, seen) = serve(StatusCode::OK, reply_with("{}")).await;
    let config = ExtractionConfig::builder()
        .api_base_url(format!("{base}/v1"))
        .api_key("sk-test")
        .build()
        .unwrap();
    let err = extract_from_bytes(b"PK\x03\x04zip", &config).await.unwrap_err();
    assert_eq!(err.kind(), "load");
    assert!(seen.lock().unwrap().is_empty());
}

// ── Output file ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn extract_to_file_writes_pretty_json() {
    let (base, _) = serve(StatusCode::OK, reply_with(r#"{"b":2,"a":1}"#)).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out.json");

    extract_to_file("https://example.com/a.pdf", &path, &config_for(&base))
        .await
        .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "{\n  \"b\": 2,\n  \"a\": 1\n}\n");
    let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
    assert_eq!(entries.len(), 1, "no temp file left next to the output");
}

#[tokio::test]
async fn failed_extraction_leaves_no_output_file() {
    let (base, _) = serve(StatusCode::BAD_REQUEST, String::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");

    assert!(extract_to_file("https://example.com/a.pdf", &path, &config_for(&base))
        .await
        .is_err());
    assert!(!path.exists());
}
