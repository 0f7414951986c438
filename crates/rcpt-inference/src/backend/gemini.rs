//! Google Generative Language (`generateContent`) backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::InferenceError;
use crate::{InferenceBackend, InferenceRequest, InferenceResponse, Result};

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Connection settings for [`GeminiBackend`].
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model name, without the `models/` prefix.
    pub model: String,
    /// Scheme and host, without trailing slash.
    pub base_url: String,
    /// Whole-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl GeminiConfig {
    /// Settings for the default model and host.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

// The key must never end up in logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Backend calling the Gemini REST API.
pub struct GeminiBackend {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Build a backend with its own HTTP client.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(InferenceError::InvalidRequest("API key is empty".to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| InferenceError::InvalidRequest(e.to_string()))?;

        debug!("Created Gemini backend: {:?}", config);

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[async_trait]
impl InferenceBackend for GeminiBackend {
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        parts.extend(request.images.iter().map(|image| Part::InlineData {
            inline_data: Blob {
                mime_type: image.mime_type.clone(),
                data: image.to_base64(),
            },
        }));

        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        debug!(
            "Sending generateContent to {} ({} image(s))",
            self.config.model,
            request.images.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = classify_error(status, &text);
            warn!("Gemini request failed: {}", err);
            return Err(err);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

        into_inference_response(parsed, &self.config.model)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn into_inference_response(
    parsed: GenerateContentResponse,
    model: &str,
) -> Result<InferenceResponse> {
    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed.prompt_feedback.and_then(|f| f.block_reason);
        return Err(InferenceError::EmptyResponse(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(InferenceError::EmptyResponse(candidate.finish_reason));
    }

    Ok(InferenceResponse {
        text,
        model: parsed.model_version.unwrap_or_else(|| model.to_string()),
        finish_reason: candidate.finish_reason,
    })
}

/// Map a non-success response onto an error kind.
///
/// Gemini reports a bad key as `400 INVALID_ARGUMENT` with reason
/// `API_KEY_INVALID`, and quota exhaustion as `429 RESOURCE_EXHAUSTED`.
fn classify_error(status: StatusCode, body: &str) -> InferenceError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let detail = envelope.as_ref().map(|e| &e.error);

    let message = detail
        .and_then(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.trim().to_string()
            }
        });

    let api_status = detail.and_then(|d| d.status.as_deref()).unwrap_or("");
    let key_rejected = detail
        .map(|d| {
            d.details
                .iter()
                .any(|x| x.reason.as_deref() == Some("API_KEY_INVALID"))
        })
        .unwrap_or(false);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => InferenceError::Authentication(message),
        StatusCode::BAD_REQUEST if key_rejected => InferenceError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => InferenceError::QuotaExceeded(message),
        _ if api_status == "RESOURCE_EXHAUSTED" => InferenceError::QuotaExceeded(message),
        _ if api_status == "UNAUTHENTICATED" || api_status == "PERMISSION_DENIED" => {
            InferenceError::Authentication(message)
        }
        _ => InferenceError::Provider {
            status: status.as_u16(),
            message,
        },
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: Blob },
}

#[derive(Serialize)]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorInfo>,
}

#[derive(Deserialize)]
struct ErrorInfo {
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InlineImage;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    fn backend_for(server: &MockServer) -> GeminiBackend {
        GeminiBackend::new(GeminiConfig::new("test-key").with_base_url(server.uri())).unwrap()
    }

    fn receipt_request() -> InferenceRequest {
        InferenceRequest::new("extract").with_image(InlineImage::new("image/png", b"png".to_vec()))
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = GeminiBackend::new(GeminiConfig::new("  "));
        assert!(matches!(result, Err(InferenceError::InvalidRequest(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = GeminiConfig::new("secret-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [
                    { "text": "extract" },
                    { "inline_data": { "mime_type": "image/png", "data": "cG5n" } }
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "Here: " }, { "text": "{\"a\": 1}" }] },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = backend_for(&server).generate(&receipt_request()).await.unwrap();

        assert_eq!(response.text, "Here: {\"a\": 1}");
        assert_eq!(response.model, "gemini-1.5-flash");
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
    }

    #[tokio::test]
    async fn test_invalid_key_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT",
                    "details": [{ "reason": "API_KEY_INVALID" }]
                }
            })))
            .mount(&server)
            .await;

        let err = backend_for(&server).generate(&receipt_request()).await.unwrap_err();
        assert!(err.is_authentication(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_rate_limit_is_quota_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let err = backend_for(&server).generate(&receipt_request()).await.unwrap_err();
        assert!(err.is_quota(), "got {err:?}");
        assert_eq!(err.to_string(), "quota exceeded: Resource has been exhausted");
    }

    #[tokio::test]
    async fn test_server_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = backend_for(&server).generate(&receipt_request()).await.unwrap_err();
        match err {
            InferenceError::Provider { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let err = backend_for(&server).generate(&receipt_request()).await.unwrap_err();
        assert!(matches!(err, InferenceError::EmptyResponse(Some(ref r)) if r == "SAFETY"));
    }

    #[test]
    fn test_classify_forbidden() {
        let err = classify_error(StatusCode::FORBIDDEN, "");
        assert!(err.is_authentication());
        assert_eq!(err.to_string(), "invalid API key: Forbidden");
    }
}
