//! Extraction request: one prompt plus every PDF, sent once to the model.
//!
//! The request is a single Gemini `generateContent` call whose only user
//! turn carries each PDF as an `inline_data` part followed by the prompt
//! text. There is no retry loop: an API failure is reported once and the
//! user decides whether to press the button again.
//!
//! The provider sits behind [`ExtractionProvider`] so tests and library
//! callers can substitute a stub without touching the pipeline.

use crate::config::{ReconstructionConfig, API_KEY_ENV};
use crate::error::PathwayError;
use crate::pipeline::intake::Document;
use crate::prompts::EXTRACTION_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// MIME type sent with every document part.
pub const PDF_MIME: &str = "application/pdf";

/// Everything the model needs for one extraction.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub documents: Vec<Document>,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl ExtractionRequest {
    /// Assemble the request from the accepted documents and the config.
    pub fn new(documents: &[Document], config: &ReconstructionConfig) -> Self {
        Self {
            documents: documents.to_vec(),
            prompt: config
                .prompt
                .clone()
                .unwrap_or_else(|| EXTRACTION_PROMPT.to_string()),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }

    /// Gemini `generateContent` body: PDFs first, prompt last.
    pub fn to_gemini_body(&self) -> Value {
        let mut parts: Vec<Value> = self
            .documents
            .iter()
            .map(|doc| {
                json!({
                    "inline_data": {
                        "mime_type": PDF_MIME,
                        "data": STANDARD.encode(doc.bytes()),
                    }
                })
            })
            .collect();
        parts.push(json!({ "text": self.prompt }));

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        })
    }
}

/// The model's answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub finish_reason: Option<String>,
}

/// Anything that can turn PDFs plus a prompt into text.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Short provider name for logs and errors.
    fn name(&self) -> &str;

    /// Send the request once and return the model's text.
    async fn extract(&self, request: &ExtractionRequest) -> Result<ModelResponse, PathwayError>;
}

// ── Gemini ───────────────────────────────────────────────────────────────

/// Google Gemini over its REST API.
pub struct GeminiProvider {
    model: String,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, PathwayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PathwayError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            model: model.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ExtractionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ModelResponse, PathwayError> {
        let body = request.to_gemini_body();
        info!(
            "Sending {} document(s) to {} ({})",
            request.documents.len(),
            self.model,
            self.name()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PathwayError::ApiTimeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    PathwayError::RequestFailed {
                        provider: self.name().to_string(),
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                PathwayError::ApiTimeout {
                    secs: self.timeout_secs,
                }
            } else {
                PathwayError::RequestFailed {
                    provider: self.name().to_string(),
                    detail: format!("unreadable response body: {e}"),
                }
            }
        })?;

        if status >= 400 {
            let message = error_message(&body);
            warn!("Gemini returned HTTP {}: {}", status, message);
            return Err(status_error(self.name(), status, message, retry_after));
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| PathwayError::RequestFailed {
            provider: self.name().to_string(),
            detail: format!("response is not JSON: {e}"),
        })?;
        let parsed = parse_gemini_response(&json, &self.model)?;
        debug!(
            "Gemini: {} input tokens, {} output tokens, {} chars",
            parsed.input_tokens,
            parsed.output_tokens,
            parsed.text.len()
        );
        Ok(parsed)
    }
}

/// The API's `error.message`, else the start of the raw body.
///
/// Gateways and proxies answer 429 / 502 with HTML or plain text.
fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json["error"]["message"].as_str() {
            return message.to_string();
        }
    }
    let text = body.trim();
    if text.is_empty() {
        return "unknown API error".to_string();
    }
    text.chars().take(200).collect()
}

/// Map an HTTP error status to the matching fatal error.
fn status_error(provider: &str, status: u16, message: String, retry_after: Option<u64>) -> PathwayError {
    match status {
        401 | 403 => PathwayError::AuthError {
            provider: provider.to_string(),
            detail: message,
        },
        429 => PathwayError::RateLimitExceeded {
            provider: provider.to_string(),
            retry_after_secs: retry_after,
        },
        _ => PathwayError::LlmApiError { status, message },
    }
}

/// Pull the candidate text and usage out of a `generateContent` response.
///
/// Text parts of the first candidate are concatenated; thought parts are
/// skipped.
pub fn parse_gemini_response(json: &Value, model: &str) -> Result<ModelResponse, PathwayError> {
    let candidate = &json["candidates"][0];
    let finish_reason = candidate["finishReason"].as_str().map(str::to_string);

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|p| !p["thought"].as_bool().unwrap_or(false))
                .filter_map(|p| p["text"].as_str())
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = finish_reason.or_else(|| {
            json["promptFeedback"]["blockReason"]
                .as_str()
                .map(str::to_string)
        });
        return Err(PathwayError::EmptyResponse { reason });
    }

    Ok(ModelResponse {
        text,
        model: json["modelVersion"].as_str().unwrap_or(model).to_string(),
        input_tokens: json["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
        output_tokens: json["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .unwrap_or(0),
        finish_reason,
    })
}

/// Resolve the provider, most specific first: a pre-built provider from the
/// config, else Gemini with the configured key.
pub fn resolve_provider(
    config: &ReconstructionConfig,
) -> Result<Arc<dyn ExtractionProvider>, PathwayError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let key = config
        .api_key
        .as_deref()
        .ok_or_else(|| PathwayError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: format!("Set {API_KEY_ENV} in your environment or .env file."),
        })?;

    let provider = GeminiProvider::new(
        key,
        config.model.clone(),
        config.api_base_url.clone(),
        config.api_timeout_secs,
    )?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> Document {
        Document::from_upload(name, b"%PDF-1.7\nbody".to_vec(), 1024).unwrap()
    }

    #[test]
    fn body_puts_pdfs_before_prompt() {
        let config = ReconstructionConfig::builder()
            .prompt("extract please")
            .max_output_tokens(1000)
            .build()
            .unwrap();
        let req = ExtractionRequest::new(&[doc("a.pdf"), doc("b.pdf")], &config);
        let body = req.to_gemini_body();

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inline_data"]["mime_type"], PDF_MIME);
        let decoded = STANDARD
            .decode(parts[1]["inline_data"]["data"].as_str().unwrap())
            .unwrap();
        assert!(decoded.starts_with(b"%PDF"));
        assert_eq!(parts[2]["text"], "extract please");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1000);
    }

    #[test]
    fn default_prompt_used_without_override() {
        let req = ExtractionRequest::new(&[doc("a.pdf")], &ReconstructionConfig::default());
        assert_eq!(req.prompt, EXTRACTION_PROMPT);
    }

    #[test]
    fn parse_response_joins_text_parts_and_skips_thoughts() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "thinking...", "thought": true },
                    { "text": "Hello " },
                    { "text": "world" }
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 120, "candidatesTokenCount": 7 },
            "modelVersion": "gemini-2.5-flash-001"
        });
        let r = parse_gemini_response(&json, "gemini-2.5-flash").unwrap();
        assert_eq!(r.text, "Hello world");
        assert_eq!(r.input_tokens, 120);
        assert_eq!(r.output_tokens, 7);
        assert_eq!(r.model, "gemini-2.5-flash-001");
        assert_eq!(r.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn parse_response_without_text_is_empty_response() {
        let json = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        match parse_gemini_response(&json, "m") {
            Err(PathwayError::EmptyResponse { reason }) => {
                assert_eq!(reason.as_deref(), Some("SAFETY"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error("gemini", 403, "bad key".into(), None),
            PathwayError::AuthError { .. }
        ));
        assert!(matches!(
            status_error("gemini", 429, "slow down".into(), Some(12)),
            PathwayError::RateLimitExceeded {
                retry_after_secs: Some(12),
                ..
            }
        ));
        assert!(matches!(
            status_error("gemini", 500, "boom".into(), None),
            PathwayError::LlmApiError { status: 500, .. }
        ));
    }

    #[test]
    fn error_bodies_that_are_not_json_keep_their_status() {
        assert_eq!(
            error_message(r#"{"error": {"code": 400, "message": "API key not valid"}}"#),
            "API key not valid"
        );
        assert_eq!(error_message("  "), "unknown API error");

        let html = "<html><body>502 Bad Gateway</body></html>";
        assert_eq!(error_message(html), html);
        match status_error("gemini", 502, error_message(html), None) {
            PathwayError::LlmApiError { status, message } => {
                assert_eq!(status, 502);
                assert!(message.contains("Bad Gateway"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            status_error("gemini", 429, error_message("Too Many Requests"), Some(30)),
            PathwayError::RateLimitExceeded {
                retry_after_secs: Some(30),
                ..
            }
        ));
        assert_eq!(error_message(&"x".repeat(500)).len(), 200);
    }

    #[test]
    fn missing_key_is_provider_not_configured() {
        let config = ReconstructionConfig::default();
        match resolve_provider(&config) {
            Err(PathwayError::ProviderNotConfigured { hint, .. }) => {
                assert!(hint.contains(API_KEY_ENV))
            }
            Err(other) => panic!("unexpected {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
