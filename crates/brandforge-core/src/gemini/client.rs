//! Gemini REST client
//!
//! Provides async HTTP access to `generateContent` with:
//! - Text completions for strategy work
//! - Image generation returning raw inline payloads
//! - Retry on rate limits and server errors with exponential backoff

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use crate::config::GeminiConfig;
use crate::error::{Error, Result};
use crate::image::{ImagePayload, PayloadData};
use crate::provider::{ImageModel, TextModel};

use super::types::{ErrorEnvelope, GenerateContentRequest, GenerateContentResponse};

/// Gemini API base URL
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Gemini client
///
/// Cheap to clone; one instance serves both the text and image model.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
    temperature: f32,
    max_retries: u32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

/// Builder for creating a GeminiClient
pub struct GeminiClientBuilder {
    config: GeminiConfig,
    api_key: Option<String>,
}

impl Default for GeminiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiClientBuilder {
    pub fn new() -> Self {
        Self {
            config: GeminiConfig::default(),
            api_key: None,
        }
    }

    /// Take models, timeout and retry settings from configuration
    pub fn config(mut self, config: GeminiConfig) -> Self {
        self.config = config;
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to the public Gemini endpoint)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::ApiKeyMissing)?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(Error::Network)?;

        let base_url = if self.config.base_url.trim().is_empty() {
            GEMINI_BASE_URL.to_string()
        } else {
            self.config.base_url.trim_end_matches('/').to_string()
        };

        Ok(GeminiClient {
            http_client,
            api_key,
            base_url,
            text_model: self.config.text_model,
            image_model: self.config.image_model,
            temperature: self.config.temperature,
            max_retries: self.config.max_retries.max(1),
        })
    }
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, api_key: impl Into<String>) -> Result<Self> {
        GeminiClientBuilder::new().config(config).api_key(api_key).build()
    }

    /// Build from configuration, resolving the key from the environment
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .map_err(|e| Error::Config(e.to_string()))?
            .ok_or(Error::ApiKeyMissing)?;
        Self::new(config.clone(), api_key)
    }

    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Send with retry on rate limits and transient upstream errors (text only)
    async fn execute_request(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_request(model, request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempts < self.max_retries && is_transient(&e) => {
                    let suggested = match &e {
                        Error::RateLimited(secs) => *secs,
                        _ => 0,
                    };
                    let backoff = calculate_backoff(attempts, suggested);
                    warn!(
                        model = %model,
                        attempt = attempts,
                        wait_ms = backoff,
                        error = %e,
                        "Gemini request failed, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_request(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        debug!(model = %model, "Sending generateContent request");

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(Error::Network)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest::prompt(prompt).with_temperature(self.temperature);
        let response = self.execute_request(&self.text_model, &request).await?;
        extract_text(&response)
    }

    fn model_name(&self) -> &str {
        &self.text_model
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    async fn generate_image(&self, prompt: &str) -> Result<ImagePayload> {
        // One request per call: the asset generator's retry policy bounds image attempts
        let request = GenerateContentRequest::prompt(prompt).with_image_output();
        let response = self.send_request(&self.image_model, &request).await?;
        extract_image(&response)
    }

    fn model_name(&self) -> &str {
        &self.image_model
    }
}

/// Concatenate the text parts of a response
pub fn extract_text(response: &GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.block_reason() {
        return Err(Error::Upstream(format!("Prompt blocked: {}", reason)));
    }

    let text: String = response
        .parts()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(Error::Upstream("Empty response from model".to_string()));
    }
    Ok(text)
}

/// First inline image of a response, undecoded
pub fn extract_image(response: &GenerateContentResponse) -> Result<ImagePayload> {
    if let Some(reason) = response.block_reason() {
        return Err(Error::Upstream(format!("Prompt blocked: {}", reason)));
    }

    if let Some(inline) = response.parts().find_map(|p| p.inline_data.as_ref()) {
        return Ok(ImagePayload::Structured {
            mime_type: inline.mime_type.clone(),
            data: PayloadData::Base64(inline.data.clone()),
        });
    }

    let said: String = response
        .parts()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ");
    let excerpt: String = said.chars().take(120).collect();
    Err(Error::Upstream(if excerpt.is_empty() {
        "No image data in response".to_string()
    } else {
        format!("No image data in response (model said: {})", excerpt)
    }))
}

fn error_from_status(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(300).collect());

    match status {
        401 | 403 => Error::Upstream(format!(
            "Unauthorized: check GEMINI_API_KEY ({})",
            message
        )),
        429 => Error::RateLimited(extract_retry_after(body).unwrap_or(30)),
        400 => Error::Upstream(format!("Bad request: {}", message)),
        404 => Error::Upstream(format!("Model not found or unavailable: {}", message)),
        500..=599 => Error::Upstream(format!("Server error ({}): {}", status, message)),
        _ => Error::Upstream(format!("HTTP error {}: {}", status, message)),
    }
}

fn is_transient(error: &Error) -> bool {
    match error {
        Error::RateLimited(_) | Error::Network(_) => true,
        Error::Upstream(msg) => msg.starts_with("Server error"),
        _ => false,
    }
}

/// Exponential backoff, never shorter than the server's suggested wait
fn calculate_backoff(attempt: u32, suggested_wait_secs: u64) -> u64 {
    let base = BACKOFF_BASE_MS.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    base.max(suggested_wait_secs.saturating_mul(1000))
}

/// Extract `RetryInfo.retryDelay` (e.g. `"30s"`) from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    envelope.error.details.iter().find_map(|detail| {
        let delay = detail.get("retryDelay")?.as_str()?;
        let secs = delay.trim_end_matches('s');
        secs.parse::<f64>().ok().map(|s| s.ceil() as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn response(body: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_client_builder_requires_api_key() {
        let result = GeminiClientBuilder::new().build();
        assert!(matches!(result, Err(Error::ApiKeyMissing)));

        let blank = GeminiClientBuilder::new().api_key("   ").build();
        assert!(matches!(blank, Err(Error::ApiKeyMissing)));
    }

    #[test]
    fn test_client_builder_applies_config() {
        let client = GeminiClient::builder()
            .api_key("test-key")
            .base_url("http://localhost:9999/v1beta/")
            .max_retries(0)
            .build()
            .unwrap();

        assert_eq!(client.base_url, "http://localhost:9999/v1beta");
        assert_eq!(client.text_model(), "gemini-2.0-flash");
        assert_eq!(client.image_model(), "gemini-2.5-flash-image-preview");
        assert_eq!(client.max_retries, 1);
    }

    #[test]
    fn test_client_debug_hides_key() {
        let client = GeminiClient::new(GeminiConfig::default(), "super-secret").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("GeminiClient"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GeminiClient>();
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }]
        }));
        assert_eq!(extract_text(&body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_extract_text_empty_or_blocked() {
        let empty = response(json!({ "candidates": [] }));
        assert!(matches!(extract_text(&empty), Err(Error::Upstream(_))));

        let blocked = response(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        let err = extract_text(&blocked).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_extract_image_structured_payload() {
        let body = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Sure" },
                { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
            ]}}]
        }));
        match extract_image(&body).unwrap() {
            ImagePayload::Structured { mime_type, data } => {
                assert_eq!(mime_type.as_deref(), Some("image/png"));
                assert_eq!(data, PayloadData::Base64("iVBORw0KGgo=".to_string()));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_extract_image_text_only_is_upstream_error() {
        let body = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that" }] } }]
        }));
        let err = extract_image(&body).unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(err.to_string().contains("I cannot draw that"));
    }

    #[test]
    fn test_error_from_status() {
        let body = r#"{"error":{"code":500,"message":"internal","status":"INTERNAL"}}"#;
        let err = error_from_status(500, body);
        assert!(is_transient(&err));
        assert!(err.to_string().contains("internal"));

        let bad = error_from_status(400, "not json");
        assert!(!is_transient(&bad));
        assert!(bad.to_string().contains("not json"));
    }

    #[test]
    fn test_rate_limit_retry_delay() {
        let body = r#"{"error":{"code":429,"message":"quota","status":"RESOURCE_EXHAUSTED",
            "details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"12.5s"}]}}"#;
        assert_eq!(extract_retry_after(body), Some(13));
        assert!(matches!(error_from_status(429, body), Error::RateLimited(13)));
        assert!(matches!(error_from_status(429, "{}"), Error::RateLimited(30)));
    }

    #[test]
    fn test_calculate_backoff() {
        assert_eq!(calculate_backoff(1, 0), 1000);
        assert_eq!(calculate_backoff(2, 0), 2000);
        assert_eq!(calculate_backoff(3, 0), 4000);
        assert_eq!(calculate_backoff(1, 5), 5000);
        assert_eq!(calculate_backoff(70, 0), u64::MAX);
        assert_eq!(calculate_backoff(1, u64::MAX), u64::MAX);
    }

    /// Local server answering every request with HTTP 500; returns its base URL and hit counter
    async fn failing_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    let body = r#"{"error":{"code":500,"message":"boom","status":"INTERNAL"}}"#;
                    let reply = format!(
                        "HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}/v1beta", addr), hits)
    }

    /// Consume headers and the Content-Length body
    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_image_request_is_not_retried_by_client() {
        let (base_url, hits) = failing_server().await;
        let client = GeminiClient::builder()
            .api_key("test-key")
            .base_url(base_url)
            .max_retries(3)
            .build()
            .unwrap();

        let err = client.generate_image("a logo").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_request_retries_server_errors() {
        let (base_url, hits) = failing_server().await;
        let client = GeminiClient::builder()
            .api_key("test-key")
            .base_url(base_url)
            .max_retries(2)
            .build()
            .unwrap();

        let err = client.generate_text("analyze").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
