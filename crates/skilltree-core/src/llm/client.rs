//! Chat completion client for OpenAI-compatible APIs
//!
//! Used by the concept extractor. Rate-limited requests are retried with
//! exponential backoff; every other failure surfaces immediately as
//! [`Error::UpstreamUnavailable`] or [`Error::ExtractionFailed`].

use std::time::Duration;

use reqwest::Client as HttpClient;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};

use super::types::{ChatRequest, ChatResponse, FinishReason, LlmResponse, Message};

/// Maximum number of attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Longest server-suggested wait we honour before giving up
const MAX_SUGGESTED_WAIT_SECS: u64 = 30;

#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: ExtractionConfig,
    api_key: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Outcome of one HTTP attempt
enum Attempt {
    Done(LlmResponse),
    RateLimited(u64),
}

impl LlmClient {
    /// Create a client with an explicit API key
    pub fn new(config: ExtractionConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::UpstreamUnavailable("API key is empty".to_string()));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::UpstreamUnavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            api_key,
        })
    }

    /// Create a client using the key from the environment
    pub fn from_env(config: ExtractionConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?
            .ok_or_else(|| {
                Error::UpstreamUnavailable(
                    "No API key configured. Set SKILLTREE_API_KEY or OPENROUTER_API_KEY."
                        .to_string(),
                )
            })?;
        Self::new(config, api_key)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Request a single JSON object completion
    pub async fn complete_json(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let request = ChatRequest::new(&self.config.model, messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_json_output();

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.send_request(&request).await? {
                Attempt::Done(response) => {
                    if response.finish_reason == FinishReason::Length {
                        warn!(model = %response.model, "Completion hit the token limit");
                    }
                    return Ok(response);
                }
                Attempt::RateLimited(wait_secs) if attempts < MAX_RETRY_ATTEMPTS => {
                    let backoff = calculate_backoff(attempts, wait_secs);
                    warn!(attempt = attempts, wait_ms = backoff, "Rate limited, retrying after backoff");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Attempt::RateLimited(_) => {
                    return Err(Error::UpstreamUnavailable(
                        "Rate limited by the extraction service".to_string(),
                    ));
                }
            }
        }
    }

    async fn send_request(&self, request: &ChatRequest) -> Result<Attempt> {
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "Skilltree")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return match status.as_u16() {
                429 => Ok(Attempt::RateLimited(extract_retry_after(&body).unwrap_or(1))),
                status => Err(classify_http_error(status, &body)),
            };
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::ExtractionFailed(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .map(Attempt::Done)
            .ok_or_else(|| Error::ExtractionFailed("Empty response from API".to_string()))
    }
}

fn classify_http_error(status: u16, body: &str) -> Error {
    match status {
        401 => Error::UpstreamUnavailable(
            "Unauthorized: invalid API key. Set SKILLTREE_API_KEY or OPENROUTER_API_KEY."
                .to_string(),
        ),
        402 => Error::UpstreamUnavailable("Payment required: insufficient credits".to_string()),
        400 => Error::ExtractionFailed(format!("Bad request: {}", body)),
        404 => Error::UpstreamUnavailable(format!("Model or endpoint not found: {}", body)),
        _ => Error::UpstreamUnavailable(format!("HTTP error {}: {}", status, body)),
    }
}

/// Calculate backoff delay with jitter
fn calculate_backoff(attempt: u32, suggested_wait: u64) -> u64 {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt.saturating_sub(1));
    let suggested = suggested_wait.min(MAX_SUGGESTED_WAIT_SECS) * 1000;

    let delay = base.max(suggested);
    let jitter = delay / 10;
    delay + (rand_jitter() % jitter.max(1))
}

fn rand_jitter() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64 % 1000)
        .unwrap_or(0)
}

/// Extract a retry-after value from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.get("error").and_then(|e| e.get("retry_after")))
        .and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_empty_key() {
        let err = LlmClient::new(ExtractionConfig::default(), "  ").unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_client_debug_hides_key() {
        let client = LlmClient::new(ExtractionConfig::default(), "sk-secret").unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("LlmClient"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmClient>();
    }

    #[test]
    fn test_classify_http_error() {
        assert_eq!(classify_http_error(401, "").code(), "E200");
        assert_eq!(classify_http_error(503, "down").code(), "E200");
        assert_eq!(classify_http_error(400, "bad").code(), "E201");
    }

    #[test]
    fn test_calculate_backoff() {
        let first = calculate_backoff(1, 0);
        assert!((1000..1100).contains(&first));

        let second = calculate_backoff(2, 0);
        assert!((2000..2200).contains(&second));

        // Suggested waits are capped
        let capped = calculate_backoff(1, 3600);
        assert!(capped < 34_000);
    }

    #[test]
    fn test_extract_retry_after() {
        assert_eq!(extract_retry_after(r#"{"retry_after": 5}"#), Some(5));
        assert_eq!(extract_retry_after(r#"{"error": {"retry_after": 7}}"#), Some(7));
        assert_eq!(extract_retry_after("not json"), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_unavailable() {
        let config = ExtractionConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..ExtractionConfig::default()
        };
        let client = LlmClient::new(config, "key").unwrap();

        let err = client
            .complete_json(vec![Message::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }
}
