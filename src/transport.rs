//! C8 — LLM Transport: provider-specific request shaping with a shared
//! retry core, grounded in `cosmos::ai::chat_with_system` (request
//! construction) and `cosmos::suggest::llm::client::call_llm_with_usage`
//! (the retry/backoff loop and retryable-status classification).

use crate::config::Provider;
use crate::error::TransportError;
use crate::ratelimit::RateLimiter;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct CallParams<'a> {
    pub provider: Provider,
    pub api_key: &'a str,
    pub model: &'a str,
    pub endpoint: Option<&'a str>,
    pub system_prompt: &'a str,
    pub user_payload: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub retry_count: u32,
}

pub struct Transport {
    client: reqwest::Client,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Acquires one rate-limit permit before the first attempt and holds it
    /// for every retry; releases it (by drop) only after success or
    /// terminal failure (spec §4.8).
    pub async fn call(
        &self,
        params: CallParams<'_>,
        rate_limiter: &RateLimiter,
        cancel: &watch::Receiver<bool>,
    ) -> Result<String, TransportError> {
        let provider_key = provider_key(params.provider);
        let _permit = rate_limiter
            .acquire(provider_key, cancel)
            .await
            .ok_or(TransportError::Cancelled)?;

        let max_attempts = params.retry_count + 1;
        let mut last_err = TransportError::Fatal("no attempt made".to_string());

        for attempt in 1..=max_attempts {
            if *cancel.borrow() {
                return Err(TransportError::Cancelled);
            }

            match self.attempt_once(&params, cancel).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    last_err = err;
                    let backoff = backoff_duration(attempt);
                    if sleep_cancellable(backoff, cancel).await.is_err() {
                        return Err(TransportError::Cancelled);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err)
    }

    async fn attempt_once(
        &self,
        params: &CallParams<'_>,
        cancel: &watch::Receiver<bool>,
    ) -> Result<String, TransportError> {
        let request_future = self.send_request(params);
        let mut cancel_watch = cancel.clone();

        let outcome = tokio::select! {
            result = tokio::time::timeout(params.timeout, request_future) => result,
            _ = cancel_watch.changed() => return Err(TransportError::Cancelled),
        };

        match outcome {
            Ok(inner) => inner,
            Err(_elapsed) => Err(TransportError::Timeout),
        }
    }

    async fn send_request(&self, params: &CallParams<'_>) -> Result<String, TransportError> {
        match params.provider {
            Provider::OpenAi => self.send_openai(params).await,
            Provider::Anthropic => self.send_anthropic(params).await,
        }
    }

    async fn send_openai(&self, params: &CallParams<'_>) -> Result<String, TransportError> {
        let endpoint = params.endpoint.unwrap_or(DEFAULT_OPENAI_ENDPOINT);
        let body = OpenAiRequest {
            model: params.model.to_string(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: params.system_prompt.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: params.user_payload.to_string(),
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(params.api_key)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), text));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TransportError::Malformed("no choices in response".to_string()))
    }

    async fn send_anthropic(&self, params: &CallParams<'_>) -> Result<String, TransportError> {
        let endpoint = params.endpoint.unwrap_or(DEFAULT_ANTHROPIC_ENDPOINT);
        let body = AnthropicRequest {
            model: params.model.to_string(),
            system: params.system_prompt.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: params.user_payload.to_string(),
            }],
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(endpoint)
            .header("x-api-key", params.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), text));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .map(|block| block.text)
            .ok_or_else(|| TransportError::Malformed("no text block in response".to_string()))
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

fn provider_key(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "openai",
        Provider::Anthropic => "anthropic",
    }
}

fn network_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Retryable(err.to_string())
    } else {
        TransportError::Fatal(err.to_string())
    }
}

/// Retryable: 429 and 5xx. Everything else (auth failures, other 4xx) is
/// fatal (spec §4.8, §7).
fn classify_status(status: u16, body: String) -> TransportError {
    match status {
        429 | 500 | 502 | 503 | 504 => TransportError::Retryable(format!("HTTP {status}: {body}")),
        _ => TransportError::Fatal(format!("HTTP {status}: {body}")),
    }
}

/// `2^(attempt-1) s + uniform(0, 500 ms)` (spec §4.8).
fn backoff_duration(attempt: u32) -> Duration {
    let base = Duration::from_secs(1u64 << (attempt.saturating_sub(1)).min(20));
    let jitter_ms = rand::thread_rng().gen_range(0..500);
    base + Duration::from_millis(jitter_ms)
}

async fn sleep_cancellable(duration: Duration, cancel: &watch::Receiver<bool>) -> Result<(), ()> {
    let mut cancel_watch = cancel.clone();
    if *cancel_watch.borrow() {
        return Err(());
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel_watch.changed() => Err(()),
    }
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    system: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_retryable() {
        assert!(classify_status(429, String::new()).is_retryable());
        assert!(classify_status(500, String::new()).is_retryable());
        assert!(classify_status(503, String::new()).is_retryable());
    }

    #[test]
    fn test_classify_status_fatal() {
        assert!(!classify_status(401, String::new()).is_retryable());
        assert!(!classify_status(400, String::new()).is_retryable());
    }

    #[test]
    fn test_backoff_grows_exponentially_with_jitter_bound() {
        let first = backoff_duration(1);
        let second = backoff_duration(2);
        assert!(first >= Duration::from_secs(1) && first < Duration::from_millis(1500));
        assert!(second >= Duration::from_secs(2) && second < Duration::from_millis(2500));
    }

    #[test]
    fn test_provider_key_matches_rate_limiter_bucket_names() {
        assert_eq!(provider_key(Provider::OpenAi), "openai");
        assert_eq!(provider_key(Provider::Anthropic), "anthropic");
    }
}
