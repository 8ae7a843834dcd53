//! Anthropic Claude API client implementation
//!
//! Implements the LlmClient trait for Anthropic's Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage, retry_backoff};
use crate::config::LlmConfig;

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    max_retries: u32,
    timeout: Duration,
}

impl AnthropicClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = config.get_api_key().map_err(|e| LlmError::Config(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);

        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            timeout,
        })
    }

    /// Build the request body for the Anthropic API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "temperature": request.temperature,
            "messages": [{
                "role": "user",
                "content": request.prompt,
            }],
        })
    }

    /// Parse the Anthropic API response
    ///
    /// Text blocks are concatenated in order.
    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "parse_response: called");
        let text: String = api_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .collect();

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            stop_reason: api_response
                .stop_reason
                .as_deref()
                .map(StopReason::from_anthropic)
                .unwrap_or(StopReason::EndTurn),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let mut attempt = 0;
        loop {
            match self.send(&url, &body).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = retry_backoff(attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "complete: retrying after transient error"
                    );
                    tokio::time::sleep(backoff).await;
                }
                result => return result,
            }
        }
    }
}

impl AnthropicClient {
    /// One HTTP round trip, with the status mapped onto `LlmError`
    async fn send(&self, url: &str, body: &serde_json::Value) -> Result<CompletionResponse, LlmError> {
        let response = match self
            .http
            .post(url)
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                debug!("send: request timed out");
                return Err(LlmError::Timeout(self.timeout));
            }
            Err(e) => {
                debug!(error = %e, "send: network error");
                return Err(LlmError::Network(e));
            }
        };

        let status = response.status().as_u16();

        if status == 429 {
            debug!("send: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "send: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        debug!("send: success");
        let api_response: AnthropicResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}
