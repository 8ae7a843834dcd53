//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API. Any
//! OpenAI-compatible endpoint works by pointing `base-url` at it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage, retry_backoff};
use crate::config::LlmConfig;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    max_retries: u32,
    timeout: Duration,
}

impl OpenAIClient {
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

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");

        let max_tokens = request.max_tokens.min(self.max_tokens);

        // GPT-5.x and o1/o3 models use max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": request.prompt,
            }],
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(max_tokens);
            body["temperature"] = serde_json::json!(request.temperature);
        }

        body
    }

    /// Parse the OpenAI API response
    fn parse_response(&self, api_response: OpenAIResponse) -> CompletionResponse {
        debug!(choice_count = api_response.choices.len(), "parse_response: called");
        let (content, stop_reason) = match api_response.choices.into_iter().next() {
            Some(c) => (
                c.message.content,
                c.finish_reason
                    .as_deref()
                    .map(StopReason::from_openai)
                    .unwrap_or(StopReason::EndTurn),
            ),
            None => (None, StopReason::EndTurn),
        };

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            stop_reason,
            usage,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
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

impl OpenAIClient {
    /// One HTTP round trip, with the status mapped onto `LlmError`
    async fn send(&self, url: &str, body: &serde_json::Value) -> Result<CompletionResponse, LlmError> {
        let response = match self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
        let api_response: OpenAIResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_client(model: &str, max_tokens: u32) -> OpenAIClient {
        OpenAIClient {
            model: model.to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.openai.com".to_string(),
            http: Client::new(),
            max_tokens,
            max_retries: 0,
            timeout: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let client = test_client("gpt-4o", 8192);
        let request = CompletionRequest::new("Extract the fields", 1000, 0.001);

        let body = client.build_request_body(&request);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Extract the fields");
        assert!(body.get("temperature").is_some());
    }

    #[test]
    fn test_max_tokens_capped() {
        let client = test_client("gpt-4o", 1000);
        let body = client.build_request_body(&CompletionRequest::new("Test", 30000, 0.0));
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_default_proposal_request_fits_default_model() {
        let config = LlmConfig::default();
        let client = test_client(&config.model, config.max_tokens);
        let proposal_tokens = crate::config::PipelineConfig::default().proposal_max_tokens;

        let body = client.build_request_body(&CompletionRequest::new("Write the proposal", proposal_tokens, 0.001));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 16384);
    }

    #[test]
    fn test_reasoning_models_use_completion_tokens() {
        let client = test_client("o3-mini", 4096);
        let body = client.build_request_body(&CompletionRequest::new("Test", 2048, 0.0));
        assert_eq!(body["max_completion_tokens"], 2048);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_response() {
        let client = test_client("gpt-4o", 4096);
        let api_response: OpenAIResponse = serde_json::from_value(serde_json::json!({
            "choices": [{
                "message": {"content": "{\"a\": \"b\"}"},
                "finish_reason": "length"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        }))
        .unwrap();

        let response = client.parse_response(api_response);
        assert_eq!(response.content.as_deref(), Some("{\"a\": \"b\"}"));
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
        assert_eq!(response.usage.total(), 17);
    }

    /// Serve `/v1/chat/completions` locally, answering with `statuses` in turn
    /// and a completion once they run out
    async fn spawn_endpoint(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/v1/chat/completions",
            axum::routing::post(move || {
                let counter = counter.clone();
                let statuses = statuses.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    match statuses.get(n) {
                        Some(&status) => (StatusCode::from_u16(status).unwrap(), "busy").into_response(),
                        None => axum::Json(serde_json::json!({
                            "choices": [{"message": {"content": "done"}, "finish_reason": "stop"}]
                        }))
                        .into_response(),
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    fn local_client(base_url: String, max_retries: u32) -> OpenAIClient {
        OpenAIClient {
            base_url,
            max_retries,
            timeout: Duration::from_secs(5),
            ..test_client("gpt-4o", 4096)
        }
    }

    #[tokio::test]
    async fn test_transient_status_is_retried() {
        let (base_url, hits) = spawn_endpoint(vec![503]).await;
        let client = local_client(base_url, 1);

        let response = client.complete(CompletionRequest::new("p", 10, 0.0)).await.unwrap();
        assert_eq!(response.content.as_deref(), Some("done"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (base_url, hits) = spawn_endpoint(vec![400]).await;
        let client = local_client(base_url, 3);

        let err = client.complete(CompletionRequest::new("p", 10, 0.0)).await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError { status: 400, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_stop_at_the_configured_count() {
        let (base_url, hits) = spawn_endpoint(vec![500, 500, 500]).await;
        let client = local_client(base_url, 0);

        let err = client.complete(CompletionRequest::new("p", 10, 0.0)).await.unwrap_err();
        assert!(matches!(err, LlmError::ApiError { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
