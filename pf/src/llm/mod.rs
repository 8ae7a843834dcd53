//! LLM Client module for ProposalForge
//!
//! Provides the completion-service abstraction, the concrete providers, and
//! the call policy shared by every pipeline stage.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

mod anthropic;
pub mod client;
mod error;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Initial backoff delay for provider retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Longest wait between provider retries
const MAX_BACKOFF_MS: u64 = 60_000;

/// Exponential backoff before retry number `attempt` (1-based), capped
pub(crate) fn retry_backoff(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(INITIAL_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// Create an LLM client based on the provider specified in config
///
/// Supports "openai" (and any OpenAI-compatible endpoint via `base-url`) and
/// "anthropic" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        "openai" => {
            debug!("create_client: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic, openai",
                other
            )))
        }
    }
}

/// Run one completion under a request-level timeout and return its text
///
/// Expiry becomes `LlmError::Timeout`; a response without text (or with only
/// whitespace) becomes `LlmError::EmptyResponse`.
pub async fn complete_text(
    llm: &dyn LlmClient,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<String, LlmError> {
    debug!(prompt_len = request.prompt.len(), ?timeout, "complete_text: called");
    let response = match tokio::time::timeout(timeout, llm.complete(request)).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(?timeout, "complete_text: completion timed out");
            return Err(LlmError::Timeout(timeout));
        }
    };

    if response.stop_reason == StopReason::MaxTokens {
        warn!("complete_text: completion was truncated at the token limit");
    }
    debug!(
        input_tokens = response.usage.input_tokens,
        output_tokens = response.usage.output_tokens,
        total_tokens = response.usage.total(),
        "complete_text: usage"
    );

    match response.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => {
            debug!("complete_text: empty completion");
            Err(LlmError::EmptyResponse)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::client::mock::{MockLlmClient, MockReply};
    use super::*;

    #[tokio::test]
    async fn test_complete_text_returns_content() {
        let client = MockLlmClient::texts(&["hello"]);
        let text = complete_text(&client, CompletionRequest::new("p", 10, 0.0), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_complete_text_empty_is_error() {
        let client = MockLlmClient::new(vec![MockReply::Empty, MockReply::Text("   \n".to_string())]);
        let first = complete_text(&client, CompletionRequest::new("p", 10, 0.0), Duration::from_secs(5)).await;
        assert!(matches!(first, Err(LlmError::EmptyResponse)));
        let second = complete_text(&client, CompletionRequest::new("p", 10, 0.0), Duration::from_secs(5)).await;
        assert!(matches!(second, Err(LlmError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_complete_text_times_out() {
        let client = MockLlmClient::new(vec![MockReply::Hang(Duration::from_millis(500))]);
        let result = complete_text(&client, CompletionRequest::new("p", 10, 0.0), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(LlmError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_complete_text_propagates_service_error() {
        let client = MockLlmClient::new(vec![MockReply::Fail(500)]);
        let result = complete_text(&client, CompletionRequest::new("p", 10, 0.0), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(LlmError::ApiError { status: 500, .. })));
    }

    #[test]
    fn test_retry_backoff_doubles_then_caps() {
        assert_eq!(retry_backoff(1), Duration::from_millis(1000));
        assert_eq!(retry_backoff(2), Duration::from_millis(2000));
        assert_eq!(retry_backoff(4), Duration::from_millis(8000));
        assert_eq!(retry_backoff(7), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn test_retry_backoff_survives_large_retry_counts() {
        assert_eq!(retry_backoff(65), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let result = create_client(&config);
        assert!(matches!(result, Err(LlmError::Config(_))));
    }
}
