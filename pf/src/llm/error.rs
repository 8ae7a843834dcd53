//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Completion service returned empty output")]
    EmptyResponse,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether the provider should try the request again
    ///
    /// Rate limits are surfaced immediately with their `retry-after` hint.
    /// Server-side failures and transport timeouts are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => matches!(status, 408 | 500 | 502 | 503 | 504 | 529),
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::RateLimited { .. }
            | LlmError::InvalidResponse(_)
            | LlmError::EmptyResponse
            | LlmError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> LlmError {
        LlmError::ApiError {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_server_errors_are_retried() {
        for status in [408, 500, 502, 503, 504, 529] {
            assert!(api_error(status).is_retryable(), "status {}", status);
        }
        assert!(LlmError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn test_client_errors_are_final() {
        for status in [400, 401, 404, 422] {
            assert!(!api_error(status).is_retryable(), "status {}", status);
        }
        let limited = LlmError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert!(!limited.is_retryable());
        assert!(!LlmError::EmptyResponse.is_retryable());
        assert!(!LlmError::Config("missing key".to_string()).is_retryable());
    }
}
