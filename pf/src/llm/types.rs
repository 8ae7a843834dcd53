//! LLM request/response types for ProposalForge
//!
//! Every pipeline stage issues a single-turn prompt, so the request is just the
//! rendered prompt plus sampling limits.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Rendered prompt (from a Handlebars template)
    pub prompt: String,

    /// Max tokens for the response (clamped by the provider's configured cap)
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    /// Create a request for a rendered prompt
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        let prompt = prompt.into();
        debug!(prompt_len = prompt.len(), %max_tokens, %temperature, "CompletionRequest::new: called");
        Self {
            prompt,
            max_tokens,
            temperature,
        }
    }
}

/// Response from a completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Text content (if any)
    pub content: Option<String>,

    /// Why the model stopped
    pub stop_reason: StopReason,

    /// Token usage for cost tracking
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Create a plain text response that ended normally
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Parse from Anthropic API stop_reason string
    pub fn from_anthropic(s: &str) -> Self {
        debug!(%s, "StopReason::from_anthropic: called");
        match s {
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }

    /// Parse from OpenAI API finish_reason string
    pub fn from_openai(s: &str) -> Self {
        debug!(%s, "StopReason::from_openai: called");
        match s {
            "length" => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Total tokens consumed by the call
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
