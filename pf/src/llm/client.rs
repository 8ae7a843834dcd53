//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent (fresh context)
///
/// The pipeline treats the model as an opaque function from prompt to text.
/// Output carries no guarantee of valid JSON, bounded length, or determinism;
/// callers must parse defensively.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
