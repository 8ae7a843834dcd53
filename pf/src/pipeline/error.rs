//! Pipeline error types

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;
use crate::prompts::PromptError;
use crate::response::ExtractionError;

/// Message shown to end users for any failed stage
pub const USER_RETRY_MESSAGE: &str =
    "Oops, something went wrong. Please try rephrasing your input or providing more information.";

/// Why a record-producing stage failed
#[derive(Debug, Error)]
pub enum StageCause {
    #[error("completion failed: {0}")]
    Completion(#[source] LlmError),

    #[error("could not parse completion: {0}")]
    Parse(#[source] ExtractionError),

    #[error("could not build prompt: {0}")]
    Prompt(#[source] PromptError),
}

/// Errors surfaced by the pipeline to front ends
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No project description was given")]
    EmptyInput,

    #[error("Extraction failed: {0}")]
    ExtractionFailed(#[source] StageCause),

    #[error("Proposal failed: {0}")]
    ProposalFailed(#[source] StageCause),

    #[error("{stage} stage timed out after {after:?}")]
    CompletionTimeout { stage: &'static str, after: Duration },
}

impl PipelineError {
    /// Wrap a completion failure for `stage`, pulling timeouts out as their own variant
    pub(crate) fn from_completion(stage: &'static str, err: LlmError, wrap: fn(StageCause) -> Self) -> Self {
        match err {
            LlmError::Timeout(after) => PipelineError::CompletionTimeout { stage, after },
            other => wrap(StageCause::Completion(other)),
        }
    }

    /// Text safe to show an end user; no partial state survives any of these
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "Please describe the project you want to build.",
            PipelineError::CompletionTimeout { .. } => {
                "The request took too long. Please try again, or shorten your input."
            }
            PipelineError::ExtractionFailed(_) | PipelineError::ProposalFailed(_) => USER_RETRY_MESSAGE,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::CompletionTimeout { .. })
    }
}
