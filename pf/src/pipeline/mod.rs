//! The three-stage proposal pipeline
//!
//! ```text
//! user text ─▶ ExtractionStage ─▶ InformationRecord ─▶ QuestionStage
//!                                        ▲                  │
//!                                        │ merge            ├─ complete ─▶ ProposalStage ─▶ Proposal
//!                                        └── answers ◀──────┘ questions
//! ```
//!
//! Stages never share mutable state. Each one is handed the completion client,
//! the prompt loader and its token limit at construction time, so tests can
//! swap in a scripted client.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::{CompletionRequest, LlmClient, LlmError, complete_text};
use crate::prompts::PromptLoader;

mod controller;
mod error;
mod extraction;
mod merge;
mod proposal;
mod questions;

pub use controller::{Outcome, PipelineController, PipelineState, SessionToken};
pub use error::{PipelineError, StageCause, USER_RETRY_MESSAGE};
pub use extraction::{ExtractionSchema, ExtractionStage};
pub use merge::merge;
pub use proposal::ProposalStage;
pub use questions::{QuestionStage, fallback_question};

/// Shared handles every stage uses to talk to the model
#[derive(Clone)]
pub struct Services {
    pub llm: Arc<dyn LlmClient>,
    pub prompts: Arc<PromptLoader>,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Services {
    /// Services with the default sampling settings
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self::from_config(llm, prompts, &LlmConfig::default())
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, config: &LlmConfig) -> Self {
        Self {
            llm,
            prompts,
            temperature: config.temperature,
            timeout: config.timeout(),
        }
    }

    /// One completion call under the request-level timeout
    pub(crate) async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String, LlmError> {
        debug!(prompt_len = prompt.len(), %max_tokens, "Services::complete: called");
        let request = CompletionRequest::new(prompt, max_tokens, self.temperature);
        complete_text(self.llm.as_ref(), request, self.timeout).await
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
