//! ProposalStage - synthesize the final proposal document

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{PipelineError, Services, StageCause};
use crate::domain::{InformationRecord, Proposal};
use crate::prompts::{self, ProposalContext};
use crate::reference::ReferenceData;
use crate::response::extract_json;

const STAGE: &str = "proposal";

/// Builds the proposal from a resolved record plus the reference data
#[derive(Debug, Clone)]
pub struct ProposalStage {
    services: Services,
    reference: Arc<ReferenceData>,
    max_tokens: u32,
    structured_output: bool,
}

impl ProposalStage {
    pub fn new(services: Services, reference: Arc<ReferenceData>, max_tokens: u32, structured_output: bool) -> Self {
        Self {
            services,
            reference,
            max_tokens,
            structured_output,
        }
    }

    pub fn is_structured(&self) -> bool {
        self.structured_output
    }

    /// Same stage with the output mode switched
    pub fn with_structured_output(mut self, structured_output: bool) -> Self {
        self.structured_output = structured_output;
        self
    }

    /// Generate the proposal with a single completion call
    pub async fn propose(&self, record: &InformationRecord) -> Result<Proposal, PipelineError> {
        debug!(
            field_count = record.len(),
            structured = self.structured_output,
            "ProposalStage::propose: called"
        );
        let unresolved = record.unresolved_keys();
        if !unresolved.is_empty() {
            warn!(?unresolved, "Proposing with unresolved fields");
        }

        let context = ProposalContext {
            all_info: record.to_prompt_json(),
            all_tags: self.reference.tags_csv(),
            timeline_data: self.reference.timeline_json(),
            structured_output: self.structured_output,
        };
        let prompt = self
            .services
            .prompts
            .render(prompts::PROPOSAL, &context)
            .map_err(|e| PipelineError::ProposalFailed(StageCause::Prompt(e)))?;

        let raw = self
            .services
            .complete(prompt, self.max_tokens)
            .await
            .map_err(|e| PipelineError::from_completion(STAGE, e, PipelineError::ProposalFailed))?;

        let proposal = if self.structured_output {
            let document = extract_json(&raw).map_err(|e| {
                warn!(error = %e, "Structured proposal could not be parsed");
                PipelineError::ProposalFailed(StageCause::Parse(e))
            })?;
            Proposal::Structured(document)
        } else {
            Proposal::Text(raw)
        };

        info!(
            structured = proposal.is_structured(),
            title = proposal.title().unwrap_or_default(),
            "Generated proposal"
        );
        Ok(proposal)
    }
}
