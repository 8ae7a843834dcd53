//! PipelineController - sequences the stages for one user session
//!
//! Nothing is kept between calls. When questions are needed the caller gets a
//! [`SessionToken`] holding the record, and hands it back with the answers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ExtractionSchema, ExtractionStage, PipelineError, ProposalStage, QuestionStage, Services, merge};
use crate::config::PipelineConfig;
use crate::domain::{AuditLog, ClarificationSet, InformationRecord, Proposal};
use crate::reference::ReferenceData;

/// Client-held state carried between clarification round-trips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Correlates log lines across round-trips
    pub id: Uuid,
    pub record: InformationRecord,
    /// Completed clarification rounds
    #[serde(default)]
    pub round: u32,
    /// Q/A pairs from every round so far
    #[serde(default)]
    pub audit: AuditLog,
}

impl SessionToken {
    pub fn new(record: InformationRecord) -> Self {
        Self {
            id: Uuid::now_v7(),
            record,
            round: 0,
            audit: AuditLog::new(),
        }
    }
}

/// Result of driving the pipeline as far as it can go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The user must answer these before the pipeline can continue
    NeedsClarification {
        session: SessionToken,
        questions: ClarificationSet,
    },
    /// Terminal result
    Proposal {
        session_id: Uuid,
        record: InformationRecord,
        audit: AuditLog,
        proposal: Proposal,
    },
}

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Collecting,
    Clarifying,
    Proposing,
    Done,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Collecting => "COLLECTING",
            PipelineState::Clarifying => "CLARIFYING",
            PipelineState::Proposing => "PROPOSING",
            PipelineState::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// A state together with the data it owns
enum Step {
    Collecting { user_text: String },
    Clarifying { session: SessionToken },
    Proposing { session: SessionToken },
    Done(Outcome),
}

impl Step {
    fn state(&self) -> PipelineState {
        match self {
            Step::Collecting { .. } => PipelineState::Collecting,
            Step::Clarifying { .. } => PipelineState::Clarifying,
            Step::Proposing { .. } => PipelineState::Proposing,
            Step::Done(_) => PipelineState::Done,
        }
    }
}

/// Drives COLLECTING → CLARIFYING → PROPOSING → DONE
///
/// Holds only immutable stage handles, so one controller can serve any number
/// of concurrent sessions.
#[derive(Debug, Clone)]
pub struct PipelineController {
    extraction: ExtractionStage,
    questions: QuestionStage,
    proposal: ProposalStage,
    max_rounds: u32,
}

impl PipelineController {
    pub fn new(extraction: ExtractionStage, questions: QuestionStage, proposal: ProposalStage, max_rounds: u32) -> Self {
        Self {
            extraction,
            questions,
            proposal,
            max_rounds,
        }
    }

    /// Build every stage from the pipeline configuration
    pub fn from_config(services: Services, reference: Arc<ReferenceData>, config: &PipelineConfig) -> Self {
        debug!(?config, "PipelineController::from_config: called");
        Self::new(
            ExtractionStage::new(
                services.clone(),
                ExtractionSchema::new(config.fields.clone()),
                config.extraction_max_tokens,
            ),
            QuestionStage::new(services.clone(), config.question_max_tokens),
            ProposalStage::new(services, reference, config.proposal_max_tokens, config.structured_output),
            config.max_rounds,
        )
    }

    pub fn extraction(&self) -> &ExtractionStage {
        &self.extraction
    }

    pub fn questions(&self) -> &QuestionStage {
        &self.questions
    }

    pub fn proposal(&self) -> &ProposalStage {
        &self.proposal
    }

    /// Start a session from the user's free text
    pub async fn start(&self, user_text: &str) -> Result<Outcome, PipelineError> {
        debug!(text_len = user_text.len(), "PipelineController::start: called");
        self.drive(Step::Collecting {
            user_text: user_text.to_string(),
        })
        .await
    }

    /// Continue a session with the user's answers
    pub async fn resume(
        &self,
        session: SessionToken,
        answers: &HashMap<String, String>,
    ) -> Result<Outcome, PipelineError> {
        debug!(session_id = %session.id, round = session.round, "PipelineController::resume: called");
        let (round_audit, record) = merge(&session.record, answers);
        let mut audit = session.audit;
        audit.extend(round_audit);

        let session = SessionToken {
            id: session.id,
            record,
            round: session.round.saturating_add(1),
            audit,
        };
        self.drive(Step::Clarifying { session }).await
    }

    async fn drive(&self, mut step: Step) -> Result<Outcome, PipelineError> {
        loop {
            info!(state = %step.state(), "Pipeline state");
            step = match step {
                Step::Collecting { user_text } => {
                    let record = self.extraction.extract(&user_text).await?;
                    let session = SessionToken::new(record);
                    info!(session_id = %session.id, "Started session");
                    Step::Clarifying { session }
                }
                Step::Clarifying { session } => match self.questions.ask(&session.record).await {
                    ClarificationSet::Complete => Step::Proposing { session },
                    questions if session.round < self.max_rounds => {
                        info!(
                            session_id = %session.id,
                            question_count = questions.len(),
                            "Awaiting clarification answers"
                        );
                        return Ok(Outcome::NeedsClarification { session, questions });
                    }
                    questions => {
                        warn!(
                            session_id = %session.id,
                            open_questions = questions.len(),
                            max_rounds = self.max_rounds,
                            "Clarification rounds exhausted, proposing with the current record"
                        );
                        Step::Proposing { session }
                    }
                },
                Step::Proposing { session } => {
                    let proposal = self.proposal.propose(&session.record).await?;
                    Step::Done(Outcome::Proposal {
                        session_id: session.id,
                        record: session.record,
                        audit: session.audit,
                        proposal,
                    })
                }
                Step::Done(outcome) => return Ok(outcome),
            };
        }
    }
}
