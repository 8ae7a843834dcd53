//! Domain types for ProposalForge
//!
//! The record that flows through the pipeline, the question stage's result,
//! the merge audit log, and the final proposal. All of them serialize to the
//! JSON shapes front ends exchange.

mod audit;
mod clarification;
mod proposal;
mod record;

pub use audit::{AuditEntry, AuditLog};
pub use clarification::{ClarificationSet, NO_QUESTIONS_NEEDED, RESULT_KEY, is_completeness_marker};
pub use proposal::Proposal;
pub use record::{FieldValue, InformationRecord, NOT_PROVIDED, UnsupportedShape, is_not_provided_marker};
