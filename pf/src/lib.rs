//! ProposalForge - turn a free-text project idea into a software proposal
//!
//! Three model calls in sequence: extract structured fields from the idea, ask
//! clarification questions for whatever is missing, and synthesize a proposal
//! once the record is resolved.
//!
//! # Core Concepts
//!
//! - **Untrusted model output**: completions are parsed defensively at one
//!   boundary ([`response`]) into typed records
//! - **Explicit unresolved state**: "Not provided" is a variant, not a string
//!   compared all over the codebase
//! - **Never stuck on bad output**: the question stage always has a
//!   deterministic fallback
//! - **Stateless sessions**: the record travels with the caller between
//!   clarification round-trips
//!
//! # Modules
//!
//! - [`llm`] - Completion client trait and OpenAI/Anthropic implementations
//! - [`response`] - JSON extraction from raw completion text
//! - [`domain`] - Records, clarification sets, audit log, proposals
//! - [`prompts`] - Handlebars prompt templates
//! - [`reference`] - Tag vocabulary and timeline estimates
//! - [`pipeline`] - Stages and the controller state machine
//! - [`server`] - HTTP JSON API
//! - [`repl`] - Interactive terminal session
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod reference;
pub mod repl;
pub mod response;
pub mod server;

// Re-export commonly used types
pub use config::{Config, LlmConfig, PipelineConfig};
pub use domain::{AuditEntry, AuditLog, ClarificationSet, FieldValue, InformationRecord, Proposal};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client,
};
pub use pipeline::{
    ExtractionSchema, ExtractionStage, Outcome, PipelineController, PipelineError, ProposalStage, QuestionStage,
    Services, SessionToken, merge,
};
pub use prompts::PromptLoader;
pub use reference::{ReferenceData, ReferenceError};
pub use response::{ExtractionError, extract_json};
