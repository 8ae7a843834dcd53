//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for the three pipeline stages.
//!
//! Template loading chain:
//! 1. `.proposalforge/prompts/{name}.pmt` (user override)
//! 2. `prompts/{name}.pmt` (repo default)
//! 3. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

mod context;
pub mod embedded;
mod loader;

pub use context::{ExtractionContext, FieldPrompt, ProposalContext, QuestionContext};
pub use loader::{PromptError, PromptLoader};

/// Template names
pub const EXTRACT: &str = "extract";
pub const QUESTIONS: &str = "questions";
pub const PROPOSAL: &str = "proposal";
