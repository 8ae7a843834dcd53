//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Field extraction prompt
pub const EXTRACT: &str = include_str!("../../prompts/extract.pmt");

/// Clarification question prompt
pub const QUESTIONS: &str = include_str!("../../prompts/questions.pmt");

/// Proposal synthesis prompt
pub const PROPOSAL: &str = include_str!("../../prompts/proposal.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "extract" => Some(EXTRACT),
        "questions" => Some(QUESTIONS),
        "proposal" => Some(PROPOSAL),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
