//! Interactive terminal front end
//!
//! Drives one pipeline run at the prompt: project idea, clarification
//! questions, proposal.

mod session;

pub use session::InteractiveSession;

use std::sync::Arc;

use eyre::Result;

use crate::pipeline::PipelineController;

/// Run the interactive session
///
/// This is the main entry point for `pf run`.
pub async fn run_interactive(pipeline: Arc<PipelineController>, initial_text: Option<String>) -> Result<()> {
    let mut session = InteractiveSession::new(pipeline);
    session.run(initial_text).await
}
