//! Interactive REPL for the trip planner
//!
//! Every line is one turn through the orchestrator; slash commands inspect
//! or reset the conversation.

mod session;

pub use session::ReplSession;

use std::sync::Arc;

use eyre::Result;

use crate::orchestrator::Orchestrator;
use crate::state::ConversationStore;

/// Run the interactive REPL
///
/// This is the main entry point for `tp chat`.
pub async fn run_interactive(
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ConversationStore>,
    conversation: Option<String>,
) -> Result<()> {
    let mut session = ReplSession::new(orchestrator, store, conversation);
    session.run().await
}
