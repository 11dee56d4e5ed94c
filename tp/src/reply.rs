//! Conversational replies outside slot filling

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{AggregatePlan, Message};
use crate::sequencer::StageDeps;
use crate::sequencer::summary;

pub const CHAT_FALLBACK: &str = "I'm having trouble answering that right now. I can help you plan a trip \
     anywhere in Sri Lanka: tell me where you'd like to go and when.";

const REFINE_FAILED: &str = "I couldn't revise the summary just now, so here it is unchanged.";

#[derive(Serialize)]
struct ChatContext<'a> {
    destination: Option<&'a str>,
}

/// Answers chat questions and refines generated summaries
pub struct Responder {
    deps: StageDeps,
}

impl Responder {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    /// Answer a travel question; a fixed reply when the model is unavailable
    pub async fn chat(&self, text: &str, destination: Option<&str>) -> Message {
        debug!(%text, "Responder::chat: called");
        match self
            .deps
            .ask_text("chat", &ChatContext { destination }, text, self.deps.stage_timeout)
            .await
        {
            Ok(answer) => Message::reply(answer),
            Err(e) => {
                warn!(error = %e, "Chat reply failed, using fallback");
                Message::reply(CHAT_FALLBACK)
            }
        }
    }

    /// Rewrite the plan's summary following `feedback`
    ///
    /// On failure the plan is untouched and the previous summary is returned
    /// with an advisory.
    pub async fn refine(&self, plan: &mut AggregatePlan, feedback: &str) -> Vec<Message> {
        debug!(%feedback, "Responder::refine: called");
        match summary::refine(&self.deps, &plan.summary, feedback).await {
            Ok(revised) => {
                plan.summary = revised;
                vec![Message::reply(plan.summary.clone())]
            }
            Err(e) => {
                warn!(error = %e, "Summary refinement failed, keeping previous summary");
                vec![
                    Message::advisory(None, REFINE_FAILED),
                    Message::reply(plan.summary.clone()),
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageKind, TripRequest};
    use crate::llm::client::mock::MockLlmClient;
    use crate::sequencer::test_support::deps;

    fn plan() -> AggregatePlan {
        AggregatePlan {
            trip: TripRequest::default(),
            locations: vec![],
            days: vec![],
            packing: Default::default(),
            summary: "# Trip to Galle\nA long summary.".to_string(),
            stages: vec![],
        }
    }

    #[tokio::test]
    async fn test_chat_mentions_destination_in_prompt() {
        let llm = MockLlmClient::failing().on_text("planning a trip to Ella", "Bring a jacket.");
        let reply = Responder::new(deps(llm)).chat("is it cold?", Some("Ella")).await;
        assert_eq!(reply.kind, MessageKind::Reply);
        assert_eq!(reply.text, "Bring a jacket.");
    }

    #[tokio::test]
    async fn test_chat_fallback() {
        let reply = Responder::new(deps(MockLlmClient::failing())).chat("hello", None).await;
        assert_eq!(reply.text, CHAT_FALLBACK);
    }

    #[tokio::test]
    async fn test_refine_updates_summary() {
        let llm = MockLlmClient::failing().on_text("# Summary refinement", "# Trip to Galle\nShort.");
        let mut p = plan();
        let messages = Responder::new(deps(llm)).refine(&mut p, "shorter").await;
        assert_eq!(p.summary, "# Trip to Galle\nShort.");
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn test_refine_failure_keeps_summary() {
        let mut p = plan();
        let messages = Responder::new(deps(MockLlmClient::failing())).refine(&mut p, "shorter").await;
        assert_eq!(p.summary, plan().summary);
        assert_eq!(messages[0].kind, MessageKind::Advisory);
        assert_eq!(messages[1].text, p.summary);
    }
}
