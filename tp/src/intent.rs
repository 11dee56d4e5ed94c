//! Intent Router
//!
//! Decides what a user message is for once no trip question is pending:
//! planning a trip, chatting about Sri Lanka travel, or refining the summary
//! that was already generated.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient, ToolDefinition, complete_with_timeout, structured_output};
use crate::prompts::PromptLoader;
use crate::state::Conversation;
use crate::validate::gazetteer;

pub const ROUTE_TOOL: &str = "route_decision";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Plan,
    Chat,
    Refine,
}

impl Intent {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "plan" => Some(Intent::Plan),
            "chat" => Some(Intent::Chat),
            "refine" => Some(Intent::Refine),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::Plan => "plan",
            Intent::Chat => "chat",
            Intent::Refine => "refine",
        };
        write!(f, "{}", s)
    }
}

static REFINE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(shorter|longer|rewrite|re-write|change|modify|refine|tone|bullets?|format|concise|simplify)\b")
        .expect("valid regex")
});

/// Words that point at trip details rather than the wording of the summary
static TRIP_FIELD_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(dates?|days?|nights?|weeks?|destination|travell?ers?|people|budget|start|end)\b|\d")
        .expect("valid regex")
});

static PLAN_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(trip|plan|planning|travel|itinerary|visit|holiday|vacation|tour)\b").expect("valid regex")
});

#[derive(Serialize)]
struct RouteContext {
    has_plan: bool,
    trip_in_progress: bool,
}

fn route_tool() -> ToolDefinition {
    ToolDefinition::new(
        ROUTE_TOOL,
        "Choose how to handle the user's message",
        serde_json::json!({
            "type": "object",
            "properties": {
                "intent": {"type": "string", "enum": ["plan", "chat", "refine"]}
            },
            "required": ["intent"]
        }),
    )
}

/// Keyword heuristics used when the model cannot decide
///
/// Naming a Sri Lankan place counts as planning.
pub fn keyword_intent(text: &str, has_plan: bool) -> Intent {
    if has_plan && REFINE_WORDS.is_match(text) && !TRIP_FIELD_WORDS.is_match(text) {
        Intent::Refine
    } else if PLAN_WORDS.is_match(text) || gazetteer::mentioned_in(text).is_some() {
        Intent::Plan
    } else {
        Intent::Chat
    }
}

/// Intent Router
pub struct IntentRouter {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    timeout: Duration,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, timeout: Duration) -> Self {
        Self { llm, prompts, timeout }
    }

    /// Classify `text` in the context of `conversation`
    pub async fn classify(&self, text: &str, conversation: &Conversation) -> Intent {
        debug!(%text, "IntentRouter::classify: called");
        if conversation.dialogue.in_progress() {
            debug!("classify: dialogue in progress, routing to plan");
            return Intent::Plan;
        }
        let has_plan = conversation.has_plan();
        if has_plan && REFINE_WORDS.is_match(text) && !TRIP_FIELD_WORDS.is_match(text) {
            debug!("classify: refine keywords with an existing plan");
            return Intent::Refine;
        }

        match self.ask_model(text, has_plan).await {
            // refining needs something to refine
            Some(Intent::Refine) if !has_plan => keyword_intent(text, has_plan),
            Some(intent) => intent,
            None => keyword_intent(text, has_plan),
        }
    }

    async fn ask_model(&self, text: &str, has_plan: bool) -> Option<Intent> {
        let context = RouteContext {
            has_plan,
            trip_in_progress: false,
        };
        let system = self
            .prompts
            .render("intent", &context)
            .map_err(|e| warn!(error = %e, "Failed to render intent prompt"))
            .ok()?;
        let request = CompletionRequest::new(system, text, 64).with_tool(route_tool());
        let response = complete_with_timeout(self.llm.as_ref(), request, self.timeout)
            .await
            .map_err(|e| warn!(error = %e, "Intent routing call failed"))
            .ok()?;
        let value = structured_output(&response, ROUTE_TOOL)?;
        let intent = value.get("intent").and_then(|v| v.as_str()).and_then(Intent::parse);
        if intent.is_none() {
            warn!(?value, "Intent routing returned an unknown intent");
        }
        intent
    }
}
