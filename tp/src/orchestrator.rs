//! Orchestrator
//!
//! Entry point for one user turn. Loads the conversation, routes the message,
//! runs the dialogue or the plan pipeline, and saves the result under
//! optimistic concurrency: a save that lost a race reloads and recomputes.

use std::sync::{Arc, LazyLock};

use chrono::{Local, NaiveDate};
use eyre::Context;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dialogue::{DialogueMachine, QuestionBook};
use crate::domain::{AggregatePlan, Message, TripRequest, TripStatus};
use crate::extract::SlotExtractor;
use crate::geocode::NominatimGeocoder;
use crate::intent::{Intent, IntentRouter};
use crate::llm::LlmClient;
use crate::prompts::PromptLoader;
use crate::reply::Responder;
use crate::retrieval::JsonlRetriever;
use crate::sanitize::sanitize_input;
use crate::sequencer::{StageDeps, TaskSequencer};
use crate::state::{Conversation, ConversationStore, Speaker, StateError};
use crate::temporal::{TemporalLimits, TemporalResolver};
use crate::validate::FieldValidator;

const EMPTY_INPUT: &str = "Tell me where in Sri Lanka you'd like to go and when, and I'll start planning.";

static RETRY_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(again|retry|regenerate|redo)\b").expect("valid regex")
});

/// The only failure a turn can surface: the conversation could not be
/// persisted
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Conversation {id} kept changing underneath this turn ({attempts} attempts)")]
    Contention { id: String, attempts: u32 },
}

/// What one turn produced
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub status: TripStatus,
    pub messages: Vec<Message>,
    /// Set when this turn generated or revised a plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<AggregatePlan>,
}

/// Trip details that decide whether two plans are for the same trip
fn same_trip(a: &TripRequest, b: &TripRequest) -> bool {
    a.destination == b.destination
        && a.start_date == b.start_date
        && a.end_date == b.end_date
        && a.traveler_count == b.traveler_count
        && a.trip_type == b.trip_type
        && a.budget == b.budget
        && a.preferences == b.preferences
}

/// Orchestration State Machine
pub struct Orchestrator {
    store: Arc<dyn ConversationStore>,
    router: IntentRouter,
    dialogue: DialogueMachine,
    sequencer: TaskSequencer,
    responder: Responder,
    store_retries: u32,
    batch_max_attempts: u32,
    reference_date: Option<NaiveDate>,
}

impl Orchestrator {
    /// Wire every component from configuration
    ///
    /// The geocoder is only built when enabled and the retriever only when a
    /// corpus is configured.
    pub fn from_config(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLoader>,
        store: Arc<dyn ConversationStore>,
    ) -> eyre::Result<Self> {
        debug!("Orchestrator::from_config: called");
        let resolver = TemporalResolver::new(TemporalLimits {
            max_trip_days: config.dialogue.max_trip_days,
            max_future_years: config.dialogue.max_future_years,
        });
        let mut validator = FieldValidator::new(resolver, config.dialogue.fuzzy_threshold);
        if config.geocoder.enabled {
            let geocoder = NominatimGeocoder::from_config(&config.geocoder, config.timeouts.geocode())
                .context("Failed to create geocoder")?;
            validator = validator.with_geocoder(
                Arc::new(geocoder),
                config.timeouts.geocode(),
                &config.geocoder.country_code,
            );
        }

        let mut deps = StageDeps::new(llm.clone(), prompts.clone(), config);
        if let Some(path) = config.retrieval.corpus_path.as_ref() {
            let retriever = JsonlRetriever::load(path)
                .with_context(|| format!("Failed to load retrieval corpus {}", path.display()))?;
            info!(snippets = retriever.len(), path = %path.display(), "Retrieval corpus loaded");
            deps = deps.with_retriever(Arc::new(retriever));
        }

        let extractor = SlotExtractor::new(llm.clone(), prompts.clone(), config.timeouts.extraction());
        let dialogue = DialogueMachine::new(extractor, validator, QuestionBook::new(prompts.clone()));
        let router = IntentRouter::new(llm, prompts, config.timeouts.extraction());

        Ok(Self {
            store,
            router,
            dialogue,
            sequencer: TaskSequencer::new(deps.clone()),
            responder: Responder::new(deps),
            store_retries: config.dialogue.store_retries,
            batch_max_attempts: config.dialogue.batch_max_attempts,
            reference_date: None,
        })
    }

    /// Pin "today" instead of reading the clock
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.reference_date.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Process one user message for `conversation_id`
    pub async fn process(&self, conversation_id: &str, user_text: &str) -> Result<TurnOutcome, PlannerError> {
        debug!(%conversation_id, "Orchestrator::process: called");
        let text = sanitize_input(user_text);
        let today = self.today();

        for attempt in 1..=self.store_retries + 1 {
            let loaded = self.store.load(conversation_id).await?;
            let (mut conversation, version) = match loaded {
                Some(record) => (record.value, Some(record.version)),
                None => (Conversation::new(conversation_id), None),
            };

            if text.is_empty() {
                return Ok(TurnOutcome {
                    conversation_id: conversation_id.to_string(),
                    status: conversation.dialogue.trip.status,
                    messages: vec![Message::advisory(None, EMPTY_INPUT)],
                    plan: None,
                });
            }

            let outcome = self.compute(&mut conversation, &text, today).await;
            match self.store.save(&conversation, version).await {
                Ok(new_version) => {
                    debug!(%conversation_id, %new_version, "process: saved");
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() => {
                    warn!(%conversation_id, %attempt, error = %e, "Conversation save did not land, recomputing");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(PlannerError::Contention {
            id: conversation_id.to_string(),
            attempts: self.store_retries + 1,
        })
    }

    async fn compute(&self, conversation: &mut Conversation, text: &str, today: NaiveDate) -> TurnOutcome {
        conversation.push_turn(Speaker::User, text);
        let intent = self.router.classify(text, conversation).await;
        info!(conversation_id = %conversation.id, %intent, "Routing turn");

        let mut produced_plan = false;
        let messages = match intent {
            Intent::Plan => {
                let retry = conversation.dialogue.is_complete()
                    && RETRY_WORDS.is_match(text)
                    && conversation
                        .latest_plan
                        .as_ref()
                        .is_some_and(|p| p.stages.iter().any(|r| r.is_fallback()));
                if retry {
                    produced_plan = true;
                    self.plan_for(conversation).await
                } else {
                    if conversation.dialogue.is_complete() {
                        debug!("compute: planning a new trip");
                        conversation.start_new_trip();
                    }
                    let (state, mut messages) = self.dialogue.advance(text, &conversation.dialogue, today).await;
                    conversation.dialogue = state;
                    if conversation.dialogue.is_complete() {
                        produced_plan = true;
                        messages.extend(self.plan_for(conversation).await);
                    }
                    messages
                }
            }
            Intent::Chat => {
                let destination = conversation
                    .dialogue
                    .trip
                    .destination
                    .clone()
                    .or_else(|| conversation.latest_plan.as_ref().and_then(|p| p.trip.destination.clone()));
                vec![self.responder.chat(text, destination.as_deref()).await]
            }
            Intent::Refine => match conversation.latest_plan.as_mut() {
                Some(plan) => {
                    produced_plan = true;
                    self.responder.refine(plan, text).await
                }
                None => vec![self.responder.chat(text, None).await],
            },
        };

        for message in &messages {
            conversation.push_turn(Speaker::Assistant, message.text.clone());
        }
        TurnOutcome {
            conversation_id: conversation.id.clone(),
            status: conversation.dialogue.trip.status,
            messages,
            plan: if produced_plan {
                conversation.latest_plan.clone()
            } else {
                None
            },
        }
    }

    /// Run or resume the pipeline for the conversation's complete trip
    async fn plan_for(&self, conversation: &mut Conversation) -> Vec<Message> {
        let trip = &conversation.dialogue.trip;
        let plan = match conversation.latest_plan.as_ref() {
            Some(previous) if same_trip(&previous.trip, trip) && previous.stages.iter().any(|r| r.is_fallback()) => {
                info!("Resuming previous plan from its first fallback stage");
                self.sequencer.resume(trip, previous).await
            }
            _ => self.sequencer.run(trip).await,
        };
        let messages = vec![Message::reply(plan.summary.clone())];
        conversation.latest_plan = Some(plan);
        messages
    }

    /// Batch mode: fill the trip from `initial` plus scripted `answers`, then plan
    ///
    /// Stores the result as a new conversation.
    pub async fn process_batch(&self, initial: &str, answers: &[String]) -> Result<TurnOutcome, PlannerError> {
        debug!(answer_count = answers.len(), "Orchestrator::process_batch: called");
        let today = self.today();
        let initial = sanitize_input(initial);
        let answers: Vec<String> = answers.iter().map(|a| sanitize_input(a)).collect();

        let mut conversation = Conversation::new(uuid::Uuid::now_v7().to_string());
        conversation.push_turn(Speaker::User, initial.as_str());
        let outcome = self
            .dialogue
            .run_batch(&initial, &answers, self.batch_max_attempts, today)
            .await;
        info!(turns = outcome.turns, complete = outcome.complete, "Batch dialogue finished");
        for answer in answers.iter().take(outcome.turns.saturating_sub(1)) {
            conversation.push_turn(Speaker::User, answer.as_str());
        }
        conversation.dialogue = outcome.state;

        let mut messages = outcome.messages;
        if outcome.complete {
            messages.extend(self.plan_for(&mut conversation).await);
        }
        for message in &messages {
            conversation.push_turn(Speaker::Assistant, message.text.clone());
        }
        self.store.save(&conversation, None).await?;

        Ok(TurnOutcome {
            conversation_id: conversation.id.clone(),
            status: conversation.dialogue.trip.status,
            messages,
            plan: conversation.latest_plan.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Field, MessageKind, StageKind};
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use crate::state::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tripstore::Versioned;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    fn extraction(value: serde_json::Value) -> MockReply {
        MockReply::Respond(CompletionResponse::tool(crate::extract::EXTRACT_TOOL, value))
    }

    fn orchestrator(llm: MockLlmClient, store: Arc<dyn ConversationStore>) -> Orchestrator {
        let mut config = Config::default();
        config.timeouts.extraction_ms = 200;
        config.timeouts.stage_ms = 200;
        config.timeouts.polish_ms = 200;
        Orchestrator::from_config(
            &config,
            Arc::new(llm),
            Arc::new(PromptLoader::embedded_only()),
            store,
        )
        .unwrap()
        .with_reference_date(today())
    }

    #[tokio::test]
    async fn test_first_turn_asks_start_date() {
        let llm = MockLlmClient::failing().on(
            "# Trip extraction",
            extraction(serde_json::json!({"destination": "galle", "trip_duration": "3 days"})),
        );
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(llm, store.clone());

        let outcome = orch.process("c1", "i want to plan 3 day trip to galle").await.unwrap();
        assert_eq!(outcome.status, TripStatus::AwaitingInput);
        assert!(outcome.plan.is_none());
        assert!(outcome.messages.iter().any(|m| m.is(MessageKind::Followup, Field::StartDate)));

        let stored = store.load("c1").await.unwrap().unwrap();
        assert_eq!(stored.value.dialogue.trip.destination.as_deref(), Some("Galle"));
        assert_eq!(stored.value.turns.len(), 1 + outcome.messages.len());
    }

    #[tokio::test]
    async fn test_empty_input_is_not_saved() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(MockLlmClient::failing(), store.clone());
        let outcome = orch.process("c1", "<script>alert(1)</script>").await.unwrap();
        assert_eq!(outcome.messages[0].text, EMPTY_INPUT);
        assert!(store.load("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chat_turn_without_trip() {
        let llm = MockLlmClient::failing()
            .on(
                "# Intent routing",
                MockReply::Respond(CompletionResponse::tool(
                    crate::intent::ROUTE_TOOL,
                    serde_json::json!({"intent": "chat"}),
                )),
            )
            .on_text("# Travel chat", "Yes, bottled water is best.");
        let orch = orchestrator(llm, Arc::new(MemoryStore::new()));
        let outcome = orch.process("c1", "is tap water safe?").await.unwrap();
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.messages[0].kind, MessageKind::Reply);
        assert_eq!(outcome.messages[0].text, "Yes, bottled water is best.");
    }

    #[tokio::test]
    async fn test_batch_builds_plan_with_fallbacks() {
        let llm = MockLlmClient::failing().on(
            "# Trip extraction",
            extraction(serde_json::json!({
                "destination": "Galle",
                "start_date": "2025-10-14",
                "trip_duration": "3 days",
                "traveler_count": "2",
                "trip_type": "leisure",
                "preferences": ["beach"]
            })),
        );
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(llm, store.clone());
        let outcome = orch.process_batch("3 days in Galle from 2025-10-14 for 2, leisure, beach", &[]).await.unwrap();

        assert_eq!(outcome.status, TripStatus::Complete);
        let plan = outcome.plan.as_ref().unwrap();
        assert!(plan.used_fallback(StageKind::Activity));
        assert_eq!(plan.days.len(), 3);
        assert!(outcome.messages.last().unwrap().text.contains("# Trip to Galle"));
        assert!(store.load(&outcome.conversation_id).await.unwrap().is_some());
    }

    /// Store whose first save always loses the race
    struct RacingStore {
        inner: MemoryStore,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl ConversationStore for RacingStore {
        async fn load(&self, id: &str) -> Result<Option<Versioned<Conversation>>, StateError> {
            self.inner.load(id).await
        }

        async fn save(&self, conversation: &Conversation, expected_version: Option<u64>) -> Result<u64, StateError> {
            if self.saves.fetch_add(1, Ordering::SeqCst) == 0 {
                // someone else created the conversation first
                self.inner.save(&Conversation::new(conversation.id.clone()), None).await?;
            }
            self.inner.save(conversation, expected_version).await
        }
    }

    #[tokio::test]
    async fn test_conflict_recomputes_on_fresh_state() {
        let llm = MockLlmClient::failing().on(
            "# Trip extraction",
            extraction(serde_json::json!({"destination": "Kandy"})),
        );
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            saves: AtomicUsize::new(0),
        });
        let orch = orchestrator(llm, store.clone());
        orch.process("c1", "Kandy please").await.unwrap();

        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
        let stored = store.load("c1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.dialogue.trip.destination.as_deref(), Some("Kandy"));
        assert_eq!(stored.value.turns[0].text, "Kandy please");
    }

    struct LockedOnceStore {
        inner: MemoryStore,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl ConversationStore for LockedOnceStore {
        async fn load(&self, id: &str) -> Result<Option<Versioned<Conversation>>, StateError> {
            self.inner.load(id).await
        }

        async fn save(&self, conversation: &Conversation, expected_version: Option<u64>) -> Result<u64, StateError> {
            if self.saves.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StateError::Busy(conversation.id.clone()));
            }
            self.inner.save(conversation, expected_version).await
        }
    }

    #[tokio::test]
    async fn test_locked_store_is_retried() {
        let llm = MockLlmClient::failing().on(
            "# Trip extraction",
            extraction(serde_json::json!({"destination": "Kandy"})),
        );
        let store = Arc::new(LockedOnceStore {
            inner: MemoryStore::new(),
            saves: AtomicUsize::new(0),
        });
        let orch = orchestrator(llm, store.clone());
        let outcome = orch.process("c1", "Kandy please").await.unwrap();

        assert!(!outcome.messages.is_empty());
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
        let stored = store.load("c1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.value.turns.len(), outcome.messages.len() + 1);
    }
}
