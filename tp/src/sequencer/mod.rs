//! Task Sequencer
//!
//! Runs the plan pipeline for a complete trip:
//!
//! ```text
//! location -> activity -> packing -> summary
//! ```
//!
//! Each stage calls its collaborator under a timeout and, on any failure,
//! substitutes deterministic output so the pipeline always finishes. Every
//! stage records whether it completed or fell back.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod activity;
pub mod location;
pub mod packing;
pub mod summary;

use crate::config::Config;
use crate::domain::{AggregatePlan, StageKind, StageOutcome, StageReport, TripRequest};
use crate::llm::{CompletionRequest, LlmClient, LlmError, complete_with_timeout, parse_json_payload};
use crate::prompts::PromptLoader;
use crate::retrieval::{Retriever, Snippet, search_with_timeout};

/// Why a stage could not use its collaborator's output
#[derive(Debug, Error)]
pub enum StageError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Malformed stage output: {0}")]
    Malformed(String),
}

/// Collaborators and limits shared by every stage
#[derive(Clone)]
pub struct StageDeps {
    pub llm: Arc<dyn LlmClient>,
    pub retriever: Option<Arc<dyn Retriever>>,
    pub prompts: Arc<PromptLoader>,
    pub stage_timeout: Duration,
    pub polish_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub top_k: usize,
    pub max_tokens: u32,
}

impl StageDeps {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, config: &Config) -> Self {
        Self {
            llm,
            retriever: None,
            prompts,
            stage_timeout: config.timeouts.stage(),
            polish_timeout: config.timeouts.polish(),
            retrieval_timeout: config.timeouts.retrieval(),
            top_k: config.retrieval.top_k,
            max_tokens: config.llm.max_tokens,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    fn render<T: Serialize>(&self, template: &str, context: &T) -> Result<String, StageError> {
        self.prompts
            .render(template, context)
            .map_err(|e| StageError::Prompt(e.to_string()))
    }

    /// Render `template` and return the model's text reply
    pub(crate) async fn ask_text<T: Serialize>(
        &self,
        template: &str,
        context: &T,
        user: &str,
        timeout: Duration,
    ) -> Result<String, StageError> {
        let system = self.render(template, context)?;
        let request = CompletionRequest::new(system, user, self.max_tokens);
        let response = complete_with_timeout(self.llm.as_ref(), request, timeout).await?;
        response
            .text_content()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| StageError::Malformed("empty reply".to_string()))
    }

    /// Render `template` and return the JSON object in the model's reply
    pub(crate) async fn ask_json<T: Serialize>(&self, template: &str, context: &T, user: &str) -> Result<Value, StageError> {
        let text = self.ask_text(template, context, user, self.stage_timeout).await?;
        parse_json_payload(&text).ok_or_else(|| StageError::Malformed("reply contained no JSON object".to_string()))
    }

    /// Reference snippets, empty when retrieval is unavailable or fails
    pub(crate) async fn retrieve(&self, query: &str, hints: &[String]) -> Vec<Snippet> {
        let Some(retriever) = self.retriever.as_ref() else {
            return Vec::new();
        };
        match search_with_timeout(retriever.as_ref(), query, hints, self.top_k, self.retrieval_timeout).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!(error = %e, %query, "Retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }
}

const ORDER: [StageKind; 4] = [StageKind::Location, StageKind::Activity, StageKind::Packing, StageKind::Summary];

fn settle<T>(stage: StageKind, result: Result<T, StageError>, fallback: impl FnOnce() -> T) -> (T, StageReport) {
    match result {
        Ok(value) => {
            debug!(%stage, "stage completed");
            (
                value,
                StageReport {
                    stage,
                    outcome: StageOutcome::Completed,
                },
            )
        }
        Err(e) => {
            warn!(%stage, error = %e, "Stage failed, using fallback");
            (
                fallback(),
                StageReport {
                    stage,
                    outcome: StageOutcome::Fallback { reason: e.to_string() },
                },
            )
        }
    }
}

/// Task Sequencer
pub struct TaskSequencer {
    deps: StageDeps,
}

impl TaskSequencer {
    pub fn new(deps: StageDeps) -> Self {
        Self { deps }
    }

    /// Build a full plan for a complete trip
    pub async fn run(&self, trip: &TripRequest) -> AggregatePlan {
        debug!(destination = ?trip.destination, "TaskSequencer::run: called");
        self.execute(trip, None).await
    }

    /// Re-run a previous plan from its first fallen-back stage onward
    ///
    /// Stages before the first fallback keep their output; everything after it
    /// depends on it and runs again.
    pub async fn resume(&self, trip: &TripRequest, previous: &AggregatePlan) -> AggregatePlan {
        debug!("TaskSequencer::resume: called");
        self.execute(trip, Some(previous)).await
    }

    async fn execute(&self, trip: &TripRequest, previous: Option<&AggregatePlan>) -> AggregatePlan {
        // with nothing to redo, only the summary is rendered again
        let first_rerun = match previous {
            Some(p) => ORDER
                .iter()
                .position(|kind| p.stage(*kind).is_none_or(StageReport::is_fallback))
                .unwrap_or(ORDER.len() - 1),
            None => 0,
        };
        let reused = |kind: StageKind| -> Option<&AggregatePlan> {
            let index = ORDER.iter().position(|k| *k == kind).unwrap_or(0);
            previous.filter(|_| index < first_rerun)
        };
        let mut stages = Vec::with_capacity(ORDER.len());

        let locations = match reused(StageKind::Location) {
            Some(p) => {
                stages.extend(p.stage(StageKind::Location).cloned());
                p.locations.clone()
            }
            None => {
                let (locations, report) = settle(
                    StageKind::Location,
                    location::recommend(&self.deps, trip).await,
                    || location::fallback(trip),
                );
                stages.push(report);
                locations
            }
        };

        let days = match reused(StageKind::Activity) {
            Some(p) => {
                stages.extend(p.stage(StageKind::Activity).cloned());
                p.days.clone()
            }
            None => {
                let (days, report) = settle(
                    StageKind::Activity,
                    activity::plan(&self.deps, trip, &locations).await,
                    || activity::fallback(trip, &locations),
                );
                stages.push(report);
                days
            }
        };

        let packing = match reused(StageKind::Packing) {
            Some(p) => {
                stages.extend(p.stage(StageKind::Packing).cloned());
                p.packing.clone()
            }
            None => {
                let (packing, report) = settle(
                    StageKind::Packing,
                    packing::pack(&self.deps, trip, &locations, &days).await,
                    || packing::fallback(trip, &locations, &days),
                );
                stages.push(report);
                packing
            }
        };

        let raw = summary::render(trip, &locations, &days, &packing, &stages);
        let (summary, report) = settle(StageKind::Summary, summary::polish(&self.deps, trip, &raw).await, || {
            raw.clone()
        });
        stages.push(report);

        let fallbacks: Vec<String> = stages
            .iter()
            .filter(|r| r.is_fallback())
            .map(|r| r.stage.to_string())
            .collect();
        info!(
            locations = locations.len(),
            days = days.len(),
            packing_items = packing.item_count(),
            ?fallbacks,
            "Plan assembled"
        );

        AggregatePlan {
            trip: trip.clone(),
            locations,
            days,
            packing,
            summary,
            stages,
        }
    }
}
