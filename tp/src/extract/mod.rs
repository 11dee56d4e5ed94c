//! Slot Extractor
//!
//! Turns one user message into raw, unvalidated candidate values. The model
//! does the reading; everything it returns is treated as a suggestion that the
//! validator may still reject.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

mod travelers;

pub use travelers::{parse_travelers, reliable_count};

use crate::domain::{Field, Message, TripRequest};
use crate::llm::{CompletionRequest, LlmClient, ToolDefinition, complete_with_timeout, structured_output};
use crate::prompts::PromptLoader;
use crate::validate::gazetteer;

/// Name of the extraction tool the model is asked to call
pub const EXTRACT_TOOL: &str = "record_trip_details";

/// Raw values for one turn, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Candidates {
    pub destination: Option<String>,
    pub destination_country: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub trip_duration: Option<String>,
    pub traveler_count: Option<String>,
    pub trip_type: Option<String>,
    pub budget: Option<String>,
    pub preferences: Vec<String>,
}

/// Text of a JSON scalar, ignoring placeholders models like to emit
fn text_of(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let placeholder = matches!(
        text.to_lowercase().as_str(),
        "" | "null" | "none" | "n/a" | "unknown" | "not specified" | "not provided"
    );
    (!placeholder).then_some(text)
}

fn list_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text_of(Some(v))).collect(),
        other => text_of(other).into_iter().collect(),
    }
}

impl Candidates {
    /// Read candidates out of the model's structured output
    pub fn from_value(value: &Value) -> Self {
        Self {
            destination: text_of(value.get("destination")),
            destination_country: text_of(value.get("destination_country")),
            start_date: text_of(value.get("start_date")),
            end_date: text_of(value.get("end_date")),
            trip_duration: text_of(value.get("trip_duration")),
            traveler_count: text_of(value.get("traveler_count")),
            trip_type: text_of(value.get("trip_type")),
            budget: text_of(value.get("budget")),
            preferences: list_of(value.get("preferences")),
        }
    }

    /// Candidates that restate what is already known
    pub fn from_trip(trip: &TripRequest) -> Self {
        Self {
            destination: trip.destination.clone(),
            destination_country: None,
            start_date: trip.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            end_date: trip.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            trip_duration: trip.trip_duration_days.map(|d| d.to_string()),
            traveler_count: trip.traveler_count.map(|n| n.to_string()),
            trip_type: trip.trip_type.clone(),
            budget: trip.budget.clone(),
            preferences: trip.preferences.clone(),
        }
    }

    /// Raw value currently held for `field`
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Destination => self.destination.as_deref(),
            Field::StartDate => self.start_date.as_deref(),
            Field::EndDate => self.end_date.as_deref(),
            Field::TripDuration => self.trip_duration.as_deref(),
            Field::TravelerCount => self.traveler_count.as_deref(),
            Field::TripType => self.trip_type.as_deref(),
            Field::Budget => self.budget.as_deref(),
            Field::Preferences => self.preferences.first().map(String::as_str),
        }
    }

    /// Fill `field` with `raw` unless a value is already present
    pub fn fill(&mut self, field: Field, raw: &str) {
        let raw = raw.trim().to_string();
        match field {
            Field::Destination => {
                self.destination.get_or_insert(raw);
            }
            Field::StartDate => {
                self.start_date.get_or_insert(raw);
            }
            Field::EndDate => {
                self.end_date.get_or_insert(raw);
            }
            Field::TripDuration => {
                self.trip_duration.get_or_insert(raw);
            }
            Field::TravelerCount => {
                self.traveler_count.get_or_insert(raw);
            }
            Field::TripType => {
                self.trip_type.get_or_insert(raw);
            }
            Field::Budget => {
                self.budget.get_or_insert(raw);
            }
            Field::Preferences => {
                if self.preferences.is_empty() {
                    self.preferences.push(raw);
                }
            }
        }
    }
}

/// Result of one extraction
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub candidates: Candidates,
    pub messages: Vec<Message>,
    /// The model output was unusable and candidates restate the prior state
    pub fallback: bool,
}

#[derive(Serialize)]
struct ExtractContext {
    today: String,
    prior: String,
}

fn extract_tool() -> ToolDefinition {
    ToolDefinition::new(
        EXTRACT_TOOL,
        "Record the trip details stated in the user's latest message",
        serde_json::json!({
            "type": "object",
            "properties": {
                "destination": {"type": "string", "description": "Place the user wants to visit"},
                "destination_country": {"type": "string", "description": "Country of the destination"},
                "start_date": {"type": "string"},
                "end_date": {"type": "string"},
                "trip_duration": {"type": "string", "description": "Trip length as written, e.g. '3 days'"},
                "traveler_count": {"type": "string", "description": "Number of travelers or the phrase used"},
                "trip_type": {"type": "string"},
                "budget": {"type": "string"},
                "preferences": {"type": "array", "items": {"type": "string"}}
            }
        }),
    )
}

/// Slot Extractor
pub struct SlotExtractor {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    timeout: Duration,
    max_tokens: u32,
}

impl SlotExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, timeout: Duration) -> Self {
        Self {
            llm,
            prompts,
            timeout,
            max_tokens: 1024,
        }
    }

    /// Ask the model for structured values; `None` on any failure
    async fn ask_model(&self, text: &str, prior: &TripRequest, today: NaiveDate) -> Option<Candidates> {
        let context = ExtractContext {
            today: today.format("%Y-%m-%d").to_string(),
            prior: serde_json::to_string_pretty(&Candidates::from_trip(prior)).unwrap_or_default(),
        };
        let system = match self.prompts.render("extract", &context) {
            Ok(system) => system,
            Err(e) => {
                warn!(error = %e, "Failed to render extraction prompt");
                return None;
            }
        };

        let request = CompletionRequest::new(system, text, self.max_tokens).with_tool(extract_tool());
        match complete_with_timeout(self.llm.as_ref(), request, self.timeout).await {
            Ok(response) => match structured_output(&response, EXTRACT_TOOL) {
                Some(value) => Some(Candidates::from_value(&value)),
                None => {
                    warn!("Extraction returned no structured output");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Extraction call failed");
                None
            }
        }
    }

    /// Extract candidate values from `text`
    ///
    /// Never fails: an unusable model reply yields candidates seeded from
    /// `prior`.
    pub async fn extract(
        &self,
        text: &str,
        prior: &TripRequest,
        awaiting: Option<Field>,
        today: NaiveDate,
    ) -> Extraction {
        debug!(%text, ?awaiting, "SlotExtractor::extract: called");
        let mut messages = Vec::new();
        let (mut candidates, fallback) = match self.ask_model(text, prior, today).await {
            Some(candidates) => (candidates, false),
            None => (Candidates::from_trip(prior), true),
        };

        let model_count = candidates.traveler_count.take();
        let reliable = model_count.as_deref().and_then(reliable_count);
        candidates.traveler_count = match reliable {
            Some(n) => Some(n.to_string()),
            None if prior.traveler_count.is_none() || awaiting == Some(Field::TravelerCount) => {
                match parse_travelers(text) {
                    Some(n) => {
                        debug!(%n, "extract: traveler count from local parse");
                        Some(n.to_string())
                    }
                    // keep the unreadable answer so validation can name it
                    None if awaiting == Some(Field::TravelerCount) => model_count,
                    None => None,
                }
            }
            None => prior.traveler_count.map(|n| n.to_string()),
        };

        if let Some(destination) = candidates.destination.clone()
            && is_out_of_scope(&destination, candidates.destination_country.as_deref())
        {
            debug!(%destination, "extract: destination outside Sri Lanka");
            messages.push(Message::re_track(
                Field::Destination,
                format!(
                    "I can only plan trips within Sri Lanka, so I can't plan a trip to {}. \
                     Which place in Sri Lanka would you like to visit? For example Galle, Kandy or Ella.",
                    destination
                ),
            ));
            candidates.destination = None;
        }

        Extraction {
            candidates,
            messages,
            fallback,
        }
    }
}

fn is_out_of_scope(destination: &str, country: Option<&str>) -> bool {
    if gazetteer::lookup(destination).is_some() {
        return false;
    }
    if gazetteer::is_foreign(destination) {
        return true;
    }
    country.is_some_and(|c| !gazetteer::is_country_name(c))
}
