//! Follow-up question templates

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::domain::{Field, TripRequest};
use crate::prompts::PromptLoader;

const DESTINATION: &str = "Where would you like to travel in Sri Lanka?";
const START_DATE: &str = "{{#if destination}}When would you like to start your trip to {{destination}}?\
{{else}}What is your trip start date?{{/if}} (YYYY-MM-DD)";
const END_DATE: &str = "{{#if start_date}}Your trip starts on {{start_date}}. {{/if}}When does it end? \
You can give an end date (YYYY-MM-DD) or a trip length like 5 days.";
const TRAVELERS: &str = "How many people are traveling{{#if destination}} to {{destination}}{{/if}}?";
const TRIP_TYPE: &str = "What kind of trip is this? (leisure, adventure, business, family)";
const BUDGET: &str = "What is your budget? (low, medium, high)";
const PREFERENCES: &str = "Any preferences{{#if destination}} for {{destination}}{{/if}}? \
(e.g., beach, culture, food) comma separated";

#[derive(Serialize)]
struct QuestionContext<'a> {
    destination: Option<&'a str>,
    start_date: Option<String>,
}

/// Renders the question asked for each missing field
pub struct QuestionBook {
    loader: Arc<PromptLoader>,
}

impl QuestionBook {
    pub fn new(loader: Arc<PromptLoader>) -> Self {
        Self { loader }
    }

    fn template(field: Field) -> &'static str {
        match field {
            Field::Destination => DESTINATION,
            Field::StartDate => START_DATE,
            Field::EndDate | Field::TripDuration => END_DATE,
            Field::TravelerCount => TRAVELERS,
            Field::TripType => TRIP_TYPE,
            Field::Budget => BUDGET,
            Field::Preferences => PREFERENCES,
        }
    }

    /// The question for `field`, personalised with what is known about `trip`
    pub fn question(&self, field: Field, trip: &TripRequest) -> String {
        let context = QuestionContext {
            destination: trip.destination.as_deref(),
            start_date: trip.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
        };
        match self.loader.render_str(Self::template(field), &context) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, %field, "Failed to render question");
                format!("Could you tell me the {}?", field.label())
            }
        }
    }
}
