//! Activity stage: a day-by-day plan over the recommended locations

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StageDeps, StageError};
use crate::domain::{DayPlan, LocationRecommendation, TimeSlot, TripRequest};
use crate::retrieval::Snippet;

#[derive(Serialize)]
struct ActivityContext<'a> {
    destination: &'a str,
    dates: Vec<String>,
    season: String,
    travelers: u32,
    trip_type: &'a str,
    preferences: String,
    locations: &'a [LocationRecommendation],
    context: Vec<Snippet>,
}

#[derive(Deserialize)]
struct RawDay {
    date: String,
    #[serde(default)]
    slots: Vec<TimeSlot>,
}

#[derive(Deserialize)]
struct ActivityReply {
    #[serde(default)]
    days: Vec<RawDay>,
}

/// Retrieve notes for every location concurrently, keeping location order
async fn gather_context(deps: &StageDeps, locations: &[LocationRecommendation]) -> Vec<Snippet> {
    let searches = locations.iter().map(|loc| {
        let hints = vec![loc.name.clone()];
        async move { deps.retrieve(&format!("things to do in {}", loc.name), &hints).await }
    });
    let mut context: Vec<Snippet> = Vec::new();
    for snippet in join_all(searches).await.into_iter().flatten() {
        if !context.contains(&snippet) {
            context.push(snippet);
        }
    }
    context
}

/// Ask the model for a plan covering every trip date
///
/// Dates the model skipped or left empty are filled from the template.
pub async fn plan(
    deps: &StageDeps,
    trip: &TripRequest,
    locations: &[LocationRecommendation],
) -> Result<Vec<DayPlan>, StageError> {
    let dates = trip.dates();
    debug!(day_count = dates.len(), location_count = locations.len(), "activity::plan: called");
    let destination = trip.destination.as_deref().unwrap_or("Sri Lanka");
    let context = gather_context(deps, locations).await;

    let ctx = ActivityContext {
        destination,
        dates: dates.iter().map(NaiveDate::to_string).collect(),
        season: trip.season.map(|s| s.to_string()).unwrap_or_default(),
        travelers: trip.traveler_count.unwrap_or(1),
        trip_type: trip.trip_type.as_deref().unwrap_or("leisure"),
        preferences: trip.preferences.join(", "),
        locations,
        context,
    };
    let value = deps
        .ask_json("activity", &ctx, &format!("Plan each day of my trip to {}.", destination))
        .await?;
    let reply: ActivityReply =
        serde_json::from_value(value).map_err(|e| StageError::Malformed(format!("activity reply: {}", e)))?;

    let planned: Vec<(NaiveDate, Vec<TimeSlot>)> = reply
        .days
        .into_iter()
        .filter_map(|d| {
            let date = NaiveDate::parse_from_str(d.date.trim(), "%Y-%m-%d").ok()?;
            let slots: Vec<TimeSlot> = d.slots.into_iter().filter(|s| !s.title.trim().is_empty()).collect();
            (dates.contains(&date) && !slots.is_empty()).then_some((date, slots))
        })
        .collect();
    if planned.is_empty() {
        return Err(StageError::Malformed("no usable days in activity plan".to_string()));
    }

    let template = fallback(trip, locations);
    Ok(template
        .into_iter()
        .map(|day| match planned.iter().find(|(date, _)| *date == day.date) {
            Some((date, slots)) => DayPlan {
                date: *date,
                slots: slots.clone(),
            },
            None => {
                debug!(date = %day.date, "activity::plan: filling skipped day from template");
                day
            }
        })
        .collect())
}

fn slot(time: &str, title: String, why: &str) -> TimeSlot {
    TimeSlot {
        time: time.to_string(),
        title,
        why: why.to_string(),
    }
}

/// Four-slot template day for each date, rotating through the locations
pub fn fallback(trip: &TripRequest, locations: &[LocationRecommendation]) -> Vec<DayPlan> {
    let destination = trip.destination.as_deref().unwrap_or("Sri Lanka");
    trip.dates()
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            let place = if locations.is_empty() {
                destination
            } else {
                locations[i % locations.len()].name.as_str()
            };
            DayPlan {
                date,
                slots: vec![
                    slot("Morning", format!("Explore around {}", place), "Good light and cooler temps."),
                    slot("Noon", "Local lunch & short indoor stop".to_string(), "Heat avoidance."),
                    slot("Evening", "Sunset viewpoint or village walk".to_string(), "Golden hour views."),
                    slot("Night", "Dinner / cultural show".to_string(), "End the day relaxed."),
                ],
            }
        })
        .collect()
}
