//! Location stage: where to go in and around the destination

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StageDeps, StageError};
use crate::domain::{LocationRecommendation, TripRequest};
use crate::retrieval::Snippet;
use crate::validate::gazetteer;

/// Shown with every set of recommendations
pub const DISCLAIMER: &str = "Recommendations are generated fairly and do not store personal user data.";

const MAX_LOCATIONS: usize = 6;

#[derive(Serialize)]
struct LocationContext<'a> {
    destination: &'a str,
    start_date: String,
    end_date: String,
    days: u32,
    season: String,
    travelers: u32,
    trip_type: &'a str,
    budget: &'a str,
    preferences: String,
    context: Vec<Snippet>,
}

#[derive(Deserialize)]
struct LocationReply {
    #[serde(default)]
    recommended_locations: Vec<LocationRecommendation>,
}

/// Ask the model for recommendations grounded in retrieved notes
pub async fn recommend(deps: &StageDeps, trip: &TripRequest) -> Result<Vec<LocationRecommendation>, StageError> {
    let destination = trip.destination.as_deref().unwrap_or("Sri Lanka");
    debug!(%destination, "location::recommend: called");
    let preferences = trip.preferences.join(", ");
    let context = deps
        .retrieve(&format!("places to visit {} {}", destination, preferences), &[destination.to_string()])
        .await;

    let ctx = LocationContext {
        destination,
        start_date: trip.start_date.map(|d| d.to_string()).unwrap_or_default(),
        end_date: trip.end_date.map(|d| d.to_string()).unwrap_or_default(),
        days: trip.day_count().unwrap_or(1),
        season: trip.season.map(|s| s.to_string()).unwrap_or_default(),
        travelers: trip.traveler_count.unwrap_or(1),
        trip_type: trip.trip_type.as_deref().unwrap_or("leisure"),
        budget: trip.budget.as_deref().unwrap_or("not specified"),
        preferences,
        context,
    };
    let value = deps
        .ask_json("location", &ctx, &format!("Recommend places for my trip to {}.", destination))
        .await?;
    let reply: LocationReply =
        serde_json::from_value(value).map_err(|e| StageError::Malformed(format!("location reply: {}", e)))?;

    let mut locations: Vec<LocationRecommendation> = Vec::new();
    for loc in reply.recommended_locations {
        let name = loc.name.trim();
        if name.is_empty() || locations.iter().any(|l| l.name.eq_ignore_ascii_case(name)) {
            continue;
        }
        locations.push(LocationRecommendation {
            name: name.to_string(),
            ..loc
        });
    }
    locations.truncate(MAX_LOCATIONS);

    if locations.is_empty() {
        return Err(StageError::Malformed("no locations recommended".to_string()));
    }
    Ok(locations)
}

/// The destination plus up to three neighbours from its gazetteer region
pub fn fallback(trip: &TripRequest) -> Vec<LocationRecommendation> {
    let destination = trip.destination.as_deref().unwrap_or("Colombo");
    match gazetteer::lookup(destination) {
        Some(place) => std::iter::once(place)
            .chain(gazetteer::neighbours(place, 3))
            .map(|p| LocationRecommendation {
                name: p.name.to_string(),
                kind: p.kind.to_string(),
                reason: format!("Known for {}.", p.highlight),
            })
            .collect(),
        None => vec![LocationRecommendation {
            name: destination.to_string(),
            kind: "town".to_string(),
            reason: "Your chosen destination.".to_string(),
        }],
    }
}
