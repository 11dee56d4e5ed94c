//! Packing stage

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StageDeps, StageError};
use crate::domain::{DayPlan, LocationRecommendation, PackingCategory, PackingItem, PackingList, TripRequest};
use crate::validate::gazetteer::{self, Region};

/// Items whose name contains one of these sort ahead of the rest, in this order
const LOW_COST_PRIORITY: &[&str] = &[
    "water bottle",
    "umbrella",
    "hat",
    "shawl",
    "towel",
    "light",
    "scarf",
    "raincoat",
];

const DEFAULT_NOTES: &[&str] = &[
    "Prioritize essentials; add items based on final itinerary.",
    "Check airline liquid limits and baggage policy.",
];

const HIKING_WORDS: &[&str] = &["hike", "hiking", "trek", "climb", "trail", "peak", "nature", "viewpoint"];
const TEMPLE_WORDS: &[&str] = &["temple", "religious", "shrine", "kovil", "dagoba", "stupa", "culture", "heritage"];
const BEACH_WORDS: &[&str] = &["beach", "swim", "snorkel", "surf", "diving", "lagoon"];

#[derive(Serialize)]
struct PackingContext<'a> {
    destination: &'a str,
    days: u32,
    season: String,
    travelers: u32,
    trip_type: &'a str,
    activities: String,
}

/// Items may arrive as bare strings or as objects
#[derive(Deserialize)]
#[serde(untagged)]
enum RawItem {
    Name(String),
    Full(PackingItem),
}

impl From<RawItem> for PackingItem {
    fn from(raw: RawItem) -> Self {
        match raw {
            RawItem::Name(name) => PackingItem::new(name, ""),
            RawItem::Full(item) => item,
        }
    }
}

#[derive(Deserialize)]
struct RawCategory {
    name: String,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Deserialize)]
struct PackingReply {
    #[serde(default)]
    categories: Vec<RawCategory>,
    #[serde(default)]
    notes: Vec<String>,
}

/// Ask the model for a packing list shaped by the planned activities
pub async fn pack(
    deps: &StageDeps,
    trip: &TripRequest,
    locations: &[LocationRecommendation],
    days: &[DayPlan],
) -> Result<PackingList, StageError> {
    debug!(location_count = locations.len(), day_count = days.len(), "packing::pack: called");
    let destination = trip.destination.as_deref().unwrap_or("Sri Lanka");
    let activities: Vec<&str> = days
        .iter()
        .flat_map(|d| d.slots.iter().map(|s| s.title.as_str()))
        .chain(locations.iter().map(|l| l.name.as_str()))
        .collect();

    let ctx = PackingContext {
        destination,
        days: trip.day_count().unwrap_or(days.len() as u32),
        season: trip.season.map(|s| s.to_string()).unwrap_or_default(),
        travelers: trip.traveler_count.unwrap_or(1),
        trip_type: trip.trip_type.as_deref().unwrap_or("leisure"),
        activities: activities.join("; "),
    };
    let value = deps
        .ask_json("packing", &ctx, &format!("What should I pack for {}?", destination))
        .await?;
    let reply: PackingReply =
        serde_json::from_value(value).map_err(|e| StageError::Malformed(format!("packing reply: {}", e)))?;

    let categories = reply
        .categories
        .into_iter()
        .map(|c| category(c.name.trim(), c.items.into_iter().map(PackingItem::from).collect()))
        .filter(|c| !c.name.is_empty() && !c.items.is_empty())
        .collect();
    let notes = if reply.notes.is_empty() {
        DEFAULT_NOTES.iter().map(|n| n.to_string()).collect()
    } else {
        reply.notes
    };
    let list = PackingList { categories, notes };
    if list.item_count() == 0 {
        return Err(StageError::Malformed("packing list has no items".to_string()));
    }
    Ok(list)
}

/// Deduplicate case-insensitively and move low-cost items to the front
fn category(name: &str, items: Vec<PackingItem>) -> PackingCategory {
    let mut kept: Vec<PackingItem> = Vec::with_capacity(items.len());
    for item in items {
        let trimmed = item.name.trim();
        if trimmed.is_empty() || kept.iter().any(|k| k.name.eq_ignore_ascii_case(trimmed)) {
            continue;
        }
        kept.push(PackingItem::new(trimmed, item.reason.trim()));
    }
    // stable, so untagged items keep their order
    kept.sort_by_key(|item| {
        let lower = item.name.to_lowercase();
        LOW_COST_PRIORITY
            .iter()
            .position(|word| lower.contains(word))
            .unwrap_or(LOW_COST_PRIORITY.len())
    });
    PackingCategory {
        name: name.to_string(),
        items: kept,
    }
}

fn mentions(haystack: &[String], words: &[&str]) -> bool {
    haystack.iter().any(|h| words.iter().any(|w| h.contains(w)))
}

/// Rule-based list keyed by season and activity keywords
pub fn fallback(trip: &TripRequest, locations: &[LocationRecommendation], days: &[DayPlan]) -> PackingList {
    let signals: Vec<String> = days
        .iter()
        .flat_map(|d| d.slots.iter().map(|s| s.title.to_lowercase()))
        .chain(trip.preferences.iter().map(|p| p.to_lowercase()))
        .chain(locations.iter().map(|l| l.kind.to_lowercase()))
        .chain(locations.iter().map(|l| l.name.to_lowercase()))
        .collect();

    let essentials = vec![
        PackingItem::new("Toothbrush & toiletries", "Daily basics"),
        PackingItem::new("Phone charger & power bank", "Maps and photos all day"),
    ];

    let mut weather = if trip.season.is_some_and(|s| s.is_monsoon()) {
        vec![
            PackingItem::new("Umbrella/Raincoat", "Monsoon showers"),
            PackingItem::new("Quick-dry shoes", "Wet streets and trails"),
        ]
    } else {
        vec![
            PackingItem::new("Sunscreen SPF 30+", "Strong tropical sun"),
            PackingItem::new("Hat/Cap", "Shade at midday"),
            PackingItem::new("Light cotton clothes", "Heat and humidity"),
        ]
    };
    let hill_country = locations
        .iter()
        .map(|l| l.name.as_str())
        .chain(trip.destination.as_deref())
        .any(|name| gazetteer::lookup(name).is_some_and(|p| p.region == Region::HillCountry));
    if hill_country {
        weather.push(PackingItem::new("Warm layer", "Cool mornings in the hills"));
    }

    let mut activity = Vec::new();
    if mentions(&signals, HIKING_WORDS) {
        activity.push(PackingItem::new("Hiking shoes", "Uneven trails"));
        activity.push(PackingItem::new("Water bottle (1L)", "Stay hydrated on walks"));
        activity.push(PackingItem::new("Small first-aid kit", "Scrapes and blisters"));
    }
    if mentions(&signals, TEMPLE_WORDS) {
        activity.push(PackingItem::new("Modest attire", "Covered shoulders and knees at temples"));
        activity.push(PackingItem::new("Light shawl/sarong", "Quick cover-up for sacred sites"));
    }
    if mentions(&signals, BEACH_WORDS) {
        activity.push(PackingItem::new("Swimwear", "Beach time"));
        activity.push(PackingItem::new("Microfiber towel", "Dries fast and packs small"));
    }

    let documents = vec![
        PackingItem::new("ID/Passport", "Required for check-in"),
        PackingItem::new("Basic meds", "Headache and stomach remedies"),
    ];
    let optional = vec![PackingItem::new("Travel pillow", "Long bus and train rides")];

    let categories = [
        ("Essentials", essentials),
        ("Weather-specific", weather),
        ("Activity-specific", activity),
        ("Documents & Safety", documents),
        ("Optional nice-to-have", optional),
    ]
    .into_iter()
    .filter(|(_, items)| !items.is_empty())
    .map(|(name, items)| category(name, items))
    .collect();

    PackingList {
        categories,
        notes: DEFAULT_NOTES.iter().map(|n| n.to_string()).collect(),
    }
}
