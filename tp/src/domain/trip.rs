//! TripRequest - the slot-filled record owned by one conversation

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::Message;

/// A trip attribute the dialogue can ask about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Destination,
    StartDate,
    EndDate,
    TripDuration,
    TravelerCount,
    TripType,
    Budget,
    Preferences,
}

impl Field {
    /// Mandatory fields in the order they are asked
    pub const MANDATORY: [Field; 6] = [
        Field::Destination,
        Field::StartDate,
        Field::EndDate,
        Field::TravelerCount,
        Field::TripType,
        Field::Preferences,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Destination => "destination",
            Field::StartDate => "start_date",
            Field::EndDate => "end_date",
            Field::TripDuration => "trip_duration",
            Field::TravelerCount => "traveler_count",
            Field::TripType => "trip_type",
            Field::Budget => "budget",
            Field::Preferences => "preferences",
        }
    }

    /// Human wording used inside messages
    pub fn label(&self) -> &'static str {
        match self {
            Field::Destination => "destination",
            Field::StartDate => "start date",
            Field::EndDate => "end date",
            Field::TripDuration => "trip length",
            Field::TravelerCount => "number of travelers",
            Field::TripType => "trip type",
            Field::Budget => "budget",
            Field::Preferences => "preferences",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named climate regime for Sri Lanka
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// May - September, wet on the south-west coast and hill country
    SouthwestMonsoon,
    /// October - January, wet in the north and east
    NortheastMonsoon,
    /// February - April
    InterMonsoon,
}

impl Season {
    /// Fixed month table
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            5..=9 => Some(Season::SouthwestMonsoon),
            10..=12 | 1 => Some(Season::NortheastMonsoon),
            2..=4 => Some(Season::InterMonsoon),
            _ => None,
        }
    }

    pub fn for_date(date: NaiveDate) -> Option<Self> {
        Self::from_month(date.month())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Season::SouthwestMonsoon => "Southwest Monsoon",
            Season::NortheastMonsoon => "Northeast Monsoon",
            Season::InterMonsoon => "Inter-monsoon",
        }
    }

    pub fn is_monsoon(&self) -> bool {
        !matches!(self, Season::InterMonsoon)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Dialogue status of a trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    AwaitingInput,
    Complete,
}

/// The accumulating trip record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripRequest {
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub trip_duration_days: Option<u32>,
    pub traveler_count: Option<u32>,
    pub trip_type: Option<String>,
    pub budget: Option<String>,
    pub preferences: Vec<String>,
    pub season: Option<Season>,
    pub status: TripStatus,
    pub pending_messages: Vec<Message>,
}

/// One field change produced by validation
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Slot<T> {
    /// Leave the current value alone
    #[default]
    Keep,
    /// Replace the current value
    Set(T),
    /// Clear the current value (only ever paired with a user-facing message)
    Clear,
}

impl<T> Slot<T> {
    fn apply(self, target: &mut Option<T>) {
        match self {
            Slot::Keep => {}
            Slot::Set(value) => *target = Some(value),
            Slot::Clear => *target = None,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Slot::Keep)
    }
}

/// Validated changes for one turn, applied through [`TripRequest::merge`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripUpdate {
    pub destination: Slot<String>,
    pub start_date: Slot<NaiveDate>,
    pub end_date: Slot<NaiveDate>,
    pub trip_duration_days: Slot<u32>,
    pub traveler_count: Slot<u32>,
    pub trip_type: Slot<String>,
    pub budget: Slot<String>,
    /// Replaces the whole list when non-empty
    pub preferences: Option<Vec<String>>,
}

impl TripRequest {
    /// Apply a validated update
    ///
    /// New values override old ones, `Keep` never erases anything, and only an
    /// explicit `Clear` removes a value. The season is recomputed from the
    /// resulting start date.
    pub fn merge(&mut self, update: TripUpdate) {
        debug!(?update, "TripRequest::merge: called");
        update.destination.apply(&mut self.destination);
        update.start_date.apply(&mut self.start_date);
        update.end_date.apply(&mut self.end_date);
        update.trip_duration_days.apply(&mut self.trip_duration_days);
        update.traveler_count.apply(&mut self.traveler_count);
        update.trip_type.apply(&mut self.trip_type);
        update.budget.apply(&mut self.budget);
        if let Some(preferences) = update.preferences
            && !preferences.is_empty()
        {
            self.preferences = preferences;
        }
        self.season = self.start_date.and_then(Season::for_date);
    }

    /// Mandatory fields still missing, highest priority first
    ///
    /// The end date counts as present when a duration is known and the start
    /// date is not; once a start date exists the end date must be concrete.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::MANDATORY
            .into_iter()
            .filter(|field| match field {
                Field::Destination => self.destination.is_none(),
                Field::StartDate => self.start_date.is_none(),
                Field::EndDate => {
                    self.end_date.is_none() && !(self.trip_duration_days.is_some() && self.start_date.is_none())
                }
                Field::TravelerCount => self.traveler_count.is_none(),
                Field::TripType => self.trip_type.is_none(),
                Field::Preferences => self.preferences.is_empty(),
                _ => false,
            })
            .collect()
    }

    /// Every mandatory field holds a value
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty() && self.end_date.is_some()
    }

    /// Whether anything at all has been collected
    pub fn has_any_field(&self) -> bool {
        self.destination.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
            || self.trip_duration_days.is_some()
            || self.traveler_count.is_some()
            || self.trip_type.is_some()
            || self.budget.is_some()
            || !self.preferences.is_empty()
    }

    /// Inclusive day count of the resolved date range
    pub fn day_count(&self) -> Option<u32> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end >= start => Some((end - start).num_days() as u32 + 1),
            _ => self.trip_duration_days,
        }
    }

    /// Every date of the trip, in order
    pub fn dates(&self) -> Vec<NaiveDate> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end >= start => start.iter_days().take_while(|d| *d <= end).collect(),
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn complete_trip() -> TripRequest {
        TripRequest {
            destination: Some("Galle".to_string()),
            start_date: Some(date(2030, 3, 1)),
            end_date: Some(date(2030, 3, 3)),
            trip_duration_days: Some(3),
            traveler_count: Some(2),
            trip_type: Some("leisure".to_string()),
            preferences: vec!["beach".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_season_table() {
        assert_eq!(Season::from_month(5), Some(Season::SouthwestMonsoon));
        assert_eq!(Season::from_month(9), Some(Season::SouthwestMonsoon));
        assert_eq!(Season::from_month(10), Some(Season::NortheastMonsoon));
        assert_eq!(Season::from_month(1), Some(Season::NortheastMonsoon));
        assert_eq!(Season::from_month(3), Some(Season::InterMonsoon));
        assert_eq!(Season::from_month(13), None);
        assert_eq!(Season::SouthwestMonsoon.to_string(), "Southwest Monsoon");
    }

    #[test]
    fn test_missing_fields_priority() {
        let trip = TripRequest::default();
        assert_eq!(trip.missing_fields(), Field::MANDATORY.to_vec());
        assert!(!trip.is_complete());
    }

    #[test]
    fn test_duration_satisfies_end_until_start_known() {
        let trip = TripRequest {
            destination: Some("Galle".to_string()),
            trip_duration_days: Some(3),
            ..Default::default()
        };
        let missing = trip.missing_fields();
        assert_eq!(missing.first(), Some(&Field::StartDate));
        assert!(!missing.contains(&Field::EndDate));
    }

    #[test]
    fn test_complete_trip() {
        let trip = complete_trip();
        assert!(trip.missing_fields().is_empty());
        assert!(trip.is_complete());
        assert_eq!(trip.day_count(), Some(3));
        assert_eq!(trip.dates().len(), 3);
    }

    #[test]
    fn test_merge_set_and_clear() {
        let mut trip = complete_trip();
        trip.merge(TripUpdate {
            start_date: Slot::Set(date(2030, 6, 10)),
            end_date: Slot::Set(date(2030, 6, 12)),
            traveler_count: Slot::Clear,
            preferences: Some(vec!["food".to_string(), "culture".to_string()]),
            ..Default::default()
        });
        assert_eq!(trip.start_date, Some(date(2030, 6, 10)));
        assert_eq!(trip.season, Some(Season::SouthwestMonsoon));
        assert_eq!(trip.traveler_count, None);
        assert_eq!(trip.preferences, vec!["food", "culture"]);
        assert_eq!(trip.destination.as_deref(), Some("Galle"));
    }

    #[test]
    fn test_merge_empty_preferences_keeps_existing() {
        let mut trip = complete_trip();
        trip.merge(TripUpdate {
            preferences: Some(vec![]),
            ..Default::default()
        });
        assert_eq!(trip.preferences, vec!["beach"]);
    }

    #[test]
    fn test_season_cleared_with_start() {
        let mut trip = complete_trip();
        trip.merge(TripUpdate::default());
        assert_eq!(trip.season, Some(Season::InterMonsoon));
        trip.merge(TripUpdate {
            start_date: Slot::Clear,
            ..Default::default()
        });
        assert_eq!(trip.season, None);
    }

    proptest! {
        #[test]
        fn prop_keep_update_never_erases(
            dest in proptest::option::of("[A-Z][a-z]{2,10}"),
            travelers in proptest::option::of(1u32..20),
            duration in proptest::option::of(1u32..30),
            trip_type in proptest::option::of("[a-z]{4,9}"),
            prefs in proptest::collection::vec("[a-z]{3,8}", 0..4),
        ) {
            let mut trip = TripRequest {
                destination: dest,
                traveler_count: travelers,
                trip_duration_days: duration,
                trip_type,
                preferences: prefs,
                ..Default::default()
            };
            let before = trip.clone();
            trip.merge(TripUpdate::default());
            prop_assert_eq!(trip, before);
        }
    }
}
