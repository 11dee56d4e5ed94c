//! Per-field acceptance rules

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::gazetteer;
use crate::domain::{Field, Message, Season, Slot, TripRequest, TripUpdate};
use crate::extract::Candidates;
use crate::geocode::Geocoder;
use crate::temporal::{DateOrder, TemporalInput, TemporalResolver, find_duration, parse_date, parse_duration};

/// Per-turn facts the validator needs besides the candidates
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    /// Today; every date must be strictly after it
    pub reference: NaiveDate,
    /// The user was already asked for an end date
    pub end_asked: bool,
}

/// Field Validator
pub struct FieldValidator {
    resolver: TemporalResolver,
    fuzzy_threshold: f64,
    geocoder: Option<Arc<dyn Geocoder>>,
    geocode_timeout: Duration,
    country_code: String,
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn slot_of<T>(value: Option<T>) -> Slot<T> {
    match value {
        Some(v) => Slot::Set(v),
        None => Slot::Clear,
    }
}

/// Split, trim and lowercase preference entries, dropping empties and repeats
pub fn split_preferences(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.iter().flat_map(|s| s.split([',', ';', '/'])) {
        let item = item.trim().trim_start_matches("and ").trim().to_lowercase();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

impl FieldValidator {
    pub fn new(resolver: TemporalResolver, fuzzy_threshold: f64) -> Self {
        Self {
            resolver,
            fuzzy_threshold,
            geocoder: None,
            geocode_timeout: Duration::from_secs(5),
            country_code: "lk".to_string(),
        }
    }

    /// Fall back to `geocoder` for places the gazetteer does not know
    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>, timeout: Duration, country_code: &str) -> Self {
        self.geocoder = Some(geocoder);
        self.geocode_timeout = timeout;
        self.country_code = country_code.to_lowercase();
        self
    }

    /// Validate `candidates` against `prior` and return the merged trip plus messages
    pub async fn validate(
        &self,
        candidates: &Candidates,
        prior: &TripRequest,
        raw_text: &str,
        ctx: ValidationContext,
    ) -> (TripRequest, Vec<Message>) {
        debug!(?candidates, "FieldValidator::validate: called");
        let mut messages = Vec::new();
        let mut update = TripUpdate::default();

        self.validate_temporal(candidates, prior, raw_text, ctx, &mut update, &mut messages);

        update.destination = self
            .validate_destination(candidates.destination.as_deref(), prior, &mut messages)
            .await;
        update.traveler_count = validate_travelers(candidates.traveler_count.as_deref(), prior, &mut messages);

        if let Some(trip_type) = candidates.trip_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            update.trip_type = Slot::Set(trip_type.to_lowercase());
        }
        if let Some(budget) = candidates.budget.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            update.budget = Slot::Set(budget.to_lowercase());
        }
        let preferences = split_preferences(&candidates.preferences);
        if !preferences.is_empty() {
            update.preferences = Some(preferences);
        }

        let destination_changed = !update.destination.is_keep();
        let start_changed = !update.start_date.is_keep();

        let mut trip = prior.clone();
        trip.merge(update);
        enforce_duration_consistency(&mut trip);

        if (destination_changed || start_changed)
            && let Some(advisory) = monsoon_advisory(&trip)
        {
            messages.push(advisory);
        }

        debug!(?trip, message_count = messages.len(), "FieldValidator::validate: done");
        (trip, messages)
    }

    /// Run the temporal resolver when any temporal value changed this turn
    fn validate_temporal(
        &self,
        candidates: &Candidates,
        prior: &TripRequest,
        raw_text: &str,
        ctx: ValidationContext,
        update: &mut TripUpdate,
        messages: &mut Vec<Message>,
    ) {
        let mut raw_duration = candidates.trip_duration.clone();
        let mut inferred = false;
        if raw_duration.is_none()
            && let Some(days) = inferred_duration(raw_text, candidates)
            && Some(days) != prior.trip_duration_days
        {
            debug!(%days, "validate_temporal: duration inferred from message");
            raw_duration = Some(days.to_string());
            inferred = true;
        }

        let start_changed = candidates
            .start_date
            .as_deref()
            .is_some_and(|raw| parse_date(raw, ctx.reference, DateOrder::DayFirst) != prior.start_date);
        let end_changed = candidates
            .end_date
            .as_deref()
            .is_some_and(|raw| parse_date(raw, ctx.reference, DateOrder::DayFirst) != prior.end_date);
        let duration_changed = raw_duration
            .as_deref()
            .is_some_and(|raw| parse_duration(raw) != prior.trip_duration_days);

        if !(start_changed || end_changed || duration_changed) {
            return;
        }
        debug!(%start_changed, %end_changed, %duration_changed, "validate_temporal: resolving");

        let start = candidates
            .start_date
            .clone()
            .or_else(|| prior.start_date.map(iso));
        // an explicit new end replaces a remembered duration; otherwise a
        // remembered duration recomputes the end
        let duration = if duration_changed {
            raw_duration
        } else if end_changed {
            None
        } else {
            prior.trip_duration_days.map(|d| d.to_string())
        };
        let end = if end_changed {
            candidates.end_date.clone()
        } else if duration.is_some() {
            None
        } else {
            prior.end_date.map(iso)
        };

        let resolution = self.resolver.resolve(
            TemporalInput {
                start: start.as_deref(),
                end: end.as_deref(),
                duration: duration.as_deref(),
            },
            ctx.reference,
            ctx.end_asked,
        );

        if inferred && let Some(days) = resolution.duration {
            messages.push(Message::advisory(
                Some(Field::TripDuration),
                format!("I understood your trip length as {} days.", days),
            ));
        }
        messages.extend(resolution.messages);

        update.start_date = slot_of(resolution.start);
        update.end_date = slot_of(resolution.end);
        // a remembered duration left out of this resolution is realigned afterwards
        update.trip_duration_days = if duration.is_none() && resolution.duration.is_none() {
            Slot::Keep
        } else {
            slot_of(resolution.duration)
        };
    }

    async fn validate_destination(
        &self,
        candidate: Option<&str>,
        prior: &TripRequest,
        messages: &mut Vec<Message>,
    ) -> Slot<String> {
        let Some(raw) = candidate.map(str::trim).filter(|s| !s.is_empty()) else {
            return Slot::Keep;
        };
        if prior.destination.as_deref().is_some_and(|d| d.eq_ignore_ascii_case(raw)) {
            return Slot::Keep;
        }

        if let Some(place) = gazetteer::lookup(raw) {
            return Slot::Set(place.name.to_string());
        }

        if gazetteer::is_country_name(raw) {
            messages.push(Message::followup(
                Field::Destination,
                "Sri Lanka has a lot to offer! Which town or area would you like to base your trip around, \
                 for example Kandy, Galle, Ella or Sigiriya?",
            ));
            return Slot::Keep;
        }

        if let Some((place, score)) = gazetteer::fuzzy_lookup(raw, self.fuzzy_threshold) {
            debug!(%raw, matched = place.name, %score, "validate_destination: fuzzy match");
            messages.push(Message::advisory(
                Some(Field::Destination),
                format!("I took \"{}\" to mean {}.", raw, place.name),
            ));
            return Slot::Set(place.name.to_string());
        }

        if let Some(name) = self.geocode(raw).await {
            return Slot::Set(name);
        }

        messages.push(Message::warning(
            Field::Destination,
            format!(
                "I couldn't find \"{}\" among the places I can plan for in Sri Lanka. \
                 Which Sri Lankan town or area would you like to visit? For example Kandy, Galle, Ella or Sigiriya.",
                raw
            ),
        ));
        Slot::Clear
    }

    async fn geocode(&self, raw: &str) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;
        match tokio::time::timeout(self.geocode_timeout, geocoder.geocode(raw, &self.country_code)).await {
            Ok(Ok(Some(found))) if found.country_code.eq_ignore_ascii_case(&self.country_code) => {
                debug!(%raw, matched = %found.matched_name, "geocode: matched");
                Some(title_case(&found.matched_name))
            }
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, %raw, "Geocoder lookup failed");
                None
            }
            Err(_) => {
                warn!(%raw, "Geocoder lookup timed out");
                None
            }
        }
    }
}

fn validate_travelers(candidate: Option<&str>, prior: &TripRequest, messages: &mut Vec<Message>) -> Slot<u32> {
    let Some(raw) = candidate.map(str::trim).filter(|s| !s.is_empty()) else {
        return Slot::Keep;
    };
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => match u32::try_from(n) {
            Ok(n) if prior.traveler_count == Some(n) => Slot::Keep,
            Ok(n) => Slot::Set(n),
            Err(_) => reject_travelers(raw, messages),
        },
        _ => reject_travelers(raw, messages),
    }
}

fn reject_travelers(raw: &str, messages: &mut Vec<Message>) -> Slot<u32> {
    messages.push(Message::warning(
        Field::TravelerCount,
        format!(
            "\"{}\" isn't a number of travelers I can use. Please tell me how many people are traveling, for example 2.",
            raw
        ),
    ));
    Slot::Clear
}

/// Keep a stated duration equal to the resolved range
fn enforce_duration_consistency(trip: &mut TripRequest) {
    if let (Some(start), Some(end), Some(days)) = (trip.start_date, trip.end_date, trip.trip_duration_days) {
        let span = (end - start).num_days() + 1;
        if span != i64::from(days) {
            debug!(%span, %days, "enforce_duration_consistency: duration follows dates");
            trip.trip_duration_days = u32::try_from(span).ok();
        }
    }
}

fn monsoon_advisory(trip: &TripRequest) -> Option<Message> {
    let destination = trip.destination.as_deref()?;
    if trip.season != Some(Season::SouthwestMonsoon) || !gazetteer::is_monsoon_affected(destination) {
        return None;
    }
    Some(Message::advisory(
        Some(Field::Destination),
        format!(
            "Heads up: {} gets heavy rain during the Southwest Monsoon (May to September). \
             Drier alternatives at that time include {}.",
            destination,
            gazetteer::dry_season_alternatives().join(", ")
        ),
    ))
}

/// A trip length mentioned in the message outside the date phrases
///
/// A date phrase equal to the whole message is a bare answer and is still
/// scanned ("14 oct for a week").
fn inferred_duration(raw_text: &str, candidates: &Candidates) -> Option<u32> {
    let mut text = raw_text.to_lowercase();
    for phrase in [candidates.start_date.as_deref(), candidates.end_date.as_deref()]
        .into_iter()
        .flatten()
    {
        let phrase = phrase.trim().to_lowercase();
        if !phrase.is_empty() && phrase != text.trim() {
            text = text.replace(&phrase, " ");
        }
    }
    find_duration(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageKind;
    use crate::geocode::mock::StaticGeocoder;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx() -> ValidationContext {
        ValidationContext {
            reference: date(2025, 9, 1),
            end_asked: false,
        }
    }

    fn validator() -> FieldValidator {
        FieldValidator::new(TemporalResolver::default(), 0.8)
    }

    fn has(messages: &[Message], kind: MessageKind, field: Field) -> bool {
        messages.iter().any(|m| m.is(kind, field))
    }

    #[tokio::test]
    async fn test_destination_canonicalized() {
        let c = Candidates {
            destination: Some("galle".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator().validate(&c, &TripRequest::default(), "", ctx()).await;
        assert_eq!(trip.destination.as_deref(), Some("Galle"));
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_destination_fuzzy_match_discloses() {
        let c = Candidates {
            destination: Some("Sigirya".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator().validate(&c, &TripRequest::default(), "", ctx()).await;
        assert_eq!(trip.destination.as_deref(), Some("Sigiriya"));
        assert!(has(&messages, MessageKind::Advisory, Field::Destination));
    }

    #[tokio::test]
    async fn test_destination_unknown_is_cleared() {
        let c = Candidates {
            destination: Some("Atlantis".to_string()),
            ..Default::default()
        };
        let prior = TripRequest {
            destination: Some("Kandy".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator().validate(&c, &prior, "", ctx()).await;
        assert_eq!(trip.destination, None);
        let warning = messages.iter().find(|m| m.is(MessageKind::Warning, Field::Destination)).unwrap();
        assert!(warning.text.contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_destination_geocoder_fallback() {
        let geocoder = StaticGeocoder::new(&[("kitulgala", "kitulgala", "lk")]);
        let v = validator().with_geocoder(Arc::new(geocoder), Duration::from_secs(1), "lk");
        let c = Candidates {
            destination: Some("Kitulgala".to_string()),
            ..Default::default()
        };
        let (trip, messages) = v.validate(&c, &TripRequest::default(), "", ctx()).await;
        assert_eq!(trip.destination.as_deref(), Some("Kitulgala"));
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_country_name_asks_for_a_place() {
        let c = Candidates {
            destination: Some("Sri Lanka".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator().validate(&c, &TripRequest::default(), "", ctx()).await;
        assert_eq!(trip.destination, None);
        assert!(has(&messages, MessageKind::Followup, Field::Destination));
    }

    #[tokio::test]
    async fn test_traveler_count_rules() {
        let prior = TripRequest::default();
        let c = Candidates {
            traveler_count: Some("3".to_string()),
            ..Default::default()
        };
        let (trip, _) = validator().validate(&c, &prior, "", ctx()).await;
        assert_eq!(trip.traveler_count, Some(3));

        let c = Candidates {
            traveler_count: Some("lots".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator().validate(&c, &prior, "", ctx()).await;
        assert_eq!(trip.traveler_count, None);
        let warning = messages.iter().find(|m| m.is(MessageKind::Warning, Field::TravelerCount)).unwrap();
        assert!(warning.text.contains("lots"));
    }

    #[tokio::test]
    async fn test_preferences_split() {
        let c = Candidates {
            preferences: vec!["Beach, culture,, ".to_string(), "food".to_string(), "beach".to_string()],
            ..Default::default()
        };
        let (trip, _) = validator().validate(&c, &TripRequest::default(), "", ctx()).await;
        assert_eq!(trip.preferences, vec!["beach", "culture", "food"]);
    }

    #[tokio::test]
    async fn test_duration_then_start_computes_end() {
        let c = Candidates {
            destination: Some("galle".to_string()),
            trip_duration: Some("3 days".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator()
            .validate(&c, &TripRequest::default(), "i want to plan 3 day trip to galle", ctx())
            .await;
        assert_eq!(trip.trip_duration_days, Some(3));
        assert_eq!(trip.start_date, None);
        assert!(messages.is_empty());

        let c = Candidates {
            start_date: Some("2025-10-14".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator().validate(&c, &trip, "2025-10-14", ctx()).await;
        assert_eq!(trip.start_date, Some(date(2025, 10, 14)));
        assert_eq!(trip.end_date, Some(date(2025, 10, 16)));
        assert_eq!(trip.trip_duration_days, Some(3));
        assert!(has(&messages, MessageKind::Advisory, Field::EndDate));
    }

    #[tokio::test]
    async fn test_unchanged_temporal_values_are_silent() {
        let prior = TripRequest {
            start_date: Some(date(2025, 10, 14)),
            end_date: Some(date(2025, 10, 16)),
            trip_duration_days: Some(3),
            season: Season::for_date(date(2025, 10, 14)),
            ..Default::default()
        };
        let c = Candidates::from_trip(&prior);
        let (trip, messages) = validator().validate(&c, &prior, "sounds good", ctx()).await;
        assert_eq!(trip, prior);
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_duration_inferred_from_text() {
        let prior = TripRequest {
            start_date: Some(date(2025, 10, 14)),
            ..Default::default()
        };
        let (trip, messages) = validator()
            .validate(&Candidates::default(), &prior, "make it a week", ctx())
            .await;
        assert_eq!(trip.trip_duration_days, Some(7));
        assert_eq!(trip.end_date, Some(date(2025, 10, 20)));
        assert!(has(&messages, MessageKind::Advisory, Field::TripDuration));
    }

    #[tokio::test]
    async fn test_relative_start_is_not_a_trip_length() {
        let c = Candidates {
            destination: Some("Galle".to_string()),
            start_date: Some("in 10 days".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator()
            .validate(&c, &TripRequest::default(), "I want to visit Galle in 10 days", ctx())
            .await;
        assert_eq!(trip.start_date, Some(date(2025, 9, 11)));
        assert_eq!(trip.trip_duration_days, None);
        assert_eq!(trip.end_date, None);
        assert!(!has(&messages, MessageKind::Advisory, Field::TripDuration));
        assert!(trip.missing_fields().contains(&Field::EndDate));

        let c = Candidates {
            destination: Some("Galle".to_string()),
            ..Default::default()
        };
        let (trip, _) = validator()
            .validate(&c, &TripRequest::default(), "Galle in 2 weeks", ctx())
            .await;
        assert_eq!(trip.trip_duration_days, None);
    }

    #[tokio::test]
    async fn test_extracted_start_phrase_is_not_scanned() {
        let c = Candidates {
            start_date: Some("3 days after new year".to_string()),
            ..Default::default()
        };
        let (trip, _) = validator()
            .validate(&c, &TripRequest::default(), "starting 3 days after new year", ctx())
            .await;
        assert_eq!(trip.trip_duration_days, None);
    }

    #[tokio::test]
    async fn test_new_end_replaces_remembered_duration() {
        let prior = TripRequest {
            start_date: Some(date(2025, 10, 14)),
            end_date: Some(date(2025, 10, 16)),
            trip_duration_days: Some(3),
            ..Default::default()
        };
        let c = Candidates {
            end_date: Some("2025-10-18".to_string()),
            ..Default::default()
        };
        let (trip, _) = validator().validate(&c, &prior, "end on the 18th", ctx()).await;
        assert_eq!(trip.end_date, Some(date(2025, 10, 18)));
        assert_eq!(trip.trip_duration_days, Some(5));
    }

    #[tokio::test]
    async fn test_past_start_cleared_with_warning() {
        let c = Candidates {
            start_date: Some("2025-08-10".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator().validate(&c, &TripRequest::default(), "", ctx()).await;
        assert_eq!(trip.start_date, None);
        assert!(has(&messages, MessageKind::Warning, Field::StartDate));
    }

    #[tokio::test]
    async fn test_monsoon_advisory() {
        let c = Candidates {
            destination: Some("Galle".to_string()),
            start_date: Some("2026-06-10".to_string()),
            end_date: Some("2026-06-12".to_string()),
            ..Default::default()
        };
        let (trip, messages) = validator().validate(&c, &TripRequest::default(), "", ctx()).await;
        assert_eq!(trip.season, Some(Season::SouthwestMonsoon));
        let advisory = messages.iter().find(|m| m.is(MessageKind::Advisory, Field::Destination)).unwrap();
        assert!(advisory.text.contains("Trincomalee"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("kitulgala falls"), "Kitulgala Falls");
        assert_eq!(title_case("NUWARA eliya"), "Nuwara Eliya");
    }
}
