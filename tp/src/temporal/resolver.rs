//! Reconciles start date, end date and trip length into one consistent range

use chrono::{Duration, Months, NaiveDate};
use tracing::debug;

use super::date::{DateOrder, format_long, parse_date};
use super::duration::parse_duration;
use crate::domain::{Field, Message, Season};

/// Bounds applied to every resolved range
#[derive(Debug, Clone, Copy)]
pub struct TemporalLimits {
    pub max_trip_days: u32,
    pub max_future_years: u32,
}

impl Default for TemporalLimits {
    fn default() -> Self {
        Self {
            max_trip_days: 60,
            max_future_years: 2,
        }
    }
}

/// Raw, unvalidated temporal values for one turn
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalInput<'a> {
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub duration: Option<&'a str>,
}

/// Outcome of one resolution: the authoritative temporal fields plus messages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub duration: Option<u32>,
    pub season: Option<Season>,
    pub messages: Vec<Message>,
}

/// Temporal Resolver
#[derive(Debug, Clone)]
pub struct TemporalResolver {
    limits: TemporalLimits,
    order: DateOrder,
}

impl Default for TemporalResolver {
    fn default() -> Self {
        Self::new(TemporalLimits::default())
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Inclusive number of days from `start` to `end`
fn span_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

impl TemporalResolver {
    pub fn new(limits: TemporalLimits) -> Self {
        Self {
            limits,
            order: DateOrder::DayFirst,
        }
    }

    fn parse_field(&self, raw: Option<&str>, field: Field, reference: NaiveDate, messages: &mut Vec<Message>) -> Option<NaiveDate> {
        let raw = non_empty(raw)?;
        let parsed = parse_date(raw, reference, self.order);
        if parsed.is_none() {
            messages.push(Message::warning(
                field,
                format!(
                    "I couldn't read \"{}\" as a {}. Please use a date like 2025-10-14 or 14 October 2025.",
                    raw,
                    field.label()
                ),
            ));
        }
        parsed
    }

    /// Null a date that is not strictly in the future or beyond the planning horizon
    fn check_window(
        &self,
        date: Option<NaiveDate>,
        field: Field,
        reference: NaiveDate,
        messages: &mut Vec<Message>,
    ) -> Option<NaiveDate> {
        let date = date?;
        if date <= reference {
            debug!(%date, %reference, %field, "check_window: not in the future");
            messages.push(Message::warning(
                field,
                format!(
                    "The provided {} ({}) is in the past or today. Please choose a future date.",
                    field.label(),
                    format_long(date)
                ),
            ));
            return None;
        }
        let horizon = reference
            .checked_add_months(Months::new(12 * self.limits.max_future_years))
            .unwrap_or(NaiveDate::MAX);
        if date > horizon {
            debug!(%date, %horizon, %field, "check_window: beyond horizon");
            messages.push(Message::warning(
                field,
                format!(
                    "The {} ({}) is more than {} years away. Please choose a date before {}.",
                    field.label(),
                    format_long(date),
                    self.limits.max_future_years,
                    format_long(horizon)
                ),
            ));
            return None;
        }
        Some(date)
    }

    /// Resolve raw temporal values against `reference` (today)
    ///
    /// `end_asked` tells whether the user was ever asked for an end date; a
    /// computed end date is only offered for confirmation when they were not.
    pub fn resolve(&self, input: TemporalInput<'_>, reference: NaiveDate, end_asked: bool) -> Resolution {
        debug!(?input, %reference, %end_asked, "resolve: called");
        let mut messages = Vec::new();

        let mut start = self.parse_field(input.start, Field::StartDate, reference, &mut messages);
        let mut end = self.parse_field(input.end, Field::EndDate, reference, &mut messages);

        let mut duration = match non_empty(input.duration) {
            Some(raw) => match parse_duration(raw) {
                Some(days) if days > self.limits.max_trip_days => {
                    messages.push(Message::warning(
                        Field::TripDuration,
                        format!(
                            "Trips can be at most {} days long, but you asked for {} days. How long would you like to stay?",
                            self.limits.max_trip_days, days
                        ),
                    ));
                    None
                }
                Some(days) => Some(days),
                None => {
                    messages.push(Message::warning(
                        Field::TripDuration,
                        format!("I couldn't work out a trip length from \"{}\".", raw),
                    ));
                    None
                }
            },
            None => None,
        };

        // An end before the start is often a day/month mix-up
        if let (Some(s), Some(e)) = (start, end)
            && e < s
        {
            let reparsed = non_empty(input.end).and_then(|raw| parse_date(raw, reference, self.order.opposite()));
            match reparsed {
                Some(candidate) if candidate >= s => {
                    debug!(%candidate, "resolve: end date reparsed with opposite order");
                    end = Some(candidate);
                }
                _ => {
                    messages.push(Message::warning(
                        Field::EndDate,
                        format!(
                            "The end date ({}) cannot be before the start date ({}). Please provide a valid end date.",
                            format_long(e),
                            format_long(s)
                        ),
                    ));
                    end = None;
                }
            }
        }

        start = self.check_window(start, Field::StartDate, reference, &mut messages);
        end = self.check_window(end, Field::EndDate, reference, &mut messages);

        if let Some(s) = start
            && let Some(days) = duration
        {
            let computed = s + Duration::days(i64::from(days) - 1);
            match end {
                None => {
                    let checked = self.check_window(Some(computed), Field::EndDate, reference, &mut messages);
                    match checked {
                        Some(computed) => {
                            messages.push(Message::advisory(
                                Some(Field::EndDate),
                                format!(
                                    "I calculated {} as the end date based on your {}-day trip starting on {}.",
                                    format_long(computed),
                                    days,
                                    format_long(s)
                                ),
                            ));
                            if !end_asked {
                                messages.push(Message::followup(
                                    Field::EndDate,
                                    format!(
                                        "Is {} the right end date? Tell me another date if not.",
                                        format_long(computed)
                                    ),
                                ));
                            }
                            end = Some(computed);
                        }
                        None => {
                            duration = None;
                        }
                    }
                }
                Some(e) if e != computed => {
                    messages.push(Message::advisory(
                        Some(Field::EndDate),
                        format!(
                            "Your dates {} to {} span {} days, but you asked for a {}-day trip, so I moved the end date to {}.",
                            format_long(s),
                            format_long(e),
                            span_days(s, e),
                            days,
                            format_long(computed)
                        ),
                    ));
                    end = self.check_window(Some(computed), Field::EndDate, reference, &mut messages);
                    if end.is_none() {
                        duration = None;
                    }
                }
                Some(_) => {}
            }
        }

        if duration.is_none()
            && let (Some(s), Some(e)) = (start, end)
            && span_days(s, e) > i64::from(self.limits.max_trip_days)
        {
            messages.push(Message::warning(
                Field::EndDate,
                format!(
                    "Trips can be at most {} days long, but {} to {} is {} days. Please choose an earlier end date.",
                    self.limits.max_trip_days,
                    format_long(s),
                    format_long(e),
                    span_days(s, e)
                ),
            ));
            end = None;
        }

        Resolution {
            start,
            end,
            duration,
            season: start.and_then(Season::for_date),
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageKind;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reference() -> NaiveDate {
        date(2025, 9, 1)
    }

    fn resolve(start: Option<&str>, end: Option<&str>, duration: Option<&str>) -> Resolution {
        TemporalResolver::default().resolve(TemporalInput { start, end, duration }, reference(), false)
    }

    #[test]
    fn test_end_computed_from_duration() {
        let r = resolve(Some("2025-10-14"), None, Some("3 days"));
        assert_eq!(r.start, Some(date(2025, 10, 14)));
        assert_eq!(r.end, Some(date(2025, 10, 16)));
        assert_eq!(r.duration, Some(3));
        assert_eq!(r.season, Some(Season::NortheastMonsoon));
        assert!(
            r.messages
                .iter()
                .any(|m| m.is(MessageKind::Advisory, Field::EndDate) && m.text.contains("October 16, 2025"))
        );
        assert!(r.messages.iter().any(|m| m.is(MessageKind::Followup, Field::EndDate)));
    }

    #[test]
    fn test_no_confirmation_when_end_was_asked() {
        let r = TemporalResolver::default().resolve(
            TemporalInput {
                start: Some("2025-10-14"),
                end: None,
                duration: Some("3"),
            },
            reference(),
            true,
        );
        assert_eq!(r.end, Some(date(2025, 10, 16)));
        assert!(!r.messages.iter().any(|m| m.kind == MessageKind::Followup));
    }

    #[test]
    fn test_duration_wins_conflict() {
        let r = resolve(Some("2025-10-14"), Some("2025-10-20"), Some("3 days"));
        assert_eq!(r.end, Some(date(2025, 10, 16)));
        let advisory = r
            .messages
            .iter()
            .find(|m| m.is(MessageKind::Advisory, Field::EndDate))
            .unwrap();
        assert!(advisory.text.contains("7 days"));
        assert!(advisory.text.contains("October 16, 2025"));
    }

    #[test]
    fn test_consistent_range_is_silent() {
        let r = resolve(Some("2025-10-14"), Some("2025-10-16"), Some("3 days"));
        assert_eq!(r.end, Some(date(2025, 10, 16)));
        assert!(r.messages.is_empty());
    }

    #[test]
    fn test_past_start_rejected() {
        let r = resolve(Some("2025-08-01"), None, Some("3 days"));
        assert_eq!(r.start, None);
        assert_eq!(r.end, None);
        assert_eq!(r.season, None);
        assert_eq!(r.duration, Some(3));
        assert!(r.messages.iter().any(|m| m.is(MessageKind::Warning, Field::StartDate)));
    }

    #[test]
    fn test_today_is_not_future() {
        let r = resolve(Some("2025-09-01"), None, None);
        assert_eq!(r.start, None);
    }

    #[test]
    fn test_end_before_start_reparsed_with_opposite_order() {
        // day-first reads 04/03 as 4 March, before the start; month-first gives 3 April
        let r = resolve(Some("2026-03-20"), Some("04/03/2026"), None);
        assert_eq!(r.end, Some(date(2026, 4, 3)));
    }

    #[test]
    fn test_end_before_start_unrecoverable() {
        let r = resolve(Some("2025-10-20"), Some("2025-10-10"), None);
        assert_eq!(r.start, Some(date(2025, 10, 20)));
        assert_eq!(r.end, None);
        assert!(r.messages.iter().any(|m| m.is(MessageKind::Warning, Field::EndDate)));
    }

    #[test]
    fn test_unparsable_values_null_without_guessing() {
        let r = resolve(Some("sometime soon"), None, Some("a while"));
        assert_eq!(r.start, None);
        assert_eq!(r.duration, None);
        assert!(r.messages.iter().any(|m| m.is(MessageKind::Warning, Field::StartDate)));
        assert!(r.messages.iter().any(|m| m.is(MessageKind::Warning, Field::TripDuration)));
    }

    #[test]
    fn test_too_long_duration() {
        let r = resolve(Some("2025-10-14"), None, Some("3 months"));
        assert_eq!(r.duration, None);
        assert_eq!(r.end, None);
        assert!(r.messages.iter().any(|m| m.is(MessageKind::Warning, Field::TripDuration)));
    }

    #[test]
    fn test_beyond_horizon() {
        let r = resolve(Some("2031-01-01"), None, None);
        assert_eq!(r.start, None);
        assert!(r.messages[0].text.contains("years away"));
    }

    #[test]
    fn test_season_needs_start() {
        let r = resolve(None, Some("2025-10-16"), Some("3 days"));
        assert_eq!(r.season, None);
        assert_eq!(r.end, Some(date(2025, 10, 16)));
    }

    proptest! {
        #[test]
        fn prop_end_is_start_plus_duration_minus_one(offset in 1i64..600, days in 1u32..=60) {
            let start = reference() + Duration::days(offset);
            let raw = start.format("%Y-%m-%d").to_string();
            let raw_days = days.to_string();
            let r = resolve(Some(&raw), None, Some(&raw_days));
            let expected = start + Duration::days(i64::from(days) - 1);
            if expected <= reference().checked_add_months(Months::new(24)).unwrap() {
                prop_assert_eq!(r.end, Some(expected));
                prop_assert_eq!(r.duration, Some(days));
            }
        }

        #[test]
        fn prop_duration_wins_over_conflicting_end(offset in 1i64..300, days in 1u32..=30, skew in 1i64..20) {
            let start = reference() + Duration::days(offset);
            let wrong_end = start + Duration::days(i64::from(days) - 1 + skew);
            let raw_start = start.format("%Y-%m-%d").to_string();
            let raw_end = wrong_end.format("%Y-%m-%d").to_string();
            let raw_days = format!("{} days", days);
            let r = resolve(Some(&raw_start), Some(&raw_end), Some(&raw_days));
            prop_assert_eq!(r.end, Some(start + Duration::days(i64::from(days) - 1)));
            prop_assert!(r.messages.iter().any(|m| m.is(MessageKind::Advisory, Field::EndDate)));
        }

        #[test]
        fn prop_past_dates_rejected_idempotently(back in 0i64..2000) {
            let past = reference() - Duration::days(back);
            let raw = past.format("%Y-%m-%d").to_string();
            let first = resolve(Some(&raw), None, None);
            let second = resolve(Some(&raw), None, None);
            prop_assert_eq!(first.start, None);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.messages.iter().filter(|m| m.field == Some(Field::StartDate)).count(), 1);
        }
    }
}
