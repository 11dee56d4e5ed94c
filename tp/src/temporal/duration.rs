//! Trip length parsing ("2 weeks", "five-day", "7d")

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static SPELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|a|an)\s*-?\s*(day|week|month|night)s?\b")
        .expect("valid regex")
});

// "in 10 days", "in a month", "3 weeks from now": when the trip starts, not how long it lasts
static RELATIVE_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bin\s+(?:\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|a|an)\s*(?:day|week|month|fortnight)s?(?:'?\s*time)?\b|\b(?:\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|a|an)\s*(?:day|week|month|fortnight)s?\s+(?:from now|from today|later|away)\b",
    )
    .expect("valid regex")
});

static COMPACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,3})\s?(d|w|m)\b").expect("valid regex"));

const DAYS_PER_WEEK: u32 = 7;
const DAYS_PER_MONTH: u32 = 30;

fn number(word: &str) -> Option<u32> {
    match word {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        digits => digits.parse().ok(),
    }
}

fn to_days(count: u32, unit: &str) -> Option<u32> {
    let days = match unit {
        "day" | "d" => count,
        // three nights cover four calendar days
        "night" => count + 1,
        "week" | "w" => count * DAYS_PER_WEEK,
        "month" | "m" => count * DAYS_PER_MONTH,
        _ => return None,
    };
    (days > 0).then_some(days)
}

/// Find a trip length mentioned anywhere in free text
///
/// Bare numbers are ignored here; they are too ambiguous inside a sentence.
/// Offsets to the start date ("in 2 weeks") are not trip lengths.
pub fn find_duration(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    let lowered = RELATIVE_OFFSET.replace_all(&lowered, " ");
    if lowered.contains("fortnight") {
        return Some(14);
    }
    if lowered.contains("weekend") {
        return Some(2);
    }
    if let Some(caps) = SPELLED.captures(&lowered) {
        let count = number(&caps[1])?;
        return to_days(count, &caps[2]);
    }
    if let Some(caps) = COMPACT.captures(&lowered) {
        let count: u32 = caps[1].parse().ok()?;
        return to_days(count, &caps[2]);
    }
    None
}

/// Parse a duration field value into days
///
/// A bare number counts as days. Zero or unparsable input yields `None`.
pub fn parse_duration(raw: &str) -> Option<u32> {
    debug!(%raw, "parse_duration: called");
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse::<u32>().ok().filter(|d| *d > 0);
    }
    find_duration(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(parse_duration("5 days"), Some(5));
        assert_eq!(parse_duration("2 weeks"), Some(14));
        assert_eq!(parse_duration("1 month"), Some(30));
        assert_eq!(parse_duration("3 nights"), Some(4));
    }

    #[test]
    fn test_spelled_and_hyphenated() {
        assert_eq!(parse_duration("two-day"), Some(2));
        assert_eq!(parse_duration("a week"), Some(7));
        assert_eq!(parse_duration("Ten Days"), Some(10));
        assert_eq!(parse_duration("a fortnight"), Some(14));
    }

    #[test]
    fn test_compact_and_bare() {
        assert_eq!(parse_duration("7d"), Some(7));
        assert_eq!(parse_duration("2w"), Some(14));
        assert_eq!(parse_duration("4"), Some(4));
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("0 days"), None);
    }

    #[test]
    fn test_unparsable() {
        assert_eq!(parse_duration("a while"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_find_in_sentence() {
        assert_eq!(find_duration("i want to plan 3 day trip to galle"), Some(3));
        assert_eq!(find_duration("we have 4 people"), None);
        assert_eq!(find_duration("2025-10-14"), None);
    }

    #[test]
    fn test_start_offsets_are_not_lengths() {
        assert_eq!(find_duration("i want to visit galle in 10 days"), None);
        assert_eq!(find_duration("leaving in 2 weeks"), None);
        assert_eq!(find_duration("in a month"), None);
        assert_eq!(find_duration("in 10 days' time"), None);
        assert_eq!(find_duration("three weeks from now"), None);
        assert_eq!(find_duration("5 days starting in 2 weeks"), Some(5));
        assert_eq!(find_duration("a week, leaving in a fortnight"), Some(7));
    }
}
