//! Local traveler-count parsing
//!
//! Used when the model's value is missing or not a positive number.

use std::sync::LazyLock;

use regex::Regex;

static ONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(solo|single|alone|just me|by myself|only me)\b").expect("valid regex"));

static TWO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(couple|dual|two people|two of us|two persons|me and my (wife|husband|partner|girlfriend|boyfriend))\b")
        .expect("valid regex")
});

/// "4 people", "three of us", "5 pax"
static COUNTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,3}|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s+(people|persons|pax|adults|guests|travell?ers|friends|of us)\b",
    )
    .expect("valid regex")
});

/// Date and trip-length spans whose numbers are not head counts
static NOT_TRAVELERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b\d{4}[-/.]\d{1,2}[-/.]\d{1,2}\b",
        r"|\b\d{1,2}[-/.]\d{1,2}(?:[-/.]\d{2,4})?\b",
        r"|\b\d{1,2}(?:st|nd|rd|th)?\s+(?:of\s+)?(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*(?:\s+\d{4})?",
        r"|\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s+\d{1,2}(?:st|nd|rd|th)?(?:,?\s+\d{4})?",
        r"|\b\d{4}\b",
        r"|\bin\s+\d{1,3}\s+days?\b",
        r"|\b\d{1,3}\s*-?\s*(?:days?|weeks?|months?|nights?|d|w|m)\b",
        r"|\b\d+(?:\.\d+)?\s*(?:k\b|usd\b|lkr\b|rs\b|dollars?\b|rupees?\b|\$)",
    ))
    .expect("valid regex")
});

static FREE_INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,3})\b").expect("valid regex"));

fn word_number(word: &str) -> Option<u32> {
    let n = match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => digits.parse().ok()?,
    };
    Some(n)
}

/// Read a traveler count out of free text
pub fn parse_travelers(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    if let Some(caps) = COUNTED.captures(&lowered) {
        return word_number(&caps[1]).filter(|n| *n > 0);
    }
    if ONE.is_match(&lowered) {
        return Some(1);
    }
    if TWO.is_match(&lowered) {
        return Some(2);
    }
    let stripped = NOT_TRAVELERS.replace_all(&lowered, " ");
    FREE_INT
        .captures(&stripped)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// A model-supplied count is reliable when it is a positive integer
pub fn reliable_count(value: &str) -> Option<u32> {
    value.trim().parse::<i64>().ok().filter(|n| *n > 0).and_then(|n| u32::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(parse_travelers("I'm travelling solo"), Some(1));
        assert_eq!(parse_travelers("single traveler"), Some(1));
        assert_eq!(parse_travelers("we are a couple"), Some(2));
        assert_eq!(parse_travelers("dual"), Some(2));
        assert_eq!(parse_travelers("two people"), Some(2));
    }

    #[test]
    fn test_counted_phrases() {
        assert_eq!(parse_travelers("three of us"), Some(3));
        assert_eq!(parse_travelers("5 pax"), Some(5));
        assert_eq!(parse_travelers("a family of 4 people"), Some(4));
    }

    #[test]
    fn test_free_integer() {
        assert_eq!(parse_travelers("4"), Some(4));
        assert_eq!(parse_travelers("we will be 6"), Some(6));
    }

    #[test]
    fn test_ignores_dates_and_durations() {
        assert_eq!(parse_travelers("i want to plan 3 day trip to galle"), None);
        assert_eq!(parse_travelers("2025-10-14"), None);
        assert_eq!(parse_travelers("from 14 Oct 2025 for 2 weeks"), None);
        assert_eq!(parse_travelers("leaving 14/10 with 3 friends"), Some(3));
        assert_eq!(parse_travelers("budget 500 usd, 2 travelers"), Some(2));
    }

    #[test]
    fn test_non_positive() {
        assert_eq!(parse_travelers("0"), None);
        assert_eq!(parse_travelers("nobody"), None);
    }

    #[test]
    fn test_reliable_count() {
        assert_eq!(reliable_count("3"), Some(3));
        assert_eq!(reliable_count(" 2 "), Some(2));
        assert_eq!(reliable_count("0"), None);
        assert_eq!(reliable_count("-1"), None);
        assert_eq!(reliable_count("a couple"), None);
    }
}
