//! Permissive calendar date parsing

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use tracing::debug;

static ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})\b").expect("valid regex"));

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[-/.](\d{1,2})(?:[-/.](\d{4}|\d{2}))?\b").expect("valid regex"));

static DAY_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}) (?:of )?([a-z]{3,9})\b(?: (\d{4}))?").expect("valid regex"));

static MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([a-z]{3,9}) (\d{1,2})\b(?: (\d{4}))?").expect("valid regex"));

static ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})(?:st|nd|rd|th)\b").expect("valid regex"));

static IN_DAYS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bin (\d{1,3}) days?\b").expect("valid regex"));

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Which number comes first in an all-numeric date like `05/10/2025`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    DayFirst,
    MonthFirst,
}

impl DateOrder {
    pub fn opposite(self) -> Self {
        match self {
            DateOrder::DayFirst => DateOrder::MonthFirst,
            DateOrder::MonthFirst => DateOrder::DayFirst,
        }
    }
}

/// Month number for a full or abbreviated month name
fn month_number(word: &str) -> Option<u32> {
    if word.len() < 3 {
        return None;
    }
    if word == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(word))
        .map(|i| i as u32 + 1)
}

fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace(',', " ");
    let unordinal = ORDINAL.replace_all(&lowered, "$1");
    unordinal.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn expand_year(year: Option<&str>) -> Option<i32> {
    let year = year?;
    let value: i32 = year.parse().ok()?;
    Some(if year.len() == 2 { 2000 + value } else { value })
}

/// Build a date; a missing year means the next occurrence on or after `reference`
fn assemble(year: Option<i32>, month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    match year {
        Some(y) => NaiveDate::from_ymd_opt(y, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(reference.year(), month, day);
            match this_year {
                Some(d) if d >= reference => Some(d),
                _ => NaiveDate::from_ymd_opt(reference.year() + 1, month, day),
            }
        }
    }
}

/// Parse a free-form date expression
///
/// Tries relative words, ISO `YYYY-MM-DD`, all-numeric dates in the preferred
/// order (then the other order when the preferred one is not a real date), and
/// month-name forms. Returns `None` rather than guessing.
pub fn parse_date(raw: &str, reference: NaiveDate, order: DateOrder) -> Option<NaiveDate> {
    debug!(%raw, %reference, ?order, "parse_date: called");
    let text = normalize(raw);
    if text.is_empty() {
        return None;
    }

    if text.contains("day after tomorrow") {
        return Some(reference + Duration::days(2));
    }
    if text.contains("tomorrow") {
        return Some(reference + Duration::days(1));
    }
    if text.contains("today") {
        return Some(reference);
    }
    if text.contains("next week") {
        return Some(reference + Duration::days(7));
    }
    if let Some(caps) = IN_DAYS.captures(&text) {
        let days: i64 = caps[1].parse().ok()?;
        return Some(reference + Duration::days(days));
    }

    if let Some(caps) = ISO.captures(&text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = NUMERIC.captures(&text) {
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        let year = expand_year(caps.get(3).map(|m| m.as_str()));
        let (first, second) = match order {
            DateOrder::DayFirst => ((b, a), (a, b)),
            DateOrder::MonthFirst => ((a, b), (b, a)),
        };
        return assemble(year, first.0, first.1, reference).or_else(|| assemble(year, second.0, second.1, reference));
    }

    // numbers before the date ("for 2 people") must not hide it
    let day_month = DAY_MONTH.captures_iter(&text).find_map(|caps| {
        let month = month_number(&caps[2])?;
        let day: u32 = caps[1].parse().ok()?;
        Some((expand_year(caps.get(3).map(|m| m.as_str())), month, day))
    });
    let month_day = || {
        MONTH_DAY.captures_iter(&text).find_map(|caps| {
            let month = month_number(&caps[1])?;
            let day: u32 = caps[2].parse().ok()?;
            Some((expand_year(caps.get(3).map(|m| m.as_str())), month, day))
        })
    };
    if let Some((year, month, day)) = day_month.or_else(month_day) {
        return assemble(year, month, day, reference);
    }

    debug!(%raw, "parse_date: no format matched");
    None
}

/// Long human form, e.g. `October 16, 2025`
pub fn format_long(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}
