//! Summary stage: markdown rendering, polish, and later refinement

use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::location::DISCLAIMER;
use super::{StageDeps, StageError};
use crate::domain::{DayPlan, LocationRecommendation, PackingList, StageReport, TripRequest};

fn or_unset(value: Option<String>) -> String {
    value.unwrap_or_else(|| "not specified".to_string())
}

/// Render the structured plan as markdown
///
/// Pure over its inputs, so the same plan always renders the same text.
pub fn render(
    trip: &TripRequest,
    locations: &[LocationRecommendation],
    days: &[DayPlan],
    packing: &PackingList,
    stages: &[StageReport],
) -> String {
    PlanDocument {
        trip,
        locations,
        days,
        packing,
        stages,
    }
    .to_string()
}

struct PlanDocument<'a> {
    trip: &'a TripRequest,
    locations: &'a [LocationRecommendation],
    days: &'a [DayPlan],
    packing: &'a PackingList,
    stages: &'a [StageReport],
}

impl PlanDocument<'_> {
    fn header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trip = self.trip;
        writeln!(f, "# Trip to {}\n", trip.destination.as_deref().unwrap_or("Sri Lanka"))?;
        let dates = match (trip.start_date, trip.end_date) {
            (Some(start), Some(end)) => format!("{} to {} ({} days)", start, end, trip.day_count().unwrap_or(1)),
            _ => "not specified".to_string(),
        };
        writeln!(f, "**Dates:** {}  ", dates)?;
        writeln!(f, "**Travelers:** {}  ", or_unset(trip.traveler_count.map(|n| n.to_string())))?;
        writeln!(f, "**Budget:** {}  ", or_unset(trip.budget.clone()))?;
        let preferences = (!trip.preferences.is_empty()).then(|| trip.preferences.join(", "));
        writeln!(f, "**Preferences:** {}  ", or_unset(preferences))?;
        writeln!(f, "**Trip Type:** {}  ", or_unset(trip.trip_type.clone()))?;
        writeln!(f, "**Season:** {}\n", or_unset(trip.season.map(|s| s.to_string())))
    }

    fn locations(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Locations\n")?;
        for loc in self.locations {
            write!(f, "- **{}**", loc.name)?;
            if !loc.kind.is_empty() {
                write!(f, " ({})", loc.kind)?;
            }
            if !loc.reason.is_empty() {
                write!(f, ": {}", loc.reason)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }

    fn daily_plan(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n## Daily Plan")?;
        for (i, day) in self.days.iter().enumerate() {
            writeln!(f, "\n### Day {} ({})\n", i + 1, day.date.format("%a %d %b %Y"))?;
            for slot in &day.slots {
                write!(f, "- **{}:** {}", slot.time, slot.title)?;
                if !slot.why.is_empty() {
                    write!(f, " _({})_", slot.why)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }

    fn packing(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n## Packing")?;
        for category in &self.packing.categories {
            let items: Vec<&str> = category.items.iter().map(|i| i.name.as_str()).collect();
            writeln!(f, "\n**{}:** {}", category.name, items.join(", "))?;
        }
        for note in &self.packing.notes {
            writeln!(f, "\n> {}", note)?;
        }
        Ok(())
    }

    fn notes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n## Notes\n")?;
        let fallbacks: Vec<String> = self
            .stages
            .iter()
            .filter(|r| r.is_fallback())
            .map(|r| r.stage.to_string())
            .collect();
        if !fallbacks.is_empty() {
            writeln!(
                f,
                "- Standard suggestions were used for: {}. Ask again later for a tailored version.",
                fallbacks.join(", ")
            )?;
        }
        writeln!(f, "- {}", DISCLAIMER)
    }
}

impl fmt::Display for PlanDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.header(f)?;
        self.locations(f)?;
        self.daily_plan(f)?;
        self.packing(f)?;
        self.notes(f)
    }
}

#[derive(Serialize)]
struct RefineContext<'a> {
    summary: &'a str,
}

/// Rewrite the raw rendering for readability
///
/// A reply that no longer names the destination has dropped content and is
/// rejected.
pub async fn polish(deps: &StageDeps, trip: &TripRequest, raw: &str) -> Result<String, StageError> {
    debug!(raw_len = raw.len(), "summary::polish: called");
    let polished = deps
        .ask_text("summary", &serde_json::json!({}), raw, deps.polish_timeout)
        .await?;
    if let Some(destination) = trip.destination.as_deref()
        && !polished.to_lowercase().contains(&destination.to_lowercase())
    {
        return Err(StageError::Malformed(format!("polished summary dropped {}", destination)));
    }
    Ok(polished)
}

/// Revise an existing summary following the traveler's feedback
pub async fn refine(deps: &StageDeps, summary: &str, feedback: &str) -> Result<String, StageError> {
    debug!(%feedback, "summary::refine: called");
    deps.ask_text("refine", &RefineContext { summary }, feedback, deps.stage_timeout)
        .await
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{deps, trip};
    use super::*;
    use crate::domain::{PackingCategory, PackingItem, StageKind, StageOutcome, TimeSlot};
    use crate::llm::client::mock::MockLlmClient;

    fn sample() -> (Vec<LocationRecommendation>, Vec<DayPlan>, PackingList) {
        let locations = vec![LocationRecommendation {
            name: "Galle Fort".to_string(),
            kind: "heritage".to_string(),
            reason: "Ramparts at sunset".to_string(),
        }];
        let days = vec![DayPlan {
            date: chrono::NaiveDate::from_ymd_opt(2025, 10, 14).unwrap(),
            slots: vec![TimeSlot {
                time: "Morning".to_string(),
                title: "Walk the ramparts".to_string(),
                why: "Cool air".to_string(),
            }],
        }];
        let packing = PackingList {
            categories: vec![PackingCategory {
                name: "Essentials".to_string(),
                items: vec![PackingItem::new("Passport", "")],
            }],
            notes: vec![],
        };
        (locations, days, packing)
    }

    #[test]
    fn test_render_sections_in_order() {
        let (locations, days, packing) = sample();
        let text = render(&trip(), &locations, &days, &packing, &[]);
        let headings = [
            "# Trip to Galle",
            "**Dates:** 2025-10-14 to 2025-10-16 (3 days)",
            "**Travelers:** 2",
            "**Budget:** not specified",
            "**Preferences:** beach, food",
            "**Trip Type:** leisure",
            "**Season:** Northeast Monsoon",
            "## Locations",
            "## Daily Plan",
            "## Packing",
            "## Notes",
        ];
        let mut cursor = 0;
        for heading in headings {
            let found = text[cursor..].find(heading);
            assert!(found.is_some(), "missing or out of order: {}", heading);
            cursor += found.unwrap_or(0);
        }
        assert!(text.contains("- **Galle Fort** (heritage): Ramparts at sunset"));
        assert!(text.contains("### Day 1 (Tue 14 Oct 2025)"));
        assert!(text.contains("- **Morning:** Walk the ramparts _(Cool air)_"));
        assert!(text.contains(DISCLAIMER));
        assert!(!text.contains("Standard suggestions"));
    }

    #[test]
    fn test_render_lists_fallback_stages() {
        let (locations, days, packing) = sample();
        let stages = vec![StageReport {
            stage: StageKind::Activity,
            outcome: StageOutcome::Fallback {
                reason: "timeout".to_string(),
            },
        }];
        let text = render(&trip(), &locations, &days, &packing, &stages);
        assert!(text.contains("Standard suggestions were used for: activity."));
    }

    #[tokio::test]
    async fn test_polish_rejects_reply_without_destination() {
        let llm = MockLlmClient::failing().on_text("# Summary polish", "A lovely trip somewhere.");
        let err = polish(&deps(llm), &trip(), "# Trip to Galle").await.unwrap_err();
        assert!(matches!(err, StageError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_refine_passes_summary_and_feedback() {
        let llm = MockLlmClient::failing().on_text("# Summary refinement", "Short Galle plan.");
        let deps = deps(llm);
        let revised = refine(&deps, "# Trip to Galle\nLong text", "make it shorter").await.unwrap();
        assert_eq!(revised, "Short Galle plan.");
    }
}
