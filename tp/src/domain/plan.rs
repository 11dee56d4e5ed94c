//! AggregatePlan - the output of one planning pass

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TripRequest;

/// A recommended place to visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecommendation {
    pub name: String,
    /// Beach, heritage site, viewpoint, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
}

/// One part of a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Morning, Noon, Evening, Night
    pub time: String,
    pub title: String,
    #[serde(default)]
    pub why: String,
}

/// Activities for one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingItem {
    pub name: String,
    #[serde(default)]
    pub reason: String,
}

impl PackingItem {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingCategory {
    pub name: String,
    pub items: Vec<PackingItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingList {
    pub categories: Vec<PackingCategory>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl PackingList {
    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Location,
    Activity,
    Packing,
    Summary,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageKind::Location => "location",
            StageKind::Activity => "activity",
            StageKind::Packing => "packing",
            StageKind::Summary => "summary",
        };
        write!(f, "{}", s)
    }
}

/// How a stage produced its output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    /// The collaborator failed and the rule-based output was used
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageKind,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

impl StageReport {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, StageOutcome::Fallback { .. })
    }
}

/// Everything one planning pass produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePlan {
    /// The trip the plan was built for
    pub trip: TripRequest,
    pub locations: Vec<LocationRecommendation>,
    pub days: Vec<DayPlan>,
    pub packing: PackingList,
    /// Rendered narrative summary (markdown)
    pub summary: String,
    pub stages: Vec<StageReport>,
}

impl AggregatePlan {
    /// Report for one stage
    pub fn stage(&self, kind: StageKind) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == kind)
    }

    pub fn used_fallback(&self, kind: StageKind) -> bool {
        self.stage(kind).is_some_and(StageReport::is_fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_kind_uses_type_key() {
        let loc: LocationRecommendation =
            serde_json::from_value(serde_json::json!({"name": "Galle Fort", "type": "heritage"})).unwrap();
        assert_eq!(loc.kind, "heritage");
        assert_eq!(loc.reason, "");
    }

    #[test]
    fn test_stage_report_flattens_outcome() {
        let report = StageReport {
            stage: StageKind::Activity,
            outcome: StageOutcome::Fallback {
                reason: "timeout".to_string(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stage"], "activity");
        assert_eq!(json["outcome"], "fallback");
        assert_eq!(json["reason"], "timeout");
        assert!(report.is_fallback());
    }
}
