//! Tool-layer row types
//!
//! Each struct deserializes straight from a TestRail API payload. TestRail
//! omits or nulls many fields, so everything defaults; nullable fields are
//! `Option`. `connection_id` (and `project_id` where the API leaves it out)
//! is injected by the extractor from the run scope.

use super::EntityKind;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailProject {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub name: String,
    pub announcement: Option<String>,
    pub show_announcement: bool,
    pub is_completed: bool,
    pub completed_on: Option<i64>,
    pub suite_mode: i64,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailSuite {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub is_baseline: bool,
    pub is_master: bool,
    pub is_completed: bool,
    pub completed_on: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailSection {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    #[serde(skip)]
    pub project_id: i64,
    pub suite_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub display_order: i64,
    pub depth: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailMilestone {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub project_id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub refs: Option<String>,
    pub url: String,
    pub start_on: Option<i64>,
    pub started_on: Option<i64>,
    pub due_on: Option<i64>,
    pub is_started: bool,
    pub is_completed: bool,
    pub completed_on: Option<i64>,
}

/// Pass/fail tallies shared by plans, plan entries and runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusCounts {
    pub passed_count: i64,
    pub blocked_count: i64,
    pub untested_count: i64,
    pub retest_count: i64,
    pub failed_count: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.passed_count
            + self.failed_count
            + self.blocked_count
            + self.untested_count
            + self.retest_count
    }
}

impl std::ops::AddAssign for StatusCounts {
    fn add_assign(&mut self, other: Self) {
        self.passed_count += other.passed_count;
        self.blocked_count += other.blocked_count;
        self.untested_count += other.untested_count;
        self.retest_count += other.retest_count;
        self.failed_count += other.failed_count;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailPlan {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub milestone_id: Option<i64>,
    pub assignedto_id: Option<i64>,
    pub is_completed: bool,
    pub completed_on: Option<i64>,
    pub created_on: i64,
    pub created_by: Option<i64>,
    pub url: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

/// One run configuration inside a plan. TestRail identifies entries by UUID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestrailPlanEntry {
    pub connection_id: i64,
    pub id: String,
    pub plan_id: i64,
    pub project_id: i64,
    pub suite_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub assignedto_id: Option<i64>,
    pub include_all: bool,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailRun {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub project_id: i64,
    pub suite_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub milestone_id: Option<i64>,
    pub plan_id: Option<i64>,
    pub assignedto_id: Option<i64>,
    pub is_completed: bool,
    pub completed_on: Option<i64>,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub created_on: i64,
    pub created_by: Option<i64>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailResult {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    #[serde(skip)]
    pub project_id: i64,
    /// Absent from `get_results_for_run` payloads; filled from the fan-out input
    pub run_id: i64,
    pub case_id: Option<i64>,
    /// Test instance within the run; not a case id
    pub test_id: Option<i64>,
    pub status_id: Option<i64>,
    pub created_by: Option<i64>,
    pub created_on: i64,
    pub elapsed: Option<String>,
    pub comment: Option<String>,
    pub version: Option<String>,
    pub defects: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailCase {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    #[serde(skip)]
    pub project_id: i64,
    pub suite_id: Option<i64>,
    pub section_id: Option<i64>,
    pub title: String,
    pub type_id: Option<i64>,
    pub priority_id: Option<i64>,
    pub template_id: Option<i64>,
    pub milestone_id: Option<i64>,
    pub refs: Option<String>,
    pub estimate: Option<String>,
    pub estimate_forecast: Option<String>,
    pub created_by: Option<i64>,
    pub created_on: i64,
    pub updated_by: Option<i64>,
    pub updated_on: i64,
    /// Every `custom_*` key of the payload
    #[serde(skip)]
    pub custom_fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailUser {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub role_id: Option<i64>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailCaseField {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub system_name: String,
    pub label: String,
    pub name: String,
    pub description: Option<String>,
    pub type_id: i64,
    /// Derived from the `configs[].context.is_global` flags
    #[serde(skip)]
    pub is_global: bool,
    pub is_active: bool,
    pub display_order: i64,
    pub include_all: bool,
    pub template_ids: Vec<i64>,
    pub configs: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailCaseType {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailPriority {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub name: String,
    pub short_name: String,
    pub priority: i64,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TestrailStatus {
    #[serde(skip)]
    pub connection_id: i64,
    pub id: i64,
    pub name: String,
    pub label: String,
    pub color_dark: i64,
    pub color_medium: i64,
    pub color_bright: i64,
    pub is_final: bool,
    pub is_system: bool,
    pub is_untested: bool,
}

/// A fully-built tool-layer row, ready to upsert
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRow {
    Project(TestrailProject),
    Suite(TestrailSuite),
    Section(TestrailSection),
    Milestone(TestrailMilestone),
    Plan(TestrailPlan),
    PlanEntry(TestrailPlanEntry),
    Run(TestrailRun),
    Result(TestrailResult),
    Case(TestrailCase),
    User(TestrailUser),
    CaseField(TestrailCaseField),
    CaseType(TestrailCaseType),
    Priority(TestrailPriority),
    Status(TestrailStatus),
}

impl ToolRow {
    pub fn kind(&self) -> EntityKind {
        match self {
            ToolRow::Project(_) => EntityKind::Project,
            ToolRow::Suite(_) => EntityKind::Suite,
            ToolRow::Section(_) => EntityKind::Section,
            ToolRow::Milestone(_) => EntityKind::Milestone,
            ToolRow::Plan(_) => EntityKind::Plan,
            ToolRow::PlanEntry(_) => EntityKind::PlanEntry,
            ToolRow::Run(_) => EntityKind::Run,
            ToolRow::Result(_) => EntityKind::Result,
            ToolRow::Case(_) => EntityKind::Case,
            ToolRow::User(_) => EntityKind::User,
            ToolRow::CaseField(_) => EntityKind::CaseField,
            ToolRow::CaseType(_) => EntityKind::CaseType,
            ToolRow::Priority(_) => EntityKind::Priority,
            ToolRow::Status(_) => EntityKind::Status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nulls_and_missing_fields_default() {
        let run: TestrailRun = serde_json::from_value(json!({
            "id": 81,
            "name": "Nightly",
            "description": null,
            "milestone_id": null,
            "completed_on": null,
            "passed_count": 3,
            "failed_count": 1
        }))
        .unwrap();

        assert_eq!(run.id, 81);
        assert_eq!(run.description, None);
        assert_eq!(run.completed_on, None);
        assert_eq!(run.counts.passed_count, 3);
        assert_eq!(run.counts.blocked_count, 0);
        assert_eq!(run.counts.total(), 4);
        assert_eq!(run.project_id, 0);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let result = serde_json::from_value::<TestrailCase>(json!({
            "id": "not-a-number",
            "title": "Login works"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_result_keeps_case_and_test_apart() {
        let result: TestrailResult =
            serde_json::from_value(json!({"id": 1, "test_id": 77, "status_id": 5})).unwrap();
        assert_eq!(result.case_id, None);
        assert_eq!(result.test_id, Some(77));

        let result: TestrailResult =
            serde_json::from_value(json!({"id": 1, "case_id": 12, "test_id": 77})).unwrap();
        assert_eq!(result.case_id, Some(12));
    }

    #[test]
    fn test_counts_accumulate() {
        let mut total = StatusCounts::default();
        total += StatusCounts {
            passed_count: 2,
            failed_count: 1,
            ..Default::default()
        };
        total += StatusCounts {
            passed_count: 1,
            retest_count: 4,
            ..Default::default()
        };
        assert_eq!(total.passed_count, 3);
        assert_eq!(total.total(), 8);
    }
}
