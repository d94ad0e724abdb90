//! Tool-layer models for TestRail entities
//!
//! These mirror the TestRail API payloads closely. Every row is keyed by
//! `(connection_id, id)`; project-scoped rows also carry `project_id`.

pub mod scope_config;
pub mod tool;

pub use scope_config::{
    CustomFieldMapping, PriorityMapping, ScopeConfig, StatusMapping, TypeMapping,
};
pub use tool::*;

use serde::{Deserialize, Serialize};

/// Raw table names, one per collected endpoint family.
pub mod raw_tables {
    pub const PROJECTS: &str = "testrail_projects";
    pub const SUITES: &str = "testrail_suites";
    pub const SECTIONS: &str = "testrail_sections";
    pub const MILESTONES: &str = "testrail_milestones";
    pub const PLANS: &str = "testrail_plans";
    pub const RUNS: &str = "testrail_runs";
    pub const RESULTS: &str = "testrail_results";
    pub const CASES: &str = "testrail_cases";
    pub const USERS: &str = "testrail_users";
    pub const CASE_FIELDS: &str = "testrail_case_fields";
    pub const CASE_TYPES: &str = "testrail_case_types";
    pub const PRIORITIES: &str = "testrail_priorities";
    pub const STATUSES: &str = "testrail_statuses";
}

/// Closed set of TestRail entity kinds handled by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    Suite,
    Section,
    Milestone,
    Plan,
    PlanEntry,
    Run,
    Result,
    Case,
    User,
    CaseField,
    CaseType,
    Priority,
    Status,
}

impl EntityKind {
    /// Tool type name used in domain ids (e.g., `TestrailProject`)
    pub fn tool_type(&self) -> &'static str {
        match self {
            EntityKind::Project => "TestrailProject",
            EntityKind::Suite => "TestrailSuite",
            EntityKind::Section => "TestrailSection",
            EntityKind::Milestone => "TestrailMilestone",
            EntityKind::Plan => "TestrailPlan",
            EntityKind::PlanEntry => "TestrailPlanEntry",
            EntityKind::Run => "TestrailRun",
            EntityKind::Result => "TestrailResult",
            EntityKind::Case => "TestrailCase",
            EntityKind::User => "TestrailUser",
            EntityKind::CaseField => "TestrailCaseField",
            EntityKind::CaseType => "TestrailCaseType",
            EntityKind::Priority => "TestrailPriority",
            EntityKind::Status => "TestrailStatus",
        }
    }

    /// Short lowercase name used in logs and parse errors
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Suite => "suite",
            EntityKind::Section => "section",
            EntityKind::Milestone => "milestone",
            EntityKind::Plan => "plan",
            EntityKind::PlanEntry => "plan_entry",
            EntityKind::Run => "run",
            EntityKind::Result => "result",
            EntityKind::Case => "case",
            EntityKind::User => "user",
            EntityKind::CaseField => "case_field",
            EntityKind::CaseType => "case_type",
            EntityKind::Priority => "priority",
            EntityKind::Status => "status",
        }
    }

    /// Raw table the entity is staged in, if it is collected directly.
    ///
    /// Plan entries arrive embedded in plan payloads and have no table of their own.
    pub fn raw_table(&self) -> Option<&'static str> {
        match self {
            EntityKind::Project => Some(raw_tables::PROJECTS),
            EntityKind::Suite => Some(raw_tables::SUITES),
            EntityKind::Section => Some(raw_tables::SECTIONS),
            EntityKind::Milestone => Some(raw_tables::MILESTONES),
            EntityKind::Plan => Some(raw_tables::PLANS),
            EntityKind::PlanEntry => None,
            EntityKind::Run => Some(raw_tables::RUNS),
            EntityKind::Result => Some(raw_tables::RESULTS),
            EntityKind::Case => Some(raw_tables::CASES),
            EntityKind::User => Some(raw_tables::USERS),
            EntityKind::CaseField => Some(raw_tables::CASE_FIELDS),
            EntityKind::CaseType => Some(raw_tables::CASE_TYPES),
            EntityKind::Priority => Some(raw_tables::PRIORITIES),
            EntityKind::Status => Some(raw_tables::STATUSES),
        }
    }

    /// Whether rows of this kind carry a `project_id`
    pub fn is_project_scoped(&self) -> bool {
        !matches!(
            self,
            EntityKind::Project
                | EntityKind::User
                | EntityKind::CaseField
                | EntityKind::CaseType
                | EntityKind::Priority
                | EntityKind::Status
        )
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters that tag every raw row of one run scope.
///
/// Serialized with a fixed field order so equal scopes produce equal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiParams {
    pub connection_id: i64,
    pub project_id: i64,
}

impl ApiParams {
    pub fn new(connection_id: i64, project_id: i64) -> Self {
        Self {
            connection_id,
            project_id,
        }
    }

    /// Canonical JSON form stored in the raw `params` column
    pub fn to_json(&self) -> String {
        format!(
            r#"{{"connectionId":{},"projectId":{}}}"#,
            self.connection_id, self.project_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_params_canonical_json() {
        let params = ApiParams::new(1, 42);
        assert_eq!(params.to_json(), r#"{"connectionId":1,"projectId":42}"#);

        // Matches what serde would produce, so either form can be parsed back
        let parsed: ApiParams = serde_json::from_str(&params.to_json()).unwrap();
        assert_eq!(parsed, params);
        assert_eq!(serde_json::to_string(&params).unwrap(), params.to_json());
    }

    #[test]
    fn test_entity_kind_tables() {
        assert_eq!(EntityKind::Case.raw_table(), Some("testrail_cases"));
        assert_eq!(EntityKind::PlanEntry.raw_table(), None);
        assert!(EntityKind::Result.is_project_scoped());
        assert!(!EntityKind::User.is_project_scoped());
        assert_eq!(EntityKind::Run.tool_type(), "TestrailRun");
    }
}
