//! Tool rows to QA domain rows
//!
//! The `convert_*` functions are pure and deterministic: the same tool row
//! and scope always produce the same domain row. [`convert`] streams tool
//! rows of one kind and upserts each domain row once it is fully built.

use super::TaskContext;
use crate::db::ToolRecord;
use crate::didgen::{domain_id, DomainIdGenerator};
use crate::error::Result;
use crate::mapping::{self, MappingKind};
use crate::models::*;
use crate::types::*;

/// Counters for one conversion
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertStats {
    /// Domain rows written
    pub rows: usize,
    /// Tool rows rejected by the scope's suite or milestone filter
    pub filtered: usize,
}

/// Convert every tool row of `kind` in the context's scope.
pub fn convert(ctx: &TaskContext<'_>, kind: EntityKind) -> Result<ConvertStats> {
    let stats = match kind {
        EntityKind::Project => convert_each::<TestrailProject, _>(ctx, |p| {
            Some(DomainRow::Project(convert_project(p)))
        })?,
        EntityKind::Case => convert_each::<TestrailCase, _>(ctx, |c| {
            convert_case(c, ctx.scope()).map(DomainRow::TestCase)
        })?,
        EntityKind::Run => convert_each::<TestrailRun, _>(ctx, |r| {
            convert_run(r, ctx.scope()).map(DomainRow::TestRun)
        })?,
        EntityKind::Result => convert_each::<TestrailResult, _>(ctx, |r| {
            Some(DomainRow::Execution(convert_result(r, ctx.scope())))
        })?,
        other => {
            tracing::debug!(kind = %other, "No domain conversion for entity kind");
            ConvertStats::default()
        }
    };

    tracing::debug!(
        kind = %kind,
        rows = stats.rows,
        filtered = stats.filtered,
        "Converted tool rows"
    );

    Ok(stats)
}

fn convert_each<T, F>(ctx: &TaskContext<'_>, build: F) -> Result<ConvertStats>
where
    T: ToolRecord,
    F: Fn(&T) -> Option<DomainRow>,
{
    let mut stats = ConvertStats::default();
    for row in ctx.db.tool_cursor::<T>(
        ctx.connection_id(),
        ctx.project_id(),
        ctx.settings.cursor_batch_size,
    ) {
        ctx.check_cancelled()?;
        match build(&row?) {
            Some(domain) => {
                ctx.db.upsert_domain_row(&domain)?;
                stats.rows += 1;
            }
            None => stats.filtered += 1,
        }
    }
    Ok(stats)
}

pub fn convert_project(project: &TestrailProject) -> QaProject {
    QaProject {
        id: domain_id(EntityKind::Project, project.connection_id, project.id),
        name: project.name.clone(),
    }
}

/// Returns `None` when the case's suite is filtered out.
pub fn convert_case(case: &TestrailCase, scope: Option<&ScopeConfig>) -> Option<QaTestCase> {
    let suite_id = case.suite_id.unwrap_or_default();
    if scope.map_or(false, |s| !s.suite_allowed(suite_id)) {
        return None;
    }

    Some(QaTestCase {
        id: domain_id(EntityKind::Case, case.connection_id, case.id),
        name: case.title.clone(),
        qa_project_id: domain_id(EntityKind::Project, case.connection_id, case.project_id),
        create_time: from_unix(case.created_on),
        creator_id: user_id(case.connection_id, case.created_by),
        test_type: mapping::normalize(
            MappingKind::CaseType,
            case.type_id.unwrap_or_default(),
            scope,
        ),
        priority: mapping::normalize(
            MappingKind::Priority,
            case.priority_id.unwrap_or_default(),
            scope,
        ),
        is_automated: mapping::is_automated(&case.custom_fields, scope),
        custom_attributes: mapping::custom_attributes(&case.custom_fields, scope),
    })
}

/// Returns `None` when the run's milestone is filtered out.
pub fn convert_run(run: &TestrailRun, scope: Option<&ScopeConfig>) -> Option<QaTestRun> {
    if scope.map_or(false, |s| !s.milestone_allowed(run.milestone_id)) {
        return None;
    }

    let status = if run.is_completed {
        RunStatus::Completed
    } else {
        RunStatus::InProgress
    };
    let finish_time = run.completed_on.filter(|at| *at > 0).map(from_unix);

    Some(QaTestRun {
        id: domain_id(EntityKind::Run, run.connection_id, run.id),
        qa_project_id: domain_id(EntityKind::Project, run.connection_id, run.project_id),
        name: run.name.clone(),
        description: run.description.clone(),
        start_time: from_unix(run.created_on),
        finish_time,
        status,
        passed_count: run.counts.passed_count,
        failed_count: run.counts.failed_count,
        skipped_count: run.counts.blocked_count,
        total_count: run.counts.total(),
    })
}

pub fn convert_result(result: &TestrailResult, scope: Option<&ScopeConfig>) -> QaTestCaseExecution {
    let conn = result.connection_id;
    let at = from_unix(result.created_on);

    QaTestCaseExecution {
        id: domain_id(EntityKind::Result, conn, result.id),
        qa_project_id: domain_id(EntityKind::Project, conn, result.project_id),
        qa_test_case_id: domain_id(EntityKind::Case, conn, result.case_id.unwrap_or_default()),
        qa_test_run_id: domain_id(EntityKind::Run, conn, result.run_id),
        create_time: at,
        start_time: at,
        finish_time: at,
        creator_id: user_id(conn, result.created_by),
        status: mapping::normalize(
            MappingKind::Status,
            result.status_id.unwrap_or_default(),
            scope,
        ),
    }
}

fn user_id(connection_id: i64, user: Option<i64>) -> Option<String> {
    user.filter(|id| *id != 0)
        .map(|id| DomainIdGenerator::new(EntityKind::User).generate(connection_id, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(json: serde_json::Value) -> ScopeConfig {
        serde_json::from_value(json).unwrap()
    }

    fn run() -> TestrailRun {
        TestrailRun {
            connection_id: 1,
            id: 9,
            project_id: 42,
            name: "Nightly".to_string(),
            milestone_id: Some(3),
            is_completed: true,
            completed_on: Some(1_700_003_600),
            created_on: 1_700_000_000,
            counts: StatusCounts {
                passed_count: 7,
                blocked_count: 2,
                untested_count: 1,
                retest_count: 1,
                failed_count: 3,
            },
            ..Default::default()
        }
    }

    fn result(status_id: Option<i64>) -> TestrailResult {
        TestrailResult {
            connection_id: 1,
            id: 500,
            project_id: 42,
            run_id: 9,
            case_id: Some(10),
            status_id,
            created_by: Some(4),
            created_on: 1_700_000_100,
            ..Default::default()
        }
    }

    #[test]
    fn test_convert_project() {
        let project = TestrailProject {
            connection_id: 1,
            id: 1,
            name: "Alpha".to_string(),
            ..Default::default()
        };
        let qa = convert_project(&project);
        assert_eq!(qa.id, "testrail:TestrailProject:1:1");
        assert_eq!(qa.name, "Alpha");
    }

    #[test]
    fn test_convert_completed_run() {
        let qa = convert_run(&run(), None).unwrap();
        assert_eq!(qa.id, "testrail:TestrailRun:1:9");
        assert_eq!(qa.qa_project_id, "testrail:TestrailProject:1:42");
        assert_eq!(qa.status, RunStatus::Completed);
        assert_eq!(qa.finish_time, Some(from_unix(1_700_003_600)));
        assert_eq!(qa.skipped_count, 2);
        assert_eq!(qa.total_count, 14);
    }

    #[test]
    fn test_convert_open_run() {
        let open = TestrailRun {
            is_completed: false,
            completed_on: None,
            ..run()
        };
        let qa = convert_run(&open, None).unwrap();
        assert_eq!(qa.status, RunStatus::InProgress);
        assert_eq!(qa.finish_time, None);
        assert_eq!(qa.start_time, from_unix(1_700_000_000));
    }

    #[test]
    fn test_open_run_keeps_completion_time() {
        let reopened = TestrailRun {
            is_completed: false,
            completed_on: Some(1_700_003_600),
            ..run()
        };
        let qa = convert_run(&reopened, None).unwrap();
        assert_eq!(qa.status, RunStatus::InProgress);
        assert_eq!(qa.finish_time, Some(from_unix(1_700_003_600)));
    }

    #[test]
    fn test_completed_run_without_completion_time() {
        let run = TestrailRun {
            completed_on: Some(0),
            ..run()
        };
        let qa = convert_run(&run, None).unwrap();
        assert_eq!(qa.status, RunStatus::Completed);
        assert_eq!(qa.finish_time, None);
    }

    #[test]
    fn test_milestone_filter() {
        let only_7 = scope(json!({"includeMilestoneIds": [7]}));
        assert!(convert_run(&run(), Some(&only_7)).is_none());

        let no_milestone = TestrailRun {
            milestone_id: None,
            ..run()
        };
        assert!(convert_run(&no_milestone, Some(&only_7)).is_none());

        let only_3 = scope(json!({"includeMilestoneIds": [3]}));
        assert!(convert_run(&run(), Some(&only_3)).is_some());
    }

    #[test]
    fn test_convert_result_status() {
        let qa = convert_result(&result(Some(5)), None);
        assert_eq!(qa.status, "FAILED");
        assert_eq!(qa.id, "testrail:TestrailResult:1:500");
        assert_eq!(qa.qa_test_case_id, "testrail:TestrailCase:1:10");
        assert_eq!(qa.qa_test_run_id, "testrail:TestrailRun:1:9");
        assert_eq!(qa.creator_id.as_deref(), Some("testrail:TestrailUser:1:4"));
        assert_eq!(qa.start_time, qa.finish_time);

        let aborted = scope(json!({"statusMappings": {"5": {"standardStatus": "ABORTED"}}}));
        assert_eq!(convert_result(&result(Some(5)), Some(&aborted)).status, "ABORTED");
        assert_eq!(convert_result(&result(Some(1)), Some(&aborted)).status, "SUCCESS");
    }

    #[test]
    fn test_convert_result_without_status_or_creator() {
        let r = TestrailResult {
            created_by: Some(0),
            ..result(None)
        };
        let qa = convert_result(&r, None);
        assert_eq!(qa.status, "PENDING");
        assert_eq!(qa.creator_id, None);
    }

    #[test]
    fn test_convert_result_ignores_test_id() {
        let r = TestrailResult {
            case_id: None,
            test_id: Some(77),
            ..result(Some(1))
        };
        assert_eq!(
            convert_result(&r, None).qa_test_case_id,
            "testrail:TestrailCase:1:0"
        );

        let r = TestrailResult {
            test_id: Some(77),
            ..result(Some(1))
        };
        assert_eq!(
            convert_result(&r, None).qa_test_case_id,
            "testrail:TestrailCase:1:10"
        );
    }

    #[test]
    fn test_convert_case() {
        let mut custom_fields = serde_json::Map::new();
        custom_fields.insert("custom_automation_type".to_string(), json!("Automated"));
        custom_fields.insert("custom_component".to_string(), json!("auth"));
        let case = TestrailCase {
            connection_id: 1,
            id: 10,
            project_id: 42,
            suite_id: Some(2),
            title: "Login works".to_string(),
            type_id: Some(9),
            priority_id: Some(4),
            created_by: Some(4),
            created_on: 1_700_000_000,
            custom_fields,
            ..Default::default()
        };
        let scope = scope(json!({
            "automationStatusField": "custom_automation_type",
            "customFieldMappings": {
                "custom_component": {"targetField": "component", "fieldType": "string"}
            }
        }));

        let qa = convert_case(&case, Some(&scope)).unwrap();
        assert_eq!(qa.id, "testrail:TestrailCase:1:10");
        assert_eq!(qa.name, "Login works");
        assert_eq!(qa.test_type, "regression");
        assert_eq!(qa.priority, "critical");
        assert!(qa.is_automated);
        assert_eq!(qa.custom_attributes, json!({"component": "auth"}));
        assert_eq!(qa.creator_id.as_deref(), Some("testrail:TestrailUser:1:4"));

        let plain = convert_case(&case, None).unwrap();
        assert!(!plain.is_automated);
        assert_eq!(plain.custom_attributes, json!({}));
    }

    #[test]
    fn test_suite_filter() {
        let case = TestrailCase {
            connection_id: 1,
            id: 10,
            suite_id: Some(2),
            ..Default::default()
        };
        let excluded = scope(json!({"excludeSuiteIds": [2]}));
        assert!(convert_case(&case, Some(&excluded)).is_none());

        let included = scope(json!({"includeSuiteIds": [2]}));
        assert!(convert_case(&case, Some(&included)).is_some());
    }

    #[test]
    fn test_conversion_is_deterministic() {
        assert_eq!(convert_run(&run(), None), convert_run(&run(), None));
        assert_eq!(
            convert_result(&result(Some(2)), None),
            convert_result(&result(Some(2)), None)
        );
    }
}
