//! Raw rows to tool rows
//!
//! Parsing is pure ([`parse_record`]); [`extract`] streams the staged rows
//! of one entity kind and upserts what they parse into.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::TaskContext;
use crate::config::ParseErrorPolicy;
use crate::db::RawRecord;
use crate::error::{Error, Result};
use crate::models::*;

/// Counters for one extraction
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    /// Raw rows read
    pub records: usize,
    /// Tool rows written
    pub rows: usize,
    /// Raw rows skipped under the `skip` parse-error policy
    pub skipped: usize,
}

/// Extract every staged raw row of `kind` for the context's scope.
///
/// Plan entries have no raw table of their own; they are written while
/// extracting plans.
pub fn extract(ctx: &TaskContext<'_>, kind: EntityKind) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();
    let Some(table) = kind.raw_table() else {
        return Ok(stats);
    };

    for record in ctx
        .db
        .raw_cursor(table, ctx.params(), ctx.settings.cursor_batch_size)
    {
        ctx.check_cancelled()?;
        let record = record?;
        stats.records += 1;

        let rows = match parse_record(kind, &record, ctx.connection_id(), ctx.project_id()) {
            Ok(rows) => rows,
            Err(e) => match ctx.settings.on_parse_error {
                ParseErrorPolicy::Abort => return Err(e),
                ParseErrorPolicy::Skip => {
                    tracing::warn!(
                        table = %table,
                        raw_id = record.id,
                        error = %e,
                        "Skipping unparseable raw record"
                    );
                    stats.skipped += 1;
                    continue;
                }
            },
        };

        for row in &rows {
            ctx.db.upsert_tool_row(row)?;
        }
        stats.rows += rows.len();
    }

    tracing::debug!(
        table = %table,
        records = stats.records,
        rows = stats.rows,
        skipped = stats.skipped,
        "Extracted raw records"
    );

    Ok(stats)
}

/// Parse one raw record into the tool rows it describes.
///
/// Most records yield exactly one row; a plan yields itself plus one row per
/// entry.
pub fn parse_record(
    kind: EntityKind,
    record: &RawRecord,
    connection_id: i64,
    project_id: i64,
) -> Result<Vec<ToolRow>> {
    let data: Value =
        serde_json::from_str(&record.data).map_err(|e| Error::parse(kind.as_str(), e))?;
    if !data.is_object() {
        return Err(Error::parse(kind.as_str(), "record is not a JSON object"));
    }

    let row = match kind {
        EntityKind::Project => {
            let mut r: TestrailProject = decode(kind, &data)?;
            r.connection_id = connection_id;
            ToolRow::Project(r)
        }
        EntityKind::Suite => {
            let mut r: TestrailSuite = decode(kind, &data)?;
            r.connection_id = connection_id;
            r.project_id = project_id;
            ToolRow::Suite(r)
        }
        EntityKind::Section => {
            let mut r: TestrailSection = decode(kind, &data)?;
            r.connection_id = connection_id;
            r.project_id = project_id;
            ToolRow::Section(r)
        }
        EntityKind::Milestone => {
            let mut r: TestrailMilestone = decode(kind, &data)?;
            r.connection_id = connection_id;
            r.project_id = project_id;
            ToolRow::Milestone(r)
        }
        EntityKind::Plan => return parse_plan(&data, connection_id, project_id),
        EntityKind::Run => {
            let mut r: TestrailRun = decode(kind, &data)?;
            r.connection_id = connection_id;
            r.project_id = project_id;
            ToolRow::Run(r)
        }
        EntityKind::Result => {
            let mut r: TestrailResult = decode(kind, &data)?;
            r.connection_id = connection_id;
            r.project_id = project_id;
            if r.run_id == 0 {
                r.run_id = record
                    .input_json()
                    .and_then(|input| input.get("id").and_then(Value::as_i64))
                    .unwrap_or_default();
            }
            ToolRow::Result(r)
        }
        EntityKind::Case => {
            let mut r: TestrailCase = decode(kind, &data)?;
            r.connection_id = connection_id;
            r.project_id = project_id;
            r.custom_fields = custom_fields(&data);
            ToolRow::Case(r)
        }
        EntityKind::User => {
            let mut r: TestrailUser = decode(kind, &data)?;
            r.connection_id = connection_id;
            ToolRow::User(r)
        }
        EntityKind::CaseField => {
            let mut r: TestrailCaseField = decode(kind, &data)?;
            r.connection_id = connection_id;
            r.is_global = any_global_context(&r.configs);
            ToolRow::CaseField(r)
        }
        EntityKind::CaseType => {
            let mut r: TestrailCaseType = decode(kind, &data)?;
            r.connection_id = connection_id;
            ToolRow::CaseType(r)
        }
        EntityKind::Priority => {
            let mut r: TestrailPriority = decode(kind, &data)?;
            r.connection_id = connection_id;
            ToolRow::Priority(r)
        }
        EntityKind::Status => {
            let mut r: TestrailStatus = decode(kind, &data)?;
            r.connection_id = connection_id;
            ToolRow::Status(r)
        }
        EntityKind::PlanEntry => {
            return Err(Error::parse(
                kind.as_str(),
                "plan entries are extracted from their plan",
            ))
        }
    };

    Ok(vec![row])
}

fn decode<T: DeserializeOwned>(kind: EntityKind, data: &Value) -> Result<T> {
    T::deserialize(data).map_err(|e| Error::parse(kind.as_str(), e))
}

/// Every `custom_*` key of a case payload
fn custom_fields(data: &Value) -> Map<String, Value> {
    data.as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(key, _)| key.starts_with("custom_"))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn any_global_context(configs: &Value) -> bool {
    configs.as_array().map_or(false, |configs| {
        configs.iter().any(|config| {
            config
                .pointer("/context/is_global")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
    })
}

// ============================================
// Plans
// ============================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlanEntries {
    entries: Option<Vec<PlanEntryPayload>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlanEntryPayload {
    id: String,
    suite_id: Option<i64>,
    name: String,
    description: Option<String>,
    assignedto_id: Option<i64>,
    include_all: bool,
    runs: Option<Vec<StatusCounts>>,
}

fn parse_plan(data: &Value, connection_id: i64, project_id: i64) -> Result<Vec<ToolRow>> {
    let mut plan: TestrailPlan = decode(EntityKind::Plan, data)?;
    plan.connection_id = connection_id;
    plan.project_id = project_id;

    let entries: PlanEntries = decode(EntityKind::PlanEntry, data)?;

    let mut rows = Vec::new();
    for entry in entries.entries.unwrap_or_default() {
        if entry.id.is_empty() {
            return Err(Error::parse(
                EntityKind::PlanEntry.as_str(),
                format!("entry of plan {} has no id", plan.id),
            ));
        }

        let mut counts = StatusCounts::default();
        for run in entry.runs.unwrap_or_default() {
            counts += run;
        }

        rows.push(ToolRow::PlanEntry(TestrailPlanEntry {
            connection_id,
            id: entry.id,
            plan_id: plan.id,
            project_id,
            suite_id: entry.suite_id,
            name: entry.name,
            description: entry.description,
            assignedto_id: entry.assignedto_id,
            include_all: entry.include_all,
            counts,
        }));
    }

    rows.insert(0, ToolRow::Plan(plan));
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn raw(data: Value, input: Option<Value>) -> RawRecord {
        RawRecord {
            id: 1,
            table_name: "testrail_test".to_string(),
            params: ApiParams::new(1, 42).to_json(),
            data: data.to_string(),
            url: "http://localhost/index.php?/api/v2/test".to_string(),
            input: input.map(|v| v.to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_project_injects_connection() {
        let rows = parse_record(
            EntityKind::Project,
            &raw(json!({"id": 1, "name": "Alpha", "suite_mode": 1}), None),
            3,
            1,
        )
        .unwrap();

        let ToolRow::Project(project) = &rows[0] else {
            panic!("expected project, got {:?}", rows);
        };
        assert_eq!(project.connection_id, 3);
        assert_eq!(project.name, "Alpha");
        assert_eq!(project.suite_mode, 1);
    }

    #[test]
    fn test_case_collects_custom_fields() {
        let rows = parse_record(
            EntityKind::Case,
            &raw(
                json!({
                    "id": 10,
                    "title": "Login works",
                    "suite_id": 2,
                    "type_id": 9,
                    "custom_automation_type": 1,
                    "custom_preconds": null,
                    "refs": "JIRA-1"
                }),
                Some(json!({"id": 2})),
            ),
            1,
            42,
        )
        .unwrap();

        let ToolRow::Case(case) = &rows[0] else {
            panic!("expected case, got {:?}", rows);
        };
        assert_eq!(case.project_id, 42);
        assert_eq!(case.custom_fields.len(), 2);
        assert_eq!(case.custom_fields["custom_automation_type"], json!(1));
        assert!(case.custom_fields["custom_preconds"].is_null());
    }

    #[test]
    fn test_case_without_custom_fields() {
        let rows = parse_record(
            EntityKind::Case,
            &raw(json!({"id": 11, "title": "Plain"}), None),
            1,
            42,
        )
        .unwrap();
        let ToolRow::Case(case) = &rows[0] else {
            panic!("expected case");
        };
        assert!(case.custom_fields.is_empty());
    }

    #[test]
    fn test_result_run_id_from_input() {
        let rows = parse_record(
            EntityKind::Result,
            &raw(
                json!({"id": 500, "test_id": 77, "status_id": 5, "created_on": 1_700_000_000}),
                Some(json!({"id": 9})),
            ),
            1,
            42,
        )
        .unwrap();

        let ToolRow::Result(result) = &rows[0] else {
            panic!("expected result");
        };
        assert_eq!(result.run_id, 9);
        assert_eq!(result.project_id, 42);
        assert_eq!(result.case_id, None);
        assert_eq!(result.test_id, Some(77));
    }

    #[test]
    fn test_result_keeps_payload_run_id() {
        let rows = parse_record(
            EntityKind::Result,
            &raw(json!({"id": 501, "run_id": 4}), Some(json!({"id": 9}))),
            1,
            42,
        )
        .unwrap();
        let ToolRow::Result(result) = &rows[0] else {
            panic!("expected result");
        };
        assert_eq!(result.run_id, 4);
    }

    #[test]
    fn test_plan_emits_entries_with_summed_counts() {
        let rows = parse_record(
            EntityKind::Plan,
            &raw(
                json!({
                    "id": 80,
                    "name": "Release 1.0",
                    "passed_count": 5,
                    "entries": [{
                        "id": "3933d74b-4282-4c1f-be62-a641ab427063",
                        "suite_id": 2,
                        "name": "Browsers",
                        "include_all": true,
                        "runs": [
                            {"id": 81, "passed_count": 2, "failed_count": 1},
                            {"id": 82, "passed_count": 3, "blocked_count": 4}
                        ]
                    }]
                }),
                Some(json!({"id": 80})),
            ),
            1,
            42,
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        let ToolRow::Plan(plan) = &rows[0] else {
            panic!("expected plan first");
        };
        assert_eq!(plan.counts.passed_count, 5);
        assert_eq!(plan.project_id, 42);

        let ToolRow::PlanEntry(entry) = &rows[1] else {
            panic!("expected plan entry");
        };
        assert_eq!(entry.plan_id, 80);
        assert_eq!(entry.counts.passed_count, 5);
        assert_eq!(entry.counts.failed_count, 1);
        assert_eq!(entry.counts.blocked_count, 4);
        assert!(entry.include_all);
    }

    #[test]
    fn test_plan_without_entries() {
        let rows = parse_record(
            EntityKind::Plan,
            &raw(json!({"id": 80, "name": "Empty", "entries": null}), None),
            1,
            42,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_plan_entry_without_id_is_parse_error() {
        let err = parse_record(
            EntityKind::Plan,
            &raw(json!({"id": 80, "entries": [{"name": "x"}]}), None),
            1,
            42,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_case_field_global_flag() {
        let rows = parse_record(
            EntityKind::CaseField,
            &raw(
                json!({
                    "id": 3,
                    "system_name": "custom_automation_type",
                    "type_id": 6,
                    "configs": [
                        {"context": {"is_global": false, "project_ids": [1]}},
                        {"context": {"is_global": true, "project_ids": null}}
                    ]
                }),
                None,
            ),
            1,
            42,
        )
        .unwrap();
        let ToolRow::CaseField(field) = &rows[0] else {
            panic!("expected case field");
        };
        assert!(field.is_global);
    }

    #[test]
    fn test_malformed_record_is_parse_error() {
        for data in [json!({"id": "not a number"}), json!([1, 2]), json!("text")] {
            let err = parse_record(EntityKind::Run, &raw(data, None), 1, 42).unwrap_err();
            match err {
                Error::Parse { entity, .. } => assert_eq!(entity, "run"),
                other => panic!("expected parse error, got {:?}", other),
            }
        }
    }
}
