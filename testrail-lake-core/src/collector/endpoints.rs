//! Per-entity collection
//!
//! Reference metadata, users, suites and the project itself come back in one
//! response. Everything else is paginated; sections and cases fan out over
//! the suites the scope allows, results fan out over the runs it allows.

use serde_json::{json, Value};

use super::pager::{ApiCollector, ApiCollectorArgs, CollectStats, QueryFn, ResponseParser, UrlTemplate};
use crate::error::Result;
use crate::ingest::TaskContext;
use crate::models::{raw_tables, EntityKind, TestrailRun, TestrailSuite};

/// Page size TestRail accepts at most
pub const MAX_PAGE_SIZE: usize = 250;

/// Collect one entity kind into the raw store
pub async fn collect(ctx: &TaskContext<'_>, kind: EntityKind) -> Result<CollectStats> {
    match kind {
        EntityKind::Status => single(ctx, raw_tables::STATUSES, "get_statuses", "statuses").await,
        EntityKind::Priority => {
            single(ctx, raw_tables::PRIORITIES, "get_priorities", "priorities").await
        }
        EntityKind::CaseType => {
            single(ctx, raw_tables::CASE_TYPES, "get_case_types", "case_types").await
        }
        EntityKind::CaseField => {
            single(ctx, raw_tables::CASE_FIELDS, "get_case_fields", "case_fields").await
        }
        EntityKind::User => single(ctx, raw_tables::USERS, "get_users", "users").await,
        EntityKind::Suite => {
            single(ctx, raw_tables::SUITES, "get_suites/{projectId}", "suites").await
        }
        EntityKind::Project => {
            let args = ApiCollectorArgs {
                parser: ResponseParser::single(),
                ..base_args(ctx, raw_tables::PROJECTS, "get_project/{projectId}")
            };
            execute(ctx, args).await
        }
        EntityKind::Milestone => {
            paged(
                ctx,
                raw_tables::MILESTONES,
                "get_milestones/{projectId}",
                "milestones",
                None,
            )
            .await
        }
        EntityKind::Run => {
            paged(
                ctx,
                raw_tables::RUNS,
                "get_runs/{projectId}",
                "runs",
                created_after(ctx),
            )
            .await
        }
        EntityKind::Section => {
            let args = ApiCollectorArgs {
                page_size: Some(page_size(ctx)),
                input: Some(allowed_suites(ctx)?),
                parser: ResponseParser::envelope("sections"),
                ..base_args(
                    ctx,
                    raw_tables::SECTIONS,
                    "get_sections/{projectId}&suite_id={input.id}",
                )
            };
            execute(ctx, args).await
        }
        EntityKind::Case => {
            let args = ApiCollectorArgs {
                page_size: Some(page_size(ctx)),
                query: created_after(ctx),
                input: Some(allowed_suites(ctx)?),
                parser: ResponseParser::envelope("cases"),
                ..base_args(
                    ctx,
                    raw_tables::CASES,
                    "get_cases/{projectId}&suite_id={input.id}",
                )
            };
            execute(ctx, args).await
        }
        EntityKind::Result => {
            let args = ApiCollectorArgs {
                page_size: Some(page_size(ctx)),
                input: Some(allowed_runs(ctx)?),
                parser: ResponseParser::envelope("results"),
                ..base_args(ctx, raw_tables::RESULTS, "get_results_for_run/{input.id}")
            };
            execute(ctx, args).await
        }
        EntityKind::Plan => collect_plans(ctx).await,
        EntityKind::PlanEntry => Ok(CollectStats::default()),
    }
}

/// Plan listings omit entries, so list the plans and then fetch each one.
async fn collect_plans(ctx: &TaskContext<'_>) -> Result<CollectStats> {
    let listing = ApiCollectorArgs {
        page_size: Some(page_size(ctx)),
        parser: ResponseParser::envelope("plans"),
        ..base_args(ctx, raw_tables::PLANS, "get_plans/{projectId}")
    };
    let plans = ApiCollector::new(ctx.db, ctx.api, ctx.cancel.clone(), listing)
        .fetch_all()
        .await?;

    let inputs: Vec<Value> = plans
        .iter()
        .filter_map(|plan| plan.get("id").cloned())
        .map(|id| json!({ "id": id }))
        .collect();

    tracing::debug!(plans = inputs.len(), "Listed plans");

    let args = ApiCollectorArgs {
        input: Some(inputs),
        parser: ResponseParser::single(),
        ..base_args(ctx, raw_tables::PLANS, "get_plan/{input.id}")
    };
    execute(ctx, args).await
}

async fn single(
    ctx: &TaskContext<'_>,
    table: &'static str,
    template: &str,
    key: &'static str,
) -> Result<CollectStats> {
    let args = ApiCollectorArgs {
        parser: ResponseParser::envelope(key),
        ..base_args(ctx, table, template)
    };
    execute(ctx, args).await
}

async fn paged(
    ctx: &TaskContext<'_>,
    table: &'static str,
    template: &str,
    key: &'static str,
    query: Option<QueryFn>,
) -> Result<CollectStats> {
    let args = ApiCollectorArgs {
        page_size: Some(page_size(ctx)),
        query,
        parser: ResponseParser::envelope(key),
        ..base_args(ctx, table, template)
    };
    execute(ctx, args).await
}

async fn execute(ctx: &TaskContext<'_>, args: ApiCollectorArgs) -> Result<CollectStats> {
    ApiCollector::new(ctx.db, ctx.api, ctx.cancel.clone(), args)
        .execute()
        .await
}

fn base_args(ctx: &TaskContext<'_>, table: &'static str, template: &str) -> ApiCollectorArgs {
    ApiCollectorArgs {
        table,
        params: ctx.params(),
        url_template: UrlTemplate::new(template),
        page_size: None,
        query: None,
        input: None,
        parser: ResponseParser::single(),
        concurrency: ctx.settings.fan_out_concurrency,
    }
}

fn page_size(ctx: &TaskContext<'_>) -> usize {
    ctx.settings.page_size.clamp(1, MAX_PAGE_SIZE)
}

fn created_after(ctx: &TaskContext<'_>) -> Option<QueryFn> {
    let after = ctx.options.created_date_after?.timestamp();
    Some(Box::new(move |_| {
        vec![("created_after".to_string(), after.to_string())]
    }))
}

/// Extracted suites of the project that pass the scope's suite filter
fn allowed_suites(ctx: &TaskContext<'_>) -> Result<Vec<Value>> {
    let mut inputs = Vec::new();
    for suite in ctx.db.tool_cursor::<TestrailSuite>(
        ctx.connection_id(),
        ctx.project_id(),
        ctx.settings.cursor_batch_size,
    ) {
        let suite = suite?;
        if ctx.scope().map_or(true, |s| s.suite_allowed(suite.id)) {
            inputs.push(json!({ "id": suite.id }));
        }
    }
    Ok(inputs)
}

/// Extracted runs of the project that pass the scope's milestone filter
fn allowed_runs(ctx: &TaskContext<'_>) -> Result<Vec<Value>> {
    let mut inputs = Vec::new();
    for run in ctx.db.tool_cursor::<TestrailRun>(
        ctx.connection_id(),
        ctx.project_id(),
        ctx.settings.cursor_batch_size,
    ) {
        let run = run?;
        if ctx.scope().map_or(true, |s| s.milestone_allowed(run.milestone_id)) {
            inputs.push(json!({ "id": run.id }));
        }
    }
    Ok(inputs)
}
