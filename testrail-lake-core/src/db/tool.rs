//! Tool-layer operations
//!
//! Every upsert is keyed by `(connection_id, id)` so re-extraction replaces
//! rows in place.

use super::repo::Database;
use crate::error::{Error, Result};
use crate::models::*;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// A tool row type that can be streamed back out of its table.
pub trait ToolRecord: Sized {
    /// Backing table
    const TABLE: &'static str;
    /// Column holding the project the row belongs to
    const PROJECT_COLUMN: &'static str;

    fn from_row(row: &Row) -> rusqlite::Result<Self>;

    /// Keyset position of the row
    fn key(&self) -> i64;
}

impl Database {
    // ============================================
    // Tool row operations
    // ============================================

    /// Insert or update any tool row
    pub fn upsert_tool_row(&self, row: &ToolRow) -> Result<()> {
        let conn = self.connection();
        match row {
            ToolRow::Project(r) => upsert_project(&conn, r),
            ToolRow::Suite(r) => upsert_suite(&conn, r),
            ToolRow::Section(r) => upsert_section(&conn, r),
            ToolRow::Milestone(r) => upsert_milestone(&conn, r),
            ToolRow::Plan(r) => upsert_plan(&conn, r),
            ToolRow::PlanEntry(r) => upsert_plan_entry(&conn, r),
            ToolRow::Run(r) => upsert_run(&conn, r),
            ToolRow::Result(r) => upsert_result(&conn, r),
            ToolRow::Case(r) => upsert_case(&conn, r),
            ToolRow::User(r) => upsert_user(&conn, r),
            ToolRow::CaseField(r) => upsert_case_field(&conn, r),
            ToolRow::CaseType(r) => upsert_case_type(&conn, r),
            ToolRow::Priority(r) => upsert_priority(&conn, r),
            ToolRow::Status(r) => upsert_status(&conn, r),
        }
    }

    /// Fetch the next batch of tool rows for one project scope, in id order.
    pub fn tool_batch<T: ToolRecord>(
        &self,
        connection_id: i64,
        project_id: i64,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<T>> {
        let conn = self.connection();
        let sql = format!(
            "SELECT * FROM {} WHERE connection_id = ?1 AND {} = ?2 AND id > ?3 ORDER BY id LIMIT ?4",
            T::TABLE,
            T::PROJECT_COLUMN
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![connection_id, project_id, after_id, limit as i64],
            T::from_row,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Get a case by key
    pub fn get_tool_case(&self, connection_id: i64, id: i64) -> Result<Option<TestrailCase>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM _tool_testrail_cases WHERE connection_id = ?1 AND id = ?2",
            params![connection_id, id],
            TestrailCase::from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Get a result by key
    pub fn get_tool_result(&self, connection_id: i64, id: i64) -> Result<Option<TestrailResult>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM _tool_testrail_results WHERE connection_id = ?1 AND id = ?2",
            params![connection_id, id],
            TestrailResult::from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Plan entries of one plan, ordered by entry id
    pub fn get_plan_entries(&self, connection_id: i64, plan_id: i64) -> Result<Vec<TestrailPlanEntry>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT * FROM _tool_testrail_plan_entries WHERE connection_id = ?1 AND plan_id = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![connection_id, plan_id], row_to_plan_entry)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Count rows of one tool entity for a connection
    pub fn count_tool_rows(&self, kind: EntityKind, connection_id: i64) -> Result<i64> {
        let conn = self.connection();
        let count = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE connection_id = ?1",
                tool_table(kind)
            ),
            [connection_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Tool table backing an entity kind
pub fn tool_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Project => "_tool_testrail_projects",
        EntityKind::Suite => "_tool_testrail_suites",
        EntityKind::Section => "_tool_testrail_sections",
        EntityKind::Milestone => "_tool_testrail_milestones",
        EntityKind::Plan => "_tool_testrail_plans",
        EntityKind::PlanEntry => "_tool_testrail_plan_entries",
        EntityKind::Run => "_tool_testrail_runs",
        EntityKind::Result => "_tool_testrail_results",
        EntityKind::Case => "_tool_testrail_cases",
        EntityKind::User => "_tool_testrail_users",
        EntityKind::CaseField => "_tool_testrail_case_fields",
        EntityKind::CaseType => "_tool_testrail_case_types",
        EntityKind::Priority => "_tool_testrail_priorities",
        EntityKind::Status => "_tool_testrail_statuses",
    }
}

// ============================================
// Upserts
// ============================================

fn upsert_project(conn: &Connection, p: &TestrailProject) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_projects
            (connection_id, id, name, announcement, show_announcement, is_completed,
             completed_on, suite_mode, url)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            name = excluded.name,
            announcement = excluded.announcement,
            show_announcement = excluded.show_announcement,
            is_completed = excluded.is_completed,
            completed_on = excluded.completed_on,
            suite_mode = excluded.suite_mode,
            url = excluded.url
        "#,
        params![
            p.connection_id,
            p.id,
            p.name,
            p.announcement,
            p.show_announcement,
            p.is_completed,
            p.completed_on,
            p.suite_mode,
            p.url,
        ],
    )?;
    Ok(())
}

fn upsert_suite(conn: &Connection, s: &TestrailSuite) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_suites
            (connection_id, id, project_id, name, description, url, is_baseline, is_master,
             is_completed, completed_on)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            project_id = excluded.project_id,
            name = excluded.name,
            description = excluded.description,
            url = excluded.url,
            is_baseline = excluded.is_baseline,
            is_master = excluded.is_master,
            is_completed = excluded.is_completed,
            completed_on = excluded.completed_on
        "#,
        params![
            s.connection_id,
            s.id,
            s.project_id,
            s.name,
            s.description,
            s.url,
            s.is_baseline,
            s.is_master,
            s.is_completed,
            s.completed_on,
        ],
    )?;
    Ok(())
}

fn upsert_section(conn: &Connection, s: &TestrailSection) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_sections
            (connection_id, id, project_id, suite_id, parent_id, name, description,
             display_order, depth)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            project_id = excluded.project_id,
            suite_id = excluded.suite_id,
            parent_id = excluded.parent_id,
            name = excluded.name,
            description = excluded.description,
            display_order = excluded.display_order,
            depth = excluded.depth
        "#,
        params![
            s.connection_id,
            s.id,
            s.project_id,
            s.suite_id,
            s.parent_id,
            s.name,
            s.description,
            s.display_order,
            s.depth,
        ],
    )?;
    Ok(())
}

fn upsert_milestone(conn: &Connection, m: &TestrailMilestone) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_milestones
            (connection_id, id, project_id, parent_id, name, description, refs, url,
             start_on, started_on, due_on, is_started, is_completed, completed_on)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            project_id = excluded.project_id,
            parent_id = excluded.parent_id,
            name = excluded.name,
            description = excluded.description,
            refs = excluded.refs,
            url = excluded.url,
            start_on = excluded.start_on,
            started_on = excluded.started_on,
            due_on = excluded.due_on,
            is_started = excluded.is_started,
            is_completed = excluded.is_completed,
            completed_on = excluded.completed_on
        "#,
        params![
            m.connection_id,
            m.id,
            m.project_id,
            m.parent_id,
            m.name,
            m.description,
            m.refs,
            m.url,
            m.start_on,
            m.started_on,
            m.due_on,
            m.is_started,
            m.is_completed,
            m.completed_on,
        ],
    )?;
    Ok(())
}

fn upsert_plan(conn: &Connection, p: &TestrailPlan) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_plans
            (connection_id, id, project_id, name, description, milestone_id, assignedto_id,
             is_completed, completed_on, created_on, created_by, url,
             passed_count, blocked_count, untested_count, retest_count, failed_count)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            project_id = excluded.project_id,
            name = excluded.name,
            description = excluded.description,
            milestone_id = excluded.milestone_id,
            assignedto_id = excluded.assignedto_id,
            is_completed = excluded.is_completed,
            completed_on = excluded.completed_on,
            created_on = excluded.created_on,
            created_by = excluded.created_by,
            url = excluded.url,
            passed_count = excluded.passed_count,
            blocked_count = excluded.blocked_count,
            untested_count = excluded.untested_count,
            retest_count = excluded.retest_count,
            failed_count = excluded.failed_count
        "#,
        params![
            p.connection_id,
            p.id,
            p.project_id,
            p.name,
            p.description,
            p.milestone_id,
            p.assignedto_id,
            p.is_completed,
            p.completed_on,
            p.created_on,
            p.created_by,
            p.url,
            p.counts.passed_count,
            p.counts.blocked_count,
            p.counts.untested_count,
            p.counts.retest_count,
            p.counts.failed_count,
        ],
    )?;
    Ok(())
}

fn upsert_plan_entry(conn: &Connection, e: &TestrailPlanEntry) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_plan_entries
            (connection_id, id, plan_id, project_id, suite_id, name, description,
             assignedto_id, include_all,
             passed_count, blocked_count, untested_count, retest_count, failed_count)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            plan_id = excluded.plan_id,
            project_id = excluded.project_id,
            suite_id = excluded.suite_id,
            name = excluded.name,
            description = excluded.description,
            assignedto_id = excluded.assignedto_id,
            include_all = excluded.include_all,
            passed_count = excluded.passed_count,
            blocked_count = excluded.blocked_count,
            untested_count = excluded.untested_count,
            retest_count = excluded.retest_count,
            failed_count = excluded.failed_count
        "#,
        params![
            e.connection_id,
            e.id,
            e.plan_id,
            e.project_id,
            e.suite_id,
            e.name,
            e.description,
            e.assignedto_id,
            e.include_all,
            e.counts.passed_count,
            e.counts.blocked_count,
            e.counts.untested_count,
            e.counts.retest_count,
            e.counts.failed_count,
        ],
    )?;
    Ok(())
}

fn upsert_run(conn: &Connection, r: &TestrailRun) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_runs
            (connection_id, id, project_id, suite_id, name, description, milestone_id, plan_id,
             assignedto_id, is_completed, completed_on,
             passed_count, blocked_count, untested_count, retest_count, failed_count,
             created_on, created_by, url)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            project_id = excluded.project_id,
            suite_id = excluded.suite_id,
            name = excluded.name,
            description = excluded.description,
            milestone_id = excluded.milestone_id,
            plan_id = excluded.plan_id,
            assignedto_id = excluded.assignedto_id,
            is_completed = excluded.is_completed,
            completed_on = excluded.completed_on,
            passed_count = excluded.passed_count,
            blocked_count = excluded.blocked_count,
            untested_count = excluded.untested_count,
            retest_count = excluded.retest_count,
            failed_count = excluded.failed_count,
            created_on = excluded.created_on,
            created_by = excluded.created_by,
            url = excluded.url
        "#,
        params![
            r.connection_id,
            r.id,
            r.project_id,
            r.suite_id,
            r.name,
            r.description,
            r.milestone_id,
            r.plan_id,
            r.assignedto_id,
            r.is_completed,
            r.completed_on,
            r.counts.passed_count,
            r.counts.blocked_count,
            r.counts.untested_count,
            r.counts.retest_count,
            r.counts.failed_count,
            r.created_on,
            r.created_by,
            r.url,
        ],
    )?;
    Ok(())
}

fn upsert_result(conn: &Connection, r: &TestrailResult) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_results
            (connection_id, id, project_id, run_id, case_id, test_id, status_id, created_by,
             created_on, elapsed, comment, version, defects)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            project_id = excluded.project_id,
            run_id = excluded.run_id,
            case_id = excluded.case_id,
            test_id = excluded.test_id,
            status_id = excluded.status_id,
            created_by = excluded.created_by,
            created_on = excluded.created_on,
            elapsed = excluded.elapsed,
            comment = excluded.comment,
            version = excluded.version,
            defects = excluded.defects
        "#,
        params![
            r.connection_id,
            r.id,
            r.project_id,
            r.run_id,
            r.case_id,
            r.test_id,
            r.status_id,
            r.created_by,
            r.created_on,
            r.elapsed,
            r.comment,
            r.version,
            r.defects,
        ],
    )?;
    Ok(())
}

fn upsert_case(conn: &Connection, c: &TestrailCase) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_cases
            (connection_id, id, project_id, suite_id, section_id, title, type_id, priority_id,
             template_id, milestone_id, refs, estimate, estimate_forecast, created_by,
             created_on, updated_by, updated_on, custom_fields)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            project_id = excluded.project_id,
            suite_id = excluded.suite_id,
            section_id = excluded.section_id,
            title = excluded.title,
            type_id = excluded.type_id,
            priority_id = excluded.priority_id,
            template_id = excluded.template_id,
            milestone_id = excluded.milestone_id,
            refs = excluded.refs,
            estimate = excluded.estimate,
            estimate_forecast = excluded.estimate_forecast,
            created_by = excluded.created_by,
            created_on = excluded.created_on,
            updated_by = excluded.updated_by,
            updated_on = excluded.updated_on,
            custom_fields = excluded.custom_fields
        "#,
        params![
            c.connection_id,
            c.id,
            c.project_id,
            c.suite_id,
            c.section_id,
            c.title,
            c.type_id,
            c.priority_id,
            c.template_id,
            c.milestone_id,
            c.refs,
            c.estimate,
            c.estimate_forecast,
            c.created_by,
            c.created_on,
            c.updated_by,
            c.updated_on,
            serde_json::Value::Object(c.custom_fields.clone()).to_string(),
        ],
    )?;
    Ok(())
}

fn upsert_user(conn: &Connection, u: &TestrailUser) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_users (connection_id, id, name, email, is_active, role_id, role)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            name = excluded.name,
            email = excluded.email,
            is_active = excluded.is_active,
            role_id = excluded.role_id,
            role = excluded.role
        "#,
        params![
            u.connection_id,
            u.id,
            u.name,
            u.email,
            u.is_active,
            u.role_id,
            u.role,
        ],
    )?;
    Ok(())
}

fn upsert_case_field(conn: &Connection, f: &TestrailCaseField) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_case_fields
            (connection_id, id, system_name, label, name, description, type_id, is_global,
             is_active, display_order, include_all, template_ids, configs)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            system_name = excluded.system_name,
            label = excluded.label,
            name = excluded.name,
            description = excluded.description,
            type_id = excluded.type_id,
            is_global = excluded.is_global,
            is_active = excluded.is_active,
            display_order = excluded.display_order,
            include_all = excluded.include_all,
            template_ids = excluded.template_ids,
            configs = excluded.configs
        "#,
        params![
            f.connection_id,
            f.id,
            f.system_name,
            f.label,
            f.name,
            f.description,
            f.type_id,
            f.is_global,
            f.is_active,
            f.display_order,
            f.include_all,
            serde_json::to_string(&f.template_ids)?,
            if f.configs.is_null() {
                "[]".to_string()
            } else {
                f.configs.to_string()
            },
        ],
    )?;
    Ok(())
}

fn upsert_case_type(conn: &Connection, t: &TestrailCaseType) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_case_types (connection_id, id, name, is_default)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            name = excluded.name,
            is_default = excluded.is_default
        "#,
        params![t.connection_id, t.id, t.name, t.is_default],
    )?;
    Ok(())
}

fn upsert_priority(conn: &Connection, p: &TestrailPriority) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_priorities
            (connection_id, id, name, short_name, priority, is_default)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            name = excluded.name,
            short_name = excluded.short_name,
            priority = excluded.priority,
            is_default = excluded.is_default
        "#,
        params![
            p.connection_id,
            p.id,
            p.name,
            p.short_name,
            p.priority,
            p.is_default,
        ],
    )?;
    Ok(())
}

fn upsert_status(conn: &Connection, s: &TestrailStatus) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO _tool_testrail_statuses
            (connection_id, id, name, label, color_dark, color_medium, color_bright,
             is_final, is_system, is_untested)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(connection_id, id) DO UPDATE SET
            name = excluded.name,
            label = excluded.label,
            color_dark = excluded.color_dark,
            color_medium = excluded.color_medium,
            color_bright = excluded.color_bright,
            is_final = excluded.is_final,
            is_system = excluded.is_system,
            is_untested = excluded.is_untested
        "#,
        params![
            s.connection_id,
            s.id,
            s.name,
            s.label,
            s.color_dark,
            s.color_medium,
            s.color_bright,
            s.is_final,
            s.is_system,
            s.is_untested,
        ],
    )?;
    Ok(())
}

// ============================================
// Row readers
// ============================================

fn row_to_counts(row: &Row) -> rusqlite::Result<StatusCounts> {
    Ok(StatusCounts {
        passed_count: row.get("passed_count")?,
        blocked_count: row.get("blocked_count")?,
        untested_count: row.get("untested_count")?,
        retest_count: row.get("retest_count")?,
        failed_count: row.get("failed_count")?,
    })
}

fn row_to_plan_entry(row: &Row) -> rusqlite::Result<TestrailPlanEntry> {
    Ok(TestrailPlanEntry {
        connection_id: row.get("connection_id")?,
        id: row.get("id")?,
        plan_id: row.get("plan_id")?,
        project_id: row.get("project_id")?,
        suite_id: row.get("suite_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        assignedto_id: row.get("assignedto_id")?,
        include_all: row.get("include_all")?,
        counts: row_to_counts(row)?,
    })
}

impl ToolRecord for TestrailProject {
    const TABLE: &'static str = "_tool_testrail_projects";
    const PROJECT_COLUMN: &'static str = "id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestrailProject {
            connection_id: row.get("connection_id")?,
            id: row.get("id")?,
            name: row.get("name")?,
            announcement: row.get("announcement")?,
            show_announcement: row.get("show_announcement")?,
            is_completed: row.get("is_completed")?,
            completed_on: row.get("completed_on")?,
            suite_mode: row.get("suite_mode")?,
            url: row.get::<_, Option<String>>("url")?.unwrap_or_default(),
        })
    }

    fn key(&self) -> i64 {
        self.id
    }
}

impl ToolRecord for TestrailSuite {
    const TABLE: &'static str = "_tool_testrail_suites";
    const PROJECT_COLUMN: &'static str = "project_id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestrailSuite {
            connection_id: row.get("connection_id")?,
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            url: row.get::<_, Option<String>>("url")?.unwrap_or_default(),
            is_baseline: row.get("is_baseline")?,
            is_master: row.get("is_master")?,
            is_completed: row.get("is_completed")?,
            completed_on: row.get("completed_on")?,
        })
    }

    fn key(&self) -> i64 {
        self.id
    }
}

impl ToolRecord for TestrailRun {
    const TABLE: &'static str = "_tool_testrail_runs";
    const PROJECT_COLUMN: &'static str = "project_id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestrailRun {
            connection_id: row.get("connection_id")?,
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            suite_id: row.get("suite_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            milestone_id: row.get("milestone_id")?,
            plan_id: row.get("plan_id")?,
            assignedto_id: row.get("assignedto_id")?,
            is_completed: row.get("is_completed")?,
            completed_on: row.get("completed_on")?,
            counts: row_to_counts(row)?,
            created_on: row.get("created_on")?,
            created_by: row.get("created_by")?,
            url: row.get::<_, Option<String>>("url")?.unwrap_or_default(),
        })
    }

    fn key(&self) -> i64 {
        self.id
    }
}

impl ToolRecord for TestrailResult {
    const TABLE: &'static str = "_tool_testrail_results";
    const PROJECT_COLUMN: &'static str = "project_id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TestrailResult {
            connection_id: row.get("connection_id")?,
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            run_id: row.get("run_id")?,
            case_id: row.get("case_id")?,
            test_id: row.get("test_id")?,
            status_id: row.get("status_id")?,
            created_by: row.get("created_by")?,
            created_on: row.get("created_on")?,
            elapsed: row.get("elapsed")?,
            comment: row.get("comment")?,
            version: row.get("version")?,
            defects: row.get("defects")?,
        })
    }

    fn key(&self) -> i64 {
        self.id
    }
}

impl ToolRecord for TestrailCase {
    const TABLE: &'static str = "_tool_testrail_cases";
    const PROJECT_COLUMN: &'static str = "project_id";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let custom_fields_str: String = row.get("custom_fields")?;
        let custom_fields = match serde_json::from_str(&custom_fields_str) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };

        Ok(TestrailCase {
            connection_id: row.get("connection_id")?,
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            suite_id: row.get("suite_id")?,
            section_id: row.get("section_id")?,
            title: row.get("title")?,
            type_id: row.get("type_id")?,
            priority_id: row.get("priority_id")?,
            template_id: row.get("template_id")?,
            milestone_id: row.get("milestone_id")?,
            refs: row.get("refs")?,
            estimate: row.get("estimate")?,
            estimate_forecast: row.get("estimate_forecast")?,
            created_by: row.get("created_by")?,
            created_on: row.get("created_on")?,
            updated_by: row.get("updated_by")?,
            updated_on: row.get("updated_on")?,
            custom_fields,
        })
    }

    fn key(&self) -> i64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn run(id: i64, project_id: i64, name: &str) -> TestrailRun {
        TestrailRun {
            connection_id: 1,
            id,
            project_id,
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_replaces_by_key() {
        let db = test_db();

        db.upsert_tool_row(&ToolRow::Run(run(10, 1, "first"))).unwrap();
        db.upsert_tool_row(&ToolRow::Run(run(10, 1, "renamed"))).unwrap();

        assert_eq!(db.count_tool_rows(EntityKind::Run, 1).unwrap(), 1);
        let runs: Vec<TestrailRun> = db.tool_batch(1, 1, 0, 10).unwrap();
        assert_eq!(runs[0].name, "renamed");
    }

    #[test]
    fn test_tool_batch_scoped_and_ordered() {
        let db = test_db();
        for (id, project) in [(3, 1), (1, 1), (2, 2), (5, 1)] {
            db.upsert_tool_row(&ToolRow::Run(run(id, project, "r"))).unwrap();
        }

        let first: Vec<TestrailRun> = db.tool_batch(1, 1, 0, 2).unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);

        let rest: Vec<TestrailRun> = db.tool_batch(1, 1, 3, 2).unwrap();
        assert_eq!(rest.iter().map(|r| r.id).collect::<Vec<_>>(), vec![5]);

        let other_conn: Vec<TestrailRun> = db.tool_batch(2, 1, 0, 10).unwrap();
        assert!(other_conn.is_empty());
    }

    #[test]
    fn test_case_custom_fields_roundtrip() {
        let db = test_db();
        let mut case = TestrailCase {
            connection_id: 1,
            id: 7,
            project_id: 1,
            title: "Login".to_string(),
            ..Default::default()
        };
        case.custom_fields
            .insert("custom_automated".to_string(), json!(true));

        db.upsert_tool_row(&ToolRow::Case(case.clone())).unwrap();

        let stored = db.get_tool_case(1, 7).unwrap().unwrap();
        assert_eq!(stored, case);
        assert!(db.get_tool_case(1, 8).unwrap().is_none());
    }

    #[test]
    fn test_project_batch_uses_project_id() {
        let db = test_db();
        for id in [1, 2] {
            db.upsert_tool_row(&ToolRow::Project(TestrailProject {
                connection_id: 1,
                id,
                name: format!("P{}", id),
                ..Default::default()
            }))
            .unwrap();
        }

        let projects: Vec<TestrailProject> = db.tool_batch(1, 2, 0, 10).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "P2");
    }
}
