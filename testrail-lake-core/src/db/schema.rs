//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: raw staging + tool layer
    r#"
    -- ============================================
    -- LAYER 0: Raw API payloads (append, replace per scope)
    -- ============================================

    CREATE TABLE IF NOT EXISTS _raw_testrail_data (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        table_name  TEXT NOT NULL,
        params      TEXT NOT NULL,
        data        JSON NOT NULL,
        url         TEXT NOT NULL,
        input       JSON,
        created_at  DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_raw_scope ON _raw_testrail_data(table_name, params, id);

    -- ============================================
    -- LAYER 1: Tool layer (mirror of TestRail entities)
    -- ============================================

    CREATE TABLE IF NOT EXISTS _tool_testrail_projects (
        connection_id     INTEGER NOT NULL,
        id                INTEGER NOT NULL,
        name              TEXT NOT NULL,
        announcement      TEXT,
        show_announcement INTEGER NOT NULL DEFAULT 0,
        is_completed      INTEGER NOT NULL DEFAULT 0,
        completed_on      INTEGER,
        suite_mode        INTEGER NOT NULL DEFAULT 0,
        url               TEXT,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_suites (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        project_id    INTEGER NOT NULL,
        name          TEXT NOT NULL,
        description   TEXT,
        url           TEXT,
        is_baseline   INTEGER NOT NULL DEFAULT 0,
        is_master     INTEGER NOT NULL DEFAULT 0,
        is_completed  INTEGER NOT NULL DEFAULT 0,
        completed_on  INTEGER,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_sections (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        project_id    INTEGER NOT NULL,
        suite_id      INTEGER,
        parent_id     INTEGER,
        name          TEXT NOT NULL,
        description   TEXT,
        display_order INTEGER NOT NULL DEFAULT 0,
        depth         INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_milestones (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        project_id    INTEGER NOT NULL,
        parent_id     INTEGER,
        name          TEXT NOT NULL,
        description   TEXT,
        refs          TEXT,
        url           TEXT,
        start_on      INTEGER,
        started_on    INTEGER,
        due_on        INTEGER,
        is_started    INTEGER NOT NULL DEFAULT 0,
        is_completed  INTEGER NOT NULL DEFAULT 0,
        completed_on  INTEGER,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_plans (
        connection_id  INTEGER NOT NULL,
        id             INTEGER NOT NULL,
        project_id     INTEGER NOT NULL,
        name           TEXT NOT NULL,
        description    TEXT,
        milestone_id   INTEGER,
        assignedto_id  INTEGER,
        is_completed   INTEGER NOT NULL DEFAULT 0,
        completed_on   INTEGER,
        created_on     INTEGER NOT NULL DEFAULT 0,
        created_by     INTEGER,
        url            TEXT,
        passed_count   INTEGER NOT NULL DEFAULT 0,
        blocked_count  INTEGER NOT NULL DEFAULT 0,
        untested_count INTEGER NOT NULL DEFAULT 0,
        retest_count   INTEGER NOT NULL DEFAULT 0,
        failed_count   INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_plan_entries (
        connection_id  INTEGER NOT NULL,
        id             TEXT NOT NULL,
        plan_id        INTEGER NOT NULL,
        project_id     INTEGER NOT NULL,
        suite_id       INTEGER,
        name           TEXT NOT NULL,
        description    TEXT,
        assignedto_id  INTEGER,
        include_all    INTEGER NOT NULL DEFAULT 0,
        passed_count   INTEGER NOT NULL DEFAULT 0,
        blocked_count  INTEGER NOT NULL DEFAULT 0,
        untested_count INTEGER NOT NULL DEFAULT 0,
        retest_count   INTEGER NOT NULL DEFAULT 0,
        failed_count   INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_runs (
        connection_id  INTEGER NOT NULL,
        id             INTEGER NOT NULL,
        project_id     INTEGER NOT NULL,
        suite_id       INTEGER,
        name           TEXT NOT NULL,
        description    TEXT,
        milestone_id   INTEGER,
        plan_id        INTEGER,
        assignedto_id  INTEGER,
        is_completed   INTEGER NOT NULL DEFAULT 0,
        completed_on   INTEGER,
        passed_count   INTEGER NOT NULL DEFAULT 0,
        blocked_count  INTEGER NOT NULL DEFAULT 0,
        untested_count INTEGER NOT NULL DEFAULT 0,
        retest_count   INTEGER NOT NULL DEFAULT 0,
        failed_count   INTEGER NOT NULL DEFAULT 0,
        created_on     INTEGER NOT NULL DEFAULT 0,
        created_by     INTEGER,
        url            TEXT,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_results (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        project_id    INTEGER NOT NULL,
        run_id        INTEGER NOT NULL,
        case_id       INTEGER,
        test_id       INTEGER,
        status_id     INTEGER,
        created_by    INTEGER,
        created_on    INTEGER NOT NULL DEFAULT 0,
        elapsed       TEXT,
        comment       TEXT,
        version       TEXT,
        defects       TEXT,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_cases (
        connection_id     INTEGER NOT NULL,
        id                INTEGER NOT NULL,
        project_id        INTEGER NOT NULL,
        suite_id          INTEGER,
        section_id        INTEGER,
        title             TEXT NOT NULL,
        type_id           INTEGER,
        priority_id       INTEGER,
        template_id       INTEGER,
        milestone_id      INTEGER,
        refs              TEXT,
        estimate          TEXT,
        estimate_forecast TEXT,
        created_by        INTEGER,
        created_on        INTEGER NOT NULL DEFAULT 0,
        updated_by        INTEGER,
        updated_on        INTEGER NOT NULL DEFAULT 0,
        custom_fields     JSON NOT NULL DEFAULT '{}',
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_users (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        name          TEXT NOT NULL,
        email         TEXT,
        is_active     INTEGER NOT NULL DEFAULT 0,
        role_id       INTEGER,
        role          TEXT,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_case_fields (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        system_name   TEXT NOT NULL,
        label         TEXT,
        name          TEXT,
        description   TEXT,
        type_id       INTEGER NOT NULL DEFAULT 0,
        is_global     INTEGER NOT NULL DEFAULT 0,
        is_active     INTEGER NOT NULL DEFAULT 0,
        display_order INTEGER NOT NULL DEFAULT 0,
        include_all   INTEGER NOT NULL DEFAULT 0,
        template_ids  JSON NOT NULL DEFAULT '[]',
        configs       JSON NOT NULL DEFAULT '[]',
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_case_types (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        name          TEXT NOT NULL,
        is_default    INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_priorities (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        name          TEXT NOT NULL,
        short_name    TEXT,
        priority      INTEGER NOT NULL DEFAULT 0,
        is_default    INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (connection_id, id)
    );

    CREATE TABLE IF NOT EXISTS _tool_testrail_statuses (
        connection_id INTEGER NOT NULL,
        id            INTEGER NOT NULL,
        name          TEXT NOT NULL,
        label         TEXT,
        color_dark    INTEGER NOT NULL DEFAULT 0,
        color_medium  INTEGER NOT NULL DEFAULT 0,
        color_bright  INTEGER NOT NULL DEFAULT 0,
        is_final      INTEGER NOT NULL DEFAULT 0,
        is_system     INTEGER NOT NULL DEFAULT 0,
        is_untested   INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (connection_id, id)
    );

    CREATE INDEX IF NOT EXISTS idx_suites_project ON _tool_testrail_suites(connection_id, project_id);
    CREATE INDEX IF NOT EXISTS idx_runs_project ON _tool_testrail_runs(connection_id, project_id);
    CREATE INDEX IF NOT EXISTS idx_results_project ON _tool_testrail_results(connection_id, project_id);
    CREATE INDEX IF NOT EXISTS idx_cases_project ON _tool_testrail_cases(connection_id, project_id);
    CREATE INDEX IF NOT EXISTS idx_plan_entries_plan ON _tool_testrail_plan_entries(connection_id, plan_id);
    "#,
    // Version 2: QA domain layer
    r#"
    -- ============================================
    -- LAYER 2: Domain (source-agnostic QA model)
    -- ============================================

    CREATE TABLE IF NOT EXISTS qa_projects (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS qa_test_cases (
        id                TEXT PRIMARY KEY,
        name              TEXT NOT NULL,
        qa_project_id     TEXT NOT NULL,
        create_time       DATETIME NOT NULL,
        creator_id        TEXT,
        type              TEXT NOT NULL,
        priority          TEXT NOT NULL,
        is_automated      INTEGER NOT NULL DEFAULT 0,
        custom_attributes JSON NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS qa_test_runs (
        id            TEXT PRIMARY KEY,
        qa_project_id TEXT NOT NULL,
        name          TEXT NOT NULL,
        description   TEXT,
        start_time    DATETIME NOT NULL,
        finish_time   DATETIME,
        status        TEXT NOT NULL,
        passed_count  INTEGER NOT NULL DEFAULT 0,
        failed_count  INTEGER NOT NULL DEFAULT 0,
        skipped_count INTEGER NOT NULL DEFAULT 0,
        total_count   INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS qa_test_case_executions (
        id              TEXT PRIMARY KEY,
        qa_project_id   TEXT NOT NULL,
        qa_test_case_id TEXT NOT NULL,
        qa_test_run_id  TEXT NOT NULL,
        create_time     DATETIME NOT NULL,
        start_time      DATETIME NOT NULL,
        finish_time     DATETIME NOT NULL,
        creator_id      TEXT,
        status          TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_qa_cases_project ON qa_test_cases(qa_project_id);
    CREATE INDEX IF NOT EXISTS idx_qa_runs_project ON qa_test_runs(qa_project_id);
    CREATE INDEX IF NOT EXISTS idx_qa_exec_run ON qa_test_case_executions(qa_test_run_id);
    "#,
    // Version 3: per-project scope configuration
    r#"
    CREATE TABLE IF NOT EXISTS _tool_testrail_scope_configs (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        connection_id INTEGER NOT NULL,
        project_id    INTEGER NOT NULL,
        config        JSON NOT NULL,
        updated_at    DATETIME NOT NULL,
        UNIQUE (connection_id, project_id)
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = [
            "_raw_testrail_data",
            "_tool_testrail_projects",
            "_tool_testrail_suites",
            "_tool_testrail_sections",
            "_tool_testrail_milestones",
            "_tool_testrail_plans",
            "_tool_testrail_plan_entries",
            "_tool_testrail_runs",
            "_tool_testrail_results",
            "_tool_testrail_cases",
            "_tool_testrail_users",
            "_tool_testrail_case_fields",
            "_tool_testrail_case_types",
            "_tool_testrail_priorities",
            "_tool_testrail_statuses",
            "_tool_testrail_scope_configs",
            "qa_projects",
            "qa_test_cases",
            "qa_test_runs",
            "qa_test_case_executions",
        ];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_tool_tables_keyed_by_connection_and_id() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO _tool_testrail_case_types (connection_id, id, name) VALUES (1, 1, 'Acceptance')",
            [],
        )
        .unwrap();
        // Same remote id on another connection is a distinct row
        conn.execute(
            "INSERT INTO _tool_testrail_case_types (connection_id, id, name) VALUES (2, 1, 'Acceptance')",
            [],
        )
        .unwrap();
        let duplicate = conn.execute(
            "INSERT INTO _tool_testrail_case_types (connection_id, id, name) VALUES (1, 1, 'Other')",
            [],
        );
        assert!(duplicate.is_err());
    }
}
