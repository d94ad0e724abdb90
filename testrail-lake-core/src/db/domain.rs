//! Domain-layer operations
//!
//! Conversion upserts by domain id and never deletes.

use super::repo::Database;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

impl Database {
    // ============================================
    // Domain row operations
    // ============================================

    /// Insert or update any domain row
    pub fn upsert_domain_row(&self, row: &DomainRow) -> Result<()> {
        let conn = self.connection();
        match row {
            DomainRow::Project(p) => upsert_qa_project(&conn, p),
            DomainRow::TestCase(c) => upsert_qa_test_case(&conn, c),
            DomainRow::TestRun(r) => upsert_qa_test_run(&conn, r),
            DomainRow::Execution(e) => upsert_qa_execution(&conn, e),
        }
    }

    pub fn get_qa_project(&self, id: &str) -> Result<Option<QaProject>> {
        let conn = self.connection();
        conn.query_row("SELECT * FROM qa_projects WHERE id = ?", [id], |row| {
            Ok(QaProject {
                id: row.get("id")?,
                name: row.get("name")?,
            })
        })
        .optional()
        .map_err(Error::from)
    }

    pub fn get_qa_test_case(&self, id: &str) -> Result<Option<QaTestCase>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM qa_test_cases WHERE id = ?",
            [id],
            Self::row_to_qa_test_case,
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn get_qa_test_run(&self, id: &str) -> Result<Option<QaTestRun>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM qa_test_runs WHERE id = ?",
            [id],
            Self::row_to_qa_test_run,
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn get_qa_execution(&self, id: &str) -> Result<Option<QaTestCaseExecution>> {
        let conn = self.connection();
        conn.query_row(
            "SELECT * FROM qa_test_case_executions WHERE id = ?",
            [id],
            Self::row_to_qa_execution,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Test runs of one domain project, ordered by id
    pub fn list_qa_test_runs(&self, qa_project_id: &str) -> Result<Vec<QaTestRun>> {
        let conn = self.connection();
        let mut stmt =
            conn.prepare("SELECT * FROM qa_test_runs WHERE qa_project_id = ? ORDER BY id")?;
        let rows = stmt.query_map([qa_project_id], Self::row_to_qa_test_run)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Executions of one domain project, ordered by id
    pub fn list_qa_executions(&self, qa_project_id: &str) -> Result<Vec<QaTestCaseExecution>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT * FROM qa_test_case_executions WHERE qa_project_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map([qa_project_id], Self::row_to_qa_execution)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Row count of a `qa_*` table
    pub fn count_domain_rows(&self, table: DomainTable) -> Result<i64> {
        let conn = self.connection();
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.as_str()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_qa_test_case(row: &Row) -> rusqlite::Result<QaTestCase> {
        let create_time_str: String = row.get("create_time")?;
        let attributes_str: String = row.get("custom_attributes")?;

        Ok(QaTestCase {
            id: row.get("id")?,
            name: row.get("name")?,
            qa_project_id: row.get("qa_project_id")?,
            create_time: parse_time(&create_time_str),
            creator_id: row.get("creator_id")?,
            test_type: row.get("type")?,
            priority: row.get("priority")?,
            is_automated: row.get("is_automated")?,
            custom_attributes: serde_json::from_str(&attributes_str)
                .unwrap_or(serde_json::json!({})),
        })
    }

    fn row_to_qa_test_run(row: &Row) -> rusqlite::Result<QaTestRun> {
        let start_str: String = row.get("start_time")?;
        let finish_str: Option<String> = row.get("finish_time")?;
        let status_str: String = row.get("status")?;

        Ok(QaTestRun {
            id: row.get("id")?,
            qa_project_id: row.get("qa_project_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            start_time: parse_time(&start_str),
            finish_time: finish_str.as_deref().map(parse_time),
            status: RunStatus::parse(&status_str).unwrap_or(RunStatus::InProgress),
            passed_count: row.get("passed_count")?,
            failed_count: row.get("failed_count")?,
            skipped_count: row.get("skipped_count")?,
            total_count: row.get("total_count")?,
        })
    }

    fn row_to_qa_execution(row: &Row) -> rusqlite::Result<QaTestCaseExecution> {
        let create_str: String = row.get("create_time")?;
        let start_str: String = row.get("start_time")?;
        let finish_str: String = row.get("finish_time")?;

        Ok(QaTestCaseExecution {
            id: row.get("id")?,
            qa_project_id: row.get("qa_project_id")?,
            qa_test_case_id: row.get("qa_test_case_id")?,
            qa_test_run_id: row.get("qa_test_run_id")?,
            create_time: parse_time(&create_str),
            start_time: parse_time(&start_str),
            finish_time: parse_time(&finish_str),
            creator_id: row.get("creator_id")?,
            status: row.get("status")?,
        })
    }
}

/// The `qa_*` tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainTable {
    Projects,
    TestCases,
    TestRuns,
    Executions,
}

impl DomainTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainTable::Projects => "qa_projects",
            DomainTable::TestCases => "qa_test_cases",
            DomainTable::TestRuns => "qa_test_runs",
            DomainTable::Executions => "qa_test_case_executions",
        }
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn upsert_qa_project(conn: &Connection, p: &QaProject) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO qa_projects (id, name) VALUES (?1, ?2)
        ON CONFLICT(id) DO UPDATE SET name = excluded.name
        "#,
        params![p.id, p.name],
    )?;
    Ok(())
}

fn upsert_qa_test_case(conn: &Connection, c: &QaTestCase) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO qa_test_cases
            (id, name, qa_project_id, create_time, creator_id, type, priority, is_automated,
             custom_attributes)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            qa_project_id = excluded.qa_project_id,
            create_time = excluded.create_time,
            creator_id = excluded.creator_id,
            type = excluded.type,
            priority = excluded.priority,
            is_automated = excluded.is_automated,
            custom_attributes = excluded.custom_attributes
        "#,
        params![
            c.id,
            c.name,
            c.qa_project_id,
            c.create_time.to_rfc3339(),
            c.creator_id,
            c.test_type,
            c.priority,
            c.is_automated,
            c.custom_attributes.to_string(),
        ],
    )?;
    Ok(())
}

fn upsert_qa_test_run(conn: &Connection, r: &QaTestRun) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO qa_test_runs
            (id, qa_project_id, name, description, start_time, finish_time, status,
             passed_count, failed_count, skipped_count, total_count)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(id) DO UPDATE SET
            qa_project_id = excluded.qa_project_id,
            name = excluded.name,
            description = excluded.description,
            start_time = excluded.start_time,
            finish_time = excluded.finish_time,
            status = excluded.status,
            passed_count = excluded.passed_count,
            failed_count = excluded.failed_count,
            skipped_count = excluded.skipped_count,
            total_count = excluded.total_count
        "#,
        params![
            r.id,
            r.qa_project_id,
            r.name,
            r.description,
            r.start_time.to_rfc3339(),
            r.finish_time.map(|t| t.to_rfc3339()),
            r.status.as_str(),
            r.passed_count,
            r.failed_count,
            r.skipped_count,
            r.total_count,
        ],
    )?;
    Ok(())
}

fn upsert_qa_execution(conn: &Connection, e: &QaTestCaseExecution) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO qa_test_case_executions
            (id, qa_project_id, qa_test_case_id, qa_test_run_id, create_time, start_time,
             finish_time, creator_id, status)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            qa_project_id = excluded.qa_project_id,
            qa_test_case_id = excluded.qa_test_case_id,
            qa_test_run_id = excluded.qa_test_run_id,
            create_time = excluded.create_time,
            start_time = excluded.start_time,
            finish_time = excluded.finish_time,
            creator_id = excluded.creator_id,
            status = excluded.status
        "#,
        params![
            e.id,
            e.qa_project_id,
            e.qa_test_case_id,
            e.qa_test_run_id,
            e.create_time.to_rfc3339(),
            e.start_time.to_rfc3339(),
            e.finish_time.to_rfc3339(),
            e.creator_id,
            e.status,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_upsert_run_by_domain_id() {
        let db = test_db();
        let mut run = QaTestRun {
            id: "testrail:TestrailRun:1:5".to_string(),
            qa_project_id: "testrail:TestrailProject:1:1".to_string(),
            name: "Nightly".to_string(),
            description: None,
            start_time: from_unix(1_700_000_000),
            finish_time: None,
            status: RunStatus::InProgress,
            passed_count: 1,
            failed_count: 0,
            skipped_count: 0,
            total_count: 3,
        };
        db.upsert_domain_row(&DomainRow::TestRun(run.clone())).unwrap();

        run.status = RunStatus::Completed;
        run.finish_time = Some(from_unix(1_700_003_600));
        db.upsert_domain_row(&DomainRow::TestRun(run.clone())).unwrap();

        assert_eq!(db.count_domain_rows(DomainTable::TestRuns).unwrap(), 1);
        assert_eq!(db.get_qa_test_run(&run.id).unwrap(), Some(run));
    }

    #[test]
    fn test_execution_roundtrip() {
        let db = test_db();
        let execution = QaTestCaseExecution {
            id: "testrail:TestrailResult:1:900".to_string(),
            qa_project_id: "testrail:TestrailProject:1:1".to_string(),
            qa_test_case_id: "testrail:TestrailCase:1:7".to_string(),
            qa_test_run_id: "testrail:TestrailRun:1:5".to_string(),
            create_time: from_unix(1_700_000_100),
            start_time: from_unix(1_700_000_100),
            finish_time: from_unix(1_700_000_100),
            creator_id: Some("testrail:TestrailUser:1:3".to_string()),
            status: "FAILED".to_string(),
        };
        db.upsert_domain_row(&DomainRow::Execution(execution.clone()))
            .unwrap();

        assert_eq!(
            db.list_qa_executions("testrail:TestrailProject:1:1").unwrap(),
            vec![execution]
        );
        assert!(db.get_qa_execution("missing").unwrap().is_none());
    }
}
