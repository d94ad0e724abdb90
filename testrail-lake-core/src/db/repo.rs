//! Database repository layer
//!
//! `Database` owns the single SQLite connection. Operations are grouped by
//! layer: raw staging lives here, tool/domain/scope-config operations live in
//! their sibling modules as further `impl Database` blocks.

use crate::error::{Error, Result};
use crate::models::ApiParams;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// One staged API record
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Monotonic row id (insertion order)
    pub id: i64,
    pub table_name: String,
    /// Canonical `ApiParams` JSON
    pub params: String,
    /// The record exactly as returned by the API
    pub data: String,
    /// Request URL the record came from
    pub url: String,
    /// Parent record for fan-out collections
    pub input: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RawRecord {
    /// Parse the fan-out input, if any
    pub fn input_json(&self) -> Option<serde_json::Value> {
        self.input
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Raw data operations
    // ============================================

    /// Remove every raw row previously staged for `(table, params)`.
    ///
    /// Returns the number of rows removed.
    pub fn delete_raw(&self, table: &str, params: &ApiParams) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM _raw_testrail_data WHERE table_name = ?1 AND params = ?2",
            params![table, params.to_json()],
        )?;
        Ok(removed)
    }

    /// Stage one page of records in a single transaction.
    pub fn insert_raw_page(
        &self,
        table: &str,
        params: &ApiParams,
        url: &str,
        input: Option<&serde_json::Value>,
        records: &[serde_json::Value],
    ) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let params_json = params.to_json();
        let input_json = input.map(|v| v.to_string());
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO _raw_testrail_data (table_name, params, data, url, input, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for record in records {
                stmt.execute(params![
                    table,
                    params_json,
                    record.to_string(),
                    url,
                    input_json,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Fetch the next batch of raw rows for `(table, params)` after `after_id`.
    pub fn raw_batch(
        &self,
        table: &str,
        params: &ApiParams,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<RawRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT * FROM _raw_testrail_data
            WHERE table_name = ?1 AND params = ?2 AND id > ?3
            ORDER BY id
            LIMIT ?4
            "#,
        )?;
        let rows = stmt.query_map(
            params![table, params.to_json(), after_id, limit as i64],
            Self::row_to_raw_record,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Count raw rows staged for `(table, params)`
    pub fn count_raw(&self, table: &str, params: &ApiParams) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM _raw_testrail_data WHERE table_name = ?1 AND params = ?2",
            params![table, params.to_json()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_raw_record(row: &Row) -> rusqlite::Result<RawRecord> {
        let created_at_str: String = row.get("created_at")?;

        Ok(RawRecord {
            id: row.get("id")?,
            table_name: row.get("table_name")?,
            params: row.get("params")?,
            data: row.get("data")?,
            url: row.get("url")?,
            input: row.get("input")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
