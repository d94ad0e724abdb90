//! Scope configuration persistence

use super::repo::Database;
use crate::error::Result;
use crate::models::ScopeConfig;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

impl Database {
    // ============================================
    // Scope config operations
    // ============================================

    /// Store the scope config for a (connection, project) pair, replacing any previous one
    pub fn upsert_scope_config(
        &self,
        connection_id: i64,
        project_id: i64,
        config: &ScopeConfig,
    ) -> Result<()> {
        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO _tool_testrail_scope_configs (connection_id, project_id, config, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(connection_id, project_id) DO UPDATE SET
                config = excluded.config,
                updated_at = excluded.updated_at
            "#,
            params![
                connection_id,
                project_id,
                serde_json::to_string(config)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load the stored scope config for a (connection, project) pair
    pub fn get_scope_config(
        &self,
        connection_id: i64,
        project_id: i64,
    ) -> Result<Option<ScopeConfig>> {
        let conn = self.connection();
        let stored: Option<String> = conn
            .query_row(
                "SELECT config FROM _tool_testrail_scope_configs WHERE connection_id = ?1 AND project_id = ?2",
                params![connection_id, project_id],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_config_unique_per_project() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        assert!(db.get_scope_config(1, 1).unwrap().is_none());

        let first = ScopeConfig {
            include_suite_ids: vec![1],
            ..Default::default()
        };
        db.upsert_scope_config(1, 1, &first).unwrap();

        let second = ScopeConfig {
            include_suite_ids: vec![2],
            ..Default::default()
        };
        db.upsert_scope_config(1, 1, &second).unwrap();

        assert_eq!(db.get_scope_config(1, 1).unwrap(), Some(second));
        assert!(db.get_scope_config(1, 2).unwrap().is_none());

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM _tool_testrail_scope_configs", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_stored_blob_with_null_fields() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        db.connection()
            .execute(
                "INSERT INTO _tool_testrail_scope_configs (connection_id, project_id, config, updated_at)
                 VALUES (1, 1, ?1, ?2)",
                params![
                    r#"{"statusMappings":{"5":{"standardStatus":"ABORTED"}},"typeMappings":null,"includeSuiteIds":null}"#,
                    Utc::now().to_rfc3339(),
                ],
            )
            .unwrap();

        let config = db.get_scope_config(1, 1).unwrap().unwrap();
        assert_eq!(config.status_mappings["5"].standard_status, "ABORTED");
        assert!(config.type_mappings.is_empty());
        assert!(config.include_suite_ids.is_empty());
    }
}
