//! Run options and the per-run context handed to every subtask

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::collector::ApiClient;
use crate::config::PipelineConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{ApiParams, ScopeConfig};

/// Options for one (connection, project) run, as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskOptions {
    pub connection_id: i64,
    pub project_id: i64,
    pub name: Option<String>,
    pub title: Option<String>,
    /// Overrides the stored scope config when present
    pub scope_config: Option<ScopeConfig>,
    /// Only collect cases and runs created after this instant
    pub created_date_after: Option<DateTime<Utc>>,
}

impl TaskOptions {
    /// Decode options from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: TaskOptions = serde_json::from_str(json)
            .map_err(|e| Error::BadInput(format!("invalid task options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject options that cannot identify a scope.
    pub fn validate(&self) -> Result<()> {
        if self.connection_id <= 0 {
            return Err(Error::BadInput("connectionId is required".to_string()));
        }
        if self.project_id <= 0 {
            return Err(Error::BadInput("projectId is required".to_string()));
        }
        Ok(())
    }

    pub fn params(&self) -> ApiParams {
        ApiParams::new(self.connection_id, self.project_id)
    }
}

/// Everything a subtask needs, built once per run and passed by reference
pub struct TaskContext<'a> {
    pub db: &'a Database,
    pub api: &'a dyn ApiClient,
    pub options: &'a TaskOptions,
    pub settings: &'a PipelineConfig,
    pub cancel: CancellationToken,
    scope: Option<ScopeConfig>,
}

impl<'a> TaskContext<'a> {
    /// Build the context, resolving the scope config.
    ///
    /// A scope config in the options wins over the stored one.
    pub fn new(
        db: &'a Database,
        api: &'a dyn ApiClient,
        options: &'a TaskOptions,
        settings: &'a PipelineConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        options.validate()?;
        settings.validate()?;

        let scope = match &options.scope_config {
            Some(scope) => Some(scope.clone()),
            None => db.get_scope_config(options.connection_id, options.project_id)?,
        };

        Ok(Self {
            db,
            api,
            options,
            settings,
            cancel,
            scope,
        })
    }

    pub fn params(&self) -> ApiParams {
        self.options.params()
    }

    pub fn connection_id(&self) -> i64 {
        self.options.connection_id
    }

    pub fn project_id(&self) -> i64 {
        self.options.project_id
    }

    /// Resolved scope config, if any
    pub fn scope(&self) -> Option<&ScopeConfig> {
        self.scope.as_ref()
    }

    /// Return `Error::Cancelled` once the run has been cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_options() {
        let options = TaskOptions::from_json(
            r#"{
                "connectionId": 1,
                "projectId": 7,
                "name": "Alpha",
                "createdDateAfter": "2024-01-01T00:00:00Z",
                "scopeConfig": {"statusMappings": {"5": {"standardStatus": "ABORTED"}}}
            }"#,
        )
        .unwrap();

        assert_eq!(options.params(), ApiParams::new(1, 7));
        assert_eq!(options.name.as_deref(), Some("Alpha"));
        assert_eq!(
            options.created_date_after.unwrap().timestamp(),
            1_704_067_200
        );
        assert_eq!(
            options.scope_config.unwrap().status_mappings["5"].standard_status,
            "ABORTED"
        );
    }

    #[test]
    fn test_missing_or_zero_ids_are_bad_input() {
        for json in [
            r#"{"projectId": 7}"#,
            r#"{"connectionId": 1}"#,
            r#"{"connectionId": 0, "projectId": 7}"#,
            r#"{"connectionId": 1, "projectId": 0}"#,
            r#"not json"#,
        ] {
            assert!(
                matches!(TaskOptions::from_json(json), Err(Error::BadInput(_))),
                "{} should be rejected",
                json
            );
        }
    }
}
