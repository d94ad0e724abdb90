//! Ingestion pipeline: collect, extract, convert
//!
//! This module runs the subtasks that move one TestRail project from the
//! API (raw store) through typed tool rows into the QA domain tables.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   collect   ┌─────────────┐   extract   ┌──────────────┐   convert   ┌────────────┐
//! │ TestRail API │ ──────────► │ _raw_*      │ ──────────► │ _tool_*      │ ──────────► │ qa_*       │
//! └──────────────┘             └─────────────┘             └──────────────┘             └────────────┘
//! ```
//!
//! Every stage is scoped by `(connection_id, project_id)` and idempotent:
//! collection replaces staged rows, extraction and conversion upsert.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use testrail_lake_core::ingest::{IngestCoordinator, TaskContext, TaskOptions};
//!
//! let options = TaskOptions::from_json(r#"{"connectionId": 1, "projectId": 42}"#)?;
//! let ctx = TaskContext::new(&db, &client, &options, &config.pipeline, cancel)?;
//!
//! let result = IngestCoordinator::new().run(&ctx).await?;
//! println!("Ran {} subtasks", result.reports.len());
//! ```

pub mod converter;
pub mod extractor;
mod subtask;
mod task_data;

pub use converter::ConvertStats;
pub use extractor::ExtractStats;
pub use subtask::{Phase, Subtask, SubtaskOutcome};
pub use task_data::{TaskContext, TaskOptions};

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

/// What one subtask did during a run
#[derive(Debug, Clone)]
pub struct SubtaskReport {
    pub subtask: Subtask,
    pub outcome: SubtaskOutcome,
    pub elapsed: Duration,
}

/// Result of a pipeline run
#[derive(Debug, Default)]
pub struct SyncResult {
    /// One report per completed subtask, in run order
    pub reports: Vec<SubtaskReport>,
}

impl SyncResult {
    /// Report of a given subtask, if it ran
    pub fn report(&self, subtask: Subtask) -> Option<&SubtaskReport> {
        self.reports.iter().find(|r| r.subtask == subtask)
    }

    /// Raw rows skipped under the `skip` parse-error policy
    pub fn skipped(&self) -> usize {
        self.reports
            .iter()
            .map(|r| match r.outcome {
                SubtaskOutcome::Extracted(s) => s.skipped,
                _ => 0,
            })
            .sum()
    }

    /// Rows written by conversion subtasks
    pub fn domain_rows(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.subtask.phase() == Phase::Convert)
            .map(|r| r.outcome.rows())
            .sum()
    }
}

/// Runs a selection of subtasks in dependency order.
///
/// The coordinator stops at the first failing subtask; whatever earlier
/// subtasks persisted stays in the database.
#[derive(Debug, Clone)]
pub struct IngestCoordinator {
    subtasks: Vec<Subtask>,
}

impl Default for IngestCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestCoordinator {
    /// Create a coordinator that runs every subtask.
    pub fn new() -> Self {
        Self {
            subtasks: Subtask::ALL.to_vec(),
        }
    }

    /// Create a coordinator for a subset of subtasks.
    ///
    /// The selection is put into dependency order and deduplicated.
    pub fn with_subtasks(mut subtasks: Vec<Subtask>) -> Self {
        subtasks.sort_by_key(|s| s.index());
        subtasks.dedup();
        Self { subtasks }
    }

    /// Subtasks this coordinator will run, in order
    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    /// Run the selected subtasks.
    pub async fn run(&self, ctx: &TaskContext<'_>) -> Result<SyncResult> {
        self.run_with_progress(ctx, |_, _, _| {}).await
    }

    /// Run the selected subtasks with a progress callback.
    ///
    /// The callback receives `(current_index, total, subtask)` before each
    /// subtask starts.
    pub async fn run_with_progress<F>(
        &self,
        ctx: &TaskContext<'_>,
        mut on_progress: F,
    ) -> Result<SyncResult>
    where
        F: FnMut(usize, usize, Subtask),
    {
        let total = self.subtasks.len();
        let mut result = SyncResult::default();

        tracing::info!(
            connection_id = ctx.connection_id(),
            project_id = ctx.project_id(),
            subtasks = total,
            "Starting pipeline"
        );

        for (i, subtask) in self.subtasks.iter().copied().enumerate() {
            on_progress(i, total, subtask);

            let started = Instant::now();
            let outcome = subtask.run(ctx).await.map_err(|e| {
                tracing::error!(subtask = %subtask, error = %e, "Subtask failed");
                Error::Subtask {
                    name: subtask.name(),
                    source: Box::new(e),
                }
            })?;
            let elapsed = started.elapsed();

            tracing::info!(
                subtask = %subtask,
                rows = outcome.rows(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Subtask finished"
            );

            result.reports.push(SubtaskReport {
                subtask,
                outcome,
                elapsed,
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_subtasks_orders_and_dedups() {
        let coordinator = IngestCoordinator::with_subtasks(vec![
            Subtask::ConvertRuns,
            Subtask::CollectRuns,
            Subtask::ExtractRuns,
            Subtask::CollectRuns,
        ]);
        assert_eq!(
            coordinator.subtasks(),
            &[
                Subtask::CollectRuns,
                Subtask::ExtractRuns,
                Subtask::ConvertRuns
            ]
        );
    }

    #[test]
    fn test_default_runs_everything() {
        assert_eq!(IngestCoordinator::default().subtasks(), Subtask::ALL);
    }
}
