//! QA domain types
//!
//! These are the normalized rows the converter produces from TestRail tool
//! rows. They are source-agnostic: ids are opaque strings generated by
//! [`crate::didgen`], statuses and types are standard vocabulary.
//!
//! | Type | Table | Built from |
//! |------|-------|------------|
//! | [`QaProject`] | `qa_projects` | project |
//! | [`QaTestCase`] | `qa_test_cases` | case |
//! | [`QaTestRun`] | `qa_test_runs` | run |
//! | [`QaTestCaseExecution`] | `qa_test_case_executions` | result |

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Convert TestRail unix seconds into a UTC timestamp
pub fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

// ============================================
// Project
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaProject {
    pub id: String,
    pub name: String,
}

// ============================================
// Test case
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaTestCase {
    pub id: String,
    pub name: String,
    pub qa_project_id: String,
    pub create_time: DateTime<Utc>,
    /// Domain id of the creating user, when known
    pub creator_id: Option<String>,
    /// Standard test type (functional, regression, ...)
    pub test_type: String,
    /// Standard priority (low, medium, high, critical)
    pub priority: String,
    pub is_automated: bool,
    /// Custom fields selected and coerced by the scope config
    pub custom_attributes: serde_json::Value,
}

// ============================================
// Test run
// ============================================

/// Lifecycle of a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    InProgress,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "COMPLETED",
            RunStatus::InProgress => "IN_PROGRESS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMPLETED" => Some(RunStatus::Completed),
            "IN_PROGRESS" => Some(RunStatus::InProgress),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaTestRun {
    pub id: String,
    pub qa_project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    /// Set only for completed runs
    pub finish_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub passed_count: i64,
    pub failed_count: i64,
    /// Blocked tests count as skipped
    pub skipped_count: i64,
    pub total_count: i64,
}

// ============================================
// Test case execution
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaTestCaseExecution {
    pub id: String,
    pub qa_project_id: String,
    pub qa_test_case_id: String,
    pub qa_test_run_id: String,
    pub create_time: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub finish_time: DateTime<Utc>,
    pub creator_id: Option<String>,
    /// Mapped execution status (SUCCESS, FAILED, ... or a scope override)
    pub status: String,
}

/// A fully-built domain row, ready to upsert
#[derive(Debug, Clone, PartialEq)]
pub enum DomainRow {
    Project(QaProject),
    TestCase(QaTestCase),
    TestRun(QaTestRun),
    Execution(QaTestCaseExecution),
}
