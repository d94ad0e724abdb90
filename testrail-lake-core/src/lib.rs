//! # testrail-lake-core
//!
//! Core library for testrail-lake - a TestRail connector that lands test
//! management data in a local QA data lake.
//!
//! This library provides:
//! - A TestRail API collector (flat and fan-out pagination)
//! - Typed tool-layer models and their extraction from raw API records
//! - A scope-aware mapping engine and converters to the QA domain model
//! - Database storage layer with SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Raw:** API records exactly as returned, keyed by `(table, params)`
//! - **Tool:** Typed `_tool_testrail_*` rows keyed by `(connection_id, id)`
//! - **Domain:** Normalized `qa_*` rows keyed by generated domain ids
//!
//! ## Example
//!
//! ```rust,no_run
//! use testrail_lake_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use collector::{ApiClient, TestrailClient};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{IngestCoordinator, Subtask, SyncResult, TaskContext, TaskOptions};
pub use models::{ApiParams, EntityKind, ScopeConfig};
pub use types::*;

// Public modules
pub mod collector;
pub mod config;
pub mod db;
pub mod didgen;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod mapping;
pub mod models;
pub mod types;
