//! Database layer for testrail-lake
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Raw staging of API payloads
//! - Tool-layer and domain-layer repositories
//! - Batched cursors for streaming stored rows

mod cursor;
mod domain;
pub mod repo;
pub mod schema;
mod scope_config;
mod tool;

pub use cursor::{RawCursor, ToolCursor};
pub use domain::DomainTable;
pub use repo::{Database, RawRecord};
pub use tool::{tool_table, ToolRecord};
