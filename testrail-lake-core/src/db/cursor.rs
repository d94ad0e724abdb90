//! Batched keyset cursors over raw and tool rows
//!
//! Each batch takes the connection lock, runs one bounded query and
//! releases both statement and lock before rows are handed out. Callers can
//! therefore write through the same `Database` while iterating.

use super::repo::{Database, RawRecord};
use super::tool::ToolRecord;
use crate::error::Result;
use crate::models::ApiParams;
use std::collections::VecDeque;

/// Streams raw rows for one `(table, params)` in insertion order
pub struct RawCursor<'a> {
    db: &'a Database,
    table: &'a str,
    params: ApiParams,
    batch_size: usize,
    after: i64,
    buffer: VecDeque<RawRecord>,
    exhausted: bool,
}

impl<'a> RawCursor<'a> {
    pub fn new(db: &'a Database, table: &'a str, params: ApiParams, batch_size: usize) -> Self {
        Self {
            db,
            table,
            params,
            batch_size: batch_size.max(1),
            after: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl Iterator for RawCursor<'_> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self
                .db
                .raw_batch(self.table, &self.params, self.after, self.batch_size)
            {
                Ok(batch) => {
                    self.exhausted = batch.len() < self.batch_size;
                    if let Some(last) = batch.last() {
                        self.after = last.id;
                    }
                    self.buffer.extend(batch);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

/// Streams tool rows of one type for a (connection, project) scope in id order
pub struct ToolCursor<'a, T> {
    db: &'a Database,
    connection_id: i64,
    project_id: i64,
    batch_size: usize,
    after: i64,
    buffer: VecDeque<T>,
    exhausted: bool,
}

impl<'a, T: ToolRecord> ToolCursor<'a, T> {
    pub fn new(db: &'a Database, connection_id: i64, project_id: i64, batch_size: usize) -> Self {
        Self {
            db,
            connection_id,
            project_id,
            batch_size: batch_size.max(1),
            after: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl<T: ToolRecord> Iterator for ToolCursor<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            match self.db.tool_batch::<T>(
                self.connection_id,
                self.project_id,
                self.after,
                self.batch_size,
            ) {
                Ok(batch) => {
                    self.exhausted = batch.len() < self.batch_size;
                    if let Some(last) = batch.last() {
                        self.after = last.key();
                    }
                    self.buffer.extend(batch);
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl Database {
    /// Cursor over raw rows staged for `(table, params)`
    pub fn raw_cursor<'a>(
        &'a self,
        table: &'a str,
        params: ApiParams,
        batch_size: usize,
    ) -> RawCursor<'a> {
        RawCursor::new(self, table, params, batch_size)
    }

    /// Cursor over tool rows of type `T` for a (connection, project) scope
    pub fn tool_cursor<T: ToolRecord>(
        &self,
        connection_id: i64,
        project_id: i64,
        batch_size: usize,
    ) -> ToolCursor<'_, T> {
        ToolCursor::new(self, connection_id, project_id, batch_size)
    }
}
