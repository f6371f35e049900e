//! Query Executor for TableDB
//!
//! This module runs selects (index-assisted or full scan) and dispatches
//! structured commands to the database operations.

use serde::Serialize;
use tracing::debug;

use super::command::{Command, CommandKind, Projection};
use super::predicate::Predicate;
use crate::database::{Database, WriteOutcome};
use crate::error::{Error, Result};
use crate::storage::RowMap;
use crate::transaction::CallerId;

/// Query result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<RowMap>,
    /// Number of affected rows (for INSERT/UPDATE/DELETE)
    pub affected_rows: usize,
    /// Message
    pub message: Option<String>,
}

impl QueryResult {
    /// Create a new empty result
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
            message: None,
        }
    }

    /// Create a result with a message
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Create a result with affected rows count
    pub fn with_affected_rows(count: usize, message: impl Into<String>) -> Self {
        Self {
            affected_rows: count,
            message: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Create a result carrying rows
    pub fn with_rows(columns: Vec<String>, rows: Vec<RowMap>) -> Self {
        Self {
            columns,
            rows,
            ..Self::empty()
        }
    }

    fn from_write(verb: &str, outcome: WriteOutcome) -> Self {
        match outcome {
            WriteOutcome::Applied(count) => {
                Self::with_affected_rows(count, format!("{} {} row(s)", verb, count))
            }
            WriteOutcome::Queued => Self::with_message(format!("{} queued in transaction", verb)),
        }
    }
}

impl Database {
    /// Run a select under the table's read lock.
    ///
    /// When an equality clause targets an indexed column, the row positions come
    /// straight from that index and the other clauses are not evaluated.
    pub(crate) fn query(
        &self,
        table: &str,
        projection: &Projection,
        predicate: Option<&Predicate>,
    ) -> Result<QueryResult> {
        let lock = self.locks.get(table);
        let guard = lock.read();
        let stored = guard
            .as_ref()
            .ok_or_else(|| Error::NotFound(table.to_string()))?;

        let rows = match predicate.and_then(|p| self.indexes.lookup(table, p)) {
            Some(positions) => {
                debug!(table, matches = positions.len(), "index lookup");
                stored.rows_at(&positions, projection)?
            }
            None => stored.select_rows(projection, predicate)?,
        };

        Ok(QueryResult::with_rows(
            projection.names(stored.columns()),
            rows,
        ))
    }

    /// Dispatch a structured command on behalf of `caller`
    pub(crate) fn execute_as(&self, caller: CallerId, mut command: Command) -> Result<QueryResult> {
        match command.kind {
            CommandKind::Select => {
                let projection = command.projection()?;
                self.query(&command.table, &projection, command.predicate.as_ref())
            }
            CommandKind::Insert => {
                let table = std::mem::take(&mut command.table);
                let rows = command.into_rows()?;
                let outcome = self.insert_as(caller, &table, rows)?;
                Ok(QueryResult::from_write("INSERT", outcome))
            }
            CommandKind::Update => {
                let table = std::mem::take(&mut command.table);
                let predicate = command.predicate.take();
                let set = command.into_set()?;
                let outcome = self.update_as(caller, &table, set, predicate)?;
                Ok(QueryResult::from_write("UPDATE", outcome))
            }
            CommandKind::Delete => {
                let outcome = self.delete_as(caller, &command.table, command.predicate.take())?;
                Ok(QueryResult::from_write("DELETE", outcome))
            }
        }
    }
}
