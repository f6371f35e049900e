//! Transaction Manager
//!
//! Handles transaction lifecycle (Begin, Commit, Rollback) per caller, and the
//! locked, ordered, all-or-nothing application of operations to tables.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

use super::lock::{LockRegistry, TableWriteGuard};
use crate::error::{Error, Result};
use crate::executor::predicate::Predicate;
use crate::storage::{RowMap, SnapshotStore, Table};

/// Identity of a caller owning a transaction context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerId {
    /// An OS thread using the database directly
    Thread(ThreadId),
    /// An explicit session handle
    Session(u64),
}

impl CallerId {
    /// The calling thread
    pub fn current() -> Self {
        CallerId::Thread(thread::current().id())
    }
}

/// A buffered table mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert {
        table: String,
        rows: Vec<RowMap>,
    },
    Update {
        table: String,
        set: RowMap,
        predicate: Option<Predicate>,
    },
    Delete {
        table: String,
        predicate: Option<Predicate>,
    },
}

impl Operation {
    /// Get the target table
    pub fn table(&self) -> &str {
        match self {
            Operation::Insert { table, .. } => table,
            Operation::Update { table, .. } => table,
            Operation::Delete { table, .. } => table,
        }
    }

    /// Apply to a table, returning the number of rows affected
    pub fn apply(&self, table: &mut Table) -> Result<usize> {
        match self {
            Operation::Insert { rows, .. } => table.insert_rows(rows.clone()),
            Operation::Update { set, predicate, .. } => table.update_rows(set, predicate.as_ref()),
            Operation::Delete { predicate, .. } => table.delete_rows(predicate.as_ref()),
        }
    }
}

/// Transaction State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Inactive,
    Active,
}

/// Per-caller transaction context
#[derive(Debug, Default)]
pub struct TransactionContext {
    log: Vec<Operation>,
}

/// What happened to a mutation submitted through [`TransactionManager::submit`]
#[derive(Debug)]
pub enum Submitted {
    /// Appended to the caller's open transaction
    Queued,
    /// No transaction is open; the caller must apply it now
    AutoCommit(Operation),
}

/// Transaction Manager
///
/// A caller is `Active` exactly when it has an entry in `contexts`. The map
/// mutex is held only to read or swap a context, never while waiting on a
/// table lock.
#[derive(Debug)]
pub struct TransactionManager {
    contexts: Mutex<HashMap<CallerId, TransactionContext>>,
    next_session: AtomicU64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new() -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        }
    }

    /// Allocate an identity for a new session
    pub fn new_session(&self) -> CallerId {
        CallerId::Session(self.next_session.fetch_add(1, Ordering::Relaxed))
    }

    /// Get a caller's transaction state
    pub fn state(&self, caller: CallerId) -> TransactionState {
        if self.contexts.lock().contains_key(&caller) {
            TransactionState::Active
        } else {
            TransactionState::Inactive
        }
    }

    /// Check if a caller has an open transaction
    pub fn is_active(&self, caller: CallerId) -> bool {
        self.state(caller) == TransactionState::Active
    }

    /// Number of operations buffered by a caller
    pub fn pending(&self, caller: CallerId) -> usize {
        self.contexts
            .lock()
            .get(&caller)
            .map_or(0, |ctx| ctx.log.len())
    }

    /// Begin a new transaction
    pub fn begin(&self, caller: CallerId) -> Result<()> {
        let mut contexts = self.contexts.lock();
        if contexts.contains_key(&caller) {
            return Err(Error::TransactionState(
                "transaction already in progress".to_string(),
            ));
        }
        contexts.insert(caller, TransactionContext::default());
        debug!(?caller, "transaction started");
        Ok(())
    }

    /// Buffer a mutation if the caller has an open transaction, otherwise hand
    /// it back for immediate application.
    pub fn submit(&self, caller: CallerId, op: Operation) -> Submitted {
        match self.contexts.lock().get_mut(&caller) {
            Some(ctx) => {
                debug!(?caller, table = op.table(), "operation queued");
                ctx.log.push(op);
                Submitted::Queued
            }
            None => Submitted::AutoCommit(op),
        }
    }

    /// Discard the caller's transaction, returning the number of operations dropped
    pub fn rollback(&self, caller: CallerId) -> Result<usize> {
        let ctx = self.take(caller)?;
        debug!(?caller, discarded = ctx.log.len(), "transaction rolled back");
        Ok(ctx.log.len())
    }

    /// Commit the caller's transaction.
    ///
    /// The log is removed up front, so it is discarded whether or not the
    /// commit succeeds. Returns the number of rows affected.
    pub fn commit(
        &self,
        caller: CallerId,
        locks: &LockRegistry,
        snapshot: &SnapshotStore,
    ) -> Result<usize> {
        let ctx = self.take(caller)?;
        if ctx.log.is_empty() {
            return Ok(0);
        }
        let affected = apply(&ctx.log, locks, snapshot)?;
        info!(?caller, operations = ctx.log.len(), affected, "transaction committed");
        Ok(affected)
    }

    /// Drop any transaction the caller left open.
    ///
    /// Sessions call this on drop. Thread-keyed contexts are never ended
    /// implicitly, so a thread that exits mid-transaction leaves its entry.
    pub fn end(&self, caller: CallerId) {
        if let Some(ctx) = self.contexts.lock().remove(&caller) {
            if !ctx.log.is_empty() {
                debug!(?caller, discarded = ctx.log.len(), "open transaction discarded");
            }
        }
    }

    fn take(&self, caller: CallerId) -> Result<TransactionContext> {
        self.contexts
            .lock()
            .remove(&caller)
            .ok_or_else(|| Error::TransactionState("no transaction in progress".to_string()))
    }
}

/// Apply operations atomically.
///
/// Write locks on every table in `ops` are taken in ascending name order. The
/// operations run against staged copies; only if all succeed is the snapshot
/// written and the copies swapped in. On failure the live tables are untouched.
pub fn apply(ops: &[Operation], locks: &LockRegistry, snapshot: &SnapshotStore) -> Result<usize> {
    let table_locks = locks.get_ordered(ops.iter().map(Operation::table));
    let mut guards: Vec<TableWriteGuard<'_>> = table_locks.iter().map(|lock| lock.write()).collect();

    let mut staged: BTreeMap<String, Table> = guards
        .iter()
        .filter_map(|guard| guard.as_ref())
        .map(|table| (table.name().to_string(), table.clone()))
        .collect();

    let affected = match stage(ops, &mut staged) {
        Ok(affected) => affected,
        Err(e) => {
            warn!(error = %e, "commit aborted, no changes applied");
            return Err(e);
        }
    };

    snapshot.save(staged.values())?;

    for (lock, guard) in table_locks.iter().zip(guards.iter_mut()) {
        if let Some(table) = staged.remove(lock.name()) {
            **guard = Some(table);
        }
    }
    Ok(affected)
}

fn stage(ops: &[Operation], staged: &mut BTreeMap<String, Table>) -> Result<usize> {
    let mut affected = 0;
    for op in ops {
        let table = staged
            .get_mut(op.table())
            .ok_or_else(|| Error::NotFound(op.table().to_string()))?;
        affected += op.apply(table)?;
    }
    Ok(affected)
}
