//! Database handle
//!
//! [`Database`] ties together the lock registry, the index registry, the
//! transaction manager and snapshot persistence. It is `Send + Sync` and meant
//! to be shared (typically in an `Arc`) by many threads.
//!
//! Transaction state belongs to a caller. Methods on `Database` itself use the
//! calling thread as the caller; a [`Session`] carries an explicit identity
//! instead, for callers that are not tied to one thread.

use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::executor::{Command, Predicate, Projection, QueryResult};
use crate::storage::{Index, IndexRegistry, RowMap, SnapshotStore, Table};
use crate::transaction::{self, CallerId, LockRegistry, Operation, Submitted, TransactionManager};

/// Result of a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Applied and persisted immediately, affecting this many rows
    Applied(usize),
    /// Buffered in the caller's open transaction
    Queued,
}

impl WriteOutcome {
    /// Rows affected so far (always 0 when queued)
    pub fn affected_rows(&self) -> usize {
        match self {
            WriteOutcome::Applied(count) => *count,
            WriteOutcome::Queued => 0,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued)
    }
}

/// An embeddable table store
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    pub(crate) locks: LockRegistry,
    pub(crate) indexes: IndexRegistry,
    pub(crate) transactions: TransactionManager,
    pub(crate) snapshot: SnapshotStore,
}

impl Database {
    /// Open a database backed by a snapshot file, loading it if it exists
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::with_config(DatabaseConfig::new().path(path))
    }

    /// Create a database that is never written to disk
    pub fn in_memory() -> Result<Self> {
        Self::with_config(DatabaseConfig::new())
    }

    /// Open a database with an explicit configuration
    pub fn with_config(config: DatabaseConfig) -> Result<Self> {
        let (snapshot, tables) = SnapshotStore::open(&config)?;

        let locks = LockRegistry::new();
        let count = tables.len();
        for (name, table) in tables {
            *locks.get(&name).write() = Some(table);
        }
        info!(path = ?config.path, tables = count, "database opened");

        Ok(Self {
            config,
            locks,
            indexes: IndexRegistry::new(),
            transactions: TransactionManager::new(),
            snapshot,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Create a new table
    pub fn create_table<I, S>(&self, name: &str, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let lock = self.locks.get(name);
        let mut slot = lock.write();
        if slot.is_some() {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let table = Table::new(name, columns)?;
        self.snapshot.save([&table])?;
        info!(table = name, columns = ?table.columns(), "table created");
        *slot = Some(table);
        Ok(())
    }

    /// Build (or rebuild) the equality index on a column
    pub fn create_index(&self, table: &str, column: &str) -> Result<()> {
        let lock = self.locks.get(table);
        let slot = lock.read();
        let stored = slot
            .as_ref()
            .ok_or_else(|| Error::NotFound(table.to_string()))?;

        let index = Index::build(stored, column)?;
        info!(table, column, keys = index.len(), "index created");
        self.indexes.insert(table, index);
        Ok(())
    }

    /// Drop the index on a column, returning whether one existed
    pub fn drop_index(&self, table: &str, column: &str) -> bool {
        self.indexes.remove(table, column)
    }

    /// Check whether a column is indexed
    pub fn has_index(&self, table: &str, column: &str) -> bool {
        self.indexes.contains(table, column)
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.snapshot.table_names()
    }

    /// Column names of a table
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        self.snapshot
            .columns(table)
            .ok_or_else(|| Error::NotFound(table.to_string()))
    }

    /// Start a session with its own transaction context
    pub fn session(&self) -> Session<'_> {
        Session {
            db: self,
            caller: self.transactions.new_session(),
        }
    }

    /// Begin a transaction on the calling thread
    pub fn begin(&self) -> Result<()> {
        self.transactions.begin(CallerId::current())
    }

    /// Commit the calling thread's transaction, returning rows affected
    pub fn commit(&self) -> Result<usize> {
        self.commit_as(CallerId::current())
    }

    /// Roll back the calling thread's transaction, returning operations discarded
    pub fn rollback(&self) -> Result<usize> {
        self.transactions.rollback(CallerId::current())
    }

    /// Check whether the calling thread has an open transaction
    pub fn in_transaction(&self) -> bool {
        self.transactions.is_active(CallerId::current())
    }

    /// Select rows
    pub fn select(
        &self,
        table: &str,
        projection: &Projection,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<RowMap>> {
        self.query(table, projection, predicate).map(|r| r.rows)
    }

    /// Insert rows
    pub fn insert(&self, table: &str, rows: Vec<RowMap>) -> Result<WriteOutcome> {
        self.insert_as(CallerId::current(), table, rows)
    }

    /// Update matching rows (all rows when `predicate` is `None`)
    pub fn update(
        &self,
        table: &str,
        set: RowMap,
        predicate: Option<Predicate>,
    ) -> Result<WriteOutcome> {
        self.update_as(CallerId::current(), table, set, predicate)
    }

    /// Delete matching rows (all rows when `predicate` is `None`)
    pub fn delete(&self, table: &str, predicate: Option<Predicate>) -> Result<WriteOutcome> {
        self.delete_as(CallerId::current(), table, predicate)
    }

    /// Execute a structured command
    pub fn execute(&self, command: Command) -> Result<QueryResult> {
        self.execute_as(CallerId::current(), command)
    }

    pub(crate) fn commit_as(&self, caller: CallerId) -> Result<usize> {
        self.transactions
            .commit(caller, &self.locks, &self.snapshot)
    }

    pub(crate) fn insert_as(
        &self,
        caller: CallerId,
        table: &str,
        rows: Vec<RowMap>,
    ) -> Result<WriteOutcome> {
        self.submit(
            caller,
            Operation::Insert {
                table: table.to_string(),
                rows,
            },
        )
    }

    pub(crate) fn update_as(
        &self,
        caller: CallerId,
        table: &str,
        set: RowMap,
        predicate: Option<Predicate>,
    ) -> Result<WriteOutcome> {
        self.require_table(table)?;
        self.submit(
            caller,
            Operation::Update {
                table: table.to_string(),
                set,
                predicate,
            },
        )
    }

    pub(crate) fn delete_as(
        &self,
        caller: CallerId,
        table: &str,
        predicate: Option<Predicate>,
    ) -> Result<WriteOutcome> {
        self.require_table(table)?;
        self.submit(
            caller,
            Operation::Delete {
                table: table.to_string(),
                predicate,
            },
        )
    }

    /// Updates and deletes name an existing table even when they are only
    /// queued. Tables are never dropped, so the check still holds at commit.
    fn require_table(&self, table: &str) -> Result<()> {
        if self.snapshot.contains(table) {
            Ok(())
        } else {
            Err(Error::NotFound(table.to_string()))
        }
    }

    /// Queue the operation in the caller's transaction, or apply it now as a
    /// single-operation transaction.
    fn submit(&self, caller: CallerId, op: Operation) -> Result<WriteOutcome> {
        match self.transactions.submit(caller, op) {
            Submitted::Queued => Ok(WriteOutcome::Queued),
            Submitted::AutoCommit(op) => {
                transaction::apply(std::slice::from_ref(&op), &self.locks, &self.snapshot)
                    .map(WriteOutcome::Applied)
            }
        }
    }
}

/// A caller identity with its own transaction context
///
/// Unlike the thread-keyed methods on [`Database`], a session can move between
/// threads or tasks. Any transaction still open when it is dropped is discarded.
#[derive(Debug)]
pub struct Session<'db> {
    db: &'db Database,
    caller: CallerId,
}

impl<'db> Session<'db> {
    /// Get the caller identity of this session
    pub fn id(&self) -> CallerId {
        self.caller
    }

    pub fn begin(&mut self) -> Result<()> {
        self.db.transactions.begin(self.caller)
    }

    pub fn commit(&mut self) -> Result<usize> {
        self.db.commit_as(self.caller)
    }

    pub fn rollback(&mut self) -> Result<usize> {
        self.db.transactions.rollback(self.caller)
    }

    pub fn in_transaction(&self) -> bool {
        self.db.transactions.is_active(self.caller)
    }

    /// Number of operations waiting for commit
    pub fn pending_operations(&self) -> usize {
        self.db.transactions.pending(self.caller)
    }

    pub fn select(
        &self,
        table: &str,
        projection: &Projection,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<RowMap>> {
        self.db.select(table, projection, predicate)
    }

    pub fn insert(&mut self, table: &str, rows: Vec<RowMap>) -> Result<WriteOutcome> {
        self.db.insert_as(self.caller, table, rows)
    }

    pub fn update(
        &mut self,
        table: &str,
        set: RowMap,
        predicate: Option<Predicate>,
    ) -> Result<WriteOutcome> {
        self.db.update_as(self.caller, table, set, predicate)
    }

    pub fn delete(&mut self, table: &str, predicate: Option<Predicate>) -> Result<WriteOutcome> {
        self.db.delete_as(self.caller, table, predicate)
    }

    pub fn execute(&mut self, command: Command) -> Result<QueryResult> {
        self.db.execute_as(self.caller, command)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.db.transactions.end(self.caller);
    }
}
