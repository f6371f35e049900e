//! Table locks
//!
//! Every table is protected by a readers-writer lock built on a mutex and a
//! condition variable: many concurrent readers, or one exclusive writer.
//!
//! The lock has no priority policy. A waiting writer is only admitted once the
//! reader count drops to zero, so a steady stream of readers can starve it
//! indefinitely. Waiters are woken all at once and race for the lock, with no
//! FIFO ordering.

use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::debug;

use crate::storage::Table;

/// Observable state of a [`ReadWriteLock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Idle,
    Reading(usize),
    Writing,
}

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
}

/// Condition-based readers-writer lock
#[derive(Debug, Default)]
pub struct ReadWriteLock {
    state: Mutex<LockState>,
    cond: Condvar,
}

impl ReadWriteLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire shared access, blocking while a writer holds the lock
    pub fn read(&self) -> ReadGuard<'_> {
        let mut state = self.state.lock();
        while state.writer {
            self.cond.wait(&mut state);
        }
        state.readers += 1;
        ReadGuard { lock: self }
    }

    /// Acquire exclusive access, blocking while readers or a writer hold the lock
    pub fn write(&self) -> WriteGuard<'_> {
        let mut state = self.state.lock();
        while state.readers > 0 || state.writer {
            self.cond.wait(&mut state);
        }
        state.writer = true;
        WriteGuard { lock: self }
    }

    /// Current lock state
    pub fn status(&self) -> LockStatus {
        let state = self.state.lock();
        match (state.writer, state.readers) {
            (true, _) => LockStatus::Writing,
            (false, 0) => LockStatus::Idle,
            (false, n) => LockStatus::Reading(n),
        }
    }

    fn release_read(&self) {
        let mut state = self.state.lock();
        state.readers -= 1;
        if state.readers == 0 {
            self.cond.notify_all();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        state.writer = false;
        self.cond.notify_all();
    }
}

/// Shared access; released on drop
#[derive(Debug)]
pub struct ReadGuard<'a> {
    lock: &'a ReadWriteLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Exclusive access; released on drop
#[derive(Debug)]
pub struct WriteGuard<'a> {
    lock: &'a ReadWriteLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

/// A table slot and the lock that protects it
///
/// The slot is empty until the table is created. It is only reachable through
/// [`TableLock::read`] and [`TableLock::write`], so the inner `RwLock` never
/// contends: the readers-writer lock has already excluded conflicting callers.
#[derive(Debug)]
pub struct TableLock {
    name: String,
    lock: ReadWriteLock,
    slot: RwLock<Option<Table>>,
}

impl TableLock {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lock: ReadWriteLock::new(),
            slot: RwLock::new(None),
        }
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire the table for reading
    pub fn read(&self) -> TableReadGuard<'_> {
        debug!(table = %self.name, "acquiring read lock");
        let held = self.lock.read();
        TableReadGuard {
            slot: self.slot.read(),
            _held: held,
        }
    }

    /// Acquire the table for writing
    pub fn write(&self) -> TableWriteGuard<'_> {
        debug!(table = %self.name, "acquiring write lock");
        let held = self.lock.write();
        TableWriteGuard {
            slot: self.slot.write(),
            _held: held,
        }
    }

    /// Current lock state
    pub fn status(&self) -> LockStatus {
        self.lock.status()
    }
}

/// Read access to a table slot
pub struct TableReadGuard<'a> {
    // Field order matters: the slot guard drops before the table lock is released.
    slot: RwLockReadGuard<'a, Option<Table>>,
    _held: ReadGuard<'a>,
}

impl Deref for TableReadGuard<'_> {
    type Target = Option<Table>;

    fn deref(&self) -> &Self::Target {
        &self.slot
    }
}

/// Write access to a table slot
pub struct TableWriteGuard<'a> {
    slot: RwLockWriteGuard<'a, Option<Table>>,
    _held: WriteGuard<'a>,
}

impl Deref for TableWriteGuard<'_> {
    type Target = Option<Table>;

    fn deref(&self) -> &Self::Target {
        &self.slot
    }
}

impl DerefMut for TableWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.slot
    }
}

/// Lock registry: one [`TableLock`] per table name, created on first reference
///
/// The map has its own mutex, held only to look up or insert an entry and never
/// while waiting on a table lock.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<TableLock>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for a table, creating it on first access
    pub fn get(&self, table: &str) -> Arc<TableLock> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(table) {
            return lock.clone();
        }
        let lock = Arc::new(TableLock::new(table));
        locks.insert(table.to_string(), lock.clone());
        lock
    }

    /// Get the locks for several tables, sorted by name and deduplicated.
    ///
    /// Acquiring table locks in this order for every caller rules out circular
    /// waits between transactions that touch overlapping tables.
    pub fn get_ordered<'a>(&self, tables: impl IntoIterator<Item = &'a str>) -> Vec<Arc<TableLock>> {
        let mut names: Vec<&str> = tables.into_iter().collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter().map(|name| self.get(name)).collect()
    }

    /// Number of locks created so far
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
