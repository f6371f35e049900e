//! Transaction module
//!
//! Per-table readers-writer locks, the lock registry, and the per-caller
//! transaction manager.

pub mod lock;
pub mod transaction;

pub use lock::{LockRegistry, LockStatus, ReadWriteLock, TableLock};
pub use transaction::{
    apply, CallerId, Operation, Submitted, TransactionContext, TransactionManager, TransactionState,
};
