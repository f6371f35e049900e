//! TableDB - An embeddable, file-backed table store written in Rust
//!
//! This library provides:
//! - Table storage with a JSON snapshot on disk
//! - Per-table readers-writer locks
//! - Per-caller transactions with ordered, all-or-nothing commit
//! - Predicate evaluation and single-column equality indexes
//! - A structured command interface for query-language front ends

pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod storage;
pub mod transaction;

pub use config::DatabaseConfig;
pub use database::{Database, Session, WriteOutcome};
pub use error::{Error, ErrorKind, Result};
pub use executor::{Command, CommandKind, Operator, Predicate, Projection, QueryResult};
pub use storage::{RowMap, Value};
