//! Storage engine module
//!
//! This module contains the storage engine components:
//! - Values and rows
//! - Tables
//! - Equality indexes
//! - Snapshot persistence

pub mod index;
pub mod row;
pub mod snapshot;
pub mod table;
pub mod value;

pub use index::{Index, IndexRegistry};
pub use row::{Row, RowId, RowMap, ROW_ID_COLUMN};
pub use snapshot::SnapshotStore;
pub use table::Table;
pub use value::Value;
