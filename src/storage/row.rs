//! Rows and surrogate row identifiers

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use super::value::Value;

/// Ordered mapping of column name to value, as supplied by callers and as
/// stored in the snapshot.
pub type RowMap = IndexMap<String, Value>;

/// Name of the schema column that mirrors the surrogate identifier.
pub const ROW_ID_COLUMN: &str = "id";

/// System-assigned row identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(Uuid);

impl RowId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    fn parse(value: &Value) -> Option<Self> {
        value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Self)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored row
///
/// The identifier is not part of the column map unless the schema has an
/// `id` column, in which case that column holds it as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: RowId,
    values: RowMap,
}

impl Row {
    /// Build a row from values already aligned to the schema.
    pub(crate) fn new(id: RowId, mut values: RowMap) -> Self {
        if let Some(slot) = values.get_mut(ROW_ID_COLUMN) {
            *slot = Value::Text(id.to_string());
        }
        Self { id, values }
    }

    /// Rebuild a row read back from a snapshot.
    fn from_stored(values: RowMap) -> Self {
        let id = values
            .get(ROW_ID_COLUMN)
            .and_then(RowId::parse)
            .unwrap_or_else(RowId::generate);
        Self { id, values }
    }

    /// Get the surrogate identifier
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Get all values in column order
    pub fn values(&self) -> &RowMap {
        &self.values
    }

    /// Merge values into this row, overwriting existing keys.
    ///
    /// The `id` column always mirrors the row identifier and is never merged.
    pub(crate) fn merge(&mut self, set: &RowMap) {
        for (column, value) in set {
            if column == ROW_ID_COLUMN {
                continue;
            }
            self.values.insert(column.clone(), value.clone());
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RowMap::deserialize(deserializer).map(Row::from_stored)
    }
}
