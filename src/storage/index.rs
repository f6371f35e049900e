//! Single-column equality indexes
//!
//! An index maps each distinct value of a column to the positions of the rows
//! holding it. It is built from one full scan and is NOT maintained by later
//! inserts, updates or deletes: lookups after such a mutation can be stale or
//! incomplete until the index is rebuilt with another `create_index`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::table::Table;
use super::value::Value;
use crate::error::{Error, Result};
use crate::executor::predicate::{Operator, Predicate};

/// Point-in-time equality index over one column
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    column: String,
    entries: HashMap<Value, Vec<usize>>,
}

impl Index {
    /// Build an index with one scan over the table's current rows
    pub fn build(table: &Table, column: &str) -> Result<Self> {
        if !table.has_column(column) {
            return Err(Error::InvalidArgument(format!(
                "column '{}' does not exist in table '{}'",
                column,
                table.name()
            )));
        }

        let mut entries: HashMap<Value, Vec<usize>> = HashMap::new();
        for (pos, row) in table.rows().iter().enumerate() {
            let value = row.get(column).cloned().unwrap_or(Value::Null);
            entries.entry(value).or_default().push(pos);
        }

        Ok(Self {
            column: column.to_string(),
            entries,
        })
    }

    /// Get the indexed column
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Get row positions holding `value`
    pub fn lookup(&self, value: &Value) -> &[usize] {
        self.entries.get(value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index registry: table name -> column -> index
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: Mutex<HashMap<String, HashMap<String, Arc<Index>>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index, replacing any previous index on the same column
    pub fn insert(&self, table: &str, index: Index) {
        self.indexes
            .lock()
            .entry(table.to_string())
            .or_default()
            .insert(index.column().to_string(), Arc::new(index));
    }

    /// Remove an index, returning whether one existed
    pub fn remove(&self, table: &str, column: &str) -> bool {
        let mut indexes = self.indexes.lock();
        let Some(by_column) = indexes.get_mut(table) else {
            return false;
        };
        let removed = by_column.remove(column).is_some();
        if by_column.is_empty() {
            indexes.remove(table);
        }
        removed
    }

    /// Check whether a column is indexed
    pub fn contains(&self, table: &str, column: &str) -> bool {
        self.indexes
            .lock()
            .get(table)
            .is_some_and(|by_column| by_column.contains_key(column))
    }

    /// Get the index on a column
    pub fn get(&self, table: &str, column: &str) -> Option<Arc<Index>> {
        self.indexes.lock().get(table)?.get(column).cloned()
    }

    /// Resolve the first equality clause on an indexed column to row positions.
    ///
    /// Returns `None` when no clause is eligible and a full scan is required.
    pub fn lookup(&self, table: &str, predicate: &Predicate) -> Option<Vec<usize>> {
        let indexes = self.indexes.lock();
        let by_column = indexes.get(table)?;
        predicate
            .clauses()
            .iter()
            .filter(|clause| clause.op == Operator::Eq)
            .find_map(|clause| {
                by_column
                    .get(&clause.column)
                    .map(|index| index.lookup(&clause.value).to_vec())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RowMap;

    fn create_test_table() -> Table {
        let mut table = Table::new("users", vec!["name".to_string(), "age".to_string()]).unwrap();
        let rows = [("Alice", 30), ("Bob", 25), ("Alice", 41)]
            .iter()
            .map(|(name, age)| {
                let mut row = RowMap::new();
                row.insert("name".into(), Value::from(*name));
                row.insert("age".into(), Value::Integer(*age));
                row
            })
            .collect();
        table.insert_rows(rows).unwrap();
        table
    }

    #[test]
    fn test_index_build() {
        let index = Index::build(&create_test_table(), "name").unwrap();
        assert_eq!(index.column(), "name");
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(&Value::from("Alice")), &[0, 2]);
        assert_eq!(index.lookup(&Value::from("Bob")), &[1]);
        assert!(index.lookup(&Value::from("Zed")).is_empty());
    }

    #[test]
    fn test_index_unknown_column() {
        let result = Index::build(&create_test_table(), "email");
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_registry_lookup_first_eligible_clause() {
        let registry = IndexRegistry::new();
        registry.insert("users", Index::build(&create_test_table(), "name").unwrap());

        let predicate = Predicate::new().gt("name", "A").eq("name", "Bob");
        assert_eq!(registry.lookup("users", &predicate), Some(vec![1]));

        let scan = Predicate::new().eq("age", 30);
        assert_eq!(registry.lookup("users", &scan), None);
        assert_eq!(registry.lookup("other", &predicate), None);
    }

    #[test]
    fn test_registry_replace_and_remove() {
        let registry = IndexRegistry::new();
        let mut table = create_test_table();
        registry.insert("users", Index::build(&table, "name").unwrap());

        table.delete_rows(None).unwrap();
        registry.insert("users", Index::build(&table, "name").unwrap());
        assert!(registry.get("users", "name").unwrap().is_empty());

        assert!(registry.remove("users", "name"));
        assert!(!registry.contains("users", "name"));
        assert!(!registry.remove("users", "name"));
    }
}
