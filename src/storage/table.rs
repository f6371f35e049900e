//! Table storage for TableDB
//!
//! A table is a fixed list of column names plus an ordered sequence of rows.
//! The mutation primitives here assume the caller already holds the table's
//! write lock; they never lock anything themselves.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::row::{Row, RowId, RowMap};
use super::value::Value;
use crate::error::{Error, Result};
use crate::executor::predicate::{self, Predicate};
use crate::executor::Projection;

/// Prefix of positional keys produced for `VALUES (...)` without a column list.
const POSITIONAL_PREFIX: &str = "temp_";

/// A table combining schema and rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name (the snapshot keys tables by name)
    #[serde(skip)]
    name: String,
    /// Column names, in schema order
    columns: Vec<String>,
    /// Rows, in insertion order
    rows: Vec<Row>,
}

impl Table {
    /// Create a new empty table
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "table '{}' must have at least one column",
                name
            )));
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate column '{}' in table '{}'",
                    column, name
                )));
            }
        }
        Ok(Self {
            name,
            columns,
            rows: Vec::new(),
        })
    }

    /// Get table name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get all rows
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Get row count
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check whether a column is part of the schema
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Insert rows.
    ///
    /// Every row is validated before any is appended, so a failing batch leaves
    /// the table untouched.
    pub fn insert_rows(&mut self, rows: Vec<RowMap>) -> Result<usize> {
        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            let row = self.resolve_positional(row);
            if row.is_empty() {
                return Err(Error::schema_violation(&self.name, "row is empty"));
            }
            if let Some(column) = row.keys().find(|k| !self.has_column(k)) {
                return Err(Error::schema_violation(
                    &self.name,
                    format!("unknown column '{}'", column),
                ));
            }
            prepared.push(Row::new(RowId::generate(), self.align(row)));
        }

        let count = prepared.len();
        self.rows.extend(prepared);
        Ok(count)
    }

    /// Select rows by full scan
    pub fn select_rows(
        &self,
        projection: &Projection,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<RowMap>> {
        let mut result = Vec::new();
        for row in &self.rows {
            if predicate::matches(row.values(), predicate)? {
                result.push(self.project(row, projection)?);
            }
        }
        Ok(result)
    }

    /// Select rows by position, skipping positions past the end of the table.
    pub fn rows_at(&self, positions: &[usize], projection: &Projection) -> Result<Vec<RowMap>> {
        positions
            .iter()
            .filter_map(|&pos| self.rows.get(pos))
            .map(|row| self.project(row, projection))
            .collect()
    }

    /// Merge `set` into every matching row, returning the number of rows updated.
    ///
    /// Keys in `set` are not checked against the schema.
    pub fn update_rows(&mut self, set: &RowMap, predicate: Option<&Predicate>) -> Result<usize> {
        let matched = self.matching_positions(predicate)?;
        for &pos in &matched {
            self.rows[pos].merge(set);
        }
        Ok(matched.len())
    }

    /// Remove every matching row, returning the number of rows removed.
    pub fn delete_rows(&mut self, predicate: Option<&Predicate>) -> Result<usize> {
        let Some(predicate) = predicate else {
            let count = self.rows.len();
            self.rows.clear();
            return Ok(count);
        };

        let keep = self
            .rows
            .iter()
            .map(|row| predicate.evaluate(row.values()).map(|m| !m))
            .collect::<Result<Vec<bool>>>()?;
        let before = self.rows.len();
        let mut keep = keep.into_iter();
        self.rows.retain(|_| keep.next().unwrap_or(true));
        Ok(before - self.rows.len())
    }

    /// Evaluate the predicate against every row before anything is modified.
    fn matching_positions(&self, predicate: Option<&Predicate>) -> Result<Vec<usize>> {
        let mut positions = Vec::new();
        for (pos, row) in self.rows.iter().enumerate() {
            if predicate::matches(row.values(), predicate)? {
                positions.push(pos);
            }
        }
        Ok(positions)
    }

    fn project(&self, row: &Row, projection: &Projection) -> Result<RowMap> {
        match projection {
            Projection::All => Ok(row.values().clone()),
            Projection::Columns(columns) => columns
                .iter()
                .map(|column| {
                    row.get(column)
                        .map(|value| (column.clone(), value.clone()))
                        .ok_or_else(|| {
                            Error::InvalidArgument(format!(
                                "column '{}' does not exist in table '{}'",
                                column, self.name
                            ))
                        })
                })
                .collect(),
        }
    }

    /// Rename `temp_<n>` keys to the n-th schema column.
    fn resolve_positional(&self, row: RowMap) -> RowMap {
        row.into_iter()
            .map(|(key, value)| {
                let column = key
                    .strip_prefix(POSITIONAL_PREFIX)
                    .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|n| n.parse::<usize>().ok())
                    .and_then(|n| self.columns.get(n).cloned());
                (column.unwrap_or(key), value)
            })
            .collect()
    }

    /// Reorder a row to schema order, filling missing columns with NULL.
    fn align(&self, mut row: RowMap) -> RowMap {
        self.columns
            .iter()
            .map(|column| {
                let value = row.swap_remove(column).unwrap_or(Value::Null);
                (column.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_table() -> Table {
        Table::new(
            "users",
            vec!["id".to_string(), "name".to_string(), "age".to_string()],
        )
        .unwrap()
    }

    fn row(pairs: &[(&str, Value)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn populated_table() -> Table {
        let mut table = create_test_table();
        table
            .insert_rows(vec![
                row(&[("name", "Alice".into()), ("age", Value::Integer(30))]),
                row(&[("name", "Bob".into()), ("age", Value::Integer(25))]),
                row(&[("name", "Charlie".into()), ("age", Value::Integer(35))]),
            ])
            .unwrap();
        table
    }

    #[test]
    fn test_table_rejects_bad_schema() {
        assert!(matches!(
            Table::new("t", vec![]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Table::new("t", vec!["a".to_string(), "a".to_string()]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_table_insert_aligns_to_schema() {
        let mut table = create_test_table();
        table
            .insert_rows(vec![row(&[("age", Value::Integer(3)), ("name", "a".into())])])
            .unwrap();

        let stored = &table.rows()[0];
        let keys: Vec<&String> = stored.values().keys().collect();
        assert_eq!(keys, vec!["id", "name", "age"]);
        assert_eq!(stored.get("id"), Some(&Value::Text(stored.id().to_string())));
    }

    #[test]
    fn test_table_insert_fills_null() {
        let mut table = create_test_table();
        table.insert_rows(vec![row(&[("name", "a".into())])]).unwrap();
        assert_eq!(table.rows()[0].get("age"), Some(&Value::Null));
    }

    #[test]
    fn test_table_insert_schema_violation() {
        let mut table = populated_table();

        let result = table.insert_rows(vec![RowMap::new()]);
        assert!(matches!(result, Err(Error::SchemaViolation { .. })));

        let result = table.insert_rows(vec![
            row(&[("name", "ok".into())]),
            row(&[("email", "x".into())]),
        ]);
        assert!(matches!(result, Err(Error::SchemaViolation { .. })));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_table_insert_positional_keys() {
        let mut table = create_test_table();
        table
            .insert_rows(vec![row(&[
                ("temp_1", "Dana".into()),
                ("temp_2", Value::Integer(41)),
            ])])
            .unwrap();

        let stored = &table.rows()[0];
        assert_eq!(stored.get("name"), Some(&Value::from("Dana")));
        assert_eq!(stored.get("age"), Some(&Value::Integer(41)));
    }

    #[test]
    fn test_table_unique_ids() {
        let table = populated_table();
        let ids: HashSet<RowId> = table.rows().iter().map(Row::id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_table_select_projection() {
        let table = populated_table();
        let names = table
            .select_rows(
                &Projection::Columns(vec!["name".to_string()]),
                Some(&Predicate::new().gt("age", 26)),
            )
            .unwrap();

        assert_eq!(
            names,
            vec![row(&[("name", "Alice".into())]), row(&[("name", "Charlie".into())])]
        );

        let result = table.select_rows(&Projection::Columns(vec!["email".to_string()]), None);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_table_rows_at_skips_stale_positions() {
        let table = populated_table();
        let rows = table.rows_at(&[2, 7], &Projection::All).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("Charlie")));
    }

    #[test]
    fn test_table_update() {
        let mut table = populated_table();

        let updated = table
            .update_rows(
                &row(&[("name", "John".into()), ("age", Value::Integer(20))]),
                Some(&Predicate::new().eq("name", "Alice")),
            )
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(table.rows()[0].get("name"), Some(&Value::from("John")));
        assert_eq!(table.rows()[1].get("name"), Some(&Value::from("Bob")));

        let updated = table
            .update_rows(&row(&[("age", Value::Integer(0))]), None)
            .unwrap();
        assert_eq!(updated, 3);
        assert!(table
            .rows()
            .iter()
            .all(|r| r.get("age") == Some(&Value::Integer(0))));
    }

    #[test]
    fn test_table_update_type_mismatch_leaves_rows() {
        let mut table = populated_table();
        let before = table.clone();

        let result = table.update_rows(
            &row(&[("name", "X".into())]),
            Some(&Predicate::new().eq("age", "30")),
        );
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
        assert_eq!(table, before);
    }

    #[test]
    fn test_table_delete() {
        let mut table = populated_table();

        let removed = table
            .delete_rows(Some(&Predicate::new().lt("age", 31)))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].get("name"), Some(&Value::from("Charlie")));

        let removed = table.delete_rows(None).unwrap();
        assert_eq!(removed, 1);
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 3);
    }
}
