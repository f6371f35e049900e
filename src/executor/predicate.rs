//! Predicate evaluation
//!
//! A predicate is a conjunction of `column <op> literal` clauses. Comparison is
//! strict: a literal of a different runtime type than the stored value is an
//! error, never a coercion.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::storage::{RowMap, Value};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equal
    Eq,
    /// Greater than
    Gt,
    /// Less than
    Lt,
}

/// A single `column <op> value` clause
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

impl Clause {
    /// Evaluate this clause against a stored value
    fn test(&self, stored: &Value) -> Result<bool> {
        if !stored.same_type(&self.value) {
            return Err(self.mismatch(stored));
        }
        let passed = match self.op {
            Operator::Eq => stored == &self.value,
            Operator::Gt => self.ordering(stored)? == Ordering::Greater,
            Operator::Lt => self.ordering(stored)? == Ordering::Less,
        };
        Ok(passed)
    }

    fn ordering(&self, stored: &Value) -> Result<Ordering> {
        stored
            .compare(&self.value)
            .ok_or_else(|| self.mismatch(stored))
    }

    fn mismatch(&self, stored: &Value) -> Error {
        Error::TypeMismatch {
            column: self.column.clone(),
            stored: stored.type_name(),
            literal: self.value.type_name(),
        }
    }
}

/// Conjunctive predicate
///
/// The document form is `{ column: { eq|gt|lt: value, ... }, ... }`; a column
/// may carry several operators, each becoming its own clause.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PredicateDoc", into = "PredicateDoc")]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Create an empty predicate (matches every row)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause
    pub fn with(mut self, column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Add an equality clause
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Eq, value)
    }

    /// Add a greater-than clause
    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Gt, value)
    }

    /// Add a less-than clause
    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Lt, value)
    }

    /// Get the clauses in declaration order
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate the predicate against a row.
    ///
    /// Clauses are checked in order and evaluation stops at the first one that
    /// fails, so a type mismatch in a later clause is only reported when every
    /// earlier clause passed.
    pub fn evaluate(&self, row: &RowMap) -> Result<bool> {
        for clause in &self.clauses {
            let stored = row.get(&clause.column).ok_or_else(|| {
                Error::InvalidArgument(format!("column '{}' does not exist", clause.column))
            })?;
            if !clause.test(stored)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Evaluate an optional predicate; an absent predicate matches every row.
pub fn matches(row: &RowMap, predicate: Option<&Predicate>) -> Result<bool> {
    match predicate {
        Some(predicate) => predicate.evaluate(row),
        None => Ok(true),
    }
}

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct PredicateDoc(IndexMap<String, IndexMap<Operator, Value>>);

impl From<PredicateDoc> for Predicate {
    fn from(doc: PredicateDoc) -> Self {
        let clauses = doc
            .0
            .into_iter()
            .flat_map(|(column, conditions)| {
                conditions.into_iter().map(move |(op, value)| Clause {
                    column: column.clone(),
                    op,
                    value,
                })
            })
            .collect();
        Self { clauses }
    }
}

impl From<Predicate> for PredicateDoc {
    fn from(predicate: Predicate) -> Self {
        let mut doc: IndexMap<String, IndexMap<Operator, Value>> = IndexMap::new();
        for clause in predicate.clauses {
            doc.entry(clause.column)
                .or_default()
                .insert(clause.op, clause.value);
        }
        PredicateDoc(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> RowMap {
        let mut row = RowMap::new();
        row.insert("id".into(), Value::Integer(1));
        row.insert("name".into(), Value::from("Alice"));
        row.insert("age".into(), Value::Integer(30));
        row
    }

    #[test]
    fn test_evaluate_operators() {
        let row = alice();

        assert!(Predicate::new().eq("id", 1).evaluate(&row).unwrap());
        assert!(Predicate::new().gt("age", -5).evaluate(&row).unwrap());
        assert!(!Predicate::new().eq("age", 25).evaluate(&row).unwrap());
        assert!(!Predicate::new().gt("age", 30).evaluate(&row).unwrap());
        assert!(Predicate::new().lt("age", 31).evaluate(&row).unwrap());
        assert!(Predicate::new().eq("name", "Alice").evaluate(&row).unwrap());
        assert!(Predicate::new().gt("name", "Aaron").evaluate(&row).unwrap());
    }

    #[test]
    fn test_evaluate_conjunction() {
        let row = alice();
        let both = Predicate::new().gt("age", 20).lt("age", 40);
        assert!(both.evaluate(&row).unwrap());

        let one_fails = Predicate::new().gt("age", 20).eq("name", "Bob");
        assert!(!one_fails.evaluate(&row).unwrap());
    }

    #[test]
    fn test_evaluate_type_mismatch() {
        let row = alice();
        let result = Predicate::new().eq("age", "30").evaluate(&row);
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));

        let result = Predicate::new().gt("name", 3).evaluate(&row);
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_evaluate_null() {
        let mut row = alice();
        row.insert("age".into(), Value::Null);

        assert!(Predicate::new().eq("age", Value::Null).evaluate(&row).unwrap());
        assert!(matches!(
            Predicate::new().gt("age", Value::Null).evaluate(&row),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            Predicate::new().eq("age", 30).evaluate(&row),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_evaluate_unknown_column() {
        let result = Predicate::new().eq("email", "x").evaluate(&alice());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_predicate_document() {
        let predicate: Predicate =
            serde_json::from_str(r#"{"age": {"gt": 20, "lt": 40}, "name": {"eq": "Alice"}}"#)
                .unwrap();

        assert_eq!(predicate.clauses().len(), 3);
        assert_eq!(predicate.clauses()[0].op, Operator::Gt);
        assert_eq!(predicate.clauses()[2].column, "name");
        assert!(predicate.evaluate(&alice()).unwrap());
    }
}
