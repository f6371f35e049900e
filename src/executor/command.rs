//! Structured commands
//!
//! A [`Command`] is what a query-language front end hands to the engine after
//! parsing. It deserializes from documents such as
//! `{"kind": "SELECT", "table": "users", "columns": ["name"], "predicate": {"age": {"gt": 30}}}`.

use serde::{Deserialize, Serialize};

use super::predicate::Predicate;
use crate::error::{Error, Result};
use crate::storage::RowMap;

/// Kind of command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// Command payload: rows for INSERT, assignments for UPDATE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValues {
    Rows(Vec<RowMap>),
    Set(RowMap),
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<CommandValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
}

impl Command {
    /// SELECT all columns
    pub fn select(table: impl Into<String>) -> Self {
        Self::new(CommandKind::Select, table)
    }

    /// INSERT rows
    pub fn insert(table: impl Into<String>, rows: Vec<RowMap>) -> Self {
        let mut command = Self::new(CommandKind::Insert, table);
        command.values = Some(CommandValues::Rows(rows));
        command
    }

    /// UPDATE with assignments
    pub fn update(table: impl Into<String>, set: RowMap) -> Self {
        let mut command = Self::new(CommandKind::Update, table);
        command.values = Some(CommandValues::Set(set));
        command
    }

    /// DELETE
    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(CommandKind::Delete, table)
    }

    /// Restrict the projected columns
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the predicate
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    fn new(kind: CommandKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            columns: None,
            values: None,
            predicate: None,
        }
    }

    /// Resolve the projection; no column list means all columns
    pub fn projection(&self) -> Result<Projection> {
        match &self.columns {
            None => Ok(Projection::All),
            Some(columns) => Projection::from_columns(columns.clone()),
        }
    }

    /// Take the rows of an INSERT
    pub fn into_rows(self) -> Result<Vec<RowMap>> {
        match self.values {
            Some(CommandValues::Rows(rows)) => Ok(rows),
            Some(CommandValues::Set(_)) => Err(Error::InvalidArgument(
                "INSERT values must be a sequence of rows".to_string(),
            )),
            None => Err(Error::InvalidArgument("INSERT requires values".to_string())),
        }
    }

    /// Take the assignments of an UPDATE
    pub fn into_set(self) -> Result<RowMap> {
        match self.values {
            Some(CommandValues::Set(set)) => Ok(set),
            Some(CommandValues::Rows(_)) => Err(Error::InvalidArgument(
                "UPDATE values must be a single map of assignments".to_string(),
            )),
            None => Err(Error::InvalidArgument("UPDATE requires values".to_string())),
        }
    }
}

/// Columns returned by a select
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `*`: full rows
    All,
    /// Named columns, in the given order
    Columns(Vec<String>),
}

impl Projection {
    /// Build from a column list, where `["*"]` means all columns
    pub fn from_columns(columns: Vec<String>) -> Result<Self> {
        match columns.as_slice() {
            [] => Err(Error::InvalidArgument(
                "column list must not be empty".to_string(),
            )),
            [star] if star == "*" => Ok(Projection::All),
            _ => Ok(Projection::Columns(columns)),
        }
    }

    /// Column names of the result, given the table schema
    pub fn names(&self, schema: &[String]) -> Vec<String> {
        match self {
            Projection::All => schema.to_vec(),
            Projection::Columns(columns) => columns.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::predicate::Operator;
    use crate::storage::Value;

    #[test]
    fn test_parse_select_command() {
        let command: Command = serde_json::from_str(
            r#"{"kind": "SELECT", "table": "users", "columns": ["*"],
                "predicate": {"age": {"gt": 30}}}"#,
        )
        .unwrap();

        assert_eq!(command.kind, CommandKind::Select);
        assert_eq!(command.projection().unwrap(), Projection::All);
        let predicate = command.predicate.unwrap();
        let clause = &predicate.clauses()[0];
        assert_eq!(clause.op, Operator::Gt);
        assert_eq!(clause.value, Value::Integer(30));
    }

    #[test]
    fn test_parse_insert_and_update_values() {
        let insert: Command = serde_json::from_str(
            r#"{"kind": "INSERT", "table": "users", "values": [{"name": "a"}, {"name": "b"}]}"#,
        )
        .unwrap();
        assert_eq!(insert.into_rows().unwrap().len(), 2);

        let update: Command = serde_json::from_str(
            r#"{"kind": "UPDATE", "table": "users", "values": {"age": 3}}"#,
        )
        .unwrap();
        assert_eq!(update.into_set().unwrap()["age"], Value::Integer(3));
    }

    #[test]
    fn test_values_shape_mismatch() {
        let insert: Command =
            serde_json::from_str(r#"{"kind": "INSERT", "table": "t", "values": {"name": "a"}}"#)
                .unwrap();
        assert!(matches!(insert.into_rows(), Err(Error::InvalidArgument(_))));

        let update = Command::update("t", RowMap::new());
        assert!(update.into_rows().is_err());
    }

    #[test]
    fn test_projection() {
        assert_eq!(Command::select("t").projection().unwrap(), Projection::All);
        assert!(matches!(
            Command::select("t").columns(Vec::<String>::new()).projection(),
            Err(Error::InvalidArgument(_))
        ));

        let projection = Command::select("t").columns(["name"]).projection().unwrap();
        assert_eq!(
            projection.names(&["id".to_string(), "name".to_string()]),
            vec!["name"]
        );
        assert_eq!(Projection::All.names(&["id".to_string()]), vec!["id"]);
    }
}
