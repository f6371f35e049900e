//! Error types for TableDB
//!
//! This module defines all error types used throughout the table store.

use thiserror::Error;

/// The main error type for TableDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' not found")]
    NotFound(String),

    #[error("Catalog error: table '{0}' already exists")]
    AlreadyExists(String),

    // ========== Row Errors ==========
    #[error("Schema error: row does not match schema of table '{table}': {reason}")]
    SchemaViolation { table: String, reason: String },

    #[error("Type error: column '{column}' holds {stored}, cannot compare with {literal}")]
    TypeMismatch {
        column: String,
        stored: &'static str,
        literal: &'static str,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========== Transaction Errors ==========
    #[error("Transaction error: {0}")]
    TransactionState(String),

    // ========== Persistence Errors ==========
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Fieldless classification of [`Error`], for callers that dispatch on the kind
/// of failure rather than its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    SchemaViolation,
    TypeMismatch,
    InvalidArgument,
    TransactionState,
    Io,
    Snapshot,
}

impl Error {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::TransactionState(_) => ErrorKind::TransactionState,
            Error::Io(_) => ErrorKind::Io,
            Error::Snapshot(_) => ErrorKind::Snapshot,
        }
    }

    pub(crate) fn schema_violation(table: &str, reason: impl Into<String>) -> Self {
        Error::SchemaViolation {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for TableDB operations
pub type Result<T> = std::result::Result<T, Error>;
