//! Database configuration

use std::path::{Path, PathBuf};

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Snapshot file; `None` keeps the database in memory only
    pub path: Option<PathBuf>,
    /// Pretty-print the snapshot document
    pub pretty: bool,
    /// fsync the snapshot before it replaces the previous one
    pub sync: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pretty: false,
            sync: true,
        }
    }
}

impl DatabaseConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot file
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set pretty-printed output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set whether saves are synced to disk
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Check whether the database is persisted
    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }
}
