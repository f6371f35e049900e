//! Snapshot persistence
//!
//! The whole database is stored as one JSON document mapping table name to
//! `{ "columns": [...], "rows": [...] }`.
//!
//! The store keeps the last-persisted image of every table. A save replaces
//! the images of the tables the caller has just changed (the caller holds
//! their write locks) and rewrites the full document, so saving never needs to
//! lock tables it did not touch. The image map is guarded by its own mutex and
//! no table lock is ever acquired while it is held.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::table::Table;
use crate::config::DatabaseConfig;
use crate::error::Result;

/// Snapshot document
pub type SnapshotData = BTreeMap<String, Table>;

/// Persists table images to the snapshot file
#[derive(Debug)]
pub struct SnapshotStore {
    path: Option<PathBuf>,
    pretty: bool,
    sync: bool,
    images: Mutex<SnapshotData>,
}

impl SnapshotStore {
    /// Open the snapshot described by `config`, returning the store and the
    /// tables it held. A missing file yields an empty database.
    pub fn open(config: &DatabaseConfig) -> Result<(Self, SnapshotData)> {
        let tables = match &config.path {
            Some(path) => load(path)?,
            None => SnapshotData::new(),
        };

        let store = Self {
            path: config.path.clone(),
            pretty: config.pretty,
            sync: config.sync,
            images: Mutex::new(tables.clone()),
        };
        Ok((store, tables))
    }

    /// Record the new state of the given tables and write the snapshot.
    ///
    /// If the write fails the previous images are restored, so the store keeps
    /// matching the file on disk.
    pub fn save<'a>(&self, changed: impl IntoIterator<Item = &'a Table>) -> Result<()> {
        let mut images = self.images.lock();
        let previous: Vec<(String, Option<Table>)> = changed
            .into_iter()
            .map(|table| {
                let name = table.name().to_string();
                let old = images.insert(name.clone(), table.clone());
                (name, old)
            })
            .collect();

        let Some(path) = &self.path else {
            return Ok(());
        };
        let result = self.write(path, &images);
        if result.is_err() {
            for (name, old) in previous {
                match old {
                    Some(table) => images.insert(name, table),
                    None => images.remove(&name),
                };
            }
        }
        result
    }

    /// Names of all persisted tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.images.lock().keys().cloned().collect()
    }

    /// Check whether a table has been created
    pub fn contains(&self, table: &str) -> bool {
        self.images.lock().contains_key(table)
    }

    /// Schema of a persisted table
    pub fn columns(&self, table: &str) -> Option<Vec<String>> {
        self.images
            .lock()
            .get(table)
            .map(|t| t.columns().to_vec())
    }

    /// Write to a temporary file, then atomically rename it over the snapshot.
    fn write(&self, path: &Path, data: &SnapshotData) -> Result<()> {
        let tmp_path = tmp_path(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            if self.pretty {
                serde_json::to_writer_pretty(&mut writer, data)?;
            } else {
                serde_json::to_writer(&mut writer, data)?;
            }
            writer.flush()?;
            if self.sync {
                writer.get_ref().sync_all()?;
            }
        }
        std::fs::rename(&tmp_path, path)?;
        debug!(path = %path.display(), tables = data.len(), "snapshot written");
        Ok(())
    }
}

/// Read a snapshot file; a missing file is an empty database.
pub fn load(path: &Path) -> Result<SnapshotData> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no snapshot found, starting empty");
            return Ok(SnapshotData::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut tables: SnapshotData = serde_json::from_str(&json)?;
    for (name, table) in tables.iter_mut() {
        table.set_name(name.clone());
    }
    info!(path = %path.display(), tables = tables.len(), "snapshot loaded");
    Ok(tables)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::{RowMap, Value};

    fn users() -> Table {
        let mut table = Table::new("users", vec!["id".to_string(), "name".to_string()]).unwrap();
        let mut row = RowMap::new();
        row.insert("name".into(), Value::from("Alice"));
        table.insert_rows(vec![row]).unwrap();
        table
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tables = load(&dir.path().join("db.json")).unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let config = DatabaseConfig::new().path(&path);

        let (store, tables) = SnapshotStore::open(&config).unwrap();
        assert!(tables.is_empty());

        let table = users();
        store.save([&table]).unwrap();
        assert!(!tmp_path(&path).exists());

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.get("users"), Some(&table));
        assert_eq!(loaded["users"].name(), "users");
    }

    #[test]
    fn test_document_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let (store, _) = SnapshotStore::open(&DatabaseConfig::new().path(&path)).unwrap();
        store.save([&users()]).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["users"]["columns"], serde_json::json!(["id", "name"]));
        assert_eq!(doc["users"]["rows"][0]["name"], "Alice");
        assert!(doc["users"]["rows"][0]["id"].is_string());
    }

    #[test]
    fn test_save_keeps_untouched_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let (store, _) = SnapshotStore::open(&DatabaseConfig::new().path(&path)).unwrap();

        let first = users();
        let second = Table::new("orders", vec!["total".to_string()]).unwrap();
        store.save([&first]).unwrap();
        store.save([&second]).unwrap();

        assert_eq!(store.table_names(), vec!["orders", "users"]);
        assert_eq!(load(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load(&path), Err(Error::Snapshot(_))));
    }
}
