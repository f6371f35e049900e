//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Once;
use tracing_subscriber::EnvFilter;

use tabledb::{RowMap, Value};

static INIT: Once = Once::new();

/// Install a test-friendly subscriber once; filter with `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Build a row from column/value pairs
pub fn row(pairs: &[(&str, Value)]) -> RowMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Build a single-column `name` row
pub fn named(name: &str) -> RowMap {
    row(&[("name", Value::from(name))])
}
