//! TripStore - versioned record persistence
//!
//! Stores JSON bodies in SQLite keyed by `(collection, id)`. Every write bumps a
//! per-record version; writers pass the version they read and a mismatch is
//! reported as [`StoreError::Conflict`] so callers can reload and retry.

use std::path::PathBuf;

pub mod store;

pub use store::{RecordInfo, Store, StoreError, Versioned};

/// File name of the SQLite database inside a store directory
pub const DB_FILE_NAME: &str = "tripstore.db";

/// Default store directory: `<data_local_dir>/tripplanner/store`
pub fn default_store_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("store")
}
