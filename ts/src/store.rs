//! SQLite-backed record store with optimistic concurrency

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Version conflict on {collection}/{id}: expected {expected:?}, found {found:?}")]
    Conflict {
        collection: String,
        id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("Store busy writing {collection}/{id}: another writer held the lock")]
    Busy { collection: String, id: String },
}

impl StoreError {
    /// Check if this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Conflicts and lock timeouts both clear up after a reload
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::Busy { .. })
    }

    fn from_write(err: rusqlite::Error, collection: &str, id: &str) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => StoreError::Busy {
                collection: collection.to_string(),
                id: id.to_string(),
            },
            _ => StoreError::Sqlite(err),
        }
    }
}

/// How long a writer waits for another process's lock before giving up
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A record together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    /// Last write time (unix ms)
    pub updated_at: i64,
    pub value: T,
}

/// Listing entry for a stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    pub id: String,
    pub version: u64,
    pub updated_at: i64,
}

/// Versioned JSON record store
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store inside `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_busy_timeout(dir, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the store, waiting up to `busy_timeout` for other writers
    pub fn open_with_busy_timeout(dir: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        debug!(dir = %dir.display(), ?busy_timeout, "Store::open: called");
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(crate::DB_FILE_NAME))?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self { conn };
        store.create_tables()?;
        info!(dir = %dir.display(), "Store opened");
        Ok(store)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Store::open_in_memory: called");
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );
            ",
        )?;
        Ok(())
    }

    /// Read a record and the version it is at
    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<Versioned<T>>, StoreError> {
        debug!(%collection, %id, "Store::get: called");
        let row = self
            .conn
            .query_row(
                "SELECT version, updated_at, body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()?;

        match row {
            Some((version, updated_at, body)) => Ok(Some(Versioned {
                version: version as u64,
                updated_at,
                value: serde_json::from_str(&body)?,
            })),
            None => {
                debug!(%collection, %id, "Store::get: not found");
                Ok(None)
            }
        }
    }

    /// Write a record if its stored version still equals `expected`
    ///
    /// `expected = None` means the caller believes the record does not exist yet.
    /// Returns the new version.
    pub fn put<T: Serialize>(
        &mut self,
        collection: &str,
        id: &str,
        value: &T,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        debug!(%collection, %id, ?expected, "Store::put: called");
        let body = serde_json::to_string(value)?;
        let now = chrono::Utc::now().timestamp_millis();

        // take the write lock before reading so the version check and the write are atomic
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::from_write(e, collection, id))?;
        let found: Option<u64> = tx
            .query_row(
                "SELECT version FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|e| StoreError::from_write(e, collection, id))?
            .map(|v| v as u64);

        if found != expected {
            debug!(%collection, %id, ?expected, ?found, "Store::put: version conflict");
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                id: id.to_string(),
                expected,
                found,
            });
        }

        let next = found.map_or(1, |v| v + 1);
        tx.execute(
            "INSERT INTO records (collection, id, version, body, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(collection, id) DO UPDATE SET version = ?3, body = ?4, updated_at = ?5",
            params![collection, id, next as i64, body, now],
        )
        .map_err(|e| StoreError::from_write(e, collection, id))?;
        tx.commit().map_err(|e| StoreError::from_write(e, collection, id))?;

        debug!(%collection, %id, version = next, "Store::put: committed");
        Ok(next)
    }

    /// List records of a collection, most recently updated first
    pub fn list(&self, collection: &str) -> Result<Vec<RecordInfo>, StoreError> {
        debug!(%collection, "Store::list: called");
        let mut stmt = self.conn.prepare(
            "SELECT id, version, updated_at FROM records WHERE collection = ?1 ORDER BY updated_at DESC, id",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok(RecordInfo {
                id: row.get(0)?,
                version: row.get::<_, i64>(1)? as u64,
                updated_at: row.get(2)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Delete a record, returning whether it existed
    pub fn delete(&mut self, collection: &str, id: &str) -> Result<bool, StoreError> {
        debug!(%collection, %id, "Store::delete: called");
        let changed = self.conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    fn note(text: &str) -> Note {
        Note { text: text.to_string() }
    }

    #[test]
    fn test_put_and_get() {
        let temp = tempdir().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let version = store.put("notes", "a", &note("hello"), None).unwrap();
        assert_eq!(version, 1);

        let read: Versioned<Note> = store.get("notes", "a").unwrap().unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.value, note("hello"));
    }

    #[test]
    fn test_get_missing() {
        let store = Store::open_in_memory().unwrap();
        let read: Option<Versioned<Note>> = store.get("notes", "nope").unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn test_stale_write_conflicts() {
        let mut store = Store::open_in_memory().unwrap();
        store.put("notes", "a", &note("one"), None).unwrap();
        store.put("notes", "a", &note("two"), Some(1)).unwrap();

        let err = store.put("notes", "a", &note("stale"), Some(1)).unwrap_err();
        assert!(err.is_conflict());

        let read: Versioned<Note> = store.get("notes", "a").unwrap().unwrap();
        assert_eq!(read.value, note("two"));
        assert_eq!(read.version, 2);
    }

    #[test]
    fn test_create_twice_conflicts() {
        let mut store = Store::open_in_memory().unwrap();
        store.put("notes", "a", &note("one"), None).unwrap();
        let err = store.put("notes", "a", &note("again"), None).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { found: Some(1), .. }));
    }

    #[test]
    fn test_list_and_delete() {
        let mut store = Store::open_in_memory().unwrap();
        store.put("notes", "a", &note("one"), None).unwrap();
        store.put("notes", "b", &note("two"), None).unwrap();
        store.put("other", "c", &note("three"), None).unwrap();

        let listed = store.list("notes").unwrap();
        assert_eq!(listed.len(), 2);

        assert!(store.delete("notes", "a").unwrap());
        assert!(!store.delete("notes", "a").unwrap());
        assert_eq!(store.list("notes").unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_persists() {
        let temp = tempdir().unwrap();
        {
            let mut store = Store::open(temp.path()).unwrap();
            store.put("notes", "a", &note("kept"), None).unwrap();
        }
        let store = Store::open(temp.path()).unwrap();
        let read: Versioned<Note> = store.get("notes", "a").unwrap().unwrap();
        assert_eq!(read.value, note("kept"));
    }

    #[test]
    fn test_put_waits_for_other_writer() {
        let temp = tempdir().unwrap();
        let mut store = Store::open(temp.path()).unwrap();
        store.put("notes", "a", &note("one"), None).unwrap();

        let other = Store::open(temp.path()).unwrap();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            other.conn.execute_batch("BEGIN IMMEDIATE").unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(200));
            other.conn.execute_batch("COMMIT").unwrap();
        });
        locked_rx.recv().unwrap();

        let version = store.put("notes", "a", &note("two"), Some(1)).unwrap();
        assert_eq!(version, 2);
        holder.join().unwrap();
    }

    #[test]
    fn test_lock_timeout_is_retryable() {
        let temp = tempdir().unwrap();
        let mut store = Store::open_with_busy_timeout(temp.path(), Duration::from_millis(50)).unwrap();
        store.put("notes", "a", &note("one"), None).unwrap();

        let other = Store::open(temp.path()).unwrap();
        other.conn.execute_batch("BEGIN IMMEDIATE").unwrap();

        let err = store.put("notes", "a", &note("two"), Some(1)).unwrap_err();
        assert!(matches!(err, StoreError::Busy { .. }), "got {err}");
        assert!(err.is_retryable());
        assert!(!err.is_conflict());

        other.conn.execute_batch("ROLLBACK").unwrap();
        assert_eq!(store.put("notes", "a", &note("two"), Some(1)).unwrap(), 2);
    }

    proptest! {
        #[test]
        fn prop_sequential_writes_bump_version(writes in 1usize..20) {
            let mut store = Store::open_in_memory().unwrap();
            let mut version = None;
            for i in 0..writes {
                version = Some(store.put("notes", "a", &note(&i.to_string()), version).unwrap());
            }
            prop_assert_eq!(version, Some(writes as u64));
        }
    }
}
