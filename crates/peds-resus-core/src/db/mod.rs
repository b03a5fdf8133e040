//! Local object store for peds-resus.
//!
//! Records are JSON objects keyed by their `id` field, grouped into named
//! [`Collection`]s. [`Database`] is the SQLite-backed store; [`DegradedStore`]
//! stands in when persistence is unavailable so that callers can keep working
//! from bundled data.

mod collections;
mod degraded;
mod records;
mod schema;

pub use collections::*;
pub use degraded::*;
pub use schema::*;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;
use serde_json::Value;
use thiserror::Error;

/// How long a connection waits on a locked file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record in '{collection}' has no usable id")]
    MissingKey { collection: Collection },

    #[error("Store schema version {found} is newer than supported version {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations every object store provides.
///
/// A put of several records is atomic: either all are written or none are.
/// Puts replace any existing record with the same id.
pub trait ObjectStore: Send + Sync {
    /// Whether writes actually persist.
    fn is_available(&self) -> bool {
        true
    }

    /// Insert or replace records.
    fn put(&self, collection: Collection, records: &[Value]) -> StoreResult<()>;

    /// Insert or replace one record.
    fn put_one(&self, collection: Collection, record: &Value) -> StoreResult<()> {
        self.put(collection, std::slice::from_ref(record))
    }

    /// Fetch one record by id.
    fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>>;

    /// Fetch every record in insertion order.
    fn get_all(&self, collection: Collection) -> StoreResult<Vec<Value>>;

    /// Remove a record. Returns whether it existed.
    fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    /// Remove every record in a collection.
    fn clear(&self, collection: Collection) -> StoreResult<()>;

    /// Number of records in a collection.
    fn count(&self, collection: Collection) -> StoreResult<usize>;

    /// Read a store-level metadata value.
    fn meta_get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a store-level metadata value.
    fn meta_put(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// SQLite-backed object store.
///
/// Each collection has its own connection so that work on one collection
/// never waits on another. A separate connection serves store metadata.
pub struct Database {
    meta: Mutex<Connection>,
    collections: HashMap<Collection, Mutex<Connection>>,
    location: String,
    schema_version: u32,
}

impl Database {
    /// Open database at path, creating it and its parent directory if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::open_with(path.display().to_string())
    }

    /// Create an isolated in-memory database (for testing and degraded hosts).
    ///
    /// Every collection lives in its own private in-memory database, so
    /// collections never contend for a lock. Nothing is shared between stores.
    pub fn open_in_memory() -> StoreResult<Self> {
        let location = format!("memory:{}", uuid::Uuid::new_v4());

        let mut meta = Connection::open_in_memory()?;
        let schema_version = schema::migrate(&mut meta)?;

        let mut collections = HashMap::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(&schema::collection_ddl(collection))?;
            collections.insert(collection, Mutex::new(conn));
        }

        tracing::debug!("Opened in-memory store {}", location);

        Ok(Self {
            meta: Mutex::new(meta),
            collections,
            location,
            schema_version,
        })
    }

    fn open_with(location: String) -> StoreResult<Self> {
        let mut meta = Connection::open(&location)?;
        configure(&meta, true)?;
        // Schema must be current before any collection handle exists
        let schema_version = schema::migrate(&mut meta)?;

        let mut collections = HashMap::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let conn = Connection::open(&location)?;
            configure(&conn, false)?;
            collections.insert(collection, Mutex::new(conn));
        }

        tracing::debug!(
            "Opened store at {} (schema version {})",
            location,
            schema_version
        );

        Ok(Self {
            meta: Mutex::new(meta),
            collections,
            location,
            schema_version,
        })
    }

    /// Path or URI the store was opened from.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Schema version after migration.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Connection serving a collection.
    fn conn(&self, collection: Collection) -> StoreResult<MutexGuard<'_, Connection>> {
        let slot = self
            .collections
            .get(&collection)
            .ok_or_else(|| StoreError::Unavailable(format!("no handle for {}", collection)))?;
        slot.lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Connection serving store metadata.
    fn meta_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.meta
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

fn configure(conn: &Connection, wal: bool) -> StoreResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if wal {
        // Returns the resulting mode
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
        assert_eq!(db.unwrap().schema_version(), SCHEMA_VERSION);
    }

    #[test]
    fn test_in_memory_stores_are_isolated() {
        let a = Database::open_in_memory().unwrap();
        let b = Database::open_in_memory().unwrap();
        assert_ne!(a.location(), b.location());
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DATABASE_NAME);
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.schema_version(), SCHEMA_VERSION);
    }

    #[test]
    fn test_open_refuses_newer_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_NAME);
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
                .unwrap();
        }
        assert!(matches!(
            Database::open(&path),
            Err(StoreError::VersionTooNew { .. })
        ));
    }
}
