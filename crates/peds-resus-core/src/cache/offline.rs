//! The offline cache over an object store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{fingerprint, seed_key, CacheRecord};
use crate::config::StorageConfig;
use crate::db::{Collection, Database, DegradedStore, ObjectStore, StoreError, StoreResult};

/// Whether the cache is backed by persistent storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheStatus {
    Available,
    Unavailable { reason: String },
}

/// Seed key value while a seed is in progress. Never a valid fingerprint.
const SEED_PENDING: &str = "pending";

/// Which path an `ensure` call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Store,
    Bundled { reseed: bool },
}

/// Offline cache layer.
///
/// Never fails: when the store cannot be opened or stops working, the cache
/// switches to degraded mode once and serves bundled tables from then on.
pub struct OfflineCache {
    store: Arc<dyn ObjectStore>,
    degraded: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl OfflineCache {
    /// Open the on-device store, falling back to degraded mode.
    pub fn open(config: &StorageConfig) -> Self {
        let path = config.database_path();
        match Database::open(&path) {
            Ok(db) => {
                info!("Opened offline cache at {:?}", path);
                Self::with_store(Arc::new(db))
            }
            Err(e) => {
                warn!(
                    "Persistent store unavailable, serving bundled rule tables: {}",
                    e
                );
                Self::unavailable(e.to_string())
            }
        }
    }

    /// Cache over a private in-memory store.
    pub fn in_memory() -> Self {
        match Database::open_in_memory() {
            Ok(db) => Self::with_store(Arc::new(db)),
            Err(e) => {
                warn!("In-memory store unavailable: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    /// Cache over any object store.
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        let available = store.is_available();
        Self {
            store,
            degraded: AtomicBool::new(!available),
            reason: Mutex::new((!available).then(|| "store is not persistent".to_string())),
        }
    }

    fn unavailable(reason: String) -> Self {
        Self {
            store: Arc::new(DegradedStore::new(reason.clone())),
            degraded: AtomicBool::new(true),
            reason: Mutex::new(Some(reason)),
        }
    }

    /// Records for `T::COLLECTION`, from the store or the bundled table.
    ///
    /// With a working store, the first call seeds the collection and later
    /// calls read it back. A collection seeded from a different version of the
    /// table is cleared and reseeded. Seed failures are logged and ignored.
    pub fn ensure<T: CacheRecord>(&self, table: &[T]) -> Vec<T> {
        if table.is_empty() {
            return Vec::new();
        }
        if self.is_degraded() {
            return table.to_vec();
        }

        let collection = T::COLLECTION;
        let expected = fingerprint(table);
        let (records, source) = match self.read::<T>(collection, &expected) {
            Ok(result) => result,
            Err(e) => {
                self.degrade(&e);
                return table.to_vec();
            }
        };

        match source {
            Source::Store => {
                debug!("Cache hit for {} ({} records)", collection, records.len());
                records
            }
            Source::Bundled { reseed } => {
                self.seed(collection, table, &expected, reseed);
                table.to_vec()
            }
        }
    }

    fn read<T: CacheRecord>(
        &self,
        collection: Collection,
        expected: &str,
    ) -> StoreResult<(Vec<T>, Source)> {
        let stored = self.store.get_all(collection)?;
        if stored.is_empty() {
            return Ok((Vec::new(), Source::Bundled { reseed: false }));
        }

        let seeded_from = self.store.meta_get(&seed_key(collection))?;
        if let Some(found) = seeded_from {
            if found != expected {
                info!("Bundled {} table changed, reseeding", collection);
                return Ok((Vec::new(), Source::Bundled { reseed: true }));
            }
        }

        let decoded = stored
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>();
        match decoded {
            Ok(records) => Ok((records, Source::Store)),
            Err(e) => {
                warn!("Stored {} records unreadable, reseeding: {}", collection, e);
                Ok((Vec::new(), Source::Bundled { reseed: true }))
            }
        }
    }

    /// Write the table and its fingerprint.
    ///
    /// The seed key holds [`SEED_PENDING`] while records are written, so a
    /// seed interrupted at any step is seen as stale by the next `ensure`.
    /// If the marker cannot be written the collection is left untouched.
    fn seed<T: CacheRecord>(&self, collection: Collection, table: &[T], fp: &str, reseed: bool) {
        let key = seed_key(collection);
        let result = (|| -> StoreResult<()> {
            let values = table
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            self.store.meta_put(&key, SEED_PENDING)?;
            if reseed {
                self.store.clear(collection)?;
            }
            self.store.put(collection, &values)?;
            self.store.meta_put(&key, fp)
        })();

        match result {
            Ok(()) => info!("Seeded {} with {} records", collection, table.len()),
            Err(e) => warn!("Seeding {} failed (ignored): {}", collection, e),
        }
    }

    /// Remove a collection so the next `ensure` reseeds it.
    pub fn clear(&self, collection: Collection) -> StoreResult<()> {
        if self.is_degraded() {
            return Ok(());
        }
        self.store.clear(collection)
    }

    pub fn status(&self) -> CacheStatus {
        if !self.is_degraded() {
            return CacheStatus::Available;
        }
        let reason = self
            .reason
            .lock()
            .ok()
            .and_then(|r| r.clone())
            .unwrap_or_else(|| "unknown".to_string());
        CacheStatus::Unavailable { reason }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// The store behind the cache.
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Switch to degraded mode. Only the first call logs.
    fn degrade(&self, error: &StoreError) {
        if self.degraded.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(
            "Store failed, serving bundled rule tables for the rest of the session: {}",
            error
        );
        if let Ok(mut reason) = self.reason.lock() {
            *reason = Some(error.to_string());
        }
    }
}
