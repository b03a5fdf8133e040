//! Offline cache layer.
//!
//! Mediates between the bundled rule tables and the on-device store so the
//! engine always has data:
//!
//! ```text
//!   ensure(table)
//!        │
//!        ├─ store has records seeded from this table ──► return stored records
//!        │
//!        └─ store empty / stale / unreadable / unavailable
//!                 │
//!                 ├─► seed store (best effort, store available only)
//!                 └─► return bundled table
//! ```

mod offline;

pub use offline::*;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::db::Collection;
use crate::models::{AlgorithmRule, EquipmentRule, MedicationRule, VitalAgeBand};

/// A record type that lives in one store collection.
pub trait CacheRecord: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Collection the records are stored in.
    const COLLECTION: Collection;

    /// Collection key.
    fn id(&self) -> &str;
}

impl CacheRecord for MedicationRule {
    const COLLECTION: Collection = Collection::Medications;

    fn id(&self) -> &str {
        &self.id
    }
}

impl CacheRecord for EquipmentRule {
    const COLLECTION: Collection = Collection::Equipment;

    fn id(&self) -> &str {
        &self.id
    }
}

impl CacheRecord for VitalAgeBand {
    const COLLECTION: Collection = Collection::VitalSigns;

    fn id(&self) -> &str {
        &self.id
    }
}

impl CacheRecord for AlgorithmRule {
    const COLLECTION: Collection = Collection::Algorithms;

    fn id(&self) -> &str {
        &self.id
    }
}

/// SHA-256 over the serialized table, hex encoded.
///
/// Identifies which version of a bundled table seeded a collection.
pub fn fingerprint<T: Serialize>(table: &[T]) -> String {
    let bytes = serde_json::to_vec(table).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Metadata key holding the fingerprint a collection was seeded from.
pub(crate) fn seed_key(collection: Collection) -> String {
    format!("seed:{}", collection.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleTables;

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let tables = RuleTables::bundled().unwrap();
        let a = fingerprint(&tables.medications);
        let b = fingerprint(&tables.medications);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut changed = tables.medications.clone();
        changed[0].name.push('!');
        assert_ne!(fingerprint(&changed), a);
    }

    #[test]
    fn test_collections_per_record_type() {
        assert_eq!(MedicationRule::COLLECTION, Collection::Medications);
        assert_eq!(VitalAgeBand::COLLECTION, Collection::VitalSigns);
        assert_eq!(seed_key(VitalAgeBand::COLLECTION), "seed:vitalSigns");
    }
}
