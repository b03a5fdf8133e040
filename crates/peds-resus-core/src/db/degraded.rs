//! Stand-in store used when persistence is unavailable.

use serde_json::Value;

use super::{Collection, ObjectStore, StoreResult};

/// Store that holds nothing: reads miss and writes are discarded.
///
/// Used when the database cannot be opened, so the cache layer always falls
/// through to bundled data.
#[derive(Debug, Clone)]
pub struct DegradedStore {
    reason: String,
}

impl DegradedStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Why persistence is unavailable.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl ObjectStore for DegradedStore {
    fn is_available(&self) -> bool {
        false
    }

    fn put(&self, _collection: Collection, _records: &[Value]) -> StoreResult<()> {
        Ok(())
    }

    fn get(&self, _collection: Collection, _id: &str) -> StoreResult<Option<Value>> {
        Ok(None)
    }

    fn get_all(&self, _collection: Collection) -> StoreResult<Vec<Value>> {
        Ok(Vec::new())
    }

    fn delete(&self, _collection: Collection, _id: &str) -> StoreResult<bool> {
        Ok(false)
    }

    fn clear(&self, _collection: Collection) -> StoreResult<()> {
        Ok(())
    }

    fn count(&self, _collection: Collection) -> StoreResult<usize> {
        Ok(0)
    }

    fn meta_get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    fn meta_put(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_writes_are_discarded() {
        let store = DegradedStore::new("disk full");
        store
            .put_one(Collection::Medications, &json!({"id": "x"}))
            .unwrap();
        assert_eq!(store.get(Collection::Medications, "x").unwrap(), None);
        assert!(store.get_all(Collection::Medications).unwrap().is_empty());
        assert!(!store.is_available());
        assert_eq!(store.reason(), "disk full");
    }
}
