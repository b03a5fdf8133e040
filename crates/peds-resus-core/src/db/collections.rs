//! Named collections of the local object store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named partition of the store. Each collection is keyed by `id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Medications,
    Equipment,
    VitalSigns,
    Algorithms,
    Checklists,
    Contacts,
    SyncQueue,
}

/// Secondary index declared on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name in the schema
    pub name: &'static str,
    /// Payload field the index is built from
    pub key_path: &'static str,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Medications,
        Collection::Equipment,
        Collection::VitalSigns,
        Collection::Algorithms,
        Collection::Checklists,
        Collection::Contacts,
        Collection::SyncQueue,
    ];

    /// Collection name as exposed to callers.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Medications => "medications",
            Collection::Equipment => "equipment",
            Collection::VitalSigns => "vitalSigns",
            Collection::Algorithms => "algorithms",
            Collection::Checklists => "checklists",
            Collection::Contacts => "contacts",
            Collection::SyncQueue => "syncQueue",
        }
    }

    /// Backing SQLite table.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Medications => "medications",
            Collection::Equipment => "equipment",
            Collection::VitalSigns => "vital_signs",
            Collection::Algorithms => "algorithms",
            Collection::Checklists => "checklists",
            Collection::Contacts => "contacts",
            Collection::SyncQueue => "sync_queue",
        }
    }

    /// Key path of every record in the collection.
    pub fn key_path(&self) -> &'static str {
        "id"
    }

    /// Secondary index, if the collection declares one.
    pub fn index(&self) -> Option<IndexSpec> {
        match self {
            Collection::Checklists => Some(IndexSpec {
                name: "idx_checklists_last_modified",
                key_path: "lastModified",
            }),
            _ => None,
        }
    }

    /// Look up a collection by its exposed name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for c in Collection::ALL {
            assert_eq!(Collection::from_name(c.name()), Some(c));
        }
        assert_eq!(Collection::from_name("vital_signs"), None);
    }

    #[test]
    fn test_only_checklists_indexed() {
        let indexed: Vec<_> = Collection::ALL
            .iter()
            .filter(|c| c.index().is_some())
            .collect();
        assert_eq!(indexed, vec![&Collection::Checklists]);
    }

    #[test]
    fn test_serde_uses_exposed_name() {
        assert_eq!(
            serde_json::to_string(&Collection::VitalSigns).unwrap(),
            r#""vitalSigns""#
        );
    }
}
