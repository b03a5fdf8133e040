//! SQLite schema definition and migrations.

use rusqlite::{params, Connection, Transaction};

use super::records::index_value;
use super::{Collection, StoreError, StoreResult};

/// File name of the on-device store.
pub const DATABASE_NAME: &str = "peds-resus.db";

/// Current schema version, stamped into `PRAGMA user_version`.
///
/// - 1: medications, equipment, vital_signs, store_meta
/// - 2: algorithms, checklists (indexed by lastModified), contacts, sync_queue
/// - 3: untyped index_value so numeric index keys sort as numbers
pub const SCHEMA_VERSION: u32 = 3;

/// Store-level key/value table (seed fingerprints).
pub const META_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// DDL for one collection table and its declared index.
///
/// Every collection shares one layout: the `id` key path, the JSON payload,
/// and an `index_value` column populated only for indexed collections. The
/// index column has no declared type, so values keep their JSON kind.
pub fn collection_ddl(collection: Collection) -> String {
    let table = collection.table();
    let mut ddl = format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,                       -- JSON record
    index_value,                                 -- secondary index key
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#
    );
    if let Some(index) = collection.index() {
        ddl.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {table}(index_value);\n",
            index.name
        ));
    }
    ddl
}

/// Read the schema version stamped in the file.
pub fn schema_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring a store up to `SCHEMA_VERSION`.
///
/// Creates any missing collection tables and indexes in one transaction, then
/// stamps the version. Must complete before collection handles are opened.
/// A file written by a newer schema is refused.
pub fn migrate(conn: &mut Connection) -> StoreResult<u32> {
    let found = schema_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(StoreError::VersionTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    if found == SCHEMA_VERSION {
        return Ok(found);
    }

    let tx = conn.transaction()?;
    tx.execute_batch(META_SCHEMA)?;
    if found == 2 {
        for collection in Collection::ALL {
            if collection.index().is_some() {
                rebuild_indexed(&tx, collection)?;
            }
        }
    }
    for collection in Collection::ALL {
        tx.execute_batch(&collection_ddl(collection))?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    tracing::info!(
        "Upgraded store schema from version {} to {}",
        found,
        SCHEMA_VERSION
    );
    Ok(SCHEMA_VERSION)
}

/// Recreate an indexed collection with the current layout, recomputing
/// index values from the stored payloads.
fn rebuild_indexed(tx: &Transaction<'_>, collection: Collection) -> StoreResult<()> {
    let table = collection.table();
    let old = format!("{}_previous", table);
    if let Some(index) = collection.index() {
        tx.execute_batch(&format!("DROP INDEX IF EXISTS {};", index.name))?;
    }
    tx.execute_batch(&format!("ALTER TABLE {table} RENAME TO {old};"))?;
    tx.execute_batch(&collection_ddl(collection))?;

    // Statements are finalized before the old table is dropped
    {
        let mut select = tx.prepare(&format!(
            "SELECT id, payload, updated_at FROM {old} ORDER BY rowid"
        ))?;
        let rows = select
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut insert = tx.prepare(&format!(
            "INSERT INTO {table} (id, payload, index_value, updated_at) VALUES (?1, ?2, ?3, ?4)"
        ))?;
        for (id, payload, updated_at) in &rows {
            let record: serde_json::Value = serde_json::from_str(payload)?;
            insert.execute(params![
                id,
                payload,
                index_value(collection, &record),
                updated_at
            ])?;
        }
    }
    tx.execute_batch(&format!("DROP TABLE {old};"))?;
    Ok(())
}
