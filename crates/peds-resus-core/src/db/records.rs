//! Record operations on the SQLite store.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::{Collection, Database, ObjectStore, StoreError, StoreResult};

/// Extract the key of a record. String and integer ids are accepted.
fn record_key(collection: Collection, record: &Value) -> StoreResult<String> {
    match record.get(collection.key_path()) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::MissingKey { collection }),
    }
}

/// Extract the secondary index value for indexed collections.
///
/// Numbers are kept numeric so that they order numerically.
pub(super) fn index_value(collection: Collection, record: &Value) -> Option<SqlValue> {
    let index = collection.index()?;
    match record.get(index.key_path)? {
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real),
        },
        _ => None,
    }
}

impl ObjectStore for Database {
    fn put(&self, collection: Collection, records: &[Value]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        // Validate every record before touching the store
        let rows = records
            .iter()
            .map(|record| {
                Ok((
                    record_key(collection, record)?,
                    serde_json::to_string(record)?,
                    index_value(collection, record),
                ))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let sql = format!(
            r#"
            INSERT INTO {} (id, payload, index_value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                index_value = excluded.index_value,
                updated_at = excluded.updated_at
            "#,
            collection.table()
        );

        let mut conn = self.conn(collection)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (id, payload, index) in &rows {
                stmt.execute(params![id, payload, index])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        let conn = self.conn(collection)?;
        let payload: Option<String> = conn
            .query_row(
                &format!("SELECT payload FROM {} WHERE id = ?1", collection.table()),
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn get_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let conn = self.conn(collection)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT payload FROM {} ORDER BY rowid",
            collection.table()
        ))?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| Ok(serde_json::from_str(json)?))
            .collect()
    }

    fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let conn = self.conn(collection)?;
        let rows = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", collection.table()),
            params![id],
        )?;
        Ok(rows > 0)
    }

    fn clear(&self, collection: Collection) -> StoreResult<()> {
        let conn = self.conn(collection)?;
        conn.execute(&format!("DELETE FROM {}", collection.table()), [])?;
        Ok(())
    }

    fn count(&self, collection: Collection) -> StoreResult<usize> {
        let conn = self.conn(collection)?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", collection.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn meta_get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.meta_conn()?;
        Ok(conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn meta_put(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.meta_conn()?;
        conn.execute(
            r#"
            INSERT INTO store_meta (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }
}

impl Database {
    /// Records of an indexed collection, newest index value first.
    ///
    /// Collections without an index are returned in insertion order.
    pub fn get_all_by_index(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        if collection.index().is_none() {
            return self.get_all(collection);
        }
        let conn = self.conn(collection)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT payload FROM {} ORDER BY index_value DESC, rowid",
            collection.table()
        ))?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| Ok(serde_json::from_str(json)?))
            .collect()
    }
}
