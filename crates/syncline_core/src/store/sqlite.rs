//! Embedded SQLite entity store.
//!
//! # Responsibility
//! - Persist entity records as JSON field documents keyed by
//!   (collection, id), for hosts that embed the engine without an
//!   external backend.
//! - Keep SQL details inside the storage boundary.
//!
//! # Invariants
//! - Construction fails on unmigrated connections instead of masking
//!   schema drift at first query.
//! - Filters are evaluated with [`Filter::matches`], so the SQLite and
//!   in-memory adapters share one filter semantics.

use crate::db::migrations::{current_version, latest_version};
use crate::model::record::{EntityId, Record};
use crate::model::value::FieldMap;
use crate::store::{apply_projection, EntityStore, Filter, StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

const ENTITY_SELECT_SQL: &str = "SELECT id, fields FROM entities WHERE collection = ?1";

/// SQLite-backed entity store over a migrated connection.
pub struct SqliteEntityStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Constructs a store from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Seeds one record, replacing any previous row with the same id.
    ///
    /// Assigns a fresh `document_id` to new rows; replacing a row keeps
    /// its original secondary identifier stable.
    pub fn insert(&self, collection: &str, record: &Record) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO entities (collection, id, document_id, fields)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (collection, id) DO UPDATE SET
                fields = excluded.fields,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                collection,
                encode_id(&record.id)?,
                Uuid::new_v4().to_string(),
                encode_fields(&record.fields)?,
            ],
        )?;
        Ok(())
    }

    /// Removes one record; `false` when it was not present.
    pub fn delete(&self, collection: &str, id: &EntityId) -> StoreResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM entities WHERE collection = ?1 AND id = ?2;",
            params![collection, encode_id(id)?],
        )?;
        Ok(removed > 0)
    }

    fn load_fields(&self, collection: &str, id: &EntityId) -> StoreResult<Option<FieldMap>> {
        let encoded: Option<String> = self
            .conn
            .query_row(
                "SELECT fields FROM entities WHERE collection = ?1 AND id = ?2;",
                params![collection, encode_id(id)?],
                |row| row.get(0),
            )
            .optional()?;
        encoded.map(|fields| decode_fields(&fields)).transpose()
    }

    fn write_fields(&self, collection: &str, id: &EntityId, fields: &FieldMap) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE entities
             SET fields = ?3, updated_at = (strftime('%s', 'now') * 1000)
             WHERE collection = ?1 AND id = ?2;",
            params![collection, encode_id(id)?, encode_fields(fields)?],
        )?;
        Ok(())
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn find_one(
        &self,
        collection: &str,
        id: &EntityId,
        projection: &[&str],
    ) -> StoreResult<Option<Record>> {
        Ok(self
            .load_fields(collection, id)?
            .map(|fields| Record::new(id.clone(), apply_projection(&fields, projection))))
    }

    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> StoreResult<Vec<Record>> {
        let mut statement = self
            .conn
            .prepare(&format!("{ENTITY_SELECT_SQL} ORDER BY id;"))?;
        let rows = statement.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, fields) = row?;
            let record = Record::new(decode_id(&id)?, decode_fields(&fields)?);
            if filter.matches(&record) {
                let projected = apply_projection(&record.fields, projection);
                records.push(Record::new(record.id, projected));
            }
        }
        Ok(records)
    }

    fn update_one(&self, collection: &str, id: &EntityId, fields: &FieldMap) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let Some(mut stored) = self.load_fields(collection, id)? else {
            return Ok(false);
        };
        for (field, value) in fields {
            stored.insert(field.clone(), value.clone());
        }
        self.write_fields(collection, id, &stored)?;
        tx.commit()?;
        Ok(true)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &FieldMap,
    ) -> StoreResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let targets = self.find_many(collection, filter, &[])?;
        for record in &targets {
            let mut stored = record.fields.clone();
            for (field, value) in fields {
                stored.insert(field.clone(), value.clone());
            }
            self.write_fields(collection, &record.id, &stored)?;
        }
        tx.commit()?;
        Ok(targets.len())
    }
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let entities_present: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'entities';",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if entities_present.is_none() {
        return Err(StoreError::MissingRequiredTable("entities"));
    }
    Ok(())
}

/// Ids persist in their JSON encoding so numeric and string ids stay
/// distinguishable (`7` vs `"7"`).
fn encode_id(id: &EntityId) -> StoreResult<String> {
    Ok(serde_json::to_string(id)?)
}

fn decode_id(encoded: &str) -> StoreResult<EntityId> {
    Ok(serde_json::from_str(encoded)?)
}

fn encode_fields(fields: &FieldMap) -> StoreResult<String> {
    Ok(serde_json::to_string(fields)?)
}

fn decode_fields(encoded: &str) -> StoreResult<FieldMap> {
    Ok(serde_json::from_str(encoded)?)
}
