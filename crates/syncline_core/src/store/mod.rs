//! Entity store boundary.
//!
//! # Responsibility
//! - Define the read/write contract the engine consumes from the backing
//!   store: minimal-field reads and single/bulk field writes.
//! - Provide the in-memory fake and the embedded SQLite adapter.
//!
//! # Invariants
//! - The engine only reads records and writes back derived fields through
//!   this trait; it never creates or deletes entities.
//! - Projections bound read cost: callers request only the fields a
//!   recomputation needs.

use crate::db::DbError;
use crate::model::record::{EntityId, Record};
use crate::model::value::{FieldMap, FieldValue};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod filter;
mod memory;
mod sqlite;

pub use filter::{Clause, Filter};
pub use memory::MemoryStore;
pub use sqlite::SqliteEntityStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store adapter failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Fields column could not be encoded or decoded.
    Encoding(serde_json::Error),
    /// Connection has not been migrated to the supported schema version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Schema is versioned correctly but a required table is absent.
    MissingRequiredTable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encoding(err) => write!(f, "invalid persisted entity fields: {err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection not migrated: schema version {actual_version}, expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table missing: {table}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encoding(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value)
    }
}

/// Read/write contract consumed by the engine services.
pub trait EntityStore {
    /// Loads one record by id, restricted to `projection` (empty = full).
    fn find_one(
        &self,
        collection: &str,
        id: &EntityId,
        projection: &[&str],
    ) -> StoreResult<Option<Record>>;

    /// Loads every record matching `filter`, restricted to `projection`.
    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> StoreResult<Vec<Record>>;

    /// Writes `fields` onto one record. Returns `false` when the record
    /// does not exist (an acceptable outcome for derived-field writes).
    fn update_one(&self, collection: &str, id: &EntityId, fields: &FieldMap) -> StoreResult<bool>;

    /// Writes `fields` onto every record matching `filter`, returning the
    /// number of records written.
    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &FieldMap,
    ) -> StoreResult<usize>;
}

impl<S: EntityStore + ?Sized> EntityStore for &S {
    fn find_one(
        &self,
        collection: &str,
        id: &EntityId,
        projection: &[&str],
    ) -> StoreResult<Option<Record>> {
        (**self).find_one(collection, id, projection)
    }

    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> StoreResult<Vec<Record>> {
        (**self).find_many(collection, filter, projection)
    }

    fn update_one(&self, collection: &str, id: &EntityId, fields: &FieldMap) -> StoreResult<bool> {
        (**self).update_one(collection, id, fields)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &FieldMap,
    ) -> StoreResult<usize> {
        (**self).update_many(collection, filter, fields)
    }
}

impl<S: EntityStore + ?Sized> EntityStore for Arc<S> {
    fn find_one(
        &self,
        collection: &str,
        id: &EntityId,
        projection: &[&str],
    ) -> StoreResult<Option<Record>> {
        (**self).find_one(collection, id, projection)
    }

    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> StoreResult<Vec<Record>> {
        (**self).find_many(collection, filter, projection)
    }

    fn update_one(&self, collection: &str, id: &EntityId, fields: &FieldMap) -> StoreResult<bool> {
        (**self).update_one(collection, id, fields)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &FieldMap,
    ) -> StoreResult<usize> {
        (**self).update_many(collection, filter, fields)
    }
}

/// Applies a projection to stored fields. The id never travels through
/// here; it is carried on [`Record`] directly.
pub(crate) fn apply_projection(fields: &FieldMap, projection: &[&str]) -> FieldMap {
    if projection.is_empty() {
        return fields.clone();
    }
    projection
        .iter()
        .filter_map(|field| {
            fields
                .get(*field)
                .map(|value: &FieldValue| ((*field).to_string(), value.clone()))
        })
        .collect()
}
