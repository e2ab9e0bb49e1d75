//! In-memory entity store.
//!
//! # Responsibility
//! - Provide the substitution point for the external store: same contract,
//!   no persistence, deterministic iteration order.
//! - Count write calls so tests can assert that recomputation suppresses
//!   redundant writes.
//!
//! # Invariants
//! - Reads over an unknown collection yield empty results, never errors;
//!   a missing record is `None`, mirroring the real store.

use crate::model::record::{EntityId, Record};
use crate::model::value::FieldMap;
use crate::store::{apply_projection, EntityStore, Filter, StoreResult};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

type Collections = BTreeMap<String, BTreeMap<EntityId, FieldMap>>;

/// Mutex-guarded map-of-maps store fake.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    write_calls: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one record, replacing any previous row with the same id.
    pub fn insert(&self, collection: impl Into<String>, record: Record) {
        self.guard()
            .entry(collection.into())
            .or_default()
            .insert(record.id, record.fields);
    }

    /// Removes one record; `false` when it was not present.
    pub fn delete(&self, collection: &str, id: &EntityId) -> bool {
        self.guard()
            .get_mut(collection)
            .is_some_and(|records| records.remove(id).is_some())
    }

    /// Number of write calls (`update_one` / `update_many`) observed.
    pub fn write_calls(&self) -> u64 {
        *lock_or_recover(&self.write_calls)
    }

    fn record_write(&self) {
        *lock_or_recover(&self.write_calls) += 1;
    }

    fn guard(&self) -> MutexGuard<'_, Collections> {
        lock_or_recover(&self.collections)
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EntityStore for MemoryStore {
    fn find_one(
        &self,
        collection: &str,
        id: &EntityId,
        projection: &[&str],
    ) -> StoreResult<Option<Record>> {
        let collections = self.guard();
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .map(|fields| Record::new(id.clone(), apply_projection(fields, projection))))
    }

    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> StoreResult<Vec<Record>> {
        let collections = self.guard();
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .map(|(id, fields)| Record::new(id.clone(), fields.clone()))
            .filter(|record| filter.matches(record))
            .map(|record| {
                let projected = apply_projection(&record.fields, projection);
                Record::new(record.id, projected)
            })
            .collect())
    }

    fn update_one(&self, collection: &str, id: &EntityId, fields: &FieldMap) -> StoreResult<bool> {
        self.record_write();
        let mut collections = self.guard();
        let Some(stored) = collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
        else {
            return Ok(false);
        };
        for (field, value) in fields {
            stored.insert(field.clone(), value.clone());
        }
        Ok(true)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &FieldMap,
    ) -> StoreResult<usize> {
        self.record_write();
        let mut collections = self.guard();
        let Some(records) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let targets: Vec<EntityId> = records
            .iter()
            .filter(|(id, stored)| {
                filter.matches(&Record::new((*id).clone(), (*stored).clone()))
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &targets {
            if let Some(stored) = records.get_mut(id) {
                for (field, value) in fields {
                    stored.insert(field.clone(), value.clone());
                }
            }
        }
        Ok(targets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::model::record::{EntityId, Record};
    use crate::model::value::{FieldMap, FieldValue};
    use crate::store::{EntityStore, Filter};

    fn fields(entries: &[(&str, FieldValue)]) -> FieldMap {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn find_one_applies_projection() {
        let store = MemoryStore::new();
        store.insert(
            "lists",
            Record::new(
                1,
                fields(&[
                    ("status", FieldValue::from("published")),
                    ("title", FieldValue::from("L")),
                ]),
            ),
        );

        let loaded = store
            .find_one("lists", &EntityId::Int(1), &["status"])
            .unwrap()
            .unwrap();
        assert_eq!(loaded.text("status"), Some("published"));
        assert!(loaded.get("title").is_none());
    }

    #[test]
    fn unknown_collection_reads_are_empty_not_errors() {
        let store = MemoryStore::new();
        assert!(store
            .find_one("nowhere", &EntityId::Int(1), &[])
            .unwrap()
            .is_none());
        assert!(store
            .find_many("nowhere", &Filter::new(), &[])
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .update_many("nowhere", &Filter::new(), &FieldMap::new())
                .unwrap(),
            0
        );
    }

    #[test]
    fn update_many_touches_only_matching_records() {
        let store = MemoryStore::new();
        store.insert("rows", Record::new(1, fields(&[("site", FieldValue::Int(2))])));
        store.insert("rows", Record::new(2, fields(&[("site", FieldValue::Int(3))])));

        let written = store
            .update_many(
                "rows",
                &Filter::new().eq("site", 2),
                &fields(&[("priority", FieldValue::Int(9))]),
            )
            .unwrap();
        assert_eq!(written, 1);

        let untouched = store.find_one("rows", &EntityId::Int(2), &[]).unwrap().unwrap();
        assert!(untouched.get("priority").is_none());
        assert_eq!(store.write_calls(), 1);
    }
}
