//! Lifecycle event payloads delivered by the store dispatcher.
//!
//! # Responsibility
//! - Define the hook vocabulary and the raw event shape the engine's entry
//!   points consume.
//! - Provide accessors that tolerate every payload shape the store emits
//!   (single records, record lists, missing sections).
//!
//! # Invariants
//! - Events carry relation values exactly as the store produced them;
//!   normalization happens in [`crate::relation`], never here.
//! - Only `data` is ever mutated, and only by before-hooks.

use crate::model::value::{FieldMap, FieldValue};
use serde::{Deserialize, Serialize};

/// Hook points the dispatcher fires around store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    BeforeCreate,
    BeforeUpdate,
    BeforeCreateMany,
    BeforeUpdateMany,
    AfterCreate,
    AfterUpdate,
    AfterDelete,
    AfterCreateMany,
    AfterUpdateMany,
    AfterDeleteMany,
}

impl HookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeCreate => "beforeCreate",
            Self::BeforeUpdate => "beforeUpdate",
            Self::BeforeCreateMany => "beforeCreateMany",
            Self::BeforeUpdateMany => "beforeUpdateMany",
            Self::AfterCreate => "afterCreate",
            Self::AfterUpdate => "afterUpdate",
            Self::AfterDelete => "afterDelete",
            Self::AfterCreateMany => "afterCreateMany",
            Self::AfterUpdateMany => "afterUpdateMany",
            Self::AfterDeleteMany => "afterDeleteMany",
        }
    }

    /// Whether this hook reports a multi-entity operation.
    pub fn is_bulk(self) -> bool {
        matches!(
            self,
            Self::BeforeCreateMany
                | Self::BeforeUpdateMany
                | Self::AfterCreateMany
                | Self::AfterUpdateMany
                | Self::AfterDeleteMany
        )
    }
}

/// One lifecycle notification around a store write.
///
/// Sections are optional because the dispatcher only supplies what the
/// triggering operation declared: before-hooks carry `data` (and `filter`
/// for updates), after-hooks carry `result` (and `snapshot` for updates).
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub collection: String,
    pub kind: HookKind,
    /// Write payload; before-hooks may rewrite it in place.
    pub data: Option<FieldValue>,
    /// Targeting parameters of the triggering operation (`where`).
    pub filter: Option<FieldValue>,
    /// Declared result: one record map, or a list of record maps for bulk
    /// operations.
    pub result: Option<FieldValue>,
    /// Pre-update state of the targeted record, supplied for updates.
    pub snapshot: Option<FieldValue>,
}

impl LifecycleEvent {
    pub fn new(collection: impl Into<String>, kind: HookKind) -> Self {
        Self {
            collection: collection.into(),
            kind,
            data: None,
            filter: None,
            result: None,
            snapshot: None,
        }
    }

    pub fn with_data(mut self, data: FieldMap) -> Self {
        self.data = Some(FieldValue::Object(data));
        self
    }

    pub fn with_filter(mut self, filter: FieldMap) -> Self {
        self.filter = Some(FieldValue::Object(filter));
        self
    }

    pub fn with_result(mut self, result: FieldValue) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_snapshot(mut self, snapshot: FieldMap) -> Self {
        self.snapshot = Some(FieldValue::Object(snapshot));
        self
    }

    /// Raw id value of the entity this event is about: the declared
    /// result's `id`, falling back to the targeting filter's `id`.
    pub fn id_value(&self) -> Option<&FieldValue> {
        self.section_field(self.result.as_ref(), "id")
            .or_else(|| self.section_field(self.filter.as_ref(), "id"))
    }

    /// Declared result as record maps: one map for single operations, each
    /// object element for bulk lists, nothing for count-only results.
    pub fn result_records(&self) -> Vec<&FieldMap> {
        match self.result.as_ref() {
            Some(FieldValue::Object(map)) => vec![map],
            Some(FieldValue::Array(items)) => {
                items.iter().filter_map(FieldValue::as_object).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Pre-update snapshot fields, when the dispatcher supplied them.
    pub fn snapshot_map(&self) -> Option<&FieldMap> {
        self.snapshot.as_ref().and_then(FieldValue::as_object)
    }

    /// Mutable write payload for before-hooks.
    pub fn data_map_mut(&mut self) -> Option<&mut FieldMap> {
        match self.data.as_mut() {
            Some(FieldValue::Object(map)) => Some(map),
            _ => None,
        }
    }

    fn section_field<'a>(
        &self,
        section: Option<&'a FieldValue>,
        field: &str,
    ) -> Option<&'a FieldValue> {
        section.and_then(FieldValue::as_object).and_then(|map| map.get(field))
    }
}
