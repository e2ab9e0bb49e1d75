//! Relation payload normalization.
//!
//! # Responsibility
//! - Convert every relation representation the store emits (bare ids,
//!   records carrying an id, `connect`/`set` batch wrappers) into one
//!   canonical identifier.
//!
//! # Invariants
//! - Normalization is pure: identical raw input always yields the same
//!   canonical identifier.
//! - An absent, empty or unrecognized relation normalizes to `None`,
//!   never to an error.

use crate::model::record::EntityId;
use crate::model::value::{FieldMap, FieldValue};
use std::collections::BTreeSet;

/// Normalizes one raw relation value to its canonical identifier.
///
/// Recognized shapes:
/// - a primitive id (integer, integral float, non-blank string),
/// - a record object carrying `id` (or the secondary `document_id`),
/// - a batch-operation wrapper whose `connect` or `set` list leads with a
///   recognizable element.
///
/// Everything else — `null`, booleans, bare arrays, blank strings,
/// non-integral floats, empty objects — yields `None`.
pub fn normalize(raw: &FieldValue) -> Option<EntityId> {
    match raw {
        FieldValue::Int(value) => Some(EntityId::Int(*value)),
        FieldValue::Float(value) => integral_id(*value),
        FieldValue::Text(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(EntityId::Str(trimmed.to_string()))
            }
        }
        FieldValue::Object(map) => normalize_object(map),
        FieldValue::Null | FieldValue::Bool(_) | FieldValue::Array(_) => None,
    }
}

/// Normalizes the named relation field of a record map.
pub fn normalize_field(fields: &FieldMap, field: &str) -> Option<EntityId> {
    fields.get(field).and_then(normalize)
}

/// Extracts the unique canonical identifiers from a collection of raw
/// per-entity relation values, as reported by multi-entity operations.
pub fn normalize_many<'a, I>(values: I) -> BTreeSet<EntityId>
where
    I: IntoIterator<Item = &'a FieldValue>,
{
    values.into_iter().filter_map(normalize).collect()
}

fn normalize_object(map: &FieldMap) -> Option<EntityId> {
    if let Some(id) = map.get("id") {
        return normalize(id);
    }
    if let Some(id) = map.get("document_id") {
        return normalize(id);
    }
    let batch = map.get("connect").or_else(|| map.get("set"))?;
    batch.as_array()?.first().and_then(normalize)
}

fn integral_id(value: f64) -> Option<EntityId> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(EntityId::Int(value as i64))
    } else {
        None
    }
}
