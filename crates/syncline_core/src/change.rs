//! Field-level change detection.
//!
//! # Responsibility
//! - Compare candidate field values against previously stored values and
//!   report the minimal set of fields that actually changed.
//!
//! # Invariants
//! - `diff` over identical inputs is empty; callers rely on this to
//!   suppress no-op writes and to break hook cascades.
//! - Comparison is value-semantics: two nullish values are equal, two NaN
//!   floats are equal, numerically equal ints and floats are equal.

use crate::model::value::{FieldMap, FieldValue};

/// Value-semantics equality over optionally absent field values.
pub fn value_eq(a: Option<&FieldValue>, b: Option<&FieldValue>) -> bool {
    match (present(a), present(b)) {
        (None, None) => true,
        (Some(a), Some(b)) => eq_present(a, b),
        _ => false,
    }
}

/// Returns the fields of `next` that differ from `previous`, restricted to
/// `fields`, each mapped to its next value (`Null` when absent on `next`).
pub fn diff<F: AsRef<str>>(next: &FieldMap, previous: &FieldMap, fields: &[F]) -> FieldMap {
    let mut changed = FieldMap::new();
    for field in fields {
        let field = field.as_ref();
        let next_value = next.get(field);
        if !value_eq(next_value, previous.get(field)) {
            changed.insert(
                field.to_string(),
                next_value.cloned().unwrap_or(FieldValue::Null),
            );
        }
    }
    changed
}

fn present(value: Option<&FieldValue>) -> Option<&FieldValue> {
    value.filter(|value| !value.is_null())
}

fn eq_present(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
        (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
        (FieldValue::Float(a), FieldValue::Float(b)) => {
            a == b || (a.is_nan() && b.is_nan())
        }
        (FieldValue::Int(a), FieldValue::Float(b)) | (FieldValue::Float(b), FieldValue::Int(a)) => {
            *a as f64 == *b
        }
        (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
        (FieldValue::Array(a), FieldValue::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(a, b)| value_eq(Some(a), Some(b)))
        }
        (FieldValue::Object(a), FieldValue::Object(b)) => a
            .keys()
            .chain(b.keys())
            .all(|key| value_eq(a.get(key), b.get(key))),
        _ => false,
    }
}
