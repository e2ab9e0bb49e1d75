//! Dynamic field value representation.
//!
//! # Responsibility
//! - Define the single value shape shared by entity fields, event payloads
//!   and store filters.
//! - Keep relation payloads representable exactly as the store produced
//!   them (bare ids, objects, batch-operation wrappers).
//!
//! # Invariants
//! - `FieldValue` round-trips through serde as plain JSON (untagged).
//! - `Float` may hold NaN in memory; serializers emit `null` for
//!   non-finite floats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named fields of one entity, ordered for deterministic iteration.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One field value in whatever shape the store produced it.
///
/// Derived `PartialEq` is structural (`NaN != NaN`); value-semantics
/// comparison lives in [`crate::change::value_eq`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Array(Vec<FieldValue>),
    Object(FieldMap),
}

impl FieldValue {
    /// Builds an object value from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Builds an array value from elements.
    pub fn array<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = FieldValue>,
    {
        Self::Array(elements.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&FieldMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
