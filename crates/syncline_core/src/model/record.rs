//! Entity identifiers and record projections.
//!
//! # Responsibility
//! - Define the canonical identifier shared by every stored entity.
//! - Define the record shape returned by store reads.
//!
//! # Invariants
//! - An `EntityId` is stable for the lifetime of its entity and is never
//!   synthesized by this crate; ids always originate in the store.
//! - A `Record` is a projection: absent fields mean "not loaded", not
//!   "not set".

use crate::model::value::{FieldMap, FieldValue};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Canonical entity identifier.
///
/// Stores hand out numeric or string primary keys depending on the
/// collection; both normalize to this one type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    /// Returns this id as a field value, for filters and write payloads.
    pub fn to_value(&self) -> FieldValue {
        match self {
            Self::Int(value) => FieldValue::Int(*value),
            Self::Str(value) => FieldValue::Text(value.clone()),
        }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// One entity row as returned by a store read.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Primary identifier, always present regardless of projection.
    pub id: EntityId,
    /// Projected fields in whatever raw shape the store holds them.
    pub fields: FieldMap,
}

impl Record {
    pub fn new(id: impl Into<EntityId>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Returns one projected field, `None` when absent.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Returns a text field, `None` when absent or not text.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    /// Returns a boolean field, `None` when absent or not boolean.
    pub fn boolean(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(FieldValue::as_bool)
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityId, Record};
    use crate::model::value::{FieldMap, FieldValue};

    #[test]
    fn id_displays_without_decoration() {
        assert_eq!(EntityId::Int(42).to_string(), "42");
        assert_eq!(EntityId::from("c-2024").to_string(), "c-2024");
    }

    #[test]
    fn id_serde_keeps_primitive_shape() {
        assert_eq!(
            serde_json::to_string(&EntityId::Int(9)).expect("int id encodes"),
            "9"
        );
        assert_eq!(
            serde_json::to_string(&EntityId::from("abc")).expect("str id encodes"),
            "\"abc\""
        );
        let decoded: EntityId = serde_json::from_str("9").expect("int id decodes");
        assert_eq!(decoded, EntityId::Int(9));
    }

    #[test]
    fn record_accessors_report_absent_fields() {
        let mut fields = FieldMap::new();
        fields.insert("state".to_string(), FieldValue::from("draft"));
        let record = Record::new(1, fields);

        assert_eq!(record.text("state"), Some("draft"));
        assert_eq!(record.text("missing"), None);
        assert_eq!(record.boolean("state"), None);
    }
}
