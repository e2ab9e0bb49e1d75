//! Composite scope key derivation.
//!
//! # Responsibility
//! - Derive one deterministic key from an ordered tuple of normalized
//!   relation ids and scalar attributes.
//!
//! # Invariants
//! - Identical logical inputs yield an identical key regardless of how
//!   relations were represented in the raw payload (callers normalize
//!   relations before building parts).
//! - Text parts are case- and whitespace-insensitive; ids are verbatim.

use crate::model::record::EntityId;
use crate::model::value::FieldValue;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const KEY_SEPARATOR: &str = "|";

/// One ordered component of a scope key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    /// Canonical relation identifier, rendered verbatim.
    Id(EntityId),
    /// Scalar text, normalized (trimmed, whitespace collapsed, lowercased).
    Text(String),
    Int(i64),
    Bool(bool),
    /// Absent component; keeps tuple arity stable.
    Empty,
}

impl KeyPart {
    /// Maps a raw scalar field value to a key part.
    ///
    /// Absent and unrepresentable values become `Empty` so that the key
    /// always has the same arity as the scope tuple.
    pub fn scalar(value: Option<&FieldValue>) -> Self {
        match value {
            Some(FieldValue::Int(value)) => Self::Int(*value),
            Some(FieldValue::Float(value)) if value.is_finite() && value.fract() == 0.0 => {
                Self::Int(*value as i64)
            }
            Some(FieldValue::Text(value)) => Self::Text(value.clone()),
            Some(FieldValue::Bool(value)) => Self::Bool(*value),
            _ => Self::Empty,
        }
    }
}

impl From<EntityId> for KeyPart {
    fn from(value: EntityId) -> Self {
        Self::Id(value)
    }
}

impl From<Option<EntityId>> for KeyPart {
    fn from(value: Option<EntityId>) -> Self {
        value.map_or(Self::Empty, Self::Id)
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Builds the deterministic, order-sensitive composite key.
pub fn build_key(parts: &[KeyPart]) -> String {
    parts
        .iter()
        .map(render)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

fn render(part: &KeyPart) -> String {
    match part {
        KeyPart::Id(id) => id.to_string(),
        KeyPart::Text(text) => normalize_text(text),
        KeyPart::Int(value) => value.to_string(),
        KeyPart::Bool(value) => value.to_string(),
        KeyPart::Empty => String::new(),
    }
}

fn normalize_text(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}
