//! Record filters for store queries and bulk writes.
//!
//! # Responsibility
//! - Express the conjunction of field conditions the engine's lookups need
//!   (scope-group membership, id exclusion).
//! - Evaluate those conditions with the same value semantics the change
//!   detector uses.
//!
//! # Invariants
//! - Relation-valued fields match by canonical identifier, so a stored
//!   `{id: 7}` satisfies an `eq(field, 7)` clause.
//! - An empty filter matches every record.

use crate::change::value_eq;
use crate::model::record::Record;
use crate::model::value::FieldValue;
use crate::relation;

/// One filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Eq(String, FieldValue),
    Ne(String, FieldValue),
}

/// Conjunction of conditions over projected or stored record fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.clauses.push(Clause::Eq(field.into(), value.into()));
        self
    }

    pub fn ne(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.clauses.push(Clause::Ne(field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `record` satisfies every clause.
    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(field, expected) => field_matches(record, field, expected),
            Clause::Ne(field, expected) => !field_matches(record, field, expected),
        })
    }
}

fn field_matches(record: &Record, field: &str, expected: &FieldValue) -> bool {
    let actual = if field == "id" {
        Some(record.id.to_value())
    } else {
        record.get(field).cloned()
    };

    if value_eq(actual.as_ref(), Some(expected)) {
        return true;
    }

    // Relation fields may be stored in a different raw shape than the
    // filter value; fall back to canonical identifier comparison.
    match (actual.as_ref().and_then(relation::normalize), relation::normalize(expected)) {
        (Some(actual_id), Some(expected_id)) => actual_id == expected_id,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::Filter;
    use crate::model::record::Record;
    use crate::model::value::{FieldMap, FieldValue};

    fn record(id: i64, entries: &[(&str, FieldValue)]) -> Record {
        let fields: FieldMap = entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        Record::new(id, fields)
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&record(1, &[])));
    }

    #[test]
    fn eq_and_ne_clauses_conjoin() {
        let filter = Filter::new()
            .eq("period", 4)
            .ne("id", 9);

        assert!(filter.matches(&record(1, &[("period", FieldValue::Int(4))])));
        assert!(!filter.matches(&record(9, &[("period", FieldValue::Int(4))])));
        assert!(!filter.matches(&record(1, &[("period", FieldValue::Int(5))])));
    }

    #[test]
    fn relation_shaped_fields_match_by_canonical_id() {
        let stored = record(
            1,
            &[("period", FieldValue::object([("id", FieldValue::Int(4))]))],
        );
        assert!(Filter::new().eq("period", 4).matches(&stored));
        assert!(!Filter::new().eq("period", 5).matches(&stored));
    }

    #[test]
    fn id_clause_targets_the_record_id() {
        let filter = Filter::new().eq("id", 3);
        assert!(filter.matches(&record(3, &[])));
        assert!(!filter.matches(&record(4, &[])));
    }

    #[test]
    fn missing_field_only_matches_nullish_expectations() {
        assert!(Filter::new().eq("site", FieldValue::Null).matches(&record(1, &[])));
        assert!(!Filter::new().eq("site", 2).matches(&record(1, &[])));
    }
}
