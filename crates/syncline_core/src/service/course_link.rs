//! Course-subject link preparation: parent-field inheritance and
//! uniqueness fingerprint upkeep.
//!
//! # Responsibility
//! - Before a course-subject link is written, inherit year/letter/label
//!   from the parent course when the payload leaves them open.
//! - Recompute the stored uniqueness fingerprint from
//!   (course, subject, year, normalized group) so it never drifts from
//!   its definition.
//!
//! # Invariants
//! - An explicit year in an update payload is never overwritten by
//!   inheritance.
//! - The fingerprint is derived state: payload-supplied values are
//!   overwritten by the recomputation.

use crate::model::record::EntityId;
use crate::model::value::{FieldMap, FieldValue};
use crate::relation;
use crate::scope::{build_key, KeyPart};
use crate::service::SyncError;
use crate::store::EntityStore;
use log::debug;

/// Collection and field names the preparation rule operates on.
#[derive(Debug, Clone)]
pub struct CourseLinkConfig {
    pub collection: String,
    pub course_collection: String,
    pub course_field: String,
    pub subject_field: String,
    pub year_field: String,
    pub letter_field: String,
    pub label_field: String,
    pub group_field: String,
    /// Stored uniqueness fingerprint field.
    pub fingerprint_field: String,
}

impl CourseLinkConfig {
    fn inheritable_fields(&self) -> [&str; 3] {
        [
            self.year_field.as_str(),
            self.letter_field.as_str(),
            self.label_field.as_str(),
        ]
    }
}

impl Default for CourseLinkConfig {
    fn default() -> Self {
        Self {
            collection: "course_subjects".to_string(),
            course_collection: "courses".to_string(),
            course_field: "course".to_string(),
            subject_field: "subject".to_string(),
            year_field: "year".to_string(),
            letter_field: "letter".to_string(),
            label_field: "label".to_string(),
            group_field: "group".to_string(),
            fingerprint_field: "fingerprint".to_string(),
        }
    }
}

/// Result of one preparation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareOutcome {
    /// Fingerprint written onto the payload, when it could be derived.
    pub fingerprint: Option<String>,
    /// Fields filled in from the parent course.
    pub inherited: Vec<String>,
}

/// Prepares course-subject write payloads before they reach the store.
pub struct CourseLinkService<S: EntityStore> {
    store: S,
    config: CourseLinkConfig,
}

impl<S: EntityStore> CourseLinkService<S> {
    pub fn new(store: S, config: CourseLinkConfig) -> Self {
        Self { store, config }
    }

    /// Prepares a create payload: inherit, then fingerprint
    /// unconditionally.
    ///
    /// # Errors
    /// - `Validation` when the course or subject relation is missing;
    ///   the link is undefined without both.
    pub fn prepare_create(&self, data: &mut FieldMap) -> Result<PrepareOutcome, SyncError> {
        let cfg = &self.config;
        // On create "absent" includes explicit nulls; there is no stored
        // row an explicit null could be protecting.
        let inherited = if is_open(data.get(&cfg.year_field)) {
            self.inherit(data, is_open)?
        } else {
            Vec::new()
        };

        let course = relation::normalize_field(data, &cfg.course_field).ok_or_else(|| {
            SyncError::Validation(format!("{} relation is required", cfg.course_field))
        })?;
        let subject = relation::normalize_field(data, &cfg.subject_field).ok_or_else(|| {
            SyncError::Validation(format!("{} relation is required", cfg.subject_field))
        })?;

        let fingerprint = self.fingerprint(&course, &subject, data);
        data.insert(
            cfg.fingerprint_field.clone(),
            FieldValue::from(fingerprint.clone()),
        );
        Ok(PrepareOutcome {
            fingerprint: Some(fingerprint),
            inherited,
        })
    }

    /// Prepares an update payload for the link identified by `target`.
    ///
    /// Inheritance triggers only when the course relation is explicitly
    /// part of the payload and the year field is not. The fingerprint is
    /// recomputed on every update, reading constituents missing from the
    /// payload off the stored row; when the target cannot be resolved and
    /// the payload is incomplete, the fingerprint is left untouched.
    pub fn prepare_update(
        &self,
        data: &mut FieldMap,
        target: Option<&EntityId>,
    ) -> Result<PrepareOutcome, SyncError> {
        let cfg = &self.config;
        let inherited = if data.contains_key(&cfg.course_field)
            && !data.contains_key(&cfg.year_field)
        {
            // On update "absent" means the key is not in the payload; an
            // explicit null is still an explicit choice.
            self.inherit(data, |value| value.is_none())?
        } else {
            Vec::new()
        };

        let mut basis = match target {
            Some(id) => {
                let projection = [
                    cfg.course_field.as_str(),
                    cfg.subject_field.as_str(),
                    cfg.year_field.as_str(),
                    cfg.group_field.as_str(),
                ];
                self.store
                    .find_one(&cfg.collection, id, &projection)?
                    .map(|record| record.fields)
                    .unwrap_or_default()
            }
            None => FieldMap::new(),
        };
        for field in [
            &cfg.course_field,
            &cfg.subject_field,
            &cfg.year_field,
            &cfg.group_field,
        ] {
            if let Some(value) = data.get(field) {
                basis.insert(field.clone(), value.clone());
            }
        }

        let course = relation::normalize_field(&basis, &cfg.course_field);
        let subject = relation::normalize_field(&basis, &cfg.subject_field);
        let (Some(course), Some(subject)) = (course, subject) else {
            debug!(
                "event=link_prepare module=course_link status=skip reason=unresolved_constituents"
            );
            return Ok(PrepareOutcome {
                fingerprint: None,
                inherited,
            });
        };

        let fingerprint = self.fingerprint(&course, &subject, &basis);
        data.insert(
            cfg.fingerprint_field.clone(),
            FieldValue::from(fingerprint.clone()),
        );
        Ok(PrepareOutcome {
            fingerprint: Some(fingerprint),
            inherited,
        })
    }

    /// Copies year/letter/label from the parent course onto `data`,
    /// filling only fields that `is_absent` reports as open.
    fn inherit(
        &self,
        data: &mut FieldMap,
        is_absent: fn(Option<&FieldValue>) -> bool,
    ) -> Result<Vec<String>, SyncError> {
        let cfg = &self.config;
        let Some(course_id) = relation::normalize_field(data, &cfg.course_field) else {
            return Ok(Vec::new());
        };
        let Some(course) = self.store.find_one(
            &cfg.course_collection,
            &course_id,
            &cfg.inheritable_fields(),
        )?
        else {
            return Ok(Vec::new());
        };

        let mut inherited = Vec::new();
        for field in cfg.inheritable_fields() {
            if !is_absent(data.get(field)) {
                continue;
            }
            if let Some(value) = course.get(field) {
                if !value.is_null() {
                    data.insert(field.to_string(), value.clone());
                    inherited.push(field.to_string());
                }
            }
        }
        if !inherited.is_empty() {
            debug!(
                "event=link_prepare module=course_link status=ok course_id={course_id} inherited={}",
                inherited.join(",")
            );
        }
        Ok(inherited)
    }

    fn fingerprint(&self, course: &EntityId, subject: &EntityId, fields: &FieldMap) -> String {
        let cfg = &self.config;
        build_key(&[
            KeyPart::Id(course.clone()),
            KeyPart::Id(subject.clone()),
            KeyPart::scalar(fields.get(&cfg.year_field)),
            KeyPart::scalar(fields.get(&cfg.group_field)),
        ])
    }
}

fn is_open(value: Option<&FieldValue>) -> bool {
    value.is_none() || value.is_some_and(FieldValue::is_null)
}
