//! Sibling-group field propagation.
//!
//! # Responsibility
//! - After an assignment update, copy the whitelisted fields that actually
//!   changed onto every other assignment sharing the same scope.
//!
//! # Invariants
//! - Only the configured role participates; other roles skip silently.
//! - The diff is computed between authoritative reloaded state and the
//!   event's pre-update snapshot; an empty diff performs no write, which
//!   also keeps the rule from re-triggering itself through its own
//!   sibling writes.
//! - Partial application on store failure is accepted; re-running
//!   converges to the same final state.

use crate::change;
use crate::model::event::LifecycleEvent;
use crate::model::record::EntityId;
use crate::model::value::FieldMap;
use crate::relation;
use crate::service::SyncError;
use crate::store::{EntityStore, Filter};
use log::{debug, info};

/// Collection and field names the propagation rule operates on.
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    pub collection: String,
    pub role_field: String,
    /// Role tag whose assignments participate in propagation.
    ///
    /// The rule is deliberately scoped to one role; nothing in the data
    /// explains why other roles stay out, so widening it is a host
    /// decision, not a default.
    pub role_tag: String,
    pub period_field: String,
    pub site_field: String,
    pub current_field: String,
    /// Fields copied onto siblings when they change.
    pub propagated_fields: Vec<String>,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            collection: "assignments".to_string(),
            role_field: "role".to_string(),
            role_tag: "sales".to_string(),
            period_field: "period".to_string(),
            site_field: "site".to_string(),
            current_field: "is_current".to_string(),
            propagated_fields: vec!["priority".to_string(), "order".to_string()],
        }
    }
}

/// Why a propagation pass did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event carried no resolvable entity id.
    NoId,
    /// The updated assignment no longer exists.
    MissingRow,
    /// The assignment's role does not participate.
    RoleMismatch,
    /// No whitelisted field actually changed.
    EmptyDiff,
    /// Period or site relation is missing; the sibling group is
    /// undefined without a full scope.
    IncompleteScope,
}

/// Result of one propagation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagationOutcome {
    Skipped(SkipReason),
    Propagated {
        source_id: EntityId,
        /// Whitelisted fields that changed and were copied.
        fields: Vec<String>,
        /// Number of sibling records written.
        siblings: usize,
    },
}

/// Copies changed whitelisted fields across a scope group.
pub struct PropagationService<S: EntityStore> {
    store: S,
    config: PropagationConfig,
}

impl<S: EntityStore> PropagationService<S> {
    pub fn new(store: S, config: PropagationConfig) -> Self {
        Self { store, config }
    }

    /// Entry point for assignment update events.
    pub fn propagate(&self, event: &LifecycleEvent) -> Result<PropagationOutcome, SyncError> {
        let cfg = &self.config;
        let Some(source_id) = event.id_value().and_then(relation::normalize) else {
            return Ok(PropagationOutcome::Skipped(SkipReason::NoId));
        };

        let mut projection = vec![
            cfg.role_field.as_str(),
            cfg.period_field.as_str(),
            cfg.site_field.as_str(),
            cfg.current_field.as_str(),
        ];
        projection.extend(cfg.propagated_fields.iter().map(String::as_str));

        let Some(source) = self
            .store
            .find_one(&cfg.collection, &source_id, &projection)?
        else {
            debug!(
                "event=propagation module=propagation status=skip reason=row_missing id={source_id}"
            );
            return Ok(PropagationOutcome::Skipped(SkipReason::MissingRow));
        };

        if source.text(&cfg.role_field).map(str::trim) != Some(cfg.role_tag.as_str()) {
            return Ok(PropagationOutcome::Skipped(SkipReason::RoleMismatch));
        }

        let empty = FieldMap::new();
        let snapshot = event.snapshot_map().unwrap_or(&empty);
        let changed = change::diff(&source.fields, snapshot, &cfg.propagated_fields);
        if changed.is_empty() {
            debug!(
                "event=propagation module=propagation status=skip reason=empty_diff id={source_id}"
            );
            return Ok(PropagationOutcome::Skipped(SkipReason::EmptyDiff));
        }

        let period = relation::normalize_field(&source.fields, &cfg.period_field);
        let site = relation::normalize_field(&source.fields, &cfg.site_field);
        let (Some(period), Some(site)) = (period, site) else {
            debug!(
                "event=propagation module=propagation status=skip reason=incomplete_scope id={source_id}"
            );
            return Ok(PropagationOutcome::Skipped(SkipReason::IncompleteScope));
        };
        let is_current = source.boolean(&cfg.current_field).unwrap_or(false);

        let filter = Filter::new()
            .eq(cfg.role_field.clone(), cfg.role_tag.as_str())
            .eq(cfg.period_field.clone(), period.to_value())
            .eq(cfg.site_field.clone(), site.to_value())
            .eq(cfg.current_field.clone(), is_current)
            .ne("id", source_id.to_value());
        let siblings = self.store.update_many(&cfg.collection, &filter, &changed)?;

        let fields: Vec<String> = changed.keys().cloned().collect();
        info!(
            "event=propagation module=propagation status=ok id={source_id} fields={} siblings={siblings}",
            fields.join(",")
        );
        Ok(PropagationOutcome::Propagated {
            source_id,
            fields,
            siblings,
        })
    }
}
