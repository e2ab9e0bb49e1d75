//! Derived-state synchronization engine.
//!
//! Keeps computed fields on one entity consistent with the state of its
//! related entities, triggered by store lifecycle events, without infinite
//! cascades and without redundant writes. Three rules ship by default: a
//! parent/child current-version status rollup, a sibling-group field
//! propagation, and a composite-key derivation with parent-field
//! inheritance.

pub mod change;
pub mod db;
pub mod hooks;
pub mod logging;
pub mod model;
pub mod relation;
pub mod scope;
pub mod service;
pub mod store;

pub use hooks::{engine, DispatchOutcome, EngineConfig, HookRegistry, LifecycleHandler};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::event::{HookKind, LifecycleEvent};
pub use model::record::{EntityId, Record};
pub use model::value::{FieldMap, FieldValue};
pub use service::course_link::{CourseLinkConfig, CourseLinkService, PrepareOutcome};
pub use service::propagation::{
    PropagationConfig, PropagationOutcome, PropagationService, SkipReason,
};
pub use service::rollup::{ListStatus, RollupConfig, RollupOutcome, RollupService};
pub use service::SyncError;
pub use store::{EntityStore, Filter, MemoryStore, SqliteEntityStore, StoreError};

/// Returns the engine crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
