//! Lifecycle hook registry and default engine wiring.
//!
//! # Responsibility
//! - Route lifecycle events to the services registered for their
//!   (collection, hook kind).
//! - Log handler failures without rolling back the triggering write.
//!
//! # Invariants
//! - A handler failure never stops later handlers for the same event.
//! - Dispatch refuses to recurse past a fixed depth; a runaway hook
//!   cascade degrades to a logged no-op instead of unbounded recursion.

use crate::model::event::{HookKind, LifecycleEvent};
use crate::relation;
use crate::service::course_link::{CourseLinkConfig, CourseLinkService};
use crate::service::propagation::{PropagationConfig, PropagationService};
use crate::service::rollup::{RollupConfig, RollupService};
use crate::service::SyncError;
use crate::store::EntityStore;
use log::{error, warn};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::Arc;

const MAX_DISPATCH_DEPTH: usize = 8;

/// One registered hook target.
pub trait LifecycleHandler {
    /// Handles one event. Before-hooks may rewrite `event.data` in place.
    fn on_event(&self, event: &mut LifecycleEvent) -> Result<(), SyncError>;
}

/// Summary of one dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Handlers that ran to completion.
    pub invoked: usize,
    /// Handlers that returned an error (logged, not propagated).
    pub failed: usize,
    /// Whether the depth guard suppressed this dispatch entirely.
    pub suppressed: bool,
}

/// Registry mapping (collection, hook kind) to handlers.
///
/// Request-scoped: dispatch depth is tracked per registry instance, so one
/// registry serves one event-handling invocation at a time.
#[derive(Default)]
pub struct HookRegistry {
    handlers: BTreeMap<(String, HookKind), Vec<Arc<dyn LifecycleHandler>>>,
    depth: Cell<usize>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one handler. Multiple handlers per key run in
    /// registration order.
    pub fn register(
        &mut self,
        collection: impl Into<String>,
        kind: HookKind,
        handler: Arc<dyn LifecycleHandler>,
    ) {
        self.handlers
            .entry((collection.into(), kind))
            .or_default()
            .push(handler);
    }

    /// Total number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Invokes every handler registered for the event's collection and
    /// kind. Handler errors are logged and counted; the triggering write
    /// is never rolled back from here.
    pub fn dispatch(&self, event: &mut LifecycleEvent) -> DispatchOutcome {
        if self.depth.get() >= MAX_DISPATCH_DEPTH {
            warn!(
                "event=hook_dispatch module=hooks status=suppressed collection={} kind={} depth={}",
                event.collection,
                event.kind.as_str(),
                self.depth.get()
            );
            return DispatchOutcome {
                suppressed: true,
                ..DispatchOutcome::default()
            };
        }

        let _guard = DepthGuard::enter(&self.depth);
        let mut outcome = DispatchOutcome::default();
        let key = (event.collection.clone(), event.kind);
        let Some(handlers) = self.handlers.get(&key) else {
            return outcome;
        };

        for handler in handlers {
            match handler.on_event(event) {
                Ok(()) => outcome.invoked += 1,
                Err(err) => {
                    outcome.failed += 1;
                    error!(
                        "event=hook_failed module=hooks collection={} kind={} error={err}",
                        event.collection,
                        event.kind.as_str()
                    );
                }
            }
        }
        outcome
    }
}

struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// Collection wiring for the default engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub rollup: RollupConfig,
    pub propagation: PropagationConfig,
    pub course_link: CourseLinkConfig,
}

/// Builds a registry with the three synchronization rules wired to their
/// hook points.
pub fn engine<S>(store: Arc<S>, config: EngineConfig) -> HookRegistry
where
    S: EntityStore + 'static,
{
    let rollup = Arc::new(RollupService::new(
        Arc::clone(&store),
        config.rollup.clone(),
    ));
    let propagation = Arc::new(PropagationService::new(
        Arc::clone(&store),
        config.propagation.clone(),
    ));
    let course_link = Arc::new(CourseLinkService::new(
        Arc::clone(&store),
        config.course_link.clone(),
    ));

    let mut registry = HookRegistry::new();

    let list_hook = Arc::new(ListRollupHook {
        service: Arc::clone(&rollup),
    });
    for kind in [
        HookKind::AfterCreate,
        HookKind::AfterUpdate,
        HookKind::AfterDelete,
    ] {
        registry.register(config.rollup.list_collection.clone(), kind, list_hook.clone());
    }

    let version_hook = Arc::new(VersionRollupHook { service: rollup });
    for kind in [
        HookKind::AfterCreate,
        HookKind::AfterUpdate,
        HookKind::AfterDelete,
        HookKind::AfterCreateMany,
        HookKind::AfterUpdateMany,
        HookKind::AfterDeleteMany,
    ] {
        registry.register(
            config.rollup.version_collection.clone(),
            kind,
            version_hook.clone(),
        );
    }

    registry.register(
        config.propagation.collection.clone(),
        HookKind::AfterUpdate,
        Arc::new(PropagationHook {
            service: propagation,
        }),
    );

    let link_hook = Arc::new(CourseLinkHook {
        service: course_link,
    });
    for kind in [HookKind::BeforeCreate, HookKind::BeforeUpdate] {
        registry.register(config.course_link.collection.clone(), kind, link_hook.clone());
    }

    registry
}

struct ListRollupHook<S: EntityStore> {
    service: Arc<RollupService<Arc<S>>>,
}

impl<S: EntityStore> LifecycleHandler for ListRollupHook<S> {
    fn on_event(&self, event: &mut LifecycleEvent) -> Result<(), SyncError> {
        self.service.on_list_event(event).map(drop)
    }
}

struct VersionRollupHook<S: EntityStore> {
    service: Arc<RollupService<Arc<S>>>,
}

impl<S: EntityStore> LifecycleHandler for VersionRollupHook<S> {
    fn on_event(&self, event: &mut LifecycleEvent) -> Result<(), SyncError> {
        self.service.on_version_event(event).map(drop)
    }
}

struct PropagationHook<S: EntityStore> {
    service: Arc<PropagationService<Arc<S>>>,
}

impl<S: EntityStore> LifecycleHandler for PropagationHook<S> {
    fn on_event(&self, event: &mut LifecycleEvent) -> Result<(), SyncError> {
        self.service.propagate(event).map(drop)
    }
}

struct CourseLinkHook<S: EntityStore> {
    service: Arc<CourseLinkService<Arc<S>>>,
}

impl<S: EntityStore> LifecycleHandler for CourseLinkHook<S> {
    fn on_event(&self, event: &mut LifecycleEvent) -> Result<(), SyncError> {
        let is_update = event.kind == HookKind::BeforeUpdate;
        let target = event
            .filter
            .as_ref()
            .and_then(crate::model::value::FieldValue::as_object)
            .and_then(|map| map.get("id"))
            .and_then(relation::normalize);
        let Some(data) = event.data_map_mut() else {
            return Ok(());
        };
        if is_update {
            self.service.prepare_update(data, target.as_ref()).map(drop)
        } else {
            self.service.prepare_create(data).map(drop)
        }
    }
}
