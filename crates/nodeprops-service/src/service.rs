//! The `NodePropertiesStateService` facade.
//!
//! Listens for low-level raw property batches and topology changes and
//! converts them into higher-level `NodePropertiesChangeListener` events.
//!
//! All state lives behind one lock. Each update computes its delta and
//! enqueues the resulting notifications while holding it, so every
//! observer sees updates in one linear order and a new subscriber's
//! initial snapshot lines up exactly with the deltas that follow it.
//! Observer code itself always runs on the worker pool.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use nodeprops_notify::{
    async_callback, CallbackExceptionPolicy, OrderedCallbackManager, Registration, TaskExecutor,
};
use nodeprops_protocol::{
    NetworkTopologyChangeListener, NodeId, NodePropertiesChangeListener, NodeProperty,
    PropertySet, RawNodePropertiesChangeListener, TopologyChange, ValueMap,
};
use nodeprops_state::{PropertyState, StateDelta};

use crate::ServiceError;

type Listener = dyn NodePropertiesChangeListener;

/// Ingestion and notification counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub raw_batches: u64,
    pub topology_changes: u64,
    pub rejected_topology_changes: u64,
    pub property_notifications: u64,
    pub value_map_notifications: u64,
}

struct Inner {
    state: PropertyState,
    stats: ServiceStats,
}

pub struct NodePropertiesStateService {
    inner: Mutex<Inner>,
    callbacks: OrderedCallbackManager<Listener>,
}

impl NodePropertiesStateService {
    /// Create a service delivering notifications on `executor`; failing
    /// observers are logged and cancelled.
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self::with_policy(executor, CallbackExceptionPolicy::LogAndCancelListener)
    }

    pub fn with_policy(executor: Arc<dyn TaskExecutor>, policy: CallbackExceptionPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: PropertyState::new(),
                stats: ServiceStats::default(),
            }),
            callbacks: OrderedCallbackManager::new(executor, policy),
        }
    }

    /// Register an observer.
    ///
    /// Its first notifications report every currently reachable property as
    /// added, followed by the value maps of all reachable nodes. Both are
    /// delivered asynchronously, ahead of any later update.
    pub fn add_node_properties_change_listener(&self, listener: Arc<Listener>) -> Registration {
        let inner = self.inner.lock();
        let (change, value_maps) = inner.state.subscription_snapshot();
        let change = Arc::new(change);
        let value_maps = Arc::new(value_maps);
        let registration = self.callbacks.add_listener_and_enqueue_callback(
            listener,
            async_callback::<Listener, _>(move |l| {
                l.on_reachable_node_properties_changed(
                    &change.added,
                    &change.updated,
                    &change.removed,
                )?;
                l.on_node_property_maps_changed(&value_maps)
            }),
        );
        drop(inner);
        registration
    }

    /// Unregister an observer. Returns `false` if it was not registered
    /// (for example because it already failed and was cancelled).
    pub fn remove_node_properties_change_listener(&self, registration: Registration) -> bool {
        self.callbacks.remove_listener(registration)
    }

    /// Ingest a batch of raw property events.
    pub fn update_on_raw_properties_added_or_modified(&self, batch: &[NodeProperty]) {
        let mut guard = self.inner.lock();
        let Inner { state, stats } = &mut *guard;
        stats.raw_batches += 1;
        let delta = state.apply_raw_batch(batch);
        self.publish(stats, delta);
    }

    /// Ingest a reachability change. Inconsistent changes are rejected
    /// before any state is touched.
    pub fn update_on_reachable_nodes_changed(
        &self,
        change: &TopologyChange,
    ) -> Result<(), ServiceError> {
        let mut guard = self.inner.lock();
        let Inner { state, stats } = &mut *guard;
        match state.apply_topology_change(change) {
            Ok(delta) => {
                stats.topology_changes += 1;
                self.publish(stats, delta);
                Ok(())
            }
            Err(e) => {
                stats.rejected_topology_changes += 1;
                tracing::warn!(error = %e, "Rejected topology change");
                Err(e.into())
            }
        }
    }

    fn publish(&self, stats: &mut ServiceStats, delta: StateDelta) {
        if let Some(change) = delta.property_change {
            stats.property_notifications += 1;
            let change = Arc::new(change);
            self.callbacks
                .enqueue_callback(async_callback::<Listener, _>(move |l| {
                    l.on_reachable_node_properties_changed(
                        &change.added,
                        &change.updated,
                        &change.removed,
                    )
                }));
        }

        if !delta.value_maps.is_empty() {
            stats.value_map_notifications += 1;
            let value_maps = Arc::new(delta.value_maps);
            self.callbacks
                .enqueue_callback(async_callback::<Listener, _>(move |l| {
                    l.on_node_property_maps_changed(&value_maps)
                }));
        }
    }

    // -- Queries --

    pub fn reachable_properties(&self) -> PropertySet {
        self.inner.lock().state.reachable_properties().clone()
    }

    pub fn reachable_nodes(&self) -> HashSet<NodeId> {
        self.inner.lock().state.reachable_nodes().clone()
    }

    pub fn value_map_of_reachable_node(&self, node_id: &NodeId) -> Option<ValueMap> {
        self.inner.lock().state.reachable_value_map(node_id)
    }

    pub fn value_maps_of_reachable_nodes(&self) -> HashMap<NodeId, ValueMap> {
        self.inner.lock().state.reachable_value_maps()
    }

    pub fn listener_count(&self) -> usize {
        self.callbacks.listener_count()
    }

    pub fn stats(&self) -> ServiceStats {
        self.inner.lock().stats
    }

    /// Cross-check the derived views against the property store.
    pub fn verify_consistency(&self) -> Result<(), ServiceError> {
        self.inner.lock().state.check_invariants()?;
        Ok(())
    }
}

impl RawNodePropertiesChangeListener for NodePropertiesStateService {
    fn on_raw_node_properties_added_or_modified(&self, batch: &[NodeProperty]) {
        self.update_on_raw_properties_added_or_modified(batch);
    }
}

impl NetworkTopologyChangeListener for NodePropertiesStateService {
    type Error = ServiceError;

    fn on_reachable_nodes_changed(&self, change: &TopologyChange) -> Result<(), ServiceError> {
        self.update_on_reachable_nodes_changed(change)
    }
}

impl std::fmt::Debug for NodePropertiesStateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePropertiesStateService")
            .field("stats", &self.stats())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
