//! Diff engine over the property store, reachability and value map views.
//!
//! `PropertyState` owns all mutable state. Each update method applies one
//! raw property batch or one topology change, keeps every derived view in
//! lockstep, and returns the observer-facing [`StateDelta`]. Callers are
//! expected to serialize access (the service holds one lock around it).
//!
//! Raw batch rules:
//! - Events for unreachable nodes change the store silently.
//! - For reachable nodes, a live event is `added` when the key had no
//!   entry and `updated` otherwise; a tombstone that deletes an entry is
//!   `removed` (reported with the deleted value).
//! - Classification runs per event against the store as it is at that
//!   point, so "remove then re-add" within one batch reports both.
//!
//! Topology rules:
//! - Properties of removed nodes are reported `removed`, of added nodes
//!   `added`; `updated` is always empty on this path, even if values
//!   changed while the node was unreachable.

use std::collections::{HashMap, HashSet};

use nodeprops_protocol::{
    NodeId, NodeProperty, PropertyChange, PropertySet, TopologyChange, ValueMap, ValueMapDelta,
};

use crate::property_store::{PropertyStore, StoreOutcome};
use crate::reachability::ReachabilityTracker;
use crate::value_views::ValueMapViews;
use crate::StateError;

/// Notifications produced by one update.
///
/// `property_change` is `None` when nothing observer-visible was added,
/// updated or removed; `value_maps` is empty when no reachable node's value
/// map changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub property_change: Option<PropertyChange>,
    pub value_maps: ValueMapDelta,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.property_change.is_none() && self.value_maps.is_empty()
    }
}

/// All node property state, plus the diff logic that mutates it.
#[derive(Debug, Default)]
pub struct PropertyState {
    store: PropertyStore,
    reachability: ReachabilityTracker,
    views: ValueMapViews,
    /// Live properties of reachable nodes.
    reachable_properties: PropertySet,
}

impl PropertyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of raw property events.
    pub fn apply_raw_batch(&mut self, batch: &[NodeProperty]) -> StateDelta {
        let mut change = PropertyChange::default();
        let mut touched: HashSet<NodeId> = HashSet::new();

        for property in batch {
            let node_id = property.node_id();
            let reachable = self.reachability.is_reachable(node_id);

            let outcome = self.store.upsert_or_tombstone(property);
            if outcome != StoreOutcome::Unchanged {
                touched.insert(node_id.clone());
            }
            if !reachable {
                continue;
            }

            match outcome {
                StoreOutcome::Added => {
                    self.reachable_properties.insert(property.clone());
                    change.added.insert(property.clone());
                }
                StoreOutcome::Updated { previous } => {
                    self.reachable_properties.remove(&previous);
                    self.reachable_properties.insert(property.clone());
                    change.updated.insert(property.clone());
                }
                StoreOutcome::Removed { previous } => {
                    self.reachable_properties.remove(&previous);
                    change.removed.insert(previous);
                }
                StoreOutcome::Unchanged => {}
            }
        }

        let mut value_maps = ValueMapDelta::new();
        for node_id in &touched {
            let snapshot = self.store.snapshot_value_map(node_id);
            let reachable = self.reachability.is_reachable(node_id);
            if reachable {
                value_maps.insert(node_id.clone(), Some(snapshot.clone()));
            }
            self.views.record_snapshot(node_id, snapshot, reachable);
        }

        let property_change = if change.is_empty() {
            None
        } else {
            tracing::debug!(
                added = change.added.len(),
                updated = change.updated.len(),
                removed = change.removed.len(),
                "Reporting node property state change"
            );
            Some(change)
        };

        StateDelta {
            property_change,
            value_maps,
        }
    }

    /// Apply a reachability change.
    ///
    /// The change is validated against the current reachable set first; a
    /// malformed change is rejected without touching any state.
    pub fn apply_topology_change(
        &mut self,
        change: &TopologyChange,
    ) -> Result<StateDelta, StateError> {
        self.reachability.validate(change)?;

        let mut value_maps = ValueMapDelta::new();

        let mut disconnected = PropertySet::new();
        for node_id in &change.removed {
            disconnected.extend(self.store.properties_of(node_id).cloned());
            self.views.detach_reachable(node_id);
            value_maps.insert(node_id.clone(), None);
        }

        let mut reconnected = PropertySet::new();
        for node_id in &change.added {
            reconnected.extend(self.store.properties_of(node_id).cloned());
            let snapshot = self.views.attach_reachable(node_id);
            value_maps.insert(node_id.clone(), Some(snapshot));
        }

        for property in &disconnected {
            self.reachable_properties.remove(property);
        }
        self.reachable_properties.extend(reconnected.iter().cloned());

        self.reachability.replace(change.new_reachable.clone());

        let property_change = if disconnected.is_empty() && reconnected.is_empty() {
            None
        } else {
            tracing::debug!(
                disconnected = disconnected.len(),
                reconnected = reconnected.len(),
                "Reporting node property state change after topology change"
            );
            Some(PropertyChange {
                added: reconnected,
                updated: PropertySet::new(),
                removed: disconnected,
            })
        };

        Ok(StateDelta {
            property_change,
            value_maps,
        })
    }

    /// What a new subscriber is told: every reachable property as added,
    /// plus the full reachable-scope value maps.
    pub fn subscription_snapshot(&self) -> (PropertyChange, ValueMapDelta) {
        let change = PropertyChange::initial(self.reachable_properties.clone());
        let value_maps = self
            .views
            .reachable()
            .iter()
            .map(|(id, map)| (id.clone(), Some(map.clone())))
            .collect();
        (change, value_maps)
    }

    pub fn reachable_properties(&self) -> &PropertySet {
        &self.reachable_properties
    }

    pub fn reachable_nodes(&self) -> &HashSet<NodeId> {
        self.reachability.nodes()
    }

    pub fn reachable_value_map(&self, node_id: &NodeId) -> Option<ValueMap> {
        self.views.reachable_value_map(node_id).cloned()
    }

    pub fn reachable_value_maps(&self) -> HashMap<NodeId, ValueMap> {
        self.views.reachable().clone()
    }

    /// Value map of any known node, reachable or not.
    pub fn value_map(&self, node_id: &NodeId) -> Option<ValueMap> {
        self.views.value_map(node_id).cloned()
    }

    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    /// Cross-check all derived views against the property store.
    pub fn check_invariants(&self) -> Result<(), StateError> {
        let expected: PropertySet = self
            .reachability
            .nodes()
            .iter()
            .flat_map(|id| self.store.properties_of(id).cloned())
            .collect();
        if expected != self.reachable_properties {
            return Err(StateError::InvariantViolation(format!(
                "reachable property set has {} entries, store implies {}",
                self.reachable_properties.len(),
                expected.len()
            )));
        }

        for (node_id, map) in self.views.reachable() {
            if !self.reachability.is_reachable(node_id) {
                return Err(StateError::InvariantViolation(format!(
                    "unreachable node {node_id} has a reachable value map"
                )));
            }
            if **map != *self.store.snapshot_value_map(node_id) {
                return Err(StateError::InvariantViolation(format!(
                    "reachable value map of {node_id} is stale"
                )));
            }
        }

        for node_id in self.reachability.nodes() {
            let live = self.store.properties_of(node_id).next().is_some();
            if live && self.views.reachable_value_map(node_id).is_none() {
                return Err(StateError::InvariantViolation(format!(
                    "reachable node {node_id} has no value map"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::from(id)
    }

    fn reach(state: &mut PropertyState, id: &str) -> StateDelta {
        let change = TopologyChange::between(
            state.reachable_nodes(),
            state
                .reachable_nodes()
                .iter()
                .cloned()
                .chain(std::iter::once(node(id)))
                .collect(),
        );
        state.apply_topology_change(&change).unwrap()
    }

    #[test]
    fn test_update_replaces_reachable_property() {
        let mut state = PropertyState::new();
        reach(&mut state, "n1");
        state.apply_raw_batch(&[NodeProperty::new(node("n1"), "os", "linux")]);
        state.apply_raw_batch(&[NodeProperty::new(node("n1"), "os", "linux-v2")]);
        assert_eq!(state.reachable_properties().len(), 1);
        assert!(state
            .reachable_properties()
            .contains(&NodeProperty::new(node("n1"), "os", "linux-v2")));
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_noop_tombstone_touches_nothing() {
        let mut state = PropertyState::new();
        reach(&mut state, "n1");
        let delta = state.apply_raw_batch(&[NodeProperty::tombstone(node("n1"), "os")]);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_rejected_topology_leaves_state_intact() {
        let mut state = PropertyState::new();
        reach(&mut state, "n1");
        state.apply_raw_batch(&[NodeProperty::new(node("n1"), "os", "linux")]);

        let bogus = TopologyChange::new(
            HashSet::new(),
            HashSet::new(),
            [node("ghost")].into_iter().collect(),
        );
        assert!(state.apply_topology_change(&bogus).is_err());
        assert!(state.reachable_nodes().contains(&node("n1")));
        assert_eq!(state.reachable_properties().len(), 1);
        state.check_invariants().unwrap();
    }
}
