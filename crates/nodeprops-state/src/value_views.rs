//! Cached immutable value maps, per known node and per reachable node.

use std::collections::HashMap;
use std::sync::Arc;

use nodeprops_protocol::{NodeId, ValueMap};

/// The two value map caches.
///
/// Invariant: every entry of the reachable-scope cache is also the current
/// entry of the all-nodes cache for the same node.
#[derive(Debug, Default)]
pub struct ValueMapViews {
    all_nodes: HashMap<NodeId, ValueMap>,
    reachable_nodes: HashMap<NodeId, ValueMap>,
}

impl ValueMapViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly built snapshot; also expose it in the reachable scope
    /// when the node is reachable.
    pub fn record_snapshot(&mut self, node_id: &NodeId, snapshot: ValueMap, reachable: bool) {
        if reachable {
            self.reachable_nodes
                .insert(node_id.clone(), Arc::clone(&snapshot));
        }
        self.all_nodes.insert(node_id.clone(), snapshot);
    }

    /// Copy the node's all-nodes snapshot into the reachable scope and return
    /// it. Nodes never seen get an empty map.
    pub fn attach_reachable(&mut self, node_id: &NodeId) -> ValueMap {
        let snapshot = self
            .all_nodes
            .entry(node_id.clone())
            .or_insert_with(|| Arc::new(HashMap::new()))
            .clone();
        self.reachable_nodes
            .insert(node_id.clone(), Arc::clone(&snapshot));
        snapshot
    }

    /// Drop the node from the reachable scope only.
    pub fn detach_reachable(&mut self, node_id: &NodeId) -> Option<ValueMap> {
        self.reachable_nodes.remove(node_id)
    }

    pub fn value_map(&self, node_id: &NodeId) -> Option<&ValueMap> {
        self.all_nodes.get(node_id)
    }

    pub fn reachable_value_map(&self, node_id: &NodeId) -> Option<&ValueMap> {
        self.reachable_nodes.get(node_id)
    }

    pub fn reachable(&self) -> &HashMap<NodeId, ValueMap> {
        &self.reachable_nodes
    }

    pub fn all(&self) -> &HashMap<NodeId, ValueMap> {
        &self.all_nodes
    }
}
