//! Authoritative per-node property storage.
//!
//! Holds every live property ever announced, keyed by node and then by
//! property key, regardless of whether the node is currently reachable.
//! Tombstones remove entries and are never stored themselves.

use std::collections::HashMap;
use std::sync::Arc;

use nodeprops_protocol::{NodeId, NodeProperty, ValueMap};

use crate::auto_map::AutoCreationMap;

/// Effect of applying one property event to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// A live property was stored for a key that had no entry.
    Added,
    /// A live property replaced an existing entry.
    Updated { previous: NodeProperty },
    /// A tombstone deleted an existing entry.
    Removed { previous: NodeProperty },
    /// A tombstone for a key with no entry.
    Unchanged,
}

/// Node -> (key -> live property).
#[derive(Debug, Default)]
pub struct PropertyStore {
    by_node: AutoCreationMap<NodeId, HashMap<String, NodeProperty>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self {
            by_node: AutoCreationMap::new(),
        }
    }

    /// Insert or replace a live property, or apply a tombstone.
    ///
    /// The node's inner map is created on first sight and kept even when it
    /// becomes empty.
    pub fn upsert_or_tombstone(&mut self, property: &NodeProperty) -> StoreOutcome {
        let entries = self.by_node.get_or_create(property.node_id());
        if property.is_tombstone() {
            match entries.remove(property.key()) {
                Some(previous) => StoreOutcome::Removed { previous },
                None => StoreOutcome::Unchanged,
            }
        } else {
            match entries.insert(property.key().to_string(), property.clone()) {
                Some(previous) => StoreOutcome::Updated { previous },
                None => StoreOutcome::Added,
            }
        }
    }

    /// Live properties of `node_id`; empty for unknown nodes.
    pub fn properties_of<'a>(&'a self, node_id: &NodeId) -> impl Iterator<Item = &'a NodeProperty> {
        self.by_node
            .get(node_id)
            .into_iter()
            .flat_map(|entries| entries.values())
    }

    pub fn get(&self, node_id: &NodeId, key: &str) -> Option<&NodeProperty> {
        self.by_node.get(node_id).and_then(|entries| entries.get(key))
    }

    /// Build an immutable key -> value snapshot of the node's live entries.
    pub fn snapshot_value_map(&self, node_id: &NodeId) -> ValueMap {
        let values: HashMap<String, String> = self
            .properties_of(node_id)
            .filter_map(|p| p.value().map(|v| (p.key().to_string(), v.to_string())))
            .collect();
        Arc::new(values)
    }

    /// All nodes the store has ever seen an event for.
    pub fn known_nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.by_node.keys()
    }

    pub fn is_known(&self, node_id: &NodeId) -> bool {
        self.by_node.contains_key(node_id)
    }

    /// Total number of live properties across all nodes.
    pub fn property_count(&self) -> usize {
        self.by_node.iter().map(|(_, entries)| entries.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::from(id)
    }

    #[test]
    fn test_add_then_update() {
        let mut store = PropertyStore::new();
        let v1 = NodeProperty::new(node("n1"), "os", "linux");
        let v2 = NodeProperty::new(node("n1"), "os", "linux-v2");
        assert_eq!(store.upsert_or_tombstone(&v1), StoreOutcome::Added);
        assert_eq!(
            store.upsert_or_tombstone(&v2),
            StoreOutcome::Updated { previous: v1 }
        );
        assert_eq!(store.get(&node("n1"), "os"), Some(&v2));
    }

    #[test]
    fn test_tombstone_removes_entry() {
        let mut store = PropertyStore::new();
        let live = NodeProperty::new(node("n1"), "os", "linux");
        store.upsert_or_tombstone(&live);
        let outcome = store.upsert_or_tombstone(&NodeProperty::tombstone(node("n1"), "os"));
        assert_eq!(outcome, StoreOutcome::Removed { previous: live });
        assert_eq!(store.property_count(), 0);
        assert!(store.is_known(&node("n1")), "Node entry survives removal");
    }

    #[test]
    fn test_tombstone_for_missing_key() {
        let mut store = PropertyStore::new();
        let outcome = store.upsert_or_tombstone(&NodeProperty::tombstone(node("n1"), "os"));
        assert_eq!(outcome, StoreOutcome::Unchanged);
    }

    #[test]
    fn test_snapshot_value_map() {
        let mut store = PropertyStore::new();
        store.upsert_or_tombstone(&NodeProperty::new(node("n1"), "os", "linux"));
        store.upsert_or_tombstone(&NodeProperty::new(node("n1"), "mem", "16G"));
        store.upsert_or_tombstone(&NodeProperty::new(node("n2"), "os", "bsd"));
        let map = store.snapshot_value_map(&node("n1"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("os").map(String::as_str), Some("linux"));
        assert_eq!(map.get("mem").map(String::as_str), Some("16G"));
        assert!(store.snapshot_value_map(&node("unknown")).is_empty());
    }
}
