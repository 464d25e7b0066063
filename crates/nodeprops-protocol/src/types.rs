use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identity::NodeId;
use crate::ProtocolError;

/// A single key/value property announced by a node.
///
/// A property without a value is a tombstone: it tells the receiver that
/// `key` no longer holds a value for `node_id`. Tombstones are applied to
/// state, never stored as live entries.
///
/// Two properties are equal iff node, key and value are all equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeProperty {
    node_id: NodeId,
    key: String,
    #[serde(default)]
    value: Option<String>,
}

impl NodeProperty {
    /// A live property carrying `value`.
    pub fn new(node_id: NodeId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            node_id,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// A tombstone for `key` on `node_id`.
    pub fn tombstone(node_id: NodeId, key: impl Into<String>) -> Self {
        Self {
            node_id,
            key: key.into(),
            value: None,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

impl std::fmt::Display for NodeProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}={}", self.node_id, self.key, value),
            None => write!(f, "{}:{}=<removed>", self.node_id, self.key),
        }
    }
}

/// Set of properties as reported to observers.
pub type PropertySet = HashSet<NodeProperty>;

/// Immutable flat key -> value snapshot of one node's live properties.
pub type ValueMap = Arc<HashMap<String, String>>;

/// Per-node value map changes. `None` means the node became unreachable and
/// observers should drop their cached snapshot for it.
pub type ValueMapDelta = HashMap<NodeId, Option<ValueMap>>;

/// Added/updated/removed sets of one property-change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyChange {
    pub added: PropertySet,
    pub updated: PropertySet,
    pub removed: PropertySet,
}

impl PropertyChange {
    /// The change delivered to a fresh subscriber: everything it can
    /// currently see, reported as added.
    pub fn initial(snapshot: PropertySet) -> Self {
        Self {
            added: snapshot,
            updated: PropertySet::new(),
            removed: PropertySet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// A reachability update from the topology feed.
///
/// `new_reachable` is the complete post-image; `added` and `removed` are
/// the deltas against the previous reachable set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyChange {
    pub new_reachable: HashSet<NodeId>,
    pub added: HashSet<NodeId>,
    pub removed: HashSet<NodeId>,
}

impl TopologyChange {
    pub fn new(
        new_reachable: HashSet<NodeId>,
        added: HashSet<NodeId>,
        removed: HashSet<NodeId>,
    ) -> Self {
        Self {
            new_reachable,
            added,
            removed,
        }
    }

    /// Derive the change that takes `previous` to `next`.
    pub fn between(previous: &HashSet<NodeId>, next: HashSet<NodeId>) -> Self {
        let added = next.difference(previous).cloned().collect();
        let removed = previous.difference(&next).cloned().collect();
        Self {
            new_reachable: next,
            added,
            removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Check that this change is a consistent transition from `previous`.
    ///
    /// Requires `added` and `removed` to be disjoint, `added` to be new,
    /// `removed` to have been reachable, and
    /// `new_reachable == (previous - removed) + added`.
    pub fn validate_against(&self, previous: &HashSet<NodeId>) -> Result<(), ProtocolError> {
        if let Some(node) = self.added.intersection(&self.removed).next() {
            return Err(ProtocolError::MalformedTopologyDelta(format!(
                "node {node} is both added and removed"
            )));
        }
        if let Some(node) = self.added.intersection(previous).next() {
            return Err(ProtocolError::MalformedTopologyDelta(format!(
                "node {node} is added but was already reachable"
            )));
        }
        if let Some(node) = self.removed.difference(previous).next() {
            return Err(ProtocolError::MalformedTopologyDelta(format!(
                "node {node} is removed but was not reachable"
            )));
        }
        let expected: HashSet<&NodeId> = previous
            .difference(&self.removed)
            .chain(self.added.iter())
            .collect();
        let actual: HashSet<&NodeId> = self.new_reachable.iter().collect();
        if expected != actual {
            return Err(ProtocolError::MalformedTopologyDelta(format!(
                "new reachable set has {} nodes, deltas imply {}",
                actual.len(),
                expected.len()
            )));
        }
        Ok(())
    }
}
