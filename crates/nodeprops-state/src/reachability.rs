//! Current set of reachable nodes, as reported by the topology feed.

use std::collections::HashSet;

use nodeprops_protocol::{NodeId, TopologyChange};

use crate::StateError;

#[derive(Debug, Default)]
pub struct ReachabilityTracker {
    reachable: HashSet<NodeId>,
}

impl ReachabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reachable(&self, node_id: &NodeId) -> bool {
        self.reachable.contains(node_id)
    }

    pub fn nodes(&self) -> &HashSet<NodeId> {
        &self.reachable
    }

    pub fn len(&self) -> usize {
        self.reachable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reachable.is_empty()
    }

    /// Reject `change` unless it is a consistent transition from the
    /// current set.
    pub fn validate(&self, change: &TopologyChange) -> Result<(), StateError> {
        change.validate_against(&self.reachable)?;
        Ok(())
    }

    /// Swap in a new reachable set, returning the previous one.
    pub fn replace(&mut self, reachable: HashSet<NodeId>) -> HashSet<NodeId> {
        std::mem::replace(&mut self.reachable, reachable)
    }
}
