//! Listener contracts at the service boundary.
//!
//! Inbound: the transport pushes raw property batches through
//! [`RawNodePropertiesChangeListener`] and reachability updates through
//! [`NetworkTopologyChangeListener`]. Outbound: observers implement
//! [`NodePropertiesChangeListener`] and receive immutable snapshots only.

use thiserror::Error;

use crate::types::{NodeProperty, PropertySet, TopologyChange, ValueMapDelta};

/// Failure reported by an observer while handling a notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("listener failed: {0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Receives batches of raw property announcements from the transport.
pub trait RawNodePropertiesChangeListener: Send + Sync {
    /// `batch` may span many nodes and mix additions, updates and
    /// tombstones. Events for the same key of the same node arrive in
    /// causal order. Every batch is accepted; there is nothing to reject
    /// once events have been decoded.
    fn on_raw_node_properties_added_or_modified(&self, batch: &[NodeProperty]);
}

/// Receives reachability updates from the topology tracker.
pub trait NetworkTopologyChangeListener: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn on_reachable_nodes_changed(&self, change: &TopologyChange) -> Result<(), Self::Error>;
}

/// Observer of the aggregated, reachability-filtered property state.
///
/// Calls for one registration never overlap and arrive in enqueue order.
/// Returning an error (or panicking) cancels the registration.
pub trait NodePropertiesChangeListener: Send + Sync {
    fn on_reachable_node_properties_changed(
        &self,
        added: &PropertySet,
        updated: &PropertySet,
        removed: &PropertySet,
    ) -> Result<(), ListenerError>;

    fn on_node_property_maps_changed(&self, delta: &ValueMapDelta) -> Result<(), ListenerError>;
}
