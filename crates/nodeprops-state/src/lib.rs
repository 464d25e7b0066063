//! Node properties state - stores, derived views and the diff engine
//!
//! Maintains the mutually-derived views of distributed node property state:
//! - Property store: authoritative per-node key -> property map, independent
//!   of reachability
//! - Reachability tracker: the current reachable node set, replaced wholesale
//! - Value map views: immutable key -> value snapshots for all known nodes
//!   and for reachable nodes only
//! - Diff engine: turns raw property batches and topology changes into
//!   observer-facing deltas while keeping every view in lockstep

pub mod auto_map;
pub mod diff;
pub mod property_store;
pub mod reachability;
pub mod value_views;

pub use auto_map::AutoCreationMap;
pub use diff::{PropertyState, StateDelta};
pub use property_store::{PropertyStore, StoreOutcome};
pub use reachability::ReachabilityTracker;
pub use value_views::ValueMapViews;

use nodeprops_protocol::ProtocolError;
use thiserror::Error;

/// Errors originating from the state layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Rejected update: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("State invariant violated: {0}")]
    InvariantViolation(String),
}
