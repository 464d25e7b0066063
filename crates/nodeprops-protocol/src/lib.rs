//! Node properties - core types and listener contracts
//!
//! Shared vocabulary between the transport that announces raw node
//! properties, the topology tracker, the state aggregation service and
//! its observers:
//! - `NodeId` and `NodeProperty` (tombstones are properties with no value)
//! - Immutable value-map snapshots and per-node deltas
//! - Topology change triples and their consistency check
//! - Statically-typed feed and observer traits

pub mod constants;
pub mod error;
pub mod identity;
pub mod listener;
pub mod types;

pub use constants::*;
pub use error::*;
pub use identity::*;
pub use listener::*;
pub use types::*;
