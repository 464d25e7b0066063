//! Node properties state service
//!
//! Aggregates two low-level feeds, raw per-node property announcements and
//! reachability changes, into one consistent, ordered stream of
//! higher-level notifications for observers:
//! - `NodePropertiesStateService`: the facade wiring state, diff engine and
//!   ordered delivery together
//! - Configuration loading from TOML and environment variables
//! - Logging initialization
//! - Replay of recorded event traces through the service

pub mod config;
pub mod logging;
pub mod service;
pub mod trace;

pub use config::ServiceConfig;
pub use service::{NodePropertiesStateService, ServiceStats};
pub use trace::{Trace, TraceStep};

use thiserror::Error;

/// Errors surfaced to producers and to whoever assembles the service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("State error: {0}")]
    State(#[from] nodeprops_state::StateError),

    #[error("Notification error: {0}")]
    Notify(#[from] nodeprops_notify::NotifyError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
