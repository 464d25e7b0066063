//! Recorded event traces and their replay through the service.
//!
//! A trace is a JSON document listing raw property batches and reachable
//! set snapshots in the order they were observed:
//!
//! ```json
//! { "steps": [
//!     { "type": "topology", "reachable": ["n1"] },
//!     { "type": "properties", "properties": [
//!         { "node_id": "n1", "key": "os", "value": "linux" },
//!         { "node_id": "n1", "key": "tmp" }
//!     ] }
//! ] }
//! ```
//!
//! Topology steps carry only the post-image; replay derives the added and
//! removed deltas from the service's current reachable set.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use nodeprops_protocol::{NodeId, NodeProperty, TopologyChange};

use crate::service::NodePropertiesStateService;
use crate::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceStep {
    /// One raw property batch.
    Properties { properties: Vec<NodeProperty> },
    /// The complete reachable set after a topology change.
    Topology { reachable: HashSet<NodeId> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
}

impl Trace {
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, anyhow::Error> {
        let trace: Trace = serde_json::from_str(content)?;
        Ok(trace)
    }

    /// Feed every step into `service`, stopping at the first rejected one.
    ///
    /// Returns the number of steps applied.
    pub fn replay(&self, service: &NodePropertiesStateService) -> Result<usize, ServiceError> {
        for (index, step) in self.steps.iter().enumerate() {
            match step {
                TraceStep::Properties { properties } => {
                    tracing::debug!(step = index, events = properties.len(), "Replaying property batch");
                    service.update_on_raw_properties_added_or_modified(properties);
                }
                TraceStep::Topology { reachable } => {
                    let change =
                        TopologyChange::between(&service.reachable_nodes(), reachable.clone());
                    tracing::debug!(
                        step = index,
                        added = change.added.len(),
                        removed = change.removed.len(),
                        "Replaying topology change"
                    );
                    service.update_on_reachable_nodes_changed(&change)?;
                }
            }
        }
        Ok(self.steps.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trace() {
        let trace = Trace::from_json(
            r#"{ "steps": [
                { "type": "topology", "reachable": ["n1"] },
                { "type": "properties", "properties": [
                    { "node_id": "n1", "key": "os", "value": "linux" },
                    { "node_id": "n1", "key": "tmp" }
                ] }
            ] }"#,
        )
        .unwrap();
        assert_eq!(trace.steps.len(), 2);
        match &trace.steps[1] {
            TraceStep::Properties { properties } => {
                assert_eq!(properties.len(), 2);
                assert!(properties[1].is_tombstone());
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_blank_node_id_rejected() {
        let props = r#"{ "steps": [ { "type": "properties", "properties": [
            { "node_id": "", "key": "os", "value": "linux" } ] } ] }"#;
        assert!(Trace::from_json(props).is_err());
        let topology = r#"{ "steps": [ { "type": "topology", "reachable": [" "] } ] }"#;
        assert!(Trace::from_json(topology).is_err());
    }

    #[test]
    fn test_unknown_step_type_rejected() {
        assert!(Trace::from_json(r#"{ "steps": [ { "type": "bogus" } ] }"#).is_err());
    }
}
