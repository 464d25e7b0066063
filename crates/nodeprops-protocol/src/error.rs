use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid node ID: {0:?}")]
    InvalidNodeId(String),

    #[error("Malformed topology delta: {0}")]
    MalformedTopologyDelta(String),
}
