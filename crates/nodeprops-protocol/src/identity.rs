use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

/// Identifier of one overlay node.
///
/// Opaque to this layer: equality, hashing and ordering are plain value
/// semantics over the underlying string. Deserialization goes through
/// [`NodeId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a node ID, rejecting empty or whitespace-only input.
    pub fn parse(id: &str) -> Result<Self, ProtocolError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidNodeId(id.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let id = NodeId::parse("  node-1 ").unwrap();
        assert_eq!(id.as_str(), "node-1");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(
            NodeId::parse("   "),
            Err(ProtocolError::InvalidNodeId(_))
        ));
    }
}
