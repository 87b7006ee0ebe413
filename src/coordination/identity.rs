//! Node and relation identities
//!
//! A node identity is the hostname-equivalent string a node publishes
//! under. A relation identity names one relation instance as
//! `<relation-name>:<instance-id>`; a fresh instance of the same relation
//! gets a new instance id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{CoordinationError, CoordinationResult};

/// Opaque node identity, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIdentity(String);

impl NodeIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identity taken from the `HOSTNAME` environment variable, or
    /// `localhost` when it is unset or empty.
    pub fn from_env() -> Self {
        match std::env::var("HOSTNAME") {
            Ok(name) if !name.trim().is_empty() => Self(name.trim().to_string()),
            _ => Self("localhost".to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One relation instance, e.g. `slurm-cluster:3`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelationId {
    name: String,
    instance: u32,
}

impl RelationId {
    pub fn new(name: impl Into<String>, instance: u32) -> Self {
        Self {
            name: name.into(),
            instance,
        }
    }

    /// Relation name shared by every instance of the relation.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.instance)
    }
}

impl FromStr for RelationId {
    type Err = CoordinationError;

    fn from_str(s: &str) -> CoordinationResult<Self> {
        let (name, instance) = s
            .rsplit_once(':')
            .ok_or_else(|| CoordinationError::invalid_identity(format!("missing instance id in '{}'", s)))?;
        if name.is_empty() {
            return Err(CoordinationError::invalid_identity(format!(
                "empty relation name in '{}'",
                s
            )));
        }
        let instance = instance.parse::<u32>().map_err(|_| {
            CoordinationError::invalid_identity(format!("instance id in '{}' is not a number", s))
        })?;
        Ok(Self::new(name, instance))
    }
}

impl TryFrom<String> for RelationId {
    type Error = CoordinationError;

    fn try_from(value: String) -> CoordinationResult<Self> {
        value.parse()
    }
}

impl From<RelationId> for String {
    fn from(id: RelationId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_id_display_and_parse() {
        let id = RelationId::new("slurm-cluster", 3);
        assert_eq!(id.to_string(), "slurm-cluster:3");
        assert_eq!("slurm-cluster:3".parse::<RelationId>().unwrap(), id);
    }

    #[test]
    fn test_relation_id_name_may_contain_colon() {
        let id: RelationId = "a:b:7".parse().unwrap();
        assert_eq!(id.name(), "a:b");
        assert_eq!(id.instance(), 7);
    }

    #[test]
    fn test_relation_id_rejects_malformed() {
        assert!("slurm-cluster".parse::<RelationId>().is_err());
        assert!(":1".parse::<RelationId>().is_err());
        assert!("slurm-cluster:x".parse::<RelationId>().is_err());
    }

    #[test]
    fn test_relation_id_serializes_as_string() {
        let id = RelationId::new("slurm-cluster", 1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"slurm-cluster:1\"");
        let back: RelationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_node_identity_transparent() {
        let node = NodeIdentity::new("nodeA");
        assert_eq!(serde_json::to_string(&node).unwrap(), "\"nodeA\"");
        assert_eq!(node.as_str(), "nodeA");
    }
}
