//! Node configuration
//!
//! Loaded once from a JSON file and immutable afterwards, except through
//! an explicit `config-changed` event, which swaps the whole value.
//!
//! Every field has a default so an empty object (`{}`) describes a
//! compute node on the `slurm-cluster` relation that publishes once its
//! service is installed and starts once the controller's record has been
//! seen.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coordination::{NodeIdentity, ReadinessFlag, RecordKind};
use crate::inventory::Inventory;
use crate::observability::Severity;

/// Role of the node, which fixes the record kind it publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Compute,
    Controller,
}

impl NodeRole {
    /// Kind of record this node publishes.
    pub fn record_kind(&self) -> RecordKind {
        match self {
            Self::Compute => RecordKind::Compute,
            Self::Controller => RecordKind::Controller,
        }
    }
}

/// How the node takes part in one named relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    /// Relation name, shared by all its instances
    pub name: String,

    /// Flags that must hold before this node publishes on the relation
    #[serde(default = "default_publish_requires")]
    pub publish_requires: Vec<ReadinessFlag>,

    /// Flag set once a complete record is observed from a peer
    #[serde(default = "default_acquires")]
    pub acquires: Option<ReadinessFlag>,

    /// Whether the start action waits for this relation to be Published
    #[serde(default = "default_true")]
    pub required_for_start: bool,
}

impl RelationSpec {
    /// Spec with the default gating for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            publish_requires: default_publish_requires(),
            acquires: default_acquires(),
            required_for_start: true,
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Published hostname; falls back to `$HOSTNAME`, then `localhost`
    #[serde(default)]
    pub node_name: Option<String>,

    #[serde(default = "default_role")]
    pub role: NodeRole,

    /// Scheduler partition this node belongs to
    #[serde(default = "default_partition")]
    pub partition: String,

    /// Whether the partition is the default one
    #[serde(default)]
    pub default: bool,

    /// Service port a controller publishes
    #[serde(default = "default_port")]
    pub port: u16,

    /// Capacity payload; derived from the node name when absent
    #[serde(default)]
    pub inventory: Option<Inventory>,

    #[serde(default = "default_relations")]
    pub relations: Vec<RelationSpec>,

    /// Flags the start action waits for, besides required relations
    #[serde(default = "default_start_requires")]
    pub start_requires: Vec<ReadinessFlag>,

    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_role() -> NodeRole {
    NodeRole::Compute
}
fn default_partition() -> String {
    "compute".to_string()
}
fn default_port() -> u16 {
    6817
}
fn default_true() -> bool {
    true
}
fn default_publish_requires() -> Vec<ReadinessFlag> {
    vec![ReadinessFlag::ServiceInstalled]
}
fn default_acquires() -> Option<ReadinessFlag> {
    Some(ReadinessFlag::PeerConfigAcquired)
}
fn default_relations() -> Vec<RelationSpec> {
    vec![RelationSpec::new("slurm-cluster")]
}
fn default_start_requires() -> Vec<ReadinessFlag> {
    vec![ReadinessFlag::ServiceInstalled, ReadinessFlag::PeerConfigAcquired]
}
fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: None,
            role: default_role(),
            partition: default_partition(),
            default: false,
            port: default_port(),
            inventory: None,
            relations: default_relations(),
            start_requires: default_start_requires(),
            log_level: default_log_level(),
        }
    }
}

impl NodeConfig {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: NodeConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default compute configuration with a fixed node name
    pub fn for_node(node_name: impl Into<String>) -> Self {
        Self {
            node_name: Some(node_name.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(name) = &self.node_name {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid("node_name must not be empty when set"));
            }
        }

        if self.partition.trim().is_empty() {
            return Err(ConfigError::invalid("partition must not be empty"));
        }

        if self.port == 0 {
            return Err(ConfigError::invalid("port must be > 0"));
        }

        if self.relations.is_empty() {
            return Err(ConfigError::invalid("at least one relation must be configured"));
        }

        let mut seen = HashSet::new();
        for relation in &self.relations {
            if relation.name.trim().is_empty() {
                return Err(ConfigError::invalid("relation name must not be empty"));
            }
            if !seen.insert(relation.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "relation '{}' configured more than once",
                    relation.name
                )));
            }
        }

        // Only a relation can set the peer flag; nothing else would release start.
        for flag in &self.start_requires {
            if *flag == ReadinessFlag::PeerConfigAcquired
                && !self.relations.iter().any(|r| r.acquires.as_ref() == Some(flag))
            {
                return Err(ConfigError::invalid(format!(
                    "start_requires '{}' but no relation acquires it",
                    flag
                )));
            }
        }

        if let Some(inventory) = &self.inventory {
            if !inventory.is_consistent() {
                return Err(ConfigError::invalid(format!(
                    "inventory for '{}' has CPUs {} inconsistent with its topology",
                    inventory.node_name, inventory.cpus
                )));
            }
        }

        Ok(())
    }

    /// Identity this node publishes under
    pub fn identity(&self) -> NodeIdentity {
        match &self.node_name {
            Some(name) => NodeIdentity::new(name.trim()),
            None => NodeIdentity::from_env(),
        }
    }

    /// Configured inventory, or a minimal one for this node
    pub fn inventory(&self) -> Inventory {
        self.inventory
            .clone()
            .unwrap_or_else(|| Inventory::for_node(self.identity().as_str()))
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// `default` as published: `"True"` or `"False"`
    pub fn default_value(&self) -> &'static str {
        if self.default {
            "True"
        } else {
            "False"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = NodeConfig::from_json_str("{}").unwrap();
        assert_eq!(config.role, NodeRole::Compute);
        assert_eq!(config.partition, "compute");
        assert!(!config.default);
        assert_eq!(config.port, 6817);
        assert_eq!(config.relations, vec![RelationSpec::new("slurm-cluster")]);
        assert_eq!(
            config.start_requires,
            vec![ReadinessFlag::ServiceInstalled, ReadinessFlag::PeerConfigAcquired]
        );
        assert_eq!(config.log_level, Severity::Info);
        assert_eq!(config.default_value(), "False");
    }

    #[test]
    fn test_full_config_parses() {
        let json = r#"{
            "node_name": "ctl-0",
            "role": "controller",
            "partition": "batch",
            "default": true,
            "port": 6820,
            "relations": [
                {"name": "slurm-cluster", "publish_requires": ["serviceInstalled", "munged"], "required_for_start": false}
            ],
            "start_requires": ["serviceInstalled"],
            "log_level": "warn"
        }"#;
        let config = NodeConfig::from_json_str(json).unwrap();
        assert_eq!(config.identity(), NodeIdentity::new("ctl-0"));
        assert_eq!(config.role.record_kind(), RecordKind::Controller);
        assert_eq!(config.default_value(), "True");
        let relation = config.relation("slurm-cluster").unwrap();
        assert_eq!(
            relation.publish_requires,
            vec![ReadinessFlag::ServiceInstalled, ReadinessFlag::Named("munged".into())]
        );
        assert_eq!(relation.acquires, Some(ReadinessFlag::PeerConfigAcquired));
        assert!(!relation.required_for_start);
        assert_eq!(config.log_level, Severity::Warn);
    }

    #[test]
    fn test_rejects_port_zero() {
        let err = NodeConfig::from_json_str(r#"{"port": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_empty_partition() {
        assert!(NodeConfig::from_json_str(r#"{"partition": " "}"#).is_err());
    }

    #[test]
    fn test_rejects_duplicate_relations() {
        let json = r#"{"relations": [{"name": "a"}, {"name": "a"}]}"#;
        let err = NodeConfig::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_no_relations() {
        assert!(NodeConfig::from_json_str(r#"{"relations": []}"#).is_err());
    }

    #[test]
    fn test_rejects_inconsistent_inventory() {
        let json = r#"{"inventory": {"NodeName": "n", "CPUs": 3, "Boards": 1,
            "SocketsPerBoard": 1, "CoresPerSocket": 2, "ThreadsPerCore": 1,
            "RealMemory": 1, "UpTime": 0, "gpus": 0}}"#;
        assert!(NodeConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_relation_without_acquires_gets_peer_flag() {
        let config = NodeConfig::from_json_str(r#"{"relations": [{"name": "slurm-cluster"}]}"#)
            .unwrap();
        assert_eq!(config.relations, vec![RelationSpec::new("slurm-cluster")]);
    }

    #[test]
    fn test_rejects_start_flag_no_relation_acquires() {
        let json = r#"{"relations": [{"name": "slurm-cluster", "acquires": null}]}"#;
        let err = NodeConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("peerConfigAcquired"));

        let json = r#"{"relations": [{"name": "slurm-cluster", "acquires": null}],
            "start_requires": ["serviceInstalled", "munged"]}"#;
        assert!(NodeConfig::from_json_str(json).is_ok());
    }

    #[test]
    fn test_rejects_overflowing_topology() {
        let json = r#"{"inventory": {"NodeName": "n", "CPUs": 1, "Boards": 4294967295,
            "SocketsPerBoard": 4294967295, "CoresPerSocket": 4294967295,
            "ThreadsPerCore": 4294967295, "RealMemory": 1, "UpTime": 0, "gpus": 0}}"#;
        let err = NodeConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_invalid_json() {
        let err = NodeConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"node_name": "nodeA"}}"#).unwrap();
        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.identity().as_str(), "nodeA");
        assert_eq!(config.inventory().node_name, "nodeA");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
