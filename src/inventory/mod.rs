//! Node inventory payload
//!
//! The capacity description a compute node publishes under the
//! `inventory` key. Coordination treats the rendered JSON as an opaque
//! string; only this module knows its fields. Field names follow the
//! node-definition names the scheduler expects.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(rename = "NodeName")]
    pub node_name: String,

    #[serde(rename = "CPUs")]
    pub cpus: u32,

    #[serde(rename = "Boards")]
    pub boards: u32,

    #[serde(rename = "SocketsPerBoard")]
    pub sockets_per_board: u32,

    #[serde(rename = "CoresPerSocket")]
    pub cores_per_socket: u32,

    #[serde(rename = "ThreadsPerCore")]
    pub threads_per_core: u32,

    /// Megabytes.
    #[serde(rename = "RealMemory")]
    pub real_memory: u64,

    /// Seconds.
    #[serde(rename = "UpTime")]
    pub up_time: u64,

    pub gpus: u32,
}

impl Inventory {
    /// Minimal single-CPU inventory for a node that has not been probed.
    pub fn for_node(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            cpus: 1,
            boards: 1,
            sockets_per_board: 1,
            cores_per_socket: 1,
            threads_per_core: 1,
            real_memory: 0,
            up_time: 0,
            gpus: 0,
        }
    }

    /// `cpus` must equal boards × sockets × cores × threads. A topology
    /// whose product overflows is never consistent.
    pub fn is_consistent(&self) -> bool {
        let topology = [
            self.sockets_per_board,
            self.cores_per_socket,
            self.threads_per_core,
        ]
        .iter()
        .try_fold(self.boards as u64, |acc, n| acc.checked_mul(*n as u64));
        !self.node_name.is_empty() && topology == Some(self.cpus as u64)
    }

    /// Compact JSON with fields in declaration order, so the same
    /// inventory always renders to the same bytes.
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_uses_scheduler_field_names() {
        let inventory = Inventory {
            node_name: "nodeA".into(),
            cpus: 8,
            boards: 1,
            sockets_per_board: 2,
            cores_per_socket: 2,
            threads_per_core: 2,
            real_memory: 15_000,
            up_time: 120,
            gpus: 1,
        };
        let rendered = inventory.render();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["NodeName"], "nodeA");
        assert_eq!(parsed["CPUs"], 8);
        assert_eq!(parsed["SocketsPerBoard"], 2);
        assert_eq!(parsed["RealMemory"], 15_000);
        assert_eq!(parsed["UpTime"], 120);
        assert_eq!(parsed["gpus"], 1);
        assert!(inventory.is_consistent());
    }

    #[test]
    fn test_render_is_stable() {
        let inventory = Inventory::for_node("nodeB");
        assert_eq!(inventory.render(), inventory.clone().render());
        assert!(inventory.render().starts_with("{\"NodeName\":\"nodeB\""));
    }

    #[test]
    fn test_inconsistent_topology() {
        let mut inventory = Inventory::for_node("nodeC");
        inventory.cpus = 4;
        assert!(!inventory.is_consistent());
    }

    #[test]
    fn test_overflowing_topology_is_inconsistent() {
        let mut inventory = Inventory::for_node("nodeD");
        inventory.boards = u32::MAX;
        inventory.sockets_per_board = u32::MAX;
        inventory.cores_per_socket = u32::MAX;
        inventory.threads_per_core = u32::MAX;
        assert!(!inventory.is_consistent());
    }
}
