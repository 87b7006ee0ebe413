//! Outbound publisher
//!
//! Computes the record this node exposes on a relation. The record is
//! only produced whole: if any required flag is false the result is
//! `NotReady` and nothing is written.

use crate::config::NodeConfig;

use super::identity::NodeIdentity;
use super::readiness::{ReadinessFlag, ReadinessStore};
use super::record::{
    PublishedRecord, RawRecord, RecordKind, KEY_DEFAULT, KEY_HOSTNAME, KEY_INVENTORY,
    KEY_PARTITION, KEY_PORT,
};

/// Result of computing the outbound record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordComputation {
    Ready(PublishedRecord),
    NotReady { missing: Vec<ReadinessFlag> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPublisher {
    identity: NodeIdentity,
    kind: RecordKind,
    partition: String,
    default: &'static str,
    port: String,
    inventory: String,
}

impl OutboundPublisher {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            identity: config.identity(),
            kind: config.role.record_kind(),
            partition: config.partition.clone(),
            default: config.default_value(),
            port: config.port.to_string(),
            inventory: config.inventory().render(),
        }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// The record for this node, or the flags still blocking it.
    pub fn compute_record(
        &self,
        readiness: &ReadinessStore,
        required: &[ReadinessFlag],
    ) -> RecordComputation {
        let missing: Vec<ReadinessFlag> = readiness.missing(required).into_iter().cloned().collect();
        if !missing.is_empty() {
            return RecordComputation::NotReady { missing };
        }

        let mut raw = RawRecord::new();
        raw.insert(KEY_HOSTNAME.to_string(), self.identity.to_string());
        match self.kind {
            RecordKind::Compute => {
                raw.insert(KEY_INVENTORY.to_string(), self.inventory.clone());
                raw.insert(KEY_PARTITION.to_string(), self.partition.clone());
                raw.insert(KEY_DEFAULT.to_string(), self.default.to_string());
            }
            RecordKind::Controller => {
                raw.insert(KEY_PORT.to_string(), self.port.clone());
            }
        }

        match PublishedRecord::from_raw(self.kind, &raw) {
            Some(record) => RecordComputation::Ready(record),
            // Every key of the kind is inserted above.
            None => RecordComputation::NotReady { missing: Vec::new() },
        }
    }
}
