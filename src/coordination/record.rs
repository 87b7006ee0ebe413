//! Published records
//!
//! A record is the fixed-schema key/value set one node exposes about
//! itself on a relation. Records only exist complete: construction from a
//! raw bus map fails unless every key of the kind is present, and keys
//! outside the kind's schema are dropped. Values live in an ordered map so
//! two computations from the same inputs are bit-identical.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const KEY_HOSTNAME: &str = "hostname";
pub const KEY_INVENTORY: &str = "inventory";
pub const KEY_PARTITION: &str = "partition";
pub const KEY_DEFAULT: &str = "default";
pub const KEY_PORT: &str = "port";

const COMPUTE_KEYS: &[&str] = &[KEY_HOSTNAME, KEY_INVENTORY, KEY_PARTITION, KEY_DEFAULT];
const CONTROLLER_KEYS: &[&str] = &[KEY_HOSTNAME, KEY_PORT];

/// Raw key/value snapshot as carried by the bus.
pub type RawRecord = BTreeMap<String, String>;

/// Record schema, one per node role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Published by compute nodes: hostname, inventory, partition, default.
    Compute,
    /// Published by the controller: hostname, port.
    Controller,
}

impl RecordKind {
    /// The fixed key set of this kind.
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::Compute => COMPUTE_KEYS,
            Self::Controller => CONTROLLER_KEYS,
        }
    }

    /// The kind a node of this kind consumes from its peers.
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Compute => Self::Controller,
            Self::Controller => Self::Compute,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Controller => "controller",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete record of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRecord {
    kind: RecordKind,
    values: RawRecord,
}

impl PublishedRecord {
    /// Build a record from a raw bus snapshot.
    ///
    /// Returns `None` if any key of `kind` is missing; such a snapshot has
    /// not been observed yet as far as coordination is concerned.
    pub fn from_raw(kind: RecordKind, raw: &RawRecord) -> Option<Self> {
        let mut values = RawRecord::new();
        for key in kind.keys() {
            let value = raw.get(*key)?;
            values.insert((*key).to_string(), value.clone());
        }
        Some(Self { kind, values })
    }

    /// Keys of `kind` absent from `raw`, in schema order.
    pub fn missing_keys(kind: RecordKind, raw: &RawRecord) -> Vec<&'static str> {
        kind.keys()
            .iter()
            .copied()
            .filter(|key| !raw.contains_key(*key))
            .collect()
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn values(&self) -> &RawRecord {
        &self.values
    }

    /// The full key/value map handed to the bus in one write.
    pub fn to_raw(&self) -> RawRecord {
        self.values.clone()
    }

    /// CRC32 over the canonical `key=value\n` encoding, in key order.
    pub fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for (key, value) in &self.values {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_complete_compute_record() {
        let snapshot = raw(&[
            ("hostname", "nodeA"),
            ("inventory", "{}"),
            ("partition", "compute"),
            ("default", "False"),
        ]);
        let record = PublishedRecord::from_raw(RecordKind::Compute, &snapshot).unwrap();
        assert_eq!(record.get("hostname"), Some("nodeA"));
        assert_eq!(record.values().len(), 4);
    }

    #[test]
    fn test_incomplete_record_is_not_a_record() {
        let snapshot = raw(&[("hostname", "nodeA"), ("partition", "compute")]);
        assert!(PublishedRecord::from_raw(RecordKind::Compute, &snapshot).is_none());
        assert_eq!(
            PublishedRecord::missing_keys(RecordKind::Compute, &snapshot),
            vec!["inventory", "default"]
        );
    }

    #[test]
    fn test_extra_keys_dropped() {
        let snapshot = raw(&[("hostname", "ctl"), ("port", "6817"), ("egress", "x")]);
        let record = PublishedRecord::from_raw(RecordKind::Controller, &snapshot).unwrap();
        assert_eq!(record.get("egress"), None);
        assert_eq!(record.values().len(), 2);
    }

    #[test]
    fn test_checksum_tracks_content() {
        let a = PublishedRecord::from_raw(
            RecordKind::Controller,
            &raw(&[("hostname", "ctl"), ("port", "6817")]),
        )
        .unwrap();
        let b = PublishedRecord::from_raw(
            RecordKind::Controller,
            &raw(&[("port", "6817"), ("hostname", "ctl")]),
        )
        .unwrap();
        let c = PublishedRecord::from_raw(
            RecordKind::Controller,
            &raw(&[("hostname", "ctl"), ("port", "6818")]),
        )
        .unwrap();
        assert_eq!(a.checksum(), b.checksum());
        assert_ne!(a.checksum(), c.checksum());
    }

    #[test]
    fn test_counterpart() {
        assert_eq!(RecordKind::Compute.counterpart(), RecordKind::Controller);
        assert_eq!(RecordKind::Controller.counterpart(), RecordKind::Compute);
    }
}
