//! Peer view
//!
//! Latest complete record observed from each peer, per relation instance.
//! Snapshots missing any key of the expected kind are not stored: the
//! previously observed record (if any) stays in place, so a reader sees
//! either nothing or one whole publication.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::identity::{NodeIdentity, RelationId};
use super::record::{PublishedRecord, RawRecord, RecordKind};

/// What `observe` did with a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// First complete record from this peer.
    New,
    /// Replaced an earlier record with different content.
    Updated,
    /// Same content as the stored record.
    Unchanged,
    /// Snapshot lacked these keys and was not stored.
    Incomplete { missing: Vec<&'static str> },
}

/// One stored entry; kept as a list in snapshots because the map key is
/// not a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub relation: RelationId,
    pub peer: NodeIdentity,
    pub record: PublishedRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerView {
    records: BTreeMap<(RelationId, NodeIdentity), PublishedRecord>,
}

impl PeerView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the snapshot published by `peer` if it is a complete record
    /// of `kind`. Last writer wins for the whole record.
    pub fn observe(
        &mut self,
        relation: &RelationId,
        peer: &NodeIdentity,
        kind: RecordKind,
        raw: &RawRecord,
    ) -> Observation {
        let Some(record) = PublishedRecord::from_raw(kind, raw) else {
            return Observation::Incomplete {
                missing: PublishedRecord::missing_keys(kind, raw),
            };
        };

        match self.records.insert((relation.clone(), peer.clone()), record.clone()) {
            None => Observation::New,
            Some(previous) if previous == record => Observation::Unchanged,
            Some(_) => Observation::Updated,
        }
    }

    pub fn get(&self, relation: &RelationId, peer: &NodeIdentity, key: &str) -> Option<&str> {
        self.record(relation, peer).and_then(|record| record.get(key))
    }

    pub fn record(&self, relation: &RelationId, peer: &NodeIdentity) -> Option<&PublishedRecord> {
        self.records.get(&(relation.clone(), peer.clone()))
    }

    /// Drop one peer's record.
    pub fn forget(&mut self, relation: &RelationId, peer: &NodeIdentity) -> bool {
        self.records.remove(&(relation.clone(), peer.clone())).is_some()
    }

    /// Drop every record of a relation instance. Returns how many went.
    pub fn forget_relation(&mut self, relation: &RelationId) -> usize {
        let before = self.records.len();
        self.records.retain(|(rel, _), _| rel != relation);
        before - self.records.len()
    }

    /// Peers with a stored record on `relation`.
    pub fn peers<'a>(&'a self, relation: &'a RelationId) -> impl Iterator<Item = &'a NodeIdentity> + 'a {
        self.records
            .keys()
            .filter(move |(rel, _)| rel == relation)
            .map(|(_, peer)| peer)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub(crate) fn entries(&self) -> Vec<PeerEntry> {
        self.records
            .iter()
            .map(|((relation, peer), record)| PeerEntry {
                relation: relation.clone(),
                peer: peer.clone(),
                record: record.clone(),
            })
            .collect()
    }

    pub(crate) fn from_entries(entries: Vec<PeerEntry>) -> Self {
        let records = entries
            .into_iter()
            .map(|entry| ((entry.relation, entry.peer), entry.record))
            .collect();
        Self { records }
    }
}
