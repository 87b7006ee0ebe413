//! Deferral ring
//!
//! FIFO of work whose precondition did not hold when it arrived. Entries
//! leave the ring in exactly two ways: drained because their precondition
//! now holds, or discarded because their relation was torn down.
//!
//! Deferring an action that is already pending merges into the pending
//! entry instead of appending a second copy, so one satisfying trigger
//! runs the action once.
//!
//! Single-threaded use only; the engine owns the ring.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::RelationId;

/// Work that can wait in the ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeferredAction {
    /// Publish this node's record on a relation instance
    Publish { relation: RelationId },
    /// Run the node-level start action
    Start,
}

impl DeferredAction {
    /// Relation that owns the action; node-level actions have none.
    pub fn relation(&self) -> Option<&RelationId> {
        match self {
            Self::Publish { relation } => Some(relation),
            Self::Start => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Publish { .. } => "publish",
            Self::Start => "start",
        }
    }
}

impl fmt::Display for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish { relation } => write!(f, "publish({})", relation),
            Self::Start => f.write_str("start"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredEvent {
    pub id: Uuid,
    pub action: DeferredAction,
    /// When the action was first deferred
    pub deferred_at: DateTime<Utc>,
    /// Times the entry was re-offered and was still blocked
    pub offers: u32,
    /// Later deferrals of the same action merged into this entry
    pub coalesced: u32,
}

impl DeferredEvent {
    fn new(action: DeferredAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            deferred_at: Utc::now(),
            offers: 0,
            coalesced: 0,
        }
    }

    pub fn relation(&self) -> Option<&RelationId> {
        self.action.relation()
    }
}

/// Outcome of `defer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferral {
    /// Appended as a new entry
    Queued(Uuid),
    /// Merged into the pending entry with this id
    Coalesced(Uuid),
}

impl Deferral {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Queued(id) | Self::Coalesced(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeferralRing {
    entries: VecDeque<DeferredEvent>,
}

impl DeferralRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `action`, or merge it into an identical pending entry.
    /// Existing entries are never reordered.
    pub fn defer(&mut self, action: DeferredAction) -> Deferral {
        if let Some(pending) = self.entries.iter_mut().find(|e| e.action == action) {
            pending.coalesced += 1;
            return Deferral::Coalesced(pending.id);
        }
        let event = DeferredEvent::new(action);
        let id = event.id;
        self.entries.push_back(event);
        Deferral::Queued(id)
    }

    /// Remove and return, in queue order, every entry for which
    /// `ready` holds. Entries left behind have their offer count bumped.
    pub fn drain<F>(&mut self, mut ready: F) -> Vec<DeferredEvent>
    where
        F: FnMut(&DeferredEvent) -> bool,
    {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let (drained, mut blocked): (VecDeque<DeferredEvent>, VecDeque<DeferredEvent>) =
            self.entries.drain(..).partition(|event| ready(event));
        for event in blocked.iter_mut() {
            event.offers += 1;
        }
        self.entries = blocked;
        drained.into()
    }

    /// Remove every entry owned by `relation`, returning them.
    pub fn discard(&mut self, relation: &RelationId) -> Vec<DeferredEvent> {
        let (discarded, kept): (VecDeque<DeferredEvent>, VecDeque<DeferredEvent>) = self
            .entries
            .drain(..)
            .partition(|event| event.relation() == Some(relation));
        self.entries = kept;
        discarded.into()
    }

    /// Entries owned by `relation`, in order.
    pub fn pending_for<'a>(
        &'a self,
        relation: &RelationId,
    ) -> impl Iterator<Item = &'a DeferredEvent> + 'a {
        let relation = relation.clone();
        self.entries
            .iter()
            .filter(move |e| e.relation() == Some(&relation))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}
