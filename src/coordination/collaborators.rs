//! External collaborators
//!
//! The engine talks to the outside world through two seams:
//! - `Bus`: the shared key/value exchange between peers, one slot per
//!   (relation instance, unit);
//! - `NodeAction`: the node-level render-and-restart side effect.
//!
//! `MemoryBus` and `RecordingAction` are in-process implementations used
//! by the replay driver and by tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::identity::{NodeIdentity, RelationId};
use super::record::RawRecord;

/// Shared relation data bus.
///
/// `publish` replaces the whole slot in one write; readers never see a
/// mix of two publications.
pub trait Bus {
    fn publish(&mut self, relation: &RelationId, unit: &NodeIdentity, record: RawRecord);

    fn read(&self, relation: &RelationId, peer: &NodeIdentity) -> Option<RawRecord>;
}

/// Node-level side effect run once start is ungated.
pub trait NodeAction {
    fn render_config_and_restart(&mut self);
}

#[derive(Debug, Clone, Default)]
struct Slot {
    record: RawRecord,
    /// Bumped only when the content changes
    revision: u64,
}

#[derive(Debug, Default)]
struct BusState {
    slots: BTreeMap<(RelationId, NodeIdentity), Slot>,
    writes: u64,
}

/// In-memory bus. Clones share the same slots, so several engines in one
/// process can exchange records.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Rc<RefCell<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revision of a slot; 0 if never written.
    pub fn revision(&self, relation: &RelationId, unit: &NodeIdentity) -> u64 {
        self.state
            .borrow()
            .slots
            .get(&(relation.clone(), unit.clone()))
            .map_or(0, |slot| slot.revision)
    }

    /// Total publish calls, including ones that changed nothing.
    pub fn writes(&self) -> u64 {
        self.state.borrow().writes
    }
}

impl Bus for MemoryBus {
    fn publish(&mut self, relation: &RelationId, unit: &NodeIdentity, record: RawRecord) {
        let mut state = self.state.borrow_mut();
        state.writes += 1;
        let slot = state
            .slots
            .entry((relation.clone(), unit.clone()))
            .or_default();
        if slot.revision == 0 || slot.record != record {
            slot.record = record;
            slot.revision += 1;
        }
    }

    fn read(&self, relation: &RelationId, peer: &NodeIdentity) -> Option<RawRecord> {
        self.state
            .borrow()
            .slots
            .get(&(relation.clone(), peer.clone()))
            .map(|slot| slot.record.clone())
    }
}

/// Counts render-and-restart invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingAction {
    invocations: u32,
}

impl RecordingAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> u32 {
        self.invocations
    }
}

impl NodeAction for RecordingAction {
    fn render_config_and_restart(&mut self) {
        self.invocations += 1;
    }
}
