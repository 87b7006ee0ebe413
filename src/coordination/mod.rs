//! # Relation coordination
//!
//! Orders the work a node does while its relations with peers come and
//! go:
//!
//! - `ReadinessStore`: local readiness predicates, false → true only
//! - `PeerView`: latest complete record from each peer
//! - `OutboundPublisher`: the record this node exposes, produced whole
//! - `DeferralRing`: work postponed until its preconditions hold
//! - `CoordinationEngine`: consumes lifecycle events and drives the rest
//!
//! Everything runs on one logical thread. The engine replays the ring
//! after every event and every readiness signal, so deferred work never
//! waits for an unrelated event to arrive.

mod collaborators;
mod deferral;
mod engine;
mod errors;
mod event;
mod identity;
mod peer_view;
mod publisher;
mod readiness;
mod record;
mod snapshot;
mod state;

pub use collaborators::{Bus, MemoryBus, NodeAction, RecordingAction};
pub use deferral::{Deferral, DeferralRing, DeferredAction, DeferredEvent};
pub use engine::{CoordinationEngine, StartBlockers};
pub use errors::{CoordinationError, CoordinationErrorKind, CoordinationResult};
pub use event::{LifecycleEvent, Outcome};
pub use identity::{NodeIdentity, RelationId};
pub use peer_view::{Observation, PeerEntry, PeerView};
pub use publisher::{OutboundPublisher, RecordComputation};
pub use readiness::{ReadinessFlag, ReadinessStore};
pub use record::{
    PublishedRecord, RawRecord, RecordKind, KEY_DEFAULT, KEY_HOSTNAME, KEY_INVENTORY,
    KEY_PARTITION, KEY_PORT,
};
pub use snapshot::{EngineSnapshot, RelationEntry, SnapshotError, SnapshotResult};
pub use state::{RelationLifecycleState, RelationPhase, RelationState, StartState, UnitStatus};
