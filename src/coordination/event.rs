//! Lifecycle events accepted by the engine
//!
//! The set is closed; new kinds are added here and to the engine's
//! dispatch match.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::NodeConfig;

use super::identity::{NodeIdentity, RelationId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LifecycleEvent {
    /// Installation began; the installer signals readiness when done
    Install,
    /// Node start; runs render-and-restart once gated preconditions hold
    Start,
    /// New node configuration
    ConfigChanged { config: Box<NodeConfig> },
    /// Explicit node teardown
    Remove,
    RelationCreated { relation: RelationId },
    RelationJoined { relation: RelationId, peer: NodeIdentity },
    /// `peer` published new data; the engine reads it from the bus
    RelationChanged { relation: RelationId, peer: NodeIdentity },
    RelationDeparted { relation: RelationId, peer: NodeIdentity },
    RelationBroken { relation: RelationId },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::ConfigChanged { .. } => "config-changed",
            Self::Remove => "remove",
            Self::RelationCreated { .. } => "relation-created",
            Self::RelationJoined { .. } => "relation-joined",
            Self::RelationChanged { .. } => "relation-changed",
            Self::RelationDeparted { .. } => "relation-departed",
            Self::RelationBroken { .. } => "relation-broken",
        }
    }

    /// Relation instance the event belongs to, if any.
    pub fn relation(&self) -> Option<&RelationId> {
        match self {
            Self::RelationCreated { relation }
            | Self::RelationJoined { relation, .. }
            | Self::RelationChanged { relation, .. }
            | Self::RelationDeparted { relation, .. }
            | Self::RelationBroken { relation } => Some(relation),
            Self::Install | Self::Start | Self::ConfigChanged { .. } | Self::Remove => None,
        }
    }
}

/// What handling one event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Handled to completion
    Completed,
    /// Work postponed in the deferral ring under this entry id
    Deferred { id: Uuid },
    /// Out of lifecycle order; no state changed
    Rejected { reason: String },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
