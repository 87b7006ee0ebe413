//! Relation state machine
//!
//! Each relation instance tracks two things:
//! - the last lifecycle event processed for it (Created, Joined, Changed,
//!   Departed, Broken), which guards event ordering;
//! - its coordination phase (Unestablished, AwaitingLocalReadiness,
//!   Published, Torn), which records what this node has done on it.
//!
//! Transitions are consuming methods that return the next state or a
//! forbidden-transition error. Torn is terminal.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{CoordinationError, CoordinationResult};
use super::identity::NodeIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationLifecycleState {
    Created,
    Joined,
    Changed,
    Departed,
    Broken,
}

impl RelationLifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Joined => "Joined",
            Self::Changed => "Changed",
            Self::Departed => "Departed",
            Self::Broken => "Broken",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Departed | Self::Broken)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationPhase {
    /// Created; nothing attempted yet
    Unestablished,
    /// Publish deferred on local readiness
    AwaitingLocalReadiness,
    /// This node's record is on the bus
    Published,
    /// Departed or broken; terminal
    Torn,
}

impl RelationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unestablished => "Unestablished",
            Self::AwaitingLocalReadiness => "AwaitingLocalReadiness",
            Self::Published => "Published",
            Self::Torn => "Torn",
        }
    }
}

impl fmt::Display for RelationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationState {
    lifecycle: RelationLifecycleState,
    phase: RelationPhase,
    peers: BTreeSet<NodeIdentity>,
    /// Checksum of the last record written to the bus
    published_checksum: Option<u32>,
}

impl RelationState {
    /// State of a freshly created relation instance.
    pub fn created() -> Self {
        Self {
            lifecycle: RelationLifecycleState::Created,
            phase: RelationPhase::Unestablished,
            peers: BTreeSet::new(),
            published_checksum: None,
        }
    }

    pub fn lifecycle(&self) -> RelationLifecycleState {
        self.lifecycle
    }

    pub fn phase(&self) -> RelationPhase {
        self.phase
    }

    pub fn is_torn(&self) -> bool {
        self.phase == RelationPhase::Torn
    }

    pub fn is_published(&self) -> bool {
        self.phase == RelationPhase::Published
    }

    pub fn has_peer(&self, peer: &NodeIdentity) -> bool {
        self.peers.contains(peer)
    }

    pub fn peers(&self) -> impl Iterator<Item = &NodeIdentity> {
        self.peers.iter()
    }

    pub fn published_checksum(&self) -> Option<u32> {
        self.published_checksum
    }

    // =========================================================================
    // PHASE TRANSITIONS
    // =========================================================================

    /// Unestablished | AwaitingLocalReadiness → AwaitingLocalReadiness
    pub fn await_readiness(self) -> CoordinationResult<Self> {
        match self.phase {
            RelationPhase::Unestablished | RelationPhase::AwaitingLocalReadiness => Ok(Self {
                phase: RelationPhase::AwaitingLocalReadiness,
                ..self
            }),
            _ => Err(CoordinationError::forbidden_transition(
                self.phase.as_str(),
                "AwaitingLocalReadiness",
            )),
        }
    }

    /// Any live phase → Published, remembering what was written.
    pub fn publish(self, checksum: u32) -> CoordinationResult<Self> {
        match self.phase {
            RelationPhase::Torn => Err(CoordinationError::forbidden_transition(
                self.phase.as_str(),
                "Published",
            )),
            _ => Ok(Self {
                phase: RelationPhase::Published,
                published_checksum: Some(checksum),
                ..self
            }),
        }
    }

    // =========================================================================
    // LIFECYCLE TRANSITIONS
    // =========================================================================

    /// Created | Joined | Changed → Joined
    pub fn join(mut self, peer: NodeIdentity) -> CoordinationResult<Self> {
        if self.lifecycle.is_terminal() {
            return Err(CoordinationError::forbidden_transition(
                self.lifecycle.as_str(),
                "Joined",
            ));
        }
        self.peers.insert(peer);
        self.lifecycle = RelationLifecycleState::Joined;
        Ok(self)
    }

    /// Joined | Changed → Changed, for a peer that has joined.
    pub fn change(self, peer: &NodeIdentity) -> CoordinationResult<Self> {
        if self.lifecycle.is_terminal() || !self.peers.contains(peer) {
            return Err(CoordinationError::forbidden_transition(
                self.lifecycle.as_str(),
                "Changed",
            ));
        }
        Ok(Self {
            lifecycle: RelationLifecycleState::Changed,
            ..self
        })
    }

    /// Live → Departed, phase Torn.
    pub fn depart(self) -> CoordinationResult<Self> {
        self.tear(RelationLifecycleState::Departed)
    }

    /// Live → Broken, phase Torn.
    pub fn break_off(self) -> CoordinationResult<Self> {
        self.tear(RelationLifecycleState::Broken)
    }

    fn tear(self, to: RelationLifecycleState) -> CoordinationResult<Self> {
        if self.lifecycle.is_terminal() {
            return Err(CoordinationError::forbidden_transition(
                self.lifecycle.as_str(),
                to.as_str(),
            ));
        }
        Ok(Self {
            lifecycle: to,
            phase: RelationPhase::Torn,
            peers: BTreeSet::new(),
            published_checksum: self.published_checksum,
        })
    }
}

/// Progress of the node-level start action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartState {
    /// No start event seen
    #[default]
    Idle,
    /// Start arrived while gated; waiting in the ring
    Deferred,
    /// Render-and-restart has run
    Completed,
}

/// Operator-facing status of the node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Unknown,
    Maintenance(String),
    Waiting(String),
    Blocked(String),
    Active(String),
}

impl UnitStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Maintenance(_) => "maintenance",
            Self::Waiting(_) => "waiting",
            Self::Blocked(_) => "blocked",
            Self::Active(_) => "active",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Unknown => "",
            Self::Maintenance(m) | Self::Waiting(m) | Self::Blocked(m) | Self::Active(m) => m,
        }
    }
}
