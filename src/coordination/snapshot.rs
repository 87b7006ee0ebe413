//! Engine snapshots
//!
//! The host runs one process per lifecycle event, so coordination state
//! is carried between invocations as a JSON document. A snapshot holds
//! everything the engine decides from; the journal is not included.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::CoordinationMetrics;

use super::deferral::DeferralRing;
use super::identity::{NodeIdentity, RelationId};
use super::peer_view::PeerEntry;
use super::readiness::ReadinessStore;
use super::state::{RelationState, StartState, UnitStatus};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot belongs to node {found}, not {expected}")]
    IdentityMismatch { expected: String, found: String },
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    pub relation: RelationId,
    pub state: RelationState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub node: NodeIdentity,
    pub readiness: ReadinessStore,
    pub relations: Vec<RelationEntry>,
    pub peers: Vec<PeerEntry>,
    pub deferred: DeferralRing,
    #[serde(default)]
    pub start: StartState,
    #[serde(default)]
    pub status: UnitStatus,
    #[serde(default)]
    pub metrics: CoordinationMetrics,
}

impl EngineSnapshot {
    pub fn load(path: &Path) -> SnapshotResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write via a temp file and rename so a crash never leaves half a
    /// snapshot behind.
    pub fn save(&self, path: &Path) -> SnapshotResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load `path` if it exists.
    pub fn load_optional(path: &Path) -> SnapshotResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }
}
