//! Coordination counters
//!
//! Counters only, monotonic for the life of a node. The engine is single
//! threaded so plain integers suffice; they travel with engine snapshots.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    /// Bus writes with new content
    pub records_published: u64,
    /// Bus writes skipped because content was identical
    pub records_unchanged: u64,
    /// Entries appended to the deferral ring
    pub events_deferred: u64,
    /// Duplicate deferrals merged into a pending entry
    pub deferrals_coalesced: u64,
    /// Deferred entries drained and run
    pub events_replayed: u64,
    /// Deferred entries dropped by relation teardown
    pub deferrals_discarded: u64,
    /// Events refused for lifecycle order
    pub events_rejected: u64,
    /// Inbound snapshots ignored for missing keys
    pub incomplete_records: u64,
    /// Render-and-restart invocations
    pub actions_triggered: u64,
}

impl CoordinationMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
