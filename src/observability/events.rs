//! Observable coordination events
//!
//! Events are explicit and typed; each has a stable log name and a
//! default severity.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    // Node lifecycle
    /// Engine constructed or restored
    EngineReady,
    /// Install hook observed; installation runs elsewhere
    InstallObserved,
    /// Node configuration replaced
    ConfigChanged,
    /// Explicit teardown of the node
    NodeTornDown,

    // Readiness
    /// A readiness flag went false → true
    ReadinessReached,

    // Relations
    /// Relation instance created
    RelationCreated,
    /// Peer joined a relation
    RelationJoined,
    /// Peer published new data
    RelationChanged,
    /// Peer departed; relation torn
    RelationDeparted,
    /// Relation broken; relation torn
    RelationBroken,

    // Records
    /// Outbound record written to the bus
    RecordPublished,
    /// Outbound record identical to the last write
    RecordUnchanged,
    /// Inbound complete record stored in the peer view
    PeerRecordObserved,
    /// Inbound snapshot missing keys; ignored
    PeerRecordIncomplete,

    // Deferral
    /// Publish postponed on unmet readiness
    PublishDeferred,
    /// Start action postponed on unmet gate
    StartDeferred,
    /// Deferred entry re-offered and run
    DeferredReplayed,
    /// Deferred entries of a torn relation dropped
    DeferralsDiscarded,

    // Start
    /// Render-and-restart action triggered
    StartCompleted,

    /// Event out of lifecycle order; no state changed
    EventRejected,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::EngineReady => "ENGINE_READY",
            Event::InstallObserved => "INSTALL_OBSERVED",
            Event::ConfigChanged => "CONFIG_CHANGED",
            Event::NodeTornDown => "NODE_TORN_DOWN",

            Event::ReadinessReached => "READINESS_REACHED",

            Event::RelationCreated => "RELATION_CREATED",
            Event::RelationJoined => "RELATION_JOINED",
            Event::RelationChanged => "RELATION_CHANGED",
            Event::RelationDeparted => "RELATION_DEPARTED",
            Event::RelationBroken => "RELATION_BROKEN",

            Event::RecordPublished => "RECORD_PUBLISHED",
            Event::RecordUnchanged => "RECORD_UNCHANGED",
            Event::PeerRecordObserved => "PEER_RECORD_OBSERVED",
            Event::PeerRecordIncomplete => "PEER_RECORD_INCOMPLETE",

            Event::PublishDeferred => "PUBLISH_DEFERRED",
            Event::StartDeferred => "START_DEFERRED",
            Event::DeferredReplayed => "DEFERRED_REPLAYED",
            Event::DeferralsDiscarded => "DEFERRALS_DISCARDED",

            Event::StartCompleted => "START_COMPLETED",

            Event::EventRejected => "EVENT_REJECTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::EventRejected => Severity::Warn,
            Event::RecordUnchanged | Event::PeerRecordIncomplete | Event::RelationJoined => {
                Severity::Trace
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_upper_snake() {
        let events = [
            Event::EngineReady,
            Event::InstallObserved,
            Event::ConfigChanged,
            Event::NodeTornDown,
            Event::ReadinessReached,
            Event::RelationCreated,
            Event::RelationJoined,
            Event::RelationChanged,
            Event::RelationDeparted,
            Event::RelationBroken,
            Event::RecordPublished,
            Event::RecordUnchanged,
            Event::PeerRecordObserved,
            Event::PeerRecordIncomplete,
            Event::PublishDeferred,
            Event::StartDeferred,
            Event::DeferredReplayed,
            Event::DeferralsDiscarded,
            Event::StartCompleted,
            Event::EventRejected,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_rejections_warn() {
        assert_eq!(Event::EventRejected.severity(), Severity::Warn);
        assert_eq!(Event::RecordPublished.severity(), Severity::Info);
    }
}
