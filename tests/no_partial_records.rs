//! No Partial Records Tests
//!
//! A reader of PeerView sees either no record from a peer or a whole one.
//! This node never writes a record with a required key missing.

use bootgate::config::{NodeConfig, NodeRole};
use bootgate::coordination::{
    Bus, CoordinationEngine, LifecycleEvent, MemoryBus, NodeIdentity, RawRecord, ReadinessFlag,
    RecordKind, RecordingAction, RelationId,
};

type Engine = CoordinationEngine<MemoryBus, RecordingAction>;

fn rel() -> RelationId {
    RelationId::new("slurm-cluster", 1)
}

fn ctl() -> NodeIdentity {
    NodeIdentity::new("ctl")
}

fn joined_engine() -> Engine {
    let mut engine = CoordinationEngine::new(
        NodeConfig::for_node("node-a"),
        MemoryBus::new(),
        RecordingAction::new(),
    );
    engine.handle(LifecycleEvent::RelationCreated { relation: rel() });
    engine.handle(LifecycleEvent::RelationJoined {
        relation: rel(),
        peer: ctl(),
    });
    engine
}

fn deliver(engine: &mut Engine, record: RawRecord) {
    engine.bus_mut().publish(&rel(), &ctl(), record);
    engine.handle(LifecycleEvent::RelationChanged {
        relation: rel(),
        peer: ctl(),
    });
}

fn record(pairs: &[(&str, &str)]) -> RawRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A record missing a key is never visible.
#[test]
fn test_partial_first_record_invisible() {
    let mut engine = joined_engine();
    deliver(&mut engine, record(&[("hostname", "ctl")]));

    assert!(engine.peer_view().record(&rel(), &ctl()).is_none());
    assert!(engine.peer_view().get(&rel(), &ctl(), "hostname").is_none());
    assert!(!engine.readiness().is_ready(&ReadinessFlag::PeerConfigAcquired));
}

/// A partial update keeps every field of the previous whole record.
#[test]
fn test_partial_update_keeps_previous_record() {
    let mut engine = joined_engine();
    deliver(&mut engine, record(&[("hostname", "ctl"), ("port", "6817")]));
    deliver(&mut engine, record(&[("hostname", "ctl-2")]));

    let stored = engine.peer_view().record(&rel(), &ctl()).unwrap();
    assert_eq!(stored.get("hostname"), Some("ctl"));
    assert_eq!(stored.get("port"), Some("6817"));
    assert_eq!(engine.metrics().incomplete_records, 1);
}

/// A whole update replaces the record as a unit.
#[test]
fn test_whole_update_replaces_record() {
    let mut engine = joined_engine();
    deliver(&mut engine, record(&[("hostname", "ctl"), ("port", "6817")]));
    deliver(&mut engine, record(&[("hostname", "ctl-2"), ("port", "7000")]));

    let stored = engine.peer_view().record(&rel(), &ctl()).unwrap();
    assert_eq!(stored.get("hostname"), Some("ctl-2"));
    assert_eq!(stored.get("port"), Some("7000"));
}

/// Keys outside the record kind are not carried into the view.
#[test]
fn test_extra_keys_dropped() {
    let mut engine = joined_engine();
    deliver(
        &mut engine,
        record(&[("hostname", "ctl"), ("port", "6817"), ("egress-subnets", "10.0.0.0/24")]),
    );

    let stored = engine.peer_view().record(&rel(), &ctl()).unwrap();
    assert_eq!(stored.kind(), RecordKind::Controller);
    assert!(stored.get("egress-subnets").is_none());
}

/// Every record this node writes carries all keys of its kind.
#[test]
fn test_written_records_are_whole() {
    for role in [NodeRole::Compute, NodeRole::Controller] {
        let mut config = NodeConfig::for_node("node-a");
        config.role = role;
        let mut engine = CoordinationEngine::new(config, MemoryBus::new(), RecordingAction::new());
        engine.handle(LifecycleEvent::RelationCreated { relation: rel() });
        assert!(engine.bus().read(&rel(), engine.identity()).is_none());

        engine.set_ready(ReadinessFlag::ServiceInstalled);
        let raw = engine.bus().read(&rel(), engine.identity()).unwrap();
        let kind = role.record_kind();
        for key in kind.keys() {
            assert!(raw.contains_key(*key), "{} record missing {}", kind, key);
        }
        assert_eq!(raw.len(), kind.keys().len());
    }
}
