//! End-to-End Bootstrap Tests
//!
//! A compute node and a controller exchange records over one bus. Events
//! arrive in an order that forces deferral on both sides; each node
//! still renders and restarts exactly once.

use bootgate::config::{NodeConfig, NodeRole};
use bootgate::coordination::{
    Bus, CoordinationEngine, LifecycleEvent, MemoryBus, NodeIdentity, ReadinessFlag,
    RecordingAction, RelationId, StartState, UnitStatus,
};

type Engine = CoordinationEngine<MemoryBus, RecordingAction>;

fn rel() -> RelationId {
    RelationId::new("slurm-cluster", 1)
}

fn node(name: &str, role: NodeRole, bus: &MemoryBus) -> Engine {
    let mut config = NodeConfig::for_node(name);
    config.role = role;
    CoordinationEngine::new(config, bus.clone(), RecordingAction::new())
}

fn changed(peer: &str) -> LifecycleEvent {
    LifecycleEvent::RelationChanged {
        relation: rel(),
        peer: NodeIdentity::new(peer),
    }
}

fn joined(peer: &str) -> LifecycleEvent {
    LifecycleEvent::RelationJoined {
        relation: rel(),
        peer: NodeIdentity::new(peer),
    }
}

#[test]
fn test_compute_and_controller_bootstrap() {
    let bus = MemoryBus::new();
    let mut compute = node("nodeA", NodeRole::Compute, &bus);
    let mut controller = node("ctl", NodeRole::Controller, &bus);

    // Compute: install starts, relation appears before install finishes.
    assert!(compute.handle(LifecycleEvent::Install).is_completed());
    assert!(compute.handle(LifecycleEvent::Start).is_deferred());
    assert!(compute
        .handle(LifecycleEvent::RelationCreated { relation: rel() })
        .is_deferred());
    assert!(bus.read(&rel(), &NodeIdentity::new("nodeA")).is_none());
    assert_eq!(
        compute.status(),
        &UnitStatus::Blocked("Need relation to controller.".into())
    );

    // Controller is installed and publishes immediately.
    controller.set_ready(ReadinessFlag::ServiceInstalled);
    assert!(controller
        .handle(LifecycleEvent::RelationCreated { relation: rel() })
        .is_completed());
    controller.handle(joined("nodeA"));
    assert!(controller.handle(LifecycleEvent::Start).is_deferred());

    // Controller sees nothing usable from the compute node yet.
    controller.handle(changed("nodeA"));
    assert!(controller
        .peer_view()
        .record(&rel(), &NodeIdentity::new("nodeA"))
        .is_none());

    // Compute receives the controller record before its own install ends.
    compute.handle(joined("ctl"));
    compute.handle(changed("ctl"));
    assert!(compute.readiness().is_ready(&ReadinessFlag::PeerConfigAcquired));
    assert_eq!(compute.action().invocations(), 0);
    assert_eq!(
        compute.status(),
        &UnitStatus::Waiting("Waiting on service install to complete...".into())
    );

    // Install finishes: publish replays, then the deferred start.
    compute.set_ready(ReadinessFlag::ServiceInstalled);
    assert_eq!(compute.start_state(), StartState::Completed);
    assert_eq!(compute.action().invocations(), 1);
    assert!(compute.deferrals().is_empty());

    let published = bus.read(&rel(), &NodeIdentity::new("nodeA")).unwrap();
    assert_eq!(published.get("partition").map(String::as_str), Some("compute"));

    // Controller picks up the compute record; its deferred start runs.
    controller.handle(changed("nodeA"));
    let seen = controller
        .peer_view()
        .record(&rel(), &NodeIdentity::new("nodeA"))
        .unwrap();
    assert_eq!(seen.get("hostname"), Some("nodeA"));
    assert_eq!(seen.get("default"), Some("False"));
    assert!(controller.readiness().is_ready(&ReadinessFlag::PeerConfigAcquired));
    assert_eq!(controller.start_state(), StartState::Completed);
    assert_eq!(controller.action().invocations(), 1);

    // Repeated deliveries do not render again.
    compute.handle(changed("ctl"));
    compute.set_ready(ReadinessFlag::ServiceInstalled);
    controller.handle(changed("nodeA"));
    assert_eq!(compute.action().invocations(), 1);
    assert_eq!(compute.metrics().actions_triggered, 1);
    assert_eq!(controller.action().invocations(), 1);
}

#[test]
fn test_controller_blocked_without_compute_nodes() {
    let bus = MemoryBus::new();
    let mut controller = node("ctl", NodeRole::Controller, &bus);
    controller.set_ready(ReadinessFlag::ServiceInstalled);

    assert!(controller.handle(LifecycleEvent::Start).is_deferred());
    assert_eq!(
        controller.status(),
        &UnitStatus::Blocked("Need relation to compute nodes.".into())
    );
}
