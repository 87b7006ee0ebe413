//! Coordination engine
//!
//! Consumes one lifecycle event at a time and either completes it,
//! defers it, or rejects it for lifecycle order. Work that cannot run yet
//! goes into the deferral ring; after every event and every readiness
//! signal the engine drains the ring of entries whose precondition now
//! holds and runs them, repeating until a pass drains nothing, since a
//! replayed publish can ungate a deferred start.
//!
//! Unmet preconditions never surface as errors. The only terminal
//! outcome for a relation instance is Torn.

use std::collections::BTreeMap;

use crate::config::{NodeConfig, NodeRole, RelationSpec};
use crate::observability::{CoordinationMetrics, Event, Journal};

use super::collaborators::{Bus, NodeAction};
use super::deferral::{Deferral, DeferralRing, DeferredAction, DeferredEvent};
use super::errors::{CoordinationError, CoordinationResult};
use super::event::{LifecycleEvent, Outcome};
use super::identity::{NodeIdentity, RelationId};
use super::peer_view::{Observation, PeerView};
use super::publisher::{OutboundPublisher, RecordComputation};
use super::readiness::{ReadinessFlag, ReadinessStore};
use super::record::PublishedRecord;
use super::snapshot::{EngineSnapshot, RelationEntry, SnapshotError, SnapshotResult};
use super::state::{RelationPhase, RelationState, StartState, UnitStatus};

const INSTALLING: &str = "Installing service";
const WAITING_ON_INSTALL: &str = "Waiting on service install to complete...";
const NODE_READY: &str = "Node configured";
const REMOVED: &str = "Node removed";

/// What still blocks the node-level start action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartBlockers {
    /// Required flags still false
    pub missing_flags: Vec<ReadinessFlag>,
    /// Required relations with no live instance
    pub absent_relations: Vec<String>,
    /// Required relations with live instances, none Published yet
    pub unpublished_relations: Vec<String>,
}

impl StartBlockers {
    pub fn is_clear(&self) -> bool {
        self.missing_flags.is_empty()
            && self.absent_relations.is_empty()
            && self.unpublished_relations.is_empty()
    }
}

/// Read-only view over the state preconditions are evaluated against.
struct Gate<'a> {
    config: &'a NodeConfig,
    readiness: &'a ReadinessStore,
    relations: &'a BTreeMap<RelationId, RelationState>,
}

impl<'a> Gate<'a> {
    fn holds(&self, event: &DeferredEvent) -> bool {
        match &event.action {
            DeferredAction::Publish { relation } => match self.relations.get(relation) {
                Some(state) if !state.is_torn() => self
                    .config
                    .relation(relation.name())
                    .map_or(true, |spec| self.readiness.all_ready(&spec.publish_requires)),
                // Nothing left to publish on; replay drops it.
                _ => true,
            },
            DeferredAction::Start => self.start_blockers().is_clear(),
        }
    }

    fn start_blockers(&self) -> StartBlockers {
        let mut blockers = StartBlockers {
            missing_flags: self
                .readiness
                .missing(&self.config.start_requires)
                .into_iter()
                .cloned()
                .collect(),
            ..Default::default()
        };

        for spec in self.config.relations.iter().filter(|s| s.required_for_start) {
            let mut live = self
                .relations
                .iter()
                .filter(|(id, state)| id.name() == spec.name && !state.is_torn())
                .peekable();
            if live.peek().is_none() {
                blockers.absent_relations.push(spec.name.clone());
            } else if !live.any(|(_, state)| state.is_published()) {
                blockers.unpublished_relations.push(spec.name.clone());
            }
        }

        blockers
    }
}

/// Relation coordination state machine for one node.
pub struct CoordinationEngine<B: Bus, A: NodeAction> {
    config: NodeConfig,
    publisher: OutboundPublisher,
    readiness: ReadinessStore,
    peers: PeerView,
    ring: DeferralRing,
    relations: BTreeMap<RelationId, RelationState>,
    start: StartState,
    status: UnitStatus,
    metrics: CoordinationMetrics,
    journal: Journal,
    bus: B,
    action: A,
}

impl<B: Bus, A: NodeAction> CoordinationEngine<B, A> {
    /// Create an engine with nothing ready and no relations.
    pub fn new(config: NodeConfig, bus: B, action: A) -> Self {
        let publisher = OutboundPublisher::from_config(&config);
        let mut engine = Self {
            config,
            publisher,
            readiness: ReadinessStore::new(),
            peers: PeerView::new(),
            ring: DeferralRing::new(),
            relations: BTreeMap::new(),
            start: StartState::Idle,
            status: UnitStatus::Unknown,
            metrics: CoordinationMetrics::new(),
            journal: Journal::default(),
            bus,
            action,
        };
        let node = engine.publisher.identity().to_string();
        engine.journal.emit(Event::EngineReady, vec![("node", node)]);
        engine
    }

    /// Rebuild an engine from a snapshot taken by the same node.
    pub fn restore(
        config: NodeConfig,
        snapshot: EngineSnapshot,
        bus: B,
        action: A,
    ) -> SnapshotResult<Self> {
        let identity = config.identity();
        if snapshot.node != identity {
            return Err(SnapshotError::IdentityMismatch {
                expected: identity.to_string(),
                found: snapshot.node.to_string(),
            });
        }

        let publisher = OutboundPublisher::from_config(&config);
        let mut engine = Self {
            config,
            publisher,
            readiness: snapshot.readiness,
            peers: PeerView::from_entries(snapshot.peers),
            ring: snapshot.deferred,
            relations: snapshot
                .relations
                .into_iter()
                .map(|entry| (entry.relation, entry.state))
                .collect(),
            start: snapshot.start,
            status: snapshot.status,
            metrics: snapshot.metrics,
            journal: Journal::default(),
            bus,
            action,
        };
        engine.journal.emit(
            Event::EngineReady,
            vec![
                ("node", identity.to_string()),
                ("restored_deferrals", engine.ring.len().to_string()),
            ],
        );
        engine.settle();
        Ok(engine)
    }

    /// Capture all coordination state.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            node: self.publisher.identity().clone(),
            readiness: self.readiness.clone(),
            relations: self
                .relations
                .iter()
                .map(|(relation, state)| RelationEntry {
                    relation: relation.clone(),
                    state: state.clone(),
                })
                .collect(),
            peers: self.peers.entries(),
            deferred: self.ring.clone(),
            start: self.start,
            status: self.status.clone(),
            metrics: self.metrics.clone(),
        }
    }

    // =========================================================================
    // ENTRY POINTS
    // =========================================================================

    /// Handle one lifecycle event to completion, then replay whatever it
    /// ungated.
    pub fn handle(&mut self, event: LifecycleEvent) -> Outcome {
        let outcome = match &event {
            LifecycleEvent::Install => self.on_install(),
            LifecycleEvent::Start => self.on_start(),
            LifecycleEvent::ConfigChanged { config } => self.on_config_changed(config),
            LifecycleEvent::Remove => self.on_remove(),
            LifecycleEvent::RelationCreated { relation } => self.on_relation_created(relation),
            LifecycleEvent::RelationJoined { relation, peer } => {
                self.on_relation_joined(relation, peer)
            }
            LifecycleEvent::RelationChanged { relation, peer } => {
                self.on_relation_changed(relation, peer)
            }
            LifecycleEvent::RelationDeparted { relation, peer } => {
                self.on_relation_departed(relation, peer)
            }
            LifecycleEvent::RelationBroken { relation } => self.on_relation_broken(relation),
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => self.reject(&event, err),
        };
        self.settle();
        self.refresh_status();
        outcome
    }

    /// Local readiness signal from the install/start collaborators.
    ///
    /// Returns whether the flag transitioned; a transition replays the
    /// deferral ring.
    pub fn set_ready(&mut self, flag: ReadinessFlag) -> bool {
        let transitioned = self.mark_ready(flag);
        if transitioned {
            self.settle();
            self.refresh_status();
        }
        transitioned
    }

    // =========================================================================
    // NODE EVENTS
    // =========================================================================

    fn on_install(&mut self) -> CoordinationResult<Outcome> {
        self.status = UnitStatus::Maintenance(INSTALLING.to_string());
        self.journal.emit(Event::InstallObserved, vec![]);
        Ok(Outcome::Completed)
    }

    fn on_start(&mut self) -> CoordinationResult<Outcome> {
        let blockers = self.gate().start_blockers();
        if blockers.is_clear() {
            self.run_start();
            return Ok(Outcome::Completed);
        }

        self.status = self.status_for(&blockers);
        let deferral = self.ring.defer(DeferredAction::Start);
        self.count_deferral(&deferral);
        self.start = StartState::Deferred;
        self.journal.emit(
            Event::StartDeferred,
            vec![
                ("id", deferral.id().to_string()),
                ("missing_flags", join(&blockers.missing_flags)),
                ("absent_relations", blockers.absent_relations.join(",")),
                ("unpublished_relations", blockers.unpublished_relations.join(",")),
            ],
        );
        Ok(Outcome::Deferred { id: deferral.id() })
    }

    fn run_start(&mut self) {
        self.action.render_config_and_restart();
        self.metrics.actions_triggered += 1;
        self.start = StartState::Completed;
        self.status = UnitStatus::Active(NODE_READY.to_string());
        self.journal.emit(
            Event::StartCompleted,
            vec![("actions_triggered", self.metrics.actions_triggered.to_string())],
        );
    }

    fn on_config_changed(&mut self, config: &NodeConfig) -> CoordinationResult<Outcome> {
        if let Err(err) = config.validate() {
            return Ok(self.rejected("config-changed", None, err.to_string()));
        }
        if config.identity() != *self.publisher.identity() {
            return Ok(self.rejected(
                "config-changed",
                None,
                format!(
                    "node identity is fixed at {}; config names {}",
                    self.publisher.identity(),
                    config.identity()
                ),
            ));
        }

        self.config = config.clone();
        self.publisher = OutboundPublisher::from_config(&self.config);
        self.journal.emit(
            Event::ConfigChanged,
            vec![("partition", self.config.partition.clone())],
        );

        let published: Vec<RelationId> = self
            .relations
            .iter()
            .filter(|(_, state)| state.is_published())
            .map(|(id, _)| id.clone())
            .collect();
        for relation in published {
            let Some(spec) = self.config.relation(relation.name()) else {
                continue;
            };
            // A published record is only ever replaced by a newer whole one.
            if let RecordComputation::Ready(record) =
                self.publisher.compute_record(&self.readiness, &spec.publish_requires)
            {
                self.write_record(&relation, record)?;
            }
        }
        Ok(Outcome::Completed)
    }

    fn on_remove(&mut self) -> CoordinationResult<Outcome> {
        let live: Vec<RelationId> = self
            .relations
            .iter()
            .filter(|(_, state)| !state.is_torn())
            .map(|(id, _)| id.clone())
            .collect();
        for relation in &live {
            self.transition(relation, RelationState::break_off)?;
        }

        let discarded = self.ring.clear();
        self.metrics.deferrals_discarded += discarded as u64;
        self.peers.clear();
        self.readiness.clear();
        self.start = StartState::Idle;
        self.status = UnitStatus::Maintenance(REMOVED.to_string());
        self.journal.emit(
            Event::NodeTornDown,
            vec![
                ("relations_torn", live.len().to_string()),
                ("deferrals_discarded", discarded.to_string()),
            ],
        );
        Ok(Outcome::Completed)
    }

    // =========================================================================
    // RELATION EVENTS
    // =========================================================================

    fn on_relation_created(&mut self, relation: &RelationId) -> CoordinationResult<Outcome> {
        if self.config.relation(relation.name()).is_none() {
            return Ok(self.rejected(
                "relation-created",
                Some(relation),
                format!("relation '{}' is not configured", relation.name()),
            ));
        }
        if let Some(existing) = self.relations.get(relation) {
            if !existing.is_torn() {
                return Err(CoordinationError::forbidden_transition(
                    existing.lifecycle().as_str(),
                    "Created",
                ));
            }
        }

        self.relations.insert(relation.clone(), RelationState::created());
        self.journal
            .emit(Event::RelationCreated, vec![("relation", relation.to_string())]);
        self.try_publish(relation)
    }

    fn on_relation_joined(
        &mut self,
        relation: &RelationId,
        peer: &NodeIdentity,
    ) -> CoordinationResult<Outcome> {
        let joining = peer.clone();
        self.transition(relation, move |state| state.join(joining))?;
        self.journal.emit(
            Event::RelationJoined,
            vec![("relation", relation.to_string()), ("peer", peer.to_string())],
        );
        Ok(Outcome::Completed)
    }

    fn on_relation_changed(
        &mut self,
        relation: &RelationId,
        peer: &NodeIdentity,
    ) -> CoordinationResult<Outcome> {
        self.transition(relation, |state| state.change(peer))?;
        self.journal.emit(
            Event::RelationChanged,
            vec![("relation", relation.to_string()), ("peer", peer.to_string())],
        );

        let raw = self.bus.read(relation, peer).unwrap_or_default();
        let kind = self.publisher.kind().counterpart();
        match self.peers.observe(relation, peer, kind, &raw) {
            Observation::Incomplete { missing } => {
                self.metrics.incomplete_records += 1;
                self.journal.emit(
                    Event::PeerRecordIncomplete,
                    vec![
                        ("relation", relation.to_string()),
                        ("peer", peer.to_string()),
                        ("missing", missing.join(",")),
                    ],
                );
            }
            observation => {
                self.journal.emit(
                    Event::PeerRecordObserved,
                    vec![
                        ("relation", relation.to_string()),
                        ("peer", peer.to_string()),
                        ("change", format!("{:?}", observation).to_lowercase()),
                    ],
                );
                let acquired = self
                    .config
                    .relation(relation.name())
                    .and_then(|spec| spec.acquires.clone());
                if let Some(flag) = acquired {
                    self.mark_ready(flag);
                }
            }
        }
        Ok(Outcome::Completed)
    }

    fn on_relation_departed(
        &mut self,
        relation: &RelationId,
        peer: &NodeIdentity,
    ) -> CoordinationResult<Outcome> {
        self.transition(relation, RelationState::depart)?;
        self.peers.forget(relation, peer);
        self.tear_down(relation, Event::RelationDeparted);
        Ok(Outcome::Completed)
    }

    fn on_relation_broken(&mut self, relation: &RelationId) -> CoordinationResult<Outcome> {
        self.transition(relation, RelationState::break_off)?;
        self.tear_down(relation, Event::RelationBroken);
        Ok(Outcome::Completed)
    }

    fn tear_down(&mut self, relation: &RelationId, event: Event) {
        let forgotten = self.peers.forget_relation(relation);
        let discarded = self.ring.discard(relation);
        if !discarded.is_empty() {
            self.metrics.deferrals_discarded += discarded.len() as u64;
            self.journal.emit(
                Event::DeferralsDiscarded,
                vec![
                    ("relation", relation.to_string()),
                    ("count", discarded.len().to_string()),
                ],
            );
        }
        self.journal.emit(
            event,
            vec![
                ("relation", relation.to_string()),
                ("peers_forgotten", forgotten.to_string()),
            ],
        );
    }

    // =========================================================================
    // PUBLISH
    // =========================================================================

    /// Publish on `relation` now, or defer until its flags hold.
    fn try_publish(&mut self, relation: &RelationId) -> CoordinationResult<Outcome> {
        let requires = self
            .spec(relation)
            .map(|spec| spec.publish_requires.clone())
            .unwrap_or_default();

        match self.publisher.compute_record(&self.readiness, &requires) {
            RecordComputation::Ready(record) => {
                self.write_record(relation, record)?;
                Ok(Outcome::Completed)
            }
            RecordComputation::NotReady { missing } => {
                self.transition(relation, RelationState::await_readiness)?;
                let deferral = self.ring.defer(DeferredAction::Publish {
                    relation: relation.clone(),
                });
                self.count_deferral(&deferral);
                self.journal.emit(
                    Event::PublishDeferred,
                    vec![
                        ("relation", relation.to_string()),
                        ("id", deferral.id().to_string()),
                        ("missing", join(&missing)),
                    ],
                );
                Ok(Outcome::Deferred { id: deferral.id() })
            }
        }
    }

    /// Write a whole record to this node's slot, skipping identical content.
    fn write_record(
        &mut self,
        relation: &RelationId,
        record: PublishedRecord,
    ) -> CoordinationResult<()> {
        let checksum = record.checksum();
        let unchanged = self
            .relations
            .get(relation)
            .map_or(false, |s| s.is_published() && s.published_checksum() == Some(checksum));

        if unchanged {
            self.metrics.records_unchanged += 1;
            self.journal.emit(
                Event::RecordUnchanged,
                vec![("relation", relation.to_string())],
            );
            return Ok(());
        }

        self.transition(relation, |state| state.publish(checksum))?;
        let unit = self.publisher.identity().clone();
        self.bus.publish(relation, &unit, record.to_raw());
        self.metrics.records_published += 1;
        self.journal.emit(
            Event::RecordPublished,
            vec![
                ("relation", relation.to_string()),
                ("kind", record.kind().to_string()),
                ("checksum", format!("{:08x}", checksum)),
            ],
        );
        Ok(())
    }

    // =========================================================================
    // DEFERRAL
    // =========================================================================

    /// Run every deferred entry whose precondition holds, until a pass
    /// finds none.
    fn settle(&mut self) {
        loop {
            let gate = Gate {
                config: &self.config,
                readiness: &self.readiness,
                relations: &self.relations,
            };
            let ready = self.ring.drain(|event| gate.holds(event));
            if ready.is_empty() {
                break;
            }
            for event in ready {
                self.replay(event);
            }
        }
    }

    fn replay(&mut self, event: DeferredEvent) {
        self.metrics.events_replayed += 1;
        self.journal.emit(
            Event::DeferredReplayed,
            vec![
                ("id", event.id.to_string()),
                ("action", event.action.to_string()),
                ("offers", event.offers.to_string()),
            ],
        );

        let result = match &event.action {
            DeferredAction::Publish { relation } => {
                let live = self.relations.get(relation).map_or(false, |s| !s.is_torn());
                if live {
                    self.try_publish(relation).map(|_| ())
                } else {
                    Ok(())
                }
            }
            DeferredAction::Start => self.on_start().map(|_| ()),
        };
        if let Err(err) = result {
            self.rejected(event.action.name(), event.relation(), err.message);
        }
    }

    fn count_deferral(&mut self, deferral: &Deferral) {
        match deferral {
            Deferral::Queued(_) => self.metrics.events_deferred += 1,
            Deferral::Coalesced(_) => self.metrics.deferrals_coalesced += 1,
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn gate(&self) -> Gate<'_> {
        Gate {
            config: &self.config,
            readiness: &self.readiness,
            relations: &self.relations,
        }
    }

    fn spec(&self, relation: &RelationId) -> Option<&RelationSpec> {
        self.config.relation(relation.name())
    }

    fn mark_ready(&mut self, flag: ReadinessFlag) -> bool {
        let name = flag.to_string();
        let transitioned = self.readiness.set_ready(flag);
        if transitioned {
            self.journal.emit(Event::ReadinessReached, vec![("flag", name)]);
        }
        transitioned
    }

    /// Apply a lifecycle transition, leaving the state untouched on error.
    fn transition<F>(&mut self, relation: &RelationId, apply: F) -> CoordinationResult<()>
    where
        F: FnOnce(RelationState) -> CoordinationResult<RelationState>,
    {
        let current = self
            .relations
            .get(relation)
            .cloned()
            .ok_or_else(|| CoordinationError::unknown_relation(relation))?;
        let next = apply(current)?;
        self.relations.insert(relation.clone(), next);
        Ok(())
    }

    fn status_for(&self, blockers: &StartBlockers) -> UnitStatus {
        // No peer config yet counts as a missing relation, even while one is live.
        let peer_config_missing = blockers.missing_flags.iter().any(|flag| {
            self.config
                .relations
                .iter()
                .any(|spec| spec.acquires.as_ref() == Some(flag))
        });
        if !blockers.absent_relations.is_empty() || peer_config_missing {
            let counterpart = match self.config.role {
                NodeRole::Compute => "controller",
                NodeRole::Controller => "compute nodes",
            };
            return UnitStatus::Blocked(format!("Need relation to {}.", counterpart));
        }
        if blockers.missing_flags.contains(&ReadinessFlag::ServiceInstalled) {
            return UnitStatus::Waiting(WAITING_ON_INSTALL.to_string());
        }

        let pending: Vec<&str> = blockers
            .missing_flags
            .iter()
            .map(ReadinessFlag::as_str)
            .chain(blockers.unpublished_relations.iter().map(String::as_str))
            .collect();
        UnitStatus::Waiting(format!("Waiting on {}", pending.join(", ")))
    }

    /// Keep the status of a deferred start in step with its blockers.
    fn refresh_status(&mut self) {
        if self.start == StartState::Deferred {
            let blockers = self.gate().start_blockers();
            self.status = self.status_for(&blockers);
        }
    }

    fn reject(&mut self, event: &LifecycleEvent, err: CoordinationError) -> Outcome {
        self.rejected(event.name(), event.relation(), err.message)
    }

    fn rejected(&mut self, event: &str, relation: Option<&RelationId>, reason: String) -> Outcome {
        self.metrics.events_rejected += 1;
        let mut fields = vec![("event_kind", event.to_string()), ("reason", reason.clone())];
        if let Some(relation) = relation {
            fields.push(("relation", relation.to_string()));
        }
        self.journal.emit(Event::EventRejected, fields);
        Outcome::Rejected { reason }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn identity(&self) -> &NodeIdentity {
        self.publisher.identity()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn readiness(&self) -> &ReadinessStore {
        &self.readiness
    }

    pub fn peer_view(&self) -> &PeerView {
        &self.peers
    }

    pub fn deferrals(&self) -> &DeferralRing {
        &self.ring
    }

    pub fn relation(&self, relation: &RelationId) -> Option<&RelationState> {
        self.relations.get(relation)
    }

    pub fn relation_phase(&self, relation: &RelationId) -> Option<RelationPhase> {
        self.relations.get(relation).map(RelationState::phase)
    }

    pub fn start_state(&self) -> StartState {
        self.start
    }

    pub fn start_blockers(&self) -> StartBlockers {
        self.gate().start_blockers()
    }

    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    pub fn metrics(&self) -> &CoordinationMetrics {
        &self.metrics
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn action(&self) -> &A {
        &self.action
    }
}

fn join(flags: &[ReadinessFlag]) -> String {
    flags
        .iter()
        .map(ReadinessFlag::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
