//! CLI command implementations
//!
//! The host runs one process per lifecycle event. `replay` stands in for
//! that host: it restores the engine from the state file, applies the
//! steps of a script in order, and stores the state again. Peer
//! publications in the script land on an in-memory bus that lives only
//! for the invocation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::NodeConfig;
use crate::coordination::{
    Bus, CoordinationEngine, DeferredEvent, EngineSnapshot, LifecycleEvent, MemoryBus, NodeIdentity,
    Outcome, PeerEntry, RawRecord, ReadinessFlag, RecordingAction, RelationId,
    RelationLifecycleState, RelationPhase, StartState, UnitStatus,
};
use crate::observability::{CoordinationMetrics, Logger};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_script, write_response};

/// One step of a replay script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum ScriptStep {
    /// Deliver a lifecycle event
    Event { event: LifecycleEvent },
    /// Signal a local readiness flag
    Ready { flag: ReadinessFlag },
    /// Place a peer's record on the bus; a `relation-changed` step
    /// delivers it
    PeerPublish {
        relation: RelationId,
        peer: NodeIdentity,
        record: RawRecord,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationReport {
    pub relation: RelationId,
    pub lifecycle: RelationLifecycleState,
    pub phase: RelationPhase,
    pub peers: Vec<NodeIdentity>,
}

/// What an operator needs to see about one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub node: NodeIdentity,
    pub status: UnitStatus,
    pub start: StartState,
    pub readiness: Vec<ReadinessFlag>,
    pub relations: Vec<RelationReport>,
    pub deferred: Vec<DeferredEvent>,
    pub peers: Vec<PeerEntry>,
    pub metrics: CoordinationMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepReport>,
}

impl StatusReport {
    pub fn from_snapshot(snapshot: &EngineSnapshot) -> Self {
        Self {
            node: snapshot.node.clone(),
            status: snapshot.status.clone(),
            start: snapshot.start,
            readiness: snapshot.readiness.iter().cloned().collect(),
            relations: snapshot
                .relations
                .iter()
                .map(|entry| RelationReport {
                    relation: entry.relation.clone(),
                    lifecycle: entry.state.lifecycle(),
                    phase: entry.state.phase(),
                    peers: entry.state.peers().cloned().collect(),
                })
                .collect(),
            deferred: snapshot.deferred.iter().cloned().collect(),
            peers: snapshot.peers.clone(),
            metrics: snapshot.metrics.clone(),
            steps: Vec::new(),
        }
    }
}

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let report = match cmd {
        Command::Replay {
            config,
            script,
            state,
        } => replay(&config, &script, state.as_deref())?,
        Command::Status { state } => status(&state)?,
    };
    write_response(serde_json::to_value(&report)?)
}

/// Apply a step script to the node's engine.
///
/// With a state path, the engine is restored from it when present and
/// written back afterwards.
pub fn replay(
    config_path: &Path,
    script_path: &Path,
    state_path: Option<&Path>,
) -> CliResult<StatusReport> {
    let config = NodeConfig::load(config_path)?;
    Logger::set_min_severity(config.log_level);

    let steps: Vec<ScriptStep> = read_script(script_path)?;

    let previous = match state_path {
        Some(path) => EngineSnapshot::load_optional(path)?,
        None => None,
    };
    let mut engine = match previous {
        Some(snapshot) => {
            CoordinationEngine::restore(config, snapshot, MemoryBus::new(), RecordingAction::new())?
        }
        None => CoordinationEngine::new(config, MemoryBus::new(), RecordingAction::new()),
    };

    let mut reports = Vec::with_capacity(steps.len());
    for step in steps {
        reports.push(apply(&mut engine, step));
    }

    let snapshot = engine.snapshot();
    if let Some(path) = state_path {
        snapshot.save(path)?;
    }

    let mut report = StatusReport::from_snapshot(&snapshot);
    report.steps = reports;
    Ok(report)
}

/// Report stored in a state file.
pub fn status(state_path: &Path) -> CliResult<StatusReport> {
    match EngineSnapshot::load_optional(state_path)? {
        Some(snapshot) => Ok(StatusReport::from_snapshot(&snapshot)),
        None => Err(CliError::NoState(state_path.to_path_buf())),
    }
}

fn apply(engine: &mut CoordinationEngine<MemoryBus, RecordingAction>, step: ScriptStep) -> StepReport {
    match step {
        ScriptStep::Event { event } => {
            let name = event.name().to_string();
            let (outcome, detail) = match engine.handle(event) {
                Outcome::Completed => ("completed", None),
                Outcome::Deferred { id } => ("deferred", Some(id.to_string())),
                Outcome::Rejected { reason } => ("rejected", Some(reason)),
            };
            StepReport {
                step: name,
                outcome: outcome.to_string(),
                detail,
            }
        }
        ScriptStep::Ready { flag } => {
            let detail = Some(flag.to_string());
            let outcome = if engine.set_ready(flag) {
                "transitioned"
            } else {
                "already-ready"
            };
            StepReport {
                step: "ready".to_string(),
                outcome: outcome.to_string(),
                detail,
            }
        }
        ScriptStep::PeerPublish {
            relation,
            peer,
            record,
        } => {
            engine.bus_mut().publish(&relation, &peer, record);
            StepReport {
                step: "peer-publish".to_string(),
                outcome: "written".to_string(),
                detail: Some(format!("{} {}", relation, peer)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: Value) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        path
    }

    fn parse_script(value: Value) -> CliResult<Vec<ScriptStep>> {
        serde_json::from_value(value).map_err(CliError::InvalidScript)
    }

    fn config(dir: &TempDir) -> std::path::PathBuf {
        write(dir, "config.json", json!({"node_name": "node-a", "log_level": "error"}))
    }

    #[test]
    fn test_script_step_shapes() {
        let steps = parse_script(json!([
            {"step": "event", "event": {"kind": "install"}},
            {"step": "ready", "flag": "serviceInstalled"},
            {"step": "peer-publish", "relation": "slurm-cluster:1", "peer": "ctl",
             "record": {"hostname": "ctl", "port": "6817"}}
        ]))
        .unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(
            steps[1],
            ScriptStep::Ready {
                flag: ReadinessFlag::ServiceInstalled
            }
        );
    }

    #[test]
    fn test_replay_carries_state_between_invocations() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let state = dir.path().join("state.json");

        let first = write(
            &dir,
            "first.json",
            json!([{"step": "event", "event": {"kind": "relation-created", "relation": "slurm-cluster:1"}}]),
        );
        let report = replay(&config, &first, Some(&state)).unwrap();
        assert_eq!(report.deferred.len(), 1);
        assert_eq!(report.steps[0].outcome, "deferred");
        assert_eq!(report.relations[0].phase, RelationPhase::AwaitingLocalReadiness);

        let second = write(
            &dir,
            "second.json",
            json!([{"step": "ready", "flag": "serviceInstalled"}]),
        );
        let report = replay(&config, &second, Some(&state)).unwrap();
        assert!(report.deferred.is_empty());
        assert_eq!(report.relations[0].phase, RelationPhase::Published);
        assert_eq!(report.steps[0].outcome, "transitioned");

        let stored = status(&state).unwrap();
        assert_eq!(stored.relations, report.relations);
        assert!(stored.steps.is_empty());
    }

    #[test]
    fn test_status_without_state_fails() {
        let dir = TempDir::new().unwrap();
        let err = status(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CliError::NoState(_)));
    }

    #[test]
    fn test_invalid_script_reported() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let script = write(&dir, "bad.json", json!([{"step": "dance"}]));
        let err = replay(&config, &script, None).unwrap_err();
        assert_eq!(err.code(), "BOOTGATE_CLI_SCRIPT_ERROR");
    }
}
