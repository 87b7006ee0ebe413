//! CLI module for bootgate
//!
//! Drives one node's coordination engine from the command line:
//! - replay: restore state, apply a step script, store state
//! - status: print a stored status report

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    replay, run, run_command, status, RelationReport, ScriptStep, StatusReport, StepReport,
};
pub use errors::{CliError, CliResult};
