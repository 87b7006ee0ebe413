//! CLI argument definitions using clap
//!
//! Commands:
//! - bootgate replay --config <path> --script <path> [--state <path>]
//! - bootgate status --state <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bootgate - relation coordination for cluster node bootstrap
#[derive(Parser, Debug)]
#[command(name = "bootgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a script of lifecycle events against the node's engine
    Replay {
        /// Path to configuration file
        #[arg(long, default_value = "./bootgate.json")]
        config: PathBuf,

        /// Path to the JSON step script
        #[arg(long)]
        script: PathBuf,

        /// Engine state carried between invocations
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Print the status report stored in a state file
    Status {
        /// Engine state file written by `replay`
        #[arg(long)]
        state: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
