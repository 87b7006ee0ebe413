//! CLI-specific error types
//!
//! All CLI errors are fatal: `main` prints them and exits non-zero.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::coordination::SnapshotError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    State(#[from] SnapshotError),

    #[error("failed to read script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid script: {0}")]
    InvalidScript(#[source] serde_json::Error),

    #[error("no state stored at {0}")]
    NoState(PathBuf),

    #[error("output error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "BOOTGATE_CLI_CONFIG_ERROR",
            Self::State(_) | Self::NoState(_) => "BOOTGATE_CLI_STATE_ERROR",
            Self::Script { .. } | Self::InvalidScript(_) => "BOOTGATE_CLI_SCRIPT_ERROR",
            Self::Io(_) | Self::Json(_) => "BOOTGATE_CLI_IO_ERROR",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
