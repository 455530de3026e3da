//! Error types shared across the crate.
//!
//! Two failure classes end a run: [`ConfigError`] (raised before any model
//! call) and [`CrewError::Stage`] (a completion or tool call that failed after
//! retries and timeouts). Pricing failures never surface here; the cost
//! tracker swallows them.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;

/// Problems with the role configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("agent '{0}' not found in config")]
    MissingRole(String),

    #[error("agent '{role_key}' is missing required field '{field}'")]
    MissingField {
        role_key: String,
        field: &'static str,
    },
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum CrewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The chat client could not be constructed.
    #[error("client setup failed: {0}")]
    Client(String),

    /// A model or tool call failed irrecoverably while running a stage.
    #[error("{stage} stage failed: {message}")]
    Stage { stage: Stage, message: String },

    #[error("failed to write artifact '{path}': {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to access task file '{path}': {source}")]
    TaskFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to archive request '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CrewError {
    /// The stage that failed, if the error came from a running stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            CrewError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
