//! Error types for the render harness

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Orchestration errors. Any of these aborts the run without a report.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Fixture server failed to bind {addr}: {source}")]
    ServerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Fixture server failed: {0}")]
    Server(String),

    #[error("Fixture server is not running")]
    ServerNotRunning,

    #[error("Failed to load test group '{}': {reason}", path.display())]
    GroupLoad { path: PathBuf, reason: String },

    #[error("Invalid test declaration {group}/{test}: {reason}")]
    InvalidTest {
        group: String,
        test: String,
        reason: String,
    },

    #[error("Render task for {group}/{test} crashed: {reason}")]
    RenderCrashed {
        group: String,
        test: String,
        reason: String,
    },

    #[error("Report template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Per-test failures. These are recorded on the result, never propagated.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("timed out after {} seconds", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("render failed: {0}")]
    Failed(String),

    #[error("renderer protocol error: {0}")]
    Protocol(String),

    #[error("renderer IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("renderer JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
