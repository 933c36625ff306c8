//! Error types for sweep orchestration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout `parsweep-core`.
pub type Result<T> = std::result::Result<T, SweepError>;

/// Everything that can go wrong while preparing or running a sweep.
///
/// Only [`SweepError::Build`], [`SweepError::Config`] and [`SweepError::UnknownSweep`]
/// abort a whole run. Invocation and parse errors are degraded to a missing
/// measurement by the repetition aggregator.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid sweep configuration: {0}")]
    Config(String),

    #[error("unknown sweep '{name}' (available: {available})")]
    UnknownSweep { name: String, available: String },

    #[error("build failed for target '{target}':\n{diagnostic}")]
    Build { target: String, diagnostic: String },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {}s", .after.as_secs())]
    Timeout { program: String, after: Duration },

    #[error("'{program}' exited with {status}{}", stderr_suffix(.stderr))]
    NonZeroExit { program: String, status: String, stderr: String },

    #[error("no line containing '{marker}' in process output")]
    MarkerMissing { marker: String },

    #[error("malformed duration in line '{line}'")]
    MalformedDuration { line: String },

    #[error("could not provision input {}: {reason}", .path.display())]
    Provision { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(String),
}

impl SweepError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// True for failures that only cost one repetition.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. }
                | Self::Timeout { .. }
                | Self::NonZeroExit { .. }
                | Self::MarkerMissing { .. }
                | Self::MalformedDuration { .. }
        )
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() { String::new() } else { format!(": {trimmed}") }
}
