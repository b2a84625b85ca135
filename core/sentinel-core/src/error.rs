//! Error types for sentinel-core operations.
//!
//! Most of the library degrades instead of failing (see the crate docs);
//! these errors cover the operations a caller must hear about: writing the
//! state file, loading configuration, and running commands.

use std::path::PathBuf;

/// All errors that can occur in sentinel-core operations.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // State Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("State file write failed: {path}: {details}")]
    StateWriteFailed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Heartbeat Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Heartbeat client setup failed: {0}")]
    HeartbeatClient(String),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Command Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command '{command}' failed: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Command '{command}' timed out after {seconds}s.")]
    CommandTimeout { command: String, seconds: u64 },
}

impl SentinelError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SentinelError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        SentinelError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using SentinelError.
pub type Result<T> = std::result::Result<T, SentinelError>;

impl From<SentinelError> for String {
    fn from(err: SentinelError) -> String {
        err.to_string()
    }
}
