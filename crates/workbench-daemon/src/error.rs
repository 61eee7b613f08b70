//! Error types for the workbench daemon

use thiserror::Error;
use workbench_sdk::RouterError;

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Errors that can occur in daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Lock file could not be read or written
    #[error("Lock error: {0}")]
    Lock(String),

    /// Another live daemon owns the workspace
    #[error("Daemon already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// A line on the wire was not a parseable message
    #[error("Framing error: {0}")]
    Framing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection-level failures (refused, closed mid-response)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The daemon answered with an error envelope
    #[error("{message}")]
    Remote { kind: String, message: String },

    /// Routing or handler errors
    #[error(transparent)]
    Router(#[from] RouterError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
