//! Server error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while running the proxy.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration problem (missing file, invalid JSON, bad paths).
    ///
    /// Fatal at startup; fix the configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file was just created from defaults.
    ///
    /// The operator is expected to edit it before the next start.
    #[error("wrote default configuration to {0}; edit it before running again")]
    FirstRun(String),

    /// Transport or filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire or structured codec failure.
    #[error(transparent)]
    Protocol(#[from] starbridge_proto::ProtocolError),

    /// Persistent store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
