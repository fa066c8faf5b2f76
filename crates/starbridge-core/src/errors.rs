//! Error types for hooks, plugins and commands.

use thiserror::Error;

/// Errors surfaced by hook handlers and session operations.
///
/// The dispatcher never lets these escape a hook chain; they are logged
/// with the offending plugin's name and the chain continues.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Codec failure while a handler built or injected a frame.
    #[error(transparent)]
    Protocol(#[from] starbridge_proto::ProtocolError),

    /// Anything else a plugin wants to report.
    #[error("{0}")]
    Other(String),
}

impl From<String> for PluginError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}

impl From<&str> for PluginError {
    fn from(msg: &str) -> Self {
        Self::Other(msg.to_owned())
    }
}

/// Errors a command handler can raise; each maps to a fixed reply policy.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Bad arguments. The reply carries the command's syntax template.
    #[error("{0}")]
    Syntax(String),

    /// The player lacks a required permission. The reply is a generic
    /// denial plus this detail.
    #[error("{0}")]
    PermissionDenied(String),

    /// Unexpected failure. Logged; the player gets a generic reply.
    #[error("{0}")]
    Failure(String),
}

impl From<PluginError> for CommandError {
    fn from(err: PluginError) -> Self {
        Self::Failure(err.to_string())
    }
}
