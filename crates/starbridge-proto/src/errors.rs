//! Protocol error types.

use thiserror::Error;

use crate::PacketType;

/// Convenience alias for protocol-level results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised by the wire and structured codecs.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the connection mid-frame (or a compressed body
    /// failed to inflate, which is indistinguishable from truncation).
    ///
    /// This is the normal end-of-stream path and terminates the session.
    #[error("incomplete read")]
    IncompleteRead,

    /// The frame's type byte is outside the known packet-type ordinals.
    #[error("unknown packet type {0:#04x}")]
    UnknownPacketType(u8),

    /// A tagged union carried a discriminant outside its defined range.
    #[error("unknown {kind} tag {tag}")]
    UnknownTag {
        /// Which union the tag belongs to ("json", "warp action", ...).
        kind: &'static str,
        /// The offending discriminant byte.
        tag: u8,
    },

    /// The body could not be decoded into its structured form.
    ///
    /// The raw bytes are still forwardable; the relay logs this at debug
    /// and carries on with an empty parsed value.
    #[error("decode error: {0}")]
    Decode(String),

    /// A rebuild was requested for a type with no registered encoder.
    #[error("no encoder registered for {0:?}")]
    NotImplemented(PacketType),

    /// A VLQ ran past the 64-bit range.
    #[error("vlq overflow")]
    VlqOverflow,

    /// Underlying transport error other than clean truncation.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Shorthand for a [`ProtocolError::Decode`] with a formatted message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
