//! Wire and structured codecs for the Starbridge proxy.
//!
//! The protocol frames messages as `T (1 byte) | S (signed VLQ) | B (|S|
//! bytes)`, with a negative `S` marking a zlib-compressed body. This crate
//! owns everything about those bytes:
//!
//! - [`frame`]: async frame read/write with exact original-byte capture
//! - [`vlq`]: base-128 variable-length quantities, signed and unsigned
//! - [`codec`]: the per-type registry of structured decoders/encoders
//! - [`records`]: composite wire records (chat header, warp action, ...)
//! - [`Packet`]: the per-frame object carrying raw, parsed and edited
//!   forms at once
//!
//! Relay, hooks and plugins live upstack; nothing here does I/O beyond a
//! borrowed reader/writer.

pub mod codec;
mod enums;
pub mod errors;
mod frame;
mod packet;
pub mod reader;
pub mod records;
mod value;
pub mod vlq;
pub mod writer;

pub use enums::{
    ChatReceiveMode, ChatSendMode, ConnectionState, Direction, PacketType, SystemLocationKind,
    WarpAliasKind, WarpKind, WarpWorldKind,
};
pub use errors::{ProtocolError, Result};
pub use frame::{read_frame, write_frame};
pub use packet::Packet;
pub use reader::PacketReader;
pub use value::{Value, ValueMap};
pub use writer::PacketWriter;
