//! The per-frame message object.
//!
//! A `Packet` carries every form of one frame at once: the exact wire
//! bytes it arrived as, the (decompressed) body, the lazily-parsed value
//! map, and any pending edits. It never outlives one dispatch cycle on
//! the relay.

use std::{
    hash::{Hash, Hasher},
    io::{Read, Write},
};

use bytes::Bytes;
use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};

use crate::{
    codec,
    enums::{Direction, PacketType},
    errors::{ProtocolError, Result},
    value::ValueMap,
    vlq,
};

/// One framed message in flight through the relay.
///
/// # Invariants
///
/// - For an unmodified packet, `original` is bit-identical to what was
///   read off the wire.
/// - After a parse-and-mutate cycle, [`Packet::rebuild_wire`] refreshes
///   `original` from `data`, preserving the compressed flag and
///   re-deriving the size.
/// - Equality and hashing are defined over `original`, which is what the
///   parse cache keys on.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Wire type tag.
    pub packet_type: PacketType,
    /// Which peer this frame is headed to.
    pub direction: Direction,
    /// Whether the wire body is zlib-compressed.
    pub compressed: bool,
    /// Absolute value of the size VLQ as read; re-derived from the body
    /// on rebuild.
    pub size: usize,
    /// Body bytes, post-decompression.
    pub data: Bytes,
    /// Exact wire bytes: type byte + size VLQ + pre-decompression body.
    pub original: Bytes,
    /// Structured form; `None` until a decoder ran.
    pub parsed: Option<ValueMap>,
    /// Pending edits merged over `parsed` before a rebuild.
    pub edits: ValueMap,
}

impl Packet {
    /// Assemble a packet from frame-read pieces.
    pub fn new(
        packet_type: PacketType,
        direction: Direction,
        compressed: bool,
        data: Bytes,
        original: Bytes,
    ) -> Self {
        Self {
            packet_type,
            direction,
            compressed,
            size: data.len(),
            data,
            original,
            parsed: None,
            edits: ValueMap::new(),
        }
    }

    /// Build a fresh, uncompressed packet from structured values through
    /// the registered encoder. Used for injected frames.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::NotImplemented`] when the type has no encoder.
    pub fn from_values(
        packet_type: PacketType,
        direction: Direction,
        values: ValueMap,
    ) -> Result<Self> {
        let encode = codec::encoder(packet_type)
            .ok_or(ProtocolError::NotImplemented(packet_type))?;
        let body = encode(&values, direction)?;
        let mut packet = Self {
            packet_type,
            direction,
            compressed: false,
            size: body.len(),
            data: Bytes::from(body),
            original: Bytes::new(),
            parsed: Some(values),
            edits: ValueMap::new(),
        };
        packet.rebuild_wire()?;
        Ok(packet)
    }

    /// Recompose `original` from the current body, compressing when the
    /// compressed flag is set. The size VLQ sign follows the flag.
    pub fn rebuild_wire(&mut self) -> Result<()> {
        self.size = self.data.len();
        let wire_body: Bytes = if self.compressed {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&self.data)?;
            Bytes::from(encoder.finish()?)
        } else {
            self.data.clone()
        };

        let signed_size = if self.compressed {
            -(wire_body.len() as i64)
        } else {
            wire_body.len() as i64
        };

        let mut wire = Vec::with_capacity(1 + 10 + wire_body.len());
        wire.push(self.packet_type.to_u8());
        wire.extend_from_slice(&vlq::encode_svlq(signed_size));
        wire.extend_from_slice(&wire_body);
        self.original = Bytes::from(wire);
        Ok(())
    }

    /// Inflate a compressed wire body. A zlib failure is surfaced as an
    /// incomplete read, which the relay treats as end-of-stream.
    pub(crate) fn decompress(raw: &[u8]) -> Result<Bytes> {
        let mut decoder = ZlibDecoder::new(raw);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(|_| ProtocolError::IncompleteRead)?;
        Ok(Bytes::from(out))
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.original == other.original
    }
}

impl Eq for Packet {}

impl Hash for Packet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.original.hash(state);
    }
}
