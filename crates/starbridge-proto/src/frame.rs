//! Framed wire I/O.
//!
//! Frame layout: `T (1 byte) | S (signed VLQ) | B (|S| bytes)`. A
//! negative `S` marks a zlib-compressed body. A short read at any phase
//! is the normal peer-closed path and surfaces as
//! [`ProtocolError::IncompleteRead`].

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    enums::{Direction, PacketType},
    errors::{ProtocolError, Result},
    packet::Packet,
    vlq,
};

/// Read one frame and stamp it with `direction`.
///
/// The returned packet's `original` holds the exact bytes consumed (type
/// byte, size VLQ bytes, pre-decompression body); `data` holds the body
/// after decompression.
///
/// # Errors
///
/// - [`ProtocolError::IncompleteRead`] on EOF mid-frame or a zlib
///   failure.
/// - [`ProtocolError::UnknownPacketType`] for a type byte outside the
///   table.
pub async fn read_frame<R>(reader: &mut R, direction: Direction) -> Result<Packet>
where
    R: AsyncRead + Unpin,
{
    let mut type_byte = [0u8; 1];
    read_exact(reader, &mut type_byte).await?;
    let packet_type = PacketType::try_from(type_byte[0])?;

    let (signed_size, size_bytes) = vlq::read_svlq(reader).await?;
    let compressed = signed_size < 0;
    let body_len = usize::try_from(signed_size.unsigned_abs())
        .map_err(|_| ProtocolError::decode("frame size overflows usize"))?;

    let mut wire_body = vec![0u8; body_len];
    read_exact(reader, &mut wire_body).await?;

    let mut original = Vec::with_capacity(1 + size_bytes.len() + body_len);
    original.push(type_byte[0]);
    original.extend_from_slice(&size_bytes);
    original.extend_from_slice(&wire_body);

    let data = if compressed {
        Packet::decompress(&wire_body)?
    } else {
        Bytes::from(wire_body)
    };

    let mut packet =
        Packet::new(packet_type, direction, compressed, data, Bytes::from(original));
    // size carries the wire length, which differs from the body length
    // for compressed frames
    packet.size = body_len;
    Ok(packet)
}

/// Write one frame.
///
/// Emits the packet's `original` bytes, which hold `T | S | B` by
/// invariant: bit-identical input for untouched packets, and the
/// recomposed wire (flag-preserving, size re-derived) for rebuilt ones.
pub async fn write_frame<W>(writer: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&packet.original).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_exact<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    reader.read_exact(buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::IncompleteRead
        } else {
            ProtocolError::Io(e)
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{Compression, write::ZlibEncoder};
    use proptest::prelude::*;

    use super::*;

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    fn compose(type_byte: u8, body: &[u8], compressed: bool) -> Vec<u8> {
        let wire_body = if compressed {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(body).unwrap();
            enc.finish().unwrap()
        } else {
            body.to_vec()
        };
        let signed =
            if compressed { -(wire_body.len() as i64) } else { wire_body.len() as i64 };
        let mut out = vec![type_byte];
        out.extend_from_slice(&vlq::encode_svlq(signed));
        out.extend_from_slice(&wire_body);
        out
    }

    #[test]
    fn frame_recovery() {
        let wire = compose(0, &743u32.to_be_bytes(), false);
        let packet = run(async {
            let mut cursor = wire.as_slice();
            read_frame(&mut cursor, Direction::ToServer).await.unwrap()
        });
        assert_eq!(packet.packet_type, PacketType::ProtocolRequest);
        assert!(!packet.compressed);
        assert_eq!(packet.data.as_ref(), &743u32.to_be_bytes());
        assert_eq!(packet.original.as_ref(), wire.as_slice());
    }

    #[test]
    fn compressed_frame_recovery() {
        let body: Vec<u8> = (0..200u16).map(|i| (i % 7) as u8).collect();
        let wire = compose(4, &body, true);
        let packet = run(async {
            let mut cursor = wire.as_slice();
            read_frame(&mut cursor, Direction::ToClient).await.unwrap()
        });
        assert!(packet.compressed);
        assert_eq!(packet.data.as_ref(), body.as_slice());
        // original keeps the pre-decompression bytes
        assert_eq!(packet.original.as_ref(), wire.as_slice());
    }

    #[test]
    fn truncation_at_every_byte_is_incomplete() {
        let wire = compose(6, b"hello chat", false);
        for cut in 0..wire.len() {
            let truncated = &wire[..cut];
            let err = run(async {
                let mut cursor = truncated;
                read_frame(&mut cursor, Direction::ToClient).await.unwrap_err()
            });
            assert!(
                matches!(err, ProtocolError::IncompleteRead),
                "cut at {cut} gave {err:?}"
            );
        }
    }

    #[test]
    fn unknown_type_byte_rejected() {
        let wire = compose(200, b"", false);
        let err = run(async {
            let mut cursor = wire.as_slice();
            read_frame(&mut cursor, Direction::ToClient).await.unwrap_err()
        });
        assert!(matches!(err, ProtocolError::UnknownPacketType(200)));
    }

    #[test]
    fn corrupt_zlib_is_incomplete() {
        // negative size with a body that is not a zlib stream
        let mut wire = vec![4u8];
        wire.extend_from_slice(&vlq::encode_svlq(-4));
        wire.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let err = run(async {
            let mut cursor = wire.as_slice();
            read_frame(&mut cursor, Direction::ToClient).await.unwrap_err()
        });
        assert!(matches!(err, ProtocolError::IncompleteRead));
    }

    #[test]
    fn write_emits_original_bytes() {
        let wire = compose(17, b"\x05/help\x00", false);
        let (packet, mut out) = run(async {
            let mut cursor = wire.as_slice();
            let packet = read_frame(&mut cursor, Direction::ToServer).await.unwrap();
            let mut out = Vec::new();
            write_frame(&mut out, &packet).await.unwrap();
            (packet, out)
        });
        assert_eq!(out, wire);
        assert_eq!(packet.size, 7);
    }

    proptest! {
        #[test]
        fn random_frames_round_trip(
            type_byte in 0u8..=65,
            body in prop::collection::vec(any::<u8>(), 0..512),
            compressed in any::<bool>(),
        ) {
            let wire = compose(type_byte, &body, compressed);
            let packet = run(async {
                let mut cursor = wire.as_slice();
                read_frame(&mut cursor, Direction::ToServer).await.unwrap()
            });
            prop_assert_eq!(packet.packet_type.to_u8(), type_byte);
            prop_assert_eq!(packet.compressed, compressed);
            prop_assert_eq!(packet.data.as_ref(), body.as_slice());
            prop_assert_eq!(packet.original.as_ref(), wire.as_slice());
        }
    }
}
