//! Demand-driven parse and rebuild of packet bodies.

use bytes::Bytes;
use starbridge_proto::{
    PacketReader, Packet, ProtocolError, ValueMap, codec,
};

use crate::cache::ParseCache;

/// Populate `packet.parsed`, consulting the shared cache.
///
/// Types without a decoder get the empty mapping. A decode failure also
/// yields the empty mapping (logged at debug); the original bytes remain
/// forwardable either way. Successful parses are cached, trailing bytes
/// included.
pub fn parse_packet(packet: &mut Packet, cache: &ParseCache) {
    if packet.parsed.is_some() {
        return;
    }
    let Some(decode) = codec::decoder(packet.packet_type) else {
        packet.parsed = Some(ValueMap::new());
        return;
    };

    if let Some(values) = cache.fetch(&packet.original) {
        packet.parsed = Some(values);
        return;
    }

    let data = packet.data.clone();
    let mut reader = PacketReader::new(&data);
    match decode(&mut reader, packet.direction) {
        Ok(values) => {
            if !reader.is_empty() {
                tracing::debug!(
                    packet_type = ?packet.packet_type,
                    remaining = reader.remaining(),
                    "decoder left trailing bytes, keeping partial parse"
                );
            }
            cache.store(packet.original.clone(), values.clone());
            packet.parsed = Some(values);
        },
        Err(err) => {
            tracing::debug!(
                packet_type = ?packet.packet_type,
                error = %err,
                "body could not be decoded, forwarding raw"
            );
            packet.parsed = Some(ValueMap::new());
        },
    }
}

/// Merge pending edits into the parsed value, re-encode the body and
/// recompose the wire bytes.
///
/// # Errors
///
/// [`ProtocolError::NotImplemented`] when the type has no encoder; a
/// plugin must not edit a type that cannot be rebuilt.
pub fn build_packet(packet: &mut Packet) -> Result<(), ProtocolError> {
    let encode = codec::encoder(packet.packet_type)
        .ok_or(ProtocolError::NotImplemented(packet.packet_type))?;

    let mut values = packet.parsed.take().unwrap_or_default();
    for (key, value) in std::mem::take(&mut packet.edits) {
        values.insert(key, value);
    }

    let body = encode(&values, packet.direction)?;
    packet.parsed = Some(values);
    packet.data = Bytes::from(body);
    packet.rebuild_wire()
}

#[cfg(test)]
mod tests {
    use starbridge_proto::{Direction, PacketType, Value, read_frame};

    use super::*;

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(fut)
    }

    fn protocol_request_packet() -> Packet {
        let mut values = ValueMap::new();
        values.insert("request_protocol_version".to_owned(), Value::Uint(743));
        let built =
            Packet::from_values(PacketType::ProtocolRequest, Direction::ToServer, values)
                .unwrap();
        // round through the frame layer so parsed starts out empty
        run(async {
            let mut cursor = built.original.as_ref();
            read_frame(&mut cursor, Direction::ToServer).await.unwrap()
        })
    }

    #[test]
    fn parse_uses_registered_decoder() {
        let cache = ParseCache::new();
        let mut packet = protocol_request_packet();
        parse_packet(&mut packet, &cache);
        let parsed = packet.parsed.as_ref().unwrap();
        assert_eq!(
            parsed.get("request_protocol_version").and_then(Value::as_u64),
            Some(743)
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unregistered_type_parses_to_empty_map() {
        let cache = ParseCache::new();
        let mut packet = Packet::new(
            PacketType::TileUpdate,
            Direction::ToClient,
            false,
            Bytes::from_static(b"\x01\x02\x03"),
            Bytes::from_static(b"\x1a\x06\x01\x02\x03"),
        );
        parse_packet(&mut packet, &cache);
        assert!(packet.parsed.as_ref().unwrap().is_empty());
        // nothing cached for unregistered types
        assert!(cache.is_empty());
    }

    #[test]
    fn malformed_body_parses_to_empty_map() {
        let cache = ParseCache::new();
        // ProtocolRequest wants 4 bytes; give it one
        let mut packet = Packet::new(
            PacketType::ProtocolRequest,
            Direction::ToServer,
            false,
            Bytes::from_static(b"\x01"),
            Bytes::from_static(b"\x00\x02\x01"),
        );
        parse_packet(&mut packet, &cache);
        assert!(packet.parsed.as_ref().unwrap().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn second_parse_hits_cache_with_independent_copy() {
        let cache = ParseCache::new();
        let mut first = protocol_request_packet();
        parse_packet(&mut first, &cache);
        first
            .parsed
            .as_mut()
            .unwrap()
            .insert("request_protocol_version".to_owned(), Value::Uint(1));

        let mut second = protocol_request_packet();
        parse_packet(&mut second, &cache);
        assert_eq!(
            second.parsed.as_ref().unwrap().get("request_protocol_version"),
            Some(&Value::Uint(743))
        );
    }

    #[test]
    fn build_applies_edits_and_recomposes_wire() {
        let cache = ParseCache::new();
        let mut packet = protocol_request_packet();
        parse_packet(&mut packet, &cache);
        packet.edits.insert("request_protocol_version".to_owned(), Value::Uint(800));
        build_packet(&mut packet).unwrap();

        let reparsed = run(async {
            let mut cursor = packet.original.as_ref();
            read_frame(&mut cursor, Direction::ToServer).await.unwrap()
        });
        assert_eq!(reparsed.data.as_ref(), &800u32.to_be_bytes());
        assert!(packet.edits.is_empty());
    }

    #[test]
    fn build_without_encoder_is_not_implemented() {
        let mut packet = Packet::new(
            PacketType::WorldStart,
            Direction::ToClient,
            false,
            Bytes::new(),
            Bytes::new(),
        );
        packet.edits.insert("client_id".to_owned(), Value::Uint(1));
        let err = build_packet(&mut packet).unwrap_err();
        assert!(matches!(err, ProtocolError::NotImplemented(PacketType::WorldStart)));
    }
}
