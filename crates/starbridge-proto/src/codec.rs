//! Per-type structured codec registry.
//!
//! Maps each packet type to an optional decoder and an optional encoder;
//! types absent from both tables forward verbatim and cost nothing.
//! Decoding is demand-driven: the dispatcher only asks for it when a hook
//! is registered for the type. Field names and read order follow the wire
//! layouts exactly.

use crate::{
    enums::{Direction, PacketType},
    errors::{ProtocolError, Result},
    reader::PacketReader,
    records,
    value::{Value, ValueMap},
    writer::PacketWriter,
};

/// Decoder signature: body cursor + direction to a field map.
pub type DecodeFn = fn(&mut PacketReader<'_>, Direction) -> Result<ValueMap>;

/// Encoder signature: field map + direction to body bytes.
pub type EncodeFn = fn(&ValueMap, Direction) -> Result<Vec<u8>>;

/// Decoder for a packet type, if one is registered.
pub fn decoder(packet_type: PacketType) -> Option<DecodeFn> {
    match packet_type {
        PacketType::ProtocolRequest => Some(decode_protocol_request),
        PacketType::ProtocolResponse => Some(decode_protocol_response),
        PacketType::ServerDisconnect => Some(decode_server_disconnect),
        PacketType::ConnectSuccess => Some(decode_connect_success),
        PacketType::ConnectFailure => Some(decode_connect_failure),
        PacketType::HandshakeChallenge => Some(decode_handshake_challenge),
        PacketType::HandshakeResponse => Some(decode_handshake_response),
        PacketType::ChatReceived => Some(decode_chat_received),
        PacketType::ChatSent => Some(decode_chat_sent),
        PacketType::UniverseTimeUpdate => Some(decode_universe_time_update),
        PacketType::PlayerWarp => Some(decode_player_warp),
        PacketType::PlayerWarpResult => Some(decode_player_warp_result),
        PacketType::FlyShip => Some(decode_fly_ship),
        PacketType::GiveItem => Some(decode_give_item),
        PacketType::StepUpdate => Some(decode_step_update),
        PacketType::ClientConnect => Some(decode_client_connect),
        PacketType::WorldStart => Some(decode_world_start),
        PacketType::ClientContextUpdate => Some(decode_client_context_update),
        _ => None,
    }
}

/// Encoder for a packet type, if one is registered.
///
/// CLIENT_CONNECT, WORLD_START and CLIENT_CONTEXT_UPDATE stay decode-only:
/// their bodies carry opaque stretches that cannot be recomposed.
pub fn encoder(packet_type: PacketType) -> Option<EncodeFn> {
    match packet_type {
        PacketType::ProtocolRequest => Some(encode_protocol_request),
        PacketType::ProtocolResponse => Some(encode_protocol_response),
        PacketType::ServerDisconnect => Some(encode_server_disconnect),
        PacketType::ConnectSuccess => Some(encode_connect_success),
        PacketType::ConnectFailure => Some(encode_connect_failure),
        PacketType::HandshakeChallenge => Some(encode_handshake_challenge),
        PacketType::HandshakeResponse => Some(encode_handshake_response),
        PacketType::ChatReceived => Some(encode_chat_received),
        PacketType::ChatSent => Some(encode_chat_sent),
        PacketType::PlayerWarp => Some(encode_player_warp),
        PacketType::PlayerWarpResult => Some(encode_player_warp_result),
        PacketType::FlyShip => Some(encode_fly_ship),
        PacketType::GiveItem => Some(encode_give_item),
        PacketType::StepUpdate => Some(encode_step_update),
        _ => None,
    }
}

// Encode-side field accessors. Decode never uses these; a missing or
// mistyped field here means a plugin supplied bad edits.

fn field<'v>(map: &'v ValueMap, key: &str) -> Result<&'v Value> {
    map.get(key).ok_or_else(|| ProtocolError::decode(format!("missing field {key:?}")))
}

fn field_str<'v>(map: &'v ValueMap, key: &str) -> Result<&'v str> {
    field(map, key)?
        .as_str()
        .ok_or_else(|| ProtocolError::decode(format!("field {key:?} must be a string")))
}

fn field_bool(map: &ValueMap, key: &str) -> Result<bool> {
    field(map, key)?
        .as_bool()
        .ok_or_else(|| ProtocolError::decode(format!("field {key:?} must be a bool")))
}

fn field_u64(map: &ValueMap, key: &str) -> Result<u64> {
    field(map, key)?
        .as_u64()
        .ok_or_else(|| ProtocolError::decode(format!("field {key:?} must be an integer")))
}

fn field_i64(map: &ValueMap, key: &str) -> Result<i64> {
    field(map, key)?
        .as_i64()
        .ok_or_else(|| ProtocolError::decode(format!("field {key:?} must be an integer")))
}

fn field_bytes<'v>(map: &'v ValueMap, key: &str) -> Result<&'v [u8]> {
    field(map, key)?
        .as_bytes()
        .map(|b| b.as_ref())
        .ok_or_else(|| ProtocolError::decode(format!("field {key:?} must be bytes")))
}

fn decode_protocol_request(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("request_protocol_version".to_owned(), r.read_u32()?.into());
    Ok(out)
}

fn encode_protocol_request(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_u32(field_u64(map, "request_protocol_version")? as u32);
    Ok(w.into_inner())
}

fn decode_protocol_response(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("allowed".to_owned(), r.read_bool()?.into());
    Ok(out)
}

fn encode_protocol_response(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_bool(field_bool(map, "allowed")?);
    Ok(w.into_inner())
}

fn decode_server_disconnect(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("reason".to_owned(), r.read_utf8()?.into());
    Ok(out)
}

fn encode_server_disconnect(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_utf8(field_str(map, "reason")?);
    Ok(w.into_inner())
}

fn decode_connect_success(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("client_id".to_owned(), r.read_vlq()?.into());
    out.insert("server_uuid".to_owned(), r.read_uuid()?.into());
    out.insert("planet_orbital_levels".to_owned(), r.read_i32()?.into());
    out.insert("satellite_orbital_levels".to_owned(), r.read_i32()?.into());
    out.insert("chunk_size".to_owned(), r.read_i32()?.into());
    out.insert("xy_min".to_owned(), r.read_i32()?.into());
    out.insert("xy_max".to_owned(), r.read_i32()?.into());
    out.insert("z_min".to_owned(), r.read_i32()?.into());
    out.insert("z_max".to_owned(), r.read_i32()?.into());
    Ok(out)
}

fn encode_connect_success(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_vlq(field_u64(map, "client_id")?);
    w.write_uuid(field_str(map, "server_uuid")?)?;
    for key in
        ["planet_orbital_levels", "satellite_orbital_levels", "chunk_size", "xy_min", "xy_max", "z_min", "z_max"]
    {
        w.write_i32(field_i64(map, key)? as i32);
    }
    Ok(w.into_inner())
}

fn decode_connect_failure(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("reason".to_owned(), r.read_utf8()?.into());
    Ok(out)
}

fn encode_connect_failure(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_utf8(field_str(map, "reason")?);
    Ok(w.into_inner())
}

fn decode_handshake_challenge(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("challenge".to_owned(), r.read_byte_array()?.into());
    Ok(out)
}

fn encode_handshake_challenge(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_byte_array(field_bytes(map, "challenge")?);
    Ok(w.into_inner())
}

fn decode_handshake_response(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("response".to_owned(), r.read_byte_array()?.into());
    Ok(out)
}

fn encode_handshake_response(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_byte_array(field_bytes(map, "response")?);
    Ok(w.into_inner())
}

fn decode_chat_received(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("header".to_owned(), records::read_chat_header(r)?);
    out.insert("name".to_owned(), r.read_utf8()?.into());
    out.insert("junk".to_owned(), r.read_u8()?.into());
    out.insert("message".to_owned(), r.read_utf8()?.into());
    Ok(out)
}

fn encode_chat_received(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    records::write_chat_header(&mut w, field(map, "header")?)?;
    w.write_utf8(field_str(map, "name")?);
    w.write_u8(map.get("junk").and_then(Value::as_u64).unwrap_or(0) as u8);
    w.write_utf8(field_str(map, "message")?);
    Ok(w.into_inner())
}

fn decode_chat_sent(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("text".to_owned(), r.read_utf8()?.into());
    out.insert("send_mode".to_owned(), r.read_u8()?.into());
    Ok(out)
}

fn encode_chat_sent(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_utf8(field_str(map, "text")?);
    w.write_u8(field_u64(map, "send_mode")? as u8);
    Ok(w.into_inner())
}

fn decode_universe_time_update(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("timestamp".to_owned(), r.read_f64()?.into());
    Ok(out)
}

fn decode_player_warp(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("warp_action".to_owned(), records::read_warp_action(r)?);
    out.insert("deploy".to_owned(), r.read_bool()?.into());
    Ok(out)
}

fn encode_player_warp(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    records::write_warp_action(&mut w, field(map, "warp_action")?)?;
    w.write_bool(field_bool(map, "deploy")?);
    Ok(w.into_inner())
}

fn decode_player_warp_result(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("success".to_owned(), r.read_bool()?.into());
    out.insert("warp_action".to_owned(), records::read_warp_action(r)?);
    out.insert("warp_action_invalid".to_owned(), r.read_bool()?.into());
    Ok(out)
}

fn encode_player_warp_result(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_bool(field_bool(map, "success")?);
    records::write_warp_action(&mut w, field(map, "warp_action")?)?;
    w.write_bool(field_bool(map, "warp_action_invalid")?);
    Ok(w.into_inner())
}

fn decode_fly_ship(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("world_location".to_owned(), r.read_vec3i()?);
    out.insert("system_location".to_owned(), records::read_system_location(r)?);
    Ok(out)
}

fn encode_fly_ship(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_vec3i(field(map, "world_location")?)?;
    records::write_system_location(&mut w, field(map, "system_location")?)?;
    Ok(w.into_inner())
}

fn decode_give_item(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("name".to_owned(), r.read_utf8()?.into());
    out.insert("count".to_owned(), r.read_vlq()?.into());
    out.insert("parameters".to_owned(), r.read_json()?);
    Ok(out)
}

fn encode_give_item(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_utf8(field_str(map, "name")?);
    w.write_vlq(field_u64(map, "count")?);
    w.write_json(field(map, "parameters")?)?;
    Ok(w.into_inner())
}

fn decode_step_update(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("remote_step".to_owned(), r.read_vlq()?.into());
    Ok(out)
}

fn encode_step_update(map: &ValueMap, _: Direction) -> Result<Vec<u8>> {
    let mut w = PacketWriter::new();
    w.write_vlq(field_u64(map, "remote_step")?);
    Ok(w.into_inner())
}

fn decode_client_connect(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("assets_digest".to_owned(), r.read_byte_array()?.into());
    out.insert("allow_assets_mismatch".to_owned(), r.read_bool()?.into());
    out.insert("player_uuid".to_owned(), r.read_uuid()?.into());
    out.insert("player_name".to_owned(), r.read_utf8()?.into());
    out.insert("player_species".to_owned(), r.read_utf8()?.into());
    out.insert("ship_chunks".to_owned(), records::read_world_chunks(r)?);
    out.insert("ship_upgrades".to_owned(), records::read_ship_upgrades(r)?);
    out.insert("intro_complete".to_owned(), r.read_bool()?.into());
    out.insert("account".to_owned(), r.read_utf8()?.into());
    Ok(out)
}

fn decode_world_start(r: &mut PacketReader<'_>, _: Direction) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    out.insert("template_data".to_owned(), r.read_json()?);
    out.insert("sky_data".to_owned(), r.read_byte_array()?.into());
    out.insert("weather_data".to_owned(), r.read_byte_array()?.into());
    out.insert("player_start".to_owned(), r.read_vec2f()?);
    out.insert("player_respawn".to_owned(), r.read_vec2f()?);
    out.insert("respawn_in_world".to_owned(), r.read_bool()?.into());
    out.insert("world_properties".to_owned(), r.read_json()?);
    out.insert(
        "dungeon_id_gravity".to_owned(),
        r.read_u16_map(|r| Ok(Value::from(r.read_f32()?)))?,
    );
    out.insert(
        "dungeon_id_breathable".to_owned(),
        r.read_u16_map(|r| Ok(Value::from(r.read_bool()?)))?,
    );
    out.insert(
        "protected_dungeon_ids".to_owned(),
        r.read_set(|r| Ok(Value::from(r.read_u16()?)))?,
    );
    out.insert("client_id".to_owned(), r.read_u16()?.into());
    out.insert("local_interpolation_mode".to_owned(), r.read_bool()?.into());
    Ok(out)
}

fn decode_client_context_update(
    r: &mut PacketReader<'_>,
    direction: Direction,
) -> Result<ValueMap> {
    let mut out = ValueMap::new();
    match direction {
        Direction::ToServer => {
            let count = r.read_vlq()?;
            let mut rpcs = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                rpcs.push(r.read_json()?);
            }
            out.insert("rpcs".to_owned(), Value::List(rpcs));
        },
        Direction::ToClient => {
            out.insert("outer_length".to_owned(), r.read_vlq()?.into());
            let sub_length = r.read_vlq()?;
            out.insert("sub_length".to_owned(), sub_length.into());
            if sub_length == 0 {
                // Opaque remainder; this type has no encoder so a rebuild
                // can never be requested for it.
                out.insert(
                    "data".to_owned(),
                    Value::Bytes(bytes::Bytes::copy_from_slice(r.take_remaining())),
                );
            } else {
                let mut rpcs = Vec::with_capacity(sub_length.min(1024) as usize);
                for _ in 0..sub_length {
                    rpcs.push(r.read_json()?);
                }
                out.insert("rpcs".to_owned(), Value::List(rpcs));
            }
        },
    }
    Ok(out)
}
