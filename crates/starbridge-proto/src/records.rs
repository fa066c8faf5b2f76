//! Composite wire records shared by several packet types.
//!
//! Tagged unions fail on unknown discriminants; field order matches the
//! wire layout exactly.

use crate::{
    errors::{ProtocolError, Result},
    reader::PacketReader,
    value::{Value, ValueMap},
    writer::{PacketWriter, expect_f64, expect_i64},
};

fn expect_field<'v>(map: &'v ValueMap, key: &str) -> Result<&'v Value> {
    map.get(key).ok_or_else(|| ProtocolError::decode(format!("missing field {key:?}")))
}

fn expect_str<'v>(map: &'v ValueMap, key: &str) -> Result<&'v str> {
    expect_field(map, key)?
        .as_str()
        .ok_or_else(|| ProtocolError::decode(format!("field {key:?} must be a string")))
}

/// Chat message header.
///
/// Mode > 1 carries a channel name; lower modes carry one undocumented
/// byte instead.
pub fn read_chat_header(r: &mut PacketReader<'_>) -> Result<Value> {
    let mut header = ValueMap::new();
    let mode = r.read_u8()?;
    header.insert("mode".to_owned(), mode.into());
    if mode > 1 {
        header.insert("channel".to_owned(), r.read_utf8()?.into());
        header.insert("client_id".to_owned(), r.read_u16()?.into());
    } else {
        header.insert("channel".to_owned(), "".into());
        header.insert("unknown".to_owned(), r.read_u8()?.into());
        header.insert("client_id".to_owned(), r.read_u16()?.into());
    }
    Ok(Value::Object(header))
}

/// Mirror of [`read_chat_header`].
pub fn write_chat_header(w: &mut PacketWriter, header: &Value) -> Result<()> {
    let map = header
        .as_object()
        .ok_or_else(|| ProtocolError::decode("chat header must be an object"))?;
    let mode = expect_i64(expect_field(map, "mode")?)? as u8;
    w.write_u8(mode);
    if mode > 1 {
        w.write_utf8(expect_str(map, "channel")?);
    } else {
        let unknown = map.get("unknown").and_then(Value::as_u64).unwrap_or(0) as u8;
        w.write_u8(unknown);
    }
    let client_id = expect_i64(expect_field(map, "client_id")?)? as u16;
    w.write_u16(client_id);
    Ok(())
}

/// Celestial coordinates: vec3i location, planet, satellite.
pub fn read_celestial_coordinates(r: &mut PacketReader<'_>) -> Result<Value> {
    let mut coords = ValueMap::new();
    coords.insert("location".to_owned(), r.read_vec3i()?);
    coords.insert("planet".to_owned(), r.read_i32()?.into());
    coords.insert("satellite".to_owned(), r.read_i32()?.into());
    Ok(Value::Object(coords))
}

/// Mirror of [`read_celestial_coordinates`].
pub fn write_celestial_coordinates(w: &mut PacketWriter, coords: &Value) -> Result<()> {
    let map = coords
        .as_object()
        .ok_or_else(|| ProtocolError::decode("celestial coordinates must be an object"))?;
    w.write_vec3i(expect_field(map, "location")?)?;
    w.write_i32(expect_i64(expect_field(map, "planet")?)? as i32);
    w.write_i32(expect_i64(expect_field(map, "satellite")?)? as i32);
    Ok(())
}

/// System location: tagged union over five location kinds.
pub fn read_system_location(r: &mut PacketReader<'_>) -> Result<Value> {
    let mut loc = ValueMap::new();
    let tag = r.read_u8()?;
    loc.insert("type".to_owned(), tag.into());
    match tag {
        0 => {},
        1 => {
            loc.insert("coordinate".to_owned(), read_celestial_coordinates(r)?);
        },
        2 => {
            loc.insert("coordinate".to_owned(), read_celestial_coordinates(r)?);
            loc.insert("direction".to_owned(), r.read_i32()?.into());
            loc.insert("enter_time".to_owned(), r.read_f64()?.into());
            loc.insert("enter_position".to_owned(), r.read_vec2f()?);
        },
        3 => {
            loc.insert("uuid".to_owned(), r.read_uuid()?.into());
        },
        4 => {
            loc.insert("location".to_owned(), r.read_vec2f()?);
        },
        other => return Err(ProtocolError::UnknownTag { kind: "system location", tag: other }),
    }
    Ok(Value::Object(loc))
}

/// Mirror of [`read_system_location`].
pub fn write_system_location(w: &mut PacketWriter, loc: &Value) -> Result<()> {
    let map = loc
        .as_object()
        .ok_or_else(|| ProtocolError::decode("system location must be an object"))?;
    let tag = expect_i64(expect_field(map, "type")?)? as u8;
    w.write_u8(tag);
    match tag {
        0 => {},
        1 => write_celestial_coordinates(w, expect_field(map, "coordinate")?)?,
        2 => {
            write_celestial_coordinates(w, expect_field(map, "coordinate")?)?;
            w.write_i32(expect_i64(expect_field(map, "direction")?)? as i32);
            w.write_f64(expect_f64(expect_field(map, "enter_time")?)?);
            w.write_vec2f(expect_field(map, "enter_position")?)?;
        },
        3 => w.write_uuid(expect_str(map, "uuid")?)?,
        4 => w.write_vec2f(expect_field(map, "location")?)?,
        other => return Err(ProtocolError::UnknownTag { kind: "system location", tag: other }),
    }
    Ok(())
}

/// Warp action: outer warp kind, with a nested world kind only under
/// to-world (tag 1).
pub fn read_warp_action(r: &mut PacketReader<'_>) -> Result<Value> {
    let mut warp = ValueMap::new();
    let warp_type = r.read_u8()?;
    warp.insert("warp_type".to_owned(), warp_type.into());
    match warp_type {
        1 => {
            let world_type = r.read_u8()?;
            warp.insert("world_type".to_owned(), world_type.into());
            match world_type {
                1 => {
                    warp.insert(
                        "celestial_coordinates".to_owned(),
                        read_celestial_coordinates(r)?,
                    );
                },
                2 => {
                    warp.insert("ship_owner".to_owned(), r.read_uuid()?.into());
                },
                3 => {
                    warp.insert("instance_type".to_owned(), r.read_utf8()?.into());
                    let instance_id = r.read_maybe(PacketReader::read_uuid)?;
                    warp.insert(
                        "instance_id".to_owned(),
                        instance_id.map_or(Value::Null, Value::Str),
                    );
                    let level = r.read_maybe(PacketReader::read_f32)?;
                    warp.insert(
                        "level".to_owned(),
                        level.map_or(Value::Null, |l| Value::Float(f64::from(l))),
                    );
                },
                other => {
                    return Err(ProtocolError::UnknownTag { kind: "warp world", tag: other });
                },
            }
        },
        2 => {
            warp.insert("player_uuid".to_owned(), r.read_uuid()?.into());
        },
        3 => {
            warp.insert("alias_type".to_owned(), r.read_i32()?.into());
        },
        other => return Err(ProtocolError::UnknownTag { kind: "warp action", tag: other }),
    }
    Ok(Value::Object(warp))
}

/// Mirror of [`read_warp_action`].
pub fn write_warp_action(w: &mut PacketWriter, warp: &Value) -> Result<()> {
    let map = warp
        .as_object()
        .ok_or_else(|| ProtocolError::decode("warp action must be an object"))?;
    let warp_type = expect_i64(expect_field(map, "warp_type")?)? as u8;
    w.write_u8(warp_type);
    match warp_type {
        1 => {
            let world_type = expect_i64(expect_field(map, "world_type")?)? as u8;
            w.write_u8(world_type);
            match world_type {
                1 => write_celestial_coordinates(w, expect_field(map, "celestial_coordinates")?)?,
                2 => w.write_uuid(expect_str(map, "ship_owner")?)?,
                3 => {
                    w.write_utf8(expect_str(map, "instance_type")?);
                    w.write_maybe(map.get("instance_id"), |w, v| {
                        w.write_uuid(v.as_str().ok_or_else(|| {
                            ProtocolError::decode("instance_id must be a uuid string")
                        })?)
                    })?;
                    w.write_maybe(map.get("level"), |w, v| {
                        w.write_f32(expect_f64(v)? as f32);
                        Ok(())
                    })?;
                },
                other => {
                    return Err(ProtocolError::UnknownTag { kind: "warp world", tag: other });
                },
            }
        },
        2 => w.write_uuid(expect_str(map, "player_uuid")?)?,
        3 => w.write_i32(expect_i64(expect_field(map, "alias_type")?)? as i32),
        other => return Err(ProtocolError::UnknownTag { kind: "warp action", tag: other }),
    }
    Ok(())
}

/// World chunk blob: VLQ count of (byte-array, separator, byte-array)
/// triples, kept opaque.
pub fn read_world_chunks(r: &mut PacketReader<'_>) -> Result<Value> {
    let count = r.read_vlq()?;
    let mut chunks = Vec::with_capacity(count.min(1024) as usize);
    for index in 0..count {
        let first = r.read_byte_array()?;
        let separator = r.read_u8()?;
        let second = r.read_byte_array()?;
        chunks.push(Value::List(vec![
            index.into(),
            first.into(),
            separator.into(),
            second.into(),
        ]));
    }
    let mut out = ValueMap::new();
    out.insert("length".to_owned(), count.into());
    out.insert("contents".to_owned(), Value::List(chunks));
    Ok(Value::Object(out))
}

/// Ship upgrade block carried by client-connect.
pub fn read_ship_upgrades(r: &mut PacketReader<'_>) -> Result<Value> {
    let mut upgrades = ValueMap::new();
    upgrades.insert("ship_level".to_owned(), r.read_u32()?.into());
    upgrades.insert("max_fuel".to_owned(), r.read_u32()?.into());
    upgrades.insert("crew_size".to_owned(), r.read_u32()?.into());
    upgrades.insert("fuel_efficiency".to_owned(), r.read_f32()?.into());
    upgrades.insert("ship_speed".to_owned(), r.read_f32()?.into());
    let capabilities = r.read_string_set()?;
    upgrades.insert(
        "ship_capabilities".to_owned(),
        Value::List(capabilities.into_iter().map(Value::Str).collect()),
    );
    Ok(Value::Object(upgrades))
}
