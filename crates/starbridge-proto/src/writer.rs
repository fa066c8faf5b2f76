//! Growable big-endian packet body writer, the mirror of `PacketReader`.

use crate::{
    errors::{ProtocolError, Result},
    value::Value,
    vlq,
};

/// Accumulates an encoded packet body.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    /// New empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finished body bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Append one byte.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Append a bool byte.
    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    /// Append a big-endian `u16`.
    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `i16`.
    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `u32`.
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `i32`.
    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `u64`.
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `i64`.
    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `f32`.
    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian `f64`.
    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append an unsigned VLQ.
    pub fn write_vlq(&mut self, v: u64) {
        self.buf.extend_from_slice(&vlq::encode_vlq(v));
    }

    /// Append a signed VLQ.
    pub fn write_svlq(&mut self, v: i64) {
        self.buf.extend_from_slice(&vlq::encode_svlq(v));
    }

    /// Append a VLQ-length-prefixed byte array.
    pub fn write_byte_array(&mut self, v: &[u8]) {
        self.write_vlq(v.len() as u64);
        self.buf.extend_from_slice(v);
    }

    /// Append a UTF-8 string as a byte array.
    pub fn write_utf8(&mut self, v: &str) {
        self.write_byte_array(v.as_bytes());
    }

    /// Append a VLQ-counted set of UTF-8 strings.
    pub fn write_string_set(&mut self, items: &[String]) {
        self.write_vlq(items.len() as u64);
        for item in items {
            self.write_utf8(item);
        }
    }

    /// Append 16 raw UUID bytes from 32 hex characters.
    pub fn write_uuid(&mut self, hexed: &str) -> Result<()> {
        if hexed.len() != 32 || !hexed.is_ascii() {
            return Err(ProtocolError::decode(format!(
                "uuid must be 32 hex chars, got {}",
                hexed.len()
            )));
        }
        for i in 0..16 {
            let pair = &hexed[i * 2..i * 2 + 2];
            let byte = u8::from_str_radix(pair, 16)
                .map_err(|_| ProtocolError::decode(format!("invalid uuid hex pair {pair:?}")))?;
            self.buf.push(byte);
        }
        Ok(())
    }

    /// Append a `vec2f` from a two-element list.
    pub fn write_vec2f(&mut self, v: &Value) -> Result<()> {
        let items = expect_list(v, 2)?;
        for item in items {
            self.write_f32(expect_f64(item)? as f32);
        }
        Ok(())
    }

    /// Append a `vec2i` from a two-element list.
    pub fn write_vec2i(&mut self, v: &Value) -> Result<()> {
        let items = expect_list(v, 2)?;
        for item in items {
            self.write_i32(expect_i64(item)? as i32);
        }
        Ok(())
    }

    /// Append a `vec2u` from a two-element list.
    pub fn write_vec2u(&mut self, v: &Value) -> Result<()> {
        let items = expect_list(v, 2)?;
        for item in items {
            self.write_u32(expect_u64(item)? as u32);
        }
        Ok(())
    }

    /// Append a `vec3i` from a three-element list.
    pub fn write_vec3i(&mut self, v: &Value) -> Result<()> {
        let items = expect_list(v, 3)?;
        for item in items {
            self.write_i32(expect_i64(item)? as i32);
        }
        Ok(())
    }

    /// Append an optional value: presence byte, then `write` when set.
    ///
    /// `Null` counts as absent, mirroring how the reader surfaces a clear
    /// presence flag.
    pub fn write_maybe(
        &mut self,
        v: Option<&Value>,
        write: impl FnOnce(&mut Self, &Value) -> Result<()>,
    ) -> Result<()> {
        match v {
            Some(inner) if !inner.is_null() => {
                self.write_bool(true);
                write(self, inner)
            },
            _ => {
                self.write_bool(false);
                Ok(())
            },
        }
    }

    /// Append one tagged-JSON node.
    pub fn write_json(&mut self, v: &Value) -> Result<()> {
        match v {
            Value::Null => self.write_u8(1),
            Value::Float(f) => {
                self.write_u8(2);
                self.write_f64(*f);
            },
            Value::Bool(b) => {
                self.write_u8(3);
                self.write_bool(*b);
            },
            Value::Int(n) => {
                self.write_u8(4);
                self.write_svlq(*n);
            },
            Value::Uint(n) => {
                let n = i64::try_from(*n)
                    .map_err(|_| ProtocolError::decode("integer too large for json"))?;
                self.write_u8(4);
                self.write_svlq(n);
            },
            Value::Str(s) => {
                self.write_u8(5);
                self.write_utf8(s);
            },
            Value::List(items) => {
                self.write_u8(6);
                self.write_vlq(items.len() as u64);
                for item in items {
                    self.write_json(item)?;
                }
            },
            Value::Object(map) => {
                self.write_u8(7);
                self.write_vlq(map.len() as u64);
                for (key, value) in map {
                    self.write_utf8(key);
                    self.write_json(value)?;
                }
            },
            Value::Bytes(_) => {
                return Err(ProtocolError::decode("raw bytes are not representable as json"));
            },
        }
        Ok(())
    }
}

/// Fixed-length list or decode error.
pub fn expect_list(v: &Value, len: usize) -> Result<&[Value]> {
    let items =
        v.as_list().ok_or_else(|| ProtocolError::decode("expected a list value"))?;
    if items.len() != len {
        return Err(ProtocolError::decode(format!(
            "expected {len}-element list, got {}",
            items.len()
        )));
    }
    Ok(items)
}

/// Integer view of a value or decode error.
pub fn expect_i64(v: &Value) -> Result<i64> {
    v.as_i64().ok_or_else(|| ProtocolError::decode("expected an integer value"))
}

/// Unsigned integer view of a value or decode error.
pub fn expect_u64(v: &Value) -> Result<u64> {
    v.as_u64().ok_or_else(|| ProtocolError::decode("expected an unsigned integer value"))
}

/// Float view of a value or decode error.
pub fn expect_f64(v: &Value) -> Result<f64> {
    v.as_f64().ok_or_else(|| ProtocolError::decode("expected a float value"))
}
