//! Bounds-checked cursor over a packet body.
//!
//! All multi-byte integers are big-endian. Reads past the end fail with a
//! decode error; nothing here panics on malformed input.

use std::fmt::Write as _;

use bytes::Bytes;

use crate::{
    errors::{ProtocolError, Result},
    value::{Value, ValueMap},
    vlq,
};

/// Sequential reader over a borrowed body slice.
#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Wrap a body slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True when the cursor has consumed the whole body.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume and return the rest of the body.
    pub fn take_remaining(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::decode(format!(
                "short body: wanted {n} bytes, {} remain",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(slice);
        Ok(arr)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a bool byte (zero is false, anything else true).
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `i16`.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `f32`.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    /// Read a big-endian `f64`.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// Read an unsigned VLQ.
    pub fn read_vlq(&mut self) -> Result<u64> {
        let (value, used) = vlq::decode_vlq(&self.buf[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Read a signed VLQ.
    pub fn read_svlq(&mut self) -> Result<i64> {
        let (value, used) = vlq::decode_svlq(&self.buf[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Read a VLQ-length-prefixed byte array.
    pub fn read_byte_array(&mut self) -> Result<Bytes> {
        let len = usize::try_from(self.read_vlq()?)
            .map_err(|_| ProtocolError::decode("byte array length overflows usize"))?;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    /// Read a byte array interpreted as UTF-8.
    pub fn read_utf8(&mut self) -> Result<String> {
        let raw = self.read_byte_array()?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| ProtocolError::decode(format!("invalid utf-8 string: {e}")))
    }

    /// Read a VLQ-counted set of UTF-8 strings.
    pub fn read_string_set(&mut self) -> Result<Vec<String>> {
        let count = self.read_vlq()?;
        let mut out = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            out.push(self.read_utf8()?);
        }
        Ok(out)
    }

    /// Read 16 raw UUID bytes, canonicalized to 32 lowercase hex chars.
    pub fn read_uuid(&mut self) -> Result<String> {
        let raw = self.take(16)?;
        let mut hexed = String::with_capacity(32);
        for b in raw {
            // writing to a String cannot fail
            let _ = write!(hexed, "{b:02x}");
        }
        Ok(hexed)
    }

    /// Read a `vec2f` as a two-element list.
    pub fn read_vec2f(&mut self) -> Result<Value> {
        Ok(Value::List(vec![self.read_f32()?.into(), self.read_f32()?.into()]))
    }

    /// Read a `vec2i` as a two-element list.
    pub fn read_vec2i(&mut self) -> Result<Value> {
        Ok(Value::List(vec![self.read_i32()?.into(), self.read_i32()?.into()]))
    }

    /// Read a `vec2u` as a two-element list.
    pub fn read_vec2u(&mut self) -> Result<Value> {
        Ok(Value::List(vec![self.read_u32()?.into(), self.read_u32()?.into()]))
    }

    /// Read a `vec3i` as a three-element list.
    pub fn read_vec3i(&mut self) -> Result<Value> {
        Ok(Value::List(vec![
            self.read_i32()?.into(),
            self.read_i32()?.into(),
            self.read_i32()?.into(),
        ]))
    }

    /// Read an optional value: presence byte, then `read` when set.
    pub fn read_maybe<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.read_bool()? { Ok(Some(read(self)?)) } else { Ok(None) }
    }

    /// Read a VLQ-counted homogeneous set.
    pub fn read_set(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<Value>,
    ) -> Result<Value> {
        let count = self.read_vlq()?;
        let mut out = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            out.push(read(self)?);
        }
        Ok(Value::List(out))
    }

    /// Read a VLQ-counted key/value map with integer keys, keeping
    /// insertion order. Keys are canonical decimal strings.
    pub fn read_u16_map(
        &mut self,
        mut read_value: impl FnMut(&mut Self) -> Result<Value>,
    ) -> Result<Value> {
        let count = self.read_vlq()?;
        let mut out = ValueMap::new();
        for _ in 0..count {
            let key = self.read_u16()?;
            let value = read_value(self)?;
            out.insert(key.to_string(), value);
        }
        Ok(Value::Object(out))
    }

    /// Read one tagged-JSON node (tags 1..=7, recursive).
    pub fn read_json(&mut self) -> Result<Value> {
        let tag = self.read_u8()?;
        match tag {
            1 => Ok(Value::Null),
            2 => Ok(Value::Float(self.read_f64()?)),
            3 => Ok(Value::Bool(self.read_bool()?)),
            4 => Ok(Value::Int(self.read_svlq()?)),
            5 => Ok(Value::Str(self.read_utf8()?)),
            6 => {
                let count = self.read_vlq()?;
                let mut items = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    items.push(self.read_json()?);
                }
                Ok(Value::List(items))
            },
            7 => {
                let count = self.read_vlq()?;
                let mut map = ValueMap::new();
                for _ in 0..count {
                    let key = self.read_utf8()?;
                    let value = self.read_json()?;
                    map.insert(key, value);
                }
                Ok(Value::Object(map))
            },
            other => Err(ProtocolError::UnknownTag { kind: "json", tag: other }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives() {
        let body = [0x01, 0x00, 0x2a, 0xff, 0xff, 0xff, 0xff];
        let mut r = PacketReader::new(&body);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_u16().unwrap(), 0x2a);
        assert_eq!(r.read_i32().unwrap(), -1);
        assert!(r.is_empty());
    }

    #[test]
    fn short_read_is_decode_error() {
        let mut r = PacketReader::new(&[0x00]);
        assert!(matches!(r.read_u32(), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn uuid_is_lowercase_hex() {
        let raw: Vec<u8> = (0..16).map(|i| (i * 16 + 0x0f) as u8).collect();
        let mut r = PacketReader::new(&raw);
        let uuid = r.read_uuid().unwrap();
        assert_eq!(uuid.len(), 32);
        assert_eq!(uuid, "0f1f2f3f4f5f6f7f8f9fafbfcfdfefff");
    }

    #[test]
    fn unknown_json_tag_rejected() {
        let mut r = PacketReader::new(&[9]);
        assert!(matches!(
            r.read_json(),
            Err(ProtocolError::UnknownTag { kind: "json", tag: 9 })
        ));
    }
}
