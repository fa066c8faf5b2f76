//! Dynamic value tree for parsed packet bodies.
//!
//! `Value` is both the in-memory form of the wire's tagged-JSON type and
//! the field type of every parsed packet: decoders produce
//! `IndexMap<String, Value>` and encoders consume one. Object variants are
//! insertion-ordered because key order is preserved on the wire.

use bytes::Bytes;
use indexmap::IndexMap;

/// Insertion-ordered string-keyed mapping of values.
pub type ValueMap = IndexMap<String, Value>;

/// A parsed packet field or tagged-JSON node.
///
/// `Bytes` never appears inside wire tagged-JSON (tags 1..=7 have no
/// binary variant); it exists for packet fields that carry raw byte
/// arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON null (tag 1).
    Null,
    /// JSON bool (tag 3).
    Bool(bool),
    /// Signed integer (tag 4 on the JSON wire).
    Int(i64),
    /// Unsigned integer; encodes as tag 4 when it fits in `i64`.
    Uint(u64),
    /// Double (tag 2).
    Float(f64),
    /// UTF-8 string (tag 5).
    Str(String),
    /// Raw bytes (packet fields only, not valid JSON).
    Bytes(Bytes),
    /// Array (tag 6).
    List(Vec<Value>),
    /// Insertion-ordered object (tag 7).
    Object(ValueMap),
}

impl Value {
    /// Boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Signed integer view; `Uint` converts when it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Uint(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Unsigned integer view; `Int` converts when non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint(n) => Some(*n),
            Self::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Float payload; integers convert.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            Self::Uint(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// String slice, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes, if this is a `Bytes`.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Element list, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Object mapping, if this is an `Object`.
    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Object field lookup; `None` for non-objects and missing keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<ValueMap> for Value {
    fn from(v: ValueMap) -> Self {
        Self::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let mut map = ValueMap::new();
        map.insert("n".to_owned(), Value::Int(-3));
        let v = Value::Object(map);
        assert_eq!(v.get("n").and_then(Value::as_i64), Some(-3));
        assert_eq!(v.get("missing"), None);
        assert_eq!(Value::Uint(7).as_i64(), Some(7));
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Uint(u64::MAX).as_i64(), None);
    }

    #[test]
    fn object_preserves_insertion_order() {
        let mut map = ValueMap::new();
        map.insert("z".to_owned(), Value::Null);
        map.insert("a".to_owned(), Value::Null);
        map.insert("m".to_owned(), Value::Null);
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
