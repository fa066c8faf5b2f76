//! Variable-length quantities.
//!
//! Big-endian base-128: successive 7-bit groups from most- to
//! least-significant, high bit set on every byte except the last. Zero is
//! a single `0x00`. The signed flavor maps `n >= 0` to `2n` and `n < 0`
//! to `2|n| - 1` before encoding.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::{ProtocolError, Result};

/// Encode an unsigned VLQ.
pub fn encode_vlq(value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0x00];
    }
    let mut out = Vec::with_capacity(10);
    let mut shift = (63 - value.leading_zeros()) / 7 * 7;
    loop {
        let group = ((value >> shift) & 0x7f) as u8;
        if shift == 0 {
            out.push(group);
            break;
        }
        out.push(group | 0x80);
        shift -= 7;
    }
    out
}

/// Encode a signed VLQ.
pub fn encode_svlq(value: i64) -> Vec<u8> {
    encode_vlq(zigzag(value))
}

/// Decode an unsigned VLQ from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// `IncompleteRead`-class [`ProtocolError::Decode`] when the buffer ends
/// before the terminating group; [`ProtocolError::VlqOverflow`] when the
/// value exceeds 64 bits.
pub fn decode_vlq(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if value.leading_zeros() < 7 {
            return Err(ProtocolError::VlqOverflow);
        }
        value = (value << 7) | u64::from(b & 0x7f);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(ProtocolError::decode("truncated vlq"))
}

/// Decode a signed VLQ from the front of `bytes`.
pub fn decode_svlq(bytes: &[u8]) -> Result<(i64, usize)> {
    let (raw, used) = decode_vlq(bytes)?;
    Ok((unzigzag(raw), used))
}

/// Read an unsigned VLQ from an async stream, returning the value and the
/// exact bytes consumed (the relay keeps them for the original frame).
///
/// # Errors
///
/// [`ProtocolError::IncompleteRead`] on EOF mid-quantity.
pub async fn read_vlq<R>(reader: &mut R) -> Result<(u64, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::with_capacity(2);
    let mut value: u64 = 0;
    loop {
        let b = read_byte(reader).await?;
        raw.push(b);
        if value.leading_zeros() < 7 {
            return Err(ProtocolError::VlqOverflow);
        }
        value = (value << 7) | u64::from(b & 0x7f);
        if b & 0x80 == 0 {
            return Ok((value, raw));
        }
    }
}

/// Read a signed VLQ from an async stream. See [`read_vlq`].
pub async fn read_svlq<R>(reader: &mut R) -> Result<(i64, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let (raw_value, raw) = read_vlq(reader).await?;
    Ok((unzigzag(raw_value), raw))
}

async fn read_byte<R>(reader: &mut R) -> Result<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::IncompleteRead
        } else {
            ProtocolError::Io(e)
        }
    })?;
    Ok(buf[0])
}

fn zigzag(value: i64) -> u64 {
    if value >= 0 { (value as u64) << 1 } else { (((-(value + 1)) as u64) << 1) | 1 }
}

fn unzigzag(raw: u64) -> i64 {
    if raw & 1 == 0 { (raw >> 1) as i64 } else { -((raw >> 1) as i64) - 1 }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn zero_is_one_byte() {
        assert_eq!(encode_vlq(0), vec![0x00]);
        assert_eq!(decode_vlq(&[0x00]).unwrap(), (0, 1));
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_vlq(0x7f), vec![0x7f]);
        assert_eq!(encode_vlq(0x80), vec![0x81, 0x00]);
        assert_eq!(encode_vlq(300), vec![0x82, 0x2c]);
        // -1 maps to raw 1, -2 to raw 3
        assert_eq!(encode_svlq(-1), vec![0x01]);
        assert_eq!(encode_svlq(-2), vec![0x03]);
        assert_eq!(encode_svlq(1), vec![0x02]);
    }

    #[test]
    fn truncated_vlq_fails() {
        assert!(decode_vlq(&[0x81]).is_err());
        assert!(decode_vlq(&[]).is_err());
    }

    #[test]
    fn extremes_round_trip() {
        for n in [i64::MIN, i64::MIN + 1, -1, 0, 1, i64::MAX - 1, i64::MAX] {
            let enc = encode_svlq(n);
            assert_eq!(decode_svlq(&enc).unwrap(), (n, enc.len()));
        }
        for n in [0, 1, u64::MAX - 1, u64::MAX] {
            let enc = encode_vlq(n);
            assert_eq!(decode_vlq(&enc).unwrap(), (n, enc.len()));
        }
    }

    proptest! {
        #[test]
        fn vlq_round_trip(n in any::<u64>()) {
            let enc = encode_vlq(n);
            let (dec, used) = decode_vlq(&enc).unwrap();
            prop_assert_eq!(dec, n);
            prop_assert_eq!(used, enc.len());
            // length matches ceil(bitlen / 7), one byte for zero
            let expected = if n == 0 { 1 } else { (64 - n.leading_zeros() as usize).div_ceil(7) };
            prop_assert_eq!(enc.len(), expected);
        }

        #[test]
        fn svlq_round_trip(n in any::<i64>()) {
            let enc = encode_svlq(n);
            let (dec, used) = decode_svlq(&enc).unwrap();
            prop_assert_eq!(dec, n);
            prop_assert_eq!(used, enc.len());
        }
    }

    #[tokio::test]
    async fn async_read_captures_raw_bytes() {
        let enc = encode_svlq(-300);
        let mut cursor = enc.as_slice();
        let (value, raw) = read_svlq(&mut cursor).await.unwrap();
        assert_eq!(value, -300);
        assert_eq!(raw, enc);
    }

    #[tokio::test]
    async fn async_read_eof_is_incomplete() {
        let mut cursor: &[u8] = &[0x81];
        let err = read_vlq(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::IncompleteRead));
    }
}
