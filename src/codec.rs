//! Bounds-checked byte reading and little-endian writing
//!
//! Every read checks the remaining buffer before touching it and reports
//! which field ran short. Variable-length counts are validated against the
//! remaining bytes before any allocation sized by them.

use crate::error::DecodeError;
use crate::types::Hash;

/// Cursor over an untrusted byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Peek at the byte `offset` positions ahead without consuming
    pub fn peek(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    /// Fail unless at least `needed` bytes remain
    pub fn require(&self, field: &'static str, needed: usize) -> Result<(), DecodeError> {
        if needed > self.remaining() {
            return Err(DecodeError::Truncated {
                field,
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], DecodeError> {
        self.require(field, len)?;
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }

    pub fn skip(&mut self, field: &'static str, len: usize) -> Result<(), DecodeError> {
        self.read_bytes(field, len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(field, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>(field)?[0])
    }

    pub fn read_u16_be(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.read_array(field)?))
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_hash(&mut self, field: &'static str) -> Result<Hash, DecodeError> {
        self.read_array(field)
    }

    /// Read a compact-size integer. Non-minimal encodings are accepted.
    pub fn read_compact_size(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let (value, used) = decode_compact_size(&self.data[self.pos..], field)?;
        self.pos += used;
        Ok(value)
    }

    /// Read a compact-size count and check that `count * min_item_size`
    /// bytes remain before the caller allocates for it
    pub fn read_count(
        &mut self,
        field: &'static str,
        min_item_size: usize,
    ) -> Result<usize, DecodeError> {
        let count = self.read_compact_size(field)?;
        let needed = (count as u128) * (min_item_size as u128);
        if needed > self.remaining() as u128 {
            return Err(DecodeError::Truncated {
                field,
                needed: usize::try_from(needed).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            });
        }
        Ok(count as usize)
    }

    /// Read a compact-size length followed by that many bytes
    pub fn read_var_bytes(&mut self, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.read_count(field, 1)?;
        self.read_bytes(field, len)
    }

    /// Unconsumed bytes, without advancing
    pub fn unread(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Everything not yet consumed
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}

/// Decode a compact-size integer from the front of `data`.
///
/// Returns the value and the number of bytes consumed (1, 3, 5 or 9).
pub fn decode_compact_size(data: &[u8], field: &'static str) -> Result<(u64, usize), DecodeError> {
    let first = *data.first().ok_or(DecodeError::Truncated {
        field,
        needed: 1,
        remaining: 0,
    })?;
    let width = match first {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        n => return Ok((n as u64, 1)),
    };
    if data.len() < 1 + width {
        return Err(DecodeError::Truncated {
            field,
            needed: 1 + width,
            remaining: data.len(),
        });
    }
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(&data[1..1 + width]);
    Ok((u64::from_le_bytes(buf), 1 + width))
}

/// Number of bytes `write_compact_size` emits for `value`
pub fn compact_size_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append a minimally encoded compact-size integer
pub fn write_compact_size(out: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        out.push(value as u8);
    } else if value <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Append a compact-size length prefix and the bytes
pub fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_size_widths() {
        for (value, len) in [
            (0u64, 1),
            (0xfc, 1),
            (0xfd, 3),
            (0xffff, 3),
            (0x10000, 5),
            (0xffff_ffff, 5),
            (0x1_0000_0000, 9),
        ] {
            let mut out = Vec::new();
            write_compact_size(&mut out, value);
            assert_eq!(out.len(), len);
            assert_eq!(compact_size_len(value), len);
            assert_eq!(decode_compact_size(&out, "n").unwrap(), (value, len));
        }
    }

    #[test]
    fn test_compact_size_non_minimal_accepted() {
        // 5 encoded with the 3-byte form
        let data = [0xfd, 0x05, 0x00];
        assert_eq!(decode_compact_size(&data, "n").unwrap(), (5, 3));
    }

    #[test]
    fn test_compact_size_truncated() {
        assert!(decode_compact_size(&[], "n").is_err());
        assert!(decode_compact_size(&[0xfe, 0x01, 0x02], "n").is_err());
        let err = decode_compact_size(&[0xff, 0, 0, 0], "count").unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated { field: "count", needed: 9, remaining: 4 }
        );
    }

    #[test]
    fn test_read_count_rejects_oversized() {
        // Claims 0xfc items of 36 bytes with nothing behind it
        let data = [0xfc];
        let mut reader = ByteReader::new(&data);
        assert!(reader.read_count("items", 36).is_err());
    }

    #[test]
    fn test_read_count_huge_does_not_overflow() {
        let data = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let mut reader = ByteReader::new(&data);
        assert!(reader.read_count("items", 41).is_err());
    }

    #[test]
    fn test_read_var_bytes() {
        let data = [0x03, b'a', b'b', b'c', 0x01];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_var_bytes("s").unwrap(), b"abc");
        assert_eq!(reader.remaining(), 1);
        assert!(ByteReader::new(&[0x05, 1, 2]).read_var_bytes("s").is_err());
    }

    #[test]
    fn test_fixed_width_reads() {
        let data = [0x01, 0x00, 0x00, 0x00, 0x20, 0x8d, 0xff];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u32("v").unwrap(), 1);
        assert_eq!(reader.read_u16_be("port").unwrap(), 0x208d);
        assert_eq!(reader.read_u8("b").unwrap(), 0xff);
        assert!(reader.read_u8("b").is_err());
        assert_eq!(reader.position(), 7);
    }
}
