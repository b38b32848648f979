//! Little-endian read and write cursors over record bytes.

use alloc::vec::Vec;

use crate::error::{WireError, WireResult};
use crate::tag::Tag;
use crate::HEADER_LEN;

/// Sequential reader over an encoded buffer.
pub struct Reader<'a> {
    /// Buffer being read.
    bytes: &'a [u8],
    /// Current position.
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at offset 0.
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    /// Create a reader positioned at `pos`.
    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Reader { bytes, pos }
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    /// Whether the whole buffer has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `len` bytes.
    pub fn take(&mut self, len: usize) -> WireResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(WireError::UnexpectedEnd {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> WireResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read eight raw bytes.
    pub fn read_array8(&mut self) -> WireResult<[u8; 8]> {
        let b = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(out)
    }

    /// Read a little-endian binary64.
    pub fn read_f64(&mut self) -> WireResult<f64> {
        Ok(f64::from_le_bytes(self.read_array8()?))
    }

    /// Read a little-endian two's-complement i64.
    pub fn read_i64(&mut self) -> WireResult<i64> {
        Ok(i64::from_le_bytes(self.read_array8()?))
    }

    /// Read a u32 length prefix followed by that many bytes.
    pub fn read_length_prefixed(&mut self) -> WireResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Read a tag byte, rejecting unknown kinds.
    pub fn read_tag(&mut self) -> WireResult<Tag> {
        let offset = self.pos;
        let byte = self.read_u8()?;
        Tag::from_byte(byte).ok_or(WireError::UnknownTag { tag: byte, offset })
    }
}

/// Append-only writer producing an encoded buffer.
#[derive(Debug, Default)]
pub struct Writer {
    /// Output bytes.
    buf: Vec<u8>,
}

impl Writer {
    /// Create a writer and reserve the count header for `count` values.
    pub fn with_count(count: usize) -> WireResult<Self> {
        let count = u32::try_from(count).map_err(|_| WireError::LengthOverflow(count))?;
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&count.to_le_bytes());
        Ok(Writer { buf })
    }

    /// Write a tag byte.
    pub fn put_tag(&mut self, tag: Tag) {
        self.buf.push(tag.byte());
    }

    /// Write a little-endian u32.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian binary64.
    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian i64.
    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a u32 length prefix followed by `bytes`.
    pub fn put_length_prefixed(&mut self, bytes: &[u8]) -> WireResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| WireError::LengthOverflow(bytes.len()))?;
        self.put_u32(len);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish and return the buffer.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_fixed_width() {
        let mut bytes = alloc::vec::Vec::new();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.extend_from_slice(&(-2i64).to_le_bytes());
        bytes.extend_from_slice(&1.5f64.to_le_bytes());

        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert_eq!(r.read_i64().unwrap(), -2);
        assert_eq!(r.read_f64().unwrap(), 1.5);
        assert!(r.is_empty());
    }

    #[test]
    fn test_reader_reports_truncation() {
        let bytes = [0x06, 0x05, 0x00, 0x00, 0x00, b'h', b'i'];
        let mut r = Reader::at(&bytes, 1);
        let err = r.read_length_prefixed().unwrap_err();
        assert_eq!(
            err,
            WireError::UnexpectedEnd {
                offset: 5,
                needed: 5,
                available: 2
            }
        );
    }

    #[test]
    fn test_reader_unknown_tag() {
        let bytes = [0x2a];
        let mut r = Reader::new(&bytes);
        assert_eq!(
            r.read_tag(),
            Err(WireError::UnknownTag { tag: 0x2a, offset: 0 })
        );
    }

    #[test]
    fn test_writer_header_and_payloads() {
        let mut w = Writer::with_count(2).unwrap();
        w.put_tag(Tag::String);
        w.put_length_prefixed(b"ok").unwrap();
        w.put_tag(Tag::Object);
        w.put_u32(3);
        let out = w.finish();
        assert_eq!(
            out,
            alloc::vec![2, 0, 0, 0, 0x06, 2, 0, 0, 0, b'o', b'k', 0x08, 3, 0, 0, 0]
        );
    }
}
