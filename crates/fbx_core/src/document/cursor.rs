//! Bounds-checked little-endian reader over a borrowed byte buffer.

use byteorder::{ByteOrder, LittleEndian};

use super::{DocumentError, DocumentResult};

/// Sequential reader over a byte slice.
///
/// Every read checks the remaining length first and reports the offset that
/// failed, so a truncated document surfaces as an error instead of a panic.
#[derive(Clone, Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Move to an absolute offset. Seeking to the very end is allowed.
    pub fn seek(&mut self, offset: usize) -> DocumentResult<()> {
        if offset > self.data.len() {
            return Err(DocumentError::UnexpectedEof {
                offset: self.offset,
                needed: offset - self.offset.min(offset),
            });
        }
        self.offset = offset;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> DocumentResult<()> {
        self.take(count).map(|_| ())
    }

    /// Borrow the next `count` bytes and advance past them.
    pub fn take(&mut self, count: usize) -> DocumentResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(DocumentError::UnexpectedEof {
                offset: self.offset,
                needed: count,
            });
        }
        let bytes = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> DocumentResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i16(&mut self) -> DocumentResult<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_i32(&mut self) -> DocumentResult<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u32(&mut self) -> DocumentResult<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i64(&mut self) -> DocumentResult<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn read_u64(&mut self) -> DocumentResult<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> DocumentResult<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> DocumentResult<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Read a fixed-size string field, keeping only the bytes before the first NUL.
    ///
    /// Object names are stored as `Name\0\x01Class`; the class suffix is dropped.
    pub fn read_string(&mut self, size: usize) -> DocumentResult<String> {
        let bytes = self.take(size)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read a u32 or u64 length field depending on the record header width.
    pub fn read_offset(&mut self, wide: bool) -> DocumentResult<u64> {
        if wide {
            self.read_u64()
        } else {
            self.read_u32().map(u64::from)
        }
    }
}
