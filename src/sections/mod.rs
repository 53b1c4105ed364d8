//! The five major sections of a PSD file and the byte level plumbing they
//! share.
//!
//! Reading goes through [`PsdCursor`], a big-endian view over a byte slice.
//! Writing goes through [`PsdBuffer`], a big-endian view over anything that
//! is `Write + Seek`, so sections can reserve a length field, write their
//! body and back-patch the real size afterwards (see
//! [`length_marker::LengthMarker`]).
//!
//! Every multi-byte integer, float and UTF-16 code unit in a PSD file is
//! big-endian. Floats are moved through their integer bit representation and
//! never reinterpreted by the host.

use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{PsdError, Result};

pub(crate) mod length_marker;

pub(crate) mod color_mode_data_section;
pub(crate) mod file_header_section;
pub(crate) mod image_data_section;
pub(crate) mod image_resources_section;
pub(crate) mod layer_and_mask_information_section;

/// Round `n` up to the next multiple of `m`.
///
/// `m == 1` is the common "no alignment" case and is a no-op.
pub(crate) fn round_up(n: u64, m: u64) -> u64 {
    debug_assert!(m > 0, "alignment must be non-zero");
    if m <= 1 {
        return n;
    }
    n.div_ceil(m) * m
}

/// A Cursor wrapping bytes from a PSD file.
///
/// Provides methods that abstract common ways of parsing PSD bytes.
pub(crate) struct PsdCursor<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PsdCursor<'a> {
    /// Create a new PsdCursor
    pub fn new(bytes: &[u8]) -> PsdCursor {
        PsdCursor {
            cursor: Cursor::new(bytes),
        }
    }

    /// The current byte offset into the underlying slice
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Move the cursor to an absolute offset
    pub fn set_position(&mut self, position: u64) {
        self.cursor.set_position(position);
    }

    /// The total number of bytes backing this cursor
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    /// Bytes left between the cursor and the end of the slice
    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    /// Advance the cursor without looking at the skipped bytes
    pub fn skip(&mut self, n: u64) -> Result<()> {
        if self.remaining() < n {
            return Err(PsdError::UnexpectedEof);
        }
        self.cursor.set_position(self.position() + n);
        Ok(())
    }

    /// Read `n` bytes, advancing the cursor past them.
    pub fn read(&mut self, n: u64) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(PsdError::UnexpectedEof);
        }
        let start = self.position() as usize;
        let end = start + n as usize;
        self.cursor.set_position(end as u64);
        Ok(&self.cursor.get_ref()[start..end])
    }

    /// Read four bytes without advancing the cursor.
    pub fn peek_4(&self) -> Result<[u8; 4]> {
        self.peek_at(self.position())
    }

    /// Read four bytes at an absolute offset without moving the cursor.
    pub fn peek_at(&self, position: u64) -> Result<[u8; 4]> {
        if self.len() < position + 4 {
            return Err(PsdError::UnexpectedEof);
        }
        let start = position as usize;
        let mut four = [0; 4];
        four.copy_from_slice(&self.cursor.get_ref()[start..start + 4]);
        Ok(four)
    }

    /// Read a four byte signature such as `8BPS` or `8BIM`.
    pub fn read_4(&mut self) -> Result<[u8; 4]> {
        let mut four = [0; 4];
        four.copy_from_slice(self.read(4)?);
        Ok(four)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.cursor.read_u8()?)
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.cursor.read_u16::<BigEndian>()?)
    }

    /// Read a big-endian i16
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.cursor.read_i16::<BigEndian>()?)
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.cursor.read_u32::<BigEndian>()?)
    }

    /// Read a big-endian i32
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.cursor.read_i32::<BigEndian>()?)
    }

    /// Read a big-endian u64
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.cursor.read_u64::<BigEndian>()?)
    }

    /// Read a big-endian i64
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.cursor.read_i64::<BigEndian>()?)
    }

    /// Read a big-endian f64 via its bit representation
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read a single byte as a boolean, zero meaning false.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }
}

/// A big-endian writer over anything seekable.
///
/// All sections write through this type so that scoped length markers can
/// rewind and back-patch their size field.
pub(crate) struct PsdBuffer<W> {
    writer: W,
}

impl<W: Write + Seek> PsdBuffer<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> PsdBuffer<W> {
        PsdBuffer { writer }
    }

    /// Unwrap the inner writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// The current write offset
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.writer.stream_position()?)
    }

    /// Move the write offset to an absolute position
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.writer.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Write raw bytes
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        Ok(())
    }

    /// Write a big-endian u16
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.writer.write_u16::<BigEndian>(value)?;
        Ok(())
    }

    /// Write a big-endian i16
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.writer.write_i16::<BigEndian>(value)?;
        Ok(())
    }

    /// Write a big-endian u32
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<BigEndian>(value)?;
        Ok(())
    }

    /// Write a big-endian i32
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.writer.write_i32::<BigEndian>(value)?;
        Ok(())
    }

    /// Write a big-endian u64
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<BigEndian>(value)?;
        Ok(())
    }

    /// Write a big-endian i64
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.writer.write_i64::<BigEndian>(value)?;
        Ok(())
    }

    /// Write a big-endian f64 via its bit representation
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }

    /// Write a boolean as a single byte
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// Write `n` zero bytes
    pub fn write_zeros(&mut self, n: u64) -> Result<()> {
        // Chunked so a large pad does not allocate a large buffer
        let zeros = [0u8; 64];
        let mut remaining = n;
        while remaining > 0 {
            let take = remaining.min(zeros.len() as u64) as usize;
            self.writer.write_all(&zeros[..take])?;
            remaining -= take as u64;
        }
        Ok(())
    }

}

/// Types that know how to write themselves into a [`PsdBuffer`].
pub(crate) trait PsdSerialize {
    /// Serialize `self` at the buffer's current offset.
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_accepts_one_as_noop() {
        assert_eq!(round_up(13, 1), 13);
        assert_eq!(round_up(0, 1), 0);
    }

    #[test]
    fn round_up_aligns() {
        assert_eq!(round_up(13, 4), 16);
        assert_eq!(round_up(16, 4), 16);
        assert_eq!(round_up(1, 2), 2);
        assert_eq!(round_up(0, 4), 0);
    }

    #[test]
    fn cursor_reports_eof() {
        let bytes = [0u8; 3];
        let mut cursor = PsdCursor::new(&bytes);
        assert!(matches!(cursor.read_u32(), Err(PsdError::UnexpectedEof)));
    }

    #[test]
    fn floats_round_trip_bit_exact() {
        let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
        buffer.write_f64(48.0).unwrap();
        buffer
            .write_f64(f64::from_bits(0x7ff8_0000_0000_0001))
            .unwrap();
        let bytes = buffer.into_inner().into_inner();

        let mut cursor = PsdCursor::new(&bytes);
        assert_eq!(cursor.read_f64().unwrap().to_bits(), 48.0f64.to_bits());
        assert_eq!(cursor.read_f64().unwrap().to_bits(), 0x7ff8_0000_0000_0001);
    }
}
