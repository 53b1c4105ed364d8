//! The two string encodings used throughout a PSD file.
//!
//! Unicode strings are a 4-byte code unit count followed by UTF-16-BE code
//! units, padded so the whole structure (length word included) lands on the
//! caller's alignment. Pascal strings are a single length byte followed by
//! raw bytes, padded the same way. Empty strings still carry their length
//! field.

use std::io::{Seek, Write};

use serde::Serialize;

use crate::error::{PsdError, Result};
use crate::sections::{round_up, PsdBuffer, PsdCursor};

/// A string stored on disk as UTF-16-BE with a leading code unit count.
///
/// In memory the text is kept as UTF-8; the conversion in both directions is
/// validated and fails with [`PsdError::InvalidEncoding`] rather than
/// producing replacement characters.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct UnicodeString(String);

impl UnicodeString {
    /// Wrap an owned string
    pub fn new(value: impl Into<String>) -> UnicodeString {
        UnicodeString(value.into())
    }

    /// The text as UTF-8
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the UTF-8 text
    pub fn into_string(self) -> String {
        self.0
    }

    /// Read a unicode string whose total on-disk size (length word included)
    /// is aligned to `padding`.
    pub(crate) fn read(cursor: &mut PsdCursor, padding: u64) -> Result<UnicodeString> {
        let code_units = u64::from(cursor.read_u32()?);
        let bytes = cursor.read(code_units * 2)?;

        let mut units = Vec::with_capacity(code_units as usize);
        for pair in bytes.chunks_exact(2) {
            units.push(u16::from_be_bytes([pair[0], pair[1]]));
        }
        // Trailing null code units are allowed and not part of the text
        while units.last() == Some(&0) {
            units.pop();
        }
        let value = String::from_utf16(&units)
            .map_err(|err| PsdError::InvalidEncoding(err.to_string()))?;

        let total = 4 + code_units * 2;
        cursor.skip(round_up(total, padding) - total)?;
        Ok(UnicodeString(value))
    }

    /// Write the string aligned to `padding` (length word included in the
    /// padded total).
    pub(crate) fn write<W: Write + Seek>(
        &self,
        buffer: &mut PsdBuffer<W>,
        padding: u64,
    ) -> Result<()> {
        let units: Vec<u16> = self.0.encode_utf16().collect();
        let count = u32::try_from(units.len()).map_err(|_| {
            PsdError::InvalidEncoding("string exceeds the 32-bit code unit count".to_string())
        })?;
        buffer.write_u32(count)?;
        for unit in &units {
            buffer.write_u16(*unit)?;
        }

        let total = 4 + units.len() as u64 * 2;
        buffer.write_zeros(round_up(total, padding) - total)?;
        Ok(())
    }
}

impl From<&str> for UnicodeString {
    fn from(value: &str) -> Self {
        UnicodeString(value.to_string())
    }
}

/// Read a Pascal string: one length byte, `length` bytes of text, padded so
/// the total (length byte included) is a multiple of `padding`.
pub(crate) fn read_pascal_string(cursor: &mut PsdCursor, padding: u64) -> Result<String> {
    let length = u64::from(cursor.read_u8()?);
    let bytes = cursor.read(length)?;
    let value = String::from_utf8_lossy(bytes).into_owned();

    let total = 1 + length;
    cursor.skip(round_up(total, padding) - total)?;
    Ok(value)
}

/// Write a Pascal string padded to `padding`. Strings longer than 255 bytes
/// are truncated at a character boundary, matching what the authoring tool
/// does with over-long layer names.
pub(crate) fn write_pascal_string<W: Write + Seek>(
    buffer: &mut PsdBuffer<W>,
    value: &str,
    padding: u64,
) -> Result<()> {
    let mut bytes = value.as_bytes();
    if bytes.len() > 255 {
        let mut end = 255;
        while end > 0 && !value.is_char_boundary(end) {
            end -= 1;
        }
        bytes = &bytes[..end];
    }
    buffer.write_u8(bytes.len() as u8)?;
    buffer.write(bytes)?;

    let total = 1 + bytes.len() as u64;
    buffer.write_zeros(round_up(total, padding) - total)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_unicode(value: &str, padding: u64) -> Vec<u8> {
        let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
        UnicodeString::new(value).write(&mut buffer, padding).unwrap();
        buffer.into_inner().into_inner()
    }

    #[test]
    fn empty_string_still_carries_its_length_word() {
        let bytes = write_unicode("", 1);
        assert_eq!(bytes, vec![0, 0, 0, 0]);
    }

    #[test]
    fn unicode_round_trips_with_padding() {
        for padding in [1, 2, 4] {
            for value in ["a", "Gruppe 1", "日本語レイヤー", ""] {
                let bytes = write_unicode(value, padding);
                assert_eq!(bytes.len() as u64 % padding, 0);

                let mut cursor = PsdCursor::new(&bytes);
                let read = UnicodeString::read(&mut cursor, padding).unwrap();
                assert_eq!(read.as_str(), value);
                assert_eq!(cursor.position(), bytes.len() as u64);
            }
        }
    }

    #[test]
    fn four_byte_padding_appends_null_code_units() {
        // 1 code unit: 4 + 2 = 6 bytes, padded to 8 with a null code unit
        let bytes = write_unicode("a", 4);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[6..], &[0, 0]);

        let mut cursor = PsdCursor::new(&bytes);
        assert_eq!(
            UnicodeString::read(&mut cursor, 4).unwrap().as_str(),
            "a"
        );
    }

    #[test]
    fn invalid_utf16_is_rejected() {
        // A lone high surrogate
        let bytes = [0, 0, 0, 1, 0xD8, 0x00];
        let mut cursor = PsdCursor::new(&bytes);
        assert!(matches!(
            UnicodeString::read(&mut cursor, 1),
            Err(PsdError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn pascal_string_round_trips() {
        for padding in [1, 2, 4] {
            let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
            write_pascal_string(&mut buffer, "Background", padding).unwrap();
            let bytes = buffer.into_inner().into_inner();
            assert_eq!(bytes.len() as u64 % padding, 0);

            let mut cursor = PsdCursor::new(&bytes);
            assert_eq!(read_pascal_string(&mut cursor, padding).unwrap(), "Background");
            assert_eq!(cursor.position(), bytes.len() as u64);
        }
    }
}
