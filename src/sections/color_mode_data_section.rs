//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! Only indexed color and duotone have color mode data. For all other modes
//! this section is just the 4-byte length field, which is set to zero.
//!
//! Indexed color images: length is 768; color data contains the color
//! table for the image, in non-interleaved order.
//!
//! Duotone images: color data contains the duotone specification (the
//! format of which is not documented). Other than duotone information, a
//! duotone image is treated the same as a grayscale image.

use std::io::{Seek, Write};

use crate::error::Result;
use crate::sections::length_marker::LengthWidth;
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};

/// The ColorModeDataSection is the second major section of a PSD file.
///
/// The payload is preserved verbatim; duotone and indexed data is
/// round-tripped, not interpreted.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ColorModeDataSection {
    pub(crate) data: Vec<u8>,
}

impl ColorModeDataSection {
    /// Read the section at the cursor, length field included.
    pub fn read(cursor: &mut PsdCursor) -> Result<ColorModeDataSection> {
        let length = u64::from(cursor.read_u32()?);
        Ok(ColorModeDataSection {
            data: cursor.read(length)?.to_vec(),
        })
    }

    /// The raw color table / duotone specification, empty for most modes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl PsdSerialize for ColorModeDataSection {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        let marker = buffer.begin_length(LengthWidth::U32, 1)?;
        buffer.write(&self.data)?;
        buffer.end_length(marker)?;
        Ok(())
    }
}
