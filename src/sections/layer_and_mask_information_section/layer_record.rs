//! One layer record within the layer info section.
//!
//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! | Length                 | Description                                                                      |
//! |------------------------|----------------------------------------------------------------------------------|
//! | 4 * 4                  | Rectangle containing the contents of the layer (top, left, bottom, right)        |
//! | 2                      | Number of channels in the layer                                                  |
//! | 6 or 10 per channel    | Channel id (i16) and channel data length (u32, **PSB** u64)                      |
//! | 4                      | Blend mode signature: '8BIM'                                                     |
//! | 4                      | Blend mode key                                                                   |
//! | 1                      | Opacity. 0 = transparent ... 255 = opaque                                        |
//! | 1                      | Clipping: 0 = base, 1 = non-base                                                 |
//! | 1                      | Flags: bit 0 = transparency protected; bit 1 = visible (inverted); bit 3 = 1 for |
//! |                        | Photoshop 5.0 and later, tells if bit 4 has useful information; bit 4 = pixel    |
//! |                        | data irrelevant to appearance of document                                        |
//! | 1                      | Filler (zero)                                                                    |
//! | 4                      | Length of the extra data field: mask data, blending ranges, name, tagged blocks  |

use std::io::{Seek, Write};

use crate::blend_mode::BlendMode;
use crate::error::Result;
use crate::sections::file_header_section::PsdVersion;
use crate::sections::length_marker::LengthWidth;
use crate::sections::layer_and_mask_information_section::mask::{LayerMask, PsdRect};
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};
use crate::tagged_block::{read_blocks_until, TaggedBlock};
use crate::unicode_string::{read_pascal_string, write_pascal_string};

/// Flag bits of the layer record flags byte.
pub mod layer_flags {
    /// Transparency protected
    pub const TRANSPARENCY_PROTECTED: u8 = 1 << 0;
    /// Set when the layer is hidden
    pub const HIDDEN: u8 = 1 << 1;
    /// Obsolete
    pub const OBSOLETE: u8 = 1 << 2;
    /// Bit 4 carries useful information
    pub const HAS_BIT_4: u8 = 1 << 3;
    /// Pixel data is irrelevant to the appearance of the document
    pub const PIXEL_DATA_IRRELEVANT: u8 = 1 << 4;
}

/// A layer record within the layer info section.
///
/// Channel payloads live after all records; the record only stores each
/// channel's id and byte length (compression tag included).
#[derive(Debug, Clone)]
pub struct LayerRecord {
    /// Rectangle enclosing the layer's pixels
    pub rect: PsdRect,
    /// Per channel: id and on-disk byte length including the 2 byte
    /// compression tag
    pub channel_infos: Vec<(i16, u64)>,
    /// How the layer blends with those below it
    pub blend_mode: BlendMode,
    /// 0 = transparent, 255 = opaque
    pub opacity: u8,
    /// 0 = base, 1 = non-base (clipped to the layer below)
    pub clipping: u8,
    /// Flag bits, see [`layer_flags`]
    pub flags: u8,
    /// The layer's mask record, if any
    pub mask: Option<LayerMask>,
    /// The blending ranges blob, preserved verbatim without its length
    pub blending_ranges: Vec<u8>,
    /// The layer's Pascal string name. The authoritative unicode name
    /// lives in the `luni` tagged block.
    pub name: String,
    /// The layer's tagged blocks, in file order
    pub tagged_blocks: Vec<TaggedBlock>,
}

impl LayerRecord {
    /// Whether the layer is visible (the stored bit marks hidden).
    pub fn visible(&self) -> bool {
        self.flags & layer_flags::HIDDEN == 0
    }

    /// Whether the pixel data is irrelevant to the document's appearance.
    pub fn pixel_data_irrelevant(&self) -> bool {
        self.flags & layer_flags::HAS_BIT_4 != 0
            && self.flags & layer_flags::PIXEL_DATA_IRRELEVANT != 0
    }

    /// The first tagged block matching the predicate.
    pub fn find_block(&self, key: [u8; 4]) -> Option<&TaggedBlock> {
        self.tagged_blocks.iter().find(|block| block.key() == key)
    }

    /// The layer's name, preferring the unicode name block over the Pascal
    /// string.
    pub fn unicode_name(&self) -> &str {
        match self.find_block(*b"luni") {
            Some(TaggedBlock::UnicodeLayerName(name)) => name.as_str(),
            _ => &self.name,
        }
    }

    /// Read one record at the cursor.
    pub(crate) fn read(
        cursor: &mut PsdCursor,
        version: PsdVersion,
        strict: bool,
    ) -> Result<LayerRecord> {
        let rect = PsdRect::read(cursor)?;

        let channel_count = cursor.read_u16()?;
        let mut channel_infos = Vec::with_capacity(channel_count as usize);
        for _ in 0..channel_count {
            let id = cursor.read_i16()?;
            let length = match version {
                PsdVersion::One => u64::from(cursor.read_u32()?),
                PsdVersion::Two => cursor.read_u64()?,
            };
            channel_infos.push((id, length));
        }

        let signature = cursor.read_4()?;
        if signature != *b"8BIM" {
            return Err(crate::error::PsdError::InvalidSignature {
                expected: &["8BIM"],
                found: signature,
            });
        }
        let blend_mode = BlendMode::from_fourcc(cursor.read_4()?)?;
        let opacity = cursor.read_u8()?;
        let clipping = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        // Filler byte
        cursor.read_u8()?;

        let extra_len = u64::from(cursor.read_u32()?);
        let extra_end = cursor.position() + extra_len;

        let mask = LayerMask::read(cursor)?;

        let ranges_len = u64::from(cursor.read_u32()?);
        let blending_ranges = cursor.read(ranges_len)?.to_vec();

        let name = read_pascal_string(cursor, 4)?;

        let tagged_blocks = read_blocks_until(cursor, extra_end, version, 1, strict)?;
        cursor.set_position(extra_end);

        Ok(LayerRecord {
            rect,
            channel_infos,
            blend_mode,
            opacity,
            clipping,
            flags,
            mask,
            blending_ranges,
            name,
            tagged_blocks,
        })
    }

    /// Write the record. The channel lengths in `channel_infos` must
    /// already reflect the compressed payloads that will follow the
    /// records.
    pub(crate) fn write<W: Write + Seek>(
        &self,
        buffer: &mut PsdBuffer<W>,
        version: PsdVersion,
    ) -> Result<()> {
        self.rect.write(buffer)?;

        buffer.write_u16(self.channel_infos.len() as u16)?;
        for (id, length) in &self.channel_infos {
            buffer.write_i16(*id)?;
            match version {
                PsdVersion::One => buffer.write_u32(*length as u32)?,
                PsdVersion::Two => buffer.write_u64(*length)?,
            }
        }

        buffer.write(b"8BIM")?;
        buffer.write(&self.blend_mode.fourcc())?;
        buffer.write_u8(self.opacity)?;
        buffer.write_u8(self.clipping)?;
        buffer.write_u8(self.flags)?;
        buffer.write_u8(0)?;

        let extra = buffer.begin_length(LengthWidth::U32, 2)?;

        LayerMask::write_record(&self.mask, buffer)?;

        buffer.write_u32(self.blending_ranges.len() as u32)?;
        buffer.write(&self.blending_ranges)?;

        write_pascal_string(buffer, &self.name, 4)?;

        for block in &self.tagged_blocks {
            block.write(buffer, version, 1)?;
        }

        buffer.end_length(extra)?;
        Ok(())
    }
}
