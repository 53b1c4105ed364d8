//! Layer mask / adjustment layer data.
//!
//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! | Length | Description                                                       |
//! |--------|-------------------------------------------------------------------|
//! | 4      | Size of the data: 0, 20 or 36                                     |
//! | 16     | Rectangle enclosing layer mask: Top, left, bottom, right          |
//! | 1      | Default color. 0 or 255                                           |
//! | 1      | Flags                                                             |
//! | ...    | Mask parameters, only present if flag bit 4 is set                |
//! | 18     | Real user mask: flags, background, rectangle (36 byte masks only) |
//! | 2      | Padding when the size is 20                                       |

use std::io::{Seek, Write};

use crate::error::{PsdError, Result};
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};

/// A rectangle as stored on disk: top, left, bottom, right.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PsdRect {
    /// Top edge in document space
    pub top: i32,
    /// Left edge in document space
    pub left: i32,
    /// Bottom edge, exclusive
    pub bottom: i32,
    /// Right edge, exclusive
    pub right: i32,
}

impl PsdRect {
    /// A rectangle from its four edges.
    pub fn new(top: i32, left: i32, bottom: i32, right: i32) -> PsdRect {
        PsdRect {
            top,
            left,
            bottom,
            right,
        }
    }

    /// The rectangle's width, zero when degenerate.
    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    /// The rectangle's height, zero when degenerate.
    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    pub(crate) fn read(cursor: &mut PsdCursor) -> Result<PsdRect> {
        Ok(PsdRect {
            top: cursor.read_i32()?,
            left: cursor.read_i32()?,
            bottom: cursor.read_i32()?,
            right: cursor.read_i32()?,
        })
    }
}

impl PsdSerialize for PsdRect {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write_i32(self.top)?;
        buffer.write_i32(self.left)?;
        buffer.write_i32(self.bottom)?;
        buffer.write_i32(self.right)
    }
}

/// Flag bits of the mask flags byte.
pub mod mask_flags {
    /// Position is relative to the layer
    pub const POSITION_RELATIVE: u8 = 1 << 0;
    /// The mask is disabled
    pub const DISABLED: u8 = 1 << 1;
    /// Invert the mask when blending (obsolete)
    pub const INVERT: u8 = 1 << 2;
    /// The mask came from rendering other data
    pub const FROM_RENDER: u8 = 1 << 3;
    /// The mask has parameters applied to it
    pub const HAS_PARAMETERS: u8 = 1 << 4;
}

/// Optional density / feather values, present when the flags byte has
/// [`mask_flags::HAS_PARAMETERS`] set.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct MaskParameters {
    /// User mask density, 0..=255
    pub user_density: Option<u8>,
    /// User mask feather in pixels
    pub user_feather: Option<f64>,
    /// Vector mask density, 0..=255
    pub vector_density: Option<u8>,
    /// Vector mask feather in pixels
    pub vector_feather: Option<f64>,
}

impl MaskParameters {
    fn read(cursor: &mut PsdCursor) -> Result<MaskParameters> {
        let which = cursor.read_u8()?;
        let mut parameters = MaskParameters::default();
        if which & 1 != 0 {
            parameters.user_density = Some(cursor.read_u8()?);
        }
        if which & 2 != 0 {
            parameters.user_feather = Some(cursor.read_f64()?);
        }
        if which & 4 != 0 {
            parameters.vector_density = Some(cursor.read_u8()?);
        }
        if which & 8 != 0 {
            parameters.vector_feather = Some(cursor.read_f64()?);
        }
        Ok(parameters)
    }

    fn byte_len(&self) -> u64 {
        1 + self.user_density.map_or(0, |_| 1)
            + self.user_feather.map_or(0, |_| 8)
            + self.vector_density.map_or(0, |_| 1)
            + self.vector_feather.map_or(0, |_| 8)
    }
}

impl PsdSerialize for MaskParameters {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        let mut which = 0u8;
        if self.user_density.is_some() {
            which |= 1;
        }
        if self.user_feather.is_some() {
            which |= 2;
        }
        if self.vector_density.is_some() {
            which |= 4;
        }
        if self.vector_feather.is_some() {
            which |= 8;
        }
        buffer.write_u8(which)?;
        if let Some(density) = self.user_density {
            buffer.write_u8(density)?;
        }
        if let Some(feather) = self.user_feather {
            buffer.write_f64(feather)?;
        }
        if let Some(density) = self.vector_density {
            buffer.write_u8(density)?;
        }
        if let Some(feather) = self.vector_feather {
            buffer.write_f64(feather)?;
        }
        Ok(())
    }
}

/// The real user mask sub-record of 36 byte masks.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RealUserMask {
    /// Same flag bits as the outer mask
    pub flags: u8,
    /// Background color, 0 or 255
    pub background: u8,
    /// Rectangle enclosing the real user mask
    pub rect: PsdRect,
}

/// A layer's mask record.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct LayerMask {
    /// Rectangle enclosing the mask channel
    pub rect: PsdRect,
    /// Default color outside the rectangle, 0 or 255
    pub default_color: u8,
    /// Flag bits, see [`mask_flags`]
    pub flags: u8,
    /// Density / feather parameters, when flag bit 4 is set
    pub parameters: Option<MaskParameters>,
    /// The real user mask of 36 byte records
    pub real: Option<RealUserMask>,
}

impl LayerMask {
    /// Read the length-prefixed mask record; `Ok(None)` when the length is
    /// zero.
    pub(crate) fn read(cursor: &mut PsdCursor) -> Result<Option<LayerMask>> {
        let length = u64::from(cursor.read_u32()?);
        if length == 0 {
            return Ok(None);
        }
        let end = cursor.position() + length;

        let rect = PsdRect::read(cursor)?;
        let default_color = cursor.read_u8()?;
        let flags = cursor.read_u8()?;

        let parameters = if flags & mask_flags::HAS_PARAMETERS != 0 {
            Some(MaskParameters::read(cursor)?)
        } else {
            None
        };

        // 18 bytes of real user mask fit before the record's end; a 20 byte
        // record only has its two padding bytes left.
        let real = if end - cursor.position() >= 18 {
            let flags = cursor.read_u8()?;
            let background = cursor.read_u8()?;
            let rect = PsdRect::read(cursor)?;
            Some(RealUserMask {
                flags,
                background,
                rect,
            })
        } else {
            None
        };

        if cursor.position() > end {
            return Err(PsdError::PaddingViolation(
                "mask record overran its length".to_string(),
            ));
        }
        cursor.set_position(end);
        Ok(Some(LayerMask {
            rect,
            default_color,
            flags,
            parameters,
            real,
        }))
    }

    /// Write the length-prefixed record; an absent mask is a zero length.
    pub(crate) fn write_record<W: Write + Seek>(
        mask: &Option<LayerMask>,
        buffer: &mut PsdBuffer<W>,
    ) -> Result<()> {
        let mask = match mask {
            Some(mask) => mask,
            None => return buffer.write_u32(0),
        };

        let parameter_len = mask.parameters.map_or(0, |p| p.byte_len());
        let length = if mask.real.is_some() {
            18 + parameter_len + 18
        } else {
            // Two padding bytes round the 18 byte body up to 20
            18 + parameter_len + 2
        };
        buffer.write_u32(length as u32)?;

        mask.rect.write(buffer)?;
        buffer.write_u8(mask.default_color)?;
        buffer.write_u8(mask.flags)?;
        if let Some(parameters) = &mask.parameters {
            parameters.write(buffer)?;
        }
        match &mask.real {
            Some(real) => {
                buffer.write_u8(real.flags)?;
                buffer.write_u8(real.background)?;
                real.rect.write(buffer)?;
            }
            None => buffer.write_zeros(2)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(mask: Option<LayerMask>) -> (Option<LayerMask>, usize) {
        let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
        LayerMask::write_record(&mask, &mut buffer).unwrap();
        let bytes = buffer.into_inner().into_inner();

        let mut cursor = PsdCursor::new(&bytes);
        let parsed = LayerMask::read(&mut cursor).unwrap();
        assert_eq!(cursor.position(), bytes.len() as u64);
        (parsed, bytes.len() - 4)
    }

    #[test]
    fn missing_mask_is_a_zero_length() {
        let (parsed, length) = round_trip(None);
        assert_eq!(parsed, None);
        assert_eq!(length, 0);
    }

    #[test]
    fn single_mask_occupies_twenty_bytes() {
        let mask = LayerMask {
            rect: PsdRect::new(0, 0, 32, 32),
            default_color: 255,
            flags: mask_flags::DISABLED,
            parameters: None,
            real: None,
        };
        let (parsed, length) = round_trip(Some(mask));
        assert_eq!(length, 20);
        assert_eq!(parsed, Some(mask));
    }

    #[test]
    fn real_user_mask_occupies_thirty_six_bytes() {
        let mask = LayerMask {
            rect: PsdRect::new(4, 4, 16, 16),
            default_color: 0,
            flags: 0,
            parameters: None,
            real: Some(RealUserMask {
                flags: mask_flags::POSITION_RELATIVE,
                background: 255,
                rect: PsdRect::new(0, 0, 8, 8),
            }),
        };
        let (parsed, length) = round_trip(Some(mask));
        assert_eq!(length, 36);
        assert_eq!(parsed, Some(mask));
    }

    #[test]
    fn parameters_extend_the_record() {
        let mask = LayerMask {
            rect: PsdRect::new(0, 0, 2, 2),
            default_color: 255,
            flags: mask_flags::HAS_PARAMETERS,
            parameters: Some(MaskParameters {
                user_density: Some(128),
                user_feather: Some(2.5),
                vector_density: None,
                vector_feather: None,
            }),
            real: None,
        };
        let (parsed, _) = round_trip(Some(mask));
        let parsed = parsed.unwrap();
        let parameters = parsed.parameters.unwrap();
        assert_eq!(parameters.user_density, Some(128));
        assert_eq!(parameters.user_feather, Some(2.5));
        assert_eq!(parameters.vector_feather, None);
    }
}
