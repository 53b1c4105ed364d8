//! `lsct` / `lsdv` section divider blocks.
//!
//! Group structure is flattened on disk: a divider of type open or closed
//! marks a group layer, and a bounding divider marks where the group's
//! children end. Blocks of 12 or more bytes override the layer's blend mode
//! (this is where a group's pass-through mode actually lives); 16 byte
//! blocks carry an extra sub-type word that is preserved verbatim.

use std::io::{Seek, Write};

use crate::blend_mode::BlendMode;
use crate::error::{PsdError, Result};
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};
use crate::tagged_block::SIGNATURE_EIGHT_BIM;

/// What a section divider delimits.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SectionDividerType {
    /// Any other type of layer
    Any = 0,
    /// An expanded group
    OpenFolder = 1,
    /// A collapsed group
    ClosedFolder = 2,
    /// The hidden layer that closes a group's child list
    BoundingSection = 3,
}

impl SectionDividerType {
    /// Decode the divider type word.
    pub fn new(value: u32) -> Result<SectionDividerType> {
        match value {
            0 => Ok(SectionDividerType::Any),
            1 => Ok(SectionDividerType::OpenFolder),
            2 => Ok(SectionDividerType::ClosedFolder),
            3 => Ok(SectionDividerType::BoundingSection),
            _ => Err(PsdError::BoundsViolation {
                what: "section divider type",
                value: i64::from(value),
                min: 0,
                max: 3,
            }),
        }
    }
}

/// A parsed `lsct` / `lsdv` block.
#[derive(Debug, Clone)]
pub struct SectionDividerBlock {
    /// `lsct` or `lsdv`, preserved for round-tripping
    pub(crate) key: [u8; 4],
    /// What this divider delimits
    pub divider_type: SectionDividerType,
    /// Blend mode override, present in blocks of 12 bytes or more
    pub blend_mode: Option<BlendMode>,
    /// Sub type word of 16 byte blocks, preserved verbatim
    pub sub_type: Option<u32>,
}

impl SectionDividerBlock {
    /// A divider that opens a group.
    pub fn group(closed: bool, blend_mode: BlendMode) -> SectionDividerBlock {
        SectionDividerBlock {
            key: *b"lsct",
            divider_type: if closed {
                SectionDividerType::ClosedFolder
            } else {
                SectionDividerType::OpenFolder
            },
            blend_mode: Some(blend_mode),
            sub_type: None,
        }
    }

    /// The hidden divider that closes a group.
    pub fn bounding() -> SectionDividerBlock {
        SectionDividerBlock {
            key: *b"lsct",
            divider_type: SectionDividerType::BoundingSection,
            blend_mode: None,
            sub_type: None,
        }
    }

    /// Parse the block body. The optional fields are governed by the body
    /// length.
    pub(crate) fn from_body(key: [u8; 4], body: &[u8]) -> Result<SectionDividerBlock> {
        let mut cursor = PsdCursor::new(body);
        let divider_type = SectionDividerType::new(cursor.read_u32()?)?;

        let blend_mode = if body.len() >= 12 {
            let signature = cursor.read_4()?;
            if signature != SIGNATURE_EIGHT_BIM {
                return Err(PsdError::InvalidSignature {
                    expected: &["8BIM"],
                    found: signature,
                });
            }
            Some(BlendMode::from_fourcc(cursor.read_4()?)?)
        } else {
            None
        };

        let sub_type = if body.len() >= 16 {
            Some(cursor.read_u32()?)
        } else {
            None
        };

        Ok(SectionDividerBlock {
            key,
            divider_type,
            blend_mode,
            sub_type,
        })
    }
}

impl PsdSerialize for SectionDividerBlock {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write_u32(self.divider_type as u32)?;
        if let Some(blend_mode) = self.blend_mode {
            buffer.write(&SIGNATURE_EIGHT_BIM)?;
            buffer.write(&blend_mode.fourcc())?;
        }
        if let Some(sub_type) = self.sub_type {
            buffer.write_u32(sub_type)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn body_of(block: &SectionDividerBlock) -> Vec<u8> {
        let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
        block.write(&mut buffer).unwrap();
        buffer.into_inner().into_inner()
    }

    #[test]
    fn bounding_divider_is_four_bytes() {
        let body = body_of(&SectionDividerBlock::bounding());
        assert_eq!(body, vec![0, 0, 0, 3]);
    }

    #[test]
    fn group_divider_carries_the_blend_override() {
        let block = SectionDividerBlock::group(false, BlendMode::PassThrough);
        let body = body_of(&block);
        assert_eq!(body.len(), 12);
        assert_eq!(&body[8..12], b"pass");

        let parsed = SectionDividerBlock::from_body(*b"lsct", &body).unwrap();
        assert_eq!(parsed.divider_type, SectionDividerType::OpenFolder);
        assert_eq!(parsed.blend_mode, Some(BlendMode::PassThrough));
        assert_eq!(parsed.sub_type, None);
    }

    #[test]
    fn sixteen_byte_blocks_keep_their_sub_type() {
        let block = SectionDividerBlock {
            key: *b"lsct",
            divider_type: SectionDividerType::ClosedFolder,
            blend_mode: Some(BlendMode::Normal),
            sub_type: Some(1),
        };
        let body = body_of(&block);
        assert_eq!(body.len(), 16);

        let parsed = SectionDividerBlock::from_body(*b"lsct", &body).unwrap();
        assert_eq!(parsed.sub_type, Some(1));
    }

    #[test]
    fn invalid_type_is_rejected() {
        let body = 9u32.to_be_bytes().to_vec();
        assert!(SectionDividerBlock::from_body(*b"lsct", &body).is_err());
    }
}
