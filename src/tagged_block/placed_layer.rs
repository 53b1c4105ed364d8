//! `PlLd` and `SoLd` placed layer blocks.
//!
//! Both describe a smart object placed into a layer. `PlLd` is the older
//! fixed layout; `SoLd` wraps everything in a descriptor and is what
//! current files carry (usually both, for compatibility).

use std::io::{Seek, Write};

use crate::descriptor::{DescriptorStructure, DESCRIPTOR_VERSION};
use crate::error::{PsdError, Result};
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};
use crate::unicode_string::{read_pascal_string, write_pascal_string};

/// The placed layer kind word inside `PlLd`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PlacedLayerKind {
    /// Unknown placement
    Unknown = 0,
    /// Vector data
    Vector = 1,
    /// Rasterized placement
    Raster = 2,
    /// An embedded image stream
    ImageStack = 3,
}

impl PlacedLayerKind {
    fn new(value: u32) -> Result<PlacedLayerKind> {
        match value {
            0 => Ok(PlacedLayerKind::Unknown),
            1 => Ok(PlacedLayerKind::Vector),
            2 => Ok(PlacedLayerKind::Raster),
            3 => Ok(PlacedLayerKind::ImageStack),
            _ => Err(PsdError::BoundsViolation {
                what: "placed layer kind",
                value: i64::from(value),
                min: 0,
                max: 3,
            }),
        }
    }
}

/// A `PlLd` placed layer block.
#[derive(Debug, Clone)]
pub struct PlacedLayerBlock {
    /// The UUID of the linked layer this placement references
    pub unique_id: String,
    /// Page number for multi page sources
    pub page_number: u32,
    /// Total pages of the source
    pub total_pages: u32,
    /// Anti alias policy word
    pub anti_alias: u32,
    /// What kind of placement this is
    pub kind: PlacedLayerKind,
    /// The transform quad as eight doubles in disk order (top-left,
    /// top-right, bottom-right, bottom-left x/y pairs)
    pub transform: [f64; 8],
    /// The warp descriptor, round-tripped by the warp module
    pub warp_descriptor: DescriptorStructure,
}

impl PlacedLayerBlock {
    pub(crate) fn read(cursor: &mut PsdCursor) -> Result<PlacedLayerBlock> {
        let marker = cursor.read_4()?;
        if marker != *b"plcL" {
            return Err(PsdError::InvalidSignature {
                expected: &["plcL"],
                found: marker,
            });
        }

        let version = cursor.read_u32()?;
        if version != 3 {
            return Err(PsdError::UnsupportedVersion {
                version: version as u16,
            });
        }

        let unique_id = read_pascal_string(cursor, 1)?;
        let page_number = cursor.read_u32()?;
        let total_pages = cursor.read_u32()?;
        let anti_alias = cursor.read_u32()?;
        let kind = PlacedLayerKind::new(cursor.read_u32()?)?;

        let mut transform = [0.0; 8];
        for value in transform.iter_mut() {
            *value = cursor.read_f64()?;
        }

        let warp_version = cursor.read_u32()?;
        let descriptor_version = cursor.read_u32()?;
        if warp_version != 0 || descriptor_version != DESCRIPTOR_VERSION {
            return Err(PsdError::CorruptDescriptor(format!(
                "placed layer warp version {} / descriptor version {}, expected 0 / {}",
                warp_version, descriptor_version, DESCRIPTOR_VERSION
            )));
        }
        let warp_descriptor = DescriptorStructure::read(cursor)?;

        Ok(PlacedLayerBlock {
            unique_id,
            page_number,
            total_pages,
            anti_alias,
            kind,
            transform,
            warp_descriptor,
        })
    }
}

impl PsdSerialize for PlacedLayerBlock {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write(b"plcL")?;
        buffer.write_u32(3)?;
        write_pascal_string(buffer, &self.unique_id, 1)?;
        buffer.write_u32(self.page_number)?;
        buffer.write_u32(self.total_pages)?;
        buffer.write_u32(self.anti_alias)?;
        buffer.write_u32(self.kind as u32)?;
        for value in &self.transform {
            buffer.write_f64(*value)?;
        }
        buffer.write_u32(0)?;
        buffer.write_u32(DESCRIPTOR_VERSION)?;
        self.warp_descriptor.write(buffer)
    }
}

/// A `SoLd` placed layer data block: a version pair and one descriptor
/// holding the transform, warp, UUID, size and resolution.
#[derive(Debug, Clone)]
pub struct PlacedLayerDataBlock {
    /// The descriptor carrying the placement
    pub descriptor: DescriptorStructure,
}

impl PlacedLayerDataBlock {
    pub(crate) fn read(cursor: &mut PsdCursor) -> Result<PlacedLayerDataBlock> {
        let marker = cursor.read_4()?;
        if marker != *b"soLD" {
            return Err(PsdError::InvalidSignature {
                expected: &["soLD"],
                found: marker,
            });
        }

        let version = cursor.read_u32()?;
        let descriptor_version = cursor.read_u32()?;
        if version != 4 || descriptor_version != DESCRIPTOR_VERSION {
            return Err(PsdError::CorruptDescriptor(format!(
                "placed layer data version {} / descriptor version {}, expected 4 / {}",
                version, descriptor_version, DESCRIPTOR_VERSION
            )));
        }

        Ok(PlacedLayerDataBlock {
            descriptor: DescriptorStructure::read(cursor)?,
        })
    }
}

impl PsdSerialize for PlacedLayerDataBlock {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write(b"soLD")?;
        buffer.write_u32(4)?;
        buffer.write_u32(DESCRIPTOR_VERSION)?;
        self.descriptor.write(buffer)
    }
}
