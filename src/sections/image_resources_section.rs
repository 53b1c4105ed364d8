//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! The third section of the file contains a series of image resource
//! blocks:
//!
//! | Length   | Description                                              |
//! |----------|----------------------------------------------------------|
//! | 4        | Signature: '8BIM'                                        |
//! | 2        | Unique identifier for the resource                       |
//! | Variable | Name: Pascal string, padded to make the size even        |
//! | 4        | Actual size of resource data that follows                |
//! | Variable | The resource data. It is padded to make the size even    |

use std::io::{Seek, Write};

use crate::error::{PsdError, Result};
use crate::sections::length_marker::LengthWidth;
use crate::sections::{round_up, PsdBuffer, PsdCursor, PsdSerialize};
use crate::unicode_string::{read_pascal_string, write_pascal_string};

const EXPECTED_RESOURCE_BLOCK_SIGNATURE: [u8; 4] = *b"8BIM";

/// The ImageResourcesSection is the third major section of a PSD file.
///
/// Resource payloads are preserved verbatim; this crate does not interpret
/// individual resources.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ImageResourcesSection {
    pub(crate) resources: Vec<ImageResource>,
}

/// One image resource block.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageResource {
    /// The resource identifier
    pub id: u16,
    /// The resource's Pascal string name, usually empty
    pub name: String,
    /// The resource payload, without its padding byte
    pub data: Vec<u8>,
}

impl ImageResourcesSection {
    /// Read the section at the cursor, length field included.
    pub fn read(cursor: &mut PsdCursor) -> Result<ImageResourcesSection> {
        let length = u64::from(cursor.read_u32()?);
        let end = cursor.position() + length;

        let mut resources = Vec::new();
        // A resource block is at least 12 bytes
        while cursor.position() + 12 <= end {
            resources.push(ImageResource::read(cursor)?);
        }
        cursor.set_position(end);

        Ok(ImageResourcesSection { resources })
    }

    /// Look up a resource by id.
    pub fn get(&self, id: u16) -> Option<&ImageResource> {
        self.resources.iter().find(|resource| resource.id == id)
    }

    /// All resource blocks in file order.
    pub fn resources(&self) -> &[ImageResource] {
        &self.resources
    }
}

impl PsdSerialize for ImageResourcesSection {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        let marker = buffer.begin_length(LengthWidth::U32, 2)?;
        for resource in &self.resources {
            resource.write(buffer)?;
        }
        buffer.end_length(marker)?;
        Ok(())
    }
}

impl ImageResource {
    fn read(cursor: &mut PsdCursor) -> Result<ImageResource> {
        let signature = cursor.read_4()?;
        if signature != EXPECTED_RESOURCE_BLOCK_SIGNATURE {
            return Err(PsdError::InvalidSignature {
                expected: &["8BIM"],
                found: signature,
            });
        }

        let id = cursor.read_u16()?;
        let name = read_pascal_string(cursor, 2)?;

        let data_len = u64::from(cursor.read_u32()?);
        let data = cursor.read(data_len)?.to_vec();
        cursor.skip(round_up(data_len, 2) - data_len)?;

        Ok(ImageResource { id, name, data })
    }
}

impl PsdSerialize for ImageResource {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write(&EXPECTED_RESOURCE_BLOCK_SIGNATURE)?;
        buffer.write_u16(self.id)?;
        write_pascal_string(buffer, &self.name, 2)?;

        buffer.write_u32(self.data.len() as u32)?;
        buffer.write(&self.data)?;
        let padding = round_up(self.data.len() as u64, 2) - self.data.len() as u64;
        buffer.write_zeros(padding)?;
        Ok(())
    }
}
