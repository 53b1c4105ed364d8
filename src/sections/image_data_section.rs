//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! The last section of a Photoshop file contains the image pixel data.
//! Image data is stored in planar order: first all the red data, then all
//! the green data, etc. Each plane is stored in scanline order, with no pad
//! bytes.
//!
//! Unlike every other variable section, the composite has no enclosing
//! length field: it simply runs to the end of the file. A single u16
//! compression tag covers all channels, and with RLE the row size table
//! covers `height x channel_count` rows up front.

use std::io::{Seek, Write};

use crate::compression::{self, PsdChannelCompression};
use crate::error::{PsdError, Result};
use crate::sections::file_header_section::{PsdDepth, PsdVersion};
use crate::sections::{PsdBuffer, PsdCursor};

/// The ImageDataSection is the final major section of a PSD file: the
/// merged composite of all visible layers, one plane per channel.
#[derive(Debug, Clone)]
pub struct ImageDataSection {
    pub(crate) compression: PsdChannelCompression,
    /// Decompressed planes in channel order
    pub(crate) channels: Vec<Vec<u8>>,
}

impl ImageDataSection {
    /// Build a composite from decompressed planes.
    pub fn new(compression: PsdChannelCompression, channels: Vec<Vec<u8>>) -> ImageDataSection {
        ImageDataSection {
            compression,
            channels,
        }
    }

    /// A fully zeroed composite, used when a document is assembled in
    /// memory and never flattened.
    pub(crate) fn blank(
        channel_count: usize,
        width: u32,
        height: u32,
        depth: PsdDepth,
    ) -> ImageDataSection {
        let plane = vec![0u8; width as usize * height as usize * depth.bytes_per_sample()];
        ImageDataSection {
            compression: PsdChannelCompression::RleCompressed,
            channels: vec![plane; channel_count],
        }
    }

    /// How the composite is compressed on disk.
    pub fn compression(&self) -> PsdChannelCompression {
        self.compression
    }

    /// The decompressed planes, in channel order.
    pub fn channels(&self) -> &[Vec<u8>] {
        &self.channels
    }

    /// Read the composite from the cursor to the end of the stream.
    pub fn read(
        cursor: &mut PsdCursor,
        width: u32,
        height: u32,
        channel_count: usize,
        depth: PsdDepth,
        version: PsdVersion,
    ) -> Result<ImageDataSection> {
        let compression = PsdChannelCompression::new(cursor.read_u16()?)?;
        let row_bytes = width as usize * depth.bytes_per_sample();
        let plane_len = row_bytes * height as usize;

        let channels = match compression {
            PsdChannelCompression::RawData => {
                let mut channels = Vec::with_capacity(channel_count);
                for _ in 0..channel_count {
                    channels.push(cursor.read(plane_len as u64)?.to_vec());
                }
                channels
            }
            PsdChannelCompression::RleCompressed => {
                // One row table spans every channel's scanlines
                let rest = cursor.read(cursor.remaining())?;
                let merged = compression::rle_decompress(
                    rest,
                    row_bytes,
                    height as usize * channel_count,
                    version,
                )?;
                merged
                    .chunks(plane_len)
                    .map(|chunk| chunk.to_vec())
                    .collect()
            }
            PsdChannelCompression::ZipWithoutPrediction
            | PsdChannelCompression::ZipWithPrediction => {
                let rest = cursor.read(cursor.remaining())?;
                let merged = compression::decompress(
                    rest,
                    compression,
                    width as usize,
                    height as usize * channel_count,
                    depth,
                    version,
                )?;
                merged
                    .chunks(plane_len)
                    .map(|chunk| chunk.to_vec())
                    .collect()
            }
        };

        if channels.len() != channel_count {
            return Err(PsdError::CompressionError(format!(
                "composite decoded {} planes, header promised {}",
                channels.len(),
                channel_count
            )));
        }

        Ok(ImageDataSection {
            compression,
            channels,
        })
    }

    /// Write the compression tag and all planes.
    pub(crate) fn write_section<W: Write + Seek>(
        &self,
        buffer: &mut PsdBuffer<W>,
        width: u32,
        height: u32,
        depth: PsdDepth,
        version: PsdVersion,
    ) -> Result<()> {
        buffer.write_u16(self.compression.tag())?;

        let merged: Vec<u8> = self.channels.concat();
        let payload = compression::compress(
            &merged,
            self.compression,
            width as usize,
            height as usize * self.channels.len(),
            depth,
            version,
        )?;
        buffer.write(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(section: &ImageDataSection, width: u32, height: u32) {
        for version in [PsdVersion::One, PsdVersion::Two] {
            let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
            section
                .write_section(&mut buffer, width, height, PsdDepth::Eight, version)
                .unwrap();
            let bytes = buffer.into_inner().into_inner();

            let mut cursor = PsdCursor::new(&bytes);
            let parsed = ImageDataSection::read(
                &mut cursor,
                width,
                height,
                section.channels.len(),
                PsdDepth::Eight,
                version,
            )
            .unwrap();
            assert_eq!(parsed.channels, section.channels);
            assert_eq!(parsed.compression, section.compression);
        }
    }

    #[test]
    fn rle_composite_round_trips() {
        let section = ImageDataSection::new(
            PsdChannelCompression::RleCompressed,
            vec![vec![255; 8], vec![0; 8], vec![128; 8]],
        );
        round_trip(&section, 4, 2);
    }

    #[test]
    fn raw_and_zip_composites_round_trip() {
        for compression in [
            PsdChannelCompression::RawData,
            PsdChannelCompression::ZipWithoutPrediction,
            PsdChannelCompression::ZipWithPrediction,
        ] {
            let planes: Vec<Vec<u8>> = (0..3u8)
                .map(|c| (0..24).map(|i| i * 3 + c).collect())
                .collect();
            round_trip(&ImageDataSection::new(compression, planes), 6, 4);
        }
    }

    #[test]
    fn blank_composite_matches_the_header_shape() {
        let blank = ImageDataSection::blank(4, 10, 3, PsdDepth::Sixteen);
        assert_eq!(blank.channels.len(), 4);
        assert_eq!(blank.channels[0].len(), 10 * 3 * 2);
    }
}
