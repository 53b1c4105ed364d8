//! The fourth major section of a PSD file: layer records, their channel
//! data, the global mask info and the global tagged blocks.
//!
//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! | Length   | Description                                                                        |
//! |----------|------------------------------------------------------------------------------------|
//! | 4        | Length of the layer and mask information section (**PSB** 8 bytes)                 |
//! | Variable | Layer info: length, layer count, layer records, channel image data                 |
//! | Variable | Global layer mask info                                                             |
//! | Variable | Series of tagged blocks containing various types of data (padded to 4)             |
//!
//! Sixteen and thirty-two bit files store an empty layer info here and nest
//! the real one inside an `Lr16` / `Lr32` global tagged block.

use std::io::{Seek, Write};

use rayon::prelude::*;

use crate::compression::PsdChannelCompression;
use crate::error::{PsdError, Result};
use crate::progress::ProgressCallback;
use crate::psd_channel::{PsdChannel, PsdChannelKind};
use crate::sections::file_header_section::{ColorMode, PsdDepth, PsdVersion};
use crate::sections::length_marker::LengthWidth;
use crate::sections::{PsdBuffer, PsdCursor};
use crate::tagged_block::{length_width_for, TaggedBlock, SIGNATURE_EIGHT_BIM};

pub(crate) mod layer_record;
pub(crate) mod mask;

pub use layer_record::{layer_flags, LayerRecord};
pub use mask::{mask_flags, LayerMask, MaskParameters, PsdRect, RealUserMask};

/// One on-disk layer: its record plus its channel payloads.
#[derive(Debug, Clone)]
pub struct FlatLayer {
    /// The layer record
    pub record: LayerRecord,
    /// The channels in record order
    pub channels: Vec<PsdChannel>,
}

/// The LayerAndMaskInformationSection comes from the fourth section of the
/// PSD.
///
/// Layers are stored in file order, bottom-most first; the layered file
/// model turns this flat list into a tree using the section divider blocks.
#[derive(Debug, Clone, Default)]
pub struct LayerAndMaskInformationSection {
    /// Whether the first alpha channel of the composite holds merged
    /// transparency (negative layer count on disk)
    pub(crate) merged_alpha: bool,
    /// Layers bottom-most first
    pub(crate) layers: Vec<FlatLayer>,
    /// The global layer mask info blob, preserved verbatim
    pub(crate) global_mask_info: Vec<u8>,
    /// Global tagged blocks other than the nested `Lr16`/`Lr32` layer info
    pub(crate) global_blocks: Vec<TaggedBlock>,
}

impl LayerAndMaskInformationSection {
    /// Read the section at the cursor, length field included.
    pub(crate) fn read(
        cursor: &mut PsdCursor,
        version: PsdVersion,
        depth: PsdDepth,
        color_mode: ColorMode,
        strict: bool,
    ) -> Result<LayerAndMaskInformationSection> {
        let length = match version {
            PsdVersion::One => u64::from(cursor.read_u32()?),
            PsdVersion::Two => cursor.read_u64()?,
        };
        let end = cursor.position() + length;

        let mut section = LayerAndMaskInformationSection::default();
        if length == 0 {
            return Ok(section);
        }

        // Layer info with its own length prefix. Zero for 16/32 bit files,
        // whose layers live in an Lr16/Lr32 block below.
        let info_length = match version {
            PsdVersion::One => u64::from(cursor.read_u32()?),
            PsdVersion::Two => cursor.read_u64()?,
        };
        let info_end = cursor.position() + info_length;
        if info_length > 0 {
            let (merged_alpha, layers) =
                read_layer_info(cursor, version, depth, color_mode, strict)?;
            section.merged_alpha = merged_alpha;
            section.layers = layers;
        }
        cursor.set_position(info_end);

        // Global layer mask info
        if cursor.position() + 4 <= end {
            let mask_info_length = u64::from(cursor.read_u32()?);
            section.global_mask_info = cursor.read(mask_info_length)?.to_vec();
        }

        // Global tagged blocks, padded to 4
        while cursor.position() + 12 <= end && TaggedBlock::peek(cursor) {
            let key = peek_key(cursor)?;
            if key == *b"Lr16" || key == *b"Lr32" {
                // Consume the header ourselves and parse the nested layer
                // info, which has no inner length prefix.
                cursor.skip(8)?;
                let nested_length = match length_width_for(key, version) {
                    LengthWidth::U32 => u64::from(cursor.read_u32()?),
                    LengthWidth::U64 => cursor.read_u64()?,
                };
                let nested_end = cursor.position() + nested_length;
                let (merged_alpha, layers) =
                    read_layer_info(cursor, version, depth, color_mode, strict)?;
                section.merged_alpha = merged_alpha;
                section.layers = layers;
                cursor.set_position(nested_end.min(end));
                // The block body is padded to 4
                let padding = (4 - (nested_length % 4)) % 4;
                cursor.skip(padding.min(cursor.remaining()))?;
            } else {
                section
                    .global_blocks
                    .push(TaggedBlock::read(cursor, version, 4, strict)?);
            }
        }

        cursor.set_position(end);
        Ok(section)
    }

    /// The number of channels across every layer, for progress reporting.
    pub(crate) fn channel_count(&self) -> u64 {
        self.layers
            .iter()
            .map(|layer| layer.channels.len() as u64)
            .sum()
    }

    /// Write the section, nesting the layer info inside `Lr16`/`Lr32` for
    /// deep files.
    pub(crate) fn write<W: Write + Seek>(
        &self,
        buffer: &mut PsdBuffer<W>,
        version: PsdVersion,
        depth: PsdDepth,
        progress: &mut dyn ProgressCallback,
    ) -> Result<()> {
        // Compress every channel up front so records can carry the real
        // byte counts. Channels are independent, so this fans out.
        if progress.is_cancelled() {
            return Err(PsdError::Cancelled);
        }
        let payloads = self.materialize_payloads(version)?;
        for channel_payloads in &payloads {
            for _ in channel_payloads {
                progress.increment();
            }
        }
        if progress.is_cancelled() {
            return Err(PsdError::Cancelled);
        }

        let marker = buffer.begin_length(LengthWidth::variadic(version), 2)?;

        match depth {
            PsdDepth::Sixteen | PsdDepth::ThirtyTwo => {
                // Empty outer layer info
                match version {
                    PsdVersion::One => buffer.write_u32(0)?,
                    PsdVersion::Two => buffer.write_u64(0)?,
                }
                self.write_global_mask_info(buffer)?;

                let key = if depth == PsdDepth::Sixteen {
                    *b"Lr16"
                } else {
                    *b"Lr32"
                };
                buffer.write(&SIGNATURE_EIGHT_BIM)?;
                buffer.write(&key)?;
                let nested = buffer.begin_length(length_width_for(key, version), 4)?;
                self.write_layer_info(buffer, version, &payloads)?;
                buffer.end_length(nested)?;
            }
            _ => {
                let info = buffer.begin_length(LengthWidth::variadic(version), 2)?;
                if !self.layers.is_empty() {
                    self.write_layer_info(buffer, version, &payloads)?;
                }
                buffer.end_length(info)?;
                self.write_global_mask_info(buffer)?;
            }
        }

        for block in &self.global_blocks {
            block.write(buffer, version, 4)?;
        }

        buffer.end_length(marker)?;
        Ok(())
    }

    /// Compress all channels, layer by layer, in parallel.
    fn materialize_payloads(&self, version: PsdVersion) -> Result<Vec<Vec<Vec<u8>>>> {
        self.layers
            .par_iter()
            .map(|layer| {
                layer
                    .channels
                    .par_iter()
                    .map(|channel| channel.payload_for(version))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    fn write_global_mask_info<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write_u32(self.global_mask_info.len() as u32)?;
        buffer.write(&self.global_mask_info)
    }

    /// Write layer count, records and channel data.
    fn write_layer_info<W: Write + Seek>(
        &self,
        buffer: &mut PsdBuffer<W>,
        version: PsdVersion,
        payloads: &[Vec<Vec<u8>>],
    ) -> Result<()> {
        let count = self.layers.len() as i16;
        buffer.write_i16(if self.merged_alpha { -count } else { count })?;

        // Records first, with channel lengths matching the payloads that
        // follow
        for (layer, channel_payloads) in self.layers.iter().zip(payloads) {
            let mut record = layer.record.clone();
            record.channel_infos = layer
                .channels
                .iter()
                .zip(channel_payloads)
                .map(|(channel, payload)| (channel.kind().id(), payload.len() as u64 + 2))
                .collect();
            record.write(buffer, version)?;
        }

        // Then every layer's channel data in the same order
        for (layer, channel_payloads) in self.layers.iter().zip(payloads) {
            for (channel, payload) in layer.channels.iter().zip(channel_payloads) {
                buffer.write_u16(channel.compression().tag())?;
                buffer.write(payload)?;
            }
        }
        Ok(())
    }
}

/// Peek the tagged block key one word past the signature.
fn peek_key(cursor: &PsdCursor) -> Result<[u8; 4]> {
    cursor.peek_at(cursor.position() + 4)
}

/// Read layer count, records and channel data.
fn read_layer_info(
    cursor: &mut PsdCursor,
    version: PsdVersion,
    depth: PsdDepth,
    color_mode: ColorMode,
    strict: bool,
) -> Result<(bool, Vec<FlatLayer>)> {
    let raw_count = cursor.read_i16()?;
    let merged_alpha = raw_count < 0;
    let count = raw_count.unsigned_abs();

    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(LayerRecord::read(cursor, version, strict)?);
    }

    let mut layers = Vec::with_capacity(records.len());
    for record in records {
        let mut channels = Vec::with_capacity(record.channel_infos.len());
        for (id, length) in &record.channel_infos {
            let compression = PsdChannelCompression::new(cursor.read_u16()?)?;
            let payload = cursor.read(length.saturating_sub(2))?.to_vec();

            let kind = PsdChannelKind::new(*id, color_mode)?;
            let (width, height) = channel_dimensions(&record, kind);
            channels.push(PsdChannel::from_compressed(
                kind,
                compression,
                payload,
                width,
                height,
                depth,
                version,
            ));
        }
        layers.push(FlatLayer { record, channels });
    }

    Ok((merged_alpha, layers))
}

/// Mask channels cover the mask rectangle, everything else covers the
/// layer rectangle.
fn channel_dimensions(record: &LayerRecord, kind: PsdChannelKind) -> (u32, u32) {
    let rect = match kind {
        PsdChannelKind::UserSuppliedLayerMask => {
            record.mask.map(|mask| mask.rect).unwrap_or_default()
        }
        PsdChannelKind::RealUserSuppliedLayerMask => record
            .mask
            .and_then(|mask| mask.real)
            .map(|real| real.rect)
            .or_else(|| record.mask.map(|mask| mask.rect))
            .unwrap_or_default(),
        _ => record.rect,
    };
    (rect.width(), rect.height())
}
