//! Per-layer channel storage.
//!
//! A layer keeps one [`PsdChannel`] per channel id. Channels hold their
//! compressed payload exactly as it appeared on disk and only decompress on
//! access; writing a document back without touching the pixels re-emits the
//! original payload byte for byte.

use crate::compression::{self, PsdChannelCompression};
use crate::error::{PsdError, Result};
use crate::sections::file_header_section::{ColorMode, PsdDepth, PsdVersion};

/// The different kinds of channels in a layer (red, green, blue, ...).
///
/// What a non-negative channel id means depends on the document's color
/// mode; the negative ids are mode independent.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone)]
#[allow(missing_docs)]
pub enum PsdChannelKind {
    Red,
    Green,
    Blue,
    Cyan,
    Magenta,
    Yellow,
    Black,
    Gray,
    Lightness,
    GreenRed,
    BlueYellow,
    /// A spot or extra alpha channel with the given positive id
    Spot(i16),
    /// The layer's transparency data, id -1
    TransparencyMask,
    /// The user supplied layer mask, id -2
    UserSuppliedLayerMask,
    /// The real user supplied layer mask, present when both a user mask and
    /// a vector mask exist, id -3
    RealUserSuppliedLayerMask,
}

impl PsdChannelKind {
    /// Map an on-disk channel id to its meaning under a color mode.
    pub fn new(channel_id: i16, color_mode: ColorMode) -> Result<PsdChannelKind> {
        let kind = match (channel_id, color_mode) {
            (-1, _) => PsdChannelKind::TransparencyMask,
            (-2, _) => PsdChannelKind::UserSuppliedLayerMask,
            (-3, _) => PsdChannelKind::RealUserSuppliedLayerMask,
            (0, ColorMode::Rgb) => PsdChannelKind::Red,
            (1, ColorMode::Rgb) => PsdChannelKind::Green,
            (2, ColorMode::Rgb) => PsdChannelKind::Blue,
            (0, ColorMode::Cmyk) => PsdChannelKind::Cyan,
            (1, ColorMode::Cmyk) => PsdChannelKind::Magenta,
            (2, ColorMode::Cmyk) => PsdChannelKind::Yellow,
            (3, ColorMode::Cmyk) => PsdChannelKind::Black,
            (0, ColorMode::Lab) => PsdChannelKind::Lightness,
            (1, ColorMode::Lab) => PsdChannelKind::GreenRed,
            (2, ColorMode::Lab) => PsdChannelKind::BlueYellow,
            (
                0,
                ColorMode::Grayscale
                | ColorMode::Duotone
                | ColorMode::Bitmap
                | ColorMode::Indexed
                | ColorMode::Multichannel,
            ) => PsdChannelKind::Gray,
            (id, _) if id > 0 => PsdChannelKind::Spot(id),
            (id, _) => {
                return Err(PsdError::BoundsViolation {
                    what: "channel id",
                    value: i64::from(id),
                    min: -3,
                    max: 56,
                })
            }
        };
        Ok(kind)
    }

    /// The id written to disk.
    pub fn id(&self) -> i16 {
        match self {
            PsdChannelKind::Red
            | PsdChannelKind::Cyan
            | PsdChannelKind::Gray
            | PsdChannelKind::Lightness => 0,
            PsdChannelKind::Green | PsdChannelKind::Magenta | PsdChannelKind::GreenRed => 1,
            PsdChannelKind::Blue | PsdChannelKind::Yellow | PsdChannelKind::BlueYellow => 2,
            PsdChannelKind::Black => 3,
            PsdChannelKind::Spot(id) => *id,
            PsdChannelKind::TransparencyMask => -1,
            PsdChannelKind::UserSuppliedLayerMask => -2,
            PsdChannelKind::RealUserSuppliedLayerMask => -3,
        }
    }

    /// Whether this channel belongs to a layer or real user mask rather
    /// than the layer rectangle.
    pub fn is_mask(&self) -> bool {
        matches!(
            self,
            PsdChannelKind::UserSuppliedLayerMask | PsdChannelKind::RealUserSuppliedLayerMask
        )
    }
}

/// One channel of a layer: the compressed payload plus enough context to
/// decompress it on demand.
#[derive(Debug, Clone)]
pub struct PsdChannel {
    kind: PsdChannelKind,
    compression: PsdChannelCompression,
    /// Everything after the compression tag, including any RLE row table
    data: Vec<u8>,
    width: u32,
    height: u32,
    depth: PsdDepth,
    /// The version whose row size table width the payload uses
    version: PsdVersion,
}

impl PsdChannel {
    /// Wrap an already compressed payload read from disk.
    pub(crate) fn from_compressed(
        kind: PsdChannelKind,
        compression: PsdChannelCompression,
        data: Vec<u8>,
        width: u32,
        height: u32,
        depth: PsdDepth,
        version: PsdVersion,
    ) -> PsdChannel {
        PsdChannel {
            kind,
            compression,
            data,
            width,
            height,
            depth,
            version,
        }
    }

    /// Compress a raster of big-endian samples into a channel.
    pub fn from_raw(
        kind: PsdChannelKind,
        raw: &[u8],
        width: u32,
        height: u32,
        depth: PsdDepth,
        version: PsdVersion,
        compression: PsdChannelCompression,
    ) -> Result<PsdChannel> {
        let data = compression::compress(
            raw,
            compression,
            width as usize,
            height as usize,
            depth,
            version,
        )?;
        Ok(PsdChannel {
            kind,
            compression,
            data,
            width,
            height,
            depth,
            version,
        })
    }

    /// This channel's kind
    pub fn kind(&self) -> PsdChannelKind {
        self.kind
    }

    /// How the payload is compressed
    pub fn compression(&self) -> PsdChannelCompression {
        self.compression
    }

    /// The raster width this channel covers
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The raster height this channel covers
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decompress into `height` rows of big-endian samples.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        compression::decompress(
            &self.data,
            self.compression,
            self.width as usize,
            self.height as usize,
            self.depth,
            self.version,
        )
    }

    /// The payload as stored after the compression tag, re-encoded if the
    /// target version uses a different RLE row table width.
    pub(crate) fn payload_for(&self, version: PsdVersion) -> Result<Vec<u8>> {
        if version == self.version || self.compression != PsdChannelCompression::RleCompressed {
            return Ok(self.data.clone());
        }
        let raw = self.bytes()?;
        compression::compress(
            &raw,
            self.compression,
            self.width as usize,
            self.height as usize,
            self.depth,
            version,
        )
    }

    /// Re-encode the channel with a different codec.
    pub fn recompress(&mut self, compression: PsdChannelCompression) -> Result<()> {
        if compression == self.compression {
            return Ok(());
        }
        let raw = self.bytes()?;
        self.data = compression::compress(
            &raw,
            compression,
            self.width as usize,
            self.height as usize,
            self.depth,
            self.version,
        )?;
        self.compression = compression;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_depend_on_color_mode() {
        assert_eq!(
            PsdChannelKind::new(0, ColorMode::Rgb).unwrap(),
            PsdChannelKind::Red
        );
        assert_eq!(
            PsdChannelKind::new(0, ColorMode::Cmyk).unwrap(),
            PsdChannelKind::Cyan
        );
        assert_eq!(
            PsdChannelKind::new(0, ColorMode::Grayscale).unwrap(),
            PsdChannelKind::Gray
        );
        assert_eq!(
            PsdChannelKind::new(3, ColorMode::Cmyk).unwrap(),
            PsdChannelKind::Black
        );
        assert_eq!(
            PsdChannelKind::new(-1, ColorMode::Rgb).unwrap(),
            PsdChannelKind::TransparencyMask
        );
    }

    #[test]
    fn ids_round_trip() {
        for id in [-3, -2, -1, 0, 1, 2] {
            let kind = PsdChannelKind::new(id, ColorMode::Rgb).unwrap();
            assert_eq!(kind.id(), id);
        }
        assert_eq!(PsdChannelKind::new(5, ColorMode::Rgb).unwrap().id(), 5);
    }

    #[test]
    fn channel_payload_survives_codec_change() {
        let raw: Vec<u8> = (0..16).collect();
        let mut channel = PsdChannel::from_raw(
            PsdChannelKind::Red,
            &raw,
            4,
            4,
            PsdDepth::Eight,
            PsdVersion::One,
            PsdChannelCompression::RleCompressed,
        )
        .unwrap();
        assert_eq!(channel.bytes().unwrap(), raw);

        channel
            .recompress(PsdChannelCompression::ZipWithPrediction)
            .unwrap();
        assert_eq!(channel.compression(), PsdChannelCompression::ZipWithPrediction);
        assert_eq!(channel.bytes().unwrap(), raw);
    }

    #[test]
    fn rle_payload_is_rewritten_for_the_other_version() {
        let raw = vec![7u8; 12];
        let channel = PsdChannel::from_raw(
            PsdChannelKind::Gray,
            &raw,
            4,
            3,
            PsdDepth::Eight,
            PsdVersion::One,
            PsdChannelCompression::RleCompressed,
        )
        .unwrap();
        let psd_payload = channel.payload_for(PsdVersion::One).unwrap();
        let psb_payload = channel.payload_for(PsdVersion::Two).unwrap();
        // Same packed rows, wider row size table
        assert_eq!(psb_payload.len() - psd_payload.len(), 3 * 2);
    }
}
