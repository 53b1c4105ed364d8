//! Channel compression codecs.
//!
//! A channel is a `height x width` raster of big-endian samples at the file's
//! bit depth. On disk every channel is preceded by a 16-bit compression tag:
//!
//! | Tag | Codec                                              |
//! |-----|----------------------------------------------------|
//! | 0   | Raw                                                |
//! | 1   | RLE ([PackBits](https://en.wikipedia.org/wiki/PackBits), per scanline with a row size table) |
//! | 2   | Zip (raw deflate)                                  |
//! | 3   | Zip with per-depth delta prediction                |
//!
//! A decompression failure is confined to the affected channel; callers keep
//! going with the layer's other channels.

use crate::error::{PsdError, Result};
use crate::sections::file_header_section::{PsdDepth, PsdVersion};

mod rle;
mod zip;

pub(crate) use rle::{rle_compress, rle_decompress};

/// How a channel's data is compressed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PsdChannelCompression {
    /// Not compressed
    RawData = 0,
    /// Compressed using [PackBits RLE compression](https://en.wikipedia.org/wiki/PackBits)
    RleCompressed = 1,
    /// A raw deflate stream over the channel bytes
    ZipWithoutPrediction = 2,
    /// Deflate after a per-depth horizontal delta pass
    ZipWithPrediction = 3,
}

impl PsdChannelCompression {
    /// Create a new PsdChannelCompression from its on-disk tag
    pub fn new(compression: u16) -> Result<PsdChannelCompression> {
        match compression {
            0 => Ok(PsdChannelCompression::RawData),
            1 => Ok(PsdChannelCompression::RleCompressed),
            2 => Ok(PsdChannelCompression::ZipWithoutPrediction),
            3 => Ok(PsdChannelCompression::ZipWithPrediction),
            _ => Err(PsdError::CompressionError(format!(
                "{} is an invalid channel compression, must be 0, 1, 2 or 3",
                compression
            ))),
        }
    }

    /// The u16 written before the channel bytes
    pub fn tag(self) -> u16 {
        self as u16
    }
}

/// The per-document choice of codec per bit depth.
///
/// The authoring tool favors RLE for 8-bit channels and zip with prediction
/// for the deeper modes, which is also the default here.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CompressionPolicy {
    /// Codec for 8-bit channels
    pub eight_bit: PsdChannelCompression,
    /// Codec for 16-bit channels
    pub sixteen_bit: PsdChannelCompression,
    /// Codec for 32-bit channels
    pub thirty_two_bit: PsdChannelCompression,
}

impl CompressionPolicy {
    /// Use one codec regardless of depth
    pub fn uniform(compression: PsdChannelCompression) -> CompressionPolicy {
        CompressionPolicy {
            eight_bit: compression,
            sixteen_bit: compression,
            thirty_two_bit: compression,
        }
    }

    /// The codec this policy picks for a depth
    pub fn for_depth(&self, depth: PsdDepth) -> PsdChannelCompression {
        match depth {
            PsdDepth::One | PsdDepth::Eight => self.eight_bit,
            PsdDepth::Sixteen => self.sixteen_bit,
            PsdDepth::ThirtyTwo => self.thirty_two_bit,
        }
    }
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        CompressionPolicy {
            eight_bit: PsdChannelCompression::RleCompressed,
            sixteen_bit: PsdChannelCompression::ZipWithPrediction,
            thirty_two_bit: PsdChannelCompression::ZipWithPrediction,
        }
    }
}

/// Compress a channel raster. `raw` holds `height` scanlines of
/// `width * depth.bytes_per_sample()` big-endian bytes each. The returned
/// payload is everything that follows the compression tag on disk,
/// including the RLE row size table where applicable.
pub(crate) fn compress(
    raw: &[u8],
    compression: PsdChannelCompression,
    width: usize,
    height: usize,
    depth: PsdDepth,
    version: PsdVersion,
) -> Result<Vec<u8>> {
    let row_bytes = width * depth.bytes_per_sample();
    if raw.len() != row_bytes * height {
        return Err(PsdError::CompressionError(format!(
            "channel raster is {} bytes, expected {} ({}x{} at {} bytes per sample)",
            raw.len(),
            row_bytes * height,
            width,
            height,
            depth.bytes_per_sample()
        )));
    }

    match compression {
        PsdChannelCompression::RawData => Ok(raw.to_vec()),
        PsdChannelCompression::RleCompressed => rle_compress(raw, row_bytes, height, version),
        PsdChannelCompression::ZipWithoutPrediction => zip::deflate(raw),
        PsdChannelCompression::ZipWithPrediction => {
            let predicted = zip::predict(raw, width, depth);
            zip::deflate(&predicted)
        }
    }
}

/// Decompress a channel payload back into `height` scanlines of big-endian
/// samples.
pub(crate) fn decompress(
    data: &[u8],
    compression: PsdChannelCompression,
    width: usize,
    height: usize,
    depth: PsdDepth,
    version: PsdVersion,
) -> Result<Vec<u8>> {
    let row_bytes = width * depth.bytes_per_sample();
    let expected = row_bytes * height;

    match compression {
        PsdChannelCompression::RawData => {
            if data.len() < expected {
                return Err(PsdError::CompressionError(format!(
                    "raw channel holds {} bytes, expected {}",
                    data.len(),
                    expected
                )));
            }
            Ok(data[..expected].to_vec())
        }
        PsdChannelCompression::RleCompressed => rle_decompress(data, row_bytes, height, version),
        PsdChannelCompression::ZipWithoutPrediction => zip::inflate(data, expected),
        PsdChannelCompression::ZipWithPrediction => {
            let predicted = zip::inflate(data, expected)?;
            Ok(zip::unpredict(&predicted, width, depth))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn edge_heavy(len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| if (i / 7) % 2 == 0 { 0 } else { 255 })
            .collect()
    }

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut state = 0x12345678u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn every_codec_round_trips_every_depth() {
        let codecs = [
            PsdChannelCompression::RawData,
            PsdChannelCompression::RleCompressed,
            PsdChannelCompression::ZipWithoutPrediction,
            PsdChannelCompression::ZipWithPrediction,
        ];
        let depths = [PsdDepth::Eight, PsdDepth::Sixteen, PsdDepth::ThirtyTwo];
        let (width, height) = (17, 9);

        for version in [PsdVersion::One, PsdVersion::Two] {
            for depth in depths {
                let len = width * height * depth.bytes_per_sample();
                let rasters = [
                    vec![0u8; len],
                    vec![255u8; len],
                    gradient(len),
                    edge_heavy(len),
                    pseudo_random(len),
                ];
                for raster in &rasters {
                    for codec in codecs {
                        let compressed =
                            compress(raster, codec, width, height, depth, version).unwrap();
                        let restored =
                            decompress(&compressed, codec, width, height, depth, version)
                                .unwrap();
                        assert_eq!(
                            &restored, raster,
                            "codec {:?} depth {:?} version {:?}",
                            codec, depth, version
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn flat_sixteen_bit_channel_survives_prediction() {
        // A 32x32 channel of u16::MAX
        let raw: Vec<u8> = std::iter::repeat([0xFF, 0xFF])
            .take(32 * 32)
            .flatten()
            .collect();
        let compressed = compress(
            &raw,
            PsdChannelCompression::ZipWithPrediction,
            32,
            32,
            PsdDepth::Sixteen,
            PsdVersion::One,
        )
        .unwrap();
        let restored = decompress(
            &compressed,
            PsdChannelCompression::ZipWithPrediction,
            32,
            32,
            PsdDepth::Sixteen,
            PsdVersion::One,
        )
        .unwrap();
        assert_eq!(restored, raw);
    }

    #[test]
    fn mismatched_raster_size_is_rejected() {
        let result = compress(
            &[0u8; 10],
            PsdChannelCompression::RawData,
            4,
            4,
            PsdDepth::Eight,
            PsdVersion::One,
        );
        assert!(matches!(result, Err(PsdError::CompressionError(_))));
    }

    #[test]
    fn invalid_tag_is_rejected() {
        assert!(PsdChannelCompression::new(4).is_err());
        assert_eq!(PsdChannelCompression::new(3).unwrap().tag(), 3);
    }
}
