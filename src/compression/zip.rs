//! Deflate based channel codecs and the horizontal prediction passes.
//!
//! The zip variants cover the whole channel with a single raw deflate
//! stream. The prediction variant first runs a delta pass whose shape
//! depends on the bit depth:
//!
//! * 8-bit: byte-wise horizontal delta within each row.
//! * 16-bit: horizontal delta over 16-bit samples, deltas stored big-endian.
//! * 32-bit: each row is first rearranged into four byte planes (the high
//!   byte of every sample, then the next byte, and so on), then the
//!   byte-wise delta runs across the planar row. Decoding undoes the delta
//!   and re-interleaves the planes.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::error::{PsdError, Result};
use crate::sections::file_header_section::PsdDepth;

/// Compress `bytes` as a single raw deflate stream.
pub(super) fn deflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|_| encoder.finish())
        .map_err(|err| PsdError::CompressionError(format!("deflate failed: {}", err)))
}

/// Decompress a raw deflate stream, verifying the decoded size.
pub(super) fn inflate(bytes: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    DeflateDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|err| PsdError::CompressionError(format!("inflate failed: {}", err)))?;
    if out.len() != expected {
        return Err(PsdError::CompressionError(format!(
            "inflated to {} bytes, expected {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

/// Run the depth-specific delta pass over a raster.
pub(super) fn predict(raw: &[u8], width: usize, depth: PsdDepth) -> Vec<u8> {
    match depth {
        PsdDepth::One | PsdDepth::Eight => {
            let mut out = raw.to_vec();
            for row in out.chunks_mut(width.max(1)) {
                delta_bytes(row);
            }
            out
        }
        PsdDepth::Sixteen => {
            let mut out = Vec::with_capacity(raw.len());
            for row in raw.chunks(width * 2) {
                let mut samples: Vec<u16> = row
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                for i in (1..samples.len()).rev() {
                    samples[i] = samples[i].wrapping_sub(samples[i - 1]);
                }
                for sample in samples {
                    out.extend_from_slice(&sample.to_be_bytes());
                }
            }
            out
        }
        PsdDepth::ThirtyTwo => {
            let mut out = Vec::with_capacity(raw.len());
            for row in raw.chunks(width * 4) {
                let mut planar = interleave_to_planes(row, width);
                delta_bytes(&mut planar);
                out.extend_from_slice(&planar);
            }
            out
        }
    }
}

/// Undo [`predict`].
pub(super) fn unpredict(predicted: &[u8], width: usize, depth: PsdDepth) -> Vec<u8> {
    match depth {
        PsdDepth::One | PsdDepth::Eight => {
            let mut out = predicted.to_vec();
            for row in out.chunks_mut(width.max(1)) {
                undelta_bytes(row);
            }
            out
        }
        PsdDepth::Sixteen => {
            let mut out = Vec::with_capacity(predicted.len());
            for row in predicted.chunks(width * 2) {
                let mut samples: Vec<u16> = row
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                for i in 1..samples.len() {
                    samples[i] = samples[i].wrapping_add(samples[i - 1]);
                }
                for sample in samples {
                    out.extend_from_slice(&sample.to_be_bytes());
                }
            }
            out
        }
        PsdDepth::ThirtyTwo => {
            let mut out = Vec::with_capacity(predicted.len());
            for row in predicted.chunks(width * 4) {
                let mut planar = row.to_vec();
                undelta_bytes(&mut planar);
                out.extend_from_slice(&planes_to_interleaved(&planar, width));
            }
            out
        }
    }
}

/// In-place horizontal byte delta: `out[x] = in[x] - in[x - 1]`.
fn delta_bytes(row: &mut [u8]) {
    for i in (1..row.len()).rev() {
        row[i] = row[i].wrapping_sub(row[i - 1]);
    }
}

/// In-place cumulative sum, the inverse of [`delta_bytes`].
fn undelta_bytes(row: &mut [u8]) {
    for i in 1..row.len() {
        row[i] = row[i].wrapping_add(row[i - 1]);
    }
}

/// Split a row of `width` big-endian 32-bit samples into four byte planes,
/// high byte plane first.
fn interleave_to_planes(row: &[u8], width: usize) -> Vec<u8> {
    let mut planar = vec![0u8; row.len()];
    for x in 0..width {
        for byte in 0..4 {
            planar[byte * width + x] = row[x * 4 + byte];
        }
    }
    planar
}

/// Rebuild the interleaved big-endian samples from four byte planes.
fn planes_to_interleaved(planar: &[u8], width: usize) -> Vec<u8> {
    let mut row = vec![0u8; planar.len()];
    for x in 0..width {
        for byte in 0..4 {
            row[x * 4 + byte] = planar[byte * width + x];
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_bit_prediction_is_a_row_delta() {
        let raw = [10u8, 20, 30, 5, 5, 5];
        let predicted = predict(&raw, 3, PsdDepth::Eight);
        assert_eq!(predicted, [10, 10, 10, 5, 0, 0]);
        assert_eq!(unpredict(&predicted, 3, PsdDepth::Eight), raw);
    }

    #[test]
    fn sixteen_bit_prediction_operates_on_samples() {
        // Two samples: 0x0100, 0x0101 -> deltas 0x0100, 0x0001
        let raw = [0x01, 0x00, 0x01, 0x01];
        let predicted = predict(&raw, 2, PsdDepth::Sixteen);
        assert_eq!(predicted, [0x01, 0x00, 0x00, 0x01]);
        assert_eq!(unpredict(&predicted, 2, PsdDepth::Sixteen), raw);
    }

    #[test]
    fn thirty_two_bit_row_interleaves_byte_planes() {
        // One row of [1.0f32, 2.0, 3.0, 4.0] as big-endian bytes
        let raw: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let predicted = predict(&raw, 4, PsdDepth::ThirtyTwo);
        assert_eq!(unpredict(&predicted, 4, PsdDepth::ThirtyTwo), raw);
    }

    #[test]
    fn plane_interleave_orders_high_byte_first() {
        // Two samples AABBCCDD and 11223344
        let row = [0xAA, 0xBB, 0xCC, 0xDD, 0x11, 0x22, 0x33, 0x44];
        let planar = interleave_to_planes(&row, 2);
        assert_eq!(planar, [0xAA, 0x11, 0xBB, 0x22, 0xCC, 0x33, 0xDD, 0x44]);
        assert_eq!(planes_to_interleaved(&planar, 2), row);
    }

    #[test]
    fn deflate_round_trips() {
        let bytes: Vec<u8> = (0..4096).map(|i| (i % 7) as u8).collect();
        let compressed = deflate(&bytes).unwrap();
        assert_eq!(inflate(&compressed, bytes.len()).unwrap(), bytes);
    }

    #[test]
    fn truncated_deflate_stream_is_an_error() {
        let bytes: Vec<u8> = (0..256).map(|i| i as u8).collect();
        let compressed = deflate(&bytes).unwrap();
        assert!(inflate(&compressed[..compressed.len() / 2], bytes.len()).is_err());
    }
}
