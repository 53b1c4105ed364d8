//! Channel codec behavior through the public channel API.

use anyhow::Result;

use psd_kit::{
    ColorMode, PsdChannel, PsdChannelCompression, PsdChannelKind, PsdDepth, PsdVersion,
};

fn round_trip(
    raster: &[u8],
    width: u32,
    height: u32,
    depth: PsdDepth,
    compression: PsdChannelCompression,
) -> Result<Vec<u8>> {
    let channel = PsdChannel::from_raw(
        PsdChannelKind::Gray,
        raster,
        width,
        height,
        depth,
        PsdVersion::One,
        compression,
    )?;
    Ok(channel.bytes()?)
}

/// A flat 32x32 u16 channel survives zip with prediction byte for byte.
#[test]
fn zip_prediction_sixteen_bit_flat() -> Result<()> {
    let raster: Vec<u8> = std::iter::repeat(0xFFu8).take(32 * 32 * 2).collect();
    let restored = round_trip(
        &raster,
        32,
        32,
        PsdDepth::Sixteen,
        PsdChannelCompression::ZipWithPrediction,
    )?;
    assert_eq!(restored, raster);
    Ok(())
}

/// A single row of f32 samples survives the byte-plane interleave
/// predictor exactly.
#[test]
fn zip_prediction_thirty_two_bit_row() -> Result<()> {
    let raster: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
        .iter()
        .flat_map(|value| value.to_be_bytes())
        .collect();
    let restored = round_trip(
        &raster,
        4,
        1,
        PsdDepth::ThirtyTwo,
        PsdChannelCompression::ZipWithPrediction,
    )?;
    assert_eq!(restored, raster);

    let samples: Vec<f32> = restored
        .chunks_exact(4)
        .map(|chunk| f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    assert_eq!(samples, vec![1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

/// Every codec survives a gradient at every depth.
#[test]
fn all_codecs_round_trip_gradients() -> Result<()> {
    for depth in [PsdDepth::Eight, PsdDepth::Sixteen, PsdDepth::ThirtyTwo] {
        let len = 16 * 8 * depth.bytes_per_sample();
        let raster: Vec<u8> = (0..len).map(|i| (i * 13 % 251) as u8).collect();
        for compression in [
            PsdChannelCompression::RawData,
            PsdChannelCompression::RleCompressed,
            PsdChannelCompression::ZipWithoutPrediction,
            PsdChannelCompression::ZipWithPrediction,
        ] {
            let restored = round_trip(&raster, 16, 8, depth, compression)?;
            assert_eq!(restored, raster, "{:?} at {:?}", compression, depth);
        }
    }
    Ok(())
}

/// Re-encoding a channel under a different codec preserves the raster.
#[test]
fn recompression_preserves_pixels() -> Result<()> {
    let raster: Vec<u8> = (0..64).map(|i| if i % 9 == 0 { 255 } else { 0 }).collect();
    let mut channel = PsdChannel::from_raw(
        PsdChannelKind::new(0, ColorMode::Rgb).unwrap(),
        &raster,
        8,
        8,
        PsdDepth::Eight,
        PsdVersion::One,
        PsdChannelCompression::RleCompressed,
    )?;

    for compression in [
        PsdChannelCompression::ZipWithoutPrediction,
        PsdChannelCompression::ZipWithPrediction,
        PsdChannelCompression::RawData,
        PsdChannelCompression::RleCompressed,
    ] {
        channel.recompress(compression)?;
        assert_eq!(channel.compression(), compression);
        assert_eq!(channel.bytes()?, raster);
    }
    Ok(())
}
