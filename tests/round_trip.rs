//! End to end write/read round trips through the public API.

use anyhow::Result;

use psd_kit::{
    BlendMode, ColorMode, GroupLayer, ImageLayer, Layer, LayerMask, LayeredFile, PsdChannel,
    PsdChannelCompression, PsdChannelKind, PsdDepth, PsdRect, PsdVersion,
};

fn rgb_document(width: u32, height: u32) -> LayeredFile {
    LayeredFile::new(PsdVersion::One, ColorMode::Rgb, PsdDepth::Eight, width, height).unwrap()
}

fn channel(id: i16, raster: &[u8], rect: PsdRect) -> PsdChannel {
    PsdChannel::from_raw(
        PsdChannelKind::new(id, ColorMode::Rgb).unwrap(),
        raster,
        rect.width(),
        rect.height(),
        PsdDepth::Eight,
        PsdVersion::One,
        PsdChannelCompression::RleCompressed,
    )
    .unwrap()
}

fn solid_layer(name: &str, rect: PsdRect, rgb: [u8; 3]) -> ImageLayer {
    let mut layer = ImageLayer::new(name, rect);
    let pixels = (rect.width() * rect.height()) as usize;
    for (id, value) in rgb.iter().enumerate() {
        layer
            .properties
            .set_channel(channel(id as i16, &vec![*value; pixels], rect));
    }
    layer
}

/// A 4x2 RGB psd with one red layer serializes the documented header bytes
/// and reads its channel back intact.
#[test]
fn constant_color_layer_rle_narrow() -> Result<()> {
    let mut file = rgb_document(4, 2);
    let layer = solid_layer("Layer 1", PsdRect::new(0, 0, 2, 4), [255, 0, 0]);
    file.add_layer(Layer::Image(layer), None).unwrap();

    let bytes = file.to_bytes()?;
    assert_eq!(
        &bytes[..26],
        &[
            b'8', b'B', b'P', b'S', // signature
            0, 1, // version
            0, 0, 0, 0, 0, 0, // reserved
            0, 3, // channel count
            0, 0, 0, 2, // height
            0, 0, 0, 4, // width
            0, 8, // depth
            0, 3, // color mode
        ]
    );

    let reread = LayeredFile::from_bytes(&bytes)?;
    let layer: &ImageLayer = reread.find_layer_as("Layer 1").unwrap();
    assert_eq!(
        layer.properties.channel(PsdChannelKind::Red).unwrap().bytes()?,
        vec![255; 8]
    );
    assert_eq!(
        layer.properties.channel(PsdChannelKind::Green).unwrap().bytes()?,
        vec![0; 8]
    );
    Ok(())
}

/// Writing, reading and writing again produces identical bytes.
#[test]
fn serialization_is_a_fixpoint() -> Result<()> {
    let mut file = rgb_document(16, 16);
    let mut group = GroupLayer::new("Group");
    group.properties.blend_mode = BlendMode::PassThrough;
    group
        .children
        .push(Layer::Image(solid_layer("Inner", PsdRect::new(2, 2, 10, 10), [1, 2, 3])));
    file.add_layer(Layer::Group(group), None).unwrap();

    let mut masked = solid_layer("Masked", PsdRect::new(0, 0, 16, 16), [9, 9, 9]);
    masked.properties.mask = Some(LayerMask {
        rect: PsdRect::new(0, 0, 8, 8),
        default_color: 255,
        flags: 0,
        parameters: None,
        real: None,
    });
    masked.properties.set_channel(PsdChannel::from_raw(
        PsdChannelKind::UserSuppliedLayerMask,
        &[128; 64],
        8,
        8,
        PsdDepth::Eight,
        PsdVersion::One,
        PsdChannelCompression::RleCompressed,
    )?);
    file.add_layer(Layer::Image(masked), None).unwrap();

    let first = file.to_bytes()?;
    let second = LayeredFile::from_bytes(&first)?.to_bytes()?;
    assert_eq!(first, second);

    let third = LayeredFile::from_bytes(&second)?.to_bytes()?;
    assert_eq!(second, third);
    Ok(())
}

/// A reference point block survives byte for byte and compares bit equal.
#[test]
fn reference_point_round_trips_bit_exact() -> Result<()> {
    let mut file = rgb_document(64, 64);
    let mut layer = solid_layer("Flipped", PsdRect::new(16, 16, 48, 48), [10, 20, 30]);
    layer.properties.set_reference_point(48.0, 16.0);
    file.add_layer(Layer::Image(layer), None).unwrap();

    let first = file.to_bytes()?;
    let reread = LayeredFile::from_bytes(&first)?;
    let second = reread.to_bytes()?;
    assert_eq!(first, second);

    let layer: &ImageLayer = reread.find_layer_as("Flipped").unwrap();
    let (x, y) = layer.properties.reference_point().unwrap();
    assert_eq!(x.to_bits(), 48.0f64.to_bits());
    assert_eq!(y.to_bits(), 16.0f64.to_bits());
    Ok(())
}

/// Layer state survives: blending, visibility, locks, opacity, clipping.
#[test]
fn layer_attributes_round_trip() -> Result<()> {
    let mut file = rgb_document(8, 8);
    let mut layer = solid_layer("Styled", PsdRect::new(0, 0, 8, 8), [50, 60, 70]);
    layer.properties.opacity = 128;
    layer.properties.blend_mode = BlendMode::Multiply;
    layer.properties.clipping = true;
    layer.properties.visible = false;
    layer.properties.locked = true;
    file.add_layer(Layer::Image(layer), None).unwrap();

    let reread = LayeredFile::from_bytes(&file.to_bytes()?)?;
    let layer: &ImageLayer = reread.find_layer_as("Styled").unwrap();
    assert_eq!(layer.properties.opacity, 128);
    assert_eq!(layer.properties.blend_mode, BlendMode::Multiply);
    assert!(layer.properties.clipping);
    assert!(!layer.properties.visible);
    assert!(layer.properties.locked);
    Ok(())
}

/// The PSB variant round trips with its 64 bit length fields.
#[test]
fn psb_documents_round_trip() -> Result<()> {
    let mut file =
        LayeredFile::new(PsdVersion::Two, ColorMode::Rgb, PsdDepth::Eight, 32, 32)?;
    let rect = PsdRect::new(0, 0, 32, 32);
    let mut layer = ImageLayer::new("Wide", rect);
    let raster: Vec<u8> = (0..32 * 32).map(|i| (i % 256) as u8).collect();
    for id in 0..3i16 {
        layer.properties.set_channel(PsdChannel::from_raw(
            PsdChannelKind::new(id, ColorMode::Rgb).unwrap(),
            &raster,
            32,
            32,
            PsdDepth::Eight,
            PsdVersion::Two,
            PsdChannelCompression::RleCompressed,
        )?);
    }
    file.add_layer(Layer::Image(layer), None).unwrap();

    let bytes = file.to_bytes()?;
    assert_eq!(bytes[5], 2, "psb header version");

    let reread = LayeredFile::from_bytes(&bytes)?;
    assert_eq!(reread.version(), PsdVersion::Two);
    let layer: &ImageLayer = reread.find_layer_as("Wide").unwrap();
    assert_eq!(
        layer.properties.channel(PsdChannelKind::Red).unwrap().bytes()?,
        raster
    );
    Ok(())
}

/// Sixteen bit documents nest their layers in an `Lr16` block and survive
/// the round trip.
#[test]
fn sixteen_bit_documents_round_trip() -> Result<()> {
    let mut file =
        LayeredFile::new(PsdVersion::One, ColorMode::Rgb, PsdDepth::Sixteen, 4, 4)?;
    let rect = PsdRect::new(0, 0, 4, 4);
    let raster: Vec<u8> = (0u16..16).flat_map(|v| (v * 4096).to_be_bytes()).collect();
    let mut layer = ImageLayer::new("Deep", rect);
    for id in 0..3i16 {
        layer.properties.set_channel(PsdChannel::from_raw(
            PsdChannelKind::new(id, ColorMode::Rgb).unwrap(),
            &raster,
            4,
            4,
            PsdDepth::Sixteen,
            PsdVersion::One,
            PsdChannelCompression::ZipWithPrediction,
        )?);
    }
    file.add_layer(Layer::Image(layer), None).unwrap();

    let reread = LayeredFile::from_bytes(&file.to_bytes()?)?;
    assert_eq!(reread.depth(), PsdDepth::Sixteen);
    let layer: &ImageLayer = reread.find_layer_as("Deep").unwrap();
    let channel = layer.properties.channel(PsdChannelKind::Blue).unwrap();
    assert_eq!(channel.compression(), PsdChannelCompression::ZipWithPrediction);
    assert_eq!(channel.bytes()?, raster);
    Ok(())
}

/// A layer missing a required color channel is refused at write time.
#[test]
fn missing_color_channels_fail_the_write() {
    let mut file = rgb_document(4, 4);
    let rect = PsdRect::new(0, 0, 4, 4);
    let mut layer = ImageLayer::new("Incomplete", rect);
    layer
        .properties
        .set_channel(channel(0, &[0; 16], rect));
    file.add_layer(Layer::Image(layer), None).unwrap();

    assert!(file.to_bytes().is_err());
}
