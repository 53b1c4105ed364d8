//! Smart object layers, their linked store and their warps, end to end.

use std::path::Path;

use anyhow::Result;
use image::ImageEncoder;

use psd_kit::{
    ColorMode, Layer, LayerProperties, LayeredFile, LinkedLayerRecord, Point2D, PsdDepth,
    PsdError, PsdRect, PsdVersion, SmartObjectLayer, Warp,
};

fn encode_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    let mut png = Vec::new();
    let pixels = vec![value; (width * height * 4) as usize];
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(&pixels, width, height, image::ColorType::Rgba8)
        .unwrap();
    png
}

fn document_with_smart_object(uuid: &str) -> Result<LayeredFile> {
    let mut file = LayeredFile::new(PsdVersion::One, ColorMode::Rgb, PsdDepth::Eight, 64, 64)?;

    let record = LinkedLayerRecord::embedded(uuid, "source.png", encode_png(8, 8, 200));
    file.linked_layers_mut().insert(record.clone());

    let mut properties = LayerProperties::with_name("Placed");
    properties.rect = PsdRect::new(0, 0, 64, 64);
    let layer = SmartObjectLayer::new(properties, &record, 8.0, 8.0)?;
    file.add_layer(Layer::SmartObject(layer), None).unwrap();
    Ok(file)
}

/// The UUID resolves after a round trip and the warp comes back intact.
#[test]
fn smart_object_round_trips() -> Result<()> {
    let file = document_with_smart_object("09b8d72f-ec18-0000-9071-74c6a9e57c3a")?;
    let bytes = file.to_bytes()?;

    let reread = LayeredFile::from_bytes(&bytes)?;
    let layer: &SmartObjectLayer = reread.find_layer_as("Placed").unwrap();
    assert_eq!(layer.uuid(), "09b8d72f-ec18-0000-9071-74c6a9e57c3a");
    assert!(!layer.is_degraded());
    assert!(reread.linked_layers().contains(layer.uuid()));
    assert_eq!(layer.width(), 8.0);
    assert_eq!(layer.height(), 8.0);
    assert!(!layer.warp.is_quilt());
    assert_eq!(layer.warp.point(3, 3).unwrap(), Point2D::new(8.0, 8.0));

    // And the serialization is stable
    assert_eq!(LayeredFile::from_bytes(&bytes)?.to_bytes()?, bytes);
    Ok(())
}

/// An edited warp and moved placement survive the descriptor round trip.
#[test]
fn warped_placement_round_trips() -> Result<()> {
    let mut file = document_with_smart_object("uuid-warp")?;
    {
        let layer = file.find_layer_mut("Placed").unwrap();
        let smart = match layer {
            Layer::SmartObject(smart) => smart,
            _ => unreachable!(),
        };
        smart.warp.set_point(1, 2, Point2D::new(3.25, 9.5)).unwrap();
        smart
            .transform([[2.0, 0.0, 16.0], [0.0, 2.0, 8.0], [0.0, 0.0, 1.0]])
            .unwrap();
    }

    let reread = LayeredFile::from_bytes(&file.to_bytes()?)?;
    let layer: &SmartObjectLayer = reread.find_layer_as("Placed").unwrap();
    assert_eq!(layer.warp.point(1, 2).unwrap(), Point2D::new(3.25, 9.5));
    let quad = layer.warp.affine_transform();
    assert_eq!(quad[0], Point2D::new(16.0, 8.0));
    assert_eq!(quad[3], Point2D::new(32.0, 24.0));
    Ok(())
}

/// A quilt warp keeps its slices and grid through the file.
#[test]
fn quilt_warp_round_trips() -> Result<()> {
    let mut file = document_with_smart_object("uuid-quilt")?;
    {
        let layer = file.find_layer_mut("Placed").unwrap();
        if let Layer::SmartObject(smart) = layer {
            smart.warp = Warp::generate_default(8.0, 8.0, 7, 7)?;
        }
    }

    let reread = LayeredFile::from_bytes(&file.to_bytes()?)?;
    let layer: &SmartObjectLayer = reread.find_layer_as("Placed").unwrap();
    assert!(layer.warp.is_quilt());
    assert_eq!(layer.warp.u_dims(), 7);
    assert_eq!(layer.warp.quilt_slices_x(), &[-0.6, 4.0, 8.6]);
    Ok(())
}

/// Replacing the linked file swaps the stored bytes under the same UUID;
/// the old payload is gone after a round trip.
#[test]
fn replace_swaps_the_linked_bytes() -> Result<()> {
    let mut file = document_with_smart_object("uuid-replace")?;
    let old_bytes = file.linked_layers().get("uuid-replace").unwrap().data.clone();

    let new_png = encode_png(4, 6, 10);
    {
        let mut store = std::mem::take(file.linked_layers_mut());
        let layer = file.find_layer_mut("Placed").unwrap();
        if let Layer::SmartObject(smart) = layer {
            smart
                .replace_with_bytes(&mut store, Path::new("replacement.png"), new_png.clone())
                .unwrap();
        }
        *file.linked_layers_mut() = store;
    }

    let reread = LayeredFile::from_bytes(&file.to_bytes()?)?;
    let record = reread.linked_layers().get("uuid-replace").unwrap();
    assert_eq!(record.data, new_png);
    assert_ne!(record.data, old_bytes);
    assert_eq!(record.file_name.as_str(), "replacement.png");

    let layer: &SmartObjectLayer = reread.find_layer_as("Placed").unwrap();
    assert_eq!(layer.width(), 4.0);
    assert_eq!(layer.height(), 6.0);
    Ok(())
}

/// Writing a smart object whose UUID is missing from the store fails.
#[test]
fn dangling_uuid_fails_the_write() -> Result<()> {
    let mut file = document_with_smart_object("uuid-gone")?;
    file.linked_layers_mut().remove("uuid-gone").unwrap();

    match file.to_bytes() {
        Err(PsdError::MissingLinkedLayer { uuid }) => assert_eq!(uuid, "uuid-gone"),
        other => panic!("expected MissingLinkedLayer, got {:?}", other.map(|_| ())),
    }
    Ok(())
}
