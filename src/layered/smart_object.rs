//! Smart object layers: a placement of a linked file with a warp.

use std::path::Path;

use crate::descriptor::{DescriptorField, DescriptorStructure};
use crate::error::{PsdError, Result};
use crate::layered::linked_layer_store::LinkedLayerStore;
use crate::layered::layer::LayerProperties;
use crate::tagged_block::{LinkedLayerRecord, PlacedLayerBlock, PlacedLayerDataBlock};
use crate::unicode_string::UnicodeString;
use crate::warp::{quad_to_list, Point2D, Warp};

/// A layer whose pixels come from a linked file, placed through an affine
/// quad, an optional perspective quad and a Bézier warp.
///
/// The layer itself holds a UUID into the document's
/// [`LinkedLayerStore`]; the placement lives in the `SoLd` descriptor
/// (and, for older readers, a `PlLd` block) which this type keeps and
/// patches rather than rebuilding, so unrecognized descriptor fields
/// survive a round-trip.
#[derive(Debug, Clone)]
pub struct SmartObjectLayer {
    /// The shared layer state
    pub properties: LayerProperties,
    /// The Bézier warp and placement quads
    pub warp: Warp,
    uuid: String,
    /// Cached intrinsic width of the linked source
    width: f64,
    /// Cached intrinsic height of the linked source
    height: f64,
    /// The `SoLd` descriptor, patched on write
    descriptor: DescriptorStructure,
    /// The `PlLd` block when the file carried one, patched on write
    pub(crate) placed_block: Option<PlacedLayerBlock>,
    /// Set when the UUID did not resolve in the linked layer store
    degraded: bool,
}

impl SmartObjectLayer {
    /// A fresh smart object over a record already in the store.
    pub fn new(
        properties: LayerProperties,
        record: &LinkedLayerRecord,
        width: f64,
        height: f64,
    ) -> Result<SmartObjectLayer> {
        let warp = Warp::generate_default(width, height, 4, 4)?;
        let mut layer = SmartObjectLayer {
            properties,
            warp,
            uuid: record.unique_id.clone(),
            width,
            height,
            descriptor: DescriptorStructure::new("null"),
            placed_block: None,
            degraded: false,
        };
        layer.descriptor = layer.to_descriptor();
        Ok(layer)
    }

    /// Build a smart object from its parsed blocks.
    pub(crate) fn from_blocks(
        properties: LayerProperties,
        placed_block: Option<PlacedLayerBlock>,
        data_block: &PlacedLayerDataBlock,
    ) -> Result<SmartObjectLayer> {
        let descriptor = data_block.descriptor.clone();

        let uuid = descriptor
            .get_string("Idnt")
            .map(|s| s.to_string())
            .or_else(|| placed_block.as_ref().map(|block| block.unique_id.clone()))
            .ok_or_else(|| {
                PsdError::CorruptDescriptor("placed layer without an identifier".to_string())
            })?;

        let warp_descriptor = descriptor
            .get_descriptor("quiltWarp")
            .or_else(|| descriptor.get_descriptor("warp"))
            .ok_or_else(|| {
                PsdError::CorruptDescriptor("placed layer without a warp".to_string())
            })?;
        let mut warp = Warp::from_descriptor(warp_descriptor)?;

        if let (Some(affine), Some(non_affine)) = (
            descriptor.get_list("Trnf"),
            descriptor.get_list("nonAffineTransform"),
        ) {
            warp.apply_transform_lists(affine, non_affine)?;
        }

        let (width, height) = match descriptor.get_descriptor("Sz  ") {
            Some(size) => (
                size.get_double("Wdth").unwrap_or(0.0),
                size.get_double("Hght").unwrap_or(0.0),
            ),
            None => (0.0, 0.0),
        };

        Ok(SmartObjectLayer {
            properties,
            warp,
            uuid,
            width,
            height,
            descriptor,
            placed_block,
            degraded: false,
        })
    }

    /// The UUID of the linked record backing this layer.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The intrinsic width of the linked source.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The intrinsic height of the linked source.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Whether the UUID failed to resolve when the file was read.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub(crate) fn mark_degraded(&mut self) {
        self.degraded = true;
    }

    /// Apply a 3x3 row-major transform to both placement quads.
    pub fn transform(&mut self, matrix: [[f64; 3]; 3]) -> Result<()> {
        let apply = |point: Point2D| {
            let w = matrix[2][0] * point.x + matrix[2][1] * point.y + matrix[2][2];
            Point2D::new(
                (matrix[0][0] * point.x + matrix[0][1] * point.y + matrix[0][2]) / w,
                (matrix[1][0] * point.x + matrix[1][1] * point.y + matrix[1][2]) / w,
            )
        };
        let affine = self.warp.affine_transform().map(apply);
        let non_affine = self.warp.non_affine_transform().map(apply);
        self.warp.set_affine_transform(affine)?;
        self.warp.set_non_affine_transform(non_affine);
        Ok(())
    }

    /// Swap the linked file for another one on disk. The record keeps its
    /// UUID, so every other layer sharing the source picks up the change.
    pub fn replace(&mut self, store: &mut LinkedLayerStore, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.replace_with_bytes(store, path, bytes)
    }

    /// [`replace`](Self::replace) with the bytes already in memory.
    pub fn replace_with_bytes(
        &mut self,
        store: &mut LinkedLayerStore,
        path: &Path,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let decoded = image::load_from_memory(&bytes).map_err(|err| {
            PsdError::InvalidEncoding(format!("could not decode replacement image: {}", err))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        store.insert(LinkedLayerRecord::embedded(
            self.uuid.clone(),
            &file_name,
            bytes,
        ));
        self.width = f64::from(decoded.width());
        self.height = f64::from(decoded.height());
        self.degraded = false;
        Ok(())
    }

    /// The `SoLd` descriptor with the modelled fields patched in.
    pub(crate) fn to_descriptor(&self) -> DescriptorStructure {
        let mut descriptor = self.descriptor.clone();

        descriptor.insert(
            "Idnt",
            DescriptorField::String(UnicodeString::new(self.uuid.clone())),
        );
        descriptor.insert(
            "Trnf",
            DescriptorField::List(quad_to_list(&self.warp.affine_transform())),
        );
        descriptor.insert(
            "nonAffineTransform",
            DescriptorField::List(quad_to_list(&self.warp.non_affine_transform())),
        );

        let mut size = DescriptorStructure::new("Pnt ");
        size.insert("Wdth", DescriptorField::Double(self.width));
        size.insert("Hght", DescriptorField::Double(self.height));
        descriptor.insert("Sz  ", DescriptorField::Descriptor(size));

        // The warp key tracks its kind, so a grid change may rename it
        let warp_descriptor = self.warp.to_descriptor();
        if self.warp.is_quilt() {
            descriptor.remove("warp");
            descriptor.insert("quiltWarp", DescriptorField::Descriptor(warp_descriptor));
        } else {
            descriptor.remove("quiltWarp");
            descriptor.insert("warp", DescriptorField::Descriptor(warp_descriptor));
        }

        descriptor
    }

    /// The `SoLd` tagged block for this layer.
    pub(crate) fn to_data_block(&self) -> PlacedLayerDataBlock {
        PlacedLayerDataBlock {
            descriptor: self.to_descriptor(),
        }
    }

    /// The `PlLd` tagged block, when the source file carried one.
    pub(crate) fn to_placed_block(&self) -> Option<PlacedLayerBlock> {
        let mut block = self.placed_block.clone()?;
        block.unique_id = self.uuid.clone();
        let affine = self.warp.affine_transform();
        // Disk order: top-left, top-right, bottom-right, bottom-left
        let disk = [affine[0], affine[1], affine[3], affine[2]];
        for (i, point) in disk.iter().enumerate() {
            block.transform[i * 2] = point.x;
            block.transform[i * 2 + 1] = point.y;
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layer() -> (SmartObjectLayer, LinkedLayerStore) {
        let mut store = LinkedLayerStore::new();
        let record = LinkedLayerRecord::embedded("uuid-1", "tex.png", vec![0; 8]);
        store.insert(record.clone());
        let layer = SmartObjectLayer::new(
            LayerProperties::with_name("Smart"),
            &record,
            64.0,
            32.0,
        )
        .unwrap();
        (layer, store)
    }

    #[test]
    fn descriptor_carries_the_placement() {
        let (layer, _) = sample_layer();
        let descriptor = layer.to_descriptor();
        assert_eq!(descriptor.get_string("Idnt"), Some("uuid-1"));
        assert!(descriptor.get_descriptor("warp").is_some());
        assert!(descriptor.get_list("Trnf").is_some());
        let size = descriptor.get_descriptor("Sz  ").unwrap();
        assert_eq!(size.get_double("Wdth"), Some(64.0));
    }

    #[test]
    fn descriptor_round_trips_through_from_blocks() {
        let (layer, _) = sample_layer();
        let block = layer.to_data_block();
        let parsed = SmartObjectLayer::from_blocks(
            LayerProperties::with_name("Smart"),
            None,
            &block,
        )
        .unwrap();
        assert_eq!(parsed.uuid(), "uuid-1");
        assert_eq!(parsed.width(), 64.0);
        assert_eq!(parsed.height(), 32.0);
        assert_eq!(parsed.warp, layer.warp);
    }

    #[test]
    fn transforms_move_both_quads() {
        let (mut layer, _) = sample_layer();
        // Translate by (10, 20)
        layer
            .transform([[1.0, 0.0, 10.0], [0.0, 1.0, 20.0], [0.0, 0.0, 1.0]])
            .unwrap();
        let quad = layer.warp.affine_transform();
        assert_eq!(quad[0], Point2D::new(10.0, 20.0));
        assert_eq!(quad[3], Point2D::new(74.0, 52.0));
        assert!(layer.warp.is_identity_transform());
    }

    #[test]
    fn replace_swaps_the_stored_bytes() {
        let (mut layer, mut store) = sample_layer();

        // A 2x3 png so the decoder can report intrinsic dimensions
        let mut png = Vec::new();
        {
            use image::ImageEncoder;
            let encoder = image::codecs::png::PngEncoder::new(&mut png);
            encoder
                .write_image(&[255u8; 2 * 3 * 4], 2, 3, image::ColorType::Rgba8)
                .unwrap();
        }

        layer
            .replace_with_bytes(&mut store, Path::new("new.png"), png.clone())
            .unwrap();

        let record = store.get("uuid-1").unwrap();
        assert_eq!(record.file_name.as_str(), "new.png");
        assert_eq!(record.data, png);
        assert_eq!(layer.width(), 2.0);
        assert_eq!(layer.height(), 3.0);
    }
}
