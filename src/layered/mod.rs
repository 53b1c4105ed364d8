//! The layered document model: a tree of image, group, smart object and
//! adjustment layers over the flat on-disk layer list.
//!
//! On disk a group is three things: a divider record of type open or
//! closed, the child records, and a hidden bounding record closing the
//! group. Reading walks the flat list top-down with an explicit stack
//! (observed files nest more than a thousand levels deep, so no
//! recursion); writing flattens the tree back and reverses the result into
//! the file's bottom-up order.

use crate::blend_mode::BlendMode;
use crate::compression::CompressionPolicy;
use crate::error::{PsdError, Result};
use crate::sections::color_mode_data_section::ColorModeDataSection;
use crate::sections::file_header_section::{
    ColorMode, FileHeaderSection, PsdDepth, PsdVersion,
};
use crate::sections::image_data_section::ImageDataSection;
use crate::sections::image_resources_section::ImageResourcesSection;
use crate::sections::layer_and_mask_information_section::{
    layer_flags, FlatLayer, LayerAndMaskInformationSection, LayerRecord, PsdRect,
};
use crate::tagged_block::{SectionDividerBlock, SectionDividerType, TaggedBlock, ADJUSTMENT_KEYS};
use crate::unicode_string::UnicodeString;
use crate::Psd;

pub(crate) mod layer;
pub(crate) mod linked_layer_store;
pub(crate) mod smart_object;

pub use layer::{
    AdjustmentLayer, GroupLayer, ImageLayer, Layer, LayerKindRef, LayerProperties,
};
pub use linked_layer_store::LinkedLayerStore;
pub use smart_object::SmartObjectLayer;

/// The name the authoring tool gives the hidden records that close groups.
const SECTION_DIVIDER_NAME: &str = "</Layer group>";

/// The order [`LayeredFile::flat_layers`] visits the tree in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TraversalOrder {
    /// Depth first, top-most layer first, groups before their children
    Forward,
    /// The exact reverse: bottom-up, matching the on-disk record order
    Reverse,
}

/// A layered document: the tree of layers plus everything else a file
/// round-trips.
#[derive(Debug, Clone)]
pub struct LayeredFile {
    version: PsdVersion,
    color_mode: ColorMode,
    depth: PsdDepth,
    width: u32,
    height: u32,
    channel_count: u16,
    /// The layer tree, top-most layer first
    pub layers: Vec<Layer>,
    linked_layers: LinkedLayerStore,
    compression: CompressionPolicy,
    merged_alpha: bool,
    color_mode_data: ColorModeDataSection,
    image_resources: ImageResourcesSection,
    composite: Option<ImageDataSection>,
    global_mask_info: Vec<u8>,
    /// Global tagged blocks other than the linked layer blocks
    extra_global_blocks: Vec<TaggedBlock>,
}

impl LayeredFile {
    /// An empty document.
    pub fn new(
        version: PsdVersion,
        color_mode: ColorMode,
        depth: PsdDepth,
        width: u32,
        height: u32,
    ) -> Result<LayeredFile> {
        // Validate the dimensions against the version limits up front
        FileHeaderSection::new(version, 3, width, height, depth, color_mode)?;
        let channel_count = color_mode.required_channel_ids().len() as u16;
        Ok(LayeredFile {
            version,
            color_mode,
            depth,
            width,
            height,
            channel_count,
            layers: Vec::new(),
            linked_layers: LinkedLayerStore::new(),
            compression: CompressionPolicy::default(),
            merged_alpha: false,
            color_mode_data: ColorModeDataSection::default(),
            image_resources: ImageResourcesSection::default(),
            composite: None,
            global_mask_info: Vec::new(),
            extra_global_blocks: Vec::new(),
        })
    }

    /// The file variant.
    pub fn version(&self) -> PsdVersion {
        self.version
    }

    /// The document's color mode.
    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Bits per channel.
    pub fn depth(&self) -> PsdDepth {
        self.depth
    }

    /// The document width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The document height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The linked layer store backing the document's smart objects.
    pub fn linked_layers(&self) -> &LinkedLayerStore {
        &self.linked_layers
    }

    /// The linked layer store, mutably.
    pub fn linked_layers_mut(&mut self) -> &mut LinkedLayerStore {
        &mut self.linked_layers
    }

    /// The codec policy applied by [`LayeredFile::set_compression`].
    pub fn compression(&self) -> CompressionPolicy {
        self.compression
    }

    /// Choose the codec used per bit depth and re-encode every channel to
    /// match.
    pub fn set_compression(&mut self, policy: CompressionPolicy) -> Result<()> {
        self.compression = policy;
        let compression = policy.for_depth(self.depth);
        let mut stack: Vec<&mut Layer> = self.layers.iter_mut().collect();
        while let Some(layer) = stack.pop() {
            match layer {
                Layer::Group(group) => {
                    for channel in &mut group.properties.channels {
                        channel.recompress(compression)?;
                    }
                    stack.extend(group.children.iter_mut());
                }
                other => {
                    for channel in &mut other.properties_mut().channels {
                        channel.recompress(compression)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Swap the linked file backing the smart object at `layer_path` for
    /// the file at `file`. Every smart object sharing the same UUID picks
    /// up the new bytes.
    ///
    /// Fails with [`PsdError::MissingLinkedLayer`] when the path does not
    /// name a smart object layer.
    pub fn replace_smart_object(
        &mut self,
        layer_path: &str,
        file: impl AsRef<std::path::Path>,
    ) -> Result<()> {
        let file = file.as_ref();
        let bytes = std::fs::read(file)?;

        // The layer and the store are both borrowed mutably, so the store
        // steps aside for the duration
        let mut store = std::mem::take(&mut self.linked_layers);
        let result = match self.find_layer_mut(layer_path) {
            Some(Layer::SmartObject(smart)) => smart.replace_with_bytes(&mut store, file, bytes),
            _ => Err(PsdError::MissingLinkedLayer {
                uuid: layer_path.to_string(),
            }),
        };
        self.linked_layers = store;
        result
    }

    // Tree operations

    /// Find a layer by a `/`-separated path of names. Duplicate names
    /// within one parent resolve to the first match.
    pub fn find_layer(&self, path: &str) -> Option<&Layer> {
        let mut current: &[Layer] = &self.layers;
        let mut found = None;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let layer = current.iter().find(|layer| layer.name() == component)?;
            found = Some(layer);
            current = layer.children().unwrap_or(&[]);
        }
        found
    }

    /// Find a layer by path and borrow it as a specific kind.
    pub fn find_layer_as<'a, T: LayerKindRef<'a>>(&'a self, path: &str) -> Option<T> {
        T::from_layer(self.find_layer(path)?)
    }

    /// Find a layer by path, mutably.
    pub fn find_layer_mut(&mut self, path: &str) -> Option<&mut Layer> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let (last, parents) = components.split_last()?;
        let container = self.container_mut(parents)?;
        container.iter_mut().find(|layer| layer.name() == *last)
    }

    /// Append a layer to a group (or the root when `parent` is `None`).
    /// Returns `None` when the parent does not exist or is not a group.
    pub fn add_layer(&mut self, layer: Layer, parent: Option<&str>) -> Option<()> {
        let container = match parent {
            Some(path) => {
                let components: Vec<&str> =
                    path.split('/').filter(|c| !c.is_empty()).collect();
                self.container_mut(&components)?
            }
            None => &mut self.layers,
        };
        container.push(layer);
        Some(())
    }

    /// Detach and return the layer at `path`.
    pub fn remove_layer(&mut self, path: &str) -> Option<Layer> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let (last, parents) = components.split_last()?;
        let container = self.container_mut(parents)?;
        let index = container.iter().position(|layer| layer.name() == *last)?;
        Some(container.remove(index))
    }

    /// Detach the layer at `path` and re-attach it under `new_parent`
    /// (the root when `None`). Moving a group into itself is refused, and
    /// a missing target leaves the tree untouched.
    pub fn move_layer(&mut self, path: &str, new_parent: Option<&str>) -> Option<()> {
        if let Some(parent) = new_parent {
            let source = normalized(path);
            let target = normalized(parent);
            if target == source || target.starts_with(&format!("{}/", source)) {
                return None;
            }
            // The target container must exist before the layer is detached
            let components: Vec<&str> = parent.split('/').filter(|c| !c.is_empty()).collect();
            self.container_mut(&components)?;
        }
        let layer = self.remove_layer(path)?;
        self.add_layer(layer, new_parent)
    }

    /// Visit every layer in the tree.
    pub fn flat_layers(&self, order: TraversalOrder) -> Vec<&Layer> {
        let mut out = Vec::new();
        let mut stack: Vec<&Layer> = self.layers.iter().rev().collect();
        while let Some(layer) = stack.pop() {
            out.push(layer);
            if let Some(children) = layer.children() {
                stack.extend(children.iter().rev());
            }
        }
        if order == TraversalOrder::Reverse {
            out.reverse();
        }
        out
    }

    /// Walk to the child list of the group at `components`.
    fn container_mut(&mut self, components: &[&str]) -> Option<&mut Vec<Layer>> {
        let mut current = &mut self.layers;
        for component in components {
            let index = current
                .iter()
                .position(|layer| layer.name() == *component)?;
            current = current[index].children_mut()?;
        }
        Some(current)
    }

    // Conversion from and to the on-disk sections

    /// Reshape a parsed file into the layered model.
    pub fn from_psd(psd: Psd) -> Result<LayeredFile> {
        let header = &psd.file_header_section;
        let section = &psd.layer_and_mask_information_section;

        // The linked layer store comes first so smart objects can resolve
        // against it
        let mut linked_layers = LinkedLayerStore::new();
        let mut extra_global_blocks = Vec::new();
        for block in &section.global_blocks {
            match block {
                TaggedBlock::LinkedLayer { records, .. } => {
                    for record in records {
                        linked_layers.insert(record.clone());
                    }
                }
                other => extra_global_blocks.push(other.clone()),
            }
        }

        // Build the tree from the flat list, top-most layer first
        let mut root: Vec<Layer> = Vec::new();
        let mut group_stack: Vec<GroupLayer> = Vec::new();

        for flat in section.layers.iter().rev() {
            match classify(flat)? {
                Classified::GroupOpen(group) => group_stack.push(group),
                Classified::GroupClose => {
                    let group = group_stack.pop().ok_or_else(|| {
                        PsdError::CorruptDescriptor(
                            "dangling group close divider".to_string(),
                        )
                    })?;
                    attach(&mut root, &mut group_stack, Layer::Group(group));
                }
                Classified::Regular(mut layer) => {
                    if let Layer::SmartObject(smart) = &mut layer {
                        if !linked_layers.contains(smart.uuid()) {
                            smart.mark_degraded();
                        }
                    }
                    attach(&mut root, &mut group_stack, layer);
                }
            }
        }
        // A group left open is tolerated: its children simply stay nested
        while let Some(group) = group_stack.pop() {
            attach(&mut root, &mut group_stack, Layer::Group(group));
        }

        Ok(LayeredFile {
            version: header.version,
            color_mode: header.color_mode,
            depth: header.depth,
            width: header.width.0,
            height: header.height.0,
            channel_count: header.channel_count.count(),
            layers: root,
            linked_layers,
            compression: CompressionPolicy::default(),
            merged_alpha: section.merged_alpha,
            color_mode_data: psd.color_mode_data_section.clone(),
            image_resources: psd.image_resources_section.clone(),
            composite: Some(psd.image_data_section.clone()),
            global_mask_info: section.global_mask_info.clone(),
            extra_global_blocks,
        })
    }

    /// Serialize the layered model back into on-disk sections.
    pub fn to_psd(&self) -> Result<Psd> {
        // Flatten the tree top-down, then reverse into file order
        let mut flat: Vec<FlatLayer> = Vec::new();
        enum Work<'a> {
            Visit(&'a Layer),
            Close,
        }
        let mut stack: Vec<Work> = self.layers.iter().rev().map(Work::Visit).collect();
        while let Some(work) = stack.pop() {
            match work {
                Work::Visit(layer) => {
                    if let Layer::SmartObject(smart) = layer {
                        self.linked_layers.resolve(smart.uuid())?;
                    }
                    if let Layer::Image(image) = layer {
                        image.properties.validate_channels(self.color_mode)?;
                    }
                    // A group that lost all its children leaves no trace
                    if let Layer::Group(group) = layer {
                        if group.children.is_empty() {
                            continue;
                        }
                        flat.push(flatten(layer)?);
                        stack.push(Work::Close);
                        stack.extend(group.children.iter().rev().map(Work::Visit));
                    } else {
                        flat.push(flatten(layer)?);
                    }
                }
                Work::Close => flat.push(bounding_divider()),
            }
        }
        flat.reverse();

        let mut global_blocks = Vec::new();
        if !self.linked_layers.is_empty() {
            global_blocks.push(TaggedBlock::LinkedLayer {
                key: *b"lnk2",
                records: self.linked_layers.records().to_vec(),
            });
        }
        global_blocks.extend(self.extra_global_blocks.iter().cloned());

        let section = LayerAndMaskInformationSection {
            merged_alpha: self.merged_alpha,
            layers: flat,
            global_mask_info: self.global_mask_info.clone(),
            global_blocks,
        };

        let composite = match &self.composite {
            Some(composite) => composite.clone(),
            None => ImageDataSection::blank(
                self.channel_count as usize,
                self.width,
                self.height,
                self.depth,
            ),
        };

        Ok(Psd {
            file_header_section: FileHeaderSection::new(
                self.version,
                self.channel_count,
                self.width,
                self.height,
                self.depth,
                self.color_mode,
            )?,
            color_mode_data_section: self.color_mode_data.clone(),
            image_resources_section: self.image_resources.clone(),
            layer_and_mask_information_section: section,
            image_data_section: composite,
        })
    }
}

fn normalized(path: &str) -> String {
    path.split('/')
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn attach(root: &mut Vec<Layer>, stack: &mut [GroupLayer], layer: Layer) {
    match stack.last_mut() {
        Some(group) => group.children.push(layer),
        None => root.push(layer),
    }
}

enum Classified {
    GroupOpen(GroupLayer),
    GroupClose,
    Regular(Layer),
}

/// Lift a flat on-disk layer into its model kind.
fn classify(flat: &FlatLayer) -> Result<Classified> {
    let record = &flat.record;

    let mut properties = LayerProperties {
        name: record.unicode_name().to_string(),
        opacity: record.opacity,
        blend_mode: record.blend_mode,
        clipping: record.clipping != 0,
        visible: record.visible(),
        locked: false,
        pixel_data_irrelevant: record.pixel_data_irrelevant(),
        mask: record.mask,
        rect: record.rect,
        layer_id: None,
        protection_flags: None,
        blending_ranges: record.blending_ranges.clone(),
        extra_blocks: Vec::new(),
        channels: flat.channels.clone(),
    };

    let mut divider: Option<&SectionDividerBlock> = None;
    let mut placed = None;
    let mut data_block = None;
    for block in &record.tagged_blocks {
        match block {
            TaggedBlock::UnicodeLayerName(_) => {}
            TaggedBlock::LayerId(id) => properties.layer_id = Some(*id),
            TaggedBlock::ProtectedSettings(flags) => {
                properties.protection_flags = Some(*flags);
                properties.locked = TaggedBlock::protection_is_locked(*flags);
            }
            TaggedBlock::SectionDivider(block) => divider = Some(block),
            TaggedBlock::PlacedLayer(block) => placed = Some(block.clone()),
            TaggedBlock::PlacedLayerData(block) => data_block = Some(block.clone()),
            other => properties.extra_blocks.push(other.clone()),
        }
    }

    if let Some(divider) = divider {
        return Ok(match divider.divider_type {
            SectionDividerType::BoundingSection => Classified::GroupClose,
            SectionDividerType::OpenFolder | SectionDividerType::ClosedFolder => {
                // Pass-through lives in the divider, not the record
                if let Some(blend_mode) = divider.blend_mode {
                    properties.blend_mode = blend_mode;
                }
                Classified::GroupOpen(GroupLayer {
                    properties,
                    children: Vec::new(),
                    closed: divider.divider_type == SectionDividerType::ClosedFolder,
                })
            }
            SectionDividerType::Any => Classified::Regular(Layer::Image(ImageLayer {
                properties,
            })),
        });
    }

    if let Some(data_block) = data_block {
        let layer = SmartObjectLayer::from_blocks(properties, placed, &data_block)?;
        return Ok(Classified::Regular(Layer::SmartObject(layer)));
    }
    // A PlLd without SoLd is not modelled; keep it with the extras
    if let Some(placed) = placed {
        properties
            .extra_blocks
            .push(TaggedBlock::PlacedLayer(placed));
    }

    if let Some(kind) = properties
        .extra_blocks
        .iter()
        .map(|block| block.key())
        .find(|key| ADJUSTMENT_KEYS.contains(key))
    {
        return Ok(Classified::Regular(Layer::Adjustment(AdjustmentLayer {
            properties,
            kind,
        })));
    }

    Ok(Classified::Regular(Layer::Image(ImageLayer { properties })))
}

/// Lower a model layer back into a flat record plus channels.
fn flatten(layer: &Layer) -> Result<FlatLayer> {
    let properties = layer.properties();

    let mut flags = layer_flags::HAS_BIT_4;
    if !properties.visible {
        flags |= layer_flags::HIDDEN;
    }
    if properties.pixel_data_irrelevant {
        flags |= layer_flags::PIXEL_DATA_IRRELEVANT;
    }

    // Pass-through groups claim Normal on the record; the divider carries
    // the real mode
    let record_blend_mode = if properties.blend_mode == BlendMode::PassThrough {
        BlendMode::Normal
    } else {
        properties.blend_mode
    };

    let mut blocks = vec![TaggedBlock::UnicodeLayerName(UnicodeString::new(
        properties.name.clone(),
    ))];
    if let Some(id) = properties.layer_id {
        blocks.push(TaggedBlock::LayerId(id));
    }
    if let Layer::Group(group) = layer {
        blocks.push(TaggedBlock::SectionDivider(SectionDividerBlock::group(
            group.closed,
            properties.blend_mode,
        )));
    }
    if properties.locked || properties.protection_flags.is_some() {
        let flags = TaggedBlock::protection_with_locked(
            properties.protection_flags.unwrap_or(0),
            properties.locked,
        );
        blocks.push(TaggedBlock::ProtectedSettings(flags));
    }
    if let Layer::SmartObject(smart) = layer {
        if let Some(placed) = smart.to_placed_block() {
            blocks.push(TaggedBlock::PlacedLayer(placed));
        }
        blocks.push(TaggedBlock::PlacedLayerData(smart.to_data_block()));
    }
    blocks.extend(properties.extra_blocks.iter().cloned());

    let record = LayerRecord {
        rect: properties.rect,
        // Patched from the compressed payloads at write time
        channel_infos: Vec::new(),
        blend_mode: record_blend_mode,
        opacity: properties.opacity,
        clipping: u8::from(properties.clipping),
        flags,
        mask: properties.mask,
        blending_ranges: properties.blending_ranges.clone(),
        name: properties.name.clone(),
        tagged_blocks: blocks,
    };

    Ok(FlatLayer {
        record,
        channels: properties.channels.clone(),
    })
}

/// The hidden record that closes a group on disk.
fn bounding_divider() -> FlatLayer {
    FlatLayer {
        record: LayerRecord {
            rect: PsdRect::default(),
            channel_infos: Vec::new(),
            blend_mode: BlendMode::Normal,
            opacity: 255,
            clipping: 0,
            flags: layer_flags::HIDDEN
                | layer_flags::HAS_BIT_4
                | layer_flags::PIXEL_DATA_IRRELEVANT,
            mask: None,
            blending_ranges: Vec::new(),
            name: SECTION_DIVIDER_NAME.to_string(),
            tagged_blocks: vec![
                TaggedBlock::UnicodeLayerName(UnicodeString::new(SECTION_DIVIDER_NAME)),
                TaggedBlock::SectionDivider(SectionDividerBlock::bounding()),
            ],
        },
        channels: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> LayeredFile {
        LayeredFile::new(PsdVersion::One, ColorMode::Rgb, PsdDepth::Eight, 64, 64).unwrap()
    }

    fn image(name: &str) -> Layer {
        Layer::Image(ImageLayer::new(name, PsdRect::new(0, 0, 4, 4)))
    }

    #[test]
    fn paths_resolve_through_groups() {
        let mut file = document();
        let mut group = GroupLayer::new("Group");
        group.children.push(image("Inner"));
        file.layers.push(Layer::Group(group));
        file.layers.push(image("Outer"));

        assert!(file.find_layer("Group/Inner").is_some());
        assert!(file.find_layer("Outer").is_some());
        assert!(file.find_layer("Group/Missing").is_none());
        assert!(file.find_layer_as::<&ImageLayer>("Group/Inner").is_some());
        assert!(file.find_layer_as::<&GroupLayer>("Group/Inner").is_none());
    }

    #[test]
    fn first_match_wins_for_duplicate_names() {
        let mut file = document();
        let mut first = ImageLayer::new("Twin", PsdRect::default());
        first.properties.opacity = 1;
        file.layers.push(Layer::Image(first));
        file.layers.push(image("Twin"));

        let found = file.find_layer("Twin").unwrap();
        assert_eq!(found.properties().opacity, 1);
    }

    #[test]
    fn move_layer_reparents() {
        let mut file = document();
        let mut group = GroupLayer::new("Group");
        group.children.push(image("Nested"));
        file.layers.push(Layer::Group(group));

        file.move_layer("Group/Nested", None).unwrap();
        assert!(file.find_layer("Nested").is_some());
        assert!(file.find_layer("Group/Nested").is_none());
    }

    #[test]
    fn moving_a_group_into_itself_is_refused() {
        let mut file = document();
        let mut outer = GroupLayer::new("Outer");
        outer.children.push(Layer::Group(GroupLayer::new("Inner")));
        file.layers.push(Layer::Group(outer));

        assert!(file.move_layer("Outer", Some("Outer/Inner")).is_none());
        assert!(file.find_layer("Outer/Inner").is_some());
    }

    #[test]
    fn flat_layers_visits_groups_before_children() {
        let mut file = document();
        let mut group = GroupLayer::new("G");
        group.children.push(image("A"));
        group.children.push(image("B"));
        file.layers.push(Layer::Group(group));
        file.layers.push(image("C"));

        let forward: Vec<&str> = file
            .flat_layers(TraversalOrder::Forward)
            .iter()
            .map(|layer| layer.name())
            .collect();
        assert_eq!(forward, vec!["G", "A", "B", "C"]);

        let reverse: Vec<&str> = file
            .flat_layers(TraversalOrder::Reverse)
            .iter()
            .map(|layer| layer.name())
            .collect();
        assert_eq!(reverse, vec!["C", "B", "A", "G"]);
    }
}
