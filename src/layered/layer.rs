//! The layer kinds of the in-memory tree.

use crate::blend_mode::BlendMode;
use crate::error::{PsdError, Result};
use crate::psd_channel::{PsdChannel, PsdChannelKind};
use crate::sections::file_header_section::ColorMode;
use crate::sections::layer_and_mask_information_section::{LayerMask, PsdRect};
use crate::tagged_block::TaggedBlock;

use super::smart_object::SmartObjectLayer;

/// State every layer kind shares: identity, blending, visibility, mask and
/// channel storage.
#[derive(Debug, Clone, Default)]
pub struct LayerProperties {
    /// The layer's name
    pub name: String,
    /// 0 = transparent, 255 = opaque
    pub opacity: u8,
    /// How the layer blends with those below it
    pub blend_mode: BlendMode,
    /// Whether the layer clips to the layer below
    pub clipping: bool,
    /// Whether the layer is visible
    pub visible: bool,
    /// Whether the layer is locked (`lspf` bit 7 of the first byte)
    pub locked: bool,
    /// Whether the pixel data is irrelevant to the document's appearance
    pub pixel_data_irrelevant: bool,
    /// The layer's mask record, if any
    pub mask: Option<LayerMask>,
    /// Rectangle enclosing the layer's pixels
    pub rect: PsdRect,
    /// The `lyid` layer id, if the file carried one
    pub(crate) layer_id: Option<u32>,
    /// Full `lspf` flags; only the lock bit is interpreted
    pub(crate) protection_flags: Option<u32>,
    /// The blending ranges blob, preserved verbatim
    pub(crate) blending_ranges: Vec<u8>,
    /// Tagged blocks this crate does not lift into the model
    pub(crate) extra_blocks: Vec<TaggedBlock>,
    /// Channels in on-disk order
    pub(crate) channels: Vec<PsdChannel>,
}

impl LayerProperties {
    /// Sensible defaults for a fresh layer.
    pub fn with_name(name: impl Into<String>) -> LayerProperties {
        LayerProperties {
            name: name.into(),
            opacity: 255,
            blend_mode: BlendMode::Normal,
            visible: true,
            ..LayerProperties::default()
        }
    }

    /// The channels in on-disk order.
    pub fn channels(&self) -> &[PsdChannel] {
        &self.channels
    }

    /// The channel of the given kind, if present.
    pub fn channel(&self, kind: PsdChannelKind) -> Option<&PsdChannel> {
        self.channels.iter().find(|channel| channel.kind() == kind)
    }

    /// Insert or replace a channel, keeping the canonical order: color
    /// channels by ascending id, then transparency, then masks.
    pub fn set_channel(&mut self, channel: PsdChannel) {
        if let Some(existing) = self
            .channels
            .iter_mut()
            .find(|existing| existing.kind() == channel.kind())
        {
            *existing = channel;
            return;
        }
        self.channels.push(channel);
        self.channels.sort_by_key(|channel| {
            let id = channel.kind().id();
            // Negative ids (transparency, masks) sort after the colors
            if id < 0 {
                (1, -id)
            } else {
                (0, id)
            }
        });
    }

    /// Tagged blocks carried by this layer that the model does not lift
    /// out, such as `fxrp` reference points or adjustment descriptors.
    pub fn tagged_blocks(&self) -> &[TaggedBlock] {
        &self.extra_blocks
    }

    /// Attach a tagged block to be written with this layer.
    pub fn add_tagged_block(&mut self, block: TaggedBlock) {
        self.extra_blocks.push(block);
    }

    /// The `fxrp` reference point, if the layer carries one.
    pub fn reference_point(&self) -> Option<(f64, f64)> {
        self.extra_blocks.iter().find_map(|block| match block {
            TaggedBlock::ReferencePoint(x, y) => Some((*x, *y)),
            _ => None,
        })
    }

    /// Set or replace the `fxrp` reference point.
    pub fn set_reference_point(&mut self, x: f64, y: f64) {
        for block in &mut self.extra_blocks {
            if let TaggedBlock::ReferencePoint(bx, by) = block {
                *bx = x;
                *by = y;
                return;
            }
        }
        self.extra_blocks.push(TaggedBlock::ReferencePoint(x, y));
    }

    /// Check that the color mode's required channels are all present.
    /// Transparency and mask channels are optional extras.
    pub(crate) fn validate_channels(&self, color_mode: ColorMode) -> Result<()> {
        for required in color_mode.required_channel_ids() {
            if !self.channels.iter().any(|c| c.kind().id() == *required) {
                return Err(PsdError::BoundsViolation {
                    what: "missing required color channel",
                    value: i64::from(*required),
                    min: 0,
                    max: i64::from(*required),
                });
            }
        }
        Ok(())
    }
}

/// A regular raster layer.
#[derive(Debug, Clone, Default)]
pub struct ImageLayer {
    /// The shared layer state
    pub properties: LayerProperties,
}

impl ImageLayer {
    /// A new image layer with default properties.
    pub fn new(name: impl Into<String>, rect: PsdRect) -> ImageLayer {
        let mut properties = LayerProperties::with_name(name);
        properties.rect = rect;
        ImageLayer { properties }
    }
}

/// A group of layers.
///
/// The group's own visibility, opacity and (possibly pass-through) blend
/// mode apply to all children. On disk a group is a layer record with a
/// section divider block; pass-through mode is stored in the divider while
/// the record itself claims `Normal`.
#[derive(Debug, Clone, Default)]
pub struct GroupLayer {
    /// The shared layer state
    pub properties: LayerProperties,
    /// Child layers, top-most first
    pub children: Vec<Layer>,
    /// Whether the group is collapsed in the layers panel
    pub closed: bool,
}

impl GroupLayer {
    /// A new, open group.
    pub fn new(name: impl Into<String>) -> GroupLayer {
        GroupLayer {
            properties: LayerProperties::with_name(name),
            children: Vec::new(),
            closed: false,
        }
    }
}

/// An adjustment or fill layer.
///
/// The adjustment's descriptor stays in the layer's tagged blocks and is
/// round-tripped opaquely; only the kind key is lifted out.
#[derive(Debug, Clone)]
pub struct AdjustmentLayer {
    /// The shared layer state
    pub properties: LayerProperties,
    /// The adjustment's tagged block key, e.g. `brit` or `curv`
    pub kind: [u8; 4],
}

/// One node of the layer tree.
#[derive(Debug, Clone)]
pub enum Layer {
    /// A raster layer
    Image(ImageLayer),
    /// A group of layers
    Group(GroupLayer),
    /// A placed smart object
    SmartObject(SmartObjectLayer),
    /// An adjustment or fill layer
    Adjustment(AdjustmentLayer),
}

impl Layer {
    /// The shared layer state.
    pub fn properties(&self) -> &LayerProperties {
        match self {
            Layer::Image(layer) => &layer.properties,
            Layer::Group(layer) => &layer.properties,
            Layer::SmartObject(layer) => &layer.properties,
            Layer::Adjustment(layer) => &layer.properties,
        }
    }

    /// The shared layer state, mutably.
    pub fn properties_mut(&mut self) -> &mut LayerProperties {
        match self {
            Layer::Image(layer) => &mut layer.properties,
            Layer::Group(layer) => &mut layer.properties,
            Layer::SmartObject(layer) => &mut layer.properties,
            Layer::Adjustment(layer) => &mut layer.properties,
        }
    }

    /// The layer's name.
    pub fn name(&self) -> &str {
        &self.properties().name
    }

    /// The group's children, if this is a group.
    pub fn children(&self) -> Option<&[Layer]> {
        match self {
            Layer::Group(group) => Some(&group.children),
            _ => None,
        }
    }

    /// The group's children mutably, if this is a group.
    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Layer>> {
        match self {
            Layer::Group(group) => Some(&mut group.children),
            _ => None,
        }
    }
}

/// Borrow a specific layer kind out of a [`Layer`], for
/// [`LayeredFile::find_layer_as`](super::LayeredFile::find_layer_as).
pub trait LayerKindRef<'a>: Sized {
    /// The borrow, if the layer is of the right kind.
    fn from_layer(layer: &'a Layer) -> Option<Self>;
}

impl<'a> LayerKindRef<'a> for &'a ImageLayer {
    fn from_layer(layer: &'a Layer) -> Option<Self> {
        match layer {
            Layer::Image(image) => Some(image),
            _ => None,
        }
    }
}

impl<'a> LayerKindRef<'a> for &'a GroupLayer {
    fn from_layer(layer: &'a Layer) -> Option<Self> {
        match layer {
            Layer::Group(group) => Some(group),
            _ => None,
        }
    }
}

impl<'a> LayerKindRef<'a> for &'a SmartObjectLayer {
    fn from_layer(layer: &'a Layer) -> Option<Self> {
        match layer {
            Layer::SmartObject(smart) => Some(smart),
            _ => None,
        }
    }
}

impl<'a> LayerKindRef<'a> for &'a AdjustmentLayer {
    fn from_layer(layer: &'a Layer) -> Option<Self> {
        match layer {
            Layer::Adjustment(adjustment) => Some(adjustment),
            _ => None,
        }
    }
}
