//! Data structures and methods for reading and writing layered PSD and PSB
//! files.
//!
//! You are encouraged to read the PSD specification before contributing to
//! this codebase. This will help you better understand the current approach
//! and discover ways to improve it.
//!
//! psd spec: https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/
//!
//! Two views of a file exist side by side:
//!
//! * [`Psd`] is the on-disk skeleton: the five major sections, with layers
//!   as a flat bottom-up list.
//! * [`LayeredFile`] is the editing model: a tree of image, group, smart
//!   object and adjustment layers, a store of linked smart object payloads,
//!   and the operations to rearrange them.
//!
//! ```no_run
//! use psd_kit::LayeredFile;
//!
//! # fn main() -> Result<(), psd_kit::PsdError> {
//! let mut document = LayeredFile::open("art.psd")?;
//! document.move_layer("Group/Sketch", None);
//! document.save("art-flat.psd")?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

pub use crate::blend_mode::BlendMode;
pub use crate::compression::{CompressionPolicy, PsdChannelCompression};
pub use crate::descriptor::{
    ClassStructure, DescriptorField, DescriptorStructure, EnumeratedDescriptor,
    EnumeratedReference, ListStructure, NameStructure, ObjectArrayStructure, OffsetStructure,
    PropertyStructure, RawDataStructure, UnitFloatStructure, UnitFloatUnit, UnitFloatsStructure,
    UnknownOsType,
};
pub use crate::error::{PsdError, Result};
pub use crate::layered::{
    AdjustmentLayer, GroupLayer, ImageLayer, Layer, LayerKindRef, LayerProperties, LayeredFile,
    LinkedLayerStore, SmartObjectLayer, TraversalOrder,
};
pub use crate::progress::{NoProgress, ProgressCallback};
pub use crate::psd_channel::{PsdChannel, PsdChannelKind};
pub use crate::sections::file_header_section::{ColorMode, PsdDepth, PsdVersion};
pub use crate::sections::image_data_section::ImageDataSection;
pub use crate::sections::image_resources_section::{ImageResource, ImageResourcesSection};
pub use crate::sections::layer_and_mask_information_section::{
    layer_flags, mask_flags, LayerMask, MaskParameters, PsdRect, RealUserMask,
};
pub use crate::tagged_block::linked_layer::LinkedLayerDate;
pub use crate::tagged_block::placed_layer::PlacedLayerKind;
pub use crate::tagged_block::{
    LinkedLayerRecord, LinkedLayerType, PlacedLayerBlock, PlacedLayerDataBlock,
    SectionDividerBlock, SectionDividerType, TaggedBlock,
};
pub use crate::unicode_string::UnicodeString;
pub use crate::warp::{BezierSurface, Point2D, QuadMesh, Warp, WarpRotate, WarpStyle};

mod blend_mode;
mod compression;
mod descriptor;
mod error;
mod layered;
mod progress;
mod psd_channel;
mod sections;
mod tagged_block;
mod unicode_string;
mod warp;

use crate::sections::color_mode_data_section::ColorModeDataSection;
use crate::sections::file_header_section::FileHeaderSection;
use crate::sections::layer_and_mask_information_section::LayerAndMaskInformationSection;
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};

/// Options controlling how a file is parsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Fail on tagged block keys this crate does not know instead of
    /// preserving them as opaque blocks.
    pub strict: bool,
}

/// Represents the contents of a PSD or PSB file: the five major sections,
/// parsed but not reshaped.
///
/// Most callers want [`LayeredFile`] instead; `Psd` is the faithful
/// on-disk view it is built from.
#[derive(Debug, Clone)]
pub struct Psd {
    pub(crate) file_header_section: FileHeaderSection,
    pub(crate) color_mode_data_section: ColorModeDataSection,
    pub(crate) image_resources_section: ImageResourcesSection,
    pub(crate) layer_and_mask_information_section: LayerAndMaskInformationSection,
    pub(crate) image_data_section: ImageDataSection,
}

impl Psd {
    /// Create a Psd from a byte slice.
    ///
    /// You'll typically get these bytes from a PSD file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Psd> {
        Psd::from_bytes_with_options(bytes, &ReadOptions::default())
    }

    /// [`Psd::from_bytes`] with explicit options.
    pub fn from_bytes_with_options(bytes: &[u8], options: &ReadOptions) -> Result<Psd> {
        let mut cursor = PsdCursor::new(bytes);

        let file_header_section = FileHeaderSection::from_bytes(
            cursor.read(sections::file_header_section::FILE_HEADER_SECTION_LEN)?,
        )?;
        let version = file_header_section.version;
        let depth = file_header_section.depth;
        let color_mode = file_header_section.color_mode;

        let color_mode_data_section = ColorModeDataSection::read(&mut cursor)?;
        let image_resources_section = ImageResourcesSection::read(&mut cursor)?;
        let layer_and_mask_information_section = LayerAndMaskInformationSection::read(
            &mut cursor,
            version,
            depth,
            color_mode,
            options.strict,
        )?;
        let image_data_section = ImageDataSection::read(
            &mut cursor,
            file_header_section.width.0,
            file_header_section.height.0,
            file_header_section.channel_count.count() as usize,
            depth,
            version,
        )?;

        Ok(Psd {
            file_header_section,
            color_mode_data_section,
            image_resources_section,
            layer_and_mask_information_section,
            image_data_section,
        })
    }

    /// Serialize the file into a writer.
    pub fn write_to<W: Write + Seek>(
        &self,
        writer: &mut W,
        progress: &mut dyn ProgressCallback,
    ) -> Result<()> {
        let mut buffer = PsdBuffer::new(writer);
        let version = self.file_header_section.version;
        let depth = self.file_header_section.depth;

        progress.set_max(4 + self.layer_and_mask_information_section.channel_count());

        progress.set_task("header");
        if progress.is_cancelled() {
            return Err(PsdError::Cancelled);
        }
        self.file_header_section.write(&mut buffer)?;
        self.color_mode_data_section.write(&mut buffer)?;
        progress.increment();

        progress.set_task("image resources");
        if progress.is_cancelled() {
            return Err(PsdError::Cancelled);
        }
        self.image_resources_section.write(&mut buffer)?;
        progress.increment();

        progress.set_task("layers");
        if progress.is_cancelled() {
            return Err(PsdError::Cancelled);
        }
        self.layer_and_mask_information_section
            .write(&mut buffer, version, depth, progress)?;
        progress.increment();

        progress.set_task("composite");
        if progress.is_cancelled() {
            return Err(PsdError::Cancelled);
        }
        self.image_data_section.write_section(
            &mut buffer,
            self.file_header_section.width.0,
            self.file_header_section.height.0,
            depth,
            version,
        )?;
        progress.increment();

        Ok(())
    }

    /// Serialize the file into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor, &mut NoProgress)?;
        Ok(cursor.into_inner())
    }

    /// The file variant.
    pub fn version(&self) -> PsdVersion {
        self.file_header_section.version
    }

    /// The width of the PSD file
    pub fn width(&self) -> u32 {
        self.file_header_section.width.0
    }

    /// The height of the PSD file
    pub fn height(&self) -> u32 {
        self.file_header_section.height.0
    }

    /// The number of bits per channel
    pub fn depth(&self) -> PsdDepth {
        self.file_header_section.depth
    }

    /// The color mode of the file
    pub fn color_mode(&self) -> ColorMode {
        self.file_header_section.color_mode
    }

    /// The number of channels in the composite image
    pub fn channel_count(&self) -> u16 {
        self.file_header_section.channel_count.count()
    }

    /// The image resource blocks.
    pub fn image_resources(&self) -> &ImageResourcesSection {
        &self.image_resources_section
    }

    /// The composite image data.
    pub fn composite(&self) -> &ImageDataSection {
        &self.image_data_section
    }
}

impl LayeredFile {
    /// Read a layered document from a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<LayeredFile> {
        LayeredFile::open_with_options(path, &ReadOptions::default())
    }

    /// [`LayeredFile::open`] with explicit options.
    pub fn open_with_options(path: impl AsRef<Path>, options: &ReadOptions) -> Result<LayeredFile> {
        let bytes = std::fs::read(path)?;
        LayeredFile::from_bytes_with_options(&bytes, options)
    }

    /// Read a layered document from bytes in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<LayeredFile> {
        LayeredFile::from_bytes_with_options(bytes, &ReadOptions::default())
    }

    /// [`LayeredFile::from_bytes`] with explicit options.
    pub fn from_bytes_with_options(bytes: &[u8], options: &ReadOptions) -> Result<LayeredFile> {
        LayeredFile::from_psd(Psd::from_bytes_with_options(bytes, options)?)
    }

    /// Write the document to a file on disk.
    ///
    /// The bytes go to a temporary file first and only replace `path` on
    /// success, so a failed or cancelled write never leaves a partial
    /// file behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with_progress(path, &mut NoProgress)
    }

    /// [`LayeredFile::save`] with progress reporting and cancellation.
    pub fn save_with_progress(
        &self,
        path: impl AsRef<Path>,
        progress: &mut dyn ProgressCallback,
    ) -> Result<()> {
        let path = path.as_ref();
        let temp = path.with_extension("psd-tmp");

        let written = (|| -> Result<()> {
            let file = File::create(&temp)?;
            let mut writer = BufWriter::new(file);
            self.write_to(&mut writer, progress)?;
            writer.flush()?;
            Ok(())
        })();

        match written {
            Ok(()) => {
                std::fs::rename(&temp, path)?;
                Ok(())
            }
            Err(err) => {
                let _ = std::fs::remove_file(&temp);
                Err(err)
            }
        }
    }

    /// Serialize the document into a writer.
    pub fn write_to<W: Write + Seek>(
        &self,
        writer: &mut W,
        progress: &mut dyn ProgressCallback,
    ) -> Result<()> {
        self.to_psd()?.write_to(writer, progress)
    }

    /// Serialize the document into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_psd()?.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CancelImmediately;

    impl ProgressCallback for CancelImmediately {
        fn set_max(&mut self, _max: u64) {}
        fn increment(&mut self) {}
        fn set_task(&mut self, _task: &str) {}
        fn is_cancelled(&self) -> bool {
            true
        }
    }

    #[test]
    fn empty_document_round_trips() {
        let file = LayeredFile::new(PsdVersion::One, ColorMode::Rgb, PsdDepth::Eight, 4, 4)
            .unwrap();
        let bytes = file.to_bytes().unwrap();
        let reread = LayeredFile::from_bytes(&bytes).unwrap();
        assert_eq!(reread.width(), 4);
        assert_eq!(reread.height(), 4);
        assert_eq!(reread.version(), PsdVersion::One);
        assert!(reread.layers.is_empty());
    }

    #[test]
    fn cancelled_write_returns_cancelled() {
        let file = LayeredFile::new(PsdVersion::One, ColorMode::Rgb, PsdDepth::Eight, 4, 4)
            .unwrap();
        let mut cursor = Cursor::new(Vec::new());
        assert!(matches!(
            file.write_to(&mut cursor, &mut CancelImmediately),
            Err(PsdError::Cancelled)
        ));
    }

    #[test]
    fn truncated_files_fail_cleanly() {
        let file = LayeredFile::new(PsdVersion::One, ColorMode::Rgb, PsdDepth::Eight, 4, 4)
            .unwrap();
        let bytes = file.to_bytes().unwrap();
        assert!(Psd::from_bytes(&bytes[..20]).is_err());
    }
}
