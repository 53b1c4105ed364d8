//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! The file header contains the basic properties of the image.
//!
//! | Length | Description                                                                                                                                          |
//! |--------|------------------------------------------------------------------------------------------------------------------------------------------------------|
//! | 4      | Signature: always equal to '8BPS' . Do not try to read the file if the signature does not match this value.                                          |
//! | 2      | Version: always equal to 1. (**PSB** version is 2.)                                                                                                  |
//! | 6      | Reserved: must be zero.                                                                                                                              |
//! | 2      | The number of channels in the image, including any alpha channels. Supported range is 1 to 56.                                                       |
//! | 4      | The height of the image in pixels. Supported range is 1 to 30,000.<br> (**PSB** max of 300,000.)                                                     |
//! | 4      | The width of the image in pixels. Supported range is 1 to 30,000.<br> (**PSB** max of 300,000)                                                       |
//! | 2      | Depth: the number of bits per channel. Supported values are 1, 8, 16 and 32.                                                                         |
//! | 2      | The color mode of the file. Supported values are: Bitmap = 0; Grayscale = 1; Indexed = 2; RGB = 3; CMYK = 4; Multichannel = 7; Duotone = 8; Lab = 9. |

use std::io::{Seek, Write};

use crate::error::{PsdError, Result};
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};

/// Bytes representing the string "8BPS".
const EXPECTED_PSD_SIGNATURE: [u8; 4] = *b"8BPS";
/// The length of the entire file header section
pub(crate) const FILE_HEADER_SECTION_LEN: u64 = 26;

/// The FileHeaderSection comes from the first 26 bytes in the PSD file.
///
/// The signature and the reserved zeros are validated on read and not
/// stored, since they are always the same.
#[derive(Debug, Clone)]
pub struct FileHeaderSection {
    pub(crate) version: PsdVersion,
    pub(crate) channel_count: ChannelCount,
    pub(crate) width: PsdWidth,
    pub(crate) height: PsdHeight,
    pub(crate) depth: PsdDepth,
    pub(crate) color_mode: ColorMode,
}

impl FileHeaderSection {
    /// Create a FileHeaderSection from the first 26 bytes of a PSD or PSB
    /// file.
    pub fn from_bytes(bytes: &[u8]) -> Result<FileHeaderSection> {
        if bytes.len() < FILE_HEADER_SECTION_LEN as usize {
            return Err(PsdError::UnexpectedEof);
        }
        let mut cursor = PsdCursor::new(bytes);

        // First four bytes must be '8BPS'
        let signature = cursor.read_4()?;
        if signature != EXPECTED_PSD_SIGNATURE {
            return Err(PsdError::InvalidSignature {
                expected: &["8BPS"],
                found: signature,
            });
        }

        let version = PsdVersion::new(cursor.read_u16()?)?;

        // The next 6 bytes are reserved and must be zero
        let reserved = cursor.read(6)?;
        if reserved != [0; 6] {
            let mut found = [0; 4];
            found.copy_from_slice(&reserved[..4]);
            return Err(PsdError::InvalidSignature {
                expected: &["six reserved zero bytes"],
                found,
            });
        }

        let channel_count = ChannelCount::new(cursor.read_u16()?)?;
        let height = PsdHeight::new(cursor.read_u32()?, version)?;
        let width = PsdWidth::new(cursor.read_u32()?, version)?;
        let depth = PsdDepth::new(cursor.read_u16()?)?;
        let color_mode = ColorMode::new(cursor.read_u16()?)?;

        Ok(FileHeaderSection {
            version,
            channel_count,
            width,
            height,
            depth,
            color_mode,
        })
    }

    /// Assemble a header, validating dimensions against the version.
    pub fn new(
        version: PsdVersion,
        channel_count: u16,
        width: u32,
        height: u32,
        depth: PsdDepth,
        color_mode: ColorMode,
    ) -> Result<FileHeaderSection> {
        Ok(FileHeaderSection {
            version,
            channel_count: ChannelCount::new(channel_count)?,
            width: PsdWidth::new(width, version)?,
            height: PsdHeight::new(height, version)?,
            depth,
            color_mode,
        })
    }
}

impl PsdSerialize for FileHeaderSection {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write(&EXPECTED_PSD_SIGNATURE)?;
        buffer.write_u16(self.version.number())?;
        buffer.write_zeros(6)?;
        buffer.write_u16(self.channel_count.count())?;
        buffer.write_u32(self.height.0)?;
        buffer.write_u32(self.width.0)?;
        buffer.write_u16(self.depth as u16)?;
        buffer.write_u16(self.color_mode as u16)?;
        Ok(())
    }
}

/// # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
///
/// Version: always equal to 1 for PSD, 2 for PSB.
///
/// Version 2 widens a fixed set of length and offset fields from 32 to 64
/// bits and raises the dimension limits tenfold.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PsdVersion {
    /// Regular PSD
    One,
    /// Large document PSB
    Two,
}

impl PsdVersion {
    /// Decode the header's version field
    pub fn new(version: u16) -> Result<PsdVersion> {
        match version {
            1 => Ok(PsdVersion::One),
            2 => Ok(PsdVersion::Two),
            _ => Err(PsdError::UnsupportedVersion { version }),
        }
    }

    /// The value stored in the header
    pub fn number(self) -> u16 {
        match self {
            PsdVersion::One => 1,
            PsdVersion::Two => 2,
        }
    }

    /// Whether this is the large document variant
    pub fn is_psb(self) -> bool {
        self == PsdVersion::Two
    }

    fn max_dimension(self) -> u32 {
        match self {
            PsdVersion::One => 30_000,
            PsdVersion::Two => 300_000,
        }
    }
}

/// # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
///
/// The number of channels in the image, including any alpha channels.
/// Supported range is 1 to 56.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChannelCount(u16);

impl ChannelCount {
    /// Create a new ChannelCount
    pub fn new(channel_count: u16) -> Result<ChannelCount> {
        if !(1..=56).contains(&channel_count) {
            return Err(PsdError::BoundsViolation {
                what: "channel count",
                value: i64::from(channel_count),
                min: 1,
                max: 56,
            });
        }
        Ok(ChannelCount(channel_count))
    }

    /// Return the channel count
    pub fn count(&self) -> u16 {
        self.0
    }
}

/// # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
///
/// The height of the image in pixels. Supported range is 1 to 30,000
/// (PSB max of 300,000).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PsdHeight(pub(crate) u32);

impl PsdHeight {
    /// Create a new PsdHeight
    pub fn new(height: u32, version: PsdVersion) -> Result<PsdHeight> {
        if height < 1 || height > version.max_dimension() {
            return Err(PsdError::BoundsViolation {
                what: "height",
                value: i64::from(height),
                min: 1,
                max: i64::from(version.max_dimension()),
            });
        }
        Ok(PsdHeight(height))
    }
}

/// # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
///
/// The width of the image in pixels. Supported range is 1 to 30,000
/// (PSB max of 300,000).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PsdWidth(pub(crate) u32);

impl PsdWidth {
    /// Create a new PsdWidth
    pub fn new(width: u32, version: PsdVersion) -> Result<PsdWidth> {
        if width < 1 || width > version.max_dimension() {
            return Err(PsdError::BoundsViolation {
                what: "width",
                value: i64::from(width),
                min: 1,
                max: i64::from(version.max_dimension()),
            });
        }
        Ok(PsdWidth(width))
    }
}

/// # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
///
/// Depth: the number of bits per channel. Supported values are 1, 8, 16
/// and 32.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum PsdDepth {
    One = 1,
    Eight = 8,
    Sixteen = 16,
    ThirtyTwo = 32,
}

impl PsdDepth {
    /// Create a new PsdDepth
    pub fn new(depth: u16) -> Result<PsdDepth> {
        match depth {
            1 => Ok(PsdDepth::One),
            8 => Ok(PsdDepth::Eight),
            16 => Ok(PsdDepth::Sixteen),
            32 => Ok(PsdDepth::ThirtyTwo),
            _ => Err(PsdError::BoundsViolation {
                what: "depth",
                value: i64::from(depth),
                min: 1,
                max: 32,
            }),
        }
    }

    /// Bytes each sample of this depth occupies. One bit channels are not
    /// supported end to end and are treated as one byte per sample.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            PsdDepth::One | PsdDepth::Eight => 1,
            PsdDepth::Sixteen => 2,
            PsdDepth::ThirtyTwo => 4,
        }
    }
}

/// # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
///
/// The color mode of the file. Supported values are: Bitmap = 0;
/// Grayscale = 1; Indexed = 2; RGB = 3; CMYK = 4; Multichannel = 7;
/// Duotone = 8; Lab = 9.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum ColorMode {
    Bitmap = 0,
    Grayscale = 1,
    Indexed = 2,
    Rgb = 3,
    Cmyk = 4,
    Multichannel = 7,
    Duotone = 8,
    Lab = 9,
}

impl ColorMode {
    /// Create a new ColorMode
    pub fn new(color_mode: u16) -> Result<ColorMode> {
        match color_mode {
            0 => Ok(ColorMode::Bitmap),
            1 => Ok(ColorMode::Grayscale),
            2 => Ok(ColorMode::Indexed),
            3 => Ok(ColorMode::Rgb),
            4 => Ok(ColorMode::Cmyk),
            7 => Ok(ColorMode::Multichannel),
            8 => Ok(ColorMode::Duotone),
            9 => Ok(ColorMode::Lab),
            _ => Err(PsdError::BoundsViolation {
                what: "color mode",
                value: i64::from(color_mode),
                min: 0,
                max: 9,
            }),
        }
    }

    /// The channel ids this mode requires on an image layer, not counting
    /// transparency or masks.
    pub fn required_channel_ids(self) -> &'static [i16] {
        match self {
            ColorMode::Rgb => &[0, 1, 2],
            ColorMode::Cmyk => &[0, 1, 2, 3],
            ColorMode::Grayscale
            | ColorMode::Duotone
            | ColorMode::Bitmap
            | ColorMode::Indexed => &[0],
            ColorMode::Lab => &[0, 1, 2],
            ColorMode::Multichannel => &[0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn valid_header_bytes() -> Vec<u8> {
        let header = FileHeaderSection::new(
            PsdVersion::One,
            3,
            4,
            2,
            PsdDepth::Eight,
            ColorMode::Rgb,
        )
        .unwrap();
        let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
        header.write(&mut buffer).unwrap();
        buffer.into_inner().into_inner()
    }

    #[test]
    fn header_writes_its_documented_26_bytes() {
        let bytes = valid_header_bytes();
        assert_eq!(
            bytes,
            vec![
                b'8', b'B', b'P', b'S', // signature
                0, 1, // version
                0, 0, 0, 0, 0, 0, // reserved
                0, 3, // channels
                0, 0, 0, 2, // height
                0, 0, 0, 4, // width
                0, 8, // depth
                0, 3, // color mode
            ]
        );
    }

    #[test]
    fn header_round_trips() {
        let bytes = valid_header_bytes();
        let header = FileHeaderSection::from_bytes(&bytes).unwrap();
        assert_eq!(header.version, PsdVersion::One);
        assert_eq!(header.channel_count.count(), 3);
        assert_eq!(header.width.0, 4);
        assert_eq!(header.height.0, 2);
        assert_eq!(header.depth, PsdDepth::Eight);
        assert_eq!(header.color_mode, ColorMode::Rgb);
    }

    #[test]
    fn invalid_signature_is_rejected() {
        let mut bytes = valid_header_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            FileHeaderSection::from_bytes(&bytes),
            Err(PsdError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn version_three_is_rejected() {
        let mut bytes = valid_header_bytes();
        bytes[5] = 3;
        assert!(matches!(
            FileHeaderSection::from_bytes(&bytes),
            Err(PsdError::UnsupportedVersion { version: 3 })
        ));
    }

    #[test]
    fn channel_count_bounds() {
        assert!(ChannelCount::new(0).is_err());
        assert!(ChannelCount::new(1).is_ok());
        assert!(ChannelCount::new(56).is_ok());
        assert!(ChannelCount::new(57).is_err());
    }

    #[test]
    fn psb_raises_the_dimension_limit() {
        assert!(PsdWidth::new(100_000, PsdVersion::One).is_err());
        assert!(PsdWidth::new(100_000, PsdVersion::Two).is_ok());
        assert!(PsdHeight::new(300_001, PsdVersion::Two).is_err());
    }
}
