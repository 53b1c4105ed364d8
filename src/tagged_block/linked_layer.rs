//! `lnk2` / `lnk3` / `lnkD` linked layer records.
//!
//! A linked layer block is a flat concatenation of records with no count:
//! the reader keeps pulling records while at least eight unread bytes
//! remain. Each record starts with its own 64-bit length, which covers the
//! payload following the length field.
//!
//! The record layout varies by version (1..=7); the optional trailing
//! fields appeared one version at a time and version 2 external records
//! put the raw bytes after them.

use std::io::{Seek, Write};
use std::path::Path;

use crate::descriptor::{DescriptorField, DescriptorStructure, DESCRIPTOR_VERSION};
use crate::error::{PsdError, Result};
use crate::sections::length_marker::LengthWidth;
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};
use crate::unicode_string::{read_pascal_string, write_pascal_string, UnicodeString};

/// Where a linked layer's bytes live.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LinkedLayerType {
    /// `liFD`: the file's bytes are embedded in the document
    Data,
    /// `liFE`: the file lives outside the document
    External,
    /// `liFA`: an alias record with no payload
    Alias,
}

impl LinkedLayerType {
    fn from_fourcc(key: [u8; 4]) -> Result<LinkedLayerType> {
        match &key {
            b"liFD" => Ok(LinkedLayerType::Data),
            b"liFE" => Ok(LinkedLayerType::External),
            b"liFA" => Ok(LinkedLayerType::Alias),
            _ => Err(PsdError::InvalidSignature {
                expected: &["liFD", "liFE", "liFA"],
                found: key,
            }),
        }
    }

    fn fourcc(self) -> [u8; 4] {
        match self {
            LinkedLayerType::Data => *b"liFD",
            LinkedLayerType::External => *b"liFE",
            LinkedLayerType::Alias => *b"liFA",
        }
    }
}

/// A timestamp as stored in external link records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkedLayerDate {
    /// Four digit year
    pub year: u32,
    /// 1 based month
    pub month: u8,
    /// 1 based day
    pub day: u8,
    /// Hour
    pub hour: u8,
    /// Minute
    pub minute: u8,
    /// Seconds with fraction
    pub seconds: f64,
}

impl Default for LinkedLayerDate {
    fn default() -> Self {
        LinkedLayerDate {
            year: 2000,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            seconds: 0.0,
        }
    }
}

impl LinkedLayerDate {
    fn read(cursor: &mut PsdCursor) -> Result<LinkedLayerDate> {
        Ok(LinkedLayerDate {
            year: cursor.read_u32()?,
            month: cursor.read_u8()?,
            day: cursor.read_u8()?,
            hour: cursor.read_u8()?,
            minute: cursor.read_u8()?,
            seconds: cursor.read_f64()?,
        })
    }
}

impl PsdSerialize for LinkedLayerDate {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write_u32(self.year)?;
        buffer.write_u8(self.month)?;
        buffer.write_u8(self.day)?;
        buffer.write_u8(self.hour)?;
        buffer.write_u8(self.minute)?;
        buffer.write_f64(self.seconds)
    }
}

/// One linked layer record: the stored file plus its metadata.
#[derive(Debug, Clone)]
pub struct LinkedLayerRecord {
    /// The record layout version, 1..=7
    pub version: u32,
    /// Where the bytes live
    pub link_type: LinkedLayerType,
    /// The UUID smart object layers reference
    pub unique_id: String,
    /// The original file name
    pub file_name: UnicodeString,
    /// The file type four character code, four spaces when unknown
    pub file_type: [u8; 4],
    /// The file creator word
    pub file_creator: u32,
    /// Descriptor describing how the file was opened
    pub file_open_descriptor: Option<DescriptorStructure>,
    /// External records: descriptor locating the linked file
    pub linked_file_descriptor: Option<DescriptorStructure>,
    /// External records of version 4 and later: the link timestamp
    pub date: Option<LinkedLayerDate>,
    /// External records: the on-disk size the authoring tool recorded
    pub external_file_size: u64,
    /// The stored file bytes; empty for alias records
    pub data: Vec<u8>,
    /// Version 5 and later: child document id
    pub child_document_id: Option<UnicodeString>,
    /// Version 6 and later: asset modification time
    pub asset_mod_time: Option<f64>,
    /// Version 7 and later: asset lock flag
    pub asset_locked: Option<bool>,
}

impl LinkedLayerRecord {
    /// An embedded (`liFD`) record at the current write version.
    pub fn embedded(unique_id: impl Into<String>, file_name: &str, data: Vec<u8>) -> LinkedLayerRecord {
        LinkedLayerRecord {
            version: 7,
            link_type: LinkedLayerType::Data,
            unique_id: unique_id.into(),
            file_name: UnicodeString::new(file_name),
            file_type: file_type_for_path(Path::new(file_name)),
            file_creator: u32::from_be_bytes(*b"8BIM"),
            file_open_descriptor: None,
            linked_file_descriptor: None,
            date: None,
            external_file_size: 0,
            data,
            child_document_id: Some(UnicodeString::default()),
            asset_mod_time: Some(0.0),
            asset_locked: Some(false),
        }
    }

    /// An external (`liFE`) record. Version 2 matches what the authoring
    /// tool emits for external links.
    pub fn external(
        unique_id: impl Into<String>,
        full_path: &str,
        data: Vec<u8>,
    ) -> LinkedLayerRecord {
        let path = Path::new(full_path);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| full_path.to_string());

        let mut linked = DescriptorStructure::new("ExternalFileLink");
        linked.insert("descVersion", DescriptorField::Integer(2));
        linked.insert(
            "Nm  ",
            DescriptorField::String(UnicodeString::new(file_name.clone())),
        );
        linked.insert(
            "fullPath",
            DescriptorField::String(UnicodeString::new(full_path)),
        );
        linked.insert(
            "originalPath",
            DescriptorField::String(UnicodeString::new(full_path)),
        );
        linked.insert(
            "relPath",
            DescriptorField::String(UnicodeString::new(full_path)),
        );

        let external_file_size = data.len() as u64;
        LinkedLayerRecord {
            version: 2,
            link_type: LinkedLayerType::External,
            unique_id: unique_id.into(),
            file_name: UnicodeString::new(file_name),
            file_type: file_type_for_path(path),
            file_creator: u32::from_be_bytes(*b"8BIM"),
            file_open_descriptor: None,
            linked_file_descriptor: Some(linked),
            date: None,
            external_file_size,
            data,
            child_document_id: None,
            asset_mod_time: None,
            asset_locked: None,
        }
    }

    fn read(cursor: &mut PsdCursor) -> Result<LinkedLayerRecord> {
        let length = cursor.read_u64()?;
        let record_end = cursor.position() + length;

        let link_type = LinkedLayerType::from_fourcc(cursor.read_4()?)?;
        let version = cursor.read_u32()?;
        if !(1..=7).contains(&version) {
            return Err(PsdError::UnsupportedVersion {
                version: version as u16,
            });
        }

        let unique_id = read_pascal_string(cursor, 1)?;
        let file_name = UnicodeString::read(cursor, 1)?;
        let file_type = cursor.read_4()?;
        let file_creator = cursor.read_u32()?;

        let data_size = cursor.read_u64()?;
        let file_open_descriptor = if cursor.read_bool()? {
            let descriptor_version = cursor.read_u32()?;
            if descriptor_version != DESCRIPTOR_VERSION {
                return Err(PsdError::CorruptDescriptor(format!(
                    "linked layer file open descriptor version {}, expected {}",
                    descriptor_version, DESCRIPTOR_VERSION
                )));
            }
            Some(DescriptorStructure::read(cursor)?)
        } else {
            None
        };

        let mut linked_file_descriptor = None;
        let mut date = None;
        let mut external_file_size = 0;
        let mut data = Vec::new();

        match link_type {
            LinkedLayerType::External => {
                let descriptor_version = cursor.read_u32()?;
                if descriptor_version != DESCRIPTOR_VERSION {
                    return Err(PsdError::CorruptDescriptor(format!(
                        "linked file descriptor version {}, expected {}",
                        descriptor_version, DESCRIPTOR_VERSION
                    )));
                }
                linked_file_descriptor = Some(DescriptorStructure::read(cursor)?);
                if version > 3 {
                    date = Some(LinkedLayerDate::read(cursor)?);
                }
                external_file_size = cursor.read_u64()?;
                if version > 2 {
                    data = cursor.read(data_size)?.to_vec();
                }
            }
            LinkedLayerType::Alias => {
                cursor.skip(8)?;
            }
            LinkedLayerType::Data => {
                data = cursor.read(data_size)?.to_vec();
            }
        }

        let child_document_id = if version >= 5 {
            Some(UnicodeString::read(cursor, 1)?)
        } else {
            None
        };
        let asset_mod_time = if version >= 6 {
            Some(cursor.read_f64()?)
        } else {
            None
        };
        let asset_locked = if version >= 7 {
            Some(cursor.read_bool()?)
        } else {
            None
        };

        // Version 2 external records store their bytes after the trailing
        // fields
        if version == 2 && link_type == LinkedLayerType::External {
            data = cursor.read(data_size)?.to_vec();
        }

        cursor.set_position(record_end);

        Ok(LinkedLayerRecord {
            version,
            link_type,
            unique_id,
            file_name,
            file_type,
            file_creator,
            file_open_descriptor,
            linked_file_descriptor,
            date,
            external_file_size,
            data,
            child_document_id,
            asset_mod_time,
            asset_locked,
        })
    }
}

impl PsdSerialize for LinkedLayerRecord {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        let marker = buffer.begin_length(LengthWidth::U64, 1)?;

        buffer.write(&self.link_type.fourcc())?;
        buffer.write_u32(self.version)?;
        write_pascal_string(buffer, &self.unique_id, 1)?;
        self.file_name.write(buffer, 1)?;
        buffer.write(&self.file_type)?;
        buffer.write_u32(self.file_creator)?;

        buffer.write_u64(self.data.len() as u64)?;
        buffer.write_bool(self.file_open_descriptor.is_some())?;
        if let Some(descriptor) = &self.file_open_descriptor {
            buffer.write_u32(DESCRIPTOR_VERSION)?;
            descriptor.write(buffer)?;
        }

        match self.link_type {
            LinkedLayerType::External => {
                let descriptor = self.linked_file_descriptor.as_ref().ok_or_else(|| {
                    PsdError::MissingLinkedLayer {
                        uuid: self.unique_id.clone(),
                    }
                })?;
                buffer.write_u32(DESCRIPTOR_VERSION)?;
                descriptor.write(buffer)?;
                if self.version > 3 {
                    self.date.unwrap_or_default().write(buffer)?;
                }
                buffer.write_u64(self.external_file_size)?;
                if self.version > 2 {
                    buffer.write(&self.data)?;
                }
            }
            LinkedLayerType::Alias => {
                buffer.write_zeros(8)?;
            }
            LinkedLayerType::Data => {
                buffer.write(&self.data)?;
            }
        }

        if self.version >= 5 {
            self.child_document_id
                .clone()
                .unwrap_or_default()
                .write(buffer, 1)?;
        }
        if self.version >= 6 {
            buffer.write_f64(self.asset_mod_time.unwrap_or(0.0))?;
        }
        if self.version >= 7 {
            buffer.write_bool(self.asset_locked.unwrap_or(false))?;
        }

        if self.version == 2 && self.link_type == LinkedLayerType::External {
            buffer.write(&self.data)?;
        }

        buffer.end_length(marker)?;
        Ok(())
    }
}

/// Read records until fewer than eight bytes remain.
pub(crate) fn read_records(cursor: &mut PsdCursor) -> Result<Vec<LinkedLayerRecord>> {
    let mut records = Vec::new();
    while cursor.remaining() >= 8 {
        records.push(LinkedLayerRecord::read(cursor)?);
    }
    Ok(records)
}

/// Map a file extension to the four character code the format stores.
/// Unknown types are four spaces, not zeros.
pub(crate) fn file_type_for_path(path: &Path) -> [u8; 4] {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => *b"JPEG",
        "png" => *b"png ",
        "tif" | "tiff" => *b"TIFF",
        "mpo" => *b"MPO ",
        "psd" => *b"8BPS",
        "psb" => *b"8BPB",
        "bmp" => *b"BMP ",
        "dcm" => *b"DCIM",
        "gif" => *b"GIFf",
        "eps" => *b"EPSF",
        "jps" => *b"JPS ",
        _ => *b"    ",
    }
}
