//! The self-describing key/value serialization Photoshop uses inside many
//! tagged blocks and image resources.
//!
//! A descriptor is a recursive map of keys to typed values. Each value is
//! introduced by a four byte OS type marker:
//!
//! | Key      | Value                                |
//! |----------|--------------------------------------|
//! | `Objc` / `GlbO` | Nested descriptor             |
//! | `ObAr`   | Object array                         |
//! | `VlLs` / `obj ` | List / reference list         |
//! | `doub`   | IEEE-754 double                      |
//! | `UntF`   | Unit float (unit + double)           |
//! | `UnFl`   | Unit floats (unit + double vector)   |
//! | `TEXT`   | Unicode string                       |
//! | `enum`   | Enumerated (type + enum)             |
//! | `long`   | 32-bit integer                       |
//! | `comp`   | 64-bit integer                       |
//! | `bool`   | One byte boolean                     |
//! | `type` / `GlbC` / `Clss` | Class                |
//! | `alis`   | Alias (opaque)                       |
//! | `tdta` / `Pth ` | Raw data (opaque)             |
//! | `prop`   | Property                             |
//! | `Enmr`   | Enumerated reference                 |
//! | `rele`   | Offset                               |
//! | `Idnt`   | Identifier                           |
//! | `indx`   | Index                                |
//! | `name`   | Name                                 |
//!
//! Several OS types share one in-memory variant (`Objc`/`GlbO`, the class
//! triple, `tdta`/`Pth `, `VlLs`/`obj `); the original marker is kept on the
//! value so serialization reproduces the input byte for byte.
//!
//! Field order is significant for round-tripping, so fields are stored as an
//! insertion-ordered list of pairs rather than a hash map.

use std::io::{Seek, Write};

use serde::Serialize;

use crate::error::{PsdError, Result};
use crate::sections::{PsdBuffer, PsdCursor, PsdSerialize};
use crate::unicode_string::UnicodeString;

/// How far ahead to look for a known OS type when an unknown marker is
/// encountered before giving up with [`PsdError::CorruptDescriptor`].
const UNKNOWN_OS_TYPE_SCAN_WINDOW: u64 = 1024;

/// The descriptor version written before every root descriptor.
pub(crate) const DESCRIPTOR_VERSION: u32 = 16;

const OS_TYPE_REFERENCE: [u8; 4] = *b"obj ";
const OS_TYPE_DESCRIPTOR: [u8; 4] = *b"Objc";
const OS_TYPE_GLOBAL_OBJECT: [u8; 4] = *b"GlbO";
const OS_TYPE_OBJECT_ARRAY: [u8; 4] = *b"ObAr";
const OS_TYPE_LIST: [u8; 4] = *b"VlLs";
const OS_TYPE_DOUBLE: [u8; 4] = *b"doub";
const OS_TYPE_UNIT_FLOAT: [u8; 4] = *b"UntF";
const OS_TYPE_UNIT_FLOATS: [u8; 4] = *b"UnFl";
const OS_TYPE_TEXT: [u8; 4] = *b"TEXT";
const OS_TYPE_ENUMERATED: [u8; 4] = *b"enum";
const OS_TYPE_INTEGER: [u8; 4] = *b"long";
const OS_TYPE_LARGE_INTEGER: [u8; 4] = *b"comp";
const OS_TYPE_BOOL: [u8; 4] = *b"bool";
const OS_TYPE_CLASS: [u8; 4] = *b"type";
const OS_TYPE_CLASS_GLOBAL: [u8; 4] = *b"GlbC";
const OS_TYPE_CLASS_REFERENCE: [u8; 4] = *b"Clss";
const OS_TYPE_ALIAS: [u8; 4] = *b"alis";
const OS_TYPE_RAW_DATA: [u8; 4] = *b"tdta";
const OS_TYPE_PATH: [u8; 4] = *b"Pth ";
const OS_TYPE_PROPERTY: [u8; 4] = *b"prop";
const OS_TYPE_ENUMERATED_REFERENCE: [u8; 4] = *b"Enmr";
const OS_TYPE_OFFSET: [u8; 4] = *b"rele";
const OS_TYPE_IDENTIFIER: [u8; 4] = *b"Idnt";
const OS_TYPE_INDEX: [u8; 4] = *b"indx";
const OS_TYPE_NAME: [u8; 4] = *b"name";

const KNOWN_OS_TYPES: &[[u8; 4]] = &[
    OS_TYPE_REFERENCE,
    OS_TYPE_DESCRIPTOR,
    OS_TYPE_GLOBAL_OBJECT,
    OS_TYPE_OBJECT_ARRAY,
    OS_TYPE_LIST,
    OS_TYPE_DOUBLE,
    OS_TYPE_UNIT_FLOAT,
    OS_TYPE_UNIT_FLOATS,
    OS_TYPE_TEXT,
    OS_TYPE_ENUMERATED,
    OS_TYPE_INTEGER,
    OS_TYPE_LARGE_INTEGER,
    OS_TYPE_BOOL,
    OS_TYPE_CLASS,
    OS_TYPE_CLASS_GLOBAL,
    OS_TYPE_CLASS_REFERENCE,
    OS_TYPE_ALIAS,
    OS_TYPE_RAW_DATA,
    OS_TYPE_PATH,
    OS_TYPE_PROPERTY,
    OS_TYPE_ENUMERATED_REFERENCE,
    OS_TYPE_OFFSET,
    OS_TYPE_IDENTIFIER,
    OS_TYPE_INDEX,
    OS_TYPE_NAME,
];

/// A recursive key/value structure with a class id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptorStructure {
    /// Unicode name from the class id, usually empty
    pub name: UnicodeString,
    /// The class id key
    pub class_id: String,
    /// The fields in insertion order
    pub fields: Vec<(String, DescriptorField)>,
    /// `Objc` or `GlbO`, preserved for round-tripping
    os_type: [u8; 4],
}

impl DescriptorStructure {
    /// Create an empty descriptor with the given class id.
    pub fn new(class_id: impl Into<String>) -> DescriptorStructure {
        DescriptorStructure {
            name: UnicodeString::default(),
            class_id: class_id.into(),
            fields: Vec::new(),
            os_type: OS_TYPE_DESCRIPTOR,
        }
    }

    /// Append a field, replacing an existing one with the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: DescriptorField) {
        let key = key.into();
        if let Some(existing) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    /// Look up a field by key.
    pub fn get(&self, key: &str) -> Option<&DescriptorField> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Remove a field by key, returning it.
    pub fn remove(&mut self, key: &str) -> Option<DescriptorField> {
        let index = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(index).1)
    }

    /// Look up a nested descriptor by key.
    pub fn get_descriptor(&self, key: &str) -> Option<&DescriptorStructure> {
        match self.get(key) {
            Some(DescriptorField::Descriptor(d)) => Some(d),
            _ => None,
        }
    }

    /// Look up a double by key.
    pub fn get_double(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(DescriptorField::Double(v)) => Some(*v),
            _ => None,
        }
    }

    /// Look up a 32-bit integer by key.
    pub fn get_integer(&self, key: &str) -> Option<i32> {
        match self.get(key) {
            Some(DescriptorField::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    /// Look up a unicode string by key.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(DescriptorField::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Look up a list by key.
    pub fn get_list(&self, key: &str) -> Option<&ListStructure> {
        match self.get(key) {
            Some(DescriptorField::List(v)) => Some(v),
            _ => None,
        }
    }

    /// Look up an object array by key.
    pub fn get_object_array(&self, key: &str) -> Option<&ObjectArrayStructure> {
        match self.get(key) {
            Some(DescriptorField::ObjectArray(v)) => Some(v),
            _ => None,
        }
    }

    /// Dump the descriptor as pretty JSON. Useful for inspecting the
    /// adjustment and effect descriptors this crate round-trips opaquely.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Read a descriptor body: name, class id and fields.
    pub(crate) fn read(cursor: &mut PsdCursor) -> Result<DescriptorStructure> {
        Self::read_with_os_type(cursor, OS_TYPE_DESCRIPTOR)
    }

    fn read_with_os_type(cursor: &mut PsdCursor, os_type: [u8; 4]) -> Result<DescriptorStructure> {
        let name = UnicodeString::read(cursor, 1)?;
        let class_id = read_key(cursor)?;
        let count = cursor.read_u32()?;

        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (key, field) = read_descriptor_item(cursor, true)?;
            fields.push((key.unwrap_or_default(), field));
        }

        Ok(DescriptorStructure {
            name,
            class_id,
            fields,
            os_type,
        })
    }
}

impl PsdSerialize for DescriptorStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        self.name.write(buffer, 1)?;
        write_key(buffer, &self.class_id)?;
        buffer.write_u32(self.fields.len() as u32)?;
        for (key, field) in &self.fields {
            write_key(buffer, key)?;
            field.write(buffer)?;
        }
        Ok(())
    }
}

/// A homogeneous-or-not list of values. Also models reference lists
/// (`obj `), which reuse the same wire layout under a different marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListStructure {
    /// The values, in order
    pub items: Vec<DescriptorField>,
    /// `VlLs` or `obj `, preserved for round-tripping
    os_type: [u8; 4],
}

impl ListStructure {
    /// A plain `VlLs` list.
    pub fn new(items: Vec<DescriptorField>) -> ListStructure {
        ListStructure {
            items,
            os_type: OS_TYPE_LIST,
        }
    }

    /// Collect the items as doubles, failing if any item is not a double.
    pub fn as_doubles(&self) -> Result<Vec<f64>> {
        self.items
            .iter()
            .map(|item| match item {
                DescriptorField::Double(v) => Ok(*v),
                other => Err(PsdError::CorruptDescriptor(format!(
                    "expected a list of doubles, found {:?}",
                    other.os_type()
                ))),
            })
            .collect()
    }

    /// Build a list of doubles.
    pub fn from_doubles(values: &[f64]) -> ListStructure {
        ListStructure::new(values.iter().map(|v| DescriptorField::Double(*v)).collect())
    }

    fn read(cursor: &mut PsdCursor, os_type: [u8; 4]) -> Result<ListStructure> {
        let count = cursor.read_u32()?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (_, field) = read_descriptor_item(cursor, false)?;
            items.push(field);
        }
        Ok(ListStructure { items, os_type })
    }
}

impl PsdSerialize for ListStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write_u32(self.items.len() as u32)?;
        for item in &self.items {
            item.write(buffer)?;
        }
        Ok(())
    }
}

/// An `ObAr` object array: a counted collection whose payload is a nested
/// field map. The item count refers to the entries of the sub-descriptors
/// (the warp mesh stores its point count here), not to the number of fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectArrayStructure {
    /// Number of items in the sub-descriptors
    pub items_count: u32,
    /// Unicode name from the class id
    pub name: UnicodeString,
    /// The class id key
    pub class_id: String,
    /// The fields in insertion order
    pub fields: Vec<(String, DescriptorField)>,
}

impl ObjectArrayStructure {
    /// Create an empty object array.
    pub fn new(items_count: u32, class_id: impl Into<String>) -> ObjectArrayStructure {
        ObjectArrayStructure {
            items_count,
            name: UnicodeString::default(),
            class_id: class_id.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn insert(&mut self, key: impl Into<String>, value: DescriptorField) {
        self.fields.push((key.into(), value));
    }

    /// Look up a field by key.
    pub fn get(&self, key: &str) -> Option<&DescriptorField> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Look up a `UnFl` field by key.
    pub fn get_unit_floats(&self, key: &str) -> Option<&UnitFloatsStructure> {
        match self.get(key) {
            Some(DescriptorField::UnitFloats(v)) => Some(v),
            _ => None,
        }
    }

    fn read(cursor: &mut PsdCursor) -> Result<ObjectArrayStructure> {
        let items_count = cursor.read_u32()?;
        let name = UnicodeString::read(cursor, 1)?;
        let class_id = read_key(cursor)?;
        let count = cursor.read_u32()?;

        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (key, field) = read_descriptor_item(cursor, true)?;
            fields.push((key.unwrap_or_default(), field));
        }

        Ok(ObjectArrayStructure {
            items_count,
            name,
            class_id,
            fields,
        })
    }
}

impl PsdSerialize for ObjectArrayStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write_u32(self.items_count)?;
        self.name.write(buffer, 1)?;
        write_key(buffer, &self.class_id)?;
        buffer.write_u32(self.fields.len() as u32)?;
        for (key, field) in &self.fields {
            write_key(buffer, key)?;
            field.write(buffer)?;
        }
        Ok(())
    }
}

/// The unit tag carried by `UntF` and `UnFl` values.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[allow(missing_docs)]
pub enum UnitFloatUnit {
    /// `#Ang`, base degrees
    Angle,
    /// `#Rsl`, base per inch
    Density,
    /// `#Rlt`, base 72ppi
    Distance,
    /// `#Nne`, coerced
    None,
    /// `#Prc`, unit value
    Percent,
    /// `#Pxl`, tagged unit value
    Pixel,
    /// `#Pnt`, points
    Points,
    /// `#Mlm`, millimeters
    Millimeters,
}

impl UnitFloatUnit {
    fn from_fourcc(key: [u8; 4]) -> Result<UnitFloatUnit> {
        Ok(match &key {
            b"#Ang" => UnitFloatUnit::Angle,
            b"#Rsl" => UnitFloatUnit::Density,
            b"#Rlt" => UnitFloatUnit::Distance,
            b"#Nne" => UnitFloatUnit::None,
            b"#Prc" => UnitFloatUnit::Percent,
            b"#Pxl" => UnitFloatUnit::Pixel,
            b"#Pnt" => UnitFloatUnit::Points,
            b"#Mlm" => UnitFloatUnit::Millimeters,
            _ => {
                return Err(PsdError::CorruptDescriptor(format!(
                    "unknown unit float unit {:?}",
                    key
                )))
            }
        })
    }

    fn fourcc(self) -> [u8; 4] {
        *match self {
            UnitFloatUnit::Angle => b"#Ang",
            UnitFloatUnit::Density => b"#Rsl",
            UnitFloatUnit::Distance => b"#Rlt",
            UnitFloatUnit::None => b"#Nne",
            UnitFloatUnit::Percent => b"#Prc",
            UnitFloatUnit::Pixel => b"#Pxl",
            UnitFloatUnit::Points => b"#Pnt",
            UnitFloatUnit::Millimeters => b"#Mlm",
        }
    }
}

/// A `UntF` value: a unit tag and a double.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFloatStructure {
    /// The unit the value is expressed in
    pub unit: UnitFloatUnit,
    /// The value
    pub value: f64,
}

impl UnitFloatStructure {
    fn read(cursor: &mut PsdCursor) -> Result<UnitFloatStructure> {
        let unit = UnitFloatUnit::from_fourcc(cursor.read_4()?)?;
        let value = cursor.read_f64()?;
        Ok(UnitFloatStructure { unit, value })
    }
}

impl PsdSerialize for UnitFloatStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write(&self.unit.fourcc())?;
        buffer.write_f64(self.value)
    }
}

/// A `UnFl` value: a unit tag and a vector of doubles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFloatsStructure {
    /// The unit the values are expressed in
    pub unit: UnitFloatUnit,
    /// The values
    pub values: Vec<f64>,
}

impl UnitFloatsStructure {
    /// Build a pixel-unit vector, the form the warp serializer uses.
    pub fn pixels(values: Vec<f64>) -> UnitFloatsStructure {
        UnitFloatsStructure {
            unit: UnitFloatUnit::Pixel,
            values,
        }
    }

    fn read(cursor: &mut PsdCursor) -> Result<UnitFloatsStructure> {
        let unit = UnitFloatUnit::from_fourcc(cursor.read_4()?)?;
        let count = cursor.read_u32()?;
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(cursor.read_f64()?);
        }
        Ok(UnitFloatsStructure { unit, values })
    }
}

impl PsdSerialize for UnitFloatsStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write(&self.unit.fourcc())?;
        buffer.write_u32(self.values.len() as u32)?;
        for value in &self.values {
            buffer.write_f64(*value)?;
        }
        Ok(())
    }
}

/// A class reference: name plus class id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStructure {
    /// Unicode name from the class id
    pub name: UnicodeString,
    /// The class id key
    pub class_id: String,
    /// `type`, `GlbC` or `Clss`, preserved for round-tripping
    os_type: [u8; 4],
}

impl ClassStructure {
    fn read(cursor: &mut PsdCursor, os_type: [u8; 4]) -> Result<ClassStructure> {
        let name = UnicodeString::read(cursor, 1)?;
        let class_id = read_key(cursor)?;
        Ok(ClassStructure {
            name,
            class_id,
            os_type,
        })
    }
}

impl PsdSerialize for ClassStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        self.name.write(buffer, 1)?;
        write_key(buffer, &self.class_id)
    }
}

/// An `enum` value: a type id and the chosen enumerator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumeratedDescriptor {
    /// The enumeration's type id
    pub type_id: String,
    /// The chosen enumerator
    pub enum_id: String,
}

impl EnumeratedDescriptor {
    /// Build an enumerated value.
    pub fn new(type_id: impl Into<String>, enum_id: impl Into<String>) -> EnumeratedDescriptor {
        EnumeratedDescriptor {
            type_id: type_id.into(),
            enum_id: enum_id.into(),
        }
    }

    fn read(cursor: &mut PsdCursor) -> Result<EnumeratedDescriptor> {
        Ok(EnumeratedDescriptor {
            type_id: read_key(cursor)?,
            enum_id: read_key(cursor)?,
        })
    }
}

impl PsdSerialize for EnumeratedDescriptor {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        write_key(buffer, &self.type_id)?;
        write_key(buffer, &self.enum_id)
    }
}

/// An `Enmr` reference item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumeratedReference {
    /// Unicode name from the class id
    pub name: UnicodeString,
    /// The class id key
    pub class_id: String,
    /// The enumeration's type id
    pub type_id: String,
    /// The chosen enumerator
    pub enum_id: String,
}

impl EnumeratedReference {
    fn read(cursor: &mut PsdCursor) -> Result<EnumeratedReference> {
        Ok(EnumeratedReference {
            name: UnicodeString::read(cursor, 1)?,
            class_id: read_key(cursor)?,
            type_id: read_key(cursor)?,
            enum_id: read_key(cursor)?,
        })
    }
}

impl PsdSerialize for EnumeratedReference {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        self.name.write(buffer, 1)?;
        write_key(buffer, &self.class_id)?;
        write_key(buffer, &self.type_id)?;
        write_key(buffer, &self.enum_id)
    }
}

/// A `prop` reference item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyStructure {
    /// Unicode name from the class id
    pub name: UnicodeString,
    /// The class id key
    pub class_id: String,
    /// The property key id
    pub key_id: String,
}

impl PropertyStructure {
    fn read(cursor: &mut PsdCursor) -> Result<PropertyStructure> {
        Ok(PropertyStructure {
            name: UnicodeString::read(cursor, 1)?,
            class_id: read_key(cursor)?,
            key_id: read_key(cursor)?,
        })
    }
}

impl PsdSerialize for PropertyStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        self.name.write(buffer, 1)?;
        write_key(buffer, &self.class_id)?;
        write_key(buffer, &self.key_id)
    }
}

/// A `rele` reference item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetStructure {
    /// Unicode name from the class id
    pub name: UnicodeString,
    /// The class id key
    pub class_id: String,
    /// The offset value
    pub offset: u32,
}

impl OffsetStructure {
    fn read(cursor: &mut PsdCursor) -> Result<OffsetStructure> {
        Ok(OffsetStructure {
            name: UnicodeString::read(cursor, 1)?,
            class_id: read_key(cursor)?,
            offset: cursor.read_u32()?,
        })
    }
}

impl PsdSerialize for OffsetStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        self.name.write(buffer, 1)?;
        write_key(buffer, &self.class_id)?;
        buffer.write_u32(self.offset)
    }
}

/// A `name` reference item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameStructure {
    /// Unicode name from the class id
    pub name: UnicodeString,
    /// The class id key
    pub class_id: String,
    /// The referenced name
    pub value: UnicodeString,
}

impl NameStructure {
    fn read(cursor: &mut PsdCursor) -> Result<NameStructure> {
        Ok(NameStructure {
            name: UnicodeString::read(cursor, 1)?,
            class_id: read_key(cursor)?,
            value: UnicodeString::read(cursor, 1)?,
        })
    }
}

impl PsdSerialize for NameStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        self.name.write(buffer, 1)?;
        write_key(buffer, &self.class_id)?;
        self.value.write(buffer, 1)
    }
}

/// Opaque bytes captured by `alis`, `tdta` and `Pth ` values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDataStructure {
    /// The raw bytes
    pub data: Vec<u8>,
    /// The OS type this value was read under
    os_type: [u8; 4],
}

impl RawDataStructure {
    fn read(cursor: &mut PsdCursor, os_type: [u8; 4]) -> Result<RawDataStructure> {
        let length = u64::from(cursor.read_u32()?);
        Ok(RawDataStructure {
            data: cursor.read(length)?.to_vec(),
            os_type,
        })
    }
}

impl PsdSerialize for RawDataStructure {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        buffer.write_u32(self.data.len() as u32)?;
        buffer.write(&self.data)
    }
}

/// Bytes recovered by the bounded scan after an unrecognized OS type.
///
/// The captured span starts at the unknown marker and runs up to the next
/// identifiable item boundary; writing emits it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownOsType {
    /// Everything from the unknown marker to the next item boundary
    pub bytes: Vec<u8>,
}

/// One of the closed set of descriptor value variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub enum DescriptorField {
    Descriptor(DescriptorStructure),
    ObjectArray(ObjectArrayStructure),
    List(ListStructure),
    Double(f64),
    UnitFloat(UnitFloatStructure),
    UnitFloats(UnitFloatsStructure),
    String(UnicodeString),
    Enumerated(EnumeratedDescriptor),
    Integer(i32),
    LargeInteger(i64),
    Boolean(bool),
    Class(ClassStructure),
    Alias(RawDataStructure),
    RawData(RawDataStructure),
    Property(PropertyStructure),
    EnumeratedReference(EnumeratedReference),
    Offset(OffsetStructure),
    Identifier(i32),
    Index(i32),
    Name(NameStructure),
    Unknown(UnknownOsType),
}

impl DescriptorField {
    /// The OS type marker this field serializes under.
    pub fn os_type(&self) -> [u8; 4] {
        match self {
            DescriptorField::Descriptor(d) => d.os_type,
            DescriptorField::ObjectArray(_) => OS_TYPE_OBJECT_ARRAY,
            DescriptorField::List(l) => l.os_type,
            DescriptorField::Double(_) => OS_TYPE_DOUBLE,
            DescriptorField::UnitFloat(_) => OS_TYPE_UNIT_FLOAT,
            DescriptorField::UnitFloats(_) => OS_TYPE_UNIT_FLOATS,
            DescriptorField::String(_) => OS_TYPE_TEXT,
            DescriptorField::Enumerated(_) => OS_TYPE_ENUMERATED,
            DescriptorField::Integer(_) => OS_TYPE_INTEGER,
            DescriptorField::LargeInteger(_) => OS_TYPE_LARGE_INTEGER,
            DescriptorField::Boolean(_) => OS_TYPE_BOOL,
            DescriptorField::Class(c) => c.os_type,
            DescriptorField::Alias(_) => OS_TYPE_ALIAS,
            DescriptorField::RawData(r) => r.os_type,
            DescriptorField::Property(_) => OS_TYPE_PROPERTY,
            DescriptorField::EnumeratedReference(_) => OS_TYPE_ENUMERATED_REFERENCE,
            DescriptorField::Offset(_) => OS_TYPE_OFFSET,
            DescriptorField::Identifier(_) => OS_TYPE_IDENTIFIER,
            DescriptorField::Index(_) => OS_TYPE_INDEX,
            DescriptorField::Name(_) => OS_TYPE_NAME,
            // The captured bytes already start with the original marker
            DescriptorField::Unknown(_) => [0; 4],
        }
    }
}

impl PsdSerialize for DescriptorField {
    fn write<W: Write + Seek>(&self, buffer: &mut PsdBuffer<W>) -> Result<()> {
        if let DescriptorField::Unknown(unknown) = self {
            return buffer.write(&unknown.bytes);
        }

        buffer.write(&self.os_type())?;
        match self {
            DescriptorField::Descriptor(item) => item.write(buffer),
            DescriptorField::ObjectArray(item) => item.write(buffer),
            DescriptorField::List(item) => item.write(buffer),
            DescriptorField::Double(item) => buffer.write_f64(*item),
            DescriptorField::UnitFloat(item) => item.write(buffer),
            DescriptorField::UnitFloats(item) => item.write(buffer),
            DescriptorField::String(item) => item.write(buffer, 1),
            DescriptorField::Enumerated(item) => item.write(buffer),
            DescriptorField::Integer(item) => buffer.write_i32(*item),
            DescriptorField::LargeInteger(item) => buffer.write_i64(*item),
            DescriptorField::Boolean(item) => buffer.write_bool(*item),
            DescriptorField::Class(item) => item.write(buffer),
            DescriptorField::Alias(item) => item.write(buffer),
            DescriptorField::RawData(item) => item.write(buffer),
            DescriptorField::Property(item) => item.write(buffer),
            DescriptorField::EnumeratedReference(item) => item.write(buffer),
            DescriptorField::Offset(item) => item.write(buffer),
            DescriptorField::Identifier(item) => buffer.write_i32(*item),
            DescriptorField::Index(item) => buffer.write_i32(*item),
            DescriptorField::Name(item) => item.write(buffer),
            DescriptorField::Unknown(_) => unreachable!("handled above"),
        }
    }
}

/// Read one descriptor item: an optional length-denoted key (absent inside
/// lists) followed by the OS type marker and the value it introduces.
pub(crate) fn read_descriptor_item(
    cursor: &mut PsdCursor,
    with_key: bool,
) -> Result<(Option<String>, DescriptorField)> {
    let key = if with_key {
        Some(read_key(cursor)?)
    } else {
        None
    };

    let os_type = cursor.read_4()?;
    let field = match &os_type {
        &OS_TYPE_DESCRIPTOR | &OS_TYPE_GLOBAL_OBJECT => DescriptorField::Descriptor(
            DescriptorStructure::read_with_os_type(cursor, os_type)?,
        ),
        &OS_TYPE_OBJECT_ARRAY => DescriptorField::ObjectArray(ObjectArrayStructure::read(cursor)?),
        &OS_TYPE_LIST | &OS_TYPE_REFERENCE => {
            DescriptorField::List(ListStructure::read(cursor, os_type)?)
        }
        &OS_TYPE_DOUBLE => DescriptorField::Double(cursor.read_f64()?),
        &OS_TYPE_UNIT_FLOAT => DescriptorField::UnitFloat(UnitFloatStructure::read(cursor)?),
        &OS_TYPE_UNIT_FLOATS => DescriptorField::UnitFloats(UnitFloatsStructure::read(cursor)?),
        &OS_TYPE_TEXT => DescriptorField::String(UnicodeString::read(cursor, 1)?),
        &OS_TYPE_ENUMERATED => DescriptorField::Enumerated(EnumeratedDescriptor::read(cursor)?),
        &OS_TYPE_INTEGER => DescriptorField::Integer(cursor.read_i32()?),
        &OS_TYPE_LARGE_INTEGER => DescriptorField::LargeInteger(cursor.read_i64()?),
        &OS_TYPE_BOOL => DescriptorField::Boolean(cursor.read_bool()?),
        &OS_TYPE_CLASS | &OS_TYPE_CLASS_GLOBAL | &OS_TYPE_CLASS_REFERENCE => {
            DescriptorField::Class(ClassStructure::read(cursor, os_type)?)
        }
        &OS_TYPE_ALIAS => DescriptorField::Alias(RawDataStructure::read(cursor, os_type)?),
        &OS_TYPE_RAW_DATA | &OS_TYPE_PATH => {
            DescriptorField::RawData(RawDataStructure::read(cursor, os_type)?)
        }
        &OS_TYPE_PROPERTY => DescriptorField::Property(PropertyStructure::read(cursor)?),
        &OS_TYPE_ENUMERATED_REFERENCE => {
            DescriptorField::EnumeratedReference(EnumeratedReference::read(cursor)?)
        }
        &OS_TYPE_OFFSET => DescriptorField::Offset(OffsetStructure::read(cursor)?),
        &OS_TYPE_IDENTIFIER => DescriptorField::Identifier(cursor.read_i32()?),
        &OS_TYPE_INDEX => DescriptorField::Index(cursor.read_i32()?),
        &OS_TYPE_NAME => DescriptorField::Name(NameStructure::read(cursor)?),
        _ => DescriptorField::Unknown(scan_past_unknown_os_type(cursor, os_type)?),
    };

    Ok((key, field))
}

/// Recover from an unknown OS type by scanning forward for the next known
/// marker. The next item boundary is the empty-key word (`u32` zero)
/// immediately before that marker; if no such boundary exists within the
/// window the descriptor is unrecoverable.
fn scan_past_unknown_os_type(cursor: &mut PsdCursor, os_type: [u8; 4]) -> Result<UnknownOsType> {
    let start = cursor.position();
    let window = UNKNOWN_OS_TYPE_SCAN_WINDOW.min(cursor.remaining());
    let bytes = cursor.read(window)?;

    for offset in 0..bytes.len().saturating_sub(3) {
        let candidate = [
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ];
        if !KNOWN_OS_TYPES.contains(&candidate) {
            continue;
        }
        // A field is introduced by its key; an empty key is a zero word
        // right before the marker.
        if offset >= 8 && bytes[offset - 8..offset - 4] == [0, 0, 0, 0] {
            let boundary = offset - 8;
            let mut captured = os_type.to_vec();
            captured.extend_from_slice(&bytes[..boundary]);
            cursor.set_position(start + boundary as u64);
            return Ok(UnknownOsType { bytes: captured });
        }
    }

    Err(PsdError::CorruptDescriptor(format!(
        "unknown OS type {:?} and no known marker within {} bytes",
        os_type, UNKNOWN_OS_TYPE_SCAN_WINDOW
    )))
}

/// Read a length-denoted key: a u32 byte count followed by that many bytes,
/// or a bare four byte key when the count is zero.
pub(crate) fn read_key(cursor: &mut PsdCursor) -> Result<String> {
    let length = cursor.read_u32()?;
    let length = if length > 0 { u64::from(length) } else { 4 };
    let bytes = cursor.read(length)?;
    String::from_utf8(bytes.to_vec()).map_err(|err| PsdError::InvalidEncoding(err.to_string()))
}

/// Write a length-denoted key: four byte keys get a zero count.
pub(crate) fn write_key<W: Write + Seek>(buffer: &mut PsdBuffer<W>, key: &str) -> Result<()> {
    let bytes = key.as_bytes();
    if bytes.len() == 4 {
        buffer.write_u32(0)?;
    } else {
        buffer.write_u32(bytes.len() as u32)?;
    }
    buffer.write(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn serialize(descriptor: &DescriptorStructure) -> Vec<u8> {
        let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
        descriptor.write(&mut buffer).unwrap();
        buffer.into_inner().into_inner()
    }

    fn parse(bytes: &[u8]) -> DescriptorStructure {
        let mut cursor = PsdCursor::new(bytes);
        let parsed = DescriptorStructure::read(&mut cursor).unwrap();
        assert_eq!(cursor.position(), bytes.len() as u64, "trailing bytes");
        parsed
    }

    fn sample_descriptor() -> DescriptorStructure {
        let mut nested = DescriptorStructure::new("classFloatRect");
        nested.insert("Top ", DescriptorField::Double(0.0));
        nested.insert("Left", DescriptorField::Double(-4.5));

        let mut descriptor = DescriptorStructure::new("warp");
        descriptor.insert(
            "warpStyle",
            DescriptorField::Enumerated(EnumeratedDescriptor::new("warpStyle", "warpNone")),
        );
        descriptor.insert("warpValue", DescriptorField::Double(12.25));
        descriptor.insert("uOrder", DescriptorField::Integer(4));
        descriptor.insert("count", DescriptorField::LargeInteger(-9_000_000_000));
        descriptor.insert("flag", DescriptorField::Boolean(true));
        descriptor.insert(
            "Nm  ",
            DescriptorField::String(UnicodeString::new("layer name")),
        );
        descriptor.insert("bounds", DescriptorField::Descriptor(nested));
        descriptor.insert(
            "Trnf",
            DescriptorField::List(ListStructure::from_doubles(&[0.0, 1.0, 2.0, 3.0])),
        );
        descriptor.insert(
            "slices",
            DescriptorField::UnitFloats(UnitFloatsStructure::pixels(vec![-0.6, 2000.0, 4000.6])),
        );
        descriptor
    }

    #[test]
    fn descriptor_round_trips() {
        let descriptor = sample_descriptor();
        let bytes = serialize(&descriptor);
        assert_eq!(parse(&bytes), descriptor);
    }

    #[test]
    fn serialized_form_is_stable() {
        // parse(serialize(v)) == v implies serialize(parse(b)) == b only if
        // serialization is deterministic; check the bytes directly.
        let descriptor = sample_descriptor();
        let bytes = serialize(&descriptor);
        let reparsed = parse(&bytes);
        assert_eq!(serialize(&reparsed), bytes);
    }

    #[test]
    fn object_array_round_trips() {
        let mut mesh = ObjectArrayStructure::new(16, "rationalPoint");
        mesh.insert(
            "Hrzn",
            DescriptorField::UnitFloats(UnitFloatsStructure::pixels(vec![0.0, 1.0])),
        );
        mesh.insert(
            "Vrtc",
            DescriptorField::UnitFloats(UnitFloatsStructure::pixels(vec![2.0, 3.0])),
        );

        let mut descriptor = DescriptorStructure::new("customEnvelopeWarp");
        descriptor.insert("meshPoints", DescriptorField::ObjectArray(mesh));

        let bytes = serialize(&descriptor);
        let parsed = parse(&bytes);
        assert_eq!(parsed, descriptor);

        let mesh = parsed.get_object_array("meshPoints").unwrap();
        assert_eq!(mesh.items_count, 16);
        assert_eq!(mesh.get_unit_floats("Vrtc").unwrap().values, vec![2.0, 3.0]);
    }

    #[test]
    fn long_keys_round_trip() {
        let mut descriptor = DescriptorStructure::new("ExternalFileLink");
        descriptor.insert("descVersion", DescriptorField::Integer(2));
        descriptor.insert(
            "nonAffineTransform",
            DescriptorField::List(ListStructure::from_doubles(&[1.0])),
        );
        let bytes = serialize(&descriptor);
        assert_eq!(parse(&bytes), descriptor);
    }

    #[test]
    fn alias_and_raw_data_keep_their_os_type() {
        let mut descriptor = DescriptorStructure::new("blob");
        descriptor.insert(
            "data",
            DescriptorField::RawData(RawDataStructure {
                data: vec![1, 2, 3],
                os_type: OS_TYPE_PATH,
            }),
        );
        descriptor.insert(
            "link",
            DescriptorField::Alias(RawDataStructure {
                data: vec![9, 9],
                os_type: OS_TYPE_ALIAS,
            }),
        );
        let bytes = serialize(&descriptor);
        let parsed = parse(&bytes);
        assert_eq!(parsed, descriptor);
        assert_eq!(parsed.get("data").unwrap().os_type(), OS_TYPE_PATH);
    }

    #[test]
    fn global_object_marker_is_preserved() {
        let nested = DescriptorStructure {
            name: UnicodeString::default(),
            class_id: "null".to_string(),
            fields: Vec::new(),
            os_type: OS_TYPE_GLOBAL_OBJECT,
        };
        let mut descriptor = DescriptorStructure::new("root");
        descriptor.insert("glob", DescriptorField::Descriptor(nested));

        let bytes = serialize(&descriptor);
        let parsed = parse(&bytes);
        assert_eq!(parsed.get("glob").unwrap().os_type(), OS_TYPE_GLOBAL_OBJECT);
        assert_eq!(serialize(&parsed), bytes);
    }

    #[test]
    fn unknown_os_type_without_recovery_is_corrupt() {
        let mut descriptor = DescriptorStructure::new("root");
        descriptor.insert("flag", DescriptorField::Boolean(true));
        let mut bytes = serialize(&descriptor);
        // Corrupt the boolean's OS type marker
        let position = bytes.len() - 5;
        bytes[position..position + 4].copy_from_slice(b"zzzz");

        let mut cursor = PsdCursor::new(&bytes);
        assert!(matches!(
            DescriptorStructure::read(&mut cursor),
            Err(PsdError::CorruptDescriptor(_))
        ));
    }

    #[test]
    fn unknown_os_type_recovers_at_the_next_item_boundary() {
        let mut descriptor = DescriptorStructure::new("root");
        descriptor.insert("aaaa", DescriptorField::Boolean(true));
        descriptor.insert("bbbb", DescriptorField::Integer(7));
        let mut bytes = serialize(&descriptor);

        // Corrupt the first field's OS type; the scan should resynchronize
        // at the second field and capture the rest of the first one.
        let boolean_marker = bytes
            .windows(4)
            .position(|window| window == b"bool")
            .unwrap();
        bytes[boolean_marker..boolean_marker + 4].copy_from_slice(b"zzzz");

        let mut cursor = PsdCursor::new(&bytes);
        let parsed = DescriptorStructure::read(&mut cursor).unwrap();
        assert!(matches!(
            parsed.get("aaaa"),
            Some(DescriptorField::Unknown(_))
        ));
        assert_eq!(parsed.get_integer("bbbb"), Some(7));
    }

    #[test]
    fn descriptors_dump_as_json() {
        let json = sample_descriptor().to_json();
        assert!(json.contains("warpStyle"));
        assert!(json.contains("12.25"));
    }
}
