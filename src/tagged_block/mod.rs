//! Tagged blocks: `signature + key + length + payload` records that carry
//! everything the fixed layer record cannot.
//!
//! Blocks appear in two places with different alignment: inside a layer's
//! extra data (padded to 1) and in the global list at the end of the layer
//! and mask information section (padded to 4). The length field is 32 bits
//! except for a fixed set of keys that grow to 64 bits in PSB files.
//!
//! Unknown keys are preserved verbatim as [`TaggedBlock::Opaque`]; strict
//! mode surfaces them as an error instead. The `Lr16`/`Lr32` nested
//! layer-info blocks are intercepted by the layer and mask section itself
//! and never reach this dispatch.

use std::io::{Seek, Write};

use crate::error::{PsdError, Result};
use crate::sections::file_header_section::PsdVersion;
use crate::sections::length_marker::LengthWidth;
use crate::sections::{round_up, PsdBuffer, PsdCursor, PsdSerialize};
use crate::unicode_string::UnicodeString;

pub(crate) mod linked_layer;
pub(crate) mod placed_layer;
pub(crate) mod section_divider;

pub use linked_layer::{LinkedLayerRecord, LinkedLayerType};
pub use placed_layer::{PlacedLayerBlock, PlacedLayerDataBlock};
pub use section_divider::{SectionDividerBlock, SectionDividerType};

/// One of the possible tagged block signatures
pub(crate) const SIGNATURE_EIGHT_BIM: [u8; 4] = *b"8BIM";
/// One of the possible tagged block signatures
pub(crate) const SIGNATURE_EIGHT_B64: [u8; 4] = *b"8B64";

/// Keys whose length field is 64-bit in PSB files.
const WIDE_LENGTH_KEYS: &[[u8; 4]] = &[
    *b"LMsk", *b"Lr16", *b"Lr32", *b"Layr", *b"Mt16", *b"Mt32", *b"Mtrn", *b"Alph", *b"FMsk",
    *b"lnk2", *b"FEid", *b"FXid", *b"PxSD", *b"cinf",
];

/// Adjustment and fill layer keys. A layer carrying one of these is
/// surfaced as an adjustment layer; the descriptors themselves are
/// round-tripped opaquely.
pub(crate) const ADJUSTMENT_KEYS: &[[u8; 4]] = &[
    *b"SoCo", *b"GdFl", *b"PtFl", *b"brit", *b"levl", *b"curv", *b"expA", *b"vibA", *b"hue ",
    *b"hue2", *b"blnc", *b"blwh", *b"phfl", *b"mixr", *b"clrL", *b"nvrt", *b"post", *b"thrs",
    *b"grdm", *b"selc",
];

/// Every tagged block key this crate knows about. Only consulted in strict
/// mode; outside it unknown keys become opaque blocks.
const KNOWN_KEYS: &[[u8; 4]] = &[
    // Section structure
    *b"lsct", *b"lsdv", *b"luni", *b"lyid", *b"lspf", *b"fxrp", *b"lnsr", *b"lyvr", *b"clbl",
    *b"infx", *b"knko", *b"lclr", *b"shmd", *b"fmac", *b"cust",
    // Masks and paths
    *b"vmsk", *b"vsms", *b"vogk", *b"vscg", *b"vstk", *b"pths", *b"anno", *b"LMsk", *b"FMsk",
    *b"Anno",
    // Effects
    *b"lrFX", *b"lfx2", *b"lmfx", *b"cinf", *b"extn",
    // Adjustments and fills
    *b"SoCo", *b"GdFl", *b"PtFl", *b"brit", *b"levl", *b"curv", *b"expA", *b"vibA", *b"hue ",
    *b"hue2", *b"blnc", *b"blwh", *b"phfl", *b"mixr", *b"clrL", *b"nvrt", *b"post", *b"thrs",
    *b"grdm", *b"selc",
    // Type tool
    *b"TySh", *b"tySh", *b"Txt2", *b"txt2",
    // Smart objects and linked layers
    *b"PlLd", *b"plLd", *b"SoLd", *b"SoLE", *b"plcd", *b"lnkD", *b"lnk2", *b"lnk3", *b"lnkE",
    *b"CgEd",
    // Nested layer info
    *b"Lr16", *b"Lr32", *b"Layr", *b"Mt16", *b"Mt32", *b"Mtrn", *b"Alph",
    // Patterns and fills
    *b"Patt", *b"Pat2", *b"Pat3", *b"anFX",
    // Filter effects
    *b"FXid", *b"FEid", *b"PxSD", *b"ffxi",
    // Artboards and misc
    *b"artb", *b"artd", *b"abdd", *b"lPFl", *b"lmgm", *b"vmgm", *b"brst", *b"tsly",
];

/// Whether a key's length field is 64-bit under the given version.
pub(crate) fn length_width_for(key: [u8; 4], version: PsdVersion) -> LengthWidth {
    if version.is_psb() && WIDE_LENGTH_KEYS.contains(&key) {
        LengthWidth::U64
    } else {
        LengthWidth::U32
    }
}

/// A parsed tagged block.
#[derive(Debug, Clone)]
pub enum TaggedBlock {
    /// `lsct` / `lsdv`: group open/close markers
    SectionDivider(SectionDividerBlock),
    /// `luni`: the layer's unicode name, padded to 4
    UnicodeLayerName(UnicodeString),
    /// `lyid`: the layer's id
    LayerId(u32),
    /// `lspf`: protection flags. Only bit 7 of the first byte is known to
    /// be used (locked); the rest round-trips verbatim.
    ProtectedSettings(u32),
    /// `fxrp`: the reference point as two doubles
    ReferencePoint(f64, f64),
    /// `PlLd`: a placed (smart object) layer
    PlacedLayer(PlacedLayerBlock),
    /// `SoLd`: placed layer data carrying the smart object descriptor
    PlacedLayerData(PlacedLayerDataBlock),
    /// `lnk2` / `lnk3` / `lnkD`: linked layer payloads
    LinkedLayer {
        /// Which of the three linked keys the block used
        key: [u8; 4],
        /// The records, in file order
        records: Vec<LinkedLayerRecord>,
    },
    /// Any block this crate does not model; bytes preserved verbatim
    Opaque {
        /// The block's signature, `8BIM` or `8B64`
        signature: [u8; 4],
        /// The block's key
        key: [u8; 4],
        /// The unpadded payload
        data: Vec<u8>,
    },
}

impl TaggedBlock {
    /// The key this block serializes under.
    pub fn key(&self) -> [u8; 4] {
        match self {
            TaggedBlock::SectionDivider(block) => block.key,
            TaggedBlock::UnicodeLayerName(_) => *b"luni",
            TaggedBlock::LayerId(_) => *b"lyid",
            TaggedBlock::ProtectedSettings(_) => *b"lspf",
            TaggedBlock::ReferencePoint(_, _) => *b"fxrp",
            TaggedBlock::PlacedLayer(_) => *b"PlLd",
            TaggedBlock::PlacedLayerData(_) => *b"SoLd",
            TaggedBlock::LinkedLayer { key, .. } => *key,
            TaggedBlock::Opaque { key, .. } => *key,
        }
    }

    /// Whether the cursor sits on a tagged block signature.
    pub(crate) fn peek(cursor: &PsdCursor) -> bool {
        matches!(
            cursor.peek_4(),
            Ok(signature) if signature == SIGNATURE_EIGHT_BIM || signature == SIGNATURE_EIGHT_B64
        )
    }

    /// Read one tagged block at the cursor.
    pub(crate) fn read(
        cursor: &mut PsdCursor,
        version: PsdVersion,
        padding: u64,
        strict: bool,
    ) -> Result<TaggedBlock> {
        let signature = cursor.read_4()?;
        if signature != SIGNATURE_EIGHT_BIM && signature != SIGNATURE_EIGHT_B64 {
            return Err(PsdError::InvalidSignature {
                expected: &["8BIM", "8B64"],
                found: signature,
            });
        }

        let key = cursor.read_4()?;
        let length = match length_width_for(key, version) {
            LengthWidth::U32 => u64::from(cursor.read_u32()?),
            LengthWidth::U64 => cursor.read_u64()?,
        };
        let padded = round_up(length, padding);
        let body_start = cursor.position();
        let body = cursor.read(length)?;

        let block = match &key {
            b"lsct" | b"lsdv" => {
                TaggedBlock::SectionDivider(SectionDividerBlock::from_body(key, body)?)
            }
            b"luni" => {
                let mut body_cursor = PsdCursor::new(body);
                TaggedBlock::UnicodeLayerName(UnicodeString::read(&mut body_cursor, 4)?)
            }
            b"lyid" => {
                let mut body_cursor = PsdCursor::new(body);
                TaggedBlock::LayerId(body_cursor.read_u32()?)
            }
            b"lspf" => {
                let mut body_cursor = PsdCursor::new(body);
                TaggedBlock::ProtectedSettings(body_cursor.read_u32()?)
            }
            b"fxrp" => {
                let mut body_cursor = PsdCursor::new(body);
                let x = body_cursor.read_f64()?;
                let y = body_cursor.read_f64()?;
                TaggedBlock::ReferencePoint(x, y)
            }
            b"PlLd" => {
                let mut body_cursor = PsdCursor::new(body);
                TaggedBlock::PlacedLayer(PlacedLayerBlock::read(&mut body_cursor)?)
            }
            b"SoLd" => {
                let mut body_cursor = PsdCursor::new(body);
                TaggedBlock::PlacedLayerData(PlacedLayerDataBlock::read(&mut body_cursor)?)
            }
            b"lnk2" | b"lnk3" | b"lnkD" => {
                let mut body_cursor = PsdCursor::new(body);
                let records = linked_layer::read_records(&mut body_cursor)?;
                TaggedBlock::LinkedLayer { key, records }
            }
            _ => {
                if strict && !KNOWN_KEYS.contains(&key) {
                    return Err(PsdError::UnknownTaggedBlock { key });
                }
                TaggedBlock::Opaque {
                    signature,
                    key,
                    data: body.to_vec(),
                }
            }
        };

        cursor.set_position(body_start + padded);
        Ok(block)
    }

    /// Write the block with the alignment of its host section.
    pub(crate) fn write<W: Write + Seek>(
        &self,
        buffer: &mut PsdBuffer<W>,
        version: PsdVersion,
        padding: u64,
    ) -> Result<()> {
        let signature = match self {
            TaggedBlock::Opaque { signature, .. } => *signature,
            _ => SIGNATURE_EIGHT_BIM,
        };
        buffer.write(&signature)?;

        let key = self.key();
        buffer.write(&key)?;
        let marker = buffer.begin_length(length_width_for(key, version), padding)?;

        match self {
            TaggedBlock::SectionDivider(block) => block.write(buffer)?,
            TaggedBlock::UnicodeLayerName(name) => name.write(buffer, 4)?,
            TaggedBlock::LayerId(id) => buffer.write_u32(*id)?,
            TaggedBlock::ProtectedSettings(flags) => buffer.write_u32(*flags)?,
            TaggedBlock::ReferencePoint(x, y) => {
                buffer.write_f64(*x)?;
                buffer.write_f64(*y)?;
            }
            TaggedBlock::PlacedLayer(block) => block.write(buffer)?,
            TaggedBlock::PlacedLayerData(block) => block.write(buffer)?,
            TaggedBlock::LinkedLayer { records, .. } => {
                for record in records {
                    record.write(buffer)?;
                }
            }
            TaggedBlock::Opaque { data, .. } => buffer.write(data)?,
        }

        buffer.end_length(marker)?;
        Ok(())
    }

    /// Whether `lspf` flags mark the layer as locked.
    pub(crate) fn protection_is_locked(flags: u32) -> bool {
        // Bit 7 of the first (most significant) byte
        flags & 0x8000_0000 != 0
    }

    /// Pack the lock bit into `lspf` flags, preserving the other bits.
    pub(crate) fn protection_with_locked(flags: u32, locked: bool) -> u32 {
        if locked {
            flags | 0x8000_0000
        } else {
            flags & !0x8000_0000
        }
    }
}

/// Read tagged blocks until the cursor leaves `end` or stops seeing block
/// signatures.
pub(crate) fn read_blocks_until(
    cursor: &mut PsdCursor,
    end: u64,
    version: PsdVersion,
    padding: u64,
    strict: bool,
) -> Result<Vec<TaggedBlock>> {
    let mut blocks = Vec::new();
    while cursor.position() + 12 <= end && TaggedBlock::peek(cursor) {
        blocks.push(TaggedBlock::read(cursor, version, padding, strict)?);
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(block: &TaggedBlock, version: PsdVersion, padding: u64) -> TaggedBlock {
        let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
        block.write(&mut buffer, version, padding).unwrap();
        let bytes = buffer.into_inner().into_inner();

        let mut cursor = PsdCursor::new(&bytes);
        let parsed = TaggedBlock::read(&mut cursor, version, padding, true).unwrap();
        assert_eq!(cursor.position(), bytes.len() as u64);
        parsed
    }

    #[test]
    fn reference_point_round_trips_bit_exact() {
        let block = TaggedBlock::ReferencePoint(48.0, 16.0);
        match round_trip(&block, PsdVersion::One, 1) {
            TaggedBlock::ReferencePoint(x, y) => {
                assert_eq!(x.to_bits(), 48.0f64.to_bits());
                assert_eq!(y.to_bits(), 16.0f64.to_bits());
            }
            other => panic!("expected a reference point, got {:?}", other),
        }
    }

    #[test]
    fn layer_id_and_name_round_trip() {
        match round_trip(&TaggedBlock::LayerId(42), PsdVersion::One, 1) {
            TaggedBlock::LayerId(42) => {}
            other => panic!("unexpected {:?}", other),
        }
        match round_trip(
            &TaggedBlock::UnicodeLayerName(UnicodeString::new("Gruppe 1")),
            PsdVersion::One,
            4,
        ) {
            TaggedBlock::UnicodeLayerName(name) => assert_eq!(name.as_str(), "Gruppe 1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn protection_flags_round_trip_and_expose_the_lock_bit() {
        let flags = TaggedBlock::protection_with_locked(0x0000_0100, true);
        match round_trip(&TaggedBlock::ProtectedSettings(flags), PsdVersion::One, 1) {
            TaggedBlock::ProtectedSettings(read) => {
                assert_eq!(read, flags);
                assert!(TaggedBlock::protection_is_locked(read));
                // The unused bits came through untouched
                assert_eq!(read & 0x0000_0100, 0x0000_0100);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!TaggedBlock::protection_is_locked(
            TaggedBlock::protection_with_locked(flags, false)
        ));
    }

    #[test]
    fn unknown_block_is_preserved_verbatim() {
        let block = TaggedBlock::Opaque {
            signature: SIGNATURE_EIGHT_BIM,
            key: *b"shmd",
            data: vec![1, 2, 3, 4, 5, 6, 7],
        };
        match round_trip(&block, PsdVersion::One, 4) {
            TaggedBlock::Opaque { key, data, .. } => {
                assert_eq!(&key, b"shmd");
                assert_eq!(data.len(), 7);
                assert_eq!(data, vec![1, 2, 3, 4, 5, 6, 7]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn strict_mode_rejects_unknown_keys() {
        let block = TaggedBlock::Opaque {
            signature: SIGNATURE_EIGHT_BIM,
            key: *b"zzzz",
            data: vec![],
        };
        let mut buffer = PsdBuffer::new(Cursor::new(Vec::new()));
        block.write(&mut buffer, PsdVersion::One, 1).unwrap();
        let bytes = buffer.into_inner().into_inner();

        let mut cursor = PsdCursor::new(&bytes);
        assert!(matches!(
            TaggedBlock::read(&mut cursor, PsdVersion::One, 1, true),
            Err(PsdError::UnknownTaggedBlock { key }) if &key == b"zzzz"
        ));

        let mut cursor = PsdCursor::new(&bytes);
        assert!(TaggedBlock::read(&mut cursor, PsdVersion::One, 1, false).is_ok());
    }

    #[test]
    fn wide_keys_use_64_bit_lengths_only_in_psb() {
        assert_eq!(
            length_width_for(*b"lnk2", PsdVersion::Two),
            LengthWidth::U64
        );
        assert_eq!(
            length_width_for(*b"lnk2", PsdVersion::One),
            LengthWidth::U32
        );
        assert_eq!(
            length_width_for(*b"luni", PsdVersion::Two),
            LengthWidth::U32
        );
    }

    #[test]
    fn bad_signature_is_rejected() {
        let bytes = b"XXXXlyid\x00\x00\x00\x04\x00\x00\x00\x07".to_vec();
        let mut cursor = PsdCursor::new(&bytes);
        assert!(matches!(
            TaggedBlock::read(&mut cursor, PsdVersion::One, 1, false),
            Err(PsdError::InvalidSignature { .. })
        ));
    }
}
