//! Scoped length markers for the write path.
//!
//! Almost every variable-size structure in a PSD file is preceded by a length
//! field whose value is only known after the body has been written. A
//! [`LengthMarker`] reserves the field by writing a zero of the right width,
//! lets the caller write the body, and on [`PsdBuffer::end_length`] pads the
//! body to the host section's alignment, back-patches the real size and
//! restores the write position to the end of the section.
//!
//! The guard must be closed explicitly; a marker that is dropped without
//! being passed back to `end_length` leaves a zero length in the file.

use std::io::{Seek, Write};

use crate::error::{PsdError, Result};
use crate::sections::file_header_section::PsdVersion;
use crate::sections::{round_up, PsdBuffer};

/// The width of a length field on disk.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum LengthWidth {
    /// A 32-bit length field
    U32,
    /// A 64-bit length field
    U64,
}

impl LengthWidth {
    /// The width used by sections whose length field grows with the file
    /// version: 32-bit for psd, 64-bit for psb.
    pub fn variadic(version: PsdVersion) -> LengthWidth {
        match version {
            PsdVersion::One => LengthWidth::U32,
            PsdVersion::Two => LengthWidth::U64,
        }
    }

    /// Size of the field in bytes
    pub fn bytes(self) -> u64 {
        match self {
            LengthWidth::U32 => 4,
            LengthWidth::U64 => 8,
        }
    }

    fn bits(self) -> u8 {
        match self {
            LengthWidth::U32 => 32,
            LengthWidth::U64 => 64,
        }
    }

    fn max(self) -> u64 {
        match self {
            LengthWidth::U32 => u64::from(u32::MAX),
            LengthWidth::U64 => u64::MAX,
        }
    }
}

/// A pending length field.
///
/// Created by [`PsdBuffer::begin_length`], closed by
/// [`PsdBuffer::end_length`]. By default the written value is the padded
/// byte count between the end of the marker and the close; see
/// [`LengthMarker::count_from`] and [`LengthMarker::exclude_marker`] for the
/// two conventions some blocks use instead.
#[derive(Debug)]
#[must_use = "a length marker that is never ended leaves a zero length in the file"]
pub(crate) struct LengthMarker {
    /// Offset of the length field itself
    marker_offset: u64,
    /// Offset counting starts from, defaulting to the end of the field
    count_origin: u64,
    width: LengthWidth,
    /// Alignment of the padded section
    padding: u64,
    /// Whether to subtract the marker's own width from the written value
    exclude_marker: bool,
}

impl LengthMarker {
    /// Count from an earlier offset than the end of the marker. Used by
    /// blocks whose length convention covers fields written before the
    /// length field (the marker's own bytes then fall inside the count).
    pub fn count_from(mut self, origin: u64) -> LengthMarker {
        self.count_origin = origin;
        self
    }

    /// Subtract the marker's own width from the written value.
    pub fn exclude_marker(mut self) -> LengthMarker {
        self.exclude_marker = true;
        self
    }
}

impl<W: Write + Seek> PsdBuffer<W> {
    /// Reserve a length field of the given width at the current offset and
    /// return a guard that will back-patch it.
    pub fn begin_length(&mut self, width: LengthWidth, padding: u64) -> Result<LengthMarker> {
        let marker_offset = self.position()?;
        match width {
            LengthWidth::U32 => self.write_u32(0)?,
            LengthWidth::U64 => self.write_u64(0)?,
        }
        Ok(LengthMarker {
            marker_offset,
            count_origin: marker_offset + width.bytes(),
            width,
            padding,
            exclude_marker: false,
        })
    }

    /// Pad the section, back-patch the length field and restore the write
    /// position to the end of the padded section. Returns the value written
    /// into the marker.
    pub fn end_length(&mut self, marker: LengthMarker) -> Result<u64> {
        let position = self.position()?;
        if position < marker.count_origin {
            return Err(PsdError::PaddingViolation(format!(
                "write offset {} rewound past the length marker's count origin {}",
                position, marker.count_origin
            )));
        }

        // Pad the body so the counted span lands on the alignment
        let counted = position - marker.count_origin;
        self.write_zeros(round_up(counted, marker.padding) - counted)?;
        let end_offset = self.position()?;

        let mut size = end_offset - marker.count_origin;
        if marker.exclude_marker {
            size = size.checked_sub(marker.width.bytes()).ok_or_else(|| {
                PsdError::PaddingViolation(
                    "length block smaller than its own marker width".to_string(),
                )
            })?;
        }
        if size > marker.width.max() {
            return Err(PsdError::OverflowingLength {
                size,
                width: marker.width.bits(),
            });
        }

        self.set_position(marker.marker_offset)?;
        match marker.width {
            LengthWidth::U32 => self.write_u32(size as u32)?,
            LengthWidth::U64 => self.write_u64(size)?,
        }
        self.set_position(end_offset)?;
        Ok(size)
    }
}
