//! PackBits run length coding.
//!
//! Each scanline is compressed independently. A row size table precedes the
//! payload: `height` entries, u16 in psd files and u32 in psb files. Within
//! a row a signed control byte `n` introduces either `n + 1` literal bytes
//! (`n >= 0`) or `1 - n` copies of the next byte (`n < 0`); `-128` is a
//! no-op.

use crate::error::{PsdError, Result};
use crate::sections::file_header_section::PsdVersion;

/// Compress `height` rows of `row_bytes` bytes, producing the row size
/// table followed by the concatenated row payloads.
pub(crate) fn rle_compress(
    raw: &[u8],
    row_bytes: usize,
    height: usize,
    version: PsdVersion,
) -> Result<Vec<u8>> {
    let mut rows = Vec::with_capacity(height);
    let mut payload_len = 0usize;
    for row_index in 0..height {
        let start = row_index * row_bytes;
        let packed = pack_row(&raw[start..start + row_bytes]);
        payload_len += packed.len();
        rows.push(packed);
    }

    let entry_bytes = match version {
        PsdVersion::One => 2,
        PsdVersion::Two => 4,
    };
    let mut out = Vec::with_capacity(height * entry_bytes + payload_len);
    for row in &rows {
        match version {
            PsdVersion::One => {
                let len = u16::try_from(row.len()).map_err(|_| {
                    PsdError::CompressionError(format!(
                        "rle row of {} bytes exceeds the psd row size table",
                        row.len()
                    ))
                })?;
                out.extend_from_slice(&len.to_be_bytes());
            }
            PsdVersion::Two => {
                out.extend_from_slice(&(row.len() as u32).to_be_bytes());
            }
        }
    }
    for row in &rows {
        out.extend_from_slice(row);
    }
    Ok(out)
}

/// Decompress a row size table plus payload back into `height` rows of
/// `row_bytes` bytes.
pub(crate) fn rle_decompress(
    data: &[u8],
    row_bytes: usize,
    height: usize,
    version: PsdVersion,
) -> Result<Vec<u8>> {
    let entry_bytes = match version {
        PsdVersion::One => 2,
        PsdVersion::Two => 4,
    };
    let table_len = height * entry_bytes;
    if data.len() < table_len {
        return Err(PsdError::CompressionError(format!(
            "rle payload of {} bytes is too short for a {} row size table",
            data.len(),
            height
        )));
    }

    let mut row_lengths = Vec::with_capacity(height);
    for entry in data[..table_len].chunks(entry_bytes) {
        let len = match version {
            PsdVersion::One => u64::from(u16::from_be_bytes([entry[0], entry[1]])),
            PsdVersion::Two => {
                u64::from(u32::from_be_bytes([entry[0], entry[1], entry[2], entry[3]]))
            }
        };
        row_lengths.push(len as usize);
    }

    let mut out = Vec::with_capacity(row_bytes * height);
    let mut offset = table_len;
    for (row_index, row_len) in row_lengths.into_iter().enumerate() {
        let end = offset + row_len;
        if end > data.len() {
            return Err(PsdError::CompressionError(format!(
                "rle row {} runs past the end of the channel payload",
                row_index
            )));
        }
        unpack_row(&data[offset..end], row_bytes, row_index, &mut out)?;
        offset = end;
    }
    Ok(out)
}

/// PackBits-encode one row.
fn pack_row(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len() + row.len() / 128 + 1);
    let mut i = 0;

    while i < row.len() {
        // Measure the run starting here
        let mut run = 1;
        while i + run < row.len() && row[i + run] == row[i] && run < 128 {
            run += 1;
        }

        if run >= 3 {
            out.push((1i16 - run as i16) as u8);
            out.push(row[i]);
            i += run;
            continue;
        }

        // Literal stretch: stop when a run of three starts or 128 bytes
        // are collected
        let start = i;
        while i < row.len() && i - start < 128 {
            if i + 2 < row.len() && row[i] == row[i + 1] && row[i] == row[i + 2] && i > start {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&row[start..i]);
    }

    out
}

/// Decode one PackBits row into `out`, verifying it produces exactly
/// `row_bytes` bytes.
fn unpack_row(packed: &[u8], row_bytes: usize, row_index: usize, out: &mut Vec<u8>) -> Result<()> {
    let target = out.len() + row_bytes;
    let mut i = 0;

    while i < packed.len() {
        let header = packed[i] as i8;
        i += 1;

        if header == -128 {
            continue;
        }
        if header >= 0 {
            let literal = header as usize + 1;
            if i + literal > packed.len() || out.len() + literal > target {
                return Err(PsdError::CompressionError(format!(
                    "rle scanline {} overruns its row size entry",
                    row_index
                )));
            }
            out.extend_from_slice(&packed[i..i + literal]);
            i += literal;
        } else {
            let repeat = (1 - header as i16) as usize;
            if i >= packed.len() || out.len() + repeat > target {
                return Err(PsdError::CompressionError(format!(
                    "rle scanline {} overruns its row size entry",
                    row_index
                )));
            }
            let byte = packed[i];
            i += 1;
            out.resize(out.len() + repeat, byte);
        }
    }

    if out.len() != target {
        return Err(PsdError::CompressionError(format!(
            "rle scanline {} decoded {} bytes short",
            row_index,
            target - out.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_pack_tightly() {
        assert_eq!(pack_row(&[0xAA; 5]), vec![0xFC, 0xAA]);
    }

    #[test]
    fn literals_pack_with_their_count() {
        assert_eq!(pack_row(&[1, 2, 3, 4]), vec![3, 1, 2, 3, 4]);
    }

    #[test]
    fn mixed_rows_round_trip() {
        let mut row = Vec::new();
        row.extend(std::iter::repeat(0u8).take(100));
        row.extend((0..50).map(|i| (i * 5) as u8));
        row.extend(std::iter::repeat(255u8).take(80));

        let packed = pack_row(&row);
        assert!(packed.len() < row.len());

        let mut out = Vec::new();
        unpack_row(&packed, row.len(), 0, &mut out).unwrap();
        assert_eq!(out, row);
    }

    #[test]
    fn long_runs_split_at_128() {
        let row = [7u8; 300];
        let packed = pack_row(&row);
        let mut out = Vec::new();
        unpack_row(&packed, row.len(), 0, &mut out).unwrap();
        assert_eq!(out, row);
    }

    #[test]
    fn row_size_table_width_follows_version() {
        let raw = [0u8; 8];
        let psd = rle_compress(&raw, 4, 2, PsdVersion::One).unwrap();
        let psb = rle_compress(&raw, 4, 2, PsdVersion::Two).unwrap();
        // Same payload, 2 vs 4 byte table entries
        assert_eq!(psb.len() - psd.len(), 2 * 2);

        assert_eq!(rle_decompress(&psd, 4, 2, PsdVersion::One).unwrap(), raw);
        assert_eq!(rle_decompress(&psb, 4, 2, PsdVersion::Two).unwrap(), raw);
    }

    #[test]
    fn overrun_is_reported() {
        // Table says 2 bytes for a 4-byte row, payload decodes 5 bytes
        let data = [0u16.to_be_bytes(), 2u16.to_be_bytes()].concat();
        let mut data = data;
        data.extend_from_slice(&[4, 1, 2, 3, 4, 5]);
        // First row length 0 decodes nothing for a 4 byte row
        assert!(matches!(
            rle_decompress(&data, 4, 2, PsdVersion::One),
            Err(PsdError::CompressionError(_))
        ));
    }

    #[test]
    fn noop_header_is_skipped() {
        let packed = [0x80u8, 0xFF, 0x05];
        let mut out = Vec::new();
        unpack_row(&packed, 2, 0, &mut out).unwrap();
        assert_eq!(out, vec![5, 5]);
    }
}
