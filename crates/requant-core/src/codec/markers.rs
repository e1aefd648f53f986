//! JPEG header segment scan.
//!
//! Walks marker segments from SOI up to the first SOS and collects the frame
//! geometry (SOF) and quantization tables (DQT). Entropy-coded data is never
//! read.

use log::warn;

use super::{CodecError, HeaderInfo};
use crate::quality::{QuantizationTable, TABLE_SIZE};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const DQT: u8 = 0xDB;
const TEM: u8 = 0x01;

/// Check whether `marker` starts a frame (SOF0-SOF15 minus DHT, JPG, DAC).
fn is_sof(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

/// SOF2, SOF6, SOF10 and SOF14 are progressive DCT.
fn is_progressive_sof(marker: u8) -> bool {
    matches!(marker, 0xC2 | 0xC6 | 0xCA | 0xCE)
}

/// Check whether `data` begins with an SOI marker.
pub fn has_soi(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == SOI
}

/// Scan the header segments of a JPEG bitstream.
///
/// # Errors
///
/// Returns `CodecError::NotAJpeg` if `data` does not start with SOI.
/// Returns `CodecError::MalformedHeader` for truncated segments, invalid
/// DQT contents, or when no frame header precedes the first scan.
pub fn scan_header(data: &[u8]) -> Result<HeaderInfo, CodecError> {
    walk_header(data).map(|(info, _)| info)
}

/// Check that an EOI marker follows the first scan.
///
/// Entropy-coded data never contains `FF D9` (every 0xFF there is stuffed
/// or starts a restart marker), so a stream cut short has no EOI after its
/// scan data.
///
/// # Errors
///
/// As [`scan_header`].
pub fn is_terminated(data: &[u8]) -> Result<bool, CodecError> {
    let (_, scan_start) = walk_header(data)?;
    Ok(scan_start.is_some_and(|start| {
        data[start..]
            .windows(2)
            .any(|w| w[0] == 0xFF && w[1] == EOI)
    }))
}

/// Walk the header segments. Also returns the offset just past the first
/// SOS marker, or `None` if EOI came first.
fn walk_header(data: &[u8]) -> Result<(HeaderInfo, Option<usize>), CodecError> {
    if !has_soi(data) {
        return Err(CodecError::NotAJpeg);
    }

    let mut frame: Option<(u8, u16, u16, u8)> = None;
    let mut quant_tables: [Option<QuantizationTable>; 4] = [None; 4];
    let mut pos = 2;

    let scan_start = loop {
        let marker = next_marker(data, &mut pos)?;
        match marker {
            SOS => break Some(pos),
            EOI => break None,
            // Standalone markers carry no length.
            0xD0..=0xD7 | TEM => continue,
            _ => {}
        }

        let payload = segment(data, &mut pos, marker)?;
        if is_sof(marker) {
            if frame.is_some() {
                return Err(malformed("multiple frame headers"));
            }
            frame = Some(parse_sof(marker, payload)?);
        } else if marker == DQT {
            parse_dqt(payload, &mut quant_tables)?;
        }
    };

    let (marker, width, height, components) =
        frame.ok_or_else(|| malformed("no frame header before first scan"))?;

    let info = HeaderInfo {
        width,
        height,
        components,
        progressive: is_progressive_sof(marker),
        quant_tables,
    };
    Ok((info, scan_start))
}

fn malformed(msg: &str) -> CodecError {
    CodecError::MalformedHeader(msg.to_string())
}

/// Advance to the next marker code.
///
/// Fill bytes are skipped. Stray bytes before a marker (including `FF 00`
/// pairs) are discarded with a warning.
fn next_marker(data: &[u8], pos: &mut usize) -> Result<u8, CodecError> {
    let mut discarded = 0usize;
    loop {
        while data.get(*pos).is_some_and(|&b| b != 0xFF) {
            *pos += 1;
            discarded += 1;
        }
        while data.get(*pos) == Some(&0xFF) {
            *pos += 1;
        }
        let marker = *data
            .get(*pos)
            .ok_or_else(|| malformed("truncated before marker code"))?;
        *pos += 1;
        if marker == 0x00 {
            discarded += 2;
            continue;
        }
        if discarded > 0 {
            warn!(
                "skipped {} extraneous bytes before marker 0x{:02X}",
                discarded, marker
            );
        }
        return Ok(marker);
    }
}

/// Borrow the payload of the segment at `pos` (after its length field).
fn segment<'a>(data: &'a [u8], pos: &mut usize, marker: u8) -> Result<&'a [u8], CodecError> {
    let len_bytes = data
        .get(*pos..*pos + 2)
        .ok_or_else(|| malformed("truncated segment length"))?;
    let len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
    if len < 2 {
        return Err(CodecError::MalformedHeader(format!(
            "segment 0x{:02X} declares length {}",
            marker, len
        )));
    }
    let payload = data.get(*pos + 2..*pos + len).ok_or_else(|| {
        CodecError::MalformedHeader(format!("segment 0x{:02X} is truncated", marker))
    })?;
    *pos += len;
    Ok(payload)
}

fn parse_sof(marker: u8, payload: &[u8]) -> Result<(u8, u16, u16, u8), CodecError> {
    if payload.len() < 6 {
        return Err(malformed("frame header too short"));
    }
    let height = u16::from_be_bytes([payload[1], payload[2]]);
    let width = u16::from_be_bytes([payload[3], payload[4]]);
    let components = payload[5];
    if payload.len() < 6 + 3 * usize::from(components) {
        return Err(malformed("frame header component list truncated"));
    }
    Ok((marker, width, height, components))
}

fn parse_dqt(
    mut payload: &[u8],
    tables: &mut [Option<QuantizationTable>; 4],
) -> Result<(), CodecError> {
    while !payload.is_empty() {
        let precision = payload[0] >> 4;
        let id = usize::from(payload[0] & 0x0F);
        payload = &payload[1..];

        if id >= tables.len() {
            return Err(CodecError::MalformedHeader(format!(
                "quantization table id {} out of range",
                id
            )));
        }

        let mut zigzag = [0u16; TABLE_SIZE];
        match precision {
            0 => {
                let raw = payload
                    .get(..TABLE_SIZE)
                    .ok_or_else(|| malformed("8-bit quantization table truncated"))?;
                for (out, &v) in zigzag.iter_mut().zip(raw) {
                    *out = u16::from(v);
                }
                payload = &payload[TABLE_SIZE..];
            }
            1 => {
                let raw = payload
                    .get(..TABLE_SIZE * 2)
                    .ok_or_else(|| malformed("16-bit quantization table truncated"))?;
                for (out, pair) in zigzag.iter_mut().zip(raw.chunks_exact(2)) {
                    *out = u16::from_be_bytes([pair[0], pair[1]]);
                }
                payload = &payload[TABLE_SIZE * 2..];
            }
            other => {
                return Err(CodecError::MalformedHeader(format!(
                    "quantization table precision {} is invalid",
                    other
                )));
            }
        }

        tables[id] = Some(QuantizationTable::from_zigzag(&zigzag));
    }
    Ok(())
}

#[cfg(test)]
mod test_streams {
    //! Hand-assembled header streams.

    /// SOI, one DQT per table (all coefficients `value`), SOF, SOS, EOI.
    pub fn header_stream(sof: u8, width: u16, height: u16, tables: &[(u8, u8)]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        for &(id, value) in tables {
            out.extend_from_slice(&[0xFF, 0xDB, 0x00, 67, id]);
            out.extend(std::iter::repeat(value).take(64));
        }
        let components: u8 = if tables.len() > 1 { 3 } else { 1 };
        let len = 8 + 3 * u16::from(components);
        out.extend_from_slice(&[0xFF, sof]);
        out.extend_from_slice(&len.to_be_bytes());
        out.push(8);
        out.extend_from_slice(&height.to_be_bytes());
        out.extend_from_slice(&width.to_be_bytes());
        out.push(components);
        for c in 0..components {
            out.extend_from_slice(&[c + 1, 0x11, c.min(1)]);
        }
        out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }
}
