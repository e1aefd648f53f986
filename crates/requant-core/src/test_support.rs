//! Fixtures shared by unit tests.

use jpeg_encoder::{ColorType, Encoder};

use crate::codec::ColorSpace;

/// Deterministic gradient pattern, `components` samples per pixel.
pub fn gradient(width: usize, height: usize, components: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * components);
    for y in 0..height {
        for x in 0..width {
            for c in 0..components {
                let v = (x * 255 / width.max(1) + y * 127 / height.max(1) + c * 40) % 256;
                pixels.push(v as u8);
            }
        }
    }
    pixels
}

/// Encode a gradient of the given geometry as a JPEG source image.
pub fn jpeg_fixture(
    width: u16,
    height: u16,
    color_space: ColorSpace,
    quality: u8,
    progressive: bool,
) -> Vec<u8> {
    let (color, components) = match color_space {
        ColorSpace::Grayscale => (ColorType::Luma, 1),
        ColorSpace::Rgb => (ColorType::Rgb, 3),
    };
    let pixels = gradient(usize::from(width), usize::from(height), components);

    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, quality);
    encoder.set_progressive(progressive);
    encoder
        .encode(&pixels, width, height, color)
        .expect("fixture encoding");
    out
}

/// Cut `data` halfway through the entropy-coded data of its first scan.
pub fn truncate_scan(data: &[u8]) -> Vec<u8> {
    let sos = data
        .windows(2)
        .position(|w| w == [0xFF, 0xDA])
        .expect("fixture has a scan");
    let cut = sos + (data.len() - sos) / 2;
    data[..cut].to_vec()
}

/// Rewrite the DQT segments of `data` without the chrominance table
/// (slot 1), leaving a luminance-only header.
pub fn luma_only(data: &[u8]) -> Vec<u8> {
    let mut out = data[..2].to_vec();
    let mut pos = 2;
    loop {
        let marker = data[pos + 1];
        if marker == 0xDA {
            out.extend_from_slice(&data[pos..]);
            return out;
        }
        let len = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        let segment = &data[pos..pos + 2 + len];
        pos += 2 + len;

        if marker != 0xDB {
            out.extend_from_slice(segment);
            continue;
        }

        let mut kept = Vec::new();
        let mut tables = &segment[4..];
        while !tables.is_empty() {
            let size = if tables[0] >> 4 == 0 { 65 } else { 129 };
            if tables[0] & 0x0F != 1 {
                kept.extend_from_slice(&tables[..size]);
            }
            tables = &tables[size..];
        }
        if !kept.is_empty() {
            out.extend_from_slice(&[0xFF, 0xDB]);
            out.extend_from_slice(&((kept.len() + 2) as u16).to_be_bytes());
            out.extend_from_slice(&kept);
        }
    }
}
