//! Requant Core - JPEG quality estimation and re-quantizing transcoder
//!
//! This crate estimates the IJG quality a JPEG was encoded at from its
//! quantization tables, and re-encodes images at a chosen quality while
//! keeping geometry, color space and baseline/progressive mode.
//!
//! # Architecture
//!
//! - [`quality`]: table fingerprint estimator
//! - [`raster`]: contiguous decoded scanline storage
//! - [`codec`]: the decoder/encoder gateway and its JPEG implementation
//! - [`session`]: the decode-then-encode state machine
//! - [`optimize`]: a file-to-file driver with a size report
//!
//! # Examples
//!
//! ```ignore
//! use requant_core::{transcode, TranscodeOptions};
//!
//! let source = std::fs::read("photo.jpg").unwrap();
//! let smaller = transcode(&source, &TranscodeOptions::with_quality(75)).unwrap();
//! ```

use std::io::{Read, Write};

pub mod codec;
pub mod optimize;
pub mod quality;
pub mod raster;
pub mod session;
pub mod types;

#[cfg(test)]
mod test_support;

pub use codec::{Codec, CodecError, ColorSpace, HeaderInfo, JpegCodec, OutputGeometry};
pub use optimize::{optimize_file, OptimizeReport};
pub use quality::{estimate_quality, QuantizationTable};
pub use raster::RasterBuffer;
pub use session::{TranscodeSession, DEFAULT_QUALITY};
pub use types::{ImageMetadata, SessionState, TranscodeError, TranscodeOptions};

/// Read width, height and estimated quality without decoding any pixels.
///
/// # Errors
///
/// Returns the session error that stopped the header read.
pub fn read_metadata<R: Read>(reader: R) -> Result<ImageMetadata, TranscodeError> {
    let mut session = TranscodeSession::new();
    let metadata = session.open_reader(reader)?;
    session.close();
    Ok(metadata)
}

/// Read metadata from an in-memory JPEG.
///
/// # Errors
///
/// As [`read_metadata`].
pub fn read_metadata_from_bytes(data: &[u8]) -> Result<ImageMetadata, TranscodeError> {
    let mut session = TranscodeSession::new();
    let metadata = session.open_bytes(data)?;
    session.close();
    Ok(metadata)
}

/// Transcode an in-memory JPEG and return the encoded bytes.
///
/// # Errors
///
/// Returns the first session error.
pub fn transcode(data: &[u8], options: &TranscodeOptions) -> Result<Vec<u8>, TranscodeError> {
    let mut session = TranscodeSession::with_options(*options);
    session.open_bytes(data)?;
    session.decode()?;
    let encoded = session.encode_to_vec()?;
    session.close();
    Ok(encoded)
}

/// Transcode from `reader` into `writer` and return the writer.
///
/// # Errors
///
/// Returns the first session error.
pub fn transcode_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    options: &TranscodeOptions,
) -> Result<W, TranscodeError> {
    let mut session = TranscodeSession::with_options(*options);
    session.open_reader(reader)?;
    session.decode()?;
    let writer = session.encode(writer)?;
    session.close();
    Ok(writer)
}
