//! Codec gateway for the transcode session.
//!
//! The session never touches entropy coding itself. It drives a [`Codec`]
//! through header read, scanline decompression and scanline compression,
//! and every step reports failure through its own `Result`. The decoder and
//! the encoder are independent instances with independent fault boundaries.
//!
//! # Architecture
//!
//! - [`Codec`] opens a decoder from source bytes and creates encoders on sinks
//! - [`Decompress`] produces scanlines into caller-owned row blocks
//! - [`Compress`] consumes scanlines and hands the sink back when finished
//!
//! [`JpegCodec`] is the default implementation.

mod jpeg;
pub mod markers;

use std::io::Write;

use thiserror::Error;

use crate::quality::QuantizationTable;

pub use jpeg::{JpegCodec, JpegCompress, JpegDecompress};

/// Errors reported by a codec instance.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input does not start with a JPEG SOI marker.
    #[error("Not a JPEG bitstream")]
    NotAJpeg,

    /// The header segments are truncated or inconsistent.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Decoding or encoding failed.
    #[error("{0}")]
    Failed(String),

    /// The sink rejected a write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output color space of a decoded frame.
///
/// CMYK and YCCK sources are converted to RGB by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// One luminance sample per pixel.
    Grayscale,
    /// Interleaved red, green, blue.
    Rgb,
}

impl ColorSpace {
    /// Samples per pixel.
    pub fn components(self) -> usize {
        match self {
            ColorSpace::Grayscale => 1,
            ColorSpace::Rgb => 3,
        }
    }
}

/// What the header declares, before any pixel data is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// Number of frame components.
    pub components: u8,
    /// True for progressive DCT frames.
    pub progressive: bool,
    /// Quantization tables by slot (0 = luminance, 1 = chrominance).
    pub quant_tables: [Option<QuantizationTable>; 4],
}

impl HeaderInfo {
    /// Luminance table, if defined.
    pub fn luma_table(&self) -> Option<&QuantizationTable> {
        self.quant_tables[0].as_ref()
    }

    /// Chrominance table, if defined.
    pub fn chroma_table(&self) -> Option<&QuantizationTable> {
        self.quant_tables[1].as_ref()
    }
}

/// Geometry of the decoder's output scanlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputGeometry {
    pub width: u16,
    pub height: u16,
    pub color_space: ColorSpace,
}

impl OutputGeometry {
    /// Samples per pixel.
    pub fn components(&self) -> usize {
        self.color_space.components()
    }

    /// Bytes per scanline.
    pub fn stride(&self) -> usize {
        usize::from(self.width) * self.components()
    }
}

/// Encoder configuration for one compress cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressParams {
    pub geometry: OutputGeometry,
    /// Encoder quality (1-100).
    pub quality: u8,
    /// Emit a progressive frame.
    pub progressive: bool,
    /// Build optimized Huffman tables.
    pub optimize_coding: bool,
}

/// A JPEG engine the session can drive.
pub trait Codec {
    /// Decoder state produced by a successful header read.
    type Decoder: Decompress;
    /// Encoder state bound to a sink.
    type Encoder<W: Write>: Compress<W>;

    /// Parse the header of `data` and return a decoder positioned before the
    /// first scanline.
    fn read_header(&self, data: Vec<u8>) -> Result<(Self::Decoder, HeaderInfo), CodecError>;

    /// Create an encoder writing to `sink`.
    fn create_compress<W: Write>(&self, sink: W) -> Result<Self::Encoder<W>, CodecError>;
}

/// Scanline decompression.
pub trait Decompress {
    /// Start decompression and report the output geometry.
    fn begin_decompress(&mut self) -> Result<OutputGeometry, CodecError>;

    /// Fill whole rows of `rows` (each `stride` bytes) with the next
    /// scanlines. Returns the number of rows produced.
    fn read_scanlines(&mut self, rows: &mut [u8], stride: usize) -> Result<usize, CodecError>;

    /// Complete decompression once every scanline has been read.
    fn finish_decompress(&mut self) -> Result<(), CodecError>;
}

/// Scanline compression into a sink of type `W`.
pub trait Compress<W> {
    /// Configure the encoder for one frame.
    fn begin_compress(&mut self, params: &CompressParams) -> Result<(), CodecError>;

    /// Consume whole rows of `rows` (each `stride` bytes). Returns the number
    /// of rows accepted.
    fn write_scanlines(&mut self, rows: &[u8], stride: usize) -> Result<usize, CodecError>;

    /// Flush the frame and return the sink.
    fn finish_compress(self) -> Result<W, CodecError>;
}
