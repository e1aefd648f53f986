//! Default codec: the `image` crate's JPEG decoder and `jpeg-encoder`.
//!
//! Both engines work on whole frames. Scanline calls covering the full frame
//! go straight to the engine; partial calls stage one frame internally.

use std::io::{Cursor, Write};

use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use jpeg_encoder::{ColorType as EncodeColor, Encoder};

use super::markers;
use super::{
    Codec, ColorSpace, Compress, CompressParams, CodecError, Decompress, HeaderInfo,
    OutputGeometry,
};

/// JPEG codec backed by `image` (decode) and `jpeg-encoder` (encode).
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl Codec for JpegCodec {
    type Decoder = JpegDecompress;
    type Encoder<W: Write> = JpegCompress<W>;

    fn read_header(&self, data: Vec<u8>) -> Result<(Self::Decoder, HeaderInfo), CodecError> {
        let info = markers::scan_header(&data)?;
        let terminated = markers::is_terminated(&data)?;
        let decoder = JpegDecoder::new(Cursor::new(data))
            .map_err(|e| CodecError::MalformedHeader(e.to_string()))?;
        Ok((JpegDecompress::new(decoder, terminated), info))
    }

    fn create_compress<W: Write>(&self, sink: W) -> Result<Self::Encoder<W>, CodecError> {
        Ok(JpegCompress::new(sink))
    }
}

/// Decoder state for one source image.
///
/// The `image` decoder pads a stream that ends early instead of failing, so
/// a source with no EOI after its scan data is refused before decoding.
pub struct JpegDecompress {
    decoder: Option<JpegDecoder<Cursor<Vec<u8>>>>,
    terminated: bool,
    geometry: Option<OutputGeometry>,
    staged: Vec<u8>,
    next_row: usize,
}

impl JpegDecompress {
    fn new(decoder: JpegDecoder<Cursor<Vec<u8>>>, terminated: bool) -> Self {
        Self {
            decoder: Some(decoder),
            terminated,
            geometry: None,
            staged: Vec::new(),
            next_row: 0,
        }
    }

    fn started(&self) -> Result<OutputGeometry, CodecError> {
        self.geometry
            .ok_or_else(|| CodecError::Failed("decompression not started".to_string()))
    }
}

impl Decompress for JpegDecompress {
    fn begin_decompress(&mut self) -> Result<OutputGeometry, CodecError> {
        if !self.terminated {
            return Err(CodecError::Failed(
                "bitstream truncated: no EOI after scan data".to_string(),
            ));
        }
        let decoder = self
            .decoder
            .as_ref()
            .ok_or_else(|| CodecError::Failed("decompression already consumed".to_string()))?;

        let color_space = match decoder.color_type() {
            ColorType::L8 => ColorSpace::Grayscale,
            ColorType::Rgb8 => ColorSpace::Rgb,
            other => {
                return Err(CodecError::Failed(format!(
                    "unsupported output color type {:?}",
                    other
                )));
            }
        };

        let (width, height) = decoder.dimensions();
        let geometry = OutputGeometry {
            width: u16::try_from(width)
                .map_err(|_| CodecError::Failed(format!("output width {} too large", width)))?,
            height: u16::try_from(height)
                .map_err(|_| CodecError::Failed(format!("output height {} too large", height)))?,
            color_space,
        };

        let frame_bytes = geometry.stride() as u64 * u64::from(geometry.height);
        if decoder.total_bytes() != frame_bytes {
            return Err(CodecError::Failed(format!(
                "decoder reports {} bytes for a {} byte frame",
                decoder.total_bytes(),
                frame_bytes
            )));
        }

        self.geometry = Some(geometry);
        Ok(geometry)
    }

    fn read_scanlines(&mut self, rows: &mut [u8], stride: usize) -> Result<usize, CodecError> {
        let geometry = self.started()?;
        if stride != geometry.stride() {
            return Err(CodecError::Failed(format!(
                "scanline stride {} does not match output stride {}",
                stride,
                geometry.stride()
            )));
        }

        let height = usize::from(geometry.height);
        let count = (rows.len() / stride).min(height - self.next_row);
        if count == 0 {
            return Ok(0);
        }

        if let Some(decoder) = self.decoder.take() {
            if self.next_row == 0 && count == height {
                decoder
                    .read_image(&mut rows[..count * stride])
                    .map_err(|e| CodecError::Failed(e.to_string()))?;
                self.next_row = height;
                return Ok(count);
            }

            let mut staged = Vec::new();
            staged
                .try_reserve_exact(height * stride)
                .map_err(|e| CodecError::Failed(e.to_string()))?;
            staged.resize(height * stride, 0);
            decoder
                .read_image(&mut staged)
                .map_err(|e| CodecError::Failed(e.to_string()))?;
            self.staged = staged;
        }

        let start = self.next_row * stride;
        let end = start + count * stride;
        if self.staged.len() < end {
            return Err(CodecError::Failed("decoded frame unavailable".to_string()));
        }
        rows[..count * stride].copy_from_slice(&self.staged[start..end]);
        self.next_row += count;
        if self.next_row == height {
            self.staged = Vec::new();
        }
        Ok(count)
    }

    fn finish_decompress(&mut self) -> Result<(), CodecError> {
        let geometry = self.started()?;
        if self.next_row < usize::from(geometry.height) {
            return Err(CodecError::Failed(format!(
                "finish_decompress with {} of {} scanlines read",
                self.next_row, geometry.height
            )));
        }
        self.staged = Vec::new();
        Ok(())
    }
}

/// Encoder state bound to a sink.
pub struct JpegCompress<W: Write> {
    sink: W,
    params: Option<CompressParams>,
    staged: Vec<u8>,
    rows_written: usize,
    encoded: bool,
}

impl<W: Write> JpegCompress<W> {
    fn new(sink: W) -> Self {
        Self {
            sink,
            params: None,
            staged: Vec::new(),
            rows_written: 0,
            encoded: false,
        }
    }
}

impl<W: Write> Compress<W> for JpegCompress<W> {
    fn begin_compress(&mut self, params: &CompressParams) -> Result<(), CodecError> {
        if self.params.is_some() {
            return Err(CodecError::Failed("compression already started".to_string()));
        }
        if !(1..=100).contains(&params.quality) {
            return Err(CodecError::Failed(format!(
                "encoder quality {} out of range",
                params.quality
            )));
        }
        self.params = Some(*params);
        Ok(())
    }

    fn write_scanlines(&mut self, rows: &[u8], stride: usize) -> Result<usize, CodecError> {
        let params = self
            .params
            .ok_or_else(|| CodecError::Failed("compression not started".to_string()))?;
        let geometry = params.geometry;
        if stride != geometry.stride() {
            return Err(CodecError::Failed(format!(
                "scanline stride {} does not match input stride {}",
                stride,
                geometry.stride()
            )));
        }

        let height = usize::from(geometry.height);
        let count = (rows.len() / stride).min(height - self.rows_written);
        if count == 0 {
            return Ok(0);
        }
        let block = &rows[..count * stride];

        if self.rows_written == 0 && count == height {
            encode_frame(&mut self.sink, &params, block)?;
        } else {
            if self.staged.is_empty() {
                self.staged
                    .try_reserve_exact(height * stride)
                    .map_err(|e| CodecError::Failed(e.to_string()))?;
            }
            self.staged.extend_from_slice(block);
            if self.rows_written + count == height {
                let frame = std::mem::take(&mut self.staged);
                encode_frame(&mut self.sink, &params, &frame)?;
            }
        }

        self.rows_written += count;
        self.encoded = self.rows_written == height;
        Ok(count)
    }

    fn finish_compress(mut self) -> Result<W, CodecError> {
        if !self.encoded {
            let height = self.params.map_or(0, |p| p.geometry.height);
            return Err(CodecError::Failed(format!(
                "finish_compress with {} of {} scanlines written",
                self.rows_written, height
            )));
        }
        self.sink.flush()?;
        Ok(self.sink)
    }
}

fn encode_frame<W: Write>(
    sink: &mut W,
    params: &CompressParams,
    frame: &[u8],
) -> Result<(), CodecError> {
    let color = match params.geometry.color_space {
        ColorSpace::Grayscale => EncodeColor::Luma,
        ColorSpace::Rgb => EncodeColor::Rgb,
    };

    let mut encoder = Encoder::new(sink, params.quality);
    encoder.set_progressive(params.progressive);
    encoder.set_optimized_huffman_tables(params.optimize_coding);
    encoder
        .encode(frame, params.geometry.width, params.geometry.height, color)
        .map_err(|e| CodecError::Failed(format!("JPEG encoding failed: {}", e)))
}
