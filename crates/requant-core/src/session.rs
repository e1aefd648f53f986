//! Transcode session state machine.
//!
//! A [`TranscodeSession`] runs one decode-then-encode cycle:
//!
//! ```text
//! Created --open--> HeaderRead --decode--> Decoded --encode--> Encoded
//!    \                  \                     \                  \
//!     +------------------+---------------------+------------------+--close--> Closed
//! ```
//!
//! Any codec, allocation or I/O error moves the session to `Failed` after
//! every buffer and codec instance it holds has been released. A failed
//! session is never retried in place; construct a new one.
//!
//! Sessions are single-threaded and blocking. Independent sessions share no
//! state and may run on separate threads.

use std::io::{Read, Write};

use log::{debug, warn};

use crate::codec::{Codec, Compress, CompressParams, Decompress, JpegCodec, OutputGeometry};
use crate::quality::estimate_quality;
use crate::raster::RasterBuffer;
use crate::types::{
    is_valid_quality, ImageMetadata, SessionState, TranscodeError, TranscodeOptions,
};

/// Encoder quality used when neither a target nor an estimate is available
/// (libjpeg's default).
pub const DEFAULT_QUALITY: u8 = 75;

/// One decode-then-encode cycle over a single JPEG source.
pub struct TranscodeSession<C: Codec = JpegCodec> {
    codec: C,
    state: SessionState,
    options: TranscodeOptions,
    metadata: Option<ImageMetadata>,
    progressive: bool,
    source_len: usize,
    decoder: Option<C::Decoder>,
    geometry: Option<OutputGeometry>,
    raster: Option<RasterBuffer>,
}

impl TranscodeSession<JpegCodec> {
    /// Create a session using the default JPEG codec.
    pub fn new() -> Self {
        Self::with_codec(JpegCodec)
    }

    /// Create a session with the given options.
    pub fn with_options(options: TranscodeOptions) -> Self {
        let mut session = Self::new();
        session.options = options;
        session
    }
}

impl Default for TranscodeSession<JpegCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> TranscodeSession<C> {
    /// Create a session driving `codec`.
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            state: SessionState::Created,
            options: TranscodeOptions::default(),
            metadata: None,
            progressive: false,
            source_len: 0,
            decoder: None,
            geometry: None,
            raster: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Header metadata, available once the source is open.
    pub fn metadata(&self) -> Option<ImageMetadata> {
        self.metadata
    }

    /// Source width, 0 before open.
    pub fn width(&self) -> u16 {
        self.metadata.map_or(0, |m| m.width)
    }

    /// Source height, 0 before open.
    pub fn height(&self) -> u16 {
        self.metadata.map_or(0, |m| m.height)
    }

    /// Estimated source quality (0 = unknown or not open).
    pub fn estimated_quality(&self) -> u8 {
        self.metadata.map_or(0, |m| m.quality)
    }

    /// Requested target quality as stored in the options.
    pub fn target_quality(&self) -> u8 {
        self.options.target_quality
    }

    /// Options applied to this session.
    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// True if the source frame is progressive.
    pub fn is_progressive(&self) -> bool {
        self.progressive
    }

    /// Length in bytes of the opened source.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// True while the session owns a decoded raster.
    pub fn holds_raster(&self) -> bool {
        self.raster.is_some()
    }

    /// Quality the encoder will use.
    ///
    /// The target wins when it lies strictly between 0 and 100; otherwise the
    /// estimated source quality is kept. An unknown estimate encodes at
    /// [`DEFAULT_QUALITY`] rather than handing 0 to the encoder, where
    /// libjpeg's `jpeg_set_quality` would clamp it to 1.
    pub fn effective_quality(&self) -> u8 {
        let target = self.options.target_quality;
        if target > 0 && target < 100 {
            return target;
        }
        self.metadata
            .filter(ImageMetadata::has_quality)
            .map_or(DEFAULT_QUALITY, |m| m.quality)
    }

    /// Request a target quality for the next encode.
    ///
    /// Values outside 1-100 are ignored, as are requests once the session
    /// has encoded, closed or failed.
    pub fn set_target_quality(&mut self, quality: u8) {
        if !matches!(
            self.state,
            SessionState::Created | SessionState::HeaderRead | SessionState::Decoded
        ) {
            debug!("ignoring target quality {} in state {}", quality, self.state);
            return;
        }
        if !is_valid_quality(quality) {
            debug!("ignoring invalid target quality {}", quality);
            return;
        }
        self.options.target_quality = quality;
    }

    /// Open a JPEG held in memory, read its header and estimate its quality.
    ///
    /// # Errors
    ///
    /// Returns `TranscodeError::InvalidInput` for an empty buffer,
    /// `TranscodeError::NotAJpeg` if the data is not a JPEG, and
    /// `TranscodeError::MalformedHeader` if the header is unreadable or the
    /// image is 1 pixel or less in either dimension.
    pub fn open_bytes(&mut self, data: &[u8]) -> Result<ImageMetadata, TranscodeError> {
        self.expect_state(SessionState::Created, "open")?;
        self.open_owned(data.to_vec())
    }

    /// Open a JPEG from a reader. The whole stream is read before the header
    /// is parsed.
    ///
    /// # Errors
    ///
    /// As [`open_bytes`](Self::open_bytes), plus `TranscodeError::Io` if
    /// reading fails.
    pub fn open_reader<R: Read>(&mut self, mut reader: R) -> Result<ImageMetadata, TranscodeError> {
        self.expect_state(SessionState::Created, "open")?;
        let mut data = Vec::new();
        if let Err(e) = reader.read_to_end(&mut data) {
            return Err(self.fail(e.into()));
        }
        self.open_owned(data)
    }

    fn open_owned(&mut self, data: Vec<u8>) -> Result<ImageMetadata, TranscodeError> {
        if data.is_empty() {
            return Err(self.fail(TranscodeError::InvalidInput("empty source".to_string())));
        }
        match self.read_header(data) {
            Ok(metadata) => {
                self.state = SessionState::HeaderRead;
                Ok(metadata)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn read_header(&mut self, data: Vec<u8>) -> Result<ImageMetadata, TranscodeError> {
        self.source_len = data.len();
        let (decoder, info) = self.codec.read_header(data)?;

        if info.width <= 1 || info.height <= 1 {
            return Err(TranscodeError::MalformedHeader(format!(
                "degenerate geometry {}x{}",
                info.width, info.height
            )));
        }

        debug!(
            "jpeg header: {}x{} {}bit {}",
            info.width,
            info.height,
            u32::from(info.components) * 8,
            if info.progressive { 'P' } else { 'N' }
        );

        let quality = estimate_quality(info.luma_table(), info.chroma_table());
        debug!("estimated quality: {}", quality);

        let metadata = ImageMetadata {
            width: info.width,
            height: info.height,
            quality,
        };
        self.progressive = info.progressive;
        self.decoder = Some(decoder);
        self.metadata = Some(metadata);
        Ok(metadata)
    }

    /// Decode every scanline into a freshly allocated raster.
    ///
    /// # Errors
    ///
    /// Returns `TranscodeError::OutOfMemory` if the raster cannot be
    /// allocated and `TranscodeError::CodecFailure` for any decode fault.
    /// No partial raster is ever kept.
    pub fn decode(&mut self) -> Result<(), TranscodeError> {
        self.expect_state(SessionState::HeaderRead, "decode")?;
        match self.read_raster() {
            Ok(()) => {
                self.state = SessionState::Decoded;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn read_raster(&mut self) -> Result<(), TranscodeError> {
        let mut decoder = self
            .decoder
            .take()
            .ok_or_else(|| TranscodeError::CodecFailure("decoder state missing".to_string()))?;

        let geometry = decoder.begin_decompress()?;
        let height = usize::from(geometry.height);
        let stride = geometry.stride();
        let mut raster =
            RasterBuffer::allocate(height, usize::from(geometry.width), geometry.components())?;

        let mut row = 0;
        while row < height {
            let count = decoder.read_scanlines(raster.rows_from_mut(row), stride)?;
            if count == 0 || count > height - row {
                return Err(TranscodeError::CodecFailure(format!(
                    "decoder returned {} rows at scanline {} of {}",
                    count, row, height
                )));
            }
            row += count;
        }
        decoder.finish_decompress()?;

        self.geometry = Some(geometry);
        self.raster = Some(raster);
        Ok(())
    }

    /// Re-encode the decoded raster into `sink` and return the sink.
    ///
    /// The output keeps the decoder's color space, component count and
    /// geometry, uses [`effective_quality`](Self::effective_quality), is
    /// progressive when the source was, and always uses optimized Huffman
    /// coding. The raster is released as soon as the last row is written.
    ///
    /// # Errors
    ///
    /// Returns `TranscodeError::CodecFailure` or `TranscodeError::Io` if
    /// encoding fails.
    pub fn encode<W: Write>(&mut self, sink: W) -> Result<W, TranscodeError> {
        self.expect_state(SessionState::Decoded, "encode")?;
        match self.write_raster(sink) {
            Ok(sink) => {
                self.state = SessionState::Encoded;
                Ok(sink)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Re-encode into a new byte buffer.
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>, TranscodeError> {
        let capacity = self.source_len;
        self.encode(Vec::with_capacity(capacity))
    }

    fn write_raster<W: Write>(&mut self, sink: W) -> Result<W, TranscodeError> {
        let geometry = self
            .geometry
            .ok_or_else(|| TranscodeError::CodecFailure("output geometry missing".to_string()))?;
        let mut raster = self
            .raster
            .take()
            .ok_or_else(|| TranscodeError::CodecFailure("raster missing".to_string()))?;

        let params = CompressParams {
            geometry,
            quality: self.effective_quality(),
            progressive: self.progressive,
            optimize_coding: true,
        };
        debug!(
            "encoding {}x{} at quality {}{}",
            geometry.width,
            geometry.height,
            params.quality,
            if params.progressive { " (progressive)" } else { "" }
        );

        let mut encoder = self.codec.create_compress(sink)?;
        encoder.begin_compress(&params)?;

        let height = raster.height();
        let stride = raster.stride();
        {
            let samples = raster.as_bytes();
            let mut row = 0;
            while row < height {
                let count = encoder.write_scanlines(&samples[row * stride..], stride)?;
                if count == 0 || count > height - row {
                    return Err(TranscodeError::CodecFailure(format!(
                        "encoder accepted {} rows at scanline {} of {}",
                        count, row, height
                    )));
                }
                row += count;
            }
        }
        raster.release();

        Ok(encoder.finish_compress()?)
    }

    /// Release every resource the session holds. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.release();
        self.state = SessionState::Closed;
    }

    fn release(&mut self) {
        self.decoder = None;
        self.geometry = None;
        if let Some(mut raster) = self.raster.take() {
            raster.release();
        }
    }

    fn fail(&mut self, err: TranscodeError) -> TranscodeError {
        self.release();
        self.state = SessionState::Failed;
        warn!("transcode session failed: {}", err);
        err
    }

    fn expect_state(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<(), TranscodeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TranscodeError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}
