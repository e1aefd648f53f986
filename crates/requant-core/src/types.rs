//! Core types shared by the transcode session and its helpers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::CodecError;

/// Error types for transcode operations.
///
/// Every variant is session-fatal: once a session operation returns one of
/// these (other than [`TranscodeError::InvalidState`]), the session is in
/// [`SessionState::Failed`] and must be discarded.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The source or a requested geometry is absent or empty.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The source is not a JPEG bitstream.
    #[error("Input is not a JPEG image")]
    NotAJpeg,

    /// The JPEG header could not be read or declares degenerate geometry.
    #[error("Malformed JPEG header: {0}")]
    MalformedHeader(String),

    /// The raster buffer could not be allocated.
    #[error("Out of memory allocating {bytes} byte raster")]
    OutOfMemory { bytes: usize },

    /// A decode or encode step failed inside the codec.
    #[error("Codec failure: {0}")]
    CodecFailure(String),

    /// Reading the source or writing the sink failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The operation is not allowed in the session's current state.
    #[error("Cannot {operation} a session in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

impl From<CodecError> for TranscodeError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::NotAJpeg => TranscodeError::NotAJpeg,
            CodecError::MalformedHeader(msg) => TranscodeError::MalformedHeader(msg),
            CodecError::Failed(msg) => TranscodeError::CodecFailure(msg),
            CodecError::Io(err) => TranscodeError::Io(err.to_string()),
        }
    }
}

impl From<std::io::Error> for TranscodeError {
    fn from(err: std::io::Error) -> Self {
        TranscodeError::Io(err.to_string())
    }
}

/// Lifecycle state of a [`TranscodeSession`](crate::TranscodeSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Constructed, no source opened yet.
    #[default]
    Created,
    /// Header parsed and quality estimated.
    HeaderRead,
    /// Full raster decoded.
    Decoded,
    /// Raster written to a sink.
    Encoded,
    /// Resources released by the caller.
    Closed,
    /// A session-fatal error occurred; all resources are released.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::HeaderRead => "header-read",
            SessionState::Decoded => "decoded",
            SessionState::Encoded => "encoded",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Metadata read from a JPEG header.
///
/// `quality` is an estimate recovered from the quantization tables, never an
/// exact value; 0 means it could not be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Image width in pixels.
    pub width: u16,
    /// Image height in pixels.
    pub height: u16,
    /// Estimated source quality (1-100, 0 = unknown).
    pub quality: u8,
}

impl ImageMetadata {
    /// Check whether the estimator recognized the source tables.
    pub fn has_quality(&self) -> bool {
        self.quality > 0
    }
}

/// Options applied when re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    /// Target quality (1-100). 0 or any out-of-range value keeps the
    /// estimated source quality.
    pub target_quality: u8,
    /// Request that source metadata segments be dropped. The encoder never
    /// copies them, so output is always stripped.
    pub strip_metadata: bool,
}

impl TranscodeOptions {
    /// Create options with the given target quality.
    pub fn with_quality(target_quality: u8) -> Self {
        Self {
            target_quality,
            ..Self::default()
        }
    }
}

/// Check whether `quality` is an accepted target quality.
#[inline]
pub(crate) fn is_valid_quality(quality: u8) -> bool {
    (1..=100).contains(&quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_has_quality() {
        let meta = ImageMetadata {
            width: 640,
            height: 480,
            quality: 90,
        };
        assert!(meta.has_quality());
        assert!(!ImageMetadata::default().has_quality());
    }

    #[test]
    fn test_quality_range() {
        assert!(is_valid_quality(1));
        assert!(is_valid_quality(100));
        assert!(!is_valid_quality(0));
        assert!(!is_valid_quality(150));
        assert_eq!(TranscodeOptions::with_quality(80).target_quality, 80);
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::HeaderRead.to_string(), "header-read");
        assert_eq!(SessionState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_error_display() {
        let err = TranscodeError::OutOfMemory { bytes: 1024 };
        assert_eq!(err.to_string(), "Out of memory allocating 1024 byte raster");

        let err = TranscodeError::InvalidState {
            operation: "encode",
            state: SessionState::HeaderRead,
        };
        assert_eq!(err.to_string(), "Cannot encode a session in state header-read");
    }

    #[test]
    fn test_codec_error_conversion() {
        assert!(matches!(
            TranscodeError::from(CodecError::NotAJpeg),
            TranscodeError::NotAJpeg
        ));
        assert!(matches!(
            TranscodeError::from(CodecError::Failed("boom".into())),
            TranscodeError::CodecFailure(msg) if msg == "boom"
        ));
    }
}
