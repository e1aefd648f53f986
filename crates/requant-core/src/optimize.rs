//! File-to-file optimization.
//!
//! Reads a JPEG from disk, runs one transcode session over it and writes the
//! result to a destination path, reporting the size change.

use std::fs;
use std::path::Path;

use log::info;

use crate::session::TranscodeSession;
use crate::types::{TranscodeError, TranscodeOptions};

/// Size change produced by [`optimize_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Source file size in bytes.
    pub input_size: u64,
    /// Destination file size in bytes.
    pub output_size: u64,
    /// Quality the output was encoded at.
    pub quality: u8,
}

impl OptimizeReport {
    /// Bytes saved relative to the source, in percent. Negative when the
    /// output grew.
    pub fn saved_percent(&self) -> f64 {
        if self.input_size == 0 {
            return 0.0;
        }
        let delta = self.input_size as f64 - self.output_size as f64;
        delta * 100.0 / self.input_size as f64
    }
}

/// Transcode the JPEG at `src` and write it to `dest`.
///
/// The destination is only created once encoding has succeeded, so a failed
/// run never leaves a truncated file behind.
///
/// # Errors
///
/// Returns `TranscodeError::Io` if the source cannot be read or the
/// destination cannot be written, and any session error otherwise.
pub fn optimize_file(
    src: &Path,
    dest: &Path,
    options: &TranscodeOptions,
) -> Result<OptimizeReport, TranscodeError> {
    let data = fs::read(src)?;

    let mut session = TranscodeSession::with_options(*options);
    session.open_bytes(&data)?;
    session.decode()?;
    let quality = session.effective_quality();
    let encoded = session.encode_to_vec()?;
    session.close();

    fs::write(dest, &encoded)?;

    let report = OptimizeReport {
        input_size: data.len() as u64,
        output_size: encoded.len() as u64,
        quality,
    };
    info!(
        "optimized {}: {} -> {} bytes ({:.1}% saved) at quality {}",
        src.display(),
        report.input_size,
        report.output_size,
        report.saved_percent(),
        report.quality
    );
    Ok(report)
}
