//! Scanline storage for a decoded frame.
//!
//! A [`RasterBuffer`] is a single contiguous allocation addressed by stride,
//! one row per decoded scanline. Row count and stride are fixed at
//! allocation time.

use crate::types::TranscodeError;

/// Decoded samples, `height` rows of `width * components` bytes each.
#[derive(Debug)]
pub struct RasterBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
    components: usize,
    released: bool,
}

impl RasterBuffer {
    /// Allocate a zeroed raster.
    ///
    /// # Errors
    ///
    /// Returns `TranscodeError::InvalidInput` if any dimension is zero.
    /// Returns `TranscodeError::OutOfMemory` if the size overflows or the
    /// allocation fails; nothing is retained in that case.
    pub fn allocate(
        height: usize,
        width: usize,
        components: usize,
    ) -> Result<Self, TranscodeError> {
        if height == 0 || width == 0 || components == 0 {
            return Err(TranscodeError::InvalidInput(format!(
                "raster geometry {}x{}x{} has a zero dimension",
                width, height, components
            )));
        }

        let bytes = width
            .checked_mul(components)
            .and_then(|stride| stride.checked_mul(height))
            .ok_or(TranscodeError::OutOfMemory { bytes: usize::MAX })?;

        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| TranscodeError::OutOfMemory { bytes })?;
        data.resize(bytes, 0);

        Ok(Self {
            data,
            width,
            height,
            components,
            released: false,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Samples per pixel.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width * self.components
    }

    /// Total sample bytes while allocated, 0 once released.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Check whether the samples have been freed.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Borrow row `index`, or `None` if out of range or released.
    pub fn row(&self, index: usize) -> Option<&[u8]> {
        if self.released || index >= self.height {
            return None;
        }
        let stride = self.stride();
        Some(&self.data[index * stride..(index + 1) * stride])
    }

    /// Mutably borrow row `index`, or `None` if out of range or released.
    pub fn row_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        if self.released || index >= self.height {
            return None;
        }
        let stride = self.stride();
        Some(&mut self.data[index * stride..(index + 1) * stride])
    }

    /// Iterate over all rows in order.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, u8> {
        self.data.chunks_exact(self.stride())
    }

    /// The contiguous block of rows from `first` to the end.
    ///
    /// Empty when `first >= height` or the buffer is released.
    pub fn rows_from_mut(&mut self, first: usize) -> &mut [u8] {
        if self.released || first >= self.height {
            return &mut [];
        }
        let start = first * self.stride();
        &mut self.data[start..]
    }

    /// All samples in row-major order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Free the samples. Calling this again is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.data = Vec::new();
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_geometry() {
        let raster = RasterBuffer::allocate(50, 100, 3).unwrap();
        assert_eq!(raster.height(), 50);
        assert_eq!(raster.width(), 100);
        assert_eq!(raster.components(), 3);
        assert_eq!(raster.stride(), 300);
        assert_eq!(raster.byte_size(), 15_000);
        assert_eq!(raster.rows().count(), 50);
        assert!(!raster.is_released());
    }

    #[test]
    fn test_allocate_zero_dimension() {
        assert!(matches!(
            RasterBuffer::allocate(0, 10, 3),
            Err(TranscodeError::InvalidInput(_))
        ));
        assert!(matches!(
            RasterBuffer::allocate(10, 10, 0),
            Err(TranscodeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_allocate_overflow_is_out_of_memory() {
        let result = RasterBuffer::allocate(usize::MAX, usize::MAX, 3);
        assert!(matches!(result, Err(TranscodeError::OutOfMemory { .. })));
    }

    #[test]
    fn test_allocate_huge_is_out_of_memory() {
        // Fits in usize but no allocator can satisfy it.
        let result = RasterBuffer::allocate(1 << 20, 1 << 20, 1 << 20);
        assert!(matches!(result, Err(TranscodeError::OutOfMemory { .. })));
    }

    #[test]
    fn test_row_addressing() {
        let mut raster = RasterBuffer::allocate(3, 2, 1).unwrap();
        raster.row_mut(1).unwrap().copy_from_slice(&[7, 8]);
        assert_eq!(raster.row(0).unwrap(), &[0, 0]);
        assert_eq!(raster.row(1).unwrap(), &[7, 8]);
        assert!(raster.row(3).is_none());
        assert_eq!(raster.as_bytes(), &[0, 0, 7, 8, 0, 0]);
    }

    #[test]
    fn test_rows_from_mut() {
        let mut raster = RasterBuffer::allocate(4, 2, 1).unwrap();
        assert_eq!(raster.rows_from_mut(1).len(), 6);
        raster.rows_from_mut(3).fill(9);
        assert_eq!(raster.row(3).unwrap(), &[9, 9]);
        assert!(raster.rows_from_mut(4).is_empty());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut raster = RasterBuffer::allocate(8, 8, 3).unwrap();
        raster.release();
        assert!(raster.is_released());
        assert_eq!(raster.byte_size(), 0);
        assert!(raster.row(0).is_none());
        assert!(raster.rows_from_mut(0).is_empty());

        raster.release();
        assert!(raster.is_released());
    }
}
