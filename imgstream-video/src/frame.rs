//! Frame and plane views handed to the converters

use crate::error::BufferAccessError;

/// Read-only window over one plane of a frame
///
/// Borrowed from the frame; valid only until the frame is released.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl<'a> Plane<'a> {
    pub fn new(data: &'a [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Bytes needed to address `rows` x `cols` samples through this plane's strides
    pub fn span(&self, rows: usize, cols: usize) -> usize {
        if rows == 0 || cols == 0 {
            return 0;
        }
        (rows - 1)
            .saturating_mul(self.row_stride)
            .saturating_add((cols - 1).saturating_mul(self.pixel_stride))
            .saturating_add(1)
    }

    /// Sample at (`row`, `col`)
    ///
    /// # Panics
    /// Panics if the sample lies outside `data`. Check the plane against
    /// [`span`](Self::span) first, or use [`get`](Self::get).
    #[inline]
    pub fn sample(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.row_stride + col * self.pixel_stride]
    }

    /// Sample at (`row`, `col`), or `None` outside the view
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        let at = row
            .checked_mul(self.row_stride)?
            .checked_add(col.checked_mul(self.pixel_stride)?)?;
        self.data.get(at).copied()
    }
}

/// A raw frame owned by the pipeline for the duration of one conversion
pub trait Frame {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn plane_count(&self) -> usize;

    /// Borrow plane `index`, failing if its storage is no longer accessible
    fn plane(&self, index: usize) -> Result<Plane<'_>, BufferAccessError>;

    /// Return the frame's backing buffer to its owner
    fn release(self)
    where
        Self: Sized;
}
