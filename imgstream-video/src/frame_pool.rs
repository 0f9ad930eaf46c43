//! Pool of reusable image buffers with stride-aware plane layouts
//!
//! Models a capture pipeline that hands out a fixed number of hardware
//! buffers: a buffer leaves the pool as a [`PooledImage`] and comes back
//! when that image is released.

use crate::error::BufferAccessError;
use crate::frame::{Frame, Plane};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Placement of one plane inside an image buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub offset: usize,
    pub len: usize,
    pub rows: usize,
    pub cols: usize,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl PlaneLayout {
    /// Layout whose length ends at the last addressed sample, as hardware reports it
    pub fn strided(
        offset: usize,
        rows: usize,
        cols: usize,
        row_stride: usize,
        pixel_stride: usize,
    ) -> Self {
        let len = if rows == 0 || cols == 0 {
            0
        } else {
            (rows - 1) * row_stride + (cols - 1) * pixel_stride + 1
        };
        Self {
            offset,
            len,
            rows,
            cols,
            row_stride,
            pixel_stride,
        }
    }
}

/// Plane placement for every buffer in a pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayout {
    width: u32,
    height: u32,
    planes: Vec<PlaneLayout>,
    size: usize,
}

impl ImageLayout {
    pub fn new(width: u32, height: u32, planes: Vec<PlaneLayout>) -> Self {
        let size = planes.iter().map(|p| p.offset + p.len).max().unwrap_or(0);
        Self {
            width,
            height,
            planes,
            size,
        }
    }

    /// Three-plane 4:2:0 with independent U and V planes (pixel stride 1)
    pub fn yuv420_planar(
        width: u32,
        height: u32,
        luma_row_stride: usize,
        chroma_row_stride: usize,
    ) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w / 2, h / 2);

        let y = PlaneLayout::strided(0, h, w, luma_row_stride, 1);
        let u_offset = luma_row_stride * h;
        let u = PlaneLayout::strided(u_offset, ch, cw, chroma_row_stride, 1);
        let v_offset = u_offset + chroma_row_stride * ch;
        let v = PlaneLayout::strided(v_offset, ch, cw, chroma_row_stride, 1);

        Self::new(width, height, vec![y, u, v])
    }

    /// 4:2:0 with chroma stored V,U,V,U (NV21 memory order)
    ///
    /// The U view starts one byte after the V view inside the same buffer.
    pub fn yuv420_vu_interleaved(width: u32, height: u32, row_stride: usize) -> Self {
        Self::semi_planar(width, height, row_stride, 1, 0)
    }

    /// 4:2:0 with chroma stored U,V,U,V (NV12 memory order)
    pub fn yuv420_uv_interleaved(width: u32, height: u32, row_stride: usize) -> Self {
        Self::semi_planar(width, height, row_stride, 0, 1)
    }

    fn semi_planar(
        width: u32,
        height: u32,
        row_stride: usize,
        u_shift: usize,
        v_shift: usize,
    ) -> Self {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w / 2, h / 2);
        let chroma_base = row_stride * h;

        let y = PlaneLayout::strided(0, h, w, row_stride, 1);
        let u = PlaneLayout::strided(chroma_base + u_shift, ch, cw, row_stride, 2);
        let v = PlaneLayout::strided(chroma_base + v_shift, ch, cw, row_stride, 2);

        Self::new(width, height, vec![y, u, v])
    }

    /// Single plane of `len` bytes (NV21, JPEG and other one-plane formats)
    pub fn single_plane(
        width: u32,
        height: u32,
        len: usize,
        row_stride: usize,
        pixel_stride: usize,
    ) -> Self {
        let plane = PlaneLayout {
            offset: 0,
            len,
            rows: height as usize,
            cols: width as usize,
            row_stride,
            pixel_stride,
        };
        Self::new(width, height, vec![plane])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn planes(&self) -> &[PlaneLayout] {
        &self.planes
    }

    /// Total buffer size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Pool of pre-allocated image buffers to eliminate allocation churn
#[derive(Clone)]
pub struct FramePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    layout: Arc<ImageLayout>,
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
    outstanding: AtomicUsize,
    closed: AtomicBool,
}

impl FramePool {
    /// Create a new frame pool
    ///
    /// # Arguments
    /// * `layout` - Plane placement shared by every buffer
    /// * `capacity` - Number of buffers to pre-allocate
    pub fn new(layout: ImageLayout, capacity: usize) -> Self {
        let buffers = (0..capacity).map(|_| vec![0u8; layout.size()]).collect();

        FramePool {
            inner: Arc::new(PoolInner {
                layout: Arc::new(layout),
                buffers: Mutex::new(buffers),
                capacity,
                outstanding: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.inner.layout
    }

    /// Acquire a buffer from the pool
    pub fn acquire(&self) -> Option<PooledImage> {
        if self.is_closed() {
            return None;
        }

        let data = self.inner.buffers.lock().pop()?;
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);

        Some(PooledImage {
            data,
            layout: Arc::clone(&self.inner.layout),
            pool: Arc::downgrade(&self.inner),
        })
    }

    /// Free all buffers; images still outstanding become inaccessible
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.buffers.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let available = self.inner.buffers.lock().len();

        PoolStats {
            capacity: self.inner.capacity,
            in_use: self.inner.outstanding.load(Ordering::Acquire),
            available,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub in_use: usize,
    pub available: usize,
}

/// Image backed by a pool buffer; dropping or releasing it returns the buffer
pub struct PooledImage {
    data: Vec<u8>,
    layout: Arc<ImageLayout>,
    pool: Weak<PoolInner>,
}

impl PooledImage {
    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    /// Raw buffer for the producer to fill
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Write every sample of plane `index` through its strides
    ///
    /// Padding bytes are left untouched. Samples the strides place beyond
    /// the plane's `len` are skipped.
    pub fn fill_plane(&mut self, index: usize, mut sample: impl FnMut(usize, usize) -> u8) {
        let Some(plane) = self.layout.planes.get(index).copied() else {
            return;
        };

        for row in 0..plane.rows {
            for col in 0..plane.cols {
                let at = row * plane.row_stride + col * plane.pixel_stride;
                if at >= plane.len {
                    continue;
                }
                self.data[plane.offset + at] = sample(row, col);
            }
        }
    }
}

impl Frame for PooledImage {
    fn width(&self) -> u32 {
        self.layout.width
    }

    fn height(&self) -> u32 {
        self.layout.height
    }

    fn plane_count(&self) -> usize {
        self.layout.planes.len()
    }

    fn plane(&self, index: usize) -> Result<Plane<'_>, BufferAccessError> {
        match self.pool.upgrade() {
            Some(pool) if !pool.closed.load(Ordering::Acquire) => {}
            _ => return Err(BufferAccessError::new("image pool closed")),
        }

        let layout = self
            .layout
            .planes
            .get(index)
            .ok_or_else(|| BufferAccessError::new(format!("no plane {index}")))?;

        Ok(Plane::new(
            &self.data[layout.offset..layout.offset + layout.len],
            layout.row_stride,
            layout.pixel_stride,
        ))
    }

    fn release(self) {
        drop(self);
    }
}

impl Drop for PooledImage {
    fn drop(&mut self) {
        let Some(pool) = self.pool.upgrade() else {
            return;
        };

        pool.outstanding.fetch_sub(1, Ordering::AcqRel);
        if !pool.closed.load(Ordering::Acquire) {
            pool.buffers.lock().push(std::mem::take(&mut self.data));
        }
    }
}
