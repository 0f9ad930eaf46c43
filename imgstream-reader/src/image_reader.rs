//! Frame sources and the in-process image reader
//!
//! The capture side dequeues a free buffer, fills it and queues it back;
//! every queued image fires the image-available listener on the listener's
//! executor, which then acquires the next image.

use crate::executor::Executor;
use crossbeam_queue::ArrayQueue;
use imgstream_video::{Frame, FramePool, ImageLayout, PoolStats, PooledImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type ImageAvailableCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback plus the context it must run on
#[derive(Clone)]
pub struct ImageAvailableListener {
    callback: ImageAvailableCallback,
    executor: Arc<dyn Executor>,
}

impl ImageAvailableListener {
    pub fn new(callback: ImageAvailableCallback, executor: Arc<dyn Executor>) -> Self {
        Self { callback, executor }
    }

    /// Schedule the callback on the listener's executor
    pub fn notify(&self) -> bool {
        let callback = Arc::clone(&self.callback);
        self.executor.post(Box::new(move || callback()))
    }
}

/// Producer of raw frames for one stream
pub trait ImageSource: Send + Sync + 'static {
    type Image: Frame + Send + 'static;

    /// Next ready image, or `None` when nothing is queued
    fn acquire_next_image(&self) -> Option<Self::Image>;

    fn set_on_image_available_listener(&self, listener: Option<ImageAvailableListener>);

    /// Stop producing and free every buffer
    fn close(&self);
}

/// In-process image reader backed by a fixed pool of `max_images` buffers
pub struct ImageReader {
    pool: FramePool,
    ready: ArrayQueue<PooledImage>,
    listener: Mutex<Option<ImageAvailableListener>>,
    queued: AtomicU64,
    skipped: AtomicU64,
}

impl ImageReader {
    pub fn new(layout: ImageLayout, max_images: usize) -> Self {
        let max_images = max_images.max(1);

        Self {
            pool: FramePool::new(layout, max_images),
            ready: ArrayQueue::new(max_images),
            listener: Mutex::new(None),
            queued: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn layout(&self) -> &ImageLayout {
        self.pool.layout()
    }

    /// Take a free buffer for the producer to fill
    ///
    /// Returns `None` while every buffer is acquired; that frame is skipped.
    pub fn dequeue_buffer(&self) -> Option<PooledImage> {
        let image = self.pool.acquire();
        if image.is_none() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            log::trace!("no free image buffer, frame skipped");
        }
        image
    }

    /// Publish a filled image and notify the listener
    pub fn queue_buffer(&self, image: PooledImage) -> bool {
        if self.pool.is_closed() {
            return false;
        }

        if let Err(image) = self.ready.push(image) {
            // Queue full - drop the frame, its buffer goes back to the pool
            self.skipped.fetch_add(1, Ordering::Relaxed);
            drop(image);
            return false;
        }
        self.queued.fetch_add(1, Ordering::Relaxed);

        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            if !listener.notify() {
                log::debug!("listener executor gone, notification dropped");
            }
        }
        true
    }

    pub fn stats(&self) -> ReaderStats {
        ReaderStats {
            queued: self.queued.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            pending: self.ready.len(),
            pool: self.pool.stats(),
        }
    }
}

impl ImageSource for ImageReader {
    type Image = PooledImage;

    fn acquire_next_image(&self) -> Option<PooledImage> {
        self.ready.pop()
    }

    fn set_on_image_available_listener(&self, listener: Option<ImageAvailableListener>) {
        *self.listener.lock() = listener;
    }

    fn close(&self) {
        self.listener.lock().take();
        while self.ready.pop().is_some() {}
        self.pool.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStats {
    pub queued: u64,
    pub skipped: u64,
    pub pending: usize,
    pub pool: PoolStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Immediate;
    use std::sync::atomic::AtomicUsize;

    fn reader(max_images: usize) -> ImageReader {
        ImageReader::new(ImageLayout::yuv420_vu_interleaved(8, 4, 8), max_images)
    }

    #[test]
    fn test_queue_and_acquire_in_order() {
        let reader = reader(3);

        for value in 1..=3u8 {
            let mut image = reader.dequeue_buffer().unwrap();
            image.fill_plane(0, |_, _| value);
            assert!(reader.queue_buffer(image));
        }

        for value in 1..=3u8 {
            let image = reader.acquire_next_image().unwrap();
            assert_eq!(image.plane(0).unwrap().data[0], value);
        }
        assert!(reader.acquire_next_image().is_none());
    }

    #[test]
    fn test_saturated_pool_skips_frames() {
        let reader = reader(1);

        let image = reader.dequeue_buffer().unwrap();
        assert!(reader.dequeue_buffer().is_none());
        assert_eq!(reader.stats().skipped, 1);

        reader.queue_buffer(image);
        let acquired = reader.acquire_next_image().unwrap();
        assert!(reader.dequeue_buffer().is_none());

        acquired.release();
        assert!(reader.dequeue_buffer().is_some());
        assert_eq!(reader.stats().skipped, 2);
    }

    #[test]
    fn test_listener_notified_per_image() {
        let reader = reader(2);
        let notified = Arc::new(AtomicUsize::new(0));

        let counter = notified.clone();
        reader.set_on_image_available_listener(Some(ImageAvailableListener::new(
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(Immediate),
        )));

        let image = reader.dequeue_buffer().unwrap();
        reader.queue_buffer(image);
        let image = reader.dequeue_buffer().unwrap();
        reader.queue_buffer(image);
        assert_eq!(notified.load(Ordering::SeqCst), 2);

        reader.set_on_image_available_listener(None);
        let _ = reader.acquire_next_image();
        let image = reader.dequeue_buffer().unwrap();
        reader.queue_buffer(image);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert_eq!(reader.stats().pending, 2);
    }

    #[test]
    fn test_close_frees_buffers() {
        let reader = reader(2);
        let pending = reader.dequeue_buffer().unwrap();
        reader.queue_buffer(pending);
        let outstanding = reader.dequeue_buffer().unwrap();

        reader.close();
        assert!(reader.acquire_next_image().is_none());
        assert!(reader.dequeue_buffer().is_none());
        assert!(outstanding.plane(0).is_err());
        assert!(!reader.queue_buffer(outstanding));
        assert_eq!(reader.stats().pool.in_use, 0);
    }
}
