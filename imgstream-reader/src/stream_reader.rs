//! Image stream reader: wires a frame source to the dispatcher and sink

use crate::capture_properties::MetadataProvider;
use crate::config::{ConfigError, StreamConfig};
use crate::dispatcher::FrameDispatcher;
use crate::executor::Executor;
use crate::image_reader::{ImageAvailableCallback, ImageAvailableListener, ImageReader, ImageSource};
use crate::sink::ImageStreamSink;
use imgstream_video::ImageFormat;
use std::sync::Arc;

/// One image stream with a fixed consumer format
///
/// Frames are processed on the `handler` context passed to
/// [`subscribe_listener`](Self::subscribe_listener) and every outcome is
/// delivered to the sink on the `main` context.
pub struct ImageStreamReader<S: ImageSource = ImageReader> {
    dispatcher: Arc<FrameDispatcher>,
    source: Arc<S>,
}

impl ImageStreamReader<ImageReader> {
    /// Create a stream backed by the in-process image reader
    pub fn new(config: StreamConfig) -> Result<Self, ConfigError> {
        let layout = config.image_layout()?;

        log::info!(
            "Image stream: {}x{} {:?} (captured as {:?}), {} image(s)",
            config.width,
            config.height,
            config.format,
            config.stream_format(),
            config.max_images
        );

        let reader = ImageReader::new(layout, config.max_images);
        Ok(Self::with_source(Arc::new(reader), config.format))
    }
}

impl<S: ImageSource> ImageStreamReader<S> {
    pub fn with_source(source: Arc<S>, format: ImageFormat) -> Self {
        Self {
            dispatcher: Arc::new(FrameDispatcher::new(format)),
            source,
        }
    }

    /// Format delivered to the consumer
    pub fn format(&self) -> ImageFormat {
        self.dispatcher.format()
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn dispatcher(&self) -> &FrameDispatcher {
        &self.dispatcher
    }

    /// Start delivering frames to `sink`
    ///
    /// Replaces any previous subscription. Metadata is sampled from
    /// `properties` when each frame is processed.
    pub fn subscribe_listener(
        &self,
        properties: Arc<dyn MetadataProvider>,
        sink: Arc<dyn ImageStreamSink>,
        handler: Arc<dyn Executor>,
        main: Arc<dyn Executor>,
    ) {
        let source = Arc::downgrade(&self.source);
        let dispatcher = Arc::clone(&self.dispatcher);

        let callback: ImageAvailableCallback = Arc::new(move || {
            let Some(source) = source.upgrade() else {
                return;
            };
            let Some(image) = source.acquire_next_image() else {
                return;
            };
            dispatcher.on_image_available(image, properties.as_ref(), &sink, main.as_ref());
        });

        self.source
            .set_on_image_available_listener(Some(ImageAvailableListener::new(callback, handler)));
    }

    pub fn remove_listener(&self) {
        self.source.set_on_image_available_listener(None);
    }

    /// Stop the stream; frames still being processed report a buffer fault
    pub fn close(&self) {
        let stats = self.dispatcher.stats();
        log::info!(
            "Image stream closed: {} delivered, {} failed",
            stats.delivered,
            stats.failed
        );
        self.source.close();
    }
}
