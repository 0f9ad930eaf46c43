//! Frame dispatch: convert or pass through, then deliver on the consumer context

use crate::capture_properties::{FrameMetadata, MetadataProvider};
use crate::executor::Executor;
use crate::sink::ImageStreamSink;
use imgstream_video::{
    extract_planes, yuv420_to_nv21, ConvertError, Frame, ImageFormat, PlaneData,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result delivered to the sink for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub planes: Vec<PlaneData>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub lens_aperture: Option<f32>,
    pub sensor_exposure_time: Option<i64>,
    /// Widened to floating point for the consumer
    pub sensor_sensitivity: Option<f64>,
}

/// Convert `frame` for `target_format` and attach `metadata`
///
/// NV21 is converted from three YUV planes; any other format is passed
/// through plane by plane.
pub fn process<F: Frame>(
    frame: &F,
    target_format: ImageFormat,
    metadata: FrameMetadata,
) -> Result<ConversionResult, ConvertError> {
    let planes = match target_format {
        ImageFormat::Nv21 => {
            let bytes = yuv420_to_nv21(frame)?;
            vec![PlaneData::packed(bytes, frame.width() as usize)]
        }
        _ => extract_planes(frame)?,
    };

    Ok(ConversionResult {
        planes,
        width: frame.width(),
        height: frame.height(),
        format: target_format,
        lens_aperture: metadata.lens_aperture,
        sensor_exposure_time: metadata.sensor_exposure_time,
        sensor_sensitivity: metadata.sensor_sensitivity.map(f64::from),
    })
}

/// Processes frames for one stream with a fixed output format
pub struct FrameDispatcher {
    format: ImageFormat,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl FrameDispatcher {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Process one frame, release it and post the outcome to `main`
    ///
    /// The frame is released exactly once before anything is posted,
    /// whether conversion succeeded or not.
    pub fn on_image_available<F: Frame>(
        &self,
        image: F,
        properties: &dyn MetadataProvider,
        sink: &Arc<dyn ImageStreamSink>,
        main: &dyn Executor,
    ) {
        let outcome = process(&image, self.format, properties.snapshot());
        image.release();

        let sink = Arc::clone(sink);
        let posted = match outcome {
            Ok(result) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                log::trace!(
                    "{}x{} {:?} frame ready",
                    result.width,
                    result.height,
                    result.format
                );
                main.post(Box::new(move || sink.success(result)))
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Failed to process image: {err}");

                let code = err.kind().code();
                let message = format!("Caught {code}: {err}");
                main.post(Box::new(move || sink.error(code, &message, None)))
            }
        };

        if !posted {
            log::debug!("consumer context closed, stream event dropped");
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
}
