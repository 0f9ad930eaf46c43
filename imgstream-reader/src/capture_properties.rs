//! Last known capture metadata, sampled once per frame

use parking_lot::RwLock;

/// Metadata snapshot attached to one frame
///
/// `None` means the value has not been sampled yet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameMetadata {
    pub lens_aperture: Option<f32>,
    /// Nanoseconds
    pub sensor_exposure_time: Option<i64>,
    /// ISO
    pub sensor_sensitivity: Option<i32>,
}

/// Source of metadata snapshots, read at the moment a frame is processed
pub trait MetadataProvider: Send + Sync {
    fn snapshot(&self) -> FrameMetadata;
}

/// Capture properties updated by the capture callback
///
/// Writers and the frame worker run on different threads; every snapshot
/// is a consistent copy.
#[derive(Debug, Default)]
pub struct CaptureProperties {
    last: RwLock<FrameMetadata>,
}

impl CaptureProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_lens_aperture(&self) -> Option<f32> {
        self.last.read().lens_aperture
    }

    pub fn set_last_lens_aperture(&self, aperture: f32) {
        self.last.write().lens_aperture = Some(aperture);
    }

    pub fn last_sensor_exposure_time(&self) -> Option<i64> {
        self.last.read().sensor_exposure_time
    }

    pub fn set_last_sensor_exposure_time(&self, exposure_ns: i64) {
        self.last.write().sensor_exposure_time = Some(exposure_ns);
    }

    pub fn last_sensor_sensitivity(&self) -> Option<i32> {
        self.last.read().sensor_sensitivity
    }

    pub fn set_last_sensor_sensitivity(&self, iso: i32) {
        self.last.write().sensor_sensitivity = Some(iso);
    }

    /// Replace all values at once, as a capture result does
    pub fn update(&self, metadata: FrameMetadata) {
        *self.last.write() = metadata;
    }
}

impl MetadataProvider for CaptureProperties {
    fn snapshot(&self) -> FrameMetadata {
        *self.last.read()
    }
}
