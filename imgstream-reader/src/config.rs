//! Stream configuration

use imgstream_video::{ImageFormat, ImageLayout};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
    #[error("4:2:0 streams require even dimensions, got {width}x{height}")]
    OddDimensions { width: u32, height: u32 },
    #[error("max_images must be at least 1")]
    NoImages,
    #[error("row stride {row_stride} is smaller than width {width}")]
    RowStride { row_stride: usize, width: u32 },
    #[error("unsupported stream format {0:?}")]
    UnsupportedFormat(ImageFormat),
}

/// Chroma arrangement produced by the in-process image reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YuvLayout {
    VuInterleaved, // Most camera HALs
    UvInterleaved,
    Planar,
}

/// Image stream configuration, fixed at stream setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    /// Format delivered to the consumer
    pub format: ImageFormat,
    /// Images that may be acquired at one time, usually 1
    pub max_images: usize,
    /// Padded hardware row stride; `None` means tightly packed rows
    pub row_stride: Option<usize>,
    pub yuv_layout: YuvLayout,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            format: ImageFormat::Nv21,
            max_images: 1,
            row_stride: None,
            yuv_layout: YuvLayout::VuInterleaved,
        }
    }
}

/// Format to request from the camera for a consumer-facing format
///
/// NV21 is produced by converting a YUV 4:2:0 capture stream; every other
/// format is streamed as requested.
pub fn compute_stream_image_format(format: ImageFormat) -> ImageFormat {
    match format {
        ImageFormat::Nv21 => ImageFormat::Yuv420_888,
        other => other,
    }
}

impl StreamConfig {
    pub fn row_stride(&self) -> usize {
        self.row_stride.unwrap_or(self.width as usize)
    }

    pub fn stream_format(&self) -> ImageFormat {
        compute_stream_image_format(self.format)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyImage {
                width: self.width,
                height: self.height,
            });
        }
        if self.max_images == 0 {
            return Err(ConfigError::NoImages);
        }
        if self.row_stride() < self.width as usize {
            return Err(ConfigError::RowStride {
                row_stride: self.row_stride(),
                width: self.width,
            });
        }

        match self.stream_format() {
            ImageFormat::Yuv420_888 if self.width % 2 != 0 || self.height % 2 != 0 => {
                Err(ConfigError::OddDimensions {
                    width: self.width,
                    height: self.height,
                })
            }
            ImageFormat::Yuv420_888 | ImageFormat::Jpeg => Ok(()),
            other => Err(ConfigError::UnsupportedFormat(other)),
        }
    }

    /// Buffer layout the in-process reader allocates for this stream
    pub fn image_layout(&self) -> Result<ImageLayout, ConfigError> {
        self.validate()?;

        let (width, height, row_stride) = (self.width, self.height, self.row_stride());
        let layout = match self.stream_format() {
            ImageFormat::Yuv420_888 => match self.yuv_layout {
                YuvLayout::VuInterleaved => {
                    ImageLayout::yuv420_vu_interleaved(width, height, row_stride)
                }
                YuvLayout::UvInterleaved => {
                    ImageLayout::yuv420_uv_interleaved(width, height, row_stride)
                }
                YuvLayout::Planar => {
                    ImageLayout::yuv420_planar(width, height, row_stride, row_stride / 2)
                }
            },
            // Compressed data reports no strides
            format => {
                let len = format
                    .calculate_size(width, height)
                    .ok_or(ConfigError::UnsupportedFormat(format))?;
                ImageLayout::single_plane(width, height, len, 0, 0)
            }
        };
        Ok(layout)
    }
}
