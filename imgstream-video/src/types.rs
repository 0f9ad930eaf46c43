//! Image data types and constants

/// Image format enumeration
///
/// Discriminants follow the platform image-format codes so that a format
/// requested by a consumer as a plain integer maps back onto a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Yuv420_888, // Planar/semi-planar YUV 4:2:0, three planes
    Nv21,       // Y plane followed by interleaved VU
    Jpeg,       // Compressed, single plane
    Unknown(u32),
}

const YUV_420_888: u32 = 0x23;
const NV21: u32 = 0x11;
const JPEG: u32 = 0x100;

impl ImageFormat {
    pub fn from_code(code: u32) -> Self {
        match code {
            YUV_420_888 => ImageFormat::Yuv420_888,
            NV21 => ImageFormat::Nv21,
            JPEG => ImageFormat::Jpeg,
            other => ImageFormat::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ImageFormat::Yuv420_888 => YUV_420_888,
            ImageFormat::Nv21 => NV21,
            ImageFormat::Jpeg => JPEG,
            ImageFormat::Unknown(code) => code,
        }
    }

    /// Returns number of planes a frame of this format carries
    pub fn plane_count(self) -> Option<usize> {
        match self {
            ImageFormat::Yuv420_888 => Some(3),
            ImageFormat::Nv21 | ImageFormat::Jpeg => Some(1),
            ImageFormat::Unknown(_) => None,
        }
    }

    /// Calculate tightly packed frame size in bytes
    ///
    /// JPEG is bounded by the uncompressed 4:2:0 size.
    pub fn calculate_size(self, width: u32, height: u32) -> Option<usize> {
        let luma = width as usize * height as usize;
        match self {
            ImageFormat::Yuv420_888 | ImageFormat::Nv21 | ImageFormat::Jpeg => {
                Some(luma + luma / 2)
            }
            ImageFormat::Unknown(_) => None,
        }
    }
}

/// Owned copy of one output plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneData {
    pub bytes: Vec<u8>,
    pub bytes_per_row: usize,
    pub bytes_per_pixel: usize,
}

impl PlaneData {
    /// Tightly packed plane, one byte per sample and no row padding
    pub fn packed(bytes: Vec<u8>, width: usize) -> Self {
        Self {
            bytes,
            bytes_per_row: width,
            bytes_per_pixel: 1,
        }
    }
}
