//! Image stream video core
//!
//! Pixel-level half of the image stream reader.
//!
//! - Pass-through plane extraction for formats that need no conversion
//! - Three-plane YUV 4:2:0 to NV21 with padded-stride handling
//! - Bulk copy for aliased V,U chroma, AVX2 interleave for planar chroma
//! - Pooled image buffers with explicit release

pub mod error;
pub mod format_conversion;
pub mod frame;
pub mod frame_pool;
pub mod plane_extraction;
pub mod types;

pub use error::*;
pub use format_conversion::*;
pub use frame::*;
pub use frame_pool::*;
pub use plane_extraction::*;
pub use types::*;
