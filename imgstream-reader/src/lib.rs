//! Image stream reader
//!
//! Delivers camera frames to a consumer as NV21 or as raw planes.
//!
//! - Frames are converted on a dedicated worker thread
//! - Results and errors are posted to the consumer's main queue
//! - Every frame is released exactly once, before delivery
//! - Capture metadata is sampled per frame

pub mod capture_properties;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod image_reader;
pub mod sink;
pub mod stream_reader;

pub use capture_properties::*;
pub use config::*;
pub use dispatcher::*;
pub use executor::*;
pub use image_reader::*;
pub use sink::*;
pub use stream_reader::*;

pub use imgstream_video::{ImageFormat, PlaneData};
