//! Pass-through plane extraction for formats that need no conversion

use crate::error::ConvertError;
use crate::frame::Frame;
use crate::types::PlaneData;

/// Copy every plane of `frame` out as-is, keeping its row and pixel stride
///
/// The copy covers everything the source exposes for the plane, padding
/// included, so the result outlives the frame.
pub fn extract_planes<F: Frame>(frame: &F) -> Result<Vec<PlaneData>, ConvertError> {
    let mut planes = Vec::with_capacity(frame.plane_count());

    for index in 0..frame.plane_count() {
        let plane = frame.plane(index)?;
        planes.push(PlaneData {
            bytes: plane.data.to_vec(),
            bytes_per_row: plane.row_stride,
            bytes_per_pixel: plane.pixel_stride,
        });
    }

    log::trace!("extracted {} planes", planes.len());
    Ok(planes)
}
