//! YUV 4:2:0 three-plane to NV21 conversion
//!
//! Strips row padding from the luma plane and interleaves the two chroma
//! planes into V,U pairs. Aliased V,U storage is copied in bulk; any other
//! chroma layout is sampled through each plane's own strides, with an AVX2
//! row kernel for tightly packed planar chroma.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use crate::error::ConvertError;
use crate::frame::{Frame, Plane};
use crate::types::ImageFormat;

const Y_PLANE: usize = 0;
const U_PLANE: usize = 1;
const V_PLANE: usize = 2;

/// Physical arrangement of the two chroma planes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaLayout {
    /// One buffer holding V,U,V,U...; the U view starts one byte after the V view
    Interleaved,
    /// Anything else, sampled plane by plane
    Planar,
}

/// Detect whether the chroma views can be consumed directly as NV21 order
pub fn detect_chroma_layout(u: &Plane<'_>, v: &Plane<'_>) -> ChromaLayout {
    let aliased = std::ptr::eq(u.data.as_ptr(), v.data.as_ptr().wrapping_add(1));

    if aliased && u.pixel_stride == 2 && v.pixel_stride == 2 && u.row_stride == v.row_stride {
        ChromaLayout::Interleaved
    } else {
        ChromaLayout::Planar
    }
}

/// Convert a three-plane YUV 4:2:0 frame into one tightly packed NV21 buffer
///
/// The output holds `width * height` luma bytes followed by
/// `(height / 2) * (width / 2)` V,U pairs. Nothing is returned on failure,
/// so a partially written buffer never escapes.
pub fn yuv420_to_nv21<F: Frame>(frame: &F) -> Result<Vec<u8>, ConvertError> {
    let (width, height) = (frame.width(), frame.height());
    if width % 2 != 0 || height % 2 != 0 {
        return Err(ConvertError::OddDimensions { width, height });
    }
    if frame.plane_count() != 3 {
        return Err(ConvertError::PlaneCount {
            expected: 3,
            actual: frame.plane_count(),
        });
    }

    let output_size = ImageFormat::Nv21.calculate_size(width, height).unwrap_or(0);
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let luma_size = width * height;
    let mut output = vec![0u8; output_size];
    let (luma, chroma) = output.split_at_mut(luma_size);

    let y = frame.plane(Y_PLANE)?;
    copy_luma(&y, luma, width, height)?;

    let u = frame.plane(U_PLANE)?;
    let v = frame.plane(V_PLANE)?;
    let layout = detect_chroma_layout(&u, &v);
    log::trace!("{width}x{height} chroma layout {layout:?}");

    match layout {
        ChromaLayout::Interleaved => copy_interleaved_chroma(&u, &v, chroma, width, height)?,
        ChromaLayout::Planar => interleave_planar_chroma(&u, &v, chroma, width, height)?,
    }

    Ok(output)
}

fn ensure_covers(
    index: usize,
    plane: &Plane<'_>,
    rows: usize,
    cols: usize,
) -> Result<(), ConvertError> {
    let required = plane.span(rows, cols);
    if plane.data.len() < required {
        return Err(ConvertError::PlaneTooSmall {
            plane: index,
            required,
            available: plane.data.len(),
        });
    }
    Ok(())
}

fn copy_luma(
    y: &Plane<'_>,
    output: &mut [u8],
    width: usize,
    height: usize,
) -> Result<(), ConvertError> {
    ensure_covers(Y_PLANE, y, height, width)?;

    if y.pixel_stride != 1 {
        for (row, dst) in output.chunks_exact_mut(width).enumerate() {
            for (col, byte) in dst.iter_mut().enumerate() {
                *byte = y.sample(row, col);
            }
        }
        return Ok(());
    }

    if y.row_stride == width {
        output.copy_from_slice(&y.data[..width * height]);
        return Ok(());
    }

    for (row, dst) in output.chunks_exact_mut(width).enumerate() {
        let start = row * y.row_stride;
        dst.copy_from_slice(&y.data[start..start + width]);
    }
    Ok(())
}

/// Fast path: the V view already reads V,U,V,U...
///
/// A tightly sized V view stops one byte short of the final U sample of
/// the last row, which is taken from the U view.
fn copy_interleaved_chroma(
    u: &Plane<'_>,
    v: &Plane<'_>,
    output: &mut [u8],
    width: usize,
    height: usize,
) -> Result<(), ConvertError> {
    let (chroma_width, chroma_height) = (width / 2, height / 2);
    ensure_covers(U_PLANE, u, chroma_height, chroma_width)?;
    ensure_covers(V_PLANE, v, chroma_height, chroma_width)?;

    let row_stride = v.row_stride;
    let last_u = (chroma_height - 1) * row_stride + (chroma_width - 1) * 2;

    if row_stride == width {
        let copied = v.data.len().min(output.len());
        output[..copied].copy_from_slice(&v.data[..copied]);
        if copied < output.len() {
            output[copied] = u.data[last_u];
        }
        return Ok(());
    }

    for (row, dst) in output.chunks_exact_mut(width).enumerate() {
        let start = row * row_stride;
        let end = (start + width).min(v.data.len());
        let copied = end - start;
        dst[..copied].copy_from_slice(&v.data[start..end]);
        if copied < width {
            dst[copied] = u.data[start + (chroma_width - 1) * 2];
        }
    }
    Ok(())
}

/// Slow path: sample V and U separately and write them as pairs
fn interleave_planar_chroma(
    u: &Plane<'_>,
    v: &Plane<'_>,
    output: &mut [u8],
    width: usize,
    height: usize,
) -> Result<(), ConvertError> {
    let (chroma_width, chroma_height) = (width / 2, height / 2);
    ensure_covers(U_PLANE, u, chroma_height, chroma_width)?;
    ensure_covers(V_PLANE, v, chroma_height, chroma_width)?;

    let rows = output.chunks_exact_mut(width).take(chroma_height).enumerate();

    if u.pixel_stride == 1 && v.pixel_stride == 1 {
        for (row, dst) in rows {
            let v_row = &v.data[row * v.row_stride..][..chroma_width];
            let u_row = &u.data[row * u.row_stride..][..chroma_width];
            interleave_row(v_row, u_row, dst);
        }
        return Ok(());
    }

    for (row, dst) in rows {
        for (col, pair) in dst.chunks_exact_mut(2).enumerate() {
            pair[0] = v.sample(row, col);
            pair[1] = u.sample(row, col);
        }
    }
    Ok(())
}

/// Interleave one row of V and U samples into V,U pairs
///
/// Auto-dispatches to AVX2 with runtime CPU detection.
pub fn interleave_row(v: &[u8], u: &[u8], output: &mut [u8]) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe {
                interleave_row_avx2(v, u, output);
            }
            return;
        }
    }

    interleave_row_scalar(v, u, output);
}

/// Scalar fallback implementation (portable, slower)
pub fn interleave_row_scalar(v: &[u8], u: &[u8], output: &mut [u8]) {
    for ((pair, &v), &u) in output.chunks_exact_mut(2).zip(v).zip(u) {
        pair[0] = v;
        pair[1] = u;
    }
}

/// Interleave V and U rows using AVX2, 32 pairs per iteration
///
/// # Safety
/// Requires AVX2 CPU support.
#[target_feature(enable = "avx2")]
#[cfg(target_arch = "x86_64")]
pub unsafe fn interleave_row_avx2(v: &[u8], u: &[u8], output: &mut [u8]) {
    let count = v.len().min(u.len()).min(output.len() / 2);
    let mut i = 0;

    while i + 32 <= count {
        let vv = _mm256_loadu_si256(v.as_ptr().add(i) as *const __m256i);
        let uu = _mm256_loadu_si256(u.as_ptr().add(i) as *const __m256i);

        // Unpack works per 128-bit lane: lo = [V0..7|V16..23], hi = [V8..15|V24..31]
        let lo = _mm256_unpacklo_epi8(vv, uu);
        let hi = _mm256_unpackhi_epi8(vv, uu);

        let first = _mm256_permute2x128_si256(lo, hi, 0x20);
        let second = _mm256_permute2x128_si256(lo, hi, 0x31);

        let dst = output.as_mut_ptr().add(i * 2);
        _mm256_storeu_si256(dst as *mut __m256i, first);
        _mm256_storeu_si256(dst.add(32) as *mut __m256i, second);

        i += 32;
    }

    interleave_row_scalar(&v[i..count], &u[i..count], &mut output[i * 2..count * 2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BufferAccessError;
    use crate::frame_pool::{FramePool, ImageLayout, PooledImage};

    fn fill(
        image: &mut PooledImage,
        y: impl Fn(usize, usize) -> u8,
        u: impl Fn(usize, usize) -> u8,
        v: impl Fn(usize, usize) -> u8,
    ) {
        image.fill_plane(0, y);
        image.fill_plane(1, u);
        image.fill_plane(2, v);
    }

    fn pattern_image(layout: ImageLayout) -> (FramePool, PooledImage) {
        let pool = FramePool::new(layout, 1);
        let mut image = pool.acquire().unwrap();
        image.data_mut().fill(0xAA);
        fill(
            &mut image,
            |r, c| (r * 31 + c * 7) as u8,
            |r, c| (r * 13 + c * 3 + 100) as u8,
            |r, c| (r * 5 + c * 11 + 50) as u8,
        );
        (pool, image)
    }

    #[test]
    fn test_constant_planes() {
        let (width, height) = (16, 8);
        let pool = FramePool::new(ImageLayout::yuv420_planar(width, height, 16, 8), 1);
        let mut image = pool.acquire().unwrap();
        fill(&mut image, |_, _| 0x10, |_, _| 0x80, |_, _| 0xF0);

        let nv21 = yuv420_to_nv21(&image).unwrap();
        let luma = (width * height) as usize;

        assert_eq!(nv21.len(), luma + luma / 2);
        assert!(nv21[..luma].iter().all(|&b| b == 0x10));
        for pair in nv21[luma..].chunks_exact(2) {
            assert_eq!(pair, &[0xF0, 0x80]);
        }
    }

    #[test]
    fn test_output_sized_as_nv21() {
        for (width, height) in [(2u32, 2u32), (6, 4), (640, 480)] {
            let row_stride = width as usize;
            let layout = ImageLayout::yuv420_planar(width, height, row_stride, row_stride / 2);
            let pool = FramePool::new(layout, 1);
            let image = pool.acquire().unwrap();
            let nv21 = yuv420_to_nv21(&image).unwrap();
            assert_eq!(Some(nv21.len()), ImageFormat::Nv21.calculate_size(width, height));
        }
    }

    #[test]
    fn test_luma_padding_stripped() {
        let (width, height) = (6, 4);
        let pool = FramePool::new(ImageLayout::yuv420_planar(width, height, 16, 8), 1);
        let mut image = pool.acquire().unwrap();
        // Padding bytes are 0xAA, samples never are
        image.data_mut().fill(0xAA);
        fill(&mut image, |r, c| (r * 6 + c) as u8, |_, _| 1, |_, _| 2);

        let nv21 = yuv420_to_nv21(&image).unwrap();
        assert_eq!(nv21.len(), 36);
        assert!(!nv21.contains(&0xAA));
        let expected: Vec<u8> = (0..24).collect();
        assert_eq!(&nv21[..24], &expected[..]);
    }

    #[test]
    fn test_layouts_produce_identical_output() {
        let (width, height) = (12, 6);

        let (_p1, packed_vu) = pattern_image(ImageLayout::yuv420_vu_interleaved(width, height, 12));
        let (_p2, padded_vu) = pattern_image(ImageLayout::yuv420_vu_interleaved(width, height, 20));
        let (_p3, uv) = pattern_image(ImageLayout::yuv420_uv_interleaved(width, height, 16));
        let (_p4, planar) = pattern_image(ImageLayout::yuv420_planar(width, height, 12, 6));
        let (_p5, padded_planar) = pattern_image(ImageLayout::yuv420_planar(width, height, 32, 24));

        let reference = yuv420_to_nv21(&planar).unwrap();
        assert_eq!(yuv420_to_nv21(&packed_vu).unwrap(), reference);
        assert_eq!(yuv420_to_nv21(&padded_vu).unwrap(), reference);
        assert_eq!(yuv420_to_nv21(&uv).unwrap(), reference);
        assert_eq!(yuv420_to_nv21(&padded_planar).unwrap(), reference);

        // First chroma pair is (V, U) of sample (0, 0)
        let luma = (width * height) as usize;
        assert_eq!(&reference[luma..luma + 2], &[50, 100]);
    }

    #[test]
    fn test_layout_detection() {
        let pool = FramePool::new(ImageLayout::yuv420_vu_interleaved(8, 4, 8), 1);
        let image = pool.acquire().unwrap();
        let (u, v) = (image.plane(1).unwrap(), image.plane(2).unwrap());
        assert_eq!(detect_chroma_layout(&u, &v), ChromaLayout::Interleaved);

        let pool = FramePool::new(ImageLayout::yuv420_uv_interleaved(8, 4, 8), 1);
        let image = pool.acquire().unwrap();
        let (u, v) = (image.plane(1).unwrap(), image.plane(2).unwrap());
        assert_eq!(detect_chroma_layout(&u, &v), ChromaLayout::Planar);

        let pool = FramePool::new(ImageLayout::yuv420_planar(8, 4, 8, 4), 1);
        let image = pool.acquire().unwrap();
        let (u, v) = (image.plane(1).unwrap(), image.plane(2).unwrap());
        assert_eq!(detect_chroma_layout(&u, &v), ChromaLayout::Planar);
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        let pool = FramePool::new(ImageLayout::yuv420_planar(5, 4, 5, 2), 1);
        let image = pool.acquire().unwrap();
        assert_eq!(
            yuv420_to_nv21(&image).unwrap_err(),
            ConvertError::OddDimensions {
                width: 5,
                height: 4
            }
        );
    }

    #[test]
    fn test_wrong_plane_count() {
        let pool = FramePool::new(ImageLayout::single_plane(4, 4, 24, 4, 1), 1);
        let image = pool.acquire().unwrap();
        assert!(matches!(
            yuv420_to_nv21(&image),
            Err(ConvertError::PlaneCount { expected: 3, actual: 1 })
        ));
    }

    struct ShortChroma;

    impl Frame for ShortChroma {
        fn width(&self) -> u32 {
            4
        }

        fn height(&self) -> u32 {
            4
        }

        fn plane_count(&self) -> usize {
            3
        }

        fn plane(&self, index: usize) -> Result<Plane<'_>, BufferAccessError> {
            static LUMA: [u8; 16] = [0; 16];
            static CHROMA: [u8; 3] = [0; 3];
            Ok(match index {
                0 => Plane::new(&LUMA, 4, 1),
                _ => Plane::new(&CHROMA, 2, 1),
            })
        }

        fn release(self) {}
    }

    #[test]
    fn test_short_plane_rejected() {
        assert_eq!(
            yuv420_to_nv21(&ShortChroma).unwrap_err(),
            ConvertError::PlaneTooSmall {
                plane: 1,
                required: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_inaccessible_buffer() {
        let pool = FramePool::new(ImageLayout::yuv420_planar(4, 4, 4, 2), 1);
        let image = pool.acquire().unwrap();
        pool.close();

        let err = yuv420_to_nv21(&image).unwrap_err();
        assert!(matches!(err, ConvertError::BufferAccess(_)));
    }

    #[test]
    fn test_interleave_row_matches_scalar() {
        // Long enough to cover both the vector body and the scalar tail
        let v: Vec<u8> = (0..100).map(|i| (i * 3) as u8).collect();
        let u: Vec<u8> = (0..100).map(|i| (255 - i) as u8).collect();

        let mut dispatched = vec![0u8; 200];
        let mut scalar = vec![0u8; 200];
        interleave_row(&v, &u, &mut dispatched);
        interleave_row_scalar(&v, &u, &mut scalar);

        assert_eq!(dispatched, scalar);
        assert_eq!(&scalar[..4], &[0, 255, 3, 254]);
    }

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn test_avx2_vs_scalar() {
        if !is_x86_feature_detected!("avx2") {
            return;
        }

        let v: Vec<u8> = (0..64).collect();
        let u: Vec<u8> = (64..128).collect();
        let mut avx2 = vec![0u8; 128];
        let mut scalar = vec![0u8; 128];

        unsafe {
            interleave_row_avx2(&v, &u, &mut avx2);
        }
        interleave_row_scalar(&v, &u, &mut scalar);

        assert_eq!(avx2, scalar, "Interleaved rows don't match");
    }
}
