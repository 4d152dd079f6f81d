// convert.rs - Luma plane extraction from camera frame buffers.
//
// The flight camera delivers packed UYVY (YUV422): every pair of pixels
// shares one U and one V sample and carries two Y samples,
//
//   byte:   0   1   2   3 | 4   5   6   7 | ...
//           U  Y1   V  Y2 | U  Y1   V  Y2 | ...
//           |- pixel 0,1 -|- pixel 2,3 -|
//
// Corner scoring and tracking work on one brightness value per pixel.
// Both pixels of a macro-pixel get the average of its two Y samples,
// (Y1 + Y2) >> 1, so a luma plane has the full image width but only half
// the horizontal luma resolution of the sensor.

use crate::error::{try_alloc, FlowError, FlowResult};
use crate::image::{Dimensions, Image};

/// Bytes per pixel in a packed UYVY frame.
pub const UYVY_BYTES_PER_PIXEL: usize = 2;

/// Build a luma plane from a packed UYVY frame.
///
/// `buf` must hold exactly `width * height * 2` bytes and `width` must be
/// even (macro-pixels never straddle rows).
pub fn luma_from_uyvy(buf: &[u8], dims: Dimensions) -> FlowResult<Image<u8>> {
    if dims.width % 2 != 0 || buf.len() != dims.area() * UYVY_BYTES_PER_PIXEL {
        return Err(FlowError::InvalidPlane {
            width: dims.width,
            height: dims.height,
            len: buf.len(),
        });
    }

    let mut data = try_alloc(dims.area(), 0u8, "luma plane")?;
    for (dst, macro_px) in data.chunks_exact_mut(2).zip(buf.chunks_exact(4)) {
        let y = ((macro_px[1] as u16 + macro_px[3] as u16) >> 1) as u8;
        dst[0] = y;
        dst[1] = y;
    }

    Image::try_from_vec(dims.width, dims.height, data)
}

/// Wrap an 8-bit grayscale buffer as a luma plane, validating its length.
pub fn luma_from_gray(buf: &[u8], dims: Dimensions) -> FlowResult<Image<u8>> {
    if buf.len() != dims.area() {
        return Err(FlowError::InvalidPlane {
            width: dims.width,
            height: dims.height,
            len: buf.len(),
        });
    }
    let mut data = try_alloc(dims.area(), 0u8, "luma plane")?;
    data.copy_from_slice(buf);
    Image::try_from_vec(dims.width, dims.height, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uyvy_averages_macro_pixel() {
        // 4x1 image: two macro-pixels.
        let buf = [128, 10, 128, 30, 128, 200, 128, 201];
        let luma = luma_from_uyvy(&buf, Dimensions::new(4, 1)).unwrap();
        assert_eq!(luma.row(0), &[20, 20, 200, 200]);
    }

    #[test]
    fn test_uyvy_no_overflow() {
        let buf = [0, 255, 0, 255];
        let luma = luma_from_uyvy(&buf, Dimensions::new(2, 1)).unwrap();
        assert_eq!(luma.row(0), &[255, 255]);
    }

    #[test]
    fn test_uyvy_rejects_wrong_length() {
        let buf = [0u8; 7];
        assert!(matches!(
            luma_from_uyvy(&buf, Dimensions::new(2, 2)),
            Err(FlowError::InvalidPlane { len: 7, .. })
        ));
    }

    #[test]
    fn test_uyvy_rejects_odd_width() {
        let buf = [0u8; 6];
        assert!(luma_from_uyvy(&buf, Dimensions::new(3, 1)).is_err());
    }

    #[test]
    fn test_gray_roundtrip() {
        let buf: Vec<u8> = (0..6).collect();
        let luma = luma_from_gray(&buf, Dimensions::new(3, 2)).unwrap();
        assert_eq!(luma.get(2, 1), 5);
        assert!(luma_from_gray(&buf, Dimensions::new(4, 2)).is_err());
    }
}
