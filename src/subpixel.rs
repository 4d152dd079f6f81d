// subpixel.rs - Fixed-point bilinear sampling of a luma plane.
//
// A fixed-point coordinate with factor f addresses 1/f of a pixel:
//
//   X = x * f + ax,   0 <= ax < f
//
// Sampling at (X, Y):
//   - clamp X to [0, (W-1)*f] and Y to [0, (H-1)*f]
//   - if ax == 0 and ay == 0, return I(x, y) exactly
//   - otherwise blend the four neighbours
//
//       ( (f-ax)(f-ay) I(x,y)   + ax(f-ay) I(x+1,y)
//       + (f-ax)ay     I(x,y+1) + ax ay    I(x+1,y+1) ) / f^2
//
// The division truncates, so a blended sample can sit up to one grey
// level below the true bilinear value. Tracking relies on the same bias
// in both frames and it is kept as is.
//
// At the last column (or row) the +1 neighbour is clamped onto the edge
// pixel. Its weight is zero there anyway (the coordinate clamp forces
// ax = 0), so this only avoids the out-of-bounds read.

use crate::image::{Image, Point};

/// A coordinate in subpixel units (`1 / factor` pixel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubpixelPoint {
    pub x: i32,
    pub y: i32,
}

impl SubpixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        SubpixelPoint { x, y }
    }

    /// Promote an integer pixel to subpixel units. `None` if the scaled
    /// coordinate does not fit in i32.
    #[inline]
    pub fn from_pixel(p: Point, factor: i32) -> Option<Self> {
        Some(SubpixelPoint::new(p.x.checked_mul(factor)?, p.y.checked_mul(factor)?))
    }

    /// Back to integer pixels, truncating toward zero.
    #[inline]
    pub fn to_pixel(self, factor: i32) -> Point {
        Point::new(self.x / factor, self.y / factor)
    }
}

/// Sample `plane` at the subpixel coordinate (x, y).
///
/// # Panics
/// Panics if the plane is empty or `factor <= 0`.
pub fn sample(plane: &Image<u8>, x: i32, y: i32, factor: i32) -> i32 {
    assert!(factor > 0, "subpixel factor must be > 0");
    assert!(
        plane.width() > 0 && plane.height() > 0,
        "cannot sample an empty plane"
    );
    let last_x = plane.width() as i32 - 1;
    let last_y = plane.height() as i32 - 1;

    let x = x.clamp(0, last_x * factor);
    let y = y.clamp(0, last_y * factor);
    let x0 = x / factor;
    let y0 = y / factor;
    let ax = x - x0 * factor;
    let ay = y - y0 * factor;

    let p00 = plane.get(x0 as usize, y0 as usize) as i32;
    if ax == 0 && ay == 0 {
        return p00;
    }

    let x1 = (x0 + 1).min(last_x) as usize;
    let y1 = (y0 + 1).min(last_y) as usize;
    let p10 = plane.get(x1, y0 as usize) as i32;
    let p01 = plane.get(x0 as usize, y1) as i32;
    let p11 = plane.get(x1, y1) as i32;

    let blended = (factor - ax) * (factor - ay) * p00
        + ax * (factor - ay) * p10
        + (factor - ax) * ay * p01
        + ax * ay * p11;
    blended / (factor * factor)
}

/// Sample a `(2 * half_window + 1)` square patch centred on `center`,
/// one pixel (`factor` units) apart, into `out` in row-major order.
///
/// # Panics
/// Panics if `out` has the wrong length, or as `sample`.
pub fn sample_patch(
    plane: &Image<u8>,
    center: SubpixelPoint,
    half_window: usize,
    factor: i32,
    out: &mut [i32],
) {
    let size = 2 * half_window + 1;
    assert_eq!(out.len(), size * size, "patch buffer size mismatch");
    let hw = half_window as i32;
    for (j, row) in out.chunks_exact_mut(size).enumerate() {
        let y = center.y + (j as i32 - hw) * factor;
        for (i, v) in row.iter_mut().enumerate() {
            let x = center.x + (i as i32 - hw) * factor;
            *v = sample(plane, x, y, factor);
        }
    }
}
