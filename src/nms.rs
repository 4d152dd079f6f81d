// nms.rs - Eager raster-scan non-maximum suppression on a response map.
//
// Selection runs in two passes:
//
//   1. Threshold: find the global maximum M and zero every score below
//      M / threshold_ratio. Cheap, and it removes most of the flat and
//      edge responses before the neighbourhood scan.
//   2. Scan: visit non-border pixels with x in the outer loop and y in the
//      inner loop. A pixel is accepted if it is not excluded and every one
//      of its 8 neighbours scores strictly lower. On acceptance the square
//      [x-r, x+r] x [y-r, y+r] is excluded at once, so later pixels near it
//      are never considered.
//
// The result is order dependent: of two equal plateaus, the one reached
// first in the scan wins, and a plateau pixel never beats its equal
// neighbour (the comparison rejects on >=). This is greedy suppression,
// not a global optimum.
//
// Because the exclusion square is inclusive on all four sides, any two
// accepted points are more than r apart in Chebyshev distance.

use log::debug;

use crate::error::{try_resize, try_with_capacity, FlowResult};
use crate::image::{Dimensions, Image, Point};

// ---------------------------------------------------------------------------
// SuppressionMask
// ---------------------------------------------------------------------------

/// Per-pixel "excluded" flags for one detection call.
///
/// Owned by the detector and reset (not reallocated) at the start of every
/// call when the image size is unchanged.
#[derive(Debug, Clone, Default)]
pub struct SuppressionMask {
    excluded: Vec<bool>,
    dims: Dimensions,
}

impl SuppressionMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every flag and size the mask for `dims`.
    pub fn reset(&mut self, dims: Dimensions) -> FlowResult<()> {
        if dims.area() > self.excluded.capacity() {
            debug!("suppression mask grows to {dims}");
        }
        try_resize(&mut self.excluded, dims.area(), false, "suppression mask")?;
        self.dims = dims;
        Ok(())
    }

    #[inline]
    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    /// True if (x, y) lies inside an exclusion square. Out-of-plane
    /// coordinates are never excluded.
    #[inline]
    pub fn is_excluded(&self, x: i32, y: i32) -> bool {
        self.dims.contains(x, y) && self.excluded[y as usize * self.dims.width + x as usize]
    }

    /// Exclude the square of half-width `radius` around `center`, clipped
    /// to the plane.
    pub fn exclude_square(&mut self, center: Point, radius: usize) {
        let w = self.dims.width as i32;
        let h = self.dims.height as i32;
        if w == 0 || h == 0 {
            return;
        }
        let r = radius as i32;
        let x0 = (center.x - r).max(0);
        let x1 = (center.x + r).min(w - 1);
        let y0 = (center.y - r).max(0);
        let y1 = (center.y + r).min(h - 1);
        for y in y0..=y1 {
            let row = y as usize * self.dims.width;
            for x in x0..=x1 {
                self.excluded[row + x as usize] = true;
            }
        }
    }

    /// Number of excluded pixels.
    pub fn excluded_count(&self) -> usize {
        self.excluded.iter().filter(|&&e| e).count()
    }
}

// ---------------------------------------------------------------------------
// Threshold pass
// ---------------------------------------------------------------------------

/// Zero every score below `max / ratio` and return `(max, threshold)`.
///
/// An empty map returns `(0, 0)` untouched. When the maximum is negative
/// the threshold lies above it, so the whole map is zeroed.
///
/// # Panics
/// Panics if `ratio == 0`.
pub fn threshold_response(response: &mut Image<i32>, ratio: i32) -> (i32, i32) {
    assert!(ratio != 0, "threshold ratio must be non-zero");
    let Some(max) = response.max_value() else {
        return (0, 0);
    };
    let threshold = max / ratio;
    for v in response.as_mut_slice() {
        if *v < threshold {
            *v = 0;
        }
    }
    (max, threshold)
}

// ---------------------------------------------------------------------------
// Maxima scan
// ---------------------------------------------------------------------------

/// Strict local maximum test against the 8-neighbourhood. (x, y) must be
/// a non-border pixel.
#[inline]
fn is_strict_local_max(response: &Image<i32>, x: usize, y: usize) -> bool {
    let v = response.get(x, y);
    for yy in y - 1..=y + 1 {
        for xx in x - 1..=x + 1 {
            if (xx, yy) != (x, y) && response.get(xx, yy) >= v {
                return false;
            }
        }
    }
    true
}

/// Scan `response` for well-separated strict local maxima.
///
/// `mask` is reset to the map's size first. At most `max_points` points
/// are returned, in acceptance order. Border rows and columns are never
/// candidates.
pub fn select_maxima(
    response: &Image<i32>,
    mask: &mut SuppressionMask,
    max_points: usize,
    suppression_distance: usize,
) -> FlowResult<Vec<Point>> {
    mask.reset(response.dims())?;

    let w = response.width();
    let h = response.height();
    let mut points = try_with_capacity(max_points.min(w * h), "maxima list")?;
    if w < 3 || h < 3 || max_points == 0 {
        return Ok(points);
    }

    'scan: for x in 1..w - 1 {
        for y in 1..h - 1 {
            if mask.is_excluded(x as i32, y as i32) || !is_strict_local_max(response, x, y) {
                continue;
            }
            let p = Point::new(x as i32, y as i32);
            points.push(p);
            mask.exclude_square(p, suppression_distance);
            if points.len() == max_points {
                break 'scan;
            }
        }
    }

    Ok(points)
}
