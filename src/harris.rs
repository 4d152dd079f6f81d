// harris.rs - Fixed-point Harris / Noble corner detector.
//
// The detector scores every pixel by the structure tensor of its smoothed
// gradients, then hands the response map to the eager maxima scan in
// `nms`. Everything is integer.
//
// Algorithm:
//   1. Central-difference gradients dx, dy over the whole plane.
//   2. For every non-border pixel, sum the 3x3 neighbourhood's products
//      with the kernel [1 2 1; 2 4 2; 1 2 1]:
//        Sxx = sum(w * (dx*dx / pre)) / post
//        Sxy = sum(w * (dx*dy / pre)) / post
//        Syy = sum(w * (dy*dy / pre)) / post
//      Each product is divided by `pre` (14) BEFORE weighting and the sum
//      by `post` (255). With 8-bit luma this keeps every intermediate well
//      inside i32 (|dx| <= 255, so a product is < 65026 and a weighted
//      sum < 16 * 4645).
//   3. Score:
//        Harris: det - min(trace, 255)^2 / 25
//        Noble:  det / trace           (trace > 0)
//                det * 1000            (trace <= 0, 0 < det <= 65)
//                65335                 (trace <= 0, det > 65)
//                0                     otherwise
//   4. Border rows and columns keep a zero score.
//   5. Threshold at max / 5 and run the maxima scan.
//
// All divisions truncate toward zero, exactly like the flight code. The
// bias is part of the response values; tests pin them.

use log::debug;

use crate::config::{CornerConfig, CornerScore};
use crate::error::FlowResult;
use crate::gradient::gradients_into;
use crate::image::{mark_points, Image, Point};
use crate::nms::{select_maxima, threshold_response, SuppressionMask};

/// 3x3 smoothing kernel, row-major.
pub const SMOOTHING_KERNEL: [i32; 9] = [1, 2, 1, 2, 4, 2, 1, 2, 1];

/// Luma value painted by `detect_and_mark`.
pub const MARK_VALUE: u8 = 255;

// ---------------------------------------------------------------------------
// Structure tensor
// ---------------------------------------------------------------------------

/// Symmetric 2x2 second-moment matrix `[xx xy; xy yy]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StructureTensor {
    pub xx: i64,
    pub xy: i64,
    pub yy: i64,
}

impl StructureTensor {
    pub const fn new(xx: i64, xy: i64, yy: i64) -> Self {
        StructureTensor { xx, xy, yy }
    }

    #[inline]
    pub fn det(&self) -> i64 {
        self.xx * self.yy - self.xy * self.xy
    }

    #[inline]
    pub fn trace(&self) -> i64 {
        self.xx + self.yy
    }

    /// Row-major `[G0, G1, G2, G3]`; `G1 == G2` by construction.
    #[inline]
    pub fn as_matrix(&self) -> [i64; 4] {
        [self.xx, self.xy, self.xy, self.yy]
    }
}

/// Smoothed tensor at non-border pixel (x, y) from precomputed gradient
/// planes.
///
/// # Panics
/// Panics if (x, y) is on or outside the border.
pub fn smoothed_tensor(
    dx: &Image<i32>,
    dy: &Image<i32>,
    x: usize,
    y: usize,
    pre_divisor: i32,
    post_divisor: i32,
) -> StructureTensor {
    let mut xx = 0i32;
    let mut xy = 0i32;
    let mut yy = 0i32;
    let mut k = 0;
    for py in y - 1..=y + 1 {
        let rdx = &dx.row(py)[x - 1..=x + 1];
        let rdy = &dy.row(py)[x - 1..=x + 1];
        for (&gx, &gy) in rdx.iter().zip(rdy) {
            let w = SMOOTHING_KERNEL[k];
            xx += w * (gx * gx / pre_divisor);
            xy += w * (gx * gy / pre_divisor);
            yy += w * (gy * gy / pre_divisor);
            k += 1;
        }
    }
    StructureTensor::new(
        (xx / post_divisor) as i64,
        (xy / post_divisor) as i64,
        (yy / post_divisor) as i64,
    )
}

/// Harris response `det - min(trace, trace_clamp)^2 / k_reciprocal`.
#[inline]
pub fn harris_score(t: &StructureTensor, k_reciprocal: i64, trace_clamp: i64) -> i64 {
    let tr = t.trace().min(trace_clamp);
    t.det() - tr * tr / k_reciprocal
}

/// Noble response `det / trace`, never dividing by zero.
#[inline]
pub fn noble_score(t: &StructureTensor) -> i64 {
    let det = t.det();
    let tr = t.trace();
    if tr > 0 {
        det / tr
    } else if det > 65 {
        65_335
    } else if det > 0 {
        det * 1000
    } else {
        0
    }
}

#[inline]
fn saturate_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

// ---------------------------------------------------------------------------
// CornerDetector
// ---------------------------------------------------------------------------

/// Corner detector with reusable per-image scratch.
///
/// The gradient planes, the response map and the suppression mask are
/// owned here and only reallocated when the image size grows.
pub struct CornerDetector {
    config: CornerConfig,
    dx: Image<i32>,
    dy: Image<i32>,
    response: Image<i32>,
    mask: SuppressionMask,
}

impl CornerDetector {
    /// Create a detector. Fails with `InvalidConfig` on a bad config.
    pub fn new(config: CornerConfig) -> FlowResult<Self> {
        config.validate()?;
        Ok(CornerDetector {
            config,
            dx: Image::default(),
            dy: Image::default(),
            response: Image::default(),
            mask: SuppressionMask::new(),
        })
    }

    pub fn config(&self) -> &CornerConfig {
        &self.config
    }

    /// The response map of the last call. After `detect` this is the
    /// thresholded map the maxima were selected from.
    pub fn response(&self) -> &Image<i32> {
        &self.response
    }

    fn ensure_workspace(&mut self, luma: &Image<u8>) -> FlowResult<()> {
        let dims = luma.dims();
        if self.response.dims() != dims {
            debug!("corner workspace resized to {dims}");
        }
        self.dx.try_reshape(dims, "dx plane")?;
        self.dy.try_reshape(dims, "dy plane")?;
        self.response.try_reshape(dims, "response map")?;
        Ok(())
    }

    /// Compute the raw (unthresholded) response map for `luma`.
    pub fn compute_response(&mut self, luma: &Image<u8>) -> FlowResult<&Image<i32>> {
        self.ensure_workspace(luma)?;
        let w = luma.width();
        let h = luma.height();
        if w < 3 || h < 3 {
            return Ok(&self.response);
        }

        gradients_into(luma, &mut self.dx, &mut self.dy);

        let cfg = &self.config;
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let t = smoothed_tensor(
                    &self.dx,
                    &self.dy,
                    x,
                    y,
                    cfg.smoothing_pre_divisor,
                    cfg.smoothing_post_divisor,
                );
                let score = match cfg.score {
                    CornerScore::Harris => harris_score(&t, cfg.k_reciprocal, cfg.trace_clamp),
                    CornerScore::Noble => noble_score(&t),
                };
                self.response.set(x, y, saturate_i32(score));
            }
        }
        Ok(&self.response)
    }

    /// Detect up to `max_points` well-separated corners.
    pub fn detect(&mut self, luma: &Image<u8>) -> FlowResult<Vec<Point>> {
        self.compute_response(luma)?;
        let (max, threshold) = threshold_response(&mut self.response, self.config.threshold_ratio);
        let points = select_maxima(
            &self.response,
            &mut self.mask,
            self.config.max_points,
            self.config.suppression_distance,
        )?;
        debug!(
            "corner detection: {} points (max response {max}, threshold {threshold}, {} px suppressed)",
            points.len(),
            self.mask.excluded_count()
        );
        Ok(points)
    }

    /// `detect`, then paint the points into `luma` if `mark_points` is set.
    pub fn detect_and_mark(&mut self, luma: &mut Image<u8>) -> FlowResult<Vec<Point>> {
        let points = self.detect(luma)?;
        if self.config.mark_points {
            mark_points(luma, &points, MARK_VALUE);
        }
        Ok(points)
    }
}
