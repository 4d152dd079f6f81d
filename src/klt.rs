// klt.rs - Single-level fixed-point Lucas-Kanade tracker.
//
// Every seed point is tracked independently from the old frame into the
// new one. Coordinates are in subpixel units (1/f pixel, f = 10 by
// default).
//
// Per point:
//   1. p = seed * f. If p is within (hw + 1) pixels of a border the point
//      is lost at once: nothing is sampled and no iteration runs.
//   2. Sample the padded (2hw + 3)^2 neighbourhood of p from the OLD frame.
//      Its inner (2hw + 1)^2 part is the template I; central differences
//      inside the padded patch give DX and DY.
//   3. G = [sum DX^2, sum DX*DY; sum DX*DY, sum DY^2] / 255
//      Det = (G0*G3 - G1*G2) / f
//      Det < 1 means a textureless or degenerate window: lost.
//   4. v = 0. While it < max_iterations and the last |step|_1 >= 2:
//        a. p + v must still be inside the border margin, else lost.
//        b. J = patch of the NEW frame at p + v.
//        c. diff = I - J, error = sum diff^2.
//        d. error > 25^2 * patch_size^2 past half the iterations: lost.
//        e. b = (sum diff*DX, sum diff*DY) / 255
//        f. step = (G3*bx - G1*by, G0*by - G2*bx) / Det   (Cramer)
//        g. v += step
//   5. Result position = (p + v) / f.
//
// DX is twice the true derivative (the [-1 0 1] mask is not halved), so
// each step covers roughly half of the remaining residual. The loop
// converges geometrically and stops once the step drops under 0.2 px.
//
// The tensor, determinant and mismatch products are formed in i64:
// with 8-bit luma and an 11x11 window G0*G3 already exceeds i32.
//
// Per-point loss is reported in the result, never as an error. Only a
// frame size mismatch or scratch allocation failure fails the call.

use log::{debug, trace};

use crate::config::TrackerConfig;
use crate::error::{try_alloc, try_resize, try_with_capacity, FlowError, FlowResult};
use crate::gradient::{patch_gradients, patch_interior};
use crate::harris::StructureTensor;
use crate::image::{Dimensions, Image, Point};
use crate::subpixel::{sample_patch, SubpixelPoint};

/// Why a point was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LossReason {
    /// Seed or estimate within `half_window_size + 1` px of a border.
    NearBorder,
    /// `Det < 1`: the window has no usable texture.
    IllConditioned,
    /// Residual stayed above the divergence bound late in the iteration.
    Diverged,
}

/// Outcome of tracking one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackStatus {
    Tracked,
    Lost(LossReason),
}

impl TrackStatus {
    #[inline]
    pub fn is_tracked(&self) -> bool {
        matches!(self, TrackStatus::Tracked)
    }

    /// Status flag for flat status arrays: 1 = tracked, 0 = lost.
    #[inline]
    pub fn flag(&self) -> u8 {
        self.is_tracked() as u8
    }
}

/// Per-point tracking result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackResult {
    /// Refined position, whole pixels.
    pub position: Point,
    /// Accumulated displacement, subpixel units.
    pub flow_x: i32,
    pub flow_y: i32,
    /// Completed refinement iterations (0 if rejected before iterating).
    pub iterations: u32,
    pub status: TrackStatus,
}

/// Structure tensor of a gradient patch, each sum divided by `divisor`.
pub fn patch_tensor(dx: &[i32], dy: &[i32], divisor: i64) -> StructureTensor {
    let (mut xx, mut xy, mut yy) = (0i64, 0i64, 0i64);
    for (&gx, &gy) in dx.iter().zip(dy) {
        let (gx, gy) = (gx as i64, gy as i64);
        xx += gx * gx;
        xy += gx * gy;
        yy += gy * gy;
    }
    StructureTensor::new(xx / divisor, xy / divisor, yy / divisor)
}

#[inline]
fn saturate_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Patch buffers reused across points and calls.
#[derive(Debug, Default)]
struct PatchScratch {
    padded: Vec<i32>,
    template: Vec<i32>,
    warped: Vec<i32>,
    dx: Vec<i32>,
    dy: Vec<i32>,
}

impl PatchScratch {
    fn resize(&mut self, half_window: usize) -> FlowResult<()> {
        let n = (2 * half_window + 1) * (2 * half_window + 1);
        let np = (2 * half_window + 3) * (2 * half_window + 3);
        if np > self.padded.capacity() {
            debug!("tracker scratch grows to {np} padded / {n} patch samples");
        }
        try_resize(&mut self.padded, np, 0, "padded patch")?;
        try_resize(&mut self.template, n, 0, "template patch")?;
        try_resize(&mut self.warped, n, 0, "warped patch")?;
        try_resize(&mut self.dx, n, 0, "dx patch")?;
        try_resize(&mut self.dy, n, 0, "dy patch")?;
        Ok(())
    }
}

/// Lucas-Kanade tracker with reusable patch scratch.
pub struct KltTracker {
    config: TrackerConfig,
    scratch: PatchScratch,
}

impl KltTracker {
    /// Create a tracker, sizing the patch scratch for the window.
    pub fn new(config: TrackerConfig) -> FlowResult<Self> {
        config.validate()?;
        let mut scratch = PatchScratch::default();
        scratch.resize(config.half_window_size)?;
        Ok(KltTracker { config, scratch })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Replace the configuration. Scratch only grows if the window does.
    pub fn set_config(&mut self, config: TrackerConfig) -> FlowResult<()> {
        config.validate()?;
        self.scratch.resize(config.half_window_size)?;
        self.config = config;
        Ok(())
    }

    /// Track `seeds` from `old` into `new`. Returns one result per seed,
    /// in order.
    pub fn track(
        &mut self,
        old: &Image<u8>,
        new: &Image<u8>,
        seeds: &[Point],
    ) -> FlowResult<Vec<TrackResult>> {
        if old.dims() != new.dims() {
            return Err(FlowError::DimensionMismatch {
                old: old.dims(),
                new: new.dims(),
            });
        }

        let mut results = try_with_capacity(seeds.len(), "track results")?;
        for &seed in seeds {
            let r = self.track_point(old, new, seed);
            if let TrackStatus::Lost(reason) = r.status {
                trace!(
                    "point ({}, {}) lost: {reason:?} after {} iterations",
                    seed.x,
                    seed.y,
                    r.iterations
                );
            }
            results.push(r);
        }

        let tracked = results.iter().filter(|r| r.status.is_tracked()).count();
        debug!(
            "tracked {tracked} of {} points ({} lost)",
            results.len(),
            results.len() - tracked
        );
        Ok(results)
    }

    /// True if the subpixel position keeps the padded window inside the
    /// plane with one pixel to spare.
    #[inline]
    fn in_bounds(&self, x: i64, y: i64, dims: Dimensions) -> bool {
        let f = self.config.subpixel_factor as i64;
        let margin = (self.config.half_window_size as i64 + 1) * f;
        let max_x = (dims.width as i64 - 1) * f - margin;
        let max_y = (dims.height as i64 - 1) * f - margin;
        x > margin && x < max_x && y > margin && y < max_y
    }

    fn track_point(&mut self, old: &Image<u8>, new: &Image<u8>, seed: Point) -> TrackResult {
        let cfg = &self.config;
        let f = cfg.subpixel_factor;
        let hw = cfg.half_window_size;
        let dims = old.dims();
        // Seed in subpixel units; i64 so far-off seeds cannot wrap.
        let (ox, oy) = (seed.x as i64 * f as i64, seed.y as i64 * f as i64);

        let lost = |reason, vx: i64, vy: i64, iterations| {
            let x = ox + vx;
            let y = oy + vy;
            TrackResult {
                position: Point::new(saturate_i32(x / f as i64), saturate_i32(y / f as i64)),
                flow_x: saturate_i32(vx),
                flow_y: saturate_i32(vy),
                iterations,
                status: TrackStatus::Lost(reason),
            }
        };

        if !self.in_bounds(ox, oy, dims) {
            return lost(LossReason::NearBorder, 0, 0, 0);
        }
        let Some(p) = SubpixelPoint::from_pixel(seed, f) else {
            return lost(LossReason::NearBorder, 0, 0, 0);
        };

        // Template and its gradients from the old frame.
        let s = &mut self.scratch;
        sample_patch(old, p, hw + 1, f, &mut s.padded);
        patch_interior(&s.padded, hw, &mut s.template);
        patch_gradients(&s.padded, hw, &mut s.dx, &mut s.dy);

        let g = patch_tensor(&s.dx, &s.dy, cfg.tensor_divisor).as_matrix();
        let det = (g[0] * g[3] - g[1] * g[2]) / f as i64;
        if det < 1 {
            return lost(LossReason::IllConditioned, 0, 0, 0);
        }

        let divergence_limit = cfg.divergence_limit();
        let half_iterations = cfg.max_iterations / 2;
        let (mut vx, mut vy) = (0i64, 0i64);
        let mut it = 0u32;
        let mut step_size = cfg.step_threshold + 1;

        while it < cfg.max_iterations && step_size >= cfg.step_threshold {
            let cx = ox + vx;
            let cy = oy + vy;
            if !self.in_bounds(cx, cy, dims) {
                return lost(LossReason::NearBorder, vx, vy, it);
            }

            let s = &mut self.scratch;
            sample_patch(new, SubpixelPoint::new(cx as i32, cy as i32), hw, f, &mut s.warped);

            let (mut error, mut bx, mut by) = (0i64, 0i64, 0i64);
            for (((&i, &j), &gx), &gy) in s.template.iter().zip(&s.warped).zip(&s.dx).zip(&s.dy) {
                let diff = (i - j) as i64;
                error += diff * diff;
                bx += diff * gx as i64;
                by += diff * gy as i64;
            }
            if error > divergence_limit && it > half_iterations {
                return lost(LossReason::Diverged, vx, vy, it);
            }
            let bx = bx / cfg.tensor_divisor;
            let by = by / cfg.tensor_divisor;

            let step_x = (g[3] * bx - g[1] * by) / det;
            let step_y = (g[0] * by - g[2] * bx) / det;
            vx += step_x;
            vy += step_y;
            it += 1;
            step_size = step_x.abs() + step_y.abs();
        }

        let end = SubpixelPoint::new(saturate_i32(ox + vx), saturate_i32(oy + vy));
        TrackResult {
            position: end.to_pixel(f),
            flow_x: saturate_i32(vx),
            flow_y: saturate_i32(vy),
            iterations: it,
            status: TrackStatus::Tracked,
        }
    }
}

/// Allocate-and-track convenience for one-off calls.
pub fn track_points(
    old: &Image<u8>,
    new: &Image<u8>,
    seeds: &[Point],
    config: TrackerConfig,
) -> FlowResult<Vec<TrackResult>> {
    KltTracker::new(config)?.track(old, new, seeds)
}

/// Flatten results into the parallel `(x, y, status)` arrays used by flat
/// callers.
pub fn to_status_arrays(results: &[TrackResult]) -> FlowResult<(Vec<i32>, Vec<i32>, Vec<u8>)> {
    let mut xs = try_alloc(results.len(), 0, "x array")?;
    let mut ys = try_alloc(results.len(), 0, "y array")?;
    let mut st = try_alloc(results.len(), 0u8, "status array")?;
    for (i, r) in results.iter().enumerate() {
        xs[i] = r.position.x;
        ys[i] = r.position.y;
        st[i] = r.status.flag();
    }
    Ok((xs, ys, st))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth two-axis sinusoid, shifted by (sx, sy) pixels.
    fn make_wave(w: usize, h: usize, sx: f64, sy: f64) -> Image<u8> {
        let mut img = Image::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let v = 128.0
                    + 60.0 * ((x as f64 - sx) / 4.0).sin()
                    + 60.0 * ((y as f64 - sy) / 5.0).sin();
                img.set(x, y, v.round() as u8);
            }
        }
        img
    }

    fn tracker() -> KltTracker {
        KltTracker::new(TrackerConfig::default()).unwrap()
    }

    #[test]
    fn test_status_flag() {
        assert_eq!(TrackStatus::Tracked.flag(), 1);
        assert_eq!(TrackStatus::Lost(LossReason::Diverged).flag(), 0);
    }

    #[test]
    fn test_patch_tensor_symmetric() {
        let dx = [3, -1, 2];
        let dy = [1, 4, -2];
        let t = patch_tensor(&dx, &dy, 1);
        assert_eq!(t.as_matrix(), [14, -5, -5, 21]);
    }

    #[test]
    fn test_identical_frames() {
        let img = make_wave(64, 48, 0.0, 0.0);
        let mut klt = tracker();
        let res = klt.track(&img, &img, &[Point::new(30, 20)]).unwrap();
        let r = res[0];
        assert_eq!(r.status, TrackStatus::Tracked);
        assert_eq!((r.flow_x, r.flow_y), (0, 0));
        assert_eq!(r.iterations, 1);
        assert_eq!(r.position, Point::new(30, 20));
    }

    #[test]
    fn test_known_shift() {
        let old = make_wave(64, 48, 0.0, 0.0);
        let new = make_wave(64, 48, 2.0, 1.0);
        let mut klt = tracker();
        let res = klt.track(&old, &new, &[Point::new(30, 20)]).unwrap();
        let r = res[0];
        assert!(r.status.is_tracked(), "status {:?}", r.status);
        assert!((r.flow_x - 20).abs() <= 6, "flow_x = {}", r.flow_x);
        assert!((r.flow_y - 10).abs() <= 6, "flow_y = {}", r.flow_y);
        assert!((r.position.x - 32).abs() <= 1 && (r.position.y - 21).abs() <= 1);
    }

    #[test]
    fn test_border_seed_not_iterated() {
        let img = make_wave(64, 48, 0.0, 0.0);
        let mut klt = tracker();
        // hw = 5: margin is 6 px on every side.
        let seeds = [
            Point::new(6, 20),
            Point::new(57, 20),
            Point::new(30, 3),
            Point::new(30, 41),
        ];
        for r in klt.track(&img, &img, &seeds).unwrap() {
            assert_eq!(r.status, TrackStatus::Lost(LossReason::NearBorder));
            assert_eq!(r.iterations, 0);
            assert_eq!((r.flow_x, r.flow_y), (0, 0));
        }
        // First interior positions on both sides.
        let res = klt.track(&img, &img, &[Point::new(7, 7), Point::new(56, 40)]).unwrap();
        assert!(res.iter().all(|r| r.status.is_tracked()));
    }

    #[test]
    fn test_flat_patch_ill_conditioned() {
        let img = Image::from_vec(40, 40, vec![90u8; 1600]);
        let mut klt = tracker();
        let r = klt.track(&img, &img, &[Point::new(20, 20)]).unwrap()[0];
        assert_eq!(r.status, TrackStatus::Lost(LossReason::IllConditioned));
        assert_eq!(r.iterations, 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = Image::<u8>::new(20, 20);
        let b = Image::<u8>::new(20, 21);
        let err = tracker().track(&a, &b, &[]).unwrap_err();
        assert!(matches!(err, FlowError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_empty_seed_list() {
        let img = make_wave(32, 32, 0.0, 0.0);
        assert!(tracker().track(&img, &img, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_status_arrays() {
        let img = make_wave(64, 48, 0.0, 0.0);
        let res = track_points(
            &img,
            &img,
            &[Point::new(30, 20), Point::new(1, 1)],
            TrackerConfig::default(),
        )
        .unwrap();
        let (xs, ys, st) = to_status_arrays(&res).unwrap();
        assert_eq!(xs, vec![30, 1]);
        assert_eq!(ys, vec![20, 1]);
        assert_eq!(st, vec![1, 0]);
    }

    #[test]
    fn test_set_config_resizes_scratch() {
        let img = make_wave(64, 48, 0.0, 0.0);
        let mut klt = tracker();
        klt.set_config(TrackerConfig {
            half_window_size: 3,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(klt.config().patch_size(), 7);
        let r = klt.track(&img, &img, &[Point::new(5, 20)]).unwrap()[0];
        // margin is now 4 px, so x = 5 is inside.
        assert!(r.status.is_tracked());
        assert!(klt
            .set_config(TrackerConfig {
                subpixel_factor: 0,
                ..Default::default()
            })
            .is_err());
    }
}
