// config.rs - Tunable constants for detection, tracking and agent search.
//
// Every empirically tuned number of the pipeline lives here with its
// flight-tested default: the k reciprocal, the smoothing divisors, the
// max/5 threshold ratio, the divergence error scale, the agent step
// sizes. None of them is structural; changing one changes results, not
// control flow.
//
// Configs are plain data. `validate()` rejects values that would divide
// by zero or overflow the fixed-point arithmetic, and every component
// validates its config on construction.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};

/// Largest accepted subpixel factor. Bilinear weights reach
/// `factor² * 255`, which must stay inside i32.
pub const MAX_SUBPIXEL_FACTOR: i32 = 1024;

/// Half-width of the gradient patch the agent weight table was trained on.
pub const AGENT_WEIGHT_HALF_PATCH: usize = 2;

fn invalid(msg: impl Into<String>) -> FlowError {
    FlowError::InvalidConfig(msg.into())
}

// ---------------------------------------------------------------------------
// Corner detection
// ---------------------------------------------------------------------------

/// Corner score formula applied to the smoothed structure tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CornerScore {
    /// `det - min(trace, clamp)² / k`
    #[default]
    Harris,
    /// `det / trace`, with a clamped fallback for a zero trace.
    Noble,
}

/// Corner detector settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CornerConfig {
    /// Maximum number of points returned per call.
    pub max_points: usize,
    /// Half-width of the exclusion square around an accepted point.
    pub suppression_distance: usize,
    pub score: CornerScore,
    /// Reciprocal of the Harris sensitivity (25 ~ k = 0.04).
    pub k_reciprocal: i64,
    /// Upper clamp on the trace before it is squared in the Harris term.
    pub trace_clamp: i64,
    /// Divisor applied to each gradient product before kernel weighting.
    pub smoothing_pre_divisor: i32,
    /// Divisor applied to the weighted 3x3 sum.
    pub smoothing_post_divisor: i32,
    /// Scores below `max / threshold_ratio` are discarded.
    pub threshold_ratio: i32,
    /// Paint accepted points into the plane (debug overlay).
    pub mark_points: bool,
}

impl Default for CornerConfig {
    fn default() -> Self {
        CornerConfig {
            max_points: 25,
            suppression_distance: 3,
            score: CornerScore::Harris,
            k_reciprocal: 25,
            trace_clamp: 255,
            smoothing_pre_divisor: 14,
            smoothing_post_divisor: 255,
            threshold_ratio: 5,
            mark_points: false,
        }
    }
}

impl CornerConfig {
    pub fn validate(&self) -> FlowResult<()> {
        if self.max_points == 0 {
            return Err(invalid("max_points must be > 0"));
        }
        if self.k_reciprocal <= 0 {
            return Err(invalid("k_reciprocal must be > 0"));
        }
        if self.trace_clamp < 0 {
            return Err(invalid("trace_clamp must be >= 0"));
        }
        if self.smoothing_pre_divisor <= 0 || self.smoothing_post_divisor <= 0 {
            return Err(invalid("smoothing divisors must be > 0"));
        }
        if self.threshold_ratio <= 0 {
            return Err(invalid("threshold_ratio must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Lucas-Kanade tracker settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackerConfig {
    /// Patch is `2 * half_window_size + 1` pixels square.
    pub half_window_size: usize,
    pub max_iterations: u32,
    /// Fixed-point scale: one coordinate unit is `1 / subpixel_factor` px.
    pub subpixel_factor: i32,
    /// Iteration stops once `|step_x| + |step_y|` falls below this
    /// (subpixel units).
    pub step_threshold: i64,
    /// Per-pixel residual scale of the divergence guard. The guard fires
    /// when `error > error_scale² * patch_size²` past half the iterations.
    pub error_scale: i64,
    /// Divisor bounding the structure tensor and mismatch vector sums.
    pub tensor_divisor: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            half_window_size: 5,
            max_iterations: 10,
            subpixel_factor: 10,
            step_threshold: 2,
            error_scale: 25,
            tensor_divisor: 255,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> FlowResult<()> {
        if self.half_window_size == 0 {
            return Err(invalid("half_window_size must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be > 0"));
        }
        if self.subpixel_factor <= 0 || self.subpixel_factor > MAX_SUBPIXEL_FACTOR {
            return Err(invalid(format!(
                "subpixel_factor must be in 1..={MAX_SUBPIXEL_FACTOR}, got {}",
                self.subpixel_factor
            )));
        }
        if self.step_threshold < 0 || self.error_scale < 0 {
            return Err(invalid("step_threshold and error_scale must be >= 0"));
        }
        if self.tensor_divisor <= 0 {
            return Err(invalid("tensor_divisor must be > 0"));
        }
        Ok(())
    }

    /// Side length of the tracking patch.
    #[inline]
    pub fn patch_size(&self) -> usize {
        2 * self.half_window_size + 1
    }

    /// Squared-residual bound of the divergence guard.
    pub fn divergence_limit(&self) -> i64 {
        let n = self.patch_size() as i64;
        self.error_scale * self.error_scale * n * n
    }
}

// ---------------------------------------------------------------------------
// Agent search
// ---------------------------------------------------------------------------

/// Grid-of-agents point search settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgentConfig {
    /// Agents start on a `grid_rows x grid_rows` grid.
    pub grid_rows: usize,
    /// Inset of the starting grid from the image border, pixels.
    pub border: usize,
    /// Agent positions are kept in `1 / resolution` pixel units.
    pub resolution: i32,
    /// Displacement per unit action, in pixels.
    pub max_jump: i32,
    /// Sensed gradient patch is `2 * half_patch + 1` square.
    pub half_patch: usize,
    pub time_steps: usize,
    /// Return only the agents that chose to stop.
    pub only_stopped: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            grid_rows: 5,
            border: 10,
            resolution: 100,
            max_jump: 10,
            half_patch: AGENT_WEIGHT_HALF_PATCH,
            time_steps: 20,
            only_stopped: false,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> FlowResult<()> {
        if self.grid_rows < 2 {
            return Err(invalid("grid_rows must be >= 2"));
        }
        if self.resolution <= 0 || self.resolution > 25_500 {
            return Err(invalid("resolution must be in 1..=25500"));
        }
        // Actions reach +-resolution, so one move is at most
        // resolution * max_jump units and must leave headroom in i32.
        if self.max_jump <= 0 || self.max_jump > i32::MAX / (2 * self.resolution) {
            return Err(invalid(format!(
                "max_jump must be in 1..={}, got {}",
                i32::MAX / (2 * self.resolution),
                self.max_jump
            )));
        }
        if self.half_patch != AGENT_WEIGHT_HALF_PATCH {
            return Err(invalid(format!(
                "half_patch must be {AGENT_WEIGHT_HALF_PATCH} to match the weight table"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Frontend
// ---------------------------------------------------------------------------

/// Which strategy produces the points to track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PointSourceConfig {
    Corners(CornerConfig),
    Agents(AgentConfig),
}

impl Default for PointSourceConfig {
    fn default() -> Self {
        PointSourceConfig::Corners(CornerConfig::default())
    }
}

impl PointSourceConfig {
    pub fn validate(&self) -> FlowResult<()> {
        match self {
            PointSourceConfig::Corners(c) => c.validate(),
            PointSourceConfig::Agents(a) => a.validate(),
        }
    }
}

/// Detect-then-track configuration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrontendConfig {
    pub point_source: PointSourceConfig,
    pub tracker: TrackerConfig,
}

impl FrontendConfig {
    pub fn validate(&self) -> FlowResult<()> {
        self.point_source.validate()?;
        self.tracker.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(CornerConfig::default().validate().is_ok());
        assert!(TrackerConfig::default().validate().is_ok());
        assert!(AgentConfig::default().validate().is_ok());
        assert!(FrontendConfig::default().validate().is_ok());
    }

    #[test]
    fn test_divergence_limit_default() {
        // 25² per pixel over an 11x11 patch.
        assert_eq!(TrackerConfig::default().divergence_limit(), 625 * 121);
    }

    #[test]
    fn test_rejects_zero_divisors() {
        let c = CornerConfig {
            k_reciprocal: 0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(FlowError::InvalidConfig(_))));

        let t = TrackerConfig {
            subpixel_factor: 0,
            ..Default::default()
        };
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("subpixel_factor"), "got: {err}");
    }

    #[test]
    fn test_rejects_oversized_factor() {
        let t = TrackerConfig {
            subpixel_factor: MAX_SUBPIXEL_FACTOR + 1,
            ..Default::default()
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_agent_grid_needs_two_rows() {
        let a = AgentConfig {
            grid_rows: 1,
            ..Default::default()
        };
        assert!(a.validate().is_err());
        let a = AgentConfig {
            half_patch: 3,
            ..Default::default()
        };
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_frontend_validates_both_halves() {
        let cfg = FrontendConfig {
            point_source: PointSourceConfig::Agents(AgentConfig {
                resolution: 0,
                ..Default::default()
            }),
            tracker: TrackerConfig::default(),
        };
        assert!(cfg.validate().is_err());
    }
}
