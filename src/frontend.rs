// frontend.rs - Detect-then-track over one frame pair.
//
// The perception loop hands over two luma planes and gets back, for every
// point found in the old one, where it went in the new one:
//
//   1. A point source picks candidate points in the OLD frame
//      (Harris/Noble maxima or the agent search, chosen by config).
//   2. The KLT tracker follows each candidate into the NEW frame.
//   3. Summary statistics: detected / tracked / lost counts and the mean
//      flow of the tracked points.
//
// Nothing carries over between calls apart from scratch buffers: points
// are re-detected every frame pair, and lost points simply fail to show
// up next time.
//
// Point sources sit behind the `PointSource` trait so strategies can be
// swapped at runtime (`Box<dyn PointSource>`) without touching the
// tracking half.

use log::debug;

use crate::agents::ActiveCornerSearch;
use crate::config::{FrontendConfig, PointSourceConfig, TrackerConfig};
use crate::error::FlowResult;
use crate::harris::CornerDetector;
use crate::image::{Image, Point};
use crate::klt::{KltTracker, TrackResult};

/// Anything that can pick trackable points from a luma plane.
pub trait PointSource: Send {
    /// Candidate points, in the source's own order.
    fn find_points(&mut self, luma: &Image<u8>) -> FlowResult<Vec<Point>>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

impl PointSource for CornerDetector {
    fn find_points(&mut self, luma: &Image<u8>) -> FlowResult<Vec<Point>> {
        self.detect(luma)
    }

    fn name(&self) -> &'static str {
        "corners"
    }
}

impl PointSource for ActiveCornerSearch {
    fn find_points(&mut self, luma: &Image<u8>) -> FlowResult<Vec<Point>> {
        self.search(luma)
    }

    fn name(&self) -> &'static str {
        "agents"
    }
}

/// Build the point source selected by `config`.
pub fn point_source_from_config(config: &PointSourceConfig) -> FlowResult<Box<dyn PointSource>> {
    Ok(match config {
        PointSourceConfig::Corners(c) => Box::new(CornerDetector::new(c.clone())?),
        PointSourceConfig::Agents(a) => Box::new(ActiveCornerSearch::new(a.clone())?),
    })
}

/// Per-call summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowStats {
    /// Points produced by the point source.
    pub detected: usize,
    pub tracked: usize,
    pub lost: usize,
    /// Mean flow over tracked points, subpixel units (0 if none).
    pub mean_flow_x: i32,
    pub mean_flow_y: i32,
}

impl FlowStats {
    /// Summarise a result list.
    pub fn from_results(results: &[TrackResult]) -> Self {
        let mut stats = FlowStats {
            detected: results.len(),
            ..Default::default()
        };
        let (mut sx, mut sy) = (0i64, 0i64);
        for r in results {
            if r.status.is_tracked() {
                stats.tracked += 1;
                sx += r.flow_x as i64;
                sy += r.flow_y as i64;
            } else {
                stats.lost += 1;
            }
        }
        if stats.tracked > 0 {
            stats.mean_flow_x = (sx / stats.tracked as i64) as i32;
            stats.mean_flow_y = (sy / stats.tracked as i64) as i32;
        }
        stats
    }
}

/// Output of one `process` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowFrame {
    /// Seed points found in the old frame.
    pub points: Vec<Point>,
    /// One result per seed, same order.
    pub results: Vec<TrackResult>,
    pub stats: FlowStats,
}

impl FlowFrame {
    /// Results of the points that were tracked.
    pub fn tracked(&self) -> impl Iterator<Item = &TrackResult> + '_ {
        self.results.iter().filter(|r| r.status.is_tracked())
    }
}

/// Point source plus tracker.
pub struct FlowFrontend {
    source: Box<dyn PointSource>,
    tracker: KltTracker,
}

impl FlowFrontend {
    pub fn new(config: FrontendConfig) -> FlowResult<Self> {
        config.validate()?;
        Ok(FlowFrontend {
            source: point_source_from_config(&config.point_source)?,
            tracker: KltTracker::new(config.tracker)?,
        })
    }

    /// Use a caller-supplied point source.
    pub fn with_source(source: Box<dyn PointSource>, tracker: TrackerConfig) -> FlowResult<Self> {
        Ok(FlowFrontend {
            source,
            tracker: KltTracker::new(tracker)?,
        })
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn tracker(&self) -> &KltTracker {
        &self.tracker
    }

    /// Find points in `old` and track them into `new`.
    pub fn process(&mut self, old: &Image<u8>, new: &Image<u8>) -> FlowResult<FlowFrame> {
        let points = self.source.find_points(old)?;
        let results = self.tracker.track(old, new, &points)?;
        let stats = FlowStats::from_results(&results);
        debug!(
            "{}: {} detected, {} tracked, mean flow ({}, {})",
            self.source.name(),
            stats.detected,
            stats.tracked,
            stats.mean_flow_x,
            stats.mean_flow_y
        );
        Ok(FlowFrame {
            points,
            results,
            stats,
        })
    }
}
