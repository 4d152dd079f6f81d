// mav-flow: fixed-point corner detection and Lucas-Kanade optical flow
// for small autopilots.
//
// Integer-only, single-threaded, one frame pair per call. Image size is
// passed with every plane; there is no global state.

pub mod error;
pub mod image;
pub mod convert;
pub mod config;
pub mod gradient;
pub mod nms;
pub mod harris;
pub mod subpixel;
pub mod klt;
pub mod agents;
pub mod frontend;

pub use config::{
    AgentConfig, CornerConfig, CornerScore, FrontendConfig, PointSourceConfig, TrackerConfig,
};
pub use error::{FlowError, FlowResult};
pub use frontend::{FlowFrame, FlowFrontend, FlowStats, PointSource};
pub use harris::CornerDetector;
pub use image::{Dimensions, Image, Point};
pub use klt::{KltTracker, LossReason, TrackResult, TrackStatus};
