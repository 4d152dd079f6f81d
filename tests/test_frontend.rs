// tests/test_frontend.rs - End-to-end detect-then-track tests.

use mav_flow::config::{CornerConfig, CornerScore, FrontendConfig, PointSourceConfig, TrackerConfig};
use mav_flow::convert::luma_from_uyvy;
use mav_flow::frontend::point_source_from_config;
use mav_flow::image::{Dimensions, Image, Point};
use mav_flow::klt::{to_status_arrays, track_points};
use mav_flow::{FlowFrontend, PointSource};

const W: usize = 160;
const H: usize = 120;

/// Six bright rectangles `(x, y, w, h, value)` on a dark background.
const RECTS: [(usize, usize, usize, usize, u8); 6] = [
    (30, 25, 20, 20, 200),
    (70, 20, 25, 15, 180),
    (110, 30, 18, 22, 210),
    (25, 65, 22, 25, 190),
    (75, 60, 30, 20, 170),
    (115, 70, 20, 18, 205),
];

fn make_scene(sx: usize, sy: usize) -> Image<u8> {
    let mut img = Image::from_vec(W, H, vec![25u8; W * H]);
    for &(rx, ry, rw, rh, val) in &RECTS {
        for y in ry + sy..(ry + sy + rh).min(H) {
            for x in rx + sx..(rx + sx + rw).min(W) {
                img.set(x, y, val);
            }
        }
    }
    img
}

/// Pack a luma plane as UYVY with both Y samples equal to the pixel.
fn to_uyvy(img: &Image<u8>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(img.width() * img.height() * 2);
    for y in 0..img.height() {
        for x in (0..img.width()).step_by(2) {
            buf.extend_from_slice(&[128, img.get(x, y), 128, img.get(x + 1, y)]);
        }
    }
    buf
}

#[test]
fn noble_frontend_tracks_every_corner() {
    let cfg = FrontendConfig {
        point_source: PointSourceConfig::Corners(CornerConfig {
            score: CornerScore::Noble,
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut fe = FlowFrontend::new(cfg).unwrap();
    let frame = fe.process(&make_scene(0, 0), &make_scene(2, 1)).unwrap();
    assert_eq!(frame.stats.detected, 24);
    assert_eq!(frame.stats.tracked, 24);
    assert!((frame.stats.mean_flow_x - 20).abs() <= 4, "{:?}", frame.stats);
    assert!((frame.stats.mean_flow_y - 10).abs() <= 4, "{:?}", frame.stats);
}

#[test]
fn camera_frames_through_uyvy() {
    let dims = Dimensions::new(W, H);
    let old = luma_from_uyvy(&to_uyvy(&make_scene(0, 0)), dims).unwrap();
    let new = luma_from_uyvy(&to_uyvy(&make_scene(2, 1)), dims).unwrap();

    let mut fe = FlowFrontend::new(FrontendConfig::default()).unwrap();
    let frame = fe.process(&old, &new).unwrap();
    assert!(frame.stats.detected >= 8, "{:?}", frame.stats);
    assert_eq!(frame.stats.lost, 0, "{:?}", frame.stats);
    assert!((frame.stats.mean_flow_x - 20).abs() <= 4, "{:?}", frame.stats);
    assert!((frame.stats.mean_flow_y - 10).abs() <= 4, "{:?}", frame.stats);
}

#[test]
fn frontend_is_reusable_across_calls() {
    let a = make_scene(0, 0);
    let b = make_scene(2, 1);
    let mut fe = FlowFrontend::new(FrontendConfig::default()).unwrap();
    let first = fe.process(&a, &b).unwrap();
    let _ = fe.process(&b, &a).unwrap();
    let third = fe.process(&a, &b).unwrap();
    assert_eq!(first, third);
}

#[test]
fn frontend_matches_manual_pipeline() {
    let a = make_scene(0, 0);
    let b = make_scene(2, 1);

    let mut source = point_source_from_config(&PointSourceConfig::default()).unwrap();
    assert_eq!(source.name(), "corners");
    let points = source.find_points(&a).unwrap();
    let results = track_points(&a, &b, &points, TrackerConfig::default()).unwrap();

    let frame = FlowFrontend::new(FrontendConfig::default())
        .unwrap()
        .process(&a, &b)
        .unwrap();
    assert_eq!(frame.points, points);
    assert_eq!(frame.results, results);

    let (xs, ys, status) = to_status_arrays(&results).unwrap();
    assert_eq!(xs.len(), points.len());
    for (i, r) in results.iter().enumerate() {
        assert_eq!(Point::new(xs[i], ys[i]), r.position);
        assert_eq!(status[i], 1);
    }
}

#[test]
fn invalid_config_fails_construction() {
    let cfg = FrontendConfig {
        tracker: TrackerConfig {
            max_iterations: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(FlowFrontend::new(cfg).is_err());
}
