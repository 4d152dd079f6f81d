// demos/track_synthetic.rs
//
// Run the mav-flow frontend on a synthetic drifting scene and print
// per-frame flow statistics.
//
// Usage:
//   cargo run --example track_synthetic --release -- [frames] [corners|agents]
//
// The scene is six bright rectangles on a dark background, moving by
// (2, 1) pixels per frame. With the default tracker (subpixel factor 10)
// the mean flow should come out close to (20, 10).
//
// Set RUST_LOG=debug to see the detector and tracker logs.

use mav_flow::config::{AgentConfig, FrontendConfig, PointSourceConfig};
use mav_flow::image::{mark_points, Image};
use mav_flow::FlowFrontend;

use std::env;

const W: usize = 160;
const H: usize = 120;

const RECTS: [(usize, usize, usize, usize, u8); 6] = [
    (10, 25, 20, 20, 200),
    (50, 20, 25, 15, 180),
    (90, 30, 18, 22, 210),
    (5, 65, 22, 25, 190),
    (55, 60, 30, 20, 170),
    (95, 70, 20, 18, 205),
];

fn make_scene(frame: usize) -> Image<u8> {
    let (sx, sy) = (2 * frame, frame);
    let mut img = Image::from_vec(W, H, vec![25u8; W * H]);
    for &(rx, ry, rw, rh, val) in &RECTS {
        for y in (ry + sy).min(H)..(ry + sy + rh).min(H) {
            for x in (rx + sx).min(W)..(rx + sx + rw).min(W) {
                img.set(x, y, val);
            }
        }
    }
    img
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let n_frames: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10);
    let point_source = match args.get(2).map(String::as_str) {
        None | Some("corners") => PointSourceConfig::default(),
        Some("agents") => PointSourceConfig::Agents(AgentConfig::default()),
        Some(other) => {
            eprintln!("Unknown point source {other:?}; expected corners or agents");
            std::process::exit(1);
        }
    };

    let config = FrontendConfig {
        point_source,
        ..Default::default()
    };
    let mut frontend = match FlowFrontend::new(config) {
        Ok(fe) => fe,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Point source: {}", frontend.source_name());
    println!("{:>5} {:>8} {:>8} {:>6} {:>10} {:>10}", "frame", "detected", "tracked", "lost", "flow_x", "flow_y");

    let mut prev = make_scene(0);
    let mut last_points = Vec::new();
    for i in 1..n_frames {
        let next = make_scene(i);
        let frame = match frontend.process(&prev, &next) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("frame {i}: {e}");
                std::process::exit(1);
            }
        };
        let s = frame.stats;
        println!(
            "{:>5} {:>8} {:>8} {:>6} {:>10} {:>10}",
            i, s.detected, s.tracked, s.lost, s.mean_flow_x, s.mean_flow_y
        );
        last_points = frame.tracked().map(|r| r.position).collect();
        prev = next;
    }

    // ASCII preview of the last frame with tracked points marked.
    mark_points(&mut prev, &last_points, 0);
    println!();
    for y in (0..H).step_by(6) {
        let line: String = (0..W)
            .step_by(3)
            .map(|x| match prev.get(x, y) {
                0 => '+',
                v if v > 100 => '#',
                _ => '.',
            })
            .collect();
        println!("{line}");
    }
}
