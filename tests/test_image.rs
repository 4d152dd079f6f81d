// tests/test_image.rs - Integration tests for planes, conversion and overlays.

use mav_flow::convert::{luma_from_gray, luma_from_uyvy, UYVY_BYTES_PER_PIXEL};
use mav_flow::image::{mark_points, Dimensions, Image, Point};
use mav_flow::config::CornerConfig;
use mav_flow::harris::{CornerDetector, MARK_VALUE};
use mav_flow::FlowError;

// ===== Image basics =====

#[test]
fn row_major_layout() {
    let img = Image::from_vec(3, 2, vec![1u8, 2, 3, 4, 5, 6]);
    assert_eq!(img.dims(), Dimensions::new(3, 2));
    assert_eq!(img.get(2, 0), 3);
    assert_eq!(img.get(0, 1), 4);
    assert_eq!(img.row(1), &[4, 5, 6]);
    assert_eq!(img[(1, 1)], 5);
}

#[test]
fn clamped_reads_replicate_edges() {
    let img = Image::from_vec(3, 2, vec![1u8, 2, 3, 4, 5, 6]);
    assert_eq!(img.get_clamped(-5, -5), 1);
    assert_eq!(img.get_clamped(10, 0), 3);
    assert_eq!(img.get_clamped(1, 9), 5);
    assert_eq!(img.get_clamped(99, 99), 6);
}

#[test]
fn length_mismatch_is_an_error() {
    let err = Image::try_from_vec(4, 4, vec![0u8; 15]).unwrap_err();
    assert_eq!(
        err,
        FlowError::InvalidPlane {
            width: 4,
            height: 4,
            len: 15
        }
    );
}

#[test]
fn max_value_of_empty_plane() {
    assert_eq!(Image::<i32>::new(0, 0).max_value(), None);
    let img = Image::from_vec(2, 2, vec![-4i32, 9, 0, 3]);
    assert_eq!(img.max_value(), Some(9));
}

// ===== UYVY conversion =====

#[test]
fn uyvy_luma_averages_macro_pixel() {
    let dims = Dimensions::new(4, 2);
    // U Y1 V Y2 per macro-pixel.
    let buf = [
        128, 10, 128, 20, 128, 255, 128, 254, //
        0, 0, 0, 1, 7, 100, 7, 100,
    ];
    assert_eq!(buf.len(), dims.area() * UYVY_BYTES_PER_PIXEL);
    let luma = luma_from_uyvy(&buf, dims).unwrap();
    assert_eq!(luma.as_slice(), &[15, 15, 254, 254, 0, 0, 100, 100]);
}

#[test]
fn uyvy_rejects_bad_buffers() {
    assert!(matches!(
        luma_from_uyvy(&[0; 15], Dimensions::new(4, 2)),
        Err(FlowError::InvalidPlane { len: 15, .. })
    ));
    // Odd width: macro-pixels would straddle rows.
    assert!(luma_from_uyvy(&[0; 18], Dimensions::new(3, 3)).is_err());
}

#[test]
fn gray_copies_buffer() {
    let buf: Vec<u8> = (0..12).collect();
    let luma = luma_from_gray(&buf, Dimensions::new(4, 3)).unwrap();
    assert_eq!(luma.get(3, 2), 11);
    assert!(luma_from_gray(&buf, Dimensions::new(5, 3)).is_err());
}

// ===== Overlay =====

#[test]
fn detector_marks_accepted_corners() {
    let mut img = Image::from_vec(40, 40, vec![20u8; 1600]);
    for y in 10..25 {
        for x in 12..30 {
            img.set(x, y, 200);
        }
    }
    let cfg = CornerConfig {
        mark_points: true,
        ..Default::default()
    };
    let mut det = CornerDetector::new(cfg).unwrap();
    let pts = det.detect_and_mark(&mut img).unwrap();
    assert!(!pts.is_empty());
    for p in &pts {
        for dy in -1..=1 {
            for dx in -1..=1 {
                assert_eq!(img.get((p.x + dx) as usize, (p.y + dy) as usize), MARK_VALUE);
            }
        }
    }
}

#[test]
fn marking_leaves_border_points_alone() {
    let mut img = Image::from_vec(5, 5, vec![1u8; 25]);
    mark_points(&mut img, &[Point::new(0, 0), Point::new(4, 2)], 9);
    assert!(img.as_slice().iter().all(|&v| v == 1));
}
