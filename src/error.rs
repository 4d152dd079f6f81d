// error.rs - Crate error type and fallible buffer allocation.
//
// Two failure classes exist in this library:
//
//   1. Fatal-to-call: a temporary buffer could not be allocated, a plane
//      does not match its declared dimensions, or the configuration is
//      unusable. These surface as `FlowError` and the caller treats the
//      whole call's output as invalid.
//   2. Per-point loss during tracking (border, ill-conditioned tensor,
//      divergence). That is NOT an error: it is reported through
//      `klt::TrackStatus::Lost` and every other point proceeds normally.
//
// All scratch memory goes through `try_alloc`, which uses
// `Vec::try_reserve_exact` so that exhaustion becomes `OutOfMemory`
// instead of an abort.

use crate::image::Dimensions;

/// Errors returned by detection and tracking calls.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// A temporary buffer could not be allocated.
    #[error("out of memory allocating {len} elements for {buffer}")]
    OutOfMemory {
        /// Which buffer failed (e.g. "response map").
        buffer: &'static str,
        /// Requested element count.
        len: usize,
    },

    /// Raw pixel data does not match the declared plane size.
    #[error("plane data length ({len}) does not match {width}x{height}")]
    InvalidPlane {
        width: usize,
        height: usize,
        len: usize,
    },

    /// The old and new frames passed to the tracker differ in size.
    #[error("frame dimensions differ: old {old}, new {new}")]
    DimensionMismatch { old: Dimensions, new: Dimensions },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the crate.
pub type FlowResult<T> = Result<T, FlowError>;

/// Allocate a vector of `len` copies of `value`, reporting allocation
/// failure as `FlowError::OutOfMemory` instead of aborting.
pub(crate) fn try_alloc<T: Clone>(len: usize, value: T, buffer: &'static str) -> FlowResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| FlowError::OutOfMemory { buffer, len })?;
    v.resize(len, value);
    Ok(v)
}

/// Empty vector with room for `cap` elements, reserved fallibly.
pub(crate) fn try_with_capacity<T>(cap: usize, buffer: &'static str) -> FlowResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(cap)
        .map_err(|_| FlowError::OutOfMemory { buffer, len: cap })?;
    Ok(v)
}

/// Resize an existing scratch vector to `len`, growing fallibly.
///
/// Shrinking never reallocates, so a buffer sized for the largest
/// configuration seen so far is reused as-is.
pub(crate) fn try_resize<T: Clone>(
    v: &mut Vec<T>,
    len: usize,
    value: T,
    buffer: &'static str,
) -> FlowResult<()> {
    if len > v.capacity() {
        v.try_reserve_exact(len - v.len())
            .map_err(|_| FlowError::OutOfMemory { buffer, len })?;
    }
    v.clear();
    v.resize(len, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_alloc_fills_value() {
        let v = try_alloc(5, 7i32, "test").unwrap();
        assert_eq!(v, vec![7; 5]);
    }

    #[test]
    fn test_try_alloc_reports_exhaustion() {
        // usize::MAX elements of u64 can never be reserved.
        let err = try_alloc(usize::MAX, 0u64, "huge").unwrap_err();
        assert_eq!(
            err,
            FlowError::OutOfMemory {
                buffer: "huge",
                len: usize::MAX
            }
        );
    }

    #[test]
    fn test_try_resize_reuses_capacity() {
        let mut v = try_alloc(100, 1u8, "scratch").unwrap();
        let cap = v.capacity();
        try_resize(&mut v, 10, 0u8, "scratch").unwrap();
        assert_eq!(v.len(), 10);
        assert!(v.iter().all(|&b| b == 0));
        assert_eq!(v.capacity(), cap);
    }

    #[test]
    fn test_error_messages() {
        let e = FlowError::InvalidPlane {
            width: 4,
            height: 2,
            len: 3,
        };
        assert_eq!(e.to_string(), "plane data length (3) does not match 4x2");
        let e = FlowError::InvalidConfig("subpixel_factor must be > 0".into());
        assert!(e.to_string().contains("subpixel_factor"));
    }
}
