// image.rs - Runtime-sized image plane, generic over integer pixel type.
//
// Two pixel types are used by the pipeline:
//   u8  - the luma plane supplied by the caller (read-only to this crate)
//   i32 - gradient planes and the corner response map (scratch, owned by
//         the detector and reused across calls)
//
// Dimensions are carried by every plane and every call. There is no
// process-wide width/height: two detectors working on different image
// sizes can coexist.
//
// Layout is row-major and contiguous (stride == width). The only
// accessor that may run past the edge is `get_clamped`, which replicates
// the nearest edge pixel.

use std::fmt;

use crate::error::{try_alloc, FlowError, FlowResult};

// ---------------------------------------------------------------------------
// Pixel Trait
// ---------------------------------------------------------------------------

/// Trait for types that can serve as pixel values in an `Image`.
///
/// All arithmetic in this crate is integer, so the only conversion needed
/// is a lossless widening to `i32`.
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    fn to_i32(self) -> i32;
}

impl Pixel for u8 {
    #[inline]
    fn to_i32(self) -> i32 {
        self as i32
    }
}

impl Pixel for i32 {
    #[inline]
    fn to_i32(self) -> i32 {
        self
    }
}

// ---------------------------------------------------------------------------
// Dimensions / Point
// ---------------------------------------------------------------------------

/// Width and height of an image plane, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
}

impl Dimensions {
    pub const fn new(width: usize, height: usize) -> Self {
        Dimensions { width, height }
    }

    /// Number of pixels in a plane of these dimensions.
    #[inline]
    pub const fn area(&self) -> usize {
        self.width * self.height
    }

    /// True if (x, y) addresses a pixel of the plane.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An integer pixel coordinate. x is column, y is row.
///
/// Signed so that offsets and border arithmetic never wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    /// Chebyshev (L-infinity) distance to another point.
    #[inline]
    pub fn chebyshev(&self, other: &Point) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D image plane with runtime dimensions, generic over pixel type `T`.
#[derive(Clone, PartialEq)]
pub struct Image<T: Pixel> {
    /// Pixel data in row-major order. Length = width * height.
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Image<T> {
    // --- Constructors ---

    /// Create a zero-initialized image.
    ///
    /// Infallible convenience for tests and small planes. Library code
    /// allocates through `try_new` so exhaustion is reported.
    pub fn new(width: usize, height: usize) -> Self {
        Image {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Create a zero-initialized image, reporting allocation failure.
    pub fn try_new(dims: Dimensions, buffer: &'static str) -> FlowResult<Self> {
        Ok(Image {
            data: try_alloc(dims.area(), T::default(), buffer)?,
            width: dims.width,
            height: dims.height,
        })
    }

    /// Create an image from an existing pixel vector.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height }
    }

    /// Create an image from an existing pixel vector, returning
    /// `FlowError::InvalidPlane` on a length mismatch.
    pub fn try_from_vec(width: usize, height: usize, data: Vec<T>) -> FlowResult<Self> {
        if data.len() != width * height {
            return Err(FlowError::InvalidPlane {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Image { data, width, height })
    }

    // --- Accessors ---

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn dims(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Get the pixel value at (x, y).
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    /// Get the pixel at signed (x, y), clamping each coordinate to the
    /// nearest valid column/row (edge replication).
    ///
    /// # Panics
    /// Panics if the image is empty.
    #[inline]
    pub fn get_clamped(&self, x: i32, y: i32) -> T {
        assert!(
            self.width > 0 && self.height > 0,
            "cannot sample an empty image"
        );
        let cx = x.clamp(0, self.width as i32 - 1) as usize;
        let cy = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[cy * self.width + cx]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        *self.get_mut(x, y) = value;
    }

    /// Borrow a single row as a slice.
    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Iterate over all pixels as `(x, y, value)` in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y, self.data[y * self.width + x])))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Set every pixel to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Largest pixel value, or `None` for an empty image.
    pub fn max_value(&self) -> Option<T> {
        let mut it = self.data.iter().copied();
        let first = it.next()?;
        Some(it.fold(first, |m, v| if v > m { v } else { m }))
    }

    /// Re-dimension this image in place, reusing the allocation when it
    /// is already large enough. Contents are reset to the default value.
    pub(crate) fn try_reshape(&mut self, dims: Dimensions, buffer: &'static str) -> FlowResult<()> {
        crate::error::try_resize(&mut self.data, dims.area(), T::default(), buffer)?;
        self.width = dims.width;
        self.height = dims.height;
        Ok(())
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}x{}",
            self.width,
            self.height,
        );
    }
}

impl<T: Pixel> Default for Image<T> {
    fn default() -> Self {
        Image {
            data: Vec::new(),
            width: 0,
            height: 0,
        }
    }
}

// Debug prints the size and the top-left corner of the plane.
impl<T: Pixel + fmt::Debug> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image {}x{} [", self.width, self.height)?;
        for y in 0..self.height.min(6) {
            let shown = &self.row(y)[..self.width.min(12)];
            let more = if self.width > 12 { " .." } else { "" };
            writeln!(f, "  {shown:?}{more}")?;
        }
        write!(f, "]")
    }
}

impl<T: Pixel> std::ops::Index<(usize, usize)> for Image<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        self.bounds_check(x, y);
        &self.data[y * self.width + x]
    }
}

impl<T: Pixel> std::ops::IndexMut<(usize, usize)> for Image<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        self.bounds_check(x, y);
        let idx = y * self.width + x;
        &mut self.data[idx]
    }
}

// ---------------------------------------------------------------------------
// Debug overlay
// ---------------------------------------------------------------------------

/// Paint the 3x3 block around each point with `value`.
///
/// Points closer than one pixel to the border are skipped, so the block
/// never leaves the plane. Used for the detector's optional debug
/// marking; the pipeline itself never writes to the caller's plane.
pub fn mark_points(img: &mut Image<u8>, points: &[Point], value: u8) {
    let w = img.width() as i64;
    let h = img.height() as i64;
    for p in points {
        let (x, y) = (p.x as i64, p.y as i64);
        if x < 1 || y < 1 || x >= w - 1 || y >= h - 1 {
            continue;
        }
        for dy in -1..=1 {
            for dx in -1..=1 {
                img.set((x + dx) as usize, (y + dy) as usize, value);
            }
        }
    }
}
