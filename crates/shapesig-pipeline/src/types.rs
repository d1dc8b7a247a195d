//! Shared types for the shapesig descriptor pipeline.

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::contour::ContourTracerKind;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// decoded source image without depending on `image` directly.
pub use image::RgbaImage;

/// The raster consumed by the pipeline: row-major RGBA, 8 bits per channel.
pub type RasterImage = RgbaImage;

/// An integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    /// Column (pixels from left edge).
    pub x: u32,
    /// Row (pixels from top edge).
    pub y: u32,
}

impl GridPoint {
    /// Create a new grid point.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (chessboard) distance to another point.
    ///
    /// Two distinct pixels are 8-connected iff this is 1.
    #[must_use]
    pub const fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }
}

/// An ordered, closed boundary of pixel coordinates.
///
/// Produced by [`trace_contour`](crate::contour::trace_contour): traversed
/// clockwise in image coordinates (y pointing down), every consecutive
/// pair of points is 8-connected and the last point is 8-adjacent to the
/// first. An empty contour means no shape was detected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contour(Vec<GridPoint>);

impl Contour {
    /// Create a contour from an ordered vector of points.
    #[must_use]
    pub const fn new(points: Vec<GridPoint>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the contour.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&GridPoint> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&GridPoint> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[GridPoint] {
        &self.0
    }

    /// Consumes the contour and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<GridPoint> {
        self.0
    }

    /// Whether the last point is the first point or one of its 8-neighbors.
    ///
    /// A contour whose walk was cut short by the step bound may be open.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => first.chebyshev_distance(*last) <= 1,
            _ => false,
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A foreground/background mask with the same dimensions as its source
/// raster. Pixels are stored row-major.
///
/// Deserialization rejects a pixel count that disagrees with
/// `width * height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMask")]
pub struct BinaryMask {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

/// Unchecked wire form of [`BinaryMask`].
#[derive(Deserialize)]
struct RawMask {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

/// A serialized mask whose pixel count does not match its dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mask of {width}x{height} has {actual} pixels")]
pub struct MaskLengthError {
    /// Declared width.
    pub width: u32,
    /// Declared height.
    pub height: u32,
    /// Number of pixel values supplied.
    pub actual: usize,
}

impl TryFrom<RawMask> for BinaryMask {
    type Error = MaskLengthError;

    fn try_from(raw: RawMask) -> Result<Self, Self::Error> {
        let expected = u64::from(raw.width) * u64::from(raw.height);
        if u64::try_from(raw.pixels.len()).ok() != Some(expected) {
            return Err(MaskLengthError {
                width: raw.width,
                height: raw.height,
                actual: raw.pixels.len(),
            });
        }
        Ok(Self {
            width: raw.width,
            height: raw.height,
            pixels: raw.pixels,
        })
    }
}

impl BinaryMask {
    /// Create an all-background mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; pixel_len(width, height)],
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut pixels = Vec::with_capacity(pixel_len(width, height));
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Interpret a grayscale image as a mask: any non-zero pixel is
    /// foreground.
    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.as_raw().iter().map(|&v| v != 0).collect(),
        }
    }

    /// Render the mask as a grayscale image: 255 for foreground, 0 for
    /// background.
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    /// Mask width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Returns `true` if the mask has zero area.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Whether the pixel at `(x, y)` is foreground. Out-of-bounds
    /// coordinates are background.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.pixels[self.index(x, y)]
    }

    /// Set the pixel at `(x, y)`. Out-of-bounds coordinates are ignored.
    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.pixels[i] = foreground;
        }
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn foreground_count(&self) -> u64 {
        self.pixels.iter().map(|&p| u64::from(p)).sum()
    }

    /// Row-major pixel values.
    #[must_use]
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn pixel_len(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Centroid-centered complex boundary signature: one `(x - x̄) + i(y - ȳ)`
/// entry per contour point.
///
/// Uses custom `Serialize`/`Deserialize` because `num_complex` (as
/// re-exported by `rustfft`) is built without serde support. Entries are
/// serialized as `(re, im)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSignature(Vec<Complex64>);

impl ComplexSignature {
    /// Create a signature from complex samples.
    #[must_use]
    pub const fn new(values: Vec<Complex64>) -> Self {
        Self(values)
    }

    /// Returns `true` if the signature has no samples.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of samples (equal to the source contour length).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all samples.
    #[must_use]
    pub fn values(&self) -> &[Complex64] {
        &self.0
    }

    /// Consumes the signature and returns the underlying samples.
    #[must_use]
    pub fn into_values(self) -> Vec<Complex64> {
        self.0
    }

    /// Sum of all samples; approximately zero for a centered signature.
    #[must_use]
    pub fn sum(&self) -> Complex64 {
        self.0.iter().sum()
    }
}

impl Serialize for ComplexSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(f64, f64)> = self.0.iter().map(|c| (c.re, c.im)).collect();
        pairs.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ComplexSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = Vec::<(f64, f64)>::deserialize(deserializer)?;
        Ok(Self(
            pairs
                .into_iter()
                .map(|(re, im)| Complex64::new(re, im))
                .collect(),
        ))
    }
}

/// Fixed-length shape descriptor: normalized Fourier magnitudes
/// `|c_1|/|c_1|, |c_2|/|c_1|, ..., |c_K|/|c_1|`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor(Vec<f64>);

impl Descriptor {
    /// Create a descriptor from its entries.
    #[must_use]
    pub const fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Returns `true` if the descriptor has no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Descriptor length K.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all entries.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Consumes the descriptor and returns the underlying entries.
    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.0
    }
}

/// How the binarization threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThresholdStrategy {
    /// Otsu's method: the level that maximizes between-class variance of
    /// the intensity histogram. Adapts to each photograph's lighting.
    #[default]
    Otsu,
    /// A fixed global level. Pixels with intensity above it are bright.
    Fixed(u8),
}

/// Which side of the threshold is the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Polarity {
    /// Bright pixels are foreground unless they cover more than half the
    /// image, in which case the mask is inverted. The shape is assumed to
    /// be the minority region.
    #[default]
    Auto,
    /// Pixels at or below the threshold are foreground (ink on paper).
    DarkForeground,
    /// Pixels above the threshold are foreground.
    LightForeground,
}

/// Configuration for the descriptor pipeline.
///
/// `descriptor_len` is K. Descriptors computed with different K are not
/// comparable, so it must stay fixed for the lifetime of a
/// [`Dataset`](crate::classify::Dataset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Gaussian blur sigma applied to the luma image before
    /// thresholding. Non-positive values disable the blur.
    pub blur_sigma: f32,

    /// Threshold selection strategy.
    pub threshold: ThresholdStrategy,

    /// Foreground polarity.
    pub polarity: Polarity,

    /// Radius of the morphological closing applied to the mask
    /// (L1 norm). Zero disables it.
    pub close_radius: u8,

    /// Which contour tracing algorithm to use.
    pub contour_tracer: ContourTracerKind,

    /// Upper bound on boundary-walk moves. `None` derives the bound from
    /// the mask size.
    pub max_trace_steps: Option<usize>,

    /// Descriptor length K.
    pub descriptor_len: usize,
}

impl PipelineConfig {
    /// Default blur sigma, the equivalent of a 3x3 Gaussian kernel.
    pub const DEFAULT_BLUR_SIGMA: f32 = 0.8;
    /// Default closing radius.
    pub const DEFAULT_CLOSE_RADIUS: u8 = 1;
    /// Default descriptor length K.
    pub const DEFAULT_DESCRIPTOR_LEN: usize = 32;

    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `descriptor_len` is
    /// zero, `blur_sigma` is not finite, or `max_trace_steps` is
    /// `Some(0)`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.descriptor_len == 0 {
            return Err(PipelineError::InvalidConfig(
                "descriptor_len must be at least 1".to_string(),
            ));
        }
        if !self.blur_sigma.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_sigma must be finite, got {}",
                self.blur_sigma
            )));
        }
        if self.max_trace_steps == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "max_trace_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            threshold: ThresholdStrategy::default(),
            polarity: Polarity::default(),
            close_radius: Self::DEFAULT_CLOSE_RADIUS,
            contour_tracer: ContourTracerKind::default(),
            max_trace_steps: None,
            descriptor_len: Self::DEFAULT_DESCRIPTOR_LEN,
        }
    }
}

/// Everything one pass of the pipeline produced for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Dimensions of the source raster.
    pub dimensions: Dimensions,
    /// Binarized foreground mask.
    pub mask: BinaryMask,
    /// Boundary of the dominant foreground component.
    pub contour: Contour,
    /// Centroid-centered complex signature of the contour.
    pub signature: ComplexSignature,
    /// Normalized Fourier descriptor of length K.
    pub descriptor: Descriptor,
}

/// Errors that can occur while extracting a descriptor from an image.
///
/// Every variant aborts the current image only; no shared state is
/// touched.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Packed pixel data does not match the stated dimensions.
    #[error("raster has {actual} pixels, expected {expected}")]
    InvalidRaster {
        /// `width * height`.
        expected: usize,
        /// Number of packed pixels supplied.
        actual: usize,
    },

    /// No foreground shape was found (empty mask or empty contour).
    #[error("no usable shape detected")]
    NoShape,

    /// The first harmonic magnitude is too small to normalize by.
    #[error("degenerate shape: first harmonic magnitude {magnitude:e} is too small to normalize")]
    DegenerateShape {
        /// Observed `|c_1|`.
        magnitude: f64,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from descriptor comparison and dataset evaluation.
///
/// A failing call leaves the dataset untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// Two descriptors (or a descriptor and a dataset) disagree on K.
    #[error("descriptor length mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length required by the other operand or the dataset.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// A descriptor entry is NaN or infinite.
    #[error("descriptor entry {index} is not finite")]
    NonFiniteDescriptor {
        /// Position of the first offending entry.
        index: usize,
    },

    /// Not enough samples for the requested operation.
    #[error("need at least {required} samples, dataset has {actual}")]
    InsufficientData {
        /// Minimum sample count.
        required: usize,
        /// Current sample count.
        actual: usize,
    },
}
