//! Binarization: RGBA raster to foreground/background mask.
//!
//! Luma conversion, light Gaussian smoothing, a global threshold (Otsu by
//! default), polarity resolution, and an optional morphological closing
//! that reconnects thin pen strokes broken by the threshold.

use image::GrayImage;
use imageproc::distance_transform::Norm;

use crate::types::{BinaryMask, PipelineConfig, Polarity, RasterImage, ThresholdStrategy};

/// A mask together with the threshold that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thresholded {
    /// The binarized foreground mask.
    pub mask: BinaryMask,
    /// Intensity level used; pixels above it are bright.
    pub level: u8,
    /// Whether the dark side of the threshold was taken as foreground.
    pub dark_foreground: bool,
}

/// Binarize a raster into a foreground mask of identical dimensions.
///
/// A zero-area raster yields an empty mask.
#[must_use = "returns the binary mask"]
pub fn binarize(raster: &RasterImage, config: &PipelineConfig) -> BinaryMask {
    binarize_detailed(raster, config).mask
}

/// Binarize a raster and report the threshold decisions.
#[must_use = "returns the binary mask and threshold"]
pub fn binarize_detailed(raster: &RasterImage, config: &PipelineConfig) -> Thresholded {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return Thresholded {
            mask: BinaryMask::new(width, height),
            level: 0,
            dark_foreground: false,
        };
    }

    let luma = crate::grayscale::to_luma(raster);
    let smooth = crate::blur::gaussian_blur(&luma, config.blur_sigma);
    let level = threshold_level(&smooth, config.threshold);

    let bright = GrayImage::from_fn(width, height, |x, y| {
        image::Luma([if smooth.get_pixel(x, y).0[0] > level {
            255
        } else {
            0
        }])
    });

    let dark_foreground = match config.polarity {
        Polarity::LightForeground => false,
        Polarity::DarkForeground => true,
        Polarity::Auto => covers_majority(&bright),
    };
    let foreground = if dark_foreground {
        invert(&bright)
    } else {
        bright
    };

    let closed = close(&foreground, config.close_radius);
    Thresholded {
        mask: BinaryMask::from_gray(&closed),
        level,
        dark_foreground,
    }
}

/// Resolve the threshold level for a luma image.
#[must_use]
pub fn threshold_level(luma: &GrayImage, strategy: ThresholdStrategy) -> u8 {
    match strategy {
        ThresholdStrategy::Otsu => imageproc::contrast::otsu_level(luma),
        ThresholdStrategy::Fixed(level) => level,
    }
}

/// Whether more than half of the pixels are set.
fn covers_majority(image: &GrayImage) -> bool {
    let set: u64 = image.pixels().map(|p| u64::from(p.0[0] != 0)).sum();
    let total = u64::from(image.width()) * u64::from(image.height());
    set * 2 > total
}

/// Bitwise NOT of a 0/255 image.
fn invert(image: &GrayImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([!image.get_pixel(x, y).0[0]])
    })
}

/// Morphological closing (dilate then erode) under the L1 norm.
fn close(image: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return image.clone();
    }
    imageproc::morphology::close(image, Norm::L1, radius)
}
