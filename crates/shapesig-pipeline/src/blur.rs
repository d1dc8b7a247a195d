//! Gaussian smoothing of the luma image before thresholding.
//!
//! Photographed strokes carry sensor noise and paper texture. A light
//! blur keeps isolated speckles from surviving binarization as separate
//! foreground components.

use image::GrayImage;

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive or non-finite sigma values return the image unchanged,
/// since `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if !sigma.is_finite() || sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}
