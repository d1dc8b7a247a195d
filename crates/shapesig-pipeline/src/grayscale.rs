//! Raster input: decoding, packed-pixel import, and luma conversion.
//!
//! The pipeline consumes an in-memory [`RasterImage`]. This module builds
//! one from encoded bytes (PNG, JPEG, BMP, WebP) or from packed 32-bit
//! ARGB pixels, and reduces it to a single luma channel for thresholding.

use image::GrayImage;

use crate::types::{PipelineError, RasterImage};

/// Decode raw image bytes into an RGBA raster.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RasterImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Build a raster from packed `0xAARRGGBB` pixels in row-major order.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidRaster`] if `pixels.len()` differs from
/// `width * height`.
pub fn raster_from_argb(
    width: u32,
    height: u32,
    pixels: &[u32],
) -> Result<RasterImage, PipelineError> {
    #[allow(clippy::cast_possible_truncation)]
    let expected = width as usize * height as usize;
    if pixels.len() != expected {
        return Err(PipelineError::InvalidRaster {
            expected,
            actual: pixels.len(),
        });
    }

    let raw = pixels
        .iter()
        .flat_map(|&p| {
            let [a, r, g, b] = p.to_be_bytes();
            [r, g, b, a]
        })
        .collect();
    RasterImage::from_raw(width, height, raw).ok_or(PipelineError::InvalidRaster {
        expected,
        actual: pixels.len(),
    })
}

/// Convert a raster to a single luma channel.
///
/// Uses the `image` crate's weighted luminance (Rec. 709 coefficients);
/// alpha is ignored.
#[must_use = "returns the luma image"]
pub fn to_luma(raster: &RasterImage) -> GrayImage {
    image::imageops::grayscale(raster)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode a raster as a PNG byte buffer.
    fn encode_png(img: &RasterImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn png_decodes_with_dimensions() {
        let img = RasterImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (17, 31));
        assert_eq!(decoded.get_pixel(3, 3).0, [128, 64, 32, 255]);
    }

    #[test]
    fn argb_channels_are_unpacked() {
        let raster = raster_from_argb(2, 1, &[0xFF11_2233, 0x8000_00FF]).unwrap();
        assert_eq!(raster.get_pixel(0, 0).0, [0x11, 0x22, 0x33, 0xFF]);
        assert_eq!(raster.get_pixel(1, 0).0, [0x00, 0x00, 0xFF, 0x80]);
    }

    #[test]
    fn argb_length_mismatch_is_rejected() {
        let result = raster_from_argb(3, 3, &[0; 8]);
        assert!(matches!(
            result,
            Err(PipelineError::InvalidRaster {
                expected: 9,
                actual: 8
            })
        ));
    }

    #[test]
    fn zero_area_argb_is_accepted() {
        let raster = raster_from_argb(0, 5, &[]).unwrap();
        assert_eq!(raster.dimensions(), (0, 5));
    }

    #[test]
    fn luma_is_weighted() {
        // Green carries the highest luminance weight, blue the lowest.
        let img = RasterImage::from_fn(3, 1, |x, _| match x {
            0 => image::Rgba([255, 0, 0, 255]),
            1 => image::Rgba([0, 255, 0, 255]),
            _ => image::Rgba([0, 0, 255, 255]),
        });
        let luma = to_luma(&img);
        let r = luma.get_pixel(0, 0).0[0];
        let g = luma.get_pixel(1, 0).0[0];
        let b = luma.get_pixel(2, 0).0[0];
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }

    #[test]
    fn luma_preserves_dimensions() {
        let img = RasterImage::new(9, 4);
        let luma = to_luma(&img);
        assert_eq!(luma.dimensions(), (9, 4));
    }
}
