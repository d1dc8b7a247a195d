//! shapesig-pipeline: Fourier shape descriptors for simple drawn shapes
//! (sans-IO).
//!
//! Converts a raster image into a translation-, rotation-, scale- and
//! start-point-invariant descriptor through:
//! binarize -> contour tracing -> complex signature -> normalized DFT
//! magnitudes. Descriptors are compared by Euclidean distance and
//! classified by 1-nearest-neighbor against a labeled dataset, with
//! leave-one-out evaluation.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! rasters and byte slices and returns structured data. Filesystem and
//! terminal interaction lives in the `shapesig` CLI.

pub mod binarize;
pub mod blur;
pub mod classify;
pub mod contour;
pub mod diagnostics;
pub mod distance;
pub mod grayscale;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod signature;
pub mod spectral;
pub mod types;

pub use binarize::binarize;
pub use classify::{
    ConfusionMatrix, Dataset, Evaluation, HeldOut, Label, Prediction, Sample, SharedDataset,
    classify, evaluate,
};
pub use contour::{ContourTracer, ContourTracerKind, trace_contour};
pub use distance::distance;
pub use grayscale::raster_from_argb;
pub use pipeline::Pipeline;
pub use session::{Session, SessionError};
pub use signature::build_signature;
pub use spectral::spectral_descriptor;
pub use types::{
    BinaryMask, ClassifyError, ComplexSignature, Contour, Descriptor, Dimensions, Extraction,
    GridPoint, MaskLengthError, PipelineConfig, PipelineError, Polarity, RasterImage,
    ThresholdStrategy,
};

/// Run the full pipeline on a raster.
///
/// # Pipeline steps
///
/// 1. Luma conversion, Gaussian blur, threshold, polarity, closing
/// 2. Contour tracing of the dominant component (pluggable strategy)
/// 3. Centroid-centered complex signature
/// 4. DFT magnitudes normalized by the first harmonic
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::NoShape`] if no foreground shape is found.
/// Returns [`PipelineError::DegenerateShape`] if the first harmonic
/// vanishes.
pub fn process(raster: &RasterImage, config: &PipelineConfig) -> Result<Extraction, PipelineError> {
    config.validate()?;
    let extraction = Pipeline::new(raster.clone(), config.clone())
        .binarize()
        .trace()?
        .sign()?
        .describe()?
        .into_result();
    tracing::debug!(
        width = extraction.dimensions.width,
        height = extraction.dimensions.height,
        points = extraction.contour.len(),
        "extracted shape descriptor"
    );
    Ok(extraction)
}

/// Decode encoded image bytes (PNG, JPEG, BMP, WebP) and run the full
/// pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Otherwise the same as [`process`].
pub fn process_bytes(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<Extraction, PipelineError> {
    config.validate()?;
    let raster = grayscale::decode(image_bytes)?;
    process(&raster, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGBA image as PNG bytes.
    fn png_bytes(img: &RasterImage) -> Vec<u8> {
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

    /// Dark axis-aligned square on white.
    fn ink_square(size: u32, offset: u32, side: u32) -> RasterImage {
        RasterImage::from_fn(size, size, |x, y| {
            let inside = (offset..offset + side).contains(&x) && (offset..offset + side).contains(&y);
            if inside {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    fn assert_close(a: &Descriptor, b: &Descriptor, tolerance: f64) {
        let d = distance(a, b).unwrap();
        assert!(d < tolerance, "descriptors differ by {d}");
    }

    #[test]
    fn process_bytes_empty_input() {
        let result = process_bytes(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_bytes_corrupt_input() {
        let result = process_bytes(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_uniform_image_has_no_shape() {
        let img = RasterImage::from_pixel(20, 20, image::Rgba([128, 128, 128, 255]));
        let result = process(&img, &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::NoShape)));
    }

    #[test]
    fn process_zero_area_image_has_no_shape() {
        let result = process(&RasterImage::new(0, 0), &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::NoShape)));
    }

    #[test]
    fn process_rejects_invalid_config() {
        let config = PipelineConfig {
            blur_sigma: f32::NAN,
            ..PipelineConfig::default()
        };
        let result = process(&ink_square(40, 10, 20), &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn process_square_produces_descriptor() {
        let extraction = process(&ink_square(40, 10, 20), &PipelineConfig::default()).unwrap();
        assert_eq!(
            extraction.dimensions,
            Dimensions {
                width: 40,
                height: 40
            }
        );
        assert_eq!(extraction.mask.width(), 40);
        assert!(extraction.contour.is_closed());
        assert_eq!(extraction.signature.len(), extraction.contour.len());
        assert_eq!(extraction.descriptor.len(), 32);
        assert!((extraction.descriptor.values()[0] - 1.0).abs() < 1e-12);
        assert!(extraction.descriptor.values().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn process_bytes_matches_process() {
        let raster = ink_square(40, 10, 20);
        let config = PipelineConfig::default();
        assert_eq!(
            process_bytes(&png_bytes(&raster), &config).unwrap(),
            process(&raster, &config).unwrap()
        );
    }

    #[test]
    fn descriptor_length_follows_config() {
        let config = PipelineConfig {
            descriptor_len: 10,
            ..PipelineConfig::default()
        };
        let extraction = process(&ink_square(40, 10, 20), &config).unwrap();
        assert_eq!(extraction.descriptor.len(), 10);
    }

    #[test]
    fn translated_square_has_identical_descriptor() {
        let config = PipelineConfig::default();
        let a = process(&ink_square(60, 5, 24), &config).unwrap();
        let b = process(&ink_square(60, 30, 24), &config).unwrap();
        assert_close(&a.descriptor, &b.descriptor, 1e-9);
    }

    #[test]
    fn argb_raster_matches_rgba_raster() {
        let raster = ink_square(30, 8, 12);
        let argb: Vec<u32> = raster
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                u32::from_be_bytes([a, r, g, b])
            })
            .collect();
        let from_argb = raster_from_argb(30, 30, &argb).unwrap();
        let config = PipelineConfig::default();
        assert_eq!(
            process(&from_argb, &config).unwrap(),
            process(&raster, &config).unwrap()
        );
    }

    #[test]
    fn process_is_deterministic() {
        let raster = ink_square(50, 7, 31);
        let config = PipelineConfig::default();
        assert_eq!(
            process(&raster, &config).unwrap(),
            process(&raster, &config).unwrap()
        );
    }
}
