//! Fourier descriptor: DFT magnitudes of the complex signature,
//! normalized by the first harmonic.
//!
//! The transform is the unnormalized forward DFT
//! `c_k = sum_n z_n * exp(-2*pi*i*k*n / N)` as computed by `rustfft`.
//! Rotating the shape or moving the trace start point only changes the
//! phase of each `c_k`, so magnitudes discard both. Dividing by `|c_1|`
//! removes uniform scale. The DC term `c_0` is skipped: the signature is
//! already centered.
//!
//! Contours are traced clockwise in image coordinates, which makes the
//! fundamental land on `c_1` rather than `c_{N-1}`.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

use crate::types::{ComplexSignature, Descriptor, PipelineError};

/// `|c_1|` below this is treated as a degenerate shape.
pub const DEGENERATE_EPSILON: f64 = 1e-9;

/// Forward DFT of the signature.
#[must_use]
pub fn fourier_coefficients(signature: &ComplexSignature) -> Vec<Complex64> {
    let mut buffer = signature.values().to_vec();
    if buffer.is_empty() {
        return buffer;
    }
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer
}

/// Magnitudes `|c_0| .. |c_{N-1}|` before normalization.
#[must_use]
pub fn fourier_magnitudes(signature: &ComplexSignature) -> Vec<f64> {
    fourier_coefficients(signature)
        .iter()
        .map(|c| c.norm())
        .collect()
}

/// Compute the length-`k` descriptor `|c_j| / |c_1|` for `j = 1..=k`.
///
/// Harmonics at or beyond the signature length do not exist and are
/// padded with zero.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `k` is zero.
/// Returns [`PipelineError::DegenerateShape`] if the signature has fewer
/// than two samples or `|c_1|` is below [`DEGENERATE_EPSILON`].
pub fn spectral_descriptor(
    signature: &ComplexSignature,
    k: usize,
) -> Result<Descriptor, PipelineError> {
    normalized_spectrum(signature, k).map(|(descriptor, _)| descriptor)
}

/// Like [`spectral_descriptor`], also returning the normalizing `|c_1|`.
///
/// # Errors
///
/// See [`spectral_descriptor`].
pub fn normalized_spectrum(
    signature: &ComplexSignature,
    k: usize,
) -> Result<(Descriptor, f64), PipelineError> {
    if k == 0 {
        return Err(PipelineError::InvalidConfig(
            "descriptor length must be at least 1".to_string(),
        ));
    }

    let n = signature.len();
    if n < 2 {
        return Err(PipelineError::DegenerateShape { magnitude: 0.0 });
    }

    let magnitudes = fourier_magnitudes(signature);
    let scale = magnitudes[1];
    if scale < DEGENERATE_EPSILON {
        return Err(PipelineError::DegenerateShape { magnitude: scale });
    }

    let values = (1..=k)
        .map(|j| magnitudes.get(j).map_or(0.0, |m| m / scale))
        .collect();
    tracing::debug!(n, k, first_harmonic = scale, "computed Fourier descriptor");
    Ok((Descriptor::new(values), scale))
}
