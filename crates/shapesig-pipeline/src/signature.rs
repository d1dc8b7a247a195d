//! Complex boundary signature: contour points as complex numbers relative
//! to the contour centroid.
//!
//! Subtracting the centroid removes translation. Scale and rotation are
//! left alone here and normalized in the spectral stage.

use rustfft::num_complex::Complex64;

use crate::types::{ComplexSignature, Contour, PipelineError};

/// Arithmetic mean of the contour points, or `None` for an empty contour.
#[must_use]
pub fn centroid(contour: &Contour) -> Option<(f64, f64)> {
    if contour.is_empty() {
        return None;
    }
    let (sx, sy) = contour
        .points()
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + f64::from(p.x), sy + f64::from(p.y)));
    #[allow(clippy::cast_precision_loss)]
    let n = contour.len() as f64;
    Some((sx / n, sy / n))
}

/// Build the centroid-centered signature `(x - x̄) + i(y - ȳ)`.
///
/// # Errors
///
/// Returns [`PipelineError::NoShape`] if the contour is empty.
pub fn build_signature(contour: &Contour) -> Result<ComplexSignature, PipelineError> {
    let (cx, cy) = centroid(contour).ok_or(PipelineError::NoShape)?;
    Ok(ComplexSignature::new(
        contour
            .points()
            .iter()
            .map(|p| Complex64::new(f64::from(p.x) - cx, f64::from(p.y) - cy))
            .collect(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::GridPoint;

    fn contour(points: &[(u32, u32)]) -> Contour {
        Contour::new(points.iter().map(|&(x, y)| GridPoint::new(x, y)).collect())
    }

    #[test]
    fn empty_contour_is_rejected() {
        let result = build_signature(&Contour::default());
        assert!(matches!(result, Err(PipelineError::NoShape)));
        assert!(centroid(&Contour::default()).is_none());
    }

    #[test]
    fn centroid_is_mean_of_points() {
        let c = contour(&[(0, 0), (4, 0), (4, 2), (0, 2)]);
        assert_eq!(centroid(&c), Some((2.0, 1.0)));
    }

    #[test]
    fn signature_has_one_entry_per_point() {
        let c = contour(&[(1, 1), (2, 1), (3, 2), (2, 3), (1, 2)]);
        let sig = build_signature(&c).unwrap();
        assert_eq!(sig.len(), c.len());
    }

    #[test]
    fn signature_is_centered() {
        let c = contour(&[(3, 7), (9, 1), (12, 12), (5, 10), (4, 9)]);
        let sig = build_signature(&c).unwrap();
        assert!(sig.sum().norm() < 1e-9, "sum = {}", sig.sum());
    }

    #[test]
    fn entries_are_offsets_from_centroid() {
        let c = contour(&[(0, 0), (4, 0), (4, 2), (0, 2)]);
        let sig = build_signature(&c).unwrap();
        assert_eq!(sig.values()[0], Complex64::new(-2.0, -1.0));
        assert_eq!(sig.values()[2], Complex64::new(2.0, 1.0));
    }

    #[test]
    fn translation_does_not_change_signature() {
        let base = [(1, 2), (5, 2), (6, 4), (3, 8), (1, 5)];
        let shifted: Vec<(u32, u32)> = base.iter().map(|&(x, y)| (x + 37, y + 11)).collect();
        let a = build_signature(&contour(&base)).unwrap();
        let b = build_signature(&contour(&shifted)).unwrap();
        for (p, q) in a.values().iter().zip(b.values()) {
            assert!((p - q).norm() < 1e-9);
        }
    }

    #[test]
    fn single_point_signature_is_zero() {
        let sig = build_signature(&contour(&[(7, 3)])).unwrap();
        assert_eq!(sig.values(), &[Complex64::new(0.0, 0.0)]);
    }
}
