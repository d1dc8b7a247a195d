//! Descriptor comparison.

use crate::types::{ClassifyError, Descriptor};

/// Euclidean distance between two descriptors of equal length.
///
/// # Errors
///
/// Returns [`ClassifyError::DimensionMismatch`] if the lengths differ.
/// Descriptors are never truncated to a common length.
pub fn distance(a: &Descriptor, b: &Descriptor) -> Result<f64, ClassifyError> {
    if a.len() != b.len() {
        return Err(ClassifyError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.values()
        .iter()
        .zip(b.values())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt())
}
