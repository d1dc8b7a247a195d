//! Labeled samples, leave-one-out 1-nearest-neighbor evaluation, and
//! single-descriptor classification.
//!
//! A [`Dataset`] is an ordered, append-only list of [`Sample`]s that all
//! share one descriptor length. Evaluation holds each sample out in turn,
//! finds its nearest neighbor among the others by Euclidean distance, and
//! tallies the predicted labels into a dense [`ConfusionMatrix`]. Ties in
//! distance keep the neighbor with the smallest index.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::distance::distance;
use crate::types::{ClassifyError, Descriptor};

/// Shape class.
///
/// Variant order is the stable index order used by [`ConfusionMatrix`]
/// and [`Dataset::counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Three-sided polygon.
    Triangle,
    /// Four-sided polygon.
    Square,
    /// Round outline.
    Circle,
}

impl Label {
    /// Number of labels.
    pub const COUNT: usize = 3;

    /// Every label in index order.
    pub const ALL: [Self; Self::COUNT] = [Self::Triangle, Self::Square, Self::Circle];

    /// Position of this label in [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Triangle => 0,
            Self::Square => 1,
            Self::Circle => 2,
        }
    }

    /// Lowercase name, as used for display and parsing.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Triangle => "triangle",
            Self::Square => "square",
            Self::Circle => "circle",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A string did not name any [`Label`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown label {0:?} (expected triangle, square or circle)")]
pub struct ParseLabelError(String);

impl FromStr for Label {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseLabelError(s.to_string()))
    }
}

/// One labeled descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    label: Label,
    descriptor: Descriptor,
}

impl Sample {
    /// Pair a label with a descriptor.
    #[must_use]
    pub const fn new(label: Label, descriptor: Descriptor) -> Self {
        Self { label, descriptor }
    }

    /// The sample's class.
    #[must_use]
    pub const fn label(&self) -> Label {
        self.label
    }

    /// The sample's descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }
}

/// Ordered collection of samples sharing one descriptor length.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    descriptor_len: usize,
    samples: Vec<Sample>,
}

impl Dataset {
    /// Create an empty dataset whose descriptors must have length `descriptor_len`.
    #[must_use]
    pub const fn new(descriptor_len: usize) -> Self {
        Self {
            descriptor_len,
            samples: Vec::new(),
        }
    }

    /// Append a sample.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::DimensionMismatch`] if the sample's
    /// descriptor length differs from the dataset's, or
    /// [`ClassifyError::NonFiniteDescriptor`] if any entry is NaN or
    /// infinite. The dataset is left unchanged.
    pub fn push(&mut self, sample: Sample) -> Result<(), ClassifyError> {
        self.check(&sample.descriptor)?;
        self.samples.push(sample);
        Ok(())
    }

    /// Remove every sample. The descriptor length is kept.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Length every stored descriptor has.
    #[must_use]
    pub const fn descriptor_len(&self) -> usize {
        self.descriptor_len
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in insertion order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples per label, indexed by [`Label::index`].
    #[must_use]
    pub fn counts(&self) -> [usize; Label::COUNT] {
        let mut counts = [0; Label::COUNT];
        for sample in &self.samples {
            counts[sample.label.index()] += 1;
        }
        counts
    }

    /// Accept only descriptors of the dataset's length with finite entries.
    fn check(&self, descriptor: &Descriptor) -> Result<(), ClassifyError> {
        if descriptor.len() != self.descriptor_len {
            return Err(ClassifyError::DimensionMismatch {
                expected: self.descriptor_len,
                actual: descriptor.len(),
            });
        }
        if let Some(index) = descriptor.values().iter().position(|v| !v.is_finite()) {
            return Err(ClassifyError::NonFiniteDescriptor { index });
        }
        Ok(())
    }

    /// Index and distance of the sample nearest to `query`, skipping
    /// `exclude`. Strict `<` keeps the earliest index on ties.
    fn nearest(
        &self,
        query: &Descriptor,
        exclude: Option<usize>,
    ) -> Result<Option<(usize, f64)>, ClassifyError> {
        let mut best: Option<(usize, f64)> = None;
        for (j, sample) in self.samples.iter().enumerate() {
            if Some(j) == exclude {
                continue;
            }
            let d = distance(query, &sample.descriptor)?;
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((j, d));
            }
        }
        Ok(best)
    }
}

/// Dense (true label, predicted label) count table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: [[u32; Label::COUNT]; Label::COUNT],
}

impl ConfusionMatrix {
    /// Count for one (true, predicted) cell.
    #[must_use]
    pub const fn get(&self, actual: Label, predicted: Label) -> u32 {
        self.counts[actual.index()][predicted.index()]
    }

    /// Add one observation.
    pub const fn record(&mut self, actual: Label, predicted: Label) {
        self.counts[actual.index()][predicted.index()] += 1;
    }

    /// The row of counts for one true label, in [`Label::ALL`] order.
    #[must_use]
    pub const fn row(&self, actual: Label) -> [u32; Label::COUNT] {
        self.counts[actual.index()]
    }

    /// Sum of all cells.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().sum()
    }
}

/// Result of classifying one descriptor against a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Label of the nearest sample.
    pub label: Label,
    /// Index of the nearest sample in the dataset.
    pub nearest: usize,
    /// Euclidean distance to the nearest sample.
    pub distance: f64,
}

/// Leave-one-out outcome for one held-out sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeldOut {
    /// Index of the held-out sample.
    pub index: usize,
    /// Its true label.
    pub actual: Label,
    /// Label of its nearest neighbor.
    pub predicted: Label,
    /// Index of its nearest neighbor among the remaining samples.
    pub nearest: usize,
    /// Distance to that neighbor.
    pub distance: f64,
}

impl HeldOut {
    /// Whether the prediction matches the true label.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.actual == self.predicted
    }
}

/// Leave-one-out evaluation summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Number of held-out samples.
    pub total: usize,
    /// Number predicted correctly.
    pub correct: usize,
    /// `correct / total` as a percentage.
    pub accuracy: f64,
    /// Counts by (true, predicted) label.
    pub confusion: ConfusionMatrix,
    /// One entry per sample, in dataset order.
    pub predictions: Vec<HeldOut>,
}

impl Evaluation {
    /// Plain-text report: totals followed by the confusion matrix with
    /// one row per true label.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Leave-one-out 1-NN evaluation".to_string());
        lines.push(format!(
            "Total: {} | Correct: {} | Accuracy: {:.1}%",
            self.total, self.correct, self.accuracy,
        ));
        lines.push(String::new());
        lines.push("Confusion matrix (true -> predicted)".to_string());
        lines.push(format!(
            "{:<9} {}",
            "",
            Label::ALL.map(|l| format!("{:>8}", l.name())).join(" ")
        ));
        for actual in Label::ALL {
            let cells = self.confusion.row(actual).map(|n| format!("{n:>8}"));
            lines.push(format!("{:<9} {}", format!("{actual}:"), cells.join(" ")));
        }
        lines.join("\n")
    }
}

/// Leave-one-out 1-nearest-neighbor evaluation of the whole dataset.
///
/// # Errors
///
/// Returns [`ClassifyError::InsufficientData`] if the dataset has fewer
/// than two samples.
pub fn evaluate(dataset: &Dataset) -> Result<Evaluation, ClassifyError> {
    let total = dataset.len();
    if total < 2 {
        return Err(ClassifyError::InsufficientData {
            required: 2,
            actual: total,
        });
    }

    let mut confusion = ConfusionMatrix::default();
    let mut predictions = Vec::with_capacity(total);
    for (index, sample) in dataset.samples.iter().enumerate() {
        let (nearest, dist) = dataset
            .nearest(&sample.descriptor, Some(index))?
            .ok_or(ClassifyError::InsufficientData {
                required: 2,
                actual: total,
            })?;
        let predicted = dataset.samples[nearest].label;
        confusion.record(sample.label, predicted);
        predictions.push(HeldOut {
            index,
            actual: sample.label,
            predicted,
            nearest,
            distance: dist,
        });
    }

    let correct = predictions.iter().filter(|p| p.is_correct()).count();
    #[allow(clippy::cast_precision_loss)]
    let accuracy = correct as f64 / total as f64 * 100.0;
    tracing::debug!(total, correct, accuracy, "leave-one-out evaluation finished");

    Ok(Evaluation {
        total,
        correct,
        accuracy,
        confusion,
        predictions,
    })
}

/// Predict the label of a new descriptor from its nearest stored sample.
///
/// # Errors
///
/// Returns [`ClassifyError::InsufficientData`] if the dataset is empty,
/// [`ClassifyError::DimensionMismatch`] if the descriptor length differs
/// from the dataset's, or [`ClassifyError::NonFiniteDescriptor`] if the
/// descriptor has a NaN or infinite entry.
pub fn classify(dataset: &Dataset, descriptor: &Descriptor) -> Result<Prediction, ClassifyError> {
    dataset.check(descriptor)?;
    let (nearest, dist) =
        dataset
            .nearest(descriptor, None)?
            .ok_or(ClassifyError::InsufficientData {
                required: 1,
                actual: 0,
            })?;
    Ok(Prediction {
        label: dataset.samples[nearest].label,
        nearest,
        distance: dist,
    })
}

/// A [`Dataset`] shared between threads.
///
/// Appends take the write lock; evaluation and classification hold the
/// read lock for their whole pass, so a leave-one-out run always sees one
/// consistent snapshot. A poisoned lock is recovered: every mutation is a
/// single push or clear, so the dataset is never left half-updated.
#[derive(Debug, Clone)]
pub struct SharedDataset {
    inner: Arc<RwLock<Dataset>>,
}

impl SharedDataset {
    /// Create an empty shared dataset. See [`Dataset::new`].
    #[must_use]
    pub fn new(descriptor_len: usize) -> Self {
        Self::from_dataset(Dataset::new(descriptor_len))
    }

    /// Share an existing dataset.
    #[must_use]
    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            inner: Arc::new(RwLock::new(dataset)),
        }
    }

    /// Append a sample. See [`Dataset::push`].
    ///
    /// # Errors
    ///
    /// Same as [`Dataset::push`].
    pub fn push(&self, sample: Sample) -> Result<(), ClassifyError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sample)
    }

    /// Remove every sample.
    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of samples per label. See [`Dataset::counts`].
    #[must_use]
    pub fn counts(&self) -> [usize; Label::COUNT] {
        self.read().counts()
    }

    /// See [`evaluate`].
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`].
    pub fn evaluate(&self) -> Result<Evaluation, ClassifyError> {
        evaluate(&self.read())
    }

    /// See [`classify`].
    ///
    /// # Errors
    ///
    /// Same as [`classify`].
    pub fn classify(&self, descriptor: &Descriptor) -> Result<Prediction, ClassifyError> {
        classify(&self.read(), descriptor)
    }

    /// A point-in-time copy of the dataset.
    #[must_use]
    pub fn snapshot(&self) -> Dataset {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Dataset> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
