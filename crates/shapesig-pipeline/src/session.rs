//! Interactive labeling workflow without any UI: process an image, pick
//! a label, add the sample, and evaluate once enough samples exist.

use crate::classify::{Dataset, Evaluation, Label, Sample, evaluate};
use crate::types::{ClassifyError, Extraction, PipelineConfig, PipelineError, RasterImage};

/// Why a sample could not be added.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No label has been selected.
    #[error("select a label before adding a sample")]
    NoLabel,

    /// No fresh extraction is available: nothing was processed yet, the
    /// last processing failed, or its sample was already added.
    #[error("process an image before adding a sample")]
    NoExtraction,

    /// The descriptor does not fit the dataset.
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// One labeling session: a config, a dataset, and the pending extraction.
#[derive(Debug, Clone)]
pub struct Session {
    config: PipelineConfig,
    dataset: Dataset,
    label: Option<Label>,
    extraction: Option<Extraction>,
}

impl Session {
    /// Start an empty session. The dataset's descriptor length is taken
    /// from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            dataset: Dataset::new(config.descriptor_len),
            config,
            label: None,
            extraction: None,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The extraction waiting to be added, if any.
    #[must_use]
    pub const fn extraction(&self) -> Option<&Extraction> {
        self.extraction.as_ref()
    }

    #[must_use]
    pub const fn selected_label(&self) -> Option<Label> {
        self.label
    }

    /// Run the pipeline on a raster and keep the result for
    /// [`add_sample`](Self::add_sample). A failure clears any previous
    /// extraction.
    ///
    /// # Errors
    ///
    /// Any [`PipelineError`] from [`crate::process`].
    pub fn process(&mut self, raster: &RasterImage) -> Result<&Extraction, PipelineError> {
        self.extraction = None;
        let extraction = crate::process(raster, &self.config)?;
        Ok(self.extraction.insert(extraction))
    }

    pub const fn select_label(&mut self, label: Label) {
        self.label = Some(label);
    }

    /// Add the pending extraction under the selected label.
    ///
    /// The extraction is consumed, so the same image cannot be added
    /// twice. The label stays selected.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoLabel`] or [`SessionError::NoExtraction`]
    /// if either is missing; the session is left unchanged.
    pub fn add_sample(&mut self) -> Result<Label, SessionError> {
        let label = self.label.ok_or(SessionError::NoLabel)?;
        let extraction = self.extraction.take().ok_or(SessionError::NoExtraction)?;
        let sample = Sample::new(label, extraction.descriptor.clone());
        if let Err(e) = self.dataset.push(sample) {
            self.extraction = Some(extraction);
            return Err(e.into());
        }
        tracing::info!(%label, total = self.dataset.len(), "added sample");
        Ok(label)
    }

    /// Number of samples per label, indexed by [`Label::index`].
    #[must_use]
    pub fn counts(&self) -> [usize; Label::COUNT] {
        self.dataset.counts()
    }

    /// Whether the dataset is large enough to evaluate.
    #[must_use]
    pub fn can_evaluate(&self) -> bool {
        self.dataset.len() >= 2
    }

    /// Leave-one-out evaluation of the collected samples.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::InsufficientData`] with fewer than two
    /// samples.
    pub fn evaluate(&self) -> Result<Evaluation, ClassifyError> {
        evaluate(&self.dataset)
    }

    /// Drop every sample, the pending extraction and the selected label.
    pub fn reset(&mut self) {
        self.dataset.clear();
        self.extraction = None;
        self.label = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    const INK: Rgba<u8> = Rgba([15, 15, 15, 255]);
    const PAPER: Rgba<u8> = Rgba([245, 245, 245, 255]);

    fn rect(w: u32, h: u32) -> RasterImage {
        RasterImage::from_fn(64, 64, |x, y| {
            if (8..8 + w).contains(&x) && (8..8 + h).contains(&y) {
                INK
            } else {
                PAPER
            }
        })
    }

    fn disk(r: f64) -> RasterImage {
        RasterImage::from_fn(64, 64, |x, y| {
            if (f64::from(x) - 32.0).hypot(f64::from(y) - 32.0) <= r {
                INK
            } else {
                PAPER
            }
        })
    }

    fn session() -> Session {
        Session::new(PipelineConfig::default()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            descriptor_len: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Session::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn add_requires_label() {
        let mut s = session();
        s.process(&rect(30, 30)).unwrap();
        assert_eq!(s.add_sample(), Err(SessionError::NoLabel));
        assert!(s.extraction().is_some());
        assert!(s.dataset().is_empty());
    }

    #[test]
    fn add_requires_extraction() {
        let mut s = session();
        s.select_label(Label::Square);
        assert_eq!(s.add_sample(), Err(SessionError::NoExtraction));
    }

    #[test]
    fn extraction_is_consumed_by_add() {
        let mut s = session();
        s.select_label(Label::Square);
        s.process(&rect(30, 30)).unwrap();
        assert_eq!(s.add_sample(), Ok(Label::Square));
        assert_eq!(s.add_sample(), Err(SessionError::NoExtraction));
        assert_eq!(s.counts(), [0, 1, 0]);
        assert_eq!(s.selected_label(), Some(Label::Square));
    }

    #[test]
    fn failed_process_clears_previous_extraction() {
        let mut s = session();
        s.process(&rect(30, 30)).unwrap();
        let blank = RasterImage::from_pixel(64, 64, PAPER);
        assert!(matches!(s.process(&blank), Err(PipelineError::NoShape)));
        assert!(s.extraction().is_none());
    }

    #[test]
    fn evaluate_after_enough_samples() {
        let mut s = session();
        assert!(!s.can_evaluate());
        assert!(matches!(
            s.evaluate(),
            Err(ClassifyError::InsufficientData { .. })
        ));

        s.select_label(Label::Square);
        for side in [30, 40] {
            s.process(&rect(side, side)).unwrap();
            s.add_sample().unwrap();
        }
        s.select_label(Label::Circle);
        for r in [14.0, 20.0] {
            s.process(&disk(r)).unwrap();
            s.add_sample().unwrap();
        }

        assert!(s.can_evaluate());
        assert_eq!(s.counts(), [0, 2, 2]);
        let eval = s.evaluate().unwrap();
        assert_eq!(eval.total, 4);
        assert_eq!(eval.confusion.total(), 4);
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = session();
        s.select_label(Label::Triangle);
        s.process(&rect(20, 30)).unwrap();
        s.add_sample().unwrap();
        s.process(&rect(20, 30)).unwrap();

        s.reset();
        assert!(s.dataset().is_empty());
        assert!(s.extraction().is_none());
        assert_eq!(s.selected_label(), None);
        assert_eq!(s.dataset().descriptor_len(), 32);
    }
}
