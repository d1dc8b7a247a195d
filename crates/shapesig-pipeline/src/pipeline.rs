//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use shapesig_pipeline::{Pipeline, PipelineConfig, PipelineError, RasterImage};
//! # fn run(raster: RasterImage) -> Result<(), PipelineError> {
//! let described = Pipeline::new(raster, PipelineConfig::default())
//!     .binarize()
//!     .trace()?
//!     .sign()?
//!     .describe()?;
//!
//! println!("first harmonic: {}", described.first_harmonic());
//! let extraction = described.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. The caller can inspect the current stage's output via
//! accessor methods at any point.

use crate::contour::{ContourTracer, default_step_bound};
use crate::diagnostics::StageMetrics;
use crate::types::{
    BinaryMask, ComplexSignature, Contour, Descriptor, Dimensions, Extraction, PipelineConfig,
    PipelineError, RasterImage,
};

fn dimensions_of(raster: &RasterImage) -> Dimensions {
    Dimensions {
        width: raster.width(),
        height: raster.height(),
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`binarize`](Self::binarize) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .binarize() to continue"]
pub struct Pending {
    config: PipelineConfig,
    raster: RasterImage,
}

impl Pending {
    /// The source raster.
    #[must_use]
    pub const fn raster(&self) -> &RasterImage {
        &self.raster
    }

    /// Threshold the raster into a foreground mask.
    pub fn binarize(self) -> Binarized {
        let thresholded = crate::binarize::binarize_detailed(&self.raster, &self.config);
        tracing::debug!(
            level = thresholded.level,
            dark_foreground = thresholded.dark_foreground,
            foreground = thresholded.mask.foreground_count(),
            "binarized raster"
        );
        Binarized {
            dimensions: dimensions_of(&self.raster),
            config: self.config,
            mask: thresholded.mask,
            level: thresholded.level,
            dark_foreground: thresholded.dark_foreground,
        }
    }
}

// ───────────────────────── Stage 1: Binarized ────────────────────────

/// Pipeline state after thresholding.
///
/// Call [`trace`](Self::trace) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .trace() to continue"]
pub struct Binarized {
    config: PipelineConfig,
    dimensions: Dimensions,
    mask: BinaryMask,
    level: u8,
    dark_foreground: bool,
}

impl Binarized {
    /// The foreground mask.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// Threshold level that produced the mask.
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Whether dark pixels were taken as foreground.
    #[must_use]
    pub const fn dark_foreground(&self) -> bool {
        self.dark_foreground
    }

    /// Walk bound in effect for this mask.
    #[must_use]
    pub fn step_bound(&self) -> usize {
        self.config
            .max_trace_steps
            .unwrap_or_else(|| default_step_bound(self.dimensions))
    }

    /// Trace the boundary of the dominant foreground component.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoShape`] if the mask has no foreground.
    pub fn trace(self) -> Result<Traced, PipelineError> {
        let step_bound = self.step_bound();
        let contour = self.config.contour_tracer.trace(&self.mask, step_bound);
        if contour.is_empty() {
            return Err(PipelineError::NoShape);
        }
        Ok(Traced {
            config: self.config,
            dimensions: self.dimensions,
            mask: self.mask,
            contour,
            step_bound,
        })
    }
}

// ───────────────────────── Stage 2: Traced ───────────────────────────

/// Pipeline state after contour tracing.
///
/// Call [`sign`](Self::sign) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .sign() to continue"]
pub struct Traced {
    config: PipelineConfig,
    dimensions: Dimensions,
    mask: BinaryMask,
    contour: Contour,
    step_bound: usize,
}

impl Traced {
    /// The traced boundary.
    #[must_use]
    pub const fn contour(&self) -> &Contour {
        &self.contour
    }

    /// The foreground mask the boundary was traced on.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// Build the centroid-centered complex signature.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoShape`] if the contour is empty.
    pub fn sign(self) -> Result<Signed, PipelineError> {
        let signature = crate::signature::build_signature(&self.contour)?;
        tracing::debug!(samples = signature.len(), "built complex signature");
        Ok(Signed {
            config: self.config,
            dimensions: self.dimensions,
            mask: self.mask,
            contour: self.contour,
            signature,
        })
    }
}

// ───────────────────────── Stage 3: Signed ───────────────────────────

/// Pipeline state after building the complex signature.
///
/// Call [`describe`](Self::describe) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing; call .describe() to continue"]
pub struct Signed {
    config: PipelineConfig,
    dimensions: Dimensions,
    mask: BinaryMask,
    contour: Contour,
    signature: ComplexSignature,
}

impl Signed {
    /// The centroid-centered signature.
    #[must_use]
    pub const fn signature(&self) -> &ComplexSignature {
        &self.signature
    }

    /// Compute the normalized Fourier descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `descriptor_len` is
    /// zero, or [`PipelineError::DegenerateShape`] if the first harmonic
    /// vanishes.
    pub fn describe(self) -> Result<Described, PipelineError> {
        let (descriptor, first_harmonic) =
            crate::spectral::normalized_spectrum(&self.signature, self.config.descriptor_len)?;
        Ok(Described {
            dimensions: self.dimensions,
            mask: self.mask,
            contour: self.contour,
            signature: self.signature,
            descriptor,
            first_harmonic,
        })
    }
}

// ───────────────────────── Stage 4: Described ────────────────────────

/// Final pipeline state: every intermediate plus the descriptor.
#[must_use = "call .into_result() to obtain the extraction"]
pub struct Described {
    dimensions: Dimensions,
    mask: BinaryMask,
    contour: Contour,
    signature: ComplexSignature,
    descriptor: Descriptor,
    first_harmonic: f64,
}

impl Described {
    /// The normalized descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// `|c_1|`, the magnitude the descriptor was normalized by.
    #[must_use]
    pub const fn first_harmonic(&self) -> f64 {
        self.first_harmonic
    }

    /// Consume the pipeline and return all intermediates.
    #[must_use]
    pub fn into_result(self) -> Extraction {
        Extraction {
            dimensions: self.dimensions,
            mask: self.mask,
            contour: self.contour,
            signature: self.signature,
            descriptor: self.descriptor,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 5;

/// The output produced by a single pipeline stage.
#[must_use]
pub enum StageOutput<'a> {
    /// Source raster (not yet processed).
    Source {
        /// The input raster.
        raster: &'a RasterImage,
    },
    /// Binarization result.
    Binarized {
        /// The foreground mask.
        mask: &'a BinaryMask,
    },
    /// Contour tracing result.
    Traced {
        /// The dominant boundary.
        contour: &'a Contour,
    },
    /// Signature construction result.
    Signed {
        /// The centered complex signature.
        signature: &'a ComplexSignature,
    },
    /// Descriptor computation result.
    Described {
        /// The normalized descriptor.
        descriptor: &'a Descriptor,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Each stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"trace"`).
    const NAME: &str;

    /// Zero-based index of this stage.
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Metrics describing the work done to reach this state, or `None`
    /// for [`Pending`].
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(None)` if already at the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the stage transition fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<Extraction, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            raster: &self.raster,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Binarized(self.binarize())))
    }

    fn complete(self) -> Result<Extraction, PipelineError> {
        self.binarize().complete()
    }
}

impl PipelineStage for Binarized {
    const NAME: &str = "binarize";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Binarized { mask: &self.mask }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Binarize {
            width: self.dimensions.width,
            height: self.dimensions.height,
            level: self.level,
            dark_foreground: self.dark_foreground,
            foreground_pixels: self.mask.foreground_count(),
            total_pixels: self.dimensions.pixel_count(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Traced(self.trace()?)))
    }

    fn complete(self) -> Result<Extraction, PipelineError> {
        self.trace()?.complete()
    }
}

impl PipelineStage for Traced {
    const NAME: &str = "trace";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Traced {
            contour: &self.contour,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::ContourTracing {
            point_count: self.contour.len(),
            closed: self.contour.is_closed(),
            step_bound: self.step_bound,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Signed(self.sign()?)))
    }

    fn complete(self) -> Result<Extraction, PipelineError> {
        self.sign()?.complete()
    }
}

impl PipelineStage for Signed {
    const NAME: &str = "signature";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Signed {
            signature: &self.signature,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        let (centroid_x, centroid_y) =
            crate::signature::centroid(&self.contour).unwrap_or((0.0, 0.0));
        Some(StageMetrics::Signature {
            sample_count: self.signature.len(),
            centroid_x,
            centroid_y,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Described(self.describe()?)))
    }

    fn complete(self) -> Result<Extraction, PipelineError> {
        self.describe()?.complete()
    }
}

impl PipelineStage for Described {
    const NAME: &str = "descriptor";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Described {
            descriptor: &self.descriptor,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Descriptor {
            descriptor_len: self.descriptor.len(),
            first_harmonic: self.first_harmonic,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<Extraction, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use shapesig_pipeline::{Pipeline, PipelineConfig, PipelineError, RasterImage};
/// # use shapesig_pipeline::pipeline::{Advance, Stage};
/// # fn run(raster: RasterImage) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(raster, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let extraction = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Binarized`].
    Binarized(Binarized),
    /// See [`Traced`].
    Traced(Traced),
    /// See [`Signed`].
    Signed(Signed),
    /// See [`Described`].
    Described(Described),
}

/// Compile-time guard: adding a [`Stage`] variant makes this match
/// non-exhaustive until [`STAGE_COUNT`] is revisited.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Binarized(_)
        | Stage::Traced(_)
        | Stage::Signed(_)
        | Stage::Described(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Binarized(s) => s.$method($($arg),*),
            Self::Traced(s) => s.$method($($arg),*),
            Self::Signed(s) => s.$method($($arg),*),
            Self::Described(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Described(_))
    }

    /// Advance to the next stage. Returns `Ok(None)` if already
    /// complete (the final stage is consumed).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        match self.next()? {
            Some(next) => Ok(Advance::Next(next)),
            // Only the final stage yields `None`, and it was handled above.
            None => Err(PipelineError::NoShape),
        }
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<Extraction, PipelineError> {
        delegate!(self, complete)
    }
}

// The trait's associated constants aren't reachable through `self`, so
// the delegate macro goes through this helper.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

macro_rules! stage_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Stage {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

stage_from!(Pending, Binarized, Traced, Signed, Described);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental shape descriptor pipeline.
///
/// Created via [`Pipeline::new`], which stores the raster and config
/// without doing any processing. Each stage method consumes the current
/// state and returns the next, making it a compile-time error to skip
/// stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a raster and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(raster: RasterImage, config: PipelineConfig) -> Pending {
        Pending { config, raster }
    }
}
