//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation for parameter
//! experimentation: how the threshold, closing radius or descriptor length
//! change the mask, the contour and the spectrum.
//!
//! Time is read through the [`Clock`] trait so the crate itself never
//! touches a platform clock. Durations are serialized as fractional
//! seconds (`f64`) for JSON compatibility, since `std::time::Duration`
//! does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{Extraction, PipelineConfig, PipelineError, RasterImage};

/// Source of monotonic time for stage measurements.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: luma, blur, threshold, polarity, closing.
    pub binarize: StageDiagnostics,
    /// Stage 2: contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Stage 3: complex signature.
    pub signature: StageDiagnostics,
    /// Stage 4: Fourier descriptor.
    pub descriptor: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<StageMetrics>,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Binarization metrics.
    Binarize {
        /// Raster width in pixels.
        width: u32,
        /// Raster height in pixels.
        height: u32,
        /// Threshold level; pixels above it are bright.
        level: u8,
        /// Whether dark pixels were taken as foreground.
        dark_foreground: bool,
        /// Foreground pixels in the final mask.
        foreground_pixels: u64,
        /// `width * height`.
        total_pixels: u64,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Points on the traced boundary.
        point_count: usize,
        /// Whether the last point is 8-adjacent to the first.
        closed: bool,
        /// Walk bound in effect.
        step_bound: usize,
    },
    /// Signature metrics.
    Signature {
        /// Number of complex samples (N).
        sample_count: usize,
        /// Contour centroid, x.
        centroid_x: f64,
        /// Contour centroid, y.
        centroid_y: f64,
    },
    /// Descriptor metrics.
    Descriptor {
        /// Descriptor length K.
        descriptor_len: usize,
        /// `|c_1|` before normalization.
        first_harmonic: f64,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Points on the traced contour.
    pub contour_points: usize,
    /// Descriptor length K.
    pub descriptor_len: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable text report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Binarize", &self.binarize),
            ("Contour Tracing", &self.contour_tracing),
            ("Signature", &self.signature),
            ("Descriptor", &self.descriptor),
        ];

        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = diag.metrics.as_ref().map_or_else(String::new, format_metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Contour points: {}  |  Descriptor length: {}",
            self.summary.contour_points, self.summary.descriptor_len,
        ));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Binarize {
            width,
            height,
            level,
            dark_foreground,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let coverage = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            let polarity = if *dark_foreground { "dark" } else { "light" };
            format!(
                "{width}x{height} level={level} fg={polarity} {foreground_pixels} px ({coverage:.1}%)",
            )
        }
        StageMetrics::ContourTracing {
            point_count,
            closed,
            step_bound,
        } => {
            let state = if *closed { "closed" } else { "open" };
            format!("{point_count} pts, {state} (bound={step_bound})")
        }
        StageMetrics::Signature {
            sample_count,
            centroid_x,
            centroid_y,
        } => format!("N={sample_count} centroid=({centroid_x:.2}, {centroid_y:.2})"),
        StageMetrics::Descriptor {
            descriptor_len,
            first_harmonic,
        } => format!("K={descriptor_len} |c1|={first_harmonic:.3}"),
    }
}

/// Time a stage that has just been reached.
fn measure<C: Clock, S: PipelineStage>(clock: &C, start: &C::Instant, stage: &S) -> StageDiagnostics {
    StageDiagnostics {
        duration: clock.elapsed(start),
        metrics: stage.metrics(),
    }
}

/// Run the full pipeline, collecting per-stage diagnostics.
///
/// # Errors
///
/// Same as [`crate::process`].
pub fn process_with_diagnostics<C: Clock>(
    raster: RasterImage,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(Extraction, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let total_start = clock.now();

    let start = clock.now();
    let binarized = Pipeline::new(raster, config.clone()).binarize();
    let binarize = measure(clock, &start, &binarized);

    let start = clock.now();
    let traced = binarized.trace()?;
    let contour_tracing = measure(clock, &start, &traced);

    let start = clock.now();
    let signed = traced.sign()?;
    let signature = measure(clock, &start, &signed);

    let start = clock.now();
    let described = signed.describe()?;
    let descriptor = measure(clock, &start, &described);

    let extraction = described.into_result();
    let total_duration = clock.elapsed(&total_start);

    let summary = PipelineSummary {
        image_width: extraction.dimensions.width,
        image_height: extraction.dimensions.height,
        pixel_count: extraction.dimensions.pixel_count(),
        contour_points: extraction.contour.len(),
        descriptor_len: extraction.descriptor.len(),
    };

    Ok((
        extraction,
        PipelineDiagnostics {
            binarize,
            contour_tracing,
            signature,
            descriptor,
            total_duration,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl TickClock {
        const fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn ring() -> RasterImage {
        RasterImage::from_fn(48, 48, |x, y| {
            let dx = f64::from(x) - 24.0;
            let dy = f64::from(y) - 24.0;
            if dx.hypot(dy) < 15.0 {
                image::Rgba([10, 10, 10, 255])
            } else {
                image::Rgba([250, 250, 250, 255])
            }
        })
    }

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics: Some(metrics),
        }
    }

    fn sample_diagnostics() -> PipelineDiagnostics {
        let binarize = stage(
            10,
            StageMetrics::Binarize {
                width: 100,
                height: 80,
                level: 121,
                dark_foreground: true,
                foreground_pixels: 2000,
                total_pixels: 8000,
            },
        );
        let contour_tracing = stage(
            5,
            StageMetrics::ContourTracing {
                point_count: 180,
                closed: true,
                step_bound: 32_008,
            },
        );
        let signature = stage(
            1,
            StageMetrics::Signature {
                sample_count: 180,
                centroid_x: 50.0,
                centroid_y: 40.0,
            },
        );
        let descriptor = stage(
            2,
            StageMetrics::Descriptor {
                descriptor_len: 32,
                first_harmonic: 4321.5,
            },
        );
        PipelineDiagnostics {
            binarize,
            contour_tracing,
            signature,
            descriptor,
            total_duration: Duration::from_millis(18),
            summary: PipelineSummary {
                image_width: 100,
                image_height: 80,
                pixel_count: 8000,
                contour_points: 180,
                descriptor_len: 32,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample_diagnostics().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Image: 100x80 (8000 pixels)"));
        for name in ["Binarize", "Contour Tracing", "Signature", "Descriptor"] {
            assert!(report.contains(name), "missing {name}");
        }
        assert!(report.contains("level=121 fg=dark 2000 px (25.0%)"));
        assert!(report.contains("180 pts, closed"));
        assert!(report.contains("K=32"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample_diagnostics()).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.018).abs() < 1e-12);
        assert!((json["binarize"]["duration"].as_f64().unwrap() - 0.010).abs() < 1e-12);
    }

    #[test]
    fn diagnostics_json_roundtrip() {
        let diag = sample_diagnostics();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_duration, diag.total_duration);
        assert_eq!(back.descriptor.metrics, diag.descriptor.metrics);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let result: Result<StageDiagnostics, _> =
            serde_json::from_str(r#"{"duration": -1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn process_with_diagnostics_matches_process() {
        let config = PipelineConfig::default();
        let clock = TickClock::new();
        let (extraction, diag) = process_with_diagnostics(ring(), &config, &clock).unwrap();

        assert_eq!(extraction, crate::process(&ring(), &config).unwrap());
        assert_eq!(diag.summary.image_width, 48);
        assert_eq!(diag.summary.contour_points, extraction.contour.len());
        assert_eq!(diag.summary.descriptor_len, 32);
        assert!(diag.total_duration >= diag.binarize.duration);
        assert!(matches!(
            diag.contour_tracing.metrics,
            Some(StageMetrics::ContourTracing { closed: true, .. })
        ));
        assert!(matches!(
            diag.binarize.metrics,
            Some(StageMetrics::Binarize {
                dark_foreground: true,
                ..
            })
        ));
    }

    #[test]
    fn invalid_config_is_rejected_before_processing() {
        let config = PipelineConfig {
            descriptor_len: 0,
            ..PipelineConfig::default()
        };
        let clock = TickClock::new();
        let result = process_with_diagnostics(ring(), &config, &clock);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
        assert_eq!(clock.ticks.get(), 0);
    }
}
