//! shapesig: CLI for Fourier shape descriptors.
//!
//! Runs the shape descriptor pipeline on image files and evaluates
//! labeled collections of them. Useful for:
//!
//! - Inspecting the mask, contour and descriptor of a single drawing
//! - Measuring per-stage durations and counts
//! - Cross-validating a labeled set of triangles, squares and circles
//! - Classifying a new drawing against labeled references
//!
//! # Usage
//!
//! ```text
//! shapesig describe drawing.png --mask mask.png --overlay contour.png
//! shapesig evaluate triangle=t1.png triangle=t2.png square=s1.png circle=c1.png
//! shapesig classify query.png --reference triangle=t1.png --reference circle=c1.png
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use shapesig_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use shapesig_pipeline::{
    ComplexSignature, Dataset, Descriptor, Dimensions, Extraction, Label, PipelineConfig,
    PipelineError, Polarity, RasterImage, Sample, ThresholdStrategy,
};
use tracing_subscriber::EnvFilter;

/// Number of signature points and descriptor entries shown by `describe`.
const PREVIEW_LEN: usize = 5;

/// Fourier shape descriptors for drawn triangles, squares and circles.
#[derive(Parser)]
#[command(name = "shapesig", version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

/// Pipeline parameters shared by every subcommand.
#[derive(Args)]
struct ConfigArgs {
    /// Descriptor length K.
    #[arg(long, global = true, default_value_t = PipelineConfig::DEFAULT_DESCRIPTOR_LEN, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    descriptor_len: usize,

    /// Gaussian blur sigma before thresholding (0 disables).
    #[arg(long, global = true, default_value_t = PipelineConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Fixed threshold level (0-255). Otsu's method is used when omitted.
    #[arg(long, global = true)]
    threshold: Option<u8>,

    /// Which side of the threshold is the shape.
    #[arg(long, global = true, value_enum, default_value_t = PolarityArg::Auto)]
    polarity: PolarityArg,

    /// Morphological closing radius (0 disables).
    #[arg(long, global = true, default_value_t = PipelineConfig::DEFAULT_CLOSE_RADIUS)]
    close_radius: u8,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long, global = true)]
    config_json: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract and print the descriptor of one image.
    Describe {
        /// Path to the input image (PNG, JPEG, BMP, WebP).
        image: PathBuf,

        /// Write the binary mask as a PNG.
        #[arg(long)]
        mask: Option<PathBuf>,

        /// Write the traced contour overlay as a PNG.
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Output JSON instead of a human-readable summary.
        #[arg(long)]
        json: bool,

        /// Include per-stage timing and metrics.
        #[arg(long)]
        diagnostics: bool,
    },
    /// Leave-one-out 1-NN evaluation of labeled images.
    Evaluate {
        /// Labeled images as `LABEL=PATH` (label: triangle, square, circle).
        #[arg(required = true, value_parser = parse_labeled_path)]
        samples: Vec<LabeledPath>,

        /// Output the evaluation as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Predict the label of an image from labeled references.
    Classify {
        /// Path to the image to classify.
        image: PathBuf,

        /// Labeled reference image as `LABEL=PATH`; repeat for each.
        #[arg(long = "reference", required = true, value_parser = parse_labeled_path)]
        references: Vec<LabeledPath>,
    },
}

/// Polarity selection.
#[derive(Clone, Copy, ValueEnum)]
enum PolarityArg {
    /// The minority side of the threshold is the shape.
    Auto,
    /// Dark pixels are the shape.
    Dark,
    /// Light pixels are the shape.
    Light,
}

/// An image path tagged with its label.
#[derive(Clone, Debug)]
struct LabeledPath {
    label: Label,
    path: PathBuf,
}

fn parse_labeled_path(s: &str) -> Result<LabeledPath, String> {
    let (label, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=PATH, got {s:?}"))?;
    let label = label.parse::<Label>().map_err(|e| e.to_string())?;
    if path.is_empty() {
        return Err(format!("missing path in {s:?}"));
    }
    Ok(LabeledPath {
        label,
        path: PathBuf::from(path),
    })
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(args: &ConfigArgs) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = args.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            descriptor_len: args.descriptor_len,
            blur_sigma: args.blur_sigma,
            threshold: args
                .threshold
                .map_or(ThresholdStrategy::Otsu, ThresholdStrategy::Fixed),
            polarity: match args.polarity {
                PolarityArg::Auto => Polarity::Auto,
                PolarityArg::Dark => Polarity::DarkForeground,
                PolarityArg::Light => Polarity::LightForeground,
            },
            close_radius: args.close_radius,
            ..PipelineConfig::default()
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli.config) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, "pipeline config");

    let result = match cli.command {
        Command::Describe {
            image,
            mask,
            overlay,
            json,
            diagnostics,
        } => describe(
            &image,
            &config,
            &DescribeOptions {
                mask,
                overlay,
                json,
                diagnostics,
            },
        ),
        Command::Evaluate { samples, json } => evaluate(&samples, &config, json),
        Command::Classify { image, references } => classify(&image, &references, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// Read and decode an image file.
fn load_raster(path: &Path) -> Result<RasterImage, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    shapesig_pipeline::grayscale::decode(&bytes)
        .map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

// ───────────────────────────── describe ─────────────────────────────

struct DescribeOptions {
    mask: Option<PathBuf>,
    overlay: Option<PathBuf>,
    json: bool,
    diagnostics: bool,
}

/// JSON shape of `describe` output.
#[derive(Serialize)]
struct DescribeOutput<'a> {
    image: String,
    dimensions: Dimensions,
    contour_points: usize,
    signature_head: ComplexSignature,
    descriptor: &'a Descriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a PipelineDiagnostics>,
}

fn describe(image: &Path, config: &PipelineConfig, options: &DescribeOptions) -> Result<(), String> {
    let raster = load_raster(image)?;
    let (extraction, diagnostics) = if options.diagnostics {
        let (extraction, diagnostics) =
            shapesig_pipeline::diagnostics::process_with_diagnostics(raster, config, &StdClock)
                .map_err(|e| format!("Pipeline error: {e}"))?;
        (extraction, Some(diagnostics))
    } else {
        let extraction = shapesig_pipeline::process(&raster, config)
            .map_err(|e| format!("Pipeline error: {e}"))?;
        (extraction, None)
    };

    if let Some(ref path) = options.mask {
        write_png(&shapesig_pipeline::render::mask_image(&extraction.mask), path, "Mask")?;
    }
    if let Some(ref path) = options.overlay {
        let overlay =
            shapesig_pipeline::render::contour_overlay(&extraction.contour, extraction.dimensions);
        write_png(&overlay, path, "Overlay")?;
    }

    let signature_head = ComplexSignature::new(
        extraction
            .signature
            .values()
            .iter()
            .take(PREVIEW_LEN)
            .copied()
            .collect(),
    );

    if options.json {
        let output = DescribeOutput {
            image: image.display().to_string(),
            dimensions: extraction.dimensions,
            contour_points: extraction.contour.len(),
            signature_head,
            descriptor: &extraction.descriptor,
            diagnostics: diagnostics.as_ref(),
        };
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| format!("Error serializing output: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    print_summary(image, &extraction, &signature_head);
    if let Some(ref diagnostics) = diagnostics {
        println!();
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn print_summary(image: &Path, extraction: &Extraction, signature_head: &ComplexSignature) {
    println!(
        "Image: {} ({}x{})",
        image.display(),
        extraction.dimensions.width,
        extraction.dimensions.height,
    );
    println!("Contour points (N): {}", extraction.contour.len());
    println!("Signature (first {}):", signature_head.len());
    for (i, z) in signature_head.values().iter().enumerate() {
        println!("  z[{i}] = {:>9.3} {:+9.3}i", z.re, z.im);
    }
    let descriptor = extraction.descriptor.values();
    println!(
        "Descriptor (first {} of K={}):",
        descriptor.len().min(PREVIEW_LEN),
        descriptor.len(),
    );
    for (j, v) in descriptor.iter().take(PREVIEW_LEN).enumerate() {
        println!("  |c{}|/|c1| = {v:.6}", j + 1);
    }
}

fn write_png(image: &RasterImage, path: &Path, what: &str) -> Result<(), String> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| format!("Error writing {what} to {}: {e}", path.display()))?;
    eprintln!("{what} written to {}", path.display());
    Ok(())
}

// ──────────────────────── evaluate / classify ───────────────────────

/// Extract every labeled image into a dataset.
///
/// Images in which no usable shape is found are skipped with a warning;
/// unreadable files abort the run.
fn build_dataset(samples: &[LabeledPath], config: &PipelineConfig) -> Result<Dataset, String> {
    let mut dataset = Dataset::new(config.descriptor_len);
    for LabeledPath { label, path } in samples {
        let raster = load_raster(path)?;
        match shapesig_pipeline::process(&raster, config) {
            Ok(extraction) => {
                dataset
                    .push(Sample::new(*label, extraction.descriptor))
                    .map_err(|e| format!("Error adding {}: {e}", path.display()))?;
                tracing::debug!(%label, path = %path.display(), "added sample");
            }
            Err(e @ (PipelineError::NoShape | PipelineError::DegenerateShape { .. })) => {
                tracing::warn!(%label, path = %path.display(), "skipping image: {e}");
            }
            Err(e) => return Err(format!("Pipeline error on {}: {e}", path.display())),
        }
    }
    let [triangles, squares, circles] = dataset.counts();
    tracing::info!(
        total = dataset.len(),
        triangles,
        squares,
        circles,
        "dataset ready"
    );
    Ok(dataset)
}

fn evaluate(samples: &[LabeledPath], config: &PipelineConfig, json: bool) -> Result<(), String> {
    let dataset = build_dataset(samples, config)?;
    let evaluation =
        shapesig_pipeline::evaluate(&dataset).map_err(|e| format!("Evaluation error: {e}"))?;

    if json {
        let json = serde_json::to_string_pretty(&evaluation)
            .map_err(|e| format!("Error serializing evaluation: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", evaluation.report());
    }
    Ok(())
}

fn classify(
    image: &Path,
    references: &[LabeledPath],
    config: &PipelineConfig,
) -> Result<(), String> {
    let dataset = build_dataset(references, config)?;
    let raster = load_raster(image)?;
    let extraction =
        shapesig_pipeline::process(&raster, config).map_err(|e| format!("Pipeline error: {e}"))?;
    let prediction = shapesig_pipeline::classify(&dataset, &extraction.descriptor)
        .map_err(|e| format!("Classification error: {e}"))?;

    // Index into the dataset, which omits skipped references.
    let neighbor = &dataset.samples()[prediction.nearest];
    println!(
        "{}: {} (nearest {} sample #{}, distance {:.6})",
        image.display(),
        prediction.label,
        neighbor.label(),
        prediction.nearest,
        prediction.distance,
    );
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("shapesig").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn labeled_path_parses() {
        let lp = parse_labeled_path("circle=shapes/c1.png").unwrap();
        assert_eq!(lp.label, Label::Circle);
        assert_eq!(lp.path, PathBuf::from("shapes/c1.png"));
    }

    #[test]
    fn labeled_path_keeps_equals_in_path() {
        let lp = parse_labeled_path("square=a=b.png").unwrap();
        assert_eq!(lp.label, Label::Square);
        assert_eq!(lp.path, PathBuf::from("a=b.png"));
    }

    #[test]
    fn labeled_path_rejects_bad_input() {
        assert!(parse_labeled_path("c1.png").is_err());
        assert!(parse_labeled_path("hexagon=c1.png").is_err());
        assert!(parse_labeled_path("circle=").is_err());
    }

    #[test]
    fn flags_build_config() {
        let cli = parse(&[
            "describe",
            "x.png",
            "--descriptor-len",
            "16",
            "--threshold",
            "90",
            "--polarity",
            "dark",
            "--close-radius",
            "0",
        ]);
        let config = config_from_cli(&cli.config).unwrap();
        assert_eq!(config.descriptor_len, 16);
        assert_eq!(config.threshold, ThresholdStrategy::Fixed(90));
        assert_eq!(config.polarity, Polarity::DarkForeground);
        assert_eq!(config.close_radius, 0);
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let cli = parse(&["describe", "x.png"]);
        assert_eq!(config_from_cli(&cli.config).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "--config-json",
            r#"{"descriptor_len": 8}"#,
            "--descriptor-len",
            "16",
            "evaluate",
            "circle=a.png",
        ]);
        let config = config_from_cli(&cli.config).unwrap();
        assert_eq!(config.descriptor_len, 8);
    }

    #[test]
    fn invalid_config_json_is_reported() {
        let cli = parse(&["--config-json", r#"{"descriptor_len": 0}"#, "describe", "x.png"]);
        assert!(config_from_cli(&cli.config).is_err());
    }

    #[test]
    fn zero_descriptor_len_flag_is_rejected() {
        let result = Cli::try_parse_from(["shapesig", "describe", "x.png", "--descriptor-len", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn classify_requires_references() {
        let result = Cli::try_parse_from(["shapesig", "classify", "q.png"]);
        assert!(result.is_err());
        let cli = parse(&[
            "classify",
            "q.png",
            "--reference",
            "triangle=t.png",
            "--reference",
            "circle=c.png",
        ]);
        let Command::Classify { references, .. } = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(references.len(), 2);
        assert_eq!(references[1].label, Label::Circle);
    }
}
