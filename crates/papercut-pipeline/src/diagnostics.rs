//! Pipeline diagnostics: timing and pixel counts for each stage.
//!
//! These are permanent instrumentation for threshold tuning. Time is
//! read through the [`Clock`] trait so this crate stays free of any
//! particular time source; the command-line tool supplies one backed by
//! [`std::time::Instant`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::flip;
use crate::grayscale;
use crate::normalize;
use crate::segment;
use crate::types::{Dimensions, MaskOutput, PipelineConfig, PipelineError};

/// Monotonic time source.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
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
    /// Stage 0: decoding to grayscale.
    pub decode: StageDiagnostics,
    /// Stage 1: source normalization.
    pub normalize: StageDiagnostics,
    /// Stage 2: autocontrast and blur.
    pub preprocess: StageDiagnostics,
    /// Stage 3: first segmentation pass.
    pub preview: StageDiagnostics,
    /// Stage 4: polarity decision.
    pub flip: StageDiagnostics,
    /// Stage 5: segmentation of the inverted image (only when flipped).
    pub resegment: Option<StageDiagnostics>,
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
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
    },
    /// Normalization metrics.
    Normalize {
        /// Effective upscale factor.
        upscale: f64,
        /// Blur radius applied at the upscaled size.
        blur: f32,
    },
    /// Preprocessing metrics.
    Preprocess {
        /// Darkest sample before autocontrast.
        min: u8,
        /// Brightest sample before autocontrast.
        max: u8,
        /// Blur sigma applied after autocontrast.
        blur: f32,
    },
    /// Segmentation metrics.
    Segment {
        /// Below-background pixels after closing.
        outline_pixels: u64,
        /// Enclosed region pixels.
        filled_pixels: u64,
        /// Hole pixels.
        hole_pixels: u64,
        /// Final paper pixels.
        paper_pixels: u64,
    },
    /// Polarity decision metrics.
    Flip {
        /// Requested mode.
        mode: flip::InvertMode,
        /// Paper ratio of the preview segmentation.
        paper_ratio: f64,
        /// Mean brightness of the border band.
        border_mean: f64,
        /// Mean brightness of the center.
        center_mean: f64,
        /// Whether the image was inverted.
        flipped: bool,
    },
}

/// High-level summary for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Final paper pixels.
    pub paper_pixels: u64,
    /// Final paper ratio.
    pub paper_ratio: f64,
    /// Whether the image was inverted.
    pub flipped: bool,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
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

        let mut stages: Vec<(&str, &StageDiagnostics)> = vec![
            ("Decode", &self.decode),
            ("Normalize", &self.normalize),
            ("Preprocess", &self.preprocess),
            ("Preview Segmentation", &self.preview),
            ("Flip Decision", &self.flip),
        ];
        if let Some(ref r) = self.resegment {
            stages.push(("Re-segmentation", r));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Paper: {} px ({:.1}%)  |  Flipped: {}",
            self.summary.paper_pixels,
            self.summary.paper_ratio * 100.0,
            self.summary.flipped,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Normalize { upscale, blur } => format!("x{upscale:.2} blur={blur:.2}"),
        StageMetrics::Preprocess { min, max, blur } => {
            format!("range={min}..{max} blur={blur:.2}")
        }
        StageMetrics::Segment {
            outline_pixels,
            filled_pixels,
            hole_pixels,
            paper_pixels,
        } => format!(
            "outline={outline_pixels} filled={filled_pixels} holes={hole_pixels} paper={paper_pixels}"
        ),
        StageMetrics::Flip {
            mode,
            paper_ratio,
            border_mean,
            center_mean,
            flipped,
        } => format!(
            "{mode} ratio={paper_ratio:.2} border={border_mean:.1} center={center_mean:.1} -> {}",
            if *flipped { "flip" } else { "keep" }
        ),
    }
}

fn segment_metrics(masks: &crate::types::MaskResult) -> StageMetrics {
    StageMetrics::Segment {
        outline_pixels: masks.outline.count(),
        filled_pixels: masks.filled.count(),
        hole_pixels: masks.holes.count(),
        paper_pixels: masks.paper.count(),
    }
}

/// Run the mask pipeline, timing each stage.
///
/// Produces the same [`MaskOutput`] as [`crate::process_with_source_dpi`].
///
/// # Errors
///
/// As [`crate::process`].
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    source_dpi: Option<(f64, f64)>,
    clock: &C,
) -> Result<(MaskOutput, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    config.validate()?;

    // ───── Stage 0: Decode ─────
    let t = clock.now();
    let gray = grayscale::decode_and_grayscale(image_bytes)?;
    let dimensions = Dimensions {
        width: gray.width(),
        height: gray.height(),
    };
    let decode = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: dimensions.width,
            height: dimensions.height,
        },
    };

    // ───── Stage 1: Normalize ─────
    let t = clock.now();
    let normalized = normalize::normalize_source(&gray, &config.normalization, source_dpi);
    let normalize = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Normalize {
            upscale: normalized.upscale,
            blur: normalized.blur,
        },
    };

    // ───── Stage 2: Preprocess ─────
    let t = clock.now();
    let (min, max) = normalized
        .image
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let processed = grayscale::prepare(&normalized.image, config.blur);
    let preprocess = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Preprocess {
            min,
            max,
            blur: config.blur,
        },
    };

    // ───── Stage 3: Preview segmentation ─────
    let t = clock.now();
    let preview_masks = segment::segment(&processed, config);
    let preview = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: segment_metrics(&preview_masks),
    };

    // ───── Stage 4: Flip decision ─────
    let t = clock.now();
    let flipped = flip::should_flip(&processed, &preview_masks, config.invert_mode, &config.flip);
    let (border_mean, center_mean) =
        flip::border_and_center_means(&processed, config.flip.border_fraction);
    let flip_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Flip {
            mode: config.invert_mode,
            paper_ratio: preview_masks.paper.ratio(),
            border_mean,
            center_mean,
            flipped,
        },
    };

    // ───── Stage 5: Re-segmentation ─────
    let (processed, masks, resegment) = if flipped {
        let t = clock.now();
        let inverted = grayscale::invert(&processed);
        let masks = segment::segment(&inverted, config);
        let diag = StageDiagnostics {
            duration: clock.elapsed(&t),
            metrics: segment_metrics(&masks),
        };
        (inverted, masks, Some(diag))
    } else {
        let masks = preview_masks.clone();
        (processed, masks, None)
    };

    let summary = PipelineSummary {
        image_width: dimensions.width,
        image_height: dimensions.height,
        pixel_count: dimensions.pixel_count(),
        paper_pixels: masks.paper.count(),
        paper_ratio: masks.paper.ratio(),
        flipped,
    };

    let output = MaskOutput {
        normalized: normalized.image,
        processed,
        preview: preview_masks,
        masks,
        flipped,
        normalize_scale: normalized.upscale,
        normalize_blur: normalized.blur,
        antialias: config.morphology.antialias,
        dimensions,
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        normalize,
        preprocess,
        preview,
        flip: flip_diag,
        resegment,
        total_duration: clock.elapsed(&start),
        summary,
    };

    Ok((output, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::flip::InvertMode;

    /// A clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn square_png() -> Vec<u8> {
        let img = image::GrayImage::from_fn(40, 40, |x, y| {
            let inside = (10..30).contains(&x) && (10..30).contains(&y);
            image::Luma([if inside { 230 } else { 20 }])
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_match_plain_run() {
        let png = square_png();
        let config = PipelineConfig::default();
        let (output, diag) =
            process_with_diagnostics(&png, &config, None, &TickClock(Cell::new(0))).unwrap();
        let plain = crate::process(&png, &config).unwrap();
        assert_eq!(output.masks, plain.masks);
        assert_eq!(diag.summary.image_width, 40);
        assert_eq!(diag.summary.paper_pixels, plain.masks.paper.count());
        assert!(diag.resegment.is_none());
        assert!(diag.total_duration >= diag.decode.duration);
    }

    #[test]
    fn forced_flip_records_resegmentation() {
        let config = PipelineConfig {
            invert_mode: InvertMode::Flip,
            ..PipelineConfig::default()
        };
        let (output, diag) =
            process_with_diagnostics(&square_png(), &config, None, &TickClock(Cell::new(0)))
                .unwrap();
        assert!(output.flipped);
        assert!(diag.resegment.is_some());
        let report = diag.report();
        assert!(report.contains("Re-segmentation"));
        assert!(report.contains("Flipped: true"));
    }

    #[test]
    fn diagnostics_serialize_to_json() {
        let (_, diag) = process_with_diagnostics(
            &square_png(),
            &PipelineConfig::default(),
            None,
            &TickClock(Cell::new(0)),
        )
        .unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.pixel_count, 1600);
        assert_eq!(back.decode.duration, diag.decode.duration);
    }

    #[test]
    fn errors_propagate() {
        let result = process_with_diagnostics(
            &[],
            &PipelineConfig::default(),
            None,
            &TickClock(Cell::new(0)),
        );
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }
}
