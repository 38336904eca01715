//! Shared types for the papercut mask pipeline.

use serde::{Deserialize, Serialize};

use crate::darkness::RelativeDarknessParams;
use crate::fill::FillStrategyKind;
use crate::flip::{FlipHeuristic, InvertMode};
use crate::mask::BinaryMask;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` for composed panels.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// The two brightness thresholds driving segmentation.
///
/// `background` separates background from paper, `detail` (darker)
/// separates paper from interior cut-outs. The invariant
/// `detail <= background` is restored by [`corrected`](Self::corrected)
/// rather than rejected, so any pair of bytes is a usable input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPair {
    /// `t_bg`: pixels darker than this are candidate walls/background.
    pub background: u8,
    /// `t_detail`: pixels darker than this inside the paper are holes.
    pub detail: u8,
}

impl ThresholdPair {
    /// Build a pair from the background threshold and the distance down
    /// to the detail threshold (saturating at 0).
    #[must_use]
    pub const fn from_delta(background: u8, delta: u8) -> Self {
        Self {
            background,
            detail: background.saturating_sub(delta),
        }
    }

    /// The pair with `detail` clamped into `0..=background`.
    #[must_use]
    pub fn corrected(self) -> Self {
        Self {
            background: self.background,
            detail: self.detail.min(self.background),
        }
    }

    /// `background - detail` after correction.
    #[must_use]
    pub fn spread(self) -> u8 {
        let c = self.corrected();
        c.background - c.detail
    }
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self::from_delta(
            PipelineConfig::DEFAULT_THRESHOLD_BG,
            PipelineConfig::DEFAULT_DETAIL_DELTA,
        )
    }
}

/// Pixel radii for the morphology stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphologyParams {
    /// Closing radius for the background outline and hole seeds, and
    /// wall dilation for the paper fill.
    pub dilate_px: u32,
    /// Closing radius that bridges broken interior detail strokes.
    pub detail_join_px: u32,
    /// Blur radius for final edge softening.
    pub antialias: f32,
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self {
            dilate_px: PipelineConfig::DEFAULT_DILATE_PX,
            detail_join_px: PipelineConfig::DEFAULT_DETAIL_JOIN_PX,
            antialias: PipelineConfig::DEFAULT_ANTIALIAS,
        }
    }
}

/// Source normalization settings.
///
/// See [`crate::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationParams {
    /// Resolution the source is resampled towards when its DPI is
    /// known. `0` ignores DPI metadata.
    pub target_dpi: f64,
    /// Smallest upscale factor applied, at least `1.0`.
    pub min_upscale: f64,
    /// Blur radius at the working resolution, divided by the upscale
    /// factor before use.
    pub blur_radius: f32,
}

impl NormalizationParams {
    /// Upscale only, no anti-alias blur.
    #[must_use]
    pub fn no_blur() -> Self {
        Self {
            blur_radius: 0.0,
            ..Self::default()
        }
    }

    /// Skip normalization entirely.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            target_dpi: 0.0,
            min_upscale: 1.0,
            blur_radius: 0.0,
        }
    }
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            target_dpi: PipelineConfig::DEFAULT_NORMALIZE_DPI,
            min_upscale: PipelineConfig::DEFAULT_NORMALIZE_SCALE,
            blur_radius: PipelineConfig::DEFAULT_NORMALIZE_BLUR,
        }
    }
}

/// Configuration for the mask pipeline.
///
/// All parameters have defaults matching the tuned command-line tool.
/// Partial JSON documents are accepted: missing fields take their
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Background and detail thresholds.
    pub thresholds: ThresholdPair,

    /// Gaussian blur sigma applied after autocontrast.
    pub blur: f32,

    /// Closing, detail-join and antialias radii.
    pub morphology: MorphologyParams,

    /// Source resampling before grayscale conditioning.
    pub normalization: NormalizationParams,

    /// Polarity handling: analyse, keep, or always invert.
    pub invert_mode: InvertMode,

    /// Tuning for the automatic polarity decision.
    pub flip: FlipHeuristic,

    /// Constants for the local-contrast hole detector.
    pub relative_darkness: RelativeDarknessParams,

    /// Which flood-fill implementation closes regions.
    pub fill_strategy: FillStrategyKind,
}

impl PipelineConfig {
    /// Default background threshold.
    pub const DEFAULT_THRESHOLD_BG: u8 = 200;
    /// Default distance from background to detail threshold.
    pub const DEFAULT_DETAIL_DELTA: u8 = 60;
    /// Default preprocessing blur sigma.
    pub const DEFAULT_BLUR: f32 = 0.6;
    /// Default closing radius in pixels.
    pub const DEFAULT_DILATE_PX: u32 = 1;
    /// Default detail-join radius in pixels.
    pub const DEFAULT_DETAIL_JOIN_PX: u32 = 2;
    /// Default antialias radius in pixels.
    pub const DEFAULT_ANTIALIAS: f32 = 0.8;
    /// Default normalization target resolution.
    pub const DEFAULT_NORMALIZE_DPI: f64 = 300.0;
    /// Default minimum normalization upscale.
    pub const DEFAULT_NORMALIZE_SCALE: f64 = 2.0;
    /// Default normalization blur radius.
    pub const DEFAULT_NORMALIZE_BLUR: f32 = 0.8;

    /// Check numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first field
    /// that is negative or not finite, or a minimum upscale below `1.0`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let non_negative = [
            ("blur", f64::from(self.blur)),
            ("morphology.antialias", f64::from(self.morphology.antialias)),
            ("normalization.target_dpi", self.normalization.target_dpi),
            (
                "normalization.blur_radius",
                f64::from(self.normalization.blur_radius),
            ),
            ("flip.border_fraction", self.flip.border_fraction),
            ("flip.tolerance", self.flip.tolerance),
            ("flip.paper_ratio_limit", self.flip.paper_ratio_limit),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !(self.normalization.min_upscale.is_finite() && self.normalization.min_upscale >= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "normalization.min_upscale must be at least 1.0, got {}",
                self.normalization.min_upscale
            )));
        }
        if self.flip.border_fraction >= 0.5 {
            return Err(PipelineError::InvalidConfig(format!(
                "flip.border_fraction must be below 0.5, got {}",
                self.flip.border_fraction
            )));
        }
        if self.relative_darkness.drop_divisor == 0 {
            return Err(PipelineError::InvalidConfig(
                "relative_darkness.drop_divisor must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdPair::default(),
            blur: Self::DEFAULT_BLUR,
            morphology: MorphologyParams::default(),
            normalization: NormalizationParams::default(),
            invert_mode: InvertMode::default(),
            flip: FlipHeuristic::default(),
            relative_darkness: RelativeDarknessParams::default(),
            fill_strategy: FillStrategyKind::default(),
        }
    }
}

/// The four co-registered masks produced by one segmentation pass.
///
/// Invariants: `paper == filled AND NOT holes` and `holes ⊆ filled`.
/// `outline` is the closed below-background mask and may extend past
/// `filled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskResult {
    /// Final paper silhouette.
    pub paper: BinaryMask,
    /// Regions enclosed by the background outline.
    pub filled: BinaryMask,
    /// Interior cut-outs, limited to `filled`.
    pub holes: BinaryMask,
    /// Below-background pixels OR'ed with their closing.
    pub outline: BinaryMask,
}

impl MaskResult {
    /// Width and height shared by all four masks.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.paper.width(),
            height: self.paper.height(),
        }
    }
}

/// Everything a full pipeline run produces.
///
/// Carries the intermediates alongside the final masks so callers can
/// render debug overlays or recompose a panel at another scale without
/// re-running the early stages.
#[derive(Debug, Clone)]
pub struct MaskOutput {
    /// Grayscale after source normalization.
    pub normalized: GrayImage,
    /// Conditioned grayscale in segmentation polarity (already inverted
    /// when the flip was applied).
    pub processed: GrayImage,
    /// First segmentation pass, before any flip.
    pub preview: MaskResult,
    /// Segmentation that the final mask is taken from.
    pub masks: MaskResult,
    /// Whether the grayscale was inverted before `masks` were built.
    pub flipped: bool,
    /// Effective normalization upscale factor.
    pub normalize_scale: f64,
    /// Normalization blur radius actually applied.
    pub normalize_blur: f32,
    /// Antialias radius used for [`final_mask`](Self::final_mask).
    pub antialias: f32,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl MaskOutput {
    /// The paper mask softened by the antialias radius, kept bilevel.
    #[must_use]
    pub fn final_mask(&self) -> BinaryMask {
        crate::blur::soften_mask(&self.masks.paper, self.antialias)
    }
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The image decoded but has no pixels.
    #[error("image has zero dimension ({width}x{height})")]
    ZeroDimension {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// Page margins or overlap leave no printable area.
    #[error(
        "margins are too large for the page: printable area would be {inner_width}x{inner_height} px"
    )]
    DegenerateGeometry {
        /// Computed inner width in pixels (≤ 0 when degenerate).
        inner_width: i64,
        /// Computed inner height in pixels (≤ 0 when degenerate).
        inner_height: i64,
    },
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    ZeroDimension { width: u32, height: u32 },
    InvalidConfig(String),
    DegenerateGeometry { inner_width: i64, inner_height: i64 },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::ZeroDimension { width, height } => PipelineErrorProxy::ZeroDimension {
                width: *width,
                height: *height,
            },
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
            Self::DegenerateGeometry {
                inner_width,
                inner_height,
            } => PipelineErrorProxy::DegenerateGeometry {
                inner_width: *inner_width,
                inner_height: *inner_height,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image error cannot be rebuilt; keep its message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::ZeroDimension { width, height } => {
                Self::ZeroDimension { width, height }
            }
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PipelineErrorProxy::DegenerateGeometry {
                inner_width,
                inner_height,
            } => Self::DegenerateGeometry {
                inner_width,
                inner_height,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- ThresholdPair tests ---

    #[test]
    fn threshold_default_matches_cli_defaults() {
        let t = ThresholdPair::default();
        assert_eq!(t.background, 200);
        assert_eq!(t.detail, 140);
    }

    #[test]
    fn threshold_from_delta_saturates() {
        let t = ThresholdPair::from_delta(40, 60);
        assert_eq!(t.detail, 0);
    }

    #[test]
    fn threshold_detail_above_background_is_corrected() {
        let t = ThresholdPair {
            background: 120,
            detail: 180,
        };
        let c = t.corrected();
        assert_eq!(c.background, 120);
        assert_eq!(c.detail, 120);
        assert_eq!(t.spread(), 0);
    }

    // --- Dimensions tests ---

    #[test]
    fn dimensions_pixel_count_does_not_overflow() {
        let d = Dimensions {
            width: 100_000,
            height: 100_000,
        };
        assert_eq!(d.pixel_count(), 10_000_000_000);
    }

    // --- PipelineConfig tests ---

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn negative_blur_is_rejected() {
        let config = PipelineConfig {
            blur: -1.0,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("blur"), "got: {err}");
    }

    #[test]
    fn upscale_below_one_is_rejected() {
        let mut config = PipelineConfig::default();
        config.normalization.min_upscale = 0.5;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn nan_antialias_is_rejected() {
        let mut config = PipelineConfig::default();
        config.morphology.antialias = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"thresholds":{"background":180,"detail":90},"blur":0.0}"#)
                .unwrap();
        assert_eq!(config.thresholds.background, 180);
        assert_eq!(config.thresholds.detail, 90);
        assert!((config.blur - 0.0).abs() < f32::EPSILON);
        assert_eq!(config.morphology, MorphologyParams::default());
        assert_eq!(config.invert_mode, InvertMode::Auto);
    }

    #[test]
    fn config_serde_round_trip() {
        let config = PipelineConfig {
            invert_mode: InvertMode::Flip,
            fill_strategy: FillStrategyKind::BreadthFirst,
            normalization: NormalizationParams::no_blur(),
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    // --- PipelineError tests ---

    #[test]
    fn degenerate_geometry_message_names_margins() {
        let err = PipelineError::DegenerateGeometry {
            inner_width: -10,
            inner_height: 3000,
        };
        assert!(err.to_string().contains("margins are too large"));
        assert!(err.to_string().contains("-10x3000"));
    }

    #[test]
    fn error_serde_round_trip() {
        let err = PipelineError::ZeroDimension {
            width: 0,
            height: 5,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            PipelineError::ZeroDimension {
                width: 0,
                height: 5
            }
        ));
    }

    #[test]
    fn image_decode_error_serializes_as_message() {
        let decode_err = image::load_from_memory(&[0xFF, 0x00]).unwrap_err();
        let err = PipelineError::from(decode_err);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("ImageDecode"), "got: {json}");
    }
}
