//! papercut-pipeline: Papercut stencil mask extraction (sans-IO).
//!
//! Turns a photograph or drawing of a silhouette into a binary paper
//! mask through:
//! decode -> normalize -> autocontrast/blur -> dual-threshold
//! segmentation -> polarity decision -> optional re-segmentation.
//!
//! The mask can then be composed white-on-gray into a multi-page panel
//! ([`panel`]) laid out on an A4 grid ([`layout`]), and thin bridges in
//! a finished mask can be thickened ([`bridge`]).
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and images. Tile slicing, page serialization and all
//! filesystem access live in `papercut-export` and `papercut-cli`.

pub mod blur;
pub mod bridge;
pub mod darkness;
pub mod detail;
pub mod diagnostics;
pub mod edge;
pub mod fill;
pub mod flip;
pub mod grayscale;
pub mod layout;
pub mod mask;
pub mod morphology;
pub mod normalize;
pub mod panel;
pub mod pipeline;
pub mod scale;
pub mod segment;
pub mod types;
pub mod units;

pub use bridge::{BridgeOutcome, BridgeParams, enforce_min_bridge};
pub use darkness::RelativeDarknessParams;
pub use diagnostics::{Clock, PipelineDiagnostics, process_with_diagnostics};
pub use fill::{FillStrategyKind, RegionFiller};
pub use flip::{FlipHeuristic, InvertMode};
pub use layout::{PanelLayout, TileRect};
pub use mask::BinaryMask;
pub use panel::{ComposedPanel, FitMode, PanelConfig, compose_panel, render_preview};
pub use pipeline::Pipeline;
pub use types::{
    Dimensions, GrayImage, MaskOutput, MaskResult, MorphologyParams, NormalizationParams,
    PipelineConfig, PipelineError, RgbImage, ThresholdPair,
};

/// Run the mask pipeline in one call.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// and returns a [`MaskOutput`] with the final masks and every
/// intermediate.
///
/// # Pipeline steps
///
/// 1. Validate the config, decode, convert to grayscale
/// 2. Normalize the source (upscale, anti-alias blur, downscale)
/// 3. Autocontrast and Gaussian blur
/// 4. Dual-threshold segmentation
/// 5. Polarity decision; invert and re-segment when it applies
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the config fails
/// validation.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::ZeroDimension`] if the image has no pixels.
pub fn process(image_bytes: &[u8], config: &PipelineConfig) -> Result<MaskOutput, PipelineError> {
    process_with_source_dpi(image_bytes, config, None)
}

/// Like [`process`], with the source resolution `(x, y)` read from file
/// metadata by the caller.
///
/// # Errors
///
/// As [`process`].
pub fn process_with_source_dpi(
    image_bytes: &[u8],
    config: &PipelineConfig,
    source_dpi: Option<(f64, f64)>,
) -> Result<MaskOutput, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .with_source_dpi(source_dpi)
        .decode()?
        .normalize()
        .preprocess()
        .segment()
        .into_output())
}
