//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use papercut_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let output = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .normalize()
//!     .preprocess()
//!     .segment()
//!     .into_output();
//! let mask = output.final_mask();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, carrying
//! the intermediates the later stages and [`MaskOutput`] need.

use image::GrayImage;

use crate::flip;
use crate::grayscale;
use crate::normalize;
use crate::segment;
use crate::types::{Dimensions, MaskOutput, MaskResult, PipelineConfig, PipelineError};

/// Entry point for the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Store the source bytes and config. No processing happens until
    /// [`Pending::decode`].
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
            source_dpi: None,
        }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
    source_dpi: Option<(f64, f64)>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Attach the source resolution `(x, y)` read from file metadata.
    ///
    /// Normalization raises its upscale factor for low-DPI sources.
    pub const fn with_source_dpi(mut self, dpi: Option<(f64, f64)>) -> Self {
        self.source_dpi = dpi;
        self
    }

    /// Validate the config, decode the source and convert it to
    /// grayscale.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidConfig`] from [`PipelineConfig::validate`],
    /// [`PipelineError::EmptyInput`], [`PipelineError::ImageDecode`] or
    /// [`PipelineError::ZeroDimension`] from decoding.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let gray = grayscale::decode_and_grayscale(&self.source)?;
        tracing::info!(
            bytes = self.source.len(),
            width = gray.width(),
            height = gray.height(),
            "decoded source"
        );
        Ok(Decoded {
            config: self.config,
            source_dpi: self.source_dpi,
            source_len: self.source.len(),
            gray,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding to grayscale.
#[must_use = "pipeline stages are consumed by advancing; call .normalize() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    source_dpi: Option<(f64, f64)>,
    source_len: usize,
    gray: GrayImage,
}

impl Decoded {
    /// The decoded grayscale image.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Size of the encoded source in bytes.
    #[must_use]
    pub const fn source_len(&self) -> usize {
        self.source_len
    }

    /// Run source normalization.
    pub fn normalize(self) -> Normalized {
        let dimensions = Dimensions {
            width: self.gray.width(),
            height: self.gray.height(),
        };
        let result =
            normalize::normalize_source(&self.gray, &self.config.normalization, self.source_dpi);
        if result.upscale > 1.0 || result.blur > 0.0 {
            tracing::info!(
                scale = result.upscale,
                blur = result.blur,
                "source normalization applied"
            );
        }
        Normalized {
            config: self.config,
            dimensions,
            normalized: result.image,
            upscale: result.upscale,
            blur: result.blur,
        }
    }
}

// ───────────────────────── Stage 2: Normalized ───────────────────────

/// Pipeline state after source normalization.
#[must_use = "pipeline stages are consumed by advancing; call .preprocess() to continue"]
pub struct Normalized {
    config: PipelineConfig,
    dimensions: Dimensions,
    normalized: GrayImage,
    upscale: f64,
    blur: f32,
}

impl Normalized {
    /// The normalized grayscale, same size as the source.
    #[must_use]
    pub const fn normalized(&self) -> &GrayImage {
        &self.normalized
    }

    /// Effective upscale factor.
    #[must_use]
    pub const fn upscale(&self) -> f64 {
        self.upscale
    }

    /// Blur radius applied during normalization.
    #[must_use]
    pub const fn blur(&self) -> f32 {
        self.blur
    }

    /// Autocontrast and blur.
    pub fn preprocess(self) -> Preprocessed {
        let processed = grayscale::prepare(&self.normalized, self.config.blur);
        tracing::debug!(blur = self.config.blur, "preprocessed grayscale");
        Preprocessed {
            config: self.config,
            dimensions: self.dimensions,
            normalized: self.normalized,
            processed,
            upscale: self.upscale,
            blur: self.blur,
        }
    }
}

// ───────────────────────── Stage 3: Preprocessed ─────────────────────

/// Pipeline state after autocontrast and blur.
#[must_use = "pipeline stages are consumed by advancing; call .segment() to continue"]
pub struct Preprocessed {
    config: PipelineConfig,
    dimensions: Dimensions,
    normalized: GrayImage,
    processed: GrayImage,
    upscale: f64,
    blur: f32,
}

impl Preprocessed {
    /// The conditioned grayscale, in source polarity.
    #[must_use]
    pub const fn processed(&self) -> &GrayImage {
        &self.processed
    }

    /// Segment, decide polarity, and re-segment the inverted image when
    /// the flip applies.
    pub fn segment(self) -> Segmented {
        let preview = segment::segment(&self.processed, &self.config);
        let flipped = flip::should_flip(
            &self.processed,
            &preview,
            self.config.invert_mode,
            &self.config.flip,
        );
        let (processed, masks) = if flipped {
            tracing::info!(mode = %self.config.invert_mode, "inverting silhouette");
            let inverted = grayscale::invert(&self.processed);
            let masks = segment::segment(&inverted, &self.config);
            (inverted, masks)
        } else {
            (self.processed, preview.clone())
        };
        tracing::info!(
            paper_ratio = masks.paper.ratio(),
            flipped,
            "segmentation complete"
        );
        Segmented {
            config: self.config,
            dimensions: self.dimensions,
            normalized: self.normalized,
            processed,
            preview,
            masks,
            flipped,
            upscale: self.upscale,
            blur: self.blur,
        }
    }
}

// ───────────────────────── Stage 4: Segmented ────────────────────────

/// Final pipeline state.
#[must_use = "call .into_output() to take the results"]
pub struct Segmented {
    config: PipelineConfig,
    dimensions: Dimensions,
    normalized: GrayImage,
    processed: GrayImage,
    preview: MaskResult,
    masks: MaskResult,
    flipped: bool,
    upscale: f64,
    blur: f32,
}

impl Segmented {
    /// Masks the final output is taken from.
    #[must_use]
    pub const fn masks(&self) -> &MaskResult {
        &self.masks
    }

    /// First segmentation pass, before any flip.
    #[must_use]
    pub const fn preview(&self) -> &MaskResult {
        &self.preview
    }

    /// Whether the grayscale was inverted.
    #[must_use]
    pub const fn flipped(&self) -> bool {
        self.flipped
    }

    /// Consume the pipeline and return every result.
    #[must_use]
    pub fn into_output(self) -> MaskOutput {
        MaskOutput {
            normalized: self.normalized,
            processed: self.processed,
            preview: self.preview,
            masks: self.masks,
            flipped: self.flipped,
            normalize_scale: self.upscale,
            normalize_blur: self.blur,
            antialias: self.config.morphology.antialias,
            dimensions: self.dimensions,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::flip::InvertMode;

    /// A PNG of a light square on a dark backdrop.
    fn light_square_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            let inside = (width / 4..3 * width / 4).contains(&x)
                && (height / 4..3 * height / 4).contains(&y);
            if inside {
                image::Rgba([240, 240, 240, 255])
            } else {
                image::Rgba([10, 10, 10, 255])
            }
        });
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn pending_exposes_source_bytes() {
        let png = light_square_png(20, 20);
        let expected_len = png.len();
        let pending = Pipeline::new(png, PipelineConfig::default());
        assert_eq!(pending.source().len(), expected_len);
    }

    #[test]
    fn decode_empty_input_returns_error() {
        let result = Pipeline::new(vec![], PipelineConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn decode_garbage_returns_error() {
        let result = Pipeline::new(vec![0xFF, 0x00], PipelineConfig::default()).decode();
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn decode_rejects_invalid_config() {
        let config = PipelineConfig {
            blur: -1.0,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(light_square_png(20, 20), config).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn stages_preserve_dimensions() {
        let decoded = Pipeline::new(light_square_png(40, 30), PipelineConfig::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.gray().dimensions(), (40, 30));
        let normalized = decoded.normalize();
        assert_eq!(normalized.normalized().dimensions(), (40, 30));
        assert!(normalized.upscale() >= 2.0);
        let preprocessed = normalized.preprocess();
        assert_eq!(preprocessed.processed().dimensions(), (40, 30));
        let segmented = preprocessed.segment();
        assert_eq!(segmented.masks().dimensions().width, 40);
    }

    #[test]
    fn light_square_is_paper_without_flip() {
        let output = Pipeline::new(light_square_png(60, 60), PipelineConfig::default())
            .decode()
            .unwrap()
            .normalize()
            .preprocess()
            .segment()
            .into_output();
        assert!(!output.flipped);
        assert!(output.masks.paper.get(30, 30));
        assert!(!output.masks.paper.get(2, 2));
        assert_eq!(output.preview, output.masks);
    }

    #[test]
    fn forced_flip_inverts_processed_image() {
        let config = PipelineConfig {
            invert_mode: InvertMode::Flip,
            ..PipelineConfig::default()
        };
        let output = Pipeline::new(light_square_png(60, 60), config)
            .decode()
            .unwrap()
            .normalize()
            .preprocess()
            .segment()
            .into_output();
        assert!(output.flipped);
        assert!(output.processed.get_pixel(30, 30).0[0] < 30);
        assert!(!output.masks.paper.get(30, 30));
    }

    #[test]
    fn source_dpi_is_forwarded_to_normalization() {
        let normalized = Pipeline::new(light_square_png(20, 20), PipelineConfig::default())
            .with_source_dpi(Some((75.0, 75.0)))
            .decode()
            .unwrap()
            .normalize();
        assert!((normalized.upscale() - 4.0).abs() < 1e-9);
    }
}
