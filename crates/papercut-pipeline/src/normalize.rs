//! Source normalization: upscale, blur, downscale.
//!
//! Threshold segmentation reacts badly to jagged low-resolution edges.
//! Round-tripping the source through a larger Lanczos resample with a
//! small blur in between smooths those edges while returning an image of
//! the original size.

use image::GrayImage;
use image::imageops::{self, FilterType};

use crate::blur;
use crate::types::NormalizationParams;

/// Blur radii smaller than this are skipped.
const MIN_EFFECTIVE_BLUR: f32 = 0.05;

/// The normalized image plus the parameters that were actually applied.
#[derive(Debug, Clone)]
pub struct NormalizedSource {
    /// Same dimensions as the input.
    pub image: GrayImage,
    /// Effective upscale factor (`1.0` when skipped).
    pub upscale: f64,
    /// Blur radius applied at the upscaled resolution (`0.0` when none).
    pub blur: f32,
}

impl NormalizedSource {
    fn unchanged(image: &GrayImage) -> Self {
        Self {
            image: image.clone(),
            upscale: 1.0,
            blur: 0.0,
        }
    }
}

/// Effective upscale factor for the given settings and optional source
/// DPI `(x, y)`.
///
/// `max(min_upscale, target_dpi / source_dpi)` where the source DPI is
/// the larger of the two axes; DPI metadata is ignored when the target
/// is zero or the metadata is missing or non-positive.
#[must_use]
pub fn effective_upscale(params: &NormalizationParams, source_dpi: Option<(f64, f64)>) -> f64 {
    let mut upscale = params.min_upscale.max(1.0);
    if params.target_dpi > 0.0
        && let Some(dpi) = source_dpi.map(|(x, y)| x.max(y)).filter(|d| *d > 0.0)
    {
        upscale = upscale.max(params.target_dpi / dpi);
    }
    upscale
}

/// Normalize `gray` for segmentation.
///
/// Returns an unchanged copy when the image is empty, or when there is
/// neither an upscale nor a blur to apply. The blur radius is divided by
/// the upscale factor and dropped entirely when the source DPI already
/// meets the target.
#[must_use = "returns the normalized image"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn normalize_source(
    gray: &GrayImage,
    params: &NormalizationParams,
    source_dpi: Option<(f64, f64)>,
) -> NormalizedSource {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return NormalizedSource::unchanged(gray);
    }
    if params.min_upscale <= 1.0 && params.blur_radius <= 0.0 && params.target_dpi <= 0.0 {
        return NormalizedSource::unchanged(gray);
    }

    let upscale = effective_upscale(params, source_dpi);

    let mut blur_radius = if params.blur_radius > 0.0 {
        (f64::from(params.blur_radius) / upscale) as f32
    } else {
        0.0
    };
    if params.target_dpi > 0.0
        && let Some((dx, dy)) = source_dpi
        && dx.min(dy) >= params.target_dpi
    {
        blur_radius = 0.0;
    }
    if blur_radius < MIN_EFFECTIVE_BLUR {
        blur_radius = 0.0;
    }

    if upscale <= 1.0 && blur_radius <= 0.0 {
        return NormalizedSource::unchanged(gray);
    }

    let up_w = scaled_len(w, upscale);
    let up_h = scaled_len(h, upscale);
    tracing::debug!(upscale, blur_radius, up_w, up_h, "normalizing source");

    let mut work = if (up_w, up_h) == (w, h) {
        gray.clone()
    } else {
        imageops::resize(gray, up_w, up_h, FilterType::Lanczos3)
    };
    if blur_radius > 0.0 {
        work = blur::gaussian_blur(&work, blur_radius);
    }
    let image = if (up_w, up_h) == (w, h) {
        work
    } else {
        imageops::resize(&work, w, h, FilterType::Lanczos3)
    };

    NormalizedSource {
        image,
        upscale,
        blur: blur_radius,
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_len(len: u32, factor: f64) -> u32 {
    let scaled = (f64::from(len) * factor).round();
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (scaled as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn staircase() -> GrayImage {
        GrayImage::from_fn(32, 24, |x, y| Luma([if x + y < 28 { 20 } else { 230 }]))
    }

    #[test]
    fn disabled_is_identity() {
        let gray = staircase();
        let out = normalize_source(&gray, &NormalizationParams::disabled(), Some((72.0, 72.0)));
        assert_eq!(out.image, gray);
        assert!((out.upscale - 1.0).abs() < f64::EPSILON);
        assert!(out.blur.abs() < f32::EPSILON);
    }

    #[test]
    fn keeps_dimensions() {
        let gray = staircase();
        let out = normalize_source(&gray, &NormalizationParams::default(), None);
        assert_eq!(out.image.dimensions(), gray.dimensions());
        assert!((out.upscale - 2.0).abs() < f64::EPSILON);
        // 0.8 / 2.0
        assert!((out.blur - 0.4).abs() < 1e-6);
    }

    #[test]
    fn low_source_dpi_raises_upscale() {
        let params = NormalizationParams::default();
        assert!((effective_upscale(&params, Some((75.0, 75.0))) - 4.0).abs() < 1e-9);
        assert!((effective_upscale(&params, Some((600.0, 600.0))) - 2.0).abs() < 1e-9);
        assert!((effective_upscale(&params, Some((0.0, 0.0))) - 2.0).abs() < 1e-9);
        let no_target = NormalizationParams {
            target_dpi: 0.0,
            ..params
        };
        assert!((effective_upscale(&no_target, Some((75.0, 75.0))) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn blur_is_suppressed_when_source_meets_target() {
        let gray = staircase();
        let out = normalize_source(&gray, &NormalizationParams::default(), Some((300.0, 300.0)));
        assert!(out.blur.abs() < f32::EPSILON);
        assert_eq!(out.image.dimensions(), gray.dimensions());
    }

    #[test]
    fn tiny_blur_is_dropped() {
        let params = NormalizationParams {
            target_dpi: 0.0,
            min_upscale: 1.0,
            blur_radius: 0.04,
        };
        let gray = staircase();
        let out = normalize_source(&gray, &params, None);
        assert_eq!(out.image, gray);
    }

    #[test]
    fn flat_image_stays_flat() {
        let gray = GrayImage::from_pixel(16, 16, Luma([128]));
        let out = normalize_source(&gray, &NormalizationParams::default(), None);
        for p in out.image.pixels() {
            assert!((i16::from(p.0[0]) - 128).abs() <= 1, "drifted to {}", p.0[0]);
        }
    }

    #[test]
    fn zero_sized_image_is_returned_unchanged() {
        let gray = GrayImage::new(0, 5);
        let out = normalize_source(&gray, &NormalizationParams::default(), None);
        assert_eq!(out.image.dimensions(), (0, 5));
    }
}
