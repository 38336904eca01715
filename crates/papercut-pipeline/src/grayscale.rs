//! Image decoding and grayscale conditioning.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP), converts them to a
//! single-channel grayscale image, and conditions that image for
//! thresholding: global autocontrast followed by an optional blur.

use image::{GrayImage, imageops};
use imageproc::contrast::stretch_contrast;

use crate::blur;
use crate::types::PipelineError;

/// Decode raw image bytes and convert to grayscale.
///
/// The standard luminance formula is used for RGB-to-gray conversion.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::ZeroDimension`] if the decoded image has no
/// pixels.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let gray = image::load_from_memory(bytes)?.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PipelineError::ZeroDimension {
            width: gray.width(),
            height: gray.height(),
        });
    }
    Ok(gray)
}

/// Stretch the histogram so the darkest sample maps to 0 and the
/// brightest to 255.
///
/// A flat image (one distinct value) is returned unchanged.
#[must_use = "returns the stretched image"]
pub fn autocontrast(gray: &GrayImage) -> GrayImage {
    let Some(lo) = gray.iter().copied().min() else {
        return gray.clone();
    };
    let hi = gray.iter().copied().max().unwrap_or(lo);
    if hi <= lo {
        return gray.clone();
    }
    stretch_contrast(gray, lo, hi, 0, u8::MAX)
}

/// Photographic negative: `255 - v` for every sample.
#[must_use = "returns the inverted image"]
pub fn invert(gray: &GrayImage) -> GrayImage {
    let mut out = gray.clone();
    imageops::invert(&mut out);
    out
}

/// Autocontrast, then Gaussian blur when `blur_sigma > 0`.
#[must_use = "returns the conditioned image"]
pub fn prepare(gray: &GrayImage, blur_sigma: f32) -> GrayImage {
    blur::gaussian_blur(&autocontrast(gray), blur_sigma)
}
