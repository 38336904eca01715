//! PNG encoding for masks, tiles and panels.

use image::{ImageEncoder, codecs::png::PngEncoder};
use papercut_pipeline::{GrayImage, RgbImage};

use crate::ExportError;

/// Encode a grayscale image (a mask or an intermediate) as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if PNG encoding fails.
pub fn encode_png_gray(image: &GrayImage) -> Result<Vec<u8>, ExportError> {
    let mut png_bytes = Vec::new();
    let encoder = PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(png_bytes)
}

/// Encode an RGB image (a tile or a panel) as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if PNG encoding fails.
pub fn encode_png_rgb(image: &RgbImage) -> Result<Vec<u8>, ExportError> {
    let mut png_bytes = Vec::new();
    let encoder = PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(png_bytes)
}
