//! Gradient-magnitude edge maps.
//!
//! Sobel derivatives via [`imageproc::filter::filter_clamped`], combined
//! into a magnitude and saturated to 8 bits. A step of `h` intensity
//! levels produces a peak response of about `4h`, so faint shading
//! edges clear the relative-darkness thresholds well before strong
//! silhouette edges saturate.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::mask::BinaryMask;

/// Sobel gradient magnitude, clamped to `0..=255`.
#[must_use = "returns the gradient magnitude image"]
pub fn gradient_magnitude(gray: &GrayImage) -> GrayImage {
    let gx: Image<Luma<i16>> = filter_clamped(gray, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(gray, kernel::SOBEL_VERTICAL_3X3);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let dx = f32::from(gx.get_pixel(x, y).0[0]);
        let dy = f32::from(gy.get_pixel(x, y).0[0]);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let magnitude = dx.hypot(dy).round().min(255.0) as u8;
        Luma([magnitude])
    })
}

/// Pixels whose gradient magnitude is at least `threshold`.
#[must_use = "returns the edge mask"]
pub fn edge_mask(gray: &GrayImage, threshold: u8) -> BinaryMask {
    BinaryMask::at_least(&gradient_magnitude(gray), threshold)
}
