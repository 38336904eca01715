//! Gaussian blur and the blur-based mask softeners.
//!
//! [`gaussian_blur`] wraps [`imageproc::filter::gaussian_blur_f32`].
//! The mask helpers run the same blur over a bilevel mask: [`soft_alpha`]
//! keeps the blurred ramp for antialiased compositing, while
//! [`soften_mask`] cuts it back to two levels at 50% so the result is
//! still a [`BinaryMask`].

use image::GrayImage;

use crate::mask::BinaryMask;

/// Apply Gaussian blur to a grayscale image.
///
/// `sigma` is the kernel standard deviation in pixels. Non-positive or
/// non-finite values return the image unchanged, since `imageproc`'s
/// underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if !(sigma.is_finite() && sigma > 0.0) {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Alpha within this distance of either extreme snaps to it.
const ALPHA_SNAP: u8 = 5;

/// Blur a mask into an 8-bit alpha ramp.
///
/// Only the edge ramp keeps intermediate values: the blur leaves the
/// inside of large regions a level or two short of opaque, so values
/// within [`ALPHA_SNAP`] of 0 or 255 are pinned to it. A radius of zero
/// returns the crisp 0/255 samples.
#[must_use = "returns the alpha image"]
pub fn soft_alpha(mask: &BinaryMask, radius: f32) -> GrayImage {
    let mut alpha = gaussian_blur(mask.as_gray(), radius);
    for a in alpha.iter_mut() {
        if *a >= u8::MAX - ALPHA_SNAP {
            *a = u8::MAX;
        } else if *a <= ALPHA_SNAP {
            *a = 0;
        }
    }
    alpha
}

/// Blur a mask and re-binarize at the 50% level.
///
/// Rounds off stair-stepped corners and removes single-pixel spurs while
/// keeping the mask bilevel.
#[must_use = "returns the softened mask"]
pub fn soften_mask(mask: &BinaryMask, radius: f32) -> BinaryMask {
    if !(radius.is_finite() && radius > 0.0) {
        return mask.clone();
    }
    BinaryMask::at_least(&soft_alpha(mask, radius), 128)
}
