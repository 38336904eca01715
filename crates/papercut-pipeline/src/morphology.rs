//! Morphology primitives shared by every segmentation stage.
//!
//! Square structuring elements go through [`imageproc::morphology`]
//! (L∞ distance), disks through the Euclidean distance transform. Pixels
//! outside the canvas never contribute foreground to a dilation and never
//! contribute background to an erosion, which makes [`closing`] a true
//! closing on the finite canvas (and therefore idempotent).

use image::GrayImage;
use imageproc::distance_transform::{Norm, euclidean_squared_distance_transform};
use imageproc::morphology::{self, Mask};

use crate::mask::BinaryMask;

/// Largest square radius handed to `imageproc`.
///
/// The distance transform behind `dilate`/`erode` saturates at 255. It
/// also reports roughly `width + height` when there is no foreground to
/// measure from, so empty (dilate) and full (erode) masks never reach it.
const MAX_SQUARE_RADIUS: u8 = 254;

fn square_radius(radius: u32) -> u8 {
    u8::try_from(radius).map_or(MAX_SQUARE_RADIUS, |r| r.min(MAX_SQUARE_RADIUS))
}

/// Dilate by a `(2·radius + 1)` square. Radius 0 returns a copy.
#[must_use = "returns the dilated mask"]
pub fn dilate_square(mask: &BinaryMask, radius: u32) -> BinaryMask {
    if radius == 0 || mask.is_empty() || mask.is_full() {
        return mask.clone();
    }
    BinaryMask::from_bilevel(morphology::dilate(
        mask.as_gray(),
        Norm::LInf,
        square_radius(radius),
    ))
}

/// Erode by a `(2·radius + 1)` square. Radius 0 returns a copy.
#[must_use = "returns the eroded mask"]
pub fn erode_square(mask: &BinaryMask, radius: u32) -> BinaryMask {
    if radius == 0 || mask.is_empty() || mask.is_full() {
        return mask.clone();
    }
    BinaryMask::from_bilevel(morphology::erode(
        mask.as_gray(),
        Norm::LInf,
        square_radius(radius),
    ))
}

/// Morphological closing: dilate then erode with the same square.
///
/// The element side is `max(3, 2·radius + 1)`, so any positive radius
/// closes at least one-pixel gaps. Radius 0 is a no-op.
#[must_use = "returns the closed mask"]
pub fn closing(mask: &BinaryMask, radius: u32) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    let r = radius.max(1);
    erode_square(&dilate_square(mask, r), r)
}

/// Boundary band of `mask`: the mask minus its erosion.
///
/// `radius` is raised to at least 1 so the band is never empty for a
/// non-empty shape that has background inside the canvas.
#[must_use = "returns the outline mask"]
pub fn outline(mask: &BinaryMask, radius: u32) -> BinaryMask {
    mask.and_not(&erode_square(mask, radius.max(1)))
}

/// Dilate by a Euclidean disk of the given radius.
///
/// A pixel is set when its squared distance to the nearest foreground
/// pixel is at most `radius²`.
#[must_use = "returns the dilated mask"]
pub fn dilate_disk(mask: &BinaryMask, radius: u32) -> BinaryMask {
    if radius == 0 || mask.is_empty() {
        return mask.clone();
    }
    let limit = f64::from(radius) * f64::from(radius);
    let distances = euclidean_squared_distance_transform(mask.as_gray());
    BinaryMask::from_fn(mask.width(), mask.height(), |x, y| {
        distances.get_pixel(x, y).0[0] <= limit
    })
}

/// 3×3 minimum filter; the window is clipped at the canvas edge.
#[must_use = "returns the filtered image"]
pub fn min_filter_3x3(gray: &GrayImage) -> GrayImage {
    morphology::grayscale_erode(gray, &Mask::square(1))
}
