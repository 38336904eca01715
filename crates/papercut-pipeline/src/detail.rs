//! Detail-gap bridging for interior line art.
//!
//! Dotted or broken detail strokes inside the paper should cut as solid
//! enclosed holes. The mask is OR'ed with its closing so nothing already
//! present is lost, then optionally softened to round the new joins.

use crate::blur;
use crate::mask::BinaryMask;
use crate::morphology;

/// Fraction of the join radius used to smooth bridged holes.
pub const JOIN_SMOOTH_FACTOR: f32 = 0.35;

/// Close gaps up to roughly `2·join_radius` pixels wide.
///
/// `result = mask OR closing(mask, join_radius)`, followed by a
/// blur-and-rebinarize at `smooth_radius` when it is positive.
#[must_use = "returns the bridged mask"]
pub fn connect_detail_gaps(mask: &BinaryMask, join_radius: u32, smooth_radius: f32) -> BinaryMask {
    let joined = if join_radius > 0 {
        mask.or(&morphology::closing(mask, join_radius))
    } else {
        mask.clone()
    };
    blur::soften_mask(&joined, smooth_radius)
}

/// Smoothing radius paired with a join radius.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn join_smooth_radius(join_radius: u32) -> f32 {
    join_radius as f32 * JOIN_SMOOTH_FACTOR
}
