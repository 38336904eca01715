//! Minimum bridge width enforcement on a finished mask.
//!
//! Thin paper connections tear when the stencil is cut and handled. The
//! Euclidean distance transform measures how far each paper pixel sits
//! from the nearest cut; material narrower than the minimum bridge width
//! is thickened locally by a disk dilation. Everything outside the
//! reinforced neighbourhood is left pixel-for-pixel unchanged.

use imageproc::distance_transform::euclidean_squared_distance_transform;
use serde::{Deserialize, Serialize};

use crate::mask::BinaryMask;
use crate::morphology;
use crate::units;

/// Physical bridge constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeParams {
    /// Resolution of the mask.
    pub dpi: u32,
    /// Narrowest paper connection that survives cutting.
    pub min_bridge_mm: f64,
}

impl Default for BridgeParams {
    fn default() -> Self {
        Self {
            dpi: 300,
            min_bridge_mm: 1.2,
        }
    }
}

impl BridgeParams {
    /// Minimum bridge width in pixels, at least 1.
    #[must_use]
    pub fn min_bridge_px(&self) -> u32 {
        u32::try_from(units::mm_to_px(self.min_bridge_mm, self.dpi).max(1)).unwrap_or(u32::MAX)
    }

    /// Disk radius used for reinforcement: `max(1, round(min_px / 2))`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn reinforce_radius(&self) -> u32 {
        ((f64::from(self.min_bridge_px()) / 2.0).round() as u32).max(1)
    }

    /// Distance below which paper counts as thin: `max(1, min_px / 2)`.
    #[must_use]
    pub fn thin_threshold(&self) -> f64 {
        (f64::from(self.min_bridge_px()) / 2.0).max(1.0)
    }
}

/// Result of [`enforce_min_bridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOutcome {
    /// The reinforced mask (a copy of the input when nothing was thin).
    pub mask: BinaryMask,
    /// Number of paper pixels classified as thin.
    pub thin_pixels: u64,
    /// Whether any reinforcement was applied.
    pub reinforced: bool,
}

/// Thicken paper connections narrower than the minimum bridge width.
///
/// Paper pixels whose distance to the nearest background pixel reaches
/// the thin threshold form the core of wide material. Paper within a
/// square window of that radius around the core belongs to wide shapes
/// (their rims and corners included). The remaining paper is thin. Inside
/// a disk-shaped neighbourhood of the thin pixels the mask is replaced by
/// its disk dilation; elsewhere it is kept.
#[must_use = "returns the reinforced mask"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn enforce_min_bridge(mask: &BinaryMask, params: &BridgeParams) -> BridgeOutcome {
    let (w, h) = mask.dimensions();
    let threshold = params.thin_threshold();
    let limit = threshold * threshold;

    // Squared distance from every pixel to the nearest background pixel.
    let distances = euclidean_squared_distance_transform(mask.invert().as_gray());
    let core = BinaryMask::from_fn(w, h, |x, y| {
        mask.get(x, y) && distances.get_pixel(x, y).0[0] >= limit
    });
    let wide = morphology::dilate_square(&core, threshold.ceil() as u32).and(mask);
    let thin = mask.and_not(&wide);
    let thin_pixels = thin.count();

    if thin_pixels == 0 {
        tracing::debug!(threshold, "no thin material, mask unchanged");
        return BridgeOutcome {
            mask: mask.clone(),
            thin_pixels,
            reinforced: false,
        };
    }

    let radius = params.reinforce_radius();
    let thickened = morphology::dilate_disk(mask, radius);
    let roi = morphology::dilate_disk(&thin, radius);
    let reinforced = BinaryMask::from_fn(w, h, |x, y| {
        if roi.get(x, y) {
            thickened.get(x, y)
        } else {
            mask.get(x, y)
        }
    });

    tracing::info!(
        min_bridge_px = params.min_bridge_px(),
        radius,
        thin_pixels,
        added = reinforced.count().saturating_sub(mask.count()),
        "reinforced thin bridges"
    );

    BridgeOutcome {
        mask: reinforced,
        thin_pixels,
        reinforced: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: u32, y0: u32, x1: u32, y1: u32) -> impl Fn(u32, u32) -> bool {
        move |x, y| (x0..x1).contains(&x) && (y0..y1).contains(&y)
    }

    /// Two 40×40 blocks joined by a 1 px bridge, and an unrelated 50×50
    /// square far away.
    fn bridged_blocks() -> BinaryMask {
        let a = rect(10, 20, 50, 60);
        let b = rect(110, 20, 150, 60);
        let bridge = rect(50, 40, 110, 41);
        let square = rect(130, 130, 180, 180);
        BinaryMask::from_fn(200, 200, |x, y| {
            a(x, y) || b(x, y) || bridge(x, y) || square(x, y)
        })
    }

    #[test]
    fn default_params_at_300_dpi() {
        let p = BridgeParams::default();
        assert_eq!(p.min_bridge_px(), 14);
        assert_eq!(p.reinforce_radius(), 7);
        assert!((p.thin_threshold() - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tiny_widths_floor_at_one_pixel() {
        let p = BridgeParams {
            dpi: 300,
            min_bridge_mm: 0.01,
        };
        assert_eq!(p.min_bridge_px(), 1);
        assert_eq!(p.reinforce_radius(), 1);
        assert!((p.thin_threshold() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn one_pixel_bridge_is_widened() {
        let mask = bridged_blocks();
        let out = enforce_min_bridge(&mask, &BridgeParams::default());
        assert!(out.reinforced);
        assert!(out.thin_pixels > 0);
        assert!(mask.is_subset_of(&out.mask));

        let column: u32 = (0..200).map(|y| u32::from(out.mask.get(80, y))).sum();
        assert!(column >= 14, "bridge midpoint only {column} px thick");
    }

    #[test]
    fn unrelated_wide_region_is_untouched() {
        let mask = bridged_blocks();
        let out = enforce_min_bridge(&mask, &BridgeParams::default());
        for y in 122..188 {
            for x in 122..188 {
                assert_eq!(out.mask.get(x, y), mask.get(x, y), "changed at ({x}, {y})");
            }
        }
    }

    #[test]
    fn wide_shapes_only_is_a_no_op() {
        let square = rect(30, 30, 90, 90);
        let mask = BinaryMask::from_fn(120, 120, square);
        let out = enforce_min_bridge(&mask, &BridgeParams::default());
        assert!(!out.reinforced);
        assert_eq!(out.thin_pixels, 0);
        assert_eq!(out.mask, mask);
    }

    #[test]
    fn empty_and_full_masks_are_unchanged() {
        for mask in [BinaryMask::new(40, 40), BinaryMask::new(40, 40).invert()] {
            let out = enforce_min_bridge(&mask, &BridgeParams::default());
            assert!(!out.reinforced);
            assert_eq!(out.mask, mask);
        }
    }

    #[test]
    fn minimum_wider_than_the_canvas_marks_everything_thin() {
        // No pixel is deep enough to be core, so every paper pixel is thin.
        let mask = BinaryMask::from_fn(20, 20, rect(5, 8, 15, 11));
        let params = BridgeParams {
            dpi: 300,
            min_bridge_mm: 10.0,
        };
        assert!(params.thin_threshold() > 40.0);
        let out = enforce_min_bridge(&mask, &params);
        assert!(out.reinforced);
        assert_eq!(out.thin_pixels, mask.count());
        assert!(mask.is_subset_of(&out.mask));
    }
}
