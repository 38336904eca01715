//! Relative-darkness detection: shaded interior cut-outs that a fixed
//! threshold misses.
//!
//! A pixel is a candidate when its 3×3 mean sits well above its 3×3
//! minimum (a local contrast drop), it is darker than the background
//! threshold, and it lies inside the candidate region. Contrast drop
//! alone fires on every soft gradient, so candidates survive only where
//! a gradient-magnitude edge encloses them.

use image::GrayImage;
use imageproc::filter::box_filter;
use serde::{Deserialize, Serialize};

use crate::edge;
use crate::fill::{RegionFiller, fill_closed_regions};
use crate::mask::BinaryMask;
use crate::morphology;
use crate::types::ThresholdPair;

/// Tuning constants for [`detect_relative_dark_regions`].
///
/// The defaults were fitted by hand on silhouette photographs. They are
/// exposed so they can be recalibrated against a larger corpus without
/// code changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelativeDarknessParams {
    /// Lower bound of the contrast-drop margin.
    pub min_drop: u8,
    /// The drop margin is also at least `spread / drop_divisor`.
    pub drop_divisor: u8,
    /// Candidates must be darker than `t_bg - near_background_margin`.
    pub near_background_margin: u8,
    /// Lower clamp of the edge threshold.
    pub edge_floor: u8,
    /// Upper clamp of the edge threshold.
    pub edge_ceiling: u8,
    /// Edge threshold grows by this much per level of threshold spread.
    pub edge_gain: u8,
    /// Edge threshold offset before clamping.
    pub edge_offset: u8,
}

impl Default for RelativeDarknessParams {
    fn default() -> Self {
        Self {
            min_drop: 6,
            drop_divisor: 3,
            near_background_margin: 2,
            edge_floor: 20,
            edge_ceiling: 96,
            edge_gain: 2,
            edge_offset: 16,
        }
    }
}

impl RelativeDarknessParams {
    /// Contrast drop a pixel needs to become a candidate.
    #[must_use]
    pub fn drop_margin(&self, thresholds: ThresholdPair) -> u8 {
        let by_spread = thresholds.spread() / self.drop_divisor.max(1);
        self.min_drop.max(by_spread)
    }

    /// Gradient magnitude that counts as an enclosing edge.
    #[must_use]
    pub fn edge_threshold(&self, thresholds: ThresholdPair) -> u8 {
        let raw = u32::from(thresholds.spread()) * u32::from(self.edge_gain)
            + u32::from(self.edge_offset);
        let floor = u32::from(self.edge_floor);
        let ceiling = u32::from(self.edge_ceiling).max(floor);
        u8::try_from(raw.clamp(floor, ceiling)).unwrap_or(u8::MAX)
    }
}

/// Detect locally dark pockets inside `region` that should become holes.
///
/// Returns an empty mask when `region` is empty or no enclosing edges are
/// found. The result is closed once with radius 1.
#[must_use = "returns the relative-darkness mask"]
pub fn detect_relative_dark_regions(
    gray: &GrayImage,
    region: &BinaryMask,
    thresholds: ThresholdPair,
    params: &RelativeDarknessParams,
    filler: &impl RegionFiller,
) -> BinaryMask {
    let (w, h) = gray.dimensions();
    if region.is_empty() {
        return BinaryMask::new(w, h);
    }
    let thresholds = thresholds.corrected();

    let local_mean = box_filter(gray, 1, 1);
    let local_min = morphology::min_filter_3x3(gray);
    let margin = params.drop_margin(thresholds);
    let dropped = BinaryMask::from_fn(w, h, |x, y| {
        let mean = local_mean.get_pixel(x, y).0[0];
        let min = local_min.get_pixel(x, y).0[0];
        mean.saturating_sub(min) >= margin
    });

    let near_bg_limit = thresholds
        .background
        .saturating_sub(params.near_background_margin);
    let candidates = dropped
        .and(&BinaryMask::below(gray, near_bg_limit))
        .and(region);

    let edges = edge::edge_mask(gray, params.edge_threshold(thresholds)).and(region);
    if edges.is_empty() {
        tracing::debug!("relative darkness: no enclosing edges, rejecting candidates");
        return BinaryMask::new(w, h);
    }
    let edge_regions = fill_closed_regions(&morphology::closing(&edges, 1), 1, filler);
    let gated = candidates.and(&edge_regions);

    tracing::debug!(
        margin,
        candidates = candidates.count(),
        gated = gated.count(),
        "relative darkness"
    );
    morphology::closing(&gated, 1)
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::fill::FillStrategyKind;

    fn thresholds() -> ThresholdPair {
        ThresholdPair {
            background: 200,
            detail: 140,
        }
    }

    /// Bright paper (230) with a drawn dark outline (60) enclosing a
    /// pocket (180) speckled with faint shading dots (150). Nothing in
    /// the pocket is below the 140 detail threshold.
    fn shaded_pocket() -> GrayImage {
        GrayImage::from_fn(60, 60, |x, y| {
            let d = (f64::from(x) - 30.0).hypot(f64::from(y) - 30.0);
            let v = if d < 12.0 {
                if x % 4 == 0 && y % 4 == 0 { 150 } else { 180 }
            } else if d < 15.0 {
                60
            } else {
                230
            };
            Luma([v])
        })
    }

    #[test]
    fn default_thresholds_match_tuned_constants() {
        let p = RelativeDarknessParams::default();
        assert_eq!(p.drop_margin(thresholds()), 20);
        assert_eq!(p.edge_threshold(thresholds()), 96);
        let narrow = ThresholdPair {
            background: 200,
            detail: 198,
        };
        assert_eq!(p.drop_margin(narrow), 6);
        assert_eq!(p.edge_threshold(narrow), 20);
        let mid = ThresholdPair {
            background: 200,
            detail: 180,
        };
        assert_eq!(p.edge_threshold(mid), 56);
    }

    #[test]
    fn empty_region_yields_empty_mask() {
        let gray = shaded_pocket();
        let out = detect_relative_dark_regions(
            &gray,
            &BinaryMask::new(60, 60),
            thresholds(),
            &RelativeDarknessParams::default(),
            &FillStrategyKind::Labelling,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn shaded_pocket_is_detected_inside_region() {
        let gray = shaded_pocket();
        let region = BinaryMask::new(60, 60).invert();
        let out = detect_relative_dark_regions(
            &gray,
            &region,
            thresholds(),
            &RelativeDarknessParams::default(),
            &FillStrategyKind::Labelling,
        );
        assert!(!out.is_empty(), "pocket should produce candidates");
        assert!(out.get(28, 28), "shading dot near the center");
        assert!(!out.get(2, 2), "flat paper must not be flagged");
        assert!(!out.get(55, 30), "flat paper must not be flagged");
        assert!(out.is_subset_of(&region));
    }

    #[test]
    fn soft_gradient_without_edges_is_rejected() {
        // A slow ramp: contrast drop never reaches the margin and no
        // gradient crosses the edge threshold.
        let gray = GrayImage::from_fn(60, 60, |x, _| Luma([u8::try_from(120 + x).unwrap_or(255)]));
        let region = BinaryMask::new(60, 60).invert();
        let out = detect_relative_dark_regions(
            &gray,
            &region,
            thresholds(),
            &RelativeDarknessParams::default(),
            &FillStrategyKind::BreadthFirst,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn region_limits_detection() {
        let gray = shaded_pocket();
        // Region covers only the left half of the canvas.
        let region = BinaryMask::from_fn(60, 60, |x, _| x < 20);
        let out = detect_relative_dark_regions(
            &gray,
            &region,
            thresholds(),
            &RelativeDarknessParams::default(),
            &FillStrategyKind::Labelling,
        );
        assert!((21..60).all(|x| (0..60).all(|y| !out.get(x, y))));
    }
}
