//! Dual-threshold segmentation of a conditioned grayscale image.
//!
//! Pixels darker than the background threshold are walls. The paper
//! candidate (`filled`) is every non-wall pixel enclosed by walls, i.e.
//! not reachable from the canvas edge. Bright regions drawn inside a dark
//! outline therefore become paper, and the backdrop around a light
//! subject photographed on a dark surface is discarded because it
//! touches the edge. A dark subject on a light backdrop needs the
//! grayscale inverted first; see [`crate::flip`].
//!
//! Holes are then detected inside `filled` from the detail threshold and
//! the relative-darkness detector, bridged, and subtracted.

use image::GrayImage;

use crate::darkness;
use crate::detail;
use crate::fill::fill_closed_regions;
use crate::mask::BinaryMask;
use crate::morphology;
use crate::types::{MaskResult, PipelineConfig};

/// Segment `gray` into the four co-registered masks.
///
/// The threshold pair is corrected (`t_detail <= t_bg`) before use.
/// Always succeeds.
#[must_use = "returns the segmentation masks"]
pub fn segment(gray: &GrayImage, config: &PipelineConfig) -> MaskResult {
    let thresholds = config.thresholds.corrected();
    let dilate = config.morphology.dilate_px;
    let join = config.morphology.detail_join_px;
    let filler = &config.fill_strategy;

    // ───── Walls and paper candidate ─────

    let outline_raw = BinaryMask::below(gray, thresholds.background);
    let outline_closed = morphology::closing(&outline_raw, dilate);
    let outline = outline_raw.or(&outline_closed);
    let filled = fill_closed_regions(&outline_closed, dilate, filler);

    // ───── Hole seeds ─────

    let holes_raw = BinaryMask::below(gray, thresholds.detail).and(&filled);
    let relative = darkness::detect_relative_dark_regions(
        gray,
        &filled,
        thresholds,
        &config.relative_darkness,
        filler,
    );
    let holes_seed = holes_raw.or(&relative);
    let holes_refined = morphology::closing(&holes_seed, dilate);

    // ───── Detail recovery ─────

    let bridge = dilate.max(join);
    let detail_outline = morphology::outline(&holes_refined, 1);
    let detail_filled =
        fill_closed_regions(&morphology::closing(&detail_outline, bridge), bridge, filler);

    let holes_combined = holes_refined.or(&detail_filled);
    let holes = detail::connect_detail_gaps(
        &holes_combined,
        join,
        detail::join_smooth_radius(join),
    )
    .and(&filled);

    let paper = filled.and_not(&holes);

    tracing::debug!(
        t_bg = thresholds.background,
        t_detail = thresholds.detail,
        dilate,
        join,
        outline = outline.count(),
        filled = filled.count(),
        holes = holes.count(),
        paper = paper.count(),
        "segmented"
    );

    MaskResult {
        paper,
        filled,
        holes,
        outline,
    }
}
