//! Silhouette polarity decision.
//!
//! Segmentation treats bright pixels enclosed by darker ones as paper.
//! That matches a light subject photographed on a dark backdrop. A dark
//! subject on a light backdrop comes out the other way round, with most
//! of the canvas marked as paper. In `auto` mode this module spots that
//! case from the preview segmentation and a border-versus-center
//! brightness comparison, and asks for the grayscale to be inverted.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use serde::{Deserialize, Serialize};

use crate::types::MaskResult;

type IntegralImage = ImageBuffer<Luma<u64>, Vec<u64>>;

/// How polarity is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvertMode {
    /// Decide from the image with [`should_flip`].
    #[default]
    Auto,
    /// Never invert.
    Keep,
    /// Always invert.
    Flip,
}

impl std::fmt::Display for InvertMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Keep => write!(f, "keep"),
            Self::Flip => write!(f, "flip"),
        }
    }
}

/// Tuning for the `auto` decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipHeuristic {
    /// Border band thickness as a fraction of width and height.
    pub border_fraction: f64,
    /// Brightness margin the border must exceed the center by.
    pub tolerance: f64,
    /// Paper ratios at or below this never flip.
    pub paper_ratio_limit: f64,
}

impl Default for FlipHeuristic {
    fn default() -> Self {
        Self {
            border_fraction: 0.12,
            tolerance: 5.0,
            paper_ratio_limit: 0.5,
        }
    }
}

/// Mean brightness of the border band and of the central box.
///
/// The band is `max(1, round(w·f))` pixels wide on the left and right
/// and `max(1, round(h·f))` tall on the top and bottom. When the band
/// swallows the whole image the center falls back to the global mean.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn border_and_center_means(gray: &GrayImage, border_fraction: f64) -> (f64, f64) {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return (0.0, 0.0);
    }

    let integral: IntegralImage = integral_image::<_, u64>(gray);
    let bw = ((f64::from(w) * border_fraction).round() as u32).clamp(1, w);
    let bh = ((f64::from(h) * border_fraction).round() as u32).clamp(1, h);

    let boxes = [
        (0, 0, w, bh),
        (0, h.saturating_sub(bh), w, h),
        (0, bh, bw, h.saturating_sub(bh)),
        (w.saturating_sub(bw), bh, w, h.saturating_sub(bh)),
    ];
    let (border_sum, border_count) = boxes
        .iter()
        .map(|&rect| box_sum(&integral, rect))
        .fold((0, 0), |(s, c), (bs, bc)| (s + bs, c + bc));
    let border_mean = if border_count == 0 {
        0.0
    } else {
        border_sum as f64 / border_count as f64
    };

    let (mut center_sum, mut center_count) = box_sum(
        &integral,
        (bw, bh, w.saturating_sub(bw), h.saturating_sub(bh)),
    );
    if center_count == 0 {
        (center_sum, center_count) = box_sum(&integral, (0, 0, w, h));
    }
    let center_mean = center_sum as f64 / center_count as f64;

    (border_mean, center_mean)
}

/// Sample sum and pixel count over the half-open box `[x0, x1) × [y0, y1)`,
/// which must lie inside the image behind `integral`.
fn box_sum(integral: &IntegralImage, (x0, y0, x1, y1): (u32, u32, u32, u32)) -> (u64, u64) {
    if x1 <= x0 || y1 <= y0 {
        return (0, 0);
    }
    let [sum] = sum_image_pixels(integral, x0, y0, x1 - 1, y1 - 1);
    (sum, u64::from(x1 - x0) * u64::from(y1 - y0))
}

/// Decide whether the grayscale should be inverted before the final
/// segmentation.
///
/// `flip` and `keep` are unconditional. `auto` keeps any preview whose
/// paper ratio is at most `paper_ratio_limit`; otherwise it flips when
/// the border band is brighter than the center by more than
/// `tolerance`.
#[must_use]
pub fn should_flip(
    gray: &GrayImage,
    preview: &MaskResult,
    mode: InvertMode,
    heuristic: &FlipHeuristic,
) -> bool {
    match mode {
        InvertMode::Flip => true,
        InvertMode::Keep => false,
        InvertMode::Auto => {
            let ratio = preview.paper.ratio();
            if ratio <= heuristic.paper_ratio_limit {
                tracing::debug!(ratio, "auto flip: paper ratio low, keeping");
                return false;
            }
            let (border, center) = border_and_center_means(gray, heuristic.border_fraction);
            let flip = border > center + heuristic.tolerance;
            tracing::debug!(ratio, border, center, flip, "auto flip decision");
            flip
        }
    }
}
