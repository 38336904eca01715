//! White-on-gray panel composition.
//!
//! The conditioned grayscale is resampled to the panel's print size and
//! segmented again at that resolution with morphology radii re-derived
//! for the scale change. The paper mask is then painted white over a
//! gray background, with a blurred alpha ramp for smooth edges.

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::blur;
use crate::layout::PanelLayout;
use crate::mask::BinaryMask;
use crate::scale;
use crate::segment;
use crate::types::{Dimensions, MaskResult, MorphologyParams, PipelineConfig, PipelineError};
use crate::units;

/// How the silhouette is sized into the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Largest uniform scale that fits entirely inside the panel.
    #[default]
    Fit,
    /// Smallest uniform scale that covers the whole panel.
    Fill,
    /// Resize to exactly the panel size, ignoring aspect ratio.
    Stretch,
}

impl std::fmt::Display for FitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fit => write!(f, "fit"),
            Self::Fill => write!(f, "fill"),
            Self::Stretch => write!(f, "stretch"),
        }
    }
}

/// Panel composition settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Page grid the panel is printed on.
    pub layout: PanelLayout,
    /// Sizing rule.
    pub fit: FitMode,
    /// Horizontal content shift, positive to the right.
    pub shift_x_mm: f64,
    /// Vertical content shift, positive downwards.
    pub shift_y_mm: f64,
    /// Background color behind the paper.
    pub background: [u8; 3],
}

impl PanelConfig {
    /// Default background gray (`#8E8E8E`).
    pub const DEFAULT_BACKGROUND: [u8; 3] = [0x8E, 0x8E, 0x8E];

    /// Validate the layout and shifts.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidConfig`] for a non-finite shift or a bad
    /// layout, [`PipelineError::DegenerateGeometry`] when the layout
    /// leaves no printable area.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [("shift_x_mm", self.shift_x_mm), ("shift_y_mm", self.shift_y_mm)] {
            if !value.is_finite() {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        self.layout.panel_size_px().map(|_| ())
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            layout: PanelLayout::default(),
            fit: FitMode::default(),
            shift_x_mm: 0.0,
            shift_y_mm: 0.0,
            background: Self::DEFAULT_BACKGROUND,
        }
    }
}

/// A composed panel plus the parameters used to build it.
#[derive(Debug, Clone)]
pub struct ComposedPanel {
    /// The panel at `layout.panel_size_px()`.
    pub image: RgbImage,
    /// Segmentation of the resampled silhouette.
    pub masks: MaskResult,
    /// Scale from source pixels to panel pixels (the larger axis scale
    /// for [`FitMode::Stretch`]).
    pub scale: f64,
    /// Size of the resampled silhouette.
    pub content: Dimensions,
    /// Top-left corner of the silhouette in the panel, may be negative.
    pub offset: (i64, i64),
    /// Morphology radii used for the panel-resolution segmentation.
    pub morphology: MorphologyParams,
}

/// Build the white-on-gray panel from a conditioned grayscale.
///
/// `processed` must already be in segmentation polarity, i.e. inverted
/// when the flip decision asked for it.
///
/// # Errors
///
/// [`PipelineError::ZeroDimension`] for an empty image, and any error
/// from [`PanelConfig::validate`].
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn compose_panel(
    processed: &GrayImage,
    config: &PipelineConfig,
    panel: &PanelConfig,
) -> Result<ComposedPanel, PipelineError> {
    let (src_w, src_h) = processed.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(PipelineError::ZeroDimension {
            width: src_w,
            height: src_h,
        });
    }
    panel.validate()?;
    let layout = &panel.layout;
    let (panel_w, panel_h) = layout.panel_size_px()?;

    let scale_x = f64::from(panel_w) / f64::from(src_w);
    let scale_y = f64::from(panel_h) / f64::from(src_h);
    let (scale_used, new_w, new_h) = match panel.fit {
        FitMode::Stretch => (scale_x.max(scale_y), panel_w, panel_h),
        FitMode::Fit | FitMode::Fill => {
            let s = if panel.fit == FitMode::Fill {
                scale_x.max(scale_y)
            } else {
                scale_x.min(scale_y)
            };
            let w = ((f64::from(src_w) * s).round() as u32).max(1);
            let h = ((f64::from(src_h) * s).round() as u32).max(1);
            (s, w, h)
        }
    };
    tracing::info!(new_w, new_h, scale = scale_used, fit = %panel.fit, "resizing silhouette");

    let morphology = scale::scale_morphology(&config.morphology, scale_used, layout.dpi);
    tracing::info!(
        dilate_px = morphology.dilate_px,
        dilate_mm = units::px_to_mm(i64::from(morphology.dilate_px), layout.dpi),
        detail_join_px = morphology.detail_join_px,
        detail_join_mm = units::px_to_mm(i64::from(morphology.detail_join_px), layout.dpi),
        antialias = morphology.antialias,
        "segmenting at export scale"
    );

    let resized = if (new_w, new_h) == (src_w, src_h) {
        processed.clone()
    } else {
        imageops::resize(processed, new_w, new_h, FilterType::Lanczos3)
    };
    let scaled_config = PipelineConfig {
        morphology,
        ..config.clone()
    };
    let masks = segment::segment(&resized, &scaled_config);
    let alpha = blur::soft_alpha(&masks.paper, morphology.antialias);

    let shift_x = units::mm_to_px(panel.shift_x_mm, layout.dpi);
    let shift_y = units::mm_to_px(panel.shift_y_mm, layout.dpi);
    let off_x = (i64::from(panel_w) - i64::from(new_w))
        .div_euclid(2)
        .saturating_add(shift_x);
    let off_y = (i64::from(panel_h) - i64::from(new_h))
        .div_euclid(2)
        .saturating_add(shift_y);

    let mut image = RgbImage::from_pixel(panel_w, panel_h, Rgb(panel.background));
    composite_white(&mut image, &alpha, off_x, off_y);

    Ok(ComposedPanel {
        image,
        masks,
        scale: scale_used,
        content: Dimensions {
            width: new_w,
            height: new_h,
        },
        offset: (off_x, off_y),
        morphology,
    })
}

/// Source-size preview: the paper mask painted white over `background`.
#[must_use = "returns the preview image"]
pub fn render_preview(paper: &BinaryMask, antialias: f32, background: [u8; 3]) -> RgbImage {
    let (w, h) = paper.dimensions();
    let mut image = RgbImage::from_pixel(w, h, Rgb(background));
    composite_white(&mut image, &blur::soft_alpha(paper, antialias), 0, 0);
    image
}

/// Blend white into `canvas` through `alpha` placed at `(off_x, off_y)`.
/// Parts of `alpha` outside the canvas are clipped.
fn composite_white(canvas: &mut RgbImage, alpha: &GrayImage, off_x: i64, off_y: i64) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (ax, ay, a) in alpha.enumerate_pixels() {
        let a = u16::from(a.0[0]);
        if a == 0 {
            continue;
        }
        let x = off_x.saturating_add(i64::from(ax));
        let y = off_y.saturating_add(i64::from(ay));
        if x < 0 || y < 0 || x >= cw || y >= ch {
            continue;
        }
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            continue;
        };
        let px = canvas.get_pixel_mut(x, y);
        for c in &mut px.0 {
            let bg = u16::from(*c);
            let blended = (bg * (255 - a) + 255 * a + 127) / 255;
            *c = u8::try_from(blended).unwrap_or(u8::MAX);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    /// A layout small enough for unit tests: 2×2 pages at 20 dpi.
    fn small_layout() -> PanelLayout {
        PanelLayout {
            dpi: 20,
            cols: 2,
            rows: 2,
            margin_mm: 10.0,
            overlap_mm: 0.0,
        }
    }

    /// Light square inside a dark frame, in segmentation polarity.
    fn framed_square(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let inside = x >= w / 4 && x < 3 * w / 4 && y >= h / 4 && y < 3 * h / 4;
            Luma([if inside { 240 } else { 20 }])
        })
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            blur: 0.0,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn panel_has_layout_size() {
        let panel_cfg = PanelConfig {
            layout: small_layout(),
            ..PanelConfig::default()
        };
        let out = compose_panel(&framed_square(40, 40), &config(), &panel_cfg).unwrap();
        let expected = small_layout().panel_size_px().unwrap();
        assert_eq!(out.image.dimensions(), expected);
        assert_eq!(out.masks.dimensions().width, out.content.width);
    }

    #[test]
    fn fit_centers_and_keeps_aspect() {
        let panel_cfg = PanelConfig {
            layout: small_layout(),
            ..PanelConfig::default()
        };
        let (pw, ph) = small_layout().panel_size_px().unwrap();
        let out = compose_panel(&framed_square(40, 40), &config(), &panel_cfg).unwrap();
        assert_eq!(out.content.width, out.content.height);
        assert_eq!(out.content.width, pw.min(ph));
        let center = out.image.get_pixel(pw / 2, ph / 2);
        assert_eq!(center.0, [255, 255, 255]);
        let corner = out.image.get_pixel(0, 0);
        assert_eq!(corner.0, PanelConfig::DEFAULT_BACKGROUND);
    }

    #[test]
    fn fill_and_stretch_cover_the_panel() {
        let (pw, ph) = small_layout().panel_size_px().unwrap();
        for fit in [FitMode::Fill, FitMode::Stretch] {
            let panel_cfg = PanelConfig {
                layout: small_layout(),
                fit,
                ..PanelConfig::default()
            };
            let out = compose_panel(&framed_square(30, 50), &config(), &panel_cfg).unwrap();
            assert!(out.content.width >= pw, "{fit}: width {}", out.content.width);
            assert!(out.content.height >= ph, "{fit}: height {}", out.content.height);
        }
    }

    #[test]
    fn shift_moves_content() {
        let base = PanelConfig {
            layout: small_layout(),
            ..PanelConfig::default()
        };
        let shifted = PanelConfig {
            shift_x_mm: 25.4,
            shift_y_mm: -25.4,
            ..base
        };
        let a = compose_panel(&framed_square(40, 40), &config(), &base).unwrap();
        let b = compose_panel(&framed_square(40, 40), &config(), &shifted).unwrap();
        assert_eq!(b.offset.0 - a.offset.0, 20);
        assert_eq!(b.offset.1 - a.offset.1, -20);
    }

    #[test]
    fn morphology_is_rescaled_and_capped() {
        let panel_cfg = PanelConfig {
            layout: small_layout(),
            ..PanelConfig::default()
        };
        let out = compose_panel(&framed_square(20, 20), &config(), &panel_cfg).unwrap();
        // 298 / 20 = 14.9; the 20 dpi caps are 2 mm = 2 px and 1.4 mm = 1 px.
        assert!((out.scale - 14.9).abs() < 1e-9);
        assert_eq!(out.morphology.dilate_px, 2);
        assert_eq!(out.morphology.detail_join_px, 1);
        assert!(out.morphology.antialias > config().morphology.antialias);
    }

    #[test]
    fn degenerate_layout_is_rejected_before_work() {
        let panel_cfg = PanelConfig {
            layout: PanelLayout {
                margin_mm: 200.0,
                ..small_layout()
            },
            ..PanelConfig::default()
        };
        let err = compose_panel(&framed_square(20, 20), &config(), &panel_cfg).unwrap_err();
        assert!(matches!(err, PipelineError::DegenerateGeometry { .. }));
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = compose_panel(&GrayImage::new(0, 3), &config(), &PanelConfig::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ZeroDimension { .. }));
    }

    #[test]
    fn preview_paints_paper_white() {
        let paper = BinaryMask::from_fn(10, 10, |x, _| x >= 5);
        let img = render_preview(&paper, 0.0, [10, 20, 30]);
        assert_eq!(img.get_pixel(8, 3).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(1, 3).0, [10, 20, 30]);
    }

    #[test]
    fn preview_antialias_produces_intermediate_values() {
        let paper = BinaryMask::from_fn(20, 20, |x, _| x >= 10);
        let img = render_preview(&paper, 1.5, [0, 0, 0]);
        let edge = img.get_pixel(10, 10).0[0];
        assert!(edge > 0 && edge < 255, "edge value {edge}");
    }

    #[test]
    fn antialiased_preview_keeps_pure_white_and_backdrop() {
        let paper = BinaryMask::from_fn(160, 160, |x, y| {
            (20..140).contains(&x) && (20..140).contains(&y)
        });
        let img = render_preview(&paper, 3.0, [90, 90, 90]);
        assert_eq!(img.get_pixel(80, 80).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(2, 2).0, [90, 90, 90]);
    }

    #[test]
    fn enormous_shift_moves_silhouette_off_the_panel() {
        for shift in [1e300, -1e300] {
            let panel_cfg = PanelConfig {
                layout: small_layout(),
                shift_x_mm: shift,
                ..PanelConfig::default()
            };
            let out = compose_panel(&framed_square(40, 40), &config(), &panel_cfg).unwrap();
            assert!(
                out.image.pixels().all(|p| p.0 == PanelConfig::DEFAULT_BACKGROUND),
                "shift {shift} left paper on the panel"
            );
        }
    }
}
