//! Scale-adaptive morphology radii.
//!
//! Radii tuned at the source resolution are re-derived for the export
//! resolution with a sub-linear exponent: linear scaling would thicken
//! bridges and outlines far beyond what looked right at 1×.

use crate::types::MorphologyParams;
use crate::units;

/// Exponent applied to the closing radius.
pub const DILATE_EXPONENT: f64 = 0.45;
/// Exponent applied to the detail-join radius.
pub const JOIN_EXPONENT: f64 = 0.35;
/// Exponent applied to the antialias radius.
pub const ANTIALIAS_EXPONENT: f64 = 0.5;

/// Physical ceiling for the scaled closing radius.
pub const DILATE_CAP_MM: f64 = 2.0;
/// Physical ceiling for the scaled detail-join radius.
pub const JOIN_CAP_MM: f64 = 1.4;
/// Physical ceiling for the scaled antialias radius.
pub const ANTIALIAS_CAP_MM: f64 = 0.45;

/// Scale a pixel radius by `max(scale_factor, 1)^exponent`.
///
/// Returns 0 for a zero base. Otherwise the rounded result is limited to
/// `clamp` when given and floored at 1. Non-finite scale factors are
/// treated as 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scale_radius(base: u32, scale_factor: f64, exponent: f64, clamp: Option<u32>) -> u32 {
    if base == 0 {
        return 0;
    }
    let s = if scale_factor.is_finite() {
        scale_factor.max(1.0)
    } else {
        1.0
    };
    let scaled = (f64::from(base) * s.powf(exponent)).round();
    let mut radius = if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    };
    if let Some(limit) = clamp {
        radius = radius.min(limit);
    }
    radius.max(1)
}

/// Morphology radii re-derived for an export pass at `scale_factor`
/// and `dpi`.
///
/// Each radius is capped at a fixed physical size so a huge upscale
/// cannot swallow fine detail.
#[must_use]
pub fn scale_morphology(base: &MorphologyParams, scale_factor: f64, dpi: u32) -> MorphologyParams {
    let s = if scale_factor.is_finite() {
        scale_factor.max(1.0)
    } else {
        1.0
    };
    let dilate_cap = cap_px(DILATE_CAP_MM, dpi);
    let join_cap = cap_px(JOIN_CAP_MM, dpi);

    #[allow(clippy::cast_possible_truncation)]
    let antialias_cap = units::mm_to_px(ANTIALIAS_CAP_MM, dpi) as f32;
    #[allow(clippy::cast_possible_truncation)]
    let mut antialias = (f64::from(base.antialias.max(0.0)) * s.powf(ANTIALIAS_EXPONENT)) as f32;
    if antialias_cap > 0.0 {
        antialias = antialias.min(antialias_cap);
    }

    MorphologyParams {
        dilate_px: scale_radius(base.dilate_px, s, DILATE_EXPONENT, Some(dilate_cap)),
        detail_join_px: scale_radius(base.detail_join_px, s, JOIN_EXPONENT, Some(join_cap)),
        antialias,
    }
}

fn cap_px(mm: f64, dpi: u32) -> u32 {
    u32::try_from(units::mm_to_px(mm, dpi).max(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_base_stays_zero() {
        assert_eq!(scale_radius(0, 10.0, 0.5, None), 0);
    }

    #[test]
    fn scale_below_one_is_treated_as_one() {
        assert_eq!(scale_radius(3, 0.25, 0.5, None), 3);
        assert_eq!(scale_radius(3, f64::NAN, 0.5, None), 3);
    }

    #[test]
    fn sub_linear_growth() {
        // 2 · 16^0.5 = 8
        assert_eq!(scale_radius(2, 16.0, 0.5, None), 8);
        // 1 · 4^0.45 ≈ 1.87 → 2
        assert_eq!(scale_radius(1, 4.0, DILATE_EXPONENT, None), 2);
    }

    #[test]
    fn clamp_applies_but_floor_wins() {
        assert_eq!(scale_radius(5, 100.0, 0.5, Some(7)), 7);
        assert_eq!(scale_radius(5, 100.0, 0.5, Some(0)), 1);
    }

    #[test]
    fn non_decreasing_in_scale() {
        for base in [1, 2, 5, 13] {
            for exponent in [0.1, 0.35, 0.45, 0.5, 1.0] {
                for clamp in [None, Some(4)] {
                    let mut prev = 0;
                    for step in 0..400 {
                        let s = 0.5 + f64::from(step) * 0.1;
                        let r = scale_radius(base, s, exponent, clamp);
                        assert!(
                            r >= prev,
                            "base={base} e={exponent} clamp={clamp:?}: r({s})={r} < {prev}"
                        );
                        prev = r;
                    }
                }
            }
        }
    }

    #[test]
    fn scale_morphology_caps_at_physical_size() {
        let base = MorphologyParams {
            dilate_px: 4,
            detail_join_px: 4,
            antialias: 2.0,
        };
        let scaled = scale_morphology(&base, 400.0, 300);
        // 2.0 mm @ 300 dpi = 24 px, 1.4 mm = 17 px, 0.45 mm = 5 px.
        assert_eq!(scaled.dilate_px, 24);
        assert_eq!(scaled.detail_join_px, 17);
        assert!((scaled.antialias - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn scale_morphology_keeps_disabled_radii_disabled() {
        let base = MorphologyParams {
            dilate_px: 0,
            detail_join_px: 0,
            antialias: 0.0,
        };
        let scaled = scale_morphology(&base, 8.0, 300);
        assert_eq!(scaled, base);
    }

    #[test]
    fn scale_morphology_at_unit_scale_is_identity() {
        let base = MorphologyParams::default();
        assert_eq!(scale_morphology(&base, 1.0, 300), base);
    }
}
