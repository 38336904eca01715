//! Physical-unit conversions shared by layout, scaling and export.
//!
//! One millimetre is `round(mm · dpi / 25.4)` pixels. The inverse is
//! exact, so a round trip is off by at most half a pixel.

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// A4 page size in millimetres, portrait.
pub const A4_MM: (f64, f64) = (210.0, 297.0);

/// Convert millimetres to whole pixels at `dpi`.
///
/// Negative lengths (offsets) convert symmetrically.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn mm_to_px(mm: f64, dpi: u32) -> i64 {
    (mm * f64::from(dpi) / MM_PER_INCH).round() as i64
}

/// Convert pixels back to millimetres at `dpi`.
///
/// Returns 0 for a zero DPI or a non-positive pixel count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn px_to_mm(px: i64, dpi: u32) -> f64 {
    if dpi == 0 || px <= 0 {
        return 0.0;
    }
    px as f64 / f64::from(dpi) * MM_PER_INCH
}

/// A4 page size in pixels at `dpi`.
#[must_use]
pub fn a4_size_px(dpi: u32) -> (i64, i64) {
    (mm_to_px(A4_MM.0, dpi), mm_to_px(A4_MM.1, dpi))
}
