//! Page grid geometry: how a panel is divided into printable A4 tiles.
//!
//! Every page has the same margin on all four sides. The printable area
//! inside the margins is one tile. Neighbouring tiles may overlap by a
//! fixed physical amount so pages can be glued with a shared strip.

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;
use crate::units;

/// Grid of A4 pages covering one panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelLayout {
    /// Output resolution for the panel and pages.
    pub dpi: u32,
    /// Number of page columns.
    pub cols: u32,
    /// Number of page rows.
    pub rows: u32,
    /// Print margin on each side of a page.
    pub margin_mm: f64,
    /// Shared strip between neighbouring tiles.
    pub overlap_mm: f64,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            dpi: Self::DEFAULT_DPI,
            cols: Self::DEFAULT_COLS,
            rows: Self::DEFAULT_ROWS,
            margin_mm: Self::DEFAULT_MARGIN_MM,
            overlap_mm: 0.0,
        }
    }
}

/// One tile's position in the grid and in panel pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRect {
    /// Zero-based row.
    pub row: u32,
    /// Zero-based column.
    pub col: u32,
    /// One-based page number in row-major order.
    pub page: u32,
    /// Left edge in the panel.
    pub x: u32,
    /// Top edge in the panel.
    pub y: u32,
    /// Tile width in pixels.
    pub width: u32,
    /// Tile height in pixels.
    pub height: u32,
}

impl PanelLayout {
    /// Default resolution.
    pub const DEFAULT_DPI: u32 = 300;
    /// Default page columns.
    pub const DEFAULT_COLS: u32 = 3;
    /// Default page rows.
    pub const DEFAULT_ROWS: u32 = 4;
    /// Default print margin.
    pub const DEFAULT_MARGIN_MM: f64 = 10.0;

    /// Reject zero counts, zero DPI, and negative or non-finite lengths.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for the first bad field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.dpi == 0 {
            return Err(PipelineError::InvalidConfig("dpi must be positive".into()));
        }
        if self.cols == 0 || self.rows == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "grid must have at least one page, got {}x{}",
                self.cols, self.rows
            )));
        }
        for (name, value) in [("margin_mm", self.margin_mm), ("overlap_mm", self.overlap_mm)] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// A4 page size in pixels at this layout's DPI.
    #[must_use]
    pub fn page_size_px(&self) -> (i64, i64) {
        units::a4_size_px(self.dpi)
    }

    /// Margin in pixels.
    #[must_use]
    pub fn margin_px(&self) -> i64 {
        units::mm_to_px(self.margin_mm, self.dpi)
    }

    /// Overlap in pixels.
    #[must_use]
    pub fn overlap_px(&self) -> i64 {
        units::mm_to_px(self.overlap_mm, self.dpi)
    }

    /// Printable area of one page: the page minus both margins.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidConfig`] from [`validate`](Self::validate),
    /// or [`PipelineError::DegenerateGeometry`] when either side is not
    /// positive.
    pub fn tile_size_px(&self) -> Result<(u32, u32), PipelineError> {
        self.validate()?;
        let (pw, ph) = self.page_size_px();
        let margins = self.margin_px().saturating_mul(2);
        let inner_width = pw.saturating_sub(margins);
        let inner_height = ph.saturating_sub(margins);
        match (u32::try_from(inner_width), u32::try_from(inner_height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(PipelineError::DegenerateGeometry {
                inner_width,
                inner_height,
            }),
        }
    }

    /// Distance between the origins of neighbouring tiles.
    ///
    /// # Errors
    ///
    /// As [`tile_size_px`](Self::tile_size_px), plus
    /// [`PipelineError::DegenerateGeometry`] when the overlap swallows a
    /// whole tile.
    pub fn step_px(&self) -> Result<(u32, u32), PipelineError> {
        let (tw, th) = self.tile_size_px()?;
        let overlap = self.overlap_px();
        let step_w = i64::from(tw).saturating_sub(overlap);
        let step_h = i64::from(th).saturating_sub(overlap);
        match (u32::try_from(step_w), u32::try_from(step_h)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(PipelineError::DegenerateGeometry {
                inner_width: step_w,
                inner_height: step_h,
            }),
        }
    }

    /// Full panel size: `(n - 1) · step + tile` on each axis.
    ///
    /// # Errors
    ///
    /// As [`step_px`](Self::step_px).
    pub fn panel_size_px(&self) -> Result<(u32, u32), PipelineError> {
        let (tw, th) = self.tile_size_px()?;
        let (sw, sh) = self.step_px()?;
        let width = u64::from(self.cols - 1) * u64::from(sw) + u64::from(tw);
        let height = u64::from(self.rows - 1) * u64::from(sh) + u64::from(th);
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => Ok((w, h)),
            _ => Err(PipelineError::InvalidConfig(format!(
                "panel of {width}x{height} px is too large"
            ))),
        }
    }

    /// Number of pages.
    #[must_use]
    pub const fn page_count(&self) -> u32 {
        self.cols.saturating_mul(self.rows)
    }

    /// Every tile in row-major order.
    ///
    /// # Errors
    ///
    /// As [`panel_size_px`](Self::panel_size_px).
    pub fn tiles(&self) -> Result<Vec<TileRect>, PipelineError> {
        let (tw, th) = self.tile_size_px()?;
        let (sw, sh) = self.step_px()?;
        self.panel_size_px()?;

        let mut tiles = Vec::with_capacity(self.page_count() as usize);
        let mut page = 1;
        for row in 0..self.rows {
            for col in 0..self.cols {
                tiles.push(TileRect {
                    row,
                    col,
                    page,
                    x: col * sw,
                    y: row * sh,
                    width: tw,
                    height: th,
                });
                page += 1;
            }
        }
        Ok(tiles)
    }
}
