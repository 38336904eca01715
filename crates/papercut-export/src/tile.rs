//! Cut a composed panel into per-page tiles.

use image::imageops;
use papercut_pipeline::{PanelLayout, PipelineError, RgbImage, TileRect};

/// One printable page's share of the panel.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Where the tile sits in the grid and the panel.
    pub rect: TileRect,
    /// Cropped pixels, `rect.width × rect.height`.
    pub image: RgbImage,
}

/// Crop every tile of `layout` out of `panel`, in row-major order.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] when the panel size does not
/// equal [`PanelLayout::panel_size_px`], and propagates layout
/// validation errors.
pub fn slice_panel(panel: &RgbImage, layout: &PanelLayout) -> Result<Vec<Tile>, PipelineError> {
    let expected = layout.panel_size_px()?;
    if panel.dimensions() != expected {
        return Err(PipelineError::InvalidConfig(format!(
            "panel is {}x{} px but the layout needs {}x{} px",
            panel.width(),
            panel.height(),
            expected.0,
            expected.1
        )));
    }

    let tiles: Vec<Tile> = layout
        .tiles()?
        .into_iter()
        .map(|rect| Tile {
            rect,
            image: imageops::crop_imm(panel, rect.x, rect.y, rect.width, rect.height).to_image(),
        })
        .collect();
    tracing::debug!(count = tiles.len(), "sliced panel into tiles");
    Ok(tiles)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;

    fn layout() -> PanelLayout {
        PanelLayout {
            dpi: 20,
            cols: 2,
            rows: 2,
            margin_mm: 10.0,
            overlap_mm: 0.0,
        }
    }

    /// A panel whose red channel encodes the column band and green the
    /// row band of each pixel.
    fn banded_panel(layout: &PanelLayout) -> RgbImage {
        let (w, h) = layout.panel_size_px().unwrap();
        let (tw, th) = layout.tile_size_px().unwrap();
        RgbImage::from_fn(w, h, |x, y| {
            let col = u8::try_from(x / tw).unwrap();
            let row = u8::try_from(y / th).unwrap();
            Rgb([col * 100, row * 100, 0])
        })
    }

    #[test]
    fn tiles_cover_the_grid_row_major() {
        let layout = layout();
        let tiles = slice_panel(&banded_panel(&layout), &layout).unwrap();
        assert_eq!(tiles.len(), 4);
        let (tw, th) = layout.tile_size_px().unwrap();
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.rect.page as usize, i + 1);
            assert_eq!(tile.image.dimensions(), (tw, th));
            let px = tile.image.get_pixel(tw / 2, th / 2).0;
            assert_eq!(u32::from(px[0]), tile.rect.col * 100);
            assert_eq!(u32::from(px[1]), tile.rect.row * 100);
        }
    }

    #[test]
    fn overlapping_tiles_share_pixels() {
        let layout = PanelLayout {
            overlap_mm: 5.0,
            ..layout()
        };
        let (w, h) = layout.panel_size_px().unwrap();
        let panel = RgbImage::from_fn(w, h, |x, _| Rgb([u8::try_from(x % 256).unwrap(), 0, 0]));
        let tiles = slice_panel(&panel, &layout).unwrap();
        let overlap = u32::try_from(layout.overlap_px()).unwrap();
        let (tw, _) = layout.tile_size_px().unwrap();
        // Last columns of tile 1 equal the first columns of tile 2.
        for dx in 0..overlap {
            assert_eq!(
                tiles[0].image.get_pixel(tw - overlap + dx, 0),
                tiles[1].image.get_pixel(dx, 0)
            );
        }
    }

    #[test]
    fn mismatched_panel_is_rejected() {
        let layout = layout();
        let panel = RgbImage::new(10, 10);
        assert!(matches!(
            slice_panel(&panel, &layout),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn degenerate_layout_is_rejected_before_slicing() {
        let layout = PanelLayout {
            margin_mm: 200.0,
            ..layout()
        };
        let panel = RgbImage::new(10, 10);
        assert!(matches!(
            slice_panel(&panel, &layout),
            Err(PipelineError::DegenerateGeometry { .. })
        ));
    }
}
