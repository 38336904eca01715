//! papercut-export: Tile slicing and printable page serializers (sans-IO)
//!
//! Cuts a composed panel into per-page tiles, encodes rasters as PNG,
//! and lays each tile out on an A4 SVG page with crop markers and
//! assembly labels. Every function returns bytes or a `String`; writing
//! files is left to the caller.

pub mod raster;
pub mod svg;
pub mod tile;

pub use raster::{encode_png_gray, encode_png_rgb};
pub use svg::{PageMetadata, tile_page_svg};
pub use tile::{Tile, slice_panel};

use papercut_pipeline::PipelineError;

/// Errors that can occur while exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// The panel does not match its layout, or the layout is unusable.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
