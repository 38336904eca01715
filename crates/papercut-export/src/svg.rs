//! Printable A4 pages for panel tiles.
//!
//! Each page is an SVG document in millimetres (`viewBox="0 0 210 297"`)
//! holding one tile raster inside the print margins, plus everything
//! needed to cut and assemble the panel by hand:
//!
//! - a dashed cut box around the printable area,
//! - cross-shaped crop markers at its corners,
//! - dotted guides marking the strip shared with each neighbour when the
//!   layout has an overlap,
//! - "Row r / Col c" and "Page n / N" labels,
//! - a mini-map of the grid with the current tile highlighted.
//!
//! The tile PNG is embedded as a base64 `data:` URI so every page is a
//! single self-contained file. This is a pure function with no I/O -- it
//! returns a `String`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use svg::Document;
use svg::node::element::{Description, Element, Group, Image, Line, Rectangle, Title};
use svg::node::{Node, Text};

use papercut_pipeline::PanelLayout;
use papercut_pipeline::units::{self, A4_MM};

use crate::tile::Tile;

/// Crop marker arm length, end to end.
const CROSS_SIZE_MM: f64 = 6.0;
/// Stroke width of cut lines and markers.
const STROKE_MM: f64 = 0.25;
/// Label font size.
const FONT_MM: f64 = 3.5;
/// Mini-map cell size.
const MAP_CELL_MM: f64 = 3.0;
/// Mini-map padding around the cells.
const MAP_PAD_MM: f64 = 1.0;
/// Highlight color for the current tile and overlap guides.
const ACCENT: &str = "#1a73e8";

/// Metadata to embed in a page.
///
/// Both fields are optional. When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct PageMetadata<'a> {
    /// Document title, typically the source image name.
    pub title: Option<&'a str>,

    /// Document description, typically the layout and pipeline settings.
    pub description: Option<&'a str>,
}

/// Round to 0.01 mm so coordinates stay short.
fn mm(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Line {
    Line::new()
        .set("x1", mm(x1))
        .set("y1", mm(y1))
        .set("x2", mm(x2))
        .set("y2", mm(y2))
}

fn cross_marker(cx: f64, cy: f64) -> Group {
    let half = CROSS_SIZE_MM / 2.0;
    Group::new()
        .set("stroke", "#000")
        .set("stroke-width", STROKE_MM)
        .set("fill", "none")
        .add(line(cx - half, cy, cx + half, cy))
        .add(line(cx, cy - half, cx, cy + half))
}

fn label(x: f64, y: f64, anchor: &str, content: &str) -> Element {
    let mut text = Element::new("text");
    text.assign("x", mm(x));
    text.assign("y", mm(y));
    text.assign("text-anchor", anchor);
    text.assign("dominant-baseline", "middle");
    text.assign("font-family", "Arial, sans-serif");
    text.assign("font-size", FONT_MM);
    text.assign("fill", "#000");
    text.append(Text::new(content));
    text
}

/// Grid overview anchored at its top-right corner `(right, top)`.
fn mini_map(layout: &PanelLayout, tile: &Tile, right: f64, top: f64) -> Group {
    let width = f64::from(layout.cols).mul_add(MAP_CELL_MM, 2.0 * MAP_PAD_MM);
    let height = f64::from(layout.rows).mul_add(MAP_CELL_MM, 2.0 * MAP_PAD_MM);
    let left = right - width;

    let mut group = Group::new().set("id", "layout-map").add(
        Rectangle::new()
            .set("x", mm(left))
            .set("y", mm(top))
            .set("width", mm(width))
            .set("height", mm(height))
            .set("fill", "#f0f0f0")
            .set("stroke", "#444")
            .set("stroke-width", STROKE_MM),
    );
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let current = row == tile.rect.row && col == tile.rect.col;
            group = group.add(
                Rectangle::new()
                    .set("x", mm(f64::from(col).mul_add(MAP_CELL_MM, left + MAP_PAD_MM)))
                    .set("y", mm(f64::from(row).mul_add(MAP_CELL_MM, top + MAP_PAD_MM)))
                    .set("width", MAP_CELL_MM)
                    .set("height", MAP_CELL_MM)
                    .set("fill", if current { ACCENT } else { "none" })
                    .set("stroke", "#444")
                    .set("stroke-width", STROKE_MM / 2.0),
            );
        }
    }
    group
}

/// Lay one tile out on an A4 page.
///
/// `png` is the tile's encoded raster (see
/// [`encode_png_rgb`](crate::raster::encode_png_rgb)); it is placed at
/// the top-left margin at its physical size for `layout.dpi`.
#[must_use]
pub fn tile_page_svg(
    tile: &Tile,
    png: &[u8],
    layout: &PanelLayout,
    metadata: &PageMetadata<'_>,
) -> String {
    let (page_w, page_h) = A4_MM;
    let margin = units::px_to_mm(layout.margin_px(), layout.dpi);
    let tile_w = units::px_to_mm(i64::from(tile.rect.width), layout.dpi);
    let tile_h = units::px_to_mm(i64::from(tile.rect.height), layout.dpi);
    let (left, top) = (margin, margin);
    let (right, bottom) = (margin + tile_w, margin + tile_h);

    let mut doc = Document::new()
        .set("width", format!("{page_w}mm"))
        .set("height", format!("{page_h}mm"))
        .set("viewBox", format!("0 0 {page_w} {page_h}"));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    doc = doc.add(
        Rectangle::new()
            .set("width", page_w)
            .set("height", page_h)
            .set("fill", "#fff"),
    );

    let href = format!("data:image/png;base64,{}", STANDARD.encode(png));
    doc = doc.add(
        Image::new()
            .set("x", mm(left))
            .set("y", mm(top))
            .set("width", mm(tile_w))
            .set("height", mm(tile_h))
            .set("preserveAspectRatio", "none")
            .set("href", href),
    );

    // Cut box around the printable area.
    doc = doc.add(
        Rectangle::new()
            .set("id", "cut-box")
            .set("x", mm(left))
            .set("y", mm(top))
            .set("width", mm(tile_w))
            .set("height", mm(tile_h))
            .set("fill", "none")
            .set("stroke", "#000")
            .set("stroke-width", STROKE_MM)
            .set("stroke-dasharray", "2 1"),
    );

    for (cx, cy) in [(left, top), (right, top), (left, bottom), (right, bottom)] {
        doc = doc.add(cross_marker(cx, cy));
    }

    let overlap_px = layout.overlap_px();
    if overlap_px > 0 {
        let overlap = units::px_to_mm(overlap_px, layout.dpi);
        let mut guides = Group::new()
            .set("id", "overlap-guides")
            .set("stroke", ACCENT)
            .set("stroke-width", STROKE_MM)
            .set("stroke-dasharray", "0.5 0.5");
        if tile.rect.col > 0 {
            guides = guides.add(line(left + overlap, top, left + overlap, bottom));
        }
        if tile.rect.col + 1 < layout.cols {
            guides = guides.add(line(right - overlap, top, right - overlap, bottom));
        }
        if tile.rect.row > 0 {
            guides = guides.add(line(left, top + overlap, right, top + overlap));
        }
        if tile.rect.row + 1 < layout.rows {
            guides = guides.add(line(left, bottom - overlap, right, bottom - overlap));
        }
        doc = doc.add(guides);
    }

    // Labels sit in the margin band, or just inside the page edge when
    // the margin is too thin.
    let band = (margin / 2.0).max(FONT_MM);
    doc = doc.add(label(
        page_w / 2.0,
        page_h - band,
        "middle",
        &format!("Row {} / Col {}", tile.rect.row + 1, tile.rect.col + 1),
    ));
    doc = doc.add(label(
        left.max(FONT_MM),
        band,
        "start",
        &format!("Page {} / {}", tile.rect.page, layout.page_count()),
    ));

    doc = doc.add(mini_map(layout, tile, right - 2.0, top + 2.0));

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
