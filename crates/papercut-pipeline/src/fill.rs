//! Closed-region filling: classify every pixel as outside, wall, or
//! enclosed interior.
//!
//! Outline pixels (optionally pre-dilated) act as walls. Everything
//! reachable from any canvas edge pixel through non-wall pixels, moving
//! in 4-connected steps, is outside. The interior is whatever is neither
//! outside nor wall.
//!
//! # Strategy pattern
//!
//! [`RegionFiller`] has two implementations selected by
//! [`FillStrategyKind`]. [`Labelling`](FillStrategyKind::Labelling) uses
//! `imageproc`'s connected-component labelling and is the default.
//! [`BreadthFirst`](FillStrategyKind::BreadthFirst) is a plain queue
//! flood over the pixel grid with no library support. Both produce
//! bit-identical output; the tests hold them to that.

use std::collections::VecDeque;

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::mask::{BACKGROUND, BinaryMask};
use crate::morphology;

/// Selects which flood-fill implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategyKind {
    /// Connected-component labelling of the open (non-wall) pixels via
    /// `imageproc::region_labelling`. Components touching the canvas
    /// edge are outside.
    #[default]
    Labelling,
    /// Explicit breadth-first traversal seeded at every open edge pixel.
    BreadthFirst,
}

impl std::fmt::Display for FillStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Labelling => write!(f, "labelling"),
            Self::BreadthFirst => write!(f, "breadth-first"),
        }
    }
}

/// Trait for region-filling strategies.
///
/// Input: a wall mask (foreground = wall). Output: the enclosed interior
/// (foreground = neither wall nor reachable from the canvas edge).
pub trait RegionFiller {
    /// Fill the regions enclosed by `walls`.
    fn fill_interior(&self, walls: &BinaryMask) -> BinaryMask;
}

impl RegionFiller for FillStrategyKind {
    fn fill_interior(&self, walls: &BinaryMask) -> BinaryMask {
        match *self {
            Self::Labelling => fill_by_labelling(walls),
            Self::BreadthFirst => fill_breadth_first(walls),
        }
    }
}

/// Fill the regions enclosed by an outline.
///
/// The outline is dilated by a `(2·dilation + 1)` square first, which
/// seals small breaks; the dilated outline itself is never part of the
/// result.
#[must_use = "returns the filled interior mask"]
pub fn fill_closed_regions(
    outline: &BinaryMask,
    dilation: u32,
    filler: &impl RegionFiller,
) -> BinaryMask {
    let walls = morphology::dilate_square(outline, dilation);
    filler.fill_interior(&walls)
}

fn fill_by_labelling(walls: &BinaryMask) -> BinaryMask {
    let (w, h) = walls.dimensions();
    if w == 0 || h == 0 {
        return walls.clone();
    }
    // Every pixel is on the canvas edge, so nothing can be enclosed.
    // `connected_components` also rejects a single open pixel.
    if w <= 2 || h <= 2 {
        return BinaryMask::new(w, h);
    }

    // Label the open pixels; walls become the labelling background.
    let open = walls.invert();
    let labels = connected_components(open.as_gray(), Connectivity::Four, Luma([BACKGROUND]));

    let max_label = labels.iter().copied().max().unwrap_or(0);
    let mut touches_edge = vec![false; max_label as usize + 1];
    for x in 0..w {
        touches_edge[labels.get_pixel(x, 0).0[0] as usize] = true;
        touches_edge[labels.get_pixel(x, h - 1).0[0] as usize] = true;
    }
    for y in 0..h {
        touches_edge[labels.get_pixel(0, y).0[0] as usize] = true;
        touches_edge[labels.get_pixel(w - 1, y).0[0] as usize] = true;
    }

    BinaryMask::from_fn(w, h, |x, y| {
        let label = labels.get_pixel(x, y).0[0];
        label != 0 && !touches_edge[label as usize]
    })
}

fn fill_breadth_first(walls: &BinaryMask) -> BinaryMask {
    let (w, h) = walls.dimensions();
    if w == 0 || h == 0 {
        return walls.clone();
    }

    let mut outside = BinaryMask::new(w, h);
    let mut queue = VecDeque::new();
    let enqueue = |x: u32, y: u32, outside: &mut BinaryMask, queue: &mut VecDeque<(u32, u32)>| {
        if !walls.get(x, y) && !outside.get(x, y) {
            outside.set(x, y, true);
            queue.push_back((x, y));
        }
    };

    for x in 0..w {
        enqueue(x, 0, &mut outside, &mut queue);
        enqueue(x, h - 1, &mut outside, &mut queue);
    }
    for y in 0..h {
        enqueue(0, y, &mut outside, &mut queue);
        enqueue(w - 1, y, &mut outside, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        if x > 0 {
            enqueue(x - 1, y, &mut outside, &mut queue);
        }
        if x + 1 < w {
            enqueue(x + 1, y, &mut outside, &mut queue);
        }
        if y > 0 {
            enqueue(x, y - 1, &mut outside, &mut queue);
        }
        if y + 1 < h {
            enqueue(x, y + 1, &mut outside, &mut queue);
        }
    }

    // interior = NOT outside AND NOT wall
    outside.or(walls).invert()
}
