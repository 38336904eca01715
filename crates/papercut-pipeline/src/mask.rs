//! Two-valued masks.
//!
//! [`BinaryMask`] wraps a [`GrayImage`] whose samples are only ever
//! [`FOREGROUND`] (255) or [`BACKGROUND`] (0). Every constructor either
//! thresholds a grayscale image or builds the samples from booleans, so
//! intermediate gray values can never leak into a mask. Conversions in
//! and out of grayscale are explicit: [`BinaryMask::as_gray`] for
//! filters that consume 8-bit samples, [`BinaryMask::below`] and
//! [`BinaryMask::at_least`] for the way back.

use image::{GrayImage, Luma};

/// Sample value of a set pixel.
pub const FOREGROUND: u8 = 255;

/// Sample value of a cleared pixel.
pub const BACKGROUND: u8 = 0;

/// A bilevel image: every pixel is either foreground or background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    /// An all-background mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Build a mask by evaluating `f` at every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([sample(f(x, y))])
        }))
    }

    /// Pixels strictly darker than `threshold`.
    #[must_use]
    pub fn below(gray: &GrayImage, threshold: u8) -> Self {
        Self::map_gray(gray, |v| v < threshold)
    }

    /// Pixels at least as bright as `threshold`.
    #[must_use]
    pub fn at_least(gray: &GrayImage, threshold: u8) -> Self {
        Self::map_gray(gray, |v| v >= threshold)
    }

    /// Binarize an arbitrary grayscale raster at the 50% level.
    ///
    /// Used for mask files read back from disk, which may have been
    /// resampled or saved with soft edges.
    #[must_use]
    pub fn from_gray(gray: &GrayImage) -> Self {
        Self::map_gray(gray, |v| v > 127)
    }

    /// Wrap a raster that is already known to hold only 0 and 255.
    ///
    /// Morphology outputs from `imageproc` satisfy this for bilevel
    /// inputs. Any other value is treated as foreground.
    pub(crate) fn from_bilevel(mut gray: GrayImage) -> Self {
        for v in gray.iter_mut() {
            *v = sample(*v != BACKGROUND);
        }
        Self(gray)
    }

    fn map_gray(gray: &GrayImage, f: impl Fn(u8) -> bool) -> Self {
        let mut out = gray.clone();
        for v in out.iter_mut() {
            *v = sample(f(*v));
        }
        Self(out)
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// `(width, height)` in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Whether the pixel at `(x, y)` is foreground.
    ///
    /// Out-of-bounds coordinates read as background.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.0
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] != BACKGROUND)
    }

    /// Set or clear a single pixel. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, on: bool) {
        if let Some(p) = self.0.get_pixel_mut_checked(x, y) {
            p.0[0] = sample(on);
        }
    }

    /// Borrow the underlying 0/255 raster.
    #[must_use]
    pub const fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    /// Unwrap into the underlying 0/255 raster.
    #[must_use]
    pub fn into_gray(self) -> GrayImage {
        self.0
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.0.iter().map(|&v| u64::from(v != BACKGROUND)).sum()
    }

    /// `true` when no pixel is foreground.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&v| v == BACKGROUND)
    }

    /// `true` when every pixel is foreground.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.0.iter().all(|&v| v != BACKGROUND)
    }

    /// Fraction of pixels that are foreground, `0.0` for an empty canvas.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        let total = u64::from(self.width()) * u64::from(self.height());
        if total == 0 {
            return 0.0;
        }
        self.count() as f64 / total as f64
    }

    /// Pixel-wise union.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a || b)
    }

    /// Pixel-wise intersection.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a && b)
    }

    /// Pixels set in `self` but not in `other`.
    #[must_use]
    pub fn and_not(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a && !b)
    }

    /// Swap foreground and background.
    #[must_use]
    pub fn invert(&self) -> Self {
        let mut out = self.0.clone();
        for v in out.iter_mut() {
            *v = sample(*v == BACKGROUND);
        }
        Self(out)
    }

    /// `true` when every foreground pixel of `self` is also set in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(&a, &b)| a == BACKGROUND || b != BACKGROUND)
    }

    /// Combine two co-registered masks sample by sample.
    ///
    /// Both masks must share dimensions; pixels of the larger one beyond
    /// the common extent are left as they were in `self`.
    fn zip_with(&self, other: &Self, f: impl Fn(bool, bool) -> bool) -> Self {
        debug_assert_eq!(
            self.dimensions(),
            other.dimensions(),
            "combining masks of different sizes",
        );
        let mut out = self.0.clone();
        for (a, &b) in out.iter_mut().zip(other.0.iter()) {
            *a = sample(f(*a != BACKGROUND, b != BACKGROUND));
        }
        Self(out)
    }
}

const fn sample(on: bool) -> u8 {
    if on { FOREGROUND } else { BACKGROUND }
}
