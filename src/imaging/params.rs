//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. The crop chain
//! produces them and the [`backend`](super::backend) renders them, which lets
//! tests swap in a recording backend without touching strategy logic.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 85). Clamped on construction.
//! - [`CropRect`]: A region of the source raster, in source pixels.
//! - [`CropResult`]: A chosen region plus the strategy that chose it and its score.

use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Rectangle inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether the rectangle lies within a `width`×`height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Outcome of a region-choosing crop strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropResult {
    pub rect: CropRect,
    pub strategy: &'static str,
    /// Strategy-specific score; zero for strategies that don't score.
    pub score: f64,
}
