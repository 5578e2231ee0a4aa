//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the derivative
//! generator needs: identify, decode, and render.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Rendering always produces JPEG, whatever the output path says.

use super::params::{CropRect, Quality};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// What to write: an optional source region, resampled to exactly
/// `width`×`height`, encoded as JPEG at `quality`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub output: PathBuf,
    /// Region of the decoded source; the whole image when `None`.
    pub region: Option<CropRect>,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Get image dimensions without decoding pixel data.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the full raster. The format is sniffed from the content.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Crop, resample (Catmull-Rom) and encode `image` as described by `params`.
    fn render(&self, image: &DynamicImage, params: &RenderParams) -> Result<(), BackendError>;
}
