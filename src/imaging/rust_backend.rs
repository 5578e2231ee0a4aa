//! Pure Rust image processing backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::with_guessed_format` + `into_dimensions` |
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate (pure Rust decoders) |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resample | `DynamicImage::resize_exact` with `CatmullRom` (bicubic) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//!
//! Formats are detected from file content, never from the extension.

use super::backend::{BackendError, Dimensions, ImageBackend, RenderParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<File>>, BackendError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    if reader.format().is_none() {
        return Err(BackendError::UnsupportedFormat(format!(
            "{}: unrecognized content",
            path.display()
        )));
    }
    Ok(reader)
}

fn save_jpeg(img: &DynamicImage, path: &Path, quality: u8) -> Result<(), BackendError> {
    let writer = BufWriter::new(File::create(path)?);
    let encoder = JpegEncoder::new_with_quality(writer, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open_reader(path)?.into_dimensions().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        let img = open_reader(path)?.decode().map_err(|e| match e {
            image::ImageError::Unsupported(_) => {
                BackendError::UnsupportedFormat(format!("{}: {}", path.display(), e))
            }
            other => BackendError::ProcessingFailed(format!(
                "Failed to decode {}: {}",
                path.display(),
                other
            )),
        })?;
        if img.width() == 0 || img.height() == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "{} has zero dimensions",
                path.display()
            )));
        }
        Ok(img)
    }

    fn render(&self, image: &DynamicImage, params: &RenderParams) -> Result<(), BackendError> {
        let region = match params.region {
            Some(rect) => {
                if !rect.fits_within(image.width(), image.height()) {
                    return Err(BackendError::ProcessingFailed(format!(
                        "crop {} outside {}x{} source",
                        rect,
                        image.width(),
                        image.height()
                    )));
                }
                image.crop_imm(rect.x, rect.y, rect.width, rect.height)
            }
            None => image.clone(),
        };

        let resized = if region.width() == params.width && region.height() == params.height {
            region
        } else {
            region.resize_exact(params.width, params.height, FilterType::CatmullRom)
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
        save_jpeg(&rgb, &params.output, params.quality.value() as u8)
    }
}
