//! Shared test utilities for the keepsake test suite.
//!
//! Builders for media trees on disk: real JPEG/PNG rasters, fake video
//! containers with valid magic bytes, and mtime control for freshness tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let config = test_config(tmp.path());
//! write_jpeg(&config.media_root.join("Trip/dawn.jpg"), 40, 30);
//! write_mp4(&config.media_root.join("Trip/clip.mp4"));
//! set_mtime(&config.media_root.join("Trip/dawn.jpg"), 1_000);
//! ```

use image::{ImageEncoder, ImageReader, RgbImage};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::{DerivativeSize, GalleryConfig};

// =========================================================================
// Config
// =========================================================================

/// Config rooted at `root` with tiny derivative sizes so real encodes stay fast.
pub fn test_config(root: &Path) -> GalleryConfig {
    let mut config = GalleryConfig::default();
    config.media_root = root.join("media");
    config.cache_dir = root.join("cache");
    config.thumbnail = DerivativeSize {
        width: 12,
        height: 9,
        quality: 85,
    };
    config.web_optimized = DerivativeSize {
        width: 20,
        height: 20,
        quality: 82,
    };
    config
}

// =========================================================================
// File builders
// =========================================================================

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Write a valid JPEG of the given size, creating parent directories.
pub fn write_jpeg(path: &Path, width: u32, height: u32) -> PathBuf {
    ensure_parent(path);
    let img = gradient(width, height);
    let writer = BufWriter::new(File::create(path).unwrap());
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    path.to_path_buf()
}

/// Write a valid PNG of the given size, creating parent directories.
pub fn write_png(path: &Path, width: u32, height: u32) -> PathBuf {
    ensure_parent(path);
    let img = gradient(width, height);
    let writer = BufWriter::new(File::create(path).unwrap());
    image::codecs::png::PngEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    path.to_path_buf()
}

/// Write raw bytes, creating parent directories.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> PathBuf {
    ensure_parent(path);
    fs::write(path, bytes).unwrap();
    path.to_path_buf()
}

/// An ISO-BMFF header (`ftyp` box) followed by padding. Not playable, but
/// enough to pass content sniffing.
pub fn write_mp4(path: &Path) -> PathBuf {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    bytes.extend_from_slice(b"isomiso2");
    bytes.extend_from_slice(&[0u8; 32]);
    write_bytes(path, &bytes)
}

/// A Matroska/WebM EBML header followed by padding.
pub fn write_webm(path: &Path) -> PathBuf {
    let mut bytes = vec![0x1A, 0x45, 0xDF, 0xA3];
    bytes.extend_from_slice(&[0u8; 32]);
    write_bytes(path, &bytes)
}

/// Set a file's modification time to `secs` after the unix epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

// =========================================================================
// Inspection
// =========================================================================

/// Dimensions of an image on disk, sniffing the format from content.
pub fn image_dimensions(path: &Path) -> (u32, u32) {
    ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .into_dimensions()
        .unwrap()
}

/// Sorted file names directly inside `dir` (empty when it doesn't exist).
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
