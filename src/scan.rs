//! Media tree scanning.
//!
//! Walks the media root and builds a [`Catalog`] of every servable source.
//!
//! ## Directory Structure
//!
//! ```text
//! media/                           # Media root
//! ├── Holidays/                    # Album (any immediate subdirectory)
//! │   ├── beach.jpg
//! │   └── waves.mp4
//! ├── Portraits/
//! │   └── anna.png
//! ├── thumbnails/                  # Derivatives, never scanned as an album
//! │   └── Holidays/
//! │       ├── beach.jpg
//! │       └── waves.jpg            # Video poster: stem + .jpg
//! ├── web-optimized/               # Derivatives, never scanned as an album
//! └── .trash/                      # Hidden, ignored
//! ```
//!
//! ## Classification
//!
//! A file is a candidate when its extension (any case) is in the configured
//! image or video list. It is then verified by content:
//!
//! | Kind | Accepted signatures |
//! |---|---|
//! | image | JPEG, PNG, GIF, WebP (via `image::guess_format`) |
//! | video | ISO-BMFF (`ftyp` and QuickTime atoms), Matroska/WebM EBML, Ogg |
//!
//! Mislabeled files are dropped, as are images over `max_file_size`.
//! Symlinked albums and files are followed. An entry that cannot be read is
//! logged and skipped; only a missing or unreadable media root fails the scan.
//! Only existence of derivatives is recorded here; freshness is decided at
//! generation time.

use crate::catalog::Catalog;
use crate::config::GalleryConfig;
use crate::types::{DerivativeKind, MediaAsset, MediaKind, THUMBNAILS_DIR, WEB_OPTIMIZED_DIR};
use image::ImageFormat;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Media root not found: {}", .0.display())]
    MediaRootMissing(PathBuf),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Bytes read from the head of a file for signature checks.
const SNIFF_LEN: usize = 32;

/// QuickTime files may open with any of these atoms instead of `ftyp`.
const QUICKTIME_ATOMS: &[&[u8; 4]] = &[b"ftyp", b"moov", b"mdat", b"wide", b"free", b"skip", b"pnot"];

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_derivative_dir(entry: &DirEntry) -> bool {
    entry.depth() == 1 && {
        let name = entry.file_name().to_string_lossy();
        name == THUMBNAILS_DIR || name == WEB_OPTIMIZED_DIR
    }
}

/// Scan the media root into a catalog stamped with `generated`.
pub fn scan(config: &GalleryConfig, generated: u64) -> Result<Catalog, ScanError> {
    let root = &config.media_root;
    if !root.is_dir() {
        return Err(ScanError::MediaRootMissing(root.clone()));
    }

    let mut albums = Vec::new();
    let mut assets = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && !is_derivative_dir(e));

    let mut current_album: Option<String> = None;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // The root itself failing is structural; anything below it is one bad entry
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::warn!(path = ?e.path(), error = %e, "unreadable media entry, skipping");
                if e.depth() == 1 {
                    current_album = None;
                }
                continue;
            }
        };
        let file_type = entry.file_type();

        if entry.depth() == 1 {
            current_album = if file_type.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                albums.push(name.clone());
                Some(name)
            } else {
                None
            };
            continue;
        }

        let Some(album) = current_album.as_deref() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        match classify(config, album, entry.path()) {
            Ok(Some(asset)) => assets.push(asset),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "unreadable media file, skipping");
            }
        }
    }

    tracing::debug!(
        albums = albums.len(),
        assets = assets.len(),
        root = %root.display(),
        "media tree scanned"
    );

    Ok(Catalog {
        all_files: assets,
        albums,
        generated,
    })
}

/// Build an asset for `path` if it is a genuine, acceptable media file.
fn classify(
    config: &GalleryConfig,
    album: &str,
    path: &Path,
) -> Result<Option<MediaAsset>, std::io::Error> {
    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let claimed = if config.is_image_extension(ext) {
        MediaKind::Image
    } else if config.is_video_extension(ext) {
        MediaKind::Video
    } else {
        return Ok(None);
    };

    let head = read_head(path)?;
    let verified = match claimed {
        MediaKind::Image => is_image_signature(&head),
        MediaKind::Video => is_video_signature(&head),
    };
    if !verified {
        tracing::debug!(path = %path.display(), kind = %claimed, "content does not match extension, skipping");
        return Ok(None);
    }

    let meta = path.metadata()?;
    if claimed == MediaKind::Image && meta.len() > config.max_file_size {
        tracing::debug!(path = %path.display(), size = meta.len(), "image exceeds max_file_size, skipping");
        return Ok(None);
    }
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut asset = MediaAsset::new(&config.public_prefix, album, filename, claimed, mtime, meta.len());
    for kind in DerivativeKind::ALL {
        let exists = asset.derivative_path(&config.media_root, kind).exists();
        asset.set_has(kind, exists);
    }
    Ok(Some(asset))
}

fn read_head(path: &Path) -> Result<Vec<u8>, std::io::Error> {
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?.take(SNIFF_LEN as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// JPEG, PNG, GIF or WebP by magic bytes.
pub fn is_image_signature(head: &[u8]) -> bool {
    matches!(
        image::guess_format(head),
        Ok(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP)
    )
}

/// MP4/MOV, Matroska/WebM, or Ogg by magic bytes.
pub fn is_video_signature(head: &[u8]) -> bool {
    if head.len() >= 8 && QUICKTIME_ATOMS.iter().any(|atom| &head[4..8] == atom.as_slice()) {
        return true;
    }
    head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) || head.starts_with(b"OggS")
}
