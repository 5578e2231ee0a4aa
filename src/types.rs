//! Shared types used across the pipeline stages.
//!
//! [`MediaAsset`] is serialized into the catalog artifact, so its field names
//! are part of the on-disk format read by the web front end (camelCase keys,
//! `type` for the media kind).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Directory (under the media root) holding grid thumbnails.
pub const THUMBNAILS_DIR: &str = "thumbnails";
/// Directory (under the media root) holding web-optimized views.
pub const WEB_OPTIMIZED_DIR: &str = "web-optimized";

/// Whether a source is a still image or a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// The two derivative kinds every asset gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivativeKind {
    Thumbnail,
    WebOptimized,
}

impl DerivativeKind {
    pub const ALL: [DerivativeKind; 2] = [DerivativeKind::Thumbnail, DerivativeKind::WebOptimized];

    /// Directory name under the media root.
    pub fn dir_name(self) -> &'static str {
        match self {
            DerivativeKind::Thumbnail => THUMBNAILS_DIR,
            DerivativeKind::WebOptimized => WEB_OPTIMIZED_DIR,
        }
    }

    /// Root directory of this kind for a given media root.
    pub fn root(self, media_root: &Path) -> PathBuf {
        media_root.join(self.dir_name())
    }
}

impl fmt::Display for DerivativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivativeKind::Thumbnail => f.write_str("thumbnail"),
            DerivativeKind::WebOptimized => f.write_str("web-optimized"),
        }
    }
}

/// File name of an asset's derivatives.
///
/// Images keep their own name. Videos get their stem with `.jpg`, since both
/// of their derivatives are poster frames.
pub fn canonical_name(filename: &str, kind: MediaKind) -> String {
    match kind {
        MediaKind::Image => filename.to_string(),
        MediaKind::Video => {
            let stem = Path::new(filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(filename);
            format!("{stem}.jpg")
        }
    }
}

/// Hidden staging file a derivative is written to before being renamed
/// over `dest`. Tagged with the process id so concurrent invocations never
/// share one.
pub fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.{}.partial.jpg", std::process::id()))
}

/// One source file in the media tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    /// Public path of the source, e.g. `media/Travel/beach%20day.jpg`.
    pub path: String,
    /// Public path of the thumbnail.
    pub thumb: String,
    /// Public path of the web-optimized view.
    pub web_optimized: String,
    pub album: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub filename: String,
    /// Source modification time, unix seconds.
    pub mtime: u64,
    /// Source size in bytes.
    pub size: u64,
    pub thumb_exists: bool,
    pub web_optimized_exists: bool,
}

impl MediaAsset {
    /// Build an asset with public paths derived from `prefix`. Both
    /// existence flags start out false.
    pub fn new(
        prefix: &str,
        album: &str,
        filename: &str,
        kind: MediaKind,
        mtime: u64,
        size: u64,
    ) -> Self {
        let canonical = canonical_name(filename, kind);
        let prefix = prefix.trim_end_matches('/');
        let encoded = urlencoding::encode(filename);
        let encoded_canonical = urlencoding::encode(&canonical);
        Self {
            path: format!("{prefix}/{album}/{encoded}"),
            thumb: format!("{prefix}/{THUMBNAILS_DIR}/{album}/{encoded_canonical}"),
            web_optimized: format!("{prefix}/{WEB_OPTIMIZED_DIR}/{album}/{encoded_canonical}"),
            album: album.to_string(),
            kind,
            filename: filename.to_string(),
            mtime,
            size,
            thumb_exists: false,
            web_optimized_exists: false,
        }
    }

    pub fn canonical_name(&self) -> String {
        canonical_name(&self.filename, self.kind)
    }

    pub fn source_path(&self, media_root: &Path) -> PathBuf {
        media_root.join(&self.album).join(&self.filename)
    }

    pub fn derivative_path(&self, media_root: &Path, kind: DerivativeKind) -> PathBuf {
        kind.root(media_root)
            .join(&self.album)
            .join(self.canonical_name())
    }

    pub fn has(&self, kind: DerivativeKind) -> bool {
        match kind {
            DerivativeKind::Thumbnail => self.thumb_exists,
            DerivativeKind::WebOptimized => self.web_optimized_exists,
        }
    }

    pub fn set_has(&mut self, kind: DerivativeKind, exists: bool) {
        match kind {
            DerivativeKind::Thumbnail => self.thumb_exists = exists,
            DerivativeKind::WebOptimized => self.web_optimized_exists = exists,
        }
    }

    /// True when at least one derivative is missing.
    pub fn is_incomplete(&self) -> bool {
        !self.thumb_exists || !self.web_optimized_exists
    }
}
