//! Gallery configuration module.
//!
//! Handles loading and validating the `config.toml` that drives the
//! derivative pipeline. Every key is optional: stock defaults are merged
//! underneath whatever the file specifies.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! media_root = "media"          # Albums live in immediate subdirectories
//! cache_dir = "cache"           # Catalog artifact + cleanup marker
//! # log_file = "logs/gallery.log"
//! public_prefix = "media"       # Prefix of the public paths in the catalog
//! image_extensions = ["jpg", "jpeg", "png", "gif", "webp"]
//! video_extensions = ["mp4", "webm", "ogg", "mov"]
//! max_file_size = 524288000     # 500 MB
//! cache_duration = 3600         # Catalog TTL in seconds
//!
//! [thumbnail]
//! width = 1200
//! height = 900
//! quality = 85
//!
//! [web_optimized]
//! width = 2000
//! height = 2000
//! quality = 82
//!
//! [auto_sync]
//! enabled = true
//! limit = 20                    # Max generations per invocation
//! ceiling = 100                 # Skip sync when this many are missing
//!
//! [auto_cleanup]
//! enabled = true
//! interval = 3600               # Seconds between orphan scans
//! limit = 5                     # Max deletions per scan
//!
//! [crop]
//! method = "auto"               # auto | attention | entropy | center
//! rule_of_thirds = true
//! grid_step = 20
//! sample_step = 10
//!
//! [tools]
//! # imagemagick = "/usr/bin/convert"
//! # ffmpeg = "/usr/bin/ffmpeg"
//! timeout_secs = 120
//! ```
//!
//! Relative paths are resolved against the directory holding the config
//! file. Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gallery configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Root of the media tree. Albums are its immediate subdirectories.
    pub media_root: PathBuf,
    /// Directory holding the catalog artifact and the cleanup marker.
    pub cache_dir: PathBuf,
    /// Optional log file; log lines are appended.
    pub log_file: Option<PathBuf>,
    /// Prefix for the public (URL) paths recorded in the catalog.
    pub public_prefix: String,
    /// Lowercase extensions classified as images.
    pub image_extensions: Vec<String>,
    /// Lowercase extensions classified as videos.
    pub video_extensions: Vec<String>,
    /// Sources larger than this many bytes are never decoded.
    pub max_file_size: u64,
    /// Seconds a catalog stays valid after it was generated.
    pub cache_duration: u64,
    pub thumbnail: DerivativeSize,
    pub web_optimized: DerivativeSize,
    pub auto_sync: AutoSyncConfig,
    pub auto_cleanup: AutoCleanupConfig,
    pub crop: CropConfig,
    pub tools: ToolsConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            cache_dir: PathBuf::from("cache"),
            log_file: None,
            public_prefix: "media".to_string(),
            image_extensions: ["jpg", "jpeg", "png", "gif", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            video_extensions: ["mp4", "webm", "ogg", "mov"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 500 * 1024 * 1024,
            cache_duration: 3600,
            thumbnail: DerivativeSize {
                width: 1200,
                height: 900,
                quality: 85,
            },
            web_optimized: DerivativeSize {
                width: 2000,
                height: 2000,
                quality: 82,
            },
            auto_sync: AutoSyncConfig::default(),
            auto_cleanup: AutoCleanupConfig::default(),
            crop: CropConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, size) in [
            ("thumbnail", &self.thumbnail),
            ("web_optimized", &self.web_optimized),
        ] {
            if size.width == 0 || size.height == 0 {
                return Err(ConfigError::Validation(format!(
                    "{name}.width and {name}.height must be non-zero"
                )));
            }
            if !(1..=100).contains(&size.quality) {
                return Err(ConfigError::Validation(format!(
                    "{name}.quality must be 1-100"
                )));
            }
        }
        if self.image_extensions.is_empty() && self.video_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "image_extensions and video_extensions must not both be empty".into(),
            ));
        }
        if self.crop.grid_step == 0 || self.crop.sample_step == 0 {
            return Err(ConfigError::Validation(
                "crop.grid_step and crop.sample_step must be non-zero".into(),
            ));
        }
        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "tools.timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths against `base` (the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        fn resolve(base: &Path, path: &mut PathBuf) {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        resolve(base, &mut self.media_root);
        resolve(base, &mut self.cache_dir);
        if let Some(log_file) = self.log_file.as_mut() {
            resolve(base, log_file);
        }
    }

    /// Whether `ext` (any case) is a configured image extension.
    pub fn is_image_extension(&self, ext: &str) -> bool {
        contains_ignore_case(&self.image_extensions, ext)
    }

    /// Whether `ext` (any case) is a configured video extension.
    pub fn is_video_extension(&self, ext: &str) -> bool {
        contains_ignore_case(&self.video_extensions, ext)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_duration)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_secs)
    }
}

fn contains_ignore_case(list: &[String], ext: &str) -> bool {
    list.iter().any(|e| e.eq_ignore_ascii_case(ext))
}

/// Target box and encoding quality for one derivative kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivativeSize {
    pub width: u32,
    pub height: u32,
    /// JPEG quality (1-100).
    pub quality: u32,
}

/// Per-invocation derivative generation budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoSyncConfig {
    pub enabled: bool,
    /// Successful generations allowed per invocation.
    pub limit: usize,
    /// When this many or more assets are missing derivatives, automatic
    /// sync stands down and leaves the work to `keepsake maintain`.
    pub ceiling: usize,
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 20,
            ceiling: 100,
        }
    }
}

/// Orphan cleanup schedule and budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoCleanupConfig {
    pub enabled: bool,
    /// Minimum seconds between cleanup passes.
    pub interval: u64,
    /// Deletions allowed per pass, across both derivative kinds.
    pub limit: usize,
}

impl Default for AutoCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 3600,
            limit: 5,
        }
    }
}

/// Which crop strategies the thumbnail chain may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropMethod {
    /// Attention → entropy → center, first success wins.
    #[default]
    Auto,
    Attention,
    Entropy,
    Center,
}

/// Crop strategy tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    pub method: CropMethod,
    /// Add the thirds-intersection bonus to entropy scores.
    pub rule_of_thirds: bool,
    /// Stride in pixels between candidate crop offsets.
    pub grid_step: u32,
    /// Stride in pixels between sampled pixels inside a candidate.
    pub sample_step: u32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            method: CropMethod::Auto,
            rule_of_thirds: true,
            grid_step: 20,
            sample_step: 10,
        }
    }
}

/// External tool locations and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    /// Explicit path to ImageMagick's `convert`; looked up on `PATH` when absent.
    pub imagemagick: Option<PathBuf>,
    /// Explicit path to `ffmpeg`; looked up on `PATH` when absent.
    pub ffmpeg: Option<PathBuf>,
    /// Wall-clock limit for any single tool invocation.
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            imagemagick: None,
            ffmpeg: None,
            timeout_secs: 120,
        }
    }
}

// =============================================================================
// Config loading
// =============================================================================

/// Parse config TOML, merging it over stock defaults, and validate.
pub fn parse_config(content: &str) -> Result<GalleryConfig, ConfigError> {
    let config: GalleryConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file path.
///
/// A missing file yields the stock defaults. Relative paths (from the file
/// or from the defaults) are resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<GalleryConfig, ConfigError> {
    let mut config = if path.exists() {
        parse_config(&fs::read_to_string(path)?)?
    } else {
        GalleryConfig::default()
    };
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    config.resolve_paths(base);
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Keepsake Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.
# Relative paths are resolved against the directory holding this file.

# Media tree: every immediate subdirectory is an album.
media_root = "media"

# Catalog cache artifact and cleanup marker live here.
cache_dir = "cache"

# Append log lines to this file (in addition to stderr).
# log_file = "logs/gallery.log"

# Prefix of the public paths written into the catalog.
public_prefix = "media"

# Files are classified by extension, then verified by content.
image_extensions = ["jpg", "jpeg", "png", "gif", "webp"]
video_extensions = ["mp4", "webm", "ogg", "mov"]

# Sources larger than this (bytes) are never decoded. 500 MB.
max_file_size = 524288000

# Seconds a cached catalog stays valid before the media tree is rescanned.
cache_duration = 3600

# ---------------------------------------------------------------------------
# Grid thumbnails (cropped to exactly width x height)
# ---------------------------------------------------------------------------
[thumbnail]
width = 1200
height = 900
quality = 85

# ---------------------------------------------------------------------------
# Web-optimized views (scaled to fit width x height, never cropped)
# ---------------------------------------------------------------------------
[web_optimized]
width = 2000
height = 2000
quality = 82

# ---------------------------------------------------------------------------
# Automatic generation on each sync
# ---------------------------------------------------------------------------
[auto_sync]
enabled = true
# Maximum derivatives generated per sync.
limit = 20
# With this many or more assets missing derivatives, sync stands down:
# run `keepsake maintain` for bulk work.
ceiling = 100

# ---------------------------------------------------------------------------
# Automatic orphan cleanup
# ---------------------------------------------------------------------------
[auto_cleanup]
enabled = true
# Seconds between cleanup passes.
interval = 3600
# Maximum orphaned derivatives deleted per pass.
limit = 5

# ---------------------------------------------------------------------------
# Thumbnail cropping
# ---------------------------------------------------------------------------
[crop]
# auto = ImageMagick attention crop, then entropy search, then center crop.
method = "auto"
rule_of_thirds = true
grid_step = 20
sample_step = 10

# ---------------------------------------------------------------------------
# External tools
# ---------------------------------------------------------------------------
[tools]
# imagemagick = "/usr/bin/convert"
# ffmpeg = "/usr/bin/ffmpeg"
timeout_secs = 120
"##
}
