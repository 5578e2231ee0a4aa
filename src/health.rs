//! Installation health check.
//!
//! [`check`] looks at everything the pipeline depends on and reports each
//! finding as a [`CheckItem`]:
//!
//! | Area | Error when | Warning when |
//! |---|---|---|
//! | Media root | missing or not writable | |
//! | Derivative roots, cache dir | present but not writable | missing |
//! | ImageMagick | `crop.method = "attention"` and not found | not found |
//! | FFmpeg | | not found |
//! | Coverage | | fewer derivatives than sources |
//! | Catalog cache | | artifact unreadable |
//!
//! Counts come from a real scan, so mislabeled and oversized files are not
//! counted as media.

use crate::catalog::{CatalogCache, CatalogError, unix_now};
use crate::command::CommandRunner;
use crate::config::{CropMethod, GalleryConfig};
use crate::maintenance::count_derivatives;
use crate::scan;
use crate::sync::probe_writable;
use crate::tools::{Tool, Toolbox};
use crate::types::{DerivativeKind, MediaKind};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "ok",
            Status::Warning => "warning",
            Status::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub label: String,
    pub status: Status,
    pub detail: String,
}

impl CheckItem {
    fn new(label: &str, status: Status, detail: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

/// What the media tree currently holds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaCounts {
    pub albums: usize,
    pub images: usize,
    pub videos: usize,
    pub thumbnails: usize,
    pub web_optimized: usize,
}

impl MediaCounts {
    pub fn media(&self) -> usize {
        self.images + self.videos
    }
}

/// Summary grade: every item passed, at least 80% passed, or less.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overall {
    Excellent,
    Good,
    NeedsAttention,
}

impl fmt::Display for Overall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Overall::Excellent => "excellent",
            Overall::Good => "good",
            Overall::NeedsAttention => "needs attention",
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub items: Vec<CheckItem>,
    /// Absent when the media root could not be scanned.
    pub counts: Option<MediaCounts>,
    pub recommendations: Vec<String>,
}

impl HealthReport {
    pub fn passed(&self) -> usize {
        self.items.iter().filter(|i| i.status == Status::Ok).count()
    }

    pub fn worst(&self) -> Status {
        self.items
            .iter()
            .map(|i| i.status)
            .max()
            .unwrap_or(Status::Ok)
    }

    pub fn overall(&self) -> Overall {
        let total = self.items.len();
        let passed = self.passed();
        if passed == total {
            Overall::Excellent
        } else if passed * 5 >= total * 4 {
            Overall::Good
        } else {
            Overall::NeedsAttention
        }
    }

    fn push(&mut self, item: CheckItem) {
        self.items.push(item);
    }

    fn recommend(&mut self, text: &str) {
        self.recommendations.push(text.to_string());
    }
}

/// Existence and writability of one directory. Returns whether it exists.
fn check_dir(report: &mut HealthReport, label: &str, dir: &Path, missing: Status) -> bool {
    if !dir.is_dir() {
        report.push(CheckItem::new(label, missing, format!("{} not found", dir.display())));
        return false;
    }
    let (status, detail) = match probe_writable(dir) {
        Ok(()) => (Status::Ok, format!("{} (writable)", dir.display())),
        Err(e) => (Status::Error, format!("{} not writable: {e}", dir.display())),
    };
    report.push(CheckItem::new(label, status, detail));
    true
}

fn tool_detail(tool: &Tool) -> String {
    match &tool.version {
        Some(version) => format!("{} ({version})", tool.path.display()),
        None => tool.path.display().to_string(),
    }
}

pub fn check(config: &GalleryConfig, runner: &dyn CommandRunner) -> HealthReport {
    check_at(config, runner, unix_now())
}

/// Run every check with the clock fixed at `now` (unix seconds).
pub fn check_at(config: &GalleryConfig, runner: &dyn CommandRunner, now: u64) -> HealthReport {
    let mut report = HealthReport::default();
    let root = &config.media_root;

    // Directories
    let media_ok = check_dir(&mut report, "Media directory", root, Status::Error);
    let mut derivative_dirs_ok = true;
    for kind in DerivativeKind::ALL {
        let label = match kind {
            DerivativeKind::Thumbnail => "Thumbnails directory",
            DerivativeKind::WebOptimized => "Web-optimized directory",
        };
        derivative_dirs_ok &= check_dir(&mut report, label, &kind.root(root), Status::Warning);
    }
    check_dir(&mut report, "Cache directory", &config.cache_dir, Status::Warning);
    if let Some(parent) = config.log_file.as_deref().and_then(Path::parent) {
        check_dir(&mut report, "Log directory", parent, Status::Warning);
    }

    // Tools
    let tools = Toolbox::new(config.tools.clone());
    let imagemagick = tools.imagemagick(runner);
    report.push(match imagemagick {
        Some(tool) => CheckItem::new("ImageMagick", Status::Ok, tool_detail(tool)),
        None => {
            let status = if config.crop.method == CropMethod::Attention {
                Status::Error
            } else {
                Status::Warning
            };
            CheckItem::new("ImageMagick", status, "not installed (attention crop unavailable)")
        }
    });
    let ffmpeg = tools.ffmpeg(runner);
    report.push(match ffmpeg {
        Some(tool) => CheckItem::new("FFmpeg", Status::Ok, tool_detail(tool)),
        None => CheckItem::new(
            "FFmpeg",
            Status::Warning,
            "not installed (video thumbnails will not work)",
        ),
    });

    // Media content
    if media_ok && let Ok(catalog) = scan::scan(config, now) {
        let videos = catalog
            .all_files
            .iter()
            .filter(|a| a.kind == MediaKind::Video)
            .count();
        let counts = MediaCounts {
            albums: catalog.albums.len(),
            images: catalog.all_files.len() - videos,
            videos,
            thumbnails: count_derivatives(config, DerivativeKind::Thumbnail),
            web_optimized: count_derivatives(config, DerivativeKind::WebOptimized),
        };
        let media = counts.media();
        if media > 0 {
            for (label, have) in [
                ("Thumbnail coverage", counts.thumbnails),
                ("Web-optimized coverage", counts.web_optimized),
            ] {
                let percent = have as f64 * 100.0 / media as f64;
                let status = if have >= media { Status::Ok } else { Status::Warning };
                report.push(CheckItem::new(
                    label,
                    status,
                    format!("{percent:.1}% ({have}/{media})"),
                ));
            }
        }
        report.counts = Some(counts);
    }

    // Catalog cache
    let cache = CatalogCache::new(config);
    report.push(match cache.read() {
        Ok(Some(catalog)) => {
            let age = now.saturating_sub(catalog.generated);
            let state = if catalog.is_valid_at(now, config.cache_duration) {
                "valid"
            } else {
                "expired"
            };
            CheckItem::new(
                "Catalog cache",
                Status::Ok,
                format!("{} minutes old ({state})", age / 60),
            )
        }
        Ok(None) => CheckItem::new("Catalog cache", Status::Ok, "not generated"),
        Err(e @ CatalogError::CorruptCacheArtifact { .. }) => {
            CheckItem::new("Catalog cache", Status::Warning, format!("{e} (will be rebuilt)"))
        }
        Err(e) => CheckItem::new("Catalog cache", Status::Warning, e.to_string()),
    });

    // Recommendations
    if !derivative_dirs_ok {
        report.recommend("Run `keepsake maintain` to create missing directories");
    }
    if let Some(counts) = report.counts.clone() {
        let media = counts.media();
        if media > 0 && (counts.thumbnails < media || counts.web_optimized < media) {
            report.recommend(
                "Run `keepsake maintain` to generate missing thumbnails and web-optimized images",
            );
        }
        if ffmpeg.is_none() && counts.videos > 0 {
            report.recommend("Install FFmpeg to enable video thumbnail generation");
        }
        if counts.albums == 0 {
            report.recommend("Create album folders in the media directory and upload photos");
        }
    }
    if imagemagick.is_none() && config.crop.method == CropMethod::Auto {
        report.recommend("Install ImageMagick for attention-based thumbnail crops");
    }

    tracing::debug!(
        items = report.items.len(),
        passed = report.passed(),
        media_root_found = media_ok,
        "health check finished"
    );
    report
}
