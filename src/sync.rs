//! Per-invocation sync and cleanup.
//!
//! Called once per page load (or `keepsake sync`), the [`Orchestrator`]
//! nudges the derivative tree toward the catalog without ever doing
//! unbounded work:
//!
//! 1. Make sure the derivative directories exist and are writable. A missing
//!    media root or an unwritable directory is logged as critical and
//!    surfaced as a single banner; nothing else runs.
//! 2. Obtain the catalog (cache hit, or scan + save).
//! 3. Auto-sync: when `0 < incomplete < auto_sync.ceiling`, walk the catalog
//!    in order and produce missing derivatives (thumbnail first) until
//!    `auto_sync.limit` were generated. Derivatives that turn out to be fresh
//!    already are recorded without using budget.
//! 4. Auto-cleanup: at most once per `auto_cleanup.interval`, tracked by a
//!    marker file, delete up to `auto_cleanup.limit` orphaned derivatives.
//!
//! Larger backlogs are left to [`maintain`](crate::maintenance::maintain).

use crate::catalog::{Catalog, CatalogCache, unix_now};
use crate::command::CommandRunner;
use crate::config::GalleryConfig;
use crate::derive::DerivativeGenerator;
use crate::imaging::ImageBackend;
use crate::logger::Logger;
use crate::scan;
use crate::types::{DerivativeKind, MediaKind};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Name of the cleanup marker within the cache directory.
pub const CLEANUP_MARKER: &str = "last_cleanup.txt";

/// Probe file used to test directory writability.
const WRITE_PROBE: &str = ".write-probe";

/// Problems that stop any derivative work for this invocation.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Media directory not found: {}", .0.display())]
    MediaRootMissing(PathBuf),
    #[error("Directory not writable: {}: {source}", .path.display())]
    NotWritable { path: PathBuf, source: io::Error },
}

impl SetupError {
    pub fn path(&self) -> &Path {
        match self {
            SetupError::MediaRootMissing(path) => path,
            SetupError::NotWritable { path, .. } => path,
        }
    }
}

/// Write and remove a hidden probe file in `dir`.
pub fn probe_writable(dir: &Path) -> io::Result<()> {
    let probe = dir.join(WRITE_PROBE);
    fs::write(&probe, b"")?;
    fs::remove_file(&probe)
}

/// Create both derivative roots and check that they can be written.
pub fn prepare_directories(config: &GalleryConfig) -> Result<(), SetupError> {
    if !config.media_root.is_dir() {
        return Err(SetupError::MediaRootMissing(config.media_root.clone()));
    }
    for kind in DerivativeKind::ALL {
        let dir = kind.root(&config.media_root);
        fs::create_dir_all(&dir)
            .and_then(|()| probe_writable(&dir))
            .map_err(|source| SetupError::NotWritable { path: dir, source })?;
    }
    Ok(())
}

/// What one invocation did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Derivatives written.
    pub generated: usize,
    /// Derivatives found fresh on disk and marked present.
    pub already_fresh: usize,
    /// Derivatives that could not be produced.
    pub failed: usize,
    /// Assets still missing a derivative afterwards.
    pub remaining: usize,
    /// Auto-sync skipped because the backlog reached the ceiling.
    pub over_ceiling: bool,
    /// Orphaned derivatives removed.
    pub deleted: usize,
    pub cleanup_ran: bool,
    /// Catalog was rebuilt from a scan rather than read from cache.
    pub rebuilt: bool,
    /// User-visible message for a structural failure.
    pub banner: Option<String>,
}

pub struct Orchestrator<'a> {
    config: &'a GalleryConfig,
    logger: &'a dyn Logger,
    generator: DerivativeGenerator<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a GalleryConfig,
        logger: &'a dyn Logger,
        backend: &'a dyn ImageBackend,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            logger,
            generator: DerivativeGenerator::new(config, logger, backend, runner),
        }
    }

    pub fn run(&self) -> SyncReport {
        self.run_at(unix_now())
    }

    /// One invocation with the clock fixed at `now` (unix seconds).
    pub fn run_at(&self, now: u64) -> SyncReport {
        let mut report = SyncReport::default();

        if let Err(e) = prepare_directories(self.config) {
            self.logger
                .critical(&e.to_string(), &[("path", e.path().display().to_string())]);
            report.banner = Some(e.to_string());
            return report;
        }

        let Some(mut catalog) = self.obtain_catalog(now, &mut report) else {
            return report;
        };

        if self.config.auto_sync.enabled && self.sync_catalog(&mut catalog, &mut report) {
            let cache = CatalogCache::new(self.config);
            if let Err(e) = cache.save(&catalog) {
                self.logger
                    .error("Failed to write catalog cache", &[("error", e.to_string())]);
            }
        }
        report.remaining = catalog.incomplete_count();

        if self.config.auto_cleanup.enabled {
            self.cleanup_at(now, &catalog, &mut report);
        }
        report
    }

    fn obtain_catalog(&self, now: u64, report: &mut SyncReport) -> Option<Catalog> {
        let cache = CatalogCache::new(self.config);
        if let Some(catalog) = cache.load_at(now) {
            return Some(catalog);
        }
        let catalog = match scan::scan(self.config, now) {
            Ok(c) => c,
            Err(e) => {
                self.logger
                    .critical("Media scan failed", &[("error", e.to_string())]);
                report.banner = Some(e.to_string());
                return None;
            }
        };
        report.rebuilt = true;
        if let Err(e) = cache.save(&catalog) {
            self.logger
                .error("Failed to write catalog cache", &[("error", e.to_string())]);
        }
        Some(catalog)
    }

    /// Produce missing derivatives within budget. Returns whether any
    /// existence flag changed.
    fn sync_catalog(&self, catalog: &mut Catalog, report: &mut SyncReport) -> bool {
        let settings = &self.config.auto_sync;
        let incomplete = catalog.incomplete_count();
        if incomplete == 0 {
            return false;
        }
        if incomplete >= settings.ceiling {
            report.over_ceiling = true;
            self.logger.info(
                "Too many missing derivatives for auto-sync, run maintenance",
                &[
                    ("missing", incomplete.to_string()),
                    ("ceiling", settings.ceiling.to_string()),
                ],
            );
            return false;
        }

        let mut changed = false;
        'assets: for asset in catalog.all_files.iter_mut().filter(|a| a.is_incomplete()) {
            for kind in DerivativeKind::ALL {
                if asset.has(kind) {
                    continue;
                }
                // A video's web-optimized view is its poster; wait for it
                if asset.kind == MediaKind::Video
                    && kind == DerivativeKind::WebOptimized
                    && !asset.thumb_exists
                {
                    continue;
                }
                if report.generated >= settings.limit {
                    break 'assets;
                }
                match self.generator.generate(asset, kind) {
                    Ok(derivative) => {
                        asset.set_has(kind, true);
                        changed = true;
                        if derivative.was_generated() {
                            report.generated += 1;
                        } else {
                            report.already_fresh += 1;
                        }
                    }
                    Err(_) => report.failed += 1,
                }
            }
        }

        if report.generated > 0 {
            self.logger.info(
                &format!("Auto-synced {} derivatives", report.generated),
                &[("count", report.generated.to_string())],
            );
        }
        changed
    }

    fn cleanup_at(&self, now: u64, catalog: &Catalog, report: &mut SyncReport) {
        let settings = &self.config.auto_cleanup;
        let marker = self.config.cache_dir.join(CLEANUP_MARKER);
        if let Some(last) = read_marker(&marker)
            && now.saturating_sub(last) <= settings.interval
        {
            tracing::debug!(last, now, "cleanup not due");
            return;
        }

        report.cleanup_ran = true;
        let expected = catalog.expected_derivatives();
        report.deleted = remove_orphans(self.config, &expected, Some(settings.limit), self.logger).len();

        let written = fs::create_dir_all(&self.config.cache_dir)
            .and_then(|()| fs::write(&marker, now.to_string()));
        if let Err(e) = written {
            self.logger.error(
                "Failed to write cleanup marker",
                &[("path", marker.display().to_string()), ("error", e.to_string())],
            );
        }
    }
}

/// Last cleanup time, or `None` when absent or unparsable.
fn read_marker(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Whether some file in the album directory still produces `name`.
fn has_source_on_disk(config: &GalleryConfig, album: &str, name: &str) -> bool {
    let dir = config.media_root.join(album);
    let path = Path::new(name);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if config.is_image_extension(ext) && dir.join(name).is_file() {
        return true;
    }
    // Video posters are always `{stem}.jpg`
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    ext == "jpg"
        && config.video_extensions.iter().any(|video| {
            dir.join(format!("{stem}.{video}")).is_file()
                || dir.join(format!("{stem}.{}", video.to_uppercase())).is_file()
        })
}

/// Delete derivatives that no source accounts for.
///
/// Walks `thumbnails/` then `web-optimized/`, albums and files in name
/// order, skipping hidden entries. A candidate missing from `expected` is
/// re-checked against the album directory before it is removed. Stops after
/// `limit` deletions when given. Returns the removed paths.
pub fn remove_orphans(
    config: &GalleryConfig,
    expected: &HashSet<(String, String)>,
    limit: Option<usize>,
    logger: &dyn Logger,
) -> Vec<PathBuf> {
    let mut removed = Vec::new();

    for kind in DerivativeKind::ALL {
        let walker = WalkDir::new(kind.root(&config.media_root))
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(album) = path
                .parent()
                .and_then(|p| p.file_name())
                .map(|a| a.to_string_lossy().into_owned())
            else {
                continue;
            };

            if expected.contains(&(album.clone(), name.clone()))
                || has_source_on_disk(config, &album, &name)
            {
                continue;
            }
            if limit.is_some_and(|max| removed.len() >= max) {
                return removed;
            }

            let key = format!("{album}/{name}");
            match fs::remove_file(path) {
                Ok(()) => {
                    logger.info(
                        "Cleaned orphaned derivative",
                        &[("kind", kind.to_string()), ("key", key)],
                    );
                    removed.push(path.to_path_buf());
                }
                Err(e) => logger.error(
                    "Failed to delete orphaned derivative",
                    &[("key", key), ("error", e.to_string())],
                ),
            }
        }
    }
    removed
}
