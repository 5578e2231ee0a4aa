//! Full, unthrottled convergence of the derivative tree.
//!
//! Where the [`Orchestrator`](crate::sync::Orchestrator) does a little work
//! per page load, [`maintain`] does everything at once and is meant for the
//! command line after bulk uploads:
//!
//! 1. Scan the media tree (the catalog cache is bypassed).
//! 2. Delete every orphaned derivative, then remove empty album folders from
//!    both derivative roots.
//! 3. Produce every derivative that is missing or older than its source:
//!    all thumbnails first, then all web-optimized views, so video posters
//!    exist before they are copied.
//! 4. Clear the catalog cache so the next sync sees the new state.

use crate::catalog::{CatalogCache, CatalogError, unix_now};
use crate::command::CommandRunner;
use crate::config::GalleryConfig;
use crate::derive::{DerivativeGenerator, is_fresh};
use crate::imaging::ImageBackend;
use crate::logger::Logger;
use crate::scan::{self, ScanError};
use crate::sync::{SetupError, prepare_directories, remove_orphans};
use crate::types::{DerivativeKind, MediaAsset};
use std::fs;
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

/// Progress is logged every this many items.
const PROGRESS_EVERY: usize = 10;

#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub media_files: usize,
    pub albums: usize,
    /// Derivatives on disk before any cleanup.
    pub existing_thumbnails: usize,
    pub existing_web_optimized: usize,
    pub orphans_deleted: usize,
    /// Derivative album folders removed because they were empty.
    pub empty_dirs_removed: usize,
    pub generated_thumbnails: usize,
    pub generated_web_optimized: usize,
    pub failed: usize,
    /// A catalog artifact existed and was removed.
    pub cache_cleared: bool,
}

impl MaintenanceReport {
    pub fn generated(&self) -> usize {
        self.generated_thumbnails + self.generated_web_optimized
    }
}

/// Run a complete maintenance pass.
pub fn maintain(
    config: &GalleryConfig,
    logger: &dyn Logger,
    backend: &dyn ImageBackend,
    runner: &dyn CommandRunner,
) -> Result<MaintenanceReport, MaintenanceError> {
    if let Err(e) = prepare_directories(config) {
        logger.critical(&e.to_string(), &[("path", e.path().display().to_string())]);
        return Err(e.into());
    }

    let catalog = scan::scan(config, unix_now())?;
    let mut report = MaintenanceReport {
        media_files: catalog.all_files.len(),
        albums: catalog.albums.len(),
        existing_thumbnails: count_derivatives(config, DerivativeKind::Thumbnail),
        existing_web_optimized: count_derivatives(config, DerivativeKind::WebOptimized),
        ..MaintenanceReport::default()
    };

    report.orphans_deleted =
        remove_orphans(config, &catalog.expected_derivatives(), None, logger).len();
    report.empty_dirs_removed = remove_empty_albums(config, logger);

    let generator = DerivativeGenerator::new(config, logger, backend, runner);
    for kind in DerivativeKind::ALL {
        let pending: Vec<&MediaAsset> = catalog
            .all_files
            .iter()
            .filter(|a| {
                let root = &config.media_root;
                !is_fresh(&a.source_path(root), &a.derivative_path(root, kind))
            })
            .collect();

        for (index, asset) in pending.iter().enumerate() {
            if index % PROGRESS_EVERY == 0 {
                logger.info(
                    "Maintenance progress",
                    &[
                        ("kind", kind.to_string()),
                        ("item", format!("{}/{}", index + 1, pending.len())),
                    ],
                );
            }
            match generator.generate(asset, kind) {
                Ok(d) if d.was_generated() => match kind {
                    DerivativeKind::Thumbnail => report.generated_thumbnails += 1,
                    DerivativeKind::WebOptimized => report.generated_web_optimized += 1,
                },
                Ok(_) => {}
                Err(_) => report.failed += 1,
            }
        }
    }

    report.cache_cleared = CatalogCache::new(config).clear()?;

    logger.info(
        "Maintenance completed",
        &[
            ("media_files", report.media_files.to_string()),
            ("orphaned_cleaned", report.orphans_deleted.to_string()),
            ("generated_thumbs", report.generated_thumbnails.to_string()),
            ("generated_web_optimized", report.generated_web_optimized.to_string()),
        ],
    );
    Ok(report)
}

/// Non-hidden files inside album folders of one derivative root.
pub fn count_derivatives(config: &GalleryConfig, kind: DerivativeKind) -> usize {
    WalkDir::new(kind.root(&config.media_root))
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count()
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Remove album folders left empty in either derivative root.
fn remove_empty_albums(config: &GalleryConfig, logger: &dyn Logger) -> usize {
    let mut removed = 0;
    for kind in DerivativeKind::ALL {
        let albums = WalkDir::new(kind.root(&config.media_root))
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir());

        for album in albums {
            if !is_empty_dir(album.path()) {
                continue;
            }
            let folder = format!("{}/{}", kind.dir_name(), album.file_name().to_string_lossy());
            match fs::remove_dir(album.path()) {
                Ok(()) => {
                    logger.info("Removed empty folder", &[("folder", folder)]);
                    removed += 1;
                }
                Err(e) => logger.warning(
                    "Failed to remove empty folder",
                    &[("folder", folder), ("error", e.to_string())],
                ),
            }
        }
    }
    removed
}
