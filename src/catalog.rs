//! Persisted catalog of the media tree.
//!
//! A full scan touches every source and sniffs its header, which is far too
//! slow to repeat on each page load. The [`Catalog`] produced by
//! [`scan`](crate::scan::scan) is therefore saved as JSON and reused until it
//! is older than `cache_duration` seconds.
//!
//! ## Artifact
//!
//! `{cache_dir}/gallery_cache.json`:
//!
//! ```json
//! { "allFiles": [ { "path": "media/Trip/a.jpg", "thumb": "...", "type": "image", ... } ],
//!   "albums": ["Trip"],
//!   "generated": 1700000000 }
//! ```
//!
//! Saves go through a hidden temp file in the same directory followed by a
//! rename, so readers see either the old or the new artifact. Concurrent
//! writers are last-writer-wins.
//!
//! An artifact that cannot be read or parsed is reported as
//! [`CatalogError::CorruptCacheArtifact`] by [`CatalogCache::read`] and
//! treated as a miss by [`CatalogCache::load`].

use crate::config::GalleryConfig;
use crate::scan::{self, ScanError};
use crate::types::MediaAsset;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Name of the catalog artifact within the cache directory.
pub const CATALOG_FILENAME: &str = "gallery_cache.json";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt catalog artifact {}: {reason}", .path.display())]
    CorruptCacheArtifact { path: PathBuf, reason: String },
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Current time as unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Snapshot of the media tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Assets in album order, then file name order.
    #[serde(rename = "allFiles")]
    pub all_files: Vec<MediaAsset>,
    pub albums: Vec<String>,
    /// Unix seconds when the snapshot was taken.
    pub generated: u64,
}

impl Catalog {
    /// Whether the snapshot is still usable at `now` for a TTL of `ttl` seconds.
    pub fn is_valid_at(&self, now: u64, ttl: u64) -> bool {
        now.saturating_sub(self.generated) <= ttl
    }

    /// Number of assets missing at least one derivative.
    pub fn incomplete_count(&self) -> usize {
        self.all_files.iter().filter(|a| a.is_incomplete()).count()
    }

    /// `(album, canonical name)` of every derivative the catalog expects.
    pub fn expected_derivatives(&self) -> HashSet<(String, String)> {
        self.all_files
            .iter()
            .map(|a| (a.album.clone(), a.canonical_name()))
            .collect()
    }
}

/// Reads and writes the catalog artifact for one configuration.
pub struct CatalogCache<'a> {
    config: &'a GalleryConfig,
    path: PathBuf,
}

impl<'a> CatalogCache<'a> {
    pub fn new(config: &'a GalleryConfig) -> Self {
        Self {
            config,
            path: config.cache_dir.join(CATALOG_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the artifact regardless of age. `Ok(None)` when it doesn't exist.
    pub fn read(&self) -> Result<Option<Catalog>, CatalogError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CatalogError::CorruptCacheArtifact {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CatalogError::CorruptCacheArtifact {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// The persisted catalog if it is still within its TTL.
    pub fn load(&self) -> Option<Catalog> {
        self.load_at(unix_now())
    }

    pub fn load_at(&self, now: u64) -> Option<Catalog> {
        match self.read() {
            Ok(Some(catalog)) if catalog.is_valid_at(now, self.config.cache_duration) => {
                tracing::debug!(generated = catalog.generated, "catalog cache hit");
                Some(catalog)
            }
            Ok(Some(catalog)) => {
                tracing::debug!(generated = catalog.generated, now, "catalog cache expired");
                None
            }
            Ok(None) => {
                tracing::debug!("no catalog cache");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "catalog cache unreadable, treating as miss");
                None
            }
        }
    }

    /// Write the catalog atomically. The temp file is per process, so
    /// concurrent writers only race on the final rename.
    pub fn save(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        fs::create_dir_all(&self.config.cache_dir)?;
        let tmp = self
            .config
            .cache_dir
            .join(format!(".{CATALOG_FILENAME}.{}.tmp", std::process::id()));
        let json = serde_json::to_string_pretty(catalog).map_err(io::Error::from)?;
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove the artifact. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, CatalogError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Scan the media tree and persist the result, stamped `now`.
    pub fn rebuild_at(&self, now: u64) -> Result<Catalog, CatalogError> {
        let catalog = scan::scan(self.config, now)?;
        self.save(&catalog)?;
        tracing::debug!(assets = catalog.all_files.len(), "catalog rebuilt");
        Ok(catalog)
    }

    pub fn rebuild(&self) -> Result<Catalog, CatalogError> {
        self.rebuild_at(unix_now())
    }

    /// Cached catalog if valid at `now`, otherwise a fresh rebuild. The flag
    /// reports whether a rebuild happened.
    pub fn obtain_at(&self, now: u64) -> Result<(Catalog, bool), CatalogError> {
        match self.load_at(now) {
            Some(catalog) => Ok((catalog, false)),
            None => self.rebuild_at(now).map(|c| (c, true)),
        }
    }
}
