//! # Keepsake
//!
//! The derivative pipeline of a photo/video gallery. Originals stay where the
//! photographer put them; keepsake maintains two standardized derivatives for
//! each one and a cached catalog of the whole tree.
//!
//! # Architecture: Bounded Convergence
//!
//! ```text
//! media/{album}/{file}  ──scan──▶  Catalog (cache/gallery_cache.json, TTL)
//!                                     │
//!                         sync: a few missing derivatives per call
//!                                     ▼
//!        media/thumbnails/{album}/{name}      (cropped to an exact size)
//!        media/web-optimized/{album}/{name}   (scaled to fit a box)
//! ```
//!
//! A gallery page load calls [`sync::Orchestrator::run`], which never does
//! more than `auto_sync.limit` generations and `auto_cleanup.limit` deletions.
//! Big backlogs are handled offline by [`maintenance::maintain`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, defaults, and validation |
//! | [`types`] | [`MediaAsset`](types::MediaAsset), derivative kinds, canonical names |
//! | [`scan`] | Walks the media tree, verifying file contents, into a catalog |
//! | [`catalog`] | Catalog type and its TTL-bound JSON cache |
//! | [`derive`] | Thumbnail, web-optimized, and video poster generation |
//! | [`imaging`] | Crop strategy chain, entropy search, pure-Rust JPEG rendering |
//! | [`command`] | Runs external binaries with argument vectors and timeouts |
//! | [`tools`] | Presence and vendor probes for ImageMagick and FFmpeg |
//! | [`sync`] | Per-invocation budgeted sync and throttled orphan cleanup |
//! | [`maintenance`] | Unbudgeted full convergence |
//! | [`health`] | Installation diagnostics |
//! | [`logger`] | Injected logger port with tracing and in-memory implementations |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Derivatives Are Always JPEG
//!
//! A derivative keeps its source's file name (videos get `{stem}.jpg`) so the
//! front end can compute its URL without a lookup, but the content is always
//! JPEG. Browsers sniff the bytes, and one output format keeps the encoder
//! path single.
//!
//! ## Staged Writes
//!
//! Every producer writes a hidden `.{name}.{pid}.partial.jpg` next to the
//! destination and renames it into place only after the producing step
//! succeeded. A crash or tool failure leaves either the previous derivative
//! or nothing. Cleanup and scanning skip hidden files, so staging files are
//! never mistaken for derivatives.
//!
//! ## Crop Fallback Chain
//!
//! ImageMagick's attention crop is preferred when a genuine ImageMagick is
//! installed; otherwise an entropy grid search over the decoded raster picks
//! the region, and a center crop is the last resort. Each strategy is a
//! [`CropStrategy`](imaging::CropStrategy) trait object, so the chain is a
//! plain list that configuration can narrow to a single method.
//!
//! ## External Tools Behind a Port
//!
//! `convert` and `ffmpeg` are only ever invoked through
//! [`CommandRunner`](command::CommandRunner): argument vectors (no shell),
//! an explicit timeout, and captured output. Tests substitute a scripted
//! runner and never need the binaries.

pub mod catalog;
pub mod command;
pub mod config;
pub mod derive;
pub mod health;
pub mod imaging;
pub mod logger;
pub mod maintenance;
pub mod output;
pub mod scan;
pub mod sync;
pub mod tools;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
