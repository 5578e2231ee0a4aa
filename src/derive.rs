//! Derivative generation.
//!
//! Produces the files the gallery serves in place of originals:
//!
//! | Source | Thumbnail | Web-optimized |
//! |---|---|---|
//! | image | crop chain → exactly `thumbnail.width`×`thumbnail.height` | scaled to fit `web_optimized` box |
//! | video | FFmpeg frame at 1s, `thumbnail.width` wide | copy of the thumbnail (poster) |
//!
//! Every producer writes a hidden staging file next to the destination and
//! renames it into place only on success, so a destination is either absent,
//! the previous version, or complete. Output is always JPEG.
//!
//! A destination whose mtime is at least the source's is fresh and is left
//! alone without decoding anything.

use crate::command::{CommandError, CommandRunner};
use crate::config::{DerivativeSize, GalleryConfig};
use crate::imaging::{
    BackendError, CropChain, CropError, CropJob, CropPlan, ImageBackend, Quality, RenderParams,
    fit_within,
};
use crate::logger::Logger;
use crate::tools::Toolbox;
use crate::types::{DerivativeKind, MediaAsset, MediaKind, staging_path};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Seek position of the video poster frame.
pub const POSTER_TIMESTAMP: &str = "00:00:01.000";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("source too large: {} is {size} bytes (limit {limit})", .path.display())]
    SourceTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("unsupported format: {}: {reason}", .path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("external tool unavailable: {0}")]
    ExternalToolUnavailable(&'static str),
    #[error("{tool} failed: {detail}")]
    ExternalToolFailed { tool: &'static str, detail: String },
    #[error("destination not writable: {}: {source}", .path.display())]
    DestinationNotWritable {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl GenerateError {
    /// Tool absence is expected on many hosts and logged as a warning.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GenerateError::ExternalToolUnavailable(_))
    }

    fn from_crop(source: &Path, err: CropError) -> Self {
        match err.root() {
            CropError::Unavailable(_) => GenerateError::ExternalToolUnavailable("imagemagick"),
            CropError::Command(_) | CropError::ToolFailed { .. } | CropError::NoOutput(_) => {
                GenerateError::ExternalToolFailed {
                    tool: "convert",
                    detail: err.root().to_string(),
                }
            }
            root => GenerateError::UnsupportedFormat {
                path: source.to_path_buf(),
                reason: root.to_string(),
            },
        }
    }

    fn from_decode(source: &Path, err: BackendError) -> Self {
        GenerateError::UnsupportedFormat {
            path: source.to_path_buf(),
            reason: err.to_string(),
        }
    }

    fn from_render(dest: &Path, err: BackendError) -> Self {
        match err {
            BackendError::Io(source) => GenerateError::DestinationNotWritable {
                path: dest.to_path_buf(),
                source,
            },
            other => GenerateError::UnsupportedFormat {
                path: dest.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Written by this call.
    Generated,
    /// Destination was already fresh; nothing was done.
    AlreadyFresh,
}

/// A derivative on disk after a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivative {
    pub path: PathBuf,
    pub status: Status,
    /// Crop strategy that produced a thumbnail, when one was used.
    pub strategy: Option<&'static str>,
}

impl Derivative {
    fn fresh(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            status: Status::AlreadyFresh,
            strategy: None,
        }
    }

    fn generated(path: &Path, strategy: Option<&'static str>) -> Self {
        Self {
            path: path.to_path_buf(),
            status: Status::Generated,
            strategy,
        }
    }

    pub fn was_generated(&self) -> bool {
        self.status == Status::Generated
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// `dest` exists and is no older than `source`.
pub fn is_fresh(source: &Path, dest: &Path) -> bool {
    match (mtime(source), mtime(dest)) {
        (Some(src), Some(dst)) => dst >= src,
        _ => false,
    }
}

/// Staged write: the path to produce into, renamed over `dest` by `commit`.
struct Staging {
    path: PathBuf,
    dest: PathBuf,
}

impl Staging {
    fn prepare(dest: &Path) -> Result<Self, GenerateError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| GenerateError::DestinationNotWritable {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let path = staging_path(dest);
        let _ = fs::remove_file(&path);
        Ok(Self {
            path,
            dest: dest.to_path_buf(),
        })
    }

    fn commit(self) -> Result<(), GenerateError> {
        fs::rename(&self.path, &self.dest).map_err(|source| {
            let _ = fs::remove_file(&self.path);
            GenerateError::DestinationNotWritable {
                path: self.dest.clone(),
                source,
            }
        })
    }

    fn abandon(self) {
        let _ = fs::remove_file(&self.path);
    }

    fn written_len(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

/// Produces thumbnails, web-optimized views and video posters.
pub struct DerivativeGenerator<'a> {
    config: &'a GalleryConfig,
    logger: &'a dyn Logger,
    backend: &'a dyn ImageBackend,
    runner: &'a dyn CommandRunner,
    tools: Toolbox,
}

impl<'a> DerivativeGenerator<'a> {
    pub fn new(
        config: &'a GalleryConfig,
        logger: &'a dyn Logger,
        backend: &'a dyn ImageBackend,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            logger,
            backend,
            runner,
            tools: Toolbox::new(config.tools.clone()),
        }
    }

    pub fn config(&self) -> &GalleryConfig {
        self.config
    }

    pub fn tools(&self) -> &Toolbox {
        &self.tools
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner
    }

    /// Produce (or confirm) one derivative of `asset`.
    pub fn generate(
        &self,
        asset: &MediaAsset,
        kind: DerivativeKind,
    ) -> Result<Derivative, GenerateError> {
        let root = &self.config.media_root;
        let source = asset.source_path(root);
        let dest = asset.derivative_path(root, kind);
        match (asset.kind, kind) {
            (MediaKind::Image, DerivativeKind::Thumbnail) => self.create_thumbnail(&source, &dest),
            (MediaKind::Image, DerivativeKind::WebOptimized) => {
                self.create_web_optimized(&source, &dest)
            }
            (MediaKind::Video, DerivativeKind::Thumbnail) => {
                self.create_video_thumbnail(&source, &dest)
            }
            (MediaKind::Video, DerivativeKind::WebOptimized) => {
                let poster = asset.derivative_path(root, DerivativeKind::Thumbnail);
                self.copy_poster(&source, &poster, &dest)
            }
        }
    }

    /// Grid thumbnail of an image, cropped to exactly the thumbnail size.
    pub fn create_thumbnail(
        &self,
        source: &Path,
        dest: &Path,
    ) -> Result<Derivative, GenerateError> {
        let result = self.thumbnail_inner(source, dest);
        self.logged("thumbnail", source, result)
    }

    /// Web-optimized view of an image, scaled to fit the configured box.
    pub fn create_web_optimized(
        &self,
        source: &Path,
        dest: &Path,
    ) -> Result<Derivative, GenerateError> {
        let result = self.web_optimized_inner(source, dest);
        self.logged("web-optimized", source, result)
    }

    /// Poster frame of a video, taken one second in.
    pub fn create_video_thumbnail(
        &self,
        source: &Path,
        dest: &Path,
    ) -> Result<Derivative, GenerateError> {
        let result = self.video_thumbnail_inner(source, dest);
        self.logged("video thumbnail", source, result)
    }

    /// A video's web-optimized derivative: a copy of its poster frame.
    pub fn copy_poster(
        &self,
        source: &Path,
        poster: &Path,
        dest: &Path,
    ) -> Result<Derivative, GenerateError> {
        let result = self.copy_poster_inner(source, poster, dest);
        self.logged("poster copy", source, result)
    }

    fn logged(
        &self,
        what: &str,
        source: &Path,
        result: Result<Derivative, GenerateError>,
    ) -> Result<Derivative, GenerateError> {
        match &result {
            Ok(d) if d.was_generated() => {
                tracing::debug!(kind = what, path = %d.path.display(), strategy = ?d.strategy, "derivative written");
            }
            Ok(_) => {}
            Err(e) => {
                let context = [
                    ("kind", what.to_string()),
                    ("source", source.display().to_string()),
                    ("error", e.to_string()),
                ];
                if e.is_unavailable() {
                    self.logger.warning("Derivative skipped: tool unavailable", &context);
                } else {
                    self.logger.error("Derivative generation failed", &context);
                }
            }
        }
        result
    }

    /// Existence, freshness and size checks shared by the image producers.
    /// `Ok(Some(_))` means the destination is already fresh.
    fn precheck(
        &self,
        source: &Path,
        dest: &Path,
        size_limited: bool,
    ) -> Result<Option<Derivative>, GenerateError> {
        let meta = match fs::metadata(source) {
            Ok(m) if m.is_file() => m,
            _ => return Err(GenerateError::SourceNotFound(source.to_path_buf())),
        };
        if is_fresh(source, dest) {
            return Ok(Some(Derivative::fresh(dest)));
        }
        let limit = self.config.max_file_size;
        if size_limited && meta.len() > limit {
            return Err(GenerateError::SourceTooLarge {
                path: source.to_path_buf(),
                size: meta.len(),
                limit,
            });
        }
        Ok(None)
    }

    fn thumbnail_inner(&self, source: &Path, dest: &Path) -> Result<Derivative, GenerateError> {
        if let Some(fresh) = self.precheck(source, dest, true)? {
            return Ok(fresh);
        }
        let size = &self.config.thumbnail;
        let staging = Staging::prepare(dest)?;
        let job = CropJob::new(
            source,
            &staging.path,
            (size.width, size.height),
            Quality::new(size.quality),
            self.backend,
        );
        let chain = CropChain::from_config(&self.config.crop, self.runner, &self.tools, self.logger);

        let plan = match chain.run(&job) {
            Ok(plan) => plan,
            Err(e) => {
                staging.abandon();
                return Err(GenerateError::from_crop(source, e));
            }
        };
        let strategy = plan.strategy();

        if let CropPlan::Region(result) = plan {
            let rendered = job
                .image()
                .map_err(|e| GenerateError::from_crop(source, e))
                .and_then(|img| {
                    self.backend
                        .render(
                            img,
                            &RenderParams {
                                output: staging.path.clone(),
                                region: Some(result.rect),
                                width: size.width,
                                height: size.height,
                                quality: Quality::new(size.quality),
                            },
                        )
                        .map_err(|e| GenerateError::from_render(dest, e))
                });
            if let Err(e) = rendered {
                staging.abandon();
                return Err(e);
            }
        }

        staging.commit()?;
        Ok(Derivative::generated(dest, Some(strategy)))
    }

    fn web_optimized_inner(
        &self,
        source: &Path,
        dest: &Path,
    ) -> Result<Derivative, GenerateError> {
        if let Some(fresh) = self.precheck(source, dest, true)? {
            return Ok(fresh);
        }
        let DerivativeSize {
            width: max_w,
            height: max_h,
            quality,
        } = self.config.web_optimized;

        let img = self
            .backend
            .decode(source)
            .map_err(|e| GenerateError::from_decode(source, e))?;
        let (width, height) = fit_within((img.width(), img.height()), (max_w, max_h));

        let staging = Staging::prepare(dest)?;
        let params = RenderParams {
            output: staging.path.clone(),
            region: None,
            width,
            height,
            quality: Quality::new(quality),
        };
        if let Err(e) = self.backend.render(&img, &params) {
            staging.abandon();
            return Err(GenerateError::from_render(dest, e));
        }
        staging.commit()?;
        Ok(Derivative::generated(dest, None))
    }

    fn video_thumbnail_inner(
        &self,
        source: &Path,
        dest: &Path,
    ) -> Result<Derivative, GenerateError> {
        if let Some(fresh) = self.precheck(source, dest, false)? {
            return Ok(fresh);
        }
        let ffmpeg = self
            .tools
            .ffmpeg(self.runner)
            .ok_or(GenerateError::ExternalToolUnavailable("ffmpeg"))?;

        let staging = Staging::prepare(dest)?;
        let scale = format!("scale={}:-1", self.config.thumbnail.width);
        let argv: Vec<OsString> = vec![
            "-i".into(),
            source.into(),
            "-ss".into(),
            POSTER_TIMESTAMP.into(),
            "-vframes".into(),
            "1".into(),
            "-vf".into(),
            scale.into(),
            "-q:v".into(),
            "2".into(),
            "-y".into(),
            staging.path.as_os_str().into(),
        ];

        let outcome = self.runner.run(&ffmpeg.path, &argv, self.tools.timeout());
        let detail = match outcome {
            Ok(_) if staging.written_len() > 0 => None,
            Ok(output) => Some(
                output
                    .stderr
                    .lines()
                    .last()
                    .unwrap_or("no frame written")
                    .trim()
                    .to_string(),
            ),
            Err(CommandError::TimedOut { timeout, .. }) => {
                Some(format!("timed out after {}s", timeout.as_secs()))
            }
            Err(e) => Some(e.to_string()),
        };
        if let Some(detail) = detail {
            staging.abandon();
            return Err(GenerateError::ExternalToolFailed {
                tool: "ffmpeg",
                detail,
            });
        }

        staging.commit()?;
        Ok(Derivative::generated(dest, None))
    }

    fn copy_poster_inner(
        &self,
        source: &Path,
        poster: &Path,
        dest: &Path,
    ) -> Result<Derivative, GenerateError> {
        if let Some(fresh) = self.precheck(source, dest, false)? {
            return Ok(fresh);
        }
        if !poster.is_file() {
            return Err(GenerateError::SourceNotFound(poster.to_path_buf()));
        }
        let staging = Staging::prepare(dest)?;
        if let Err(source) = fs::copy(poster, &staging.path) {
            staging.abandon();
            return Err(GenerateError::DestinationNotWritable {
                path: dest.to_path_buf(),
                source,
            });
        }
        staging.commit()?;
        Ok(Derivative::generated(dest, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::command::tests::FakeRunner;
    use crate::config::CropMethod;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{CropRect, RustBackend};
    use crate::logger::{Level, MemoryLogger};
    use crate::test_helpers::*;
    use image::DynamicImage;
    use std::time::Duration;
    use tempfile::TempDir;

    fn small_config(root: &Path) -> GalleryConfig {
        let mut config = GalleryConfig::default();
        config.media_root = root.join("media");
        config.cache_dir = root.join("cache");
        config.thumbnail = DerivativeSize {
            width: 120,
            height: 90,
            quality: 85,
        };
        config.web_optimized = DerivativeSize {
            width: 200,
            height: 200,
            quality: 82,
        };
        config
    }

    fn ffmpeg_runner() -> FakeRunner {
        FakeRunner::new().with("ffmpeg", |args| {
            if args == ["-version"] {
                return Ok(CommandOutput::ok("ffmpeg version 6.1.1"));
            }
            std::fs::write(args.last().unwrap(), b"\xFF\xD8\xFFposter").unwrap();
            Ok(CommandOutput::ok(""))
        })
    }

    // =========================================================================
    // Thumbnails
    // =========================================================================

    #[test]
    fn thumbnail_renders_entropy_region() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_jpeg(&config.media_root.join("Trip/x.jpg"), 400, 300);
        let dest = config.media_root.join("thumbnails/Trip/x.jpg");

        let backend = MockBackend::with_images(vec![DynamicImage::new_rgb8(400, 300)]);
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let derivative = generator.create_thumbnail(&source, &dest).unwrap();

        assert_eq!(derivative.status, Status::Generated);
        assert_eq!(derivative.strategy, Some("entropy"));
        assert!(dest.exists());
        assert!(!staging_path(&dest).exists());
        let renders = backend.renders();
        assert_eq!(renders.len(), 1);
        assert_eq!(
            renders[0],
            RecordedOp::Render {
                output: staging_path(&dest).to_string_lossy().to_string(),
                region: Some(CropRect {
                    x: 0,
                    y: 0,
                    width: 400,
                    height: 300
                }),
                width: 120,
                height: 90,
                quality: 85,
            }
        );
    }

    #[test]
    fn thumbnail_real_backend_exact_size() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_jpeg(&config.media_root.join("Trip/wide.jpg"), 300, 100);
        let dest = config.media_root.join("thumbnails/Trip/wide.jpg");

        let backend = RustBackend::new();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        generator.create_thumbnail(&source, &dest).unwrap();
        assert_eq!(image_dimensions(&dest), (120, 90));
    }

    #[test]
    fn concurrent_writer_staging_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_jpeg(&config.media_root.join("Trip/x.jpg"), 160, 120);
        let dest = config.media_root.join("thumbnails/Trip/x.jpg");
        let other = write_bytes(
            &config.media_root.join("thumbnails/Trip/.x.jpg.4000000000.partial.jpg"),
            b"in flight",
        );

        let backend = RustBackend::new();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        generator.create_thumbnail(&source, &dest).unwrap();
        assert_eq!(image_dimensions(&dest), (120, 90));
        assert_eq!(std::fs::read(&other).unwrap(), b"in flight");
        assert!(!staging_path(&dest).exists());
    }

    #[test]
    fn thumbnail_via_attention_skips_decode() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_jpeg(&config.media_root.join("Trip/x.jpg"), 40, 30);
        let dest = config.media_root.join("thumbnails/Trip/x.jpg");

        let runner = FakeRunner::new().with("convert", |args| {
            if args == ["-version"] {
                return Ok(CommandOutput::ok("Version: ImageMagick 7.1.1"));
            }
            let out = args.last().unwrap().trim_start_matches("jpeg:");
            std::fs::write(out, b"\xFF\xD8\xFFim").unwrap();
            Ok(CommandOutput::ok(""))
        });
        let backend = MockBackend::new();
        let logger = MemoryLogger::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let derivative = generator.create_thumbnail(&source, &dest).unwrap();
        assert_eq!(derivative.strategy, Some("attention"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"\xFF\xD8\xFFim");
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn missing_source_fails_without_writing() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = config.media_root.join("Trip/gone.jpg");
        let dest = config.media_root.join("thumbnails/Trip/gone.jpg");

        let backend = MockBackend::permissive();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let result = generator.create_thumbnail(&source, &dest);
        assert!(matches!(result, Err(GenerateError::SourceNotFound(_))));
        assert!(!dest.exists());
        assert!(!staging_path(&dest).exists());
        assert!(backend.get_operations().is_empty());
        assert_eq!(logger.at_level(Level::Error).len(), 1);
    }

    #[test]
    fn oversized_source_rejected_before_decode() {
        let tmp = TempDir::new().unwrap();
        let mut config = small_config(tmp.path());
        config.max_file_size = 100;
        let source = config.media_root.join("Trip/huge.jpg");
        write_bytes(&source, &[0xFF; 600]);
        let dest = config.media_root.join("thumbnails/Trip/huge.jpg");

        let backend = MockBackend::permissive();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let result = generator.create_thumbnail(&source, &dest);
        assert!(matches!(
            result,
            Err(GenerateError::SourceTooLarge { size: 600, limit: 100, .. })
        ));
        assert!(backend.get_operations().is_empty());
        assert!(runner.calls().is_empty());
        assert!(generator.create_web_optimized(&source, &dest).is_err());
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn fresh_destination_is_left_alone() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_jpeg(&config.media_root.join("Trip/x.jpg"), 40, 30);
        let dest = config.media_root.join("thumbnails/Trip/x.jpg");
        write_bytes(&dest, b"existing");
        set_mtime(&source, 1_000);
        set_mtime(&dest, 2_000);

        let backend = MockBackend::new();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let derivative = generator.create_thumbnail(&source, &dest).unwrap();
        assert_eq!(derivative.status, Status::AlreadyFresh);
        assert_eq!(std::fs::read(&dest).unwrap(), b"existing");
        assert!(backend.get_operations().is_empty());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn stale_destination_is_regenerated() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_jpeg(&config.media_root.join("Trip/x.jpg"), 40, 30);
        let dest = config.media_root.join("thumbnails/Trip/x.jpg");
        write_bytes(&dest, b"old");
        set_mtime(&dest, 1_000);
        set_mtime(&source, 2_000);

        let backend = MockBackend::permissive();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let derivative = generator.create_thumbnail(&source, &dest).unwrap();
        assert_eq!(derivative.status, Status::Generated);
        assert_eq!(std::fs::read(&dest).unwrap(), b"mock-jpeg");
    }

    #[test]
    fn undecodable_source_is_unsupported_and_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let mut config = small_config(tmp.path());
        config.crop.method = CropMethod::Auto;
        let source = config.media_root.join("Trip/bad.jpg");
        write_bytes(&source, b"not an image");
        let dest = config.media_root.join("thumbnails/Trip/bad.jpg");

        let backend = RustBackend::new();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let result = generator.create_thumbnail(&source, &dest);
        assert!(matches!(result, Err(GenerateError::UnsupportedFormat { .. })));
        assert!(!dest.exists());
        assert!(!staging_path(&dest).exists());
    }

    #[test]
    fn failed_render_keeps_previous_destination() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_jpeg(&config.media_root.join("Trip/x.jpg"), 40, 30);
        let dest = config.media_root.join("thumbnails/Trip/x.jpg");
        write_bytes(&dest, b"previous");
        set_mtime(&dest, 1_000);
        set_mtime(&source, 2_000);

        let backend = MockBackend {
            decode_fallback: true,
            fail_render: true,
            ..MockBackend::default()
        };
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        assert!(generator.create_thumbnail(&source, &dest).is_err());
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
        assert!(!staging_path(&dest).exists());
    }

    // =========================================================================
    // Web-optimized
    // =========================================================================

    #[test]
    fn web_optimized_fits_box() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_jpeg(&config.media_root.join("Trip/x.jpg"), 400, 300);
        let dest = config.media_root.join("web-optimized/Trip/x.jpg");

        let backend = RustBackend::new();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let derivative = generator.create_web_optimized(&source, &dest).unwrap();
        assert!(derivative.was_generated());
        assert_eq!(image_dimensions(&dest), (200, 150));
    }

    #[test]
    fn web_optimized_png_source_becomes_jpeg() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_png(&config.media_root.join("Trip/x.png"), 100, 50);
        let dest = config.media_root.join("web-optimized/Trip/x.png");

        let backend = RustBackend::new();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        generator.create_web_optimized(&source, &dest).unwrap();
        let bytes = std::fs::read(&dest).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
        // Small sources are scaled up to the box
        assert_eq!(image_dimensions(&dest), (200, 100));
    }

    // =========================================================================
    // Video
    // =========================================================================

    #[test]
    fn video_thumbnail_runs_ffmpeg_into_staging() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_mp4(&config.media_root.join("Trip/clip.mp4"));
        let dest = config.media_root.join("thumbnails/Trip/clip.jpg");

        let backend = MockBackend::new();
        let logger = MemoryLogger::new();
        let runner = ffmpeg_runner();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let derivative = generator.create_video_thumbnail(&source, &dest).unwrap();
        assert!(derivative.was_generated());
        assert_eq!(std::fs::read(&dest).unwrap(), b"\xFF\xD8\xFFposter");

        let calls = runner.calls_with("-vframes");
        assert_eq!(calls.len(), 1);
        let args = &calls[0].args;
        assert_eq!(args[0], "-i");
        assert_eq!(args[1], source.to_string_lossy());
        assert_eq!(&args[2..10], ["-ss", "00:00:01.000", "-vframes", "1", "-vf", "scale=120:-1", "-q:v", "2"]);
        assert_eq!(args[10], "-y");
        assert_eq!(args[11], staging_path(&dest).to_string_lossy());
    }

    #[test]
    fn video_thumbnail_without_ffmpeg_warns() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_mp4(&config.media_root.join("Trip/clip.mp4"));
        let dest = config.media_root.join("thumbnails/Trip/clip.jpg");

        let backend = MockBackend::new();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let result = generator.create_video_thumbnail(&source, &dest);
        assert!(matches!(result, Err(GenerateError::ExternalToolUnavailable("ffmpeg"))));
        assert!(runner.calls().is_empty());
        assert_eq!(logger.at_level(Level::Warning).len(), 1);
        assert!(logger.at_level(Level::Error).is_empty());
    }

    #[test]
    fn video_thumbnail_empty_output_fails() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_mp4(&config.media_root.join("Trip/clip.mp4"));
        let dest = config.media_root.join("thumbnails/Trip/clip.jpg");

        let runner = FakeRunner::new().with("ffmpeg", |_| {
            Ok(CommandOutput::failed(1, "clip.mp4: Invalid data found when processing input"))
        });
        let backend = MockBackend::new();
        let logger = MemoryLogger::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let err = generator.create_video_thumbnail(&source, &dest).unwrap_err();
        assert!(matches!(err, GenerateError::ExternalToolFailed { tool: "ffmpeg", .. }));
        assert!(err.to_string().contains("Invalid data"));
        assert!(!dest.exists());
    }

    #[test]
    fn video_thumbnail_timeout_fails() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_mp4(&config.media_root.join("Trip/clip.mp4"));
        let dest = config.media_root.join("thumbnails/Trip/clip.jpg");

        let runner = FakeRunner::new().with("ffmpeg", |args| {
            if args == ["-version"] {
                return Ok(CommandOutput::ok("ffmpeg version 6"));
            }
            Err(CommandError::TimedOut {
                program: "ffmpeg".into(),
                timeout: Duration::from_secs(120),
            })
        });
        let backend = MockBackend::new();
        let logger = MemoryLogger::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let err = generator.create_video_thumbnail(&source, &dest).unwrap_err();
        assert!(err.to_string().contains("timed out after 120s"));
    }

    #[test]
    fn video_web_optimized_is_poster_copy() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        write_mp4(&config.media_root.join("Trip/clip.mp4"));
        let asset = MediaAsset::new("media", "Trip", "clip.mp4", MediaKind::Video, 0, 0);

        let backend = MockBackend::new();
        let logger = MemoryLogger::new();
        let runner = ffmpeg_runner();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let thumb = generator.generate(&asset, DerivativeKind::Thumbnail).unwrap();
        let web = generator.generate(&asset, DerivativeKind::WebOptimized).unwrap();

        assert_eq!(web.path, config.media_root.join("web-optimized/Trip/clip.jpg"));
        assert_eq!(std::fs::read(&web.path).unwrap(), std::fs::read(&thumb.path).unwrap());
    }

    #[test]
    fn poster_copy_requires_poster() {
        let tmp = TempDir::new().unwrap();
        let config = small_config(tmp.path());
        let source = write_mp4(&config.media_root.join("Trip/clip.mp4"));
        let poster = config.media_root.join("thumbnails/Trip/clip.jpg");
        let dest = config.media_root.join("web-optimized/Trip/clip.jpg");

        let backend = MockBackend::new();
        let logger = MemoryLogger::new();
        let runner = FakeRunner::new();
        let generator = DerivativeGenerator::new(&config, &logger, &backend, &runner);

        let result = generator.copy_poster(&source, &poster, &dest);
        assert!(matches!(result, Err(GenerateError::SourceNotFound(p)) if p == poster));
    }

    #[test]
    fn is_fresh_compares_mtimes() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.jpg");
        let dest = tmp.path().join("b.jpg");
        write_bytes(&source, b"a");
        assert!(!is_fresh(&source, &dest));

        write_bytes(&dest, b"b");
        set_mtime(&source, 5_000);
        set_mtime(&dest, 5_000);
        assert!(is_fresh(&source, &dest));
        set_mtime(&dest, 4_999);
        assert!(!is_fresh(&source, &dest));
    }
}
