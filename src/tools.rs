//! Presence probes for the external tools.
//!
//! | Tool | Binary | Accepted when |
//! |---|---|---|
//! | ImageMagick | `convert` | found, and `-version` names ImageMagick but not GraphicsMagick |
//! | FFmpeg | `ffmpeg` | found |
//!
//! Each probe runs at most once per [`Toolbox`]; the answer is cached for
//! the rest of the process.

use crate::command::{CommandRunner, args};
use crate::config::ToolsConfig;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// A located, accepted external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub path: PathBuf,
    /// First line of `-version` output, when the tool printed one.
    pub version: Option<String>,
}

/// Lazily probed tool set.
#[derive(Debug, Default)]
pub struct Toolbox {
    config: ToolsConfig,
    imagemagick: OnceLock<Option<Tool>>,
    ffmpeg: OnceLock<Option<Tool>>,
}

impl Toolbox {
    pub fn new(config: ToolsConfig) -> Self {
        Self {
            config,
            imagemagick: OnceLock::new(),
            ffmpeg: OnceLock::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// ImageMagick's `convert`, if present and genuine.
    pub fn imagemagick(&self, runner: &dyn CommandRunner) -> Option<&Tool> {
        self.imagemagick
            .get_or_init(|| probe_imagemagick(runner, self.config.imagemagick.as_deref(), self.timeout()))
            .as_ref()
    }

    /// `ffmpeg`, if present.
    pub fn ffmpeg(&self, runner: &dyn CommandRunner) -> Option<&Tool> {
        self.ffmpeg
            .get_or_init(|| probe_ffmpeg(runner, self.config.ffmpeg.as_deref(), self.timeout()))
            .as_ref()
    }
}

fn locate(runner: &dyn CommandRunner, configured: Option<&Path>, default: &str) -> Option<PathBuf> {
    match configured {
        Some(path) => runner.locate(&path.to_string_lossy()),
        None => runner.locate(default),
    }
}

fn probe_imagemagick(
    runner: &dyn CommandRunner,
    configured: Option<&Path>,
    timeout: Duration,
) -> Option<Tool> {
    let path = locate(runner, configured, "convert")?;
    let output = match runner.run(&path, &args(["-version"]), timeout) {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "convert -version failed");
            return None;
        }
    };
    let text = format!("{}{}", output.stdout, output.stderr);
    if !is_imagemagick(&text) {
        tracing::debug!(path = %path.display(), "convert is not ImageMagick, ignoring");
        return None;
    }
    let version = output.first_line().map(str::to_string);
    Some(Tool { path, version })
}

fn probe_ffmpeg(runner: &dyn CommandRunner, configured: Option<&Path>, timeout: Duration) -> Option<Tool> {
    let path = locate(runner, configured, "ffmpeg")?;
    let version = runner
        .run(&path, &args(["-version"]), timeout)
        .ok()
        .and_then(|o| o.first_line().map(str::to_string));
    Some(Tool { path, version })
}

/// Vendor check on `convert -version` output.
pub fn is_imagemagick(version_output: &str) -> bool {
    version_output.contains("ImageMagick") && !version_output.contains("GraphicsMagick")
}
