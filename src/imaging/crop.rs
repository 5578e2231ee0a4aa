//! Crop strategy chain for grid thumbnails.
//!
//! Strategies are tried in priority order and the first success wins:
//!
//! | Strategy | Needs | Produces |
//! |---|---|---|
//! | `attention` | ImageMagick `convert` | finished staging file ([`CropPlan::Rendered`]) |
//! | `entropy` | decoded raster | best-scoring region ([`CropPlan::Region`]) |
//! | `center` | decoded raster | centered region ([`CropPlan::Region`]) |
//!
//! `crop.method` narrows the chain to one strategy. Every fallback is
//! reported through the [`Logger`].

use super::backend::{BackendError, ImageBackend};
use super::calculations::{center_crop, crop_dimensions};
use super::entropy::{self, SearchParams};
use super::params::{CropResult, Quality};
use crate::command::{CommandError, CommandRunner};
use crate::config::{CropConfig, CropMethod};
use crate::logger::Logger;
use crate::tools::Toolbox;
use image::DynamicImage;
use std::cell::OnceCell;
use std::ffi::OsString;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CropError {
    #[error("{0} is not available")]
    Unavailable(&'static str),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("{strategy} exited with status {code:?}: {stderr}")]
    ToolFailed {
        strategy: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{0} produced no output")]
    NoOutput(&'static str),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("all crop strategies failed")]
    Exhausted { last: Option<Box<CropError>> },
}

impl CropError {
    /// The innermost error, looking through [`CropError::Exhausted`].
    pub fn root(&self) -> &CropError {
        match self {
            CropError::Exhausted { last: Some(inner) } => inner.root(),
            other => other,
        }
    }
}

/// How a strategy satisfied the job.
#[derive(Debug, Clone, PartialEq)]
pub enum CropPlan {
    /// The strategy wrote the finished thumbnail to the staging path.
    Rendered { strategy: &'static str },
    /// The caller must crop this region and resample it to the target.
    Region(CropResult),
}

impl CropPlan {
    pub fn strategy(&self) -> &'static str {
        match self {
            CropPlan::Rendered { strategy } => *strategy,
            CropPlan::Region(result) => result.strategy,
        }
    }
}

/// One thumbnail to crop. The source is decoded at most once, on first use.
pub struct CropJob<'a> {
    pub source: &'a Path,
    pub staging: &'a Path,
    pub target: (u32, u32),
    pub quality: Quality,
    backend: &'a dyn ImageBackend,
    raster: OnceCell<DynamicImage>,
}

impl<'a> CropJob<'a> {
    pub fn new(
        source: &'a Path,
        staging: &'a Path,
        target: (u32, u32),
        quality: Quality,
        backend: &'a dyn ImageBackend,
    ) -> Self {
        Self {
            source,
            staging,
            target,
            quality,
            backend,
            raster: OnceCell::new(),
        }
    }

    /// The decoded source raster.
    pub fn image(&self) -> Result<&DynamicImage, CropError> {
        if self.raster.get().is_none() {
            let decoded = self.backend.decode(self.source)?;
            let _ = self.raster.set(decoded);
        }
        self.raster
            .get()
            .ok_or_else(|| CropError::NoOutput("decoder"))
    }

    /// Crop size preserving the target ratio inside the decoded source.
    fn crop_size(&self) -> Result<((u32, u32), (u32, u32)), CropError> {
        let img = self.image()?;
        let source = (img.width(), img.height());
        Ok((source, crop_dimensions(source, self.target)))
    }
}

pub trait CropStrategy {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    fn attempt(&self, job: &CropJob<'_>) -> Result<CropPlan, CropError>;
}

// =============================================================================
// Strategies
// =============================================================================

/// ImageMagick fill-resize with centered extent, written straight to staging.
pub struct AttentionCrop<'a> {
    runner: &'a dyn CommandRunner,
    tools: &'a Toolbox,
}

impl<'a> AttentionCrop<'a> {
    pub const NAME: &'static str = "attention";

    pub fn new(runner: &'a dyn CommandRunner, tools: &'a Toolbox) -> Self {
        Self { runner, tools }
    }
}

/// Argument vector for `convert`. The `jpeg:` prefix forces JPEG output
/// whatever the staging file is called.
pub fn attention_args(job: &CropJob<'_>) -> Vec<OsString> {
    let (w, h) = job.target;
    let mut staging = OsString::from("jpeg:");
    staging.push(job.staging.as_os_str());
    vec![
        job.source.as_os_str().to_os_string(),
        "-resize".into(),
        format!("{w}x{h}^").into(),
        "-gravity".into(),
        "Center".into(),
        "-extent".into(),
        format!("{w}x{h}").into(),
        "-quality".into(),
        job.quality.value().to_string().into(),
        staging,
    ]
}

impl CropStrategy for AttentionCrop<'_> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        self.tools.imagemagick(self.runner).is_some()
    }

    fn attempt(&self, job: &CropJob<'_>) -> Result<CropPlan, CropError> {
        let tool = self
            .tools
            .imagemagick(self.runner)
            .ok_or(CropError::Unavailable(Self::NAME))?;
        let output = self
            .runner
            .run(&tool.path, &attention_args(job), self.tools.timeout())?;
        if !output.success() {
            return Err(CropError::ToolFailed {
                strategy: Self::NAME,
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        let written = std::fs::metadata(job.staging).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(CropError::NoOutput(Self::NAME));
        }
        Ok(CropPlan::Rendered {
            strategy: Self::NAME,
        })
    }
}

/// Grid search for the brightest, best-composed region.
pub struct EntropyCrop {
    params: SearchParams,
}

impl EntropyCrop {
    pub fn new(params: SearchParams) -> Self {
        Self { params }
    }
}

impl CropStrategy for EntropyCrop {
    fn name(&self) -> &'static str {
        entropy::STRATEGY_NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn attempt(&self, job: &CropJob<'_>) -> Result<CropPlan, CropError> {
        let (_, crop) = job.crop_size()?;
        let rgb = job.image()?.to_rgb8();
        Ok(CropPlan::Region(entropy::find_best_crop(
            &rgb,
            crop,
            self.params,
        )))
    }
}

/// Centered region; the last resort.
pub struct CenterCrop;

impl CenterCrop {
    pub const NAME: &'static str = "center";
}

impl CropStrategy for CenterCrop {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_available(&self) -> bool {
        true
    }

    fn attempt(&self, job: &CropJob<'_>) -> Result<CropPlan, CropError> {
        let (source, crop) = job.crop_size()?;
        Ok(CropPlan::Region(CropResult {
            rect: center_crop(source, crop),
            strategy: Self::NAME,
            score: 0.0,
        }))
    }
}

// =============================================================================
// Chain
// =============================================================================

/// Ordered list of strategies; the first to succeed wins.
pub struct CropChain<'a> {
    strategies: Vec<Box<dyn CropStrategy + 'a>>,
    logger: &'a dyn Logger,
}

impl<'a> CropChain<'a> {
    pub fn new(strategies: Vec<Box<dyn CropStrategy + 'a>>, logger: &'a dyn Logger) -> Self {
        Self { strategies, logger }
    }

    /// Build the chain selected by `crop.method`.
    pub fn from_config(
        config: &CropConfig,
        runner: &'a dyn CommandRunner,
        tools: &'a Toolbox,
        logger: &'a dyn Logger,
    ) -> Self {
        let params = SearchParams {
            grid_step: config.grid_step,
            sample_step: config.sample_step,
            rule_of_thirds: config.rule_of_thirds,
        };
        let attention = || Box::new(AttentionCrop::new(runner, tools)) as Box<dyn CropStrategy + 'a>;
        let entropy = || Box::new(EntropyCrop::new(params)) as Box<dyn CropStrategy + 'a>;
        let center = || Box::new(CenterCrop) as Box<dyn CropStrategy + 'a>;

        let strategies = match config.method {
            CropMethod::Auto => vec![attention(), entropy(), center()],
            CropMethod::Attention => vec![attention()],
            CropMethod::Entropy => vec![entropy()],
            CropMethod::Center => vec![center()],
        };
        Self::new(strategies, logger)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, job: &CropJob<'_>) -> Result<CropPlan, CropError> {
        let source = job.source.display().to_string();
        let mut last = None;

        for strategy in &self.strategies {
            if !strategy.is_available() {
                self.logger.info(
                    "Crop strategy unavailable, falling back",
                    &[("strategy", strategy.name().into()), ("source", source.clone())],
                );
                last = Some(CropError::Unavailable(strategy.name()));
                continue;
            }
            match strategy.attempt(job) {
                Ok(plan) => {
                    tracing::debug!(strategy = strategy.name(), source = %source, "crop chosen");
                    return Ok(plan);
                }
                Err(e) => {
                    self.logger.warning(
                        "Crop strategy failed, falling back",
                        &[
                            ("strategy", strategy.name().into()),
                            ("source", source.clone()),
                            ("error", e.to_string()),
                        ],
                    );
                    // A failed tool run may leave a partial staging file behind
                    let _ = std::fs::remove_file(job.staging);
                    last = Some(e);
                }
            }
        }

        Err(CropError::Exhausted {
            last: last.map(Box::new),
        })
    }
}
