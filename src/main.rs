use clap::{Parser, Subcommand};
use keepsake::catalog::{CatalogCache, unix_now};
use keepsake::command::SystemRunner;
use keepsake::config::{self, GalleryConfig};
use keepsake::health::{self, Status};
use keepsake::imaging::RustBackend;
use keepsake::logger::TracingLogger;
use keepsake::maintenance;
use keepsake::output;
use keepsake::sync::Orchestrator;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "keepsake")]
#[command(about = "Thumbnail and web-optimized derivatives for a photo/video gallery")]
#[command(long_about = "\
Thumbnail and web-optimized derivatives for a photo/video gallery

Every immediate subdirectory of the media root is an album. keepsake keeps
two derivatives per source next to them:

  media/
  ├── Holidays/                    # Album
  │   ├── beach.jpg                # Source image
  │   └── waves.mp4                # Source video
  ├── thumbnails/Holidays/         # Cropped grid thumbnails
  │   ├── beach.jpg
  │   └── waves.jpg                # Poster frame (needs FFmpeg)
  └── web-optimized/Holidays/      # Scaled-to-fit views
      ├── beach.jpg
      └── waves.jpg                # Copy of the poster

'sync' does a bounded amount of work and is cheap enough to run on every
page load. 'maintain' converges everything at once.

Run 'keepsake gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Log filter (overrides RUST_LOG), e.g. "debug" or "keepsake=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bounded sync: generate a few missing derivatives, clean a few orphans
    Sync,
    /// Full pass: delete all orphans, regenerate everything missing or stale
    Maintain,
    /// Show the media catalog
    Scan {
        /// Rebuild the catalog even if the cached one is still valid
        #[arg(long)]
        refresh: bool,
    },
    /// Delete the cached catalog
    ClearCache,
    /// Check directories, tools and derivative coverage
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    init_logging(cli.log_level.as_deref(), config.log_file.as_deref())?;
    tracing::debug!(config = %cli.config.display(), media_root = %config.media_root.display(), "configuration loaded");

    let logger = TracingLogger;
    let backend = RustBackend::new();
    let runner = SystemRunner::new();

    match cli.command {
        Command::Sync => {
            let report = Orchestrator::new(&config, &logger, &backend, &runner).run();
            output::print_sync_report(&report);
            if report.banner.is_some() {
                std::process::exit(1);
            }
        }
        Command::Maintain => {
            println!("==> Maintaining {}", config.media_root.display());
            let report = maintenance::maintain(&config, &logger, &backend, &runner)?;
            output::print_maintenance_report(&report);
            println!("==> Maintenance complete");
        }
        Command::Scan { refresh } => {
            let catalog = scan_catalog(&config, refresh)?;
            output::print_scan_output(&catalog);
        }
        Command::ClearCache => {
            let cache = CatalogCache::new(&config);
            if cache.clear()? {
                println!("Removed {}", cache.path().display());
            } else {
                println!("No cache file found");
            }
        }
        Command::Check => {
            let report = health::check(&config, &runner);
            output::print_health_report(&report);
            if report.worst() == Status::Error {
                std::process::exit(1);
            }
        }
        // Printed before the configuration was loaded
        Command::GenConfig => {}
    }

    Ok(())
}

/// Cached catalog when valid, otherwise a fresh scan saved to the cache.
fn scan_catalog(
    config: &GalleryConfig,
    refresh: bool,
) -> Result<keepsake::catalog::Catalog, keepsake::catalog::CatalogError> {
    let cache = CatalogCache::new(config);
    if refresh {
        cache.rebuild()
    } else {
        cache.obtain_at(unix_now()).map(|(catalog, _)| catalog)
    }
}

/// Install the tracing subscriber: stderr always, plus the configured log
/// file in append mode.
fn init_logging(level: Option<&str>, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}
