//! PlateScanner - Live license-plate locator
//!
//! Watches a camera feed for plate-shaped regions, waits until one stays in
//! view, and sends a crop of it to a remote recognition service.

mod capture;
mod config;
mod errors;
mod pipeline;
mod recognition;
mod render;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::capture::{select_device, CameraBackend, DeviceSelection, FrameSource, ImageSequenceCamera, SyntheticCamera};
use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::recognition::HttpRecognizer;
use crate::render::{RenderSurface, SnapshotWriter, StatusLog};

/// PlateScanner - Live license-plate locator
#[derive(Parser, Debug)]
#[command(name = "plate-scanner")]
#[command(about = "Locate license plates in a camera feed and recognize their text")]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read frames from a directory of stills instead of the synthetic camera
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Recognition endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Stop after this many processed frames (0 = run until Ctrl-C)
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Save annotated snapshots of recognition results (defaults to the platform data directory)
    #[arg(long, num_args = 0..=1, value_name = "DIR")]
    snapshot_dir: Option<Option<PathBuf>>,

    /// List available camera devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    write_default_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => storage::default_config_path()?,
    };

    if args.write_default_config {
        config::save_config(&AppConfig::default(), &config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let mut config = load_or_default_config(&config_path);
    apply_overrides(&mut config, &args);

    let mut backend = build_backend(&args, &config);

    // List devices mode
    if args.list_devices {
        return list_devices(backend.as_mut(), &config);
    }

    info!("PlateScanner starting...");
    info!("Recognition endpoint: {}", config.recognition.endpoint);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let snapshot_dir = match args.snapshot_dir {
        Some(Some(dir)) => Some(dir),
        Some(None) => Some(storage::default_snapshot_dir()?),
        None => None,
    };

    let result = runtime.block_on(run(config, backend, snapshot_dir));

    info!("PlateScanner shutdown complete");
    result
}

/// Load configuration, falling back to defaults
fn load_or_default_config(path: &Path) -> AppConfig {
    if path.exists() {
        match config::load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                return config;
            }
            Err(e) => warn!("Ignoring configuration at {:?}: {:#}", path, e),
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(endpoint) = &args.endpoint {
        config.recognition.endpoint = endpoint.clone();
    }
    if let Some(max_cycles) = args.max_cycles {
        config.pipeline.max_cycles = max_cycles;
    }
}

fn build_backend(args: &Args, config: &AppConfig) -> Box<dyn CameraBackend> {
    match &args.frames_dir {
        Some(dir) => {
            info!("Reading frames from {:?}", dir);
            Box::new(ImageSequenceCamera::new(dir))
        }
        None => {
            info!("No frames directory given, using the synthetic camera");
            Box::new(SyntheticCamera::new(
                config.capture.ideal_width,
                config.capture.ideal_height,
            ))
        }
    }
}

fn list_devices(backend: &mut dyn CameraBackend, config: &AppConfig) -> Result<()> {
    let devices = backend.enumerate().context("Failed to enumerate cameras")?;

    println!("Available cameras:");
    if devices.is_empty() {
        println!("  No cameras detected");
    }
    for device in &devices {
        println!("  [{}] {}", device.id, device.label);
    }

    match select_device(&devices, &config.capture.rear_label_hints) {
        DeviceSelection::Exact(id) => println!("Selected: {}", id),
        DeviceSelection::Generic(facing) => println!("Selected: default camera ({:?})", facing),
    }
    Ok(())
}

async fn run(
    config: AppConfig,
    backend: Box<dyn CameraBackend>,
    snapshot_dir: Option<PathBuf>,
) -> Result<()> {
    let recognizer = Arc::new(HttpRecognizer::from_settings(&config.recognition)?);
    let source = FrameSource::new(backend, config.capture.clone());

    let mut surfaces: Vec<Box<dyn RenderSurface>> = vec![Box::new(StatusLog::new())];
    if let Some(dir) = snapshot_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory {:?}", dir))?;
        info!("Saving snapshots to {:?}", dir);
        surfaces.push(Box::new(SnapshotWriter::new(dir)));
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping");
                ctrl_c_cancel.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let mut pipeline = Pipeline::new(config);
    let stats = pipeline
        .run(source, recognizer, &mut surfaces, cancel)
        .await?;

    info!(
        "Processed {} frames ({} idle, {} failed), {} captures, {} encode failures",
        stats.cycles, stats.idle_cycles, stats.failed_cycles, stats.captures_fired, stats.encode_failures
    );
    Ok(())
}
