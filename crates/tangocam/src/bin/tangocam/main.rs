//! tangocam simulation driver
//!
//! Runs the capture coordinator against a simulated sensing service. Frame
//! and point cloud callbacks fire from their own tokio tasks; the driver
//! starts the next capture as soon as the previous one reports a terminal
//! outcome, and prints one report per capture.

mod report;
mod sim;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tangocam::CaptureCoordinator;
use tangoconf::TangoConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use report::{ChannelSink, Outcome, ReportBuilder};
use sim::SimulatedService;

#[derive(Parser)]
#[command(name = "tangocam")]
#[command(about = "Drive the photo capture coordinator against a simulated device")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./tangocam.toml in the search order)
    #[arg(short, long, env = "TANGOCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of captures to run
    #[arg(short = 'n', long, default_value = "3")]
    captures: usize,

    /// Request a point cloud with each image
    #[arg(short, long)]
    point_cloud: bool,

    /// Emit one JSON object per capture on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = TangoConfig::load_with_sources_from(cli.config.as_deref())
        .context("loading tangocam configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.telemetry.log_level))
        .with_writer(std::io::stderr)
        .init();

    info!("tangocam {} starting", env!("CARGO_PKG_VERSION"));
    for path in &sources.files {
        info!("Loaded config from {}", path.display());
    }
    for var in &sources.env_overrides {
        info!("Applied override from {}", var);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = Arc::new(ChannelSink::new(tx));
    let service = Arc::new(SimulatedService::new(config.simulation.clone()));
    let coordinator = Arc::new(CaptureCoordinator::new(
        config.capture.clone(),
        service.clone(),
        sink.clone(),
    ));

    coordinator
        .connect()
        .context("connecting to simulated sensing service")?;

    for intrinsics in coordinator.all_intrinsics() {
        info!(
            "{:?} camera {}x{} hfov {:.1}° vfov {:.1}°",
            intrinsics.camera,
            intrinsics.width,
            intrinsics.height,
            intrinsics.horizontal_fov().to_degrees(),
            intrinsics.vertical_fov().to_degrees()
        );
    }

    let waiter = coordinator.clone();
    let tracking = tokio::task::spawn_blocking(move || waiter.wait_for_valid_pose())
        .await
        .context("pose wait task panicked")?;
    if !tracking {
        warn!("Motion tracking not ready; captures may use fallback poses");
    }

    let frames = {
        let coordinator = coordinator.clone();
        let service = service.clone();
        let period = Duration::from_millis(config.simulation.frame_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                coordinator.on_image(&service.image());
                coordinator.on_frame_tick();
            }
        })
    };

    let clouds = {
        let coordinator = coordinator.clone();
        let service = service.clone();
        let period = Duration::from_millis(config.simulation.point_cloud_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                coordinator.on_point_cloud(&service.point_cloud());
            }
        })
    };

    let mut builder = ReportBuilder::default();
    let mut completed = 0usize;
    let mut timed_out = 0usize;
    let mut index = 0usize;

    if cli.captures > 0 {
        service.arm_capture();
        coordinator.start_capture(cli.point_cloud);
    }
    let mut started = Instant::now();

    while index < cli.captures {
        let Some(event) = rx.recv().await else {
            break;
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let Some(report) = builder.record(index, elapsed_ms, event) else {
            continue;
        };

        match report.outcome {
            Outcome::Completed => completed += 1,
            Outcome::TimedOut => timed_out += 1,
        }

        if cli.json {
            println!(
                "{}",
                serde_json::to_string(&report).context("serializing capture report")?
            );
        } else {
            info!(
                "Capture {}: {:?} in {}ms{}",
                report.index,
                report.outcome,
                report.elapsed_ms,
                report
                    .error
                    .as_deref()
                    .map(|e| format!(" ({})", e))
                    .unwrap_or_default()
            );
        }

        index += 1;
        if index < cli.captures {
            service.arm_capture();
            if !coordinator.start_capture(cli.point_cloud) {
                warn!("Capture {} could not be started; stopping", index);
                break;
            }
            started = Instant::now();
        }
    }

    frames.abort();
    clouds.abort();
    coordinator.disconnect();

    info!(
        "Done: {} completed, {} timed out, {} redraws",
        completed,
        timed_out,
        sink.redraws()
    );
    Ok(())
}
