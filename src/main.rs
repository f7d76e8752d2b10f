use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use rgbd_pointcloud_rs::logger;
use rgbd_pointcloud_rs::sensor_pipeline::{
    Dataset, FrameSource, MultiCameraPlayback, PointBuffer, ProjectionConfig, ProjectionStrategy,
    Projector, SessionConfig, StrategyPreference, StreamPairHandle, SyncTolerance,
    open_stream_pair,
};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Auto,
    Sequential,
    Parallel,
    Cuda,
}

impl From<StrategyArg> for StrategyPreference {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Auto => StrategyPreference::Auto,
            StrategyArg::Sequential => StrategyPreference::Fixed(ProjectionStrategy::Sequential),
            StrategyArg::Parallel => StrategyPreference::Fixed(ProjectionStrategy::Parallel),
            StrategyArg::Cuda => StrategyPreference::Fixed(ProjectionStrategy::Cuda),
        }
    }
}

/// Projects recorded RGB-D frames into colored point clouds.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Dataset directory holding calibration.json and one folder per camera
    dataset: PathBuf,

    /// Only process this camera serial
    #[arg(long)]
    camera: Option<String>,

    /// Synchronized frame index to project
    #[arg(long, default_value_t = 0, conflicts_with = "timestamp")]
    frame: u64,

    /// Project the first frame at or after this timestamp (ns)
    #[arg(long)]
    timestamp: Option<u64>,

    #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
    strategy: StrategyArg,

    /// Fixed synchronization tolerance in ns instead of a quarter frame period
    #[arg(long)]
    tolerance_ns: Option<u64>,

    #[arg(long, default_value_t = 5)]
    black_threshold: u8,

    /// Sample color images bottom-up
    #[arg(long)]
    flip_color_rows: bool,

    /// Keep color blobs compressed until projection
    #[arg(long)]
    defer_color_decode: bool,

    /// Also project with the sequential and parallel strategies and compare
    #[arg(long)]
    compare: bool,

    /// Step all cameras together for this many frames instead of a single seek
    #[arg(long)]
    playback: Option<usize>,
}

fn session_config(args: &Args) -> SessionConfig {
    let projection = ProjectionConfig::builder()
        .black_threshold(args.black_threshold)
        .flip_color_rows(args.flip_color_rows)
        .build();
    let mut builder = SessionConfig::builder()
        .strategy(args.strategy.into())
        .defer_color_decode(args.defer_color_decode)
        .projection(projection);
    if let Some(ns) = args.tolerance_ns {
        builder = builder.tolerance(SyncTolerance::Fixed(ns));
    }
    builder.build()
}

fn sorted_positions(buffer: &PointBuffer) -> Vec<[u32; 3]> {
    let mut positions: Vec<[u32; 3]> = buffer
        .points
        .iter()
        .map(|p| p.position.to_array().map(f32::to_bits))
        .collect();
    positions.sort_unstable();
    positions
}

fn compare_strategies(
    handle: &mut StreamPairHandle,
    config: &ProjectionConfig,
) -> anyhow::Result<()> {
    let mut results = Vec::new();
    for strategy in [ProjectionStrategy::Sequential, ProjectionStrategy::Parallel] {
        let projector = Projector::for_strategy(strategy, config.clone())?;
        let start = Instant::now();
        let buffer = handle.project_current_frame_with(&projector)?.clone();
        info!(
            "{:>10}: {} points in {:.3}ms",
            strategy,
            buffer.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        results.push(buffer);
    }
    if sorted_positions(&results[0]) == sorted_positions(&results[1]) {
        info!("Sequential and parallel projections match");
        Ok(())
    } else {
        bail!("sequential and parallel projections differ")
    }
}

fn run_single(args: &Args, dataset: &Dataset, config: &SessionConfig) -> anyhow::Result<()> {
    let mut projected = 0;
    for paths in dataset.cameras() {
        if args.camera.as_ref().is_some_and(|c| *c != paths.serial) {
            continue;
        }
        let mut handle = match open_stream_pair(paths, dataset.calibration(), config) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Skipping camera {}: {}", paths.serial, e);
                continue;
            }
        };

        let achieved = match args.timestamp {
            Some(ts) => handle.seek_to_timestamp(ts)?,
            None => handle.seek_to_frame(args.frame)?,
        };
        if achieved.is_none() {
            warn!("Camera {} has no frame at the requested position", paths.serial);
            handle.close();
            continue;
        }

        let (frame, timestamp, points, rejected) = {
            let buffer = handle.project_current_frame()?;
            (buffer.frame_index, buffer.timestamp, buffer.len(), buffer.stats.rejected())
        };
        info!(
            "Camera {} frame {} @ {}ns: {} points ({} rejected) via {}",
            paths.serial,
            frame,
            timestamp,
            points,
            rejected,
            handle.processing_kind()
        );
        info!("Timings: {}", handle.timings().summary());

        if args.compare {
            compare_strategies(&mut handle, &config.projection)?;
        }
        projected += 1;
        handle.close();
    }

    if projected == 0 {
        bail!("no camera produced a frame");
    }
    Ok(())
}

fn run_playback(steps: usize, dataset: &Dataset, config: &SessionConfig) -> anyhow::Result<()> {
    let mut playback = MultiCameraPlayback::open(dataset, config)?;
    for step in 0..steps {
        let Some(timestamp) = playback.step()? else {
            info!("Playback reached the end after {} steps", step);
            break;
        };
        let points = playback.project_all()?;
        info!(
            "Step {} @ {}ns: {} points across {} cameras (leader {:?})",
            step,
            timestamp,
            points,
            playback.camera_count(),
            playback.leading_camera()
        );
    }
    playback.close();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    info!("Starting rgbd_pointcloud...");

    let dataset = Dataset::discover(&args.dataset)
        .with_context(|| format!("loading dataset {}", args.dataset.display()))?;
    let config = session_config(&args);

    match args.playback {
        Some(steps) => run_playback(steps, &dataset, &config),
        None => run_single(&args, &dataset, &config),
    }
}
