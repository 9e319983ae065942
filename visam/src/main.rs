//! Incremental visual SLAM over a dataset directory.
//!
//! Processes every frame in id order against a nonlinear incremental
//! estimator and prints the estimate after each one.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use visam::{load_dataset, Driver, NonlinearIsam, RunConfig, RunContext};

/// Incremental visual SLAM
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding calib.txt, landmarks.txt, poses.txt and measurements.txt
    data_dir: PathBuf,

    /// JSON run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Relinearize after this many updates (overrides the config file)
    #[arg(long)]
    relinearize_interval: Option<usize>,

    /// Pixel sigma of measurements (overrides the config file)
    #[arg(long)]
    measurement_sigma: Option<f64>,

    /// Only print the final estimate
    #[arg(long, short)]
    quiet: bool,

    /// Log filter, e.g. "debug" or "visam=trace" (default: RUST_LOG, then info)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logger(level: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(buf, "[{}] {} - {}", record.level(), record.target(), record.args())
        })
        .init();
}

fn resolve_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(interval) = args.relinearize_interval {
        config.estimator.relinearize_interval = interval;
    }
    if let Some(sigma) = args.measurement_sigma {
        config.noise.measurement_sigma = sigma;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.log_level.as_deref());

    let config = resolve_config(&args).context("invalid configuration")?;
    let dataset = load_dataset(&args.data_dir)
        .with_context(|| format!("failed to load dataset from {}", args.data_dir.display()))?;
    let context = RunContext::from_config(dataset, &config)?;
    let estimator = NonlinearIsam::new(config.estimator.relinearize_interval)?;

    log::info!(
        "running {} frames, relinearize every {} updates",
        context.dataset.frame_count(),
        config.estimator.relinearize_interval
    );

    let mut driver = Driver::new(&context, estimator);
    let summary = driver
        .run(|report| {
            if !args.quiet {
                println!("----------------------------------------");
                println!("Frame {}", report.frame.0);
                println!("Current estimate:");
                print!("{}", report.estimate);
            }
        })
        .context("run aborted")?;

    if args.quiet {
        println!("Current estimate:");
        print!("{}", driver.estimate());
    }

    let isam = driver.estimator();
    println!(
        "Processed {} frames, {} measurements, {} landmarks; {} relinearizations; final error {:.6}",
        summary.frames,
        summary.measurements,
        summary.landmarks,
        isam.relinearization_count(),
        isam.total_error()?
    );
    Ok(())
}
