//! Synthetic orbit demo
//!
//! Generates a cloud of landmarks and a camera arc around it, runs the
//! incremental estimator frame by frame and reports the error against
//! ground truth. Pass `--out DIR` to also write the scene in the text
//! format the `visam` binary reads.

use clap::Parser;
use std::path::PathBuf;
use visam::simulation::{synthetic_dataset, SceneConfig};
use visam::{write_dataset, Driver, NoiseConfig, NonlinearIsam, RunContext};

/// Incremental SLAM on a synthetic orbit
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Pixel noise stddev added to measurements
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    #[arg(long, default_value_t = 7)]
    frames: usize,

    #[arg(long, default_value_t = 60)]
    landmarks: usize,

    #[arg(long, default_value_t = 3)]
    relinearize_interval: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write the generated dataset here
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let scene = SceneConfig {
        n_landmarks: args.landmarks,
        n_frames: args.frames,
        pixel_noise: args.noise,
        seed: args.seed,
        ..SceneConfig::default()
    };
    let dataset = synthetic_dataset(&scene);
    println!(
        "Scene: {} landmarks, {} frames, {} measurements (noise {} px)",
        dataset.landmarks.len(),
        dataset.frame_count(),
        dataset.measurement_count(),
        args.noise
    );

    if let Some(dir) = &args.out {
        write_dataset(dir, &dataset)?;
        println!("Wrote dataset to {}", dir.display());
    }

    let context = RunContext::new(dataset, NoiseConfig::default());
    let mut driver = Driver::new(&context, NonlinearIsam::new(args.relinearize_interval)?);
    driver.run(|report| {
        let truth = &context.dataset.poses[&report.frame];
        let translation = report
            .estimate
            .pose(report.frame)
            .map(|p| (p.translation - truth.translation).norm())
            .unwrap_or(f64::NAN);
        println!(
            "frame {:>3}: {:>3} measurements, {:>3} new landmarks, {:>4} variables, pose error {:.2e} m",
            report.frame.0,
            report.measurements,
            report.new_landmarks,
            report.estimate.len(),
            translation
        );
    })?;

    let isam = driver.estimator();
    println!(
        "\n{} relinearizations, final error {:.6}",
        isam.relinearization_count(),
        isam.total_error()?
    );
    Ok(())
}
