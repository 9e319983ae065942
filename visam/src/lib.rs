//! visam: incremental visual SLAM
//!
//! Frames of monocular landmark observations are folded one at a time into
//! a nonlinear incremental estimator. Each frame contributes its projection
//! constraints, its pose, and the landmarks it sees for the first time; the
//! first frame also anchors the gauge.

pub mod builder;
pub mod camera;
pub mod config;
pub mod context;
pub mod dataset;
pub mod driver;
pub mod geometry;
pub mod io;
pub mod keys;
pub mod math;
pub mod noise;
pub mod optimization;
pub mod simulation;
pub mod values;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use builder::{BuildError, FrameUpdateBuilder};
pub use camera::{Calibration, CameraModel, SharedCalibration};
pub use config::{ConfigError, RunConfig};
pub use context::RunContext;
pub use dataset::Dataset;
pub use driver::{Driver, FrameReport, RunError, RunSummary};
pub use geometry::{Measurement, Pixel};
pub use io::{load_dataset, write_dataset, InputError};
pub use keys::{FrameId, Key, LandmarkId, PoseId};
pub use math::{Point3, Pose3, SE3, SO3};
pub use noise::{NoiseConfig, NoiseModel, SharedNoiseModel};
pub use optimization::{
    EstimatorError, Factor, IncrementalAddition, IncrementalEstimator, NonlinearIsam,
};
pub use values::{Estimate, Value, Values};
pub use visam_solver::{Jet, Real};
