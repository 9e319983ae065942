//! Immutable per-run context.

use crate::camera::SharedCalibration;
use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::noise::{NoiseConfig, NoiseError};

/// Everything a frame update reads besides the estimate: the ground-truth
/// tables, the shared calibration and the noise handles.
///
/// Built once before the first frame and borrowed for the whole run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub dataset: Dataset,
    pub calibration: SharedCalibration,
    pub noise: NoiseConfig,
}

impl RunContext {
    pub fn new(dataset: Dataset, noise: NoiseConfig) -> Self {
        let calibration = dataset.shared_calibration();
        Self {
            dataset,
            calibration,
            noise,
        }
    }

    pub fn from_config(dataset: Dataset, config: &RunConfig) -> Result<Self, NoiseError> {
        Ok(Self::new(dataset, config.noise.build()?))
    }
}
