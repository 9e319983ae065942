//! Run configuration, optionally loaded from a JSON file.

use crate::noise::{NoiseConfig, NoiseError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("relinearize_interval must be at least 1")]
    ZeroInterval,
    #[error(transparent)]
    Noise(#[from] NoiseError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorSettings {
    /// Relinearize and reorder after this many accepted updates.
    pub relinearize_interval: usize,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            relinearize_interval: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseSettings {
    /// Pixel sigma of projection measurements.
    pub measurement_sigma: f64,
    /// Sigma of the gauge anchor; unit noise when absent.
    pub pose_prior_sigma: Option<f64>,
    /// Sigma of each landmark anchor; unit noise when absent.
    pub landmark_prior_sigma: Option<f64>,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            measurement_sigma: 5.0,
            pose_prior_sigma: None,
            landmark_prior_sigma: None,
        }
    }
}

impl NoiseSettings {
    pub fn build(&self) -> Result<NoiseConfig, NoiseError> {
        NoiseConfig::new(
            self.measurement_sigma,
            self.pose_prior_sigma,
            self.landmark_prior_sigma,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub estimator: EstimatorSettings,
    pub noise: NoiseSettings,
}

impl RunConfig {
    pub fn from_json_str(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(path, &text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.estimator.relinearize_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        self.noise.build()?;
        Ok(())
    }
}
