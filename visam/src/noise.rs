//! Gaussian noise models and the per-run noise handles.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoiseError {
    #[error("noise sigma must be positive and finite, got {0}")]
    InvalidSigma(f64),
    #[error("noise model dimension must be non-zero")]
    ZeroDimension,
}

/// Diagonal Gaussian noise with identical sigma on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseModel {
    Isotropic { dim: usize, sigma: f64 },
    /// Identity covariance.
    Unit { dim: usize },
}

/// Noise models are shared by reference across many constraints.
pub type SharedNoiseModel = Arc<NoiseModel>;

impl NoiseModel {
    pub fn isotropic(dim: usize, sigma: f64) -> Result<Self, NoiseError> {
        if dim == 0 {
            return Err(NoiseError::ZeroDimension);
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(NoiseError::InvalidSigma(sigma));
        }
        Ok(Self::Isotropic { dim, sigma })
    }

    pub fn unit(dim: usize) -> Result<Self, NoiseError> {
        if dim == 0 {
            return Err(NoiseError::ZeroDimension);
        }
        Ok(Self::Unit { dim })
    }

    /// `None` selects unit noise.
    pub fn from_sigma(dim: usize, sigma: Option<f64>) -> Result<Self, NoiseError> {
        match sigma {
            Some(s) => Self::isotropic(dim, s),
            None => Self::unit(dim),
        }
    }

    pub fn dim(&self) -> usize {
        match *self {
            Self::Isotropic { dim, .. } | Self::Unit { dim } => dim,
        }
    }

    pub fn sigma(&self) -> f64 {
        match *self {
            Self::Isotropic { sigma, .. } => sigma,
            Self::Unit { .. } => 1.0,
        }
    }

    /// Scale factor applied to residual rows and Jacobian rows.
    pub fn whitening_scale(&self) -> f64 {
        1.0 / self.sigma()
    }

    pub fn whiten(&self, residual: &mut [f64]) {
        let s = self.whitening_scale();
        for r in residual.iter_mut() {
            *r *= s;
        }
    }
}

impl fmt::Display for NoiseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isotropic { dim, sigma } => write!(f, "isotropic dim={} sigma={}", dim, sigma),
            Self::Unit { dim } => write!(f, "unit dim={}", dim),
        }
    }
}

/// The three noise handles threaded through every frame update.
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    /// 2D pixel noise on projection constraints.
    pub measurement: SharedNoiseModel,
    /// 6D noise on the single gauge anchor.
    pub pose_prior: SharedNoiseModel,
    /// 3D noise on each landmark's first-seen anchor.
    pub landmark_prior: SharedNoiseModel,
}

impl NoiseConfig {
    pub fn new(
        measurement_sigma: f64,
        pose_prior_sigma: Option<f64>,
        landmark_prior_sigma: Option<f64>,
    ) -> Result<Self, NoiseError> {
        Ok(Self {
            measurement: Arc::new(NoiseModel::isotropic(2, measurement_sigma)?),
            pose_prior: Arc::new(NoiseModel::from_sigma(6, pose_prior_sigma)?),
            landmark_prior: Arc::new(NoiseModel::from_sigma(3, landmark_prior_sigma)?),
        })
    }
}

impl Default for NoiseConfig {
    /// 5 px measurement noise, unit anchors.
    fn default() -> Self {
        Self {
            measurement: Arc::new(NoiseModel::Isotropic { dim: 2, sigma: 5.0 }),
            pose_prior: Arc::new(NoiseModel::Unit { dim: 6 }),
            landmark_prior: Arc::new(NoiseModel::Unit { dim: 3 }),
        }
    }
}
