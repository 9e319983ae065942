//! Constraints, their linearization, and the incremental estimator
//!
//! This module provides the factor types produced per frame, the
//! `IncrementalAddition` that carries them to an estimator, and the
//! `NonlinearIsam` estimator itself.

use crate::keys::{Key, LandmarkId, PoseId};
use crate::values::Values;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use visam_solver::{Jet, SolveError};

pub mod factors;
pub mod isam;

pub use factors::{Factor, LandmarkPriorFactor, PosePriorFactor, ProjectionFactor};
pub use isam::{IncrementalEstimator, NonlinearIsam};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("initial value for {0} was already provided")]
    DuplicateVariable(Key),

    #[error("a constraint references {0}, which has no value")]
    MissingVariable(Key),

    #[error("landmark {landmark} is not in front of camera {pose}")]
    Cheirality { pose: PoseId, landmark: LandmarkId },

    #[error("{0} is not sufficiently constrained")]
    Underdetermined(Key),

    #[error("relinearization interval must be positive")]
    InvalidInterval,

    #[error(transparent)]
    Solve(#[from] SolveError),
}

pub type Result<T> = std::result::Result<T, EstimatorError>;

/// New constraints and new initial values contributed by one frame.
///
/// Handed to an estimator exactly once, then dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementalAddition {
    pub constraints: Vec<Factor>,
    pub initial_values: Values,
}

impl IncrementalAddition {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.initial_values.is_empty()
    }

    pub fn projections(&self) -> impl Iterator<Item = &ProjectionFactor> + '_ {
        self.constraints.iter().filter_map(|f| match f {
            Factor::Projection(p) => Some(p),
            _ => None,
        })
    }

    pub fn pose_priors(&self) -> impl Iterator<Item = &PosePriorFactor> + '_ {
        self.constraints.iter().filter_map(|f| match f {
            Factor::PosePrior(p) => Some(p),
            _ => None,
        })
    }

    pub fn landmark_priors(&self) -> impl Iterator<Item = &LandmarkPriorFactor> + '_ {
        self.constraints.iter().filter_map(|f| match f {
            Factor::LandmarkPrior(p) => Some(p),
            _ => None,
        })
    }
}

/// Whitened Gaussian factor `Σ A_k δ_k = b` produced by linearization.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFactor {
    pub blocks: Vec<(Key, DMatrix<f64>)>,
    pub rhs: DVector<f64>,
}

impl LinearFactor {
    pub fn rows(&self) -> usize {
        self.rhs.len()
    }

    /// `0.5 * |b|²`, the whitened error at the linearization point.
    pub fn error(&self) -> f64 {
        0.5 * self.rhs.norm_squared()
    }
}

/// Convert an f64 array to constant jets (no derivatives)
pub(crate) fn jet_constants<const N: usize, const D: usize>(arr: &[f64; N]) -> [Jet<f64, D>; N] {
    std::array::from_fn(|i| Jet::constant(arr[i]))
}

/// Variable jets with derivative indices starting at `deriv_offset`.
pub(crate) fn jet_variables<const N: usize, const D: usize>(
    arr: &[f64; N],
    deriv_offset: usize,
) -> [Jet<f64, D>; N] {
    std::array::from_fn(|i| Jet::variable(arr[i], deriv_offset + i))
}
