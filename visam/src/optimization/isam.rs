//! Incremental nonlinear estimator with periodic relinearization.
//!
//! Factors are linearized once, at the linearization point in force when
//! they arrive, and the accumulated linear system is re-solved after every
//! update. Every `relinearize_interval` updates the current estimate becomes
//! the new linearization point, variables are reordered and every factor is
//! linearized again.

use super::{EstimatorError, Factor, IncrementalAddition, LinearFactor, Result};
use crate::keys::Key;
use crate::values::{Estimate, Value, Values};
use nalgebra::DVector;
use std::collections::{BTreeSet, HashMap};
use visam_solver::{SolveError, SparseLeastSquares};

/// An estimator that accepts one incremental addition at a time.
pub trait IncrementalEstimator {
    /// Apply an addition atomically: either it is accepted in full or the
    /// estimator is left exactly as it was.
    fn update(&mut self, addition: IncrementalAddition) -> Result<()>;

    /// Snapshot of the current best estimate.
    fn estimate(&self) -> Estimate;
}

/// Column layout of the linear system.
#[derive(Debug, Clone, Default)]
struct VariableOrdering {
    keys: Vec<Key>,
    offsets: HashMap<Key, usize>,
    dim: usize,
}

impl VariableOrdering {
    fn from_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        let mut ordering = Self::default();
        for key in keys {
            ordering.push(key);
        }
        ordering
    }

    fn push(&mut self, key: Key) {
        if self.offsets.contains_key(&key) {
            return;
        }
        self.offsets.insert(key, self.dim);
        self.keys.push(key);
        self.dim += key.dim();
    }

    fn offset(&self, key: Key) -> Option<usize> {
        self.offsets.get(&key).copied()
    }

    fn key_at_column(&self, column: usize) -> Option<Key> {
        self.keys
            .iter()
            .copied()
            .find(|&k| self.offsets[&k] <= column && column < self.offsets[&k] + k.dim())
    }
}

/// Landmarks first, then poses, each by id.
fn elimination_order(keys: &BTreeSet<Key>) -> VariableOrdering {
    let landmarks = keys.iter().copied().filter(|k| !k.is_pose());
    let poses = keys.iter().copied().filter(|k| k.is_pose());
    VariableOrdering::from_keys(landmarks.chain(poses))
}

fn solve(ordering: &VariableOrdering, linear: &[LinearFactor]) -> Result<DVector<f64>> {
    let mut system = SparseLeastSquares::new(ordering.dim);
    for factor in linear {
        for row in 0..factor.rows() {
            let mut entries = Vec::new();
            for (key, block) in &factor.blocks {
                let offset = ordering
                    .offset(*key)
                    .ok_or(EstimatorError::MissingVariable(*key))?;
                entries.extend((0..block.ncols()).map(|c| (offset + c, block[(row, c)])));
            }
            system.push_row(entries, factor.rhs[row])?;
        }
    }

    system.solve().map_err(|e| match e {
        SolveError::Underdetermined { column } => match ordering.key_at_column(column) {
            Some(key) => EstimatorError::Underdetermined(key),
            None => EstimatorError::Solve(e),
        },
        other => EstimatorError::Solve(other),
    })
}

/// `values ⊕ delta` for every variable in the ordering.
fn retract(values: &Values, ordering: &VariableOrdering, delta: &DVector<f64>) -> Values {
    let mut out = values.clone();
    for &key in &ordering.keys {
        let offset = ordering.offsets[&key];
        if let Some(value) = out.get_mut(key) {
            match value {
                Value::Pose(pose) => {
                    let d: [f64; 6] = std::array::from_fn(|i| delta[offset + i]);
                    *pose = pose.retract(&d);
                }
                Value::Point(p) => {
                    p.x += delta[offset];
                    p.y += delta[offset + 1];
                    p.z += delta[offset + 2];
                }
            }
        }
    }
    out
}

/// Incremental smoother in the style of a nonlinear iSAM.
#[derive(Debug, Clone)]
pub struct NonlinearIsam {
    relinearize_interval: usize,
    updates_since_relinearization: usize,
    relinearization_count: usize,
    update_count: usize,
    factors: Vec<Factor>,
    linear_factors: Vec<LinearFactor>,
    linearization_point: Values,
    ordering: VariableOrdering,
    estimate: Estimate,
}

impl NonlinearIsam {
    pub fn new(relinearize_interval: usize) -> Result<Self> {
        if relinearize_interval == 0 {
            return Err(EstimatorError::InvalidInterval);
        }
        Ok(Self {
            relinearize_interval,
            updates_since_relinearization: 0,
            relinearization_count: 0,
            update_count: 0,
            factors: Vec::new(),
            linear_factors: Vec::new(),
            linearization_point: Values::new(),
            ordering: VariableOrdering::default(),
            estimate: Estimate::default(),
        })
    }

    pub fn relinearize_interval(&self) -> usize {
        self.relinearize_interval
    }

    /// Number of relinearization passes performed so far.
    pub fn relinearization_count(&self) -> usize {
        self.relinearization_count
    }

    /// Number of accepted updates.
    pub fn update_count(&self) -> usize {
        self.update_count
    }

    pub fn factor_count(&self) -> usize {
        self.factors.len()
    }

    pub fn linearization_point(&self) -> &Values {
        &self.linearization_point
    }

    /// Whitened nonlinear error `Σ 0.5 |r|²` of every factor at the current estimate.
    pub fn total_error(&self) -> Result<f64> {
        self.factors
            .iter()
            .map(|f| f.error(self.estimate.values()))
            .sum()
    }

    fn validate(&self, addition: &IncrementalAddition) -> Result<()> {
        for key in addition.initial_values.keys() {
            if self.linearization_point.contains(key) {
                return Err(EstimatorError::DuplicateVariable(key));
            }
        }
        for factor in &addition.constraints {
            for key in factor.keys() {
                if !self.linearization_point.contains(key)
                    && !addition.initial_values.contains(key)
                {
                    return Err(EstimatorError::MissingVariable(key));
                }
            }
        }
        Ok(())
    }

    /// Replace the linear state in one step.
    fn commit(&mut self, state: LinearState) {
        self.linearization_point = state.point;
        self.ordering = state.ordering;
        self.linear_factors = state.linear;
        self.estimate = Estimate::new(state.estimate);
    }
}

/// Linearization point, column layout, linear factors and the solution on
/// top of them. Built on the side and committed only once complete.
struct LinearState {
    point: Values,
    ordering: VariableOrdering,
    linear: Vec<LinearFactor>,
    estimate: Values,
}

/// Relinearize `factors` around `point`, reorder and re-solve.
fn relinearize<'f>(
    factors: impl Iterator<Item = &'f Factor> + Clone,
    point: Values,
) -> Result<LinearState> {
    let constrained: BTreeSet<Key> = factors.clone().flat_map(|f| f.keys()).collect();
    let ordering = elimination_order(&constrained);
    let linear = factors
        .map(|f| f.linearize(&point))
        .collect::<Result<Vec<_>>>()?;
    let delta = solve(&ordering, &linear)?;
    let estimate = retract(&point, &ordering, &delta);
    Ok(LinearState {
        point,
        ordering,
        linear,
        estimate,
    })
}

impl IncrementalEstimator for NonlinearIsam {
    fn update(&mut self, addition: IncrementalAddition) -> Result<()> {
        self.validate(&addition)?;
        let IncrementalAddition {
            constraints,
            initial_values,
        } = addition;

        let mut point = self.linearization_point.clone();
        point.extend(initial_values);

        // Variables enter the system once a constraint touches them; until
        // then they are held at their initial value.
        let mut ordering = self.ordering.clone();
        for factor in &constraints {
            for key in factor.keys() {
                ordering.push(key);
            }
        }

        let new_linear = constraints
            .iter()
            .map(|f| f.linearize(&point))
            .collect::<Result<Vec<_>>>()?;
        let mut linear = self.linear_factors.clone();
        linear.extend(new_linear);

        let delta = solve(&ordering, &linear)?;
        let estimate = retract(&point, &ordering, &delta);

        log::debug!(
            "update {}: +{} factors, {} rows, {} columns",
            self.update_count + 1,
            constraints.len(),
            linear.iter().map(LinearFactor::rows).sum::<usize>(),
            ordering.dim
        );

        let mut state = LinearState {
            point,
            ordering,
            linear,
            estimate,
        };
        let due = self.updates_since_relinearization + 1 == self.relinearize_interval;
        if due {
            let all = self.factors.iter().chain(constraints.iter());
            state = relinearize(all, state.estimate)?;
        }

        self.commit(state);
        self.factors.extend(constraints);
        self.update_count += 1;
        if due {
            self.updates_since_relinearization = 0;
            self.relinearization_count += 1;
            log::info!(
                "relinearized {} factors over {} variables (pass {})",
                self.factors.len(),
                self.ordering.keys.len(),
                self.relinearization_count
            );
        } else {
            self.updates_since_relinearization += 1;
        }
        Ok(())
    }

    fn estimate(&self) -> Estimate {
        self.estimate.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{LandmarkId, PoseId};
    use crate::math::Pose3;
    use crate::noise::NoiseModel;
    use crate::optimization::{LandmarkPriorFactor, PosePriorFactor};
    use std::sync::Arc;
    use visam_solver::math3d::Vec3;

    fn anchored_pose() -> IncrementalAddition {
        let mut initial_values = Values::new();
        initial_values.insert_pose(PoseId(0), Pose3::identity());
        IncrementalAddition {
            constraints: vec![Factor::PosePrior(PosePriorFactor {
                pose: PoseId(0),
                prior: Pose3::identity(),
                noise: Arc::new(NoiseModel::Unit { dim: 6 }),
            })],
            initial_values,
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert_eq!(NonlinearIsam::new(0).unwrap_err(), EstimatorError::InvalidInterval);
    }

    #[test]
    fn duplicate_initial_value_leaves_state_untouched() {
        let mut isam = NonlinearIsam::new(3).unwrap();
        isam.update(anchored_pose()).unwrap();
        let before = isam.estimate();

        let err = isam.update(anchored_pose()).unwrap_err();
        assert_eq!(err, EstimatorError::DuplicateVariable(Key::Pose(PoseId(0))));
        assert_eq!(isam.estimate(), before);
        assert_eq!(isam.update_count(), 1);
    }

    #[test]
    fn constraint_on_unknown_variable_is_rejected() {
        let mut isam = NonlinearIsam::new(3).unwrap();
        let addition = IncrementalAddition {
            constraints: vec![Factor::LandmarkPrior(LandmarkPriorFactor {
                landmark: LandmarkId(4),
                prior: Vec3::zero(),
                noise: Arc::new(NoiseModel::Unit { dim: 3 }),
            })],
            initial_values: Values::new(),
        };
        assert_eq!(
            isam.update(addition),
            Err(EstimatorError::MissingVariable(Key::Landmark(LandmarkId(4))))
        );
        assert!(isam.estimate().is_empty());
    }

    #[test]
    fn unconstrained_variable_keeps_its_initial_value() {
        let mut isam = NonlinearIsam::new(3).unwrap();
        isam.update(anchored_pose()).unwrap();

        let far = Pose3::from_rotation_translation(
            crate::math::SO3::identity(),
            Vec3::new(3.0, 0.0, 0.0),
        );
        let mut initial_values = Values::new();
        initial_values.insert_pose(PoseId(1), far);
        isam.update(IncrementalAddition {
            constraints: vec![],
            initial_values,
        })
        .unwrap();

        assert_eq!(isam.estimate().pose(PoseId(1)), Some(&far));
    }

    #[test]
    fn relinearizes_every_interval_updates() {
        let mut isam = NonlinearIsam::new(2).unwrap();
        isam.update(anchored_pose()).unwrap();
        for id in 1..5 {
            let mut initial_values = Values::new();
            initial_values.insert_point(LandmarkId(id), Vec3::new(id as f64, 0.0, 1.0));
            isam.update(IncrementalAddition {
                constraints: vec![Factor::LandmarkPrior(LandmarkPriorFactor {
                    landmark: LandmarkId(id),
                    prior: Vec3::new(id as f64, 0.0, 1.0),
                    noise: Arc::new(NoiseModel::Unit { dim: 3 }),
                })],
                initial_values,
            })
            .unwrap();
        }
        assert_eq!(isam.update_count(), 5);
        assert_eq!(isam.relinearization_count(), 2);
        assert!(isam.total_error().unwrap() < 1e-20);
    }

    #[test]
    fn failed_relinearization_rolls_back_the_whole_update() {
        let mut isam = NonlinearIsam::new(2).unwrap();
        let mut first = anchored_pose();
        first
            .initial_values
            .insert_point(LandmarkId(1), Vec3::new(0.5, 0.0, 1.0));
        first.constraints.push(Factor::LandmarkPrior(LandmarkPriorFactor {
            landmark: LandmarkId(1),
            prior: Vec3::new(0.5, 0.0, 1.0),
            noise: Arc::new(NoiseModel::Unit { dim: 3 }),
        }));
        isam.update(first).unwrap();
        let before = isam.estimate();
        let linearization_point = isam.linearization_point().clone();

        // A pixel far off to the right drags the landmark behind the
        // tightly held second camera once the step is taken.
        let mut initial_values = Values::new();
        initial_values.insert_pose(PoseId(1), Pose3::identity());
        let second = IncrementalAddition {
            constraints: vec![
                Factor::PosePrior(PosePriorFactor {
                    pose: PoseId(1),
                    prior: Pose3::identity(),
                    noise: Arc::new(NoiseModel::Isotropic { dim: 6, sigma: 1e-4 }),
                }),
                Factor::Projection(crate::optimization::ProjectionFactor {
                    pose: PoseId(1),
                    landmark: LandmarkId(1),
                    measured: crate::geometry::Pixel::new(2000.0, 240.0),
                    noise: Arc::new(NoiseModel::Unit { dim: 2 }),
                    calibration: Arc::new(crate::camera::Calibration::simple(500.0, 640.0, 480.0)),
                }),
            ],
            initial_values,
        };

        assert_eq!(
            isam.update(second),
            Err(EstimatorError::Cheirality {
                pose: PoseId(1),
                landmark: LandmarkId(1)
            })
        );
        assert_eq!(isam.estimate(), before);
        assert_eq!(isam.linearization_point(), &linearization_point);
        assert_eq!(isam.update_count(), 1);
        assert_eq!(isam.factor_count(), 2);
        assert_eq!(isam.relinearization_count(), 0);

        // The rolled back estimator still takes well-formed updates and
        // relinearizes on schedule.
        let mut initial_values = Values::new();
        initial_values.insert_point(LandmarkId(2), Vec3::new(0.0, 0.0, 2.0));
        isam.update(IncrementalAddition {
            constraints: vec![Factor::LandmarkPrior(LandmarkPriorFactor {
                landmark: LandmarkId(2),
                prior: Vec3::new(0.0, 0.0, 2.0),
                noise: Arc::new(NoiseModel::Unit { dim: 3 }),
            })],
            initial_values,
        })
        .unwrap();
        assert_eq!(isam.update_count(), 2);
        assert_eq!(isam.relinearization_count(), 1);
    }

    #[test]
    fn unobservable_direction_is_underdetermined() {
        // One view on the optical axis and no priors: nothing constrains depth.
        let mut isam = NonlinearIsam::new(3).unwrap();
        let mut initial_values = Values::new();
        initial_values.insert_pose(PoseId(0), Pose3::identity());
        initial_values.insert_point(LandmarkId(1), Vec3::new(0.0, 0.0, 5.0));
        let addition = IncrementalAddition {
            constraints: vec![Factor::Projection(crate::optimization::ProjectionFactor {
                pose: PoseId(0),
                landmark: LandmarkId(1),
                measured: crate::geometry::Pixel::new(320.0, 240.0),
                noise: Arc::new(NoiseModel::Unit { dim: 2 }),
                calibration: Arc::new(crate::camera::Calibration::simple(500.0, 640.0, 480.0)),
            })],
            initial_values,
        };

        let err = isam.update(addition).unwrap_err();
        assert!(matches!(
            err,
            EstimatorError::Underdetermined(_) | EstimatorError::Solve(_)
        ));
        assert!(isam.estimate().is_empty());
    }
}
