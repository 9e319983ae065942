//! Nonlinear constraints between poses and landmarks.
//!
//! Every factor linearizes around a `Values` assignment into a whitened
//! `LinearFactor`. Projection Jacobians come from forward-mode autodiff;
//! the prior Jacobians are closed form.

use super::{jet_constants, jet_variables, EstimatorError, LinearFactor, Result};
use crate::camera::{Calibration, SharedCalibration};
use crate::geometry::Pixel;
use crate::keys::{Key, LandmarkId, PoseId};
use crate::math::{right_jacobian_inverse, Point3, Pose3};
use crate::noise::SharedNoiseModel;
use crate::values::Values;
use nalgebra::{DMatrix, DVector};
use visam_solver::math3d::Vec3;
use visam_solver::{Jet, Real};

/// Pixel reprojection error of one landmark seen from one pose.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionFactor {
    pub pose: PoseId,
    pub landmark: LandmarkId,
    pub measured: Pixel,
    pub noise: SharedNoiseModel,
    pub calibration: SharedCalibration,
}

/// Absolute prior on a pose.
#[derive(Debug, Clone, PartialEq)]
pub struct PosePriorFactor {
    pub pose: PoseId,
    pub prior: Pose3,
    pub noise: SharedNoiseModel,
}

/// Absolute prior on a landmark position.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkPriorFactor {
    pub landmark: LandmarkId,
    pub prior: Point3,
    pub noise: SharedNoiseModel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    Projection(ProjectionFactor),
    PosePrior(PosePriorFactor),
    LandmarkPrior(LandmarkPriorFactor),
}

impl Factor {
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Factor::Projection(f) => vec![Key::Pose(f.pose), Key::Landmark(f.landmark)],
            Factor::PosePrior(f) => vec![Key::Pose(f.pose)],
            Factor::LandmarkPrior(f) => vec![Key::Landmark(f.landmark)],
        }
    }

    /// Number of residual rows.
    pub fn dim(&self) -> usize {
        match self {
            Factor::Projection(_) => 2,
            Factor::PosePrior(_) => 6,
            Factor::LandmarkPrior(_) => 3,
        }
    }

    pub fn linearize(&self, values: &Values) -> Result<LinearFactor> {
        match self {
            Factor::Projection(f) => f.linearize(values),
            Factor::PosePrior(f) => f.linearize(values),
            Factor::LandmarkPrior(f) => f.linearize(values),
        }
    }

    /// Whitened error `0.5 * |r|²` at `values`.
    pub fn error(&self, values: &Values) -> Result<f64> {
        Ok(self.linearize(values)?.error())
    }
}

fn lookup_pose(values: &Values, id: PoseId) -> Result<&Pose3> {
    values
        .pose(id)
        .ok_or(EstimatorError::MissingVariable(Key::Pose(id)))
}

fn lookup_point(values: &Values, id: LandmarkId) -> Result<&Point3> {
    values
        .point(id)
        .ok_or(EstimatorError::MissingVariable(Key::Landmark(id)))
}

/// Reprojection residual `predicted - measured` with the pose retracted by
/// `delta`. `None` when the point is not in front of the camera.
pub fn reprojection_residual<T: Real>(
    pose: &Pose3,
    delta: &[T; 6],
    point: Vec3<T>,
    calibration: &Calibration<T>,
    measured: &[T; 2],
) -> Option<[T; 2]> {
    let world_t_camera = pose.retract(delta);
    let point_camera = world_t_camera.transform_to(point);
    if point_camera.z.value() <= 0.0 {
        return None;
    }
    let (u, v) = calibration.project(point_camera);
    Some([u - measured[0], v - measured[1]])
}

impl ProjectionFactor {
    fn linearize(&self, values: &Values) -> Result<LinearFactor> {
        type J = Jet<f64, 9>;

        let pose = lookup_pose(values, self.pose)?;
        let point = lookup_point(values, self.landmark)?;

        let delta: [J; 6] = jet_variables(&[0.0; 6], 0);
        let p: [J; 3] = jet_variables(&point.to_array(), 6);
        let measured: [J; 2] = jet_constants(&[self.measured.u, self.measured.v]);
        let calibration = self.calibration.lift::<J>();

        let residual = reprojection_residual(
            pose,
            &delta,
            Vec3::from_array(p),
            &calibration,
            &measured,
        )
        .ok_or(EstimatorError::Cheirality {
            pose: self.pose,
            landmark: self.landmark,
        })?;

        let s = self.noise.whitening_scale();
        let a_pose = DMatrix::from_fn(2, 6, |r, c| s * residual[r].derivs[c]);
        let a_point = DMatrix::from_fn(2, 3, |r, c| s * residual[r].derivs[6 + c]);
        let rhs = DVector::from_fn(2, |r, _| -s * residual[r].value);

        Ok(LinearFactor {
            blocks: vec![
                (Key::Pose(self.pose), a_pose),
                (Key::Landmark(self.landmark), a_point),
            ],
            rhs,
        })
    }
}

impl PosePriorFactor {
    /// Residual `[Log(R_pᵀ R), t - t_p]`; rotation block is `Jr⁻¹`.
    fn linearize(&self, values: &Values) -> Result<LinearFactor> {
        let pose = lookup_pose(values, self.pose)?;
        let r = self.prior.local(pose);
        let phi = Vec3::new(r[0], r[1], r[2]);

        let s = self.noise.whitening_scale();
        let jr_inv = right_jacobian_inverse(phi);
        let mut a = DMatrix::zeros(6, 6);
        a.view_mut((0, 0), (3, 3)).copy_from(&(jr_inv * s));
        a.view_mut((3, 3), (3, 3)).fill_with_identity();
        a.view_mut((3, 3), (3, 3)).scale_mut(s);

        Ok(LinearFactor {
            blocks: vec![(Key::Pose(self.pose), a)],
            rhs: DVector::from_fn(6, |i, _| -s * r[i]),
        })
    }
}

impl LandmarkPriorFactor {
    fn linearize(&self, values: &Values) -> Result<LinearFactor> {
        let point = lookup_point(values, self.landmark)?;
        let r = (*point - self.prior).to_array();
        let s = self.noise.whitening_scale();

        Ok(LinearFactor {
            blocks: vec![(Key::Landmark(self.landmark), DMatrix::identity(3, 3) * s)],
            rhs: DVector::from_fn(3, |i, _| -s * r[i]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::SO3;
    use crate::noise::NoiseModel;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn scene() -> (Values, ProjectionFactor) {
        let pose = Pose3::from_rotation_translation(
            SO3::exp(Vec3::new(0.05, -0.1, 0.02)),
            Vec3::new(0.2, -0.1, 0.3),
        );
        let point = Vec3::new(0.5, 0.4, 6.0);
        let calibration = Arc::new(Calibration::new(500.0, 490.0, 0.1, 320.0, 240.0));

        let mut values = Values::new();
        values.insert_pose(PoseId(0), pose);
        values.insert_point(LandmarkId(3), point);

        let factor = ProjectionFactor {
            pose: PoseId(0),
            landmark: LandmarkId(3),
            measured: Pixel::new(360.0, 270.0),
            noise: Arc::new(NoiseModel::Isotropic { dim: 2, sigma: 2.0 }),
            calibration,
        };
        (values, factor)
    }

    fn whitened_residual(values: &Values, factor: &ProjectionFactor) -> [f64; 2] {
        let pose = values.pose(factor.pose).unwrap();
        let point = values.point(factor.landmark).unwrap();
        let r = reprojection_residual(
            pose,
            &[0.0; 6],
            *point,
            &factor.calibration,
            &[factor.measured.u, factor.measured.v],
        )
        .unwrap();
        [r[0] / 2.0, r[1] / 2.0]
    }

    #[test]
    fn projection_jacobian_matches_finite_differences() {
        let (values, factor) = scene();
        let linear = Factor::Projection(factor.clone()).linearize(&values).unwrap();
        let r0 = whitened_residual(&values, &factor);
        assert_abs_diff_eq!(linear.rhs[0], -r0[0], epsilon = 1e-12);

        let h = 1e-6;
        let a_pose = &linear.blocks[0].1;
        for c in 0..6 {
            let mut delta = [0.0; 6];
            delta[c] = h;
            let mut moved = values.clone();
            let pose = values.pose(factor.pose).unwrap().retract(&delta);
            moved.insert_pose(factor.pose, pose);
            let r1 = whitened_residual(&moved, &factor);
            for r in 0..2 {
                assert_abs_diff_eq!((r1[r] - r0[r]) / h, a_pose[(r, c)], epsilon = 1e-3);
            }
        }

        let a_point = &linear.blocks[1].1;
        for c in 0..3 {
            let mut p = values.point(factor.landmark).unwrap().to_array();
            p[c] += h;
            let mut moved = values.clone();
            moved.insert_point(factor.landmark, Vec3::from_array(p));
            let r1 = whitened_residual(&moved, &factor);
            for r in 0..2 {
                assert_abs_diff_eq!((r1[r] - r0[r]) / h, a_point[(r, c)], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn landmark_behind_camera_is_cheirality_error() {
        let (mut values, factor) = scene();
        values.insert_point(LandmarkId(3), Vec3::new(0.0, 0.0, -4.0));
        assert_eq!(
            Factor::Projection(factor).linearize(&values),
            Err(EstimatorError::Cheirality {
                pose: PoseId(0),
                landmark: LandmarkId(3)
            })
        );
    }

    #[test]
    fn missing_variable_is_reported() {
        let (_, factor) = scene();
        let err = Factor::Projection(factor).linearize(&Values::new()).unwrap_err();
        assert_eq!(err, EstimatorError::MissingVariable(Key::Pose(PoseId(0))));
    }

    #[test]
    fn pose_prior_at_its_own_value_has_zero_error() {
        let prior = Pose3::identity();
        let factor = Factor::PosePrior(PosePriorFactor {
            pose: PoseId(0),
            prior,
            noise: Arc::new(NoiseModel::Unit { dim: 6 }),
        });
        let mut values = Values::new();
        values.insert_pose(PoseId(0), prior);

        let linear = factor.linearize(&values).unwrap();
        assert_abs_diff_eq!(linear.error(), 0.0);
        assert_abs_diff_eq!(linear.blocks[0].1[(0, 0)], 1.0);
        assert_abs_diff_eq!(linear.blocks[0].1[(5, 5)], 1.0);
    }

    #[test]
    fn landmark_prior_residual() {
        let factor = Factor::LandmarkPrior(LandmarkPriorFactor {
            landmark: LandmarkId(1),
            prior: Vec3::new(1.0, 2.0, 3.0),
            noise: Arc::new(NoiseModel::Isotropic { dim: 3, sigma: 0.5 }),
        });
        let mut values = Values::new();
        values.insert_point(LandmarkId(1), Vec3::new(1.5, 2.0, 3.0));

        let linear = factor.linearize(&values).unwrap();
        assert_abs_diff_eq!(linear.rhs[0], -1.0);
        assert_abs_diff_eq!(linear.blocks[0].1[(0, 0)], 2.0);
        assert_abs_diff_eq!(factor.error(&values).unwrap(), 0.5);
    }
}
