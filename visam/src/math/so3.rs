//! SO(3) rotations on unit quaternions.

use nalgebra::Matrix3;
use std::ops::Mul;
use visam_solver::math3d::{Mat3, Quat, Vec3};
use visam_solver::Real;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO3<T> {
    pub quat: Quat<T>,
}

impl<T: Real> SO3<T> {
    pub fn identity() -> Self {
        Self {
            quat: Quat::identity(),
        }
    }

    /// Exponential map from the tangent space.
    pub fn exp(omega: Vec3<T>) -> Self {
        Self {
            quat: Quat::from_axis_angle(omega),
        }
    }

    pub fn rotate(&self, v: Vec3<T>) -> Vec3<T> {
        self.quat.rotate_vec(v)
    }

    pub fn inverse(&self) -> Self {
        Self {
            quat: self.quat.conjugate(),
        }
    }

    pub fn matrix(&self) -> Mat3<T> {
        self.quat.to_matrix()
    }
}

impl SO3<f64> {
    /// Logarithm map, angle in `[0, pi]`.
    pub fn log(&self) -> Vec3<f64> {
        self.quat.to_axis_angle()
    }

    pub fn from_matrix(m: Mat3<f64>) -> Self {
        Self {
            quat: Quat::from_matrix(m),
        }
    }

    pub fn lift<T: Real>(&self) -> SO3<T> {
        SO3 {
            quat: self.quat.lift(),
        }
    }

    /// Angle of the rotation in radians.
    pub fn angle(&self) -> f64 {
        self.log().norm()
    }
}

impl<T: Real> Mul for SO3<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            quat: self.quat * rhs.quat,
        }
    }
}

fn hat(w: Vec3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -w.z, w.y, w.z, 0.0, -w.x, -w.y, w.x, 0.0)
}

/// Inverse right Jacobian `Jr⁻¹(φ)`, mapping a tangent perturbation on the
/// right of `Exp(φ)` to the change of `φ`.
pub fn right_jacobian_inverse(phi: Vec3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();
    let k = hat(phi);
    let coeff = if theta < 1e-5 {
        1.0 / 12.0
    } else {
        let half = 0.5 * theta;
        (1.0 - half * half.cos() / half.sin()) / (theta * theta)
    };
    Matrix3::identity() + 0.5 * k + coeff * k * k
}
