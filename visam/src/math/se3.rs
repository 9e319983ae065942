//! SE(3) rigid transforms.
//!
//! Tangent vectors are ordered `[ω, v]`: three rotation components followed by
//! three translation components. Retraction perturbs rotation on the right and
//! translation in the parent frame:
//!
//!   retract(T, [ω, v]) = (R · Exp(ω), t + v)

use super::SO3;
use std::fmt;
use std::ops::Mul;
use visam_solver::math3d::{Mat3, Vec3};
use visam_solver::Real;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3<T> {
    pub rotation: SO3<T>,
    pub translation: Vec3<T>,
}

impl<T: Real> SE3<T> {
    pub fn identity() -> Self {
        Self {
            rotation: SO3::identity(),
            translation: Vec3::zero(),
        }
    }

    pub fn from_rotation_translation(rotation: SO3<T>, translation: Vec3<T>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -rotation.rotate(self.translation),
        }
    }

    /// Map a point from this frame into the parent frame.
    pub fn transform_point(&self, p: Vec3<T>) -> Vec3<T> {
        self.rotation.rotate(p) + self.translation
    }

    /// Map a parent-frame point into this frame.
    pub fn transform_to(&self, p: Vec3<T>) -> Vec3<T> {
        self.rotation.inverse().rotate(p - self.translation)
    }
}

impl SE3<f64> {
    /// Apply a tangent perturbation. Generic so factors can retract with jets.
    pub fn retract<T: Real>(&self, delta: &[T; 6]) -> SE3<T> {
        let omega = Vec3::new(delta[0], delta[1], delta[2]);
        let v = Vec3::new(delta[3], delta[4], delta[5]);
        SE3 {
            rotation: self.rotation.lift() * SO3::exp(omega),
            translation: self.translation.lift() + v,
        }
    }

    /// Inverse of `retract`: the tangent vector taking `self` to `other`.
    pub fn local(&self, other: &Self) -> [f64; 6] {
        let omega = (self.rotation.inverse() * other.rotation).log();
        let v = other.translation - self.translation;
        [omega.x, omega.y, omega.z, v.x, v.y, v.z]
    }

    /// From the top three rows of a row-major homogeneous matrix.
    pub fn from_matrix_rows(rows: [[f64; 4]; 3]) -> Self {
        let r = Mat3::from_rows([
            [rows[0][0], rows[0][1], rows[0][2]],
            [rows[1][0], rows[1][1], rows[1][2]],
            [rows[2][0], rows[2][1], rows[2][2]],
        ]);
        Self {
            rotation: SO3::from_matrix(r),
            translation: Vec3::new(rows[0][3], rows[1][3], rows[2][3]),
        }
    }

    pub fn to_matrix_rows(&self) -> [[f64; 4]; 3] {
        let r = self.rotation.matrix().to_rows();
        let t = self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t.x],
            [r[1][0], r[1][1], r[1][2], t.y],
            [r[2][0], r[2][1], r[2][2], t.z],
        ]
    }

    /// Camera pose at `eye` looking at `target`, x right, y down, z forward.
    pub fn look_at(eye: Vec3<f64>, target: Vec3<f64>, up: Vec3<f64>) -> Self {
        let z = (target - eye).normalized();
        let x = z.cross(up).normalized();
        let y = z.cross(x);
        let r = Mat3::from_cols(x, y, z);
        Self {
            rotation: SO3::from_matrix(r),
            translation: eye,
        }
    }
}

impl<T: Real> Mul for SE3<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation.rotate(rhs.translation) + self.translation,
        }
    }
}

impl fmt::Display for SE3<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.rotation.matrix().to_rows();
        write!(f, "R: [")?;
        for (i, row) in r.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{:.6}, {:.6}, {:.6}", row[0], row[1], row[2])?;
        }
        write!(
            f,
            "] t: [{:.6}, {:.6}, {:.6}]",
            self.translation.x, self.translation.y, self.translation.z
        )
    }
}
