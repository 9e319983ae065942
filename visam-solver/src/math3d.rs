//! Small fixed-size 3D types generic over `Real`.
//!
//! `Vec3`, `Mat3` and `Quat` evaluate on `f64` for plain geometry and on
//! `Jet` when a factor needs derivatives.

use crate::Real;
use std::ops::{Add, Mul, Neg, Sub};

// ============================================================================
// Vec3
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T: Copy> Vec3<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [T; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(a: [T; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

impl<T: Real> Vec3<T> {
    pub fn zero() -> Self {
        Self::new(T::zero(), T::zero(), T::zero())
    }

    pub fn dot(self, other: Self) -> T {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm_squared(self) -> T {
        self.dot(self)
    }

    pub fn norm(self) -> T {
        self.norm_squared().sqrt()
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn scale(self, s: T) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Vec3<f64> {
    /// Promote a plain vector to any scalar type as constants.
    pub fn lift<T: Real>(self) -> Vec3<T> {
        Vec3::new(T::from_f64(self.x), T::from_f64(self.y), T::from_f64(self.z))
    }

    pub fn normalized(self) -> Self {
        let n = self.norm();
        Self::new(self.x / n, self.y / n, self.z / n)
    }
}

impl<T: Real> Add for Vec3<T> {
    type Output = Self;

    fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl<T: Real> Sub for Vec3<T> {
    type Output = Self;

    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl<T: Real> Neg for Vec3<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ============================================================================
// Mat3 (column-major)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3<T> {
    pub x_axis: Vec3<T>,
    pub y_axis: Vec3<T>,
    pub z_axis: Vec3<T>,
}

impl<T: Copy> Mat3<T> {
    pub const fn from_cols(x_axis: Vec3<T>, y_axis: Vec3<T>, z_axis: Vec3<T>) -> Self {
        Self {
            x_axis,
            y_axis,
            z_axis,
        }
    }

    /// Build from row-major nested arrays, the layout used by text files.
    pub fn from_rows(r: [[T; 3]; 3]) -> Self {
        Self::from_cols(
            Vec3::new(r[0][0], r[1][0], r[2][0]),
            Vec3::new(r[0][1], r[1][1], r[2][1]),
            Vec3::new(r[0][2], r[1][2], r[2][2]),
        )
    }

    pub fn to_rows(self) -> [[T; 3]; 3] {
        [
            [self.x_axis.x, self.y_axis.x, self.z_axis.x],
            [self.x_axis.y, self.y_axis.y, self.z_axis.y],
            [self.x_axis.z, self.y_axis.z, self.z_axis.z],
        ]
    }
}

impl<T: Real> Mat3<T> {
    pub fn identity() -> Self {
        Self::from_cols(
            Vec3::new(T::one(), T::zero(), T::zero()),
            Vec3::new(T::zero(), T::one(), T::zero()),
            Vec3::new(T::zero(), T::zero(), T::one()),
        )
    }

    pub fn mul_vec(self, v: Vec3<T>) -> Vec3<T> {
        self.x_axis.scale(v.x) + self.y_axis.scale(v.y) + self.z_axis.scale(v.z)
    }
}

impl<T: Real> Mul for Mat3<T> {
    type Output = Self;

    fn mul(self, o: Self) -> Self {
        Self::from_cols(
            self.mul_vec(o.x_axis),
            self.mul_vec(o.y_axis),
            self.mul_vec(o.z_axis),
        )
    }
}

// ============================================================================
// Quat (scalar-first unit quaternion)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat<T> {
    pub w: T,
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T: Copy> Quat<T> {
    pub const fn new(w: T, x: T, y: T, z: T) -> Self {
        Self { w, x, y, z }
    }
}

/// Below this squared angle `exp` switches to its series expansion.
const SMALL_ANGLE_SQ: f64 = 1e-10;

impl<T: Real> Quat<T> {
    pub fn identity() -> Self {
        Self::new(T::one(), T::zero(), T::zero(), T::zero())
    }

    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn normalize(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product; `a.mul(b)` applies `b` first.
    pub fn mul(self, o: Self) -> Self {
        Self::new(
            self.w * o.w - self.x * o.x - self.y * o.y - self.z * o.z,
            self.w * o.x + self.x * o.w + self.y * o.z - self.z * o.y,
            self.w * o.y - self.x * o.z + self.y * o.w + self.z * o.x,
            self.w * o.z + self.x * o.y - self.y * o.x + self.z * o.w,
        )
    }

    pub fn rotate_vec(self, v: Vec3<T>) -> Vec3<T> {
        let two = T::from_f64(2.0);
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v).scale(two);
        v + t.scale(self.w) + u.cross(t)
    }

    /// Exponential map from a rotation vector.
    pub fn from_axis_angle(rvec: Vec3<T>) -> Self {
        let theta_sq = rvec.norm_squared();
        let (w, s) = if theta_sq.value() < SMALL_ANGLE_SQ {
            (
                T::one() - theta_sq * T::from_f64(1.0 / 8.0),
                T::from_f64(0.5) - theta_sq * T::from_f64(1.0 / 48.0),
            )
        } else {
            let theta = theta_sq.sqrt();
            let half = theta * T::from_f64(0.5);
            (half.cos(), half.sin() / theta)
        };
        Self::new(w, rvec.x * s, rvec.y * s, rvec.z * s)
    }

    pub fn to_matrix(self) -> Mat3<T> {
        let Self { w, x, y, z } = self;
        let two = T::from_f64(2.0);
        let one = T::one();

        Mat3::from_cols(
            Vec3::new(
                one - two * (y * y + z * z),
                two * (x * y + w * z),
                two * (x * z - w * y),
            ),
            Vec3::new(
                two * (x * y - w * z),
                one - two * (x * x + z * z),
                two * (y * z + w * x),
            ),
            Vec3::new(
                two * (x * z + w * y),
                two * (y * z - w * x),
                one - two * (x * x + y * y),
            ),
        )
    }
}

impl Quat<f64> {
    pub fn lift<T: Real>(self) -> Quat<T> {
        Quat::new(
            T::from_f64(self.w),
            T::from_f64(self.x),
            T::from_f64(self.y),
            T::from_f64(self.z),
        )
    }

    /// Logarithm map to a rotation vector with angle in `[0, pi]`.
    pub fn to_axis_angle(self) -> Vec3<f64> {
        let q = if self.w < 0.0 {
            Quat::new(-self.w, -self.x, -self.y, -self.z)
        } else {
            self
        };
        let n = (q.x * q.x + q.y * q.y + q.z * q.z).sqrt();
        let k = if n < 1e-10 {
            2.0 / q.w
        } else {
            2.0 * n.atan2(q.w) / n
        };
        Vec3::new(k * q.x, k * q.y, k * q.z)
    }

    /// Shepperd's method, branching on the largest diagonal term.
    pub fn from_matrix(m: Mat3<f64>) -> Self {
        let [[m00, m01, m02], [m10, m11, m12], [m20, m21, m22]] = m.to_rows();
        let trace = m00 + m11 + m22;

        let q = if trace > 0.0 {
            let s = (1.0 + trace).sqrt() * 2.0;
            Quat::new(0.25 * s, (m21 - m12) / s, (m02 - m20) / s, (m10 - m01) / s)
        } else if m00 > m11 && m00 > m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Quat::new((m21 - m12) / s, 0.25 * s, (m01 + m10) / s, (m02 + m20) / s)
        } else if m11 > m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Quat::new((m02 - m20) / s, (m01 + m10) / s, 0.25 * s, (m12 + m21) / s)
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Quat::new((m10 - m01) / s, (m02 + m20) / s, (m12 + m21) / s, 0.25 * s)
        };
        q.normalize()
    }
}

impl<T: Real> Mul for Quat<T> {
    type Output = Self;

    fn mul(self, o: Self) -> Self {
        Quat::mul(self, o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Jet;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cross_is_orthogonal() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-4.0, 0.5, 2.0);
        let c = a.cross(b);
        assert_abs_diff_eq!(c.dot(a), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.dot(b), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn exp_log_inverse() {
        let w = Vec3::new(0.3, -1.1, 0.7);
        let back = Quat::from_axis_angle(w).to_axis_angle();
        assert_abs_diff_eq!(back.x, w.x, epsilon = 1e-12);
        assert_abs_diff_eq!(back.y, w.y, epsilon = 1e-12);
        assert_abs_diff_eq!(back.z, w.z, epsilon = 1e-12);
    }

    #[test]
    fn matrix_round_trip() {
        let q = Quat::from_axis_angle(Vec3::new(2.0, 0.4, -0.9));
        let r = Quat::from_matrix(q.to_matrix());
        // q and -q are the same rotation
        let sign = if r.w * q.w < 0.0 { -1.0 } else { 1.0 };
        assert_abs_diff_eq!(r.w * sign, q.w, epsilon = 1e-12);
        assert_abs_diff_eq!(r.x * sign, q.x, epsilon = 1e-12);
        assert_abs_diff_eq!(r.y * sign, q.y, epsilon = 1e-12);
        assert_abs_diff_eq!(r.z * sign, q.z, epsilon = 1e-12);
    }

    #[test]
    fn rotate_matches_matrix() {
        let q = Quat::from_axis_angle(Vec3::new(0.1, 0.2, -0.3));
        let v = Vec3::new(1.0, -2.0, 0.5);
        let a = q.rotate_vec(v);
        let b = q.to_matrix().mul_vec(v);
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-12);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-12);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-12);
    }

    #[test]
    fn exp_derivative_at_zero() {
        // d/dw (exp(w) v) at w = 0 is -[v]x
        let w: Vec3<Jet<f64, 3>> = Vec3::new(
            Jet::variable(0.0, 0),
            Jet::variable(0.0, 1),
            Jet::variable(0.0, 2),
        );
        let v = Vec3::new(1.0, 2.0, 3.0).lift::<Jet<f64, 3>>();
        let r = Quat::from_axis_angle(w).rotate_vec(v);

        // row x: [0, v.z, -v.y]
        assert_abs_diff_eq!(r.x.derivs[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.x.derivs[1], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r.x.derivs[2], -2.0, epsilon = 1e-12);
    }
}
