//! Forward-mode dual numbers.
//!
//! A `Jet<T, N>` carries a value together with its partial derivatives with
//! respect to `N` independent parameters. Factors evaluate their residuals on
//! jets to obtain the Jacobian in the same pass.

use std::ops::{Add, Div, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jet<T, const N: usize> {
    pub value: T,
    pub derivs: [T; N],
}

impl<T: Copy + Default, const N: usize> Jet<T, N> {
    /// A jet with all derivatives zero.
    pub fn constant(value: T) -> Self {
        Self {
            value,
            derivs: [T::default(); N],
        }
    }

    /// Seed the `index`-th parameter.
    pub fn variable(value: T, index: usize) -> Self
    where
        T: num_traits::One,
    {
        let mut derivs = [T::default(); N];
        derivs[index] = T::one();
        Self { value, derivs }
    }
}

impl<const N: usize> Jet<f64, N> {
    #[inline]
    fn chain(self, value: f64, slope: f64) -> Self {
        Self {
            value,
            derivs: std::array::from_fn(|i| slope * self.derivs[i]),
        }
    }
}

impl<const N: usize> Add for Jet<f64, N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
            derivs: std::array::from_fn(|i| self.derivs[i] + rhs.derivs[i]),
        }
    }
}

impl<const N: usize> Sub for Jet<f64, N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
            derivs: std::array::from_fn(|i| self.derivs[i] - rhs.derivs[i]),
        }
    }
}

impl<const N: usize> Mul for Jet<f64, N> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            value: self.value * rhs.value,
            derivs: std::array::from_fn(|i| {
                self.value * rhs.derivs[i] + rhs.value * self.derivs[i]
            }),
        }
    }
}

impl<const N: usize> Div for Jet<f64, N> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.value;
        let value = self.value * inv;
        Self {
            value,
            derivs: std::array::from_fn(|i| (self.derivs[i] - value * rhs.derivs[i]) * inv),
        }
    }
}

impl<const N: usize> Neg for Jet<f64, N> {
    type Output = Self;

    fn neg(self) -> Self {
        self.chain(-self.value, -1.0)
    }
}

/// Scalar abstraction shared by `f64` and `Jet<f64, N>`.
///
/// Geometry written against `Real` evaluates plain values when called with
/// `f64` and value-plus-Jacobian when called with jets.
pub trait Real:
    Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn from_f64(value: f64) -> Self;
    /// The plain value, derivatives dropped.
    fn value(self) -> f64;

    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn sqrt(self) -> Self;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }
    fn one() -> Self {
        Self::from_f64(1.0)
    }
}

impl Real for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }
    fn value(self) -> f64 {
        self
    }
    fn sin(self) -> Self {
        f64::sin(self)
    }
    fn cos(self) -> Self {
        f64::cos(self)
    }
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}

impl<const N: usize> Real for Jet<f64, N> {
    fn from_f64(value: f64) -> Self {
        Jet::constant(value)
    }
    fn value(self) -> f64 {
        self.value
    }
    fn sin(self) -> Self {
        self.chain(self.value.sin(), self.value.cos())
    }
    fn cos(self) -> Self {
        self.chain(self.value.cos(), -self.value.sin())
    }
    fn sqrt(self) -> Self {
        let root = self.value.sqrt();
        // Zero slope at the origin; small-angle callers use series expansions.
        let slope = if root > 0.0 { 0.5 / root } else { 0.0 };
        self.chain(root, slope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn product_rule() {
        let x = Jet::<f64, 2>::variable(3.0, 0);
        let y = Jet::<f64, 2>::variable(4.0, 1);

        let p = x * y;
        assert_eq!(p.value, 12.0);
        assert_eq!(p.derivs, [4.0, 3.0]);
    }

    #[test]
    fn quotient_rule() {
        let x = Jet::<f64, 2>::variable(3.0, 0);
        let y = Jet::<f64, 2>::variable(4.0, 1);

        let q = x / y;
        assert_abs_diff_eq!(q.value, 0.75);
        assert_abs_diff_eq!(q.derivs[0], 0.25);
        assert_abs_diff_eq!(q.derivs[1], -3.0 / 16.0);
    }

    #[test]
    fn trig_derivatives() {
        let x = Jet::<f64, 1>::variable(0.3, 0);
        assert_abs_diff_eq!(x.sin().derivs[0], 0.3_f64.cos(), epsilon = 1e-12);
        assert_abs_diff_eq!(x.cos().derivs[0], -0.3_f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn sqrt_at_zero_has_finite_slope() {
        let x = Jet::<f64, 1>::variable(0.0, 0);
        let r = x.sqrt();
        assert_eq!(r.value, 0.0);
        assert!(r.derivs[0].is_finite());
    }

    #[test]
    fn generic_code_runs_on_both_scalars() {
        fn poly<T: Real>(x: T) -> T {
            x * x + x + T::one()
        }

        assert_eq!(poly(2.0), 7.0);
        let j = poly(Jet::<f64, 1>::variable(2.0, 0));
        assert_eq!(j.value, 7.0);
        assert_eq!(j.derivs[0], 5.0);
    }
}
