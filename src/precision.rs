//! # Working precision of the equations of motion
//!
//! The force model evaluates and accumulates its terms in a scalar type chosen per run:
//!
//! * `f64`, the default,
//! * [`DoubleDouble`], an unevaluated sum `hi + lo` of two `f64` carrying about 106 bits of
//!   mantissa.
//!
//! Both implement [`ForceScalar`], the arithmetic the force model needs on top of nalgebra's
//! [`Scalar`](nalgebra::Scalar) so that `Vector3<H>` and `Matrix3<H>` products are available.
//! Ephemeris queries, the stepper and the dense output stay in `f64`.
//!
//! [`DoubleDouble`] uses the error-free transformations of Dekker and Knuth: `two_sum`, and
//! `two_prod` through a fused multiply-add.
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

/// Scalar type of the force-model arithmetic.
pub trait ForceScalar:
    nalgebra::Scalar
    + Copy
    + PartialOrd
    + Send
    + Sync
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    fn from_f64(x: f64) -> Self;

    /// Nearest `f64`.
    fn to_f64(self) -> f64;

    fn sqrt(self) -> Self;

    fn abs(self) -> Self;
}

impl ForceScalar for f64 {
    #[inline]
    fn from_f64(x: f64) -> Self {
        x
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }
}

/// Precision selected for an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// Forces evaluated in `f64`.
    #[default]
    Double,
    /// Forces evaluated in [`DoubleDouble`].
    Extended,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Double => write!(f, "double"),
            Precision::Extended => write!(f, "double-double"),
        }
    }
}

#[inline]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    (s, (a - (s - bb)) + (b - bb))
}

/// `two_sum` for `|a| >= |b|`.
#[inline]
fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    (s, b - (s - a))
}

#[inline]
fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

/// Double-double number `hi + lo` with `|lo| <= ulp(hi) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DoubleDouble {
    hi: f64,
    lo: f64,
}

impl DoubleDouble {
    pub const fn new(x: f64) -> Self {
        DoubleDouble { hi: x, lo: 0.0 }
    }

    /// Normalized sum of two `f64`.
    pub fn from_sum(a: f64, b: f64) -> Self {
        let (hi, lo) = two_sum(a, b);
        DoubleDouble { hi, lo }
    }

    fn renormalized(hi: f64, lo: f64) -> Self {
        let (hi, lo) = quick_two_sum(hi, lo);
        DoubleDouble { hi, lo }
    }

    fn mul_f64(self, b: f64) -> Self {
        let (p, e) = two_prod(self.hi, b);
        Self::renormalized(p, e + self.lo * b)
    }
}

impl fmt::Display for DoubleDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:e} {:+e}", self.hi, self.lo)
    }
}

impl PartialOrd for DoubleDouble {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.hi.partial_cmp(&other.hi)? {
            Ordering::Equal => self.lo.partial_cmp(&other.lo),
            ord => Some(ord),
        }
    }
}

impl Add for DoubleDouble {
    type Output = Self;

    fn add(self, b: Self) -> Self {
        let (s, e) = two_sum(self.hi, b.hi);
        let (t, f) = two_sum(self.lo, b.lo);
        let (s, e) = quick_two_sum(s, e + t);
        Self::renormalized(s, e + f)
    }
}

impl Neg for DoubleDouble {
    type Output = Self;

    fn neg(self) -> Self {
        DoubleDouble {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl Sub for DoubleDouble {
    type Output = Self;

    fn sub(self, b: Self) -> Self {
        self + (-b)
    }
}

impl Mul for DoubleDouble {
    type Output = Self;

    fn mul(self, b: Self) -> Self {
        let (p, e) = two_prod(self.hi, b.hi);
        Self::renormalized(p, e + (self.hi * b.lo + self.lo * b.hi))
    }
}

impl Div for DoubleDouble {
    type Output = Self;

    /// Long division with three quotient terms.
    fn div(self, b: Self) -> Self {
        let q1 = self.hi / b.hi;
        let r = self - b.mul_f64(q1);
        let q2 = r.hi / b.hi;
        let r = r - b.mul_f64(q2);
        let q3 = r.hi / b.hi;
        Self::renormalized(q1, q2) + DoubleDouble::new(q3)
    }
}

macro_rules! assign_op {
    ($tr:ident, $method:ident, $op:tt) => {
        impl $tr for DoubleDouble {
            fn $method(&mut self, rhs: Self) {
                *self = *self $op rhs;
            }
        }
    };
}

assign_op!(AddAssign, add_assign, +);
assign_op!(SubAssign, sub_assign, -);
assign_op!(MulAssign, mul_assign, *);
assign_op!(DivAssign, div_assign, /);

impl Zero for DoubleDouble {
    fn zero() -> Self {
        DoubleDouble::new(0.0)
    }

    fn is_zero(&self) -> bool {
        self.hi == 0.0
    }
}

impl One for DoubleDouble {
    fn one() -> Self {
        DoubleDouble::new(1.0)
    }
}

impl ForceScalar for DoubleDouble {
    #[inline]
    fn from_f64(x: f64) -> Self {
        DoubleDouble::new(x)
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self.hi + self.lo
    }

    /// One Newton correction of the `f64` square root.
    fn sqrt(self) -> Self {
        if self.hi <= 0.0 {
            return if self.hi == 0.0 {
                Self::zero()
            } else {
                DoubleDouble::new(f64::NAN)
            };
        }
        let x = 1.0 / self.hi.sqrt();
        let ax = self.hi * x;
        let (sq, sq_err) = two_prod(ax, ax);
        let residual = self - DoubleDouble::renormalized(sq, sq_err);
        DoubleDouble::from_sum(ax, residual.hi * (x * 0.5))
    }

    fn abs(self) -> Self {
        if self.hi < 0.0 {
            -self
        } else {
            self
        }
    }
}

#[cfg(test)]
mod precision_test {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    fn dd(x: f64) -> DoubleDouble {
        DoubleDouble::new(x)
    }

    #[test]
    fn test_keeps_bits_lost_in_f64() {
        let tiny = 1.0e-20;
        assert_eq!((1.0 + tiny) - 1.0, 0.0);
        let s = (dd(1.0) + dd(tiny)) - dd(1.0);
        assert_eq!(s.to_f64(), tiny);
    }

    #[test]
    fn test_division_and_sqrt() {
        let third = dd(1.0) / dd(3.0);
        let err = (third * dd(3.0) - dd(1.0)).abs();
        assert!(err.to_f64() < 1e-30, "{err}");

        let r = dd(2.0).sqrt();
        let err = (r * r - dd(2.0)).abs();
        assert!(err.to_f64() < 1e-30, "{err}");
        assert_eq!(dd(0.0).sqrt(), DoubleDouble::zero());
        assert!(dd(-1.0).sqrt().to_f64().is_nan());
    }

    #[test]
    fn test_ordering_uses_low_word() {
        let a = DoubleDouble::from_sum(1.0, 1.0e-20);
        assert!(a > dd(1.0));
        assert!(-a < dd(-1.0));
        assert_eq!(a.abs(), a);
        assert_eq!((-a).abs(), a);
    }

    #[test]
    fn test_nalgebra_products() {
        let v = Vector3::new(dd(1.0), dd(2.0), dd(3.0));
        assert_eq!(v.dot(&v), dd(14.0));
        let m = Matrix3::from_diagonal_element(dd(2.0));
        assert_eq!(m * v, v * dd(2.0));
        assert_eq!(-v + v, Vector3::from_element(DoubleDouble::zero()));
    }
}
