//! Second-order compensated (Kahan–Babuška) summation.
//!
//! Accelerations acting on a small body span many orders of magnitude (the Sun's pull versus a
//! distant KBO's, or a Newtonian term versus its relativistic correction). Summing them naively
//! loses the small ones to rounding. [`CompensatedSum`] keeps two running correction terms so
//! that the result is as accurate as if it had been computed in roughly twice the working
//! precision.
//!
//! Every intermediate passes through [`std::hint::black_box`], which keeps the optimizer from
//! reassociating `(a − t) + b` back into `0`.
use std::hint::black_box;

use crate::precision::ForceScalar;

/// Running second-order compensated sum.
///
/// The scalar type is any [`ForceScalar`]; the equations of motion instantiate it with their
/// working precision.
#[derive(Debug, Clone, Copy)]
pub struct CompensatedSum<H: ForceScalar> {
    sum: H,
    c1: H,
    c2: H,
}

impl<H: ForceScalar> Default for CompensatedSum<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ForceScalar> CompensatedSum<H> {
    pub fn new() -> Self {
        CompensatedSum {
            sum: H::zero(),
            c1: H::zero(),
            c2: H::zero(),
        }
    }

    /// Add one term.
    #[inline]
    pub fn add(&mut self, x: H) {
        let (s, e1) = two_sum(self.sum, x);
        self.sum = s;
        let (c, e2) = two_sum(self.c1, e1);
        self.c1 = c;
        self.c2 = black_box(self.c2 + e2);
    }

    /// Current value: `sum + c1 + c2`.
    #[inline]
    pub fn value(&self) -> H {
        black_box(self.sum + black_box(self.c1 + self.c2))
    }
}

/// Neumaier's branch-on-magnitude error-free addition.
#[inline]
fn two_sum<H: ForceScalar>(a: H, b: H) -> (H, H) {
    let t = black_box(a + b);
    let err = if a.abs() >= b.abs() {
        black_box(black_box(a - t) + b)
    } else {
        black_box(black_box(b - t) + a)
    };
    (t, err)
}

/// Compensated sum of a sequence of scalars.
pub fn compensated_sum<H, I>(terms: I) -> H
where
    H: ForceScalar,
    I: IntoIterator<Item = H>,
{
    let mut s = CompensatedSum::new();
    terms.into_iter().for_each(|x| s.add(x));
    s.value()
}

#[cfg(test)]
mod summation_test {
    use super::*;

    #[test]
    fn test_recovers_small_terms() {
        let terms = [1.0e16, 1.0, -1.0e16, 1.0];
        let naive: f64 = terms.iter().sum();
        assert_eq!(naive, 1.0);
        assert_eq!(compensated_sum(terms), 2.0);
    }

    #[test]
    fn test_many_small_terms() {
        let mut s = CompensatedSum::<f64>::new();
        s.add(1.0);
        for _ in 0..10_000 {
            s.add(1.0e-16);
        }
        approx::assert_relative_eq!(s.value(), 1.0 + 1.0e-12, epsilon = 1e-15);
    }

    #[test]
    fn test_empty_sum_is_zero() {
        assert_eq!(compensated_sum::<f64, _>(std::iter::empty()), 0.0);
    }
}
