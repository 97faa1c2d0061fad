//! # Chebyshev expansions of 3-vector functions of time
//!
//! [`ChebyshevExpansion`] is the storage unit shared by the dense-output fitter, the compaction
//! engine and the in-memory ephemeris source. One expansion approximates a function
//! `f: [start, end] → ℝ³` as, independently per axis,
//!
//! ```text
//! f(t) ≈ Σₖ cₖ Tₖ(x),   x = (2t − start − end) / (end − start) ∈ [−1, 1]
//! ```
//!
//! Fitting
//! -----------------
//! [`ChebyshevExpansion::fit`] samples the function at the `n` Chebyshev–Gauss nodes and
//! computes the `n` coefficients by the discrete cosine transform. The resulting polynomial
//! interpolates the function at the nodes; for smooth functions the coefficients decay
//! geometrically, which is what makes truncation effective.
//!
//! Truncation
//! -----------------
//! Discarding the tail `cₖ, k ≥ m` changes the value at any `x ∈ [−1, 1]` by at most
//! `Σ_{k≥m} |cₖ|` since `|Tₖ(x)| ≤ 1`. [`ChebyshevExpansion::truncated_length`] returns the
//! smallest length whose discarded tail stays below a tolerance, and
//! [`ChebyshevExpansion::truncate`] applies it per axis.
//!
//! See also
//! -----------------
//! * [`crate::integration::dense_output`] – per-step fits of the integrator's continuous output.
//! * [`crate::compaction`] – coarse, day-aligned refits of dense output.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::ephem_errors::EphemError;

/// Chebyshev expansion of a 3-vector over `[start, end]`.
///
/// Each axis keeps its own coefficient vector; after truncation the axes may have different
/// lengths. Evaluation outside `[start, end]` extrapolates and is the caller's responsibility
/// to avoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChebyshevExpansion {
    pub start: f64,
    pub end: f64,
    pub coefficients: [Vec<f64>; 3],
}

impl ChebyshevExpansion {
    /// Build an expansion from known coefficients.
    ///
    /// Return
    /// ----------
    /// * [`EphemError::InvalidChebyshevExpansion`] if the interval is empty or an axis has no
    ///   coefficients.
    pub fn from_coefficients(
        start: f64,
        end: f64,
        coefficients: [Vec<f64>; 3],
    ) -> Result<Self, EphemError> {
        if end.partial_cmp(&start) != Some(std::cmp::Ordering::Greater) {
            return Err(EphemError::InvalidChebyshevExpansion(format!(
                "empty interval [{start}, {end}]"
            )));
        }
        if coefficients.iter().any(|c| c.is_empty()) {
            return Err(EphemError::InvalidChebyshevExpansion(
                "every axis needs at least one coefficient".into(),
            ));
        }
        Ok(ChebyshevExpansion {
            start,
            end,
            coefficients,
        })
    }

    /// Fit `n` coefficients per axis to `f` over `[start, end]`.
    ///
    /// Arguments
    /// -----------------
    /// * `start`, `end`: fitting interval (`end > start`).
    /// * `n`: number of coefficients, also the number of sample nodes.
    /// * `f`: fallible function evaluated once per node, in decreasing node order.
    ///
    /// Return
    /// ----------
    /// * The fitted expansion, or the first error returned by `f`.
    pub fn fit<F>(start: f64, end: f64, n: usize, mut f: F) -> Result<Self, EphemError>
    where
        F: FnMut(f64) -> Result<Vector3<f64>, EphemError>,
    {
        if n == 0 {
            return Err(EphemError::InvalidChebyshevExpansion(
                "at least one coefficient is required".into(),
            ));
        }
        if end.partial_cmp(&start) != Some(std::cmp::Ordering::Greater) {
            return Err(EphemError::InvalidChebyshevExpansion(format!(
                "empty interval [{start}, {end}]"
            )));
        }

        let half = 0.5 * (end - start);
        let mid = 0.5 * (end + start);
        let nf = n as f64;

        let mut samples = Vec::with_capacity(n);
        for k in 0..n {
            let theta = std::f64::consts::PI * (k as f64 + 0.5) / nf;
            samples.push((theta, f(mid + half * theta.cos())?));
        }

        let mut coefficients = [vec![0.0; n], vec![0.0; n], vec![0.0; n]];
        for j in 0..n {
            let mut acc = Vector3::zeros();
            for (theta, v) in &samples {
                acc += v * (j as f64 * theta).cos();
            }
            let scale = if j == 0 { 1.0 / nf } else { 2.0 / nf };
            for axis in 0..3 {
                coefficients[axis][j] = acc[axis] * scale;
            }
        }

        Ok(ChebyshevExpansion {
            start,
            end,
            coefficients,
        })
    }

    /// Length of the interval covered by this expansion.
    #[inline]
    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// Largest per-axis coefficient count.
    pub fn len(&self) -> usize {
        self.coefficients.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Total number of stored coefficients over the three axes.
    pub fn total_coefficients(&self) -> usize {
        self.coefficients.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// Smallest length such that, on every axis, the discarded tail sums to at most `eps`.
    ///
    /// The result is never below `min_len` (capped by the current length).
    pub fn truncated_length(&self, eps: f64, min_len: usize) -> usize {
        self.coefficients
            .iter()
            .map(|c| axis_truncated_length(c, eps, min_len))
            .max()
            .unwrap_or(0)
    }

    /// Truncate every axis independently to its own smallest admissible length.
    ///
    /// Return
    /// ----------
    /// * The largest per-axis truncation error, i.e. the bound on the change of value.
    pub fn truncate(&mut self, eps: f64, min_len: usize) -> f64 {
        let mut max_err = 0.0_f64;
        for c in self.coefficients.iter_mut() {
            let m = axis_truncated_length(c, eps, min_len);
            let err: f64 = c[m..].iter().map(|x| x.abs()).sum();
            c.truncate(m);
            max_err = max_err.max(err);
        }
        max_err
    }

    /// Evaluate the expansion at `t` by Clenshaw recurrence.
    pub fn evaluate(&self, t: f64) -> Vector3<f64> {
        // Both differences are exact when t lies inside (or near) the interval.
        let x = ((t - self.start) - (self.end - t)) / (self.end - self.start);
        Vector3::new(
            clenshaw(&self.coefficients[0], x),
            clenshaw(&self.coefficients[1], x),
            clenshaw(&self.coefficients[2], x),
        )
    }

    /// Expansion of the time derivative `df/dt` over the same interval.
    pub fn derivative(&self) -> ChebyshevExpansion {
        let scale = 2.0 / (self.end - self.start);
        let coefficients = [
            axis_derivative(&self.coefficients[0], scale),
            axis_derivative(&self.coefficients[1], scale),
            axis_derivative(&self.coefficients[2], scale),
        ];
        ChebyshevExpansion {
            start: self.start,
            end: self.end,
            coefficients,
        }
    }
}

fn axis_truncated_length(c: &[f64], eps: f64, min_len: usize) -> usize {
    let mut n = c.len();
    let mut tail = 0.0;
    while n > min_len {
        let next = tail + c[n - 1].abs();
        if next > eps {
            break;
        }
        tail = next;
        n -= 1;
    }
    n
}

fn clenshaw(c: &[f64], x: f64) -> f64 {
    match c.len() {
        0 => 0.0,
        1 => c[0],
        n => {
            let x2 = 2.0 * x;
            let (mut b1, mut b2) = (0.0, 0.0);
            for &ck in c[1..n].iter().rev() {
                let b0 = ck + x2 * b1 - b2;
                b2 = b1;
                b1 = b0;
            }
            c[0] + x * b1 - b2
        }
    }
}

fn axis_derivative(c: &[f64], scale: f64) -> Vec<f64> {
    let n = c.len();
    if n < 2 {
        return vec![0.0];
    }
    // d_{k-1} = d_{k+1} + 2k c_k, with d_{n-1} = d_n = 0
    let mut d = vec![0.0; n + 1];
    for k in (1..n).rev() {
        d[k - 1] = d[k + 1] + 2.0 * k as f64 * c[k];
    }
    d[0] *= 0.5;
    d.truncate(n - 1);
    d.iter_mut().for_each(|x| *x *= scale);
    d
}

#[cfg(test)]
mod chebyshev_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn helix(t: f64) -> Vector3<f64> {
        Vector3::new(t.cos(), t.sin(), 0.1 * t)
    }

    #[test]
    fn test_fit_reproduces_smooth_function() {
        let exp = ChebyshevExpansion::fit(0.0, 3.0, 30, |t| Ok(helix(t))).unwrap();
        for i in 0..=30 {
            let t = 0.1 * i as f64;
            let d = exp.evaluate(t) - helix(t);
            assert!(d.amax() < 1e-13, "t={t}, diff={}", d.amax());
        }
    }

    #[test]
    fn test_polynomial_is_truncated_to_its_degree() {
        let mut exp = ChebyshevExpansion::fit(-2.0, 5.0, 20, |t| {
            Ok(Vector3::new(t * t * t, 1.0 - t, 4.0))
        })
        .unwrap();
        assert_eq!(exp.truncated_length(1e-10, 1), 4);
        let err = exp.truncate(1e-10, 1);
        assert!(err <= 1e-10);
        assert_eq!(exp.coefficients[0].len(), 4);
        assert_eq!(exp.coefficients[1].len(), 2);
        assert_eq!(exp.coefficients[2].len(), 1);
        assert_abs_diff_eq!(exp.evaluate(1.5).x, 3.375, epsilon = 1e-10);
    }

    #[test]
    fn test_truncate_honours_min_length() {
        let mut exp =
            ChebyshevExpansion::fit(0.0, 1.0, 10, |_| Ok(Vector3::new(1.0, 2.0, 3.0))).unwrap();
        exp.truncate(1e-10, 4);
        assert_eq!(exp.len(), 4);
    }

    #[test]
    fn test_truncation_error_bounds_value_change() {
        let full = ChebyshevExpansion::fit(0.0, 8.0, 40, |t| Ok(helix(t))).unwrap();
        let mut cut = full.clone();
        let err = cut.truncate(1e-6, 4);
        assert!(cut.len() < full.len());
        for i in 0..=80 {
            let t = 0.1 * i as f64;
            let d = (cut.evaluate(t) - full.evaluate(t)).amax();
            assert!(d <= err + 1e-15);
        }
    }

    #[test]
    fn test_derivative() {
        let exp = ChebyshevExpansion::fit(1.0, 4.0, 16, |t| {
            Ok(Vector3::new(t * t * t, t.exp(), 2.0))
        })
        .unwrap();
        let der = exp.derivative();
        assert_eq!(der.len(), 15);
        for t in [1.0, 1.7, 2.5, 4.0] {
            let d = der.evaluate(t);
            assert_abs_diff_eq!(d.x, 3.0 * t * t, epsilon = 1e-10);
            assert_abs_diff_eq!(d.y, t.exp(), epsilon = 1e-8);
            assert_abs_diff_eq!(d.z, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(ChebyshevExpansion::fit(1.0, 1.0, 5, |_| Ok(Vector3::zeros())).is_err());
        assert!(ChebyshevExpansion::fit(0.0, 1.0, 0, |_| Ok(Vector3::zeros())).is_err());
        assert!(ChebyshevExpansion::from_coefficients(0.0, 1.0, [vec![1.0], vec![], vec![1.0]])
            .is_err());
    }
}
