//! # Dense output
//!
//! Every accepted integration step is turned into one or more [`DenseOutputItem`]s: truncated
//! Chebyshev expansions of position (and optionally velocity) fitted to the stepper's continuous
//! solution over the step. The sequence of items, held by [`DenseOutput`], is a continuous
//! representation of the whole trajectory that the compaction engine later refits on
//! day-aligned windows.
//!
//! Fitting rules
//! -----------------
//! * Each step is fitted with `2·n` coefficients per axis and truncated to the output tolerance,
//!   keeping at least [`MIN_DENSE_LENGTH`] coefficients.
//! * If any axis needs more than `n` coefficients, the step is split in two halves which are
//!   fitted recursively, at most [`MAX_DENSE_RECURSION`] levels deep.
//! * A span shorter than [`MIN_DENSE_SPAN`] day or an exhausted recursion fails with
//!   [`EphemError::DenseOutputFitFailed`].
//!
//! Items are contiguous: `items[k].jd + items[k].span == items[k+1].jd` holds exactly, since
//! both bounds of a step come from the same Julian Dates and their difference is exact.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::state::IntegrationState;
use crate::chebyshev::ChebyshevExpansion;
use crate::constants::JulianDate;
use crate::ephem_errors::EphemError;

/// Smallest number of coefficients kept when truncating a dense-output expansion.
pub const MIN_DENSE_LENGTH: usize = 4;

/// Deepest level of step bisection.
pub const MAX_DENSE_RECURSION: usize = 4;

/// Shortest span (days) that may still be bisected.
pub const MIN_DENSE_SPAN: f64 = 1.0e-4;

/// Dense output of one (part of an) integration step.
///
/// The expansions are defined on the local domain `[0, span]`, in days from `jd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseOutputItem {
    pub jd: JulianDate,
    pub span: f64,
    /// Truncation tolerance used for this item (au).
    pub tolerance: f64,
    pub position: ChebyshevExpansion,
    pub velocity: Option<ChebyshevExpansion>,
}

impl DenseOutputItem {
    pub fn end_jd(&self) -> JulianDate {
        self.jd + self.span
    }

    pub fn contains(&self, jd: JulianDate) -> bool {
        jd >= self.jd && jd <= self.end_jd()
    }

    pub fn position_at(&self, jd: JulianDate) -> Vector3<f64> {
        self.position.evaluate(jd - self.jd)
    }

    /// Velocity from the velocity expansion, or from the derivative of position.
    pub fn velocity_at(&self, jd: JulianDate) -> Vector3<f64> {
        match &self.velocity {
            Some(v) => v.evaluate(jd - self.jd),
            None => self.position.derivative().evaluate(jd - self.jd),
        }
    }
}

/// Fits the continuous solution of accepted steps.
#[derive(Debug, Clone, Copy)]
pub struct DenseOutputFitter {
    /// Maximum truncated length of an item.
    pub n: usize,
    /// Fit velocity expansions too.
    pub velocity: bool,
}

impl DenseOutputFitter {
    /// Fit `[jd, jd + span]` into one or more items appended to `out`.
    ///
    /// Arguments
    /// -----------------
    /// * `jd`, `span`: start and length of the step in physical time.
    /// * `tolerance`: output tolerance (au).
    /// * `sample`: physical state at `dt ∈ [0, span]` days from `jd`.
    /// * `out`: receives the items, in ascending time order.
    ///
    /// Return
    /// ----------
    /// * [`EphemError::DenseOutputFitFailed`] when a span cannot be represented within `n`
    ///   coefficients after [`MAX_DENSE_RECURSION`] bisections.
    pub fn fit_step<F>(
        &self,
        jd: JulianDate,
        span: f64,
        tolerance: f64,
        sample: &mut F,
        out: &mut Vec<DenseOutputItem>,
    ) -> Result<(), EphemError>
    where
        F: FnMut(f64) -> IntegrationState,
    {
        self.fit_recursive(jd, 0.0, span, tolerance, sample, out, 0)
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_recursive<F>(
        &self,
        jd: JulianDate,
        offset: f64,
        span: f64,
        tolerance: f64,
        sample: &mut F,
        out: &mut Vec<DenseOutputItem>,
        level: usize,
    ) -> Result<(), EphemError>
    where
        F: FnMut(f64) -> IntegrationState,
    {
        if let Some(item) = self.try_fit(jd, offset, span, tolerance, sample)? {
            out.push(item);
            return Ok(());
        }

        if span < MIN_DENSE_SPAN || level == MAX_DENSE_RECURSION {
            return Err(EphemError::DenseOutputFitFailed { jd, span });
        }

        let mid = jd + span / 2.0;
        let (left, right) = (mid - jd, (jd + span) - mid);
        self.fit_recursive(jd, offset, left, tolerance, sample, out, level + 1)?;
        self.fit_recursive(mid, offset + left, right, tolerance, sample, out, level + 1)
    }

    fn try_fit<F>(
        &self,
        jd: JulianDate,
        offset: f64,
        span: f64,
        tolerance: f64,
        sample: &mut F,
    ) -> Result<Option<DenseOutputItem>, EphemError>
    where
        F: FnMut(f64) -> IntegrationState,
    {
        let mut position =
            ChebyshevExpansion::fit(0.0, span, 2 * self.n, |dt| Ok(sample(offset + dt).position()))?;
        position.truncate(tolerance, MIN_DENSE_LENGTH);
        if position.len() > self.n {
            return Ok(None);
        }

        let velocity = if self.velocity {
            let mut velocity = ChebyshevExpansion::fit(0.0, span, 2 * self.n, |dt| {
                Ok(sample(offset + dt).velocity())
            })?;
            velocity.truncate(tolerance, MIN_DENSE_LENGTH);
            if velocity.len() > self.n {
                return Ok(None);
            }
            Some(velocity)
        } else {
            None
        };

        Ok(Some(DenseOutputItem {
            jd,
            span,
            tolerance,
            position,
            velocity,
        }))
    }
}

/// Time-ordered, gap-free sequence of dense-output items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseOutput {
    items: Vec<DenseOutputItem>,
}

impl DenseOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from items in any order; they are sorted by start time.
    pub fn from_items(mut items: Vec<DenseOutputItem>) -> Self {
        items.sort_by(|a, b| a.jd.total_cmp(&b.jd));
        DenseOutput { items }
    }

    /// Join a backward and a forward integration sharing their starting epoch.
    pub fn merge(backward: DenseOutput, forward: DenseOutput) -> Self {
        let mut items = backward.items;
        items.extend(forward.items);
        Self::from_items(items)
    }

    pub fn items(&self) -> &[DenseOutputItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn start_jd(&self) -> Option<JulianDate> {
        self.items.first().map(|i| i.jd)
    }

    pub fn end_jd(&self) -> Option<JulianDate> {
        self.items.last().map(|i| i.end_jd())
    }

    pub fn has_velocity(&self) -> bool {
        self.items.first().is_some_and(|i| i.velocity.is_some())
    }

    /// `true` if every item starts exactly where the previous one ends.
    pub fn is_contiguous(&self) -> bool {
        self.items.windows(2).all(|w| w[0].jd + w[0].span == w[1].jd)
    }

    /// Item covering `jd` (the later one on a shared boundary).
    pub fn find(&self, jd: JulianDate) -> Result<&DenseOutputItem, EphemError> {
        let out_of_range = || EphemError::OutOfRange {
            object: "dense output".into(),
            jd,
            start: self.start_jd().unwrap_or(f64::NAN),
            end: self.end_jd().unwrap_or(f64::NAN),
        };
        let i = self.items.partition_point(|it| it.jd <= jd);
        let item = self.items.get(i.checked_sub(1).ok_or_else(out_of_range)?);
        item.filter(|it| it.contains(jd)).ok_or_else(out_of_range)
    }

    pub fn position(&self, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        Ok(self.find(jd)?.position_at(jd))
    }

    pub fn velocity(&self, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        Ok(self.find(jd)?.velocity_at(jd))
    }

    /// Output tolerance in force at `jd`.
    pub fn tolerance(&self, jd: JulianDate) -> Result<f64, EphemError> {
        Ok(self.find(jd)?.tolerance)
    }
}

#[cfg(test)]
mod dense_output_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn orbit(dt: f64) -> IntegrationState {
        let w = 0.0172;
        let (s, c) = (w * dt).sin_cos();
        IntegrationState::new(Vector3::new(c, s, 0.1 * s), Vector3::new(-w * s, w * c, 0.1 * w * c))
    }

    #[test]
    fn test_single_item() {
        let fitter = DenseOutputFitter { n: 25, velocity: true };
        let mut out = Vec::new();
        let mut sample = orbit;
        fitter
            .fit_step(2451545.0, 10.0, 1e-13, &mut sample, &mut out)
            .unwrap();
        assert_eq!(out.len(), 1);
        let item = &out[0];
        assert!(item.position.len() <= 25);
        let jd = 2451548.3;
        assert_abs_diff_eq!((item.position_at(jd) - orbit(3.3).position()).amax(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((item.velocity_at(jd) - orbit(3.3).velocity()).amax(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fast_motion_is_bisected_contiguously() {
        // half a revolution per step does not fit into 8 coefficients
        let fitter = DenseOutputFitter { n: 8, velocity: false };
        let mut out = Vec::new();
        let mut sample = |dt: f64| orbit(dt * 400.0);
        fitter
            .fit_step(2451545.0, 0.5, 1e-10, &mut sample, &mut out)
            .unwrap();
        assert!(out.len() > 1);
        let dense = DenseOutput::from_items(out);
        assert!(dense.is_contiguous());
        assert_eq!(dense.start_jd(), Some(2451545.0));
        assert_eq!(dense.end_jd(), Some(2451545.5));
        assert!(!dense.has_velocity());
    }

    #[test]
    fn test_unfittable_step_fails() {
        let fitter = DenseOutputFitter { n: 4, velocity: false };
        let mut out = Vec::new();
        let mut sample = |dt: f64| orbit(dt * 1.0e4);
        assert!(matches!(
            fitter.fit_step(2451545.0, 1.0, 1e-14, &mut sample, &mut out),
            Err(EphemError::DenseOutputFitFailed { .. })
        ));
    }

    #[test]
    fn test_lookup() {
        let fitter = DenseOutputFitter { n: 20, velocity: false };
        let mut items = Vec::new();
        let mut sample = orbit;
        fitter.fit_step(2451555.0, 10.0, 1e-13, &mut sample, &mut items).unwrap();
        fitter.fit_step(2451545.0, 10.0, 1e-13, &mut sample, &mut items).unwrap();
        let dense = DenseOutput::from_items(items);
        assert!(dense.is_contiguous());
        assert_eq!(dense.find(2451555.0).unwrap().jd, 2451555.0);
        assert!(dense.position(2451565.0).is_ok());
        assert!(matches!(
            dense.position(2451544.0),
            Err(EphemError::OutOfRange { .. })
        ));
        assert!(dense.position(2451566.0).is_err());
    }
}
