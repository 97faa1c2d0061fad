//! # Numerical integration of a small body
//!
//! [`Integrator`] propagates one [`IntegrationState`] from a start epoch to an end epoch under
//! the [`ForceModel`](motion::ForceModel) of a [`PerturberSet`], and returns the final state
//! together with the [`DenseOutput`] of the whole path.
//!
//! Loop
//! -----------------
//! 1. The stepper is built with the tolerance of the initial distance and started with the
//!    configured initial step.
//! 2. Before each step the tolerance is revised; when the distance crosses a decade the stepper
//!    is rebuilt at the current state, time and step.
//! 3. The step that would overshoot the end is shortened to the remaining interval, so the
//!    integration lands on the end epoch.
//! 4. Every accepted step is fitted into dense-output items.
//! 5. A step during which the force model saw a point inside a perturber is scanned for a
//!    collision; a confirmed one ends the integration with [`EphemError::Collision`].
//! 6. The abort flag of the [`Monitor`] is polled after each accepted step.
//!
//! Backward integration runs the same loop on `τ = |t − t0|` with the velocity reversed.
//!
//! See also
//! ------------
//! * [`stepper`] – the Runge-Kutta schemes.
//! * [`dense_output`] – fitting of the continuous solution.
//! * [`collision`] – impact localization.
use tracing::debug;

use crate::constants::JulianDate;
use crate::ephem_errors::EphemError;
use crate::monitor::Monitor;
use crate::perturber::PerturberSet;
use crate::precision::{DoubleDouble, ForceScalar, Precision};

pub mod collision;
pub mod dense_output;
pub mod motion;
pub mod params;
pub mod state;
pub mod stepper;

use collision::{localize, CollisionData};
use dense_output::{DenseOutput, DenseOutputFitter};
use motion::{ForceModel, NonGravitationalParams};
use params::IntegrationParams;
use state::IntegrationState;

/// Remaining intervals shorter than this (days) count as reached.
pub const TIME_EPS: f64 = 1.0e-9;

/// Smallest tolerance ever used (integration or output).
pub const MIN_TOLERANCE: f64 = 1.0e-15;

/// Integration tolerance at a given distance.
///
/// `base · 10^max(0, ⌊log10 d⌋)` with `d` the largest absolute position component (au), so the
/// tolerance grows by one order of magnitude per decade of distance beyond 1 au.
pub fn integration_tolerance(base: f64, max_abs_position: f64) -> f64 {
    let decade = if max_abs_position > 0.0 {
        max_abs_position.log10().trunc().max(0.0)
    } else {
        0.0
    };
    base * 10f64.powi(decade as i32)
}

/// Dense-output truncation tolerance for an integration tolerance `tol` at distance `d`.
pub fn output_tolerance(tol: f64, max_abs_position: f64, factor: f64) -> f64 {
    tol.max(MIN_TOLERANCE) * max_abs_position.max(1.0) * factor
}

/// Result of one integration.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationOutput {
    /// State at `end_jd`, physical orientation.
    pub state: IntegrationState,
    pub end_jd: JulianDate,
    /// Continuous solution over the integrated interval, ascending in time.
    pub dense_output: DenseOutput,
    /// Number of accepted steps.
    pub steps: usize,
}

/// Integrates one object among a set of perturbers.
pub struct Integrator<'a> {
    perturbers: &'a PerturberSet,
    params: &'a IntegrationParams,
    non_grav: Option<NonGravitationalParams>,
    monitor: Option<&'a Monitor>,
}

impl<'a> Integrator<'a> {
    pub fn new(perturbers: &'a PerturberSet, params: &'a IntegrationParams) -> Self {
        Integrator {
            perturbers,
            params,
            non_grav: None,
            monitor: None,
        }
    }

    /// Non-gravitational coefficients of the integrated object.
    pub fn with_non_gravitational(mut self, non_grav: Option<NonGravitationalParams>) -> Self {
        self.non_grav = non_grav;
        self
    }

    pub fn with_monitor(mut self, monitor: &'a Monitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Integrate with the force-model precision selected in the parameters.
    ///
    /// See [`Integrator::integrate_with`].
    pub fn integrate(
        &self,
        start_jd: JulianDate,
        initial: IntegrationState,
        end_jd: JulianDate,
    ) -> Result<IntegrationOutput, EphemError> {
        match self.params.precision {
            Precision::Double => self.integrate_with::<f64>(start_jd, initial, end_jd),
            Precision::Extended => self.integrate_with::<DoubleDouble>(start_jd, initial, end_jd),
        }
    }

    /// Integrate from `start_jd` to `end_jd`, either direction, with forces evaluated in `H`.
    ///
    /// Arguments
    /// -----------------
    /// * `start_jd`: epoch of `initial` (TDB).
    /// * `initial`: barycentric ICRS position and velocity (au, au/day).
    /// * `end_jd`: target epoch; a zero-length span returns `initial` with no dense output.
    ///
    /// Return
    /// ----------
    /// * The final state and the dense output, or
    /// * [`EphemError::Collision`] when the object hits a perturber,
    /// * [`EphemError::Aborted`] when the monitor's abort flag is raised,
    /// * [`EphemError::StepSizeUnderflow`], [`EphemError::DenseOutputFitFailed`] or an
    ///   ephemeris error otherwise.
    pub fn integrate_with<H: ForceScalar>(
        &self,
        start_jd: JulianDate,
        initial: IntegrationState,
        end_jd: JulianDate,
    ) -> Result<IntegrationOutput, EphemError> {
        let delta = (end_jd - start_jd).abs();
        if delta == 0.0 {
            return Ok(IntegrationOutput {
                state: initial,
                end_jd,
                dense_output: DenseOutput::new(),
                steps: 0,
            });
        }

        let p = self.params;
        let direction = if end_jd > start_jd { 1.0 } else { -1.0 };
        let physical = |tau: f64| {
            if (delta - tau).abs() <= TIME_EPS {
                end_jd
            } else {
                start_jd + direction * tau
            }
        };

        let mut model =
            ForceModel::<H>::new(self.perturbers, p.force_toggles(), self.non_grav, start_jd, direction);
        let fitter = DenseOutputFitter {
            n: p.dense_output_length,
            velocity: p.velocity_expansions,
        };

        let mut eps = integration_tolerance(p.base_tolerance, initial.max_abs_position());
        let mut stepper = p.stepper.build(eps, eps);
        stepper.initialize(initial.oriented(direction), 0.0, p.initial_step.min(delta));

        let mut items = Vec::new();
        let mut steps = 0;

        loop {
            let tau = stepper.current_time();
            let remaining = delta - tau;
            if remaining <= TIME_EPS {
                break;
            }

            let y = stepper.current_state();
            let revised = integration_tolerance(p.base_tolerance, y.max_abs_position());
            if revised != eps {
                debug!(
                    "tolerance revised from {:.1e} to {:.1e} at {:.6} (distance {:.3} au)",
                    eps,
                    revised,
                    physical(tau),
                    y.max_abs_position()
                );
                eps = revised;
                let dt = stepper.current_time_step();
                stepper = p.stepper.build(eps, eps);
                stepper.initialize(y, tau, dt);
            }
            if stepper.current_time_step() > remaining {
                stepper.initialize(y, tau, remaining);
            }

            let (tau0, tau1) = match stepper.do_step(&mut model) {
                Ok(bounds) => bounds,
                Err(err) => return Err(self.step_failure(err, &model)),
            };
            steps += 1;

            let (jd0, jd1) = (physical(tau0), physical(tau1));
            let (lo, hi) = (jd0.min(jd1), jd0.max(jd1));
            let out_tol = output_tolerance(
                eps,
                stepper.current_state().max_abs_position(),
                p.dense_output_tolerance_factor,
            );
            let st = stepper.as_ref();
            let mut sample = |dt: f64| {
                let t = if direction > 0.0 { tau0 + dt } else { tau1 - dt };
                st.calc_state(t).oriented(direction)
            };
            fitter.fit_step(lo, hi - lo, out_tol, &mut sample, &mut items)?;

            if let Some(candidate) = model.collision_candidate().copied() {
                if let Some(body) = model.candidate_body(&candidate) {
                    let relative = |t: f64| {
                        let jd = model.physical_time(t);
                        let rel = st.calc_state(t).position() - body.position(jd)?;
                        Ok((jd, body.to_body_fixed_matrix(jd) * rel))
                    };
                    let flagged = Some(direction * (candidate.jd - start_jd));
                    if let Some(data) = localize(body, tau0, tau1, flagged, physical(tau1), relative)? {
                        return Err(EphemError::Collision(Box::new(data)));
                    }
                }
                model.reset_collision();
            }

            if let Some(monitor) = self.monitor {
                monitor.record_step();
                if monitor.is_aborted() {
                    return Err(EphemError::Aborted);
                }
            }
        }

        Ok(IntegrationOutput {
            state: stepper.current_state().oriented(direction),
            end_jd,
            dense_output: DenseOutput::from_items(items),
            steps,
        })
    }

    /// Translate a stepper failure into the error reported for the job.
    ///
    /// A step-size underflow after the force model saw a point inside a perturber is reported
    /// as a collision at that point; otherwise it carries the physical time.
    fn step_failure<H: ForceScalar>(&self, err: EphemError, model: &ForceModel<'_, H>) -> EphemError {
        let EphemError::StepSizeUnderflow { jd, step } = err else {
            return err;
        };
        let inside = model
            .collision_candidate()
            .and_then(|c| model.candidate_body(c).map(|body| (c, body)));
        match inside {
            Some((c, body)) => EphemError::Collision(Box::new(CollisionData::new(
                body,
                c.jd,
                c.jd,
                c.body_fixed,
            ))),
            None => EphemError::StepSizeUnderflow {
                jd: model.physical_time(jd),
                step,
            },
        }
    }
}
