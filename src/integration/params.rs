//! # Integration parameters
//!
//! [`IntegrationParams`] gathers the numerical and physical settings of one integration:
//! stepper choice, tolerances, dense-output fitting, and the force-model toggles.
//!
//! ## Example
//!
//! ```rust
//! use ephemgen::integration::params::IntegrationParams;
//! use ephemgen::integration::stepper::StepperKind;
//!
//! let params = IntegrationParams::builder()
//!     .stepper(StepperKind::DormandPrince5)
//!     .dense_output_tolerance_factor(500.0)
//!     .relativistic(false)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.dense_output_length, 25);
//! ```
use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use super::motion::ForceToggles;
use super::stepper::StepperKind;
use crate::ephem_errors::EphemError;
use crate::precision::Precision;

/// Numerical and physical settings of an integration.
///
/// Fields
/// -----------------
/// * `stepper` – Runge-Kutta scheme.
/// * `base_tolerance` – local error tolerance at distances below 10 au; it grows by one
///   order of magnitude per decade of distance.
/// * `dense_output_tolerance_factor` – multiplier turning the integration tolerance into the
///   dense-output truncation tolerance.
/// * `dense_output_length` – maximum number of Chebyshev coefficients of a dense-output item.
/// * `initial_step` – first trial step (days).
/// * `precision` – scalar type of the force-model arithmetic.
/// * `relativistic`, `figure_effects`, `non_gravitational` – force-model toggles.
/// * `velocity_expansions` – also fit velocity in the dense output.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationParams {
    pub stepper: StepperKind,
    pub base_tolerance: f64,
    pub dense_output_tolerance_factor: f64,
    pub dense_output_length: usize,
    pub initial_step: f64,
    pub precision: Precision,
    pub relativistic: bool,
    pub figure_effects: bool,
    pub non_gravitational: bool,
    pub velocity_expansions: bool,
}

impl IntegrationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> IntegrationParamsBuilder {
        IntegrationParamsBuilder::new()
    }

    /// Force-model toggles of these parameters.
    pub fn force_toggles(&self) -> ForceToggles {
        ForceToggles {
            relativistic: self.relativistic,
            figure_effects: self.figure_effects,
            non_gravitational: self.non_gravitational,
        }
    }

    /// Check the parameters.
    ///
    /// Return
    /// ----------
    /// * [`EphemError::InvalidParameter`] if a tolerance or step is not strictly positive, the
    ///   dense-output factor lies outside `[100, 10000]`, or the dense-output length is below 4.
    pub fn validate(&self) -> Result<(), EphemError> {
        type B = IntegrationParamsBuilder;
        if !B::gt0(self.base_tolerance) {
            return Err(EphemError::InvalidParameter(
                "base_tolerance must be > 0".into(),
            ));
        }
        if !B::in_range(self.dense_output_tolerance_factor, 100.0, 10_000.0) {
            return Err(EphemError::InvalidParameter(
                "dense_output_tolerance_factor must be in [100, 10000]".into(),
            ));
        }
        if self.dense_output_length < 4 {
            return Err(EphemError::InvalidParameter(
                "dense_output_length must be >= 4".into(),
            ));
        }
        if !B::gt0(self.initial_step) {
            return Err(EphemError::InvalidParameter(
                "initial_step must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for IntegrationParams {
    fn default() -> Self {
        IntegrationParams {
            stepper: StepperKind::default(),
            base_tolerance: 1.0e-15,
            dense_output_tolerance_factor: 1500.0,
            dense_output_length: 25,
            initial_step: 10.0,
            precision: Precision::default(),
            relativistic: true,
            figure_effects: true,
            non_gravitational: true,
            velocity_expansions: false,
        }
    }
}

/// Builder for [`IntegrationParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct IntegrationParamsBuilder {
    params: IntegrationParams,
}

impl IntegrationParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stepper(mut self, v: StepperKind) -> Self {
        self.params.stepper = v;
        self
    }
    pub fn base_tolerance(mut self, v: f64) -> Self {
        self.params.base_tolerance = v;
        self
    }
    pub fn dense_output_tolerance_factor(mut self, v: f64) -> Self {
        self.params.dense_output_tolerance_factor = v;
        self
    }
    pub fn dense_output_length(mut self, v: usize) -> Self {
        self.params.dense_output_length = v;
        self
    }
    pub fn initial_step(mut self, v: f64) -> Self {
        self.params.initial_step = v;
        self
    }
    pub fn precision(mut self, v: Precision) -> Self {
        self.params.precision = v;
        self
    }
    pub fn relativistic(mut self, v: bool) -> Self {
        self.params.relativistic = v;
        self
    }
    pub fn figure_effects(mut self, v: bool) -> Self {
        self.params.figure_effects = v;
        self
    }
    pub fn non_gravitational(mut self, v: bool) -> Self {
        self.params.non_gravitational = v;
        self
    }
    pub fn velocity_expansions(mut self, v: bool) -> Self {
        self.params.velocity_expansions = v;
        self
    }

    /// Return true iff x > 0.0 and not NaN.
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    #[inline]
    fn in_range(x: f64, lo: f64, hi: f64) -> bool {
        matches!(x.partial_cmp(&lo), Some(Greater) | Some(Equal))
            && matches!(hi.partial_cmp(&x), Some(Greater) | Some(Equal))
    }

    /// Validate and return the parameters.
    ///
    /// See [`IntegrationParams::validate`].
    pub fn build(self) -> Result<IntegrationParams, EphemError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl fmt::Display for IntegrationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 46;
            writeln!(f, "Integration Parameters")?;
            writeln!(f, "----------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = " ".repeat(PARAM_COL.saturating_sub(s.len()).max(1));
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Stepper]")?;
            line!("stepper              = {}", self.stepper, "Runge-Kutta scheme")?;
            line!("base_tolerance       = {:.1e}", self.base_tolerance, "Local error below 10 au")?;
            line!("initial_step         = {:.3} d", self.initial_step, "First trial step")?;

            writeln!(f, "\n[Dense output]")?;
            line!(
                "tolerance_factor     = {:.1}",
                self.dense_output_tolerance_factor,
                "Output / integration tolerance"
            )?;
            line!("length               = {}", self.dense_output_length, "Max coefficients per item")?;
            line!("velocity_expansions  = {}", self.velocity_expansions, "Fit velocity too")?;

            writeln!(f, "\n[Force model]")?;
            line!("precision            = {}", self.precision, "Force arithmetic")?;
            line!("relativistic         = {}", self.relativistic, "PPN corrections")?;
            line!("figure_effects       = {}", self.figure_effects, "J2 of oblate bodies")?;
            line!("non_gravitational    = {}", self.non_gravitational, "Marsden-Sekanina model")
        } else {
            write!(
                f,
                "IntegrationParams(stepper={}, tol={:.1e}, dense_factor={:.0}, n={}, precision={}, rel={}, fig={}, ng={}, vel={})",
                self.stepper,
                self.base_tolerance,
                self.dense_output_tolerance_factor,
                self.dense_output_length,
                self.precision,
                self.relativistic,
                self.figure_effects,
                self.non_gravitational,
                self.velocity_expansions
            )
        }
    }
}

#[cfg(test)]
mod params_test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let p = IntegrationParams::builder().build().unwrap();
        assert_eq!(p, IntegrationParams::default());
        assert_eq!(p.stepper, StepperKind::Fehlberg78);
        assert!(p.force_toggles().relativistic);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(IntegrationParams::builder().base_tolerance(0.0).build().is_err());
        assert!(IntegrationParams::builder().base_tolerance(f64::NAN).build().is_err());
        assert!(IntegrationParams::builder()
            .dense_output_tolerance_factor(50.0)
            .build()
            .is_err());
        assert!(IntegrationParams::builder().dense_output_length(3).build().is_err());
        assert!(IntegrationParams::builder().initial_step(-1.0).build().is_err());
    }

    #[test]
    fn test_display() {
        let p = IntegrationParams::default();
        assert!(p.to_string().starts_with("IntegrationParams(stepper="));
        let table = format!("{p:#}");
        assert!(table.contains("[Dense output]"));
        assert!(table.contains("non_gravitational"));
        assert!(table.contains("precision            = double"));
    }
}
