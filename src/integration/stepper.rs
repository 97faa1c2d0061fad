//! # Adaptive Runge–Kutta steppers with continuous output
//!
//! A [`Stepper`] advances the state of an [`OdeSystem`] by one adaptive step at a time and can
//! evaluate the solution anywhere inside the last accepted step. The integration loop relies on
//! that continuous evaluation for dense output and collision localization.
//!
//! Implementations
//! -----------------
//! * [`DormandPrince5`] – 7-stage FSAL pair of order 5(4).
//! * [`Fehlberg78`] – 13-stage pair of order 7(8) propagating the 8th-order solution.
//!
//! Continuous output
//! -----------------
//! After an accepted step of length `h`, a second step of length `h/2` with the same scheme
//! gives the state at the midpoint. Position, velocity and acceleration at the start, the
//! midpoint and the end define the degree-8 Hermite interpolant of position; velocity is its
//! derivative. The interpolation error is then far below the local error of the step itself,
//! so points inside a step are as accurate as its endpoints. The system must be a second-order
//! one written in first-order form (`y = (r, v)`, `y' = (v, a)`), which is always the case here.
//!
//! Step-size control
//! -----------------
//! The error norm is `max_i |eᵢ| / (atol + rtol·max(|yᵢ|, |ŷᵢ|))`. Steps with a norm above 1 are
//! rejected and retried with a smaller step; the new step is `h·clamp(0.9·err^(−1/(q+1)), 0.2, 5)`
//! with `q` the order of the embedded error estimate. After [`MAX_REJECTIONS`] consecutive
//! rejections, or when the step falls below [`MIN_STEP`], the stepper fails with
//! [`EphemError::StepSizeUnderflow`].
use nalgebra::Vector6;
use tracing::trace;

use super::state::IntegrationState;
use crate::ephem_errors::EphemError;

/// Maximum number of consecutive rejected attempts for one step.
pub const MAX_REJECTIONS: usize = 64;

/// Smallest admissible step (days).
pub const MIN_STEP: f64 = 1.0e-10;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Right-hand side of `y' = f(t, y)`.
pub trait OdeSystem {
    fn derivative(&mut self, t: f64, y: &Vector6<f64>) -> Result<Vector6<f64>, EphemError>;
}

impl<F> OdeSystem for F
where
    F: FnMut(f64, &Vector6<f64>) -> Result<Vector6<f64>, EphemError>,
{
    fn derivative(&mut self, t: f64, y: &Vector6<f64>) -> Result<Vector6<f64>, EphemError> {
        self(t, y)
    }
}

/// An adaptive single-step integrator with continuous output.
///
/// The time variable is increasing: callers integrating backward in physical time reverse the
/// velocity beforehand.
pub trait Stepper: Send {
    /// Reset the stepper at `state`, time `t`, with the next trial step `dt`.
    fn initialize(&mut self, state: IntegrationState, t: f64, dt: f64);

    fn current_state(&self) -> IntegrationState;

    fn current_time(&self) -> f64;

    /// Step size that the next call to [`Stepper::do_step`] will try first.
    fn current_time_step(&self) -> f64;

    /// Perform one accepted step.
    ///
    /// Return
    /// ----------
    /// * `(t0, t1)`, the bounds of the accepted step, or the first error raised by the system,
    ///   or [`EphemError::StepSizeUnderflow`] (with `jd` holding the stepper time).
    fn do_step(&mut self, system: &mut dyn OdeSystem) -> Result<(f64, f64), EphemError>;

    /// State at `t` inside the last accepted step.
    fn calc_state(&self, t: f64) -> IntegrationState;
}

/// Available stepper implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepperKind {
    DormandPrince5,
    #[default]
    Fehlberg78,
}

impl StepperKind {
    /// Build a stepper with uniform absolute and relative tolerances.
    pub fn build(self, atol: f64, rtol: f64) -> Box<dyn Stepper> {
        match self {
            StepperKind::DormandPrince5 => Box::new(DormandPrince5::new(atol, rtol)),
            StepperKind::Fehlberg78 => Box::new(Fehlberg78::new(atol, rtol)),
        }
    }
}

impl std::fmt::Display for StepperKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepperKind::DormandPrince5 => write!(f, "Dormand-Prince 5(4)"),
            StepperKind::Fehlberg78 => write!(f, "Runge-Kutta-Fehlberg 7(8)"),
        }
    }
}

/// Step bookkeeping shared by both steppers.
#[derive(Debug, Clone)]
struct StepControl {
    atol: f64,
    rtol: f64,
    exponent: f64,
    t: f64,
    dt: f64,
    y: Vector6<f64>,
    /// `f(t, y)` at the current point, when known.
    dy: Option<Vector6<f64>>,
}

impl StepControl {
    fn new(atol: f64, rtol: f64, error_order: usize) -> Self {
        StepControl {
            atol,
            rtol,
            exponent: 1.0 / (error_order as f64 + 1.0),
            t: 0.0,
            dt: 0.0,
            y: Vector6::zeros(),
            dy: None,
        }
    }

    fn initialize(&mut self, state: IntegrationState, t: f64, dt: f64) {
        self.y = state.0;
        self.t = t;
        self.dt = dt;
        self.dy = None;
    }

    fn error_norm(&self, err: &Vector6<f64>, y_new: &Vector6<f64>) -> f64 {
        err.iter()
            .zip(self.y.iter().zip(y_new.iter()))
            .map(|(e, (a, b))| e.abs() / (self.atol + self.rtol * a.abs().max(b.abs())))
            .fold(0.0, f64::max)
    }

    fn factor(&self, err: f64) -> f64 {
        if err == 0.0 {
            return MAX_FACTOR;
        }
        (SAFETY * err.powf(-self.exponent)).clamp(MIN_FACTOR, MAX_FACTOR)
    }

    /// Derivative at the current point, computed once per point.
    fn current_derivative(&mut self, system: &mut dyn OdeSystem) -> Result<Vector6<f64>, EphemError> {
        match self.dy {
            Some(dy) => Ok(dy),
            None => {
                let dy = system.derivative(self.t, &self.y)?;
                self.dy = Some(dy);
                Ok(dy)
            }
        }
    }

    /// Run attempts until one is accepted.
    ///
    /// `attempt(h)` returns the candidate solution and its error estimate.
    fn adapt<F>(&mut self, mut attempt: F) -> Result<(f64, Vector6<f64>), EphemError>
    where
        F: FnMut(f64) -> Result<(Vector6<f64>, Vector6<f64>), EphemError>,
    {
        let mut h = self.dt;
        for rejections in 0..=MAX_REJECTIONS {
            if !(h.abs() >= MIN_STEP) {
                break;
            }
            let (y_new, err) = attempt(h)?;
            let norm = self.error_norm(&err, &y_new);
            let factor = self.factor(norm);
            let finite = norm.is_finite() && y_new.iter().all(|x| x.is_finite());
            if finite && norm <= 1.0 {
                self.dt = h * factor;
                return Ok((h, y_new));
            }
            trace!(
                "step rejected at t={:.8} h={:.6e} err={:.3e} ({} rejections)",
                self.t,
                h,
                norm,
                rejections + 1
            );
            h *= if finite { factor.min(1.0) } else { MIN_FACTOR };
        }
        Err(EphemError::StepSizeUnderflow {
            jd: self.t,
            step: h,
        })
    }

    /// Move to the end of an accepted step, whose derivative is `dy_new`.
    fn accept(&mut self, h: f64, y_new: Vector6<f64>, dy_new: Vector6<f64>) -> (f64, f64) {
        let t0 = self.t;
        self.t += h;
        self.y = y_new;
        self.dy = Some(dy_new);
        (t0, self.t)
    }
}

/// Node abscissae of the continuous output, each of multiplicity 3.
const HERMITE_NODES: [f64; 9] = [0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0];

/// Degree-8 Hermite interpolant of position over one step, in Newton form on `s ∈ [0, 1]`.
#[derive(Debug, Clone, Default)]
struct StepInterpolant {
    t0: f64,
    h: f64,
    coefficients: [[f64; 9]; 3],
}

impl StepInterpolant {
    /// `nodes` holds `(y, y')` at the start, the midpoint and the end of the step.
    fn new(t0: f64, h: f64, nodes: [(&Vector6<f64>, &Vector6<f64>); 3]) -> Self {
        let coefficients = std::array::from_fn(|axis| {
            // value, first and second derivative with respect to s, over k!
            let values = nodes.map(|(y, dy)| [y[axis], y[axis + 3] * h, 0.5 * dy[axis + 3] * h * h]);
            newton_coefficients(&values)
        });
        StepInterpolant { t0, h, coefficients }
    }

    fn state(&self, t: f64) -> IntegrationState {
        let s = (t - self.t0) / self.h;
        let mut out = Vector6::zeros();
        for (axis, c) in self.coefficients.iter().enumerate() {
            let (p, dp) = newton_eval(c, s);
            out[axis] = p;
            out[axis + 3] = dp / self.h;
        }
        IntegrationState(out)
    }
}

/// Confluent divided differences on [`HERMITE_NODES`].
fn newton_coefficients(values: &[[f64; 3]; 3]) -> [f64; 9] {
    let mut q = [[0.0; 9]; 9];
    for (i, row) in q.iter_mut().enumerate() {
        row[0] = values[i / 3][0];
    }
    for j in 1..9 {
        for i in j..9 {
            let (zi, zk) = (HERMITE_NODES[i], HERMITE_NODES[i - j]);
            q[i][j] = if zi == zk {
                values[i / 3][j]
            } else {
                (q[i][j - 1] - q[i - 1][j - 1]) / (zi - zk)
            };
        }
    }
    std::array::from_fn(|i| q[i][i])
}

/// Newton-form value and derivative at `s`.
fn newton_eval(c: &[f64; 9], s: f64) -> (f64, f64) {
    let mut p = c[8];
    let mut dp = 0.0;
    for i in (0..8).rev() {
        let ds = s - HERMITE_NODES[i];
        dp = dp * ds + p;
        p = p * ds + c[i];
    }
    (p, dp)
}

// -------------------------------------------------------------------------------------------------
// Dormand–Prince 5(4)
// -------------------------------------------------------------------------------------------------

const DP_C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

const DP_A: [[f64; 6]; 7] = [
    [0.0; 6],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

/// 5th-order weights minus embedded 4th-order weights.
const DP_E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

/// One Dormand-Prince attempt of length `h` from `(t, y)` with `k0 = f(t, y)`.
///
/// Return
/// ----------
/// * The 5th-order solution, the error estimate and `f` at the solution.
fn dp5_attempt(
    system: &mut dyn OdeSystem,
    t: f64,
    y: &Vector6<f64>,
    k0: &Vector6<f64>,
    h: f64,
) -> Result<(Vector6<f64>, Vector6<f64>, Vector6<f64>), EphemError> {
    let mut k = [Vector6::zeros(); 7];
    k[0] = *k0;
    for i in 1..7 {
        let mut yi = *y;
        for (j, kj) in k.iter().enumerate().take(i) {
            yi += kj * (h * DP_A[i][j]);
        }
        k[i] = system.derivative(t + DP_C[i] * h, &yi)?;
    }
    // the last stage is evaluated at the 5th-order solution
    let y5 = y + (k[0] * DP_A[6][0]
        + k[2] * DP_A[6][2]
        + k[3] * DP_A[6][3]
        + k[4] * DP_A[6][4]
        + k[5] * DP_A[6][5])
        * h;
    let err = k
        .iter()
        .zip(DP_E.iter())
        .fold(Vector6::<f64>::zeros(), |acc, (ki, e)| acc + ki * *e)
        * h;
    Ok((y5, err, k[6]))
}

/// Dormand–Prince 5(4) stepper.
#[derive(Debug, Clone)]
pub struct DormandPrince5 {
    ctl: StepControl,
    interpolant: Option<StepInterpolant>,
}

impl DormandPrince5 {
    pub fn new(atol: f64, rtol: f64) -> Self {
        DormandPrince5 {
            ctl: StepControl::new(atol, rtol, 4),
            interpolant: None,
        }
    }
}

impl Stepper for DormandPrince5 {
    fn initialize(&mut self, state: IntegrationState, t: f64, dt: f64) {
        self.ctl.initialize(state, t, dt);
        self.interpolant = None;
    }

    fn current_state(&self) -> IntegrationState {
        IntegrationState(self.ctl.y)
    }

    fn current_time(&self) -> f64 {
        self.ctl.t
    }

    fn current_time_step(&self) -> f64 {
        self.ctl.dt
    }

    fn do_step(&mut self, system: &mut dyn OdeSystem) -> Result<(f64, f64), EphemError> {
        let k0 = self.ctl.current_derivative(system)?;
        let (t, y) = (self.ctl.t, self.ctl.y);

        let mut dy_new = k0;
        let (h, y_new) = self.ctl.adapt(|h| {
            let (y5, err, k6) = dp5_attempt(system, t, &y, &k0, h)?;
            dy_new = k6;
            Ok((y5, err))
        })?;

        let (y_mid, _, dy_mid) = dp5_attempt(system, t, &y, &k0, 0.5 * h)?;
        self.interpolant = Some(StepInterpolant::new(
            t,
            h,
            [(&y, &k0), (&y_mid, &dy_mid), (&y_new, &dy_new)],
        ));
        Ok(self.ctl.accept(h, y_new, dy_new))
    }

    fn calc_state(&self, t: f64) -> IntegrationState {
        match &self.interpolant {
            Some(interpolant) => interpolant.state(t),
            None => IntegrationState(self.ctl.y),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Runge–Kutta–Fehlberg 7(8)
// -------------------------------------------------------------------------------------------------

const RKF_STAGES: usize = 13;

const RKF_C: [f64; RKF_STAGES] = [
    0.0,
    2.0 / 27.0,
    1.0 / 9.0,
    1.0 / 6.0,
    5.0 / 12.0,
    1.0 / 2.0,
    5.0 / 6.0,
    1.0 / 6.0,
    2.0 / 3.0,
    1.0 / 3.0,
    1.0,
    0.0,
    1.0,
];

const RKF_A: [[f64; 12]; RKF_STAGES] = [
    [0.0; 12],
    [2.0 / 27.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 36.0, 1.0 / 12.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 24.0, 0.0, 1.0 / 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [
        -25.0 / 108.0,
        0.0,
        0.0,
        125.0 / 108.0,
        -65.0 / 27.0,
        125.0 / 54.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        31.0 / 300.0,
        0.0,
        0.0,
        0.0,
        61.0 / 225.0,
        -2.0 / 9.0,
        13.0 / 900.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2.0,
        0.0,
        0.0,
        -53.0 / 6.0,
        704.0 / 45.0,
        -107.0 / 9.0,
        67.0 / 90.0,
        3.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -91.0 / 108.0,
        0.0,
        0.0,
        23.0 / 108.0,
        -976.0 / 135.0,
        311.0 / 54.0,
        -19.0 / 60.0,
        17.0 / 6.0,
        -1.0 / 12.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        2383.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -301.0 / 82.0,
        2133.0 / 4100.0,
        45.0 / 82.0,
        45.0 / 164.0,
        18.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        3.0 / 205.0,
        0.0,
        0.0,
        0.0,
        0.0,
        -6.0 / 41.0,
        -3.0 / 205.0,
        -3.0 / 41.0,
        3.0 / 41.0,
        6.0 / 41.0,
        0.0,
        0.0,
    ],
    [
        -1777.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -289.0 / 82.0,
        2193.0 / 4100.0,
        51.0 / 82.0,
        33.0 / 164.0,
        12.0 / 41.0,
        0.0,
        1.0,
    ],
];

/// 8th-order weights.
const RKF_B: [f64; RKF_STAGES] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    0.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

/// One Fehlberg attempt of length `h` from `(t, y)` with `k0 = f(t, y)`.
///
/// Return
/// ----------
/// * The 8th-order solution and the error estimate.
fn rkf78_attempt(
    system: &mut dyn OdeSystem,
    t: f64,
    y: &Vector6<f64>,
    k0: &Vector6<f64>,
    h: f64,
) -> Result<(Vector6<f64>, Vector6<f64>), EphemError> {
    let mut k = [Vector6::zeros(); RKF_STAGES];
    k[0] = *k0;
    for i in 1..RKF_STAGES {
        let mut yi = *y;
        for (j, kj) in k.iter().enumerate().take(i) {
            let a = RKF_A[i][j];
            if a != 0.0 {
                yi += kj * (h * a);
            }
        }
        k[i] = system.derivative(t + RKF_C[i] * h, &yi)?;
    }
    let y8 = y + k
        .iter()
        .zip(RKF_B.iter())
        .fold(Vector6::<f64>::zeros(), |acc, (ki, b)| acc + ki * *b)
        * h;
    let err = (k[0] + k[10] - k[11] - k[12]) * (h * 41.0 / 840.0);
    Ok((y8, err))
}

/// Runge–Kutta–Fehlberg 7(8) stepper.
#[derive(Debug, Clone)]
pub struct Fehlberg78 {
    ctl: StepControl,
    interpolant: Option<StepInterpolant>,
}

impl Fehlberg78 {
    pub fn new(atol: f64, rtol: f64) -> Self {
        Fehlberg78 {
            ctl: StepControl::new(atol, rtol, 7),
            interpolant: None,
        }
    }
}

impl Stepper for Fehlberg78 {
    fn initialize(&mut self, state: IntegrationState, t: f64, dt: f64) {
        self.ctl.initialize(state, t, dt);
        self.interpolant = None;
    }

    fn current_state(&self) -> IntegrationState {
        IntegrationState(self.ctl.y)
    }

    fn current_time(&self) -> f64 {
        self.ctl.t
    }

    fn current_time_step(&self) -> f64 {
        self.ctl.dt
    }

    fn do_step(&mut self, system: &mut dyn OdeSystem) -> Result<(f64, f64), EphemError> {
        let k0 = self.ctl.current_derivative(system)?;
        let (t, y) = (self.ctl.t, self.ctl.y);

        let (h, y_new) = self
            .ctl
            .adapt(|h| rkf78_attempt(system, t, &y, &k0, h))?;

        // the derivative at the new point closes the interpolant and seeds the next step
        let dy_new = system.derivative(t + h, &y_new)?;
        let (y_mid, _) = rkf78_attempt(system, t, &y, &k0, 0.5 * h)?;
        let dy_mid = system.derivative(t + 0.5 * h, &y_mid)?;
        self.interpolant = Some(StepInterpolant::new(
            t,
            h,
            [(&y, &k0), (&y_mid, &dy_mid), (&y_new, &dy_new)],
        ));
        Ok(self.ctl.accept(h, y_new, dy_new))
    }

    fn calc_state(&self, t: f64) -> IntegrationState {
        match &self.interpolant {
            Some(interpolant) => interpolant.state(t),
            None => IntegrationState(self.ctl.y),
        }
    }
}
