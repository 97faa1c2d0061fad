use thiserror::Error;

use crate::integration::collision::CollisionData;

#[derive(Error, Debug, Clone)]
pub enum EphemError {
    #[error("Invalid ephemeris source: {0}")]
    InvalidEphemerisSource(String),

    #[error("Undefined ephemeris constant: {0}")]
    UndefinedConstant(String),

    #[error("Object not available in the ephemeris source: {0}")]
    ObjectNotAvailable(String),

    #[error("Time out of range for '{object}': JD {jd:.6} not in [{start:.6}, {end:.6}]")]
    OutOfRange {
        object: String,
        jd: f64,
        start: f64,
        end: f64,
    },

    #[error("Invalid integration parameter: {0}")]
    InvalidParameter(String),

    #[error("Too short integration time span: {0:.2}. At least 5 days are required.")]
    TooShortTimeSpan(f64),

    #[error("Invalid or undefined semimajor axis / perihelion distance.")]
    InvalidOrbitalElements,

    #[error("Finding {kind} eccentric anomaly (e={e:.6} M={mean_anomaly:.6}): No convergence.")]
    AnomalyNoConvergence {
        kind: &'static str,
        e: f64,
        mean_anomaly: f64,
    },

    #[error("Unable to fit integration dense output: t={jd:.8}, h={span:.8}")]
    DenseOutputFitFailed { jd: f64, span: f64 },

    #[error("Step size underflow at t={jd:.8} (h={step:.3e})")]
    StepSizeUnderflow { jd: f64, step: f64 },

    #[error("Invalid Chebyshev expansion: {0}")]
    InvalidChebyshevExpansion(String),

    #[error("Maximum truncation error exceeded for object '{object}' (tolerance={tolerance:.3e})")]
    MaxTruncationErrorExceeded { object: String, tolerance: f64 },

    #[error("Truncation error {error:.3e} exceeds tolerance {tolerance:.3e} for object '{object}'")]
    TruncationErrorTooLarge {
        object: String,
        error: f64,
        tolerance: f64,
    },

    #[error("Inconsistent ephemeris time span for {0}")]
    InconsistentTimeSpan(String),

    #[error("{0}")]
    Collision(Box<CollisionData>),

    #[error("Integration aborted")]
    Aborted,

    #[error("No object could be successfully integrated.")]
    NoObjectIntegrated,

    #[error("Unable to build worker pool: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for EphemError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        EphemError::ThreadPool(err.to_string())
    }
}

impl EphemError {
    /// `true` for a physical collision, which is reported but is not a software failure.
    pub fn is_collision(&self) -> bool {
        matches!(self, EphemError::Collision(_))
    }
}

impl PartialEq for EphemError {
    fn eq(&self, other: &Self) -> bool {
        use EphemError::*;
        match (self, other) {
            (InvalidEphemerisSource(a), InvalidEphemerisSource(b)) => a == b,
            (UndefinedConstant(a), UndefinedConstant(b)) => a == b,
            (ObjectNotAvailable(a), ObjectNotAvailable(b)) => a == b,
            (
                OutOfRange {
                    object: o1, jd: j1, ..
                },
                OutOfRange {
                    object: o2, jd: j2, ..
                },
            ) => o1 == o2 && j1 == j2,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (TooShortTimeSpan(a), TooShortTimeSpan(b)) => a == b,
            (
                AnomalyNoConvergence { kind: k1, e: e1, .. },
                AnomalyNoConvergence { kind: k2, e: e2, .. },
            ) => k1 == k2 && e1 == e2,
            (DenseOutputFitFailed { jd: a, .. }, DenseOutputFitFailed { jd: b, .. }) => a == b,
            (InvalidChebyshevExpansion(a), InvalidChebyshevExpansion(b)) => a == b,
            (
                MaxTruncationErrorExceeded { object: a, .. },
                MaxTruncationErrorExceeded { object: b, .. },
            ) => a == b,
            (
                TruncationErrorTooLarge { object: a, .. },
                TruncationErrorTooLarge { object: b, .. },
            ) => a == b,
            (InconsistentTimeSpan(a), InconsistentTimeSpan(b)) => a == b,
            (Collision(a), Collision(b)) => a.perturber_id == b.perturber_id,
            (ThreadPool(a), ThreadPool(b)) => a == b,

            // Payload-free or non-comparable: same variant means equal
            (InvalidOrbitalElements, InvalidOrbitalElements) => true,
            (StepSizeUnderflow { .. }, StepSizeUnderflow { .. }) => true,
            (Aborted, Aborted) => true,
            (NoObjectIntegrated, NoObjectIntegrated) => true,

            _ => false,
        }
    }
}
