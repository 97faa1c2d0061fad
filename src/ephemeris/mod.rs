//! # Ephemeris sources
//!
//! The integration engine never reads ephemeris files itself. It talks to one or more
//! [`EphemerisSource`] handles, which provide the barycentric state of named solar-system
//! bodies, their time derivatives, and the numerical constants (masses, J2 coefficients,
//! Earth/Moon mass ratio…) that accompany an ephemeris release.
//!
//! Components
//! -----------------
//! * [`EphemerisSource`] – the trait consumed by perturbers and by the orchestrator.
//! * [`BodyState`] – position plus optional velocity/acceleration, with component-wise
//!   arithmetic (used to synthesize the Moon from Earth-Moon barycenter data).
//! * [`EphemerisObject`] – object metadata as listed by a source.
//! * [`chebyshev_source::ChebyshevEphemeris`] – in-memory source backed by day-aligned
//!   Chebyshev expansions; it reads back the records produced by [`crate::compaction`].
//! * [`ephemerides::Ephemerides`] – the fundamental/asteroid/KBO bundle handed to each job.
//!
//! Units
//! -----------------
//! * Time: Julian Date, TDB scale.
//! * Position: au; velocity: au/day; acceleration: au/day².
//! * Gravitational parameters: au³/day².
//!
//! Out-of-range queries fail with [`EphemError::OutOfRange`](crate::ephem_errors::EphemError::OutOfRange).
use nalgebra::Vector3;
use std::ops::{Add, Mul, Sub};

use crate::constants::JulianDate;
use crate::ephem_errors::EphemError;

pub mod chebyshev_source;
pub mod ephemerides;
pub mod records;

/// Identifier of the solar system barycenter, the origin of all perturber states.
pub const SSB: &str = "SSB";

/// Object metadata as listed by an ephemeris source.
///
/// Fields
/// -----------------
/// * `id` – unique object identifier in the source (`"Ea"`, `"Ju"`, `"1"`, `"136199"`…).
/// * `name` – human-readable name, possibly empty.
/// * `origin_id` – identifier of the origin the states are referred to (`"SSB"`, `"Ea"`…).
/// * `diameter` – optional diameter (km), used as collision radius for minor bodies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EphemerisObject {
    pub id: String,
    pub name: String,
    pub origin_id: String,
    pub diameter: Option<f64>,
}

/// State of a body at one instant.
///
/// Holds the position and, optionally, velocity and acceleration. Arithmetic is component-wise;
/// optional fields propagate **only when present on both operands**.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyState {
    pub position: Vector3<f64>,
    pub velocity: Option<Vector3<f64>>,
    pub acceleration: Option<Vector3<f64>>,
}

impl BodyState {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        BodyState {
            position,
            velocity: Some(velocity),
            acceleration: None,
        }
    }
}

fn zip_opt(
    a: Option<Vector3<f64>>,
    b: Option<Vector3<f64>>,
    op: impl Fn(Vector3<f64>, Vector3<f64>) -> Vector3<f64>,
) -> Option<Vector3<f64>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(op(x, y)),
        _ => None,
    }
}

impl Add for BodyState {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        BodyState {
            position: self.position + other.position,
            velocity: zip_opt(self.velocity, other.velocity, |a, b| a + b),
            acceleration: zip_opt(self.acceleration, other.acceleration, |a, b| a + b),
        }
    }
}

impl Sub for BodyState {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        BodyState {
            position: self.position - other.position,
            velocity: zip_opt(self.velocity, other.velocity, |a, b| a - b),
            acceleration: zip_opt(self.acceleration, other.acceleration, |a, b| a - b),
        }
    }
}

impl Mul<f64> for BodyState {
    type Output = Self;

    fn mul(self, k: f64) -> Self::Output {
        BodyState {
            position: self.position * k,
            velocity: self.velocity.map(|v| v * k),
            acceleration: self.acceleration.map(|a| a * k),
        }
    }
}

/// A provider of solar-system body states and ephemeris constants.
///
/// Implementations must be shareable between worker threads: the orchestrator hands the same
/// source to every job. States are returned **relative to the object's own origin**
/// ([`EphemerisObject::origin_id`]); perturbers only use objects referred to [`SSB`], except
/// for the geocentric Moon, which is combined with the Earth-Moon barycenter.
///
/// See also
/// -----------------
/// * [`chebyshev_source::ChebyshevEphemeris`] – in-memory implementation.
/// * [`crate::perturber::PerturberBody`] – main consumer.
pub trait EphemerisSource: Send + Sync {
    /// Short name of the source, for diagnostics.
    fn name(&self) -> &str;

    /// First Julian Date covered by every object of the source.
    fn start_jd(&self) -> JulianDate;

    /// Last Julian Date covered by every object of the source.
    fn end_jd(&self) -> JulianDate;

    /// All objects available in this source.
    fn objects(&self) -> Vec<EphemerisObject>;

    /// `true` if `id` is provided, referred to `origin_id`.
    fn is_object_available(&self, id: &str, origin_id: &str) -> bool;

    /// Value of a named numerical constant (e.g. `"GMS"`, `"EMRAT"`, `"MA0001"`).
    fn constant_value(&self, name: &str) -> Result<f64, EphemError>;

    fn is_constant_available(&self, name: &str) -> bool {
        self.constant_value(name).is_ok()
    }

    /// Position and velocity of `id` at `jd`.
    fn state(&self, id: &str, jd: JulianDate) -> Result<BodyState, EphemError>;

    /// Position of `id` at `jd`.
    fn position(&self, id: &str, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        Ok(self.state(id, jd)?.position)
    }

    /// Velocity of `id` at `jd`.
    fn velocity(&self, id: &str, jd: JulianDate) -> Result<Vector3<f64>, EphemError>;

    /// Acceleration of `id` at `jd`.
    fn acceleration(&self, id: &str, jd: JulianDate) -> Result<Vector3<f64>, EphemError>;

    /// Check that `jd` lies inside the time range of the source.
    fn check_range(&self, id: &str, jd: JulianDate) -> Result<(), EphemError> {
        if jd < self.start_jd() || jd > self.end_jd() {
            return Err(EphemError::OutOfRange {
                object: id.to_string(),
                jd,
                start: self.start_jd(),
                end: self.end_jd(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod body_state_test {
    use super::*;

    #[test]
    fn test_optional_fields_propagate_only_when_both_present() {
        let a = BodyState::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        let b = BodyState {
            position: Vector3::new(2.0, 0.0, 0.0),
            velocity: None,
            acceleration: None,
        };
        let c = a.clone() + b;
        assert_eq!(c.position.x, 3.0);
        assert!(c.velocity.is_none());

        let d = a.clone() - a.clone() * 2.0;
        assert_eq!(d.position.x, -1.0);
        assert_eq!(d.velocity, Some(Vector3::new(0.0, -1.0, 0.0)));
    }
}
