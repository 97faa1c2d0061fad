//! Initial conditions of one object to integrate.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{JulianDate, ObjectNumber};
use crate::elements::{ecliptic_to_equatorial, state_vectors_from_elements, OrbitalElements};
use crate::ephem_errors::EphemError;
use crate::ephemeris::EphemerisSource;
use crate::integration::motion::NonGravitationalParams;
use crate::integration::state::IntegrationState;

/// Object data of an integration job.
///
/// Fields
/// -----------------
/// * `id`, `name` – identifiers copied to the generated ephemeris; either may be empty.
/// * `epoch` – epoch of the state vectors (JD TDB).
/// * `position`, `velocity` – barycentric ICRS state (au, au/day).
/// * `h`, `g`, `b_v`, `d` – optional physical data (magnitude, slope, color, diameter in km).
/// * `non_gravitational` – optional `A1, A2, A3` of the Marsden-Sekanina model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntegrationObjectData {
    pub id: String,
    pub name: String,
    pub epoch: JulianDate,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub h: Option<f64>,
    pub g: Option<f64>,
    pub b_v: Option<f64>,
    pub d: Option<f64>,
    pub non_gravitational: Option<NonGravitationalParams>,
}

impl IntegrationObjectData {
    pub fn new(
        id: &str,
        name: &str,
        epoch: JulianDate,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
    ) -> Self {
        IntegrationObjectData {
            id: id.to_string(),
            name: name.to_string(),
            epoch,
            position,
            velocity,
            ..Default::default()
        }
    }

    /// Build from heliocentric elements referred to the J2000 ecliptic.
    ///
    /// Arguments
    /// -----------------
    /// * `source`: fundamental ephemeris providing `GMS` and the Sun (`"Sn"`).
    /// * `elements`: osculating elements at `epoch`.
    /// * `epoch`: JD TDB.
    ///
    /// Return
    /// ----------
    /// * The object with its barycentric ICRS state, or an element or ephemeris error.
    pub fn from_heliocentric_ecliptic_elements(
        source: &dyn EphemerisSource,
        id: &str,
        name: &str,
        elements: &OrbitalElements,
        epoch: JulianDate,
    ) -> Result<Self, EphemError> {
        let gms = source.constant_value("GMS")?;
        let (r, v) = state_vectors_from_elements(elements, epoch, gms, 0.0)?;
        let sun_position = source.position("Sn", epoch)?;
        let sun_velocity = source.velocity("Sn", epoch)?;
        Ok(Self::new(
            id,
            name,
            epoch,
            ecliptic_to_equatorial(&r) + sun_position,
            ecliptic_to_equatorial(&v) + sun_velocity,
        ))
    }

    pub fn with_physical_data(mut self, h: Option<f64>, g: Option<f64>, b_v: Option<f64>, d: Option<f64>) -> Self {
        self.h = h;
        self.g = g;
        self.b_v = b_v;
        self.d = d;
        self
    }

    pub fn with_non_gravitational(mut self, params: NonGravitationalParams) -> Self {
        self.non_gravitational = Some(params);
        self
    }

    pub fn state(&self) -> IntegrationState {
        IntegrationState::new(self.position, self.velocity)
    }

    /// Key of the object in result maps: the id, else the name, else `None`.
    pub fn object_number(&self) -> Option<ObjectNumber> {
        if !self.id.is_empty() {
            Some(self.id.trim().into())
        } else if !self.name.is_empty() {
            Some(ObjectNumber::String(self.name.clone()))
        } else {
            None
        }
    }

    /// Label used in log messages.
    pub fn label(&self) -> String {
        match (self.id.is_empty(), self.name.is_empty()) {
            (false, false) => format!("({}) {}", self.id, self.name),
            (false, true) => self.id.clone(),
            (true, false) => self.name.clone(),
            (true, true) => "<unnamed>".into(),
        }
    }
}

#[cfg(test)]
mod job_test {
    use super::*;
    use crate::unit_test_global::toy_fundamental;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_elements_is_barycentric_equatorial() {
        let source = toy_fundamental(true);
        let el = OrbitalElements {
            semimajor_axis: 2.0,
            eccentricity: 0.1,
            inclination: 5.0,
            ..Default::default()
        };
        let epoch = 2451545.0;
        let obj = IntegrationObjectData::from_heliocentric_ecliptic_elements(
            source.as_ref(),
            "1234",
            "Test",
            &el,
            epoch,
        )
        .unwrap();
        // perihelion on the x axis, unaffected by the x-axis rotation
        assert_relative_eq!(obj.position.x, 1.8, max_relative = 1e-12);
        assert!(obj.velocity.z.abs() > 0.0);
        assert_eq!(obj.object_number(), Some(ObjectNumber::Int(1234)));
        assert_eq!(obj.label(), "(1234) Test");
    }

    #[test]
    fn test_keys() {
        let v = Vector3::zeros();
        let named = IntegrationObjectData::new("", "Oumuamua", 2451545.0, v, v);
        assert_eq!(named.object_number(), Some(ObjectNumber::String("Oumuamua".into())));
        let anon = IntegrationObjectData::new("", "", 2451545.0, v, v);
        assert_eq!(anon.object_number(), None);
        assert_eq!(anon.label(), "<unnamed>");
    }
}
