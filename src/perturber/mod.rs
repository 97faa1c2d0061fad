//! # Perturbing bodies
//!
//! A [`PerturberBody`] is a gravitating body whose barycentric state comes from an
//! [`EphemerisSource`]. It carries the physical data the force model needs:
//!
//! * the mass parameter `Gm` (au³/day²),
//! * an optional zonal harmonic `J2` together with the *harmonic sphere* radius inside which it
//!   is applied,
//! * a reference ellipsoid (equatorial/polar radii) used for collision detection,
//! * an IAU rotation model giving the body-fixed frame at any epoch.
//!
//! [`PerturberSet`] assembles the list used by one integration job from an [`Ephemerides`]
//! bundle: the Sun and planets, the Earth and Moon (or their barycenter), and optionally massive
//! asteroids and KBOs. The list is sorted by increasing `Gm` so that accelerations are summed
//! from the smallest contributions up.
//!
//! See also
//! ------------
//! * [`crate::integration::motion`] – the force model consuming perturbers.
use nalgebra::{Matrix3, Vector3};
use std::sync::Arc;
use tracing::debug;

use crate::constants::{JulianDate, AU, DEFAULT_MINOR_BODY_RADIUS_KM, RELATIVISTIC_GM_THRESHOLD};
use crate::ephem_errors::EphemError;
use crate::ephemeris::ephemerides::{asteroid_mass_constant, kbo_mass, Ephemerides};
use crate::ephemeris::{BodyState, EphemerisObject, EphemerisSource, SSB};
use crate::time::{centuries_since_j2000, days_since_j2000};

mod moon;
mod planets;

use planets::{planet_data, rotation_elements, J2Source};

/// Kind of a perturbing body, selecting its physical data, rotation model and state source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Sun,
    Mercury,
    Venus,
    Earth,
    /// Earth and Moon combined into one body at their barycenter.
    EarthMoonBarycenter,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
    /// Moon read directly as a barycentric object.
    Moon,
    /// Moon synthesized from its geocentric state and the Earth-Moon barycenter.
    MoonFromBarycenter,
    /// Asteroid or KBO read from a minor-body source.
    MinorBody,
}

/// Perturber selection options of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerturberSelection {
    /// Add the massive asteroids of the asteroid source.
    pub asteroids: bool,
    /// Add the KBOs with a known mass from the KBO source.
    pub kbos: bool,
    /// Model the Earth and the Moon separately instead of a single barycentric body.
    pub separate_earth_moon: bool,
}

/// A gravitating body of the force model.
#[derive(Clone)]
pub struct PerturberBody {
    kind: BodyKind,
    id: String,
    name: String,
    gm: f64,
    j2: f64,
    harmonic_sphere_radius: f64,
    equatorial_radius: f64,
    polar_radius: f64,
    source: Arc<dyn EphemerisSource>,
    emrat: f64,
}

impl std::fmt::Debug for PerturberBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerturberBody")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("gm", &self.gm)
            .field("j2", &self.j2)
            .field("source", &self.source.name())
            .finish()
    }
}

impl PerturberBody {
    /// Build a major body from the fundamental ephemeris source.
    ///
    /// Arguments
    /// -----------------
    /// * `kind`: any [`BodyKind`] except [`BodyKind::MinorBody`].
    /// * `source`: fundamental source providing the state and the constants `GMS`, `GM1`…`GM9`,
    ///   `GMB`, `EMRAT` and, when available, `J2SUN`, `J2E`, `J2M`.
    ///
    /// Return
    /// ----------
    /// * The body, or [`EphemError::UndefinedConstant`] if a required mass constant is missing.
    pub fn planet(kind: BodyKind, source: Arc<dyn EphemerisSource>) -> Result<Self, EphemError> {
        use BodyKind::*;
        let data = planet_data(kind);
        let constant = |name: &str| source.constant_value(name);

        let emrat = match kind {
            Earth | Moon | MoonFromBarycenter => constant("EMRAT")?,
            _ => 0.0,
        };
        let gm = match kind {
            Sun => constant("GMS")?,
            Mercury => constant("GM1")?,
            Venus => constant("GM2")?,
            Earth => constant("GMB")? / (1.0 + 1.0 / emrat),
            EarthMoonBarycenter => constant("GMB")?,
            Mars => constant("GM4")?,
            Jupiter => constant("GM5")?,
            Saturn => constant("GM6")?,
            Uranus => constant("GM7")?,
            Neptune => constant("GM8")?,
            Pluto => constant("GM9")?,
            Moon | MoonFromBarycenter => constant("GMB")? / (1.0 + emrat),
            MinorBody => {
                return Err(EphemError::InvalidParameter(
                    "minor bodies are built with PerturberBody::minor_body".into(),
                ))
            }
        };
        let j2 = match data.j2 {
            J2Source::None => 0.0,
            J2Source::Value(v) => v,
            J2Source::Constant(name) => source.constant_value(name).unwrap_or(0.0),
        };

        Ok(PerturberBody {
            kind,
            id: data.id.to_string(),
            name: data.name.to_string(),
            gm,
            j2,
            harmonic_sphere_radius: data.harmonic_sphere_km / AU,
            equatorial_radius: data.equatorial_radius_km / AU,
            polar_radius: data.polar_radius_km / AU,
            source,
            emrat,
        })
    }

    /// Build an asteroid or KBO perturber.
    ///
    /// The collision radius is half the listed diameter, or
    /// [`DEFAULT_MINOR_BODY_RADIUS_KM`] when unknown. Minor bodies are spherical and carry no J2.
    pub fn minor_body(source: Arc<dyn EphemerisSource>, object: &EphemerisObject, gm: f64) -> Self {
        let radius = object
            .diameter
            .filter(|d| *d > 0.0)
            .map(|d| d / 2.0)
            .unwrap_or(DEFAULT_MINOR_BODY_RADIUS_KM)
            / AU;
        PerturberBody {
            kind: BodyKind::MinorBody,
            id: object.id.clone(),
            name: object.name.clone(),
            gm,
            j2: 0.0,
            harmonic_sphere_radius: 0.0,
            equatorial_radius: radius,
            polar_radius: radius,
            source,
            emrat: 0.0,
        }
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gm(&self) -> f64 {
        self.gm
    }

    pub fn j2(&self) -> f64 {
        self.j2
    }

    pub fn harmonic_sphere_radius(&self) -> f64 {
        self.harmonic_sphere_radius
    }

    pub fn equatorial_radius(&self) -> f64 {
        self.equatorial_radius
    }

    pub fn polar_radius(&self) -> f64 {
        self.polar_radius
    }

    /// `(2·Re + Rp) / 3`, in au.
    pub fn mean_radius(&self) -> f64 {
        (2.0 * self.equatorial_radius + self.polar_radius) / 3.0
    }

    /// Bodies massive enough to enter the post-Newtonian terms.
    pub fn is_relativistic(&self) -> bool {
        self.gm > RELATIVISTIC_GM_THRESHOLD
    }

    pub fn is_oblate(&self) -> bool {
        self.j2 != 0.0 && self.harmonic_sphere_radius > 0.0
    }

    /// `true` if the J2 term applies at distance `r` (au) from the body.
    pub fn within_harmonic_sphere(&self, r: f64) -> bool {
        self.is_oblate() && r < self.harmonic_sphere_radius
    }

    /// Barycentric position and velocity at `jd`.
    pub fn compute_state(&self, jd: JulianDate) -> Result<BodyState, EphemError> {
        match self.kind {
            BodyKind::MoonFromBarycenter => Ok(moon::moon_from_barycenter(
                self.source.state("Mn", jd)?,
                self.source.state("EMB", jd)?,
                self.emrat,
            )),
            _ => self.source.state(&self.id, jd),
        }
    }

    /// Barycentric position at `jd`.
    pub fn position(&self, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        self.combine(|s, id| s.position(id, jd))
    }

    /// Barycentric velocity at `jd`.
    pub fn velocity(&self, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        self.combine(|s, id| s.velocity(id, jd))
    }

    /// Barycentric acceleration at `jd`.
    pub fn acceleration(&self, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        self.combine(|s, id| s.acceleration(id, jd))
    }

    fn combine<F>(&self, query: F) -> Result<Vector3<f64>, EphemError>
    where
        F: Fn(&dyn EphemerisSource, &str) -> Result<Vector3<f64>, EphemError>,
    {
        let source = self.source.as_ref();
        match self.kind {
            BodyKind::MoonFromBarycenter => {
                let geo = query(source, "Mn")?;
                let emb = query(source, "EMB")?;
                Ok(geo + emb - geo / (1.0 + self.emrat))
            }
            _ => query(source, &self.id),
        }
    }

    /// IAU rotation elements `(α₀, δ₀, W)` at `jd`, in radians, `W` reduced to `[0, 2π)`.
    pub fn rotation(&self, jd: JulianDate) -> (f64, f64, f64) {
        let (a0, d0, w) = rotation_elements(
            self.kind,
            centuries_since_j2000(jd),
            days_since_j2000(jd),
        );
        (
            a0.to_radians(),
            d0.to_radians(),
            w.rem_euclid(360.0).to_radians(),
        )
    }

    /// Rotation matrices `(T, V)` from the ICRS equator to the body-fixed frame.
    ///
    /// `T` rotates into the body's equator with the ascending node of the equator on the x axis,
    /// `V` applies the prime-meridian angle. The body-fixed vector is `V·T·r`.
    pub fn to_body_fixed_matrices(&self, jd: JulianDate) -> (Matrix3<f64>, Matrix3<f64>) {
        let (a0, d0, w) = self.rotation(jd);
        let (sa, ca) = a0.sin_cos();
        let (sd, cd) = d0.sin_cos();
        let (sw, cw) = w.sin_cos();
        let t = Matrix3::new(
            -sa, ca, 0.0, //
            -ca * sd, -sa * sd, cd, //
            ca * cd, sa * cd, sd,
        );
        let v = Matrix3::new(
            cw, sw, 0.0, //
            -sw, cw, 0.0, //
            0.0, 0.0, 1.0,
        );
        (t, v)
    }

    /// Rotation matrix from the ICRS equator to the body-fixed frame (`V·T`).
    pub fn to_body_fixed_matrix(&self, jd: JulianDate) -> Matrix3<f64> {
        let (t, v) = self.to_body_fixed_matrices(jd);
        v * t
    }

    /// `true` if the body-fixed vector lies on or inside the reference ellipsoid.
    pub fn inside_reference_ellipsoid(&self, body_fixed: &Vector3<f64>) -> bool {
        let re2 = self.equatorial_radius * self.equatorial_radius;
        let rp2 = self.polar_radius * self.polar_radius;
        (body_fixed.x * body_fixed.x + body_fixed.y * body_fixed.y) / re2
            + body_fixed.z * body_fixed.z / rp2
            <= 1.0
    }
}

/// Ordered list of the perturbers of one integration job.
#[derive(Debug, Clone, Default)]
pub struct PerturberSet {
    bodies: Vec<PerturberBody>,
}

impl PerturberSet {
    /// Assemble the perturbers of a job.
    ///
    /// Arguments
    /// -----------------
    /// * `ephemerides`: the sources of the run.
    /// * `selection`: which optional groups to add.
    /// * `exclude_id`, `exclude_name`: the integrated object itself, skipped when it also appears
    ///   in the asteroid or KBO source (empty strings disable the check; the name comparison is
    ///   case-insensitive).
    ///
    /// Return
    /// ----------
    /// * The set, sorted by increasing `Gm`.
    ///
    /// Asteroids are added when referred to the SSB and their mass constant `MA####` exists in
    /// the fundamental source; KBOs when referred to the SSB and listed in the built-in mass
    /// table. With `separate_earth_moon`, the Moon is read directly when the fundamental source
    /// provides it relative to the SSB, and synthesized from the barycenter otherwise.
    pub fn new(
        ephemerides: &Ephemerides,
        selection: &PerturberSelection,
        exclude_id: &str,
        exclude_name: &str,
    ) -> Result<Self, EphemError> {
        use BodyKind::*;
        let fundamental = ephemerides.fundamental();
        let mut bodies = [Sun, Mercury, Venus, Mars, Jupiter, Saturn, Uranus, Neptune, Pluto]
            .into_iter()
            .map(|kind| PerturberBody::planet(kind, fundamental.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        if selection.separate_earth_moon {
            bodies.push(PerturberBody::planet(Earth, fundamental.clone())?);
            let moon = if fundamental.is_object_available("Mn", SSB) {
                Moon
            } else {
                MoonFromBarycenter
            };
            bodies.push(PerturberBody::planet(moon, fundamental.clone())?);
        } else {
            bodies.push(PerturberBody::planet(EarthMoonBarycenter, fundamental.clone())?);
        }

        let excluded = |o: &EphemerisObject| {
            (!exclude_id.is_empty() && o.id == exclude_id)
                || (!exclude_name.is_empty() && o.name.eq_ignore_ascii_case(exclude_name))
        };

        if selection.asteroids {
            let source = ephemerides.asteroids()?;
            for object in source.objects() {
                if object.origin_id != SSB || excluded(&object) {
                    continue;
                }
                let gm = asteroid_mass_constant(&object.id)
                    .and_then(|name| fundamental.constant_value(&name).ok());
                if let Some(gm) = gm {
                    bodies.push(PerturberBody::minor_body(source.clone(), &object, gm));
                }
            }
        }

        if selection.kbos {
            let source = ephemerides.kbos()?;
            for object in source.objects() {
                if object.origin_id != SSB || excluded(&object) {
                    continue;
                }
                let gm = kbo_mass(&object);
                if gm > 0.0 {
                    bodies.push(PerturberBody::minor_body(source.clone(), &object, gm));
                }
            }
        }

        let set = Self::from_bodies(bodies);
        debug!(
            "{} perturbers ({} relativistic, {} oblate)",
            set.len(),
            set.iter().filter(|b| b.is_relativistic()).count(),
            set.iter().filter(|b| b.is_oblate()).count()
        );
        Ok(set)
    }

    /// Build a set from explicit bodies, sorted by increasing `Gm`.
    pub fn from_bodies(mut bodies: Vec<PerturberBody>) -> Self {
        bodies.sort_by(|a, b| a.gm.total_cmp(&b.gm));
        PerturberSet { bodies }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PerturberBody> {
        self.bodies.iter()
    }

    pub fn bodies(&self) -> &[PerturberBody] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, id: &str) -> Option<&PerturberBody> {
        self.bodies.iter().find(|b| b.id == id)
    }
}

impl<'a> IntoIterator for &'a PerturberSet {
    type Item = &'a PerturberBody;
    type IntoIter = std::slice::Iter<'a, PerturberBody>;

    fn into_iter(self) -> Self::IntoIter {
        self.bodies.iter()
    }
}
