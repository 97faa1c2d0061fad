//! # Equations of motion
//!
//! [`ForceModel`] evaluates the acceleration of a massless body moving among the perturbers of
//! a [`PerturberSet`]:
//!
//! * Newtonian point-mass attraction of every perturber,
//! * first-order post-Newtonian (PPN, β = γ = 1) corrections for the perturbers with
//!   `Gm > 1e-14`,
//! * the J2 zonal term of oblate perturbers, inside their harmonic sphere,
//! * a Marsden-Sekanina non-gravitational acceleration when the object carries `A1, A2, A3`.
//!
//! The arithmetic runs in a generic scalar `H` (a [`ForceScalar`], `f64` by default) and all
//! terms are accumulated per axis with [`CompensatedSum`]. Ephemeris queries and the
//! integrator stay in `f64`; vectors are lifted to `H` on entry and lowered on exit.
//!
//! While evaluating, the model also watches for positions inside a perturber's reference
//! ellipsoid and records the first such [`CollisionCandidate`].
//!
//! See also
//! ------------
//! * [`crate::integration::collision`] – confirmation and localization of candidates.
use nalgebra::{Matrix3, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use super::stepper::OdeSystem;
use crate::constants::{JulianDate, VLIGHT_AU_SQUARED};
use crate::ephem_errors::EphemError;
use crate::perturber::{PerturberBody, PerturberSet};
use crate::precision::ForceScalar;
use crate::summation::CompensatedSum;

/// Scale factor of the Marsden-Sekanina law (normalizes `g(1 au) = 1`).
const NG_ALPHA: f64 = 0.111_262_042_6;
const NG_R0: f64 = 2.808;
const NG_M: f64 = 2.15;
const NG_N: f64 = 5.093;
const NG_K: f64 = 4.6142;

/// Radial, transverse and normal non-gravitational coefficients (au/day²).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NonGravitationalParams {
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
}

impl NonGravitationalParams {
    pub fn new(a1: f64, a2: f64, a3: f64) -> Self {
        NonGravitationalParams { a1, a2, a3 }
    }

    pub fn is_zero(&self) -> bool {
        self.a1 == 0.0 && self.a2 == 0.0 && self.a3 == 0.0
    }
}

/// Marsden-Sekanina water-sublimation law `g(r)`.
pub fn marsden_g(r: f64) -> f64 {
    let x = r / NG_R0;
    NG_ALPHA * x.powf(-NG_M) * (1.0 + x.powf(NG_N)).powf(-NG_K)
}

/// Which force terms are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceToggles {
    pub relativistic: bool,
    pub figure_effects: bool,
    pub non_gravitational: bool,
}

impl Default for ForceToggles {
    fn default() -> Self {
        ForceToggles {
            relativistic: true,
            figure_effects: true,
            non_gravitational: true,
        }
    }
}

/// First evaluation point found inside a perturber since the last reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionCandidate {
    /// Physical time of the evaluation.
    pub jd: JulianDate,
    /// Index of the perturber in the set.
    pub perturber: usize,
    /// Body-fixed position relative to the perturber (au).
    pub body_fixed: Vector3<f64>,
}

/// Perturber quantities of one evaluation, lifted to `H`.
#[derive(Debug, Clone, Copy)]
struct PerturberSample<H: ForceScalar> {
    gm: H,
    /// `R_j − R`
    rji: Vector3<H>,
    rij: H,
    velocity: Vector3<H>,
    acceleration: Vector3<H>,
    relativistic: bool,
}

/// Force model of one integration job.
///
/// The model maps integrator time `τ ≥ 0` to physical time `t0 + direction·τ` and implements
/// [`OdeSystem`] on the oriented state `(r, direction·v)`, so that the same forward-running
/// stepper serves both integration directions.
pub struct ForceModel<'a, H = f64>
where
    H: ForceScalar,
{
    perturbers: &'a PerturberSet,
    toggles: ForceToggles,
    non_grav: Option<NonGravitationalParams>,
    sun: Option<usize>,
    t0: JulianDate,
    direction: f64,
    collision: Option<CollisionCandidate>,
    samples: Vec<PerturberSample<H>>,
    _scalar: PhantomData<H>,
}

#[inline]
fn lift<H: ForceScalar>(x: f64) -> H {
    H::from_f64(x)
}

#[inline]
fn lift3<H: ForceScalar>(v: &Vector3<f64>) -> Vector3<H> {
    v.map(lift)
}

#[inline]
fn lower<H: ForceScalar>(x: H) -> f64 {
    x.to_f64()
}

#[inline]
fn norm<H: ForceScalar>(v: &Vector3<H>) -> H {
    v.dot(v).sqrt()
}

impl<'a, H: ForceScalar> ForceModel<'a, H> {
    /// Build the force model.
    ///
    /// Arguments
    /// -----------------
    /// * `perturbers`: perturbing bodies, ascending `Gm`.
    /// * `toggles`: enabled force terms.
    /// * `non_grav`: non-gravitational coefficients of the object, if any.
    /// * `t0`: physical epoch of `τ = 0`.
    /// * `direction`: `+1` forward, `-1` backward.
    pub fn new(
        perturbers: &'a PerturberSet,
        toggles: ForceToggles,
        non_grav: Option<NonGravitationalParams>,
        t0: JulianDate,
        direction: f64,
    ) -> Self {
        let non_grav = non_grav.filter(|ng| toggles.non_gravitational && !ng.is_zero());
        ForceModel {
            perturbers,
            toggles,
            non_grav,
            sun: perturbers.iter().position(|b| b.id() == "Sn"),
            t0,
            direction,
            collision: None,
            samples: Vec::with_capacity(perturbers.len()),
            _scalar: PhantomData,
        }
    }

    /// Physical time of integrator time `tau`.
    #[inline]
    pub fn physical_time(&self, tau: f64) -> JulianDate {
        self.t0 + self.direction * tau
    }

    pub fn direction(&self) -> f64 {
        self.direction
    }

    pub fn perturbers(&self) -> &PerturberSet {
        self.perturbers
    }

    /// The pending collision candidate, if any.
    pub fn collision_candidate(&self) -> Option<&CollisionCandidate> {
        self.collision.as_ref()
    }

    pub fn reset_collision(&mut self) {
        self.collision = None;
    }

    /// Perturber referenced by a candidate.
    pub fn candidate_body(&self, candidate: &CollisionCandidate) -> Option<&'a PerturberBody> {
        self.perturbers.bodies().get(candidate.perturber)
    }

    /// Acceleration at physical time `jd` for barycentric position `r` and velocity `v`.
    ///
    /// Arguments
    /// -----------------
    /// * `jd`: physical time (TDB).
    /// * `r`, `v`: state of the integrated body (au, au/day), physical orientation.
    ///
    /// Return
    /// ----------
    /// * The total acceleration (au/day²), or the ephemeris error of a perturber query.
    pub fn acceleration(
        &mut self,
        jd: JulianDate,
        r: &Vector3<f64>,
        v: &Vector3<f64>,
    ) -> Result<Vector3<f64>, EphemError> {
        let c2: H = lift(VLIGHT_AU_SQUARED);
        let ri = lift3::<H>(r);
        let vi = lift3::<H>(v);
        let relativistic = self.toggles.relativistic;

        self.samples.clear();
        for (index, body) in self.perturbers.iter().enumerate() {
            let full = relativistic && body.is_relativistic();
            let (rj, vj, aj) = if full {
                let state = body.compute_state(jd)?;
                let vj = match state.velocity {
                    Some(v) => v,
                    None => body.velocity(jd)?,
                };
                (state.position, vj, body.acceleration(jd)?)
            } else {
                (body.position(jd)?, Vector3::zeros(), Vector3::zeros())
            };

            let rji_f64 = rj - r;
            let rij_f64 = rji_f64.norm();
            if rij_f64 <= body.equatorial_radius() && self.collision.is_none() {
                let body_fixed = body.to_body_fixed_matrix(jd) * (-rji_f64);
                if body.inside_reference_ellipsoid(&body_fixed) {
                    self.collision = Some(CollisionCandidate {
                        jd,
                        perturber: index,
                        body_fixed,
                    });
                }
            }

            let rji = lift3::<H>(&rj) - ri;
            self.samples.push(PerturberSample {
                gm: lift(body.gm()),
                rij: norm(&rji),
                rji,
                velocity: lift3(&vj),
                acceleration: lift3(&aj),
                relativistic: full,
            });
        }

        let mut sum = [CompensatedSum::<H>::new(); 3];
        let mut push = |term: Vector3<H>| {
            for (s, x) in sum.iter_mut().zip(term.iter()) {
                s.add(*x);
            }
        };

        // Σ Gm_k / r_k over the relativistic perturbers
        let potential = if relativistic {
            let mut p = CompensatedSum::<H>::new();
            self.samples
                .iter()
                .filter(|s| s.relativistic)
                .for_each(|s| p.add(s.gm / s.rij));
            p.value()
        } else {
            H::zero()
        };
        let two: H = lift(2.0);
        let three: H = lift(3.0);
        let four: H = lift(4.0);
        let seven: H = lift(7.0);
        let vi2 = vi.dot(&vi);

        for (j, s) in self.samples.iter().enumerate() {
            let gm_rij3 = s.gm / (s.rij * s.rij * s.rij);
            let a0 = s.rji * gm_rij3;
            push(a0);

            if !s.relativistic {
                continue;
            }
            let rij_vec = -s.rji;
            let vj = s.velocity;
            let aj = s.acceleration;

            let t1 = four / c2 * potential;
            let mut t2 = CompensatedSum::<H>::new();
            for (k, o) in self.samples.iter().enumerate() {
                if k != j && o.relativistic {
                    t2.add(o.gm / norm(&(o.rji - s.rji)));
                }
            }
            let t2 = t2.value() / c2;
            let t3 = vi2 / c2;
            let t4 = two * vj.dot(&vj) / c2;
            let t5 = four * vi.dot(&vj) / c2;
            let t6 = rij_vec.dot(&vj) / s.rij;
            let t6 = three * t6 * t6 / (two * c2);
            let t7 = s.rji.dot(&aj) / two / c2;

            push(a0 * (-t1));
            push(a0 * (-t2));
            push(a0 * t3);
            push(a0 * t4);
            push(a0 * (-t5));
            push(a0 * (-t6));
            push(a0 * t7);
            push((vi - vj) * (gm_rij3 * rij_vec.dot(&(vi * four - vj * three)) / c2));
            push(aj * (seven * s.gm / s.rij / (two * c2)));
        }

        if self.toggles.figure_effects {
            for (body, s) in self.perturbers.iter().zip(self.samples.iter()) {
                if body.within_harmonic_sphere(lower(s.rij)) {
                    push(figure_acceleration(body, jd, s));
                }
            }
        }

        if let Some(ng) = self.non_grav {
            let (rs, vs) = match self.sun {
                Some(i) => {
                    let sun = &self.perturbers.bodies()[i];
                    (sun.position(jd)?, sun.velocity(jd)?)
                }
                None => (Vector3::zeros(), Vector3::zeros()),
            };
            push(lift3(&non_gravitational_acceleration(&ng, &(r - rs), &(v - vs))));
        }

        Ok(Vector3::new(
            lower(sum[0].value()),
            lower(sum[1].value()),
            lower(sum[2].value()),
        ))
    }
}

/// J2 acceleration of an oblate perturber, in ICRS.
///
/// The relative position is rotated into the body-fixed frame, where the zonal gradient is
/// evaluated in the local (radial, east, north) basis and then rotated back.
fn figure_acceleration<H: ForceScalar>(
    body: &PerturberBody,
    jd: JulianDate,
    s: &PerturberSample<H>,
) -> Vector3<H> {
    let (t, v) = body.to_body_fixed_matrices(jd);
    let t: Matrix3<H> = t.map(lift);
    let v: Matrix3<H> = v.map(lift);

    let rb = v * t * (-s.rji);
    let db = s.rij;
    let n2 = (rb.x * rb.x + rb.y * rb.y).sqrt();
    let sp = rb.z / db;
    let cp = n2 / db;
    let (sl, cl) = if n2 > H::zero() {
        (rb.y / n2, rb.x / n2)
    } else {
        (H::zero(), H::one())
    };

    let local = Matrix3::new(
        cp * cl, -sl, -sp * cl, //
        cp * sl, cl, -sp * sl, //
        sp, H::zero(), cp,
    );
    let re: H = lift(body.equatorial_radius());
    let k = s.gm * lift::<H>(body.j2()) * re * re / (db * db * db * db);
    let three: H = lift(3.0);
    let nine: H = lift(9.0);
    let two: H = lift(2.0);
    let grad = Vector3::new(
        k * (nine * sp * sp - three) / two,
        H::zero(),
        -k * three * cp * sp,
    );
    t.transpose() * v.transpose() * (local * grad)
}

/// Marsden-Sekanina acceleration for a heliocentric state.
pub fn non_gravitational_acceleration(
    ng: &NonGravitationalParams,
    r: &Vector3<f64>,
    v: &Vector3<f64>,
) -> Vector3<f64> {
    let rn = r.norm();
    let h = r.cross(v);
    let hn = h.norm();
    if rn == 0.0 || hn == 0.0 {
        return Vector3::zeros();
    }
    let radial = r / rn;
    let normal = h / hn;
    let transverse = normal.cross(&radial);
    (radial * ng.a1 + transverse * ng.a2 + normal * ng.a3) * marsden_g(rn)
}

impl<H: ForceScalar> OdeSystem for ForceModel<'_, H> {
    fn derivative(&mut self, tau: f64, y: &Vector6<f64>) -> Result<Vector6<f64>, EphemError> {
        let r = y.fixed_rows::<3>(0).into_owned();
        let w = y.fixed_rows::<3>(3).into_owned();
        let jd = self.physical_time(tau);
        // dw/dτ = a(t, r, v) with v = direction·w
        let a = self.acceleration(jd, &r, &(w * self.direction))?;
        Ok(Vector6::new(w.x, w.y, w.z, a.x, a.y, a.z))
    }
}

#[cfg(test)]
mod motion_test {
    use super::*;
    use crate::constants::{AU, GMS_DE440};
    use crate::ephemeris::ephemerides::Ephemerides;
    use crate::perturber::{BodyKind, PerturberSelection};
    use crate::unit_test_global::toy_fundamental;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const JD: f64 = 2451560.0;

    fn sun_only() -> PerturberSet {
        let eph = Ephemerides::new(toy_fundamental(true));
        PerturberSet::from_bodies(vec![
            PerturberBody::planet(BodyKind::Sun, eph.fundamental().clone()).unwrap()
        ])
    }

    fn newtonian() -> ForceToggles {
        ForceToggles {
            relativistic: false,
            figure_effects: false,
            non_gravitational: false,
        }
    }

    #[test]
    fn test_point_mass_sun() {
        let set = sun_only();
        let mut model = ForceModel::<f64>::new(&set, newtonian(), None, JD, 1.0);
        let r = Vector3::new(2.0, 0.0, 0.0);
        let a = model.acceleration(JD, &r, &Vector3::new(0.0, 0.012, 0.0)).unwrap();
        assert_relative_eq!(a.x, -GMS_DE440 / 4.0, max_relative = 1e-14);
        assert_abs_diff_eq!(a.y, 0.0);
        assert!(model.collision_candidate().is_none());
    }

    #[test]
    fn test_relativistic_correction_magnitude() {
        let set = sun_only();
        let r = Vector3::new(0.387, 0.0, 0.0);
        let v = Vector3::new(0.0, (GMS_DE440 / 0.387).sqrt(), 0.0);
        let mut plain = ForceModel::<f64>::new(&set, newtonian(), None, JD, 1.0);
        let mut gr = ForceModel::<f64>::new(
            &set,
            ForceToggles {
                relativistic: true,
                ..newtonian()
            },
            None,
            JD,
            1.0,
        );
        let a0 = plain.acceleration(JD, &r, &v).unwrap();
        let a1 = gr.acceleration(JD, &r, &v).unwrap();
        let rel = (a1 - a0).norm() / a0.norm();
        // for a circular orbit the PPN radial correction is about 3·GM/(c²r)
        assert!(rel > 1e-8 && rel < 1e-7, "relative correction {rel}");
    }

    #[test]
    fn test_oblateness_only_inside_harmonic_sphere() {
        let eph = Ephemerides::new(toy_fundamental(true));
        let ju = PerturberBody::planet(BodyKind::Jupiter, eph.fundamental().clone()).unwrap();
        let rj = ju.position(JD).unwrap();
        let set = PerturberSet::from_bodies(vec![ju]);
        let toggles = ForceToggles {
            figure_effects: true,
            ..newtonian()
        };
        let mut plain = ForceModel::<f64>::new(&set, newtonian(), None, JD, 1.0);
        let mut oblate = ForceModel::<f64>::new(&set, toggles, None, JD, 1.0);

        let near = rj + Vector3::new(0.0, 0.0, 1.0e6 / AU);
        let v = Vector3::zeros();
        let d = oblate.acceleration(JD, &near, &v).unwrap() - plain.acceleration(JD, &near, &v).unwrap();
        assert!(d.norm() > 0.0);

        let far = rj + Vector3::new(0.0, 0.0, 0.8);
        let d = oblate.acceleration(JD, &far, &v).unwrap() - plain.acceleration(JD, &far, &v).unwrap();
        assert_eq!(d.norm(), 0.0);
    }

    #[test]
    fn test_collision_candidate_recorded_once() {
        let set = sun_only();
        let mut model = ForceModel::<f64>::new(&set, newtonian(), None, JD, 1.0);
        let inside = Vector3::new(1.0e5 / AU, 0.0, 0.0);
        model.acceleration(JD, &inside, &Vector3::zeros()).unwrap();
        model.acceleration(JD + 1.0, &inside, &Vector3::zeros()).unwrap();
        let c = model.collision_candidate().copied().unwrap();
        assert_eq!(c.jd, JD);
        assert_eq!(model.candidate_body(&c).unwrap().id(), "Sn");
        model.reset_collision();
        assert!(model.collision_candidate().is_none());
    }

    #[test]
    fn test_backward_orientation() {
        let set = sun_only();
        let mut fwd = ForceModel::<f64>::new(&set, newtonian(), None, JD, 1.0);
        let mut bwd = ForceModel::<f64>::new(&set, newtonian(), None, JD, -1.0);
        assert_eq!(bwd.physical_time(3.0), JD - 3.0);
        let y = Vector6::new(1.0, 0.0, 0.0, 0.0, 0.017, 0.0);
        let df = fwd.derivative(0.0, &y).unwrap();
        let db = bwd.derivative(0.0, &y).unwrap();
        assert_eq!(df, db);
    }

    #[test]
    fn test_marsden_law_and_directions() {
        assert_relative_eq!(marsden_g(1.0), 1.0, max_relative = 1e-3);
        assert!(marsden_g(5.0) < 0.01);

        let ng = NonGravitationalParams::new(1e-8, 0.0, 0.0);
        let a = non_gravitational_acceleration(&ng, &Vector3::new(1.0, 0.0, 0.0), &Vector3::new(0.0, 0.017, 0.0));
        assert!(a.x > 0.0);
        assert_abs_diff_eq!(a.y, 0.0);

        let ng = NonGravitationalParams::new(0.0, 1e-8, 0.0);
        let a = non_gravitational_acceleration(&ng, &Vector3::new(1.0, 0.0, 0.0), &Vector3::new(0.0, 0.017, 0.0));
        assert!(a.y > 0.0);
    }

    #[test]
    fn test_full_set_acceleration_is_dominated_by_sun() {
        let eph = Ephemerides::new(toy_fundamental(false));
        let selection = PerturberSelection {
            separate_earth_moon: true,
            ..Default::default()
        };
        let set = PerturberSet::new(&eph, &selection, "", "").unwrap();
        let mut model = ForceModel::<f64>::new(&set, ForceToggles::default(), None, JD, 1.0);
        let r = Vector3::new(0.0, 2.5, 0.3);
        let a = model.acceleration(JD, &r, &Vector3::new(-0.011, 0.0, 0.0)).unwrap();
        let sun = -r * GMS_DE440 / r.norm().powi(3);
        assert!((a - sun).norm() / sun.norm() < 1e-2);
    }
}
