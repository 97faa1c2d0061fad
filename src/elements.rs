//! # Osculating orbital elements
//!
//! Conversions between heliocentric osculating elements and state vectors, for elliptic,
//! hyperbolic and near-parabolic motion, plus the small helpers relating mean anomaly, time of
//! perihelion passage, semimajor axis and perihelion distance.
//!
//! Conventions
//! -----------------
//! * Distances in au, times in days (JD TDB), angles in **degrees**.
//! * An orbit is *near-parabolic* when `|1 − e| < 0.001`. Such orbits are described by their
//!   perihelion distance `q` and time of perihelion passage `T`; the other orbits by their
//!   semimajor axis `a` and the mean anomaly `M` at the reference epoch.
//! * `gms` is the Sun's mass parameter (au³/day²); a value `<= 0` selects
//!   [`GMS_DE440`]. `m` is the mass of the body in solar masses.
//! * The reference plane is whatever plane the elements are referred to; use
//!   [`ecliptic_to_equatorial`] for elements referred to the J2000 ecliptic.
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, JulianDate, DPI, GMS_DE440, NEAR_PARABOLIC_BAND, OBLIQUITY_J2000};
use crate::ephem_errors::EphemError;

/// Iterations per tolerance level of the anomaly solvers.
const MAX_ITERATIONS: usize = 50;

/// Number of times the solver tolerance may be widened by ×10 before giving up.
const MAX_WIDENINGS: usize = 3;

/// Osculating heliocentric elements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrbitalElements {
    /// a (au), negative for hyperbolic orbits.
    pub semimajor_axis: f64,
    /// q (au)
    pub perihelion_distance: f64,
    pub eccentricity: f64,
    /// M at the reference epoch.
    pub mean_anomaly: Degree,
    /// T (JD TDB)
    pub perihelion_time: JulianDate,
    pub inclination: Degree,
    pub ascending_node: Degree,
    pub argument_of_perihelion: Degree,
}

fn sun_gm(gms: f64) -> f64 {
    if gms <= 0.0 {
        GMS_DE440
    } else {
        gms
    }
}

fn mod_two_pi(x: f64) -> f64 {
    x.rem_euclid(DPI)
}

impl OrbitalElements {
    /// `true` when `|1 − e| < 0.001`.
    pub fn is_near_parabolic(&self) -> bool {
        (1.0 - self.eccentricity).abs() < NEAR_PARABOLIC_BAND
    }

    /// Mean motion (rad/day), from `a`, or from `q` for near-parabolic orbits.
    pub fn mean_motion(&self, gms: f64, m: f64) -> f64 {
        let mu = sun_gm(gms) * (1.0 + m);
        if self.is_near_parabolic() {
            let ai = (1.0 - self.eccentricity).abs() / self.perihelion_distance;
            if ai > 1.0e-5 {
                return (mu * ai * ai * ai).sqrt();
            }
            return mu.sqrt();
        }
        let a = self.semimajor_axis.abs();
        (mu / (a * a * a)).sqrt()
    }

    /// Mean anomaly at `t` from the time of perihelion passage, in `[0°, 360°)`.
    pub fn mean_anomaly_from_time_of_perihelion_passage(&self, t: JulianDate, gms: f64, m: f64) -> Degree {
        mod_two_pi(self.mean_motion(gms, m) * (t - self.perihelion_time)).to_degrees()
    }

    /// Time of perihelion passage from the mean anomaly at `t`.
    pub fn time_of_perihelion_passage_from_mean_anomaly(&self, t: JulianDate, gms: f64, m: f64) -> JulianDate {
        t - self.mean_anomaly.to_radians() / self.mean_motion(gms, m)
    }

    /// `q = (1 − e)·a`
    pub fn perihelion_distance_from_semimajor_axis(&self) -> f64 {
        (1.0 - self.eccentricity) * self.semimajor_axis
    }

    /// `a = q / (1 − e)`, or 0 for a parabola.
    pub fn semimajor_axis_from_perihelion_distance(&self) -> f64 {
        let ai = (1.0 - self.eccentricity) / self.perihelion_distance;
        if ai.abs() < 2.0 * f64::EPSILON {
            0.0
        } else {
            1.0 / ai
        }
    }
}

/// Newton iteration with the bounded tolerance-widening policy of the anomaly solvers.
///
/// `f(x)` returns the residual and its derivative.
fn solve_anomaly<F>(kind: &'static str, e: f64, mean_anomaly: f64, x0: f64, mut f: F) -> Result<f64, EphemError>
where
    F: FnMut(f64) -> (f64, f64),
{
    let mut eps = 2.0 * f64::EPSILON;
    let mut x = x0;
    for _ in 0..=MAX_WIDENINGS {
        for _ in 0..MAX_ITERATIONS {
            let (r, dr) = f(x);
            if r.abs() < eps {
                return Ok(x);
            }
            x -= r / dr;
        }
        eps *= 10.0;
    }
    Err(EphemError::AnomalyNoConvergence {
        kind,
        e,
        mean_anomaly: mean_anomaly.to_degrees(),
    })
}

/// Stumpff-function solution of near-parabolic motion.
///
/// Returns the position and velocity in the orbital plane (x toward perihelion).
fn near_parabolic_plane(
    q: f64,
    e: f64,
    dt: f64,
    mu: f64,
    mean_anomaly: f64,
) -> Result<([f64; 2], [f64; 2]), EphemError> {
    let mut eps = 2.0 * f64::EPSILON;
    let mut e2 = 0.0;
    let mut f = e / 2.0;
    let dt = mu.sqrt() * dt;

    for _ in 0..=MAX_WIDENINGS {
        for _ in 0..MAX_ITERATIONS {
            let e20 = e2;
            let a = 1.5 * (f / (q * q * q)).sqrt() * dt;
            let b = (a + (1.0 + a * a).sqrt()).cbrt();
            let u = b - 1.0 / b;
            let u2 = u * u;
            e2 = u2 * (1.0 - e) / f;

            let (c1, c2, c3) = stumpff(e2);
            f = 3.0 * e * c3;

            if (e2 - e20).abs() < eps {
                let rv = q * (1.0 + u2 * c2 * e / f);
                let kv = (mu / q / (1.0 + e)).sqrt();
                let xp = q * (1.0 - u2 * c2 / f);
                let yp = q * ((1.0 + e) / f).sqrt() * u * c1;
                return Ok(([xp, yp], [-kv * yp / rv, kv * (xp / rv + e)]));
            }
        }
        eps *= 10.0;
    }
    Err(EphemError::AnomalyNoConvergence {
        kind: "near-parabolic",
        e,
        mean_anomaly: mean_anomaly.to_degrees(),
    })
}

/// Stumpff functions `c1, c2, c3` of `E²`.
fn stumpff(e2: f64) -> (f64, f64, f64) {
    let (mut c1, mut c2, mut c3) = (0.0, 0.0, 0.0);
    let mut term = 1.0;
    let mut n = 1.0;
    loop {
        c1 += term;
        term /= 2.0 * n;
        c2 += term;
        term /= 2.0 * n + 1.0;
        c3 += term;
        term *= -e2;
        if term.abs() < 2.0 * f64::EPSILON {
            return (c1, c2, c3);
        }
        n += 1.0;
    }
}

/// Heliocentric state vectors from osculating elements.
///
/// Arguments
/// -----------------
/// * `el`: the elements; `M` is taken at `t`, `T` is used for near-parabolic orbits.
/// * `t`: epoch of the state (JD TDB).
/// * `gms`: solar mass parameter, `<= 0` for the DE440 value.
/// * `m`: mass of the body (solar masses).
///
/// Return
/// ----------
/// * `(r, v)` in au and au/day, referred to the plane of the elements, or
/// * [`EphemError::InvalidOrbitalElements`] when neither `a` nor `q` defines the orbit size,
/// * [`EphemError::AnomalyNoConvergence`] when the anomaly solver fails.
pub fn state_vectors_from_elements(
    el: &OrbitalElements,
    t: JulianDate,
    gms: f64,
    m: f64,
) -> Result<(Vector3<f64>, Vector3<f64>), EphemError> {
    let gms = sun_gm(gms);
    let mu = (1.0 + m) * gms;
    let e = el.eccentricity;
    let ma = el.mean_anomaly.to_radians();

    let ([xp, yp], [xv, yv]) = if el.is_near_parabolic() {
        let mut q = el.perihelion_distance;
        if q == 0.0 {
            q = el.perihelion_distance_from_semimajor_axis();
        }
        if !(q > 0.0) {
            return Err(EphemError::InvalidOrbitalElements);
        }
        near_parabolic_plane(q, e, t - el.perihelion_time, mu, ma)?
    } else if e < 1.0 {
        let mut a = el.semimajor_axis.abs();
        if a == 0.0 {
            a = el.semimajor_axis_from_perihelion_distance().abs();
        }
        if 1.0 + a == 1.0 {
            return Err(EphemError::InvalidOrbitalElements);
        }
        let x0 = if e < 0.8 { ma } else { std::f64::consts::PI };
        let ea = solve_anomaly("elliptic", e, ma, x0, |x| {
            let (s, c) = x.sin_cos();
            (x - e * s - ma, 1.0 - e * c)
        })?;
        let (se, ce) = ea.sin_cos();
        let r = a * (1.0 - e * ce);
        let edot = (mu / a).sqrt() / r;
        let b = a * (1.0 - e * e).sqrt();
        ([a * (ce - e), b * se], [-a * edot * se, b * edot * ce])
    } else {
        let mut a = el.semimajor_axis;
        if a == 0.0 {
            a = el.semimajor_axis_from_perihelion_distance();
        }
        if 1.0 + a == 1.0 {
            return Err(EphemError::InvalidOrbitalElements);
        }
        let a = -a.abs();
        let ha = solve_anomaly("hyperbolic", e, ma, ma, |x| {
            (e * x.sinh() - x - ma, e * x.cosh() - 1.0)
        })?;
        let (sh, ch) = (ha.sinh(), ha.cosh());
        let r = a * (1.0 - e * ch);
        let hdot = (-mu / a).sqrt() / r;
        let b = -a * (e * e - 1.0).sqrt();
        ([a * (ch - e), b * sh], [a * hdot * sh, b * hdot * ch])
    };

    let (si, ci) = el.inclination.to_radians().sin_cos();
    let (so, co) = el.ascending_node.to_radians().sin_cos();
    let (sw, cw) = el.argument_of_perihelion.to_radians().sin_cos();

    let p = Vector3::new(cw * co - sw * so * ci, cw * so + sw * co * ci, sw * si);
    let q = Vector3::new(-sw * co - cw * so * ci, -sw * so + cw * co * ci, cw * si);

    Ok((p * xp + q * yp, p * xv + q * yv))
}

/// Osculating elements from heliocentric state vectors.
///
/// Arguments
/// -----------------
/// * `r`, `v`: position (au) and velocity (au/day).
/// * `t`: epoch of the state (JD TDB).
/// * `gms`, `m`: as in [`state_vectors_from_elements`].
///
/// Return
/// ----------
/// * The elements. The argument of perihelion is placed in the correct half-plane from the
///   sign of the eccentricity vector's z component; for equatorial orbits it is measured from
///   the x axis. Near-parabolic orbits get `T` from Barker's equation and `M` from `T`.
pub fn elements_from_state_vectors(
    r: &Vector3<f64>,
    v: &Vector3<f64>,
    t: JulianDate,
    gms: f64,
    m: f64,
) -> OrbitalElements {
    let gms = sun_gm(gms);
    let mu = (1.0 + m) * gms;

    let rm = r.norm();
    let v2 = v.dot(v);
    let rv = r.dot(v);

    let h = r.cross(v);
    let p = h.dot(&h) / mu;
    let evec = r * (v2 / mu - 1.0 / rm) - v * (rv / mu);
    let node = Vector3::new(-h.y, h.x, 0.0);
    let n = node.norm();

    let mut el = OrbitalElements {
        eccentricity: evec.norm(),
        ..Default::default()
    };
    let e = el.eccentricity;
    let parabolic = el.is_near_parabolic();

    if parabolic {
        el.perihelion_distance = p / (1.0 + e);
        el.semimajor_axis = el.semimajor_axis_from_perihelion_distance();
    } else {
        el.semimajor_axis = 1.0 / (2.0 / rm - v2 / mu);
        el.perihelion_distance = el.perihelion_distance_from_semimajor_axis();
    }

    el.inclination = (h.z / h.norm()).clamp(-1.0, 1.0).acos().to_degrees();
    el.ascending_node = mod_two_pi(h.x.atan2(-h.y)).to_degrees();

    let omega = if e == 0.0 {
        0.0
    } else if n == 0.0 {
        let w = evec.y.atan2(evec.x);
        if h.z < 0.0 {
            -w
        } else {
            w
        }
    } else {
        let w = (node.dot(&evec) / n / e).clamp(-1.0, 1.0).acos();
        if evec.z < 0.0 {
            DPI - w
        } else {
            w
        }
    };
    el.argument_of_perihelion = mod_two_pi(omega).to_degrees();

    if parabolic {
        let d = rv / mu.sqrt();
        el.perihelion_time = t - (el.perihelion_distance * d + d * d * d / 6.0) / mu.sqrt();
        el.mean_anomaly = el.mean_anomaly_from_time_of_perihelion_passage(t, gms, m);
    } else {
        let yb = rv / e * (p / mu).sqrt();
        let ma = if e < 1.0 {
            let xb = (p - rm) / e;
            let ce = xb / el.semimajor_axis + e;
            let se = yb / el.semimajor_axis / (1.0 - e * e).sqrt();
            let ea = se.atan2(ce);
            ea - e * se
        } else {
            let sh = -yb / el.semimajor_axis / (e * e - 1.0).sqrt();
            let ha = sh.asinh();
            e * sh - ha
        };
        el.mean_anomaly = mod_two_pi(ma).to_degrees();
        el.perihelion_time = t - ma / el.mean_motion(gms, m);
    }
    el
}

/// Rotate a vector from the J2000 ecliptic to the ICRS equator.
pub fn ecliptic_to_equatorial(v: &Vector3<f64>) -> Vector3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), OBLIQUITY_J2000) * v
}

/// Rotate a vector from the ICRS equator to the J2000 ecliptic.
pub fn equatorial_to_ecliptic(v: &Vector3<f64>) -> Vector3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), -OBLIQUITY_J2000) * v
}

#[cfg(test)]
mod elements_test {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const T: f64 = 2460000.5;

    fn ceres_like() -> OrbitalElements {
        OrbitalElements {
            semimajor_axis: 2.7675,
            eccentricity: 0.0785,
            mean_anomaly: 60.08,
            inclination: 10.59,
            ascending_node: 80.27,
            argument_of_perihelion: 73.30,
            ..Default::default()
        }
    }

    #[test]
    fn test_circular_orbit_at_node() {
        let el = OrbitalElements {
            semimajor_axis: 1.0,
            ..Default::default()
        };
        let (r, v) = state_vectors_from_elements(&el, T, 0.0, 0.0).unwrap();
        assert_abs_diff_eq!(r, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-15);
        assert_abs_diff_eq!(v, Vector3::new(0.0, GMS_DE440.sqrt(), 0.0), epsilon = 1e-15);
    }

    #[test]
    fn test_elliptic_round_trip() {
        let el = ceres_like();
        let (r, v) = state_vectors_from_elements(&el, T, 0.0, 0.0).unwrap();
        let back = elements_from_state_vectors(&r, &v, T, 0.0, 0.0);
        assert_relative_eq!(back.semimajor_axis, el.semimajor_axis, max_relative = 1e-12);
        assert_abs_diff_eq!(back.eccentricity, el.eccentricity, epsilon = 1e-12);
        assert_abs_diff_eq!(back.mean_anomaly, el.mean_anomaly, epsilon = 1e-9);
        assert_abs_diff_eq!(back.inclination, el.inclination, epsilon = 1e-10);
        assert_abs_diff_eq!(back.ascending_node, el.ascending_node, epsilon = 1e-10);
        assert_abs_diff_eq!(back.argument_of_perihelion, el.argument_of_perihelion, epsilon = 1e-9);
        assert_relative_eq!(
            back.perihelion_distance,
            el.perihelion_distance_from_semimajor_axis(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_perihelion_below_reference_plane() {
        let el = OrbitalElements {
            argument_of_perihelion: 300.0,
            ..ceres_like()
        };
        let (r, v) = state_vectors_from_elements(&el, T, 0.0, 0.0).unwrap();
        let back = elements_from_state_vectors(&r, &v, T, 0.0, 0.0);
        assert_abs_diff_eq!(back.argument_of_perihelion, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_high_eccentricity_and_hyperbolic() {
        for (a, e) in [(17.8, 0.967), (-1.27, 1.20)] {
            let el = OrbitalElements {
                semimajor_axis: a,
                eccentricity: e,
                mean_anomaly: if e < 1.0 { 358.0 } else { 0.4 },
                inclination: 162.2,
                ascending_node: 58.4,
                argument_of_perihelion: 111.3,
                ..Default::default()
            };
            let (r, v) = state_vectors_from_elements(&el, T, 0.0, 0.0).unwrap();
            let back = elements_from_state_vectors(&r, &v, T, 0.0, 0.0);
            assert_relative_eq!(back.semimajor_axis, a, max_relative = 1e-10);
            assert_abs_diff_eq!(back.eccentricity, e, epsilon = 1e-11);
            assert_abs_diff_eq!(back.inclination, 162.2, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_parabolic_at_perihelion() {
        let el = OrbitalElements {
            perihelion_distance: 0.5,
            eccentricity: 1.0,
            perihelion_time: T,
            ..Default::default()
        };
        let (r, v) = state_vectors_from_elements(&el, T, 0.0, 0.0).unwrap();
        assert_relative_eq!(r.norm(), 0.5, max_relative = 1e-14);
        assert_relative_eq!(v.norm(), (2.0 * GMS_DE440 / 0.5).sqrt(), max_relative = 1e-14);

        // thirty days later: back to elements
        let (r, v) = state_vectors_from_elements(&el, T + 30.0, 0.0, 0.0).unwrap();
        let back = elements_from_state_vectors(&r, &v, T + 30.0, 0.0, 0.0);
        assert!(back.is_near_parabolic());
        assert_relative_eq!(back.perihelion_distance, 0.5, max_relative = 1e-10);
        assert_abs_diff_eq!(back.perihelion_time, T, epsilon = 1e-6);
    }

    #[test]
    fn test_time_and_mean_anomaly_helpers() {
        let mut el = ceres_like();
        let n = el.mean_motion(0.0, 0.0);
        assert_relative_eq!(n, (GMS_DE440 / 2.7675f64.powi(3)).sqrt(), max_relative = 1e-15);
        el.perihelion_time = el.time_of_perihelion_passage_from_mean_anomaly(T, 0.0, 0.0);
        assert_abs_diff_eq!(
            el.mean_anomaly_from_time_of_perihelion_passage(T, 0.0, 0.0),
            el.mean_anomaly,
            epsilon = 1e-9
        );
        let q = OrbitalElements {
            perihelion_distance: 1.5,
            eccentricity: 0.25,
            ..Default::default()
        };
        assert_relative_eq!(q.semimajor_axis_from_perihelion_distance(), 2.0, max_relative = 1e-15);
        let parabola = OrbitalElements {
            perihelion_distance: 1.5,
            eccentricity: 1.0,
            ..Default::default()
        };
        assert_eq!(parabola.semimajor_axis_from_perihelion_distance(), 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        let el = OrbitalElements {
            eccentricity: 0.3,
            ..Default::default()
        };
        assert_eq!(
            state_vectors_from_elements(&el, T, 0.0, 0.0),
            Err(EphemError::InvalidOrbitalElements)
        );
        let el = OrbitalElements {
            mean_anomaly: f64::NAN,
            ..ceres_like()
        };
        assert!(matches!(
            state_vectors_from_elements(&el, T, 0.0, 0.0),
            Err(EphemError::AnomalyNoConvergence { kind: "elliptic", .. })
        ));
    }

    #[test]
    fn test_ecliptic_rotation() {
        let z = ecliptic_to_equatorial(&Vector3::z());
        assert_abs_diff_eq!(z.y, -OBLIQUITY_J2000.sin(), epsilon = 1e-15);
        let v = Vector3::new(0.3, -1.2, 0.7);
        assert_abs_diff_eq!(equatorial_to_ecliptic(&ecliptic_to_equatorial(&v)), v, epsilon = 1e-15);
    }
}
