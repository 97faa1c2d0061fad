//! Physical data and IAU rotation models of the Sun and planets.
//!
//! Rotation elements follow the IAU WGCCRE reports: the right ascension `α₀` and declination
//! `δ₀` of the north pole and the prime-meridian angle `W`, all in degrees, with `T` in Julian
//! centuries and `d` in days since J2000.0 TDB.
use super::BodyKind;

/// Static physical data of a major body.
///
/// * `harmonic_sphere_km` – radius inside which the J2 term is applied (0: never).
/// * `j2` – fixed J2 value, or the name of the ephemeris constant that provides it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlanetData {
    pub id: &'static str,
    pub name: &'static str,
    pub j2: J2Source,
    pub harmonic_sphere_km: f64,
    pub equatorial_radius_km: f64,
    pub polar_radius_km: f64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum J2Source {
    None,
    Value(f64),
    Constant(&'static str),
}

pub(crate) fn planet_data(kind: BodyKind) -> PlanetData {
    use BodyKind::*;
    let (id, name, j2, rh, re, rp) = match kind {
        Sun => ("Sn", "Sun", J2Source::Constant("J2SUN"), 8.0e13, 695_700.0, 695_700.0),
        Mercury => ("Me", "Mercury", J2Source::None, 0.0, 2_439.7, 2_439.7),
        Venus => ("Ve", "Venus", J2Source::None, 0.0, 6_051.8, 6_051.8),
        Earth => ("Ea", "Earth", J2Source::Constant("J2E"), 2.0e6, 6_378.14, 6_356.75),
        EarthMoonBarycenter => ("EMB", "Earth-Moon barycenter", J2Source::None, 0.0, 6_378.14, 6_356.75),
        Mars => ("Ma", "Mars", J2Source::Value(1.9555e-3), 1.2e6, 3_396.2, 3_376.2),
        Jupiter => ("Ju", "Jupiter", J2Source::Value(14_696.514e-6), 100.0e6, 71_492.0, 66_854.0),
        Saturn => ("Sa", "Saturn", J2Source::Value(16_290.573e-6), 110.0e6, 60_268.0, 54_364.0),
        Uranus => ("Ur", "Uranus", J2Source::Value(3_341.29e-6), 100.0e6, 25_559.0, 24_973.0),
        Neptune => ("Ne", "Neptune", J2Source::Value(3_408.43e-6), 180.0e6, 24_764.0, 24_341.0),
        Pluto => ("Pl", "Pluto", J2Source::None, 0.0, 1_195.0, 1_195.0),
        Moon | MoonFromBarycenter => ("Mn", "Moon", J2Source::Constant("J2M"), 2.0e5, 1_737.4, 1_737.4),
        MinorBody => ("", "", J2Source::None, 0.0, 0.0, 0.0),
    };
    PlanetData {
        id,
        name,
        j2,
        harmonic_sphere_km: rh,
        equatorial_radius_km: re,
        polar_radius_km: rp,
    }
}

/// IAU rotation elements `(α₀, δ₀, W)` in degrees (W not reduced).
///
/// Bodies without a model (Mercury, Venus, Pluto, minor bodies) get the default orientation
/// `α₀ = 0`, `δ₀ = 90°`, `W = 0`.
pub(crate) fn rotation_elements(kind: BodyKind, t: f64, d: f64) -> (f64, f64, f64) {
    use BodyKind::*;
    let (s, c) = (|x: f64| x.to_radians().sin(), |x: f64| x.to_radians().cos());
    match kind {
        Sun => (286.13, 63.87, 84.176 + 14.1844 * d),
        Earth | EarthMoonBarycenter => (
            -0.641 * t,
            90.0 - 0.557 * t,
            190.147 + 360.985_623_5 * d,
        ),
        Mars => (
            317.269_202 - 0.109_275_47 * t,
            54.432_516 - 0.058_271_05 * t,
            176.049_863 + 350.891_982_443_297 * d,
        ),
        Jupiter => {
            let ja = 99.360_714 + 4_850.404_6 * t;
            let jb = 175.895_369 + 1_191.960_5 * t;
            let jc = 300.323_162 + 262.547_5 * t;
            let jd = 114.012_305 + 6_070.247_6 * t;
            let je = 49.511_251 + 64.3 * t;
            (
                268.056_595 - 0.006_499 * t
                    + 0.000_117 * s(ja)
                    + 0.000_938 * s(jb)
                    + 0.001_432 * s(jc)
                    + 0.000_030 * s(jd)
                    + 0.002_150 * s(je),
                64.495_303 + 0.002_413 * t
                    + 0.000_050 * c(ja)
                    + 0.000_404 * c(jb)
                    + 0.000_617 * c(jc)
                    - 0.000_013 * c(jd)
                    + 0.000_926 * c(je),
                284.95 + 870.536 * d,
            )
        }
        Saturn => (
            40.589 - 0.036 * t,
            83.537 - 0.004 * t,
            38.90 + 810.793_902_4 * d,
        ),
        Uranus => (257.311, -15.175, 203.81 - 501.160_092_8 * d),
        Neptune => {
            let n = 357.85 + 52.316 * t;
            (
                299.36 + 0.70 * s(n),
                43.46 - 0.51 * c(n),
                249.978 + 541.139_775_7 * d - 0.48 * s(n),
            )
        }
        Moon | MoonFromBarycenter => super::moon::lunar_rotation_elements(t, d),
        Mercury | Venus | Pluto | MinorBody => (0.0, 90.0, 0.0),
    }
}

#[cfg(test)]
mod planets_test {
    use super::*;

    #[test]
    fn test_earth_rotation_at_j2000() {
        let (a0, d0, w) = rotation_elements(BodyKind::Earth, 0.0, 0.0);
        assert_eq!((a0, d0, w), (0.0, 90.0, 190.147));
    }

    #[test]
    fn test_default_orientation() {
        assert_eq!(
            rotation_elements(BodyKind::Pluto, 0.3, 1000.0),
            (0.0, 90.0, 0.0)
        );
    }

    #[test]
    fn test_jupiter_pole_near_iau_value() {
        let (a0, d0, _) = rotation_elements(BodyKind::Jupiter, 0.0, 0.0);
        approx::assert_abs_diff_eq!(a0, 268.057, epsilon = 5e-3);
        approx::assert_abs_diff_eq!(d0, 64.496, epsilon = 5e-3);
    }

    #[test]
    fn test_only_known_oblate_bodies_have_harmonic_spheres() {
        assert_eq!(planet_data(BodyKind::Venus).harmonic_sphere_km, 0.0);
        assert_eq!(planet_data(BodyKind::Saturn).harmonic_sphere_km, 110.0e6);
        assert!(matches!(
            planet_data(BodyKind::Earth).j2,
            J2Source::Constant("J2E")
        ));
    }
}
