//! Lunar orientation and barycentric Moon synthesis.
use crate::ephemeris::BodyState;

/// IAU lunar rotation elements `(α₀, δ₀, W)` in degrees.
///
/// Uses the thirteen fundamental arguments `E1…E13` of the IAU WGCCRE model.
pub(crate) fn lunar_rotation_elements(t: f64, d: f64) -> (f64, f64, f64) {
    let e = [
        125.045 - 0.052_992_1 * d,
        250.089 - 0.105_984_2 * d,
        260.008 + 13.012_000_9 * d,
        176.625 + 13.340_715_4 * d,
        357.529 + 0.985_600_3 * d,
        311.589 + 26.405_708_4 * d,
        134.963 + 13.064_993_0 * d,
        276.617 + 0.328_714_6 * d,
        34.226 + 1.748_487_7 * d,
        15.134 - 0.158_976_3 * d,
        119.743 + 0.003_609_6 * d,
        239.961 + 0.164_357_3 * d,
        25.053 + 12.959_008_8 * d,
    ]
    .map(f64::to_radians);
    let (s, c) = (e.map(f64::sin), e.map(f64::cos));

    let a0 = 269.9949 + 0.0031 * t - 3.8787 * s[0] - 0.1204 * s[1] + 0.0700 * s[2]
        - 0.0172 * s[3]
        + 0.0072 * s[5]
        - 0.0052 * s[9]
        + 0.0043 * s[12];
    let d0 = 66.5392 + 0.0130 * t + 1.5419 * c[0] + 0.0239 * c[1] - 0.0278 * c[2]
        + 0.0068 * c[3]
        - 0.0029 * c[5]
        + 0.0009 * c[6]
        + 0.0008 * c[9]
        - 0.0009 * c[12];
    let w = 38.3213 + 13.176_358_15 * d - 1.4e-12 * d * d + 3.5610 * s[0] + 0.1208 * s[1]
        - 0.0642 * s[2]
        + 0.0158 * s[3]
        + 0.0252 * s[4]
        - 0.0066 * s[5]
        - 0.0047 * s[6]
        - 0.0046 * s[7]
        + 0.0028 * s[8]
        + 0.0052 * s[9]
        + 0.0040 * s[10]
        + 0.0019 * s[11]
        - 0.0044 * s[12];
    (a0, d0, w)
}

/// Barycentric Moon from its geocentric state and the Earth-Moon barycenter.
///
/// With `μ = 1 / (1 + EMRAT)` the Earth sits at `EMB − μ·Moon_geo`, so the Moon is at
/// `Moon_geo + EMB − μ·Moon_geo`. Applied component-wise to every derivative present on both
/// inputs.
pub(crate) fn moon_from_barycenter(geocentric: BodyState, emb: BodyState, emrat: f64) -> BodyState {
    let mu = 1.0 / (1.0 + emrat);
    geocentric.clone() + emb - geocentric * mu
}

#[cfg(test)]
mod moon_test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_lunar_pole_at_j2000() {
        let (a0, d0, w) = lunar_rotation_elements(0.0, 0.0);
        assert_abs_diff_eq!(a0, 266.86, epsilon = 0.05);
        assert_abs_diff_eq!(d0, 65.64, epsilon = 0.05);
        assert_abs_diff_eq!(w, 41.2, epsilon = 0.2);
    }

    #[test]
    fn test_barycentric_moon_keeps_emb_as_mass_center() {
        let emrat = 81.3;
        let geo = BodyState::new(Vector3::new(2.5e-3, 0.0, 0.0), Vector3::new(0.0, 5.9e-4, 0.0));
        let emb = BodyState::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0172, 0.0));
        let moon = moon_from_barycenter(geo.clone(), emb.clone(), emrat);
        let earth = moon.clone() - geo;

        // (M_earth·Earth + M_moon·Moon) / (M_earth + M_moon) == EMB
        let center = (earth.position * emrat + moon.position) / (1.0 + emrat);
        assert_abs_diff_eq!((center - emb.position).amax(), 0.0, epsilon = 1e-15);
        assert!(moon.velocity.is_some());
    }
}
