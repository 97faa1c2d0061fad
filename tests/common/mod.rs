#![allow(dead_code)]

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::Vector3;

use ephemgen::constants::{GMS_DE440, J2000_JD};
use ephemgen::elements::OrbitalElements;
use ephemgen::ephemeris::chebyshev_source::ChebyshevEphemeris;
use ephemgen::ephemeris::records::SerializableEphemerisObjectData;
use ephemgen::ephemeris::{EphemerisObject, EphemerisSource, SSB};
use ephemgen::job::IntegrationObjectData;

pub const START: f64 = 2_451_000.5;
pub const END: f64 = 2_452_000.5;

const EMRAT: f64 = 81.300_568_221_497_22;

pub fn init_logs() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
}

/// Circular heliocentric orbit of radius `a` in the ICRS xy plane.
pub fn circular(a: f64, phase: f64) -> impl Fn(f64) -> Vector3<f64> + Clone {
    let n = (GMS_DE440 / (a * a * a)).sqrt();
    move |jd| {
        let u = phase + n * (jd - J2000_JD);
        Vector3::new(a * u.cos(), a * u.sin(), 0.0)
    }
}

fn fit(id: &str, name: &str, f: impl Fn(f64) -> Vector3<f64>) -> SerializableEphemerisObjectData {
    let info = EphemerisObject {
        id: id.into(),
        name: name.into(),
        origin_id: SSB.into(),
        diameter: None,
    };
    ChebyshevEphemeris::fit_object(&info, START, END, 8.0, 20, f).unwrap()
}

/// A fixed Sun at the barycenter; the only constant is `GMS`.
pub fn sun_only() -> Arc<dyn EphemerisSource> {
    let records = vec![fit("Sn", "Sun", |_| Vector3::zeros())];
    Arc::new(
        ChebyshevEphemeris::new("sun-only", records, [("GMS".to_string(), GMS_DE440)]).unwrap(),
    )
}

/// Sun, planets, Earth and Moon on circular orbits.
pub fn toy_system() -> Arc<dyn EphemerisSource> {
    let mu = 1.0 / (1.0 + EMRAT);
    let moon = |jd: f64| {
        let u = 0.229_970_9 * (jd - J2000_JD);
        Vector3::new(2.57e-3 * u.cos(), 2.57e-3 * u.sin(), 0.0)
    };
    let emb = circular(1.0, 1.75);
    let (emb_e, emb_m) = (emb.clone(), emb.clone());
    let records = vec![
        fit("Sn", "Sun", |_| Vector3::zeros()),
        fit("Me", "Mercury", circular(0.387, 0.3)),
        fit("Ve", "Venus", circular(0.723, 2.1)),
        fit("Ma", "Mars", circular(1.524, 4.0)),
        fit("Ju", "Jupiter", circular(5.203, 0.6)),
        fit("Sa", "Saturn", circular(9.537, 0.8)),
        fit("Ur", "Uranus", circular(19.19, 5.5)),
        fit("Ne", "Neptune", circular(30.07, 5.3)),
        fit("Pl", "Pluto", circular(39.48, 4.2)),
        fit("EMB", "Earth-Moon barycenter", emb),
        fit("Ea", "Earth", move |jd| emb_e(jd) - moon(jd) * mu),
        fit("Mn", "Moon", move |jd| emb_m(jd) + moon(jd) * (1.0 - mu)),
    ];
    let constants = [
        ("GMS", GMS_DE440),
        ("GM1", 4.912_547_451_450_812e-11),
        ("GM2", 7.243_452_486_162_703e-10),
        ("GMB", 8.997_011_390_199_871e-10),
        ("GM4", 9.549_548_695_550_771e-11),
        ("GM5", 2.825_345_842_083_778e-7),
        ("GM6", 8.459_706_073_245_031e-8),
        ("GM7", 1.292_024_825_782_741e-8),
        ("GM8", 1.524_357_347_885_194e-8),
        ("GM9", 2.175_096_464_893_358e-12),
        ("EMRAT", EMRAT),
        ("J2SUN", 2.196_139_151_652_443e-7),
        ("J2E", 1.082_626_261_264_994e-3),
        ("J2M", 2.032_150_550_241_974e-4),
    ]
    .map(|(k, v)| (k.to_string(), v));
    Arc::new(ChebyshevEphemeris::new("toy-system", records, constants).unwrap())
}

/// Object on a circular orbit of radius `a`, with its state at `epoch`.
pub fn circular_object(id: &str, a: f64, epoch: f64) -> IntegrationObjectData {
    let n = (GMS_DE440 / (a * a * a)).sqrt();
    let pos = circular(a, 0.5);
    let r = pos(epoch);
    let v = Vector3::new(-r.y, r.x, 0.0) * n;
    IntegrationObjectData::new(id, "", epoch, r, v)
}

pub fn assert_elements_close(actual: &OrbitalElements, expected: &OrbitalElements, epsilon: f64) {
    assert_relative_eq!(
        actual.semimajor_axis,
        expected.semimajor_axis,
        epsilon = epsilon
    );
    assert_relative_eq!(
        actual.eccentricity,
        expected.eccentricity,
        epsilon = epsilon
    );
    assert_relative_eq!(actual.inclination, expected.inclination, epsilon = epsilon);
    assert_relative_eq!(
        actual.ascending_node,
        expected.ascending_node,
        epsilon = epsilon
    );
    assert_relative_eq!(
        actual.argument_of_perihelion,
        expected.argument_of_perihelion,
        epsilon = epsilon
    );
}
