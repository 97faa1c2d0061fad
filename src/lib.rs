pub mod chebyshev;
pub mod compaction;
pub mod constants;
pub mod elements;
pub mod ephem_errors;
pub mod ephemeris;
pub mod integration;
pub mod job;
pub mod monitor;
pub mod orchestration;
pub mod perturber;
pub mod precision;
pub mod summation;
pub mod time;

pub use compaction::{CompactionParams, EphemerisCollection};
pub use ephem_errors::EphemError;
pub use ephemeris::ephemerides::Ephemerides;
pub use ephemeris::EphemerisSource;
pub use integration::params::IntegrationParams;
pub use job::IntegrationObjectData;
pub use orchestration::{EphemerisGenerator, Generation, GeneratorParams, OrchestrationMode};
pub use precision::Precision;

#[cfg(test)]
pub(crate) mod unit_test_global {
    use nalgebra::Vector3;
    use std::sync::Arc;

    use crate::constants::{GMS_DE440, J2000_JD};
    use crate::ephemeris::chebyshev_source::ChebyshevEphemeris;
    use crate::ephemeris::records::SerializableEphemerisObjectData;
    use crate::ephemeris::{EphemerisObject, EphemerisSource, SSB};

    pub(crate) const TOY_START: f64 = 2_451_400.5;
    pub(crate) const TOY_END: f64 = 2_451_700.5;
    pub(crate) const TOY_EMRAT: f64 = 81.300_568_221_497_22;

    const MOON_DISTANCE: f64 = 2.57e-3;
    const MOON_RATE: f64 = 0.229_970_9;

    /// Circular heliocentric orbit in the ICRS xy plane.
    pub(crate) fn circular(a: f64, phase: f64) -> impl Fn(f64) -> Vector3<f64> {
        let n = (GMS_DE440 / (a * a * a)).sqrt();
        move |jd| {
            let u = phase + n * (jd - J2000_JD);
            Vector3::new(a * u.cos(), a * u.sin(), 0.0)
        }
    }

    fn moon_geocentric(jd: f64) -> Vector3<f64> {
        let u = MOON_RATE * (jd - J2000_JD);
        Vector3::new(MOON_DISTANCE * u.cos(), MOON_DISTANCE * u.sin(), 0.0)
    }

    fn object(id: &str, name: &str, origin: &str, diameter: Option<f64>) -> EphemerisObject {
        EphemerisObject {
            id: id.into(),
            name: name.into(),
            origin_id: origin.into(),
            diameter,
        }
    }

    fn fit(info: EphemerisObject, f: impl Fn(f64) -> Vector3<f64>) -> SerializableEphemerisObjectData {
        ChebyshevEphemeris::fit_object(&info, TOY_START, TOY_END, 8.0, 20, f)
            .expect("toy ephemeris fit")
    }

    fn constants() -> Vec<(String, f64)> {
        [
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
            ("EMRAT", TOY_EMRAT),
            ("J2SUN", 2.196_139_151_652_443e-7),
            ("J2E", 1.082_626_261_264_994e-3),
            ("J2M", 2.032_150_550_241_974e-4),
            ("MA0001", 1.400_476_556_172_344e-13),
            ("MA0004", 3.854_750_187_808_810e-14),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Sun and planets on circular orbits, with the Moon either barycentric or geocentric.
    pub(crate) fn toy_fundamental(moon_barycentric: bool) -> Arc<dyn EphemerisSource> {
        let emb = circular(1.0, 1.75);
        let mu = 1.0 / (1.0 + TOY_EMRAT);
        let mut records = vec![
            fit(object("Sn", "Sun", SSB, None), |_| Vector3::zeros()),
            fit(object("Me", "Mercury", SSB, None), circular(0.387, 0.3)),
            fit(object("Ve", "Venus", SSB, None), circular(0.723, 2.1)),
            fit(object("Ma", "Mars", SSB, None), circular(1.524, 4.0)),
            fit(object("Ju", "Jupiter", SSB, None), circular(5.203, 0.6)),
            fit(object("Sa", "Saturn", SSB, None), circular(9.537, 0.8)),
            fit(object("Ur", "Uranus", SSB, None), circular(19.19, 5.5)),
            fit(object("Ne", "Neptune", SSB, None), circular(30.07, 5.3)),
            fit(object("Pl", "Pluto", SSB, None), circular(39.48, 4.2)),
            fit(object("EMB", "Earth-Moon barycenter", SSB, None), circular(1.0, 1.75)),
            fit(object("Ea", "Earth", SSB, None), move |jd| {
                emb(jd) - moon_geocentric(jd) * mu
            }),
        ];
        if moon_barycentric {
            let emb = circular(1.0, 1.75);
            records.push(fit(object("Mn", "Moon", SSB, None), move |jd| {
                emb(jd) + moon_geocentric(jd) * (1.0 - mu)
            }));
        } else {
            records.push(fit(object("Mn", "Moon", "Ea", None), moon_geocentric));
        }
        Arc::new(ChebyshevEphemeris::new("toy-de", records, constants()).expect("toy ephemeris"))
    }

    /// Three asteroids; only "1" and "4" have a mass constant in the toy fundamental source.
    pub(crate) fn toy_asteroids() -> Arc<dyn EphemerisSource> {
        let records = vec![
            fit(object("1", "Ceres", SSB, Some(939.4)), circular(2.77, 1.0)),
            fit(object("4", "Vesta", SSB, Some(525.4)), circular(2.36, 3.0)),
            fit(object("99942", "Apophis", SSB, None), circular(0.92, 0.2)),
        ];
        Arc::new(ChebyshevEphemeris::new("toy-ast", records, std::iter::empty()).expect("toy asteroids"))
    }
}
