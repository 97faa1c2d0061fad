//! In-memory ephemeris source backed by Chebyshev expansions.
//!
//! [`ChebyshevEphemeris`] stores, per object, a time-ordered list of
//! [`SerializableEphemerisData`] records, the same records the compaction engine produces. It
//! therefore serves two purposes:
//!
//! * reading back generated ephemerides (e.g. to use integrated asteroids as perturbers of a
//!   later run, or to verify a compaction),
//! * building fundamental/asteroid sources from any analytic or tabulated model through
//!   [`ChebyshevEphemeris::fit_object`].
//!
//! Velocities come from the object's order-1 records when present, otherwise from the
//! derivative of the position expansions; accelerations are always derivatives of velocities.
use ahash::RandomState;
use nalgebra::Vector3;
use std::collections::HashMap;

use super::records::{SerializableEphemerisData, SerializableEphemerisObjectData};
use super::{BodyState, EphemerisObject, EphemerisSource};
use crate::chebyshev::ChebyshevExpansion;
use crate::constants::JulianDate;
use crate::ephem_errors::EphemError;

#[derive(Debug, Clone)]
struct ObjectTrack {
    info: EphemerisObject,
    position: Vec<SerializableEphemerisData>,
    velocity: Vec<SerializableEphemerisData>,
    acceleration: Vec<SerializableEphemerisData>,
}

impl ObjectTrack {
    fn segment<'a>(
        segments: &'a [SerializableEphemerisData],
        jd: JulianDate,
    ) -> &'a SerializableEphemerisData {
        let i = segments.partition_point(|s| s.start_jd <= jd);
        &segments[i.saturating_sub(1).min(segments.len() - 1)]
    }
}

fn differentiate(records: &[SerializableEphemerisData]) -> Vec<SerializableEphemerisData> {
    records
        .iter()
        .map(|r| SerializableEphemerisData {
            start_jd: r.start_jd,
            span: r.span,
            expansion: r.expansion.derivative(),
        })
        .collect()
}

/// Ephemeris source holding day-aligned Chebyshev expansions in memory.
#[derive(Debug, Clone)]
pub struct ChebyshevEphemeris {
    name: String,
    start_jd: JulianDate,
    end_jd: JulianDate,
    constants: HashMap<String, f64, RandomState>,
    objects: Vec<ObjectTrack>,
    index: HashMap<String, usize, RandomState>,
}

impl ChebyshevEphemeris {
    /// Build a source from per-object records and a table of constants.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: name of the source, for diagnostics.
    /// * `records`: one record per object, with non-empty, time-ordered position expansions.
    /// * `constants`: `(name, value)` pairs (`"GMS"`, `"EMRAT"`, `"MA0001"`…).
    ///
    /// Return
    /// ----------
    /// * The source, whose time range is the intersection of all object ranges, or
    ///   [`EphemError::InvalidEphemerisSource`] if no object is given, an object has no position
    ///   data, or an identifier is duplicated.
    pub fn new<I>(
        name: &str,
        records: Vec<SerializableEphemerisObjectData>,
        constants: I,
    ) -> Result<Self, EphemError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        if records.is_empty() {
            return Err(EphemError::InvalidEphemerisSource(format!(
                "{name}: no objects"
            )));
        }

        let mut start_jd = f64::NEG_INFINITY;
        let mut end_jd = f64::INFINITY;
        let mut objects = Vec::with_capacity(records.len());
        let mut index = HashMap::with_hasher(RandomState::new());

        for rec in records {
            let (s, e) = rec.time_span().ok_or_else(|| {
                EphemError::InvalidEphemerisSource(format!(
                    "{name}: object '{}' has no position data",
                    rec.id
                ))
            })?;
            start_jd = start_jd.max(s);
            end_jd = end_jd.min(e);

            if index.insert(rec.id.clone(), objects.len()).is_some() {
                return Err(EphemError::InvalidEphemerisSource(format!(
                    "{name}: duplicate object '{}'",
                    rec.id
                )));
            }

            let [position, velocity] = rec.data;
            let velocity = if velocity.is_empty() {
                differentiate(&position)
            } else {
                velocity
            };
            let acceleration = differentiate(&velocity);

            objects.push(ObjectTrack {
                info: EphemerisObject {
                    id: rec.id,
                    name: rec.name,
                    origin_id: rec.origin_id,
                    diameter: rec.d,
                },
                position,
                velocity,
                acceleration,
            });
        }

        if end_jd <= start_jd {
            return Err(EphemError::InvalidEphemerisSource(format!(
                "{name}: objects do not share a common time range"
            )));
        }

        Ok(ChebyshevEphemeris {
            name: name.to_string(),
            start_jd,
            end_jd,
            constants: constants.into_iter().collect(),
            objects,
            index,
        })
    }

    /// Fit a position function into a record of fixed-length Chebyshev segments.
    ///
    /// Arguments
    /// -----------------
    /// * `info`: object identifiers; the diameter is carried over to the record.
    /// * `start`, `end`: time range (JD TDB).
    /// * `segment_days`: length of each segment (the last one may be shorter).
    /// * `n`: number of coefficients per axis and segment.
    /// * `f`: position (au) as a function of the Julian Date.
    ///
    /// Return
    /// ----------
    /// * A record with position expansions only; velocities are derived on load.
    pub fn fit_object<F>(
        info: &EphemerisObject,
        start: JulianDate,
        end: JulianDate,
        segment_days: f64,
        n: usize,
        mut f: F,
    ) -> Result<SerializableEphemerisObjectData, EphemError>
    where
        F: FnMut(JulianDate) -> Vector3<f64>,
    {
        if segment_days.partial_cmp(&0.0) != Some(std::cmp::Ordering::Greater) {
            return Err(EphemError::InvalidParameter(
                "segment length must be > 0".into(),
            ));
        }
        let mut rec = SerializableEphemerisObjectData::new(&info.id, &info.origin_id, &info.name);
        rec.d = info.diameter;

        let mut t = start;
        while t < end {
            let span = segment_days.min(end - t);
            let expansion = ChebyshevExpansion::fit(0.0, span, n, |dt| Ok(f(t + dt)))?;
            rec.data[0].push(SerializableEphemerisData {
                start_jd: t,
                span,
                expansion,
            });
            t += span;
        }
        Ok(rec)
    }

    fn track(&self, id: &str) -> Result<&ObjectTrack, EphemError> {
        self.index
            .get(id)
            .map(|&i| &self.objects[i])
            .ok_or_else(|| EphemError::ObjectNotAvailable(format!("{id} ({})", self.name)))
    }
}

impl EphemerisSource for ChebyshevEphemeris {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_jd(&self) -> JulianDate {
        self.start_jd
    }

    fn end_jd(&self) -> JulianDate {
        self.end_jd
    }

    fn objects(&self) -> Vec<EphemerisObject> {
        self.objects.iter().map(|o| o.info.clone()).collect()
    }

    fn is_object_available(&self, id: &str, origin_id: &str) -> bool {
        self.track(id)
            .map(|o| o.info.origin_id == origin_id)
            .unwrap_or(false)
    }

    fn constant_value(&self, name: &str) -> Result<f64, EphemError> {
        self.constants
            .get(name)
            .copied()
            .ok_or_else(|| EphemError::UndefinedConstant(name.to_string()))
    }

    fn state(&self, id: &str, jd: JulianDate) -> Result<BodyState, EphemError> {
        let track = self.track(id)?;
        self.check_range(id, jd)?;
        Ok(BodyState::new(
            ObjectTrack::segment(&track.position, jd).evaluate(jd),
            ObjectTrack::segment(&track.velocity, jd).evaluate(jd),
        ))
    }

    fn position(&self, id: &str, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        let track = self.track(id)?;
        self.check_range(id, jd)?;
        Ok(ObjectTrack::segment(&track.position, jd).evaluate(jd))
    }

    fn velocity(&self, id: &str, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        let track = self.track(id)?;
        self.check_range(id, jd)?;
        Ok(ObjectTrack::segment(&track.velocity, jd).evaluate(jd))
    }

    fn acceleration(&self, id: &str, jd: JulianDate) -> Result<Vector3<f64>, EphemError> {
        let track = self.track(id)?;
        self.check_range(id, jd)?;
        Ok(ObjectTrack::segment(&track.acceleration, jd).evaluate(jd))
    }
}

#[cfg(test)]
mod chebyshev_source_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn circle(jd: f64) -> Vector3<f64> {
        let w = 0.0172;
        let a = w * (jd - 2451545.0);
        Vector3::new(a.cos(), a.sin(), 0.0)
    }

    fn source() -> ChebyshevEphemeris {
        let info = EphemerisObject {
            id: "Ea".into(),
            name: "Earth".into(),
            origin_id: "SSB".into(),
            diameter: None,
        };
        let rec =
            ChebyshevEphemeris::fit_object(&info, 2451545.0, 2451645.0, 16.0, 24, circle).unwrap();
        ChebyshevEphemeris::new("test", vec![rec], [("GMS".to_string(), 2.9e-4)]).unwrap()
    }

    #[test]
    fn test_state_and_derivatives() {
        let src = source();
        let jd = 2451600.3;
        let st = src.state("Ea", jd).unwrap();
        assert_abs_diff_eq!((st.position - circle(jd)).amax(), 0.0, epsilon = 1e-13);

        let w = 0.0172;
        let a = w * (jd - 2451545.0);
        let v = st.velocity.unwrap();
        assert_abs_diff_eq!(v.x, -w * a.sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(v.y, w * a.cos(), epsilon = 1e-12);

        let acc = src.acceleration("Ea", jd).unwrap();
        assert_abs_diff_eq!(acc.x, -w * w * a.cos(), epsilon = 1e-10);
    }

    #[test]
    fn test_range_and_lookup_errors() {
        let src = source();
        assert_eq!(src.start_jd(), 2451545.0);
        assert_eq!(src.end_jd(), 2451645.0);
        assert!(src.state("Ea", 2451645.0).is_ok());
        assert!(matches!(
            src.state("Ea", 2451700.0),
            Err(EphemError::OutOfRange { .. })
        ));
        assert!(matches!(
            src.state("Ju", 2451600.0),
            Err(EphemError::ObjectNotAvailable(_))
        ));
        assert!(src.is_object_available("Ea", "SSB"));
        assert!(!src.is_object_available("Ea", "Sn"));
        assert_eq!(src.constant_value("GMS").unwrap(), 2.9e-4);
        assert!(!src.is_constant_available("GM5"));
    }

    #[test]
    fn test_empty_source_is_rejected() {
        assert!(ChebyshevEphemeris::new("empty", vec![], std::iter::empty()).is_err());
    }
}
