//! Bundle of ephemeris sources used by one generation run.
//!
//! A run needs a **fundamental** source (Sun, planets, Moon, Earth-Moon barycenter and the
//! associated constants) and, optionally, an **asteroid** source and a **KBO** source whose
//! objects become additional perturbers. Sources are shared read-only between worker threads.
//!
//! KBO masses are not part of typical KBO ephemeris releases; they are taken from the DE440
//! integration constants (`MA8001` … `MA8030`) and kept in a static table initialized once.
use once_cell::sync::Lazy;
use std::sync::Arc;

use super::{EphemerisObject, EphemerisSource};
use crate::ephem_errors::EphemError;

/// Mass parameter of a known KBO.
#[derive(Debug, Clone)]
struct KboMass {
    id: &'static str,
    name: &'static str,
    gm: f64,
}

/// DE440 KBO mass parameters (au³/day²), initialized once on first access.
static KNOWN_KBOS: Lazy<Vec<KboMass>> = Lazy::new(|| {
    const TABLE: [(&str, &str, f64); 30] = [
        ("136199", "Eris", 2.48544803028732e-12),
        ("136108", "Haumea", 5.96163005450428e-13),
        ("90377", "Sedna", 1.49348678842449e-13),
        ("136472", "Makemake", 3.43185550062921e-13),
        ("50000", "Quaoar", 1.52948774597511e-13),
        ("84522", "2002 TC302", 2.28199634312045e-13),
        ("90482", "Orcus", 9.40962464315611e-14),
        ("20000", "Varuna", 5.49507522341186e-14),
        ("55637", "2002 UX25", 1.86035124454487e-14),
        ("28978", "Ixion", 4.51766562250976e-14),
        ("307261", "2002 MS4", 7.65350174906720e-14),
        ("174567", "Varda", 3.96577688696419e-14),
        ("", "2006 QH181", 6.99160258973788e-14),
        ("", "2004 XR190", 2.90409951818848e-14),
        ("55565", "2002 AW197", 6.02473242459976e-14),
        ("145452", "2005 RN43", 3.62854799177896e-14),
        ("90568", "2004 GV9", 3.71935023738244e-14),
        ("208996", "2003 AZ84", 6.08212352839477e-14),
        ("225088", "Gonggong", 2.58567882770904e-13),
        ("19521", "Chaos", 2.53837964562973e-14),
        ("120347", "Salacia", 6.51170207936313e-14),
        ("278361", "2007 JJ43", 2.67691589753377e-14),
        ("", "2010 KZ39", 2.95798751569601e-14),
        ("230965", "2004 XA192", 3.64502260200911e-15),
        ("42301", "2001 UR163", 2.72519389203377e-14),
        ("455502", "2003 UZ413", 6.48385807558172e-14),
        ("", "2010 RF43", 1.75614259349073e-14),
        ("523639", "2010 RE64", 1.91288669686944e-14),
        ("528381", "2008 ST291", 2.13389035100458e-14),
        ("", "2010 FX86", 2.57103425708102e-14),
    ];
    TABLE
        .iter()
        .map(|&(id, name, gm)| KboMass { id, name, gm })
        .collect()
});

/// Mass parameter of a KBO from the built-in DE440 table.
///
/// Objects are matched by identifier when the table entry has one, by case-insensitive name
/// otherwise (unnumbered objects).
///
/// Return
/// ----------
/// * The mass parameter (au³/day²), or `0.0` for unknown objects.
pub fn kbo_mass(object: &EphemerisObject) -> f64 {
    KNOWN_KBOS
        .iter()
        .find(|k| {
            if k.id.is_empty() {
                k.name.eq_ignore_ascii_case(&object.name)
            } else {
                k.id == object.id
            }
        })
        .map(|k| k.gm)
        .unwrap_or(0.0)
}

/// Name of the fundamental-source constant holding an asteroid's mass parameter (`MA0001`).
///
/// Return
/// ----------
/// * `None` when the asteroid identifier is not a number.
pub fn asteroid_mass_constant(id: &str) -> Option<String> {
    id.trim().parse::<u32>().ok().map(|n| format!("MA{n:04}"))
}

/// The set of ephemeris sources available to a run.
#[derive(Clone)]
pub struct Ephemerides {
    fundamental: Arc<dyn EphemerisSource>,
    asteroids: Option<Arc<dyn EphemerisSource>>,
    kbos: Option<Arc<dyn EphemerisSource>>,
}

impl std::fmt::Debug for Ephemerides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ephemerides")
            .field("fundamental", &self.fundamental.name())
            .field("asteroids", &self.asteroids.as_ref().map(|s| s.name().to_string()))
            .field("kbos", &self.kbos.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl Ephemerides {
    pub fn new(fundamental: Arc<dyn EphemerisSource>) -> Self {
        Ephemerides {
            fundamental,
            asteroids: None,
            kbos: None,
        }
    }

    pub fn with_asteroids(mut self, source: Arc<dyn EphemerisSource>) -> Self {
        self.asteroids = Some(source);
        self
    }

    pub fn with_kbos(mut self, source: Arc<dyn EphemerisSource>) -> Self {
        self.kbos = Some(source);
        self
    }

    pub fn fundamental(&self) -> &Arc<dyn EphemerisSource> {
        &self.fundamental
    }

    /// Asteroid source; required when asteroid perturbers are enabled.
    pub fn asteroids(&self) -> Result<&Arc<dyn EphemerisSource>, EphemError> {
        self.asteroids.as_ref().ok_or_else(|| {
            EphemError::InvalidEphemerisSource(
                "The asteroid ephemerides source has not been defined.".into(),
            )
        })
    }

    /// KBO source; required when KBO perturbers are enabled.
    pub fn kbos(&self) -> Result<&Arc<dyn EphemerisSource>, EphemError> {
        self.kbos.as_ref().ok_or_else(|| {
            EphemError::InvalidEphemerisSource(
                "The KBO ephemerides source has not been defined.".into(),
            )
        })
    }

    /// Solar mass parameter of the fundamental source.
    pub fn gms(&self) -> Result<f64, EphemError> {
        self.fundamental.constant_value("GMS")
    }

    /// Time range shared by all configured sources.
    pub fn time_range(&self) -> (f64, f64) {
        let mut start = self.fundamental.start_jd();
        let mut end = self.fundamental.end_jd();
        for s in self.asteroids.iter().chain(self.kbos.iter()) {
            start = start.max(s.start_jd());
            end = end.min(s.end_jd());
        }
        (start, end)
    }
}

#[cfg(test)]
mod ephemerides_test {
    use super::*;

    #[test]
    fn test_kbo_mass_lookup() {
        let eris = EphemerisObject {
            id: "136199".into(),
            name: "Eris".into(),
            ..Default::default()
        };
        assert_eq!(kbo_mass(&eris), 2.48544803028732e-12);

        let unnumbered = EphemerisObject {
            id: String::new(),
            name: "2010 fx86".into(),
            ..Default::default()
        };
        assert_eq!(kbo_mass(&unnumbered), 2.57103425708102e-14);

        let unknown = EphemerisObject {
            id: "1".into(),
            name: "Ceres".into(),
            ..Default::default()
        };
        assert_eq!(kbo_mass(&unknown), 0.0);
    }

    #[test]
    fn test_asteroid_mass_constant() {
        assert_eq!(asteroid_mass_constant("1").as_deref(), Some("MA0001"));
        assert_eq!(asteroid_mass_constant("704").as_deref(), Some("MA0704"));
        assert_eq!(asteroid_mass_constant("2004 XR190"), None);
    }
}
