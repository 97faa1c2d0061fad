//! Persistable per-object ephemeris records.
//!
//! These are the values handed to the ephemeris-container writer: for each successfully
//! integrated object, its identifiers, optional physical/photometric scalars, and per derivative
//! order a time-ordered list of day-aligned Chebyshev expansions. The container's on-disk layout
//! is not part of this crate; the records derive `serde` traits so any format can be used.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::chebyshev::ChebyshevExpansion;
use crate::constants::JulianDate;

/// One Chebyshev expansion valid over `[start_jd, start_jd + span]`.
///
/// The expansion's own domain is `[0, span]` (days from `start_jd`), which keeps the time
/// argument small when evaluating at Julian Dates around 2.4e6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableEphemerisData {
    pub start_jd: JulianDate,
    pub span: f64,
    pub expansion: ChebyshevExpansion,
}

impl SerializableEphemerisData {
    pub fn end_jd(&self) -> JulianDate {
        self.start_jd + self.span
    }

    /// Evaluate at an absolute Julian Date.
    pub fn evaluate(&self, jd: JulianDate) -> Vector3<f64> {
        self.expansion.evaluate(jd - self.start_jd)
    }
}

/// Final record of one object: identifiers, optional scalars and expansions per derivative order.
///
/// Fields
/// -----------------
/// * `id`, `origin_id`, `name` – identifiers (`origin_id` is `"SSB"` for integrated objects).
/// * `h`, `g` – absolute magnitude and slope parameter.
/// * `b_v` – B−V color index.
/// * `d` – diameter (km).
/// * `data[0]` – position expansions (au); `data[1]` – velocity expansions (au/day), possibly
///   empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SerializableEphemerisObjectData {
    pub id: String,
    pub origin_id: String,
    pub name: String,
    pub h: Option<f64>,
    pub g: Option<f64>,
    pub b_v: Option<f64>,
    pub d: Option<f64>,
    pub data: [Vec<SerializableEphemerisData>; 2],
}

impl SerializableEphemerisObjectData {
    pub fn new(id: &str, origin_id: &str, name: &str) -> Self {
        SerializableEphemerisObjectData {
            id: id.to_string(),
            origin_id: origin_id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Time range covered by the position expansions, if any.
    pub fn time_span(&self) -> Option<(JulianDate, JulianDate)> {
        let first = self.data[0].first()?;
        let last = self.data[0].last()?;
        Some((first.start_jd, last.end_jd()))
    }

    pub fn has_velocity(&self) -> bool {
        !self.data[1].is_empty()
    }
}
