//! Time helpers for Julian Dates on the TDB scale.
//!
//! The engine works with plain `f64` Julian Dates internally; [`hifitime`] is used at the edges
//! (parsing user dates, rendering collision/diagnostic times) so that every displayed instant
//! carries an explicit time scale.
use hifitime::{Epoch, TimeScale};
use std::str::FromStr;

use crate::constants::{JulianDate, DAYS_PER_JULIAN_CENTURY, J2000_JD};
use crate::ephem_errors::EphemError;

/// Build an [`Epoch`] from a Julian Date on the TDB scale.
pub fn jd_to_epoch(jd: JulianDate) -> Epoch {
    Epoch::from_jde_tdb(jd)
}

/// Render a TDB Julian Date as an ISO-8601 calendar string (`YYYY-MM-DDTHH:MM:SS TDB`).
pub fn format_jd(jd: JulianDate) -> String {
    format!("{}", jd_to_epoch(jd))
}

/// Parse a calendar date (any format accepted by [`Epoch::from_str`]) into a TDB Julian Date.
///
/// Arguments
/// -----------------
/// * `date`: e.g. `"2024-03-01T00:00:00 TDB"`; when no time scale is given, UTC is assumed.
///
/// Return
/// ----------
/// * The Julian Date on the TDB scale, or [`EphemError::InvalidParameter`] if parsing fails.
pub fn date_to_jd_tdb(date: &str) -> Result<JulianDate, EphemError> {
    let epoch = Epoch::from_str(date)
        .map_err(|e| EphemError::InvalidParameter(format!("invalid date '{date}': {e}")))?;
    Ok(epoch.to_time_scale(TimeScale::TDB).to_jde_tdb_days())
}

/// Days elapsed since J2000.0 (TDB).
#[inline]
pub fn days_since_j2000(jd: JulianDate) -> f64 {
    jd - J2000_JD
}

/// Julian centuries elapsed since J2000.0 (TDB).
#[inline]
pub fn centuries_since_j2000(jd: JulianDate) -> f64 {
    (jd - J2000_JD) / DAYS_PER_JULIAN_CENTURY
}

/// Whole-day window covered by a time interval.
///
/// Day windows start at `JDI + 0.5` (0h TDB), so the first complete window inside
/// `[start, end]` is `ceil(start − 0.5)` and the last boundary is `floor(end − 0.5)`.
///
/// Return
/// ----------
/// * `(start_jdi, end_jdi)`; the interval covers `end_jdi − start_jdi` complete days.
pub fn julian_day_window(start: JulianDate, end: JulianDate) -> (i64, i64) {
    ((start - 0.5).ceil() as i64, (end - 0.5).floor() as i64)
}

/// Reduce an angle in degrees to `[0, 360)`.
#[inline]
pub fn reduce_degrees(x: f64) -> f64 {
    let r = x.rem_euclid(360.0);
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}
