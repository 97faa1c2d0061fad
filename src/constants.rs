//! # Constants and type definitions for ephemgen
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** used by the integration engine, the compaction stage and the orbital-element
//! utilities.
//!
//! ## Overview
//!
//! - Astronomical constants (AU, speed of light, solar mass parameter)
//! - Unit conversions (degrees ↔ radians, days ↔ seconds, km ↔ AU)
//! - Time-scale anchors (J2000.0 in Julian days, Julian century)
//! - Core type aliases used across the crate
//! - Identifiers for integrated objects ([`ObjectNumber`])
//!
//! All distances handled by the engine are in **astronomical units**, times in **days**
//! (Julian Dates on the TDB scale) and gravitational parameters in **au³/day²**.

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of days in a Julian century
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// Astronomical Unit in kilometers (IAU 2012)
pub const AU: f64 = 149_597_870.7;

/// Julian Date of the J2000.0 epoch (2000-01-01 12:00:00 TDB)
pub const J2000_JD: f64 = 2_451_545.0;

/// Arcseconds → radians
pub const RADSEC: f64 = std::f64::consts::PI / 648000.0;

/// Speed of light in km/s
pub const VLIGHT: f64 = 2.99792458e5;

/// Speed of light in astronomical units per day
pub const VLIGHT_AU: f64 = 173.144_632_674_240_33;

/// Square of the speed of light in (au/day)²
pub const VLIGHT_AU_SQUARED: f64 = 29_979.063_823_897_612;

/// Solar mass parameter GM☉ from DE440 (au³/day²), k² with k the Gaussian constant.
pub const GMS_DE440: f64 = 2.959_122_082_841_195_6e-4;

/// Obliquity of the ecliptic at J2000.0 (radians), as used by the DE4xx frames.
pub const OBLIQUITY_J2000: f64 = 84_381.448 * RADSEC;

/// Bodies with a mass parameter below this threshold are excluded from relativistic terms.
pub const RELATIVISTIC_GM_THRESHOLD: f64 = 1.0e-14;

/// Shortest integration span accepted by the orchestrator (days).
pub const MIN_INTEGRATION_SPAN: f64 = 5.0;

/// Eccentricity band around 1 treated as near-parabolic by the element utilities.
pub const NEAR_PARABOLIC_BAND: f64 = 0.001;

/// Default radius of a minor-body perturber whose size is unknown (km).
pub const DEFAULT_MINOR_BODY_RADIUS_KM: f64 = 75.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Julian Date on the TDB time scale (days)
pub type JulianDate = f64;

// -------------------------------------------------------------------------------------------------
// Identifiers
// -------------------------------------------------------------------------------------------------

/// Identifier of an integrated object.
///
/// This can be:
/// - An asteroid number (e.g. `Int(1234)`)
/// - A string designation (e.g. `"1P"`, `"2004 XR190"`, or an automatically assigned `"X0001"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum ObjectNumber {
    /// Integer-based MPC designation (e.g. 1, 433…)
    Int(u32),
    /// String-based designation (provisional, comet, etc.)
    String(String),
}

impl std::fmt::Display for ObjectNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectNumber::Int(n) => write!(f, "{n}"),
            ObjectNumber::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u32> for ObjectNumber {
    fn from(n: u32) -> Self {
        ObjectNumber::Int(n)
    }
}

impl From<String> for ObjectNumber {
    fn from(s: String) -> Self {
        ObjectNumber::String(s)
    }
}

impl From<&str> for ObjectNumber {
    /// Pure digits become `Int`, anything else a `String`.
    fn from(s: &str) -> Self {
        match s.parse::<u32>() {
            Ok(n) => ObjectNumber::Int(n),
            Err(_) => ObjectNumber::String(s.to_string()),
        }
    }
}

#[cfg(test)]
mod constants_test {
    use super::*;

    #[test]
    fn test_light_speed_consistency() {
        let c = VLIGHT / AU * SECONDS_PER_DAY;
        approx::assert_relative_eq!(c, VLIGHT_AU, epsilon = 1e-13);
        approx::assert_relative_eq!(VLIGHT_AU * VLIGHT_AU, VLIGHT_AU_SQUARED, epsilon = 1e-9);
    }

    #[test]
    fn test_object_number_from_str() {
        assert_eq!(ObjectNumber::from("433"), ObjectNumber::Int(433));
        assert_eq!(
            ObjectNumber::from("2004 XR190"),
            ObjectNumber::String("2004 XR190".into())
        );
        assert_eq!(ObjectNumber::Int(1).to_string(), "1");
    }
}
