//! Collision reporting and impact-time localization.
//!
//! The force model flags any evaluation point that falls inside a perturber's reference
//! ellipsoid. After the step containing such a point is accepted, the integration loop scans the
//! step's continuous solution, on a uniform grid plus the time of the flagged point, for the
//! first inside sample and bisects the crossing down to less than one second. A confirmed collision ends the integration of the object with
//! [`EphemError::Collision`].
use itertools::Itertools;
use nalgebra::Vector3;
use std::fmt;

use crate::constants::{Degree, JulianDate, SECONDS_PER_DAY};
use crate::ephem_errors::EphemError;
use crate::perturber::PerturberBody;
use crate::time::{format_jd, reduce_degrees};

/// Number of uniform samples scanned inside the flagged step.
pub const COLLISION_SCAN_SAMPLES: usize = 64;

/// Impact times are refined until the bracketing interval is shorter than this (days).
pub const COLLISION_TIME_RESOLUTION: f64 = 1.0 / SECONDS_PER_DAY;

/// Details of a detected collision.
///
/// Fields
/// -----------------
/// * `detection_jd` – end of the integration step in which the collision was confirmed.
/// * `perturber_id`, `perturber_name` – the body that was hit.
/// * `impact_jd` – refined impact time (TDB), within one second.
/// * `body_fixed_position` – impact point in the body-fixed frame (au).
/// * `longitude`, `latitude` – planetocentric coordinates of the impact point (degrees).
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionData {
    pub detection_jd: JulianDate,
    pub perturber_id: String,
    pub perturber_name: String,
    pub impact_jd: JulianDate,
    pub body_fixed_position: Vector3<f64>,
    pub longitude: Degree,
    pub latitude: Degree,
}

impl CollisionData {
    pub(crate) fn new(
        body: &PerturberBody,
        detection_jd: JulianDate,
        impact_jd: JulianDate,
        body_fixed_position: Vector3<f64>,
    ) -> Self {
        let p = body_fixed_position;
        CollisionData {
            detection_jd,
            perturber_id: body.id().to_string(),
            perturber_name: body.name().to_string(),
            impact_jd,
            body_fixed_position: p,
            longitude: reduce_degrees(p.y.atan2(p.x).to_degrees()),
            latitude: p.z.atan2(p.x.hypot(p.y)).to_degrees(),
        }
    }
}

impl fmt::Display for CollisionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Collision detected: {} | ({}) {} | impact at {}, lon={:.4}° lat={:+.4}°",
            format_jd(self.detection_jd),
            self.perturber_id,
            self.perturber_name,
            format_jd(self.impact_jd),
            self.longitude,
            self.latitude
        )
    }
}

/// Locate the first entry into a perturber's reference ellipsoid over `[tau0, tau1]`.
///
/// Arguments
/// -----------------
/// * `body`: the flagged perturber.
/// * `tau0`, `tau1`: bounds of the accepted step, in integrator time.
/// * `flagged`: integrator time of the evaluation found inside the body; added to the scan when
///   it falls within the step, so that a pass shorter than the grid spacing is not missed.
/// * `detection_jd`: physical time reported as detection time.
/// * `relative_at`: for an integrator time, the physical time and the body-fixed position of the
///   integrated object relative to the perturber.
///
/// Return
/// ----------
/// * `Ok(None)` if no sample of the step lies inside the ellipsoid (the flag came from a
///   rejected trial stage), otherwise the collision with an impact time refined by bisection.
pub(crate) fn localize<F>(
    body: &PerturberBody,
    tau0: f64,
    tau1: f64,
    flagged: Option<f64>,
    detection_jd: JulianDate,
    mut relative_at: F,
) -> Result<Option<CollisionData>, EphemError>
where
    F: FnMut(f64) -> Result<(JulianDate, Vector3<f64>), EphemError>,
{
    let h = tau1 - tau0;
    let grid = (0..COLLISION_SCAN_SAMPLES)
        .map(|k| tau0 + h * k as f64 / COLLISION_SCAN_SAMPLES as f64)
        .chain([tau1]);
    let seed = flagged.filter(|t| (tau0..=tau1).contains(t));
    let samples = grid.chain(seed).sorted_by(f64::total_cmp).dedup();

    let mut outside = tau0;
    let mut inside = None;

    for tau in samples {
        let (_, bf) = relative_at(tau)?;
        if body.inside_reference_ellipsoid(&bf) {
            inside = Some(tau);
            break;
        }
        outside = tau;
    }

    let Some(mut hit) = inside else {
        return Ok(None);
    };

    if hit > tau0 {
        while hit - outside >= COLLISION_TIME_RESOLUTION {
            let mid = 0.5 * (outside + hit);
            let (_, bf) = relative_at(mid)?;
            if body.inside_reference_ellipsoid(&bf) {
                hit = mid;
            } else {
                outside = mid;
            }
        }
    }

    let (impact_jd, bf) = relative_at(hit)?;
    Ok(Some(CollisionData::new(body, detection_jd, impact_jd, bf)))
}
