//! # Ephemeris compaction
//!
//! Repacks the dense output of an integration into day-aligned Chebyshev expansions of bounded
//! length, suitable for long-term storage in an ephemeris container.
//!
//! For each derivative order (position, then velocity when the dense output carries it) the
//! interval `[start_jdi + 0.5, end_jdi + 0.5]` is split into windows starting at whole Julian
//! days. Each window is grown day by day while a fit of the trial length still truncates within
//! the tolerance, and shrunk as soon as it does not. A window that cannot be fitted even over a
//! single day raises the trial length, and past the maximum length the tolerance is relaxed by
//! 10 % up to a hard ceiling.
//!
//! See also
//! ------------
//! * [`EphemerisCollection`] – thread-safe collector of compacted objects.
//! * [`crate::chebyshev::ChebyshevExpansion::truncate`] – the truncation rule.
use std::cmp::Ordering::{Equal, Greater};
use std::fmt;
use std::sync::Mutex;

use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::chebyshev::ChebyshevExpansion;
use crate::constants::JulianDate;
use crate::ephem_errors::EphemError;
use crate::ephemeris::records::{SerializableEphemerisData, SerializableEphemerisObjectData};
use crate::ephemeris::SSB;
use crate::integration::dense_output::DenseOutput;
use crate::job::IntegrationObjectData;
use crate::time::julian_day_window;

/// First trial length of a window.
pub const INITIAL_TRIAL_LENGTH: usize = 25;

/// Trial length after the tolerance has been relaxed.
pub const RESET_TRIAL_LENGTH: usize = 50;

const TRIAL_LENGTH_INCREMENT: usize = 10;
const RESTART_SPAN_DAYS: i64 = 12;
const TOLERANCE_ESCALATION: f64 = 1.1;

/// Initial window length (days) for an object at heliocentric-like distance `d` (au).
pub fn initial_expansion_span(d: f64) -> i64 {
    match d {
        d if d < 0.5 => 30,
        d if d < 0.7 => 140,
        d if d < 1.2 => 100,
        d if d < 1.5 => 250,
        d if d < 3.0 => 400,
        d if d < 5.0 => 700,
        d if d < 8.0 => 1000,
        d if d < 15.0 => 3400,
        d if d < 30.0 => 4500,
        _ => 5400,
    }
}

/// Settings of the compaction stage.
///
/// Fields
/// -----------------
/// * `tolerance_factor` – multiplier of the dense-output tolerance giving the truncation
///   tolerance of the stored expansions, in `[1, 100]`.
/// * `max_length` – hard maximum of the trial length (coefficients per axis).
/// * `max_tolerance_factor` – ceiling of the relaxed tolerance, as a multiple of the initial one.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionParams {
    pub tolerance_factor: f64,
    pub max_length: usize,
    pub max_tolerance_factor: f64,
}

impl Default for CompactionParams {
    fn default() -> Self {
        CompactionParams {
            tolerance_factor: 25.0,
            max_length: 250,
            max_tolerance_factor: 100.0,
        }
    }
}

impl CompactionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> CompactionParamsBuilder {
        CompactionParamsBuilder::new()
    }

    /// Check the parameters.
    ///
    /// Return
    /// ----------
    /// * [`EphemError::InvalidParameter`] if `tolerance_factor` lies outside `[1, 100]`,
    ///   `max_length` is below the reset length (50) or `max_tolerance_factor` is below 1.
    pub fn validate(&self) -> Result<(), EphemError> {
        let ge = CompactionParamsBuilder::ge;
        if !(ge(self.tolerance_factor, 1.0) && ge(100.0, self.tolerance_factor)) {
            return Err(EphemError::InvalidParameter(
                "tolerance_factor must be in [1, 100]".into(),
            ));
        }
        if self.max_length < RESET_TRIAL_LENGTH {
            return Err(EphemError::InvalidParameter(format!(
                "max_length must be >= {RESET_TRIAL_LENGTH}"
            )));
        }
        if !ge(self.max_tolerance_factor, 1.0) {
            return Err(EphemError::InvalidParameter(
                "max_tolerance_factor must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`CompactionParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct CompactionParamsBuilder {
    params: CompactionParams,
}

impl CompactionParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tolerance_factor(mut self, v: f64) -> Self {
        self.params.tolerance_factor = v;
        self
    }
    pub fn max_length(mut self, v: usize) -> Self {
        self.params.max_length = v;
        self
    }
    pub fn max_tolerance_factor(mut self, v: f64) -> Self {
        self.params.max_tolerance_factor = v;
        self
    }

    /// Return true iff x >= lo and not NaN.
    #[inline]
    fn ge(x: f64, lo: f64) -> bool {
        matches!(x.partial_cmp(&lo), Some(Greater) | Some(Equal))
    }

    /// Validate and return the parameters.
    ///
    /// See [`CompactionParams::validate`].
    pub fn build(self) -> Result<CompactionParams, EphemError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

impl fmt::Display for CompactionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 46;
            writeln!(f, "Compaction Parameters")?;
            writeln!(f, "---------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = " ".repeat(PARAM_COL.saturating_sub(s.len()).max(1));
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            line!("tolerance_factor     = {:.1}", self.tolerance_factor, "Stored / dense tolerance")?;
            line!("max_length           = {}", self.max_length, "Max coefficients per axis")?;
            line!(
                "max_tolerance_factor = {:.1}",
                self.max_tolerance_factor,
                "Ceiling of the relaxed tolerance"
            )
        } else {
            write!(
                f,
                "CompactionParams(factor={:.1}, max_length={}, ceiling={:.1})",
                self.tolerance_factor, self.max_length, self.max_tolerance_factor
            )
        }
    }
}

/// Summary of the compaction of one derivative order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompactionStats {
    pub order: usize,
    /// Number of expansions.
    pub count: usize,
    /// Shortest window (days), the clamped last window excluded unless it is the only one.
    pub min_span: i64,
    pub max_span: i64,
    /// Largest truncation error (au or au/day).
    pub max_error: f64,
    pub total_coefficients: usize,
}

impl fmt::Display for CompactionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "order {}: {} expansions, span {}..{} d, max error {:.3e}, {} coefficients",
            self.order,
            self.count,
            self.min_span,
            self.max_span,
            self.max_error,
            self.total_coefficients
        )
    }
}

/// Compact one derivative order of a dense output.
///
/// Arguments
/// -----------------
/// * `dense`: continuous solution covering `[start_jdi + 0.5, end_jdi + 0.5]`.
/// * `order`: 0 for position, 1 for velocity.
/// * `start_jdi`, `end_jdi`: whole-day bounds of the compacted interval.
/// * `initial_span`: first window length (days).
/// * `params`: compaction settings.
/// * `label`: object name used in errors.
///
/// Return
/// ----------
/// * The day-aligned expansions and their statistics, or
/// * [`EphemError::MaxTruncationErrorExceeded`] when relaxing the tolerance would pass the
///   ceiling,
/// * [`EphemError::TruncationErrorTooLarge`] when a stored expansion misses its tolerance.
pub fn compact_order(
    dense: &DenseOutput,
    order: usize,
    start_jdi: i64,
    end_jdi: i64,
    initial_span: i64,
    params: &CompactionParams,
    label: &str,
) -> Result<(Vec<SerializableEphemerisData>, CompactionStats), EphemError> {
    let sample = |jd: JulianDate| -> Result<Vector3<f64>, EphemError> {
        if order == 0 {
            dense.position(jd)
        } else {
            dense.velocity(jd)
        }
    };

    let mut records = Vec::new();
    let mut stats = CompactionStats {
        order,
        min_span: i64::MAX,
        ..Default::default()
    };
    let mut delta = initial_span.max(1);
    let mut jdi1 = start_jdi;

    while jdi1 < end_jdi {
        let t0 = jdi1 as f64 + 0.5;
        let initial_eps = dense.tolerance(t0)? * params.tolerance_factor;
        let ceiling = initial_eps * params.max_tolerance_factor;
        let mut eps = initial_eps;
        let mut length = INITIAL_TRIAL_LENGTH;
        let mut reduce = false;
        let mut relaxed = false;

        let (expansion, error, jdi2) = loop {
            let mut jdi2 = jdi1 + delta;
            if jdi2 > end_jdi {
                jdi2 = end_jdi;
                delta = end_jdi - jdi1;
            }

            let mut expansion =
                ChebyshevExpansion::fit(0.0, delta as f64, 2 * length, |dt| sample(t0 + dt))?;
            let error = expansion.truncate(eps, 1);

            if expansion.len() > length {
                delta -= 1;
                reduce = true;
            } else if !reduce && jdi2 < end_jdi {
                delta += 1;
            } else {
                if relaxed {
                    warn!("{label}: increased truncation error to {eps:.3e}");
                }
                break (expansion, error, jdi2);
            }

            if delta == 0 {
                length += TRIAL_LENGTH_INCREMENT;
                if length > params.max_length {
                    length = RESET_TRIAL_LENGTH;
                    eps *= TOLERANCE_ESCALATION;
                    relaxed = true;
                    if eps > ceiling {
                        return Err(EphemError::MaxTruncationErrorExceeded {
                            object: label.to_string(),
                            tolerance: eps,
                        });
                    }
                }
                delta = RESTART_SPAN_DAYS;
                reduce = false;
            }
        };

        if error > eps {
            return Err(EphemError::TruncationErrorTooLarge {
                object: label.to_string(),
                error,
                tolerance: eps,
            });
        }

        let span = jdi2 - jdi1;
        if jdi2 < end_jdi || stats.count == 0 {
            stats.min_span = stats.min_span.min(span);
        }
        stats.max_span = stats.max_span.max(span);
        stats.max_error = stats.max_error.max(error);
        stats.total_coefficients += expansion.total_coefficients();
        stats.count += 1;

        records.push(SerializableEphemerisData {
            start_jd: t0,
            span: span as f64,
            expansion,
        });
        jdi1 = jdi2;
    }

    if stats.count == 0 {
        stats.min_span = 0;
    }
    Ok((records, stats))
}

/// Compact the dense output of one object into its persistable record.
///
/// Arguments
/// -----------------
/// * `object`: identifiers and physical data copied to the record.
/// * `id`: id stored in the record (may differ from `object.id` when auto-assigned).
/// * `dense`: continuous solution covering `[start_jdi + 0.5, end_jdi + 0.5]`.
/// * `start_jdi`, `end_jdi`: whole-day bounds, `start_jdi < end_jdi`.
/// * `params`: compaction settings.
///
/// Return
/// ----------
/// * The record with position expansions, plus velocity expansions when `dense` carries
///   velocity.
pub fn compact_object(
    object: &IntegrationObjectData,
    id: &str,
    dense: &DenseOutput,
    start_jdi: i64,
    end_jdi: i64,
    params: &CompactionParams,
) -> Result<SerializableEphemerisObjectData, EphemError> {
    let label = object.label();
    if end_jdi <= start_jdi {
        return Err(EphemError::InvalidParameter(format!(
            "{label}: empty compaction interval [{start_jdi}, {end_jdi}]"
        )));
    }

    let mut record = SerializableEphemerisObjectData::new(id, SSB, &object.name);
    record.h = object.h;
    record.g = object.g;
    record.b_v = object.b_v;
    record.d = object.d;

    let distance = dense.position(start_jdi as f64 + 0.5)?.norm();
    let initial_span = initial_expansion_span(distance);
    let orders = if dense.has_velocity() { 2 } else { 1 };

    for order in 0..orders {
        let (data, stats) =
            compact_order(dense, order, start_jdi, end_jdi, initial_span, params, &label)?;
        debug!("{label}: {stats}");
        record.data[order] = data;
    }
    Ok(record)
}

#[derive(Debug, Default)]
struct CollectionState {
    span: Option<(i64, i64)>,
    counter: usize,
    objects: Vec<SerializableEphemerisObjectData>,
}

/// Thread-safe collector of compacted objects sharing one whole-day time span.
#[derive(Debug, Default)]
pub struct EphemerisCollection {
    params: CompactionParams,
    state: Mutex<CollectionState>,
}

impl EphemerisCollection {
    pub fn new(params: CompactionParams) -> Self {
        EphemerisCollection {
            params,
            state: Mutex::new(CollectionState::default()),
        }
    }

    pub fn params(&self) -> &CompactionParams {
        &self.params
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CollectionState> {
        // Poisoning is ignored: every update is a single push or assignment.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Compact and add one object.
    ///
    /// Arguments
    /// -----------------
    /// * `object`: the integrated object; an empty id is replaced by `X####`.
    /// * `dense`: its dense output.
    /// * `start_jd`, `end_jd`: requested time span; it is reduced to the complete days inside.
    ///
    /// Return
    /// ----------
    /// * The id of the stored record, or
    /// * [`EphemError::InconsistentTimeSpan`] when the whole-day span differs from the one of
    ///   the first object,
    /// * [`EphemError::OutOfRange`] when the dense output does not cover the span,
    /// * any compaction error.
    pub fn add_object(
        &self,
        object: &IntegrationObjectData,
        dense: &DenseOutput,
        start_jd: JulianDate,
        end_jd: JulianDate,
    ) -> Result<String, EphemError> {
        let (start_jdi, end_jdi) = julian_day_window(start_jd, end_jd);
        let counter = {
            let mut state = self.lock();
            match state.span {
                None => state.span = Some((start_jdi, end_jdi)),
                Some(span) if span != (start_jdi, end_jdi) => {
                    return Err(EphemError::InconsistentTimeSpan(format!(
                        "object '{}'",
                        object.label()
                    )));
                }
                Some(_) => {}
            }
            state.counter += 1;
            state.counter
        };

        let (t0, t1) = (start_jdi as f64 + 0.5, end_jdi as f64 + 0.5);
        match (dense.start_jd(), dense.end_jd()) {
            (Some(a), Some(b)) if a <= t0 && b >= t1 => {}
            (a, b) => {
                let jd = if a.is_some_and(|a| a <= t0) { t1 } else { t0 };
                return Err(EphemError::OutOfRange {
                    object: object.label(),
                    jd,
                    start: a.unwrap_or(f64::NAN),
                    end: b.unwrap_or(f64::NAN),
                });
            }
        }

        let id = if object.id.trim().is_empty() {
            format!("X{counter:04}")
        } else {
            object.id.trim().to_string()
        };
        let record = compact_object(object, &id, dense, start_jdi, end_jdi, &self.params)?;
        self.lock().objects.push(record);
        Ok(id)
    }

    /// `true` if objects compacted over `[start_jd, end_jd]` may join the collection.
    pub fn accepts(&self, start_jd: JulianDate, end_jd: JulianDate) -> bool {
        self.lock()
            .span
            .map_or(true, |span| span == julian_day_window(start_jd, end_jd))
    }

    /// Whole-day span shared by the objects, once the first one was added.
    pub fn time_span(&self) -> Option<(JulianDate, JulianDate)> {
        self.lock()
            .span
            .map(|(a, b)| (a as f64 + 0.5, b as f64 + 0.5))
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored records, sorted by id.
    pub fn into_objects(self) -> Vec<SerializableEphemerisObjectData> {
        let mut objects = self
            .state
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .objects;
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        objects
    }
}
