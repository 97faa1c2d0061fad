//! # Generation of ephemerides for many objects
//!
//! [`EphemerisGenerator`] runs one independent integration job per
//! [`IntegrationObjectData`] on a fixed-size `rayon` pool and gathers the outcome of each job,
//! success or failure, in a map keyed by object number. A failing job never affects the others.
//!
//! Per job, in [`OrchestrationMode::Ephemeris`]:
//! 1. The requested span is extended to include the epoch of the object.
//! 2. The object is integrated backward from its epoch to the start, then forward to the end.
//! 3. The two dense outputs are merged and compacted into an [`EphemerisCollection`].
//!
//! [`EphemerisGenerator::generate`] returns the compacted records with the per-object outcomes.
//! [`EphemerisGenerator::generate_into`] adds them to a collection owned by the caller, so that
//! several runs over the same whole-day span build one ephemeris.
//!
//! In [`OrchestrationMode::StateVectors`] the object is integrated from its epoch to the end of
//! the span and only the final state is kept.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ephemgen::{EphemerisGenerator, GeneratorParams, IntegrationObjectData};
//! # fn run(
//! #     ephemerides: ephemgen::Ephemerides,
//! #     jobs: Vec<IntegrationObjectData>,
//! # ) -> Result<(), ephemgen::EphemError> {
//! let params = GeneratorParams::builder()
//!     .kbos(false)
//!     .velocity_expansions(true)
//!     .max_threads(4)
//!     .build()?;
//! let generator = EphemerisGenerator::new(ephemerides, params);
//! let generation = generator.generate(&jobs, 2_460_000.5, 2_460_400.5)?;
//! for (number, outcome) in &generation.results {
//!     if let Err(e) = outcome {
//!         eprintln!("{number}: {e}");
//!     }
//! }
//! println!("{} objects compacted", generation.objects.len());
//! # Ok(())
//! # }
//! ```
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use ahash::RandomState;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::compaction::{CompactionParams, EphemerisCollection};
use crate::constants::{JulianDate, ObjectNumber, MIN_INTEGRATION_SPAN};
use crate::ephem_errors::EphemError;
use crate::ephemeris::ephemerides::Ephemerides;
use crate::ephemeris::records::SerializableEphemerisObjectData;
use crate::integration::dense_output::DenseOutput;
use crate::integration::params::IntegrationParams;
use crate::integration::state::IntegrationState;
use crate::integration::Integrator;
use crate::job::IntegrationObjectData;
use crate::monitor::{fmt_dur, Monitor};
use crate::perturber::{PerturberSelection, PerturberSet};
use crate::precision::Precision;
use crate::time::{format_jd, julian_day_window};

/// What a run produces per object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestrationMode {
    /// Compacted Chebyshev ephemerides over the requested span.
    #[default]
    Ephemeris,
    /// The state vectors at the end of the span only.
    StateVectors,
}

impl fmt::Display for OrchestrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationMode::Ephemeris => write!(f, "ephemeris"),
            OrchestrationMode::StateVectors => write!(f, "state vectors"),
        }
    }
}

/// Outcome of a successful job.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOutput {
    /// Id of the record added to the collection.
    Ephemeris(String),
    State {
        jd: JulianDate,
        state: IntegrationState,
    },
}

impl ObjectOutput {
    pub fn ephemeris_id(&self) -> Option<&str> {
        match self {
            ObjectOutput::Ephemeris(id) => Some(id),
            ObjectOutput::State { .. } => None,
        }
    }

    pub fn state(&self) -> Option<(JulianDate, IntegrationState)> {
        match self {
            ObjectOutput::State { jd, state } => Some((*jd, *state)),
            ObjectOutput::Ephemeris(_) => None,
        }
    }
}

/// Per-object outcome of a run.
///
/// Objects without id and name are keyed `#<index>` after their position in the job list.
pub type GenerationResults = HashMap<ObjectNumber, Result<ObjectOutput, EphemError>, RandomState>;

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub results: GenerationResults,
    /// Compacted records sorted by id; empty in [`OrchestrationMode::StateVectors`].
    pub objects: Vec<SerializableEphemerisObjectData>,
    /// Whole-day span shared by `objects`.
    pub time_span: Option<(JulianDate, JulianDate)>,
}

impl Generation {
    /// Record with the given id.
    pub fn object(&self, id: &str) -> Option<&SerializableEphemerisObjectData> {
        let i = self
            .objects
            .binary_search_by(|o| o.id.as_str().cmp(id))
            .ok()?;
        self.objects.get(i)
    }

    /// Record of the job keyed `number`, when it succeeded in ephemeris mode.
    pub fn record(&self, number: &ObjectNumber) -> Option<&SerializableEphemerisObjectData> {
        let id = self.results.get(number)?.as_ref().ok()?.ephemeris_id()?;
        self.object(id)
    }
}

/// Settings of a generation run.
///
/// Fields
/// -----------------
/// * `integration` – numerical and force-model settings.
/// * `compaction` – settings of the stored expansions.
/// * `perturbers` – optional perturber groups (asteroids, KBOs, separate Earth and Moon).
/// * `max_threads` – upper bound of the pool size; 0 means the available parallelism.
/// * `mode` – what is produced per object.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorParams {
    pub integration: IntegrationParams,
    pub compaction: CompactionParams,
    pub perturbers: PerturberSelection,
    pub max_threads: usize,
    pub mode: OrchestrationMode,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        GeneratorParams {
            integration: IntegrationParams::default(),
            compaction: CompactionParams::default(),
            perturbers: PerturberSelection {
                asteroids: true,
                kbos: false,
                separate_earth_moon: true,
            },
            max_threads: 0,
            mode: OrchestrationMode::default(),
        }
    }
}

impl GeneratorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> GeneratorParamsBuilder {
        GeneratorParamsBuilder::new()
    }
}

/// Builder for [`GeneratorParams`].
///
/// The force-model toggles edit the current integration parameters, so they must be set after
/// [`GeneratorParamsBuilder::integration`].
#[derive(Debug, Clone, Default)]
pub struct GeneratorParamsBuilder {
    params: GeneratorParams,
}

impl GeneratorParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integration(mut self, v: IntegrationParams) -> Self {
        self.params.integration = v;
        self
    }
    pub fn compaction(mut self, v: CompactionParams) -> Self {
        self.params.compaction = v;
        self
    }
    pub fn asteroids(mut self, v: bool) -> Self {
        self.params.perturbers.asteroids = v;
        self
    }
    pub fn kbos(mut self, v: bool) -> Self {
        self.params.perturbers.kbos = v;
        self
    }
    pub fn separate_earth_moon(mut self, v: bool) -> Self {
        self.params.perturbers.separate_earth_moon = v;
        self
    }
    pub fn precision(mut self, v: Precision) -> Self {
        self.params.integration.precision = v;
        self
    }
    pub fn relativistic(mut self, v: bool) -> Self {
        self.params.integration.relativistic = v;
        self
    }
    pub fn figure_effects(mut self, v: bool) -> Self {
        self.params.integration.figure_effects = v;
        self
    }
    pub fn non_gravitational(mut self, v: bool) -> Self {
        self.params.integration.non_gravitational = v;
        self
    }
    pub fn velocity_expansions(mut self, v: bool) -> Self {
        self.params.integration.velocity_expansions = v;
        self
    }
    pub fn max_threads(mut self, v: usize) -> Self {
        self.params.max_threads = v;
        self
    }
    pub fn mode(mut self, v: OrchestrationMode) -> Self {
        self.params.mode = v;
        self
    }

    /// Validate the nested parameters and return the settings.
    pub fn build(self) -> Result<GeneratorParams, EphemError> {
        self.params.integration.validate()?;
        self.params.compaction.validate()?;
        Ok(self.params)
    }
}

impl fmt::Display for GeneratorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 46;
            writeln!(f, "{:#}", self.integration)?;
            writeln!(f, "{:#}", self.compaction)?;
            writeln!(f, "Run Parameters")?;
            writeln!(f, "--------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = " ".repeat(PARAM_COL.saturating_sub(s.len()).max(1));
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            line!("mode                 = {}", self.mode, "Output per object")?;
            line!("asteroids            = {}", self.perturbers.asteroids, "Massive asteroid perturbers")?;
            line!("kbos                 = {}", self.perturbers.kbos, "KBO perturbers")?;
            line!(
                "separate_earth_moon  = {}",
                self.perturbers.separate_earth_moon,
                "Earth and Moon instead of the EMB"
            )?;
            line!("max_threads          = {}", self.max_threads, "0 = available parallelism")
        } else {
            write!(
                f,
                "GeneratorParams(mode={}, {}, {}, asteroids={}, kbos={}, earth_moon={}, threads={})",
                self.mode,
                self.integration,
                self.compaction,
                self.perturbers.asteroids,
                self.perturbers.kbos,
                self.perturbers.separate_earth_moon,
                self.max_threads
            )
        }
    }
}

/// Order the bounds of a requested span and check its length.
///
/// Return
/// ----------
/// * `(start, end)` with `start <= end`, or [`EphemError::TooShortTimeSpan`] below 5 days.
pub fn normalize_span(a: JulianDate, b: JulianDate) -> Result<(JulianDate, JulianDate), EphemError> {
    let (start, end) = (a.min(b), a.max(b));
    let span = end - start;
    if !(span >= MIN_INTEGRATION_SPAN) {
        return Err(EphemError::TooShortTimeSpan(span));
    }
    Ok((start, end))
}

/// Integrates and compacts many objects in parallel.
#[derive(Debug, Clone)]
pub struct EphemerisGenerator {
    ephemerides: Ephemerides,
    params: GeneratorParams,
}

impl EphemerisGenerator {
    pub fn new(ephemerides: Ephemerides, params: GeneratorParams) -> Self {
        EphemerisGenerator {
            ephemerides,
            params,
        }
    }

    pub fn params(&self) -> &GeneratorParams {
        &self.params
    }

    pub fn ephemerides(&self) -> &Ephemerides {
        &self.ephemerides
    }

    /// Pool size for `jobs` jobs: the available parallelism, capped by the job count and by
    /// `max_threads` when set.
    pub fn thread_count(&self, jobs: usize) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut n = available.min(jobs);
        if self.params.max_threads > 0 {
            n = n.min(self.params.max_threads);
        }
        n.max(1)
    }

    /// Run all jobs with a private monitor and a fresh collection.
    ///
    /// See [`EphemerisGenerator::generate_into`].
    pub fn generate(
        &self,
        jobs: &[IntegrationObjectData],
        start_jd: JulianDate,
        end_jd: JulianDate,
    ) -> Result<Generation, EphemError> {
        let monitor = Monitor::new(jobs.len() as u64);
        let collection = EphemerisCollection::new(self.params.compaction.clone());
        let results = self.generate_into(jobs, start_jd, end_jd, &collection, &monitor)?;
        Ok(Generation {
            results,
            time_span: collection.time_span(),
            objects: collection.into_objects(),
        })
    }

    /// Run all jobs over `[start_jd, end_jd]`.
    ///
    /// Arguments
    /// -----------------
    /// * `jobs`: the objects, each with its own epoch.
    /// * `start_jd`, `end_jd`: requested span (TDB), in either order.
    /// * `collection`: receives the compacted records in [`OrchestrationMode::Ephemeris`]; its
    ///   own compaction settings apply.
    /// * `monitor`: progress counters and abort flag shared with the workers.
    ///
    /// Return
    /// ----------
    /// * The outcome of every job, or
    /// * [`EphemError::TooShortTimeSpan`] when the span is shorter than 5 days,
    /// * [`EphemError::InconsistentTimeSpan`] when `collection` already holds objects over
    ///   another whole-day span,
    /// * [`EphemError::Aborted`] when the run was cancelled before any object succeeded,
    /// * [`EphemError::NoObjectIntegrated`] when every job failed.
    ///
    /// See also
    /// ------------
    /// * [`EphemerisCollection::into_objects`] to take the records out.
    pub fn generate_into(
        &self,
        jobs: &[IntegrationObjectData],
        start_jd: JulianDate,
        end_jd: JulianDate,
        collection: &EphemerisCollection,
        monitor: &Monitor,
    ) -> Result<GenerationResults, EphemError> {
        let (start, end) = normalize_span(start_jd, end_jd)?;
        if jobs.is_empty() {
            return Err(EphemError::NoObjectIntegrated);
        }
        if self.params.mode == OrchestrationMode::Ephemeris && !collection.accepts(start, end) {
            let (a, b) = julian_day_window(start, end);
            let held = collection.time_span().unwrap_or((f64::NAN, f64::NAN));
            return Err(EphemError::InconsistentTimeSpan(format!(
                "run [{}, {}], collection holds [{}, {}]",
                format_jd(a as f64 + 0.5),
                format_jd(b as f64 + 0.5),
                format_jd(held.0),
                format_jd(held.1)
            )));
        }

        let threads = self.thread_count(jobs.len());
        info!(
            "Generating {} for {} objects over [{}, {}] on {} threads",
            self.params.mode,
            jobs.len(),
            format_jd(start),
            format_jd(end),
            threads
        );

        let clock = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;

        let outcomes: Vec<(ObjectNumber, Result<ObjectOutput, EphemError>)> = pool.install(|| {
            jobs.par_iter()
                .enumerate()
                .map(|(index, job)| {
                    let key = job
                        .object_number()
                        .unwrap_or_else(|| ObjectNumber::String(format!("#{index}")));
                    let outcome = if monitor.is_aborted() {
                        Err(EphemError::Aborted)
                    } else {
                        self.run_job(job, start, end, collection, monitor)
                    };
                    match &outcome {
                        Ok(_) => debug!("{}: done", job.label()),
                        Err(EphemError::Aborted) => {}
                        Err(e) => warn!("{}: {e}", job.label()),
                    }
                    monitor.job_finished();
                    (key, outcome)
                })
                .collect()
        });
        monitor.finish();

        let succeeded = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
        let failed = outcomes
            .iter()
            .filter(|(_, r)| matches!(r, Err(e) if *e != EphemError::Aborted))
            .map(|(k, _)| k)
            .join(", ");
        if !failed.is_empty() {
            debug!("Failed objects: {failed}");
        }
        info!(
            "{}/{} objects integrated in {} ({} steps)",
            succeeded,
            jobs.len(),
            fmt_dur(clock.elapsed()),
            monitor.steps()
        );

        if succeeded == 0 {
            return Err(if monitor.is_aborted() {
                EphemError::Aborted
            } else {
                EphemError::NoObjectIntegrated
            });
        }

        let mut results = GenerationResults::default();
        for (key, outcome) in outcomes {
            if let Some(previous) = results.insert(key.clone(), outcome) {
                if previous.is_ok() {
                    warn!("Duplicate object {key}: earlier result replaced");
                }
            }
        }
        Ok(results)
    }

    /// Time range of the ephemeris sources, as an error for `[start, end]` when not covered.
    fn check_range(
        &self,
        job: &IntegrationObjectData,
        start: JulianDate,
        end: JulianDate,
    ) -> Result<(), EphemError> {
        let (lo, hi) = self.ephemerides.time_range();
        for jd in [start, end] {
            if jd < lo || jd > hi {
                return Err(EphemError::OutOfRange {
                    object: job.label(),
                    jd,
                    start: lo,
                    end: hi,
                });
            }
        }
        Ok(())
    }

    fn run_job(
        &self,
        job: &IntegrationObjectData,
        start: JulianDate,
        end: JulianDate,
        collection: &EphemerisCollection,
        monitor: &Monitor,
    ) -> Result<ObjectOutput, EphemError> {
        let p = &self.params;
        let perturbers =
            PerturberSet::new(&self.ephemerides, &p.perturbers, job.id.trim(), job.name.trim())?;
        let integrator = Integrator::new(&perturbers, &p.integration)
            .with_non_gravitational(job.non_gravitational)
            .with_monitor(monitor);
        let state = job.state();

        match p.mode {
            OrchestrationMode::StateVectors => {
                self.check_range(job, job.epoch.min(end), job.epoch.max(end))?;
                let out = integrator.integrate(job.epoch, state, end)?;
                Ok(ObjectOutput::State {
                    jd: end,
                    state: out.state,
                })
            }
            OrchestrationMode::Ephemeris => {
                let (first, last) = (start.min(job.epoch), end.max(job.epoch));
                self.check_range(job, first, last)?;
                let backward = integrator.integrate(job.epoch, state, first)?;
                let forward = integrator.integrate(job.epoch, state, last)?;
                debug!(
                    "{}: {} + {} steps over [{}, {}]",
                    job.label(),
                    backward.steps,
                    forward.steps,
                    format_jd(first),
                    format_jd(last)
                );
                let dense = DenseOutput::merge(backward.dense_output, forward.dense_output);
                let id = collection.add_object(job, &dense, start, end)?;
                Ok(ObjectOutput::Ephemeris(id))
            }
        }
    }
}

#[cfg(test)]
mod orchestration_test {
    use super::*;
    use crate::ephemeris::ephemerides::Ephemerides;
    use crate::unit_test_global::{circular, toy_asteroids, toy_fundamental, TOY_END, TOY_START};
    use approx::assert_relative_eq;

    fn init_logs() {
        let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
    }

    fn generator(mode: OrchestrationMode, max_threads: usize) -> EphemerisGenerator {
        let ephemerides = Ephemerides::new(toy_fundamental(true)).with_asteroids(toy_asteroids());
        let params = GeneratorParams::builder()
            .mode(mode)
            .max_threads(max_threads)
            .build()
            .unwrap();
        EphemerisGenerator::new(ephemerides, params)
    }

    /// Object on a circular heliocentric orbit, in the ecliptic-free xy plane.
    fn job(id: &str, a: f64, epoch: f64) -> IntegrationObjectData {
        let pos = circular(a, 0.5);
        let h = 1.0e-3;
        let v = (pos(epoch + h) - pos(epoch - h)) / (2.0 * h);
        IntegrationObjectData::new(id, "", epoch, pos(epoch), v)
    }

    #[test]
    fn test_normalize_span() {
        assert_eq!(normalize_span(10.0, 2.0), Ok((2.0, 10.0)));
        assert_eq!(normalize_span(2.0, 6.5), Ok((2.0, 6.5)));
        assert!(matches!(
            normalize_span(2.0, 6.0),
            Err(EphemError::TooShortTimeSpan(s)) if s == 4.0
        ));
        assert!(normalize_span(f64::NAN, 6.0).is_err());
    }

    #[test]
    fn test_params() {
        let p = GeneratorParams::builder()
            .relativistic(false)
            .kbos(true)
            .build()
            .unwrap();
        assert!(!p.integration.relativistic);
        assert!(p.perturbers.kbos && p.perturbers.asteroids);
        let table = format!("{p:#}");
        assert!(table.contains("Integration Parameters"));
        assert!(table.contains("Compaction Parameters"));
        assert!(table.contains("separate_earth_moon"));

        let bad = GeneratorParams::builder()
            .compaction(CompactionParams {
                tolerance_factor: 0.0,
                ..Default::default()
            })
            .build();
        assert!(bad.is_err());
    }

    #[test]
    fn test_thread_count() {
        let g = generator(OrchestrationMode::Ephemeris, 2);
        assert_eq!(g.thread_count(1), 1);
        assert!(g.thread_count(10) <= 2);
        assert_eq!(g.thread_count(0), 1);
    }

    #[test]
    fn test_ephemeris_mode_with_failure() {
        init_logs();
        let g = generator(OrchestrationMode::Ephemeris, 0);
        let epoch = TOY_START + 100.0;
        let jobs = vec![
            job("1001", 2.2, epoch),
            job("", 3.1, epoch),
            // epoch far outside the ephemeris range
            job("1003", 2.5, TOY_END + 500.0),
        ];
        let generation = g.generate(&jobs, TOY_START + 20.0, TOY_START + 160.0).unwrap();
        let results = &generation.results;
        assert_eq!(results.len(), 3);
        assert_eq!(generation.objects.len(), 2);
        assert_eq!(generation.time_span, Some((TOY_START + 20.0, TOY_START + 160.0)));

        let data = generation.record(&ObjectNumber::Int(1001)).unwrap();
        assert_eq!(data.id, "1001");
        assert_eq!(data.time_span(), generation.time_span);
        let jd = epoch + 0.25;
        let expected = circular(2.2, 0.5)(jd);
        let found = data.data[0].iter().find(|d| d.start_jd <= jd && jd <= d.end_jd()).unwrap();
        assert_relative_eq!(found.evaluate(jd), expected, max_relative = 1.0e-6);

        let anonymous = generation.record(&ObjectNumber::String("#1".into())).unwrap();
        assert!(anonymous.id.starts_with('X'));
        assert!(generation.object(&anonymous.id).is_some());

        assert!(matches!(
            results[&ObjectNumber::Int(1003)],
            Err(EphemError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_state_vectors_mode() {
        init_logs();
        let g = generator(OrchestrationMode::StateVectors, 1);
        let epoch = TOY_START + 50.0;
        let generation = g
            .generate(&[job("2001", 2.0, epoch)], TOY_START + 150.0, TOY_START + 40.0)
            .unwrap();
        assert!(generation.objects.is_empty());
        assert_eq!(generation.time_span, None);
        let (jd, state) = generation.results[&ObjectNumber::Int(2001)]
            .as_ref()
            .unwrap()
            .state()
            .unwrap();
        assert_eq!(jd, TOY_START + 150.0);
        assert_relative_eq!(state.position().norm(), 2.0, max_relative = 1.0e-4);
    }

    #[test]
    fn test_all_failed_and_aborted() {
        init_logs();
        let g = generator(OrchestrationMode::Ephemeris, 0);
        let outside = vec![job("1", 2.0, TOY_END + 1000.0)];
        assert_eq!(
            g.generate(&outside, TOY_START + 10.0, TOY_START + 40.0),
            Err(EphemError::NoObjectIntegrated)
        );
        assert_eq!(
            g.generate(&[], TOY_START + 10.0, TOY_START + 40.0),
            Err(EphemError::NoObjectIntegrated)
        );

        let monitor = Monitor::new(1);
        monitor.abort();
        let jobs = vec![job("5", 2.0, TOY_START + 20.0)];
        let collection = EphemerisCollection::new(CompactionParams::default());
        assert_eq!(
            g.generate_into(&jobs, TOY_START + 10.0, TOY_START + 40.0, &collection, &monitor),
            Err(EphemError::Aborted)
        );
        assert!(collection.is_empty());
    }

    #[test]
    fn test_runs_share_a_collection() {
        init_logs();
        let g = generator(OrchestrationMode::Ephemeris, 2);
        let collection = EphemerisCollection::new(CompactionParams::default());
        let (start, end) = (TOY_START + 20.0, TOY_START + 90.0);

        let first = g
            .generate_into(
                &[job("1101", 2.3, TOY_START + 30.0)],
                start,
                end,
                &collection,
                &Monitor::new(1),
            )
            .unwrap();
        assert_eq!(first[&ObjectNumber::Int(1101)], Ok(ObjectOutput::Ephemeris("1101".into())));
        // bounds inside the same whole days
        g.generate_into(
            &[job("1102", 2.9, TOY_START + 60.0)],
            end + 0.2,
            start - 0.3,
            &collection,
            &Monitor::new(1),
        )
        .unwrap();

        let shifted = g.generate_into(
            &[job("1103", 2.6, TOY_START + 60.0)],
            start + 1.0,
            end,
            &collection,
            &Monitor::new(1),
        );
        assert!(matches!(shifted, Err(EphemError::InconsistentTimeSpan(_))));

        assert_eq!(collection.time_span(), Some((start, end)));
        let ids: Vec<_> = collection.into_objects().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["1101".to_string(), "1102".to_string()]);
    }
}
