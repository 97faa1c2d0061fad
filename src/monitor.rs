//! Progress reporting and cooperative cancellation.
//!
//! A [`Monitor`] is shared by reference between the orchestrator and its workers. Workers count
//! accepted integration steps and finished jobs; any thread may request an abort, which each
//! integration observes after its next accepted step.
//!
//! With the `progress` feature, [`Monitor::with_progress_bar`] attaches an `indicatif` bar
//! that advances per finished job and shows the smoothed job duration.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress")]
use std::sync::Mutex;

/// Exponential moving average of the time between successive ticks.
///
/// `ema ← α·dt + (1 − α)·ema`, with `α ∈ (0, 1]`; the first tick initializes the average.
#[derive(Debug, Clone)]
pub struct IterTimer {
    last: Instant,
    ema_ns: f64,
    alpha: f64,
    count: u64,
}

impl IterTimer {
    pub fn new(alpha: f64) -> Self {
        Self {
            last: Instant::now(),
            ema_ns: 0.0,
            alpha,
            count: 0,
        }
    }

    #[inline]
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        self.count += 1;

        let dt_ns = dt.as_nanos() as f64;
        self.ema_ns = if self.count == 1 {
            dt_ns
        } else {
            self.alpha * dt_ns + (1.0 - self.alpha) * self.ema_ns
        };
        dt
    }

    #[inline]
    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.ema_ns as u64)
        }
    }
}

/// Human-readable duration: `"253µs"`, `"42ms"` or `"3.14s"`.
pub fn fmt_dur(d: Duration) -> String {
    let us = d.as_micros();
    if us < 1_000 {
        format!("{us}µs")
    } else if d.as_millis() < 1_000 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.2}s", d.as_secs_f32())
    }
}

/// Shared progress counters and abort flag of a generation run.
#[derive(Debug)]
pub struct Monitor {
    total_jobs: u64,
    jobs_done: AtomicU64,
    steps: AtomicU64,
    aborted: AtomicBool,
    #[cfg(feature = "progress")]
    bar: Option<ProgressBar>,
    #[cfg(feature = "progress")]
    timer: Mutex<IterTimer>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Monitor {
    pub fn new(total_jobs: u64) -> Self {
        Monitor {
            total_jobs,
            jobs_done: AtomicU64::new(0),
            steps: AtomicU64::new(0),
            aborted: AtomicBool::new(false),
            #[cfg(feature = "progress")]
            bar: None,
            #[cfg(feature = "progress")]
            timer: Mutex::new(IterTimer::new(0.2)),
        }
    }

    /// Attach a terminal progress bar advancing per finished job.
    #[cfg(feature = "progress")]
    pub fn with_progress_bar(mut self) -> Self {
        let pb = ProgressBar::new(self.total_jobs.max(1));
        if let Ok(style) = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}",
        ) {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(200));
        self.bar = Some(pb);
        self
    }

    pub fn total_jobs(&self) -> u64 {
        self.total_jobs
    }

    /// Count one accepted integration step.
    #[inline]
    pub fn record_step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Count one finished job, successful or not.
    pub fn job_finished(&self) {
        self.jobs_done.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "progress")]
        if let Some(pb) = &self.bar {
            if let Ok(mut timer) = self.timer.lock() {
                let last = timer.tick();
                pb.set_message(format!("last: {}, avg: {}", fmt_dur(last), fmt_dur(timer.avg())));
            }
            pb.inc(1);
        }
    }

    pub fn jobs_done(&self) -> u64 {
        self.jobs_done.load(Ordering::Relaxed)
    }

    /// Request all running integrations to stop.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Close the progress bar, if any.
    pub fn finish(&self) {
        #[cfg(feature = "progress")]
        if let Some(pb) = &self.bar {
            if self.is_aborted() {
                pb.set_message("Interrupted");
            }
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod monitor_test {
    use super::*;

    #[test]
    fn test_counters_across_threads() {
        let monitor = Monitor::new(8);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        monitor.record_step();
                    }
                    monitor.job_finished();
                });
            }
        });
        assert_eq!(monitor.steps(), 400);
        assert_eq!(monitor.jobs_done(), 4);
        assert!(!monitor.is_aborted());
        monitor.abort();
        assert!(monitor.is_aborted());
    }

    #[test]
    fn test_timer_and_format() {
        let mut timer = IterTimer::new(1.0);
        assert_eq!(timer.avg(), Duration::ZERO);
        let dt = timer.tick();
        assert_eq!(timer.avg().as_nanos() as u64, dt.as_nanos() as u64);
        assert_eq!(fmt_dur(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_dur(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_dur(Duration::from_millis(3140)), "3.14s");
    }
}
