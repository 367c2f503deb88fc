//! Benchmark orchestration.
//!
//! [`Harness`] validates the configuration, allocates the shared state, spawns
//! one named scoped thread per worker, joins them, and folds their results
//! into a [`RunReport`].
//!
//! ```text
//!  BenchConfig ──validate──► Harness::new
//!                                │
//!                   run / run_with_shutdown
//!                                │ dispatch on LockKind
//!                                ▼
//!               SharedState<M> { UnitStore, StripeTable<M> }
//!                                │ &SharedState
//!        ┌──────────────┬────────┴─────┬──────────────┐
//!   writer-0       reader-1       reader-2       reader-3
//!        └──────────────┴────────┬─────┴──────────────┘
//!                                ▼ join
//!                            RunReport
//! ```
//!
//! # Examples
//!
//! ```
//! use stripebench::builder::BenchConfigBuilder;
//! use stripebench::harness::{Harness, RunOutcome};
//!
//! let config = BenchConfigBuilder::new()
//!     .unit_count(1024)
//!     .stripe_count(16)
//!     .max_iterations(10_000)
//!     .report_interval_iters(5_000)
//!     .build()?;
//! let report = Harness::new(config)?.run()?;
//! assert_eq!(report.outcome, RunOutcome::Completed);
//! assert_eq!(report.total_violations, 0);
//! # Ok::<(), stripebench::BenchError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BenchConfig;
use crate::core::{UnitSnapshot, UnitStore};
use crate::error::{BenchError, Result};
use crate::metrics::{rate, Clock, InvariantMonitor, SystemClock, ViolationRecord};
use crate::sync::{
    LockKind, NoLock, ParkingMutex, ShutdownSignal, SpinLock, StripeMutex, StripeTable,
};
use crate::util::{detect_cache_line_size, CACHE_LINE_SIZE};
use crate::worker::{run_reader, run_writer, Role, RunBudget, WorkerContext, WorkerReport};

/// The two shared arrays every worker operates on.
///
/// Immutable after construction apart from the unit fields, which are only
/// touched under their stripe lock by [`read`](Self::read) and
/// [`increment`](Self::increment).
#[derive(Debug)]
pub struct SharedState<M: StripeMutex = ParkingMutex> {
    units: UnitStore,
    stripes: StripeTable<M>,
}

impl<M: StripeMutex> SharedState<M> {
    /// Allocate `unit_count` seeded units protected by `stripe_count` locks.
    ///
    /// # Errors
    ///
    /// Sizing errors and `AllocationFailed`.
    pub fn new(unit_count: usize, stripe_count: usize, seed: u64) -> Result<Self> {
        let stripes = StripeTable::new(unit_count, stripe_count)?;
        let units = UnitStore::new(unit_count, seed)?;
        Ok(Self { units, stripes })
    }

    /// Protect an existing unit store with `stripe_count` locks.
    ///
    /// # Errors
    ///
    /// Sizing errors and `AllocationFailed`.
    pub fn from_units(units: UnitStore, stripe_count: usize) -> Result<Self> {
        let stripes = StripeTable::new(units.len(), stripe_count)?;
        Ok(Self { units, stripes })
    }

    /// The unit store.
    #[must_use]
    pub fn units(&self) -> &UnitStore {
        &self.units
    }

    /// The stripe table.
    #[must_use]
    pub fn stripes(&self) -> &StripeTable<M> {
        &self.stripes
    }

    /// Read unit `index` under its stripe lock.
    #[inline]
    #[must_use]
    pub fn read(&self, index: usize) -> UnitSnapshot {
        let _guard = self.stripes.lock(index);
        self.units.load(index)
    }

    /// Increment unit `index` under its stripe lock.
    #[inline]
    pub fn increment(&self, index: usize) {
        let _guard = self.stripes.lock(index);
        self.units.increment(index);
    }

    /// Heap bytes held by both arrays.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.units.memory_usage() + self.stripes.memory_usage()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every worker exhausted its iteration or time budget.
    Completed,
    /// An external shutdown signal stopped the workers.
    Interrupted,
    /// `max_violations` was reached.
    ViolationLimitExceeded,
}

impl RunOutcome {
    /// Process exit status for this outcome.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Completed | RunOutcome::Interrupted => 0,
            RunOutcome::ViolationLimitExceeded => 2,
        }
    }
}

/// Aggregated result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Configuration the run used.
    pub config: BenchConfig,
    /// One entry per worker, ordered by thread id.
    pub workers: Vec<WorkerReport>,
    /// Sum of all worker iterations.
    pub total_iterations: u64,
    /// Sum of all observed invariant violations.
    pub total_violations: u64,
    /// First observed violation, if any.
    pub first_violation: Option<ViolationRecord>,
    /// Units violating the invariant after all workers stopped.
    pub inconsistent_units: usize,
    /// Clock time from spawn to join.
    pub elapsed: Duration,
    /// Aggregate iterations per second.
    pub ops_per_sec: f64,
    /// How the run ended.
    pub outcome: RunOutcome,
}

impl RunReport {
    /// Workers with the given role.
    pub fn workers_with_role(&self, role: Role) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(move |w| w.role == role)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} units, {} {} stripes, {} threads ({} writers)",
            self.config.unit_count,
            self.config.stripe_count,
            self.config.lock_kind,
            self.config.thread_count,
            self.config.writer_count
        )?;
        for w in &self.workers {
            writeln!(
                f,
                "  [{:>2}] {:<6} {:>14} iters {:>10.2} M ops/s {:>8} violations",
                w.tid,
                w.role,
                w.iterations,
                w.mean_mops(),
                w.violations
            )?;
        }
        write!(
            f,
            "total: {} iters in {:.3}s ({:.2} M ops/s), {} violations, outcome {:?}",
            self.total_iterations,
            self.elapsed.as_secs_f64(),
            self.ops_per_sec / 1e6,
            self.total_violations,
            self.outcome
        )
    }
}

/// Drives one benchmark run.
pub struct Harness {
    config: BenchConfig,
    clock: Arc<dyn Clock>,
}

impl Harness {
    /// Validate `config` and prepare a harness on the system clock.
    ///
    /// # Errors
    ///
    /// Any configuration error; no memory is allocated and no thread started.
    pub fn new(config: BenchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock::new()),
        })
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run with the configured lock kind and a fresh shutdown signal.
    ///
    /// The signal lives only for this call, so a harness can be run again.
    /// Use [`run_with_shutdown`](Self::run_with_shutdown) to stop it from outside.
    ///
    /// # Errors
    ///
    /// `AllocationFailed`, `SpawnFailed`, `WorkerPanicked`.
    pub fn run(&self) -> Result<RunReport> {
        self.run_with_shutdown(&ShutdownSignal::new())
    }

    /// Run with the configured lock kind, stopping when `shutdown` triggers.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn run_with_shutdown(&self, shutdown: &ShutdownSignal) -> Result<RunReport> {
        match self.config.lock_kind {
            LockKind::Parking => self.run_with::<ParkingMutex>(shutdown),
            LockKind::Spin => self.run_with::<SpinLock>(shutdown),
            LockKind::None => self.run_with::<NoLock>(shutdown),
        }
    }

    /// Allocate shared state for lock type `M` and run on it.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn run_with<M: StripeMutex>(&self, shutdown: &ShutdownSignal) -> Result<RunReport> {
        let shared = SharedState::<M>::new(
            self.config.unit_count,
            self.config.stripe_count,
            self.config.seed,
        )?;
        self.run_on(&shared, shutdown)
    }

    /// Run the configured workers on caller-owned shared state.
    ///
    /// The caller keeps access to `shared` afterwards, e.g. to inspect units
    /// or lock state.
    ///
    /// # Errors
    ///
    /// `SpawnFailed`, `WorkerPanicked`.
    pub fn run_on<M: StripeMutex>(
        &self,
        shared: &SharedState<M>,
        shutdown: &ShutdownSignal,
    ) -> Result<RunReport> {
        log_layout::<M>(shared);

        let monitor = InvariantMonitor::new(self.config.violation_policy());
        let clock: &dyn Clock = &*self.clock;
        let start = clock.now();
        let budget = RunBudget {
            max_iterations: self.config.max_iterations,
            deadline: self.config.run_duration.and_then(|d| start.checked_add(d)),
        };

        let joined = thread::scope(|scope| {
            let mut handles = Vec::new();
            let mut failure = None;

            for tid in 0..self.config.thread_count {
                let role = Role::for_thread(tid, self.config.writer_count);
                let ctx = WorkerContext {
                    tid,
                    shared,
                    clock,
                    shutdown,
                    monitor: &monitor,
                    budget,
                    report_interval: self.config.report_interval_iters,
                    seed: self.config.seed,
                };
                let spawned = thread::Builder::new()
                    .name(format!("{role}-{tid}"))
                    .spawn_scoped(scope, move || {
                        let _guard = StopOnPanic(ctx.shutdown);
                        match role {
                            Role::Writer => run_writer(&ctx),
                            Role::Reader => run_reader(&ctx),
                        }
                    });
                match spawned {
                    Ok(handle) => handles.push((tid, handle)),
                    Err(e) => {
                        shutdown.trigger();
                        failure = Some(BenchError::spawn_failed(tid, e.to_string()));
                        break;
                    }
                }
            }

            let mut reports = Vec::with_capacity(handles.len());
            for (tid, handle) in handles {
                match handle.join() {
                    Ok(report) => reports.push(report),
                    Err(_) => {
                        warn!(tid, "worker panicked");
                        failure.get_or_insert(BenchError::worker_panicked(tid));
                    }
                }
            }
            match failure {
                Some(err) => Err(err),
                None => Ok(reports),
            }
        });
        let workers = joined?;
        let elapsed = clock.now().saturating_sub(start);

        let outcome = if monitor.limit_reached() {
            RunOutcome::ViolationLimitExceeded
        } else if shutdown.is_triggered() {
            RunOutcome::Interrupted
        } else {
            RunOutcome::Completed
        };
        let total_iterations = workers.iter().map(|w| w.iterations).sum();
        let report = RunReport {
            config: self.config.clone(),
            total_iterations,
            total_violations: monitor.total(),
            first_violation: monitor.first(),
            inconsistent_units: shared.units().count_inconsistent(),
            elapsed,
            ops_per_sec: rate(total_iterations, elapsed),
            outcome,
            workers,
        };

        #[cfg(feature = "metrics")]
        debug!(
            hottest = ?shared.stripes().most_contended_stripes(4),
            "most contended stripes"
        );

        if report.total_violations > 0 {
            warn!(
                total = report.total_violations,
                lock = %self.config.lock_kind,
                "invariant violations observed"
            );
        }
        info!(
            iterations = report.total_iterations,
            mops = report.ops_per_sec / 1e6,
            outcome = ?report.outcome,
            "run finished"
        );
        Ok(report)
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Triggers shutdown if the owning worker unwinds, so siblings stop too.
struct StopOnPanic<'a>(&'a ShutdownSignal);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.trigger();
        }
    }
}

fn log_layout<M: StripeMutex>(shared: &SharedState<M>) {
    let detected = detect_cache_line_size();
    if detected == CACHE_LINE_SIZE {
        debug!(line = detected, "stripe locks match cache line size");
    } else {
        warn!(
            padded = CACHE_LINE_SIZE,
            detected,
            "stripe lock padding differs from detected cache line size"
        );
    }
    info!(
        table = %shared.stripes(),
        bytes = shared.memory_usage(),
        "shared state ready"
    );
}
