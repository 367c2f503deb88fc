//! Worker threads.
//!
//! A worker is one OS thread running one role loop against the shared unit
//! store and stripe table:
//!
//! | Role | Critical section | Per-interval detail |
//! |------|------------------|---------------------|
//! | [`Role::Writer`] | `a += 1; b += 1` | one randomly sampled unit |
//! | [`Role::Reader`] | load `a`, `b`; check `b == a + 1` | running sum of `a + b` |
//!
//! Every iteration takes exactly one stripe lock and releases it before the
//! next iteration starts. Stop conditions are evaluated at the top of each
//! iteration, never while a lock is held:
//!
//! ```text
//!            iteration budget spent
//!            deadline passed
//! Running ───shutdown signalled──────────► Stopped
//!            violation limit reached
//! ```

pub mod reader;
pub mod writer;

pub use reader::run_reader;
pub use writer::run_writer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::core::UnitSnapshot;
use crate::harness::SharedState;
use crate::metrics::{Clock, InvariantMonitor, Throughput};
use crate::sync::{ShutdownSignal, StripeMutex};

/// How often, in iterations, a worker reads the clock to check its deadline.
///
/// Must be a power of two.
pub const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// What a worker does each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Reads a unit and checks the invariant.
    Reader,
    /// Increments both fields of a unit.
    Writer,
}

impl Role {
    /// Role of worker `tid` when the first `writer_count` ids are writers.
    #[must_use]
    pub const fn for_thread(tid: usize, writer_count: usize) -> Self {
        if tid < writer_count {
            Role::Writer
        } else {
            Role::Reader
        }
    }

    /// Lowercase name, also used for thread names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Writer => "writer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_iterations` reached.
    IterationBudget,
    /// `run_duration` elapsed.
    Deadline,
    /// The shutdown signal was triggered externally.
    Shutdown,
    /// The violation policy escalated.
    ViolationLimit,
}

/// Worker lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Executing iterations.
    Running,
    /// Finished for the given reason.
    Stopped(StopReason),
}

impl WorkerState {
    /// Whether the worker should execute another iteration.
    #[inline(always)]
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, WorkerState::Running)
    }
}

/// Per-worker stop conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunBudget {
    /// Maximum iterations for this worker.
    pub max_iterations: Option<u64>,
    /// Absolute clock time at which the worker stops.
    pub deadline: Option<Duration>,
}

impl RunBudget {
    /// Budget with no limits; only a shutdown signal stops the worker.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_iterations: None,
            deadline: None,
        }
    }

    /// Budget of exactly `n` iterations.
    #[must_use]
    pub const fn iterations(n: u64) -> Self {
        Self {
            max_iterations: Some(n),
            deadline: None,
        }
    }
}

/// Everything a worker loop needs, borrowed from the harness.
pub struct WorkerContext<'a, M: StripeMutex> {
    /// Worker id; also selects the PRNG stream.
    pub tid: usize,
    /// Shared unit store and stripe table.
    pub shared: &'a SharedState<M>,
    /// Time source for throughput and deadline.
    pub clock: &'a dyn Clock,
    /// Cooperative stop flag.
    pub shutdown: &'a ShutdownSignal,
    /// Global violation accounting.
    pub monitor: &'a InvariantMonitor,
    /// Stop conditions.
    pub budget: RunBudget,
    /// Iterations per throughput report.
    pub report_interval: u64,
    /// PRNG seed base.
    pub seed: u64,
}

impl<M: StripeMutex> WorkerContext<'_, M> {
    /// Next lifecycle state after `iterations` completed iterations.
    #[inline]
    pub fn next_state(&self, iterations: u64) -> WorkerState {
        if self.shutdown.is_triggered() {
            let reason = if self.monitor.limit_reached() {
                StopReason::ViolationLimit
            } else {
                StopReason::Shutdown
            };
            return WorkerState::Stopped(reason);
        }
        if let Some(max) = self.budget.max_iterations {
            if iterations >= max {
                return WorkerState::Stopped(StopReason::IterationBudget);
            }
        }
        if let Some(deadline) = self.budget.deadline {
            if iterations & (DEADLINE_CHECK_INTERVAL - 1) == 0 && self.clock.now() >= deadline {
                return WorkerState::Stopped(StopReason::Deadline);
            }
        }
        WorkerState::Running
    }
}

impl<M: StripeMutex> fmt::Debug for WorkerContext<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("tid", &self.tid)
            .field("budget", &self.budget)
            .field("report_interval", &self.report_interval)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

/// Role-specific value attached to each interval report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalDetail {
    /// Reader's running sum of `a + b`.
    Sum(i64),
    /// Writer's sampled unit.
    Sample {
        /// Sampled index.
        unit_index: usize,
        /// Fields read under the stripe lock.
        snapshot: UnitSnapshot,
    },
}

/// One periodic throughput report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalReport {
    /// Zero-based report number within the worker.
    pub sequence: u64,
    /// Measured window.
    pub throughput: Throughput,
    /// Role-specific value.
    pub detail: IntervalDetail,
}

/// Final result of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Worker id.
    pub tid: usize,
    /// Worker role.
    pub role: Role,
    /// Iterations completed.
    pub iterations: u64,
    /// Clock time from loop start to stop.
    pub elapsed: Duration,
    /// `iterations / elapsed`.
    pub mean_ops_per_sec: f64,
    /// Invariant violations this worker observed (always 0 for writers).
    pub violations: u64,
    /// Why the loop ended.
    pub stop_reason: StopReason,
    /// Reports emitted every `report_interval` iterations.
    pub intervals: Vec<IntervalReport>,
    /// Reader: final running sum. Writer: `None`.
    pub final_sum: Option<i64>,
}

impl WorkerReport {
    /// Mean rate in millions of operations per second.
    #[must_use]
    pub fn mean_mops(&self) -> f64 {
        self.mean_ops_per_sec / 1e6
    }
}
