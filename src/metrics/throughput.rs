//! Per-worker throughput measurement.
//!
//! Each worker owns one [`ThroughputWindow`]. The window counts iterations and,
//! every `report_interval_iters`, turns the count and the elapsed clock time
//! into a [`Throughput`] sample before resetting the count to zero.
//!
//! Time comes from a [`Clock`], so tests can drive the window with a
//! [`ManualClock`] and assert exact rates.
//!
//! # Examples
//!
//! ```
//! use stripebench::metrics::{ManualClock, ThroughputWindow};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let mut window = ThroughputWindow::new(&clock, 4);
//! for _ in 0..3 {
//!     assert!(window.record_iteration().is_none());
//! }
//! clock.advance(Duration::from_secs(2));
//! let sample = window.record_iteration().unwrap();
//! assert_eq!(sample.ops_per_sec, 2.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock whose origin is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Synthetic clock for deterministic tests.
///
/// Time only moves when [`advance`](Self::advance) is called, or by a fixed
/// `tick` on every read when built with [`ticking`](Self::ticking). Clones
/// share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
    tick_nanos: u64,
}

impl ManualClock {
    /// Clock frozen at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that advances by `tick` each time it is read.
    #[must_use]
    pub fn ticking(tick: Duration) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
            tick_nanos: duration_nanos(tick),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let nanos = if self.tick_nanos == 0 {
            self.nanos.load(Ordering::SeqCst)
        } else {
            self.nanos.fetch_add(self.tick_nanos, Ordering::SeqCst) + self.tick_nanos
        };
        Duration::from_nanos(nanos)
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Operations per second, or 0 when no time has elapsed.
#[must_use]
pub fn rate(iterations: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        iterations as f64 / secs
    } else {
        0.0
    }
}

/// One completed measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    /// Iterations counted in the window.
    pub iterations: u64,
    /// Clock time the window covered.
    pub elapsed: Duration,
    /// `iterations / elapsed` in operations per second.
    pub ops_per_sec: f64,
}

impl Throughput {
    /// Rate in millions of operations per second.
    #[must_use]
    pub fn mops(&self) -> f64 {
        self.ops_per_sec / 1e6
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} M ops/s", self.mops())
    }
}

/// Iteration counter that yields a [`Throughput`] every `interval` iterations.
pub struct ThroughputWindow<'c> {
    clock: &'c dyn Clock,
    interval: u64,
    count: u64,
    window_start: Duration,
    run_start: Duration,
    total: u64,
    windows: u64,
}

impl<'c> ThroughputWindow<'c> {
    /// Start a window at the clock's current time.
    ///
    /// `interval` must be non-zero; configuration validation guarantees it.
    pub fn new(clock: &'c dyn Clock, interval: u64) -> Self {
        debug_assert!(interval > 0, "report interval must be non-zero");
        let now = clock.now();
        Self {
            clock,
            interval: interval.max(1),
            count: 0,
            window_start: now,
            run_start: now,
            total: 0,
            windows: 0,
        }
    }

    /// Count one iteration; returns a sample when the window fills.
    #[inline]
    pub fn record_iteration(&mut self) -> Option<Throughput> {
        self.count += 1;
        self.total += 1;
        if self.count < self.interval {
            return None;
        }

        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.window_start);
        let sample = Throughput {
            iterations: self.count,
            elapsed,
            ops_per_sec: rate(self.count, elapsed),
        };
        self.count = 0;
        self.window_start = now;
        self.windows += 1;
        Some(sample)
    }

    /// Iterations counted since the window was created.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of completed windows.
    #[must_use]
    pub fn windows(&self) -> u64 {
        self.windows
    }

    /// Clock time since the window was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.run_start)
    }
}

impl fmt::Debug for ThroughputWindow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThroughputWindow")
            .field("interval", &self.interval)
            .field("count", &self.count)
            .field("total", &self.total)
            .field("windows", &self.windows)
            .finish_non_exhaustive()
    }
}
