//! Shared invariant-violation accounting.
//!
//! Readers report every unit they observe with `b != a + 1`. The monitor
//! keeps the global count, remembers the first offending observation, and
//! tells the caller when the configured [`ViolationPolicy`] escalates.
//!
//! The counter is a single relaxed `AtomicU64`; it is touched only when a
//! violation happens, which never occurs in a correctly locked run.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::core::UnitSnapshot;
use crate::error::BenchError;

/// What to do when readers observe torn units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViolationPolicy {
    /// Count and log; never stop the run.
    #[default]
    Warn,
    /// Stop the run once this many violations were observed in total.
    FailAfter(u64),
}

/// A single torn observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Worker that observed it.
    pub tid: usize,
    /// Offending unit.
    pub unit_index: usize,
    /// Fields as read.
    pub snapshot: UnitSnapshot,
}

impl ViolationRecord {
    /// The equivalent error value.
    #[must_use]
    pub fn to_error(&self) -> BenchError {
        BenchError::invariant_violation(self.unit_index, self.snapshot.a, self.snapshot.b)
    }
}

/// Global violation counter shared by all workers.
#[derive(Debug, Default)]
pub struct InvariantMonitor {
    total: AtomicU64,
    first: OnceLock<ViolationRecord>,
    policy: ViolationPolicy,
}

impl InvariantMonitor {
    /// Create a monitor with the given policy.
    #[must_use]
    pub fn new(policy: ViolationPolicy) -> Self {
        Self {
            total: AtomicU64::new(0),
            first: OnceLock::new(),
            policy,
        }
    }

    /// Record one violation.
    ///
    /// Returns `true` when this call makes the total reach the policy limit;
    /// exactly one caller sees `true`.
    pub fn record(&self, record: ViolationRecord) -> bool {
        let _ = self.first.set(record);
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        matches!(self.policy, ViolationPolicy::FailAfter(limit) if total == limit)
    }

    /// Violations recorded so far.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// First recorded violation, if any.
    #[must_use]
    pub fn first(&self) -> Option<ViolationRecord> {
        self.first.get().copied()
    }

    /// Whether the policy limit has been reached.
    #[must_use]
    pub fn limit_reached(&self) -> bool {
        match self.policy {
            ViolationPolicy::Warn => false,
            ViolationPolicy::FailAfter(limit) => self.total() >= limit,
        }
    }
}
