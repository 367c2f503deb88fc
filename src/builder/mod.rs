//! Fluent construction of [`BenchConfig`].
//!
//! The builder uses the type-state pattern: the two sizing parameters must be
//! supplied, in order, before `build` becomes available. Everything else is
//! optional and defaults to [`BenchConfig::default`].
//!
//! # Examples
//!
//! ```
//! use stripebench::builder::BenchConfigBuilder;
//! use stripebench::sync::LockKind;
//!
//! let config = BenchConfigBuilder::new()
//!     .unit_count(1024)
//!     .stripe_count(16)
//!     .max_iterations(1_000_000)
//!     .lock_kind(LockKind::Spin)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.stripe_count, 16);
//! ```
//!
//! Forgetting a required parameter fails to compile:
//!
//! ```compile_fail
//! use stripebench::builder::BenchConfigBuilder;
//!
//! let config = BenchConfigBuilder::new().unit_count(1024).build();
//! ```
//!
//! # Parameter Overview
//!
//! | Parameter | Required | Default |
//! |-----------|----------|---------|
//! | `unit_count` | yes | - |
//! | `stripe_count` | yes | - |
//! | `thread_count` | no | 4 |
//! | `writer_count` | no | 1 |
//! | `report_interval_iters` | no | 10,000,000 |
//! | `max_iterations` | no | unbounded |
//! | `run_duration` | no | unbounded |
//! | `seed` | no | `0xdeadbeef` |
//! | `lock_kind` | no | `parking` |
//! | `max_violations` | no | warn only |

#![allow(clippy::module_name_repetitions)]

use crate::config::BenchConfig;
use crate::error::Result;
use crate::sync::LockKind;
use std::marker::PhantomData;
use std::time::Duration;

/// Type-state marker: nothing set.
pub struct Initial;

/// Type-state marker: unit count set.
pub struct WithUnits;

/// Type-state marker: all required parameters set.
pub struct Complete;

/// Builder for [`BenchConfig`] with type-state guarantees.
pub struct BenchConfigBuilder<State> {
    config: BenchConfig,
    _state: PhantomData<State>,
}

impl BenchConfigBuilder<Initial> {
    /// Create a builder with every optional parameter at its default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BenchConfig::default(),
            _state: PhantomData,
        }
    }

    /// Set the number of protected units (power of two).
    #[must_use]
    pub fn unit_count(mut self, units: usize) -> BenchConfigBuilder<WithUnits> {
        self.config.unit_count = units;
        self.transition()
    }
}

impl Default for BenchConfigBuilder<Initial> {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchConfigBuilder<WithUnits> {
    /// Set the number of stripe locks (power of two, at most `unit_count`).
    #[must_use]
    pub fn stripe_count(mut self, stripes: usize) -> BenchConfigBuilder<Complete> {
        self.config.stripe_count = stripes;
        self.transition()
    }
}

impl<State> BenchConfigBuilder<State> {
    fn transition<Next>(self) -> BenchConfigBuilder<Next> {
        BenchConfigBuilder {
            config: self.config,
            _state: PhantomData,
        }
    }

    /// Total worker threads.
    #[must_use]
    pub fn thread_count(mut self, threads: usize) -> Self {
        self.config.thread_count = threads;
        self
    }

    /// Number of writers among the workers.
    #[must_use]
    pub fn writer_count(mut self, writers: usize) -> Self {
        self.config.writer_count = writers;
        self
    }

    /// Iterations per throughput report.
    #[must_use]
    pub fn report_interval_iters(mut self, iters: u64) -> Self {
        self.config.report_interval_iters = iters;
        self
    }

    /// Per-worker iteration budget.
    #[must_use]
    pub fn max_iterations(mut self, iters: u64) -> Self {
        self.config.max_iterations = Some(iters);
        self
    }

    /// Wall-clock budget for the run.
    #[must_use]
    pub fn run_duration(mut self, duration: Duration) -> Self {
        self.config.run_duration = Some(duration);
        self
    }

    /// Seed base for initial values and index streams.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Stripe lock implementation.
    #[must_use]
    pub fn lock_kind(mut self, kind: LockKind) -> Self {
        self.config.lock_kind = kind;
        self
    }

    /// Stop the run after this many invariant violations.
    #[must_use]
    pub fn max_violations(mut self, limit: u64) -> Self {
        self.config.max_violations = Some(limit);
        self
    }
}

impl BenchConfigBuilder<Complete> {
    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Any error from [`BenchConfig::validate`].
    pub fn build(self) -> Result<BenchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;

    #[test]
    fn test_builder_defaults() {
        let config = BenchConfigBuilder::new()
            .unit_count(1 << 20)
            .stripe_count(1024)
            .build()
            .unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn test_builder_optional_before_required() {
        let config = BenchConfigBuilder::new()
            .thread_count(8)
            .writer_count(2)
            .unit_count(64)
            .seed(7)
            .stripe_count(8)
            .run_duration(Duration::from_secs(1))
            .max_violations(5)
            .build()
            .unwrap();
        assert_eq!(config.thread_count, 8);
        assert_eq!(config.writer_count, 2);
        assert_eq!(config.unit_count, 64);
        assert_eq!(config.stripe_count, 8);
        assert_eq!(config.seed, 7);
        assert_eq!(config.run_duration, Some(Duration::from_secs(1)));
        assert_eq!(config.max_violations, Some(5));
    }

    #[test]
    fn test_builder_validates() {
        let err = BenchConfigBuilder::new()
            .unit_count(1000)
            .stripe_count(8)
            .build()
            .unwrap_err();
        assert!(matches!(err, BenchError::NotPowerOfTwo { name: "unit_count", .. }));

        let err = BenchConfigBuilder::new()
            .unit_count(1024)
            .stripe_count(16)
            .report_interval_iters(0)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_builder_single_stripe() {
        let config = BenchConfigBuilder::new()
            .unit_count(1)
            .stripe_count(1)
            .lock_kind(LockKind::None)
            .max_iterations(10)
            .build()
            .unwrap();
        assert_eq!(config.lock_kind, LockKind::None);
        assert_eq!(config.max_iterations, Some(10));
    }
}
