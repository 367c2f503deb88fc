//! stripebench: throughput and correctness harness for lock-striped shared arrays.
//!
//! A large array of units, each holding two fields with the invariant
//! `b == a + 1`, is protected by a much smaller array of cache-line padded
//! locks. Unit `i` is guarded by lock `i & (stripe_count - 1)`. Writer threads
//! increment both fields of random units; reader threads read random units and
//! check the invariant. Every worker reports its throughput periodically.
//!
//! The harness quantifies the trade-off of lock granularity: fewer stripes
//! mean more contention, more stripes mean more memory and cache pressure.
//!
//! # Quick Start
//!
//! ```
//! use stripebench::prelude::*;
//!
//! let config = BenchConfigBuilder::new()
//!     .unit_count(1024)
//!     .stripe_count(16)
//!     .max_iterations(50_000)
//!     .build()?;
//!
//! let report = Harness::new(config)?.run()?;
//! assert_eq!(report.total_violations, 0);
//! assert_eq!(report.workers.len(), 4);
//! # Ok::<(), BenchError>(())
//! ```
//!
//! # Lock Kinds
//!
//! | Kind | Stripe lock | Notes |
//! |------|-------------|-------|
//! | `parking` | `parking_lot::Mutex<()>` | default |
//! | `spin` | test-and-test-and-set spin lock | never sleeps |
//! | `none` | no exclusion | negative control; readers observe torn units |
//!
//! # Stopping a Run
//!
//! Workers stop on the first of: their iteration budget, the run deadline, a
//! [`ShutdownSignal`](sync::ShutdownSignal), or the violation limit. Stop
//! conditions are checked between critical sections, so no lock is ever left
//! held.
//!
//! # Features
//!
//! - `metrics` - per-stripe acquisition and contention counters
//! - `proptest` - property-based tests
//!
//! # Unsafe Code Policy
//!
//! The only unsafe code is the x86_64 `CPUID` query in `util` used to log the
//! detected cache line size. Unit fields are relaxed atomics, so even the
//! unprotected negative control is free of undefined behavior.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Units and the per-worker PRNG
pub mod core;

/// Error types and result aliases
pub mod error;

/// Configuration loading and validation
pub mod config;

/// Type-safe configuration builder
pub mod builder;

/// Stripe locks, stripe table and cancellation
pub mod sync;

/// Throughput windows and invariant accounting
pub mod metrics;

/// Reader and writer loops
pub mod worker;

/// Run orchestration
pub mod harness;

/// Utility functions and helpers
#[allow(unsafe_code)]
pub mod util;

pub use error::{BenchError, Result};

pub use builder::BenchConfigBuilder;
pub use config::BenchConfig;
pub use harness::{Harness, RunOutcome, RunReport, SharedState};
pub use sync::{LockKind, ShutdownSignal, StripeTable};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::BenchConfigBuilder;
    pub use crate::config::BenchConfig;
    pub use crate::error::{BenchError, Result};
    pub use crate::harness::{Harness, RunOutcome, RunReport, SharedState};
    pub use crate::metrics::{Clock, ManualClock, SystemClock};
    pub use crate::sync::{LockKind, ShutdownSignal, StripeMutex, StripeTable};
    pub use crate::worker::{Role, StopReason, WorkerReport};
}
