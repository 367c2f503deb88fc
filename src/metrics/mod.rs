//! Throughput and correctness measurement.
//!
//! ```text
//! ┌──────────────────────┐   one per worker, no sharing
//! │   ThroughputWindow   │──► Throughput every report_interval_iters
//! └──────────┬───────────┘
//!            │ reads
//!      ┌─────▼─────┐
//!      │   Clock   │   SystemClock | ManualClock
//!      └───────────┘
//!
//! ┌──────────────────────┐   shared by all readers
//! │   InvariantMonitor   │──► total violations, first record, escalation
//! └──────────────────────┘
//! ```

pub mod invariant;
pub mod throughput;

pub use invariant::{InvariantMonitor, ViolationPolicy, ViolationRecord};
pub use throughput::{rate, Clock, ManualClock, SystemClock, Throughput, ThroughputWindow};
