//! Core data types shared by every worker.
//!
//! # Module Organization
//!
//! ```text
//! core/
//! ├── unit.rs  - Unit, UnitSnapshot, UnitStore
//! ├── rng.rs   - per-worker LCG index stream
//! └── mod.rs   - This file (public API)
//! ```
//!
//! The unit store holds the data; the stripe table in [`crate::sync`] holds
//! the locks. Neither knows about the other: the mapping between them is the
//! single `unit & (stripes - 1)` in the stripe table.

pub mod rng;
pub mod unit;

pub use rng::{fastrand_step, seed_for_thread, FastRand, DEFAULT_SEED};
pub use unit::{Unit, UnitSnapshot, UnitStore};
