//! Synchronisation: stripe locks, the stripe table and shutdown.
//!
//! # Module Organization
//!
//! - [`StripeMutex`] - the lock seam, with [`ParkingMutex`], [`SpinLock`] and [`NoLock`]
//! - [`StripeTable`] - cache-line padded lock array and the unit → lock mapping
//! - [`ShutdownSignal`] - cooperative cancellation token
//!
//! # Safety
//!
//! Everything here is safe Rust. Protected data lives in
//! [`UnitStore`](crate::core::UnitStore) as relaxed atomics, so even the
//! unprotected [`NoLock`] control run is free of undefined behaviour: it only
//! loses the pairwise consistency of `(a, b)`.
//!
//! # Examples
//!
//! ```
//! use stripebench::core::UnitStore;
//! use stripebench::sync::{StripeTable, SpinLock};
//! use std::thread;
//!
//! let units = UnitStore::new(1024, 7)?;
//! let stripes = StripeTable::<SpinLock>::new(1024, 16)?;
//!
//! thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| {
//!             for i in 0..1000 {
//!                 let _guard = stripes.lock(i);
//!                 units.increment(i);
//!             }
//!         });
//!     }
//! });
//!
//! assert_eq!(units.count_inconsistent(), 0);
//! # Ok::<(), stripebench::BenchError>(())
//! ```

pub mod lock;
pub mod shutdown;
pub mod striped;

pub use lock::{LockKind, NoLock, ParkingMutex, SpinGuard, SpinLock, StripeMutex};
pub use shutdown::ShutdownSignal;
#[cfg(feature = "metrics")]
pub use striped::StripeStats;
pub use striped::{validate_sizing, StripeGuard, StripeLock, StripeTable, MAX_UNIT_COUNT};
