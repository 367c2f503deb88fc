//! Mutual-exclusion primitives a stripe can be built from.
//!
//! [`StripeMutex`] is the seam between the stripe table and the lock it
//! stripes. Three implementations ship:
//!
//! | Kind | Type | Behaviour under contention |
//! |------|------|----------------------------|
//! | `parking` | [`ParkingMutex`] | spins briefly, then parks the thread |
//! | `spin` | [`SpinLock`] | test-and-test-and-set with exponential backoff |
//! | `none` | [`NoLock`] | no exclusion at all (negative control) |
//!
//! `NoLock` exists so a run can demonstrate that the invariant check really
//! detects torn updates when the locking is removed.
//!
//! All three guard `()`: the protected data lives in the unit store, not
//! inside the lock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::BenchError;

/// A lock usable as one stripe.
///
/// Acquiring returns an RAII guard; the lock is released when the guard is
/// dropped. Implementations must not be re-entrant-dependent: a worker never
/// holds more than one stripe at a time.
pub trait StripeMutex: Default + Send + Sync {
    /// Guard proving the lock is held.
    type Guard<'a>
    where
        Self: 'a;

    /// Short name used in logs and reports.
    const NAME: &'static str;

    /// Block until the lock is acquired.
    fn lock(&self) -> Self::Guard<'_>;

    /// Acquire the lock if it is free.
    fn try_lock(&self) -> Option<Self::Guard<'_>>;

    /// Whether some thread currently holds the lock.
    fn is_locked(&self) -> bool;
}

/// `parking_lot::Mutex` guarding nothing.
///
/// One byte of state; writer-fair and free of poisoning.
pub type ParkingMutex = parking_lot::Mutex<()>;

impl StripeMutex for ParkingMutex {
    type Guard<'a> = parking_lot::MutexGuard<'a, ()>;

    const NAME: &'static str = "parking";

    #[inline]
    fn lock(&self) -> Self::Guard<'_> {
        parking_lot::Mutex::lock(self)
    }

    #[inline]
    fn try_lock(&self) -> Option<Self::Guard<'_>> {
        parking_lot::Mutex::try_lock(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        parking_lot::Mutex::is_locked(self)
    }
}

/// Test-and-test-and-set spin lock.
///
/// Closest to a `pthread_spinlock_t`: a waiter never sleeps, it spins on a
/// relaxed load until the flag looks free and only then attempts the
/// acquiring swap. After a bounded number of doublings the backoff yields to
/// the scheduler so an oversubscribed machine still makes progress.
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

/// Guard for [`SpinLock`]; releases on drop.
#[derive(Debug)]
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

const SPIN_LIMIT: u32 = 6;

impl StripeMutex for SpinLock {
    type Guard<'a> = SpinGuard<'a>;

    const NAME: &'static str = "spin";

    #[inline]
    fn lock(&self) -> Self::Guard<'_> {
        let mut step = 0u32;
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            while self.locked.load(Ordering::Relaxed) {
                if step <= SPIN_LIMIT {
                    for _ in 0..(1u32 << step) {
                        std::hint::spin_loop();
                    }
                    step += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> Option<Self::Guard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinGuard { lock: self })
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// A "lock" that excludes nobody.
///
/// Only for the negative control: with it, readers race the writer and
/// should observe torn units.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLock;

impl StripeMutex for NoLock {
    type Guard<'a> = ();

    const NAME: &'static str = "none";

    #[inline(always)]
    fn lock(&self) -> Self::Guard<'_> {}

    #[inline(always)]
    fn try_lock(&self) -> Option<Self::Guard<'_>> {
        Some(())
    }

    #[inline(always)]
    fn is_locked(&self) -> bool {
        false
    }
}

/// Runtime selector for the stripe lock implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// [`ParkingMutex`].
    #[default]
    Parking,
    /// [`SpinLock`].
    Spin,
    /// [`NoLock`]; negative control, expect invariant violations.
    None,
}

impl LockKind {
    /// Every kind, in display order.
    pub const ALL: [LockKind; 3] = [LockKind::Parking, LockKind::Spin, LockKind::None];

    /// Name matching [`StripeMutex::NAME`] of the selected implementation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            LockKind::Parking => ParkingMutex::NAME,
            LockKind::Spin => SpinLock::NAME,
            LockKind::None => NoLock::NAME,
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LockKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parking" | "mutex" => Ok(LockKind::Parking),
            "spin" | "spinlock" => Ok(LockKind::Spin),
            "none" => Ok(LockKind::None),
            other => Err(BenchError::invalid_config(format!(
                "unknown lock kind '{}' (expected parking, spin or none)",
                other
            ))),
        }
    }
}
