//! Lock striping: many units, few locks.
//!
//! # Design
//!
//! The unit store has `unit_count` entries; the stripe table has
//! `stripe_count` locks, both powers of two with `stripe_count <= unit_count`.
//! Unit `u` is protected by lock
//!
//! ```text
//! stripe = u & (stripe_count - 1)      // == u mod stripe_count
//! ```
//!
//! so every stripe covers exactly `unit_count / stripe_count` units, spaced
//! `stripe_count` apart. The mapping is pure and total: the same index always
//! yields the same lock, and two units sharing a lock are always protected
//! together.
//!
//! ## Granularity Trade-off
//!
//! | Stripes | Memory (64 B each) | Contention |
//! |---------|--------------------|------------|
//! | 16      | 1 KB               | high       |
//! | 1024    | 64 KB              | low        |
//! | = units | 64 B per unit      | none       |
//!
//! ## Locking Protocol
//!
//! | Operation | Locks Acquired | Duration |
//! |-----------|----------------|----------|
//! | read unit | its stripe     | two loads |
//! | write unit| its stripe     | two adds  |
//!
//! A worker holds at most one stripe at a time, so lock-ordering deadlock is
//! impossible by construction.
//!
//! # Examples
//!
//! ```
//! use stripebench::sync::StripeTable;
//!
//! let table: StripeTable = StripeTable::new(1024, 16)?;
//! assert_eq!(table.stripe_index(5), table.stripe_index(5 + 16));
//! assert!(std::ptr::eq(table.lock_for(7), table.lock_for(7 + 3 * 16)));
//!
//! {
//!     let guard = table.lock(5);
//!     assert_eq!(guard.stripe(), 5);
//!     // ... read or update units 5, 21, 37, ...
//! }
//! # Ok::<(), stripebench::BenchError>(())
//! ```

use crate::error::{BenchError, Result};
use crate::sync::lock::{NoLock, ParkingMutex, SpinLock, StripeMutex};
use crate::util::bitops::{index_mask, is_power_of_two};
use crate::util::CACHE_LINE_SIZE;

#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Largest supported unit count: indices come from a 32-bit generator.
pub const MAX_UNIT_COUNT: u64 = 1 << 32;

/// Validate a `(unit_count, stripe_count)` pair.
///
/// # Errors
///
/// - either count not a power of two → `NotPowerOfTwo`
/// - `stripe_count > unit_count` → `StripesExceedUnits`
/// - `unit_count > MAX_UNIT_COUNT` → `InvalidConfig`
pub fn validate_sizing(unit_count: usize, stripe_count: usize) -> Result<()> {
    if !is_power_of_two(unit_count) {
        return Err(BenchError::not_power_of_two("unit_count", unit_count));
    }
    if !is_power_of_two(stripe_count) {
        return Err(BenchError::not_power_of_two("stripe_count", stripe_count));
    }
    if stripe_count > unit_count {
        return Err(BenchError::stripes_exceed_units(stripe_count, unit_count));
    }
    if unit_count as u64 > MAX_UNIT_COUNT {
        return Err(BenchError::invalid_config(format!(
            "unit_count {} exceeds the maximum of {}",
            unit_count, MAX_UNIT_COUNT
        )));
    }
    Ok(())
}

/// One stripe: a lock and its index, alone on a cache line.
///
/// Adjacent stripes are touched by different cores; sharing a line would
/// bounce it between them on every acquisition even when the stripes are
/// unrelated.
///
/// # Memory Layout
///
/// ```text
/// ┌───────────┬─────────────┬──────────────────────┬──────────┐
/// │ mutex     │ index (u32) │ counters (metrics)   │ padding  │ = 64 bytes
/// └───────────┴─────────────┴──────────────────────┴──────────┘
/// ```
#[repr(align(64))]
#[derive(Debug)]
pub struct StripeLock<M: StripeMutex = ParkingMutex> {
    mutex: M,
    index: u32,

    /// Total acquisitions (requires `metrics` feature).
    #[cfg(feature = "metrics")]
    acquisitions: AtomicU64,

    /// Acquisitions that found the lock already held (requires `metrics` feature).
    #[cfg(feature = "metrics")]
    contended: AtomicU64,
}

const _: () = assert!(std::mem::size_of::<StripeLock<ParkingMutex>>() == CACHE_LINE_SIZE);
const _: () = assert!(std::mem::size_of::<StripeLock<SpinLock>>() == CACHE_LINE_SIZE);
const _: () = assert!(std::mem::size_of::<StripeLock<NoLock>>() == CACHE_LINE_SIZE);
const _: () = assert!(std::mem::align_of::<StripeLock<ParkingMutex>>() == CACHE_LINE_SIZE);

impl<M: StripeMutex> StripeLock<M> {
    fn new(index: u32) -> Self {
        Self {
            mutex: M::default(),
            index,
            #[cfg(feature = "metrics")]
            acquisitions: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            contended: AtomicU64::new(0),
        }
    }

    /// Position of this lock in the table.
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Block until this stripe is held.
    #[inline]
    pub fn lock(&self) -> StripeGuard<'_, M> {
        #[cfg(feature = "metrics")]
        let guard = {
            self.acquisitions.fetch_add(1, AtomicOrdering::Relaxed);
            match self.mutex.try_lock() {
                Some(guard) => guard,
                None => {
                    self.contended.fetch_add(1, AtomicOrdering::Relaxed);
                    self.mutex.lock()
                }
            }
        };

        #[cfg(not(feature = "metrics"))]
        let guard = self.mutex.lock();

        StripeGuard {
            _guard: guard,
            stripe: self.index as usize,
        }
    }

    /// Hold this stripe if it is free.
    #[inline]
    pub fn try_lock(&self) -> Option<StripeGuard<'_, M>> {
        self.mutex.try_lock().map(|guard| {
            #[cfg(feature = "metrics")]
            self.acquisitions.fetch_add(1, AtomicOrdering::Relaxed);
            StripeGuard {
                _guard: guard,
                stripe: self.index as usize,
            }
        })
    }

    /// Whether some thread holds this stripe right now.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }
}

/// Proof that a stripe is held. Dropping it releases the stripe.
pub struct StripeGuard<'a, M: StripeMutex + 'a> {
    _guard: M::Guard<'a>,
    stripe: usize,
}

impl<M: StripeMutex> StripeGuard<'_, M> {
    /// Index of the held stripe.
    #[inline]
    #[must_use]
    pub fn stripe(&self) -> usize {
        self.stripe
    }
}

impl<M: StripeMutex> std::fmt::Debug for StripeGuard<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGuard")
            .field("stripe", &self.stripe)
            .field("lock", &M::NAME)
            .finish()
    }
}

/// Per-stripe statistics (requires `metrics` feature).
#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StripeStats {
    /// Stripe index in range [0, stripe_count).
    pub stripe_idx: usize,
    /// Total acquisitions.
    pub acquisitions: u64,
    /// Acquisitions that had to wait.
    pub contended: u64,
}

/// Fixed array of cache-line padded stripe locks.
///
/// Immutable after construction: there is no re-striping, so nothing guards
/// the table itself and it is shared by plain reference.
pub struct StripeTable<M: StripeMutex = ParkingMutex> {
    stripes: Box<[StripeLock<M>]>,
    mask: usize,
    unit_count: usize,
}

impl<M: StripeMutex> StripeTable<M> {
    /// Build a table of `stripe_count` locks covering `unit_count` units.
    ///
    /// # Errors
    ///
    /// - sizing rejected by [`validate_sizing`]
    /// - allocation failure → `AllocationFailed`
    ///
    /// # Examples
    ///
    /// ```
    /// use stripebench::sync::StripeTable;
    /// use stripebench::BenchError;
    ///
    /// assert!(StripeTable::<stripebench::sync::SpinLock>::new(1 << 20, 1024).is_ok());
    /// assert!(matches!(
    ///     StripeTable::<stripebench::sync::SpinLock>::new(1 << 20, 1000),
    ///     Err(BenchError::NotPowerOfTwo { name: "stripe_count", .. })
    /// ));
    /// ```
    pub fn new(unit_count: usize, stripe_count: usize) -> Result<Self> {
        validate_sizing(unit_count, stripe_count)?;

        let mut stripes = Vec::new();
        stripes
            .try_reserve_exact(stripe_count)
            .map_err(|_| BenchError::allocation_failed("stripe table", stripe_count))?;
        // stripe_count <= MAX_UNIT_COUNT, so every index fits in u32.
        stripes.extend((0..stripe_count).map(|i| StripeLock::new(i as u32)));

        Ok(Self {
            stripes: stripes.into_boxed_slice(),
            mask: index_mask(stripe_count),
            unit_count,
        })
    }

    /// Number of locks.
    #[inline]
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Number of units the table was sized for.
    #[inline]
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// Units covered by each stripe.
    #[inline]
    #[must_use]
    pub fn units_per_stripe(&self) -> usize {
        self.unit_count / self.stripes.len()
    }

    /// Lock index for `unit_index`: `unit_index & (stripe_count - 1)`.
    #[inline(always)]
    #[must_use]
    pub fn stripe_index(&self, unit_index: usize) -> usize {
        unit_index & self.mask
    }

    /// The lock protecting `unit_index`.
    #[inline(always)]
    #[must_use]
    pub fn lock_for(&self, unit_index: usize) -> &StripeLock<M> {
        &self.stripes[self.stripe_index(unit_index)]
    }

    /// Block until the stripe of `unit_index` is held.
    #[inline(always)]
    pub fn lock(&self, unit_index: usize) -> StripeGuard<'_, M> {
        self.lock_for(unit_index).lock()
    }

    /// Hold the stripe of `unit_index` if it is free.
    #[inline]
    pub fn try_lock(&self, unit_index: usize) -> Option<StripeGuard<'_, M>> {
        self.lock_for(unit_index).try_lock()
    }

    /// Iterate over all stripes in index order.
    pub fn iter(&self) -> impl Iterator<Item = &StripeLock<M>> {
        self.stripes.iter()
    }

    /// Whether any stripe is currently held.
    #[must_use]
    pub fn any_locked(&self) -> bool {
        self.stripes.iter().any(|stripe| stripe.is_locked())
    }

    /// Heap bytes held by the lock array.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.stripes.len() * std::mem::size_of::<StripeLock<M>>()
    }

    /// Per-stripe statistics (requires `metrics` feature).
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn stripe_stats(&self) -> Vec<StripeStats> {
        self.stripes
            .iter()
            .map(|stripe| StripeStats {
                stripe_idx: stripe.index(),
                acquisitions: stripe.acquisitions.load(AtomicOrdering::Relaxed),
                contended: stripe.contended.load(AtomicOrdering::Relaxed),
            })
            .collect()
    }

    /// Indices of the most contended stripes, most contended first
    /// (requires `metrics` feature).
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn most_contended_stripes(&self, top_n: usize) -> Vec<usize> {
        let mut stats = self.stripe_stats();
        stats.sort_by_key(|s| std::cmp::Reverse(s.contended));
        stats
            .into_iter()
            .take(top_n)
            .map(|s| s.stripe_idx)
            .collect()
    }
}

impl<M: StripeMutex> std::fmt::Debug for StripeTable<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeTable")
            .field("lock", &M::NAME)
            .field("stripe_count", &self.stripes.len())
            .field("unit_count", &self.unit_count)
            .finish()
    }
}

impl<M: StripeMutex> std::fmt::Display for StripeTable<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StripeTable({} {} stripes, {} units, {} units/stripe)",
            self.stripes.len(),
            M::NAME,
            self.unit_count,
            self.units_per_stripe()
        )
    }
}
