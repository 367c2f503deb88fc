//! The protected unit array.
//!
//! Every unit holds two fields that must satisfy `b == a + 1`. The fields are
//! atomics accessed with `Ordering::Relaxed`: that rules out data races, but it
//! does NOT make the pair consistent. Consistency of a unit comes only from
//! holding its stripe lock, whose acquire/release pairs order the relaxed
//! accesses of successive critical sections.
//!
//! # Memory Ordering
//!
//! - `load`: two relaxed loads, `a` then `b`
//! - `increment`: two relaxed `fetch_add`s, `a` then `b`
//!
//! Without the stripe lock a reader can land between a writer's two updates
//! and observe `b == a`; the unprotected negative-control run relies on that.

use crate::error::{BenchError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// One protected record.
#[derive(Debug)]
#[repr(C)]
pub struct Unit {
    a: AtomicI64,
    b: AtomicI64,
}

impl Unit {
    /// Create a unit satisfying the invariant for the given `a`.
    #[must_use]
    pub const fn new(a: i64) -> Self {
        Self {
            a: AtomicI64::new(a),
            b: AtomicI64::new(a.wrapping_add(1)),
        }
    }
}

/// A point-in-time read of a unit's two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// First field.
    pub a: i64,
    /// Second field; must equal `a + 1`.
    pub b: i64,
}

impl UnitSnapshot {
    /// Whether the snapshot satisfies `b == a + 1`.
    #[inline(always)]
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.b == self.a.wrapping_add(1)
    }

    /// `a + b`, the value readers fold into their running sum.
    #[inline(always)]
    #[must_use]
    pub const fn sum(&self) -> i64 {
        self.a.wrapping_add(self.b)
    }
}

/// Fixed-size array of units shared by every worker.
///
/// The length is a power of two so indices can be reduced with [`mask`](Self::mask).
/// Nothing here takes a lock; callers hold the unit's stripe lock from
/// [`StripeTable`](crate::sync::StripeTable).
#[derive(Debug)]
pub struct UnitStore {
    units: Box<[Unit]>,
}

impl UnitStore {
    /// Allocate `count` units with seeded random initial values.
    ///
    /// `a` is drawn from `[0, i32::MAX]` so a long run of increments cannot
    /// approach `i64` overflow.
    ///
    /// # Errors
    ///
    /// - `count == 0` → `InvalidConfig`
    /// - allocation failure → `AllocationFailed`
    pub fn new(count: usize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::from_fn(count, |_| rng.gen_range(0..=i64::from(i32::MAX)))
    }

    /// Allocate `count` units with `a` given by `init(index)`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_fn(count: usize, mut init: impl FnMut(usize) -> i64) -> Result<Self> {
        if count == 0 {
            return Err(BenchError::invalid_config("unit_count must be greater than 0"));
        }

        let mut units = Vec::new();
        units
            .try_reserve_exact(count)
            .map_err(|_| BenchError::allocation_failed("unit store", count))?;
        units.extend((0..count).map(|i| Unit::new(init(i))));

        Ok(Self {
            units: units.into_boxed_slice(),
        })
    }

    /// Number of units.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Always `false` for a constructed store; provided for API completeness.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Index mask (`len - 1`); meaningful when `len` is a power of two.
    #[inline]
    #[must_use]
    pub fn mask(&self) -> usize {
        self.units.len() - 1
    }

    /// Read both fields of unit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline(always)]
    #[must_use]
    pub fn load(&self, index: usize) -> UnitSnapshot {
        let unit = &self.units[index];
        let a = unit.a.load(Ordering::Relaxed);
        let b = unit.b.load(Ordering::Relaxed);
        UnitSnapshot { a, b }
    }

    /// Increment both fields of unit `index` by one, `a` first.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline(always)]
    pub fn increment(&self, index: usize) {
        let unit = &self.units[index];
        unit.a.fetch_add(1, Ordering::Relaxed);
        unit.b.fetch_add(1, Ordering::Relaxed);
    }

    /// Count units currently violating the invariant.
    ///
    /// Only meaningful while no writer is active (e.g. after a run).
    #[must_use]
    pub fn count_inconsistent(&self) -> usize {
        (0..self.units.len())
            .filter(|&i| !self.load(i).is_consistent())
            .count()
    }

    /// Heap bytes held by the unit array.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.units.len() * std::mem::size_of::<Unit>()
    }
}
