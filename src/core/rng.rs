//! Per-worker pseudo-random index stream.
//!
//! A 64-bit linear congruential generator that returns the high 32 bits of
//! its state. It sits on the hot path of every worker iteration, so it is
//! branch-free, allocation-free, and its state lives entirely on the worker's
//! stack. Statistical quality is far below `rand`'s generators but ample for
//! spreading accesses across units.
//!
//! # Examples
//!
//! ```
//! use stripebench::core::rng::{fastrand_step, FastRand};
//!
//! let (value, next_state) = fastrand_step(42);
//! let mut rng = FastRand::new(42);
//! assert_eq!(rng.next_u32(), value);
//! assert_eq!(rng.state(), next_state);
//! ```

/// Default seed base; worker `tid` is seeded with `DEFAULT_SEED + tid`.
pub const DEFAULT_SEED: u64 = 0xdead_beef;

const LCG_MULTIPLIER: u64 = 1_103_515_245;
const LCG_INCREMENT: u64 = 12_345;

/// Advance the generator once.
///
/// Returns `(value, new_state)`. Pure and total over every `u64` state.
#[inline(always)]
#[must_use]
pub const fn fastrand_step(state: u64) -> (u32, u64) {
    let next = state
        .wrapping_mul(LCG_MULTIPLIER)
        .wrapping_add(LCG_INCREMENT);
    ((next >> 32) as u32, next)
}

/// Seed for worker `tid` derived from a shared base.
///
/// Streams for different thread ids start from different states, so workers
/// touch uncorrelated units while every run stays reproducible.
#[inline]
#[must_use]
pub const fn seed_for_thread(base: u64, tid: usize) -> u64 {
    base.wrapping_add(tid as u64)
}

/// Stateful wrapper around [`fastrand_step`], owned by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastRand {
    state: u64,
}

impl FastRand {
    /// Create a generator from an explicit seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Create the generator for worker `tid`.
    #[must_use]
    pub const fn for_thread(base: u64, tid: usize) -> Self {
        Self::new(seed_for_thread(base, tid))
    }

    /// Next 32-bit value.
    #[inline(always)]
    pub fn next_u32(&mut self) -> u32 {
        let (value, next) = fastrand_step(self.state);
        self.state = next;
        value
    }

    /// Next value reduced with `mask` (`size - 1` for a power-of-two size).
    #[inline(always)]
    pub fn next_masked(&mut self, mask: usize) -> usize {
        self.next_u32() as usize & mask
    }

    /// Current internal state.
    #[must_use]
    pub const fn state(&self) -> u64 {
        self.state
    }
}
