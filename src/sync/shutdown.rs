//! Cooperative cancellation for worker loops.
//!
//! Workers poll the signal at the top of every iteration, between critical
//! sections, so a triggered shutdown never interrupts a held stripe lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag. Cloning yields another handle to the same flag.
///
/// # Examples
///
/// ```
/// use stripebench::sync::ShutdownSignal;
///
/// let signal = ShutdownSignal::new();
/// let observer = signal.clone();
/// assert!(!observer.is_triggered());
/// signal.trigger();
/// assert!(observer.is_triggered());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this signal to stop. Idempotent.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether [`trigger`](Self::trigger) has been called on any handle.
    #[inline(always)]
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
