//! Error types for stripebench operations.
//!
//! Configuration and allocation errors are fatal and surface before any worker
//! thread starts. Invariant violations are non-fatal: workers count and log them
//! and the run keeps going, so the value type here is used for reporting rather
//! than propagation.
//!
//! # Error Propagation
//!
//! ```
//! use stripebench::{BenchError, Result};
//! use stripebench::sync::StripeTable;
//!
//! fn build_table(units: usize, stripes: usize) -> Result<usize> {
//!     let table: StripeTable = StripeTable::new(units, stripes)?;
//!     Ok(table.stripe_count())
//! }
//!
//! assert_eq!(build_table(1024, 16).unwrap(), 16);
//! assert!(matches!(
//!     build_table(1024, 1000),
//!     Err(BenchError::NotPowerOfTwo { .. })
//! ));
//! ```

#![allow(clippy::module_name_repetitions)]

use std::fmt;

/// Result type alias for stripebench operations.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while configuring or running a benchmark.
///
/// `Clone` + `PartialEq` keep the type easy to assert on in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchError {
    /// A sizing parameter that must be a power of two is not.
    NotPowerOfTwo {
        /// Name of the offending parameter (`unit_count`, `stripe_count`).
        name: &'static str,
        /// The value that was provided.
        value: usize,
    },

    /// More stripes than units were requested.
    ///
    /// A stripe with no unit mapped to it is wasted memory, and the mapping
    /// `unit & (stripes - 1)` would leave locks permanently idle.
    StripesExceedUnits {
        /// Requested stripe count.
        stripes: usize,
        /// Requested unit count.
        units: usize,
    },

    /// Any other invalid configuration value.
    InvalidConfig {
        /// Human-readable description of what's invalid.
        message: String,
    },

    /// A configuration file could not be read or parsed.
    ConfigFile {
        /// Path of the file.
        path: String,
        /// Underlying I/O or parse error, rendered.
        message: String,
    },

    /// The unit store or stripe table could not be allocated.
    AllocationFailed {
        /// Which resource failed (`unit store`, `stripe table`).
        what: &'static str,
        /// Number of elements requested.
        count: usize,
    },

    /// A unit was observed with `b != a + 1`.
    ///
    /// Never returned from a run; workers count these and the final report
    /// carries the totals.
    InvariantViolation {
        /// Index of the torn unit.
        unit_index: usize,
        /// Observed `a`.
        a: i64,
        /// Observed `b`.
        b: i64,
    },

    /// The OS refused to spawn a worker thread.
    SpawnFailed {
        /// Thread id that failed to start.
        tid: usize,
        /// Rendered I/O error.
        message: String,
    },

    /// A worker thread panicked before producing its report.
    WorkerPanicked {
        /// Thread id of the worker.
        tid: usize,
    },
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPowerOfTwo { name, value } => {
                write!(f, "Invalid {}: {} is not a power of two.", name, value)
            }
            Self::StripesExceedUnits { stripes, units } => {
                write!(
                    f,
                    "Invalid stripe_count: {} stripes exceed {} units.",
                    stripes, units
                )
            }
            Self::InvalidConfig { message } => {
                write!(f, "Invalid configuration: {}.", message)
            }
            Self::ConfigFile { path, message } => {
                write!(f, "Failed to load config file '{}': {}", path, message)
            }
            Self::AllocationFailed { what, count } => {
                write!(f, "Failed to allocate {} of {} elements.", what, count)
            }
            Self::InvariantViolation { unit_index, a, b } => {
                write!(
                    f,
                    "Invariant violated at unit {}: a = {}, b = {} (expected b = a + 1).",
                    unit_index, a, b
                )
            }
            Self::SpawnFailed { tid, message } => {
                write!(f, "Failed to spawn worker thread {}: {}", tid, message)
            }
            Self::WorkerPanicked { tid } => {
                write!(f, "Worker thread {} panicked.", tid)
            }
        }
    }
}

impl std::error::Error for BenchError {}

impl BenchError {
    /// Create a `NotPowerOfTwo` error.
    #[must_use]
    pub fn not_power_of_two(name: &'static str, value: usize) -> Self {
        Self::NotPowerOfTwo { name, value }
    }

    /// Create a `StripesExceedUnits` error.
    #[must_use]
    pub fn stripes_exceed_units(stripes: usize, units: usize) -> Self {
        Self::StripesExceedUnits { stripes, units }
    }

    /// Create an `InvalidConfig` error with a formatted message.
    ///
    /// # Examples
    /// ```
    /// use stripebench::BenchError;
    ///
    /// let err = BenchError::invalid_config(format!("thread_count = {}", 0));
    /// assert!(err.is_config_error());
    /// ```
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a `ConfigFile` error.
    #[must_use]
    pub fn config_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an `AllocationFailed` error.
    #[must_use]
    pub fn allocation_failed(what: &'static str, count: usize) -> Self {
        Self::AllocationFailed { what, count }
    }

    /// Create an `InvariantViolation` value.
    #[must_use]
    pub fn invariant_violation(unit_index: usize, a: i64, b: i64) -> Self {
        Self::InvariantViolation { unit_index, a, b }
    }

    /// Create a `SpawnFailed` error.
    #[must_use]
    pub fn spawn_failed(tid: usize, message: impl Into<String>) -> Self {
        Self::SpawnFailed {
            tid,
            message: message.into(),
        }
    }

    /// Create a `WorkerPanicked` error.
    #[must_use]
    pub fn worker_panicked(tid: usize) -> Self {
        Self::WorkerPanicked { tid }
    }

    /// Whether this error comes from invalid configuration.
    ///
    /// These are always raised before any worker thread is created.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::NotPowerOfTwo { .. }
                | Self::StripesExceedUnits { .. }
                | Self::InvalidConfig { .. }
                | Self::ConfigFile { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_power_of_two() {
        let err = BenchError::not_power_of_two("stripe_count", 1000);
        let display = format!("{err}");
        assert!(display.contains("stripe_count"));
        assert!(display.contains("1000"));
        assert!(display.contains("power of two"));
    }

    #[test]
    fn test_error_display_stripes_exceed_units() {
        let err = BenchError::stripes_exceed_units(2048, 1024);
        let display = format!("{err}");
        assert!(display.contains("2048"));
        assert!(display.contains("1024"));
    }

    #[test]
    fn test_error_display_invalid_config() {
        let err = BenchError::invalid_config("thread_count must be > 0");
        let display = format!("{err}");
        assert!(display.contains("Invalid configuration"));
        assert!(display.contains("thread_count"));
        assert!(display.ends_with('.'));
    }

    #[test]
    fn test_error_display_config_file() {
        let err = BenchError::config_file("bench.toml", "missing field");
        let display = format!("{err}");
        assert!(display.contains("bench.toml"));
        assert!(display.contains("missing field"));
    }

    #[test]
    fn test_error_display_allocation_failed() {
        let err = BenchError::allocation_failed("unit store", 1 << 20);
        let display = format!("{err}");
        assert!(display.contains("unit store"));
        assert!(display.contains("1048576"));
    }

    #[test]
    fn test_error_display_invariant_violation() {
        let err = BenchError::invariant_violation(17, 5, 5);
        let display = format!("{err}");
        assert!(display.contains("unit 17"));
        assert!(display.contains("a = 5"));
        assert!(display.contains("b = a + 1"));
    }

    #[test]
    fn test_error_display_worker_lifecycle() {
        let spawn = format!("{}", BenchError::spawn_failed(2, "resource busy"));
        assert!(spawn.contains("thread 2"));
        assert!(spawn.contains("resource busy"));

        let panicked = format!("{}", BenchError::worker_panicked(3));
        assert!(panicked.contains("3"));
        assert!(panicked.contains("panicked"));
    }

    #[test]
    fn test_config_error_classification() {
        assert!(BenchError::not_power_of_two("unit_count", 3).is_config_error());
        assert!(BenchError::stripes_exceed_units(8, 4).is_config_error());
        assert!(BenchError::invalid_config("x").is_config_error());
        assert!(BenchError::config_file("a", "b").is_config_error());
        assert!(!BenchError::allocation_failed("unit store", 1).is_config_error());
        assert!(!BenchError::invariant_violation(0, 1, 1).is_config_error());
        assert!(!BenchError::worker_panicked(0).is_config_error());
    }

    #[test]
    fn test_error_implements_std_error() {
        let _err: Box<dyn std::error::Error> = Box::new(BenchError::invalid_config("test"));
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<()> {
            Err(BenchError::not_power_of_two("unit_count", 3))
        }

        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        assert_eq!(
            outer().unwrap_err(),
            BenchError::not_power_of_two("unit_count", 3)
        );
    }
}
