//! Benchmark configuration.
//!
//! Values come from three layers, lowest precedence first:
//!
//! 1. [`BenchConfig::default`] (the reference sizing)
//! 2. a TOML file ([`BenchConfig::from_file`])
//! 3. command-line flags, applied by the binary
//!
//! Every layer ends in [`BenchConfig::validate`], which runs before any
//! memory is allocated or any thread is spawned.
//!
//! # Examples
//!
//! ```
//! use stripebench::config::BenchConfig;
//!
//! let config = BenchConfig::from_toml_str(r#"
//!     unit_count = 1024
//!     stripe_count = 16
//!     max_iterations = 100000
//!     run_duration = 2.5
//!     lock_kind = "spin"
//! "#)?;
//! assert_eq!(config.thread_count, 4);
//! assert_eq!(config.run_duration, Some(std::time::Duration::from_millis(2500)));
//! # Ok::<(), stripebench::BenchError>(())
//! ```

use crate::core::rng::DEFAULT_SEED;
use crate::error::{BenchError, Result};
use crate::metrics::ViolationPolicy;
use crate::sync::{validate_sizing, LockKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of units: 1,048,576.
pub const DEFAULT_UNIT_COUNT: usize = 1024 * 1024;

/// Default number of stripe locks.
pub const DEFAULT_STRIPE_COUNT: usize = 1024;

/// Default number of worker threads (one writer, three readers).
pub const DEFAULT_THREAD_COUNT: usize = 4;

/// Upper bound on `thread_count`.
pub const MAX_THREAD_COUNT: usize = 4096;

/// Default iterations per throughput window.
pub const DEFAULT_REPORT_INTERVAL: u64 = 10_000_000;

/// Full configuration of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Number of protected units (power of two).
    pub unit_count: usize,
    /// Number of stripe locks (power of two, `<= unit_count`).
    pub stripe_count: usize,
    /// Total worker threads; thread ids `0..writer_count` are writers.
    pub thread_count: usize,
    /// Number of writer threads (`1..=thread_count`).
    pub writer_count: usize,
    /// Iterations per throughput report.
    pub report_interval_iters: u64,
    /// Per-worker iteration budget; `None` = unbounded.
    pub max_iterations: Option<u64>,
    /// Wall-clock budget for the whole run; `None` = unbounded.
    #[serde(with = "duration_secs")]
    pub run_duration: Option<Duration>,
    /// Seed base for unit initialisation and per-thread index streams.
    ///
    /// Written to TOML and JSON as a hex string, since TOML integers stop at
    /// `i64::MAX`. Reading accepts either an integer or a string.
    #[serde(with = "seed_repr")]
    pub seed: u64,
    /// Lock implementation backing each stripe.
    pub lock_kind: LockKind,
    /// Stop the run once this many invariant violations were observed.
    pub max_violations: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            unit_count: DEFAULT_UNIT_COUNT,
            stripe_count: DEFAULT_STRIPE_COUNT,
            thread_count: DEFAULT_THREAD_COUNT,
            writer_count: 1,
            report_interval_iters: DEFAULT_REPORT_INTERVAL,
            max_iterations: None,
            run_duration: None,
            seed: DEFAULT_SEED,
            lock_kind: LockKind::default(),
            max_violations: None,
        }
    }
}

impl BenchConfig {
    /// Check every constraint the harness relies on.
    ///
    /// # Errors
    ///
    /// - sizing errors from [`validate_sizing`]
    /// - `thread_count` outside `1..=MAX_THREAD_COUNT`, `writer_count`
    ///   outside `1..=thread_count`,
    ///   `report_interval_iters == 0`, zero `run_duration` or zero
    ///   `max_violations` → `InvalidConfig`
    pub fn validate(&self) -> Result<()> {
        validate_sizing(self.unit_count, self.stripe_count)?;

        if self.thread_count == 0 {
            return Err(BenchError::invalid_config("thread_count must be greater than 0"));
        }
        if self.thread_count > MAX_THREAD_COUNT {
            return Err(BenchError::invalid_config(format!(
                "thread_count {} exceeds the maximum of {}",
                self.thread_count, MAX_THREAD_COUNT
            )));
        }
        if self.writer_count == 0 || self.writer_count > self.thread_count {
            return Err(BenchError::invalid_config(format!(
                "writer_count {} must be in 1..={}",
                self.writer_count, self.thread_count
            )));
        }
        if self.report_interval_iters == 0 {
            return Err(BenchError::invalid_config(
                "report_interval_iters must be greater than 0",
            ));
        }
        if self.run_duration == Some(Duration::ZERO) {
            return Err(BenchError::invalid_config("run_duration must be non-zero"));
        }
        if self.max_violations == Some(0) {
            return Err(BenchError::invalid_config("max_violations must be at least 1"));
        }
        Ok(())
    }

    /// Number of reader threads.
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.thread_count.saturating_sub(self.writer_count)
    }

    /// Whether the run terminates on its own.
    ///
    /// An unbounded run stops only on a shutdown signal or the violation limit.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.max_iterations.is_some() || self.run_duration.is_some()
    }

    /// Violation handling derived from `max_violations`.
    #[must_use]
    pub fn violation_policy(&self) -> ViolationPolicy {
        match self.max_violations {
            Some(limit) => ViolationPolicy::FailAfter(limit),
            None => ViolationPolicy::Warn,
        }
    }

    /// Parse a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFile` on parse errors (the path is reported as `<inline>`).
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| BenchError::config_file("<inline>", e.to_string()))
    }

    /// Load a TOML configuration file.
    ///
    /// The result is not validated; callers apply overrides first and then
    /// call [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns `ConfigFile` when the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BenchError::config_file(path.display().to_string(), e.to_string()))?;
        toml::from_str(&raw)
            .map_err(|e| BenchError::config_file(path.display().to_string(), e.to_string()))
    }
}

/// Parse a seed written in decimal or as `0x`-prefixed hex.
///
/// # Errors
///
/// Returns `InvalidConfig` for anything else.
pub fn parse_seed(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| BenchError::invalid_config(format!("invalid seed '{raw}': {e}")))
}

/// `u64` seed as a hex string; integers are accepted on input.
mod seed_repr {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(seed: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{seed:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        d.deserialize_any(SeedVisitor)
    }

    struct SeedVisitor;

    impl<'de> Visitor<'de> for SeedVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or a decimal/hex string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("seed {v} is negative")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            super::parse_seed(v).map_err(E::custom)
        }
    }
}

/// `Option<Duration>` as fractional seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        secs.map(|s| {
            Duration::try_from_secs_f64(s).map_err(|e| serde::de::Error::custom(e.to_string()))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_sizing() {
        let config = BenchConfig::default();
        assert_eq!(config.unit_count, 1_048_576);
        assert_eq!(config.stripe_count, 1_024);
        assert_eq!(config.thread_count, 4);
        assert_eq!(config.writer_count, 1);
        assert_eq!(config.reader_count(), 3);
        assert_eq!(config.report_interval_iters, 10_000_000);
        assert_eq!(config.seed, 0xdead_beef);
        assert!(!config.is_bounded());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_sizing() {
        let config = BenchConfig {
            stripe_count: 1000,
            ..BenchConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            BenchError::NotPowerOfTwo { name: "stripe_count", value: 1000 }
        ));

        let config = BenchConfig {
            unit_count: 16,
            stripe_count: 32,
            ..BenchConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            BenchError::StripesExceedUnits { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_bad_threads() {
        let zero = BenchConfig {
            thread_count: 0,
            ..BenchConfig::default()
        };
        assert!(zero.validate().unwrap_err().is_config_error());

        let no_writer = BenchConfig {
            writer_count: 0,
            ..BenchConfig::default()
        };
        assert!(no_writer.validate().is_err());

        let too_many = BenchConfig {
            writer_count: 5,
            ..BenchConfig::default()
        };
        assert!(too_many.validate().is_err());

        let all_writers = BenchConfig {
            writer_count: 4,
            ..BenchConfig::default()
        };
        assert!(all_writers.validate().is_ok());
        assert_eq!(all_writers.reader_count(), 0);
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let config = BenchConfig {
            report_interval_iters: 0,
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BenchConfig {
            run_duration: Some(Duration::ZERO),
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BenchConfig {
            max_violations: Some(0),
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_violation_policy() {
        assert_eq!(BenchConfig::default().violation_policy(), ViolationPolicy::Warn);
        let config = BenchConfig {
            max_violations: Some(10),
            ..BenchConfig::default()
        };
        assert_eq!(config.violation_policy(), ViolationPolicy::FailAfter(10));
    }

    #[test]
    fn test_toml_partial_document() {
        let config = BenchConfig::from_toml_str(
            r#"
            stripe_count = 16
            unit_count = 1024
            max_violations = 3
            lock_kind = "none"
            "#,
        )
        .unwrap();
        assert_eq!(config.stripe_count, 16);
        assert_eq!(config.unit_count, 1024);
        assert_eq!(config.max_violations, Some(3));
        assert_eq!(config.lock_kind, LockKind::None);
        assert_eq!(config.thread_count, DEFAULT_THREAD_COUNT);
        assert_eq!(config.run_duration, None);
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        let err = BenchConfig::from_toml_str("stripes = 16").unwrap_err();
        assert!(matches!(err, BenchError::ConfigFile { .. }));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = BenchConfig {
            run_duration: Some(Duration::from_millis(1500)),
            max_iterations: Some(42),
            lock_kind: LockKind::Spin,
            ..BenchConfig::default()
        };
        let raw = toml::to_string(&config).unwrap();
        assert_eq!(BenchConfig::from_toml_str(&raw).unwrap(), config);
    }

    #[test]
    fn test_thread_count_upper_bound() {
        let at_limit = BenchConfig {
            thread_count: MAX_THREAD_COUNT,
            ..BenchConfig::default()
        };
        assert!(at_limit.validate().is_ok());

        let huge = BenchConfig {
            thread_count: usize::MAX / 2,
            ..BenchConfig::default()
        };
        let err = huge.validate().unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfig { .. }));
        assert!(err.to_string().contains("thread_count"));
    }

    #[test]
    fn test_seed_above_i64_roundtrips() {
        let config = BenchConfig {
            seed: u64::MAX,
            ..BenchConfig::default()
        };
        let raw = toml::to_string(&config).unwrap();
        assert!(raw.contains("seed = \"0xffffffffffffffff\""));
        assert_eq!(BenchConfig::from_toml_str(&raw).unwrap().seed, u64::MAX);

        let json = serde_json::to_string(&config).unwrap();
        let back: BenchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seed, u64::MAX);
    }

    #[test]
    fn test_seed_accepts_integer_and_string() {
        let config = BenchConfig::from_toml_str("seed = 3735928559").unwrap();
        assert_eq!(config.seed, 0xdead_beef);
        let config = BenchConfig::from_toml_str("seed = \"18446744073709551615\"").unwrap();
        assert_eq!(config.seed, u64::MAX);
        assert!(BenchConfig::from_toml_str("seed = -1").is_err());
        assert!(BenchConfig::from_toml_str("seed = \"zz\"").is_err());
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed("0xDEADBEEF").unwrap(), 0xdead_beef);
        assert_eq!(parse_seed(" 42 ").unwrap(), 42);
        assert!(parse_seed("").unwrap_err().is_config_error());
    }

    #[test]
    fn test_from_file_missing() {
        let err = BenchConfig::from_file("/nonexistent/stripebench.toml").unwrap_err();
        assert!(matches!(err, BenchError::ConfigFile { .. }));
        assert!(err.to_string().contains("stripebench.toml"));
    }
}
