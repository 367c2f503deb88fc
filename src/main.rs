//! Command-line entry point for stripebench.
//!
//! Configuration precedence, lowest first: built-in defaults, `--config` TOML
//! file, individual flags. Exit status: 0 on completion, 1 on configuration
//! or allocation failure, 2 when `--max-violations` is reached, 3 when a
//! worker panics.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use stripebench::util::next_power_of_two;
use stripebench::{BenchConfig, BenchError, Harness, LockKind};

#[derive(Parser, Debug)]
#[command(
    name = "stripebench",
    author,
    version,
    about = "Throughput and correctness benchmark for lock-striped shared arrays"
)]
struct Args {
    /// TOML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of protected units (power of two)
    #[arg(long)]
    units: Option<usize>,

    /// Number of stripe locks (power of two, at most --units)
    #[arg(long)]
    stripes: Option<usize>,

    /// Total worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Writer threads among the workers
    #[arg(long)]
    writers: Option<usize>,

    /// Iterations between throughput reports
    #[arg(long)]
    report_interval: Option<u64>,

    /// Per-worker iteration budget
    #[arg(long)]
    iterations: Option<u64>,

    /// Run time in seconds (fractions allowed)
    #[arg(long, value_parser = parse_secs)]
    duration: Option<Duration>,

    /// Seed base, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_seed)]
    seed: Option<u64>,

    /// Stripe lock implementation: parking, spin or none
    #[arg(long)]
    lock: Option<LockKind>,

    /// Stop once this many invariant violations were observed
    #[arg(long)]
    max_violations: Option<u64>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_config(self) -> Result<(BenchConfig, bool), BenchError> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };
        if let Some(units) = self.units {
            config.unit_count = units;
        }
        if let Some(stripes) = self.stripes {
            config.stripe_count = stripes;
        }
        if let Some(threads) = self.threads {
            config.thread_count = threads;
        }
        if let Some(writers) = self.writers {
            config.writer_count = writers;
        }
        if let Some(interval) = self.report_interval {
            config.report_interval_iters = interval;
        }
        if self.iterations.is_some() {
            config.max_iterations = self.iterations;
        }
        if self.duration.is_some() {
            config.run_duration = self.duration;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(lock) = self.lock {
            config.lock_kind = lock;
        }
        if self.max_violations.is_some() {
            config.max_violations = self.max_violations;
        }
        config.validate()?;
        Ok((config, self.json))
    }
}

fn parse_secs(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("invalid seconds '{raw}': {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

fn parse_seed(raw: &str) -> Result<u64, String> {
    stripebench::config::parse_seed(raw).map_err(|e| e.to_string())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(env_filter).with_thread_names(true).try_init();
}

fn exit_code(err: &BenchError) -> i32 {
    match err {
        BenchError::WorkerPanicked { .. } => 3,
        _ => 1,
    }
}

fn main() {
    init_tracing();

    let (config, json) = match Args::parse().into_config() {
        Ok(parsed) => parsed,
        Err(err) => {
            error!(%err, "invalid configuration");
            if let BenchError::NotPowerOfTwo { name, value } = err {
                info!(nearest = next_power_of_two(value), "{name} must be a power of two");
            }
            process::exit(1);
        }
    };

    if !config.is_bounded() {
        warn!("no --iterations or --duration given; running until the violation limit or interrupted");
    }

    let result = Harness::new(config).and_then(|harness| harness.run());
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            error!(%err, "run failed");
            process::exit(exit_code(&err));
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{out}"),
            Err(err) => {
                error!(%err, "failed to encode report");
                process::exit(1);
            }
        }
    } else {
        println!("{report}");
    }
    process::exit(report.outcome.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "stripebench",
            "--units",
            "1024",
            "--stripes",
            "16",
            "--iterations",
            "100",
            "--lock",
            "spin",
            "--seed",
            "0x10",
            "--duration",
            "0.5",
        ]);
        let (config, json) = args.into_config().unwrap();
        assert!(!json);
        assert_eq!(config.unit_count, 1024);
        assert_eq!(config.stripe_count, 16);
        assert_eq!(config.max_iterations, Some(100));
        assert_eq!(config.lock_kind, LockKind::Spin);
        assert_eq!(config.seed, 16);
        assert_eq!(config.run_duration, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_invalid_flags_fail_validation() {
        let args = Args::parse_from(["stripebench", "--stripes", "1000"]);
        let err = args.into_config().unwrap_err();
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_seed("3735928559").unwrap(), 0xdead_beef);
        assert_eq!(parse_seed("0xDEADBEEF").unwrap(), 0xdead_beef);
        assert!(parse_seed("zz").is_err());
        assert_eq!(parse_secs("2").unwrap(), Duration::from_secs(2));
        assert!(parse_secs("-1").is_err());
    }

    #[test]
    fn test_panic_exit_code() {
        assert_eq!(exit_code(&BenchError::worker_panicked(2)), 3);
    }
}
