//! End-to-end runs of the benchmark harness.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use stripebench::core::{UnitSnapshot, UnitStore};
use stripebench::metrics::ManualClock;
use stripebench::prelude::*;
use stripebench::sync::{NoLock, ParkingMutex, SpinLock};
use stripebench::worker::IntervalDetail;

#[test]
fn test_invalid_config_fails_before_threads() {
    let config = BenchConfig {
        stripe_count: 1000,
        ..BenchConfig::default()
    };
    let err = Harness::new(config).unwrap_err();
    assert!(matches!(
        err,
        BenchError::NotPowerOfTwo {
            name: "stripe_count",
            value: 1000
        }
    ));
    assert!(err.is_config_error());
}

#[test]
fn test_stripe_mapping_congruence() {
    let table: StripeTable = StripeTable::new(1024, 16).unwrap();
    for i in 0..1024 {
        for k in 0..(1024 - i) / 16 {
            let j = i + k * 16;
            assert!(std::ptr::eq(table.lock_for(i), table.lock_for(j)));
        }
    }
}

#[test]
fn test_single_writer_n_increments() {
    let units = UnitStore::from_fn(16, |_| 1_000).unwrap();
    let shared: SharedState<ParkingMutex> = SharedState::from_units(units, 4).unwrap();
    let n = 123_456;
    for _ in 0..n {
        shared.increment(9);
    }
    assert_eq!(
        shared.read(9),
        UnitSnapshot {
            a: 1_000 + n,
            b: 1_001 + n
        }
    );
    assert_eq!(shared.units().count_inconsistent(), 0);
}

#[test]
fn test_writer_only_run_counts_every_increment() {
    let config = BenchConfigBuilder::new()
        .unit_count(16)
        .stripe_count(4)
        .thread_count(1)
        .max_iterations(50_000)
        .build()
        .unwrap();
    let harness = Harness::new(config).unwrap();
    let units = UnitStore::from_fn(16, |_| 0).unwrap();
    let shared: SharedState<SpinLock> = SharedState::from_units(units, 4).unwrap();

    let report = harness
        .run_on(&shared, &ShutdownSignal::new())
        .unwrap();
    assert_eq!(report.workers.len(), 1);
    assert_eq!(report.workers[0].role, Role::Writer);

    let total: i64 = (0..16).map(|i| shared.read(i).a).sum();
    assert_eq!(total, 50_000);
    assert_eq!(shared.units().count_inconsistent(), 0);
}

#[test]
fn test_locked_run_has_no_violations() {
    for kind in [LockKind::Parking, LockKind::Spin] {
        let config = BenchConfigBuilder::new()
            .unit_count(1024)
            .stripe_count(16)
            .max_iterations(1_000_000)
            .report_interval_iters(250_000)
            .lock_kind(kind)
            .build()
            .unwrap();
        let report = Harness::new(config).unwrap().run().unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed, "{kind}");
        assert_eq!(report.total_iterations, 4_000_000, "{kind}");
        assert_eq!(report.total_violations, 0, "{kind}");
        assert_eq!(report.first_violation, None, "{kind}");
        assert_eq!(report.inconsistent_units, 0, "{kind}");
        for worker in report.workers_with_role(Role::Reader) {
            assert_eq!(worker.violations, 0);
            assert_eq!(worker.intervals.len(), 4);
        }
    }
}

#[test]
fn test_unprotected_run_detects_violations() {
    let config = BenchConfigBuilder::new()
        .unit_count(1)
        .stripe_count(1)
        .lock_kind(LockKind::None)
        .run_duration(Duration::from_secs(20))
        .max_violations(1)
        .build()
        .unwrap();
    let report = Harness::new(config).unwrap().run().unwrap();

    assert!(report.total_violations >= 1);
    assert_eq!(report.outcome, RunOutcome::ViolationLimitExceeded);
    assert_eq!(report.outcome.exit_code(), 2);
    let first = report.first_violation.unwrap();
    assert_eq!(first.unit_index, 0);
    assert!(!first.snapshot.is_consistent());
    assert!(report
        .workers
        .iter()
        .all(|w| w.stop_reason == StopReason::ViolationLimit));
}

#[test]
fn test_unprotected_warn_policy_keeps_running() {
    let units = UnitStore::from_fn(1, |_| 0).unwrap();
    let shared: SharedState<NoLock> = SharedState::from_units(units, 1).unwrap();
    let config = BenchConfigBuilder::new()
        .unit_count(1)
        .stripe_count(1)
        .lock_kind(LockKind::None)
        .max_iterations(200_000)
        .build()
        .unwrap();
    let report = Harness::new(config)
        .unwrap()
        .run_on(&shared, &ShutdownSignal::new())
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.total_iterations, 800_000);
    assert_eq!(shared.read(0).a, 200_000);
}

#[test]
fn test_shutdown_stops_workers_and_frees_locks() {
    let config = BenchConfigBuilder::new()
        .unit_count(1024)
        .stripe_count(16)
        .report_interval_iters(100_000)
        .build()
        .unwrap();
    let harness = Harness::new(config).unwrap();
    let shared: SharedState = SharedState::new(1024, 16, 1).unwrap();
    let signal = ShutdownSignal::new();
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        let (harness, shared, worker_signal) = (&harness, &shared, &signal);
        scope.spawn(move || {
            let report = harness.run_on(shared, worker_signal);
            let _ = tx.send(report);
        });

        thread::sleep(Duration::from_millis(100));
        signal.trigger();

        let report = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("workers did not stop after shutdown")
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Interrupted);
        assert!(report
            .workers
            .iter()
            .all(|w| w.stop_reason == StopReason::Shutdown));
    });

    assert!(!shared.stripes().any_locked());
    assert!(shared.stripes().iter().all(|lock| lock.try_lock().is_some()));
    assert_eq!(shared.units().count_inconsistent(), 0);
}

#[test]
fn test_deadline_stops_run() {
    let config = BenchConfigBuilder::new()
        .unit_count(256)
        .stripe_count(16)
        .run_duration(Duration::from_millis(200))
        .build()
        .unwrap();
    let report = Harness::new(config).unwrap().run().unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(report
        .workers
        .iter()
        .all(|w| w.stop_reason == StopReason::Deadline));
    assert!(report.total_iterations > 0);
}

#[test]
fn test_synthetic_clock_reports() {
    let config = BenchConfigBuilder::new()
        .unit_count(64)
        .stripe_count(8)
        .thread_count(2)
        .max_iterations(3_000)
        .report_interval_iters(1_000)
        .build()
        .unwrap();
    let report = Harness::new(config)
        .unwrap()
        .with_clock(ManualClock::ticking(Duration::from_millis(250)))
        .run()
        .unwrap();

    for worker in &report.workers {
        assert_eq!(worker.intervals.len(), 3);
        for (seq, interval) in worker.intervals.iter().enumerate() {
            assert_eq!(interval.sequence, seq as u64);
            assert_eq!(interval.throughput.iterations, 1_000);
            let secs = interval.throughput.elapsed.as_secs_f64();
            assert!(secs > 0.0);
            assert!((interval.throughput.ops_per_sec - 1_000.0 / secs).abs() < 1e-6);
        }
        match worker.role {
            Role::Reader => assert!(matches!(worker.intervals[0].detail, IntervalDetail::Sum(_))),
            Role::Writer => assert!(matches!(
                worker.intervals[0].detail,
                IntervalDetail::Sample { .. }
            )),
        }
    }
}

#[test]
fn test_multiple_writers() {
    let config = BenchConfigBuilder::new()
        .unit_count(512)
        .stripe_count(32)
        .thread_count(6)
        .writer_count(3)
        .max_iterations(100_000)
        .build()
        .unwrap();
    let harness = Harness::new(config).unwrap();
    let units = UnitStore::from_fn(512, |_| 0).unwrap();
    let shared: SharedState = SharedState::from_units(units, 32).unwrap();
    let report = harness.run_on(&shared, &ShutdownSignal::new()).unwrap();

    assert_eq!(report.workers_with_role(Role::Writer).count(), 3);
    assert_eq!(report.total_violations, 0);
    let total: i64 = (0..512).map(|i| shared.read(i).a).sum();
    assert_eq!(total, 300_000);
}

/// Wall clock that panics when read from one named worker thread.
struct FailingClock {
    inner: SystemClock,
    thread_name: &'static str,
}

impl Clock for FailingClock {
    fn now(&self) -> Duration {
        if thread::current().name() == Some(self.thread_name) {
            panic!("clock read failed on {}", self.thread_name);
        }
        self.inner.now()
    }
}

#[test]
fn test_worker_panic_stops_siblings() {
    let config = BenchConfigBuilder::new()
        .unit_count(1024)
        .stripe_count(16)
        .report_interval_iters(100_000)
        .build()
        .unwrap();
    assert!(!config.is_bounded());
    let harness = Harness::new(config).unwrap().with_clock(FailingClock {
        inner: SystemClock::new(),
        thread_name: "reader-2",
    });
    let signal = ShutdownSignal::new();
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        let (harness, worker_signal) = (&harness, &signal);
        scope.spawn(move || {
            let _ = tx.send(harness.run_with_shutdown(worker_signal));
        });

        let result = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("siblings kept running after a worker panicked");
        assert!(matches!(result, Err(BenchError::WorkerPanicked { tid: 2 })));
    });
    assert!(signal.is_triggered());
}

#[test]
fn test_harness_runs_twice() {
    let config = BenchConfigBuilder::new()
        .unit_count(256)
        .stripe_count(16)
        .max_iterations(10_000)
        .build()
        .unwrap();
    let harness = Harness::new(config).unwrap();

    let first = harness.run().unwrap();
    let second = harness.run().unwrap();
    for report in [&first, &second] {
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.total_iterations, 40_000);
        assert!(report
            .workers
            .iter()
            .all(|w| w.stop_reason == StopReason::IterationBudget));
    }
}

#[test]
fn test_thread_count_above_limit_rejected() {
    let config = BenchConfig {
        thread_count: usize::MAX,
        ..BenchConfig::default()
    };
    let err = Harness::new(config).unwrap_err();
    assert!(matches!(err, BenchError::InvalidConfig { .. }));
    assert!(err.is_config_error());

    let err = BenchConfigBuilder::new()
        .unit_count(1024)
        .stripe_count(16)
        .thread_count(stripebench::config::MAX_THREAD_COUNT + 1)
        .build()
        .unwrap_err();
    assert!(err.is_config_error());
}
