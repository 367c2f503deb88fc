//! Reader loop: verify the invariant under the stripe lock.

use tracing::{debug, info, warn};

use super::{IntervalDetail, IntervalReport, Role, WorkerContext, WorkerReport, WorkerState};
use crate::core::FastRand;
use crate::metrics::{rate, ThroughputWindow, ViolationRecord};
use crate::sync::StripeMutex;

/// Run the reader role until a stop condition fires.
pub fn run_reader<M: StripeMutex>(ctx: &WorkerContext<'_, M>) -> WorkerReport {
    let mut rng = FastRand::for_thread(ctx.seed, ctx.tid);
    let mask = ctx.shared.units().mask();
    let mut window = ThroughputWindow::new(ctx.clock, ctx.report_interval);
    let mut intervals = Vec::new();
    let mut sum: i64 = 0;
    let mut violations: u64 = 0;

    let stop_reason = loop {
        if let WorkerState::Stopped(reason) = ctx.next_state(window.total()) {
            break reason;
        }

        let index = rng.next_masked(mask);
        let snapshot = ctx.shared.read(index);
        sum = sum.wrapping_add(snapshot.sum());

        if !snapshot.is_consistent() {
            violations += 1;
            let record = ViolationRecord {
                tid: ctx.tid,
                unit_index: index,
                snapshot,
            };
            if violations == 1 {
                warn!(tid = ctx.tid, error = %record.to_error(), "first invariant violation");
            } else {
                debug!(tid = ctx.tid, unit = index, a = snapshot.a, b = snapshot.b, "invariant violated");
            }
            if ctx.monitor.record(record) {
                warn!(tid = ctx.tid, total = ctx.monitor.total(), "violation limit reached, stopping run");
                ctx.shutdown.trigger();
            }
        }

        if let Some(throughput) = window.record_iteration() {
            info!(
                tid = ctx.tid,
                role = %Role::Reader,
                mops = throughput.mops(),
                sum,
                "interval"
            );
            intervals.push(IntervalReport {
                sequence: window.windows() - 1,
                throughput,
                detail: IntervalDetail::Sum(sum),
            });
        }
    };

    let elapsed = window.elapsed();
    debug!(tid = ctx.tid, iterations = window.total(), ?stop_reason, "reader stopped");

    WorkerReport {
        tid: ctx.tid,
        role: Role::Reader,
        iterations: window.total(),
        elapsed,
        mean_ops_per_sec: rate(window.total(), elapsed),
        violations,
        stop_reason,
        intervals,
        final_sum: Some(sum),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::SharedState;
    use crate::metrics::{InvariantMonitor, ManualClock, ViolationPolicy};
    use crate::sync::{ParkingMutex, ShutdownSignal};
    use crate::worker::{RunBudget, StopReason};
    use std::time::Duration;

    #[test]
    fn test_reader_alone_sees_no_violations() {
        let shared: SharedState<ParkingMutex> = SharedState::new(64, 8, 3).unwrap();
        let clock = ManualClock::ticking(Duration::from_millis(1));
        let shutdown = ShutdownSignal::new();
        let monitor = InvariantMonitor::new(ViolationPolicy::Warn);
        let ctx = WorkerContext {
            tid: 1,
            shared: &shared,
            clock: &clock,
            shutdown: &shutdown,
            monitor: &monitor,
            budget: RunBudget::iterations(1000),
            report_interval: 100,
            seed: 0xdead_beef,
        };

        let report = run_reader(&ctx);
        assert_eq!(report.iterations, 1000);
        assert_eq!(report.violations, 0);
        assert_eq!(report.intervals.len(), 10);
        assert_eq!(report.stop_reason, StopReason::IterationBudget);
        assert_eq!(
            report.intervals.last().map(|r| r.detail),
            Some(IntervalDetail::Sum(report.final_sum.unwrap()))
        );
        assert_eq!(monitor.total(), 0);
    }

    #[test]
    fn test_reader_sum_is_deterministic() {
        let run = || {
            let shared: SharedState<ParkingMutex> = SharedState::new(64, 8, 3).unwrap();
            let clock = ManualClock::new();
            let shutdown = ShutdownSignal::new();
            let monitor = InvariantMonitor::default();
            let ctx = WorkerContext {
                tid: 2,
                shared: &shared,
                clock: &clock,
                shutdown: &shutdown,
                monitor: &monitor,
                budget: RunBudget::iterations(500),
                report_interval: 1000,
                seed: 7,
            };
            run_reader(&ctx).final_sum
        };
        assert_eq!(run(), run());
    }
}
