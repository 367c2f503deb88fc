//! Writer loop: increment units under the stripe lock.

use tracing::{debug, info};

use super::{IntervalDetail, IntervalReport, Role, WorkerContext, WorkerReport, WorkerState};
use crate::core::FastRand;
use crate::metrics::{rate, ThroughputWindow};
use crate::sync::StripeMutex;

/// Run the writer role until a stop condition fires.
pub fn run_writer<M: StripeMutex>(ctx: &WorkerContext<'_, M>) -> WorkerReport {
    let mut rng = FastRand::for_thread(ctx.seed, ctx.tid);
    let mask = ctx.shared.units().mask();
    let mut window = ThroughputWindow::new(ctx.clock, ctx.report_interval);
    let mut intervals = Vec::new();

    let stop_reason = loop {
        if let WorkerState::Stopped(reason) = ctx.next_state(window.total()) {
            break reason;
        }

        let index = rng.next_masked(mask);
        ctx.shared.increment(index);

        if let Some(throughput) = window.record_iteration() {
            let unit_index = rng.next_masked(mask);
            let snapshot = ctx.shared.read(unit_index);
            info!(
                tid = ctx.tid,
                role = %Role::Writer,
                mops = throughput.mops(),
                unit = unit_index,
                a = snapshot.a,
                b = snapshot.b,
                "interval"
            );
            intervals.push(IntervalReport {
                sequence: window.windows() - 1,
                throughput,
                detail: IntervalDetail::Sample {
                    unit_index,
                    snapshot,
                },
            });
        }
    };

    let elapsed = window.elapsed();
    debug!(tid = ctx.tid, iterations = window.total(), ?stop_reason, "writer stopped");

    WorkerReport {
        tid: ctx.tid,
        role: Role::Writer,
        iterations: window.total(),
        elapsed,
        mean_ops_per_sec: rate(window.total(), elapsed),
        violations: 0,
        stop_reason,
        intervals,
        final_sum: None,
    }
}
