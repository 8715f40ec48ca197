//! Worker thread loop

use super::state::{ActiveWorker, Counters, FinishedTask, QueuedTask, SharedState};
use crate::backtest::{ScoreSet, Simulator, TaskOutcome};
use crate::telemetry::{self, CounterMetric};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Pull tasks until the queue is closed and drained.
///
/// The lock is held only to pop a task and to push its outcome; the
/// simulation itself runs unlocked. A panicking task is recorded without a
/// score and the worker moves on.
pub(crate) fn run(id: usize, shared: Arc<SharedState>, simulator: Simulator) {
    let _active = ActiveWorker::new(&shared);
    tracing::debug!(worker = id, "Worker started");

    while let Some(queued) = shared.next_task() {
        Counters::bump(&shared.counters.started);
        telemetry::increment(CounterMetric::TasksStarted, 1);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            simulator.run_task(&queued.task, queued.fingerprint)
        }))
        .unwrap_or_else(|payload| unscored(id, &queued, &simulator, payload.as_ref()));
        tracing::trace!(
            worker = id,
            task = %outcome.encoding,
            scored = outcome.scored_variants,
            "Task finished"
        );

        let mut work = shared.lock();
        let salt = shared.tie_breaker.salt();
        work.done.push(FinishedTask { outcome, salt });
        Counters::bump(&shared.counters.done);
        drop(work);
        telemetry::increment(CounterMetric::TasksCompleted, 1);
    }

    tracing::debug!(worker = id, "Worker exiting");
}

fn unscored(
    id: usize,
    queued: &QueuedTask,
    simulator: &Simulator,
    payload: &(dyn Any + Send),
) -> TaskOutcome {
    let encoding = queued.task.encode(simulator.policies());
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(worker = id, task = %encoding, panic = %message, "Task panicked");
    telemetry::increment(CounterMetric::VariantsAborted, simulator.variants().len() as u64);

    TaskOutcome {
        fingerprint: queued.fingerprint,
        encoding,
        totals: ScoreSet::default(),
        scored_variants: 0,
        variants: simulator.variants().len(),
    }
}
