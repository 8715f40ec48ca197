//! Work scheduler
//!
//! Owns the task queue and the worker pool. Tasks are deduplicated by
//! fingerprint on submission, simulated by OS worker threads, and harvested
//! periodically into bounded leaderboards and the append-only result store.

mod generator;
mod leaderboard;
mod state;
mod worker;

pub use generator::{grid_tasks, GeneratorError, RandomTasks, TaskSource};
pub use leaderboard::{Leaderboard, Leaderboards};

use crate::backtest::{Fingerprint, ScoreKind, ScoreRecord, Simulator, Task, TaskError};
use crate::config::EngineConfig;
use crate::data::{ResultStore, ResultStoreError};
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use rust_decimal::prelude::ToPrimitive;
use state::{Counters, FinishedTask, QueuedTask, SharedState};
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Scheduler behaviour switches
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub prevent_duplicates: bool,
    pub discard_non_positive: bool,
    pub leaderboard_size: usize,
}

impl From<&EngineConfig> for SchedulerOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            prevent_duplicates: config.prevent_duplicates,
            discard_non_positive: config.discard_non_positive,
            leaderboard_size: config.leaderboard_size,
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// What happened to a submitted task
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued(Fingerprint),
    Duplicate(Fingerprint),
    Invalid(TaskError),
}

/// Result of topping up the queue from a [`TaskSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refill {
    /// Queue reached its target depth
    Filled { queued: usize },
    /// Too many consecutive duplicate or invalid draws
    Exhausted { queued: usize },
}

/// Summary of one harvest
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    /// Outcomes drained from the completed set
    pub processed: usize,
    /// Outcomes ranked and queued for persistence
    pub accepted: usize,
    /// Outcomes without a score or with a non-positive one
    pub discarded: usize,
    /// Records written to the result store
    pub persisted: usize,
    /// Records still waiting for a successful write
    pub pending: usize,
}

/// Progress snapshot for the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub done: u64,
    /// `None` while the queue still accepts new work
    pub total: Option<u64>,
    pub active_workers: usize,
    pub queued: usize,
    pub duplicates: u64,
    pub invalid: u64,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => {
                let pct = if total == 0 {
                    100.0
                } else {
                    self.done as f64 * 100.0 / total as f64
                };
                write!(f, "{} of {} ({:.1}%)", self.done, total, pct)?;
            }
            None => write!(f, "{} of unbounded", self.done)?,
        }
        write!(
            f,
            ", {} workers active, {} queued, {} duplicates, {} invalid",
            self.active_workers, self.queued, self.duplicates, self.invalid
        )
    }
}

/// Work queue, worker pool and result bookkeeping
pub struct Scheduler {
    shared: Arc<SharedState>,
    simulator: Simulator,
    options: SchedulerOptions,
    workers: Vec<JoinHandle<()>>,
    leaderboards: Leaderboards,
    store: Option<ResultStore>,
    pending: Vec<ScoreRecord>,
}

impl Scheduler {
    pub fn new(simulator: Simulator, options: SchedulerOptions, store: Option<ResultStore>) -> Self {
        Self {
            shared: Arc::new(SharedState::default()),
            simulator,
            leaderboards: Leaderboards::new(options.leaderboard_size),
            options,
            workers: Vec::new(),
            store,
            pending: Vec::new(),
        }
    }

    /// Load the result store and seed fingerprints and leaderboards from it.
    /// A corrupt store is fatal to the caller.
    pub fn resume(&mut self) -> Result<usize, ResultStoreError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let records = store.load()?;
        let count = records.len();
        tracing::info!(count, path = ?store.path(), "Resuming from result store");
        self.seed(records);
        Ok(count)
    }

    /// Treat already-scored records as seen and ranked
    pub fn seed(&mut self, records: impl IntoIterator<Item = ScoreRecord>) {
        let mut work = self.shared.lock();
        for record in records {
            work.seen.insert(record.fingerprint);
            self.leaderboards.insert(record, self.shared.tie_breaker.salt());
        }
    }

    /// Validate, deduplicate and enqueue a task
    pub fn submit(&self, task: Task) -> SubmitOutcome {
        if let Err(e) = task.validate(self.simulator.policies()) {
            Counters::bump(&self.shared.counters.invalid);
            telemetry::increment(CounterMetric::TasksInvalid, 1);
            tracing::debug!(error = %e, "Rejected invalid task");
            return SubmitOutcome::Invalid(e);
        }

        let fingerprint = task.fingerprint(self.simulator.config());
        {
            let mut work = self.shared.lock();
            if !work.seen.insert(fingerprint) && self.options.prevent_duplicates {
                drop(work);
                Counters::bump(&self.shared.counters.duplicates);
                telemetry::increment(CounterMetric::TasksDuplicate, 1);
                return SubmitOutcome::Duplicate(fingerprint);
            }
            work.queue.push_back(QueuedTask { task, fingerprint });
        }
        self.shared.notify_one();

        Counters::bump(&self.shared.counters.queued);
        telemetry::increment(CounterMetric::TasksQueued, 1);
        SubmitOutcome::Queued(fingerprint)
    }

    /// Submit tasks from `source` until the queue holds `target` tasks, or
    /// until `max_attempts` draws in a row are rejected
    pub fn refill(&self, source: &mut dyn TaskSource, target: usize, max_attempts: usize) -> Refill {
        let mut queued = 0;
        let mut rejected_in_row = 0;

        while self.queue_len() < target {
            match self.submit(source.next_task()) {
                SubmitOutcome::Queued(_) => {
                    queued += 1;
                    rejected_in_row = 0;
                }
                SubmitOutcome::Duplicate(_) | SubmitOutcome::Invalid(_) => {
                    rejected_in_row += 1;
                    if rejected_in_row >= max_attempts {
                        return Refill::Exhausted { queued };
                    }
                }
            }
        }
        Refill::Filled { queued }
    }

    /// Spawn `count` worker threads
    pub fn start(&mut self, count: usize) -> std::io::Result<()> {
        for _ in 0..count {
            let id = self.workers.len();
            let shared = Arc::clone(&self.shared);
            let simulator = self.simulator.clone();

            self.shared.lock().active_workers += 1;
            let spawned = std::thread::Builder::new()
                .name(format!("sim-worker-{id}"))
                .spawn(move || worker::run(id, shared, simulator));

            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    self.shared.lock().active_workers -= 1;
                    return Err(e);
                }
            }
        }
        tracing::info!(workers = self.workers.len(), "Worker pool started");
        Ok(())
    }

    /// Stop accepting work; workers exit once the queue drains
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.notify_all();
    }

    /// Drop tasks that have not started yet. Running tasks are not interrupted.
    pub fn cancel_queued(&self) -> usize {
        let mut work = self.shared.lock();
        let dropped = work.queue.len();
        work.queue.clear();
        dropped
    }

    /// Queue closed and every worker has exited
    pub fn is_finished(&self) -> bool {
        let work = self.shared.lock();
        work.closed && work.active_workers == 0
    }

    pub fn queue_len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn status(&self) -> Status {
        let (active_workers, queued, closed) = {
            let work = self.shared.lock();
            (work.active_workers, work.queue.len(), work.closed)
        };
        let counters = &self.shared.counters;

        telemetry::set_gauge(GaugeMetric::ActiveWorkers, active_workers as f64);
        telemetry::set_gauge(GaugeMetric::QueueDepth, queued as f64);

        Status {
            done: Counters::read(&counters.done),
            total: closed.then(|| Counters::read(&counters.queued)),
            active_workers,
            queued,
            duplicates: Counters::read(&counters.duplicates),
            invalid: Counters::read(&counters.invalid),
        }
    }

    /// Drain finished outcomes, rank them and persist what is new
    pub fn harvest(&mut self) -> HarvestReport {
        let finished = std::mem::take(&mut self.shared.lock().done);
        let mut report = HarvestReport {
            processed: finished.len(),
            ..HarvestReport::default()
        };

        for FinishedTask { outcome, salt } in finished {
            let scores = outcome.normalized();
            if outcome.scored_variants == 0
                || (self.options.discard_non_positive && !scores.all_positive())
            {
                report.discarded += 1;
                telemetry::increment(CounterMetric::ResultsDiscarded, 1);
                continue;
            }

            let record = ScoreRecord {
                fingerprint: outcome.fingerprint,
                scores,
                encoding: outcome.encoding,
            };
            tracing::debug!(result = %record.summary(), "Harvested result");

            self.pending.push(record.clone());
            self.leaderboards.insert(record, salt);
            report.accepted += 1;
        }

        report.persisted = self.flush();
        report.pending = self.pending.len();

        if let Some(best) = self.leaderboards.board(ScoreKind::TimeWeighted).best() {
            if let Some(value) = best.scores.time_weighted.to_f64() {
                telemetry::set_gauge(GaugeMetric::BestScore, value);
            }
        }
        report
    }

    /// Append pending records; on failure they stay pending for the next try
    fn flush(&mut self) -> usize {
        let Some(store) = &self.store else {
            self.pending.clear();
            return 0;
        };
        if self.pending.is_empty() {
            return 0;
        }

        match store.append(&self.pending) {
            Ok(()) => {
                let written = self.pending.len();
                self.pending.clear();
                telemetry::increment(CounterMetric::ResultsPersisted, written as u64);
                written
            }
            Err(e) => {
                let written = ResultStore::written_before(&e);
                self.pending.drain(..written);
                tracing::warn!(
                    error = %e,
                    pending = self.pending.len(),
                    "Result store write failed, will retry"
                );
                written
            }
        }
    }

    /// Join worker threads that have exited
    pub fn join(&mut self) {
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().map(str::to_string);
            if handle.join().is_err() {
                tracing::error!(worker = ?name, "Worker panicked");
            }
        }
    }

    pub fn leaderboards(&self) -> &Leaderboards {
        &self.leaderboards
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }
}
