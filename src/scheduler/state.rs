//! State shared between the coordinator and the worker pool

use crate::backtest::{Fingerprint, Task, TaskOutcome, TieBreaker};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Task waiting for a worker, with its precomputed fingerprint
#[derive(Debug, Clone)]
pub(crate) struct QueuedTask {
    pub task: Task,
    pub fingerprint: Fingerprint,
}

/// Outcome stamped with its completion tie-breaker
#[derive(Debug, Clone)]
pub(crate) struct FinishedTask {
    pub outcome: TaskOutcome,
    pub salt: u64,
}

/// Everything guarded by the single work lock
#[derive(Debug, Default)]
pub(crate) struct WorkState {
    pub queue: VecDeque<QueuedTask>,
    pub done: Vec<FinishedTask>,
    pub seen: HashSet<Fingerprint>,
    pub active_workers: usize,
    /// No more tasks will be submitted; idle workers exit
    pub closed: bool,
}

/// Monotonic progress counters, readable without the lock
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub queued: AtomicU64,
    pub duplicates: AtomicU64,
    pub invalid: AtomicU64,
    pub started: AtomicU64,
    pub done: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct SharedState {
    work: Mutex<WorkState>,
    available: Condvar,
    pub counters: Counters,
    /// Salts for completed and reloaded results, one sequence per process
    pub tie_breaker: TieBreaker,
}

impl SharedState {
    /// Lock the work state. A worker that panicked mid-simulation never holds
    /// the lock, so a poisoned guard is still consistent.
    pub fn lock(&self) -> MutexGuard<'_, WorkState> {
        self.work.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a task is available or the queue is closed and drained
    pub fn next_task(&self) -> Option<QueuedTask> {
        let mut work = self.lock();
        loop {
            if let Some(task) = work.queue.pop_front() {
                return Some(task);
            }
            if work.closed {
                return None;
            }
            work = self
                .available
                .wait(work)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn notify_one(&self) {
        self.available.notify_one();
    }

    pub fn notify_all(&self) {
        self.available.notify_all();
    }
}

/// Decrements the active worker count when a worker exits, even by panic
pub(crate) struct ActiveWorker<'a> {
    shared: &'a SharedState,
}

impl<'a> ActiveWorker<'a> {
    pub fn new(shared: &'a SharedState) -> Self {
        Self { shared }
    }
}

impl Drop for ActiveWorker<'_> {
    fn drop(&mut self) {
        let mut work = self.shared.lock();
        work.active_workers = work.active_workers.saturating_sub(1);
    }
}
