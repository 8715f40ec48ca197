//! Shared setup and the async coordinator loop for `run` and `explore`

use crate::allocation::PolicyRegistry;
use crate::backtest::{MarketSet, Simulator};
use crate::config::Config;
use crate::data::{PriceStore, ResultStore, Variant};
use crate::scheduler::{Refill, Scheduler, SchedulerOptions, TaskSource};
use std::time::Duration;

/// How often the coordinator checks whether the pool has drained
const FINISH_POLL: Duration = Duration::from_millis(200);

/// Load candles, build the simulator and scheduler, and resume from the
/// result store unless told otherwise
pub(crate) fn build_scheduler(config: &Config, resume: bool) -> anyhow::Result<Scheduler> {
    let prices = PriceStore::load(&config.data);
    if prices.is_empty() {
        tracing::warn!(dir = ?config.data.candles_dir, "No candle series loaded");
    } else {
        tracing::info!(markets = prices.len(), "Candle series loaded");
    }

    let variants: Vec<Variant> = config.data.variants.iter().map(Variant::from).collect();
    let simulator = Simulator::new(
        config.simulation.clone(),
        prices,
        variants,
        PolicyRegistry::standard(),
    );

    let store = ResultStore::new(&config.engine.results_path);
    let mut scheduler = Scheduler::new(
        simulator,
        SchedulerOptions::from(&config.engine),
        Some(store),
    );
    if resume {
        scheduler.resume()?;
    }
    Ok(scheduler)
}

/// Base currency plus every configured quote
pub(crate) fn market_set(config: &Config) -> MarketSet {
    MarketSet::new(config.simulation.base_currency.clone(), config.quotes())
}

/// Random synthesis state for exploration runs
pub(crate) struct Synthesis<'a> {
    pub source: &'a mut dyn TaskSource,
    pub target_in_flight: usize,
    pub max_attempts: usize,
    pub refill_interval: Duration,
}

/// Harvest, report and refill until the pool drains, then flush once more.
///
/// Ctrl-C closes the queue and drops queued tasks; running tasks finish.
pub(crate) async fn coordinate(
    scheduler: &mut Scheduler,
    config: &Config,
    mut synthesis: Option<Synthesis<'_>>,
) -> anyhow::Result<()> {
    let mut harvest_interval =
        tokio::time::interval(Duration::from_secs(config.engine.harvest_interval_secs.max(1)));
    let refill_period = synthesis
        .as_ref()
        .map(|s| s.refill_interval)
        .unwrap_or(Duration::from_secs(1));
    let mut refill_interval = tokio::time::interval(refill_period);
    let mut finish_poll = tokio::time::interval(FINISH_POLL);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = harvest_interval.tick() => {
                harvest(scheduler, config.engine.print_count);
            }

            _ = refill_interval.tick(), if synthesis.is_some() => {
                if let Some(s) = synthesis.as_mut() {
                    let refill = scheduler.refill(&mut *s.source, s.target_in_flight, s.max_attempts);
                    if let Refill::Exhausted { queued } = refill {
                        tracing::info!(
                            queued,
                            attempts = s.max_attempts,
                            "Task synthesis exhausted, draining queue"
                        );
                        scheduler.close();
                        synthesis = None;
                    }
                }
            }

            _ = finish_poll.tick() => {
                if scheduler.is_finished() {
                    break;
                }
            }

            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Failed to listen for shutdown signal");
                    continue;
                }
                let dropped = scheduler.cancel_queued();
                scheduler.close();
                synthesis = None;
                tracing::info!(dropped, "Received shutdown signal, waiting for running tasks");
            }
        }
    }

    scheduler.join();
    let report = harvest(scheduler, config.engine.print_count);
    if report.pending > 0 {
        anyhow::bail!(
            "{} results could not be written to {}",
            report.pending,
            config.engine.results_path.display()
        );
    }

    println!("{}", scheduler.leaderboards().format_table(config.engine.print_count));
    tracing::info!(status = %scheduler.status(), "Sweep finished");
    Ok(())
}

fn harvest(scheduler: &mut Scheduler, print_count: usize) -> crate::scheduler::HarvestReport {
    // file I/O and leaderboard work stay off the async worker
    let report = tokio::task::block_in_place(|| scheduler.harvest());
    tracing::info!(
        status = %scheduler.status(),
        new_results = report.accepted,
        discarded = report.discarded,
        persisted = report.persisted,
        "Harvest"
    );
    if report.accepted > 0 {
        for board in scheduler.leaderboards().iter() {
            for (rank, (_, record)) in board.top(print_count).into_iter().enumerate() {
                tracing::info!(
                    board = board.kind().label(),
                    rank = rank + 1,
                    result = %record.summary(),
                    "Leader"
                );
            }
        }
    }
    report
}
