//! Explore command implementation

use super::coordinator::{build_scheduler, coordinate, market_set, Synthesis};
use crate::config::Config;
use crate::scheduler::RandomTasks;
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ExploreArgs {
    /// Worker threads, overriding `engine.workers`
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// RNG seed, overriding `explore.seed`
    #[arg(long)]
    pub seed: Option<u64>,

    /// Ignore results already in the result store
    #[arg(long)]
    pub no_resume: bool,
}

impl ExploreArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut scheduler = build_scheduler(config, !self.no_resume)?;

        let mut explore = config.explore.clone();
        if self.seed.is_some() {
            explore.seed = self.seed;
        }
        tracing::info!(seed = ?explore.seed, target = explore.target_in_flight, "Starting exploration");

        let mut source = RandomTasks::new(
            explore.clone(),
            market_set(config),
            scheduler.simulator().policies(),
        )?;

        scheduler.start(self.workers.unwrap_or(config.engine.workers).max(1))?;
        let synthesis = Synthesis {
            source: &mut source,
            target_in_flight: explore.target_in_flight,
            max_attempts: explore.max_duplicate_attempts,
            refill_interval: Duration::from_millis(explore.refill_interval_ms.max(1)),
        };
        coordinate(&mut scheduler, config, Some(synthesis)).await
    }
}
