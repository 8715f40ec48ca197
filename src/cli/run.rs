//! Run command implementation

use super::coordinator::{build_scheduler, coordinate, market_set};
use crate::config::Config;
use crate::scheduler::{grid_tasks, SubmitOutcome};
use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Worker threads, overriding `engine.workers`
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Ignore results already in the result store
    #[arg(long)]
    pub no_resume: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut scheduler = build_scheduler(config, !self.no_resume)?;
        let markets = market_set(config);
        let tasks = grid_tasks(&config.grid, &markets, scheduler.simulator().policies())?;

        let total = tasks.len();
        let mut queued = 0usize;
        for task in tasks {
            if let SubmitOutcome::Queued(_) = scheduler.submit(task) {
                queued += 1;
            }
        }
        scheduler.close();
        tracing::info!(total, queued, markets = %markets.encode(), "Grid submitted");

        scheduler.start(self.workers.unwrap_or(config.engine.workers).max(1))?;
        coordinate(&mut scheduler, config, None).await
    }
}
