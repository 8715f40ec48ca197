//! CLI interface for candle-sweep
//!
//! Provides subcommands for:
//! - `run`: Simulate the configured task grid
//! - `explore`: Simulate randomly generated tasks until interrupted
//! - `scores`: Print the best stored results
//! - `config`: Print the effective configuration

mod coordinator;
mod explore;
mod run;
mod scores;

pub use explore::ExploreArgs;
pub use run::RunArgs;
pub use scores::{ScoresArgs, ScoresFormat};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "candle-sweep")]
#[command(about = "Backtest and rank indicator-driven allocation strategies over historical candles")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate every task in the configured grid
    Run(RunArgs),
    /// Simulate random tasks until synthesis runs dry or Ctrl-C
    Explore(ExploreArgs),
    /// Print top results from the result store
    Scores(ScoresArgs),
    /// Show effective configuration
    Config,
}
