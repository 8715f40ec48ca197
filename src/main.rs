use anyhow::Context;
use candle_sweep::cli::{Cli, Commands};
use candle_sweep::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::parse(include_str!("../config.toml.example"))
                .context("embedded default configuration is invalid")?
        }
    };

    // Initialize telemetry
    let _telemetry = candle_sweep::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting grid run");
            args.execute(&config).await?;
        }
        Commands::Explore(args) => {
            tracing::info!("Starting exploration");
            args.execute(&config).await?;
        }
        Commands::Scores(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("# Effective configuration");
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
