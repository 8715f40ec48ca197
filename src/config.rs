//! Configuration types for candle-sweep

use crate::signal::SignalKind;
use crate::telemetry::LogFormat;
use anyhow::ensure;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub explore: ExploreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Worker pool, harvest and result store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds between harvests of finished results
    #[serde(default = "default_harvest_interval")]
    pub harvest_interval_secs: u64,

    /// Skip tasks whose fingerprint was already seen
    #[serde(default = "default_true")]
    pub prevent_duplicates: bool,

    /// Drop results with any zero or negative score
    #[serde(default = "default_true")]
    pub discard_non_positive: bool,

    /// Entries kept per leaderboard
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,

    /// Entries printed per leaderboard on each harvest
    #[serde(default = "default_print_count")]
    pub print_count: usize,

    /// Append-only result store
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

fn default_true() -> bool {
    true
}
fn default_workers() -> usize {
    8
}
fn default_harvest_interval() -> u64 {
    10
}
fn default_leaderboard_size() -> usize {
    10
}
fn default_print_count() -> usize {
    3
}
fn default_results_path() -> PathBuf {
    PathBuf::from("./results/scores.txt")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            harvest_interval_secs: default_harvest_interval(),
            prevent_duplicates: true,
            discard_non_positive: true,
            leaderboard_size: default_leaderboard_size(),
            print_count: default_print_count(),
            results_path: default_results_path(),
        }
    }
}

/// Fixed simulation constants. Every field takes part in task fingerprints.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SimulationConfig {
    /// Currency all prices are quoted in
    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    /// Seconds per candle
    #[serde(default = "default_interval_secs")]
    pub interval_secs: i64,

    /// Extra intervals skipped before warm-up starts
    #[serde(default)]
    pub warmup_bias: usize,

    /// Length of the look-ahead price average; it is fed the price
    /// `lookahead_length / 2` intervals ahead of the cursor
    #[serde(default = "default_lookahead_length")]
    pub lookahead_length: usize,

    /// Smallest order notional in base currency
    #[serde(default = "default_min_order_size")]
    pub min_order_size: Decimal,

    /// Share of capital tradable per interval, split across markets
    #[serde(default = "default_trade_fraction")]
    pub trade_fraction: Decimal,

    /// Proportional fee per trade
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,

    /// Intervals in the capital moving average behind the time-weighted score
    #[serde(default = "default_capital_window")]
    pub capital_window: usize,

    /// Fraction of capital kept in the base currency
    #[serde(default = "default_reserve_fraction")]
    pub reserve_fraction: Decimal,

    /// Realign markets whose warm-up took a different number of intervals
    #[serde(default = "default_true")]
    pub repair_skew: bool,

    /// Starting quantity per currency, base currency included
    #[serde(default)]
    pub initial_holdings: BTreeMap<String, Decimal>,

    /// Allocation favorability per quote currency; missing entries count as 1
    #[serde(default)]
    pub favorability: BTreeMap<String, Decimal>,
}

fn default_base_currency() -> String {
    "BTC".to_string()
}
fn default_interval_secs() -> i64 {
    300
}
fn default_lookahead_length() -> usize {
    40
}
fn default_min_order_size() -> Decimal {
    dec!(0.005)
}
fn default_trade_fraction() -> Decimal {
    dec!(0.02)
}
fn default_fee_rate() -> Decimal {
    dec!(0.002)
}
fn default_capital_window() -> usize {
    7200
}
fn default_reserve_fraction() -> Decimal {
    dec!(0.05)
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            interval_secs: default_interval_secs(),
            warmup_bias: 0,
            lookahead_length: default_lookahead_length(),
            min_order_size: default_min_order_size(),
            trade_fraction: default_trade_fraction(),
            fee_rate: default_fee_rate(),
            capital_window: default_capital_window(),
            reserve_fraction: default_reserve_fraction(),
            repair_skew: true,
            initial_holdings: BTreeMap::new(),
            favorability: BTreeMap::new(),
        }
    }
}

impl SimulationConfig {
    /// Starting quantity for `currency`, zero when not configured
    pub fn initial_quantity(&self, currency: &str) -> Decimal {
        self.initial_holdings
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Favorability for `currency`, one when not configured
    pub fn favorability_of(&self, currency: &str) -> Decimal {
        self.favorability
            .get(currency)
            .copied()
            .unwrap_or(Decimal::ONE)
    }
}

/// Candle store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Directory holding one candle file per market
    pub candles_dir: PathBuf,

    /// Markets to load
    #[serde(default)]
    pub markets: Vec<MarketSource>,

    /// Market subsets every task is simulated over
    #[serde(default = "default_variants")]
    pub variants: Vec<VariantConfig>,
}

/// One market's candle file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketSource {
    /// Quote currency symbol
    pub quote: String,
    /// File name relative to `candles_dir`
    pub file: String,
}

/// Named subset of the loaded markets
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct VariantConfig {
    pub name: String,
    /// Quote currencies left out of this variant
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_variants() -> Vec<VariantConfig> {
    vec![VariantConfig {
        name: "all".to_string(),
        exclude: Vec::new(),
    }]
}

/// Exhaustive task grid for the `run` command
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_kinds")]
    pub kinds: Vec<SignalKind>,
    #[serde(default = "default_grid_fast_lengths")]
    pub fast_lengths: Vec<usize>,
    #[serde(default = "default_grid_slow_lengths")]
    pub slow_lengths: Vec<usize>,
    #[serde(default = "default_grid_weights")]
    pub weights: Vec<Decimal>,
    /// Policy names; empty means every registered policy
    #[serde(default)]
    pub policies: Vec<String>,
}

fn default_grid_kinds() -> Vec<SignalKind> {
    vec![SignalKind::SmaRatio, SignalKind::RsiRatio]
}
fn default_grid_fast_lengths() -> Vec<usize> {
    vec![10, 40, 160]
}
fn default_grid_slow_lengths() -> Vec<usize> {
    vec![640, 2560]
}
fn default_grid_weights() -> Vec<Decimal> {
    vec![dec!(1)]
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            kinds: default_grid_kinds(),
            fast_lengths: default_grid_fast_lengths(),
            slow_lengths: default_grid_slow_lengths(),
            weights: default_grid_weights(),
            policies: Vec::new(),
        }
    }
}

/// Random task synthesis for the `explore` command
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExploreConfig {
    /// Queue depth the coordinator keeps topped up
    #[serde(default = "default_target_in_flight")]
    pub target_in_flight: usize,

    /// Consecutive duplicate or invalid draws before synthesis gives up
    #[serde(default = "default_max_duplicate_attempts")]
    pub max_duplicate_attempts: usize,

    /// Milliseconds between queue refills
    #[serde(default = "default_refill_interval")]
    pub refill_interval_ms: u64,

    /// Fixed RNG seed for reproducible exploration
    #[serde(default)]
    pub seed: Option<u64>,

    /// Upper bound on indicators per task
    #[serde(default = "default_max_indicators")]
    pub max_indicators: usize,

    /// Window lengths are drawn as `k² * length_unit` for k in 1..=length_steps
    #[serde(default = "default_length_steps")]
    pub length_steps: usize,
    #[serde(default = "default_length_unit")]
    pub length_unit: usize,

    /// Weights are drawn as `1 + n * weight_step` for n in 0..=weight_steps
    #[serde(default = "default_weight_steps")]
    pub weight_steps: u32,
    #[serde(default = "default_weight_step")]
    pub weight_step: Decimal,

    #[serde(default = "default_explore_kinds")]
    pub kinds: Vec<SignalKind>,
}

fn default_target_in_flight() -> usize {
    64
}
fn default_max_duplicate_attempts() -> usize {
    1000
}
fn default_refill_interval() -> u64 {
    500
}
fn default_max_indicators() -> usize {
    3
}
fn default_length_steps() -> usize {
    15
}
fn default_length_unit() -> usize {
    10
}
fn default_weight_steps() -> u32 {
    10
}
fn default_weight_step() -> Decimal {
    dec!(0.1)
}
fn default_explore_kinds() -> Vec<SignalKind> {
    SignalKind::ALL.to_vec()
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            target_in_flight: default_target_in_flight(),
            max_duplicate_attempts: default_max_duplicate_attempts(),
            refill_interval_ms: default_refill_interval(),
            seed: None,
            max_indicators: default_max_indicators(),
            length_steps: default_length_steps(),
            length_unit: default_length_unit(),
            weight_steps: default_weight_steps(),
            weight_step: default_weight_step(),
            kinds: default_explore_kinds(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        let sim = &self.simulation;
        ensure!(self.engine.workers > 0, "engine.workers must be positive");
        ensure!(
            self.engine.leaderboard_size > 0,
            "engine.leaderboard_size must be positive"
        );
        ensure!(sim.interval_secs > 0, "simulation.interval_secs must be positive");
        ensure!(
            sim.lookahead_length > 0,
            "simulation.lookahead_length must be positive"
        );
        ensure!(
            sim.capital_window > 0,
            "simulation.capital_window must be positive"
        );
        ensure!(
            sim.trade_fraction > Decimal::ZERO && sim.trade_fraction <= Decimal::ONE,
            "simulation.trade_fraction must be in (0, 1]"
        );
        ensure!(
            sim.fee_rate >= Decimal::ZERO && sim.fee_rate < Decimal::ONE,
            "simulation.fee_rate must be in [0, 1)"
        );
        ensure!(
            sim.reserve_fraction >= Decimal::ZERO && sim.reserve_fraction < Decimal::ONE,
            "simulation.reserve_fraction must be in [0, 1)"
        );
        ensure!(
            !self.data.variants.is_empty(),
            "data.variants must name at least one variant"
        );
        ensure!(
            self.explore.length_steps > 0 && self.explore.length_unit > 0,
            "explore length steps and unit must be positive"
        );
        ensure!(
            !self.explore.kinds.is_empty(),
            "explore.kinds must not be empty"
        );
        Ok(())
    }

    /// Quote currencies configured under `[[data.markets]]`
    pub fn quotes(&self) -> Vec<String> {
        self.data.markets.iter().map(|m| m.quote.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [data]
        candles_dir = "./candles"

        [[data.markets]]
        quote = "ETH"
        file = "BITTREX.BTC_ETH.5"
    "#;

    #[test]
    fn test_config_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.engine.workers, 8);
        assert_eq!(config.simulation.base_currency, "BTC");
        assert_eq!(config.simulation.fee_rate, dec!(0.002));
        assert_eq!(config.data.variants.len(), 1);
        assert_eq!(config.quotes(), vec!["ETH".to_string()]);
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [engine]
            workers = 2
            results_path = "/tmp/scores.txt"

            [simulation]
            base_currency = "BTC"
            fee_rate = 0.001
            reserve_fraction = 0.1

            [simulation.initial_holdings]
            BTC = 0.2
            ETH = 18.76

            [data]
            candles_dir = "./candles"

            [[data.variants]]
            name = "reduced"
            exclude = ["USDT"]

            [grid]
            kinds = ["sma-ratio", "rsi"]

            [telemetry]
            log_level = "debug"
            log_format = "json"
        "#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.engine.workers, 2);
        assert_eq!(config.simulation.fee_rate, dec!(0.001));
        assert_eq!(config.simulation.initial_quantity("ETH"), dec!(18.76));
        assert_eq!(config.simulation.initial_quantity("LTC"), dec!(0));
        assert_eq!(config.simulation.favorability_of("ETH"), dec!(1));
        assert_eq!(config.data.variants[0].exclude, vec!["USDT".to_string()]);
        assert_eq!(config.grid.kinds, vec![SignalKind::SmaRatio, SignalKind::Rsi]);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn test_config_rejects_bad_reserve() {
        let toml = format!("{MINIMAL}\n[simulation]\nreserve_fraction = 1.5\n");
        assert!(Config::parse(&toml).is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(include_str!("../config.toml.example")).unwrap();
        assert!(!config.data.markets.is_empty());
    }
}
