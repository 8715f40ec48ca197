//! Configuration loading tests

use candle_sweep::backtest::{IndicatorConfig, MarketSet, Task};
use candle_sweep::config::Config;
use candle_sweep::signal::SignalKind;
use rust_decimal_macros::dec;
use std::io::Write;

const EXAMPLE: &str = include_str!("../config.toml.example");

#[test]
fn test_example_loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(EXAMPLE.as_bytes()).unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.simulation.base_currency, "BTC");
    assert_eq!(config.quotes().len(), 6);
    assert_eq!(config.data.variants.len(), 2);
    assert_eq!(config.simulation.favorability_of("USDT"), dec!(0.5));
    assert_eq!(config.simulation.favorability_of("ETH"), dec!(1));
}

#[test]
fn test_printed_config_reparses() {
    let config = Config::parse(EXAMPLE).unwrap();
    let printed = toml::to_string_pretty(&config).unwrap();
    let reparsed = Config::parse(&printed).unwrap();

    assert_eq!(reparsed.simulation, config.simulation);
    assert_eq!(reparsed.data.variants, config.data.variants);
    assert_eq!(reparsed.grid.kinds, config.grid.kinds);

    // same constants, same fingerprints
    let task = Task::new(
        vec![IndicatorConfig::new(SignalKind::SmaRatio, 10, 640, dec!(1))],
        0,
        MarketSet::new("BTC", config.quotes()),
    );
    assert_eq!(
        task.fingerprint(&config.simulation),
        task.fingerprint(&reparsed.simulation)
    );
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(Config::load("/nonexistent/candle-sweep.toml").is_err());
}

#[test]
fn test_invalid_values_rejected() {
    let text = EXAMPLE.replace("workers = 8", "workers = 0");
    assert!(Config::parse(&text).is_err());
}
