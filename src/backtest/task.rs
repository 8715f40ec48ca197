//! Task definitions and content fingerprints
//!
//! A task is identified by the SHA-256 of a canonical text rendering of
//! everything that influences its simulated outcome. Indicator order is not
//! significant, so indicators are sorted before hashing and encoding.

use crate::allocation::PolicyRegistry;
use crate::config::SimulationConfig;
use crate::signal::{Signal, SignalError, SignalKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use thiserror::Error;

/// One indicator in a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub kind: SignalKind,
    pub fast_length: usize,
    pub slow_length: usize,
    pub weight: Decimal,
}

impl IndicatorConfig {
    /// Create a config in canonical form: the slow length is dropped for
    /// kinds without a slow window and the weight is clamped to at least one.
    pub fn new(kind: SignalKind, fast_length: usize, slow_length: usize, weight: Decimal) -> Self {
        Self {
            kind,
            fast_length,
            slow_length: if kind.is_ratio() { slow_length } else { 0 },
            weight: weight.max(Decimal::ONE).normalize(),
        }
    }

    /// Build a fresh signal for this config
    pub fn build(&self) -> Result<Signal, SignalError> {
        Signal::new(self.kind, self.fast_length, self.slow_length, self.weight)
    }

    /// Compact form, e.g. `sma-ratio:40:400:1.5`
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.kind,
            self.fast_length,
            self.slow_length,
            self.weight.normalize()
        )
    }
}

/// Base currency and the quote currencies under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSet {
    pub base: String,
    pub quotes: BTreeSet<String>,
}

impl MarketSet {
    pub fn new(base: impl Into<String>, quotes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            base: base.into(),
            quotes: quotes.into_iter().map(Into::into).collect(),
        }
    }

    /// `BTC:ETH,LTC`
    pub fn encode(&self) -> String {
        let quotes: Vec<&str> = self.quotes.iter().map(String::as_str).collect();
        format!("{}:{}", self.base, quotes.join(","))
    }
}

/// Task validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task has no indicators")]
    NoIndicators,
    #[error("task has no quote currencies")]
    NoMarkets,
    #[error("base currency {0} is also listed as a quote")]
    BaseInQuotes(String),
    #[error("unknown allocation policy index {0}")]
    UnknownPolicy(usize),
    #[error("invalid indicator: {0}")]
    Indicator(#[from] SignalError),
}

/// Immutable unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub indicators: Vec<IndicatorConfig>,
    pub policy: usize,
    pub markets: MarketSet,
}

impl Task {
    pub fn new(indicators: Vec<IndicatorConfig>, policy: usize, markets: MarketSet) -> Self {
        Self {
            indicators,
            policy,
            markets,
        }
    }

    /// Check the task can be simulated at all
    pub fn validate(&self, policies: &PolicyRegistry) -> Result<(), TaskError> {
        if self.indicators.is_empty() {
            return Err(TaskError::NoIndicators);
        }
        if self.markets.quotes.is_empty() {
            return Err(TaskError::NoMarkets);
        }
        if self.markets.quotes.contains(&self.markets.base) {
            return Err(TaskError::BaseInQuotes(self.markets.base.clone()));
        }
        if policies.get(self.policy).is_err() {
            return Err(TaskError::UnknownPolicy(self.policy));
        }
        for indicator in &self.indicators {
            indicator.build()?;
        }
        Ok(())
    }

    /// Indicators in canonical order
    pub fn canonical_indicators(&self) -> Vec<IndicatorConfig> {
        let mut indicators: Vec<IndicatorConfig> = self
            .indicators
            .iter()
            .map(|i| IndicatorConfig::new(i.kind, i.fast_length, i.slow_length, i.weight))
            .collect();
        indicators.sort();
        indicators
    }

    /// Content hash of this task under the given simulation constants
    pub fn fingerprint(&self, simulation: &SimulationConfig) -> Fingerprint {
        let mut canonical = canonical_constants(simulation);
        let _ = writeln!(canonical, "policy={}", self.policy);
        for indicator in self.canonical_indicators() {
            let _ = writeln!(canonical, "indicator={}", indicator.encode());
        }
        let _ = writeln!(canonical, "markets={}", self.markets.encode());

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Fingerprint(bytes)
    }

    /// Human-readable configuration, free of whitespace
    pub fn encode(&self, policies: &PolicyRegistry) -> String {
        let mut encoded = String::new();
        for indicator in self.canonical_indicators() {
            let _ = write!(encoded, "ind[{}]-", indicator.encode());
        }
        match policies.get(self.policy) {
            Ok(policy) => {
                let _ = write!(encoded, "alloc[{}]", policy.name());
            }
            Err(_) => {
                let _ = write!(encoded, "alloc[#{}]", self.policy);
            }
        }
        let _ = write!(encoded, "-mkt[{}]", self.markets.encode());
        encoded
    }
}

fn canonical_constants(simulation: &SimulationConfig) -> String {
    let pairs = |map: &std::collections::BTreeMap<String, Decimal>| {
        map.iter()
            .map(|(currency, value)| format!("{}:{}", currency, value.normalize()))
            .collect::<Vec<_>>()
            .join(",")
    };

    format!(
        "base={} interval={} bias={} lookahead={} min_order={} trade={} fee={} window={} reserve={} repair={} holdings={} favorability={}\n",
        simulation.base_currency,
        simulation.interval_secs,
        simulation.warmup_bias,
        simulation.lookahead_length,
        simulation.min_order_size.normalize(),
        simulation.trade_fraction.normalize(),
        simulation.fee_rate.normalize(),
        simulation.capital_window,
        simulation.reserve_fraction.normalize(),
        u8::from(simulation.repair_skew),
        pairs(&simulation.initial_holdings),
        pairs(&simulation.favorability),
    )
}

/// SHA-256 task fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Fingerprint text that is not 64 hex digits
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid fingerprint: {0}")]
pub struct FingerprintParseError(String);

impl FromStr for Fingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| FingerprintParseError(s.to_string()))?;
        Ok(Fingerprint(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn task(indicators: Vec<IndicatorConfig>) -> Task {
        Task::new(indicators, 1, MarketSet::new("BTC", ["ETH", "LTC"]))
    }

    fn indicators() -> Vec<IndicatorConfig> {
        vec![
            IndicatorConfig::new(SignalKind::SmaRatio, 40, 400, dec!(1.5)),
            IndicatorConfig::new(SignalKind::Rsi, 14, 0, dec!(1)),
            IndicatorConfig::new(SignalKind::Ema, 90, 0, dec!(1)),
        ]
    }

    #[test]
    fn test_fingerprint_ignores_indicator_order() {
        let simulation = SimulationConfig::default();
        let mut reversed = indicators();
        reversed.reverse();
        assert_eq!(
            task(indicators()).fingerprint(&simulation),
            task(reversed).fingerprint(&simulation)
        );
    }

    #[test]
    fn test_fingerprint_sensitive_to_every_field() {
        let simulation = SimulationConfig::default();
        let original = task(indicators()).fingerprint(&simulation);

        let mut changed = indicators();
        changed[0].fast_length = 41;
        assert_ne!(task(changed).fingerprint(&simulation), original);

        let mut reweighted = indicators();
        reweighted[0].weight = dec!(1.6);
        assert_ne!(task(reweighted).fingerprint(&simulation), original);

        let mut other_policy = task(indicators());
        other_policy.policy = 2;
        assert_ne!(other_policy.fingerprint(&simulation), original);

        let other_markets = Task::new(indicators(), 1, MarketSet::new("BTC", ["ETH"]));
        assert_ne!(other_markets.fingerprint(&simulation), original);

        let other_constants = SimulationConfig {
            fee_rate: dec!(0.0025),
            ..SimulationConfig::default()
        };
        assert_ne!(task(indicators()).fingerprint(&other_constants), original);
    }

    #[test]
    fn test_equivalent_decimals_share_fingerprint() {
        let simulation = SimulationConfig::default();
        let a = task(vec![IndicatorConfig::new(SignalKind::SmaRatio, 5, 10, dec!(1.50))]);
        let b = task(vec![IndicatorConfig::new(SignalKind::SmaRatio, 5, 10, dec!(1.5))]);
        assert_eq!(a.fingerprint(&simulation), b.fingerprint(&simulation));
    }

    #[test]
    fn test_base_kinds_drop_slow_length() {
        let config = IndicatorConfig::new(SignalKind::Wma, 12, 99, dec!(0.5));
        assert_eq!(config.slow_length, 0);
        assert_eq!(config.weight, dec!(1));
    }

    #[test]
    fn test_fingerprint_hex_round_trip() {
        let fingerprint = task(indicators()).fingerprint(&SimulationConfig::default());
        let text = fingerprint.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<Fingerprint>().unwrap(), fingerprint);
        assert!("xyz".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_encode() {
        let registry = PolicyRegistry::standard();
        let encoded = task(indicators()).encode(&registry);
        assert_eq!(
            encoded,
            "ind[ema:90:0:1]-ind[rsi:14:0:1]-ind[sma-ratio:40:400:1.5]-alloc[rating-squared]-mkt[BTC:ETH,LTC]"
        );
        assert!(!encoded.contains(' '));
    }

    #[test]
    fn test_validate() {
        let registry = PolicyRegistry::standard();
        assert!(task(indicators()).validate(&registry).is_ok());
        assert_eq!(task(vec![]).validate(&registry), Err(TaskError::NoIndicators));

        let mut bad_policy = task(indicators());
        bad_policy.policy = 99;
        assert_eq!(
            bad_policy.validate(&registry),
            Err(TaskError::UnknownPolicy(99))
        );

        let zero = task(vec![IndicatorConfig::new(SignalKind::SmaRatio, 5, 0, dec!(1))]);
        assert_eq!(
            zero.validate(&registry),
            Err(TaskError::Indicator(SignalError::ZeroSlowLength(
                SignalKind::SmaRatio
            )))
        );

        let overlapping = Task::new(indicators(), 0, MarketSet::new("BTC", ["BTC", "ETH"]));
        assert_eq!(
            overlapping.validate(&registry),
            Err(TaskError::BaseInQuotes("BTC".to_string()))
        );
    }
}
