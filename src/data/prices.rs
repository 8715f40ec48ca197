//! Candle store loading
//!
//! Each market lives in its own text file: the letter `p`, the timestamp of
//! the first candle in seconds, then one price per base interval, all
//! whitespace-separated.

use crate::config::{DataConfig, VariantConfig};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Candle file errors
#[derive(Debug, Error)]
pub enum PriceStoreError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing `p` header")]
    MissingHeader,
    #[error("invalid start timestamp: {0}")]
    BadTimestamp(String),
    #[error("invalid price {value:?} at index {index}")]
    BadPrice { index: usize, value: String },
    #[error("non-positive price {value} at index {index}")]
    NonPositive { index: usize, value: Decimal },
    #[error("series has no prices")]
    Empty,
}

/// Immutable price history for one market
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    start: i64,
    prices: Vec<Decimal>,
}

impl PriceSeries {
    /// Build a series, rejecting empty or non-positive data
    pub fn new(start: i64, prices: Vec<Decimal>) -> Result<Self, PriceStoreError> {
        if prices.is_empty() {
            return Err(PriceStoreError::Empty);
        }
        if let Some((index, value)) = prices
            .iter()
            .enumerate()
            .find(|(_, price)| **price <= Decimal::ZERO)
        {
            return Err(PriceStoreError::NonPositive {
                index,
                value: *value,
            });
        }
        Ok(Self { start, prices })
    }

    /// Parse the candle file text format
    pub fn parse(text: &str) -> Result<Self, PriceStoreError> {
        let mut tokens = text.split_whitespace();
        if tokens.next() != Some("p") {
            return Err(PriceStoreError::MissingHeader);
        }

        let start = tokens.next().ok_or(PriceStoreError::MissingHeader)?;
        let start = start
            .parse::<i64>()
            .map_err(|_| PriceStoreError::BadTimestamp(start.to_string()))?;

        let prices = tokens
            .enumerate()
            .map(|(index, token)| {
                token.parse::<Decimal>().map_err(|_| PriceStoreError::BadPrice {
                    index,
                    value: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(start, prices)
    }

    /// Read and parse a candle file
    pub fn load(path: &Path) -> Result<Self, PriceStoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| PriceStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Seconds since the epoch of the first candle
    pub fn start_secs(&self) -> i64 {
        self.start
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.start, 0)
    }

    pub fn get(&self, index: usize) -> Option<Decimal> {
        self.prices.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Every loaded market, shared read-only across workers
#[derive(Debug, Clone, Default)]
pub struct PriceStore {
    series: BTreeMap<String, Arc<PriceSeries>>,
}

impl PriceStore {
    /// Load every configured market. Markets that fail to load are logged
    /// and left out; tasks that need them abort the affected variants.
    pub fn load(config: &DataConfig) -> Self {
        let mut store = Self::default();
        for market in &config.markets {
            let path = config.candles_dir.join(&market.file);
            match PriceSeries::load(&path) {
                Ok(series) => {
                    tracing::info!(
                        quote = %market.quote,
                        samples = series.len(),
                        start = ?series.start_time(),
                        "Loaded price series"
                    );
                    store.insert(market.quote.clone(), series);
                }
                Err(e) => {
                    tracing::warn!(quote = %market.quote, path = ?path, error = %e, "Market unavailable");
                }
            }
        }
        store
    }

    pub fn insert(&mut self, quote: impl Into<String>, series: PriceSeries) {
        self.series.insert(quote.into(), Arc::new(series));
    }

    pub fn get(&self, quote: &str) -> Option<&Arc<PriceSeries>> {
        self.series.get(quote)
    }

    pub fn quotes(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Market subset a task is simulated over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    exclude: BTreeSet<String>,
}

impl Variant {
    pub fn new(name: impl Into<String>, exclude: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    /// Variant containing every market
    pub fn all() -> Self {
        Self::new("all", Vec::<String>::new())
    }

    pub fn includes(&self, quote: &str) -> bool {
        !self.exclude.contains(quote)
    }
}

impl From<&VariantConfig> for Variant {
    fn from(config: &VariantConfig) -> Self {
        Self::new(config.name.clone(), config.exclude.iter().cloned())
    }
}
