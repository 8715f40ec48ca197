//! Per-market replay of a price series through its signals

use super::task::IndicatorConfig;
use super::SimulationError;
use crate::config::SimulationConfig;
use crate::data::PriceSeries;
use crate::signal::{Signal, SignalKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Replay phase, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WarmUp,
    Realign,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::WarmUp => "warm-up",
            Phase::Realign => "realignment",
        })
    }
}

/// Cursor into one market's series plus the signals it feeds
#[derive(Debug)]
pub struct MarketCursor {
    quote: String,
    series: Arc<PriceSeries>,
    cursor: usize,
    lookahead_offset: usize,
    lookahead: Signal,
    indicators: Vec<Signal>,
    advanced: usize,
}

impl MarketCursor {
    /// Position the cursor at the common start of all markets, shifted by the
    /// configured warm-up bias
    pub fn new(
        quote: impl Into<String>,
        series: Arc<PriceSeries>,
        config: &SimulationConfig,
        indicators: &[IndicatorConfig],
        latest_start: i64,
    ) -> Result<Self, SimulationError> {
        let skipped = (latest_start - series.start_secs()).max(0) / config.interval_secs;
        let cursor = usize::try_from(skipped).unwrap_or(usize::MAX).saturating_add(config.warmup_bias);

        Ok(Self {
            quote: quote.into(),
            series,
            cursor,
            lookahead_offset: config.lookahead_length / 2,
            lookahead: Signal::new(SignalKind::Sma, config.lookahead_length, 0, Decimal::ONE)?,
            indicators: indicators
                .iter()
                .map(IndicatorConfig::build)
                .collect::<Result<_, _>>()?,
            advanced: 0,
        })
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Intervals advanced so far
    pub fn advanced(&self) -> usize {
        self.advanced
    }

    /// Feed the current and look-ahead samples, then advance.
    /// Returns `Ok(false)` once the look-ahead index runs off the series.
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        let ahead_index = self.cursor.saturating_add(self.lookahead_offset);
        let (Some(current), Some(ahead)) = (self.series.get(self.cursor), self.series.get(ahead_index))
        else {
            return Ok(false);
        };

        for (index, price) in [(self.cursor, current), (ahead_index, ahead)] {
            if price <= Decimal::ZERO {
                return Err(SimulationError::NonPositiveSample {
                    quote: self.quote.clone(),
                    index,
                });
            }
        }

        self.lookahead.add_sample(ahead);
        for signal in &mut self.indicators {
            signal.add_sample(current);
        }
        self.cursor += 1;
        self.advanced += 1;
        Ok(true)
    }

    /// Every signal of this market reports a value
    pub fn is_ready(&self) -> bool {
        self.lookahead.is_ready() && self.indicators.iter().all(Signal::is_ready)
    }

    /// Advance until every signal is ready
    pub fn warm_up(&mut self) -> Result<usize, SimulationError> {
        while !self.is_ready() {
            if !self.step()? {
                return Err(self.exhausted(Phase::WarmUp));
            }
        }
        Ok(self.advanced)
    }

    /// Advance `count` more intervals, feeding signals on the way
    pub fn advance(&mut self, count: usize) -> Result<(), SimulationError> {
        for _ in 0..count {
            if !self.step()? {
                return Err(self.exhausted(Phase::Realign));
            }
        }
        Ok(())
    }

    fn exhausted(&self, phase: Phase) -> SimulationError {
        SimulationError::Exhausted {
            quote: self.quote.clone(),
            phase,
            indicators: self
                .indicators
                .iter()
                .map(|s| format!("{}:{}:{}", s.kind(), s.fast_length(), s.slow_length()))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Smoothed current price from the look-ahead average
    pub fn price(&self) -> Result<Decimal, SimulationError> {
        self.lookahead
            .value()
            .ok_or_else(|| SimulationError::MissingPrice(self.quote.clone()))
    }

    /// Long-term reference price: the current price scaled by one factor per
    /// indicator. Averages contribute `average / price`, RSI contributes
    /// `50 / rsi`, ratios contribute themselves; the product does not depend
    /// on indicator order.
    pub fn reference_price(&self, price: Decimal) -> Result<Decimal, SimulationError> {
        let mut reference = price;
        for signal in &self.indicators {
            let value = signal.value().ok_or_else(|| SimulationError::MissingValue {
                quote: self.quote.clone(),
                kind: signal.kind(),
            })?;
            let factor = match signal.kind() {
                SignalKind::Sma | SignalKind::Wma | SignalKind::Ema => value.checked_div(price),
                SignalKind::Rsi => dec!(50).checked_div(value),
                _ => Some(value),
            };
            reference = factor
                .and_then(|factor| reference.checked_mul(factor))
                .ok_or_else(|| SimulationError::Overflow(self.quote.clone()))?;
        }
        Ok(reference)
    }
}

/// Warm up every market, then push laggards forward so all markets have
/// advanced the same number of intervals. RSI seeding depends on the data,
/// so warm-up length can differ per market.
pub fn warm_up_all(markets: &mut [MarketCursor], realign: bool) -> Result<(), SimulationError> {
    let mut longest = 0;
    for market in markets.iter_mut() {
        longest = longest.max(market.warm_up()?);
    }

    if !realign {
        return Ok(());
    }

    for market in markets.iter_mut() {
        let lag = longest - market.advanced();
        if lag > 0 {
            tracing::trace!(quote = %market.quote, lag, "Realigning market after warm-up");
            market.advance(lag)?;
        }
    }
    Ok(())
}
