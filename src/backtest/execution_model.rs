//! Paper order sizing and balance accounting

use crate::config::SimulationConfig;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Executed paper trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub side: Side,
    /// Quote currency quantity
    pub quantity: Decimal,
    /// Base currency value of the trade, fee excluded
    pub notional: Decimal,
    /// Base currency fee charged
    pub fee: Decimal,
}

/// Per-interval order limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConstraints {
    pub min_order_size: Decimal,
    pub ceiling: Decimal,
    pub fee_rate: Decimal,
}

impl OrderConstraints {
    /// Ceiling scales with capital and shrinks with the number of markets
    pub fn for_interval(config: &SimulationConfig, capital: Decimal, markets: usize) -> Self {
        let markets = Decimal::from(markets.max(1));
        Self {
            min_order_size: config.min_order_size,
            ceiling: capital * config.trade_fraction / markets,
            fee_rate: config.fee_rate,
        }
    }

    /// Size an order for `delta` (positive buys) or return `None` to skip it.
    ///
    /// Orders under the ceiling are skipped unless the existing exposure is
    /// already below the minimum order size, so small leftovers can always be
    /// cleared.
    pub fn size_order(
        &self,
        delta: Decimal,
        price: Decimal,
        held: Decimal,
        base_available: Decimal,
    ) -> Option<Fill> {
        if delta.is_zero() || price <= Decimal::ZERO {
            return None;
        }

        let desired = delta.abs() * price;
        if desired < self.min_order_size {
            return None;
        }
        if desired < self.ceiling && held * price >= self.min_order_size {
            return None;
        }
        let notional = desired.min(self.ceiling);

        if delta.is_sign_negative() {
            let quantity = (notional / price).min(held);
            if quantity <= Decimal::ZERO {
                return None;
            }
            let proceeds = quantity * price;
            return Some(Fill {
                side: Side::Sell,
                quantity,
                notional: proceeds,
                fee: proceeds * self.fee_rate,
            });
        }

        let spend = notional.min(base_available);
        if spend <= Decimal::ZERO {
            return None;
        }
        let fee = spend * self.fee_rate;
        Some(Fill {
            side: Side::Buy,
            quantity: spend / price,
            notional: spend,
            // Skip the fee when paying it would overdraw the base balance
            fee: if base_available - spend >= fee {
                fee
            } else {
                Decimal::ZERO
            },
        })
    }
}

/// Base and quote balances for one simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holdings {
    pub base: Decimal,
    pub quotes: BTreeMap<String, Decimal>,
}

impl Holdings {
    pub fn new(base: Decimal) -> Self {
        Self {
            base,
            quotes: BTreeMap::new(),
        }
    }

    pub fn quantity(&self, quote: &str) -> Decimal {
        self.quotes.get(quote).copied().unwrap_or(Decimal::ZERO)
    }

    /// Apply a fill to both sides of the market
    pub fn apply(&mut self, quote: &str, fill: &Fill) {
        let held = self.quotes.entry(quote.to_string()).or_insert(Decimal::ZERO);
        match fill.side {
            Side::Buy => {
                *held += fill.quantity;
                self.base -= fill.notional + fill.fee;
            }
            Side::Sell => {
                *held -= fill.quantity;
                self.base += fill.notional - fill.fee;
            }
        }
    }

    /// Base plus every quote balance valued at `prices`
    pub fn capital(&self, prices: &BTreeMap<String, Decimal>) -> Decimal {
        self.quotes.iter().fold(self.base, |total, (quote, quantity)| {
            total + *quantity * prices.get(quote).copied().unwrap_or(Decimal::ZERO)
        })
    }
}
