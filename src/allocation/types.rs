//! Allocation inputs, outputs and errors

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-currency state handed to a policy
#[derive(Debug, Clone, PartialEq)]
pub struct AssetState {
    /// Quantity currently held
    pub quantity: Decimal,
    /// Current price in base currency
    pub price: Decimal,
    /// Long-term reference price in base currency
    pub reference_price: Decimal,
    /// Multiplier on the currency's share of capital
    pub favorability: Decimal,
}

/// Portfolio snapshot for one interval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationInput {
    /// Base currency held
    pub base_quantity: Decimal,
    /// Quote currencies keyed by symbol
    pub assets: BTreeMap<String, AssetState>,
    /// Fraction of capital kept in the base currency
    pub reserve_fraction: Decimal,
}

impl AllocationInput {
    /// Base holdings plus every quote holding valued at its current price
    pub fn capital(&self) -> Decimal {
        self.assets
            .values()
            .fold(self.base_quantity, |total, asset| {
                total + asset.quantity * asset.price
            })
    }
}

/// Signed quantity changes per quote currency; positive means buy
pub type Deltas = BTreeMap<String, Decimal>;

/// Allocation failures. A failing policy leaves no partial output behind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// Nothing to allocate across
    #[error("no quote currencies to allocate across")]
    NoAssets,
    /// Price missing or not positive
    #[error("non-positive price for {0}")]
    NonPositivePrice(String),
    /// Reference price missing or not positive
    #[error("non-positive reference price for {0}")]
    NonPositiveReference(String),
    /// Favorability below zero
    #[error("negative favorability for {0}")]
    NegativeFavorability(String),
    /// Every target weight came out as zero
    #[error("no currency received a positive weight")]
    NoPositiveWeight,
    /// Portfolio worth nothing
    #[error("non-positive capital: {0}")]
    NonPositiveCapital(Decimal),
    /// Weights or targets left the representable range
    #[error("arithmetic overflow while allocating {0}")]
    Overflow(String),
    /// Task refers to a policy that is not registered
    #[error("unknown allocation policy index {0}")]
    UnknownPolicy(usize),
}
