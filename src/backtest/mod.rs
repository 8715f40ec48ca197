//! Backtesting module
//!
//! Replays historical candles for one task: signals feed an allocation
//! policy, paper trades are sized under per-interval limits, and capital
//! statistics become the task's scores.

mod analytics;
mod execution_model;
mod replay;
mod simulator;
mod task;

pub use analytics::{CapitalTracker, ScoreKey, ScoreKind, ScoreRecord, ScoreSet, TieBreaker};
pub use execution_model::{Fill, Holdings, OrderConstraints, Side};
pub use replay::{warm_up_all, MarketCursor, Phase};
pub use simulator::{Simulator, TaskOutcome, VariantReport};
pub use task::{Fingerprint, FingerprintParseError, IndicatorConfig, MarketSet, Task, TaskError};

use crate::allocation::AllocationError;
use crate::signal::{SignalError, SignalKind};
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a simulation variant ends without a score
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no price series loaded for {0}")]
    MissingSeries(String),
    #[error("variant {0} leaves no markets to simulate")]
    EmptyVariant(String),
    #[error("{quote} ran out of data during {phase} with indicators [{indicators}]")]
    Exhausted {
        quote: String,
        phase: Phase,
        indicators: String,
    },
    #[error("{quote} has a non-positive price at index {index}")]
    NonPositiveSample { quote: String, index: usize },
    #[error("look-ahead price unavailable for {0}")]
    MissingPrice(String),
    #[error("{kind} produced no value for {quote}")]
    MissingValue { quote: String, kind: SignalKind },
    #[error("reference price for {0} left the representable range")]
    Overflow(String),
    #[error("capital fell to {0}")]
    CapitalExhausted(Decimal),
    #[error("capital never established a baseline")]
    NoBaseline,
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),
}
