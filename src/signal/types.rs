//! Signal kinds and errors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Technical indicator kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    /// Simple moving average
    Sma,
    /// Linearly weighted moving average (weights 1..n)
    Wma,
    /// Quadratically weighted moving average (weights 1², 2², ..., n²)
    Ema,
    /// Wilder relative strength index
    Rsi,
    /// Fast SMA over slow SMA
    SmaRatio,
    /// Fast WMA over slow WMA
    WmaRatio,
    /// Fast EMA over slow EMA
    EmaRatio,
    /// Fast inverse strength over slow inverse strength
    RsiRatio,
}

impl SignalKind {
    /// Every kind, in canonical order
    pub const ALL: [SignalKind; 8] = [
        SignalKind::Sma,
        SignalKind::Wma,
        SignalKind::Ema,
        SignalKind::Rsi,
        SignalKind::SmaRatio,
        SignalKind::WmaRatio,
        SignalKind::EmaRatio,
        SignalKind::RsiRatio,
    ];

    /// Whether the kind compares a fast window against a slow one
    pub fn is_ratio(self) -> bool {
        matches!(
            self,
            SignalKind::SmaRatio | SignalKind::WmaRatio | SignalKind::EmaRatio | SignalKind::RsiRatio
        )
    }

    /// Whether a slow length is mandatory for this kind
    pub fn requires_slow_length(self) -> bool {
        self.is_ratio() && self != SignalKind::RsiRatio
    }

    /// Short name used in result encodings and config files
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Sma => "sma",
            SignalKind::Wma => "wma",
            SignalKind::Ema => "ema",
            SignalKind::Rsi => "rsi",
            SignalKind::SmaRatio => "sma-ratio",
            SignalKind::WmaRatio => "wma-ratio",
            SignalKind::EmaRatio => "ema-ratio",
            SignalKind::RsiRatio => "rsi-ratio",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SignalError::UnknownKind(s.to_string()))
    }
}

/// Signal configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    /// Fast window length was zero
    #[error("window length must be positive for {0}")]
    ZeroLength(SignalKind),
    /// Ratio kind configured without a slow window
    #[error("slow window length must be positive for {0}")]
    ZeroSlowLength(SignalKind),
    /// Kind name not recognised
    #[error("unknown signal kind: {0}")]
    UnknownKind(String),
}
