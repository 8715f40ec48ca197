//! candle-sweep: backtest indicator-driven portfolio allocation over historical candles
//!
//! This library provides the core components for:
//! - Incremental technical indicators (moving averages, RSI and their ratios)
//! - Pluggable portfolio allocation policies
//! - A deterministic per-task simulation loop with order constraints and fees
//! - A threaded work scheduler with fingerprint deduplication and resumable results
//! - Grid and random task generation
//! - Structured logging and Prometheus metrics

pub mod allocation;
pub mod backtest;
pub mod cli;
pub mod config;
pub mod data;
pub mod scheduler;
pub mod signal;
pub mod telemetry;
