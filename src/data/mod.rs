//! Data module
//!
//! Candle store loading and the append-only result store

mod prices;
mod results;

pub use prices::{PriceSeries, PriceStore, PriceStoreError, Variant};
pub use results::{format_line, parse_line, ResultStore, ResultStoreError};
