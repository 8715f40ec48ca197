//! Signal module
//!
//! Incremental technical indicators computed from a price stream

mod indicator;
mod types;
mod window;

pub use indicator::Signal;
pub use types::{SignalError, SignalKind};
