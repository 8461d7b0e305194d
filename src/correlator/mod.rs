//! Request correlation
//!
//! Turns the provider's asynchronous, unordered message stream into
//! timeout-bounded "give me the last N bars for this pair" calls.

mod client;
mod pending;
mod types;

pub use client::{RequestCorrelator, DEFAULT_CANDLE_COUNT, DEFAULT_REQUEST_TIMEOUT};
pub use pending::{PendingRequest, PendingTable};
pub use types::FetchError;

use crate::market::BarSeries;
use async_trait::async_trait;

/// Source of recent candle history
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch the `count` most recent bars for (instrument, timeframe)
    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<BarSeries, FetchError>;
}
