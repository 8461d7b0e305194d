//! Outbound request envelopes

use crate::market::Timeframe;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Authorization request sent right after the transport opens
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeRequest {
    pub authorize: String,
}

impl AuthorizeRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            authorize: token.into(),
        }
    }
}

/// Candle history request
///
/// `req_id` is echoed back by the provider and lets the correlator tell a
/// fresh response from a late answer to an abandoned request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRequest {
    pub ticks_history: String,
    pub style: &'static str,
    pub start: i64,
    pub end: i64,
    pub count: usize,
    pub granularity: u64,
    pub adjust_start_time: u8,
    pub req_id: u64,
}

impl HistoryRequest {
    /// Request the `count` most recent bars ending at `now`
    pub fn new(
        instrument: impl Into<String>,
        timeframe: Timeframe,
        count: usize,
        now: DateTime<Utc>,
        req_id: u64,
    ) -> Self {
        let granularity = timeframe.granularity();
        let end = now.timestamp();
        let span = (count as i64).saturating_mul(granularity as i64);

        Self {
            ticks_history: instrument.into(),
            style: "candles",
            start: end.saturating_sub(span),
            end,
            count,
            granularity,
            adjust_start_time: 1,
            req_id,
        }
    }
}
