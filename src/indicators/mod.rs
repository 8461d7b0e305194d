//! Technical indicators
//!
//! All series are index-aligned with the input bars. Leading positions that
//! fall inside an indicator's lookback are `None`.

mod adx;
mod atr;
mod ema;
mod engine;

pub use adx::adx;
pub use atr::{atr, true_range, wilder_smooth};
pub use ema::ema;
pub use engine::TaEngine;

use crate::market::BarSeries;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lookback periods for the five indicators the detector reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    pub ema_short: usize,
    pub ema_long: usize,
    pub ema_trend: usize,
    pub adx: usize,
    pub atr: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            ema_short: 8,
            ema_long: 20,
            ema_trend: 50,
            adx: 14,
            atr: 14,
        }
    }
}

impl IndicatorPeriods {
    /// Name of the first zero period, if any
    pub fn zero_period(&self) -> Option<&'static str> {
        [
            ("ema_short", self.ema_short),
            ("ema_long", self.ema_long),
            ("ema_trend", self.ema_trend),
            ("adx", self.adx),
            ("atr", self.atr),
        ]
        .into_iter()
        .find(|(_, p)| *p == 0)
        .map(|(name, _)| name)
    }
}

/// Per-bar indicator values for one series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorSnapshot {
    pub ema_short: Vec<Option<Decimal>>,
    pub ema_long: Vec<Option<Decimal>>,
    pub ema_trend: Vec<Option<Decimal>>,
    pub adx: Vec<Option<Decimal>>,
    pub atr: Vec<Option<Decimal>>,
}

impl IndicatorSnapshot {
    /// Number of bars covered
    pub fn len(&self) -> usize {
        self.ema_short.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_short.is_empty()
    }

    /// Whether every column covers exactly `bars` entries
    pub fn is_aligned(&self, bars: usize) -> bool {
        [
            &self.ema_short,
            &self.ema_long,
            &self.ema_trend,
            &self.adx,
            &self.atr,
        ]
        .iter()
        .all(|column| column.len() == bars)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("Not enough bars to compute indicators")]
    InsufficientData,
    #[error("Malformed bar at index {index}: {reason}")]
    Malformed { index: usize, reason: String },
    #[error("Indicator period {0} must be positive")]
    InvalidPeriod(&'static str),
}

/// Computes indicator columns for a bar series
///
/// Implementations must be deterministic: identical input yields identical
/// output.
pub trait IndicatorEngine: Send + Sync {
    fn compute(
        &self,
        series: &BarSeries,
        periods: &IndicatorPeriods,
    ) -> Result<IndicatorSnapshot, IndicatorError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::market::{Bar, BarSeries, PairKey, Timeframe};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    /// Hourly bars from closes: open is the previous close, high/low pad the body
    pub fn series_from_closes(closes: &[Decimal], pad: Decimal) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                Bar::new(
                    start + Duration::hours(i as i64),
                    open,
                    open.max(close) + pad,
                    open.min(close) - pad,
                    close,
                    100,
                )
            })
            .collect();
        BarSeries::new(PairKey::new("frxEURUSD", Timeframe::H1), bars).unwrap()
    }
}
