//! OHLC bars and ordered bar series

use super::{PairKey, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single OHLC bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Traded volume (0 when the provider does not report it)
    pub volume: u64,
}

impl Bar {
    /// Create a new bar
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Bar series construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    /// Timestamps are not strictly increasing
    #[error("Bar {index} at {timestamp} is not after its predecessor")]
    NotIncreasing {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Ordered bars for one (instrument, timeframe) pair
///
/// Timestamps are strictly increasing; construction enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarSeries {
    key: PairKey,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series from bars already in ascending order
    pub fn new(key: PairKey, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SeriesError::NotIncreasing {
                    index: index + 1,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        Ok(Self { key, bars })
    }

    /// Build a series from provider output that may be unordered or repeat a bar
    ///
    /// Later duplicates win, and only the most recent `max_len` bars are kept.
    pub fn from_unordered(key: PairKey, mut bars: Vec<Bar>, max_len: usize) -> Self {
        // Stable sort keeps arrival order within equal timestamps
        bars.sort_by_key(|b| b.timestamp);

        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }

        if deduped.len() > max_len {
            deduped.drain(..deduped.len() - max_len);
        }

        Self { key, bars: deduped }
    }

    pub fn key(&self) -> &PairKey {
        &self.key
    }

    pub fn instrument(&self) -> &str {
        &self.key.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.key.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close prices in series order
    pub fn closes(&self) -> Vec<Decimal> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar_at(secs: i64, close: Decimal) -> Bar {
        Bar::new(
            Utc.timestamp_opt(secs, 0).unwrap(),
            close,
            close + dec!(0.001),
            close - dec!(0.001),
            close,
            0,
        )
    }

    fn key() -> PairKey {
        PairKey::new("frxEURUSD", Timeframe::M15)
    }

    #[test]
    fn test_new_accepts_increasing() {
        let bars = vec![bar_at(0, dec!(1.1)), bar_at(900, dec!(1.2))];
        let series = BarSeries::new(key(), bars).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, dec!(1.2));
        assert_eq!(series.instrument(), "frxEURUSD");
        assert_eq!(series.timeframe(), Timeframe::M15);
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let bars = vec![bar_at(0, dec!(1.1)), bar_at(0, dec!(1.2))];
        let err = BarSeries::new(key(), bars).unwrap_err();
        assert!(matches!(err, SeriesError::NotIncreasing { index: 1, .. }));
    }

    #[test]
    fn test_new_rejects_descending() {
        let bars = vec![
            bar_at(0, dec!(1.1)),
            bar_at(1800, dec!(1.2)),
            bar_at(900, dec!(1.3)),
        ];
        assert!(BarSeries::new(key(), bars).is_err());
    }

    #[test]
    fn test_from_unordered_sorts_and_dedups() {
        let bars = vec![
            bar_at(1800, dec!(1.3)),
            bar_at(0, dec!(1.1)),
            bar_at(900, dec!(1.2)),
            bar_at(900, dec!(1.25)),
        ];
        let series = BarSeries::from_unordered(key(), bars, 100);
        assert_eq!(series.closes(), vec![dec!(1.1), dec!(1.25), dec!(1.3)]);
    }

    #[test]
    fn test_from_unordered_keeps_most_recent() {
        let bars = (0..10).map(|i| bar_at(i * 900, Decimal::from(i))).collect();
        let series = BarSeries::from_unordered(key(), bars, 3);
        assert_eq!(series.closes(), vec![dec!(7), dec!(8), dec!(9)]);
    }

    #[test]
    fn test_empty_series() {
        let series = BarSeries::new(key(), vec![]).unwrap();
        assert!(series.is_empty());
        assert!(series.last().is_none());
    }
}
