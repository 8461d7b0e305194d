//! Signal detection

use super::{ChartData, Direction, Signal};
use crate::indicators::IndicatorSnapshot;
use crate::market::{pip_factor, BarSeries};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Detector parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorThresholds {
    /// ADX must be strictly above this value
    pub adx_threshold: Decimal,
    /// Take-profit distance as a multiple of ATR
    pub risk_reward_ratio: Decimal,
    /// Trend EMA period; shorter series never signal
    pub trend_period: usize,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            adx_threshold: dec!(20),
            risk_reward_ratio: dec!(2),
            trend_period: 50,
        }
    }
}

/// Detects a fresh EMA crossover on the last bar of a series
///
/// Stateless: the same series and snapshot always give the same answer.
#[derive(Debug, Clone)]
pub struct SignalDetector {
    thresholds: DetectorThresholds,
}

impl SignalDetector {
    pub fn new(thresholds: DetectorThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DetectorThresholds {
        &self.thresholds
    }

    /// Return a signal if the crossover completed on the latest bar
    ///
    /// Short series and missing indicator values yield `None`, never an error.
    pub fn detect(&self, series: &BarSeries, snapshot: &IndicatorSnapshot) -> Option<Signal> {
        let n = series.len();
        if n < 2 || n < self.thresholds.trend_period || !snapshot.is_aligned(n) {
            return None;
        }

        let (short_prev, short_last) = last_two(&snapshot.ema_short)?;
        let (long_prev, long_last) = last_two(&snapshot.ema_long)?;
        let trend = snapshot.ema_trend.last().copied().flatten()?;
        let adx = snapshot.adx.last().copied().flatten()?;
        let atr = snapshot.atr.last().copied().flatten()?;
        let bar = series.last()?;
        let close = bar.close;

        if adx <= self.thresholds.adx_threshold {
            return None;
        }

        let direction = if short_last > long_last && short_prev <= long_prev && close > trend {
            Direction::Long
        } else if short_last < long_last && short_prev >= long_prev && close < trend {
            Direction::Short
        } else {
            return None;
        };

        let target = atr * self.thresholds.risk_reward_ratio;
        let (stop_loss, take_profit) = match direction {
            Direction::Long => (close - atr, close + target),
            Direction::Short => (close + atr, close - target),
        };

        tracing::debug!(
            key = %series.key(),
            direction = %direction,
            close = %close,
            adx = %adx,
            atr = %atr,
            "Crossover detected"
        );

        Some(Signal {
            instrument: series.instrument().to_string(),
            timeframe: series.timeframe(),
            direction,
            entry_price: close,
            stop_loss,
            take_profit,
            suggested_holding_time: series.timeframe().holding_time(),
            bar_time: bar.timestamp,
            adx,
            atr,
            stop_distance_pips: atr / pip_factor(series.instrument()),
            chart: ChartData {
                series: series.clone(),
                indicators: snapshot.clone(),
            },
        })
    }
}

fn last_two(column: &[Option<Decimal>]) -> Option<(Decimal, Decimal)> {
    match column {
        [.., prev, last] => Some(((*prev)?, (*last)?)),
        _ => None,
    }
}
