use super::{adx, atr, ema, IndicatorEngine, IndicatorError, IndicatorPeriods, IndicatorSnapshot};
use crate::market::BarSeries;
use rust_decimal::Decimal;

/// Default engine: EMA/ADX/ATR in exact decimal arithmetic
#[derive(Debug, Clone, Copy, Default)]
pub struct TaEngine;

impl TaEngine {
    pub fn new() -> Self {
        Self
    }

    fn validate(series: &BarSeries) -> Result<(), IndicatorError> {
        if series.is_empty() {
            return Err(IndicatorError::InsufficientData);
        }
        for (index, bar) in series.bars().iter().enumerate() {
            if bar.high < bar.low {
                return Err(IndicatorError::Malformed {
                    index,
                    reason: format!("high {} below low {}", bar.high, bar.low),
                });
            }
            let prices = [bar.open, bar.high, bar.low, bar.close];
            if prices.iter().any(|p| *p <= Decimal::ZERO) {
                return Err(IndicatorError::Malformed {
                    index,
                    reason: "non-positive price".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl IndicatorEngine for TaEngine {
    fn compute(
        &self,
        series: &BarSeries,
        periods: &IndicatorPeriods,
    ) -> Result<IndicatorSnapshot, IndicatorError> {
        if let Some(name) = periods.zero_period() {
            return Err(IndicatorError::InvalidPeriod(name));
        }
        Self::validate(series)?;

        let closes = series.closes();
        let bars = series.bars();
        Ok(IndicatorSnapshot {
            ema_short: ema(&closes, periods.ema_short),
            ema_long: ema(&closes, periods.ema_long),
            ema_trend: ema(&closes, periods.ema_trend),
            adx: adx(bars, periods.adx),
            atr: atr(bars, periods.atr),
        })
    }
}
