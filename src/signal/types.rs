//! Signal types

use crate::indicators::IndicatorSnapshot;
use crate::market::{BarSeries, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Short EMA crossed above long EMA
    Long,
    /// Short EMA crossed below long EMA
    Short,
}

impl Direction {
    /// Label used in alerts
    pub fn action(&self) -> &'static str {
        match self {
            Direction::Long => "Buy",
            Direction::Short => "Sell",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Direction::Long => "\u{1F680}",
            Direction::Short => "\u{1F4C9}",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Everything a chart renderer needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartData {
    pub series: BarSeries,
    pub indicators: IndicatorSnapshot,
}

/// A crossover signal on the most recent bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signal {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub direction: Direction,
    /// Close of the signal bar
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub suggested_holding_time: &'static str,
    /// Open time of the bar the crossover completed on
    pub bar_time: DateTime<Utc>,
    pub adx: Decimal,
    pub atr: Decimal,
    /// Stop distance in pips, display only
    pub stop_distance_pips: Decimal,
    pub chart: ChartData,
}

impl Signal {
    /// Risk per unit: distance from entry to stop
    pub fn risk(&self) -> Decimal {
        (self.entry_price - self.stop_loss).abs()
    }

    /// Reward per unit: distance from entry to target
    pub fn reward(&self) -> Decimal {
        (self.take_profit - self.entry_price).abs()
    }
}
