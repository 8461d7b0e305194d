//! Scheduler types

use crate::alert::AlertError;
use crate::config::Config;
use crate::correlator::FetchError;
use crate::indicators::{IndicatorError, IndicatorPeriods};
use crate::market::{PairKey, Timeframe};
use std::time::Duration;
use thiserror::Error;

/// Static inputs of the sweep loop
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub instruments: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    /// Bars requested per pair
    pub candle_count: usize,
    pub periods: IndicatorPeriods,
    /// Pause between consecutive pairs
    pub pair_delay: Duration,
    /// Pause after a full sweep
    pub sweep_interval: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            instruments: config.strategy.instruments.clone(),
            timeframes: config.strategy.timeframes.clone(),
            candle_count: config.provider.candle_count,
            periods: config.strategy.periods(),
            pair_delay: config.scheduler.pair_delay(),
            sweep_interval: config.scheduler.sweep_interval(),
        }
    }

    /// Pairs in sweep order: instruments outer, timeframes inner
    pub fn pairs(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.instruments.iter().flat_map(move |instrument| {
            self.timeframes
                .iter()
                .map(move |tf| PairKey::new(instrument.clone(), *tf))
        })
    }

    pub fn pair_count(&self) -> usize {
        self.instruments.len() * self.timeframes.len()
    }
}

/// Why a pair produced no alert this sweep
#[derive(Debug, Error)]
pub enum PairError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Indicators failed: {0}")]
    Indicator(#[from] IndicatorError),
    #[error("Alert delivery failed: {0}")]
    Alert(#[from] AlertError),
}

/// Outcome counts for one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pairs attempted
    pub processed: usize,
    /// Signals detected
    pub signals: usize,
    /// Pairs that failed
    pub failures: usize,
    /// Stopped early by shutdown
    pub interrupted: bool,
}
