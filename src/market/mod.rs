//! Market data model
//!
//! OHLC bars, bar series keyed by (instrument, timeframe), and the fixed
//! timeframe → granularity table used by the provider.

mod bar;
mod instrument;
mod timeframe;

pub use bar::{Bar, BarSeries, SeriesError};
pub use instrument::{pip_factor, validate_instrument};
pub use timeframe::{Timeframe, TimeframeError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key identifying one watched pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairKey {
    /// Provider symbol (e.g., "frxEURUSD")
    pub instrument: String,
    /// Bar timeframe
    pub timeframe: Timeframe,
}

impl PairKey {
    /// Create a new pair key
    pub fn new(instrument: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument, self.timeframe)
    }
}
