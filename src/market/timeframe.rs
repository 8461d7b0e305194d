//! Timeframe labels and provider granularity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported bar timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 15-minute bars
    M15,
    /// 30-minute bars
    M30,
    /// 1-hour bars
    H1,
    /// 4-hour bars
    H4,
}

/// Timeframe parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeframeError {
    /// Label is not one of the supported timeframes
    #[error("Invalid timeframe: {0}")]
    InvalidLabel(String),
    /// Granularity does not map to a supported timeframe
    #[error("Unsupported granularity: {0}s")]
    InvalidGranularity(u64),
}

impl Timeframe {
    /// All supported timeframes, shortest first
    pub const ALL: [Timeframe; 4] = [Timeframe::M15, Timeframe::M30, Timeframe::H1, Timeframe::H4];

    /// Bar duration in seconds as understood by the provider
    pub fn granularity(self) -> u64 {
        match self {
            Timeframe::M15 => 900,
            Timeframe::M30 => 1800,
            Timeframe::H1 => 3600,
            Timeframe::H4 => 14400,
        }
    }

    /// Map a provider granularity back to a timeframe
    pub fn from_granularity(secs: u64) -> Result<Self, TimeframeError> {
        Self::ALL
            .into_iter()
            .find(|tf| tf.granularity() == secs)
            .ok_or(TimeframeError::InvalidGranularity(secs))
    }

    /// Short label (e.g., "H1")
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
        }
    }

    /// Informational holding period shown with alerts
    pub fn holding_time(self) -> &'static str {
        match self {
            Timeframe::M15 => "~2 hours",
            Timeframe::M30 => "~4 hours",
            Timeframe::H1 => "~8 hours",
            Timeframe::H4 => "~18 hours",
        }
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            other => Err(TimeframeError::InvalidLabel(other.to_string())),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
