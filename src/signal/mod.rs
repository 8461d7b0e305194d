//! Signal generation module
//!
//! Detects fresh moving-average crossovers confirmed by trend and ADX

mod detector;
mod types;

pub use detector::{DetectorThresholds, SignalDetector};
pub use types::{ChartData, Direction, Signal};
