//! Sweep scheduling
//!
//! Walks every configured (instrument, timeframe) pair in a fixed order,
//! fetches history, computes indicators, runs detection and forwards
//! signals to the alert sink.

mod runner;
mod types;

pub use runner::Scheduler;
pub use types::{PairError, SchedulerSettings, SweepReport};
