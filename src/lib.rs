//! crossover-alert: moving-average crossover alerts over a streaming market-data connection
//!
//! This library provides the core components for:
//! - A single authenticated WebSocket connection with reconnect and keep-alive
//! - Request/response correlation for candle history over that connection
//! - EMA, ADX and ATR indicators in exact decimal arithmetic
//! - Fresh crossover detection with trend and strength filters
//! - Periodic sweeps over instrument × timeframe pairs
//! - Telegram or log-only alert delivery
//! - Full observability stack

pub mod alert;
pub mod cli;
pub mod config;
pub mod correlator;
pub mod indicators;
pub mod market;
pub mod protocol;
pub mod scheduler;
pub mod shutdown;
pub mod signal;
pub mod telemetry;
pub mod ws;
