//! Alert delivery
//!
//! Signals and operator notices go to an [`AlertSink`]. Chart images are
//! produced by an optional [`ChartRenderer`] and passed along as opaque bytes.

mod logger;
mod telegram;

pub use self::logger::LogAlerter;
pub use self::telegram::{TelegramAlerter, TelegramConfig, TELEGRAM_API_URL};

use crate::signal::Signal;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Alert API error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("Chart rendering failed: {0}")]
    Chart(String),
}

/// Destination for signals and operator notices
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver a signal, with its chart when one was rendered
    async fn send_signal(&self, signal: &Signal, chart: Option<&[u8]>) -> Result<(), AlertError>;

    /// Deliver a free-form operator notice
    async fn send_notice(&self, text: &str) -> Result<(), AlertError>;
}

/// Renders a signal's chart data to an image
pub trait ChartRenderer: Send + Sync {
    fn render(&self, signal: &Signal) -> Result<Vec<u8>, AlertError>;
}

/// One-line alert text in Telegram Markdown
pub fn format_alert_message(signal: &Signal) -> String {
    format!(
        "{} *{} {} Alert!* | Timeframe: {} | Hold: {} | Entry: {:.5} | SL: {:.5} | TP: {:.5}",
        signal.direction.emoji(),
        signal.instrument,
        signal.direction.action(),
        signal.timeframe,
        signal.suggested_holding_time,
        signal.entry_price,
        signal.stop_loss,
        signal.take_profit,
    )
}
