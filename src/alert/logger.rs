use super::{format_alert_message, AlertError, AlertSink};
use crate::signal::Signal;
use async_trait::async_trait;

/// Writes alerts to the log; used when no Telegram chat is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerter;

impl LogAlerter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSink for LogAlerter {
    async fn send_signal(&self, signal: &Signal, chart: Option<&[u8]>) -> Result<(), AlertError> {
        tracing::info!(
            instrument = %signal.instrument,
            timeframe = %signal.timeframe,
            direction = %signal.direction,
            entry = %signal.entry_price,
            stop_loss = %signal.stop_loss,
            take_profit = %signal.take_profit,
            adx = %signal.adx,
            stop_pips = %signal.stop_distance_pips.round_dp(1),
            chart_bytes = chart.map(<[u8]>::len),
            "{}",
            format_alert_message(signal)
        );
        Ok(())
    }

    async fn send_notice(&self, text: &str) -> Result<(), AlertError> {
        tracing::warn!(notice = %text, "Operator notice");
        Ok(())
    }
}
