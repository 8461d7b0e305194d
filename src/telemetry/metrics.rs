//! Prometheus metrics

use crate::ws::ConnectionState;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Candle history round trip
    CandleFetch,
    /// Full pass over the instrument × timeframe matrix
    Sweep,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Candle fetch resolved with data
    FetchSucceeded,
    /// Candle fetch failed (timeout, provider error, connection loss)
    FetchFailed,
    /// Long crossover detected
    SignalLong,
    /// Short crossover detected
    SignalShort,
    /// Transport dropped and a reconnect was scheduled
    Reconnect,
    /// Inbound message could not be decoded
    ProtocolError,
    /// Alert delivery failed
    AlertFailed,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::CandleFetch => "crossover_candle_fetch_latency_ms",
            LatencyMetric::Sweep => "crossover_sweep_duration_ms",
        }
    }
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::FetchSucceeded => "crossover_fetch_succeeded_total",
            CounterMetric::FetchFailed => "crossover_fetch_failed_total",
            CounterMetric::SignalLong => "crossover_signal_long_total",
            CounterMetric::SignalShort => "crossover_signal_short_total",
            CounterMetric::Reconnect => "crossover_reconnect_total",
            CounterMetric::ProtocolError => "crossover_protocol_error_total",
            CounterMetric::AlertFailed => "crossover_alert_failed_total",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    ::metrics::histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    ::metrics::counter!(metric.name()).increment(1);
}

/// Publish the connection state as a numeric gauge
pub fn set_connection_state(state: ConnectionState) {
    let value = match state {
        ConnectionState::Disconnected => 0.0,
        ConnectionState::Connecting => 1.0,
        ConnectionState::Authenticating => 2.0,
        ConnectionState::Ready => 3.0,
        ConnectionState::Failed => -1.0,
    };
    ::metrics::gauge!("crossover_connection_state").set(value);
}

/// Install the Prometheus exporter with an HTTP listener on `port`
pub fn init_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}
