//! Synchronous-looking candle fetches over the asynchronous connection

use super::pending::{PendingRequest, PendingTable};
use super::{CandleSource, FetchError};
use crate::market::{validate_instrument, Bar, BarSeries, PairKey, Timeframe};
use crate::protocol::{self, CandlesPayload, HistoryRequest, Inbound};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use crate::ws::{ConnectionHandle, ConnectionState};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, Instant};

/// Default number of bars per request
pub const DEFAULT_CANDLE_COUNT: usize = 100;

/// Default response deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Bridges the inbound message stream to callers awaiting candle history
///
/// Each fetch registers a one-shot completion slot before its request is
/// sent; the receive path ([`RequestCorrelator::run_message_loop`]) resolves
/// it exactly once. At most one fetch per (instrument, timeframe) may be in
/// flight; a second one fails with [`FetchError::AlreadyPending`].
pub struct RequestCorrelator {
    connection: ConnectionHandle,
    pending: PendingTable,
    timeout: Duration,
    next_req_id: AtomicU64,
}

impl RequestCorrelator {
    /// Create a correlator with the default deadline
    pub fn new(connection: ConnectionHandle) -> Self {
        Self::with_timeout(connection, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a correlator with a custom response deadline
    pub fn with_timeout(connection: ConnectionHandle, timeout: Duration) -> Self {
        Self {
            connection,
            pending: PendingTable::new(),
            timeout,
            next_req_id: AtomicU64::new(1),
        }
    }

    /// Number of requests currently awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Fetch the `count` most recent bars for a pair
    pub async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<BarSeries, FetchError> {
        let timeframe: Timeframe = timeframe
            .parse()
            .map_err(|_| FetchError::InvalidTimeframe(timeframe.to_string()))?;
        if !validate_instrument(instrument) {
            return Err(FetchError::InvalidInstrument(instrument.to_string()));
        }
        if self.pending.is_closed() {
            return Err(FetchError::Cancelled);
        }
        if !self.connection.is_ready() {
            return Err(FetchError::NotConnected);
        }

        let key = PairKey::new(instrument, timeframe);
        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        let (slot, rx) = oneshot::channel();

        self.pending
            .register(key.clone(), PendingRequest::new(req_id, count, slot))?;

        // Subscribe before sending so a drop right after the write is seen
        let mut state_rx = self.connection.subscribe();
        let request = HistoryRequest::new(instrument, timeframe, count, Utc::now(), req_id);
        if let Err(e) = self.connection.send(&request) {
            self.pending.remove(&key, req_id);
            return Err(e.into());
        }

        tracing::debug!(key = %key, req_id, count, "Requested candle history");
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            res = rx => res.unwrap_or(Err(FetchError::Cancelled)),
            _ = wait_until_not_ready(&mut state_rx) => Err(FetchError::ConnectionLost),
            _ = sleep(self.timeout) => Err(FetchError::Timeout {
                key: key.clone(),
                after: self.timeout,
            }),
        };

        // Late responses must not find a slot
        self.pending.remove(&key, req_id);

        match &outcome {
            Ok(series) => {
                telemetry::increment(CounterMetric::FetchSucceeded);
                telemetry::record_latency(LatencyMetric::CandleFetch, started.elapsed());
                tracing::debug!(key = %key, bars = series.len(), "Candle history received");
            }
            Err(e) => {
                telemetry::increment(CounterMetric::FetchFailed);
                tracing::debug!(key = %key, error = %e, "Candle fetch failed");
            }
        }

        outcome
    }

    /// Drain inbound messages in arrival order until the connection goes away
    ///
    /// Pending requests are released with [`FetchError::Cancelled`] on exit.
    pub async fn run_message_loop(&self, mut inbound: mpsc::Receiver<String>) {
        while let Some(text) = inbound.recv().await {
            self.handle_message(&text);
        }
        tracing::debug!("Inbound channel closed, stopping receive path");
        self.shutdown();
    }

    /// Route one inbound message to the request it answers
    ///
    /// Never fails: malformed, unmatched and unsolicited messages are logged
    /// and dropped.
    pub fn handle_message(&self, text: &str) {
        let msg = match protocol::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                telemetry::increment(CounterMetric::ProtocolError);
                tracing::warn!(
                    error = %e,
                    msg_preview = %text.chars().take(100).collect::<String>(),
                    "Dropping malformed message"
                );
                return;
            }
        };

        match msg {
            Inbound::Candles(payload) => self.resolve_candles(payload),
            Inbound::Error {
                error,
                msg_type,
                symbol,
                granularity,
                req_id,
            } => {
                let key = symbol.zip(granularity.and_then(|g| Timeframe::from_granularity(g).ok()));
                let pending = match (key, req_id) {
                    (Some((symbol, timeframe)), _) => {
                        let key = PairKey::new(symbol, timeframe);
                        self.pending.take(&key, req_id).map(|p| (key, p))
                    }
                    (None, Some(id)) => self.pending.take_by_req_id(id),
                    (None, None) => None,
                };

                match pending {
                    Some((key, pending)) => {
                        tracing::warn!(key = %key, code = %error.code, message = %error.message, "Provider rejected candle request");
                        pending.resolve(Err(FetchError::Provider {
                            code: error.code,
                            message: error.message,
                        }));
                    }
                    None => {
                        tracing::warn!(
                            msg_type = ?msg_type,
                            code = %error.code,
                            message = %error.message,
                            "Provider error not tied to a pending request"
                        );
                    }
                }
            }
            Inbound::Undecodable { req_id, error } => {
                telemetry::increment(CounterMetric::ProtocolError);
                match self.pending.take_by_req_id(req_id) {
                    Some((key, pending)) => {
                        tracing::warn!(key = %key, error = %error, "Malformed candle response");
                        pending.resolve(Err(FetchError::Decode(error.to_string())));
                    }
                    None => {
                        tracing::warn!(req_id, error = %error, "Dropping malformed response");
                    }
                }
            }
            Inbound::Authorized | Inbound::Pong => {}
            Inbound::Other(msg_type) => {
                tracing::trace!(msg_type = %msg_type, "Ignoring unsolicited message");
            }
        }
    }

    fn resolve_candles(&self, payload: CandlesPayload) {
        let Some(timeframe) = payload.timeframe() else {
            tracing::warn!(
                symbol = %payload.symbol,
                granularity = payload.granularity,
                "Candles with unsupported granularity"
            );
            return;
        };

        let key = PairKey::new(payload.symbol.clone(), timeframe);
        let Some(pending) = self.pending.take(&key, payload.req_id) else {
            tracing::debug!(key = %key, req_id = ?payload.req_id, "Dropping unmatched candles");
            return;
        };

        let bars: Result<Vec<Bar>, _> = payload.candles.iter().map(|c| c.to_bar()).collect();
        let outcome = match bars {
            Ok(bars) => Ok(BarSeries::from_unordered(key, bars, pending.count)),
            Err(e) => {
                telemetry::increment(CounterMetric::ProtocolError);
                Err(FetchError::Decode(e.to_string()))
            }
        };

        pending.resolve(outcome);
    }

    /// Release every pending request and refuse new ones
    pub fn shutdown(&self) {
        let drained = self.pending.close();
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Cancelling pending requests");
        }
        for (_, pending) in drained {
            pending.resolve(Err(FetchError::Cancelled));
        }
    }
}

/// Resolve once the connection is no longer ready
async fn wait_until_not_ready(state_rx: &mut watch::Receiver<ConnectionState>) {
    let _ = state_rx.wait_for(|s| !s.is_ready()).await;
}

#[async_trait]
impl CandleSource for RequestCorrelator {
    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<BarSeries, FetchError> {
        RequestCorrelator::fetch_candles(self, instrument, timeframe, count).await
    }
}
