//! Provider connection with authorization, keep-alive and reconnection

use super::types::{ConnectionState, WsConfig, WsError};
use crate::protocol::{self, AuthorizeRequest, Inbound};
use crate::shutdown;
use crate::telemetry::{self, CounterMetric};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Capacity of the outbound request queue
const OUTBOUND_BUFFER: usize = 256;

/// Cheap, cloneable access to a running connection
///
/// Readers observe the connection state; writers enqueue requests for the
/// driver task. Only the [`ConnectionManager`] mutates the state.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::Sender<String>,
}

impl ConnectionHandle {
    #[cfg(test)]
    pub(crate) fn from_parts(
        state: watch::Receiver<ConnectionState>,
        outbound: mpsc::Sender<String>,
    ) -> Self {
        Self { state, outbound }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Receiver that observes every state transition
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Enqueue a request for the provider
    ///
    /// Fails with [`WsError::NotConnected`] unless the connection is ready;
    /// nothing is written in that case.
    pub fn send<T: Serialize>(&self, request: &T) -> Result<(), WsError> {
        if !self.is_ready() {
            return Err(WsError::NotConnected);
        }

        let text =
            serde_json::to_string(request).map_err(|e| WsError::SendFailed(e.to_string()))?;

        self.outbound.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                WsError::SendFailed("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => WsError::NotConnected,
        })
    }
}

/// How a single connected session ended without a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Shutdown requested
    Shutdown,
    /// Provider sent a close frame
    RemoteClosed,
    /// Nobody is consuming inbound messages anymore
    InboundClosed,
}

/// Owns the single provider connection
///
/// The driver ([`ConnectionManager::run`]) walks the state machine
/// Disconnected → Connecting → Authenticating → Ready, forwards every inbound
/// text frame to the receive path, and reconnects after a fixed delay when
/// the transport drops. A rejected token moves it to Failed and stops it.
pub struct ConnectionManager {
    config: WsConfig,
    token: String,
    state: watch::Sender<ConnectionState>,
    outbound_rx: mpsc::Receiver<String>,
    handle: ConnectionHandle,
}

impl ConnectionManager {
    /// Create a manager in the Disconnected state
    pub fn new(config: WsConfig, token: impl Into<String>) -> Self {
        let (state, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);

        Self {
            config,
            token: token.into(),
            state,
            outbound_rx,
            handle: ConnectionHandle {
                state: state_rx,
                outbound: outbound_tx,
            },
        }
    }

    /// Handle for senders and state observers
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::info!(from = %prev, to = %next, "Connection state changed");
            telemetry::set_connection_state(next);
        }
    }

    /// Drop requests queued for a connection that no longer exists
    fn discard_stale_requests(&mut self) {
        let mut dropped = 0usize;
        while self.outbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Discarded requests queued before reconnect");
        }
    }

    /// Run the connection until shutdown or credential rejection
    ///
    /// Inbound text frames go to `inbound` in arrival order.
    pub async fn run(
        mut self,
        inbound: mpsc::Sender<String>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), WsError> {
        let mut failures = 0u32;

        loop {
            if shutdown::is_triggered(&shutdown_rx) {
                break;
            }

            self.discard_stale_requests();
            self.set_state(ConnectionState::Connecting);

            let result = self.connect_and_stream(&inbound, &mut shutdown_rx).await;
            let was_ready = self.state().is_ready();

            let reason = match result {
                Ok(SessionEnd::Shutdown) | Ok(SessionEnd::InboundClosed) => break,
                Ok(SessionEnd::RemoteClosed) => "remote closed the connection".to_string(),
                Err(WsError::AuthRejected { code, message }) => {
                    self.set_state(ConnectionState::Failed);
                    tracing::error!(
                        code = %code,
                        message = %message,
                        "Provider rejected the API token; not reconnecting with the same credentials"
                    );
                    return Err(WsError::AuthRejected { code, message });
                }
                Err(e) => e.to_string(),
            };

            self.set_state(ConnectionState::Disconnected);
            telemetry::increment(CounterMetric::Reconnect);

            failures = if was_ready { 1 } else { failures + 1 };
            if self.config.max_reconnect_attempts > 0
                && failures >= self.config.max_reconnect_attempts
            {
                tracing::error!(failures, "Max reconnection attempts reached");
                return Err(WsError::MaxReconnectsExceeded);
            }

            tracing::warn!(
                reason = %reason,
                attempt = failures,
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "Connection lost, reconnecting..."
            );

            tokio::select! {
                _ = sleep(self.config.reconnect_delay) => {}
                _ = shutdown::wait(&mut shutdown_rx) => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Connection manager stopped");
        Ok(())
    }

    /// React to a message received while waiting for the authorization answer
    fn handle_auth_reply(&self, text: &str) -> Result<(), WsError> {
        match protocol::decode(text) {
            Ok(Inbound::Authorized) => {
                tracing::info!("Authorization successful");
                self.set_state(ConnectionState::Ready);
                Ok(())
            }
            Ok(msg @ Inbound::Error { .. }) => {
                let auth_error = msg.is_authorize_error();
                let Inbound::Error { error, .. } = msg else {
                    return Ok(());
                };
                if auth_error || protocol::is_auth_rejection(&error.code) {
                    Err(WsError::AuthRejected {
                        code: error.code,
                        message: error.message,
                    })
                } else {
                    tracing::warn!(code = %error.code, message = %error.message, "Provider error during authorization");
                    Ok(())
                }
            }
            Ok(other) => {
                tracing::debug!(message = ?other, "Ignoring message before authorization");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Malformed message during authorization");
                Ok(())
            }
        }
    }

    /// Connect, authorize and pump messages until the session ends
    async fn connect_and_stream(
        &mut self,
        inbound: &mpsc::Sender<String>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, WsError> {
        tracing::info!(endpoint = %self.config.endpoint, app_id = %self.config.app_id, "Connecting to WebSocket");

        let url = self.config.connection_url();
        let connect = tokio::time::timeout(self.config.connect_timeout, connect_async(url));

        let (ws_stream, _response) = tokio::select! {
            res = connect => res
                .map_err(|_| WsError::ConnectionFailed("connect timed out".into()))?
                .map_err(|e| WsError::ConnectionFailed(e.to_string()))?,
            _ = shutdown::wait(shutdown_rx) => return Ok(SessionEnd::Shutdown),
        };

        let (mut write, mut read) = ws_stream.split();

        tracing::info!("WebSocket connected");
        self.set_state(ConnectionState::Authenticating);

        let auth = serde_json::to_string(&AuthorizeRequest::new(self.token.as_str()))
            .map_err(|e| WsError::SendFailed(e.to_string()))?;
        write
            .send(Message::Text(auth))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))?;

        let mut ping_interval = tokio::time::interval(self.config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it
        ping_interval.tick().await;

        let mut pong_deadline: Option<Instant> = None;

        loop {
            let ready = self.state().is_ready();

            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if self.state() == ConnectionState::Authenticating {
                                self.handle_auth_reply(&text)?;
                            }
                            if inbound.send(text).await.is_err() {
                                tracing::debug!("Inbound receiver dropped, closing connection");
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(SessionEnd::InboundClosed);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            pong_deadline = None;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(frame = ?frame, "Received close frame");
                            return Ok(SessionEnd::RemoteClosed);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            tracing::debug!(len = data.len(), "Ignoring binary frame");
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()));
                        }
                    }
                }

                // Requests are only written once authorized
                msg = self.outbound_rx.recv(), if ready => {
                    match msg {
                        Some(text) => {
                            write.send(Message::Text(text)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        None => return Ok(SessionEnd::Shutdown),
                    }
                }

                _ = ping_interval.tick() => {
                    if pong_deadline.is_none() {
                        write.send(Message::Ping(vec![])).await
                            .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        pong_deadline = Some(Instant::now() + self.config.pong_timeout);
                    }
                }

                _ = async {
                    match pong_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => {
                    return Err(WsError::PongTimeout);
                }

                _ = shutdown::wait(shutdown_rx) => {
                    tracing::info!("Closing connection for shutdown");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }
}
