//! Correlator error types

use crate::market::PairKey;
use crate::ws::WsError;
use std::time::Duration;
use thiserror::Error;

/// Why a candle fetch produced no data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Timeframe label is not supported
    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),
    /// Instrument symbol cannot be sent to the provider
    #[error("Invalid instrument: {0:?}")]
    InvalidInstrument(String),
    /// Connection is not ready
    #[error("Not connected")]
    NotConnected,
    /// A fetch for the same pair is still in flight
    #[error("Request already pending for {0}")]
    AlreadyPending(PairKey),
    /// No response within the deadline
    #[error("No response for {key} within {after:?}")]
    Timeout { key: PairKey, after: Duration },
    /// Connection left Ready before the response arrived
    #[error("Connection lost while waiting for response")]
    ConnectionLost,
    /// Correlator shut down
    #[error("Request cancelled")]
    Cancelled,
    /// Provider answered with an error envelope
    #[error("Provider error: {code} - {message}")]
    Provider { code: String, message: String },
    /// Response matched but could not be decoded
    #[error("Malformed response: {0}")]
    Decode(String),
    /// Request could not be handed to the connection
    #[error("Send failed: {0}")]
    Send(String),
}

impl From<WsError> for FetchError {
    fn from(e: WsError) -> Self {
        match e {
            WsError::NotConnected => FetchError::NotConnected,
            other => FetchError::Send(other.to_string()),
        }
    }
}

impl FetchError {
    /// Configuration problems that will not go away by retrying
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidTimeframe(_) | FetchError::InvalidInstrument(_)
        )
    }
}
