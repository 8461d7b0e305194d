//! WebSocket connection types and configuration

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default provider endpoint
pub const DEFAULT_ENDPOINT: &str = "wss://ws.binaryws.com/websockets/v3";

/// Default application identifier
pub const DEFAULT_APP_ID: &str = "1089";

/// Connection manager configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket endpoint without query string
    pub endpoint: String,
    /// Application identifier appended as `app_id`
    pub app_id: String,
    /// Fixed delay before reconnecting after a transport failure
    pub reconnect_delay: Duration,
    /// Consecutive transport failures before giving up (0 = infinite)
    pub max_reconnect_attempts: u32,
    /// Interval for sending ping frames
    pub ping_interval: Duration,
    /// Timeout for pong response
    pub pong_timeout: Duration,
    /// Timeout for establishing the transport
    pub connect_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id: DEFAULT_APP_ID.to_string(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 0,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl WsConfig {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the application identifier
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Set the reconnection delay
    pub fn reconnect_delay(mut self, d: Duration) -> Self {
        self.reconnect_delay = d;
        self
    }

    /// Set maximum consecutive reconnection attempts
    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    /// Set pong timeout
    pub fn pong_timeout(mut self, d: Duration) -> Self {
        self.pong_timeout = d;
        self
    }

    /// Full URL including the application identifier
    pub fn connection_url(&self) -> String {
        format!("{}?app_id={}", self.endpoint, self.app_id)
    }
}

/// Lifecycle of the provider connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; a reconnect may be pending
    Disconnected,
    /// Transport being established
    Connecting,
    /// Transport open, waiting for the authorization answer
    Authenticating,
    /// Authorized; requests may be sent
    Ready,
    /// Credentials rejected; terminal for the current token
    Failed,
}

impl ConnectionState {
    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// WebSocket errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WsError {
    /// Transport could not be established or broke
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// No pong arrived within the keep-alive timeout
    #[error("Pong timeout")]
    PongTimeout,
    /// Operation requires a ready connection
    #[error("Not connected")]
    NotConnected,
    /// Provider rejected the access token
    #[error("Authorization rejected: {code} - {message}")]
    AuthRejected { code: String, message: String },
    /// Maximum reconnection attempts exceeded
    #[error("Maximum reconnection attempts exceeded")]
    MaxReconnectsExceeded,
    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),
}
