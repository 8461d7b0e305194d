//! Market-data provider connection
//!
//! Owns the single WebSocket to the provider: authorization handshake,
//! ping/pong keep-alive, fixed-delay reconnection and a terminal failure
//! state for rejected credentials.

mod manager;
mod types;

pub use manager::{ConnectionHandle, ConnectionManager};
pub use types::{ConnectionState, WsConfig, WsError, DEFAULT_APP_ID, DEFAULT_ENDPOINT};
