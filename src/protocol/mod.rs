//! Market-data provider wire protocol
//!
//! JSON envelopes exchanged with the Deriv/Binary WebSocket API:
//! - Outbound: authorization and candle history requests
//! - Inbound: authorization acks, error envelopes and candle history responses

mod inbound;
mod outbound;

pub use inbound::{decode, ApiError, CandlesPayload, Inbound, ProtocolError, RawCandle};
pub use outbound::{AuthorizeRequest, HistoryRequest};

/// Provider error codes that mean the access token will never be accepted
pub const AUTH_REJECTION_CODES: &[&str] =
    &["InvalidToken", "AuthorizationRequired", "InvalidAppID"];

/// Check whether an error code rejects the credentials themselves
pub fn is_auth_rejection(code: &str) -> bool {
    AUTH_REJECTION_CODES.contains(&code)
}
