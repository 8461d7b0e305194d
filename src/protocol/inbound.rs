//! Inbound envelope decoding

use crate::market::{Bar, Timeframe};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

/// Malformed or unexpected envelope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Not valid JSON or not an object
    #[error("Invalid JSON: {0}")]
    Json(String),
    /// Required field absent
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    /// Field present but not a number
    #[error("Invalid number in {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
    /// Epoch is not a valid unix timestamp
    #[error("Invalid epoch: {0}")]
    InvalidEpoch(String),
}

/// Error body of an error envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// One candle as sent by the provider
///
/// Fields are kept as raw JSON values so that a missing or bad field fails
/// only the request it belongs to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCandle {
    #[serde(default)]
    pub epoch: Value,
    #[serde(default)]
    pub open: Value,
    #[serde(default)]
    pub high: Value,
    #[serde(default)]
    pub low: Value,
    #[serde(default)]
    pub close: Value,
    #[serde(default)]
    pub volume: Option<Value>,
}

impl RawCandle {
    /// Wrap one element of a candle array; anything but an object has no fields
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Convert to a typed bar
    pub fn to_bar(&self) -> Result<Bar, ProtocolError> {
        if self.epoch.is_null() {
            return Err(ProtocolError::MissingField("epoch"));
        }
        let epoch = self
            .epoch
            .as_i64()
            .or_else(|| self.epoch.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| ProtocolError::InvalidEpoch(self.epoch.to_string()))?;
        let timestamp = Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| ProtocolError::InvalidEpoch(epoch.to_string()))?;

        let volume = match &self.volume {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| ProtocolError::InvalidNumber {
                    field: "volume",
                    value: v.to_string(),
                })?,
        };

        Ok(Bar::new(
            timestamp,
            parse_decimal("open", &self.open)?,
            parse_decimal("high", &self.high)?,
            parse_decimal("low", &self.low)?,
            parse_decimal("close", &self.close)?,
            volume,
        ))
    }
}

/// Parse a price that may arrive as a JSON number or a string
fn parse_decimal(field: &'static str, value: &Value) -> Result<Decimal, ProtocolError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Null => return Err(ProtocolError::MissingField(field)),
        other => {
            return Err(ProtocolError::InvalidNumber {
                field,
                value: other.to_string(),
            })
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ProtocolError::InvalidNumber { field, value: text })
}

/// Candle history response, normalised across envelope shapes
#[derive(Debug, Clone)]
pub struct CandlesPayload {
    pub symbol: String,
    pub granularity: u64,
    pub candles: Vec<RawCandle>,
    pub req_id: Option<u64>,
}

impl CandlesPayload {
    /// Timeframe matching the response granularity, if supported
    pub fn timeframe(&self) -> Option<Timeframe> {
        Timeframe::from_granularity(self.granularity).ok()
    }
}

/// Decoded inbound message
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Candle history response
    Candles(CandlesPayload),
    /// Error envelope, with whatever the echoed request says about its origin
    Error {
        error: ApiError,
        msg_type: Option<String>,
        symbol: Option<String>,
        granularity: Option<u64>,
        req_id: Option<u64>,
    },
    /// Response to request `req_id` that could not be decoded
    Undecodable { req_id: u64, error: ProtocolError },
    /// Authorization acknowledged
    Authorized,
    /// Application-level ping answer
    Pong,
    /// Anything else, by message type
    Other(String),
}

impl Inbound {
    /// Check whether this error envelope answers an authorize call
    pub fn is_authorize_error(&self) -> bool {
        matches!(self, Inbound::Error { msg_type: Some(t), .. } if t == "authorize")
    }
}

#[derive(Debug, Default, Deserialize)]
struct EchoReq {
    #[serde(default)]
    ticks_history: Option<String>,
    #[serde(default)]
    granularity: Option<u64>,
    #[serde(default)]
    authorize: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    msg_type: Option<String>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    echo_req: Option<EchoReq>,
    #[serde(default)]
    req_id: Option<u64>,
    #[serde(default)]
    ticks_history: Option<Value>,
    #[serde(default)]
    candles: Option<Value>,
    #[serde(default)]
    authorize: Option<Value>,
}

/// `{ ticks_history: { symbol, granularity, candles } }`
#[derive(Debug, Deserialize)]
struct NestedHistory {
    symbol: String,
    granularity: u64,
    #[serde(default)]
    candles: Option<Value>,
}

/// Split a candle array into per-candle values
fn candle_list(value: Value, field: &'static str) -> Result<Vec<RawCandle>, ProtocolError> {
    match value {
        Value::Array(items) => Ok(items.into_iter().map(RawCandle::from_value).collect()),
        Value::Null => Err(ProtocolError::MissingField(field)),
        other => Err(ProtocolError::Json(format!("{field} is not an array: {other}"))),
    }
}

/// Attach the request id to a failure so the waiting request can be released
fn with_req_id(
    result: Result<Inbound, ProtocolError>,
    req_id: Option<u64>,
) -> Result<Inbound, ProtocolError> {
    match (result, req_id) {
        (Err(error), Some(req_id)) => Ok(Inbound::Undecodable { req_id, error }),
        (result, _) => result,
    }
}

fn nested_history(nested: Value, req_id: Option<u64>) -> Result<Inbound, ProtocolError> {
    let history: NestedHistory =
        serde_json::from_value(nested).map_err(|e| ProtocolError::Json(e.to_string()))?;
    let candles = candle_list(
        history.candles.unwrap_or(Value::Null),
        "ticks_history.candles",
    )?;
    Ok(Inbound::Candles(CandlesPayload {
        symbol: history.symbol,
        granularity: history.granularity,
        candles,
        req_id,
    }))
}

/// `{ msg_type: "candles", candles, echo_req: { ticks_history, granularity } }`
fn flat_history(
    echo: EchoReq,
    candles: Value,
    req_id: Option<u64>,
) -> Result<Inbound, ProtocolError> {
    let symbol = echo
        .ticks_history
        .ok_or(ProtocolError::MissingField("echo_req.ticks_history"))?;
    let granularity = echo
        .granularity
        .ok_or(ProtocolError::MissingField("echo_req.granularity"))?;
    Ok(Inbound::Candles(CandlesPayload {
        symbol,
        granularity,
        candles: candle_list(candles, "candles")?,
        req_id,
    }))
}

/// Decode one inbound text frame
pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    let env: RawEnvelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::Json(e.to_string()))?;
    let echo = env.echo_req.unwrap_or_default();

    if let Some(error) = env.error {
        let msg_type = env.msg_type.or_else(|| {
            echo.authorize
                .as_ref()
                .map(|_| "authorize".to_string())
        });
        return Ok(Inbound::Error {
            error,
            msg_type,
            symbol: echo.ticks_history,
            granularity: echo.granularity,
            req_id: env.req_id,
        });
    }

    let req_id = env.req_id;

    if let Some(nested) = env.ticks_history.filter(Value::is_object) {
        return with_req_id(nested_history(nested, req_id), req_id);
    }

    if let Some(candles) = env.candles {
        return with_req_id(flat_history(echo, candles, req_id), req_id);
    }

    match env.msg_type.as_deref() {
        Some("authorize") => Ok(Inbound::Authorized),
        _ if env.authorize.is_some() => Ok(Inbound::Authorized),
        Some("ping") => Ok(Inbound::Pong),
        Some(other) => Ok(Inbound::Other(other.to_string())),
        None => Ok(Inbound::Other("unknown".to_string())),
    }
}
