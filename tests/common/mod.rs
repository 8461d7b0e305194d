//! In-process mock of the market-data provider

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crossover_alert::ws::{ConnectionHandle, ConnectionState, WsConfig};

pub const GOOD_TOKEN: &str = "good-token";

/// Symbol the mock never answers
pub const SILENT_SYMBOL: &str = "frxSILENT";

/// Symbol the mock rejects with an error envelope
pub const BAD_SYMBOL: &str = "frxBAD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Normal,
    /// Close the first connection right after authorizing it
    DropFirstAfterAuth,
    /// Stop reading after authorizing, so pings are never answered
    IgnorePings,
    /// Follow the authorize acknowledgment with an error tied to no request
    UnsolicitedError,
}

/// Error envelope sent by [`Behaviour::UnsolicitedError`]
pub fn unsolicited_error() -> Value {
    json!({
        "msg_type": "website_status",
        "error": {"code": "InternalServerError", "message": "Temporary server issue."},
    })
}

pub struct MockProvider {
    pub url: String,
    connections: Arc<AtomicUsize>,
}

impl MockProvider {
    pub async fn start(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let conn_no = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::spawn(serve(stream, conn_no, behaviour));
            }
        });

        Self {
            url: format!("ws://{addr}/"),
            connections,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Client settings with short delays suited to tests
    pub fn ws_config(&self) -> WsConfig {
        WsConfig::new(self.url.clone())
            .reconnect_delay(Duration::from_millis(50))
            .ping_interval(Duration::from_secs(5))
            .pong_timeout(Duration::from_secs(2))
    }
}

async fn serve(stream: TcpStream, conn_no: usize, behaviour: Behaviour) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        if let Some(token) = request.get("authorize").and_then(Value::as_str) {
            let reply = authorize_reply(token);
            let rejected = token != GOOD_TOKEN;
            if ws.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
            if rejected
                || (behaviour == Behaviour::DropFirstAfterAuth && conn_no == 1)
            {
                let _ = ws.close(None).await;
                return;
            }
            match behaviour {
                Behaviour::IgnorePings => {
                    // Pongs are only written while the stream is read
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    return;
                }
                Behaviour::UnsolicitedError => {
                    let notice = Message::Text(unsolicited_error().to_string());
                    if ws.send(notice).await.is_err() {
                        return;
                    }
                }
                Behaviour::Normal | Behaviour::DropFirstAfterAuth => {}
            }
            continue;
        }

        if let Some(symbol) = request.get("ticks_history").and_then(Value::as_str) {
            let reply = match symbol {
                SILENT_SYMBOL => continue,
                BAD_SYMBOL => json!({
                    "msg_type": "candles",
                    "echo_req": request,
                    "error": {"code": "InvalidSymbol", "message": "Symbol frxBAD is invalid."},
                    "req_id": request.get("req_id"),
                }),
                _ => candles_reply(&request),
            };
            if ws.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
        }
    }
}

fn authorize_reply(token: &str) -> Value {
    if token == GOOD_TOKEN {
        json!({
            "msg_type": "authorize",
            "echo_req": {"authorize": "<redacted>"},
            "authorize": {"loginid": "VRTC1234", "currency": "USD"},
        })
    } else {
        json!({
            "msg_type": "authorize",
            "echo_req": {"authorize": "<redacted>"},
            "error": {"code": "InvalidToken", "message": "The token is invalid."},
        })
    }
}

/// Flat-shape history response, newest candle first
fn candles_reply(request: &Value) -> Value {
    let count = request["count"].as_u64().unwrap_or(10) as i64;
    let granularity = request["granularity"].as_i64().unwrap_or(60);
    let end = request["end"].as_i64().unwrap_or(1_700_000_000);
    let last_open = end - end % granularity;

    let candles: Vec<Value> = (0..count)
        .rev()
        .map(|i| {
            let base = 1.1 + i as f64 * 0.0001;
            json!({
                "epoch": last_open - (count - 1 - i) * granularity,
                "open": format!("{:.5}", base),
                "high": format!("{:.5}", base + 0.0004),
                "low": format!("{:.5}", base - 0.0004),
                "close": format!("{:.5}", base + 0.0001),
            })
        })
        .collect();

    json!({
        "msg_type": "candles",
        "echo_req": request,
        "candles": candles,
        "req_id": request.get("req_id"),
    })
}

/// Wait until the connection reaches `target`
pub async fn wait_for_state(handle: &ConnectionHandle, target: ConnectionState) {
    let mut rx: watch::Receiver<ConnectionState> = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == target))
        .await
        .unwrap_or_else(|_| panic!("connection never reached {target}"))
        .unwrap();
}
