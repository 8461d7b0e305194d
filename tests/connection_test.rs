//! Integration tests for the connection manager

mod common;

use common::{unsolicited_error, wait_for_state, Behaviour, MockProvider, GOOD_TOKEN};
use crossover_alert::shutdown;
use crossover_alert::ws::{ConnectionManager, ConnectionState, WsError};
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_authorize_then_ready() {
    let provider = MockProvider::start(Behaviour::Normal).await;
    let manager = ConnectionManager::new(provider.ws_config(), GOOD_TOKEN);
    let handle = manager.handle();
    let (inbound_tx, mut inbound_rx) = mpsc::channel(16);
    let (trigger, shutdown_rx) = shutdown::channel();

    let driver = tokio::spawn(manager.run(inbound_tx, shutdown_rx));
    wait_for_state(&handle, ConnectionState::Ready).await;

    // The authorize acknowledgment is forwarded like any other frame
    let first = inbound_rx.recv().await.unwrap();
    assert!(first.contains("\"authorize\""));

    trigger.trigger();
    let result = tokio::time::timeout(Duration::from_secs(2), driver)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, Ok(()));
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_rejected_token_is_terminal() {
    let provider = MockProvider::start(Behaviour::Normal).await;
    let manager = ConnectionManager::new(provider.ws_config(), "wrong-token");
    let handle = manager.handle();
    let (inbound_tx, _inbound_rx) = mpsc::channel(16);
    let (_trigger, shutdown_rx) = shutdown::channel();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        manager.run(inbound_tx, shutdown_rx),
    )
    .await
    .expect("driver should stop on its own");

    assert!(matches!(
        result,
        Err(WsError::AuthRejected { ref code, .. }) if code == "InvalidToken"
    ));
    assert_eq!(handle.state(), ConnectionState::Failed);

    // No retry with the same credentials
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(provider.connections(), 1);
}

#[tokio::test]
async fn test_reconnects_after_remote_close() {
    let provider = MockProvider::start(Behaviour::DropFirstAfterAuth).await;
    let manager = ConnectionManager::new(provider.ws_config(), GOOD_TOKEN);
    let handle = manager.handle();
    let (inbound_tx, mut inbound_rx) = mpsc::channel(16);
    let (trigger, shutdown_rx) = shutdown::channel();

    tokio::spawn(async move { while inbound_rx.recv().await.is_some() {} });
    let driver = tokio::spawn(manager.run(inbound_tx, shutdown_rx));

    tokio::time::timeout(Duration::from_secs(5), async {
        while provider.connections() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("manager should reconnect");
    wait_for_state(&handle, ConnectionState::Ready).await;

    trigger.trigger();
    assert_eq!(driver.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_send_before_ready_is_rejected() {
    let provider = MockProvider::start(Behaviour::Normal).await;
    let manager = ConnectionManager::new(provider.ws_config(), GOOD_TOKEN);
    let handle = manager.handle();

    assert_eq!(
        handle.send(&serde_json::json!({"ticks_history": "frxEURUSD"})),
        Err(WsError::NotConnected)
    );
}

#[tokio::test]
async fn test_missed_pong_drops_and_reconnects() {
    let provider = MockProvider::start(Behaviour::IgnorePings).await;
    let config = provider
        .ws_config()
        .ping_interval(Duration::from_millis(100))
        .pong_timeout(Duration::from_millis(200));
    let manager = ConnectionManager::new(config, GOOD_TOKEN);
    let handle = manager.handle();
    let mut state_rx = handle.subscribe();
    let (inbound_tx, mut inbound_rx) = mpsc::channel(16);
    let (trigger, shutdown_rx) = shutdown::channel();

    tokio::spawn(async move { while inbound_rx.recv().await.is_some() {} });
    let driver = tokio::spawn(manager.run(inbound_tx, shutdown_rx));
    wait_for_state(&handle, ConnectionState::Ready).await;

    // No pong within ping_interval + pong_timeout takes the link down
    tokio::time::timeout(
        Duration::from_secs(2),
        state_rx.wait_for(|s| !s.is_ready()),
    )
    .await
    .expect("missed pong should leave Ready")
    .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while provider.connections() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("manager should reconnect after a missed pong");

    trigger.trigger();
    assert_eq!(driver.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_unsolicited_error_keeps_session() {
    let provider = MockProvider::start(Behaviour::UnsolicitedError).await;
    let manager = ConnectionManager::new(provider.ws_config(), GOOD_TOKEN);
    let handle = manager.handle();
    let (inbound_tx, mut inbound_rx) = mpsc::channel(16);
    let (trigger, shutdown_rx) = shutdown::channel();

    let driver = tokio::spawn(manager.run(inbound_tx, shutdown_rx));
    wait_for_state(&handle, ConnectionState::Ready).await;

    let ack = inbound_rx.recv().await.unwrap();
    assert!(ack.contains("\"authorize\""));
    let error: serde_json::Value = serde_json::from_str(&inbound_rx.recv().await.unwrap()).unwrap();
    assert_eq!(error, unsolicited_error());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.state(), ConnectionState::Ready);
    assert_eq!(provider.connections(), 1);

    trigger.trigger();
    assert_eq!(driver.await.unwrap(), Ok(()));
}
