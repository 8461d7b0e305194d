//! Process-wide shutdown broadcast
//!
//! A `watch<bool>` flipped to `true` once. Every long-lived task holds a
//! receiver and stops when it observes the flag or the sender is dropped.

use tokio::sync::watch;

/// Sending half, owned by the process entry point
#[derive(Debug, Clone)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    /// Signal every listener to stop
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// Create a trigger and its first listener
pub fn channel() -> (ShutdownTrigger, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), rx)
}

/// Resolve once shutdown is requested (or the trigger is gone)
pub async fn wait(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Check the flag without waiting
pub fn is_triggered(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}
