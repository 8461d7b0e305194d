//! Sweep command implementation

use super::{join_receiver, wait_until_ready, Bot};
use crate::config::Config;
use crate::shutdown;
use clap::Args;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Seconds to wait for the connection to become ready
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,
}

impl SweepArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let Bot {
            manager,
            connection,
            correlator,
            scheduler,
            ..
        } = Bot::build(&config)?;

        let (trigger, mut shutdown_rx) = shutdown::channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let driver = tokio::spawn(manager.run(inbound_tx, shutdown_rx.clone()));
        let receiver = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.run_message_loop(inbound_rx).await })
        };

        let limit = Duration::from_secs(self.connect_timeout);
        let ready = wait_until_ready(&connection, &mut shutdown_rx, Some(limit)).await;

        let result = if ready {
            let report = scheduler.sweep(&mut shutdown_rx).await;
            println!(
                "Sweep finished: {} pairs, {} signals, {} failures",
                report.processed, report.signals, report.failures
            );
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Connection not ready (state: {})",
                connection.state()
            ))
        };

        trigger.trigger();
        correlator.shutdown();
        match driver.await {
            Ok(Err(e)) if result.is_ok() => return Err(e.into()),
            Ok(Err(e)) => tracing::error!(error = %e, "Connection driver failed"),
            _ => {}
        }
        join_receiver(receiver).await;

        result
    }
}
