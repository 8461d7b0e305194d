//! Run command implementation

use super::{join_receiver, wait_until_ready, Bot};
use crate::config::Config;
use crate::shutdown;
use crate::ws::WsError;
use clap::Args;
use tokio::sync::mpsc;
use tokio::task::JoinError;

/// Inbound frames buffered between the socket and the receive path
const INBOUND_BUFFER: usize = 1024;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Start sweeping without waiting for the connection to become ready
    #[arg(long)]
    pub no_wait: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let Bot {
            manager,
            connection,
            correlator,
            scheduler,
            alerts,
        } = Bot::build(&config)?;

        let (trigger, shutdown_rx) = shutdown::channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        let mut driver = tokio::spawn(manager.run(inbound_tx, shutdown_rx.clone()));
        let receiver = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.run_message_loop(inbound_rx).await })
        };

        {
            let trigger = trigger.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl-C received, shutting down");
                    trigger.trigger();
                }
            });
        }

        tracing::info!(
            instruments = config.strategy.instruments.len(),
            timeframes = config.strategy.timeframes.len(),
            "Starting crossover alert bot"
        );

        let sweeps = {
            let mut shutdown_rx = shutdown_rx.clone();
            let no_wait = self.no_wait;
            let connection = connection.clone();
            let scheduler = &scheduler;
            async move {
                if no_wait || wait_until_ready(&connection, &mut shutdown_rx, None).await {
                    scheduler.run(shutdown_rx).await;
                }
            }
        };

        let mut driver_done = false;
        let outcome = tokio::select! {
            _ = sweeps => Ok(()),
            res = &mut driver => {
                driver_done = true;
                driver_outcome(res)
            }
        };

        trigger.trigger();
        correlator.shutdown();

        // Sweeps also end when the connection fails; the driver holds the reason
        let outcome = match outcome {
            Ok(()) if !driver_done => driver_outcome(driver.await),
            other => other,
        };

        if let Err(e) = &outcome {
            let notice = match e {
                WsError::AuthRejected { code, message } => format!(
                    "crossover-alert stopped: the provider rejected the API token ({code}: {message})"
                ),
                other => format!("crossover-alert stopped: {other}"),
            };
            if let Err(alert_err) = alerts.send_notice(&notice).await {
                tracing::error!(error = %alert_err, "Failed to deliver operator notice");
            }
        }

        join_receiver(receiver).await;

        tracing::info!("Shutdown complete");
        outcome.map_err(Into::into)
    }
}

fn driver_outcome(res: Result<Result<(), WsError>, JoinError>) -> Result<(), WsError> {
    match res {
        Ok(outcome) => outcome,
        Err(e) => Err(WsError::ConnectionFailed(format!(
            "connection task panicked: {e}"
        ))),
    }
}
