//! CLI interface for crossover-alert
//!
//! Provides subcommands for:
//! - `run`: Start the alert bot
//! - `sweep`: Check every pair once and exit
//! - `config`: Show the effective configuration

mod run;
mod sweep;

pub use run::RunArgs;
pub use sweep::SweepArgs;

use crate::alert::{AlertSink, LogAlerter, TelegramAlerter};
use crate::config::Config;
use crate::correlator::RequestCorrelator;
use crate::indicators::TaEngine;
use crate::scheduler::{Scheduler, SchedulerSettings};
use crate::signal::SignalDetector;
use crate::ws::{ConnectionHandle, ConnectionManager, ConnectionState};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Parser, Debug)]
#[command(name = "crossover-alert")]
#[command(about = "Moving-average crossover alerts over a live market-data connection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the alert bot
    Run(RunArgs),
    /// Run a single sweep over all pairs and exit
    Sweep(SweepArgs),
    /// Show the effective configuration (secrets masked)
    Config,
}

/// Print the configuration with credentials masked
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    if let Err(e) = config.validate() {
        println!("# warning: {e}");
    }
    Ok(())
}

/// Connected components shared by `run` and `sweep`
struct Bot {
    manager: ConnectionManager,
    connection: ConnectionHandle,
    correlator: Arc<RequestCorrelator>,
    scheduler: Scheduler,
    alerts: Arc<dyn AlertSink>,
}

impl Bot {
    fn build(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        if config.provider.api_token.is_empty() {
            anyhow::bail!("No API token configured; set provider.api_token or DERIV_API_TOKEN");
        }

        let manager = ConnectionManager::new(config.provider.ws_config(), &config.provider.api_token);
        let connection = manager.handle();
        let correlator = Arc::new(RequestCorrelator::with_timeout(
            connection.clone(),
            config.provider.request_timeout(),
        ));
        let alerts = alert_sink(config)?;
        let scheduler = Scheduler::new(
            SchedulerSettings::from_config(config),
            correlator.clone(),
            Arc::new(TaEngine::new()),
            SignalDetector::new(config.strategy.thresholds()),
            alerts.clone(),
        );

        Ok(Self {
            manager,
            connection,
            correlator,
            scheduler,
            alerts,
        })
    }
}

fn alert_sink(config: &Config) -> anyhow::Result<Arc<dyn AlertSink>> {
    match config.alert.telegram() {
        Some(telegram) => {
            tracing::info!(chat_id = %telegram.chat_id, "Delivering alerts to Telegram");
            Ok(Arc::new(TelegramAlerter::new(telegram)?))
        }
        None => {
            tracing::warn!("Telegram not configured, alerts will only be logged");
            Ok(Arc::new(LogAlerter::new()))
        }
    }
}

/// Wait until the connection is Ready; `false` if it failed or shutdown came first
async fn wait_until_ready(
    connection: &ConnectionHandle,
    shutdown_rx: &mut watch::Receiver<bool>,
    limit: Option<Duration>,
) -> bool {
    let mut state_rx = connection.subscribe();
    let ready = async {
        state_rx
            .wait_for(|s| matches!(s, ConnectionState::Ready | ConnectionState::Failed))
            .await
            .map(|s| s.is_ready())
            .unwrap_or(false)
    };
    let limit = async {
        match limit {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        ready = ready => ready,
        _ = limit => false,
        _ = crate::shutdown::wait(shutdown_rx) => false,
    }
}

/// Wait for the receive path to finish; `false` if it panicked
async fn join_receiver(receiver: JoinHandle<()>) -> bool {
    match receiver.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Receive path panicked");
            false
        }
    }
}
