use clap::Parser;
use crossover_alert::cli::{show_config, Cli, Commands};
use crossover_alert::config::Config;
use crossover_alert::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config).or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::embedded()
    })?;
    config.apply_env_overrides();

    match cli.command {
        Commands::Run(args) => {
            init_telemetry(&config.telemetry)?;
            args.execute(config).await?;
        }
        Commands::Sweep(args) => {
            init_telemetry(&config.telemetry)?;
            tracing::info!("Running a single sweep");
            args.execute(config).await?;
        }
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}
