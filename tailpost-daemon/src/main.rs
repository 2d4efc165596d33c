use anyhow::Result;
use clap::Parser;

use tailpost_core::config::TailpostConfig;
use tailpost_daemon::cli::DaemonCli;
use tailpost_daemon::logging;
use tailpost_daemon::orchestrator::Orchestrator;
use tailpost_ingest::IngestConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = TailpostConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", cli.config.display()))?;

    // CLI flags take precedence over env and file
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

    if cli.validate {
        IngestConfig::from_core(&config)
            .map_err(|e| anyhow::anyhow!("invalid ingest config: {e}"))?;
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "tailpost-daemon starting"
    );

    Orchestrator::build_from_config(config).await?.run().await?;

    tracing::info!("tailpost-daemon shut down");
    Ok(())
}
