//! Daemon assembly and lifecycle management.
//!
//! The [`Orchestrator`] loads configuration, wires the Kinesis transport and
//! cursor store into an [`Ingestor`], and runs it until a shutdown signal
//! arrives.
//!
//! # Shutdown
//!
//! 1. `SIGTERM` / `SIGINT` received
//! 2. the shared [`CancellationToken`] is cancelled; the poll loop exits at its
//!    next suspension point (poll interval or publish backoff)
//! 3. an in-flight publish request is given `request_timeout + grace` to finish

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use tailpost_core::config::TailpostConfig;
use tailpost_ingest::{ConfiguredCursorStore, IngestConfig, Ingestor, KinesisTransport};

use crate::metrics_server;

/// Extra time allowed on top of the publish request timeout during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The production ingestor type.
pub type DaemonIngestor = Ingestor<KinesisTransport, ConfiguredCursorStore>;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: TailpostConfig,
    /// The poll loop.
    ingestor: DaemonIngestor,
    /// Shutdown signal shared with every background task.
    shutdown: CancellationToken,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load `tailpost.toml` (plus environment overrides) and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or validation fails.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = TailpostConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: TailpostConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;
        let ingest_config = IngestConfig::from_core(&config)
            .map_err(|e| anyhow::anyhow!("invalid ingest config: {e}"))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let endpoint_url = Some(config.stream.endpoint_url.as_str()).filter(|u| !u.is_empty());
        let transport = KinesisTransport::connect(
            &config.stream.region,
            endpoint_url,
            config.stream.stream_name.clone(),
        )
        .await;

        let store = ConfiguredCursorStore::from_path(ingest_config.checkpoint_path.as_deref());
        if let Some(path) = &ingest_config.checkpoint_path {
            tracing::info!(path = %path.display(), "cursor checkpointing enabled");
        }

        let ingestor = Ingestor::new(ingest_config, transport, store)
            .map_err(|e| anyhow::anyhow!("failed to build ingestor: {e}"))?;

        tracing::info!(
            stream = %config.stream.stream_name,
            region = %config.stream.region,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            ingestor,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &TailpostConfig {
        &self.config
    }

    /// A token that stops the daemon when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the poll loop until `SIGTERM`/`SIGINT` or the shutdown token fires.
    pub async fn run(self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Run the poll loop until `signal` resolves or the shutdown token fires.
    ///
    /// The ingestor is always cancelled and drained before returning, even
    /// when `signal` fails.
    pub async fn run_until(
        self,
        signal: impl Future<Output = Result<&'static str>>,
    ) -> Result<()> {
        let Self {
            config,
            ingestor,
            shutdown,
            start_time,
        } = self;

        let uptime_task = config
            .metrics
            .enabled
            .then(|| metrics_server::spawn_uptime_updater(start_time, shutdown.clone()));

        let mut ingest_task = tokio::spawn({
            let token = shutdown.clone();
            async move { ingestor.run(token).await }
        });

        let mut failure = None;
        tokio::select! {
            received = signal => match received {
                Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
                Err(e) => {
                    tracing::error!(error = %e, "signal handling failed, shutting down");
                    failure = Some(e);
                }
            },
            _ = shutdown.cancelled() => {
                tracing::info!("shutdown requested");
            }
            joined = &mut ingest_task => {
                // run() only returns after cancellation, so this is a panic
                shutdown.cancel();
                return Err(anyhow::anyhow!("ingestor task ended unexpectedly: {joined:?}"));
            }
        }
        shutdown.cancel();

        let grace = Duration::from_secs(config.stream.request_timeout_secs) + SHUTDOWN_GRACE;
        match tokio::time::timeout(grace, ingest_task).await {
            Ok(Ok(state)) => {
                tracing::info!(
                    file = %state.source().file_name(),
                    offset = state.cursor.offset,
                    "ingestor drained"
                );
            }
            Ok(Err(e)) => tracing::error!(error = %e, "ingestor task failed"),
            Err(_) => tracing::warn!(grace_secs = grace.as_secs(), "ingestor did not stop in time"),
        }

        if let Some(task) = uptime_task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "uptime updater task failed");
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for Ctrl-C: {e}"))?;
    Ok("CTRL_C")
}
