//! Logging initialization for tailpost-daemon.
//!
//! Builds a `tracing-subscriber` registry from the `[general]` section of
//! `TailpostConfig`. `RUST_LOG` wins over the configured level so a single
//! run can be debugged without editing the config file.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tailpost_core::config::GeneralConfig;

/// Noisy dependency targets capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["aws_config", "aws_smithy_runtime", "hyper", "rustls"];

/// Build the level filter for the given configured level.
pub fn build_env_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut directives = vec![log_level.to_owned()];
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    EnvFilter::new(directives.join(","))
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - one JSON object per line (default)
/// * `"pretty"` - human-readable multi-line output
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_env_filter(&config.log_level));

    let result = match config.log_format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false),
            )
            .try_init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            ));
        }
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
