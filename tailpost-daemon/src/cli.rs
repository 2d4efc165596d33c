//! CLI argument definitions for tailpost-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Tailpost ingestion daemon.
///
/// Tails the current day's CSV file, follows date rotation, and publishes
/// every row to the configured Kinesis stream.
#[derive(Parser, Debug)]
#[command(name = "tailpost-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to tailpost.toml configuration file.
    #[arg(short, long, default_value = "/etc/tailpost/tailpost.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_etc_config() {
        let cli = DaemonCli::parse_from(["tailpost-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/tailpost/tailpost.toml"));
        assert!(!cli.validate);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn parses_overrides() {
        let cli = DaemonCli::parse_from([
            "tailpost-daemon",
            "-c",
            "/tmp/t.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("/tmp/t.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }
}
