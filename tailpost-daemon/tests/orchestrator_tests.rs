//! Orchestrator integration tests.
//!
//! Builds the daemon against a local endpoint URL; no request is sent until
//! a source file produces rows, so no AWS access is needed.

use std::time::Duration;

use tailpost_core::config::TailpostConfig;
use tailpost_daemon::orchestrator::Orchestrator;

fn test_config(source_dir: &str, data_dir: &str) -> TailpostConfig {
    let toml_str = format!(
        r#"
[general]
log_level = "info"
data_dir = "{data_dir}"

[source]
directory = "{source_dir}"
poll_interval_ms = 50

[stream]
endpoint_url = "http://127.0.0.1:4566"

[checkpoint]
enabled = true
"#
    );
    TailpostConfig::parse(&toml_str).expect("failed to parse test config")
}

#[tokio::test]
async fn test_build_from_valid_config() {
    let source = tempfile::tempdir().expect("tempdir");
    let data = tempfile::tempdir().expect("tempdir");
    let config = test_config(
        &source.path().display().to_string(),
        &data.path().display().to_string(),
    );

    let orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("orchestrator should build");
    assert_eq!(orchestrator.config().stream.stream_name, "spc-stream");
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let mut config = test_config("/tmp", "/tmp");
    config.stream.batch_size = 0;

    let result = Orchestrator::build_from_config(config).await;
    assert!(result.is_err(), "batch_size 0 must be rejected");
}

#[tokio::test]
async fn test_build_missing_config_file_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = Orchestrator::build(&dir.path().join("absent.toml")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_run_stops_when_token_cancelled() {
    let source = tempfile::tempdir().expect("tempdir");
    let data = tempfile::tempdir().expect("tempdir");
    let config = test_config(
        &source.path().display().to_string(),
        &data.path().display().to_string(),
    );

    let orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("orchestrator should build");
    let token = orchestrator.shutdown_token();

    let handle = tokio::spawn(orchestrator.run());
    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("daemon should stop promptly")
        .expect("daemon task should not panic");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_signal_failure_still_stops_ingestor() {
    let source = tempfile::tempdir().expect("tempdir");
    let data = tempfile::tempdir().expect("tempdir");
    let config = test_config(
        &source.path().display().to_string(),
        &data.path().display().to_string(),
    );

    let orchestrator = Orchestrator::build_from_config(config)
        .await
        .expect("orchestrator should build");
    let token = orchestrator.shutdown_token();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator.run_until(async { Err(anyhow::anyhow!("no signal handler")) }),
    )
    .await
    .expect("daemon should stop promptly");

    let err = result.expect_err("signal failure should be reported");
    assert!(err.to_string().contains("no signal handler"));
    assert!(token.is_cancelled());
}
