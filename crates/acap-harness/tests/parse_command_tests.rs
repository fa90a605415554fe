//! Tests for the `parse` subcommand
//!
//! Evaluates the saved logs shared with the parser tests, without a device.

use std::path::PathBuf;
use std::sync::Arc;

use acap_harness::{Command, Config, ConfigError, RunReport, SessionError, commands};
use acap_harness_device::VirtualTimer;
use similar_asserts::assert_eq;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../acap-harness-log/tests/fixtures")
        .join(name)
}

fn parse_config(log: PathBuf, report: Option<PathBuf>) -> Config {
    Config {
        command: Some(Command::Parse { log }),
        report,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_parse_passing_log() {
    let config = parse_config(fixture("passing.log"), None);
    let passed = commands::execute(&config, Arc::new(VirtualTimer::new()))
        .await
        .expect("parse should complete");
    assert!(passed);
}

#[tokio::test]
async fn test_parse_failing_log_writes_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let report_path = dir.path().join("report.json");
    let config = parse_config(fixture("failing.log"), Some(report_path.clone()));

    let passed = commands::execute(&config, Arc::new(VirtualTimer::new()))
        .await
        .expect("parse should complete");
    assert!(!passed);

    let report: RunReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).expect("read report"))
            .expect("report should deserialize");
    assert_eq!(report.app, "acapruntimetest");
    assert!(report.device.ends_with("failing.log"));
    assert_eq!(
        report.failures,
        vec!["acapruntimetest test suite failed. 3 of 4 tests from 2 test suites passed.".to_string()]
    );
    let tree = report.tree.expect("tree recorded");
    let suite = tree.suite("InferenceTest").expect("suite recorded");
    assert_eq!(suite.nbr, 3);
    assert_eq!(suite.failed, vec!["ModelMetadata".to_string()]);
}

#[tokio::test]
async fn test_parse_with_other_app_name_finds_nothing() {
    let mut config = parse_config(fixture("passing.log"), None);
    config.app = Some("othertest".to_string());

    let passed = commands::execute(&config, Arc::new(VirtualTimer::new()))
        .await
        .expect("parse should complete");
    assert!(!passed, "no lines belong to othertest, so nothing passed");
}

#[tokio::test]
async fn test_parse_missing_log() {
    let config = parse_config(PathBuf::from("/nonexistent/device_12345.log"), None);
    let result = commands::execute(&config, Arc::new(VirtualTimer::new())).await;
    assert!(matches!(
        result,
        Err(SessionError::Config(ConfigError::LogNotFound(_)))
    ));
}

#[test]
fn test_parse_needs_no_device_settings() {
    let config = parse_config(fixture("passing.log"), None);
    assert!(config.missing_settings().is_empty());
}
