// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Subcommand implementations
//!
//! Each command returns whether it succeeded; the binary maps that to the
//! process exit code.

use std::path::Path;
use std::sync::Arc;

use acap_harness_device::Timer;
use acap_harness_log::parse_log_file;
use tracing::{info, warn};

use crate::config::{Command, Config};
use crate::error::SessionError;
use crate::report::RunReport;
use crate::session::Session;

/// Run the subcommand selected in `config`
///
/// # Errors
///
/// Returns `SessionError` if the configuration is invalid or a step fails
/// in a way that leaves no report to write.
pub async fn execute(config: &Config, timer: Arc<dyn Timer>) -> Result<bool, SessionError> {
    config.validate()?;
    match config.selected_command() {
        Command::Run => run(config, timer).await,
        Command::Parse { log } => parse(config, &log),
        Command::Status => status(config, timer).await,
    }
}

/// Full install, test and teardown cycle
///
/// # Errors
///
/// Returns `SessionError` if the session cannot be built or the report
/// cannot be written.
pub async fn run(config: &Config, timer: Arc<dyn Timer>) -> Result<bool, SessionError> {
    let session = Session::from_config(config, timer)?;
    let report = session.run().await;
    finish(config, &report)
}

/// Evaluate a saved log
///
/// # Errors
///
/// Returns `SessionError::Log` if the log cannot be read.
pub fn parse(config: &Config, log: &Path) -> Result<bool, SessionError> {
    let tree = parse_log_file(log, config.app_name())?;
    let verdict = tree.verdict();
    println!("{verdict}");
    for case in tree.failed_cases() {
        println!("  FAILED {case}");
    }

    let mut report = RunReport::new(config.app_name(), log.display().to_string());
    if !verdict.passed {
        report.fail(&SessionError::SuiteFailed {
            app: config.app_name().to_string(),
            diagnostic: verdict.diagnostic(),
        });
    }
    report.record(tree);
    finish(config, &report.finish())
}

/// Wait for the device and print its properties
///
/// # Errors
///
/// Returns `SessionError` if the session cannot be built or the device
/// properties cannot be read.
pub async fn status(config: &Config, timer: Arc<dyn Timer>) -> Result<bool, SessionError> {
    let session = Session::from_config(config, timer)?;
    if !session.wait_until_ready(config.status_timeout()).await {
        let unreachable = SessionError::Unreachable {
            address: config.address.clone().unwrap_or_default(),
        };
        warn!("{unreachable}");
        return Ok(false);
    }

    match session.client().device_info().await? {
        Some(properties) => {
            for (name, value) in &properties {
                match value.as_str() {
                    Some(text) => println!("{name}: {text}"),
                    None => println!("{name}: {value}"),
                }
            }
        }
        None => warn!("Device did not report its properties"),
    }
    Ok(true)
}

fn finish(config: &Config, report: &RunReport) -> Result<bool, SessionError> {
    if let Some(path) = &config.report {
        report.write_json(path)?;
    }
    let passed = report.passed();
    if passed {
        info!(run_id = %report.run_id, "Run passed");
    } else {
        warn!(run_id = %report.run_id, failures = report.failures.len(), "Run failed");
    }
    Ok(passed)
}
