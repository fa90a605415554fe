//! acap-harness: run an ACAP application's on-device test suite
//!
//! Installs the application on the device under test, waits for its
//! googletest binary to finish, reads the verdict from the device log and
//! exits non-zero unless every test passed.

use std::process::ExitCode;
use std::sync::Arc;

use acap_harness::{Config, commands};
use acap_harness_device::TokioTimer;
use clap::Parser;
use tracing::{error, warn};

fn main() -> ExitCode {
    let config = Config::parse();

    // Logs go to stderr so `parse` and `status` output stays clean on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .init();

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> anyhow::Result<bool> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        tokio::select! {
            result = commands::execute(config, Arc::new(TokioTimer)) => result.map_err(anyhow::Error::from),
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                Ok(false)
            }
        }
    })
}
