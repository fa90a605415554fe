//! Configuration for the acap-harness runner
//!
//! Device settings come from the command line or from the environment
//! variables a CI job exports for the device it was assigned
//! (`AXIS_TARGET_ADDR`, `AXIS_TARGET_USER`, ...).

use std::path::PathBuf;
use std::time::Duration;

use acap_harness_device::{AuthScheme, ControlMode, PollSchedule};
use acap_harness_log::DEFAULT_APP_NAME;
use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};

/// Default limit for the device to report ready, in seconds
pub const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 120;

/// Limit for the device to report ready after a reboot, in seconds
pub const POST_REBOOT_STATUS_TIMEOUT_SECS: u64 = 360;

/// Default limit for the test binary to finish, in seconds
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 180;

/// Default directory an extracted package is copied into
pub const DEFAULT_STAGING_DIR: &str = "build";

/// ACAP test harness - run an application's on-device test suite and check the result
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "acap-harness")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Subcommand to run (defaults to a full install/test/teardown cycle)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address of the device under test (host, host:port or URL)
    #[arg(short, long, env = "AXIS_TARGET_ADDR")]
    pub address: Option<String>,

    /// Device account name
    #[arg(short, long, env = "AXIS_TARGET_USER")]
    pub user: Option<String>,

    /// Device account password
    #[arg(short, long, env = "AXIS_TARGET_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Expected device architecture (e.g. aarch64, armv7hf)
    #[arg(long, env = "AXIS_TARGET_ARCH")]
    pub arch: Option<String>,

    /// Docker image that installs the application and carries its package
    #[arg(short, long, env = "ACAP_DOCKER_IMAGE_NAME")]
    pub image: Option<String>,

    /// The device is in the external pool
    ///
    /// External devices are reached over HTTP only: requests use Basic
    /// authentication and the package is uploaded instead of installed
    /// through Docker. Any value other than an empty string, `0`, `false`,
    /// `no`, `off`, `n` or `f` enables it.
    #[arg(
        long,
        env = "AXIS_EXTERNAL_POOL",
        value_parser = FalseyValueParser::new()
    )]
    pub external_pool: bool,

    /// Application name, as used in its log lines and package name
    #[arg(long, global = true)]
    pub app: Option<String>,

    /// Package to upload in external-pool mode instead of extracting one
    /// from the image
    #[arg(long)]
    pub package: Option<PathBuf>,

    /// Directory a package extracted from the image is copied into
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Save the application log fetched after the test run to this file
    #[arg(long)]
    pub save_log: Option<PathBuf>,

    /// Write a JSON run report to this file
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Give up waiting for the test suite to finish after this many seconds
    #[arg(long)]
    pub completion_timeout_secs: Option<u64>,

    /// Give up waiting for the device to report ready after this many seconds
    #[arg(long)]
    pub status_timeout_secs: Option<u64>,

    /// Leave the device running after teardown instead of rebooting it
    #[arg(long, default_value = "false")]
    pub skip_reboot: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value = "false", global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    ///
    /// Only errors and warnings will be logged.
    #[arg(short, long, default_value = "false", global = true)]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Install the application, run its test suite, check the result and
    /// clean up the device
    Run,

    /// Evaluate a saved application log without touching a device
    ///
    /// Example:
    ///   acap-harness parse device.log --report report.json
    Parse {
        /// Log file to evaluate
        log: PathBuf,
    },

    /// Wait for the device to report ready and print its properties
    Status,
}

impl Config {
    /// The subcommand to run, `run` when none was given
    #[must_use]
    pub fn selected_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    /// Application name, defaulting to the runtime test suite
    #[must_use]
    pub fn app_name(&self) -> &str {
        self.app
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_APP_NAME)
    }

    /// Authentication scheme: Basic for the external pool, Digest otherwise
    #[must_use]
    pub fn auth_scheme(&self) -> AuthScheme {
        if self.external_pool {
            AuthScheme::Basic
        } else {
            AuthScheme::Digest
        }
    }

    /// How lifecycle actions reach the device
    #[must_use]
    pub fn control_mode(&self) -> ControlMode {
        if self.external_pool {
            ControlMode::Http {
                package: self.package.clone(),
                staging_dir: self
                    .staging_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR)),
            }
        } else {
            ControlMode::Docker {
                address: self.address.clone().unwrap_or_default(),
                password: self.password.clone().unwrap_or_default(),
            }
        }
    }

    /// Limit for the device to report ready before the run
    #[must_use]
    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(
            self.status_timeout_secs
                .unwrap_or(DEFAULT_STATUS_TIMEOUT_SECS),
        )
    }

    /// Polling schedule for the test suite to finish
    #[must_use]
    pub fn completion_schedule(&self) -> PollSchedule {
        PollSchedule::test_completion().with_timeout(Duration::from_secs(
            self.completion_timeout_secs
                .unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS),
        ))
    }

    /// Settings the selected subcommand cannot do without, by environment
    /// variable name
    #[must_use]
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut required = Vec::new();
        match self.selected_command() {
            Command::Parse { .. } => return Vec::new(),
            Command::Status => {}
            Command::Run => {
                required.push(("AXIS_TARGET_ARCH", self.arch.is_some()));
                let image_needed = !(self.external_pool && self.package.is_some());
                if image_needed {
                    required.push(("ACAP_DOCKER_IMAGE_NAME", self.image.is_some()));
                }
            }
        }
        required.push(("AXIS_TARGET_ADDR", self.address.is_some()));
        required.push(("AXIS_TARGET_USER", self.user.is_some()));
        required.push(("AXIS_TARGET_PASS", self.password.is_some()));

        let mut missing: Vec<_> = required
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any setting the subcommand needs is missing (all are reported)
    /// - A timeout is zero
    /// - The package or log file to read does not exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.missing_settings();
        if !missing.is_empty() {
            return Err(ConfigError::MissingSettings(missing));
        }

        if self.completion_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout("--completion-timeout-secs"));
        }
        if self.status_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout("--status-timeout-secs"));
        }

        if let Some(ref package) = self.package {
            if !package.is_file() {
                return Err(ConfigError::PackageNotFound(package.clone()));
            }
        }
        if let Command::Parse { log } = self.selected_command() {
            if !log.is_file() {
                return Err(ConfigError::LogNotFound(log));
            }
        }

        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required settings were not given on the command line or in the environment
    #[error("Missing required settings: {}", .0.join(", "))]
    MissingSettings(Vec<&'static str>),

    /// A timeout option was set to zero
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    /// The package to upload does not exist
    #[error("Package not found: {0}")]
    PackageNotFound(PathBuf),

    /// The log to evaluate does not exist
    #[error("Log file not found: {0}")]
    LogNotFound(PathBuf),
}
