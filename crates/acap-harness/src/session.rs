// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Test session against one device
//!
//! A session runs three phases in order:
//!
//! 1. **setup** - wait for the device, install the application
//! 2. **test** - start it, wait for the test binary to finish, parse the log
//! 3. **teardown** - stop and remove the application, reboot the device
//!
//! Teardown runs whenever setup succeeded, whatever happened in the test
//! phase. Every step logs its progress so a CI log reads as a transcript of
//! the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use acap_harness_device::{
    AppAction, AppController, Credentials, DeviceClient, PollSchedule, Timer, poll_until,
};
use acap_harness_log::{END_MARKER, LogParser, ResultTree, START_MARKER, Verdict, count_matches};
use tracing::{debug, error, info, warn};

use crate::config::{Config, POST_REBOOT_STATUS_TIMEOUT_SECS};
use crate::error::SessionError;
use crate::report::RunReport;

/// Per-request timeout for systemready probes
const STATUS_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Pause after start, stop and remove
const ACTION_SETTLE: Duration = Duration::from_secs(1);

/// Pause after the reboot request before probing the device again
const REBOOT_SETTLE: Duration = Duration::from_secs(2);

/// Timing and behaviour of a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Device address, as shown in messages
    pub address: String,
    /// Expected device architecture
    pub arch: Option<String>,
    /// Where to save the application log
    pub save_log: Option<PathBuf>,
    /// Limit for the device to report ready before the run
    pub status_timeout: Duration,
    /// Limit for the device to report ready after the reboot
    pub post_reboot_timeout: Duration,
    /// Schedule for the test binary to finish
    pub completion: PollSchedule,
    /// Reboot the device during teardown
    pub reboot: bool,
}

impl SessionSettings {
    /// Settings taken from the command line and environment
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            address: config.address.clone().unwrap_or_default(),
            arch: config.arch.clone(),
            save_log: config.save_log.clone(),
            status_timeout: config.status_timeout(),
            post_reboot_timeout: Duration::from_secs(POST_REBOOT_STATUS_TIMEOUT_SECS),
            completion: config.completion_schedule(),
            reboot: !config.skip_reboot,
        }
    }
}

/// Drives one application through setup, test and teardown on one device
pub struct Session {
    client: DeviceClient,
    controller: AppController,
    parser: LogParser,
    timer: Arc<dyn Timer>,
    settings: SessionSettings,
}

impl Session {
    /// Create a session from its parts
    #[must_use]
    pub fn new(
        client: DeviceClient,
        controller: AppController,
        parser: LogParser,
        timer: Arc<dyn Timer>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            client,
            controller,
            parser,
            timer,
            settings,
        }
    }

    /// Build a session for the device and application named in `config`
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the device address or the application name
    /// cannot be used.
    pub fn from_config(config: &Config, timer: Arc<dyn Timer>) -> Result<Self, SessionError> {
        let client = device_client(config)?;
        let controller = AppController::new(
            client.clone(),
            Arc::clone(&timer),
            config.app_name(),
            config.image.clone().unwrap_or_default(),
            config.control_mode(),
        );
        let parser = LogParser::new(config.app_name())?;
        Ok(Self::new(
            client,
            controller,
            parser,
            timer,
            SessionSettings::from_config(config),
        ))
    }

    /// HTTP client for the device
    #[must_use]
    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    /// The application under test
    #[must_use]
    pub fn app_name(&self) -> &str {
        self.controller.app_name()
    }

    /// Run setup, test and teardown and collect the outcome
    ///
    /// Failures are recorded in the report rather than returned, so the
    /// report always says how far the run got.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new(self.app_name(), &self.settings.address);

        if let Err(e) = self.setup().await {
            error!("{e}");
            report.fail(&e);
            return report.finish();
        }

        match self.test().await {
            Ok(tree) => {
                if let Err(e) = self.evaluate(&tree) {
                    error!("{e}");
                    report.fail(&e);
                }
                report.record(tree);
            }
            Err(e) => {
                error!("{e}");
                report.fail(&e);
            }
        }

        if let Err(e) = self.teardown().await {
            error!("{e}");
            report.fail(&e);
        }
        report.finish()
    }

    // ========================================================================
    // Phases
    // ========================================================================

    /// Wait for the device and install the application
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the device does not come up or the
    /// application is not installed afterwards.
    pub async fn setup(&self) -> Result<(), SessionError> {
        info!("****Setup****");
        info!(address = %self.settings.address, scheme = ?self.client.auth_scheme(), "Connecting to device");
        if !self.wait_until_ready(self.settings.status_timeout).await {
            return Err(SessionError::Unreachable {
                address: self.settings.address.clone(),
            });
        }

        info!("Get properties of DUT");
        match self.client.device_info().await {
            Ok(Some(properties)) => {
                info!(properties = %serde_json::Value::Object(properties.clone()), "Device properties");
                self.check_arch(properties.get("Architecture").and_then(|a| a.as_str()));
            }
            Ok(None) => warn!("Device did not report its properties"),
            Err(e) => warn!(error = %e, "Failed to read device properties"),
        }

        info!("Installing {}", self.app_name());
        let installed = self
            .controller
            .apply(AppAction::Install, Duration::ZERO)
            .await?
            && self.client.is_app_installed(self.app_name()).await?;
        if !installed {
            return Err(SessionError::InstallFailed {
                app: self.app_name().to_string(),
            });
        }
        Ok(())
    }

    /// Start the application, wait for its test binary and parse the log
    ///
    /// A failing verdict is not an error here; see [`Session::evaluate`].
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the application does not start once, does
    /// not finish in time, or the log cannot be fetched or saved.
    pub async fn test(&self) -> Result<ResultTree, SessionError> {
        let app = self.app_name();
        info!("****Testing {app}****");

        info!("Start {app} test suite");
        if !self.controller.apply(AppAction::Start, ACTION_SETTLE).await? {
            return Err(SessionError::StartFailed {
                app: app.to_string(),
            });
        }
        let log = self.client.read_app_log(app).await?;
        let count = count_matches(&log, START_MARKER);
        if count != 1 {
            return Err(SessionError::StartCount {
                app: app.to_string(),
                count,
            });
        }

        info!("Wait for {app} test suite to finish execution.");
        let client = &self.client;
        let finished = poll_until(self.timer.as_ref(), &self.settings.completion, || async move {
            match client
                .read_app_log(app)
                .await
                .map(|log| count_matches(&log, END_MARKER))
            {
                Ok(1) => Some(()),
                Ok(count) => {
                    debug!(count, "Test suite not finished");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read application log");
                    None
                }
            }
        })
        .await;
        if !finished.is_ready() {
            return Err(SessionError::CompletionTimedOut {
                app: app.to_string(),
            });
        }

        info!("Evaluate {app} test suite result.");
        let log = self.client.read_app_log(app).await?;
        if let Some(path) = &self.settings.save_log {
            tokio::fs::write(path, &log)
                .await
                .map_err(|source| SessionError::Io {
                    path: path.clone(),
                    source,
                })?;
            info!(path = %path.display(), "Saved application log");
        }
        Ok(self.parser.parse(&log))
    }

    /// Turn the parsed results into a verdict
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SuiteFailed` unless every announced test passed.
    pub fn evaluate(&self, tree: &ResultTree) -> Result<Verdict, SessionError> {
        let verdict = tree.verdict();
        if verdict.passed {
            info!("---------Test Suite Passed-------------");
            info!("{}", verdict.diagnostic());
            return Ok(verdict);
        }

        warn!("---------Test Suite Failed-------------");
        warn!("{}", verdict.diagnostic());
        for (name, suite) in tree.suites.iter().filter(|(_, s)| s.has_failures()) {
            warn!(suite = %name, cases = ?suite.failed, "Suite has failed tests");
        }
        Err(SessionError::SuiteFailed {
            app: self.app_name().to_string(),
            diagnostic: verdict.diagnostic(),
        })
    }

    /// Stop and remove the application, then reboot the device
    ///
    /// # Errors
    ///
    /// Returns `SessionError` at the first step that fails; later steps are
    /// skipped.
    pub async fn teardown(&self) -> Result<(), SessionError> {
        let app = self.app_name();
        info!("****Teardown****");

        info!("Stopping {app}");
        if !self.controller.apply(AppAction::Stop, ACTION_SETTLE).await? {
            warn!("Stop was not accepted");
        }
        info!("Removing {app}");
        if !self.controller.apply(AppAction::Remove, ACTION_SETTLE).await? {
            warn!("Remove was not accepted");
        }
        if self.client.is_app_installed(app).await? {
            return Err(SessionError::RemoveFailed {
                app: app.to_string(),
            });
        }

        if !self.settings.reboot {
            info!("Skipping reboot");
            return Ok(());
        }
        info!("Rebooting device. This will take some time.");
        if !self.client.reboot().await? {
            return Err(SessionError::RebootFailed);
        }
        info!("Waiting {} seconds for reboot to start.", REBOOT_SETTLE.as_secs());
        self.timer.sleep(REBOOT_SETTLE).await;

        if !self.wait_until_ready(self.settings.post_reboot_timeout).await {
            return Err(SessionError::NoStatusAfterReboot);
        }
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Poll systemready until the device is up or `max_time` has passed
    pub async fn wait_until_ready(&self, max_time: Duration) -> bool {
        debug!(?max_time, "Checking device status");
        let client = &self.client;
        let outcome = poll_until(self.timer.as_ref(), &PollSchedule::new(max_time), || async move {
            match client.system_ready(STATUS_REQUEST_TIMEOUT).await {
                Ok(true) => Some(()),
                Ok(false) => None,
                Err(e) => {
                    warn!(error = %e, "systemready request failed");
                    None
                }
            }
        })
        .await;
        if !outcome.is_ready() {
            warn!("DUT status check timed out");
        }
        outcome.is_ready()
    }

    fn check_arch(&self, reported: Option<&str>) {
        let Some(expected) = self.settings.arch.as_deref() else {
            return;
        };
        match reported {
            Some(reported) if reported == expected => {}
            Some(reported) => {
                warn!(expected, reported, "Device architecture differs from AXIS_TARGET_ARCH");
            }
            None => debug!("Device did not report its architecture"),
        }
    }
}

/// HTTP client for the device named in `config`
///
/// # Errors
///
/// Returns `SessionError::Device` if the address cannot be used.
pub fn device_client(config: &Config) -> Result<DeviceClient, SessionError> {
    let credentials = Credentials::new(
        config.user.clone().unwrap_or_default(),
        config.password.clone().unwrap_or_default(),
    );
    Ok(DeviceClient::new(
        config.address.as_deref().unwrap_or_default(),
        credentials,
        config.auth_scheme(),
    )?)
}
