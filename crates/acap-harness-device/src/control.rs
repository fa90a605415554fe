// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Application lifecycle on the device
//!
//! Devices in the internal pool are driven through the installer image over
//! Docker. Devices in the external pool cannot be reached that way, so the
//! package is uploaded and controlled through VAPIX instead.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::docker::DockerCli;
use crate::error::DeviceError;
use crate::vapix::DeviceClient;
use crate::wait::Timer;

/// Lifecycle operation on the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppAction {
    /// Install the package
    Install,
    /// Start the installed application
    Start,
    /// Stop the running application
    Stop,
    /// Uninstall the application
    Remove,
}

impl AppAction {
    /// Name used on the installer command line and in the control API
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for AppAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How lifecycle actions reach the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMode {
    /// Run the installer image with the device address and password
    Docker {
        /// Device address passed to the installer
        address: String,
        /// Device password passed to the installer
        password: String,
    },
    /// Upload and control through the device HTTP API
    Http {
        /// Package to upload; extracted from the image when absent
        package: Option<PathBuf>,
        /// Where an extracted package is placed
        staging_dir: PathBuf,
    },
}

/// Applies [`AppAction`]s to one application on one device
pub struct AppController {
    client: DeviceClient,
    docker: DockerCli,
    timer: Arc<dyn Timer>,
    app_name: String,
    image: String,
    mode: ControlMode,
}

impl AppController {
    /// Create a controller for `app_name`, packaged in installer `image`
    #[must_use]
    pub fn new(
        client: DeviceClient,
        timer: Arc<dyn Timer>,
        app_name: impl Into<String>,
        image: impl Into<String>,
        mode: ControlMode,
    ) -> Self {
        Self {
            client,
            docker: DockerCli::new(),
            timer,
            app_name: app_name.into(),
            image: image.into(),
            mode,
        }
    }

    /// Use a specific docker executable
    #[must_use]
    pub fn with_docker(mut self, docker: DockerCli) -> Self {
        self.docker = docker;
        self
    }

    /// The application being controlled
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// The control mode in use
    #[must_use]
    pub fn mode(&self) -> &ControlMode {
        &self.mode
    }

    /// Perform `action`, then wait `settle` whether or not it succeeded
    ///
    /// Returns `false` if the device or the installer rejected the action.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the device or docker could not be reached.
    pub async fn apply(&self, action: AppAction, settle: Duration) -> Result<bool, DeviceError> {
        info!(app = %self.app_name, %action, "Application action");
        let done = match &self.mode {
            ControlMode::Docker { address, password } => {
                let done = self
                    .docker
                    .control(&self.image, address, password, action.as_str())
                    .await?;
                if !done {
                    warn!(%action, "Installer image failed");
                }
                done
            }
            ControlMode::Http {
                package,
                staging_dir,
            } => match action {
                AppAction::Install => {
                    let package = match package {
                        Some(path) => Some(path.clone()),
                        None => self.docker.extract_package(&self.image, staging_dir).await?,
                    };
                    match package {
                        Some(path) => self.client.upload_package(&path).await?,
                        None => {
                            warn!(image = %self.image, "No package available to upload");
                            false
                        }
                    }
                }
                AppAction::Start | AppAction::Stop | AppAction::Remove => {
                    self.client
                        .control_app(action.as_str(), &self.app_name)
                        .await?
                }
            },
        };

        if !settle.is_zero() {
            info!(?settle, "Waiting after {action}");
            self.timer.sleep(settle).await;
        }
        Ok(done)
    }
}
