// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Docker CLI wrapper for the installer image
//!
//! The application ships as a Docker image whose entrypoint installs and
//! controls the package on a device (`<image> <address> <password> <action>`)
//! and which carries the built package under `/opt/app`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::DeviceError;

/// Directory inside the installer image that holds the built package
pub const IMAGE_PACKAGE_DIR: &str = "/opt/app";

/// Extension of application packages
pub const PACKAGE_EXTENSION: &str = "eap";

/// Invokes the `docker` executable
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    /// Use `docker` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Use a specific executable in place of `docker`
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The executable being invoked
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `docker <args>` and return its stdout if it exited successfully
    ///
    /// A non-zero exit is logged together with the captured output and
    /// reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Spawn` if the executable cannot be started.
    pub async fn output<I, S>(&self, args: I) -> Result<Option<String>, DeviceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().collect();
        let shown: Vec<_> = args
            .iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect();
        debug!(program = %self.program, args = ?shown, "Running docker");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| DeviceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            warn!(
                program = %self.program,
                code = ?output.status.code(),
                stdout = %String::from_utf8_lossy(&output.stdout),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "docker command failed"
            );
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    /// Run `docker <args>`, returning whether it exited successfully
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Spawn` if the executable cannot be started.
    pub async fn run<I, S>(&self, args: I) -> Result<bool, DeviceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Ok(self.output(args).await?.is_some())
    }

    /// Let the installer image perform `action` on the device
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Spawn` if docker cannot be started.
    pub async fn control(
        &self,
        image: &str,
        address: &str,
        password: &str,
        action: &str,
    ) -> Result<bool, DeviceError> {
        self.run(["run", "--rm", image, address, password, action])
            .await
    }

    /// Copy the package directory out of `image` into `dest` and return the
    /// package found there
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Spawn` if docker cannot be started, or
    /// `DeviceError::Io` if `dest` cannot be created or read.
    pub async fn extract_package(
        &self,
        image: &str,
        dest: &Path,
    ) -> Result<Option<PathBuf>, DeviceError> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|source| DeviceError::Io {
                path: dest.to_path_buf(),
                source,
            })?;

        let Some(created) = self.output(["create", image]).await? else {
            return Ok(None);
        };
        let container = created.trim().to_string();
        if container.is_empty() {
            warn!(image, "docker create printed no container id");
            return Ok(None);
        }

        let source = format!("{container}:{IMAGE_PACKAGE_DIR}");
        let copied = self
            .run([OsStr::new("cp"), OsStr::new(&source), dest.as_os_str()])
            .await?;
        if !self.run(["rm", container.as_str()]).await? {
            warn!(%container, "Failed to remove temporary container");
        }
        if !copied {
            return Ok(None);
        }

        let package = find_package(dest).await?;
        match &package {
            Some(path) => info!(package = %path.display(), "Extracted application package"),
            None => warn!(dest = %dest.display(), "No package found in image"),
        }
        Ok(package)
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// First package file in `dir` or one of its immediate subdirectories
///
/// `docker cp` places the directory contents either straight into `dir` or
/// into a nested `app/` directory, depending on whether `dir` existed.
pub async fn find_package(dir: &Path) -> Result<Option<PathBuf>, DeviceError> {
    let mut pending = vec![(dir.to_path_buf(), 0u8)];
    while let Some((current, depth)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .map_err(|source| DeviceError::Io {
                path: current.clone(),
                source,
            })?;

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| DeviceError::Io {
            path: current.clone(),
            source,
        })? {
            let path = entry.path();
            if path.is_dir() {
                subdirs.push(path);
            } else if path.extension() == Some(OsStr::new(PACKAGE_EXTENSION)) {
                files.push(path);
            }
        }

        files.sort();
        if let Some(first) = files.into_iter().next() {
            return Ok(Some(first));
        }
        if depth == 0 {
            subdirs.sort();
            pending.extend(subdirs.into_iter().rev().map(|d| (d, depth + 1)));
        }
    }
    Ok(None)
}
