// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for acap-harness

use std::path::PathBuf;

use acap_harness_device::DeviceError;
use acap_harness_log::LogError;
use thiserror::Error;

use crate::config::ConfigError;

/// A step of the test session that could not be completed
///
/// The messages are what a CI log shows for a failed run, so they name the
/// step that failed rather than the underlying cause where there is none.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The device did not report ready before the run
    #[error("Could not connect to {address}")]
    Unreachable {
        /// Configured device address
        address: String,
    },

    /// The application is not installed after the install step
    #[error("Failed to install {app}")]
    InstallFailed {
        /// Application name
        app: String,
    },

    /// The device or installer refused to start the application
    #[error("Failed to start {app}")]
    StartFailed {
        /// Application name
        app: String,
    },

    /// The start marker was not found exactly once
    #[error(
        "The log should indicate that the {app} test suite was started once, but {count} matches were found"
    )]
    StartCount {
        /// Application name
        app: String,
        /// Occurrences of the start marker
        count: usize,
    },

    /// The end marker did not show up in time
    #[error("{app} test suite execution timed out.")]
    CompletionTimedOut {
        /// Application name
        app: String,
    },

    /// The parsed log does not show every test passing
    #[error("{app} test suite failed. {diagnostic}")]
    SuiteFailed {
        /// Application name
        app: String,
        /// Counts from the verdict
        diagnostic: String,
    },

    /// The application is still installed after removal
    #[error("Failed to remove {app}.")]
    RemoveFailed {
        /// Application name
        app: String,
    },

    /// The device rejected the reboot request
    #[error("Failed to reboot DUT after test.")]
    RebootFailed,

    /// The device did not come back after the reboot
    #[error("Failed to get status of DUT after reboot.")]
    NoStatusAfterReboot,

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Talking to the device failed
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Reading or parsing a log failed
    #[error(transparent)]
    Log(#[from] LogError),

    /// Error encoding the run report
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error writing a log or report file
    #[error("Failed to write {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
