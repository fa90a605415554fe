// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for acap-harness-device

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to the device or the installer tooling
///
/// A device that answers with an unexpected status is not an error; the
/// client reports that as `false`. These variants cover failures to carry
/// out the exchange at all.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The device address cannot be turned into a base URL
    #[error("Invalid device address: {address}")]
    InvalidAddress {
        /// The address as configured
        address: String,
    },

    /// The digest challenge could not be answered
    #[error("Digest authentication failed: {0}")]
    DigestAuth(String),

    /// The device answered a request with a non-success status
    #[error("{endpoint} returned HTTP {status}")]
    UnexpectedStatus {
        /// Endpoint path that was requested
        endpoint: String,
        /// HTTP status code received
        status: u16,
    },

    /// Error encoding or decoding JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reading or writing a local file
    #[error("Failed to access {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The docker executable could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Program that was invoked
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl DeviceError {
    /// Check whether the error means the device did not answer in time or
    /// could not be reached, which callers treat as "not ready yet"
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
