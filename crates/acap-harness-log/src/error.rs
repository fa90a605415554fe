// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for acap-harness-log

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a device log
///
/// Parsing a line never fails; these cover setup and I/O around it.
#[derive(Debug, Error)]
pub enum LogError {
    /// Error reading a saved log file
    #[error("Failed to read log {path}: {source}")]
    Io {
        /// The log file that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The application name produced an unusable line pattern
    #[error("Invalid log pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Error serializing a result tree
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
