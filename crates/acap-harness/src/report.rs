//! Run report
//!
//! One [`RunReport`] is produced per invocation and optionally written to
//! disk as JSON for the CI job to archive.

use std::path::Path;

use acap_harness_log::{ResultTree, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::SessionError;

/// Outcome of one harness run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique identifier of this run
    pub run_id: Uuid,
    /// Application under test
    pub app: String,
    /// Device address, or the log file for offline evaluation
    pub device: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Results parsed from the application log, if the test step got that far
    pub tree: Option<ResultTree>,
    /// Verdict derived from `tree`
    pub verdict: Option<Verdict>,
    /// Failed steps, in the order they happened
    pub failures: Vec<String>,
}

impl RunReport {
    /// Start a report for `app` on `device`
    #[must_use]
    pub fn new(app: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            app: app.into(),
            device: device.into(),
            started_at: Utc::now(),
            finished_at: None,
            tree: None,
            verdict: None,
            failures: Vec::new(),
        }
    }

    /// Store the parsed results and their verdict
    pub fn record(&mut self, tree: ResultTree) {
        self.verdict = Some(tree.verdict());
        self.tree = Some(tree);
    }

    /// Add a failed step
    pub fn fail(&mut self, error: &SessionError) {
        self.failures.push(error.to_string());
    }

    /// Stamp the finish time
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// The run passed: a passing verdict and no failed steps
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.verdict.is_some_and(|v| v.passed)
    }

    /// Write the report as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Io` if the file cannot be written.
    pub fn write_json(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Wrote run report");
        Ok(())
    }
}
