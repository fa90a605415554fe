//! Test result types
//!
//! A [`ResultTree`] is rebuilt from scratch for every log evaluation. It holds
//! the run-wide totals announced by the test framework plus one
//! [`SuiteRecord`] per test suite seen in the log.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LogError;

/// Run-wide counters taken from the framework header, footer and summary lines
///
/// A value of 0 means "not seen yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalCounts {
    /// Number of test suites announced by the header
    pub test_suites: u32,
    /// Number of tests announced by the header
    pub tests: u32,
    /// Number of tests the footer reports as having run
    pub executed: u32,
    /// Number of tests reported as passed
    pub passed: u32,
}

impl TotalCounts {
    /// Store `value` in `slot` unless the slot already holds a count.
    pub(crate) fn set_once(slot: &mut u32, value: Option<u32>) {
        if *slot == 0 {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// Which case list a `RUN` / `OK` / `FAILED` line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseEvent {
    /// `[ RUN ]` - the case was started
    Run,
    /// `[ OK ]` - the case passed
    Ok,
    /// `[ FAILED ]` - the case failed
    Failed,
}

impl CaseEvent {
    /// Map a bracket marker to a case event
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "RUN" => Some(Self::Run),
            "OK" => Some(Self::Ok),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Aggregated results for one test suite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteRecord {
    /// Declared number of tests in the suite (0 until declared)
    pub nbr: u32,
    /// Cases that were started, in log order
    pub run: Vec<String>,
    /// Cases that passed, in log order
    pub ok: Vec<String>,
    /// Cases that failed, in log order
    pub failed: Vec<String>,
}

impl SuiteRecord {
    /// Record a case under `event`. Returns `false` if it was already there.
    pub fn record(&mut self, event: CaseEvent, case: &str) -> bool {
        let cases = match event {
            CaseEvent::Run => &mut self.run,
            CaseEvent::Ok => &mut self.ok,
            CaseEvent::Failed => &mut self.failed,
        };
        if cases.iter().any(|c| c == case) {
            return false;
        }
        cases.push(case.to_string());
        true
    }

    /// Check whether the suite has any failed case
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Results reconstructed from a device log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTree {
    /// Run-wide totals
    pub total: TotalCounts,
    /// Per-suite records keyed by suite name
    pub suites: BTreeMap<String, SuiteRecord>,
}

impl ResultTree {
    /// Create an empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a suite by name
    #[must_use]
    pub fn suite(&self, name: &str) -> Option<&SuiteRecord> {
        self.suites.get(name)
    }

    /// Get the record for `name`, inserting an empty one first if needed
    pub fn suite_or_insert(&mut self, name: &str) -> &mut SuiteRecord {
        self.suites.entry(name.to_string()).or_default()
    }

    /// All failed cases as `SUITE.CASE`, suites in name order
    #[must_use]
    pub fn failed_cases(&self) -> Vec<String> {
        self.suites
            .iter()
            .flat_map(|(suite, record)| {
                record
                    .failed
                    .iter()
                    .map(move |case| format!("{suite}.{case}"))
            })
            .collect()
    }

    /// Decide whether the run passed
    ///
    /// The run passes when at least one test was announced and the reported
    /// passed count equals the announced test count.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        let TotalCounts {
            test_suites,
            tests,
            passed,
            ..
        } = self.total;

        Verdict {
            passed: tests > 0 && passed == tests,
            tests,
            tests_passed: passed,
            test_suites,
        }
    }

    /// Serialize the tree as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns `LogError::Json` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, LogError> {
        serde_json::to_string_pretty(self).map_err(LogError::from)
    }
}

/// Pass/fail outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the test suite passed
    pub passed: bool,
    /// Tests announced by the framework
    pub tests: u32,
    /// Tests reported as passed
    pub tests_passed: u32,
    /// Test suites announced by the framework
    pub test_suites: u32,
}

impl Verdict {
    /// Human-readable summary of the counts
    #[must_use]
    pub fn diagnostic(&self) -> String {
        if self.passed {
            format!(
                "Ran {} tests from {} test suites.",
                self.tests, self.test_suites
            )
        } else {
            format!(
                "{} of {} tests from {} test suites passed.",
                self.tests_passed, self.tests, self.test_suites
            )
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASSED" } else { "FAILED" };
        write!(f, "Test suite {status}: {}", self.diagnostic())
    }
}
