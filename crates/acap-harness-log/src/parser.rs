// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Device system log parsing
//!
//! The device forwards the test binary's googletest output to its system log,
//! one framework line per log entry:
//!
//! ```text
//! 2024-05-02T10:15:01.123+02:00 axis-b8a44f000000 [ INFO    ] acapruntimetest[1234]: [ RUN      ] InferenceTest.Tflite
//! ```
//!
//! [`LogParser`] picks out these lines for one application and folds them into
//! a [`ResultTree`]. Everything else in the log is skipped.
//!
//! # Example
//!
//! ```
//! use acap_harness_log::LogParser;
//!
//! let parser = LogParser::new("acapruntimetest").unwrap();
//! let tree = parser.parse("... [ INFO ] acapruntimetest[42]: [  PASSED  ] 3 tests.");
//! assert_eq!(tree.total.passed, 3);
//! ```

use std::path::Path;

use regex::{Captures, Regex};
use tracing::{debug, trace};

use crate::error::LogError;
use crate::result::{CaseEvent, ResultTree, TotalCounts};

/// Application the harness runs by default
pub const DEFAULT_APP_NAME: &str = "acapruntimetest";

/// Printed once by the test binary when it starts
pub const START_MARKER: &str = "Running main() from";

/// Printed once by the test binary after the last suite
pub const END_MARKER: &str = "Global test environment tear-down";

/// Compiled patterns for one application's framework lines
#[derive(Debug, Clone)]
pub struct LogParser {
    app_name: String,
    framework_line: Regex,
    totals: Regex,
    suite_header: Regex,
    case_name: Regex,
    number: Regex,
}

impl LogParser {
    /// Build a parser for the log lines emitted by `app_name`
    ///
    /// # Errors
    ///
    /// Returns `LogError::Pattern` if the resulting pattern cannot be compiled.
    pub fn new(app_name: &str) -> Result<Self, LogError> {
        let framework_line = Regex::new(&format!(
            r"^.*\s\[ INFO\s*\]\s{}\[\S*\]:\s\[\s*(?P<bracket>\S*)\s*\]\s*(?P<text>.*)$",
            regex::escape(app_name)
        ))?;
        let totals = Regex::new(concat!(
            r"^(?:Running (?P<tests_started>\d*) tests? from (?P<suites_started>\d*) test suites?\.",
            r"|(?P<tests_executed>\d*) tests? from (?P<suites_executed>\d*) test suites? ran\. \(\d* ms total\)$)",
        ))?;
        let suite_header = Regex::new(r"^(?P<nbr>\d*) tests? from (?P<suite>\S+)")?;
        let case_name = Regex::new(r"^(?P<suite>[^.\s]+)\.(?P<case>\S+)")?;
        let number = Regex::new(r"\d+")?;

        Ok(Self {
            app_name: app_name.to_string(),
            framework_line,
            totals,
            suite_header,
            case_name,
            number,
        })
    }

    /// The application whose lines this parser accepts
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Parse a complete log into a fresh result tree
    #[must_use]
    pub fn parse(&self, log: &str) -> ResultTree {
        let mut tree = ResultTree::new();
        for line in log.lines() {
            self.process_line(&mut tree, line);
        }
        debug!(
            app = %self.app_name,
            suites = tree.suites.len(),
            tests = tree.total.tests,
            passed = tree.total.passed,
            "Parsed device log"
        );
        tree
    }

    /// Fold a single log line into `tree`
    ///
    /// Returns `true` if the line was a framework line for this application.
    /// Lines that don't match, or whose text has an unexpected shape, leave
    /// the tree untouched.
    pub fn process_line(&self, tree: &mut ResultTree, line: &str) -> bool {
        let Some(caps) = self.framework_line.captures(line) else {
            return false;
        };
        let bracket = caps.name("bracket").map_or("", |m| m.as_str());
        let text = caps.name("text").map_or("", |m| m.as_str());

        if bracket.contains("==") {
            self.apply_totals(tree, text);
        } else if bracket.contains("--") {
            self.apply_suite_header(tree, text);
        } else if let Some(event) = CaseEvent::from_marker(bracket) {
            self.apply_case(tree, event, text);
        } else if bracket == "PASSED" {
            match self.number.find(text) {
                Some(m) => {
                    if let Ok(passed) = m.as_str().parse() {
                        tree.total.passed = passed;
                    }
                }
                None => trace!(text, "PASSED line without a count"),
            }
        } else {
            trace!(bracket, "Ignoring unknown bracket marker");
        }
        true
    }

    fn apply_totals(&self, tree: &mut ResultTree, text: &str) {
        let Some(caps) = self.totals.captures(text) else {
            return;
        };
        let total = &mut tree.total;
        TotalCounts::set_once(&mut total.test_suites, count(&caps, "suites_started"));
        TotalCounts::set_once(&mut total.tests, count(&caps, "tests_started"));
        TotalCounts::set_once(&mut total.executed, count(&caps, "tests_executed"));
    }

    fn apply_suite_header(&self, tree: &mut ResultTree, text: &str) {
        let Some(caps) = self.suite_header.captures(text) else {
            return;
        };
        let Some(name) = caps.name("suite") else {
            return;
        };
        let suite = tree.suite_or_insert(name.as_str());
        TotalCounts::set_once(&mut suite.nbr, count(&caps, "nbr"));
    }

    fn apply_case(&self, tree: &mut ResultTree, event: CaseEvent, text: &str) {
        let Some(caps) = self.case_name.captures(text) else {
            return;
        };
        let (Some(suite), Some(case)) = (caps.name("suite"), caps.name("case")) else {
            return;
        };
        if !tree.suite_or_insert(suite.as_str()).record(event, case.as_str()) {
            trace!(suite = suite.as_str(), case = case.as_str(), ?event, "Duplicate case line");
        }
    }
}

/// Numeric value of a named group, if it matched a non-empty digit run
///
/// `0` and values that do not fit in `u32` read as "not seen", so a
/// write-once counter stays open for a later line.
fn count(caps: &Captures<'_>, group: &str) -> Option<u32> {
    caps.name(group)
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// Count non-overlapping occurrences of `pattern` in `log`
#[must_use]
pub fn count_matches(log: &str, pattern: &str) -> usize {
    if pattern.is_empty() {
        return 0;
    }
    log.matches(pattern).count()
}

/// Read a saved log from disk and parse it
///
/// # Errors
///
/// Returns `LogError::Io` if the file cannot be read, or
/// `LogError::Pattern` if `app_name` yields an unusable pattern.
pub fn parse_log_file(path: impl AsRef<Path>, app_name: &str) -> Result<ResultTree, LogError> {
    let path = path.as_ref();
    let log = std::fs::read_to_string(path).map_err(|source| LogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(LogParser::new(app_name)?.parse(&log))
}
