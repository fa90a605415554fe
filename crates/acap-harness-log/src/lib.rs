// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! acap-harness-log: Device log result parsing for acap-harness
//!
//! This library crate reconstructs googletest results from the system log of
//! a device under test, for consumption by the acap-harness runner.
//!
//! # Example
//!
//! ```no_run
//! use acap_harness_log::{LogParser, parse_log_file};
//!
//! // Parse a log fetched from the device
//! let parser = LogParser::new("acapruntimetest").unwrap();
//! let tree = parser.parse("...");
//! println!("{}", tree.verdict());
//!
//! // Or evaluate a log saved by an earlier run
//! let tree = parse_log_file("device.log", "acapruntimetest").unwrap();
//! assert!(tree.verdict().passed);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod parser;
pub mod result;

pub use error::LogError;
pub use parser::{
    DEFAULT_APP_NAME, END_MARKER, LogParser, START_MARKER, count_matches, parse_log_file,
};
pub use result::{CaseEvent, ResultTree, SuiteRecord, TotalCounts, Verdict};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::LogError;
    pub use crate::parser::{LogParser, count_matches};
    pub use crate::result::{ResultTree, Verdict};
}
