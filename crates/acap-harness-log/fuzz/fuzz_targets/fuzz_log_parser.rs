// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for the device log parser
//!
//! Feeds arbitrary text through `LogParser` both as a whole log and line by
//! line into one tree.

#![no_main]

use libfuzzer_sys::fuzz_target;

use acap_harness_log::{DEFAULT_APP_NAME, LogParser, ResultTree};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let Ok(parser) = LogParser::new(DEFAULT_APP_NAME) else {
            return;
        };

        // Parsing should never panic
        let whole = parser.parse(input);
        let _ = whole.verdict();

        let mut incremental = ResultTree::new();
        for line in input.lines() {
            parser.process_line(&mut incremental, line);
        }
        assert_eq!(whole, incremental);
    }
});
