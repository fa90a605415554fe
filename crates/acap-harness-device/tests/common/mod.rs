//! Shared test utilities for the device integration tests.
//!
//! Import via `mod common;` at the top of each test file.

#![allow(dead_code)]

pub mod fake_device;

use std::path::{Path, PathBuf};

/// Write an executable shell script standing in for `docker`
///
/// The script appends its arguments to `calls.log` next to it, then runs
/// `body`.
#[cfg(unix)]
pub fn fake_docker(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("docker");
    let log = dir.join("calls.log");
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> '{}'\n{body}\n",
        log.display()
    );
    std::fs::write(&path, script).expect("write fake docker");
    let mut perms = std::fs::metadata(&path).expect("stat fake docker").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake docker");
    path
}

/// Argument lines recorded by a [`fake_docker`] script
pub fn docker_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
