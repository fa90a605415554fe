//! acap-harness library
//!
//! This module exports the runner behind the `acap-harness` binary for use
//! in integration tests and as a library.

pub mod commands;
pub mod config;
pub mod error;
pub mod report;
pub mod session;

pub use config::{Command, Config, ConfigError};
pub use error::SessionError;
pub use report::RunReport;
pub use session::{Session, SessionSettings};
