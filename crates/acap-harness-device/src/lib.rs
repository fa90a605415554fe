// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! acap-harness-device: Device control for acap-harness
//!
//! This library crate talks to the device under test: the VAPIX HTTP
//! endpoints, the Docker installer image, and the timed waits in between.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), acap_harness_device::DeviceError> {
//! use std::time::Duration;
//! use acap_harness_device::prelude::*;
//!
//! let client = DeviceClient::new("192.168.0.90", Credentials::new("root", "pass"), AuthScheme::Digest)?;
//! let client = &client;
//! let ready = poll_until(&TokioTimer, &PollSchedule::new(Duration::from_secs(120)), || async move {
//!     client.system_ready(Duration::from_secs(30)).await.ok().filter(|r| *r)
//! })
//! .await;
//! assert!(ready.is_ready());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod control;
pub mod docker;
pub mod error;
pub mod vapix;
pub mod wait;

pub use control::{AppAction, AppController, ControlMode};
pub use docker::DockerCli;
pub use error::DeviceError;
pub use vapix::{AuthScheme, Credentials, DeviceClient};
pub use wait::{PollOutcome, PollSchedule, Timer, TokioTimer, VirtualTimer, poll_until};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::control::{AppAction, AppController, ControlMode};
    pub use crate::error::DeviceError;
    pub use crate::vapix::{AuthScheme, Credentials, DeviceClient};
    pub use crate::wait::{PollSchedule, Timer, TokioTimer, poll_until};
}
