// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Timed waits against the device
//!
//! Everything the harness waits for (the device coming up, the test binary
//! finishing) is a probe repeated on a fixed schedule until it succeeds or a
//! wall-clock deadline passes. The clock and the sleep are behind [`Timer`] so
//! tests can run a three minute wait in no time.
//!
//! Cancellation is by dropping the future returned from [`poll_until`].

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, trace};

/// Source of time for waits
#[async_trait]
pub trait Timer: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock timer backed by the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Timer whose clock only moves when something sleeps on it
///
/// Sleeping returns immediately after advancing the clock, which makes
/// long waits deterministic in tests.
#[derive(Debug)]
pub struct VirtualTimer {
    origin: Instant,
    elapsed_nanos: AtomicU64,
    sleeps: AtomicU32,
}

impl VirtualTimer {
    /// Create a timer starting at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_nanos: AtomicU64::new(0),
            sleeps: AtomicU32::new(0),
        }
    }

    /// Total virtual time slept so far
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }

    /// Number of sleeps performed
    #[must_use]
    pub fn sleeps(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }

    /// Move the clock forward without counting a sleep
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Default for VirtualTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Timer for VirtualTimer {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// When and how often to probe, and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Sleep before the first probe
    pub initial_delay: Duration,
    /// Sleep between probes
    pub interval: Duration,
    /// Give up once this much time has passed since the wait started
    pub timeout: Duration,
}

impl PollSchedule {
    /// Probe immediately, then once per second, until `timeout`
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval: Duration::from_secs(1),
            timeout,
        }
    }

    /// Schedule for waiting on the test binary to finish: first look after
    /// 30 s, then every 5 s, for at most three minutes
    #[must_use]
    pub fn test_completion() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(3 * 60),
        }
    }

    /// Set the sleep before the first probe
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the sleep between probes
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the overall deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of a timed wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe succeeded
    Ready(T),
    /// The deadline passed first
    TimedOut {
        /// Time spent waiting
        elapsed: Duration,
        /// Number of probes made
        attempts: u32,
    },
}

impl<T> PollOutcome<T> {
    /// Check whether the probe succeeded
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The probe's value, if it succeeded
    #[must_use]
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::TimedOut { .. } => None,
        }
    }
}

/// Repeat `probe` on `schedule` until it yields a value or time runs out
///
/// The deadline is checked before every probe, so a probe never starts once
/// `schedule.timeout` has elapsed. Timing out is a normal outcome, not an
/// error.
pub async fn poll_until<T, F, Fut>(
    timer: &dyn Timer,
    schedule: &PollSchedule,
    mut probe: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = timer.now();
    if !schedule.initial_delay.is_zero() {
        timer.sleep(schedule.initial_delay).await;
    }

    let mut attempts = 0u32;
    loop {
        let elapsed = timer.now().saturating_duration_since(start);
        if elapsed > schedule.timeout {
            debug!(?elapsed, attempts, "Wait timed out");
            return PollOutcome::TimedOut { elapsed, attempts };
        }

        attempts += 1;
        if let Some(value) = probe().await {
            trace!(?elapsed, attempts, "Wait satisfied");
            return PollOutcome::Ready(value);
        }
        timer.sleep(schedule.interval).await;
    }
}
