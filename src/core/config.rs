//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings applied to every session a
//! [`Bus`](crate::Bus) runs.
//!
//! ## Sentinel values
//! - `timeout = 0s` → no session deadline (see [`BusConfig::deadline`])
//!
//! Buffering is a fixed policy of the runtime (unbounded per-sender queues,
//! single-slot inboxes) and is deliberately not configurable.

use std::time::Duration;

/// Configuration for message bus sessions.
///
/// ## Field semantics
/// - `timeout`: overall deadline for one [`Bus::run`](crate::Bus::run) call
///   (`0s` = none). When it expires every participant is cancelled and the run
///   ends with [`BusError::DeadlineExceeded`](crate::BusError::DeadlineExceeded).
///
/// ## Notes
/// Fields are public. Prefer the accessors to avoid sprinkling sentinel checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusConfig {
    /// Session deadline.
    ///
    /// - `Duration::ZERO` = run until the participants finish or the caller cancels
    /// - `> 0` = the session is cancelled once this much time has elapsed
    pub timeout: Duration,
}

impl BusConfig {
    /// Returns a configuration with the given session deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the session deadline as an `Option`.
    ///
    /// - `None` → no deadline
    /// - `Some(d)` → sessions are cancelled after `d`
    #[inline]
    pub fn deadline(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }
}
