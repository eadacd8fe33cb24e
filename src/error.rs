//! Error types used by the taskbus runtime and by behaviors.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`]: the single terminal result of one [`Bus::run`](crate::Bus::run) call.
//! - [`BehaviorError`]: errors returned by individual behaviors (and by the
//!   [`Context`](crate::Context) send/receive helpers).
//!
//! Both types provide `as_label` for logging and metrics.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// # Terminal error of a messaging session.
///
/// Only the first error observed by the orchestrator is reported; errors that
/// arrive while the session is already tearing down are logged and discarded.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A behavior returned an error; every other participant was canceled and drained.
    #[error("participant '{participant}' failed: {source}")]
    Participant {
        /// Name of the behavior that failed.
        participant: String,
        /// The error it returned.
        source: BehaviorError,
    },

    /// A behavior panicked; handled like a returned error.
    #[error("participant '{participant}' panicked: {message}")]
    Panicked {
        /// Name of the behavior that panicked.
        participant: String,
        /// Panic payload rendered as text.
        message: String,
    },

    /// The caller's cancellation token was cancelled.
    #[error("session canceled")]
    Canceled,

    /// The session ran longer than [`BusConfig::timeout`](crate::BusConfig::timeout).
    #[error("session deadline of {timeout:?} exceeded")]
    DeadlineExceeded {
        /// The configured session timeout.
        timeout: Duration,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskbus::BusError;
    ///
    /// assert_eq!(BusError::Canceled.as_label(), "bus_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Participant { .. } => "bus_participant_failed",
            BusError::Panicked { .. } => "bus_participant_panicked",
            BusError::Canceled => "bus_canceled",
            BusError::DeadlineExceeded { .. } => "bus_deadline_exceeded",
        }
    }

    /// True for the two cancellation variants (caller cancel or deadline).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BusError::Canceled | BusError::DeadlineExceeded { .. })
    }
}

/// # Errors returned by behaviors.
///
/// Any `Err` returned from [`Behavior::run`](crate::Behavior::run) ends the whole
/// session and is surfaced as [`BusError::Participant`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BehaviorError {
    /// Behavior-specific failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The session was cancelled while the behavior was waiting on the bus.
    #[error("context cancelled")]
    Canceled,
}

impl BehaviorError {
    /// Builds a [`BehaviorError::Fail`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use taskbus::BehaviorError;
    ///
    /// let err = BehaviorError::fail("boom");
    /// assert_eq!(err.to_string(), "execution failed: boom");
    /// ```
    pub fn fail(error: impl Display) -> Self {
        BehaviorError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BehaviorError::Fail { .. } => "behavior_failed",
            BehaviorError::Canceled => "behavior_canceled",
        }
    }
}
