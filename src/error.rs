//! Error types used by the seatvisor pipeline, store and dispatcher.
//!
//! This module defines the main error enums:
//!
//! - [`RuntimeError`] — errors raised by the pipeline runtime itself.
//! - [`StoreError`] — errors raised inside a store unit of work.
//! - [`DispatchError`] — errors raised while resolving or calling a backend target.
//! - [`ConfigError`] — errors raised while loading configuration.
//!
//! Business outcomes (duplicate enrollment, full course) are **not** errors;
//! see [`EnrollmentOutcome`](crate::EnrollmentOutcome).
//!
//! Every type provides `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::model::CourseId;

/// # Errors produced by the pipeline runtime.
///
/// These represent failures in the orchestration system itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded while admitted requests were still running.
    #[error("shutdown timeout {grace:?} exceeded; {in_flight} requests still in flight")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of admitted requests that did not finish in time.
        in_flight: usize,
    },

    /// The pipeline no longer accepts requests.
    #[error("pipeline is shut down")]
    Closed,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use seatvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), in_flight: 3 };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Closed => "runtime_closed",
        }
    }
}

/// # Errors produced by a transactional store.
///
/// Any of these aborts the current unit of work; staged writes are discarded.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced course does not exist (integrity failure, not a business outcome).
    #[error("course not found: {course_id}")]
    CourseNotFound {
        /// The missing course id.
        course_id: CourseId,
    },

    /// A unit of work tried to take a second course scope.
    #[error("unit of work already holds course {held}; refusing to lock course {requested}")]
    ScopeConflict {
        /// Course whose scope is already held.
        held: CourseId,
        /// Course that was requested.
        requested: CourseId,
    },

    /// Write attempted on a course whose exclusive scope is not held.
    #[error("course {course_id} is not locked by this unit of work")]
    NotLocked {
        /// Course that was written without its scope.
        course_id: CourseId,
    },

    /// Backend-specific failure.
    #[error("store backend failure: {error}")]
    Backend {
        /// The underlying error message.
        error: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::CourseNotFound { .. } => "store_course_not_found",
            StoreError::ScopeConflict { .. } => "store_scope_conflict",
            StoreError::NotLocked { .. } => "store_not_locked",
            StoreError::Backend { .. } => "store_backend",
        }
    }

    /// Indicates whether the error points at inconsistent input rather than a store fault.
    ///
    /// # Example
    /// ```
    /// use seatvisor::StoreError;
    ///
    /// assert!(StoreError::CourseNotFound { course_id: 7 }.is_integrity());
    /// assert!(!StoreError::Backend { error: "disk".into() }.is_integrity());
    /// ```
    pub fn is_integrity(&self) -> bool {
        matches!(self, StoreError::CourseNotFound { .. })
    }
}

/// # Errors produced while dispatching to a backend target.
///
/// [`Dispatcher::forward`](crate::Dispatcher::forward) never returns these; it
/// converts them into a synthetic degraded response.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No backend targets are configured.
    #[error("no backend targets configured")]
    NoTargets,

    /// Target unreachable, timed out or spoke an invalid protocol.
    #[error("{error}")]
    Transport {
        /// Target base address.
        target: String,
        /// The underlying error message.
        error: String,
    },

    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {error}")]
    Client {
        /// The underlying error message.
        error: String,
    },

    /// Response body exceeded the configured buffer limit.
    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::NoTargets => "dispatch_no_targets",
            DispatchError::Transport { .. } => "dispatch_transport",
            DispatchError::Client { .. } => "dispatch_client",
            DispatchError::BodyTooLarge { .. } => "dispatch_body_too_large",
        }
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    /// Configuration file is not valid TOML for [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but violate a constraint.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read(_) => "config_read",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}
