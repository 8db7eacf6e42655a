//! # Runtime events emitted by pipelines and the dispatcher.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Request flow**: queued, admitted, and the terminal outcome of the critical section
//! - **Limiter**: adaptive increase/decrease and administrative override
//! - **Edge**: forwarded calls and transport failures
//! - **Runtime**: shutdown and subscriber health
//!
//! The [`Event`] struct carries the metadata each kind sets.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use seatvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::EnrollmentRejected)
//!     .with_user(42)
//!     .with_course(1)
//!     .with_duration(Duration::from_millis(12))
//!     .with_reason("course is full");
//!
//! assert_eq!(ev.kind, EventKind::EnrollmentRejected);
//! assert_eq!(ev.duration_ms, Some(12));
//! assert_eq!(ev.reason.as_deref(), Some("course is full"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::model::{CourseId, EnrollmentRequest, Priority, UserId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Request flow ===
    /// Request appended to the priority buffer.
    ///
    /// Sets: `user_id`, `course_id`, `priority`, `queue_depth`
    RequestQueued,

    /// Request took a slot and is about to run the critical section.
    ///
    /// Sets: `user_id`, `course_id`, `priority`, `limit`
    RequestAdmitted,

    /// Seat taken and enrollment committed.
    ///
    /// Sets: `user_id`, `course_id`, `duration_ms`, `reason`
    EnrollmentSucceeded,

    /// Business failure (already enrolled, course full).
    ///
    /// Sets: `user_id`, `course_id`, `duration_ms`, `reason`
    EnrollmentRejected,

    /// Unit of work aborted (missing course, store failure). Anomaly.
    ///
    /// Sets: `user_id`, `course_id`, `duration_ms`, `reason`
    EnrollmentFailed,

    // === Limiter ===
    /// Adaptive limit grew.
    ///
    /// Sets: `limit` (new value), `reason` (`"from=<old>"`), `queue_depth`
    LimitIncreased,

    /// Adaptive limit shrank.
    ///
    /// Sets: `limit` (new value), `reason` (`"from=<old>"`), `duration_ms`
    LimitDecreased,

    /// Operator set the limit directly (not clamped).
    ///
    /// Sets: `limit`
    LimitOverridden,

    // === Edge ===
    /// Backend answered (any status).
    ///
    /// Sets: `target`, `path`, `status`
    RequestForwarded,

    /// Backend unreachable or reply unusable; a synthetic response was returned.
    ///
    /// Sets: `target` (if resolved), `path`, `status`, `reason`
    ForwardFailed,

    // === Runtime ===
    /// Pipeline shutdown requested.
    ShutdownRequested,

    /// All in-flight requests finished within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded with requests still in flight.
    ///
    /// Sets: `reason` (`"in_flight=<n>"`)
    GraceExceeded,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `target` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked while handling an event.
    ///
    /// Sets: `target` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    pub user_id: Option<UserId>,
    pub course_id: Option<CourseId>,
    pub priority: Option<Priority>,
    /// Concurrency limit relevant to the event.
    pub limit: Option<usize>,
    /// Waiting requests at the time of the event.
    pub queue_depth: Option<usize>,
    /// Elapsed processing time in milliseconds.
    pub duration_ms: Option<u64>,
    /// Backend base address, or subscriber name for subscriber events.
    pub target: Option<Arc<str>>,
    /// Proxied request path.
    pub path: Option<Arc<str>>,
    /// HTTP status returned to the caller.
    pub status: Option<u16>,
    /// Human-readable reason (outcome, error detail, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            user_id: None,
            course_id: None,
            priority: None,
            limit: None,
            queue_depth: None,
            duration_ms: None,
            target: None,
            path: None,
            status: None,
            reason: None,
        }
    }

    /// Attaches user, course and priority of a request.
    #[inline]
    pub fn with_request(mut self, req: &EnrollmentRequest) -> Self {
        self.user_id = Some(req.user_id());
        self.course_id = Some(req.course_id());
        self.priority = Some(req.priority());
        self
    }

    #[inline]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[inline]
    pub fn with_course(mut self, course_id: CourseId) -> Self {
        self.course_id = Some(course_id);
        self
    }

    #[inline]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[inline]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = Some(depth);
        self
    }

    /// Attaches an elapsed time (stored as whole milliseconds).
    #[inline]
    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    #[inline]
    pub fn with_target(mut self, target: impl Into<Arc<str>>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[inline]
    pub fn with_path(mut self, path: impl Into<Arc<str>>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[inline]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_target(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_target(subscriber)
            .with_reason(info)
    }

    /// True for the three terminal outcomes of the critical section.
    #[inline]
    pub fn is_outcome(&self) -> bool {
        matches!(
            self.kind,
            EventKind::EnrollmentSucceeded
                | EventKind::EnrollmentRejected
                | EventKind::EnrollmentFailed
        )
    }

    /// True for subscriber health events (never re-published to subscribers).
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::RequestQueued);
        let b = Event::new(EventKind::RequestQueued);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_with_request_copies_fields() {
        let req = EnrollmentRequest::new(9, 2, -1);
        let ev = Event::new(EventKind::RequestAdmitted).with_request(&req);
        assert_eq!(ev.user_id, Some(9));
        assert_eq!(ev.course_id, Some(2));
        assert_eq!(ev.priority, Some(-1));
    }

    #[test]
    fn test_outcome_classification() {
        assert!(Event::new(EventKind::EnrollmentFailed).is_outcome());
        assert!(!Event::new(EventKind::LimitDecreased).is_outcome());
        assert!(Event::subscriber_overflow("log", "full").is_subscriber_event());
    }
}
