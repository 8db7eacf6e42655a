//! # LogWriter — events as tracing records
//!
//! Request-flow events go to `debug`, outcomes and limit moves to `info`,
//! business rejections to `info`, anomalies (`EnrollmentFailed`,
//! `ForwardFailed`, `GraceExceeded`) to `error`/`warn`.
//!
//! ## Example output
//! ```text
//! INFO seatvisor: enrollment succeeded user=42 course=1 duration_ms=3
//! INFO seatvisor: enrollment rejected user=7 course=1 reason="course is full"
//! ERROR seatvisor: enrollment failed user=8 course=99 reason="error: course not found: 99"
//! INFO seatvisor: limit increased limit=21 from=20
//! WARN seatvisor: forward failed backend="http://localhost:8082" path="/api/enroll" reason="..."
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::RequestQueued => {
                tracing::debug!(
                    user = ?e.user_id, course = ?e.course_id, priority = ?e.priority,
                    queue = ?e.queue_depth, "request queued"
                );
            }
            EventKind::RequestAdmitted => {
                tracing::debug!(user = ?e.user_id, course = ?e.course_id, limit = ?e.limit, "request admitted");
            }
            EventKind::EnrollmentSucceeded => {
                tracing::info!(user = ?e.user_id, course = ?e.course_id, duration_ms = ?e.duration_ms, "enrollment succeeded");
            }
            EventKind::EnrollmentRejected => {
                tracing::info!(user = ?e.user_id, course = ?e.course_id, reason, "enrollment rejected");
            }
            EventKind::EnrollmentFailed => {
                tracing::error!(user = ?e.user_id, course = ?e.course_id, reason, "enrollment failed");
            }
            EventKind::LimitIncreased => {
                tracing::info!(limit = ?e.limit, queue = ?e.queue_depth, reason, "limit increased");
            }
            EventKind::LimitDecreased => {
                tracing::info!(limit = ?e.limit, duration_ms = ?e.duration_ms, reason, "limit decreased");
            }
            EventKind::LimitOverridden => {
                tracing::info!(limit = ?e.limit, "limit overridden");
            }
            EventKind::RequestForwarded => {
                tracing::info!(backend = ?e.target, path = ?e.path, status = ?e.status, "request forwarded");
            }
            EventKind::ForwardFailed => {
                tracing::warn!(backend = ?e.target, path = ?e.path, reason, "forward failed");
            }
            EventKind::ShutdownRequested => tracing::info!("shutdown requested"),
            EventKind::AllStoppedWithin => tracing::info!("all requests stopped within grace"),
            EventKind::GraceExceeded => tracing::error!(reason, "grace exceeded"),
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(subscriber = ?e.target, reason, "subscriber trouble");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
