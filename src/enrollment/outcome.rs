use crate::error::StoreError;
use crate::events::EventKind;
use crate::model::EnrollmentId;

/// Reason reported for a committed enrollment.
pub const REASON_ENROLLED: &str = "enrollment successful";
/// Reason reported when the user already holds a seat.
pub const REASON_ALREADY_ENROLLED: &str = "already enrolled";
/// Reason reported when no seat is left.
pub const REASON_COURSE_FULL: &str = "course is full";

/// Terminal outcome of one critical section.
///
/// Business failures are variants, not errors. `Failed` covers integrity and
/// store faults; its reason is `"error: <detail>"`.
///
/// ```rust
/// use seatvisor::EnrollmentOutcome;
///
/// let out = EnrollmentOutcome::CourseFull;
/// assert_eq!(out.as_pair(), (false, "course is full"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    Enrolled { enrollment_id: EnrollmentId },
    AlreadyEnrolled,
    CourseFull,
    Failed { reason: String },
}

impl EnrollmentOutcome {
    /// Wraps an aborted unit of work.
    pub fn failed(err: &StoreError) -> Self {
        EnrollmentOutcome::Failed {
            reason: format!("error: {err}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EnrollmentOutcome::Enrolled { .. })
    }

    /// Duplicate or full: a normal negative answer.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EnrollmentOutcome::AlreadyEnrolled | EnrollmentOutcome::CourseFull
        )
    }

    pub fn reason(&self) -> &str {
        match self {
            EnrollmentOutcome::Enrolled { .. } => REASON_ENROLLED,
            EnrollmentOutcome::AlreadyEnrolled => REASON_ALREADY_ENROLLED,
            EnrollmentOutcome::CourseFull => REASON_COURSE_FULL,
            EnrollmentOutcome::Failed { reason } => reason,
        }
    }

    /// The `(success, reason)` pair.
    pub fn as_pair(&self) -> (bool, &str) {
        (self.is_success(), self.reason())
    }

    /// Event published for this outcome.
    pub fn event_kind(&self) -> EventKind {
        match self {
            EnrollmentOutcome::Enrolled { .. } => EventKind::EnrollmentSucceeded,
            EnrollmentOutcome::AlreadyEnrolled | EnrollmentOutcome::CourseFull => {
                EventKind::EnrollmentRejected
            }
            EnrollmentOutcome::Failed { .. } => EventKind::EnrollmentFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_reason_carries_detail() {
        let out = EnrollmentOutcome::failed(&StoreError::CourseNotFound { course_id: 9 });
        assert_eq!(out.reason(), "error: course not found: 9");
        assert!(!out.is_success());
        assert!(!out.is_rejection());
        assert_eq!(out.event_kind(), EventKind::EnrollmentFailed);
    }

    #[test]
    fn test_pairs() {
        assert_eq!(
            EnrollmentOutcome::Enrolled { enrollment_id: 1 }.as_pair(),
            (true, "enrollment successful")
        );
        assert_eq!(
            EnrollmentOutcome::AlreadyEnrolled.as_pair(),
            (false, "already enrolled")
        );
    }
}
