use serde::{Deserialize, Serialize};

use super::{CourseId, Priority, UserId};

/// A request to take one seat of a course.
///
/// Immutable once created. Lower `priority` values are admitted first.
///
/// ```rust
/// use seatvisor::EnrollmentRequest;
///
/// let req: EnrollmentRequest =
///     serde_json::from_str(r#"{"userId": 7, "courseId": 1, "priority": 3}"#).unwrap();
/// assert_eq!(req, EnrollmentRequest::new(7, 1, 3));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    user_id: UserId,
    course_id: CourseId,
    priority: Priority,
}

impl EnrollmentRequest {
    /// Creates a new request.
    pub fn new(user_id: UserId, course_id: CourseId, priority: Priority) -> Self {
        Self {
            user_id,
            course_id,
            priority,
        }
    }

    /// Requesting user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Requested course.
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// Priority (lower = more urgent).
    pub fn priority(&self) -> Priority {
        self.priority
    }
}
