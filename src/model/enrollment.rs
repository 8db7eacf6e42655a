use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CourseId, EnrollmentId, UserId};

/// Status of an enrollment record.
///
/// Records are written once with a terminal status; `Pending` exists for
/// completeness and is never persisted by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Pending,
    Success,
    Failed,
}

/// Persisted outcome of one critical section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub status: EnrollmentStatus,
}

/// Enrollment record before the store assigns its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEnrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub status: EnrollmentStatus,
}

impl NewEnrollment {
    /// A successful enrollment stamped with the current time.
    pub fn success(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            enrolled_at: Utc::now(),
            status: EnrollmentStatus::Success,
        }
    }

    /// Attaches the store-assigned id.
    pub fn into_enrollment(self, id: EnrollmentId) -> Enrollment {
        Enrollment {
            id,
            user_id: self.user_id,
            course_id: self.course_id,
            enrolled_at: self.enrolled_at,
            status: self.status,
        }
    }
}

impl Enrollment {
    /// True for a `Success` record of `(user_id, course_id)`.
    pub fn is_success_for(&self, user_id: UserId, course_id: CourseId) -> bool {
        self.status == EnrollmentStatus::Success
            && self.user_id == user_id
            && self.course_id == course_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrolled_at_serializes_as_rfc3339() {
        let record = NewEnrollment::success(1, 2).into_enrollment(3);
        let json = serde_json::to_value(&record).unwrap();

        let raw = json["enrolledAt"].as_str().expect("timestamp is a string");
        let parsed = DateTime::parse_from_rfc3339(raw).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), record.enrolled_at);
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["userId"], 1);
    }

    #[test]
    fn test_record_roundtrips_through_json() {
        let record = NewEnrollment::success(7, 9).into_enrollment(11);
        let back: Enrollment = serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
        assert_eq!(back, record);
        assert!(back.is_success_for(7, 9));
        assert!(!back.is_success_for(7, 8));
    }
}
