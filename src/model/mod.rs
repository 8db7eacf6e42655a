//! # Domain model.
//!
//! - [`EnrollmentRequest`] immutable value created at the edge, consumed once by a pipeline
//! - [`Course`] capacity-constrained resource record (only the critical section writes it)
//! - [`Enrollment`] append-only outcome record
//!
//! Ids are plain integers; JSON uses camelCase field names.

mod course;
mod enrollment;
mod request;

pub use course::Course;
pub use enrollment::{Enrollment, EnrollmentStatus, NewEnrollment};
pub use request::EnrollmentRequest;

/// Course identifier.
pub type CourseId = u64;

/// User identifier.
pub type UserId = u64;

/// Enrollment record identifier.
pub type EnrollmentId = u64;

/// Request priority (lower = more urgent).
pub type Priority = i32;
