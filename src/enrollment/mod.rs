//! # Transactional enrollment critical section.
//!
//! [`EnrollmentProcessor::process`] turns one admitted request into an
//! [`EnrollmentOutcome`]:
//!
//! ```text
//! exists_success_enrollment?  ── yes ──► AlreadyEnrolled      (advisory, no scope)
//!        │ no
//! begin ─► course_for_update(id)                              (exclusive per course)
//!        ├─ missing ──────────────────► Failed("error: ...")   (rollback)
//!        ├─ duplicate (re-checked) ───► AlreadyEnrolled        (rollback)
//!        ├─ full ─────────────────────► CourseFull             (rollback)
//!        └─ enroll + save course + save record + commit ──► Enrolled
//! ```
//!
//! Any store error aborts the unit; dropping it discards the staged writes.

mod outcome;
mod processor;

pub use outcome::{EnrollmentOutcome, REASON_ALREADY_ENROLLED, REASON_COURSE_FULL, REASON_ENROLLED};
pub use processor::EnrollmentProcessor;
