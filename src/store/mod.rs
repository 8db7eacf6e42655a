//! # Transactional store consumed by the critical section.
//!
//! Two traits split the surface:
//! - [`EnrollmentStore`] catalog reads, seeding, the advisory duplicate check,
//!   and [`begin`](EnrollmentStore::begin) to open a unit of work.
//! - [`UnitOfWork`] one all-or-nothing transaction holding at most one
//!   exclusive course scope.
//!
//! ## Rules
//! - [`UnitOfWork::course_for_update`] takes the course's exclusive scope; a
//!   second call for another course fails with [`StoreError::ScopeConflict`],
//!   so no unit ever holds two scopes. An unknown course yields `None` and
//!   takes no scope.
//! - Writes are staged and become visible only on [`UnitOfWork::commit`].
//! - Dropping a unit without committing rolls it back and releases the scope.
//!
//! [`MemoryStore`] is the in-process implementation.

mod locks;
mod memory;

pub use locks::KeyedLocks;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Course, CourseId, Enrollment, NewEnrollment, UserId};

/// Store of courses and enrollment records.
#[async_trait]
pub trait EnrollmentStore: Send + Sync + 'static {
    /// True if a committed `Success` enrollment exists for the pair.
    async fn exists_success_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, StoreError>;

    /// Opens a unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Creates a course with no enrollments and returns it.
    async fn insert_course(&self, name: &str, capacity: u32) -> Result<Course, StoreError>;

    async fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError>;

    /// All courses ordered by id.
    async fn courses(&self) -> Result<Vec<Course>, StoreError>;

    async fn enrollments_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StoreError>;
}

/// One all-or-nothing unit of work. Drop to roll back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Takes the exclusive scope of `id` (waiting for any holder) and reads the course.
    ///
    /// Returns `Ok(None)` for a missing course; the scope stays held until the unit ends.
    async fn course_for_update(&mut self, id: CourseId) -> Result<Option<Course>, StoreError>;

    /// Duplicate check that also sees this unit's staged records.
    async fn exists_success_enrollment(
        &mut self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, StoreError>;

    /// Stages a course update. The course's scope must be held.
    async fn save_course(&mut self, course: &Course) -> Result<(), StoreError>;

    /// Stages a new enrollment record and returns it with its id.
    async fn save_enrollment(&mut self, enrollment: NewEnrollment)
    -> Result<Enrollment, StoreError>;

    /// Applies every staged write atomically and releases the scope.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
