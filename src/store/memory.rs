use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::OwnedMutexGuard;

use crate::error::StoreError;
use crate::model::{Course, CourseId, Enrollment, NewEnrollment, UserId};

use super::{EnrollmentStore, KeyedLocks, UnitOfWork};

/// In-process store. Clones share the same data.
///
/// Committed state lives behind two short `RwLock`s that are never held
/// across an `.await`; course scopes come from a [`KeyedLocks`] registry.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    courses: RwLock<BTreeMap<CourseId, Course>>,
    enrollments: RwLock<Vec<Enrollment>>,
    course_seq: AtomicU64,
    enrollment_seq: AtomicU64,
    locks: KeyedLocks,
}

impl Inner {
    fn has_success(&self, user_id: UserId, course_id: CourseId) -> bool {
        self.enrollments
            .read()
            .iter()
            .any(|e| e.is_success_for(user_id, course_id))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed enrollment records (all users).
    pub fn enrollments(&self) -> Vec<Enrollment> {
        self.inner.enrollments.read().clone()
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn exists_success_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, StoreError> {
        Ok(self.inner.has_success(user_id, course_id))
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnit {
            store: Arc::clone(&self.inner),
            scope: None,
            staged_course: None,
            staged_enrollments: Vec::new(),
        }))
    }

    async fn insert_course(&self, name: &str, capacity: u32) -> Result<Course, StoreError> {
        let id = self.inner.course_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let course = Course::new(id, name, capacity);
        self.inner.courses.write().insert(id, course.clone());
        Ok(course)
    }

    async fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        Ok(self.inner.courses.read().get(&id).cloned())
    }

    async fn courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.inner.courses.read().values().cloned().collect())
    }

    async fn enrollments_for_user(&self, user_id: UserId) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self
            .inner
            .enrollments
            .read()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}

struct MemoryUnit {
    store: Arc<Inner>,
    scope: Option<(CourseId, OwnedMutexGuard<()>)>,
    staged_course: Option<Course>,
    staged_enrollments: Vec<Enrollment>,
}

impl MemoryUnit {
    fn held(&self) -> Option<CourseId> {
        self.scope.as_ref().map(|(id, _)| *id)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn course_for_update(&mut self, id: CourseId) -> Result<Option<Course>, StoreError> {
        match self.held() {
            Some(held) if held != id => {
                return Err(StoreError::ScopeConflict { held, requested: id });
            }
            Some(_) => {}
            None => {
                // courses are never removed, so a missing id can skip the scope
                if !self.store.courses.read().contains_key(&id) {
                    return Ok(None);
                }
                let guard = self.store.locks.lock(id).await;
                self.scope = Some((id, guard));
            }
        }
        if let Some(staged) = &self.staged_course {
            return Ok(Some(staged.clone()));
        }
        Ok(self.store.courses.read().get(&id).cloned())
    }

    async fn exists_success_enrollment(
        &mut self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, StoreError> {
        let staged = self
            .staged_enrollments
            .iter()
            .any(|e| e.is_success_for(user_id, course_id));
        Ok(staged || self.store.has_success(user_id, course_id))
    }

    async fn save_course(&mut self, course: &Course) -> Result<(), StoreError> {
        if self.held() != Some(course.id()) {
            return Err(StoreError::NotLocked {
                course_id: course.id(),
            });
        }
        self.staged_course = Some(course.clone());
        Ok(())
    }

    async fn save_enrollment(
        &mut self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, StoreError> {
        let id = self.store.enrollment_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let record = enrollment.into_enrollment(id);
        self.staged_enrollments.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnit {
            store,
            scope,
            staged_course,
            staged_enrollments,
        } = *self;
        {
            // fixed order: courses, then enrollments
            let mut courses = store.courses.write();
            let mut enrollments = store.enrollments.write();
            if let Some(course) = staged_course {
                courses.insert(course.id(), course);
            }
            enrollments.extend(staged_enrollments);
        }
        drop(scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catalog_roundtrip() {
        let store = MemoryStore::new();
        let java = store.insert_course("Java Programming", 100).await.unwrap();
        let db = store.insert_course("Database Design", 30).await.unwrap();
        assert_eq!((java.id(), db.id()), (1, 2));

        let all = store.courses().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].name(), "Database Design");
        assert_eq!(store.course(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let store = MemoryStore::new();
        let course = store.insert_course("Spring Boot", 2).await.unwrap();

        let mut unit = store.begin().await.unwrap();
        let mut c = unit.course_for_update(course.id()).await.unwrap().unwrap();
        assert!(c.enroll());
        unit.save_course(&c).await.unwrap();
        let rec = unit
            .save_enrollment(NewEnrollment::success(7, course.id()))
            .await
            .unwrap();
        assert!(unit.exists_success_enrollment(7, course.id()).await.unwrap());
        // staged only
        assert!(!store.exists_success_enrollment(7, course.id()).await.unwrap());

        unit.commit().await.unwrap();
        assert!(store.exists_success_enrollment(7, course.id()).await.unwrap());
        assert_eq!(
            store.course(course.id()).await.unwrap().unwrap().current_enrollment(),
            1
        );
        assert_eq!(store.enrollments_for_user(7).await.unwrap(), vec![rec]);
    }

    #[tokio::test]
    async fn test_drop_rolls_back_and_releases_scope() {
        let store = MemoryStore::new();
        let course = store.insert_course("Spring Boot", 2).await.unwrap();

        {
            let mut unit = store.begin().await.unwrap();
            let mut c = unit.course_for_update(course.id()).await.unwrap().unwrap();
            c.enroll();
            unit.save_course(&c).await.unwrap();
            unit.save_enrollment(NewEnrollment::success(1, course.id()))
                .await
                .unwrap();
            assert!(store.inner.locks.try_lock(course.id()).is_none());
        }

        assert!(store.inner.locks.try_lock(course.id()).is_some());
        assert_eq!(
            store.course(course.id()).await.unwrap().unwrap().current_enrollment(),
            0
        );
        assert!(store.enrollments().is_empty());
    }

    #[tokio::test]
    async fn test_second_scope_is_refused() {
        let store = MemoryStore::new();
        let a = store.insert_course("A", 1).await.unwrap();
        let b = store.insert_course("B", 1).await.unwrap();

        let mut unit = store.begin().await.unwrap();
        unit.course_for_update(a.id()).await.unwrap();
        let err = unit.course_for_update(b.id()).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::ScopeConflict {
                held: a.id(),
                requested: b.id()
            }
        );
        // re-reading the held course is fine
        assert!(unit.course_for_update(a.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_without_scope_is_refused() {
        let store = MemoryStore::new();
        let a = store.insert_course("A", 1).await.unwrap();
        let mut unit = store.begin().await.unwrap();
        let err = unit.save_course(&a).await.unwrap_err();
        assert_eq!(err.as_label(), "store_not_locked");
    }

    #[tokio::test]
    async fn test_missing_course_takes_no_scope() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        assert!(unit.course_for_update(42).await.unwrap().is_none());
        assert!(store.inner.locks.is_empty());
        let err = unit
            .save_course(&Course::new(42, "ghost", 1))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "store_not_locked");
    }

    #[tokio::test]
    async fn test_lock_registry_bounded_by_catalog() {
        let store = MemoryStore::new();
        let real = store.insert_course("Database Design", 30).await.unwrap();

        for id in 1_000..11_000 {
            let mut unit = store.begin().await.unwrap();
            assert!(unit.course_for_update(id).await.unwrap().is_none());
        }
        let mut unit = store.begin().await.unwrap();
        assert!(unit.course_for_update(real.id()).await.unwrap().is_some());
        drop(unit);

        assert_eq!(store.inner.locks.len(), 1);
    }
}
