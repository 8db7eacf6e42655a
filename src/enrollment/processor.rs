use std::sync::Arc;

use crate::error::StoreError;
use crate::model::{EnrollmentRequest, NewEnrollment};
use crate::store::EnrollmentStore;

use super::EnrollmentOutcome;

/// Runs the critical section against a shared store.
#[derive(Clone)]
pub struct EnrollmentProcessor {
    store: Arc<dyn EnrollmentStore>,
}

impl EnrollmentProcessor {
    pub fn new(store: Arc<dyn EnrollmentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EnrollmentStore> {
        &self.store
    }

    /// Decides one request. Never fails; faults become [`EnrollmentOutcome::Failed`].
    pub async fn process(&self, req: &EnrollmentRequest) -> EnrollmentOutcome {
        match self.run(req).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.is_integrity() {
                    tracing::error!(
                        user_id = req.user_id(),
                        course_id = req.course_id(),
                        label = err.as_label(),
                        error = %err,
                        "enrollment aborted: inconsistent input"
                    );
                } else {
                    tracing::warn!(
                        user_id = req.user_id(),
                        course_id = req.course_id(),
                        label = err.as_label(),
                        error = %err,
                        "enrollment aborted"
                    );
                }
                EnrollmentOutcome::failed(&err)
            }
        }
    }

    async fn run(&self, req: &EnrollmentRequest) -> Result<EnrollmentOutcome, StoreError> {
        let (user_id, course_id) = (req.user_id(), req.course_id());

        if self
            .store
            .exists_success_enrollment(user_id, course_id)
            .await?
        {
            return Ok(EnrollmentOutcome::AlreadyEnrolled);
        }

        let mut unit = self.store.begin().await?;
        let Some(mut course) = unit.course_for_update(course_id).await? else {
            return Err(StoreError::CourseNotFound { course_id });
        };

        // a concurrent duplicate may have committed while we waited for the scope
        if unit.exists_success_enrollment(user_id, course_id).await? {
            return Ok(EnrollmentOutcome::AlreadyEnrolled);
        }
        if !course.enroll() {
            return Ok(EnrollmentOutcome::CourseFull);
        }

        unit.save_course(&course).await?;
        let record = unit
            .save_enrollment(NewEnrollment::success(user_id, course_id))
            .await?;
        unit.commit().await?;

        tracing::debug!(
            user_id,
            course_id,
            enrollment_id = record.id,
            remaining = course.remaining(),
            "seat taken"
        );
        Ok(EnrollmentOutcome::Enrolled {
            enrollment_id: record.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Course, CourseId, Enrollment, UserId};
    use crate::store::{MemoryStore, UnitOfWork};
    use async_trait::async_trait;

    fn processor() -> (MemoryStore, EnrollmentProcessor) {
        let store = MemoryStore::new();
        let p = EnrollmentProcessor::new(Arc::new(store.clone()));
        (store, p)
    }

    #[tokio::test]
    async fn test_enroll_then_duplicate() {
        let (store, p) = processor();
        let c = store.insert_course("Java Programming", 100).await.unwrap();
        let req = EnrollmentRequest::new(5, c.id(), 1);

        assert!(p.process(&req).await.is_success());
        let again = p.process(&req).await;
        assert_eq!(again, EnrollmentOutcome::AlreadyEnrolled);
        assert_eq!(
            store.course(c.id()).await.unwrap().unwrap().current_enrollment(),
            1
        );
    }

    #[tokio::test]
    async fn test_full_course_rejects_without_mutation() {
        let (store, p) = processor();
        let c = store.insert_course("Tiny", 1).await.unwrap();

        assert!(p.process(&EnrollmentRequest::new(1, c.id(), 1)).await.is_success());
        let out = p.process(&EnrollmentRequest::new(2, c.id(), 2)).await;
        assert_eq!(out.as_pair(), (false, "course is full"));
        assert_eq!(store.enrollments().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_course_is_failure() {
        let (_store, p) = processor();
        let out = p.process(&EnrollmentRequest::new(1, 77, 0)).await;
        assert_eq!(out.reason(), "error: course not found: 77");
    }

    #[tokio::test]
    async fn test_zero_capacity_is_full() {
        let (store, p) = processor();
        let c = store.insert_course("Closed", 0).await.unwrap();
        let out = p.process(&EnrollmentRequest::new(1, c.id(), 0)).await;
        assert_eq!(out, EnrollmentOutcome::CourseFull);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_never_exceeded_under_contention() {
        let (store, p) = processor();
        let c = store.insert_course("Database Design", 30).await.unwrap();

        let handles: Vec<_> = (1..=200u64)
            .map(|u| {
                let p = p.clone();
                let course_id = c.id();
                tokio::spawn(async move { p.process(&EnrollmentRequest::new(u, course_id, 0)).await })
            })
            .collect();

        let mut enrolled = 0;
        let mut full = 0;
        for h in handles {
            match h.await.unwrap() {
                EnrollmentOutcome::Enrolled { .. } => enrolled += 1,
                EnrollmentOutcome::CourseFull => full += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(enrolled, 30);
        assert_eq!(full, 170);
        let course = store.course(c.id()).await.unwrap().unwrap();
        assert_eq!(course.current_enrollment(), 30);
        assert!(course.is_full());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_yield_one_seat() {
        let (store, p) = processor();
        let c = store.insert_course("Spring Boot", 50).await.unwrap();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let p = p.clone();
                let course_id = c.id();
                tokio::spawn(async move { p.process(&EnrollmentRequest::new(9, course_id, 0)).await })
            })
            .collect();

        let mut wins = 0;
        for h in handles {
            let out = h.await.unwrap();
            if out.is_success() {
                wins += 1;
            } else {
                assert_eq!(out, EnrollmentOutcome::AlreadyEnrolled);
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(store.enrollments_for_user(9).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_capacity_one_two_priorities() {
        let (store, p) = processor();
        let c = store.insert_course("Seminar", 1).await.unwrap();
        let first = EnrollmentRequest::new(1, c.id(), 1);
        let second = EnrollmentRequest::new(2, c.id(), 2);
        let (a, b) = tokio::join!(p.process(&first), p.process(&second));
        let mut reasons = [a.reason().to_owned(), b.reason().to_owned()];
        reasons.sort();
        assert_eq!(reasons, ["course is full", "enrollment successful"]);
    }

    /// Store whose units fail when writing the enrollment record.
    struct FailingRecordStore(MemoryStore);

    struct FailingUnit(Box<dyn UnitOfWork>);

    #[async_trait]
    impl EnrollmentStore for FailingRecordStore {
        async fn exists_success_enrollment(
            &self,
            user_id: UserId,
            course_id: CourseId,
        ) -> Result<bool, StoreError> {
            self.0.exists_success_enrollment(user_id, course_id).await
        }
        async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
            Ok(Box::new(FailingUnit(self.0.begin().await?)))
        }
        async fn insert_course(&self, name: &str, capacity: u32) -> Result<Course, StoreError> {
            self.0.insert_course(name, capacity).await
        }
        async fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
            self.0.course(id).await
        }
        async fn courses(&self) -> Result<Vec<Course>, StoreError> {
            self.0.courses().await
        }
        async fn enrollments_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<Enrollment>, StoreError> {
            self.0.enrollments_for_user(user_id).await
        }
    }

    #[async_trait]
    impl UnitOfWork for FailingUnit {
        async fn course_for_update(&mut self, id: CourseId) -> Result<Option<Course>, StoreError> {
            self.0.course_for_update(id).await
        }
        async fn exists_success_enrollment(
            &mut self,
            user_id: UserId,
            course_id: CourseId,
        ) -> Result<bool, StoreError> {
            self.0.exists_success_enrollment(user_id, course_id).await
        }
        async fn save_course(&mut self, course: &Course) -> Result<(), StoreError> {
            self.0.save_course(course).await
        }
        async fn save_enrollment(
            &mut self,
            _enrollment: NewEnrollment,
        ) -> Result<Enrollment, StoreError> {
            Err(StoreError::Backend {
                error: "disk full".into(),
            })
        }
        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.0.commit().await
        }
    }

    #[tokio::test]
    async fn test_store_fault_rolls_back_course_count() {
        let inner = MemoryStore::new();
        let c = inner.insert_course("Java Programming", 3).await.unwrap();
        let p = EnrollmentProcessor::new(Arc::new(FailingRecordStore(inner.clone())));

        let out = p.process(&EnrollmentRequest::new(1, c.id(), 0)).await;
        assert_eq!(out.reason(), "error: store backend failure: disk full");
        assert_eq!(
            inner.course(c.id()).await.unwrap().unwrap().current_enrollment(),
            0
        );
        assert!(inner.enrollments().is_empty());

        // scope was released by the rollback
        let ok = EnrollmentProcessor::new(Arc::new(inner.clone()))
            .process(&EnrollmentRequest::new(1, c.id(), 0))
            .await;
        assert!(ok.is_success());
    }
}
