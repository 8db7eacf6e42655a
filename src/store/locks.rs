use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::CourseId;

/// Lazily populated registry of per-course mutexes.
///
/// Guards are owned, so a unit of work can hold one across `.await` points
/// and release it by dropping. Unrelated courses never contend.
#[derive(Default)]
pub struct KeyedLocks {
    map: DashMap<CourseId, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`.
    pub async fn lock(&self, id: CourseId) -> OwnedMutexGuard<()> {
        // shard guard must be gone before awaiting
        let mutex = Arc::clone(&self.map.entry(id).or_default());
        mutex.lock_owned().await
    }

    /// Returns the guard if `id` is free right now.
    pub fn try_lock(&self, id: CourseId) -> Option<OwnedMutexGuard<()>> {
        let mutex = Arc::clone(&self.map.entry(id).or_default());
        mutex.try_lock_owned().ok()
    }

    /// Number of keys that have ever been locked.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock(1).await;
        assert!(locks.try_lock(1).is_none());

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(1).await;
        assert!(locks.try_lock(2).is_some());
        assert_eq!(locks.len(), 2);
    }
}
