//! Per-project write locks
//!
//! Asset and package generation hold their project's lock for the whole run so
//! that status changes and asset writes for one project never interleave.
//! Different projects never contend. An entry leaves the map when its last
//! holder releases it with nobody waiting.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};

type LockMap = HashMap<String, Arc<Mutex<()>>>;

fn lock_map(map: &StdMutex<LockMap>) -> StdMutexGuard<'_, LockMap> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Map of project id to its exclusive lock
#[derive(Debug, Clone, Default)]
pub struct ProjectLocks {
    locks: Arc<StdMutex<LockMap>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, project_id: &str) -> Arc<Mutex<()>> {
        lock_map(&self.locks)
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn guard(&self, project_id: &str, guard: OwnedMutexGuard<()>) -> ProjectLockGuard {
        ProjectLockGuard {
            project_id: project_id.to_string(),
            acquired_at: Instant::now(),
            registry: self.locks.clone(),
            guard,
        }
    }

    /// Number of projects with a live lock entry
    pub fn tracked(&self) -> usize {
        lock_map(&self.locks).len()
    }

    /// Wait up to `timeout` for the project's lock
    pub async fn acquire(&self, project_id: &str, timeout: Duration) -> Result<ProjectLockGuard> {
        let lock = self.entry(project_id);
        let start = Instant::now();

        debug!(project_id, timeout_ms = timeout.as_millis() as u64, "Acquiring project lock");

        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => {
                debug!(
                    project_id,
                    waited_ms = start.elapsed().as_millis() as u64,
                    "Project lock acquired"
                );
                Ok(self.guard(project_id, guard))
            }
            Err(_) => {
                warn!(project_id, timeout_ms = timeout.as_millis() as u64, "Project lock timed out");
                Err(Error::LockTimeout(project_id.to_string()))
            }
        }
    }

    /// Take the lock only if nobody holds it
    pub async fn try_acquire(&self, project_id: &str) -> Result<ProjectLockGuard> {
        let lock = self.entry(project_id);
        lock.try_lock_owned()
            .map(|guard| self.guard(project_id, guard))
            .map_err(|_| Error::LockTimeout(project_id.to_string()))
    }

    /// Whether some task currently holds the project's lock
    pub async fn is_locked(&self, project_id: &str) -> bool {
        lock_map(&self.locks)
            .get(project_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}

/// Held project lock; released on drop
pub struct ProjectLockGuard {
    project_id: String,
    acquired_at: Instant,
    registry: Arc<StdMutex<LockMap>>,
    guard: OwnedMutexGuard<()>,
}

impl ProjectLockGuard {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for ProjectLockGuard {
    fn drop(&mut self) {
        let mut locks = lock_map(&self.registry);
        // One reference in the map, one in this guard: nobody else is waiting
        if let Some(entry) = locks.get(&self.project_id)
            && Arc::ptr_eq(entry, OwnedMutexGuard::mutex(&self.guard))
            && Arc::strong_count(entry) == 2
        {
            locks.remove(&self.project_id);
        }
        drop(locks);

        debug!(
            project_id = %self.project_id,
            held_ms = self.held_for().as_millis() as u64,
            "Project lock released"
        );
    }
}

impl fmt::Debug for ProjectLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectLockGuard")
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl fmt::Display for ProjectLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectLock[{}]", self.project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let locks = ProjectLocks::new();

        let guard = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(guard.project_id(), "p1");
        assert!(locks.is_locked("p1").await);

        drop(guard);
        assert!(!locks.is_locked("p1").await);
        locks.acquire("p1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_kept_while_waiters_remain() {
        let locks = ProjectLocks::new();
        let held = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("p1", Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        drop(held);
        assert_eq!(locks.tracked(), 1);

        let guard = waiter.await.unwrap().unwrap();
        assert!(locks.is_locked("p1").await);
        drop(guard);
        assert_eq!(locks.tracked(), 0);
        assert!(!locks.is_locked("p1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_contended_lock_times_out() {
        let locks = ProjectLocks::new();
        let _held = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();

        let err = locks
            .acquire("p1", Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LockTimeout(ref id) if id == "p1"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_projects_do_not_contend() {
        let locks = ProjectLocks::new();
        let _a = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();
        let b = locks.try_acquire("p2").await;
        assert!(b.is_ok());
        assert!(locks.try_acquire("p1").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_gets_lock_after_release() {
        let locks = ProjectLocks::new();
        let held = locks.acquire("p1", Duration::from_secs(1)).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("p1", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(held);

        let guard = waiter.await.unwrap().unwrap();
        assert_eq!(guard.to_string(), "ProjectLock[p1]");
    }
}
