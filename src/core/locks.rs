use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-request async locks.
///
/// Match creation and accept/reject for the same request run one at a time;
/// different requests never contend.
#[derive(Debug, Default)]
pub struct RequestLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

/// Held while a request is being mutated
pub struct RequestGuard<'a> {
    registry: &'a RequestLocks,
    request_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, request_id: Uuid) -> RequestGuard<'_> {
        let mutex = self
            .locks
            .entry(request_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // Built before waiting so an abandoned waiter still cleans up its entry
        let mut pending = RequestGuard {
            registry: self,
            request_id,
            guard: None,
        };
        pending.guard = Some(mutex.lock_owned().await);
        pending
    }

    /// Number of requests with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Forget the entry once nobody else holds or waits on it
        self.registry
            .locks
            .remove_if(&self.request_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entries_released() {
        let locks = RequestLocks::new();
        {
            let _guard = locks.lock(Uuid::new_v4()).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_request_serialized() {
        let locks = Arc::new(RequestLocks::new());
        let request_id = Uuid::new_v4();

        let guard = locks.lock(request_id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(request_id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_requests_independent() {
        let locks = RequestLocks::new();
        let _first = locks.lock(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(Uuid::new_v4())).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_waiter_releases_entry() {
        let locks = RequestLocks::new();
        let request_id = Uuid::new_v4();

        let holder = locks.lock(request_id).await;
        let mut waiter = Box::pin(locks.lock(request_id));
        assert!(futures::poll!(&mut waiter).is_pending());

        // The holder leaves while the waiter is still queued, then the waiter gives up
        drop(holder);
        assert_eq!(locks.len(), 1);
        drop(waiter);

        assert!(locks.is_empty());
    }
}
