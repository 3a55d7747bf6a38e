use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;
use uuid::Uuid;

use crate::error::TarificationError;
use crate::TarificationResult;

/// Idle locks are dropped once the map grows past this many quotes.
const PRUNE_THRESHOLD: usize = 1_024;

/// One async mutex per quote. Writers on different quotes never wait on
/// each other.
pub struct QuoteLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    wait: Duration,
}

impl QuoteLocks {
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            wait,
        }
    }

    /// Wait up to the configured duration for exclusive access to a quote.
    pub async fn acquire(&self, quote_id: Uuid) -> TarificationResult<OwnedMutexGuard<()>> {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune();
        }
        let lock = Arc::clone(
            &self
                .locks
                .entry(quote_id)
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );

        match tokio::time::timeout(self.wait, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!(%quote_id, wait_ms = self.wait.as_millis() as u64, "quote is locked by another writer");
                Err(TarificationError::ConcurrentModificationConflict {
                    quote_id,
                    reason: format!(
                        "another update is in progress (waited {} ms)",
                        self.wait.as_millis()
                    ),
                })
            }
        }
    }

    /// Drop locks nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_writer_times_out() {
        let locks = QuoteLocks::new(Duration::from_millis(20));
        let quote_id = Uuid::new_v4();
        let _held = locks.acquire(quote_id).await.unwrap();
        let err = locks.acquire(quote_id).await.unwrap_err();
        assert!(matches!(
            err,
            TarificationError::ConcurrentModificationConflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_distinct_quotes_do_not_block() {
        let locks = QuoteLocks::new(Duration::from_millis(20));
        let _a = locks.acquire(Uuid::new_v4()).await.unwrap();
        let _b = locks.acquire(Uuid::new_v4()).await.unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_lock_is_reacquired_and_pruned() {
        let locks = QuoteLocks::new(Duration::from_millis(20));
        let quote_id = Uuid::new_v4();
        drop(locks.acquire(quote_id).await.unwrap());
        drop(locks.acquire(quote_id).await.unwrap());
        locks.prune();
        assert!(locks.is_empty());
    }
}
