
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// One async mutex per source URL
///
/// Holders of the same key run one at a time; different keys never wait on
/// each other. Entries are dropped once nobody holds or waits on them.
#[derive(Debug, Clone, Default)]
pub struct SourceLocks {
    locks: Arc<LockTable>,
}

/// Exclusive access to one source URL until dropped
#[derive(Debug)]
pub struct SourceGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<LockTable>,
}

impl SourceLocks {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    #[inline]
    pub async fn lock(&self, key: &str) -> SourceGuard {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        if mutex.try_lock().is_err() {
            debug!("Waiting for in-flight re-index of {}", key);
        }

        SourceGuard {
            guard: Some(mutex.lock_owned().await),
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of keys currently held or awaited
    #[inline]
    pub fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}

impl SourceGuard {
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
