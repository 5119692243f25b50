use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::models::BucketKey;

const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per queue bucket, so that count-then-insert and
/// cancel-then-renumber never interleave within a bucket.
pub struct BucketLocks {
    enabled: bool,
    locks: Mutex<HashMap<BucketKey, Arc<AsyncMutex<()>>>>,
}

impl BucketLocks {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `None` when serialization is switched off.
    pub async fn acquire(&self, key: BucketKey) -> Option<OwnedMutexGuard<()>> {
        if !self.enabled {
            return None;
        }

        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if locks.len() >= PRUNE_THRESHOLD {
                // only the map holds these, nobody is waiting on them
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(key).or_default().clone()
        };

        debug!("Waiting for queue lock on {}", key);
        Some(lock.lock_owned().await)
    }
}

impl Default for BucketLocks {
    fn default() -> Self {
        Self::new(true)
    }
}
