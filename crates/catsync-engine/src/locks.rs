//! Keyed async locks serializing event work per source product id.
//!
//! Two concurrent events for the same product would race on the
//! read-then-write of its cache row; a per-key mutex prevents that while
//! letting different products progress in parallel. Variation events are
//! keyed by their parent id before locking so parent and child events
//! cannot interleave either.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct ProductLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl ProductLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for a product id, creating it on first use. The
    /// guard is owned so it can cross await points inside a spawned task.
    pub async fn lock(&self, key: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(map.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}
