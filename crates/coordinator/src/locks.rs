//! Per-LRA transition locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use common::LraId;

/// One async mutex per LRA.
///
/// Holding an LRA's lock serializes close/cancel transitions, leave
/// requests and recovery passes for that LRA while letting different LRAs
/// progress concurrently. The map itself is only touched briefly to hand
/// out lock handles.
#[derive(Default)]
pub(crate) struct LockMap {
    inner: Mutex<HashMap<LraId, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockMap {
    /// Returns the lock for `id`, creating it on first use.
    pub(crate) fn lock_for(&self, id: LraId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(id).or_default().clone()
    }

    /// Drops the lock entry for an evicted LRA.
    pub(crate) fn remove(&self, id: LraId) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_id_yields_same_lock() {
        let locks = LockMap::default();
        let id = LraId::new();
        let a = locks.lock_for(id);
        let b = locks.lock_for(id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_different_ids_do_not_contend() {
        let locks = LockMap::default();
        let a = locks.lock_for(LraId::new());
        let b = locks.lock_for(LraId::new());
        let _ga = a.lock().await;
        // would deadlock if both ids shared one lock
        let _gb = b.lock().await;
    }

    #[tokio::test]
    async fn test_remove_forgets_lock() {
        let locks = LockMap::default();
        let id = LraId::new();
        let a = locks.lock_for(id);
        locks.remove(id);
        let b = locks.lock_for(id);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
