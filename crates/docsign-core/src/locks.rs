//! Per-request mutual exclusion
//!
//! Mutations of one request are serialized; different requests proceed in
//! parallel. Entries are dropped from the map once nobody holds or waits
//! on them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct RequestLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `request_id`
    pub async fn acquire(&self, request_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // only the map holds these, so nobody is using them
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks.entry(request_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of requests currently tracked
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
