use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes writes within a single chat session so two concurrent turns
/// on the same `sessionId` can't interleave message inserts or
/// `last_active_at` updates. One `tokio::Mutex` per session id,
/// created lazily and kept for the process lifetime — sessions are cheap
/// and long-lived, so this isn't pruned.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
