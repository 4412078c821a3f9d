use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Deferred-deletion timers, keyed by room id. At most one live timer per
/// room at any instant: arming replaces, disarming cancels in O(1).
#[derive(Default)]
pub struct CleanupScheduler {
    timers: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

fn lock(timers: &Mutex<HashMap<String, JoinHandle<()>>>) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
    match timers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl CleanupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_expiry` to run after `delay`, replacing any timer
    /// already armed for this room.
    pub fn arm<F>(&self, room_id: &str, delay: Duration, on_expiry: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let timers = Arc::clone(&self.timers);
        let id = room_id.to_string();
        let handle = tokio::spawn({
            let id = id.clone();
            async move {
                tokio::time::sleep(delay).await;
                // Drop our own bookkeeping entry before firing; callers
                // re-check room emptiness under their own lock.
                lock(&timers).remove(&id);
                on_expiry.await;
            }
        });
        if let Some(previous) = lock(&self.timers).insert(id, handle) {
            previous.abort();
        }
    }

    /// Cancel the pending timer for this room. Idempotent when none exists.
    pub fn disarm(&self, room_id: &str) {
        if let Some(handle) = lock(&self.timers).remove(room_id) {
            handle.abort();
        }
    }

    pub fn is_armed(&self, room_id: &str) -> bool {
        lock(&self.timers).contains_key(room_id)
    }
}
