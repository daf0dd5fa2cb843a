//! Deferred tasks keyed by owner.
//!
//! Rooms use this to run something after a fixed delay, such as advancing
//! the phase once an elimination has been announced. Each key holds at
//! most one pending task:
//!
//! - scheduling again for the same key aborts the pending one;
//! - [`DeferredTasks::cancel`] aborts it outright (room teardown);
//! - dropping the [`DeferredTasks`] aborts everything.
//!
//! A task that has already fired is no longer tracked, so cancelling it is
//! a no-op. Callers must make the task body itself tolerate running late
//! (the room actor re-checks phase and round before acting).
//!
//! ```ignore
//! timers.schedule(room_id, config.announcement_delay, async move {
//!     if let Some(tx) = weak_tx.upgrade() {
//!         let _ = tx.send(RoomCommand::AdvanceAfterElimination { round }).await;
//!     }
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct Pending {
    token: u64,
    handle: JoinHandle<()>,
}

type Table<K> = Arc<Mutex<HashMap<K, Pending>>>;

fn lock<K>(table: &Table<K>) -> MutexGuard<'_, HashMap<K, Pending>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// At most one pending delayed task per key.
pub struct DeferredTasks<K> {
    pending: Table<K>,
    next_token: AtomicU64,
}

impl<K> DeferredTasks<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(1),
        }
    }

    /// Runs `task` after `delay`, replacing any pending task for `key`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, key: K, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let table = Arc::clone(&self.pending);
        let task_key = key.clone();

        // Hold the lock across spawn so the task cannot fire and look for
        // its entry before the entry exists.
        let mut pending = lock(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = lock(&table);
                if pending.get(&task_key).is_some_and(|p| p.token == token) {
                    pending.remove(&task_key);
                }
            }
            trace!(key = %task_key, "deferred task fired");
            task.await;
        });

        if let Some(old) = pending.insert(key.clone(), Pending { token, handle })
        {
            old.handle.abort();
            debug!(%key, "replaced pending deferred task");
        }
        trace!(%key, ?delay, "deferred task scheduled");
    }

    /// Aborts the pending task for `key`. Returns `true` if one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.pending).remove(key) {
            Some(p) => {
                p.handle.abort();
                debug!(%key, "deferred task cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }

    /// Number of tasks waiting to fire.
    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Default for DeferredTasks<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for DeferredTasks<K> {
    fn drop(&mut self) {
        for (_, p) in lock(&self.pending).drain() {
            p.handle.abort();
        }
    }
}
