//! Keyed single-flight execution.
//!
//! The gateway fires reconciliation work keyed by controller identity;
//! duplicate fires are wasted work and can reorder writes. [`Runner`]
//! collapses them at the submission boundary: at most one task per key runs
//! at a time, unrelated keys proceed in parallel, and [`Runner::wait`]
//! joins on everything currently active.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// Runs submitted futures indexed by a string key, at most one per key.
///
/// Cheap to clone; clones share the active set.
#[derive(Clone, Default)]
pub struct Runner {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    active: Mutex<HashSet<String>>,
    /// Signalled each time the active set transitions back to empty.
    idle: Notify,
}

impl Runner {
    /// Create a runner with an empty active set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` under `key`, unless `key` is already active.
    ///
    /// A submission whose key is not active always starts. A submission
    /// whose key is active is dropped silently: no error, no callback, and
    /// the future is never polled — callers cannot distinguish "ran" from
    /// "coalesced", which is the point of the dedup. The key is released
    /// when the task returns, normally or by panicking.
    pub fn run<F>(&self, key: impl Into<String>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        {
            let mut active = self.inner.active.lock();
            if !active.insert(key.clone()) {
                debug!(key, "submission coalesced into active task");
                return;
            }
        }
        let guard = ActiveGuard {
            inner: Arc::clone(&self.inner),
            key,
        };
        drop(tokio::spawn(async move {
            let _guard = guard;
            task.await;
        }));
    }

    /// Wait until the active set is empty.
    ///
    /// Returns immediately if nothing is active. New keys submitted after
    /// the emptiness was observed do not hold this call open, and further
    /// `run`/`wait` cycles compose freely.
    pub async fn wait(&self) {
        loop {
            // Register interest before checking, so a completion between the
            // check and the await cannot be missed.
            let idle = self.inner.idle.notified();
            if self.inner.active.lock().is_empty() {
                return;
            }
            idle.await;
        }
    }

    /// Whether a key is currently active.
    pub fn is_active(&self, key: &str) -> bool {
        self.inner.active.lock().contains(key)
    }

    /// Number of currently active keys.
    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }
}

/// Releases a key on drop, waking waiters when the set empties.
///
/// Held inside the spawned task so the key is released even if the task
/// panics.
struct ActiveGuard {
    inner: Arc<Inner>,
    key: String,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut active = self.inner.active.lock();
        let _ = active.remove(&self.key);
        if active.is_empty() {
            self.inner.idle.notify_waiters();
        }
    }
}
