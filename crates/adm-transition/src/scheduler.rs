//! Cancellable delayed tasks keyed by order id.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

struct Scheduled {
    token: u64,
    handle: JoinHandle<()>,
}

type TaskTable = Arc<Mutex<HashMap<String, Scheduled>>>;

/// Table of one-shot tasks. At most one task per key; scheduling a key again
/// aborts the earlier task. Tasks remove themselves once they have run.
///
/// Nothing here survives a process restart.
#[derive(Default)]
pub struct OneShotScheduler {
    tasks: TaskTable,
    next_token: AtomicU64,
}

fn lock(tasks: &TaskTable) -> MutexGuard<'_, HashMap<String, Scheduled>> {
    tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OneShotScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, replacing any task already scheduled for `key`.
    pub fn schedule<F>(&self, key: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let own_key = key.to_string();

        // Held across spawn so a zero-delay task cannot finish before its
        // entry exists.
        let mut table = lock(&self.tasks);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
            let mut table = lock(&tasks);
            if table.get(&own_key).map(|s| s.token) == Some(token) {
                table.remove(&own_key);
            }
        });
        if let Some(prev) = table.insert(key.to_string(), Scheduled { token, handle }) {
            prev.handle.abort();
        }
    }

    /// Abort the task for `key`. Returns true if one was still waiting.
    pub fn cancel(&self, key: &str) -> bool {
        match lock(&self.tasks).remove(key) {
            Some(s) => {
                let waiting = !s.handle.is_finished();
                s.handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        lock(&self.tasks)
            .get(key)
            .map(|s| !s.handle.is_finished())
            .unwrap_or(false)
    }

    /// Tasks that have not run yet.
    pub fn pending_count(&self) -> usize {
        lock(&self.tasks)
            .values()
            .filter(|s| !s.handle.is_finished())
            .count()
    }

    /// Abort everything.
    pub fn shutdown(&self) {
        for (_, s) in lock(&self.tasks).drain() {
            s.handle.abort();
        }
    }
}

impl Drop for OneShotScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
