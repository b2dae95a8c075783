//! Cancellation handles for in-flight asynchronous rules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Token of one asynchronous rule run, returned by [`TaskRegistry::begin`].
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Per-group registry of the current asynchronous run of each field.
///
/// At most one run per field is live: beginning a new run cancels the
/// previous one. Cheap to clone; clones share the same registry.
///
/// # Example
///
/// ```
/// use formset_lib::evaluate::TaskRegistry;
///
/// let tasks = TaskRegistry::new();
/// let first = tasks.begin("username");
/// let second = tasks.begin("username");
///
/// assert!(first.is_cancelled());
/// assert!(!second.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<TaskRegistryInner>,
}

#[derive(Debug, Default)]
struct TaskRegistryInner {
    next_id: AtomicU64,
    running: Mutex<HashMap<String, TaskHandle>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new run for `key`, cancelling the previous one.
    pub fn begin(&self, key: &str) -> TaskHandle {
        let handle = TaskHandle {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        let previous = self.running().insert(key.to_string(), handle.clone());
        if let Some(previous) = previous {
            log::debug!("Cancelling superseded async run for '{}'", key);
            previous.token.cancel();
        }
        handle
    }

    /// Forgets the run `id` of `key` if it is still the current one.
    pub fn finish(&self, key: &str, id: u64) {
        let mut running = self.running();
        if running.get(key).is_some_and(|h| h.id == id) {
            running.remove(key);
        }
    }

    /// Cancels and forgets the current run of `key`.
    pub fn cancel(&self, key: &str) -> bool {
        match self.running().remove(key) {
            Some(handle) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels and forgets every run.
    pub fn cancel_all(&self) {
        for (_, handle) in self.running().drain() {
            handle.token.cancel();
        }
    }

    /// Returns `true` if `key` has a live run.
    pub fn is_running(&self, key: &str) -> bool {
        self.running().contains_key(key)
    }

    /// Returns the number of live runs.
    pub fn len(&self) -> usize {
        self.running().len()
    }

    pub fn is_empty(&self) -> bool {
        self.running().is_empty()
    }

    fn running(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskHandle>> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_ignores_superseded_ids() {
        let tasks = TaskRegistry::new();
        let first = tasks.begin("a");
        let second = tasks.begin("a");

        tasks.finish("a", first.id());
        assert!(tasks.is_running("a"));

        tasks.finish("a", second.id());
        assert!(!tasks.is_running("a"));
    }

    #[test]
    fn test_cancel_and_cancel_all() {
        let tasks = TaskRegistry::new();
        let a = tasks.begin("a");
        let b = tasks.begin("b");

        assert!(tasks.cancel("a"));
        assert!(!tasks.cancel("a"));
        assert!(a.is_cancelled());
        assert_eq!(tasks.len(), 1);

        tasks.cancel_all();
        assert!(b.is_cancelled());
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let tasks = TaskRegistry::new();
        let clone = tasks.clone();
        let handle = tasks.begin("a");

        clone.cancel("a");
        assert!(handle.is_cancelled());
    }
}
