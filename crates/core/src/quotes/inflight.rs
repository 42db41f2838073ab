//! Keyed deduplication of concurrent asynchronous work.
//!
//! [`InFlight::run`] spawns the work for a key unless a task for that key is
//! already running, in which case the caller joins it. Every waiter observes
//! the same output. The task runs to completion even if all waiters go away,
//! then clears its own slot so the next call starts fresh.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::warn;
use thiserror::Error;

/// The spawned task panicked or was cancelled.
#[derive(Debug, Clone, Error)]
#[error("In-flight task failed: {0}")]
pub struct TaskFailed(pub String);

pub type SharedTask<T> = Shared<BoxFuture<'static, Result<T, TaskFailed>>>;

type Slots<K, T> = HashMap<K, (u64, SharedTask<T>)>;

pub struct InFlight<K, T> {
    slots: Arc<Mutex<Slots<K, T>>>,
    generation: Arc<AtomicU64>,
}

impl<K, T> Clone for InFlight<K, T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<K, T> Default for InFlight<K, T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K, T> InFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the task running for `key`, or spawns the one built by `make`.
    ///
    /// `make` is only invoked when no task is running. Must be called from
    /// within a tokio runtime.
    pub fn run<F, Fut>(&self, key: K, make: F) -> SharedTask<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut slots = lock(&self.slots);
        if let Some((_, task)) = slots.get(&key) {
            return task.clone();
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let work = make();
        let guard = SlotGuard {
            slots: Arc::clone(&self.slots),
            key: key.clone(),
            generation,
        };

        let handle = tokio::spawn(async move {
            // Dropped on completion and on panic alike.
            let _guard = guard;
            work.await
        });

        let task = async move { handle.await.map_err(|e| TaskFailed(e.to_string())) }
            .boxed()
            .shared();
        slots.insert(key, (generation, task.clone()));
        task
    }

    pub fn is_running(&self, key: &K) -> bool {
        lock(&self.slots).contains_key(key)
    }
}

/// Clears the slot of the task that owns it, unless a newer task took it over.
struct SlotGuard<K: Eq + Hash, T> {
    slots: Arc<Mutex<Slots<K, T>>>,
    key: K,
    generation: u64,
}

impl<K: Eq + Hash, T> Drop for SlotGuard<K, T> {
    fn drop(&mut self) {
        let mut slots = lock(&self.slots);
        if matches!(slots.get(&self.key), Some((g, _)) if *g == self.generation) {
            slots.remove(&self.key);
        }
    }
}

fn lock<K, T>(slots: &Mutex<Slots<K, T>>) -> MutexGuard<'_, Slots<K, T>> {
    slots.lock().unwrap_or_else(|poisoned| {
        warn!("In-flight registry lock poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_task() {
        let registry: InFlight<&'static str, usize> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let make = |calls: Arc<AtomicUsize>, gate: Arc<Notify>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                42
            }
        };

        let first = registry.run("us", make(calls.clone(), gate.clone()));
        let second = registry.run("us", make(calls.clone(), gate.clone()));
        assert!(registry.is_running(&"us"));

        tokio::task::yield_now().await;
        gate.notify_one();

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap(), 42);
        assert_eq!(b.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slot_clears_after_completion() {
        let registry: InFlight<u8, u8> = InFlight::new();

        assert_eq!(registry.run(1, || async { 1 }).await.unwrap(), 1);
        assert!(!registry.is_running(&1));
        assert_eq!(registry.run(1, || async { 2 }).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_different_keys_run_independently() {
        let registry: InFlight<u8, u8> = InFlight::new();
        let a = registry.run(1, || async { 10 });
        let b = registry.run(2, || async { 20 });
        assert_eq!(a.await.unwrap(), 10);
        assert_eq!(b.await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_task_completes_without_waiters() {
        let registry: InFlight<u8, ()> = InFlight::new();
        let done = Arc::new(AtomicUsize::new(0));
        let flag = done.clone();

        drop(registry.run(7, move || async move {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

        for _ in 0..50 {
            if done.load(Ordering::SeqCst) == 1 && !registry.is_running(&7) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(!registry.is_running(&7));
    }

    #[tokio::test]
    async fn test_panicking_task_reports_failure() {
        let registry: InFlight<u8, u8> = InFlight::new();
        let exploded = true;
        let result = registry
            .run(3, move || async move {
                if exploded {
                    panic!("provider exploded");
                }
                0
            })
            .await;
        assert!(result.is_err());
        assert!(!registry.is_running(&3));
        assert_eq!(registry.run(3, || async { 9 }).await.unwrap(), 9);
    }
}
