//! Deduplicating work queue
//!
//! Semantics follow the classic controller work queue:
//!
//! - A key that is already pending is not queued twice.
//! - A key handed out by [`WorkQueue::get`] is not handed out again until
//!   [`WorkQueue::done`] is called for it. Adds that arrive in the meantime
//!   are parked and re-queued on `done`.
//! - Distinct keys are served in FIFO order.
//! - Failed keys can be re-added after a per-key exponential delay.

mod rate_limiter;

pub use rate_limiter::ExponentialBackoff;

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
struct QueueState<K> {
    queue: VecDeque<K>,
    /// Keys waiting to be processed (queued or parked behind processing)
    dirty: HashSet<K>,
    /// Keys currently handed out to a worker
    processing: HashSet<K>,
    backoff: ExponentialBackoff<K>,
    shutting_down: bool,
}

#[derive(Debug)]
struct Inner<K> {
    state: Mutex<QueueState<K>>,
    notify: Notify,
    shutdown: CancellationToken,
}

/// Thread-safe deduplicating FIFO with delayed re-insertion
#[derive(Debug)]
pub struct WorkQueue<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Send + std::fmt::Debug + 'static,
{
    /// Create a queue whose rate-limited adds back off from `base` to `max`
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    backoff: ExponentialBackoff::new(base, max),
                    shutting_down: false,
                }),
                notify: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Mark `key` as needing processing
    pub async fn add(&self, key: K) {
        let mut state = self.inner.state.lock().await;
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }

        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }

        state.queue.push_back(key);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Add `key` once `delay` has elapsed
    pub fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            let queue = self.clone();
            tokio::spawn(async move { queue.add(key).await });
            return;
        }

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = queue.inner.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => queue.add(key).await,
            }
        });
    }

    /// Add `key` after its backoff delay; returns the delay applied
    pub async fn add_rate_limited(&self, key: K) -> Duration {
        let delay = self.inner.state.lock().await.backoff.when(&key);
        debug!(key = ?key, delay_ms = delay.as_millis() as u64, "Requeueing with backoff");
        self.add_after(key, delay);
        delay
    }

    /// Reset the backoff of `key`
    pub async fn forget(&self, key: &K) {
        self.inner.state.lock().await.backoff.forget(key);
    }

    /// Number of rate-limited requeues of `key` since it was last forgotten
    pub async fn num_requeues(&self, key: &K) -> u32 {
        self.inner.state.lock().await.backoff.num_requeues(key)
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<K> {
        loop {
            // Register for wakeups before inspecting state so none are lost.
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Finish processing `key`, re-queueing it if it was added meanwhile
    pub async fn done(&self, key: &K) {
        let mut state = self.inner.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Stop handing out keys and drop everything still pending.
    ///
    /// Keys already handed out stay valid until their `done`.
    pub async fn shut_down(&self) {
        let mut state = self.inner.state.lock().await;
        state.shutting_down = true;
        let dropped = state.queue.len();
        state.queue.clear();
        state.dirty.clear();
        drop(state);

        self.inner.shutdown.cancel();
        self.inner.notify.notify_waiters();
        debug!(dropped, "Work queue shut down");
    }

    pub async fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().await.shutting_down
    }

    /// Number of keys waiting to be handed out
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> WorkQueue<&'static str> {
        WorkQueue::new(Duration::from_millis(5), Duration::from_secs(1000))
    }

    #[tokio::test]
    async fn test_fifo_and_dedup() {
        let q = queue();
        q.add("a").await;
        q.add("b").await;
        q.add("a").await;

        assert_eq!(q.len().await, 2);
        assert_eq!(q.get().await, Some("a"));
        assert_eq!(q.get().await, Some("b"));
    }

    #[tokio::test]
    async fn test_key_not_handed_out_twice_while_processing() {
        let q = queue();
        q.add("a").await;
        let key = q.get().await.unwrap();

        q.add("a").await;
        assert!(q.is_empty().await);

        q.done(&key).await;
        assert_eq!(q.len().await, 1);
        assert_eq!(q.get().await, Some("a"));
    }

    #[tokio::test]
    async fn test_done_without_readd_does_not_requeue() {
        let q = queue();
        q.add("a").await;
        let key = q.get().await.unwrap();
        q.done(&key).await;
        assert!(q.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_wakes_on_add() {
        let q = queue();
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };

        tokio::task::yield_now().await;
        q.add("late").await;
        assert_eq!(waiter.await.unwrap(), Some("late"));
    }

    #[tokio::test]
    async fn test_shutdown_releases_waiters_and_drops_pending() {
        let q = queue();
        q.add("pending").await;
        q.shut_down().await;

        assert_eq!(q.get().await, None);
        q.add("ignored").await;
        assert!(q.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_add_waits_for_backoff() {
        let q = queue();
        assert_eq!(q.add_rate_limited("a").await, Duration::from_millis(5));
        assert_eq!(q.add_rate_limited("a").await, Duration::from_millis(10));
        assert_eq!(q.num_requeues(&"a").await, 2);
        assert!(q.is_empty().await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        // Both delayed adds landed but coalesced into one pending key
        assert_eq!(q.len().await, 1);

        q.forget(&"a").await;
        assert_eq!(q.num_requeues(&"a").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_delayed_adds() {
        let q = queue();
        q.add_after("a", Duration::from_secs(5));
        q.shut_down().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(q.is_empty().await);
    }
}
