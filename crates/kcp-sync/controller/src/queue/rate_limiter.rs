//! Per-key exponential backoff

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Tracks consecutive failures per key and hands out exponentially growing
/// delays: `base * 2^failures`, capped at `max`.
#[derive(Debug)]
pub struct ExponentialBackoff<K> {
    base: Duration,
    max: Duration,
    failures: HashMap<K, u32>,
}

impl<K: Eq + Hash + Clone> ExponentialBackoff<K> {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: HashMap::new(),
        }
    }

    /// Delay before `key` may be retried; counts as one more failure.
    pub fn when(&mut self, key: &K) -> Duration {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        let exp = *failures;
        *failures = failures.saturating_add(1);

        2u32.checked_pow(exp)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Clear the failure history of `key`
    pub fn forget(&mut self, key: &K) {
        self.failures.remove(key);
    }

    /// Number of times `key` has been rate limited since it was last forgotten
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }
}
