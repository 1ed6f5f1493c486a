//! Controller configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a worker treats a key whose local object no longer exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundPolicy {
    /// Report a terminal error and drop the key
    #[default]
    Fail,
    /// Treat the key as converged
    Ignore,
}

/// Worker pool and queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Deadline for a single reconcile pass in seconds
    #[serde(default = "default_reconcile_timeout")]
    pub reconcile_timeout_secs: u64,

    /// Handling of vanished local objects
    #[serde(default)]
    pub not_found_policy: NotFoundPolicy,

    /// First retry delay in milliseconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound on the retry delay in seconds
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            reconcile_timeout_secs: default_reconcile_timeout(),
            not_found_policy: NotFoundPolicy::default(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

impl ControllerConfig {
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    /// Collect every problem with the settings
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.workers == 0 {
            errors.push("controller.workers must be at least 1".to_string());
        }
        if self.reconcile_timeout_secs == 0 {
            errors.push("controller.reconcile_timeout_secs must be at least 1".to_string());
        }
        if self.backoff_base() > self.backoff_max() {
            errors.push(format!(
                "controller.backoff_base_ms ({}ms) exceeds controller.backoff_max_secs ({}s)",
                self.backoff_base_ms, self.backoff_max_secs
            ));
        }
        errors
    }
}

fn default_workers() -> usize {
    4
}

fn default_reconcile_timeout() -> u64 {
    30
}

fn default_backoff_base() -> u64 {
    5
}

fn default_backoff_max() -> u64 {
    1000
}
