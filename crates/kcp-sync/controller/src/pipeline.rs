//! Watch-to-queue event pipeline
//!
//! Translates change notifications into request keys. Nothing is read or
//! written here beyond the watch itself; workers re-fetch current state.

use crate::queue::WorkQueue;
use crate::store::{LocalStore, WatchEvent};
use futures::StreamExt;
use kcp_sync_types::{LocalObject, RequestKey, TenantId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Feeds the work queue from the local store's change feed
pub struct EventPipeline {
    local: Arc<dyn LocalStore>,
    queue: WorkQueue<RequestKey>,
}

impl EventPipeline {
    pub fn new(local: Arc<dyn LocalStore>, queue: WorkQueue<RequestKey>) -> Self {
        Self { local, queue }
    }

    /// Derive the queue key for an observed object.
    ///
    /// Objects without a cluster annotation map to the empty tenant. An
    /// annotation that is not a valid tenant also maps to the empty tenant so
    /// the key still encodes; the worker rejects such objects when it
    /// re-reads them.
    pub fn request_key(object: &LocalObject) -> RequestKey {
        let tenant = object.tenant().unwrap_or_else(|e| {
            warn!(
                object = %object.key(),
                error = %e,
                "Ignoring invalid cluster annotation"
            );
            TenantId::empty()
        });
        object.request_key(tenant)
    }

    /// Enqueue the key for one notification
    pub async fn dispatch(&self, event: &WatchEvent) {
        let key = Self::request_key(event.object());
        debug!(key = %key, deleted = matches!(event, WatchEvent::Deleted(_)), "Enqueueing");
        self.queue.add(key).await;
    }

    /// Consume the change feed until cancelled or the feed ends
    pub async fn run(self, cancel: CancellationToken) {
        let mut events = self.local.watch();
        info!("Event pipeline started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = events.next() => match next {
                    Some(Ok(event)) => self.dispatch(&event).await,
                    Some(Err(e)) => warn!(error = %e, "Watch error"),
                    None => {
                        warn!("Watch stream ended");
                        break;
                    }
                },
            }
        }

        info!("Event pipeline stopped");
    }
}
