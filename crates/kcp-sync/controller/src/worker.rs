//! Worker pool and per-key reconcile state machine
//!
//! Each worker repeatedly takes a key from the queue, re-reads the local
//! object, and decides based on the outcome whether the key is finished,
//! retried with backoff or dropped. This is the only place that makes that
//! decision.

use crate::config::{ControllerConfig, NotFoundPolicy};
use crate::error::ReconcileError;
use crate::queue::WorkQueue;
use crate::reconciler::Reconcile;
use crate::store::{LocalStore, ObjectEvent};
use kcp_sync_types::{LocalObject, RequestKey, TenantId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Event reason attached to local objects when a reconcile fails
pub const RECONCILE_ERROR_REASON: &str = "ReconcilingError";

/// Result of processing one key
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// Converged, or nothing to do
    Success,
    /// Retry with backoff
    Transient(ReconcileError),
    /// Report and drop
    Terminal(ReconcileError),
}

impl ReconcileOutcome {
    fn from_error(e: ReconcileError) -> Self {
        if e.is_terminal() {
            ReconcileOutcome::Terminal(e)
        } else {
            ReconcileOutcome::Transient(e)
        }
    }
}

/// Pool of workers draining a shared queue
pub struct WorkerPool {
    queue: WorkQueue<RequestKey>,
    local: Arc<dyn LocalStore>,
    reconciler: Arc<dyn Reconcile>,
    /// Ambient workspace, used for untenanted keys
    identity: Arc<TenantId>,
    reconcile_timeout: Duration,
    not_found_policy: NotFoundPolicy,
}

impl WorkerPool {
    pub fn new(
        queue: WorkQueue<RequestKey>,
        local: Arc<dyn LocalStore>,
        reconciler: Arc<dyn Reconcile>,
        identity: Arc<TenantId>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            queue,
            local,
            reconciler,
            identity,
            reconcile_timeout: config.reconcile_timeout(),
            not_found_policy: config.not_found_policy,
        }
    }

    /// Spawn `workers` tasks that run until the queue shuts down
    pub fn start(self: Arc<Self>, workers: usize) -> Vec<JoinHandle<()>> {
        (0..workers)
            .map(|worker| {
                let pool = self.clone();
                tokio::spawn(
                    async move {
                        debug!("Worker started");
                        while pool.process_next().await {}
                        debug!("Worker stopped");
                    }
                    .instrument(tracing::info_span!("worker", worker)),
                )
            })
            .collect()
    }

    /// Process one key. Returns `false` once the queue is shut down.
    pub async fn process_next(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };

        let (object, outcome) = self.sync(&key).await;
        self.handle_outcome(&key, object.as_ref(), outcome).await;
        self.queue.done(&key).await;
        true
    }

    /// Run the state machine for one key against current local state
    pub async fn sync(&self, key: &RequestKey) -> (Option<LocalObject>, ReconcileOutcome) {
        let (object_key, tenant) = key.clone().into_parts();
        let tenant = tenant.or(&self.identity).clone();
        info!(key = %key, tenant = %tenant, "Processing");

        let object = match self.local.get(&object_key).await {
            Ok(object) => object,
            Err(e) if e.is_not_found() => {
                let outcome = match self.not_found_policy {
                    NotFoundPolicy::Fail => {
                        ReconcileOutcome::Terminal(ReconcileError::ObjectNotFound(object_key))
                    }
                    NotFoundPolicy::Ignore => ReconcileOutcome::Success,
                };
                return (None, outcome);
            }
            Err(source) => {
                let e = ReconcileError::LocalFetch {
                    key: object_key,
                    source,
                };
                return (None, ReconcileOutcome::Transient(e));
            }
        };

        if object.is_deleting() {
            debug!(key = %key, "Object is being deleted, skipping");
            return (Some(object), ReconcileOutcome::Success);
        }

        // The key of a malformed annotation carries the empty tenant; never
        // let it fall through to the ambient workspace.
        if let Err(source) = object.tenant() {
            let e = ReconcileError::InvalidTenant {
                key: object.key(),
                source,
            };
            return (Some(object), ReconcileOutcome::Terminal(e));
        }

        let outcome = match tokio::time::timeout(
            self.reconcile_timeout,
            self.reconciler.reconcile(&tenant, &object),
        )
        .await
        {
            Ok(Ok(())) => ReconcileOutcome::Success,
            Ok(Err(e)) => ReconcileOutcome::from_error(e),
            Err(_) => ReconcileOutcome::Transient(ReconcileError::Timeout(self.reconcile_timeout)),
        };

        (Some(object), outcome)
    }

    async fn handle_outcome(
        &self,
        key: &RequestKey,
        object: Option<&LocalObject>,
        outcome: ReconcileOutcome,
    ) {
        match outcome {
            ReconcileOutcome::Success => {
                self.queue.forget(key).await;
            }
            ReconcileOutcome::Transient(e) => {
                self.report(object, &e).await;
                let delay = self.queue.add_rate_limited(key.clone()).await;
                warn!(
                    key = %key,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Reconcile failed, requeueing"
                );
            }
            ReconcileOutcome::Terminal(e) => {
                self.report(object, &e).await;
                self.queue.forget(key).await;
                error!(key = %key, error = %e, "Reconcile failed permanently, dropping key");
            }
        }
    }

    /// Attach the failure to the local object, when there is one
    async fn report(&self, object: Option<&LocalObject>, e: &ReconcileError) {
        let Some(object) = object else {
            return;
        };

        let event = ObjectEvent::warning(RECONCILE_ERROR_REASON, e.to_string());
        if let Err(record_err) = self.local.record_event(object, event).await {
            warn!(
                object = %object.key(),
                error = %record_err,
                "Failed to record event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{SchemaReconciler, SCHEMA_NAME};
    use crate::store::{EventType, InMemoryLocalStore, InMemoryRemoteStore};
    use async_trait::async_trait;
    use kcp_sync_types::CLUSTER_ANNOTATION;

    struct Harness {
        local: Arc<InMemoryLocalStore>,
        remote: Arc<InMemoryRemoteStore>,
        queue: WorkQueue<RequestKey>,
        pool: WorkerPool,
    }

    fn harness(config: ControllerConfig) -> Harness {
        let local = Arc::new(InMemoryLocalStore::new());
        let remote = Arc::new(InMemoryRemoteStore::new());
        let queue = WorkQueue::new(config.backoff_base(), config.backoff_max());
        let pool = WorkerPool::new(
            queue.clone(),
            local.clone(),
            Arc::new(SchemaReconciler::new(remote.clone())),
            Arc::new(TenantId::new("ambient").unwrap()),
            &config,
        );
        Harness {
            local,
            remote,
            queue,
            pool,
        }
    }

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_success_creates_schema_in_key_tenant() {
        let h = harness(ControllerConfig::default());
        let obj = h
            .local
            .apply(LocalObject::new("default", "cm").with_annotation(CLUSTER_ANNOTATION, "team-a"))
            .await;
        h.queue.add(obj.request_key(tenant("team-a"))).await;

        assert!(h.pool.process_next().await);

        assert!(h.remote.schema(&tenant("team-a"), SCHEMA_NAME).is_some());
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_untenanted_key_uses_ambient_identity() {
        let h = harness(ControllerConfig::default());
        let obj = h.local.apply(LocalObject::new("default", "cm")).await;
        h.queue.add(obj.request_key(TenantId::empty())).await;

        h.pool.process_next().await;

        assert!(h.remote.schema(&tenant("ambient"), SCHEMA_NAME).is_some());
    }

    #[tokio::test]
    async fn test_not_found_is_terminal_by_default() {
        let h = harness(ControllerConfig::default());
        let key = RequestKey::encode(tenant("t"), "default", "missing");

        let (object, outcome) = h.pool.sync(&key).await;
        assert!(object.is_none());
        assert!(matches!(
            outcome,
            ReconcileOutcome::Terminal(ReconcileError::ObjectNotFound(_))
        ));

        h.queue.add(key.clone()).await;
        h.pool.process_next().await;
        assert_eq!(h.queue.num_requeues(&key).await, 0);
        assert!(h.queue.is_empty().await);
        assert_eq!(h.remote.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_not_found_can_be_ignored() {
        let h = harness(ControllerConfig {
            not_found_policy: NotFoundPolicy::Ignore,
            ..Default::default()
        });
        let key = RequestKey::encode(tenant("t"), "default", "missing");

        let (_, outcome) = h.pool.sync(&key).await;
        assert!(matches!(outcome, ReconcileOutcome::Success));
    }

    #[tokio::test]
    async fn test_deleting_object_is_skipped() {
        let h = harness(ControllerConfig::default());
        let obj = h.local.apply(LocalObject::new("default", "cm")).await;
        h.local.mark_deleting(&obj.key()).await;
        let key = obj.request_key(tenant("t"));

        h.queue.add(key.clone()).await;
        h.pool.process_next().await;

        assert_eq!(h.remote.get_calls(), 0);
        assert_eq!(h.remote.create_calls(), 0);
        assert_eq!(h.queue.num_requeues(&key).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_records_event_and_backs_off() {
        let h = harness(ControllerConfig::default());
        let obj = h.local.apply(LocalObject::new("default", "cm")).await;
        let key = obj.request_key(tenant("t"));
        h.remote.fail_next_gets(3);

        h.queue.add(key.clone()).await;
        let mut delays = Vec::new();
        for _ in 0..3 {
            let started = tokio::time::Instant::now();
            h.pool.process_next().await;
            // Waits out the backoff before the key is handed out again
            let next = h.queue.get().await.unwrap();
            delays.push(started.elapsed());
            h.queue.done(&next).await;
            h.queue.add(next).await;
        }

        assert!(delays.windows(2).all(|w| w[0] < w[1]), "{:?}", delays);
        assert_eq!(h.queue.num_requeues(&key).await, 3);

        let events = h.local.events_for(&obj.key()).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].type_, EventType::Warning);
        assert_eq!(events[0].reason, RECONCILE_ERROR_REASON);
        assert!(events[0].note.contains(SCHEMA_NAME));

        // Recovery clears the backoff
        h.pool.process_next().await;
        assert_eq!(h.queue.num_requeues(&key).await, 0);
        assert!(h.remote.schema(&tenant("t"), SCHEMA_NAME).is_some());
    }

    #[tokio::test]
    async fn test_local_fetch_error_is_transient() {
        let h = harness(ControllerConfig::default());
        let obj = h.local.apply(LocalObject::new("default", "cm")).await;
        h.local.fail_next_gets(1);

        let (object, outcome) = h.pool.sync(&obj.request_key(tenant("t"))).await;
        assert!(object.is_none());
        assert!(matches!(
            outcome,
            ReconcileOutcome::Transient(ReconcileError::LocalFetch { .. })
        ));
    }

    struct Stuck;

    #[async_trait]
    impl Reconcile for Stuck {
        async fn reconcile(&self, _: &TenantId, _: &LocalObject) -> Result<(), ReconcileError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_reconcile_times_out() {
        let local = Arc::new(InMemoryLocalStore::new());
        let config = ControllerConfig {
            reconcile_timeout_secs: 2,
            ..Default::default()
        };
        let pool = WorkerPool::new(
            WorkQueue::new(config.backoff_base(), config.backoff_max()),
            local.clone(),
            Arc::new(Stuck),
            Arc::new(tenant("ambient")),
            &config,
        );
        let obj = local.apply(LocalObject::new("default", "cm")).await;

        let (_, outcome) = pool.sync(&obj.request_key(tenant("t"))).await;
        assert!(matches!(
            outcome,
            ReconcileOutcome::Transient(ReconcileError::Timeout(d)) if d == Duration::from_secs(2)
        ));
    }
}
