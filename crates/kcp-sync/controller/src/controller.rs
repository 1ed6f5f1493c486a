//! Controller lifecycle
//!
//! Bootstrap is strictly sequential: the workspace identity is resolved
//! before the event pipeline or any worker starts. After that the pipeline
//! and the workers run until the cancellation token fires.

use crate::config::ControllerConfig;
use crate::error::{ControllerError, Result};
use crate::identity::resolve_identity;
use crate::pipeline::EventPipeline;
use crate::queue::WorkQueue;
use crate::reconciler::{Reconcile, SchemaReconciler};
use crate::store::{LocalStore, RemoteStore};
use crate::worker::WorkerPool;
use kcp_sync_types::{RequestKey, TenantId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Name used for log targets and as the event reporter
pub const CONTROLLER_NAME: &str = "test-controller";

/// A bootstrapped controller, ready to run
pub struct Controller {
    config: ControllerConfig,
    local: Arc<dyn LocalStore>,
    reconciler: Arc<dyn Reconcile>,
    identity: Arc<TenantId>,
}

impl Controller {
    /// Resolve the workspace identity and wire up the schema reconciler.
    ///
    /// Fails if the identity cannot be resolved; nothing has been started
    /// at that point.
    pub async fn bootstrap(
        config: ControllerConfig,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ControllerError::Config(errors.join("; ")));
        }

        let identity = resolve_identity(remote.as_ref()).await?;
        let reconciler = Arc::new(SchemaReconciler::new(remote));
        Ok(Self::with_reconciler(config, local, reconciler, identity))
    }

    /// Build a controller around an already resolved identity
    pub fn with_reconciler(
        config: ControllerConfig,
        local: Arc<dyn LocalStore>,
        reconciler: Arc<dyn Reconcile>,
        identity: TenantId,
    ) -> Self {
        Self {
            config,
            local,
            reconciler,
            identity: Arc::new(identity),
        }
    }

    pub fn identity(&self) -> &TenantId {
        &self.identity
    }

    /// Run until `cancel` fires.
    ///
    /// On cancellation the pipeline stops first, then the queue is shut
    /// down: in-flight reconciles finish, pending keys are dropped. If the
    /// change feed ends on its own the controller shuts down the same way
    /// and reports a task error.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let queue: WorkQueue<RequestKey> =
            WorkQueue::new(self.config.backoff_base(), self.config.backoff_max());

        let pipeline = EventPipeline::new(self.local.clone(), queue.clone());
        let pool = Arc::new(WorkerPool::new(
            queue.clone(),
            self.local.clone(),
            self.reconciler.clone(),
            self.identity.clone(),
            &self.config,
        ));

        let mut pipeline_handle = tokio::spawn(pipeline.run(cancel.clone()));
        let workers = pool.start(self.config.workers);

        info!(
            controller = CONTROLLER_NAME,
            workers = self.config.workers,
            logical_cluster = %self.identity,
            "Controller started"
        );

        let (pipeline_result, ended_early) = tokio::select! {
            _ = cancel.cancelled() => {
                info!(controller = CONTROLLER_NAME, "Controller shutting down");
                (pipeline_handle.await, false)
            }
            result = &mut pipeline_handle => {
                error!(controller = CONTROLLER_NAME, "Event pipeline ended, shutting down");
                (result, true)
            }
        };
        queue.shut_down().await;

        let mut task_error = pipeline_result.err();
        for worker in workers {
            if let Err(e) = worker.await {
                task_error.get_or_insert(e);
            }
        }

        info!(controller = CONTROLLER_NAME, "Controller stopped");
        match task_error {
            Some(e) => Err(ControllerError::Task(e.to_string())),
            None if ended_early => Err(ControllerError::Task(
                "event pipeline ended before shutdown".to_string(),
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::store::{InMemoryLocalStore, InMemoryRemoteStore, ObjectEvent, WatchEvent};
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream, StreamExt};
    use kcp_sync_types::{LocalObject, ObjectKey};

    #[tokio::test]
    async fn test_bootstrap_requires_identity() {
        let result = Controller::bootstrap(
            ControllerConfig::default(),
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryRemoteStore::new()),
        )
        .await;
        assert!(matches!(result, Err(ControllerError::IdentityFetch(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_bad_config() {
        let config = ControllerConfig {
            workers: 0,
            ..Default::default()
        };
        let result = Controller::bootstrap(
            config,
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryRemoteStore::with_identity("root")),
        )
        .await;
        assert!(matches!(result, Err(ControllerError::Config(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_resolves_identity() {
        let controller = Controller::bootstrap(
            ControllerConfig::default(),
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryRemoteStore::with_identity("root")),
        )
        .await
        .unwrap();
        assert_eq!(controller.identity().as_str(), "root");
    }

    /// Local store whose change feed ends immediately
    struct EndedFeed;

    #[async_trait]
    impl LocalStore for EndedFeed {
        fn watch(&self) -> BoxStream<'static, StoreResult<WatchEvent>> {
            stream::empty().boxed()
        }

        async fn get(&self, key: &ObjectKey) -> StoreResult<LocalObject> {
            Err(StoreError::NotFound(key.to_string()))
        }

        async fn record_event(&self, _: &LocalObject, _: ObjectEvent) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ended_feed_stops_controller() {
        let controller = Controller::with_reconciler(
            ControllerConfig::default(),
            Arc::new(EndedFeed),
            Arc::new(SchemaReconciler::new(Arc::new(InMemoryRemoteStore::new()))),
            TenantId::new("root").unwrap(),
        );

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            controller.run(CancellationToken::new()),
        )
        .await
        .expect("controller kept running without a change feed");
        assert!(matches!(result, Err(ControllerError::Task(_))));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let controller = Controller::bootstrap(
            ControllerConfig::default(),
            Arc::new(InMemoryLocalStore::new()),
            Arc::new(InMemoryRemoteStore::with_identity("root")),
        )
        .await
        .unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(controller.run(cancel.clone()));
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
