//! Per-object convergence
//!
//! For every reconciled object the tenant must serve the `foos.tremors.valley`
//! API, which means the matching APIResourceSchema has to exist. Only
//! existence is converged; an existing schema is never updated.

use crate::error::ReconcileError;
use crate::store::RemoteStore;
use async_trait::async_trait;
use kcp_sync_types::{
    ApiResourceSchema, ApiResourceSchemaSpec, ApiResourceVersion, LocalObject, ResourceNames,
    ResourceScope, TenantId,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// Name of the schema kept in existence
pub const SCHEMA_NAME: &str = "v42.foos.tremors.valley";

/// Convergence step run by the workers for each live object
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self, tenant: &TenantId, object: &LocalObject) -> Result<(), ReconcileError>;
}

/// The schema every tenant must have
pub fn desired_schema() -> ApiResourceSchema {
    ApiResourceSchema::new(
        SCHEMA_NAME,
        ApiResourceSchemaSpec {
            group: "tremors.valley".to_string(),
            names: ResourceNames {
                plural: "foos".to_string(),
                singular: "foo".to_string(),
                kind: "Foo".to_string(),
                list_kind: "FooList".to_string(),
            },
            scope: ResourceScope::Namespaced,
            versions: vec![ApiResourceVersion {
                name: "v1".to_string(),
                served: true,
                storage: true,
                schema: json!({"type": "object", "properties": {}}),
            }],
        },
    )
}

/// Ensures [`desired_schema`] exists in the tenant
pub struct SchemaReconciler {
    remote: Arc<dyn RemoteStore>,
}

impl SchemaReconciler {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Reconcile for SchemaReconciler {
    #[instrument(skip(self, tenant, object), fields(tenant = %tenant, object = %object.key()))]
    async fn reconcile(&self, tenant: &TenantId, object: &LocalObject) -> Result<(), ReconcileError> {
        match self.remote.get_schema(tenant, SCHEMA_NAME).await {
            Ok(_) => {
                info!(schema = SCHEMA_NAME, "Found APIResourceSchema, nothing to do");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!(schema = SCHEMA_NAME, "Creating APIResourceSchema");
                match self.remote.create_schema(tenant, &desired_schema()).await {
                    Ok(()) => {
                        info!(
                            schema = SCHEMA_NAME,
                            result = "created",
                            "Result of creating APIResourceSchema"
                        );
                        Ok(())
                    }
                    // Someone else created it between our get and create
                    Err(e) if e.is_conflict() => {
                        info!(
                            schema = SCHEMA_NAME,
                            result = "exists",
                            "Result of creating APIResourceSchema"
                        );
                        Ok(())
                    }
                    Err(source) => Err(ReconcileError::SchemaCreate {
                        name: SCHEMA_NAME.to_string(),
                        source,
                    }),
                }
            }
            Err(source) => Err(ReconcileError::SchemaFetch {
                name: SCHEMA_NAME.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::store::{InMemoryRemoteStore, LogicalCluster};
    use std::sync::Mutex;

    fn setup() -> (Arc<InMemoryRemoteStore>, SchemaReconciler, TenantId) {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let reconciler = SchemaReconciler::new(remote.clone());
        (remote, reconciler, TenantId::new("root").unwrap())
    }

    #[test]
    fn test_desired_schema() {
        let schema = desired_schema();
        assert_eq!(schema.name, "v42.foos.tremors.valley");
        assert_eq!(schema.spec.group, "tremors.valley");
        assert_eq!(schema.spec.scope, ResourceScope::Namespaced);
        assert_eq!(schema.spec.names.list_kind, "FooList");
        assert_eq!(schema.spec.versions.len(), 1);
        assert!(schema.spec.versions[0].served && schema.spec.versions[0].storage);
    }

    #[tokio::test]
    async fn test_creates_missing_schema() {
        let (remote, reconciler, tenant) = setup();
        let obj = LocalObject::new("default", "cm");

        reconciler.reconcile(&tenant, &obj).await.unwrap();

        assert_eq!(remote.create_calls(), 1);
        assert_eq!(remote.schema(&tenant, SCHEMA_NAME), Some(desired_schema()));
    }

    #[tokio::test]
    async fn test_existing_schema_is_left_alone() {
        let (remote, reconciler, tenant) = setup();
        let mut drifted = desired_schema();
        drifted.spec.group = "drifted.example".into();
        remote.insert_schema(&tenant, drifted.clone());

        reconciler
            .reconcile(&tenant, &LocalObject::new("default", "cm"))
            .await
            .unwrap();

        assert_eq!(remote.create_calls(), 0);
        assert_eq!(remote.schema(&tenant, SCHEMA_NAME), Some(drifted));
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned() {
        let (remote, reconciler, tenant) = setup();
        remote.fail_next_gets(1);

        let err = reconciler
            .reconcile(&tenant, &LocalObject::new("default", "cm"))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::SchemaFetch { .. }));
        assert!(!err.is_terminal());
        assert_eq!(remote.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_error_is_returned() {
        let (remote, reconciler, tenant) = setup();
        remote.fail_next_creates(1);

        let err = reconciler
            .reconcile(&tenant, &LocalObject::new("default", "cm"))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::SchemaCreate { .. }));
        assert_eq!(remote.schema_count(), 0);
    }

    /// Remote that lost the race: the schema is absent on get but present on create
    struct Racing;

    #[async_trait]
    impl RemoteStore for Racing {
        async fn logical_cluster(&self) -> StoreResult<LogicalCluster> {
            Ok(LogicalCluster::default())
        }

        async fn get_schema(&self, _: &TenantId, name: &str) -> StoreResult<ApiResourceSchema> {
            Err(StoreError::NotFound(name.to_string()))
        }

        async fn create_schema(&self, _: &TenantId, schema: &ApiResourceSchema) -> StoreResult<()> {
            Err(StoreError::Conflict(schema.name.clone()))
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    async fn reconcile_logged(remote: Arc<dyn RemoteStore>) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        SchemaReconciler::new(remote)
            .reconcile(&TenantId::new("root").unwrap(), &LocalObject::new("default", "cm"))
            .await
            .unwrap();

        let logs = buffer.0.lock().unwrap().clone();
        String::from_utf8(logs).unwrap()
    }

    #[tokio::test]
    async fn test_create_result_is_logged() {
        let logs = reconcile_logged(Arc::new(InMemoryRemoteStore::new())).await;
        assert!(logs.contains("Result of creating APIResourceSchema"), "{}", logs);
        assert!(logs.contains("result=\"created\""), "{}", logs);
    }

    #[tokio::test]
    async fn test_lost_create_race_is_converged_and_logged() {
        let logs = reconcile_logged(Arc::new(Racing)).await;
        assert!(logs.contains("result=\"exists\""), "{}", logs);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let (remote, reconciler, root) = setup();
        let team = TenantId::new("team-a").unwrap();
        let obj = LocalObject::new("default", "cm");

        reconciler.reconcile(&root, &obj).await.unwrap();
        reconciler.reconcile(&team, &obj).await.unwrap();
        reconciler.reconcile(&team, &obj).await.unwrap();

        assert_eq!(remote.create_calls(), 2);
        assert_eq!(remote.schema_count(), 2);
    }
}
