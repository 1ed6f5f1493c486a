//! In-memory store implementations

use super::traits::*;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use kcp_sync_types::{ApiResourceSchema, LocalObject, ObjectKey, TenantId, CLUSTER_ANNOTATION};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

/// Decrement `counter` if positive; returns whether a failure was consumed.
fn take_injected_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Every stored object as an `Applied` event
async fn snapshot(
    objects: Arc<RwLock<HashMap<ObjectKey, LocalObject>>>,
) -> Vec<StoreResult<WatchEvent>> {
    objects
        .read()
        .await
        .values()
        .cloned()
        .map(|o| Ok(WatchEvent::Applied(o)))
        .collect()
}

/// In-memory local cluster for development and testing
#[derive(Debug)]
pub struct InMemoryLocalStore {
    objects: Arc<RwLock<HashMap<ObjectKey, LocalObject>>>,
    events: Arc<RwLock<Vec<(ObjectKey, ObjectEvent)>>>,
    watch_tx: broadcast::Sender<WatchEvent>,
    resource_version: AtomicUsize,
    failing_gets: AtomicUsize,
    get_calls: AtomicUsize,
}

impl Default for InMemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLocalStore {
    pub fn new() -> Self {
        Self::with_watch_capacity(1024)
    }

    /// Create a store whose watchers buffer at most `capacity` events
    /// before falling behind and re-listing
    pub fn with_watch_capacity(capacity: usize) -> Self {
        let (watch_tx, _) = broadcast::channel(capacity);
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(RwLock::new(Vec::new())),
            watch_tx,
            resource_version: AtomicUsize::new(0),
            failing_gets: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Create or update an object and notify watchers.
    ///
    /// Assigns a fresh resource version and returns the stored object.
    pub async fn apply(&self, mut object: LocalObject) -> LocalObject {
        let rv = self.resource_version.fetch_add(1, Ordering::SeqCst) + 1;
        object.resource_version = Some(rv.to_string());

        self.objects
            .write()
            .await
            .insert(object.key(), object.clone());
        let _ = self.watch_tx.send(WatchEvent::Applied(object.clone()));
        object
    }

    /// Remove an object and notify watchers.
    pub async fn delete(&self, key: &ObjectKey) -> Option<LocalObject> {
        let removed = self.objects.write().await.remove(key);
        if let Some(object) = &removed {
            let _ = self.watch_tx.send(WatchEvent::Deleted(object.clone()));
        }
        removed
    }

    /// Set the deletion marker on an object, as a finalizer-held delete would.
    pub async fn mark_deleting(&self, key: &ObjectKey) -> Option<LocalObject> {
        let existing = self.objects.read().await.get(key).cloned()?;
        let mut object = existing;
        object.deletion_timestamp = Some(chrono::Utc::now());
        Some(self.apply(object).await)
    }

    /// Events recorded against an object
    pub async fn events_for(&self, key: &ObjectKey) -> Vec<ObjectEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Make the next `n` calls to `get` fail with a connection error
    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    fn watch(&self) -> BoxStream<'static, StoreResult<WatchEvent>> {
        // Subscribe before listing so nothing applied in between is missed.
        let rx = self.watch_tx.subscribe();
        let objects = self.objects.clone();

        let initial = stream::once(snapshot(objects.clone())).flat_map(stream::iter);

        let live = stream::unfold((rx, objects), |(mut rx, objects)| async move {
            let events = match rx.recv().await {
                Ok(event) => vec![Ok(event)],
                // Missed events are unrecoverable; re-list instead
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Watch fell behind, re-listing");
                    snapshot(objects.clone()).await
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };
            Some((events, (rx, objects)))
        })
        .flat_map(stream::iter);

        initial.chain(live).boxed()
    }

    async fn get(&self, key: &ObjectKey) -> StoreResult<LocalObject> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if take_injected_failure(&self.failing_gets) {
            return Err(StoreError::Connection("injected failure".into()));
        }

        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("ConfigMap {}", key)))
    }

    async fn record_event(&self, object: &LocalObject, event: ObjectEvent) -> StoreResult<()> {
        self.events.write().await.push((object.key(), event));
        Ok(())
    }
}

/// In-memory multi-tenant control plane for development and testing
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    logical_cluster: Option<LogicalCluster>,
    schemas: DashMap<(TenantId, String), ApiResourceSchema>,
    failing_gets: AtomicUsize,
    failing_creates: AtomicUsize,
    get_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    /// A control plane without an identity object
    pub fn new() -> Self {
        Self {
            logical_cluster: None,
            schemas: DashMap::new(),
            failing_gets: AtomicUsize::new(0),
            failing_creates: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// A control plane whose identity object names `cluster`
    pub fn with_identity(cluster: &str) -> Self {
        let mut logical_cluster = LogicalCluster {
            name: crate::identity::LOGICAL_CLUSTER_NAME.to_string(),
            ..Default::default()
        };
        logical_cluster
            .annotations
            .insert(CLUSTER_ANNOTATION.to_string(), cluster.to_string());

        Self {
            logical_cluster: Some(logical_cluster),
            ..Self::new()
        }
    }

    /// Replace the identity object
    pub fn with_logical_cluster(mut self, logical_cluster: LogicalCluster) -> Self {
        self.logical_cluster = Some(logical_cluster);
        self
    }

    pub fn insert_schema(&self, tenant: &TenantId, schema: ApiResourceSchema) {
        self.schemas
            .insert((tenant.clone(), schema.name.clone()), schema);
    }

    pub fn schema(&self, tenant: &TenantId, name: &str) -> Option<ApiResourceSchema> {
        self.schemas
            .get(&(tenant.clone(), name.to_string()))
            .map(|s| s.value().clone())
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Make the next `n` calls to `get_schema` fail with a connection error
    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` calls to `create_schema` fail with a connection error
    pub fn fail_next_creates(&self, n: usize) {
        self.failing_creates.store(n, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn logical_cluster(&self) -> StoreResult<LogicalCluster> {
        self.logical_cluster
            .clone()
            .ok_or_else(|| StoreError::NotFound("LogicalCluster cluster".into()))
    }

    async fn get_schema(&self, tenant: &TenantId, name: &str) -> StoreResult<ApiResourceSchema> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if take_injected_failure(&self.failing_gets) {
            return Err(StoreError::Connection("injected failure".into()));
        }

        self.schema(tenant, name).ok_or_else(|| {
            StoreError::NotFound(format!("APIResourceSchema {} in {}", name, tenant))
        })
    }

    async fn create_schema(&self, tenant: &TenantId, schema: &ApiResourceSchema) -> StoreResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if take_injected_failure(&self.failing_creates) {
            return Err(StoreError::Connection("injected failure".into()));
        }

        let key = (tenant.clone(), schema.name.clone());
        match self.schemas.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "APIResourceSchema {} already exists in {}",
                schema.name, tenant
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(schema.clone());
                Ok(())
            }
        }
    }
}
