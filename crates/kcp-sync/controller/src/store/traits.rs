//! Store trait definitions

use crate::error::StoreResult;
use async_trait::async_trait;
use futures::stream::BoxStream;
use kcp_sync_types::{ApiResourceSchema, LocalObject, ObjectKey, TenantId};
use std::collections::BTreeMap;

/// Change notification for a watched object
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// Object was added or updated (or listed on (re)connect)
    Applied(LocalObject),
    /// Object was removed
    Deleted(LocalObject),
}

impl WatchEvent {
    pub fn object(&self) -> &LocalObject {
        match self {
            WatchEvent::Applied(obj) | WatchEvent::Deleted(obj) => obj,
        }
    }
}

/// Severity of an object event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

/// Human-readable event attached to a local object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEvent {
    pub type_: EventType,
    /// Machine-readable CamelCase reason
    pub reason: String,
    /// Human-readable description
    pub note: String,
}

impl ObjectEvent {
    pub fn warning(reason: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            reason: reason.into(),
            note: note.into(),
        }
    }
}

/// The well-known object describing the workspace a client is connected to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalCluster {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

/// Object store of the local cluster
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Level-triggered change feed for the watched kind.
    ///
    /// Every currently existing object is delivered as `Applied` when the
    /// stream starts.
    fn watch(&self) -> BoxStream<'static, StoreResult<WatchEvent>>;

    /// Fetch the current state of an object
    async fn get(&self, key: &ObjectKey) -> StoreResult<LocalObject>;

    /// Attach an event to an object
    async fn record_event(&self, object: &LocalObject, event: ObjectEvent) -> StoreResult<()>;
}

/// Tenant-partitioned remote control plane
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the identity object of the workspace the client points at
    async fn logical_cluster(&self) -> StoreResult<LogicalCluster>;

    /// Fetch an APIResourceSchema by name within a tenant
    async fn get_schema(&self, tenant: &TenantId, name: &str) -> StoreResult<ApiResourceSchema>;

    /// Create an APIResourceSchema within a tenant
    async fn create_schema(&self, tenant: &TenantId, schema: &ApiResourceSchema) -> StoreResult<()>;
}
