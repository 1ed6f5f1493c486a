//! Objects observed in the local cluster

use crate::key::{ObjectKey, RequestKey};
use crate::tenant::{TenantError, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Annotation carrying the logical cluster an object belongs to.
pub const CLUSTER_ANNOTATION: &str = "kcp.io/cluster";

/// Snapshot of a watched object in the local cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalObject {
    /// Namespace (empty for cluster-scoped objects)
    pub namespace: String,

    /// Object name
    pub name: String,

    /// Server-assigned UID
    #[serde(default)]
    pub uid: Option<String>,

    /// Resource version at observation time
    #[serde(default)]
    pub resource_version: Option<String>,

    /// Object annotations
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Set once the object is being deleted
    #[serde(default)]
    pub deletion_timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// Payload
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl LocalObject {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Tenant from the cluster annotation, or the empty sentinel when absent.
    pub fn tenant(&self) -> Result<TenantId, TenantError> {
        match self.annotations.get(CLUSTER_ANNOTATION) {
            Some(cluster) => TenantId::new(cluster.as_str()),
            None => Ok(TenantId::empty()),
        }
    }

    /// Queue key for this object under `tenant`.
    pub fn request_key(&self, tenant: TenantId) -> RequestKey {
        RequestKey::encode(tenant, &self.namespace, &self.name)
    }
}
