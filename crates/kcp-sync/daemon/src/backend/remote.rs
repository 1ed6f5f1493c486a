//! kcp-backed remote store

use super::store_error;
use async_trait::async_trait;
use dashmap::DashMap;
use kcp_sync_controller::{LogicalCluster, RemoteStore, StoreError, StoreResult, LOGICAL_CLUSTER_NAME};
use kcp_sync_types::{ApiResourceSchema, TenantId};
use kube::api::PostParams;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use tracing::debug;

/// Path segment kcp uses to address a logical cluster
const CLUSTERS_SEGMENT: &str = "/clusters/";

/// kcp API server, one client per logical cluster
pub struct KcpRemoteStore {
    config: Config,
    root: Client,
    clients: DashMap<TenantId, Client>,
    schemas: ApiResource,
    logical_clusters: ApiResource,
}

impl KcpRemoteStore {
    /// Create a store for the workspace `config` points at
    pub fn new(config: Config) -> Result<Self, kube::Error> {
        let root = Client::try_from(config.clone())?;
        Ok(Self {
            config,
            root,
            clients: DashMap::new(),
            schemas: ApiResource::from_gvk_with_plural(
                &GroupVersionKind::gvk("apis.kcp.io", "v1alpha1", "APIResourceSchema"),
                "apiresourceschemas",
            ),
            logical_clusters: ApiResource::from_gvk_with_plural(
                &GroupVersionKind::gvk("core.kcp.io", "v1alpha1", "LogicalCluster"),
                "logicalclusters",
            ),
        })
    }

    /// Client scoped to `tenant`; the empty tenant uses the configured workspace
    fn client_for(&self, tenant: &TenantId) -> StoreResult<Client> {
        if tenant.is_empty() {
            return Ok(self.root.clone());
        }
        if let Some(client) = self.clients.get(tenant) {
            return Ok(client.clone());
        }

        let url = workspace_url(&self.config.cluster_url.to_string(), tenant);
        let mut config = self.config.clone();
        config.cluster_url = url
            .parse()
            .map_err(|e| StoreError::Connection(format!("invalid workspace url {}: {}", url, e)))?;
        let client = Client::try_from(config).map_err(|e| StoreError::Connection(e.to_string()))?;

        debug!(tenant = %tenant, url = %url, "Created workspace client");
        self.clients.insert(tenant.clone(), client.clone());
        Ok(client)
    }

    fn schema_api(&self, tenant: &TenantId) -> StoreResult<Api<DynamicObject>> {
        Ok(Api::all_with(self.client_for(tenant)?, &self.schemas))
    }
}

#[async_trait]
impl RemoteStore for KcpRemoteStore {
    async fn logical_cluster(&self) -> StoreResult<LogicalCluster> {
        let api: Api<DynamicObject> = Api::all_with(self.root.clone(), &self.logical_clusters);
        let obj = api.get(LOGICAL_CLUSTER_NAME).await.map_err(store_error)?;
        Ok(LogicalCluster {
            name: obj.name_any(),
            annotations: obj.annotations().clone(),
        })
    }

    async fn get_schema(&self, tenant: &TenantId, name: &str) -> StoreResult<ApiResourceSchema> {
        let obj = self.schema_api(tenant)?.get(name).await.map_err(store_error)?;
        schema_from_dynamic(&obj)
    }

    async fn create_schema(&self, tenant: &TenantId, schema: &ApiResourceSchema) -> StoreResult<()> {
        let obj = schema_to_dynamic(schema, &self.schemas)?;
        self.schema_api(tenant)?
            .create(&PostParams::default(), &obj)
            .await
            .map(|_| ())
            .map_err(store_error)
    }
}

/// Base URL of the logical cluster `tenant` on the server behind `server`.
///
/// Any logical cluster path already present in `server` is replaced.
pub fn workspace_url(server: &str, tenant: &TenantId) -> String {
    let base = server.trim_end_matches('/');
    let base = match base.find(CLUSTERS_SEGMENT) {
        Some(idx) => &base[..idx],
        None => base,
    };
    format!("{}{}{}", base, CLUSTERS_SEGMENT, tenant)
}

/// Decode an APIResourceSchema fetched as a dynamic object
pub fn schema_from_dynamic(obj: &DynamicObject) -> StoreResult<ApiResourceSchema> {
    let spec = obj
        .data
        .get("spec")
        .cloned()
        .ok_or_else(|| StoreError::InvalidData(format!("schema {} has no spec", obj.name_any())))?;
    let spec = serde_json::from_value(spec)
        .map_err(|e| StoreError::InvalidData(format!("schema {}: {}", obj.name_any(), e)))?;
    Ok(ApiResourceSchema::new(obj.name_any(), spec))
}

/// Encode an APIResourceSchema for the dynamic API
pub fn schema_to_dynamic(
    schema: &ApiResourceSchema,
    resource: &ApiResource,
) -> StoreResult<DynamicObject> {
    let spec = serde_json::to_value(&schema.spec)
        .map_err(|e| StoreError::InvalidData(format!("schema {}: {}", schema.name, e)))?;
    Ok(DynamicObject::new(&schema.name, resource).data(serde_json::json!({ "spec": spec })))
}
